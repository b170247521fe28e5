use crate::fad::{self, Fad, Real};
use crate::physics::{BoundaryConditions, Flux, Gradient, ManufacturedSolution, Physics, State};
use eyre::ensure;
use nalgebra::{Point, SVector};

/// Boundary conditions for the Euler equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerBoundaryCondition {
    /// Inviscid wall: the ghost state mirrors the normal momentum.
    SlipWall,
    /// The ghost state is the free-stream state.
    Farfield,
    /// The ghost state is the manufactured solution.
    ManufacturedSolution,
    /// The ghost state equals the interior state.
    Extrapolation,
}

/// Compressible Euler equations for an ideal gas in `D` dimensions.
///
/// The state holds the conserved variables `[ρ, ρv_1, ..., ρv_D, E]`, so `S` must equal `D + 2`.
/// The free stream has unit density and unit speed, with the pressure determined by the
/// free-stream Mach number.
#[derive(Debug, Clone)]
pub struct Euler<const D: usize, const S: usize> {
    gamma: f64,
    mach_inf: f64,
    angle_of_attack: f64,
    freestream: [f64; S],
    manufactured_solution: ManufacturedSolution<D, S>,
    boundary_conditions: BoundaryConditions<EulerBoundaryCondition>,
}

impl<const D: usize, const S: usize> Euler<D, S> {
    /// Constructs the model with ratio of specific heats `gamma`, free-stream Mach number
    /// `mach_inf` and angle of attack (in radians) of the free stream in the `x_1 x_2` plane.
    pub fn new(gamma: f64, mach_inf: f64, angle_of_attack: f64) -> eyre::Result<Self> {
        ensure!((1..=3).contains(&D), "Euler equations are supported in 1, 2 or 3 dimensions, got {D}");
        ensure!(
            S == D + 2,
            "Euler equations in {D} dimensions have {} state components, got {S}",
            D + 2
        );
        ensure!(gamma > 1.0, "Ratio of specific heats must exceed one, got {gamma}");
        ensure!(mach_inf > 0.0, "Free-stream Mach number must be positive, got {mach_inf}");

        let velocity: [f64; D] = std::array::from_fn(|d| match d {
            0 => angle_of_attack.cos(),
            1 => angle_of_attack.sin(),
            _ => 0.0,
        });
        let pressure = 1.0 / (gamma * mach_inf * mach_inf);
        let mut primitive = [0.0; S];
        primitive[0] = 1.0;
        primitive[1..=D].copy_from_slice(&velocity);
        primitive[S - 1] = pressure;

        let mut euler = Self {
            gamma,
            mach_inf,
            angle_of_attack,
            freestream: [0.0; S],
            manufactured_solution: ManufacturedSolution::new(SVector::repeat(1.0), SVector::zeros())
                .with_base(std::array::from_fn(|s| match s {
                    0 => 2.0,
                    s if s == S - 1 => 5.0,
                    _ => 0.3,
                }))
                .with_amplitude([0.1; S]),
            boundary_conditions: BoundaryConditions::default(),
        };
        euler.freestream = euler.primitive_to_conservative(&primitive);
        Ok(euler)
    }

    pub fn with_manufactured_solution(self, manufactured_solution: ManufacturedSolution<D, S>) -> Self {
        Self {
            manufactured_solution,
            ..self
        }
    }

    pub fn with_boundary_condition(mut self, boundary_id: usize, condition: EulerBoundaryCondition) -> Self {
        self.boundary_conditions.insert(boundary_id, condition);
        self
    }

    pub fn with_boundary_conditions(
        mut self,
        boundary_ids: impl IntoIterator<Item = usize>,
        condition: EulerBoundaryCondition,
    ) -> Self {
        for id in boundary_ids {
            self.boundary_conditions.insert(id, condition);
        }
        self
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn mach_inf(&self) -> f64 {
        self.mach_inf
    }

    pub fn angle_of_attack(&self) -> f64 {
        self.angle_of_attack
    }

    /// The free-stream state in conserved variables.
    pub fn freestream(&self) -> &[f64; S] {
        &self.freestream
    }

    pub fn manufactured_solution(&self) -> &ManufacturedSolution<D, S> {
        &self.manufactured_solution
    }

    pub fn velocity<T: Real>(&self, u: &State<T, S>) -> [T; D] {
        std::array::from_fn(|d| u[1 + d] / u[0])
    }

    pub fn pressure<T: Real>(&self, u: &State<T, S>) -> T {
        let mut momentum_squared = T::zero();
        for d in 0..D {
            momentum_squared += u[1 + d] * u[1 + d];
        }
        (u[S - 1] - momentum_squared / u[0] * 0.5) * (self.gamma - 1.0)
    }

    pub fn sound_speed<T: Real>(&self, u: &State<T, S>) -> T {
        (self.pressure(u) * self.gamma / u[0]).sqrt()
    }

    /// Total specific enthalpy `H = (E + p) / ρ`.
    pub fn total_enthalpy<T: Real>(&self, u: &State<T, S>) -> T {
        (u[S - 1] + self.pressure(u)) / u[0]
    }

    /// Converts `[ρ, v_1, ..., v_D, p]` to conserved variables.
    pub fn primitive_to_conservative<T: Real>(&self, primitive: &State<T, S>) -> State<T, S> {
        let density = primitive[0];
        let mut kinetic = T::zero();
        let mut conservative = *primitive;
        for d in 0..D {
            conservative[1 + d] = density * primitive[1 + d];
            kinetic += primitive[1 + d] * primitive[1 + d];
        }
        conservative[S - 1] = primitive[S - 1] / (self.gamma - 1.0) + density * kinetic * 0.5;
        conservative
    }

    /// Converts conserved variables to `[ρ, v_1, ..., v_D, p]`.
    pub fn conservative_to_primitive<T: Real>(&self, u: &State<T, S>) -> State<T, S> {
        let mut primitive = *u;
        primitive[1..=D].copy_from_slice(&self.velocity(u));
        primitive[S - 1] = self.pressure(u);
        primitive
    }
}

/// Lower bound of the squared Roe-averaged sound speed.
const MIN_SOUND_SPEED_SQUARED: f64 = 1e-14;

/// Lower bound of the width of the entropy fix.
const MIN_ENTROPY_FIX_WIDTH: f64 = 1e-8;

/// Harten's entropy fix, which smooths `|λ|` below the width `delta`.
fn entropy_fix<T: Real>(eigenvalue: T, delta: T) -> T {
    if eigenvalue.value() < delta.value() {
        (eigenvalue * eigenvalue + delta * delta) / (delta * 2.0)
    } else {
        eigenvalue
    }
}

impl<const D: usize, const S: usize> Physics<D, S> for Euler<D, S> {
    fn convective_flux<T: Real>(&self, u: &State<T, S>) -> Flux<T, D, S> {
        let pressure = self.pressure(u);
        let velocity = self.velocity(u);
        let mut flux = [[T::zero(); D]; S];
        for d in 0..D {
            flux[0][d] = u[1 + d];
            for i in 0..D {
                flux[1 + i][d] = u[1 + i] * velocity[d];
            }
            flux[1 + d][d] += pressure;
            flux[S - 1][d] = (u[S - 1] + pressure) * velocity[d];
        }
        flux
    }

    fn dissipative_flux<T: Real>(&self, _u: &State<T, S>, _gradient: &Gradient<T, D, S>) -> Flux<T, D, S> {
        [[T::zero(); D]; S]
    }

    fn source_term<T: Real>(&self, x: &Point<f64, D>, _u: &State<T, S>) -> State<T, S> {
        // s = ∇·F(u_m) = Σ_d Σ_k ∂F_d/∂u_k ∂u_k/∂x_d, with the flux Jacobian obtained by AD
        let value = self.manufactured_solution.value(x);
        let gradient = self.manufactured_solution.gradient(x);
        let u: [Fad<S>; S] = std::array::from_fn(|k| fad::variable(value[k], k));
        let flux = self.convective_flux(&u);
        std::array::from_fn(|s| {
            let mut divergence = 0.0;
            for d in 0..D {
                let dflux = fad::derivatives(&flux[s][d]);
                for k in 0..S {
                    divergence += dflux[k] * gradient[k][d];
                }
            }
            T::from_f64(divergence)
        })
    }

    fn max_convective_eigenvalue<T: Real>(&self, u: &State<T, S>) -> T {
        let mut speed_squared = T::zero();
        for v in self.velocity(u) {
            speed_squared += v * v;
        }
        speed_squared.sqrt() + self.sound_speed(u)
    }

    fn convective_eigenvalues<T: Real>(&self, u: &State<T, S>, normal: &SVector<f64, D>) -> State<T, S> {
        let velocity = self.velocity(u);
        let mut normal_velocity = T::zero();
        for d in 0..D {
            normal_velocity += velocity[d] * normal[d];
        }
        let sound_speed = self.sound_speed(u);
        let mut eigenvalues = [normal_velocity; S];
        eigenvalues[0] -= sound_speed;
        eigenvalues[S - 1] += sound_speed;
        eigenvalues
    }

    fn roe_dissipation<T: Real>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S> {
        let (velocity_int, velocity_ext) = (self.velocity(u_int), self.velocity(u_ext));
        let (sqrt_int, sqrt_ext) = (u_int[0].sqrt(), u_ext[0].sqrt());
        let weight_sum = sqrt_int + sqrt_ext;

        // Roe averages
        let velocity: [T; D] =
            std::array::from_fn(|d| (velocity_int[d] * sqrt_int + velocity_ext[d] * sqrt_ext) / weight_sum);
        let enthalpy =
            (self.total_enthalpy(u_int) * sqrt_int + self.total_enthalpy(u_ext) * sqrt_ext) / weight_sum;
        let density = sqrt_int * sqrt_ext;
        let mut speed_squared = T::zero();
        let mut normal_velocity = T::zero();
        for d in 0..D {
            speed_squared += velocity[d] * velocity[d];
            normal_velocity += velocity[d] * normal[d];
        }
        // Pressureless (vacuum) states have vanishing sound speed
        let sound_speed_squared =
            ((enthalpy - speed_squared * 0.5) * (self.gamma - 1.0)).max(T::from_f64(MIN_SOUND_SPEED_SQUARED));
        let sound_speed = sound_speed_squared.sqrt();

        // Jumps
        let density_jump = u_ext[0] - u_int[0];
        let pressure_jump = self.pressure(u_ext) - self.pressure(u_int);
        let velocity_jump: [T; D] = std::array::from_fn(|d| velocity_ext[d] - velocity_int[d]);
        let mut normal_velocity_jump = T::zero();
        let mut velocity_dot_jump = T::zero();
        for d in 0..D {
            normal_velocity_jump += velocity_jump[d] * normal[d];
            velocity_dot_jump += velocity[d] * velocity_jump[d];
        }

        let delta = (sound_speed * 0.1).max(T::from_f64(MIN_ENTROPY_FIX_WIDTH));
        let lambda_minus = entropy_fix((normal_velocity - sound_speed).abs(), delta);
        let lambda_zero = entropy_fix(normal_velocity.abs(), delta);
        let lambda_plus = entropy_fix((normal_velocity + sound_speed).abs(), delta);

        let acoustic = density * sound_speed * normal_velocity_jump;
        let alpha_minus = (pressure_jump - acoustic) / (sound_speed_squared * 2.0);
        let alpha_zero = density_jump - pressure_jump / sound_speed_squared;
        let alpha_plus = (pressure_jump + acoustic) / (sound_speed_squared * 2.0);

        let wave_minus = lambda_minus * alpha_minus;
        let wave_plus = lambda_plus * alpha_plus;

        let mut dissipation = [T::zero(); S];
        dissipation[0] = wave_minus + lambda_zero * alpha_zero + wave_plus;
        for d in 0..D {
            let shear = (velocity_jump[d] - normal_velocity_jump * normal[d]) * density;
            dissipation[1 + d] = wave_minus * (velocity[d] - sound_speed * normal[d])
                + lambda_zero * (alpha_zero * velocity[d] + shear)
                + wave_plus * (velocity[d] + sound_speed * normal[d]);
        }
        let shear_energy = (velocity_dot_jump - normal_velocity * normal_velocity_jump) * density;
        dissipation[S - 1] = wave_minus * (enthalpy - sound_speed * normal_velocity)
            + lambda_zero * (alpha_zero * speed_squared * 0.5 + shear_energy)
            + wave_plus * (enthalpy + sound_speed * normal_velocity);
        dissipation
    }

    fn has_boundary(&self, boundary_id: usize) -> bool {
        self.boundary_conditions.contains(boundary_id)
    }

    fn boundary_face_values<T: Real>(
        &self,
        boundary_id: usize,
        x: &Point<f64, D>,
        normal: &SVector<f64, D>,
        u_int: &State<T, S>,
        gradient_int: &Gradient<T, D, S>,
    ) -> eyre::Result<(State<T, S>, Gradient<T, D, S>)> {
        let u_ext = match self.boundary_conditions.get(boundary_id)? {
            EulerBoundaryCondition::SlipWall => {
                let mut normal_momentum = T::zero();
                for d in 0..D {
                    normal_momentum += u_int[1 + d] * normal[d];
                }
                let mut u_ext = *u_int;
                for d in 0..D {
                    u_ext[1 + d] -= normal_momentum * (2.0 * normal[d]);
                }
                u_ext
            }
            EulerBoundaryCondition::Farfield => self.freestream.map(T::from_f64),
            EulerBoundaryCondition::ManufacturedSolution => self.manufactured_solution.value(x).map(T::from_f64),
            EulerBoundaryCondition::Extrapolation => *u_int,
        };
        Ok((u_ext, *gradient_int))
    }
}
