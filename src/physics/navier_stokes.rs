use crate::fad::{self, Fad, Real};
use crate::physics::{BoundaryConditions, Euler, Flux, Gradient, ManufacturedSolution, Physics, State};
use eyre::ensure;
use nalgebra::{Point, SVector};

/// Sutherland constant divided by the free-stream temperature, for air at 273.15 K.
pub const SUTHERLAND_TEMPERATURE_RATIO: f64 = 110.4 / 273.15;

/// Dependence of the dynamic viscosity on temperature.
///
/// Viscosities are nondimensionalized by their free-stream value, and temperatures by the
/// free-stream temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViscosityLaw {
    /// `μ = 1`.
    Constant,
    /// `μ = (1 + T_s) / (T + T_s) T^{3/2}`, where `T_s` is the given temperature ratio.
    Sutherland { temperature_ratio: f64 },
}

impl Default for ViscosityLaw {
    fn default() -> Self {
        Self::Sutherland {
            temperature_ratio: SUTHERLAND_TEMPERATURE_RATIO,
        }
    }
}

/// Boundary conditions for the Navier-Stokes equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavierStokesBoundaryCondition {
    /// No-slip wall without heat flux. The wall state keeps the interior density and temperature.
    AdiabaticWall,
    /// No-slip wall at the given (nondimensional) temperature. The wall state keeps the interior density.
    IsothermalWall(f64),
    /// The ghost state is the free-stream state, with the interior gradient.
    Farfield,
    /// The ghost state and gradient are those of the manufactured solution.
    ManufacturedSolution,
}

/// Compressible Navier-Stokes equations for an ideal gas in `D` dimensions.
///
/// The convective part is that of the wrapped [`Euler`] model. The dissipative flux is
/// `[0, -τ, -τ v + q]` with the Newtonian stress
/// `τ = μ̂ (∇v + ∇vᵀ - ⅔ (∇·v) I)` and the Fourier heat flux `q = -κ̂ ∇T`, where
/// `μ̂ = μ / Re` and `κ̂ = μ̂ / ((γ - 1) M² Pr)`. The temperature is scaled so that it is one
/// in the free stream, `T = γ M² p / ρ`.
#[derive(Debug, Clone)]
pub struct NavierStokes<const D: usize, const S: usize> {
    euler: Euler<D, S>,
    prandtl_number: f64,
    reynolds_number_inf: f64,
    viscosity_law: ViscosityLaw,
    boundary_conditions: BoundaryConditions<NavierStokesBoundaryCondition>,
}

impl<const D: usize, const S: usize> NavierStokes<D, S> {
    /// Constructs the model from the inviscid part, the Prandtl number and the free-stream
    /// Reynolds number. Viscosity follows Sutherland's law for air.
    ///
    /// Boundary conditions of the Euler model are not used.
    pub fn new(euler: Euler<D, S>, prandtl_number: f64, reynolds_number_inf: f64) -> eyre::Result<Self> {
        ensure!(prandtl_number > 0.0, "Prandtl number must be positive, got {prandtl_number}");
        ensure!(
            reynolds_number_inf > 0.0,
            "Free-stream Reynolds number must be positive, got {reynolds_number_inf}"
        );
        Ok(Self {
            euler,
            prandtl_number,
            reynolds_number_inf,
            viscosity_law: ViscosityLaw::default(),
            boundary_conditions: BoundaryConditions::default(),
        })
    }

    pub fn with_viscosity_law(self, viscosity_law: ViscosityLaw) -> Self {
        Self { viscosity_law, ..self }
    }

    pub fn with_manufactured_solution(self, manufactured_solution: ManufacturedSolution<D, S>) -> Self {
        Self {
            euler: self.euler.with_manufactured_solution(manufactured_solution),
            ..self
        }
    }

    pub fn with_boundary_condition(mut self, boundary_id: usize, condition: NavierStokesBoundaryCondition) -> Self {
        self.boundary_conditions.insert(boundary_id, condition);
        self
    }

    pub fn with_boundary_conditions(
        mut self,
        boundary_ids: impl IntoIterator<Item = usize>,
        condition: NavierStokesBoundaryCondition,
    ) -> Self {
        for id in boundary_ids {
            self.boundary_conditions.insert(id, condition);
        }
        self
    }

    pub fn euler(&self) -> &Euler<D, S> {
        &self.euler
    }

    pub fn prandtl_number(&self) -> f64 {
        self.prandtl_number
    }

    pub fn reynolds_number_inf(&self) -> f64 {
        self.reynolds_number_inf
    }

    pub fn viscosity_law(&self) -> ViscosityLaw {
        self.viscosity_law
    }

    /// Nondimensional temperature `T = γ M² p / ρ`.
    pub fn temperature<T: Real>(&self, u: &State<T, S>) -> T {
        let mach_inf = self.euler.mach_inf();
        self.euler.pressure(u) * (self.euler.gamma() * mach_inf * mach_inf) / u[0]
    }

    /// Dynamic viscosity divided by the free-stream Reynolds number.
    pub fn scaled_viscosity<T: Real>(&self, u: &State<T, S>) -> T {
        let viscosity = match self.viscosity_law {
            ViscosityLaw::Constant => T::one(),
            ViscosityLaw::Sutherland { temperature_ratio } => {
                let temperature = self.temperature(u);
                temperature * temperature.sqrt() * (1.0 + temperature_ratio) / (temperature + temperature_ratio)
            }
        };
        viscosity / self.reynolds_number_inf
    }

    /// Heat conductivity divided by the free-stream Reynolds number.
    pub fn scaled_heat_conductivity<T: Real>(&self, u: &State<T, S>) -> T {
        let mach_inf = self.euler.mach_inf();
        self.scaled_viscosity(u) / ((self.euler.gamma() - 1.0) * mach_inf * mach_inf * self.prandtl_number)
    }

    /// Converts the gradient of the conserved variables to the gradient of `[ρ, v_1, ..., v_D, p]`.
    pub fn primitive_gradient<T: Real>(&self, u: &State<T, S>, gradient: &Gradient<T, D, S>) -> Gradient<T, D, S> {
        let density = u[0];
        let velocity = self.euler.velocity(u);
        let mut speed_squared = T::zero();
        for v in velocity {
            speed_squared += v * v;
        }

        let mut primitive = [[T::zero(); D]; S];
        primitive[0] = gradient[0];
        for i in 0..D {
            for d in 0..D {
                primitive[1 + i][d] = (gradient[1 + i][d] - velocity[i] * gradient[0][d]) / density;
            }
        }
        // ∂p = (γ - 1) (∂E - ½ |v|² ∂ρ - ρ v · ∂v)
        for d in 0..D {
            let mut pressure_derivative = gradient[S - 1][d] - speed_squared * gradient[0][d] * 0.5;
            for i in 0..D {
                pressure_derivative -= u[1 + i] * primitive[1 + i][d];
            }
            primitive[S - 1][d] = pressure_derivative * (self.euler.gamma() - 1.0);
        }
        primitive
    }

    /// Viscous stress tensor. Entry `[i][j]` is `τ_ij`.
    pub fn viscous_stress<T: Real>(&self, u: &State<T, S>, primitive_gradient: &Gradient<T, D, S>) -> [[T; D]; D] {
        let viscosity = self.scaled_viscosity(u);
        let mut divergence = T::zero();
        for d in 0..D {
            divergence += primitive_gradient[1 + d][d];
        }
        let mut stress = [[T::zero(); D]; D];
        for i in 0..D {
            for j in 0..D {
                stress[i][j] = viscosity * (primitive_gradient[1 + i][j] + primitive_gradient[1 + j][i]);
            }
            stress[i][i] -= viscosity * divergence * (2.0 / 3.0);
        }
        stress
    }

    /// Fourier heat flux `q = -κ̂ ∇T`.
    pub fn heat_flux<T: Real>(&self, u: &State<T, S>, primitive_gradient: &Gradient<T, D, S>) -> [T; D] {
        let conductivity = self.scaled_heat_conductivity(u);
        let temperature = self.temperature(u);
        let mach_inf = self.euler.mach_inf();
        let scale = self.euler.gamma() * mach_inf * mach_inf;
        // ∂T = (γ M² ∂p - T ∂ρ) / ρ
        std::array::from_fn(|d| {
            let temperature_derivative =
                (primitive_gradient[S - 1][d] * scale - temperature * primitive_gradient[0][d]) / u[0];
            -(conductivity * temperature_derivative)
        })
    }

    /// No-slip wall state with the given total energy per unit volume at rest.
    fn wall_state<T: Real>(&self, density: T, energy: T) -> State<T, S> {
        let mut u = [T::zero(); S];
        u[0] = density;
        u[S - 1] = energy;
        u
    }
}

impl<const D: usize, const S: usize> Physics<D, S> for NavierStokes<D, S> {
    fn convective_flux<T: Real>(&self, u: &State<T, S>) -> Flux<T, D, S> {
        self.euler.convective_flux(u)
    }

    fn dissipative_flux<T: Real>(&self, u: &State<T, S>, gradient: &Gradient<T, D, S>) -> Flux<T, D, S> {
        let primitive_gradient = self.primitive_gradient(u, gradient);
        let stress = self.viscous_stress(u, &primitive_gradient);
        let heat_flux = self.heat_flux(u, &primitive_gradient);
        let velocity = self.euler.velocity(u);

        let mut flux = [[T::zero(); D]; S];
        for d in 0..D {
            for i in 0..D {
                flux[1 + i][d] = -stress[i][d];
            }
            let mut energy_flux = heat_flux[d];
            for i in 0..D {
                energy_flux -= velocity[i] * stress[d][i];
            }
            flux[S - 1][d] = energy_flux;
        }
        flux
    }

    fn source_term<T: Real>(&self, x: &Point<f64, D>, _u: &State<T, S>) -> State<T, S> {
        // s = ∇·(F_conv + F_diss)(u_m, ∇u_m). Each term ∂_d F[·][d] is the derivative along
        // x_d of the flux evaluated on the manufactured solution and its gradient.
        let manufactured_solution = self.euler.manufactured_solution();
        let value = manufactured_solution.value(x);
        let gradient = manufactured_solution.gradient(x);
        let hessian = manufactured_solution.hessian(x);

        let mut source = [0.0; S];
        let t: Fad<1> = fad::variable(0.0, 0);
        for d in 0..D {
            let u: State<Fad<1>, S> = std::array::from_fn(|k| t * gradient[k][d] + value[k]);
            let u_gradient: Gradient<Fad<1>, D, S> =
                std::array::from_fn(|k| std::array::from_fn(|e| t * hessian[k][(e, d)] + gradient[k][e]));
            let convective = self.convective_flux(&u);
            let dissipative = self.dissipative_flux(&u, &u_gradient);
            for s in 0..S {
                source[s] += fad::derivatives(&(convective[s][d] + dissipative[s][d]))[0];
            }
        }
        source.map(T::from_f64)
    }

    fn max_convective_eigenvalue<T: Real>(&self, u: &State<T, S>) -> T {
        self.euler.max_convective_eigenvalue(u)
    }

    fn convective_eigenvalues<T: Real>(&self, u: &State<T, S>, normal: &SVector<f64, D>) -> State<T, S> {
        self.euler.convective_eigenvalues(u, normal)
    }

    fn roe_dissipation<T: Real>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S> {
        self.euler.roe_dissipation(u_int, u_ext, normal)
    }

    fn has_boundary(&self, boundary_id: usize) -> bool {
        self.boundary_conditions.contains(boundary_id)
    }

    fn boundary_face_values<T: Real>(
        &self,
        boundary_id: usize,
        x: &Point<f64, D>,
        _normal: &SVector<f64, D>,
        u_int: &State<T, S>,
        gradient_int: &Gradient<T, D, S>,
    ) -> eyre::Result<(State<T, S>, Gradient<T, D, S>)> {
        let gamma = self.euler.gamma();
        let mach_inf = self.euler.mach_inf();
        let boundary_values = match *self.boundary_conditions.get(boundary_id)? {
            NavierStokesBoundaryCondition::AdiabaticWall => {
                // Same density and pressure, hence same temperature, with the fluid at rest
                let energy = self.euler.pressure(u_int) / (gamma - 1.0);
                (self.wall_state(u_int[0], energy), *gradient_int)
            }
            NavierStokesBoundaryCondition::IsothermalWall(wall_temperature) => {
                let pressure = u_int[0] * (wall_temperature / (gamma * mach_inf * mach_inf));
                (self.wall_state(u_int[0], pressure / (gamma - 1.0)), *gradient_int)
            }
            NavierStokesBoundaryCondition::Farfield => (self.euler.freestream().map(T::from_f64), *gradient_int),
            NavierStokesBoundaryCondition::ManufacturedSolution => {
                let manufactured_solution = self.euler.manufactured_solution();
                let gradient = manufactured_solution.gradient(x);
                (
                    manufactured_solution.value(x).map(T::from_f64),
                    gradient.map(|g| g.map(T::from_f64)),
                )
            }
        };
        Ok(boundary_values)
    }
}
