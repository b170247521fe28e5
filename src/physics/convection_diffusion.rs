use crate::fad::Real;
use crate::physics::{
    scalar_boundary_values, BoundaryConditions, Flux, Gradient, ManufacturedSolution, Physics,
    ScalarBoundaryCondition, State, INFLOW_TOLERANCE,
};
use nalgebra::{Point, SMatrix, SVector};

/// Linear convection-diffusion, `∂u/∂t + ∇·(c u) - ∇·(κ A ∇u) = s(x)`.
///
/// The pure linear advection and pure diffusion models are special cases with `κ = 0`
/// and `c = 0` respectively. The diffusion tensor `A` defaults to the identity.
///
/// With `S = 2` the model is a system of two decoupled equations sharing the same velocity
/// and diffusion. At most two state components are supported.
#[derive(Debug, Clone)]
pub struct ConvectionDiffusion<const D: usize, const S: usize = 1> {
    velocity: SVector<f64, D>,
    diffusion_coefficient: f64,
    diffusion_tensor: SMatrix<f64, D, D>,
    manufactured_solution: ManufacturedSolution<D, S>,
    boundary_conditions: BoundaryConditions<ScalarBoundaryCondition>,
}

impl<const D: usize> ConvectionDiffusion<D> {
    pub fn new(velocity: SVector<f64, D>, diffusion_coefficient: f64) -> Self {
        Self::with_components(velocity, diffusion_coefficient)
    }

    pub fn linear_advection(velocity: SVector<f64, D>) -> Self {
        Self::new(velocity, 0.0)
    }

    pub fn diffusion(diffusion_coefficient: f64) -> Self {
        Self::new(SVector::zeros(), diffusion_coefficient)
    }
}

impl<const D: usize, const S: usize> ConvectionDiffusion<D, S> {
    const VALID_NUM_STATES: () = assert!(S == 1 || S == 2, "Convection-diffusion supports one or two states");

    /// A model with `S` decoupled components.
    ///
    /// Fails to compile unless `S` is one or two.
    pub fn with_components(velocity: SVector<f64, D>, diffusion_coefficient: f64) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_NUM_STATES;
        Self {
            velocity,
            diffusion_coefficient,
            diffusion_tensor: SMatrix::identity(),
            manufactured_solution: ManufacturedSolution::new(SVector::repeat(1.0), SVector::zeros()),
            boundary_conditions: BoundaryConditions::default(),
        }
    }

    pub fn with_diffusion_tensor(self, diffusion_tensor: SMatrix<f64, D, D>) -> Self {
        Self {
            diffusion_tensor,
            ..self
        }
    }

    pub fn with_manufactured_solution(self, manufactured_solution: ManufacturedSolution<D, S>) -> Self {
        Self {
            manufactured_solution,
            ..self
        }
    }

    pub fn with_boundary_condition(mut self, boundary_id: usize, condition: ScalarBoundaryCondition) -> Self {
        self.boundary_conditions.insert(boundary_id, condition);
        self
    }

    /// Applies the same boundary condition to every boundary id in the given range.
    pub fn with_boundary_conditions(
        mut self,
        boundary_ids: impl IntoIterator<Item = usize>,
        condition: ScalarBoundaryCondition,
    ) -> Self {
        for id in boundary_ids {
            self.boundary_conditions.insert(id, condition);
        }
        self
    }

    pub fn velocity(&self) -> &SVector<f64, D> {
        &self.velocity
    }

    pub fn manufactured_solution(&self) -> &ManufacturedSolution<D, S> {
        &self.manufactured_solution
    }

    pub fn has_diffusion(&self) -> bool {
        self.diffusion_coefficient != 0.0
    }
}

impl<const D: usize, const S: usize> Physics<D, S> for ConvectionDiffusion<D, S> {
    fn convective_flux<T: Real>(&self, u: &State<T, S>) -> Flux<T, D, S> {
        u.map(|u_s| std::array::from_fn(|d| u_s * self.velocity[d]))
    }

    fn dissipative_flux<T: Real>(&self, _u: &State<T, S>, gradient: &Gradient<T, D, S>) -> Flux<T, D, S> {
        let kappa = self.diffusion_coefficient;
        gradient.map(|gradient_s| {
            std::array::from_fn(|d| {
                let mut flux = T::zero();
                for e in 0..D {
                    flux -= gradient_s[e] * (kappa * self.diffusion_tensor[(d, e)]);
                }
                flux
            })
        })
    }

    fn source_term<T: Real>(&self, x: &Point<f64, D>, _u: &State<T, S>) -> State<T, S> {
        let gradient = self.manufactured_solution.gradient(x);
        let hessian = self.manufactured_solution.hessian(x);
        std::array::from_fn(|s| {
            let convection: f64 = (0..D).map(|d| self.velocity[d] * gradient[s][d]).sum();
            let diffusion = self.diffusion_coefficient * self.diffusion_tensor.component_mul(&hessian[s]).sum();
            T::from_f64(convection - diffusion)
        })
    }

    fn max_convective_eigenvalue<T: Real>(&self, _u: &State<T, S>) -> T {
        T::from_f64(self.velocity.norm())
    }

    fn convective_eigenvalues<T: Real>(&self, _u: &State<T, S>, normal: &SVector<f64, D>) -> State<T, S> {
        [T::from_f64(self.velocity.dot(normal)); S]
    }

    fn roe_dissipation<T: Real>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S> {
        let speed = self.velocity.dot(normal).abs();
        std::array::from_fn(|s| (u_ext[s] - u_int[s]) * speed)
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
        let condition = self.boundary_conditions.get(boundary_id)?;
        let inflow = self.velocity.dot(normal) < -INFLOW_TOLERANCE;
        let boundary_value = || match condition {
            ScalarBoundaryCondition::Dirichlet(value) => [*value; S],
            _ => self.manufactured_solution.value(x),
        };
        Ok(scalar_boundary_values(
            condition,
            self.has_diffusion(),
            inflow,
            boundary_value,
            u_int,
            gradient_int,
        ))
    }
}
