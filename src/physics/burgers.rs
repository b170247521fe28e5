use crate::fad::Real;
use crate::physics::{
    scalar_boundary_values, BoundaryConditions, Flux, Gradient, ManufacturedSolution, Physics,
    ScalarBoundaryCondition, State, INFLOW_TOLERANCE,
};
use nalgebra::{Point, SVector};
use numeric_literals::replace_float_literals;

/// Multi-dimensional Burgers' equation, `∂u/∂t + Σ_d ∂(u²/2)/∂x_d - ν Δu = s(x)`.
#[derive(Debug, Clone)]
pub struct Burgers<const D: usize> {
    viscosity: f64,
    manufactured_solution: ManufacturedSolution<D, 1>,
    boundary_conditions: BoundaryConditions<ScalarBoundaryCondition>,
}

impl<const D: usize> Burgers<D> {
    pub fn inviscid() -> Self {
        Self::viscous(0.0)
    }

    pub fn viscous(viscosity: f64) -> Self {
        Self {
            viscosity,
            manufactured_solution: ManufacturedSolution::new(SVector::repeat(1.0), SVector::zeros()),
            boundary_conditions: BoundaryConditions::default(),
        }
    }

    pub fn with_manufactured_solution(self, manufactured_solution: ManufacturedSolution<D, 1>) -> Self {
        Self {
            manufactured_solution,
            ..self
        }
    }

    pub fn with_boundary_condition(mut self, boundary_id: usize, condition: ScalarBoundaryCondition) -> Self {
        self.boundary_conditions.insert(boundary_id, condition);
        self
    }

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

    pub fn manufactured_solution(&self) -> &ManufacturedSolution<D, 1> {
        &self.manufactured_solution
    }
}

impl<const D: usize> Physics<D, 1> for Burgers<D> {
    #[replace_float_literals(T::from_f64(literal))]
    fn convective_flux<T: Real>(&self, u: &State<T, 1>) -> Flux<T, D, 1> {
        [[0.5 * u[0] * u[0]; D]]
    }

    fn dissipative_flux<T: Real>(&self, _u: &State<T, 1>, gradient: &Gradient<T, D, 1>) -> Flux<T, D, 1> {
        [gradient[0].map(|g| -(g * self.viscosity))]
    }

    fn source_term<T: Real>(&self, x: &Point<f64, D>, _u: &State<T, 1>) -> State<T, 1> {
        let [u] = self.manufactured_solution.value(x);
        let [gradient] = self.manufactured_solution.gradient(x);
        let [hessian] = self.manufactured_solution.hessian(x);
        let convection: f64 = gradient.iter().map(|g| u * g).sum();
        [T::from_f64(convection - self.viscosity * hessian.trace())]
    }

    fn max_convective_eigenvalue<T: Real>(&self, u: &State<T, 1>) -> T {
        // The normal flux speed is u Σ_d n_d, which is bounded by |u| sqrt(D) for unit normals
        u[0].abs() * (D as f64).sqrt()
    }

    fn convective_eigenvalues<T: Real>(&self, u: &State<T, 1>, normal: &SVector<f64, D>) -> State<T, 1> {
        [u[0] * normal.sum()]
    }

    #[replace_float_literals(T::from_f64(literal))]
    fn roe_dissipation<T: Real>(
        &self,
        u_int: &State<T, 1>,
        u_ext: &State<T, 1>,
        normal: &SVector<f64, D>,
    ) -> State<T, 1> {
        let normal_sum: f64 = normal.sum();
        let speed = (0.5 * (u_int[0] + u_ext[0]) * normal_sum).abs();
        [speed * (u_ext[0] - u_int[0])]
    }

    fn has_boundary(&self, boundary_id: usize) -> bool {
        self.boundary_conditions.contains(boundary_id)
    }

    fn boundary_face_values<T: Real>(
        &self,
        boundary_id: usize,
        x: &Point<f64, D>,
        normal: &SVector<f64, D>,
        u_int: &State<T, 1>,
        gradient_int: &Gradient<T, D, 1>,
    ) -> eyre::Result<(State<T, 1>, Gradient<T, D, 1>)> {
        let condition = self.boundary_conditions.get(boundary_id)?;
        let inflow = u_int[0].value() * normal.sum() < -INFLOW_TOLERANCE;
        let boundary_value = || match condition {
            ScalarBoundaryCondition::Dirichlet(value) => [*value],
            _ => self.manufactured_solution.value(x),
        };
        Ok(scalar_boundary_values(
            condition,
            self.viscosity != 0.0,
            inflow,
            boundary_value,
            u_int,
            gradient_int,
        ))
    }
}
