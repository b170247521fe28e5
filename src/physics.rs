//! Physics models: pointwise flux, source and boundary laws.
//!
//! Every method of [`Physics`] is generic over the scalar type, so that the assemblers can
//! evaluate the same law with plain `f64` values or with [`Fad`](crate::fad::Fad) dual numbers.
use crate::fad::Real;
use eyre::eyre;
use nalgebra::{Point, SVector};
use rustc_hash::FxHashMap;

mod burgers;
mod convection_diffusion;
mod euler;
mod manufactured;
mod navier_stokes;

pub use burgers::*;
pub use convection_diffusion::*;
pub use euler::*;
pub use manufactured::*;
pub use navier_stokes::*;

/// Conserved variables at a point.
pub type State<T, const S: usize> = [T; S];

/// Spatial gradient of each state component. Entry `[s][d]` is `∂u_s / ∂x_d`.
pub type Gradient<T, const D: usize, const S: usize> = [[T; D]; S];

/// Flux tensor. Entry `[s][d]` is the flux of state component `s` in direction `d`.
pub type Flux<T, const D: usize, const S: usize> = [[T; D]; S];

/// Pointwise laws of a system of conservation laws
/// `∂u/∂t + ∇·F_conv(u) + ∇·F_diss(u, ∇u) = s(x)` in `D` dimensions with `S` state components.
pub trait Physics<const D: usize, const S: usize>: Sync {
    fn convective_flux<T: Real>(&self, u: &State<T, S>) -> Flux<T, D, S>;

    fn dissipative_flux<T: Real>(&self, u: &State<T, S>, gradient: &Gradient<T, D, S>) -> Flux<T, D, S>;

    fn source_term<T: Real>(&self, x: &Point<f64, D>, u: &State<T, S>) -> State<T, S>;

    /// The largest absolute eigenvalue of the convective flux Jacobian in any direction.
    fn max_convective_eigenvalue<T: Real>(&self, u: &State<T, S>) -> T;

    /// Eigenvalues of the normal convective flux Jacobian `∂(F_conv · n)/∂u`, in ascending order
    /// for unit normals.
    fn convective_eigenvalues<T: Real>(&self, u: &State<T, S>, normal: &SVector<f64, D>) -> State<T, S>;

    /// Upwind dissipation `|A(u_int, u_ext)| (u_ext - u_int)` of a Roe-type linearization
    /// of the normal flux Jacobian.
    ///
    /// Must be odd under exchanging the states together with negating the normal.
    fn roe_dissipation<T: Real>(&self, u_int: &State<T, S>, u_ext: &State<T, S>, normal: &SVector<f64, D>)
        -> State<T, S>;

    /// Whether the model knows how to reconstruct exterior states on the given boundary.
    fn has_boundary(&self, boundary_id: usize) -> bool;

    /// Reconstructs the exterior (ghost) state and gradient at a boundary point.
    ///
    /// Returns an error if the boundary id is not known to the model.
    fn boundary_face_values<T: Real>(
        &self,
        boundary_id: usize,
        x: &Point<f64, D>,
        normal: &SVector<f64, D>,
        u_int: &State<T, S>,
        gradient_int: &Gradient<T, D, S>,
    ) -> eyre::Result<(State<T, S>, Gradient<T, D, S>)>;
}

/// Contracts a flux with a normal vector, returning `F · n` for every state component.
pub fn flux_dot_normal<T: Real, const D: usize, const S: usize>(
    flux: &Flux<T, D, S>,
    normal: &SVector<f64, D>,
) -> State<T, S> {
    let mut result = [T::zero(); S];
    for (r, f) in result.iter_mut().zip(flux) {
        for d in 0..D {
            *r += f[d] * normal[d];
        }
    }
    result
}

/// Boundary conditions of a physics model, keyed by boundary id.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConditions<B> {
    conditions: FxHashMap<usize, B>,
}

impl<B> Default for BoundaryConditions<B> {
    fn default() -> Self {
        Self {
            conditions: FxHashMap::default(),
        }
    }
}

impl<B> BoundaryConditions<B> {
    /// Sets the boundary condition on the given boundary, replacing any previous condition.
    pub fn insert(&mut self, boundary_id: usize, condition: B) {
        self.conditions.insert(boundary_id, condition);
    }

    pub fn get(&self, boundary_id: usize) -> eyre::Result<&B> {
        self.conditions
            .get(&boundary_id)
            .ok_or_else(|| eyre!("No boundary condition registered for boundary id {boundary_id}"))
    }

    pub fn contains(&self, boundary_id: usize) -> bool {
        self.conditions.contains_key(&boundary_id)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Boundary conditions for scalar models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarBoundaryCondition {
    /// Weakly imposed value of the manufactured solution.
    ///
    /// For purely convective models the value is only imposed on inflow, and the interior
    /// state is extrapolated on outflow.
    ManufacturedSolution,
    /// Weakly imposed constant value, with the same inflow rule as [`Self::ManufacturedSolution`].
    Dirichlet(f64),
    /// The exterior state equals the interior state.
    Extrapolation,
}

/// Tolerance used to classify a boundary point as inflow, `a · n < -INFLOW_TOLERANCE`.
pub(crate) const INFLOW_TOLERANCE: f64 = 1e-14;

/// Shared boundary reconstruction for scalar models and decoupled systems of them.
///
/// `inflow` must report whether the characteristic speed points into the domain.
pub(crate) fn scalar_boundary_values<T: Real, const D: usize, const S: usize>(
    condition: &ScalarBoundaryCondition,
    has_diffusion: bool,
    inflow: bool,
    boundary_value: impl FnOnce() -> [f64; S],
    u_int: &State<T, S>,
    gradient_int: &Gradient<T, D, S>,
) -> (State<T, S>, Gradient<T, D, S>) {
    let impose = has_diffusion || inflow;
    let u_ext = match condition {
        ScalarBoundaryCondition::Extrapolation => *u_int,
        ScalarBoundaryCondition::ManufacturedSolution | ScalarBoundaryCondition::Dirichlet(_) if impose => {
            boundary_value().map(T::from_f64)
        }
        _ => *u_int,
    };
    (u_ext, *gradient_int)
}
