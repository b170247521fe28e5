//! Numerical fluxes coupling adjacent discontinuous elements, and split-form flux registries.
//!
//! Convective numerical fluxes implement [`ConvectiveNumericalFlux`]. They must be
//!
//! - consistent: `evaluate_flux(u, u, n) = F(u) · n`,
//! - conservative: `evaluate_flux(a, b, n) = -evaluate_flux(b, a, -n)`.
//!
//! Dissipative numerical fluxes implement [`DissipativeNumericalFlux`]. They provide a shared
//! trace of the solution, from which the gradient coupling term is formed, and a penalty-stabilized
//! flux of the dissipative term.
//!
//! All methods are generic over the scalar type, so that fluxes can be differentiated.
use crate::fad::Real;
use crate::physics::{Gradient, Physics, State};
use nalgebra::SVector;

mod convective;
mod dissipative;
mod split_form;

pub use convective::*;
pub use dissipative::*;
pub use split_form::*;

pub trait ConvectiveNumericalFlux: Sync {
    /// Evaluates the numerical flux `F* · n` given the interior and exterior traces and the
    /// outward unit normal of the interior cell.
    fn evaluate_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>;

    fn name(&self) -> &'static str;
}

pub trait DissipativeNumericalFlux: Sync {
    /// The shared solution trace `u*` at a face.
    fn evaluate_solution_flux<T, const D: usize, const S: usize>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real;

    /// The penalty-stabilized dissipative flux `σ* · n`.
    ///
    /// On boundary faces (`is_boundary == true`), only the interior contribution of the physical
    /// dissipative flux is used, since the exterior gradient is a reconstruction.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_auxiliary_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        gradient_int: &Gradient<T, D, S>,
        gradient_ext: &Gradient<T, D, S>,
        normal: &SVector<f64, D>,
        penalty: f64,
        is_boundary: bool,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>;

    fn name(&self) -> &'static str;
}
