use crate::fad::Real;
use crate::flux::DissipativeNumericalFlux;
use crate::physics::{flux_dot_normal, Gradient, Physics, State};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Symmetric interior penalty (SIPG) flux for the dissipative terms.
///
/// The solution trace is the average `u* = ½ (u_int + u_ext)`. With the jump
/// `[[u]] = (u_int - u_ext) ⊗ n`, the auxiliary flux is
/// `σ* · n = ({F_d(u, ∇u)} - τ {F_d(u, [[u]])}) · n`,
/// where `{·}` averages the two traces and `τ` is the penalty parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymmetricInteriorPenalty;

impl DissipativeNumericalFlux for SymmetricInteriorPenalty {
    fn evaluate_solution_flux<T, const D: usize, const S: usize>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        _normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
    {
        std::array::from_fn(|s| (u_int[s] + u_ext[s]) * 0.5)
    }

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
        P: Physics<D, S>,
    {
        let jump: Gradient<T, D, S> = std::array::from_fn(|s| std::array::from_fn(|d| (u_int[s] - u_ext[s]) * normal[d]));

        let flux_int = flux_dot_normal(&physics.dissipative_flux(u_int, gradient_int), normal);
        let jump_flux_int = flux_dot_normal(&physics.dissipative_flux(u_int, &jump), normal);
        if is_boundary {
            return std::array::from_fn(|s| flux_int[s] - jump_flux_int[s] * penalty);
        }

        let flux_ext = flux_dot_normal(&physics.dissipative_flux(u_ext, gradient_ext), normal);
        let jump_flux_ext = flux_dot_normal(&physics.dissipative_flux(u_ext, &jump), normal);
        std::array::from_fn(|s| {
            let average = (flux_int[s] + flux_ext[s]) * 0.5;
            let jump_average = (jump_flux_int[s] + jump_flux_ext[s]) * 0.5;
            average - jump_average * penalty
        })
    }

    fn name(&self) -> &'static str {
        "symmetric interior penalty"
    }
}

/// Runtime selection of a dissipative numerical flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DissipativeFluxType {
    #[default]
    SymmetricInternalPenalty,
}

impl DissipativeNumericalFlux for DissipativeFluxType {
    fn evaluate_solution_flux<T, const D: usize, const S: usize>(
        &self,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
    {
        match self {
            Self::SymmetricInternalPenalty => SymmetricInteriorPenalty.evaluate_solution_flux(u_int, u_ext, normal),
        }
    }

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
        P: Physics<D, S>,
    {
        match self {
            Self::SymmetricInternalPenalty => SymmetricInteriorPenalty.evaluate_auxiliary_flux(
                physics,
                u_int,
                u_ext,
                gradient_int,
                gradient_ext,
                normal,
                penalty,
                is_boundary,
            ),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::SymmetricInternalPenalty => SymmetricInteriorPenalty.name(),
        }
    }
}
