use crate::fad::Real;
use crate::flux::ConvectiveNumericalFlux;
use crate::physics::{flux_dot_normal, Physics, State};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Average of the normal fluxes of both traces, `½ (F(u_int) + F(u_ext)) · n`.
fn central_flux<T, P, const D: usize, const S: usize>(
    physics: &P,
    u_int: &State<T, S>,
    u_ext: &State<T, S>,
    normal: &SVector<f64, D>,
) -> State<T, S>
where
    T: Real,
    P: Physics<D, S>,
{
    let flux_int = flux_dot_normal(&physics.convective_flux(u_int), normal);
    let flux_ext = flux_dot_normal(&physics.convective_flux(u_ext), normal);
    std::array::from_fn(|s| (flux_int[s] + flux_ext[s]) * 0.5)
}

/// Local Lax-Friedrichs (Rusanov) flux.
///
/// `F* = ½ (F(u_int) + F(u_ext)) · n - ½ λ_max (u_ext - u_int)`, where `λ_max` is the larger
/// of the maximum convective eigenvalues of the two traces. For scalar linear advection this is
/// the upwind flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaxFriedrichs;

impl ConvectiveNumericalFlux for LaxFriedrichs {
    fn evaluate_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>,
    {
        let average = central_flux(physics, u_int, u_ext, normal);
        let max_eigenvalue = physics
            .max_convective_eigenvalue(u_int)
            .max(physics.max_convective_eigenvalue(u_ext));
        std::array::from_fn(|s| average[s] - max_eigenvalue * (u_ext[s] - u_int[s]) * 0.5)
    }

    fn name(&self) -> &'static str {
        "Lax-Friedrichs"
    }
}

/// Roe-type flux, `F* = ½ (F(u_int) + F(u_ext)) · n - ½ |A| (u_ext - u_int)`.
///
/// The upwind term is provided by [`Physics::roe_dissipation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roe;

impl ConvectiveNumericalFlux for Roe {
    fn evaluate_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>,
    {
        let average = central_flux(physics, u_int, u_ext, normal);
        let dissipation = physics.roe_dissipation(u_int, u_ext, normal);
        std::array::from_fn(|s| average[s] - dissipation[s] * 0.5)
    }

    fn name(&self) -> &'static str {
        "Roe"
    }
}

/// The non-dissipative central flux `½ (F(u_int) + F(u_ext)) · n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Central;

impl ConvectiveNumericalFlux for Central {
    fn evaluate_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>,
    {
        central_flux(physics, u_int, u_ext, normal)
    }

    fn name(&self) -> &'static str {
        "central"
    }
}

/// Runtime selection of a convective numerical flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvectiveFluxType {
    #[default]
    LaxFriedrichs,
    Roe,
    Central,
}

impl ConvectiveNumericalFlux for ConvectiveFluxType {
    fn evaluate_flux<T, P, const D: usize, const S: usize>(
        &self,
        physics: &P,
        u_int: &State<T, S>,
        u_ext: &State<T, S>,
        normal: &SVector<f64, D>,
    ) -> State<T, S>
    where
        T: Real,
        P: Physics<D, S>,
    {
        match self {
            Self::LaxFriedrichs => LaxFriedrichs.evaluate_flux(physics, u_int, u_ext, normal),
            Self::Roe => Roe.evaluate_flux(physics, u_int, u_ext, normal),
            Self::Central => Central.evaluate_flux(physics, u_int, u_ext, normal),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::LaxFriedrichs => LaxFriedrichs.name(),
            Self::Roe => Roe.name(),
            Self::Central => Central.name(),
        }
    }
}
