//! Assembly of the strong-form DG residual and its Jacobian.
//!
//! [`DgOperator`] bundles a physics model with convective and dissipative numerical fluxes and
//! a split-form registry. It exposes three families of routines, one per mesh entity:
//!
//! - cells ([`DgOperator::assemble_cell`]),
//! - boundary faces ([`DgOperator::assemble_boundary_face`]),
//! - interior faces ([`DgOperator::assemble_interior_face`]).
//!
//! Each routine comes in a *local* variant, which writes the local residual and local Jacobian
//! blocks into caller-provided buffers, and a scattering variant, which adds the local
//! contributions into a global residual vector and a [`JacobianAccumulator`].
//!
//! Jacobians are computed with forward-mode automatic differentiation. The const parameter `N`
//! of [`DgOperator`] is the derivative capacity of the dual numbers, and must be at least the
//! number of local unknowns of a cell (for cells and boundary faces) or of both cells sharing
//! a face (for interior faces).
use crate::fad::{self, Fad, Real};
use crate::flux::{
    ConvectiveFluxType, ConvectiveNumericalFlux, DissipativeFluxType, DissipativeNumericalFlux, SplitForm,
};
use crate::parameters::DgParameters;
use crate::physics::{Flux, Gradient, Physics, State};
use crate::space::{FluxBasis, VolumeValues};
use davenport::define_thread_local_workspace;
use eyre::ensure;
use log::warn;
use nalgebra::{DMatrix, DMatrixViewMut, DVectorViewMut};
use num::Zero;

mod boundary;
mod cell;
mod face;
mod global;
mod system;

pub use face::FaceJacobianBlocks;
pub use global::*;
pub use system::*;

define_thread_local_workspace!(LOCAL_WORKSPACE);
define_thread_local_workspace!(SCATTER_WORKSPACE);

/// Relative tolerance of the consistency check between quadrature weights and flux basis integrals.
const WEIGHT_CONSISTENCY_TOLERANCE: f64 = 1e-12;

/// Absolute tolerance used to decide whether the solution basis is collocated at the quadrature points.
const COLLOCATION_TOLERANCE: f64 = 1e-12;

/// Flags controlling a single assembly call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyFlags {
    /// Whether to compute the local Jacobian in addition to the residual.
    pub compute_jacobian: bool,
    /// Whether to evaluate the convective volume term in two-point split form.
    pub use_split_form: bool,
}

impl AssemblyFlags {
    pub fn residual_only() -> Self {
        Self::default()
    }

    pub fn with_jacobian(self) -> Self {
        Self {
            compute_jacobian: true,
            ..self
        }
    }

    pub fn with_split_form(self) -> Self {
        Self {
            use_split_form: true,
            ..self
        }
    }
}

/// Strong-form DG operator for a system of conservation laws with `S` state components in `D`
/// dimensions, computing Jacobians with `N`-capacity dual numbers.
///
/// The residual on a cell `K` for a test function `φ` is
///
/// ```text
/// R(φ) = -∫_K φ ∇·F_conv(u) + ∫_K ∇φ · F_diss(u, ∇u) + ∫_K φ s
///        - ∮_∂K φ (F*·n - F_conv(u)·n) - ∮_∂K φ σ*·n + ∮_∂K ∇φ · F_diss(u, (u* - u) ⊗ n),
/// ```
///
/// with the convective numerical flux `F*`, the solution trace `u*` and the auxiliary flux `σ*`
/// provided by the numerical fluxes.
#[derive(Debug, Clone)]
pub struct DgOperator<'a, P, C, V, F, const D: usize, const S: usize, const N: usize> {
    physics: &'a P,
    convective_flux: C,
    dissipative_flux: V,
    split_form: F,
    use_source_term: bool,
    penalty_scaling: f64,
}

impl<'a, P, C, V, F, const D: usize, const S: usize, const N: usize> DgOperator<'a, P, C, V, F, D, S, N>
where
    P: Physics<D, S>,
    C: ConvectiveNumericalFlux,
    V: DissipativeNumericalFlux,
    F: SplitForm<D, S>,
{
    pub fn new(physics: &'a P, convective_flux: C, dissipative_flux: V, split_form: F) -> Self {
        if split_form.num_pairs() == 0 {
            warn!("Split form '{}' has no flux pairs", split_form.name());
        }
        Self {
            physics,
            convective_flux,
            dissipative_flux,
            split_form,
            use_source_term: false,
            penalty_scaling: 1.0,
        }
    }

    /// Enables or disables the source term of the physics model.
    pub fn with_source_term(self, use_source_term: bool) -> Self {
        Self {
            use_source_term,
            ..self
        }
    }

    /// Sets the factor applied to the penalty parameters provided by a discretization.
    pub fn with_penalty_scaling(self, penalty_scaling: f64) -> Self {
        if penalty_scaling <= 0.0 {
            warn!("Non-positive penalty scaling {penalty_scaling} leads to an unstable dissipative discretization");
        }
        Self {
            penalty_scaling,
            ..self
        }
    }

    pub fn physics(&self) -> &'a P {
        self.physics
    }

    pub fn convective_flux(&self) -> &C {
        &self.convective_flux
    }

    pub fn dissipative_flux(&self) -> &V {
        &self.dissipative_flux
    }

    pub fn split_form(&self) -> &F {
        &self.split_form
    }

    pub fn uses_source_term(&self) -> bool {
        self.use_source_term
    }

    pub fn penalty_scaling(&self) -> f64 {
        self.penalty_scaling
    }

    fn check_jacobian_output(
        &self,
        flags: AssemblyFlags,
        shape: Option<(usize, usize)>,
        expected_shape: (usize, usize),
    ) -> eyre::Result<()> {
        ensure!(
            flags.compute_jacobian == shape.is_some(),
            "A Jacobian output must be provided if and only if the Jacobian is requested"
        );
        if let Some(shape) = shape {
            ensure!(
                shape == expected_shape,
                "Jacobian output has shape {shape:?}, expected {expected_shape:?}"
            );
            ensure!(
                expected_shape.1 <= N,
                "Number of local unknowns ({}) exceeds the derivative capacity ({N})",
                expected_shape.1
            );
        }
        Ok(())
    }
}

impl<'a, P, F, const D: usize, const S: usize, const N: usize>
    DgOperator<'a, P, ConvectiveFluxType, DissipativeFluxType, F, D, S, N>
where
    P: Physics<D, S>,
    F: SplitForm<D, S>,
{
    /// Constructs an operator with the numerical fluxes selected by the parameters.
    pub fn from_parameters(physics: &'a P, split_form: F, parameters: &DgParameters) -> eyre::Result<Self> {
        parameters.validate()?;
        Ok(Self::new(physics, parameters.conv_num_flux, parameters.diss_num_flux, split_form)
            .with_source_term(parameters.use_manufactured_source_term)
            .with_penalty_scaling(parameters.penalty_scaling))
    }
}

/// Checks the flux basis against the solution tables.
///
/// The integrals of the flux basis functions must agree with the quadrature weights, which holds
/// exactly when the flux nodes coincide with the points of an interpolatory quadrature rule.
fn check_flux_basis<const D: usize>(values: &VolumeValues<D>, flux_basis: &FluxBasis<D>) -> eyre::Result<()> {
    let nq = values.num_quadrature_points();
    ensure!(
        flux_basis.num_nodes() == nq,
        "Flux basis has {} nodes, but there are {nq} volume quadrature points",
        flux_basis.num_nodes()
    );
    for (d, derivatives) in flux_basis.derivatives.iter().enumerate() {
        ensure!(
            derivatives.shape() == (nq, nq),
            "Flux differentiation matrix for direction {d} has shape {:?}, expected {:?}",
            derivatives.shape(),
            (nq, nq)
        );
    }
    for (q, (w, integral)) in values.jxw.iter().zip(&flux_basis.integrals).enumerate() {
        ensure!(
            (w - integral).abs() <= WEIGHT_CONSISTENCY_TOLERANCE * w.abs().max(integral.abs()),
            "Quadrature weight {w:e} at point {q} does not match flux basis integral {integral:e}: \
             flux nodes are not the quadrature points"
        );
    }
    Ok(())
}

/// Checks that the solution basis is nodal at the volume quadrature points.
fn check_collocation<const D: usize>(values: &VolumeValues<D>) -> eyre::Result<()> {
    let (n, nq) = values.shape_values.shape();
    ensure!(
        n == nq,
        "Split form requires collocation, but there are {n} shape functions and {nq} quadrature points"
    );
    let deviation = (&values.shape_values - DMatrix::identity(n, n)).amax();
    ensure!(
        deviation <= COLLOCATION_TOLERANCE,
        "Split form requires the solution nodes to coincide with the quadrature points"
    );
    Ok(())
}

/// Dual-number buffers used by the local assembly routines.
struct LocalWorkspace<const D: usize, const S: usize, const N: usize> {
    coefficients: Vec<Fad<N>>,
    coefficients_ext: Vec<Fad<N>>,
    states: Vec<State<Fad<N>, S>>,
    states_ext: Vec<State<Fad<N>, S>>,
    gradients: Vec<Gradient<Fad<N>, D, S>>,
    gradients_ext: Vec<Gradient<Fad<N>, D, S>>,
    convective_fluxes: Vec<Flux<Fad<N>, D, S>>,
    dissipative_fluxes: Vec<Flux<Fad<N>, D, S>>,
    split_f: Vec<Flux<Fad<N>, D, S>>,
    split_g: Vec<Flux<Fad<N>, D, S>>,
    sources: Vec<State<Fad<N>, S>>,
    pointwise: Vec<Fad<N>>,
    residual: Vec<Fad<N>>,
    residual_ext: Vec<Fad<N>>,
}

impl<const D: usize, const S: usize, const N: usize> Default for LocalWorkspace<D, S, N> {
    fn default() -> Self {
        Self {
            coefficients: Vec::new(),
            coefficients_ext: Vec::new(),
            states: Vec::new(),
            states_ext: Vec::new(),
            gradients: Vec::new(),
            gradients_ext: Vec::new(),
            convective_fluxes: Vec::new(),
            dissipative_fluxes: Vec::new(),
            split_f: Vec::new(),
            split_g: Vec::new(),
            sources: Vec::new(),
            pointwise: Vec::new(),
            residual: Vec::new(),
            residual_ext: Vec::new(),
        }
    }
}

/// Seeds the local unknowns. Unknown `i` becomes variable `offset + i` if derivatives are
/// requested, and a constant otherwise.
fn seed_coefficients<const N: usize>(
    coefficients: &[f64],
    offset: usize,
    compute_jacobian: bool,
    seeded: &mut Vec<Fad<N>>,
) {
    seeded.clear();
    seeded.extend(coefficients.iter().enumerate().map(|(i, c)| {
        if compute_jacobian {
            fad::variable(*c, offset + i)
        } else {
            Fad::from_f64(*c)
        }
    }));
}

/// Interpolates states and gradients at every quadrature point of the given tables.
fn interpolate<const D: usize, const S: usize, const N: usize>(
    shape_values: &DMatrix<f64>,
    shape_gradients: &[DMatrix<f64>; D],
    coefficients: &[Fad<N>],
    states: &mut Vec<State<Fad<N>, S>>,
    gradients: &mut Vec<Gradient<Fad<N>, D, S>>,
) {
    let (n, nq) = shape_values.shape();
    assert_eq!(coefficients.len(), S * n, "Number of coefficients must match shape functions");
    states.clear();
    gradients.clear();
    for q in 0..nq {
        let mut u = [Fad::zero(); S];
        let mut gradient = [[Fad::zero(); D]; S];
        for a in 0..n {
            let phi = shape_values[(a, q)];
            for s in 0..S {
                let c = coefficients[S * a + s];
                u[s] += c * phi;
                for d in 0..D {
                    gradient[s][d] += c * shape_gradients[d][(a, q)];
                }
            }
        }
        states.push(u);
        gradients.push(gradient);
    }
}

/// Writes the values of the dual-number residual into `residual`, and derivatives
/// `offset..offset + ncols` into `jacobian` if provided.
fn extract_residual<const N: usize>(
    residual_ad: &[Fad<N>],
    residual: &mut DVectorViewMut<f64>,
    jacobian: Option<&mut DMatrixViewMut<f64>>,
    offset: usize,
) {
    assert_eq!(residual_ad.len(), residual.len());
    for (i, r) in residual_ad.iter().enumerate() {
        residual[i] = r.value();
    }
    if let Some(jacobian) = jacobian {
        extract_jacobian_block(residual_ad, jacobian, offset);
    }
}

fn extract_jacobian_block<const N: usize>(residual_ad: &[Fad<N>], jacobian: &mut DMatrixViewMut<f64>, offset: usize) {
    assert_eq!(jacobian.nrows(), residual_ad.len());
    for (i, r) in residual_ad.iter().enumerate() {
        let derivatives = fad::derivatives(r);
        for k in 0..jacobian.ncols() {
            jacobian[(i, k)] = derivatives[offset + k];
        }
    }
}

/// Subtracts the convective volume term from the local residual.
///
/// For every direction `d` and state component `s`, the derivative of the flux interpolant
/// `Σ_j D_d(q, j) g_j[s][d]` is integrated against every test function. Without split pairs,
/// `g` is the convective flux and the result is the strong-form term `∫ φ_a ∂_d F`. With split
/// pairs `(f, α)`, the integral for test function `a` is additionally scaled by `α f_a[s][d]`,
/// where `f_a` is the value of `f` at the node of shape function `a`.
fn subtract_flux_divergence<const D: usize, const S: usize, const N: usize>(
    flux_basis: &FluxBasis<D>,
    shape_values: &DMatrix<f64>,
    jxw: &[f64],
    g: &[Flux<Fad<N>, D, S>],
    split: Option<(&[Flux<Fad<N>, D, S>], f64)>,
    buffer: &mut Vec<Fad<N>>,
    residual: &mut [Fad<N>],
) {
    let (n, nq) = shape_values.shape();
    debug_assert_eq!(g.len(), nq);
    for d in 0..D {
        let derivatives = &flux_basis.derivatives[d];
        for s in 0..S {
            buffer.clear();
            buffer.extend((0..nq).map(|q| {
                let mut divergence = Fad::zero();
                for (j, g_j) in g.iter().enumerate() {
                    divergence += g_j[s][d] * derivatives[(q, j)];
                }
                divergence * jxw[q]
            }));

            for a in 0..n {
                let mut integral = Fad::zero();
                for (q, b) in buffer.iter().enumerate() {
                    integral += *b * shape_values[(a, q)];
                }
                match split {
                    None => residual[S * a + s] -= integral,
                    Some((f, alpha)) => residual[S * a + s] -= integral * f[a][s][d] * alpha,
                }
            }
        }
    }
}

/// Checks that the coefficient and residual buffers match a table with `num_shapes` shape functions.
fn check_local_sizes<const S: usize>(
    num_shapes: usize,
    coefficients: &[f64],
    residual: &DVectorViewMut<f64>,
) -> eyre::Result<()> {
    let n = S * num_shapes;
    ensure!(
        coefficients.len() == n,
        "Got {} local coefficients, but the tables describe {n} local unknowns",
        coefficients.len()
    );
    ensure!(
        residual.len() == n,
        "Residual output has length {}, expected {n}",
        residual.len()
    );
    Ok(())
}
