use crate::fad::{self, Fad, Real};
use crate::physics::{Euler, Flux, Physics, State};
use eyre::ensure;

/// A registry of split-flux pairs `(f_k, g_k, α_k)`.
///
/// The split form replaces the strong-form divergence of the convective flux at collocation
/// node `m` by `Σ_k α_k f_k(u_m) Σ_j D_mj g_k(u_j)` for every direction and state component,
/// where `D` is the differentiation matrix. For smooth solutions this must reproduce the
/// divergence of the physical flux, which requires
/// `Σ_k α_k f_k(u) ∂g_k/∂u = ∂F/∂u`
/// (see [`split_form_consistency_error`]).
///
/// Both `f_k` and `g_k` return one value per state component and direction, in the same
/// `[s][d]` layout as a flux.
pub trait SplitForm<const D: usize, const S: usize>: Sync {
    fn num_pairs(&self) -> usize;

    fn alpha(&self, pair: usize) -> f64;

    fn f<T: Real, P: Physics<D, S>>(&self, physics: &P, pair: usize, u: &State<T, S>) -> Flux<T, D, S>;

    fn g<T: Real, P: Physics<D, S>>(&self, physics: &P, pair: usize, u: &State<T, S>) -> Flux<T, D, S>;

    fn name(&self) -> &'static str;
}

/// The identity split, `f ≡ 1`, `g = F`, `α = 1`.
///
/// With this registry the split form reduces to the standard strong form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardSplitForm;

impl<const D: usize, const S: usize> SplitForm<D, S> for StandardSplitForm {
    fn num_pairs(&self) -> usize {
        1
    }

    fn alpha(&self, _pair: usize) -> f64 {
        1.0
    }

    fn f<T: Real, P: Physics<D, S>>(&self, _physics: &P, _pair: usize, _u: &State<T, S>) -> Flux<T, D, S> {
        [[T::one(); D]; S]
    }

    fn g<T: Real, P: Physics<D, S>>(&self, physics: &P, _pair: usize, u: &State<T, S>) -> Flux<T, D, S> {
        physics.convective_flux(u)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Energy-stable split form of Burgers' equation,
/// `∂(u²/2) = ⅓ ∂(u²) + ⅓ u ∂u`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurgersSplitForm;

impl<const D: usize> SplitForm<D, 1> for BurgersSplitForm {
    fn num_pairs(&self) -> usize {
        2
    }

    fn alpha(&self, _pair: usize) -> f64 {
        1.0 / 3.0
    }

    fn f<T: Real, P: Physics<D, 1>>(&self, _physics: &P, pair: usize, u: &State<T, 1>) -> Flux<T, D, 1> {
        match pair {
            0 => [[T::one(); D]],
            _ => [[u[0]; D]],
        }
    }

    fn g<T: Real, P: Physics<D, 1>>(&self, _physics: &P, pair: usize, u: &State<T, 1>) -> Flux<T, D, 1> {
        match pair {
            0 => [[u[0] * u[0]; D]],
            _ => [[u[0]; D]],
        }
    }

    fn name(&self) -> &'static str {
        "Burgers energy split"
    }
}

/// Kinetic-energy preserving split form of the Euler equations due to Ducros et al.
///
/// With `φ = (ρ, ρv, E + p)`, the advective part of every flux component is split as
/// `∂(φ v_d) = ½ ∂(φ v_d) + ½ φ ∂v_d + ½ v_d ∂φ`, while the pressure gradient in the momentum
/// equations is kept in conservative form.
#[derive(Debug, Clone, Copy)]
pub struct DucrosSplitForm<'a, const D: usize, const S: usize> {
    euler: &'a Euler<D, S>,
}

impl<'a, const D: usize, const S: usize> DucrosSplitForm<'a, D, S> {
    pub fn new(euler: &'a Euler<D, S>) -> Self {
        Self { euler }
    }

    fn advected<T: Real>(&self, u: &State<T, S>) -> State<T, S> {
        let mut phi = *u;
        phi[S - 1] += self.euler.pressure(u);
        phi
    }
}

impl<'a, const D: usize, const S: usize> SplitForm<D, S> for DucrosSplitForm<'a, D, S> {
    fn num_pairs(&self) -> usize {
        4
    }

    fn alpha(&self, pair: usize) -> f64 {
        match pair {
            0..=2 => 0.5,
            _ => 1.0,
        }
    }

    fn f<T: Real, P: Physics<D, S>>(&self, _physics: &P, pair: usize, u: &State<T, S>) -> Flux<T, D, S> {
        match pair {
            1 => self.advected(u).map(|phi| [phi; D]),
            2 => [self.euler.velocity(u); S],
            _ => [[T::one(); D]; S],
        }
    }

    fn g<T: Real, P: Physics<D, S>>(&self, _physics: &P, pair: usize, u: &State<T, S>) -> Flux<T, D, S> {
        let velocity = self.euler.velocity(u);
        match pair {
            0 => self.advected(u).map(|phi| velocity.map(|v| phi * v)),
            1 => [velocity; S],
            2 => self.advected(u).map(|phi| [phi; D]),
            _ => {
                let pressure = self.euler.pressure(u);
                let mut g = [[T::zero(); D]; S];
                for d in 0..D {
                    g[1 + d][d] = pressure;
                }
                g
            }
        }
    }

    fn name(&self) -> &'static str {
        "Ducros kinetic energy preserving"
    }
}

/// The largest deviation between `Σ_k α_k f_k(u) ∂g_k/∂u` and the flux Jacobian `∂F/∂u` at the
/// given state.
///
/// Derivatives are computed with forward-mode AD.
pub fn split_form_consistency_error<SF, P, const D: usize, const S: usize>(
    split_form: &SF,
    physics: &P,
    u: &State<f64, S>,
) -> f64
where
    SF: SplitForm<D, S>,
    P: Physics<D, S>,
{
    let u_ad: [Fad<S>; S] = std::array::from_fn(|k| fad::variable(u[k], k));
    let flux = physics.convective_flux(&u_ad);

    let mut split_jacobian = [[[0.0; S]; D]; S];
    for pair in 0..split_form.num_pairs() {
        let alpha = split_form.alpha(pair);
        let f = split_form.f(physics, pair, u);
        let g = split_form.g(physics, pair, &u_ad);
        for s in 0..S {
            for d in 0..D {
                let dg = fad::derivatives(&g[s][d]);
                for k in 0..S {
                    split_jacobian[s][d][k] += alpha * f[s][d] * dg[k];
                }
            }
        }
    }

    let mut max_error: f64 = 0.0;
    for s in 0..S {
        for d in 0..D {
            let dflux = fad::derivatives(&flux[s][d]);
            for k in 0..S {
                max_error = max_error.max((split_jacobian[s][d][k] - dflux[k]).abs());
            }
        }
    }
    max_error
}

/// Checks that the split form is consistent with the physical flux at the given state.
pub fn check_split_form_consistency<SF, P, const D: usize, const S: usize>(
    split_form: &SF,
    physics: &P,
    u: &State<f64, S>,
    tolerance: f64,
) -> eyre::Result<()>
where
    SF: SplitForm<D, S>,
    P: Physics<D, S>,
{
    let error = split_form_consistency_error(split_form, physics, u);
    ensure!(
        error <= tolerance,
        "Split form '{}' is inconsistent with the physical flux: deviation {error:e} exceeds tolerance {tolerance:e}",
        split_form.name()
    );
    Ok(())
}
