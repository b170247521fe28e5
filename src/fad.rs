//! Forward-mode automatic differentiation.
//!
//! [`Fad`] is a dual number from [`num_dual`] carrying a value together with `N` partial
//! derivatives in a fixed-size vector. Generic numerical code is written against the [`Real`]
//! trait, which is implemented both for `f64` and for [`Fad`], so that the same routine can be
//! evaluated with plain floating point numbers or with dual numbers to obtain exact derivatives.
use nalgebra::{Const, SVector, U1};
use num::{One, Zero};
use num_dual::{Derivative, DualNum, DualSVec64};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A dual number with `N` partial derivatives.
pub type Fad<const N: usize> = DualSVec64<N>;

/// Scalar type used by generic physics and assembly routines.
pub trait Real:
    Copy
    + Debug
    + Send
    + Sync
    + 'static
    + PartialEq
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign<f64>
    + SubAssign<f64>
    + MulAssign<f64>
{
    /// Constructs a constant, i.e. a value with vanishing derivatives.
    fn from_f64(value: f64) -> Self;

    /// The value, with any derivative information discarded.
    fn value(&self) -> f64;

    fn sqrt(self) -> Self;

    fn abs(self) -> Self;

    fn powi(self, n: i32) -> Self;

    /// The larger of the two values. Derivatives follow the selected argument.
    fn max(self, other: Self) -> Self;

    /// The smaller of the two values. Derivatives follow the selected argument.
    fn min(self, other: Self) -> Self;
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        f64::max(self, other)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        f64::min(self, other)
    }
}

impl<const N: usize> Real for Fad<N> {
    #[inline]
    fn from_f64(value: f64) -> Self {
        Fad::from_re(value)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.re
    }

    #[inline]
    fn sqrt(self) -> Self {
        <Self as DualNum<f64>>::sqrt(&self)
    }

    #[inline]
    fn abs(self) -> Self {
        if self.re < 0.0 {
            -self
        } else {
            self
        }
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        <Self as DualNum<f64>>::powi(&self, n)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        if other.re > self.re {
            other
        } else {
            self
        }
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if other.re < self.re {
            other
        } else {
            self
        }
    }
}

/// An independent variable with unit derivative in direction `index`.
///
/// # Panics
///
/// Panics if `index >= N`.
#[inline]
pub fn variable<const N: usize>(value: f64, index: usize) -> Fad<N> {
    assert!(index < N, "Variable index ({index}) exceeds derivative capacity ({N})");
    Fad::new(value, Derivative::derivative_generic(Const::<N>, U1, index))
}

/// All `N` partial derivatives of `x`. Constants have vanishing derivatives.
#[inline]
pub fn derivatives<const N: usize>(x: &Fad<N>) -> SVector<f64, N> {
    x.eps.clone().unwrap_generic(Const::<N>, U1)
}
