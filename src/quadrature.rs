//! Gauss-Lobatto quadrature on the one-dimensional reference interval `[-1, 1]`.
//!
//! Gauss rules are taken from `fenris-quadrature`. Higher-dimensional rules on the reference box
//! are formed as tensor products by the discretization in [`space`](crate::space).
use std::f64::consts::PI;

/// A one-dimensional quadrature rule, stored as `(weights, points)` with points in ascending order.
pub type Rule1d = (Vec<f64>, Vec<f64>);

const NEWTON_TOLERANCE: f64 = 1e-15;
const NEWTON_MAX_ITERATIONS: usize = 100;

/// Value, first and second derivative of the Legendre polynomial `p_n` at `x`.
///
/// The derivatives are carried through the three-term recurrences
/// `p'_m = p'_{m - 2} + (2m - 1) p_{m - 1}` and `p''_m = p''_{m - 2} + (2m - 1) p'_{m - 1}`,
/// which stay regular on the closed interval.
fn legendre(n: usize, x: f64) -> [f64; 3] {
    // [p, p', p''] of degree m - 1 and m - 2
    let mut previous = [1.0, 0.0, 0.0];
    let mut before_previous = [0.0; 3];
    for m in 1..=n {
        let m = m as f64;
        let current = [
            ((2.0 * m - 1.0) * x * previous[0] - (m - 1.0) * before_previous[0]) / m,
            before_previous[1] + (2.0 * m - 1.0) * previous[0],
            before_previous[2] + (2.0 * m - 1.0) * previous[1],
        ];
        before_previous = previous;
        previous = current;
    }
    previous
}

/// Gauss-Lobatto quadrature for the reference interval [-1, 1].
///
/// The rule contains both endpoints of the interval. The interior points are the roots of
/// `p'_{n - 1}`, where `p_{n - 1}` is the Legendre polynomial of degree `n - 1`.
/// Given `n` points, the rule integrates polynomials of order up to `2 n - 3` exactly.
///
/// # Panics
///
/// Panics if fewer than two points are requested.
pub fn gauss_lobatto(num_points: usize) -> Rule1d {
    let n = num_points;
    assert!(n >= 2, "Gauss-Lobatto rules require at least two points");

    let degree = n - 1;
    let endpoint_weight = 2.0 / ((n * degree) as f64);
    let mut points = vec![-1.0; n];
    let mut weights = vec![endpoint_weight; n];
    points[n - 1] = 1.0;

    // Interior roots of the left half, the right half follows by symmetry
    for i in 1..=degree / 2 {
        // Chebyshev-Gauss-Lobatto nodes are good initial guesses
        let mut x = -(PI * i as f64 / degree as f64).cos();
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let [_, dp, ddp] = legendre(degree, x);
            let dx = -dp / ddp;
            x += dx;
            if dx.abs() <= NEWTON_TOLERANCE {
                break;
            }
        }

        let [p, _, _] = legendre(degree, x);
        let weight = endpoint_weight / (p * p);
        points[i] = x;
        weights[i] = weight;
        points[n - 1 - i] = -x;
        weights[n - 1 - i] = weight;
    }

    // The midpoint of odd rules is an exact root
    if n % 2 == 1 {
        let [p, _, _] = legendre(degree, 0.0);
        points[n / 2] = 0.0;
        weights[n / 2] = endpoint_weight / (p * p);
    }

    (weights, points)
}
