use eyre::ensure;
use itertools::izip;
use nalgebra::DMatrix;

/// One-dimensional Lagrange basis on an arbitrary set of distinct nodes.
///
/// Basis function `j` equals one at node `j` and zero at every other node. Evaluation uses the
/// first (modified) barycentric form `ℓ_j(x) = ℓ(x) w_j / (x - x_j)` with
/// `ℓ(x) = Π_k (x - x_k)` and the barycentric weights `w_j = 1 / Π_{k≠j} (x_j - x_k)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeBasis1d {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl LagrangeBasis1d {
    pub fn new(nodes: Vec<f64>) -> eyre::Result<Self> {
        ensure!(!nodes.is_empty(), "Lagrange basis requires at least one node");
        for (i, xi) in nodes.iter().enumerate() {
            for xj in &nodes[i + 1..] {
                ensure!(xi != xj, "Lagrange nodes must be distinct, but {xi} appears twice");
            }
        }
        let weights = nodes
            .iter()
            .enumerate()
            .map(|(j, xj)| {
                let product: f64 = nodes
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k != j)
                    .map(|(_, xk)| xj - xk)
                    .product();
                1.0 / product
            })
            .collect();
        Ok(Self { nodes, weights })
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn barycentric_weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn num_functions(&self) -> usize {
        self.nodes.len()
    }

    fn node_index(&self, x: f64) -> Option<usize> {
        self.nodes.iter().position(|xi| *xi == x)
    }

    /// Evaluates all basis functions at `x`.
    ///
    /// # Panics
    ///
    /// Panics if the output length does not match the number of basis functions.
    pub fn populate_values(&self, x: f64, values: &mut [f64]) {
        assert_eq!(values.len(), self.nodes.len(), "Output length must match number of basis functions");
        if let Some(i) = self.node_index(x) {
            values.fill(0.0);
            values[i] = 1.0;
            return;
        }
        let node_polynomial: f64 = self.nodes.iter().map(|xk| x - xk).product();
        for (value, xj, wj) in izip!(values.iter_mut(), &self.nodes, &self.weights) {
            *value = node_polynomial * wj / (x - xj);
        }
    }

    /// Evaluates the derivatives of all basis functions at `x`.
    ///
    /// # Panics
    ///
    /// Panics if the output length does not match the number of basis functions.
    pub fn populate_derivatives(&self, x: f64, derivatives: &mut [f64]) {
        assert_eq!(
            derivatives.len(),
            self.nodes.len(),
            "Output length must match number of basis functions"
        );
        if let Some(i) = self.node_index(x) {
            // ℓ_j'(x_i) = (w_j / w_i) / (x_i - x_j) for j ≠ i, and the diagonal makes rows sum to zero
            let mut diagonal = 0.0;
            for (j, derivative) in derivatives.iter_mut().enumerate() {
                if j != i {
                    *derivative = self.weights[j] / self.weights[i] / (x - self.nodes[j]);
                    diagonal -= *derivative;
                }
            }
            derivatives[i] = diagonal;
            return;
        }
        // ℓ_j'(x) = ℓ_j(x) Σ_{k≠j} 1 / (x - x_k)
        self.populate_values(x, derivatives);
        for (j, derivative) in derivatives.iter_mut().enumerate() {
            let inverse_sum: f64 = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(k, _)| *k != j)
                .map(|(_, xk)| 1.0 / (x - xk))
                .sum();
            *derivative *= inverse_sum;
        }
    }

    /// Values at the given points, as a `(function, point)` matrix.
    pub fn values_at(&self, points: &[f64]) -> DMatrix<f64> {
        let mut table = DMatrix::zeros(self.num_functions(), points.len());
        let mut buffer = vec![0.0; self.num_functions()];
        for (q, x) in points.iter().enumerate() {
            self.populate_values(*x, &mut buffer);
            table.column_mut(q).copy_from_slice(&buffer);
        }
        table
    }

    /// Derivatives at the given points, as a `(function, point)` matrix.
    pub fn derivatives_at(&self, points: &[f64]) -> DMatrix<f64> {
        let mut table = DMatrix::zeros(self.num_functions(), points.len());
        let mut buffer = vec![0.0; self.num_functions()];
        for (q, x) in points.iter().enumerate() {
            self.populate_derivatives(*x, &mut buffer);
            table.column_mut(q).copy_from_slice(&buffer);
        }
        table
    }

    /// The differentiation matrix with entries `(q, j) = ℓ_j'(x_q)`.
    ///
    /// Applied to the nodal values of a polynomial of degree at most `n - 1`, the matrix
    /// returns the exact derivative at the given points.
    pub fn differentiation_matrix(&self, points: &[f64]) -> DMatrix<f64> {
        self.derivatives_at(points).transpose()
    }
}
