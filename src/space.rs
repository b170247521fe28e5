//! Basis and quadrature tables consumed by the DG assemblers.
//!
//! The assemblers in [`assembly`](crate::assembly) do not know anything about meshes or
//! reference elements. All they see are tables of *scalar* shape function values and physical
//! gradients evaluated at quadrature points, together with quadrature weights (already
//! multiplied by the Jacobian determinant) and, for faces, outward unit normals.
//!
//! Systems with `S` state components use the same scalar shape functions for every component.
//! Local degrees of freedom are ordered node-major: local index `i` belongs to shape
//! function `i / S` and state component `i % S`.
use eyre::ensure;
use nalgebra::{DMatrix, Point, SVector};

mod lagrange;
mod structured;

pub use lagrange::*;
pub use structured::*;

/// Solution basis tables on the volume quadrature points of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeValues<const D: usize> {
    /// Entry `(a, q)` is the value of shape function `a` at quadrature point `q`.
    pub shape_values: DMatrix<f64>,
    /// Entry `(a, q)` of matrix `d` is the physical derivative `∂φ_a / ∂x_d` at point `q`.
    pub shape_gradients: [DMatrix<f64>; D],
    /// Quadrature weights multiplied by the Jacobian determinant.
    pub jxw: Vec<f64>,
    /// Physical quadrature points.
    pub points: Vec<Point<f64, D>>,
}

impl<const D: usize> Default for VolumeValues<D> {
    fn default() -> Self {
        Self {
            shape_values: DMatrix::zeros(0, 0),
            shape_gradients: std::array::from_fn(|_| DMatrix::zeros(0, 0)),
            jxw: Vec::new(),
            points: Vec::new(),
        }
    }
}

impl<const D: usize> VolumeValues<D> {
    pub fn num_shapes(&self) -> usize {
        self.shape_values.nrows()
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.jxw.len()
    }

    /// Checks that all tables have compatible dimensions.
    pub fn check_dimensions(&self) -> eyre::Result<()> {
        check_table_dimensions(&self.shape_values, &self.shape_gradients, &self.jxw, &self.points)
    }
}

/// Solution basis tables of one cell on the quadrature points of one of its faces.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceValues<const D: usize> {
    /// Entry `(a, q)` is the value of shape function `a` at face quadrature point `q`.
    pub shape_values: DMatrix<f64>,
    /// Entry `(a, q)` of matrix `d` is the physical derivative `∂φ_a / ∂x_d` at point `q`.
    pub shape_gradients: [DMatrix<f64>; D],
    /// Face quadrature weights multiplied by the surface Jacobian determinant.
    pub jxw: Vec<f64>,
    /// Physical face quadrature points.
    pub points: Vec<Point<f64, D>>,
    /// Outward unit normals of the cell.
    pub normals: Vec<SVector<f64, D>>,
}

impl<const D: usize> Default for FaceValues<D> {
    fn default() -> Self {
        Self {
            shape_values: DMatrix::zeros(0, 0),
            shape_gradients: std::array::from_fn(|_| DMatrix::zeros(0, 0)),
            jxw: Vec::new(),
            points: Vec::new(),
            normals: Vec::new(),
        }
    }
}

impl<const D: usize> FaceValues<D> {
    pub fn num_shapes(&self) -> usize {
        self.shape_values.nrows()
    }

    pub fn num_quadrature_points(&self) -> usize {
        self.jxw.len()
    }

    /// Checks that all tables have compatible dimensions.
    pub fn check_dimensions(&self) -> eyre::Result<()> {
        check_table_dimensions(&self.shape_values, &self.shape_gradients, &self.jxw, &self.points)?;
        ensure!(
            self.normals.len() == self.jxw.len(),
            "Number of normals ({}) does not match number of face quadrature points ({})",
            self.normals.len(),
            self.jxw.len()
        );
        Ok(())
    }
}

/// The nodal flux basis of a cell.
///
/// Fluxes are represented by Lagrange polynomials `ℓ_j` whose nodes are the volume quadrature
/// points, so that the divergence of the flux interpolant at quadrature point `q` is
/// `Σ_d Σ_j ∂ℓ_j/∂x_d (x_q) F_d(u(x_j))`.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxBasis<const D: usize> {
    /// Entry `(q, j)` of matrix `d` is `∂ℓ_j/∂x_d` evaluated at quadrature point `q`.
    pub derivatives: [DMatrix<f64>; D],
    /// The integral of each flux basis function over the cell.
    ///
    /// For an interpolatory quadrature rule these coincide with the quadrature weights (times
    /// the Jacobian determinant), which the assemblers verify.
    pub integrals: Vec<f64>,
}

impl<const D: usize> Default for FluxBasis<D> {
    fn default() -> Self {
        Self {
            derivatives: std::array::from_fn(|_| DMatrix::zeros(0, 0)),
            integrals: Vec::new(),
        }
    }
}

impl<const D: usize> FluxBasis<D> {
    pub fn num_nodes(&self) -> usize {
        self.integrals.len()
    }
}

/// A cell face on the domain boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BoundaryFace {
    pub cell: usize,
    pub local_face: usize,
    pub boundary_id: usize,
}

/// A face shared by two cells.
///
/// The *interior* cell owns the face: its outward normal is the canonical face normal,
/// and the face is assembled exactly once on its behalf.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InteriorFace {
    pub cell_int: usize,
    pub face_int: usize,
    pub cell_ext: usize,
    pub face_ext: usize,
}

/// A discretization that can provide the tables needed by the DG assemblers.
///
/// Implementations must enumerate every interior face exactly once, and must order the
/// face quadrature points of the two cells sharing a face identically.
pub trait DgSpace<const D: usize>: Sync {
    fn num_cells(&self) -> usize;

    /// Number of scalar shape functions (nodes) in the given cell.
    fn cell_node_count(&self, cell: usize) -> usize;

    /// Total number of nodes in the space.
    fn num_nodes(&self) -> usize;

    /// Writes the global node indices of the cell into `nodes`.
    fn populate_cell_nodes(&self, cell: usize, nodes: &mut Vec<usize>);

    fn populate_volume_values(&self, cell: usize, values: &mut VolumeValues<D>);

    fn populate_flux_basis(&self, cell: usize, basis: &mut FluxBasis<D>);

    fn populate_face_values(&self, cell: usize, local_face: usize, values: &mut FaceValues<D>);

    fn boundary_faces(&self) -> &[BoundaryFace];

    fn interior_faces(&self) -> &[InteriorFace];

    /// Interior penalty parameter for the given face of the given cell.
    fn face_penalty(&self, cell: usize, local_face: usize) -> f64;

    /// Writes the global degrees of freedom of the cell for a system with `nstate` components.
    fn populate_cell_dofs(&self, cell: usize, nstate: usize, dofs: &mut Vec<usize>) {
        let mut nodes = Vec::with_capacity(self.cell_node_count(cell));
        self.populate_cell_nodes(cell, &mut nodes);
        dofs.clear();
        dofs.extend(
            nodes
                .iter()
                .flat_map(|node| (0..nstate).map(move |s| nstate * node + s)),
        );
    }

    fn num_dofs(&self, nstate: usize) -> usize {
        nstate * self.num_nodes()
    }
}

fn check_table_dimensions<const D: usize>(
    shape_values: &DMatrix<f64>,
    shape_gradients: &[DMatrix<f64>; D],
    jxw: &[f64],
    points: &[Point<f64, D>],
) -> eyre::Result<()> {
    let (n, nq) = shape_values.shape();
    ensure!(
        shape_values.ncols() == jxw.len(),
        "Shape value table has {} columns, but there are {} quadrature weights",
        nq,
        jxw.len()
    );
    ensure!(
        points.len() == jxw.len(),
        "Number of quadrature points ({}) does not match number of weights ({})",
        points.len(),
        jxw.len()
    );
    for (d, gradients) in shape_gradients.iter().enumerate() {
        ensure!(
            gradients.shape() == (n, nq),
            "Gradient table for direction {d} has shape {:?}, expected {:?}",
            gradients.shape(),
            (n, nq)
        );
    }
    Ok(())
}
