use crate::quadrature::{gauss_lobatto, Rule1d};
use crate::space::{BoundaryFace, DgSpace, FaceValues, FluxBasis, InteriorFace, LagrangeBasis1d, VolumeValues};
use eyre::ensure;
use fenris_quadrature::univariate;
use nalgebra::{DMatrix, DVector, Point, SVector};

/// A nodal DG space on a uniform, axis-aligned Cartesian mesh of a box.
///
/// Every cell carries a tensor-product Lagrange basis of degree `p` whose nodes are the
/// Gauss-Lobatto points. By default the volume quadrature uses the same Gauss-Lobatto points,
/// which makes the discretization *collocated*: solution nodes, flux nodes and quadrature
/// points coincide. With over-integration, Gauss quadrature with `p + 1 + k` points is used
/// instead, and the flux basis lives on the Gauss points.
///
/// Cells are numbered lexicographically with the first coordinate running fastest.
/// Local face `2 d` is the lower face of a cell in direction `d` and `2 d + 1` the upper face.
/// Boundary faces use the same numbering for their boundary ids, so that boundary id `2 d`
/// is the lower side of the box in direction `d`.
#[derive(Debug, Clone)]
pub struct StructuredDgSpace<const D: usize> {
    lower: Point<f64, D>,
    cell_size: SVector<f64, D>,
    cells_per_dim: [usize; D],
    degree: usize,
    quadrature: Rule1d,
    basis: LagrangeBasis1d,
    flux_basis: LagrangeBasis1d,
    // (shape, point) tables of the 1D solution basis on the volume quadrature points
    basis_values: DMatrix<f64>,
    basis_derivatives: DMatrix<f64>,
    // (shape, 1) tables of the 1D solution basis at -1 and +1
    endpoint_values: [DMatrix<f64>; 2],
    endpoint_derivatives: [DMatrix<f64>; 2],
    // (point, flux node) 1D differentiation matrix of the flux basis
    flux_differentiation: DMatrix<f64>,
    // Integrals of the 1D flux basis functions over [-1, 1]
    flux_integrals: Vec<f64>,
    boundary_faces: Vec<BoundaryFace>,
    interior_faces: Vec<InteriorFace>,
}

impl<const D: usize> StructuredDgSpace<D> {
    /// A collocated space of the given degree on the box `[lower, upper]`.
    pub fn new(lower: Point<f64, D>, upper: Point<f64, D>, cells_per_dim: [usize; D], degree: usize) -> eyre::Result<Self> {
        Self::with_overintegration(lower, upper, cells_per_dim, degree, 0)
    }

    /// A space of the given degree whose volume and face quadrature uses Gauss rules with
    /// `degree + 1 + overintegration` points per direction.
    ///
    /// With `overintegration == 0`, the collocated Gauss-Lobatto rule is used instead.
    pub fn with_overintegration(
        lower: Point<f64, D>,
        upper: Point<f64, D>,
        cells_per_dim: [usize; D],
        degree: usize,
        overintegration: usize,
    ) -> eyre::Result<Self> {
        ensure!(D > 0, "Spatial dimension must be positive");
        ensure!(degree >= 1, "Polynomial degree must be at least one");
        ensure!(
            cells_per_dim.iter().all(|n| *n > 0),
            "Number of cells must be positive in every direction"
        );
        let extent = upper - lower;
        ensure!(
            extent.iter().all(|e| *e > 0.0),
            "Upper corner must exceed the lower corner in every direction"
        );
        let cell_size = SVector::from_fn(|d, _| extent[d] / cells_per_dim[d] as f64);

        let (_, nodes) = gauss_lobatto(degree + 1);
        let quadrature = if overintegration == 0 {
            gauss_lobatto(degree + 1)
        } else {
            gauss(degree + 1 + overintegration)
        };

        let basis = LagrangeBasis1d::new(nodes)?;
        let flux_basis = LagrangeBasis1d::new(quadrature.1.clone())?;

        // Integrate the flux basis with a rule that is exact for its degree, independently of
        // the quadrature rule whose points define it
        let (integration_weights, integration_points) = gauss(flux_basis.num_functions() + 1);
        let flux_integrals = flux_basis.values_at(&integration_points) * DVector::from_vec(integration_weights);

        let mut space = Self {
            lower,
            cell_size,
            cells_per_dim,
            degree,
            basis_values: basis.values_at(&quadrature.1),
            basis_derivatives: basis.derivatives_at(&quadrature.1),
            endpoint_values: [basis.values_at(&[-1.0]), basis.values_at(&[1.0])],
            endpoint_derivatives: [basis.derivatives_at(&[-1.0]), basis.derivatives_at(&[1.0])],
            flux_differentiation: flux_basis.differentiation_matrix(&quadrature.1),
            flux_integrals: flux_integrals.as_slice().to_vec(),
            quadrature,
            basis,
            flux_basis,
            boundary_faces: Vec::new(),
            interior_faces: Vec::new(),
        };
        space.enumerate_faces();
        Ok(space)
    }

    fn enumerate_faces(&mut self) {
        for cell in 0..self.num_cells() {
            let index = self.cell_multi_index(cell);
            for d in 0..D {
                if index[d] == 0 {
                    self.boundary_faces.push(BoundaryFace {
                        cell,
                        local_face: 2 * d,
                        boundary_id: 2 * d,
                    });
                }
                if index[d] + 1 == self.cells_per_dim[d] {
                    self.boundary_faces.push(BoundaryFace {
                        cell,
                        local_face: 2 * d + 1,
                        boundary_id: 2 * d + 1,
                    });
                } else {
                    self.interior_faces.push(InteriorFace {
                        cell_int: cell,
                        face_int: 2 * d + 1,
                        cell_ext: cell + self.cell_stride(d),
                        face_ext: 2 * d,
                    });
                }
            }
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn cells_per_dim(&self) -> [usize; D] {
        self.cells_per_dim
    }

    pub fn cell_size(&self) -> &SVector<f64, D> {
        &self.cell_size
    }

    /// Whether solution nodes and volume quadrature points coincide.
    pub fn is_collocated(&self) -> bool {
        self.basis.nodes() == self.flux_basis.nodes()
    }

    /// The one-dimensional volume quadrature rule on `[-1, 1]`.
    pub fn quadrature(&self) -> &Rule1d {
        &self.quadrature
    }

    /// The one-dimensional solution basis on `[-1, 1]`.
    pub fn basis(&self) -> &LagrangeBasis1d {
        &self.basis
    }

    fn cell_stride(&self, d: usize) -> usize {
        self.cells_per_dim[..d].iter().product()
    }

    pub fn cell_multi_index(&self, cell: usize) -> [usize; D] {
        tensor_multi_index(cell, &self.cells_per_dim)
    }

    fn cell_lower_corner(&self, cell: usize) -> Point<f64, D> {
        let index = self.cell_multi_index(cell);
        Point::from(SVector::from_fn(|d, _| self.lower[d] + index[d] as f64 * self.cell_size[d]))
    }

    fn nodes_per_cell(&self) -> usize {
        self.basis.num_functions().pow(D as u32)
    }

    /// Physical positions of the solution nodes of the given cell.
    pub fn node_positions(&self, cell: usize) -> Vec<Point<f64, D>> {
        let corner = self.cell_lower_corner(cell);
        let n1 = self.basis.num_functions();
        (0..self.nodes_per_cell())
            .map(|a| {
                let index = tensor_multi_index(a, &[n1; D]);
                Point::from(SVector::from_fn(|d, _| {
                    corner[d] + 0.5 * (self.basis.nodes()[index[d]] + 1.0) * self.cell_size[d]
                }))
            })
            .collect()
    }

    /// Interpolates the given function into the space.
    ///
    /// Since the basis is nodal, the coefficients are simply the function values at the nodes.
    pub fn interpolate<const S: usize>(&self, f: impl Fn(&Point<f64, D>) -> [f64; S]) -> DVector<f64> {
        let mut coefficients = DVector::zeros(S * self.num_nodes());
        let mut nodes = Vec::new();
        for cell in 0..self.num_cells() {
            self.populate_cell_nodes(cell, &mut nodes);
            for (node, x) in nodes.iter().zip(self.node_positions(cell)) {
                let value = f(&x);
                for s in 0..S {
                    coefficients[S * node + s] = value[s];
                }
            }
        }
        coefficients
    }

    /// Values of the flux basis functions on the quadrature points of the given local face,
    /// as a `(flux node, face point)` matrix.
    pub fn flux_basis_face_values(&self, local_face: usize) -> DMatrix<f64> {
        let (d, side) = (local_face / 2, local_face % 2);
        let n1 = self.flux_basis.num_functions();
        let endpoint = self.flux_basis.values_at(&[[-1.0, 1.0][side]]);
        let identity = DMatrix::identity(n1, n1);
        let tables: [&DMatrix<f64>; D] = std::array::from_fn(|e| if e == d { &endpoint } else { &identity });
        let mut values = DMatrix::zeros(0, 0);
        populate_tensor_values(&tables, &mut values);
        values
    }
}

impl<const D: usize> DgSpace<D> for StructuredDgSpace<D> {
    fn num_cells(&self) -> usize {
        self.cells_per_dim.iter().product()
    }

    fn cell_node_count(&self, _cell: usize) -> usize {
        self.nodes_per_cell()
    }

    fn num_nodes(&self) -> usize {
        self.num_cells() * self.nodes_per_cell()
    }

    fn populate_cell_nodes(&self, cell: usize, nodes: &mut Vec<usize>) {
        let n = self.nodes_per_cell();
        nodes.clear();
        nodes.extend(n * cell..n * (cell + 1));
    }

    fn populate_volume_values(&self, cell: usize, values: &mut VolumeValues<D>) {
        let corner = self.cell_lower_corner(cell);
        let (weights, points) = &self.quadrature;
        let h = &self.cell_size;

        let value_tables = [&self.basis_values; D];
        let derivative_tables = [&self.basis_derivatives; D];
        populate_tensor_values(&value_tables, &mut values.shape_values);
        for d in 0..D {
            populate_tensor_gradient(&value_tables, &derivative_tables, d, 2.0 / h[d], &mut values.shape_gradients[d]);
        }

        let scaled_weights: [Vec<f64>; D] = std::array::from_fn(|d| weights.iter().map(|w| 0.5 * h[d] * w).collect());
        let coordinates: [Vec<f64>; D] =
            std::array::from_fn(|d| points.iter().map(|xi| corner[d] + 0.5 * (xi + 1.0) * h[d]).collect());
        populate_tensor_quadrature(&scaled_weights, &coordinates, &mut values.jxw, &mut values.points);
    }

    fn populate_flux_basis(&self, _cell: usize, basis: &mut FluxBasis<D>) {
        let h = &self.cell_size;
        let n1 = self.flux_basis.num_functions();
        let identity = DMatrix::identity(n1, n1);
        let identities = [&identity; D];
        let differentiation = self.flux_differentiation.transpose();
        let derivatives = [&differentiation; D];

        for d in 0..D {
            // The gradient routine produces (node, point) tables
            let mut table = DMatrix::zeros(0, 0);
            populate_tensor_gradient(&identities, &derivatives, d, 2.0 / h[d], &mut table);
            basis.derivatives[d] = table.transpose();
        }

        let scaled_integrals: [Vec<f64>; D] =
            std::array::from_fn(|d| self.flux_integrals.iter().map(|w| 0.5 * h[d] * w).collect());
        let unit: [Vec<f64>; D] = std::array::from_fn(|_| vec![0.0; n1]);
        let mut unused_points = Vec::new();
        populate_tensor_quadrature(&scaled_integrals, &unit, &mut basis.integrals, &mut unused_points);
    }

    fn populate_face_values(&self, cell: usize, local_face: usize, values: &mut FaceValues<D>) {
        assert!(local_face < 2 * D, "Local face index out of bounds");
        let (d, side) = (local_face / 2, local_face % 2);
        let corner = self.cell_lower_corner(cell);
        let (weights, points) = &self.quadrature;
        let h = &self.cell_size;

        let value_tables: [&DMatrix<f64>; D] =
            std::array::from_fn(|e| if e == d { &self.endpoint_values[side] } else { &self.basis_values });
        let derivative_tables: [&DMatrix<f64>; D] = std::array::from_fn(|e| {
            if e == d {
                &self.endpoint_derivatives[side]
            } else {
                &self.basis_derivatives
            }
        });
        populate_tensor_values(&value_tables, &mut values.shape_values);
        for e in 0..D {
            populate_tensor_gradient(&value_tables, &derivative_tables, e, 2.0 / h[e], &mut values.shape_gradients[e]);
        }

        let scaled_weights: [Vec<f64>; D] = std::array::from_fn(|e| {
            if e == d {
                vec![1.0]
            } else {
                weights.iter().map(|w| 0.5 * h[e] * w).collect()
            }
        });
        let coordinates: [Vec<f64>; D] = std::array::from_fn(|e| {
            if e == d {
                vec![corner[e] + side as f64 * h[e]]
            } else {
                points.iter().map(|xi| corner[e] + 0.5 * (xi + 1.0) * h[e]).collect()
            }
        });
        populate_tensor_quadrature(&scaled_weights, &coordinates, &mut values.jxw, &mut values.points);

        let sign = if side == 0 { -1.0 } else { 1.0 };
        let normal = SVector::from_fn(|e, _| if e == d { sign } else { 0.0 });
        values.normals.clear();
        values.normals.resize(values.jxw.len(), normal);
    }

    fn boundary_faces(&self) -> &[BoundaryFace] {
        &self.boundary_faces
    }

    fn interior_faces(&self) -> &[InteriorFace] {
        &self.interior_faces
    }

    fn face_penalty(&self, _cell: usize, local_face: usize) -> f64 {
        let p = self.degree as f64;
        (p + 1.0) * (p + 1.0) / self.cell_size[local_face / 2]
    }
}

/// Lexicographic multi-index of `index` with the first coordinate running fastest.
fn tensor_multi_index<const D: usize>(mut index: usize, sizes: &[usize; D]) -> [usize; D] {
    let mut multi_index = [0; D];
    for d in 0..D {
        multi_index[d] = index % sizes[d];
        index /= sizes[d];
    }
    multi_index
}

/// Number of points of a tensor-product table, and the per-dimension point counts.
fn tensor_point_counts<const D: usize>(tables: &[&DMatrix<f64>; D]) -> (usize, [usize; D]) {
    let counts = std::array::from_fn(|d| tables[d].ncols());
    (counts.iter().product(), counts)
}

/// Populates `(shape, point)` values of the tensor product of the given 1D `(shape, point)` tables.
fn populate_tensor_values<const D: usize>(tables: &[&DMatrix<f64>; D], output: &mut DMatrix<f64>) {
    let shape_counts: [usize; D] = std::array::from_fn(|d| tables[d].nrows());
    let num_shapes = shape_counts.iter().product();
    let (num_points, point_counts) = tensor_point_counts(tables);
    *output = DMatrix::from_fn(num_shapes, num_points, |a, q| {
        let a = tensor_multi_index(a, &shape_counts);
        let q = tensor_multi_index(q, &point_counts);
        (0..D).map(|d| tables[d][(a[d], q[d])]).product()
    });
}

/// Populates the `(shape, point)` table of the derivative in direction `dim` of the tensor product basis.
fn populate_tensor_gradient<const D: usize>(
    values: &[&DMatrix<f64>; D],
    derivatives: &[&DMatrix<f64>; D],
    dim: usize,
    scale: f64,
    output: &mut DMatrix<f64>,
) {
    let shape_counts: [usize; D] = std::array::from_fn(|d| values[d].nrows());
    let num_shapes = shape_counts.iter().product();
    let (num_points, point_counts) = tensor_point_counts(values);
    *output = DMatrix::from_fn(num_shapes, num_points, |a, q| {
        let a = tensor_multi_index(a, &shape_counts);
        let q = tensor_multi_index(q, &point_counts);
        let product: f64 = (0..D)
            .map(|d| {
                if d == dim {
                    derivatives[d][(a[d], q[d])]
                } else {
                    values[d][(a[d], q[d])]
                }
            })
            .product();
        scale * product
    });
}

fn populate_tensor_quadrature<const D: usize>(
    weights: &[Vec<f64>; D],
    coordinates: &[Vec<f64>; D],
    jxw: &mut Vec<f64>,
    points: &mut Vec<Point<f64, D>>,
) {
    let counts: [usize; D] = std::array::from_fn(|d| weights[d].len());
    let num_points = counts.iter().product();
    jxw.clear();
    points.clear();
    for q in 0..num_points {
        let q = tensor_multi_index(q, &counts);
        jxw.push((0..D).map(|d| weights[d][q[d]]).product());
        points.push(Point::from(SVector::from_fn(|d, _| coordinates[d][q[d]])));
    }
}

/// Gauss rule with points in ascending order.
fn gauss(num_points: usize) -> Rule1d {
    let (mut weights, points) = univariate::gauss(num_points);
    let mut points: Vec<f64> = points.into_iter().map(|[x]| x).collect();
    // Roots are produced in descending order
    points.reverse();
    weights.reverse();
    (weights, points)
}
