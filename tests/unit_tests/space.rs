use fenris_dg::quadrature::gauss_lobatto;
use fenris_dg::space::{DgSpace, FaceValues, FluxBasis, LagrangeBasis1d, StructuredDgSpace, VolumeValues};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Point1, Point2, Point3};

#[test]
fn lagrange_basis_is_nodal() {
    let (_, nodes) = gauss_lobatto(5);
    let basis = LagrangeBasis1d::new(nodes.clone()).unwrap();
    let values = basis.values_at(&nodes);
    assert_matrix_eq!(values, DMatrix::<f64>::identity(5, 5), comp = abs, tol = 1e-14);
}

#[test]
fn lagrange_basis_rejects_duplicate_nodes() {
    assert!(LagrangeBasis1d::new(vec![0.0, 0.5, 0.5]).is_err());
    assert!(LagrangeBasis1d::new(vec![]).is_err());
}

#[test]
fn lagrange_basis_forms_partition_of_unity() {
    let basis = LagrangeBasis1d::new(vec![-1.0, -0.2, 0.4, 1.0]).unwrap();
    let points = [-0.9, -0.3, 0.0, 0.55, 0.99];
    let values = basis.values_at(&points);
    let derivatives = basis.derivatives_at(&points);
    for q in 0..points.len() {
        assert_scalar_eq!(values.column(q).sum(), 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(derivatives.column(q).sum(), 0.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn lagrange_basis_barycentric_weights_and_nodal_derivatives() {
    let nodes = vec![-1.0, 0.0, 1.0];
    let basis = LagrangeBasis1d::new(nodes.clone()).unwrap();
    assert_eq!(basis.barycentric_weights(), &[0.5, -1.0, 0.5]);

    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        -1.5,  2.0, -0.5,
        -0.5,  0.0,  0.5,
         0.5, -2.0,  1.5,
    ]);
    assert_matrix_eq!(basis.differentiation_matrix(&nodes), expected, comp = abs, tol = 1e-14);

    // Evaluation next to a node is continuous with the evaluation at the node
    let near = [-1.0 + 1e-9, 1e-9, 1.0 - 1e-9];
    assert_matrix_eq!(basis.values_at(&near), DMatrix::<f64>::identity(3, 3), comp = abs, tol = 1e-8);
    assert_matrix_eq!(basis.differentiation_matrix(&near), expected, comp = abs, tol = 1e-7);

    let constant = LagrangeBasis1d::new(vec![0.3]).unwrap();
    assert_eq!(constant.values_at(&[0.3, -0.7]), DMatrix::from_element(1, 2, 1.0));
    assert_eq!(constant.derivatives_at(&[0.3, -0.7]), DMatrix::zeros(1, 2));
}

#[test]
fn differentiation_matrix_is_exact_for_polynomials_of_the_basis_degree() {
    let (_, nodes) = gauss_lobatto(4);
    let basis = LagrangeBasis1d::new(nodes.clone()).unwrap();
    let points = [-0.8, -0.1, 0.35, 0.7];
    let differentiation = basis.differentiation_matrix(&points);

    let f = |x: f64| 2.0 - x + 3.0 * x.powi(2) - 0.5 * x.powi(3);
    let df = |x: f64| -1.0 + 6.0 * x - 1.5 * x.powi(2);
    let nodal_values = DVector::from_iterator(nodes.len(), nodes.iter().map(|x| f(*x)));
    let expected = DVector::from_iterator(points.len(), points.iter().map(|x| df(*x)));
    assert_matrix_eq!(differentiation * nodal_values, expected, comp = abs, tol = 1e-12);
}

#[test]
fn structured_space_enumerates_faces() {
    let space = StructuredDgSpace::new(Point2::new(0.0, 0.0), Point2::new(3.0, 1.0), [3, 2], 2).unwrap();
    assert_eq!(space.num_cells(), 6);
    assert_eq!(space.cell_node_count(0), 9);
    assert_eq!(space.num_nodes(), 54);
    assert_eq!(space.num_dofs(4), 216);
    assert_eq!(space.boundary_faces().len(), 2 * 2 + 2 * 3);
    assert_eq!(space.interior_faces().len(), 2 * 2 + 3);

    for face in space.interior_faces() {
        assert_eq!(face.face_int % 2, 1);
        assert_eq!(face.face_ext, face.face_int - 1);
        let d = face.face_int / 2;
        let index_int = space.cell_multi_index(face.cell_int);
        let index_ext = space.cell_multi_index(face.cell_ext);
        assert_eq!(index_ext[d], index_int[d] + 1);
        assert_eq!(index_ext[1 - d], index_int[1 - d]);
    }

    for face in space.boundary_faces() {
        assert_eq!(face.boundary_id, face.local_face);
    }
}

#[test]
fn structured_space_rejects_invalid_input() {
    assert!(StructuredDgSpace::new(Point1::new(0.0), Point1::new(1.0), [2], 0).is_err());
    assert!(StructuredDgSpace::new(Point1::new(0.0), Point1::new(1.0), [0], 2).is_err());
    assert!(StructuredDgSpace::new(Point1::new(1.0), Point1::new(0.0), [2], 2).is_err());
}

#[test]
fn cell_dofs_are_node_major() {
    let space = StructuredDgSpace::new(Point1::new(0.0), Point1::new(2.0), [2], 1).unwrap();
    let mut dofs = Vec::new();
    space.populate_cell_dofs(1, 3, &mut dofs);
    assert_eq!(dofs, vec![6, 7, 8, 9, 10, 11]);
}

#[test]
fn volume_tables_integrate_and_differentiate_polynomials() {
    for overintegration in [0, 2] {
        let space = StructuredDgSpace::with_overintegration(
            Point2::new(-1.0, 0.0),
            Point2::new(1.0, 2.0),
            [2, 2],
            2,
            overintegration,
        )
        .unwrap();
        let cell = 3;
        let mut values = VolumeValues::default();
        space.populate_volume_values(cell, &mut values);
        values.check_dimensions().unwrap();

        // The cell is [0, 1] x [1, 2]
        let area: f64 = values.jxw.iter().sum();
        assert_scalar_eq!(area, 1.0, comp = abs, tol = 1e-13);

        let f = |x: &Point2<f64>| x.x * x.x * x.y - 2.0 * x.y;
        let grad_f = |x: &Point2<f64>| [2.0 * x.x * x.y, x.x * x.x - 2.0];
        let coefficients: Vec<f64> = space.node_positions(cell).iter().map(f).collect();
        let coefficients = DVector::from_vec(coefficients);

        let u = values.shape_values.transpose() * &coefficients;
        for (q, x) in values.points.iter().enumerate() {
            assert_scalar_eq!(u[q], f(x), comp = abs, tol = 1e-12);
            for d in 0..2 {
                let derivative = values.shape_gradients[d].column(q).dot(&coefficients);
                assert_scalar_eq!(derivative, grad_f(x)[d], comp = abs, tol = 1e-11);
            }
        }
    }
}

#[test]
fn overintegrated_quadrature_is_an_ascending_gauss_rule() {
    for overintegration in [1, 2, 4] {
        let space =
            StructuredDgSpace::with_overintegration(Point1::new(0.0), Point1::new(1.0), [1], 2, overintegration).unwrap();
        let (weights, points) = space.quadrature();
        let n = 3 + overintegration;
        assert_eq!(points.len(), n);
        assert!(points.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(points.iter().all(|x| x.abs() < 1.0));
        // Gauss rules with n points integrate x^(2n - 2) exactly, Gauss-Lobatto rules do not
        let k = 2 * n as i32 - 2;
        let integral: f64 = weights.iter().zip(points).map(|(w, x)| w * x.powi(k)).sum();
        assert_scalar_eq!(integral, 2.0 / (k as f64 + 1.0), comp = abs, tol = 1e-13);
    }
}

#[test]
fn flux_basis_integrals_match_quadrature_weights() {
    for overintegration in [0, 1, 3] {
        let space = StructuredDgSpace::with_overintegration(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.5),
            [1, 2, 1],
            2,
            overintegration,
        )
        .unwrap();
        let mut values = VolumeValues::default();
        let mut basis = FluxBasis::default();
        space.populate_volume_values(1, &mut values);
        space.populate_flux_basis(1, &mut basis);
        assert_eq!(basis.num_nodes(), values.num_quadrature_points());
        assert_eq!(space.is_collocated(), overintegration == 0);
        for (w, integral) in values.jxw.iter().zip(&basis.integrals) {
            assert_scalar_eq!(*w, *integral, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn collocated_space_has_identity_shape_values() {
    let space = StructuredDgSpace::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), [1, 1], 3).unwrap();
    let mut values = VolumeValues::default();
    space.populate_volume_values(0, &mut values);
    assert_matrix_eq!(values.shape_values, DMatrix::<f64>::identity(16, 16), comp = abs, tol = 1e-14);
}

/// Checks the summation-by-parts identity
/// `W D_d + (W D_d)^T = Σ_faces L_f^T diag(w_f n_f,d) L_f`
/// of the flux differentiation matrices, where `W` holds the volume weights and `L_f` evaluates
/// the flux basis on the quadrature points of face `f`.
fn check_summation_by_parts<const D: usize>(space: &StructuredDgSpace<D>) {
    let cell = 0;
    let mut values = VolumeValues::default();
    let mut basis = FluxBasis::default();
    space.populate_volume_values(cell, &mut values);
    space.populate_flux_basis(cell, &mut basis);
    let n = basis.num_nodes();
    let weights = DMatrix::from_diagonal(&DVector::from_column_slice(&values.jxw));

    for d in 0..D {
        let q = &weights * &basis.derivatives[d];
        let volume_term = &q + q.transpose();

        let mut boundary_term = DMatrix::zeros(n, n);
        let mut face_values = FaceValues::default();
        for local_face in 0..2 * D {
            space.populate_face_values(cell, local_face, &mut face_values);
            let flux_face_values = space.flux_basis_face_values(local_face);
            let scaled_weights: Vec<f64> = face_values
                .jxw
                .iter()
                .zip(&face_values.normals)
                .map(|(w, normal)| w * normal[d])
                .collect();
            let face_weights = DMatrix::from_diagonal(&DVector::from_vec(scaled_weights));
            boundary_term += &flux_face_values * face_weights * flux_face_values.transpose();
        }

        assert_matrix_eq!(volume_term, boundary_term, comp = abs, tol = 1e-12);
    }
}

#[test]
fn flux_differentiation_satisfies_summation_by_parts_1d() {
    for degree in 1..=5 {
        for overintegration in [0, 2] {
            let space =
                StructuredDgSpace::with_overintegration(Point1::new(0.5), Point1::new(2.0), [3], degree, overintegration)
                    .unwrap();
            check_summation_by_parts(&space);
        }
    }
}

#[test]
fn flux_differentiation_satisfies_summation_by_parts_2d() {
    for degree in 1..=4 {
        for overintegration in [0, 1] {
            let space = StructuredDgSpace::with_overintegration(
                Point2::new(0.0, -1.0),
                Point2::new(2.0, 1.0),
                [2, 4],
                degree,
                overintegration,
            )
            .unwrap();
            check_summation_by_parts(&space);
        }
    }
}

#[test]
fn face_tables_of_neighboring_cells_match() {
    let space = StructuredDgSpace::with_overintegration(
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 1.0),
        [2, 2],
        2,
        1,
    )
    .unwrap();
    let mut values_int = FaceValues::default();
    let mut values_ext = FaceValues::default();
    for face in space.interior_faces() {
        space.populate_face_values(face.cell_int, face.face_int, &mut values_int);
        space.populate_face_values(face.cell_ext, face.face_ext, &mut values_ext);
        values_int.check_dimensions().unwrap();
        assert_eq!(values_int.points.len(), values_ext.points.len());
        for (x_int, x_ext) in values_int.points.iter().zip(&values_ext.points) {
            assert_matrix_eq!(x_int.coords, x_ext.coords, comp = abs, tol = 1e-14);
        }
        for (n_int, n_ext) in values_int.normals.iter().zip(&values_ext.normals) {
            assert_eq!(*n_int, -*n_ext);
        }
        let length: f64 = values_int.jxw.iter().sum();
        assert_scalar_eq!(length, 0.5, comp = abs, tol = 1e-14);
    }
}

#[test]
fn interpolation_reproduces_nodal_values() {
    let space = StructuredDgSpace::new(Point1::new(0.0), Point1::new(1.0), [2], 2).unwrap();
    let coefficients = space.interpolate(|x| [x.x, 2.0 * x.x]);
    assert_eq!(coefficients.len(), 12);
    // The second cell has nodes 0.5, 0.75 and 1.0
    assert_scalar_eq!(coefficients[6], 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(coefficients[9], 1.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(coefficients[11], 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn face_penalty_scales_with_degree_and_cell_size() {
    let space = StructuredDgSpace::new(Point2::new(0.0, 0.0), Point2::new(1.0, 2.0), [4, 4], 2).unwrap();
    assert_scalar_eq!(space.face_penalty(0, 0), 9.0 / 0.25, comp = abs, tol = 1e-12);
    assert_scalar_eq!(space.face_penalty(0, 3), 9.0 / 0.5, comp = abs, tol = 1e-12);
}
