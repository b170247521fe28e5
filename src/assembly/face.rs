use crate::assembly::global::{check_accumulator, check_scatter, scatter_block};
use crate::assembly::{
    check_local_sizes, extract_jacobian_block, extract_residual, interpolate, seed_coefficients, AssemblyFlags,
    DgOperator, JacobianAccumulator, LocalWorkspace, LOCAL_WORKSPACE, SCATTER_WORKSPACE,
};
use crate::fad::Fad;
use crate::flux::{ConvectiveNumericalFlux, DissipativeNumericalFlux, SplitForm};
use crate::physics::{flux_dot_normal, Gradient, Physics};
use crate::space::FaceValues;
use davenport::with_thread_local_workspace;
use eyre::ensure;
use log::trace;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut};
use num::Zero;

/// Relative tolerance for matching the face quadrature points of the two cells sharing a face.
const FACE_POINT_TOLERANCE: f64 = 1e-10;

/// Output blocks of the Jacobian of an interior face.
///
/// Block `int_ext` holds the derivatives of the interior residual with respect to the exterior
/// coefficients, and correspondingly for the other blocks.
#[derive(Debug)]
pub struct FaceJacobianBlocks<'a> {
    pub int_int: DMatrixViewMut<'a, f64>,
    pub int_ext: DMatrixViewMut<'a, f64>,
    pub ext_int: DMatrixViewMut<'a, f64>,
    pub ext_ext: DMatrixViewMut<'a, f64>,
}

impl<'a> FaceJacobianBlocks<'a> {
    fn shapes(&self) -> [(usize, usize); 4] {
        [
            self.int_int.shape(),
            self.int_ext.shape(),
            self.ext_int.shape(),
            self.ext_ext.shape(),
        ]
    }
}

#[derive(Debug)]
struct FaceScatterWorkspace {
    residual_int: DVector<f64>,
    residual_ext: DVector<f64>,
    blocks: [DMatrix<f64>; 4],
    row_buffer: Vec<f64>,
}

impl Default for FaceScatterWorkspace {
    fn default() -> Self {
        Self {
            residual_int: DVector::zeros(0),
            residual_ext: DVector::zeros(0),
            blocks: std::array::from_fn(|_| DMatrix::zeros(0, 0)),
            row_buffer: Vec::new(),
        }
    }
}

fn check_matching_faces<const D: usize>(values_int: &FaceValues<D>, values_ext: &FaceValues<D>) -> eyre::Result<()> {
    ensure!(
        values_int.num_quadrature_points() == values_ext.num_quadrature_points(),
        "Interior side has {} face quadrature points, but exterior side has {}",
        values_int.num_quadrature_points(),
        values_ext.num_quadrature_points()
    );
    for (q, (x_int, x_ext)) in values_int.points.iter().zip(&values_ext.points).enumerate() {
        let scale = 1.0 + x_int.coords.amax();
        ensure!(
            (x_int - x_ext).amax() <= FACE_POINT_TOLERANCE * scale,
            "Face quadrature point {q} differs between the two sides of the face"
        );
    }
    Ok(())
}

impl<'a, P, C, V, F, const D: usize, const S: usize, const N: usize> DgOperator<'a, P, C, V, F, D, S, N>
where
    P: Physics<D, S>,
    C: ConvectiveNumericalFlux,
    V: DissipativeNumericalFlux,
    F: SplitForm<D, S>,
{
    /// Computes the surface residuals of the two cells sharing an interior face.
    ///
    /// The normals of `values_int` are the outward normals of the interior cell, and the face
    /// quadrature points of both tables must coincide. Both residuals (and optionally the four
    /// Jacobian blocks) are written into the outputs, overwriting their contents.
    ///
    /// Derivatives are seeded with the interior coefficients first, followed by the exterior
    /// coefficients, so that `N` must be at least the total number of unknowns of both cells
    /// when the Jacobian is requested.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_interior_face_local(
        &self,
        values_int: &FaceValues<D>,
        values_ext: &FaceValues<D>,
        coefficients_int: &[f64],
        coefficients_ext: &[f64],
        penalty: f64,
        flags: AssemblyFlags,
        mut residual_int: DVectorViewMut<f64>,
        mut residual_ext: DVectorViewMut<f64>,
        jacobian: Option<FaceJacobianBlocks>,
    ) -> eyre::Result<()> {
        values_int.check_dimensions()?;
        values_ext.check_dimensions()?;
        check_matching_faces(values_int, values_ext)?;
        check_local_sizes::<S>(values_int.num_shapes(), coefficients_int, &residual_int)?;
        check_local_sizes::<S>(values_ext.num_shapes(), coefficients_ext, &residual_ext)?;

        let n_int = coefficients_int.len();
        let n_ext = coefficients_ext.len();
        let num_active = n_int + n_ext;
        ensure!(
            flags.compute_jacobian == jacobian.is_some(),
            "A Jacobian output must be provided if and only if the Jacobian is requested"
        );
        if let Some(blocks) = &jacobian {
            let expected = [(n_int, n_int), (n_int, n_ext), (n_ext, n_int), (n_ext, n_ext)];
            ensure!(
                blocks.shapes() == expected,
                "Face Jacobian blocks have shapes {:?}, expected {:?}",
                blocks.shapes(),
                expected
            );
            ensure!(
                num_active <= N,
                "Number of unknowns on both sides of the face ({num_active}) exceeds the derivative capacity ({N})"
            );
        }

        with_thread_local_workspace(&LOCAL_WORKSPACE, |ws: &mut LocalWorkspace<D, S, N>| {
            seed_coefficients(coefficients_int, 0, flags.compute_jacobian, &mut ws.coefficients);
            seed_coefficients(
                coefficients_ext,
                n_int,
                flags.compute_jacobian,
                &mut ws.coefficients_ext,
            );
            interpolate(
                &values_int.shape_values,
                &values_int.shape_gradients,
                &ws.coefficients,
                &mut ws.states,
                &mut ws.gradients,
            );
            interpolate(
                &values_ext.shape_values,
                &values_ext.shape_gradients,
                &ws.coefficients_ext,
                &mut ws.states_ext,
                &mut ws.gradients_ext,
            );

            ws.residual.clear();
            ws.residual.resize(n_int, Fad::zero());
            ws.residual_ext.clear();
            ws.residual_ext.resize(n_ext, Fad::zero());

            for q in 0..values_int.num_quadrature_points() {
                let normal = &values_int.normals[q];
                let u_int = &ws.states[q];
                let u_ext = &ws.states_ext[q];
                let gradient_int = &ws.gradients[q];
                let gradient_ext = &ws.gradients_ext[q];

                let flux_star = self
                    .convective_flux
                    .evaluate_flux(self.physics, u_int, u_ext, normal);
                let flux_int = flux_dot_normal(&self.physics.convective_flux(u_int), normal);
                let flux_ext = flux_dot_normal(&self.physics.convective_flux(u_ext), normal);

                let u_star = self
                    .dissipative_flux
                    .evaluate_solution_flux(u_int, u_ext, normal);
                let sigma_star = self.dissipative_flux.evaluate_auxiliary_flux(
                    self.physics,
                    u_int,
                    u_ext,
                    gradient_int,
                    gradient_ext,
                    normal,
                    penalty,
                    false,
                );

                // The exterior cell sees the face with the opposite normal
                let jump_int: Gradient<Fad<N>, D, S> =
                    std::array::from_fn(|s| std::array::from_fn(|d| (u_star[s] - u_int[s]) * normal[d]));
                let jump_ext: Gradient<Fad<N>, D, S> =
                    std::array::from_fn(|s| std::array::from_fn(|d| (u_ext[s] - u_star[s]) * normal[d]));
                let jump_flux_int = self.physics.dissipative_flux(u_int, &jump_int);
                let jump_flux_ext = self.physics.dissipative_flux(u_ext, &jump_ext);

                let w = values_int.jxw[q];
                for a in 0..values_int.num_shapes() {
                    let phi = values_int.shape_values[(a, q)];
                    for s in 0..S {
                        let mut contribution = -(flux_star[s] - flux_int[s]) * phi - sigma_star[s] * phi;
                        for d in 0..D {
                            contribution += jump_flux_int[s][d] * values_int.shape_gradients[d][(a, q)];
                        }
                        ws.residual[S * a + s] += contribution * w;
                    }
                }
                for b in 0..values_ext.num_shapes() {
                    let phi = values_ext.shape_values[(b, q)];
                    for s in 0..S {
                        let mut contribution = (flux_star[s] - flux_ext[s]) * phi + sigma_star[s] * phi;
                        for d in 0..D {
                            contribution += jump_flux_ext[s][d] * values_ext.shape_gradients[d][(b, q)];
                        }
                        ws.residual_ext[S * b + s] += contribution * w;
                    }
                }
            }

            match jacobian {
                Some(mut blocks) => {
                    extract_residual(&ws.residual, &mut residual_int, Some(&mut blocks.int_int), 0);
                    extract_jacobian_block(&ws.residual, &mut blocks.int_ext, n_int);
                    extract_residual(&ws.residual_ext, &mut residual_ext, Some(&mut blocks.ext_int), 0);
                    extract_jacobian_block(&ws.residual_ext, &mut blocks.ext_ext, n_int);
                }
                None => {
                    extract_residual(&ws.residual, &mut residual_int, None, 0);
                    extract_residual(&ws.residual_ext, &mut residual_ext, None, 0);
                }
            }
        });

        Ok(())
    }

    /// Computes the surface residuals of an interior face and adds them into the global residual
    /// and Jacobian, including the coupling blocks between the two cells.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_interior_face(
        &self,
        values_int: &FaceValues<D>,
        values_ext: &FaceValues<D>,
        dofs_int: &[usize],
        dofs_ext: &[usize],
        coefficients_int: &[f64],
        coefficients_ext: &[f64],
        penalty: f64,
        flags: AssemblyFlags,
        residual: &mut DVector<f64>,
        jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        check_scatter(dofs_int, coefficients_int, residual)?;
        check_scatter(dofs_ext, coefficients_ext, residual)?;
        check_accumulator(flags, &jacobian)?;
        let n_int = coefficients_int.len();
        let n_ext = coefficients_ext.len();

        with_thread_local_workspace(&SCATTER_WORKSPACE, |ws: &mut FaceScatterWorkspace| {
            let FaceScatterWorkspace {
                residual_int: local_residual_int,
                residual_ext: local_residual_ext,
                blocks,
                row_buffer,
            } = ws;
            local_residual_int.resize_vertically_mut(n_int, 0.0);
            local_residual_ext.resize_vertically_mut(n_ext, 0.0);

            let [int_int, int_ext, ext_int, ext_ext] = blocks;
            let local_blocks = if flags.compute_jacobian {
                int_int.resize_mut(n_int, n_int, 0.0);
                int_ext.resize_mut(n_int, n_ext, 0.0);
                ext_int.resize_mut(n_ext, n_int, 0.0);
                ext_ext.resize_mut(n_ext, n_ext, 0.0);
                Some(FaceJacobianBlocks {
                    int_int: DMatrixViewMut::from(&mut *int_int),
                    int_ext: DMatrixViewMut::from(&mut *int_ext),
                    ext_int: DMatrixViewMut::from(&mut *ext_int),
                    ext_ext: DMatrixViewMut::from(&mut *ext_ext),
                })
            } else {
                None
            };

            self.assemble_interior_face_local(
                values_int,
                values_ext,
                coefficients_int,
                coefficients_ext,
                penalty,
                flags,
                DVectorViewMut::from(&mut *local_residual_int),
                DVectorViewMut::from(&mut *local_residual_ext),
                local_blocks,
            )?;

            if let Some(jacobian) = jacobian {
                // All four blocks are checked before the first one is added
                for (rows, cols) in [(dofs_int, dofs_int), (dofs_int, dofs_ext), (dofs_ext, dofs_int), (dofs_ext, dofs_ext)] {
                    jacobian.check_block(rows, cols)?;
                }
                scatter_block(jacobian, dofs_int, dofs_int, int_int, row_buffer)?;
                scatter_block(jacobian, dofs_int, dofs_ext, int_ext, row_buffer)?;
                scatter_block(jacobian, dofs_ext, dofs_int, ext_int, row_buffer)?;
                scatter_block(jacobian, dofs_ext, dofs_ext, ext_ext, row_buffer)?;
            }
            for (i, dof) in dofs_int.iter().enumerate() {
                residual[*dof] += local_residual_int[i];
            }
            for (i, dof) in dofs_ext.iter().enumerate() {
                residual[*dof] += local_residual_ext[i];
            }
            trace!("Assembled interior face with {n_int} + {n_ext} local unknowns");
            Ok(())
        })
    }
}
