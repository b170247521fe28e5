use crate::assembly::global::{check_accumulator, check_scatter, scatter_block, ScatterWorkspace};
use crate::assembly::{
    check_local_sizes, extract_residual, interpolate, seed_coefficients, AssemblyFlags, DgOperator,
    JacobianAccumulator, LocalWorkspace, LOCAL_WORKSPACE, SCATTER_WORKSPACE,
};
use crate::fad::Fad;
use crate::flux::{ConvectiveNumericalFlux, DissipativeNumericalFlux, SplitForm};
use crate::physics::{flux_dot_normal, Gradient, Physics};
use crate::space::FaceValues;
use davenport::with_thread_local_workspace;
use eyre::ensure;
use itertools::izip;
use log::trace;
use nalgebra::{DMatrixViewMut, DVector, DVectorViewMut};
use num::Zero;

impl<'a, P, C, V, F, const D: usize, const S: usize, const N: usize> DgOperator<'a, P, C, V, F, D, S, N>
where
    P: Physics<D, S>,
    C: ConvectiveNumericalFlux,
    V: DissipativeNumericalFlux,
    F: SplitForm<D, S>,
{
    /// Computes the surface residual of a boundary face.
    ///
    /// The exterior state at every face quadrature point is reconstructed by the physics model
    /// from the boundary id. The residual (and optionally the Jacobian) is written into the
    /// outputs, overwriting their contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables are inconsistent with the outputs, if the physics model
    /// does not know the boundary id, or if the number of local unknowns exceeds the derivative
    /// capacity `N` when the Jacobian is requested.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_boundary_face_local(
        &self,
        values: &FaceValues<D>,
        coefficients: &[f64],
        boundary_id: usize,
        penalty: f64,
        flags: AssemblyFlags,
        mut residual: DVectorViewMut<f64>,
        mut jacobian: Option<DMatrixViewMut<f64>>,
    ) -> eyre::Result<()> {
        ensure!(
            self.physics.has_boundary(boundary_id),
            "Physics model has no boundary condition for boundary id {boundary_id}"
        );
        values.check_dimensions()?;
        check_local_sizes::<S>(values.num_shapes(), coefficients, &residual)?;
        let n_local = coefficients.len();
        self.check_jacobian_output(flags, jacobian.as_ref().map(|j| j.shape()), (n_local, n_local))?;

        with_thread_local_workspace(&LOCAL_WORKSPACE, |ws: &mut LocalWorkspace<D, S, N>| {
            seed_coefficients(coefficients, 0, flags.compute_jacobian, &mut ws.coefficients);
            interpolate(
                &values.shape_values,
                &values.shape_gradients,
                &ws.coefficients,
                &mut ws.states,
                &mut ws.gradients,
            );

            ws.residual.clear();
            ws.residual.resize(n_local, Fad::zero());

            for (q, (x, normal, &w)) in izip!(&values.points, &values.normals, &values.jxw).enumerate() {
                let u_int = &ws.states[q];
                let gradient_int = &ws.gradients[q];
                let (u_ext, gradient_ext) =
                    self.physics
                        .boundary_face_values(boundary_id, x, normal, u_int, gradient_int)?;

                let flux_star = self
                    .convective_flux
                    .evaluate_flux(self.physics, u_int, &u_ext, normal);
                let flux_int = flux_dot_normal(&self.physics.convective_flux(u_int), normal);

                // The boundary state is the shared trace of the solution
                let u_star = self
                    .dissipative_flux
                    .evaluate_solution_flux(&u_ext, &u_ext, normal);
                let jump: Gradient<Fad<N>, D, S> =
                    std::array::from_fn(|s| std::array::from_fn(|d| (u_star[s] - u_int[s]) * normal[d]));
                let sigma_star = self.dissipative_flux.evaluate_auxiliary_flux(
                    self.physics,
                    u_int,
                    &u_ext,
                    gradient_int,
                    &gradient_ext,
                    normal,
                    penalty,
                    true,
                );
                let jump_flux = self.physics.dissipative_flux(u_int, &jump);

                for a in 0..values.num_shapes() {
                    let phi = values.shape_values[(a, q)];
                    for s in 0..S {
                        let mut contribution = -(flux_star[s] - flux_int[s]) * phi - sigma_star[s] * phi;
                        for d in 0..D {
                            contribution += jump_flux[s][d] * values.shape_gradients[d][(a, q)];
                        }
                        ws.residual[S * a + s] += contribution * w;
                    }
                }
            }

            extract_residual(&ws.residual, &mut residual, jacobian.as_mut(), 0);
            Ok(())
        })
    }

    /// Computes the surface residual of a boundary face and adds it into the global residual
    /// and Jacobian.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_boundary_face(
        &self,
        values: &FaceValues<D>,
        dofs: &[usize],
        coefficients: &[f64],
        boundary_id: usize,
        penalty: f64,
        flags: AssemblyFlags,
        residual: &mut DVector<f64>,
        jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        check_scatter(dofs, coefficients, residual)?;
        check_accumulator(flags, &jacobian)?;
        let n = coefficients.len();
        with_thread_local_workspace(&SCATTER_WORKSPACE, |ws: &mut ScatterWorkspace| {
            let ScatterWorkspace {
                residual: local_residual,
                jacobian: local_jacobian,
                row_buffer,
            } = ws;
            local_residual.resize_vertically_mut(n, 0.0);
            if flags.compute_jacobian {
                local_jacobian.resize_mut(n, n, 0.0);
            }
            self.assemble_boundary_face_local(
                values,
                coefficients,
                boundary_id,
                penalty,
                flags,
                DVectorViewMut::from(&mut *local_residual),
                flags
                    .compute_jacobian
                    .then(|| DMatrixViewMut::from(&mut *local_jacobian)),
            )?;

            if let Some(jacobian) = jacobian {
                scatter_block(jacobian, dofs, dofs, local_jacobian, row_buffer)?;
            }
            for (i, dof) in dofs.iter().enumerate() {
                residual[*dof] += local_residual[i];
            }
            trace!("Assembled boundary face with id {boundary_id}");
            Ok(())
        })
    }
}
