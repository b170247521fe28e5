use crate::assembly::{
    check_collocation, check_flux_basis, check_local_sizes, extract_residual, interpolate, seed_coefficients,
    subtract_flux_divergence, AssemblyFlags, DgOperator, JacobianAccumulator, LocalWorkspace, LOCAL_WORKSPACE,
    SCATTER_WORKSPACE,
};
use crate::fad::Fad;
use crate::flux::{ConvectiveNumericalFlux, DissipativeNumericalFlux, SplitForm};
use crate::physics::Physics;
use crate::space::{FluxBasis, VolumeValues};
use davenport::with_thread_local_workspace;
use log::trace;
use nalgebra::{DMatrixViewMut, DVector, DVectorViewMut};
use num::Zero;

use super::global::{check_accumulator, check_scatter, scatter_block, ScatterWorkspace};

impl<'a, P, C, V, F, const D: usize, const S: usize, const N: usize> DgOperator<'a, P, C, V, F, D, S, N>
where
    P: Physics<D, S>,
    C: ConvectiveNumericalFlux,
    V: DissipativeNumericalFlux,
    F: SplitForm<D, S>,
{
    /// Computes the volume residual of a single cell.
    ///
    /// `coefficients` holds the local solution coefficients in node-major order. The residual
    /// (and the Jacobian with respect to the coefficients, if requested by `flags`) is written
    /// into the outputs, overwriting their contents.
    ///
    /// The convective term is evaluated by differentiating the nodal interpolant of the flux in
    /// the flux basis. With `flags.use_split_form`, the pairs of the split form replace the flux,
    /// which requires the solution basis to be collocated at the quadrature points.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables are inconsistent with each other or with the outputs, if the
    /// quadrature weights disagree with the flux basis integrals, or if the number of local
    /// unknowns exceeds the derivative capacity `N` when the Jacobian is requested.
    pub fn assemble_cell_local(
        &self,
        values: &VolumeValues<D>,
        flux_basis: &FluxBasis<D>,
        coefficients: &[f64],
        flags: AssemblyFlags,
        mut residual: DVectorViewMut<f64>,
        mut jacobian: Option<DMatrixViewMut<f64>>,
    ) -> eyre::Result<()> {
        values.check_dimensions()?;
        check_flux_basis(values, flux_basis)?;
        check_local_sizes::<S>(values.num_shapes(), coefficients, &residual)?;
        let n_local = coefficients.len();
        self.check_jacobian_output(flags, jacobian.as_ref().map(|j| j.shape()), (n_local, n_local))?;
        if flags.use_split_form {
            check_collocation(values)?;
        }

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

            if flags.use_split_form {
                self.subtract_split_flux_divergence(values, flux_basis, ws);
            } else {
                ws.convective_fluxes.clear();
                ws.convective_fluxes
                    .extend(ws.states.iter().map(|u| self.physics.convective_flux(u)));
                subtract_flux_divergence(
                    flux_basis,
                    &values.shape_values,
                    &values.jxw,
                    &ws.convective_fluxes,
                    None,
                    &mut ws.pointwise,
                    &mut ws.residual,
                );
            }

            ws.dissipative_fluxes.clear();
            ws.dissipative_fluxes.extend(
                ws.states
                    .iter()
                    .zip(&ws.gradients)
                    .map(|(u, grad)| self.physics.dissipative_flux(u, grad)),
            );

            ws.sources.clear();
            if self.use_source_term {
                ws.sources.extend(
                    values
                        .points
                        .iter()
                        .zip(&ws.states)
                        .map(|(x, u)| self.physics.source_term(x, u)),
                );
            }

            for (q, &w) in values.jxw.iter().enumerate() {
                let flux = &ws.dissipative_fluxes[q];
                for a in 0..values.num_shapes() {
                    let phi = values.shape_values[(a, q)];
                    for s in 0..S {
                        let mut contribution = Fad::zero();
                        for d in 0..D {
                            contribution += flux[s][d] * values.shape_gradients[d][(a, q)];
                        }
                        if let Some(source) = ws.sources.get(q) {
                            contribution += source[s] * phi;
                        }
                        ws.residual[S * a + s] += contribution * w;
                    }
                }
            }

            extract_residual(&ws.residual, &mut residual, jacobian.as_mut(), 0);
        });

        Ok(())
    }

    fn subtract_split_flux_divergence(
        &self,
        values: &VolumeValues<D>,
        flux_basis: &FluxBasis<D>,
        ws: &mut LocalWorkspace<D, S, N>,
    ) {
        let n = values.num_shapes();
        for pair in 0..self.split_form.num_pairs() {
            let alpha = self.split_form.alpha(pair);
            ws.split_g.clear();
            ws.split_g
                .extend(ws.states.iter().map(|u| self.split_form.g(self.physics, pair, u)));

            // With a collocated basis the nodal values are the coefficients themselves
            ws.split_f.clear();
            ws.split_f.extend((0..n).map(|a| {
                let u_a: [Fad<N>; S] = std::array::from_fn(|s| ws.coefficients[S * a + s]);
                self.split_form.f(self.physics, pair, &u_a)
            }));

            subtract_flux_divergence(
                flux_basis,
                &values.shape_values,
                &values.jxw,
                &ws.split_g,
                Some((ws.split_f.as_slice(), alpha)),
                &mut ws.pointwise,
                &mut ws.residual,
            );
        }
    }

    /// Computes the volume residual of a cell and adds it into the global residual and Jacobian.
    ///
    /// `dofs` maps local unknowns to global unknowns, in the same order as `coefficients`.
    pub fn assemble_cell(
        &self,
        values: &VolumeValues<D>,
        flux_basis: &FluxBasis<D>,
        dofs: &[usize],
        coefficients: &[f64],
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
            self.assemble_cell_local(
                values,
                flux_basis,
                coefficients,
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
            trace!("Assembled cell with {n} local unknowns");
            Ok(())
        })
    }
}
