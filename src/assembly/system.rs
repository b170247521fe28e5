use crate::assembly::{dg_csr_matrix, AssemblyFlags, DgOperator, JacobianAccumulator};
use crate::flux::{ConvectiveNumericalFlux, DissipativeNumericalFlux, SplitForm};
use crate::physics::Physics;
use crate::space::{BoundaryFace, DgSpace, FaceValues, FluxBasis, InteriorFace, VolumeValues};
use davenport::{define_thread_local_workspace, with_thread_local_workspace};
use eyre::ensure;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use std::cell::RefCell;
use thread_local::ThreadLocal;

define_thread_local_workspace!(SYSTEM_WORKSPACE);

/// Tables and gathered coefficients for the entity currently being assembled.
struct SystemWorkspace<const D: usize> {
    volume_values: VolumeValues<D>,
    flux_basis: FluxBasis<D>,
    face_values_int: FaceValues<D>,
    face_values_ext: FaceValues<D>,
    dofs_int: Vec<usize>,
    dofs_ext: Vec<usize>,
    coefficients_int: Vec<f64>,
    coefficients_ext: Vec<f64>,
}

impl<const D: usize> Default for SystemWorkspace<D> {
    fn default() -> Self {
        Self {
            volume_values: VolumeValues::default(),
            flux_basis: FluxBasis::default(),
            face_values_int: FaceValues::default(),
            face_values_ext: FaceValues::default(),
            dofs_int: Vec::new(),
            dofs_ext: Vec::new(),
            coefficients_int: Vec::new(),
            coefficients_ext: Vec::new(),
        }
    }
}

fn gather(solution: &DVector<f64>, dofs: &[usize], coefficients: &mut Vec<f64>) {
    coefficients.clear();
    coefficients.extend(dofs.iter().map(|dof| solution[*dof]));
}

/// Per-thread output of parallel assembly.
struct ParallelAccumulator {
    residual: DVector<f64>,
    jacobian: Option<CooMatrix<f64>>,
}

impl ParallelAccumulator {
    fn new(num_dofs: usize, compute_jacobian: bool) -> Self {
        Self {
            residual: DVector::zeros(num_dofs),
            jacobian: compute_jacobian.then(|| CooMatrix::new(num_dofs, num_dofs)),
        }
    }
}

/// Assembles the global DG residual and Jacobian by iterating over all entities of a [`DgSpace`].
///
/// The global unknowns are ordered node-major as described by [`DgSpace::populate_cell_dofs`].
#[derive(Debug, Clone)]
pub struct DgSystem<'a, Space, P, C, V, F, const D: usize, const S: usize, const N: usize> {
    operator: DgOperator<'a, P, C, V, F, D, S, N>,
    space: &'a Space,
}

impl<'a, Space, P, C, V, F, const D: usize, const S: usize, const N: usize> DgSystem<'a, Space, P, C, V, F, D, S, N>
where
    Space: DgSpace<D>,
    P: Physics<D, S>,
    C: ConvectiveNumericalFlux,
    V: DissipativeNumericalFlux,
    F: SplitForm<D, S>,
{
    pub fn new(operator: DgOperator<'a, P, C, V, F, D, S, N>, space: &'a Space) -> Self {
        Self { operator, space }
    }

    pub fn operator(&self) -> &DgOperator<'a, P, C, V, F, D, S, N> {
        &self.operator
    }

    pub fn space(&self) -> &'a Space {
        self.space
    }

    pub fn num_dofs(&self) -> usize {
        self.space.num_dofs(S)
    }

    fn penalty(&self, cell: usize, local_face: usize) -> f64 {
        self.space.face_penalty(cell, local_face) * self.operator.penalty_scaling()
    }

    fn check_solution(&self, solution: &DVector<f64>) -> eyre::Result<()> {
        ensure!(
            solution.len() == self.num_dofs(),
            "Solution vector has length {}, but the space has {} unknowns",
            solution.len(),
            self.num_dofs()
        );
        Ok(())
    }

    /// Assembles the residual into `residual`, and adds the Jacobian into `jacobian` if
    /// requested by `flags`.
    ///
    /// The residual is overwritten, while Jacobian contributions are added to the existing
    /// entries of the accumulator.
    pub fn assemble(
        &self,
        solution: &DVector<f64>,
        flags: AssemblyFlags,
        residual: &mut DVector<f64>,
        mut jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        self.check_solution(solution)?;
        let n = self.num_dofs();
        ensure!(
            residual.len() == n,
            "Residual vector has length {}, expected {n}",
            residual.len()
        );
        if let Some(jacobian) = &jacobian {
            ensure!(
                (jacobian.nrows(), jacobian.ncols()) == (n, n),
                "Jacobian accumulator has shape {:?}, expected {:?}",
                (jacobian.nrows(), jacobian.ncols()),
                (n, n)
            );
        }

        debug!(
            "Assembling DG system with {} cells, {} boundary faces and {} interior faces ({} unknowns)",
            self.space.num_cells(),
            self.space.boundary_faces().len(),
            self.space.interior_faces().len(),
            n
        );

        residual.fill(0.0);
        with_thread_local_workspace(&SYSTEM_WORKSPACE, |ws: &mut SystemWorkspace<D>| {
            for cell in 0..self.space.num_cells() {
                self.assemble_cell_into(cell, solution, flags, ws, residual, jacobian.as_deref_mut())?;
            }
            for face in self.space.boundary_faces() {
                self.assemble_boundary_face_into(face, solution, flags, ws, residual, jacobian.as_deref_mut())?;
            }
            for face in self.space.interior_faces() {
                self.assemble_interior_face_into(face, solution, flags, ws, residual, jacobian.as_deref_mut())?;
            }
            Ok(())
        })
    }

    /// Assembles the residual and, if requested, the Jacobian in parallel.
    ///
    /// Every thread accumulates into its own residual and triplet list, which are combined once
    /// all entities have been visited.
    pub fn assemble_par(
        &self,
        solution: &DVector<f64>,
        flags: AssemblyFlags,
    ) -> eyre::Result<(DVector<f64>, Option<CooMatrix<f64>>)> {
        self.check_solution(solution)?;
        let n = self.num_dofs();
        debug!(
            "Assembling DG system in parallel with {} cells, {} boundary faces and {} interior faces ({} unknowns)",
            self.space.num_cells(),
            self.space.boundary_faces().len(),
            self.space.interior_faces().len(),
            n
        );

        let accumulators: ThreadLocal<RefCell<ParallelAccumulator>> = ThreadLocal::new();
        let with_accumulator = |f: &dyn Fn(&mut SystemWorkspace<D>, &mut ParallelAccumulator) -> eyre::Result<()>| {
            let mut accumulator = accumulators
                .get_or(|| RefCell::new(ParallelAccumulator::new(n, flags.compute_jacobian)))
                .borrow_mut();
            with_thread_local_workspace(&SYSTEM_WORKSPACE, |ws: &mut SystemWorkspace<D>| f(ws, &mut *accumulator))
        };

        (0..self.space.num_cells())
            .into_par_iter()
            .try_for_each(|cell| {
                with_accumulator(&|ws, acc| {
                    let jacobian = acc.jacobian.as_mut().map(|j| j as &mut dyn JacobianAccumulator);
                    self.assemble_cell_into(cell, solution, flags, ws, &mut acc.residual, jacobian)
                })
            })?;

        self.space
            .boundary_faces()
            .par_iter()
            .try_for_each(|face| {
                with_accumulator(&|ws, acc| {
                    let jacobian = acc.jacobian.as_mut().map(|j| j as &mut dyn JacobianAccumulator);
                    self.assemble_boundary_face_into(face, solution, flags, ws, &mut acc.residual, jacobian)
                })
            })?;

        self.space
            .interior_faces()
            .par_iter()
            .try_for_each(|face| {
                with_accumulator(&|ws, acc| {
                    let jacobian = acc.jacobian.as_mut().map(|j| j as &mut dyn JacobianAccumulator);
                    self.assemble_interior_face_into(face, solution, flags, ws, &mut acc.residual, jacobian)
                })
            })?;

        let mut residual = DVector::zeros(n);
        let mut jacobian = flags.compute_jacobian.then(|| CooMatrix::new(n, n));
        for accumulator in accumulators.into_iter() {
            let accumulator = accumulator.into_inner();
            residual += accumulator.residual;
            if let (Some(jacobian), Some(local)) = (&mut jacobian, accumulator.jacobian) {
                for (i, j, v) in local.triplet_iter() {
                    jacobian.push(i, j, *v);
                }
            }
        }
        Ok((residual, jacobian))
    }

    /// Evaluates the residual only.
    pub fn residual(&self, solution: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        let mut residual = DVector::zeros(self.num_dofs());
        self.assemble(solution, AssemblyFlags::residual_only(), &mut residual, None)?;
        Ok(residual)
    }

    /// Evaluates the residual and its Jacobian, stored in a CSR matrix with the sparsity
    /// pattern given by [`dg_sparsity_pattern`](crate::assembly::dg_sparsity_pattern).
    pub fn residual_and_jacobian(
        &self,
        solution: &DVector<f64>,
        use_split_form: bool,
    ) -> eyre::Result<(DVector<f64>, CsrMatrix<f64>)> {
        let flags = AssemblyFlags {
            compute_jacobian: true,
            use_split_form,
        };
        let mut residual = DVector::zeros(self.num_dofs());
        let mut jacobian = dg_csr_matrix(self.space, S)?;
        self.assemble(solution, flags, &mut residual, Some(&mut jacobian))?;
        Ok((residual, jacobian))
    }

    fn assemble_cell_into(
        &self,
        cell: usize,
        solution: &DVector<f64>,
        flags: AssemblyFlags,
        ws: &mut SystemWorkspace<D>,
        residual: &mut DVector<f64>,
        jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        self.space.populate_volume_values(cell, &mut ws.volume_values);
        self.space.populate_flux_basis(cell, &mut ws.flux_basis);
        self.space.populate_cell_dofs(cell, S, &mut ws.dofs_int);
        gather(solution, &ws.dofs_int, &mut ws.coefficients_int);
        self.operator.assemble_cell(
            &ws.volume_values,
            &ws.flux_basis,
            &ws.dofs_int,
            &ws.coefficients_int,
            flags,
            residual,
            jacobian,
        )
    }

    fn assemble_boundary_face_into(
        &self,
        face: &BoundaryFace,
        solution: &DVector<f64>,
        flags: AssemblyFlags,
        ws: &mut SystemWorkspace<D>,
        residual: &mut DVector<f64>,
        jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        self.space
            .populate_face_values(face.cell, face.local_face, &mut ws.face_values_int);
        self.space.populate_cell_dofs(face.cell, S, &mut ws.dofs_int);
        gather(solution, &ws.dofs_int, &mut ws.coefficients_int);
        self.operator.assemble_boundary_face(
            &ws.face_values_int,
            &ws.dofs_int,
            &ws.coefficients_int,
            face.boundary_id,
            self.penalty(face.cell, face.local_face),
            flags,
            residual,
            jacobian,
        )
    }

    fn assemble_interior_face_into(
        &self,
        face: &InteriorFace,
        solution: &DVector<f64>,
        flags: AssemblyFlags,
        ws: &mut SystemWorkspace<D>,
        residual: &mut DVector<f64>,
        jacobian: Option<&mut (dyn JacobianAccumulator + '_)>,
    ) -> eyre::Result<()> {
        self.space
            .populate_face_values(face.cell_int, face.face_int, &mut ws.face_values_int);
        self.space
            .populate_face_values(face.cell_ext, face.face_ext, &mut ws.face_values_ext);
        self.space.populate_cell_dofs(face.cell_int, S, &mut ws.dofs_int);
        self.space.populate_cell_dofs(face.cell_ext, S, &mut ws.dofs_ext);
        gather(solution, &ws.dofs_int, &mut ws.coefficients_int);
        gather(solution, &ws.dofs_ext, &mut ws.coefficients_ext);
        let penalty = self
            .penalty(face.cell_int, face.face_int)
            .max(self.penalty(face.cell_ext, face.face_ext));
        self.operator.assemble_interior_face(
            &ws.face_values_int,
            &ws.face_values_ext,
            &ws.dofs_int,
            &ws.dofs_ext,
            &ws.coefficients_int,
            &ws.coefficients_ext,
            penalty,
            flags,
            residual,
            jacobian,
        )
    }
}
