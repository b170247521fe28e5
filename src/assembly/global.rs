use crate::assembly::AssemblyFlags;
use crate::space::DgSpace;
use eyre::{bail, ensure, eyre};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeSet;

/// A global matrix that local Jacobian rows can be added into.
pub trait JacobianAccumulator {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// Adds `values[k]` to entry `(row, cols[k])` for every `k`.
    fn add_row(&mut self, row: usize, cols: &[usize], values: &[f64]) -> eyre::Result<()>;

    /// Checks that every entry of the block `rows × cols` can be added to, without modifying
    /// the matrix.
    fn check_block(&self, rows: &[usize], cols: &[usize]) -> eyre::Result<()> {
        check_block_bounds(self.nrows(), self.ncols(), rows, cols)
    }
}

fn check_block_bounds(nrows: usize, ncols: usize, rows: &[usize], cols: &[usize]) -> eyre::Result<()> {
    if let Some(row) = rows.iter().find(|&&row| row >= nrows) {
        bail!("Row index {row} out of bounds for matrix with {nrows} rows");
    }
    if let Some(col) = cols.iter().find(|&&col| col >= ncols) {
        bail!("Column index {col} out of bounds for matrix with {ncols} columns");
    }
    Ok(())
}

fn check_row(accumulator: &dyn JacobianAccumulator, row: usize, cols: &[usize], values: &[f64]) -> eyre::Result<()> {
    ensure!(
        cols.len() == values.len(),
        "Number of column indices ({}) does not match number of values ({})",
        cols.len(),
        values.len()
    );
    ensure!(
        row < accumulator.nrows(),
        "Row index {row} out of bounds for matrix with {} rows",
        accumulator.nrows()
    );
    if let Some(col) = cols.iter().find(|&&col| col >= accumulator.ncols()) {
        bail!(
            "Column index {col} out of bounds for matrix with {} columns",
            accumulator.ncols()
        );
    }
    Ok(())
}

impl JacobianAccumulator for CooMatrix<f64> {
    fn nrows(&self) -> usize {
        CooMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CooMatrix::ncols(self)
    }

    fn add_row(&mut self, row: usize, cols: &[usize], values: &[f64]) -> eyre::Result<()> {
        check_row(self, row, cols, values)?;
        for (col, value) in cols.iter().zip(values) {
            self.push(row, *col, *value);
        }
        Ok(())
    }
}

impl JacobianAccumulator for DMatrix<f64> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn add_row(&mut self, row: usize, cols: &[usize], values: &[f64]) -> eyre::Result<()> {
        check_row(self, row, cols, values)?;
        for (col, value) in cols.iter().zip(values) {
            self[(row, *col)] += *value;
        }
        Ok(())
    }
}

/// Adds into the existing entries of the matrix.
///
/// Adding to an entry outside the sparsity pattern is an error. A single `add_row` may have
/// partially updated the row when it fails, whereas [`JacobianAccumulator::check_block`] rejects
/// such entries up front.
impl JacobianAccumulator for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn add_row(&mut self, row: usize, cols: &[usize], values: &[f64]) -> eyre::Result<()> {
        check_row(self, row, cols, values)?;
        let mut csr_row = self.row_mut(row);
        let (row_cols, row_values) = csr_row.cols_and_values_mut();
        for (col, value) in cols.iter().zip(values) {
            match row_cols.binary_search(col) {
                Ok(idx) => row_values[idx] += *value,
                Err(_) => bail!("Entry ({row}, {col}) is not part of the sparsity pattern"),
            }
        }
        Ok(())
    }

    fn check_block(&self, rows: &[usize], cols: &[usize]) -> eyre::Result<()> {
        check_block_bounds(self.nrows(), self.ncols(), rows, cols)?;
        for row in rows {
            let csr_row = self.row(*row);
            let row_cols = csr_row.col_indices();
            if let Some(col) = cols.iter().find(|col| row_cols.binary_search(col).is_err()) {
                bail!("Entry ({row}, {col}) is not part of the sparsity pattern");
            }
        }
        Ok(())
    }
}

/// Local buffers for scattering the contributions of a single cell or boundary face.
#[derive(Debug)]
pub(crate) struct ScatterWorkspace {
    pub residual: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    pub row_buffer: Vec<f64>,
}

impl Default for ScatterWorkspace {
    fn default() -> Self {
        Self {
            residual: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, 0),
            row_buffer: Vec::new(),
        }
    }
}

/// Checks that local data can be scattered into a global residual.
pub(crate) fn check_scatter(dofs: &[usize], coefficients: &[f64], residual: &DVector<f64>) -> eyre::Result<()> {
    ensure!(
        dofs.len() == coefficients.len(),
        "Number of global dofs ({}) does not match number of local coefficients ({})",
        dofs.len(),
        coefficients.len()
    );
    if let Some(dof) = dofs.iter().find(|&&dof| dof >= residual.len()) {
        bail!("Global dof {dof} out of bounds for residual of length {}", residual.len());
    }
    Ok(())
}

/// Checks that a Jacobian accumulator is given if and only if the Jacobian is requested.
pub(crate) fn check_accumulator(flags: AssemblyFlags, jacobian: &Option<&mut (dyn JacobianAccumulator + '_)>) -> eyre::Result<()> {
    ensure!(
        flags.compute_jacobian == jacobian.is_some(),
        "A Jacobian accumulator must be provided if and only if the Jacobian is requested"
    );
    Ok(())
}

/// Adds the local block `(row_dofs, col_dofs)` into the global matrix, row by row.
///
/// The block is validated against the matrix first, so that the matrix is left untouched on
/// failure.
pub(crate) fn scatter_block(
    jacobian: &mut (dyn JacobianAccumulator + '_),
    row_dofs: &[usize],
    col_dofs: &[usize],
    block: &DMatrix<f64>,
    row_buffer: &mut Vec<f64>,
) -> eyre::Result<()> {
    ensure!(
        block.shape() == (row_dofs.len(), col_dofs.len()),
        "Local block has shape {:?}, but {} row dofs and {} column dofs were given",
        block.shape(),
        row_dofs.len(),
        col_dofs.len()
    );
    jacobian.check_block(row_dofs, col_dofs)?;
    for (i, row) in row_dofs.iter().enumerate() {
        row_buffer.clear();
        row_buffer.extend(block.row(i).iter());
        jacobian.add_row(*row, col_dofs, row_buffer)?;
    }
    Ok(())
}

/// Computes the sparsity pattern of the DG Jacobian for a system with `nstate` components.
///
/// Every cell couples all its own unknowns, and every interior face couples all unknowns of the
/// two cells sharing it.
pub fn dg_sparsity_pattern<const D: usize>(space: &impl DgSpace<D>, nstate: usize) -> eyre::Result<SparsityPattern> {
    // Collecting into a BTreeSet stores each entry exactly once and yields the entries sorted
    // in row-major order
    let mut matrix_entries = BTreeSet::new();
    let mut dofs_a = Vec::new();
    let mut dofs_b = Vec::new();

    let mut insert_coupling = |a: &[usize], b: &[usize]| {
        for i in a {
            for j in b {
                matrix_entries.insert((*i, *j));
            }
        }
    };

    for cell in 0..space.num_cells() {
        space.populate_cell_dofs(cell, nstate, &mut dofs_a);
        insert_coupling(&dofs_a, &dofs_a);
    }

    for face in space.interior_faces() {
        space.populate_cell_dofs(face.cell_int, nstate, &mut dofs_a);
        space.populate_cell_dofs(face.cell_ext, nstate, &mut dofs_b);
        insert_coupling(&dofs_a, &dofs_b);
        insert_coupling(&dofs_b, &dofs_a);
    }

    let num_rows = space.num_dofs(nstate);
    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::with_capacity(matrix_entries.len());

    offsets.push(0);
    for (i, j) in matrix_entries {
        while i + 1 > offsets.len() {
            // Consecutive empty rows need one offset each
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }

    while offsets.len() < (num_rows + 1) {
        offsets.push(column_indices.len());
    }

    Ok(SparsityPattern::try_from_offsets_and_indices(
        num_rows,
        num_rows,
        offsets,
        column_indices,
    )?)
}

/// Allocates a CSR matrix with the DG sparsity pattern and zero entries.
pub fn dg_csr_matrix<const D: usize>(space: &impl DgSpace<D>, nstate: usize) -> eyre::Result<CsrMatrix<f64>> {
    let pattern = dg_sparsity_pattern(space, nstate)?;
    let values = vec![0.0; pattern.nnz()];
    CsrMatrix::try_from_pattern_and_values(pattern, values).map_err(|err| eyre!("Failed to construct CSR matrix: {err}"))
}
