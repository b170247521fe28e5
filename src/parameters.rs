//! Runtime configuration of the DG discretization.
use crate::assembly::AssemblyFlags;
use crate::flux::{ConvectiveFluxType, DissipativeFluxType};
use eyre::ensure;
use serde::{Deserialize, Serialize};

/// Parameters selecting the numerical fluxes and assembly options.
///
/// All fields are optional when deserializing, missing fields take their default values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgParameters {
    /// Evaluate the convective volume term in two-point split form.
    pub use_split_form: bool,
    /// Compute the Jacobian along with the residual, as needed by implicit time stepping.
    pub compute_jacobian: bool,
    /// Include the source term of the physics model, typically a manufactured solution source.
    pub use_manufactured_source_term: bool,
    pub conv_num_flux: ConvectiveFluxType,
    pub diss_num_flux: DissipativeFluxType,
    /// Factor applied to the penalty parameters of the dissipative flux.
    pub penalty_scaling: f64,
}

impl Default for DgParameters {
    fn default() -> Self {
        Self {
            use_split_form: false,
            compute_jacobian: true,
            use_manufactured_source_term: false,
            conv_num_flux: ConvectiveFluxType::default(),
            diss_num_flux: DissipativeFluxType::default(),
            penalty_scaling: 1.0,
        }
    }
}

impl DgParameters {
    /// Checks that the parameters describe a usable discretization.
    ///
    /// A non-positive penalty scaling is accepted, since it is only harmful for models with
    /// dissipative terms. The operator warns about it on construction.
    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            self.penalty_scaling.is_finite(),
            "Penalty scaling must be finite, got {}",
            self.penalty_scaling
        );
        Ok(())
    }

    pub fn assembly_flags(&self) -> AssemblyFlags {
        AssemblyFlags {
            compute_jacobian: self.compute_jacobian,
            use_split_form: self.use_split_form,
        }
    }
}
