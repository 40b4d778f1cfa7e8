//! Global error handling.
//!
//! Each sub-crate of the project defines its own error type. Their types
//! can be unified, for example in a driver function, when winding results
//! at the top level.

use fw_cfg::CfgError;
use fw_dataflow::AnalysisError;
use thiserror::Error;

pub type FwResult<T> = Result<T, FwError>;

#[derive(Debug, Error)]
pub enum FwError {
    #[error("control flow graph error: {0}")]
    Cfg(#[from] CfgError),

    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}
