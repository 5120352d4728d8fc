//! Bench guard errors.
//!
//! Every variant is advisory: the requested action is not performed and
//! the operator gets a notice. Nothing here is fatal.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BenchError {
    #[error("Machine is offline")]
    MachineOffline,

    #[error("Safety interlock open: close the door before starting")]
    InterlockOpen,

    #[error("A test is already running")]
    RunInProgress,

    #[error("No test is running")]
    NotRunning,

    #[error("No paused test to resume")]
    NotPaused,

    #[error("Cannot remove the last remaining sample")]
    LastSample,

    #[error("Sample not found: {0}")]
    SampleNotFound(u32),

    #[error("No sample selected")]
    NoSampleSelected,

    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

impl BenchError {
    /// Whether the error refers to something that doesn't exist, as opposed
    /// to a refused action.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BenchError::SampleNotFound(_))
    }
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(BenchError::MachineOffline.to_string(), "Machine is offline");
        assert_eq!(BenchError::SampleNotFound(7).to_string(), "Sample not found: 7");
        assert!(BenchError::SampleNotFound(7).is_not_found());
        assert!(!BenchError::LastSample.is_not_found());
    }
}
