use thiserror::Error;

/// Typed failures at the driver boundary (spec §7: "driver failure" is
/// localised to the driver being restarted, distinct from an operation
/// error on a single async transfer).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to open driver with parameters {parameters:?}: {reason}")]
    OpenFailed { parameters: String, reason: String },

    #[error("driver write failed")]
    WriteFailed(#[from] std::io::Error),

    #[error("driver protocol violation: {0}")]
    ProtocolViolation(String),
}
