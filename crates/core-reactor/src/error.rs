/// Operation-level failures surfaced at the typed boundary between the
/// reactor and its callers. Callback-level errors (a failed read, an EOF)
/// stay as the raw `errno`-equivalent carried on [`crate::operation::Operation`];
/// this enum is for failures the reactor itself cannot route to a callback.
#[derive(Debug, thiserror::Error)]
pub enum AsyncError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation was cancelled before completion")]
    Cancelled,
}
