use thiserror::Error;

/// Errors surfaced by the dump engine.
///
/// Collectors return these to the session, which logs them and moves on to the
/// next step. Only table discovery failures abort a whole step.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("unable to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    #[error("{command} did not complete (status={status:#x})")]
    Transport { command: &'static str, status: u32 },

    #[error("buffer too small: {supplied} < {required}")]
    SizeTooSmall { required: usize, supplied: usize },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("{0} is not supported on this adapter")]
    Unsupported(&'static str),

    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl DumpError {
    pub fn transport(command: &'static str, status: u32) -> Self {
        DumpError::Transport { command, status }
    }

    /// Short, content-free label used by telemetry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DumpError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            DumpError::Transport { .. } => ErrorKind::TransportFailure,
            DumpError::SizeTooSmall { .. } => ErrorKind::SizeTooSmall,
            DumpError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            DumpError::Unsupported(_) => ErrorKind::UnsupportedOperation,
            DumpError::ConfigIo(_) | DumpError::ConfigParse(_) => ErrorKind::Config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    AllocationFailure,
    TransportFailure,
    SizeTooSmall,
    ProtocolViolation,
    UnsupportedOperation,
    Config,
}

pub type Result<T> = std::result::Result<T, DumpError>;
