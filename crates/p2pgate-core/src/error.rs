use thiserror::Error;

/// Errors produced by the p2pgate policy and relay layers.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("registry returned status {status}: {body}")]
    RegistryStatus { status: u16, body: String },

    #[error("registry decode error: {0}")]
    Decode(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type GateResult<T> = Result<T, GateError>;
