use crate::domain::intent::IntentKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Request {0} is not supported by any registered action")]
    Unsupported(IntentKind),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Logic error: {0}")]
    LogicError(String),
    #[error("Dispatch depth limit of {limit} exceeded while executing {kind}")]
    RecursionLimit { kind: IntentKind, limit: usize },
    #[error("Provider transport error: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
