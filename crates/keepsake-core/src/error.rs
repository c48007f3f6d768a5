use keepsake_schema::ScreenId;
use thiserror::Error;

/// Programmer errors raised by the flow core. None of them is recoverable
/// at runtime: the host fixes its configuration or its call order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid transition from {from}: {reason}")]
    InvalidTransition { from: ScreenId, reason: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl FlowError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        FlowError::InvalidConfiguration(message.into())
    }

    pub(crate) fn transition(from: ScreenId, reason: impl Into<String>) -> Self {
        FlowError::InvalidTransition {
            from,
            reason: reason.into(),
        }
    }
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
