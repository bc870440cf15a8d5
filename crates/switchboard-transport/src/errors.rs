use switchboard_shared::SwitchboardError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("queue at capacity")]
    QueueFull,

    #[error("queue closed")]
    QueueClosed,

    #[error("transport disconnected")]
    Disconnected,

    #[error(transparent)]
    Shared(#[from] SwitchboardError),
}

impl From<TransportError> for SwitchboardError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::QueueFull => SwitchboardError::InvalidConfiguration {
                reason: "queue at capacity".into(),
            },
            TransportError::QueueClosed => SwitchboardError::QueueClosed,
            TransportError::Disconnected => SwitchboardError::TransportDisconnected,
            TransportError::Shared(inner) => inner,
        }
    }
}
