use switchboard_shared::SwitchboardError;

/// Errors specific to saga processing, narrower than the shared error type
/// the same way `TransportError` narrows it for transport operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SagaError {
    #[error("saga {correlation_id} exceeded its concurrent-update retry budget of {retry_cap}")]
    RetryBudgetExceeded { correlation_id: String, retry_cap: u32 },

    #[error(transparent)]
    Shared(#[from] SwitchboardError),
}

impl From<SagaError> for SwitchboardError {
    fn from(error: SagaError) -> Self {
        match error {
            SagaError::RetryBudgetExceeded { correlation_id, retry_cap } => {
                SwitchboardError::ConcurrentSagaUpdate {
                    correlation_id,
                    expected: retry_cap as u64,
                    actual: retry_cap as u64,
                }
            }
            SagaError::Shared(inner) => inner,
        }
    }
}
