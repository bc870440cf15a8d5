use std::sync::Arc;

use switchboard_shared::config::RetryPolicyConfig;
use switchboard_shared::ProcessingResult;

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Pipeline stage 6: re-invokes a transiently-failing inner step according
/// to [`RetryPolicyConfig`]. `max_attempts` counts *additional* retries
/// after the first invocation, so the handler runs at most `max_attempts +
/// 1` times total before the failure is surfaced to stage 7 (outbox) and
/// ultimately the consumer's dead-letter path.
///
/// Cancellation is checked between attempts: a cancelled token aborts the
/// retry loop and returns the last result without sleeping further.
pub struct RetryDecorator {
    policy: RetryPolicyConfig,
}

impl RetryDecorator {
    pub fn new(policy: RetryPolicyConfig) -> Self {
        Self { policy }
    }
}

impl Decorator for RetryDecorator {
    fn wrap(&self, next: Step) -> Step {
        let policy = self.policy.clone();

        Arc::new(move |message, mut ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            let policy = policy.clone();

            Box::pin(async move {
                let mut attempt = 1;
                loop {
                    let (new_ctx, result) = next(Arc::clone(&message), ctx, cancel.clone()).await;
                    ctx = new_ctx;

                    if !result.is_transient_failure() {
                        return (ctx, result);
                    }

                    if attempt > policy.max_attempts || cancel.is_cancelled() {
                        return (ctx, result);
                    }

                    let delay = policy.delay_for(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return (ctx, result),
                    }

                    attempt += 1;
                    ctx.advance_attempt();
                }
            })
        })
    }
}
