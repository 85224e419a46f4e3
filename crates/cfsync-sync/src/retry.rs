//! Bounded retry with reauthentication
//!
//! Every remote call made by the engine (listing pages, uploads, deletes,
//! copies) goes through [`run_with_reauth`]:
//!
//! 1. Take a credentials snapshot and run the operation.
//! 2. On success, return.
//! 3. On 401, ask the [`AuthSession`] to refresh. If this caller performed or
//!    observed a refresh, retry at once. If another task is refreshing, sleep
//!    the backoff and retry with whatever credentials are current by then.
//! 4. On a local I/O failure, give up immediately.
//! 5. On anything else, sleep the backoff and retry.
//!
//! No sleep follows the final attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cfsync_core::config::RetryConfig;
use cfsync_core::ports::{Credentials, IdentityError, StoreError};
use tracing::{debug, info, warn};

use crate::session::{AuthSession, RefreshOutcome};

/// Attempt budget and fixed backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff(),
        }
    }
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded
    Done(T),
    /// Every attempt failed (or a local error made retrying pointless)
    Exhausted { attempts: u32, last: StoreError },
    /// Reauthentication itself failed; the engine cannot continue
    AuthFailed(IdentityError),
}

/// Runs `op` under `policy`, refreshing credentials through `session` on 401
///
/// # Arguments
/// * `session` - Source of credentials snapshots and refreshes
/// * `policy` - Attempt budget and backoff
/// * `action` - Short verb for log lines (`upload`, `delete`, ...)
/// * `subject` - Object name or page description for log lines
/// * `op` - The remote call; receives the credentials to use
pub async fn run_with_reauth<T, F, Fut>(
    session: &AuthSession,
    policy: RetryPolicy,
    action: &str,
    subject: &str,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(Arc<Credentials>) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = StoreError::Transport("no attempt made".to_string());

    for attempt in 1..=max_attempts {
        let creds = session.snapshot();

        match op(Arc::clone(&creds)).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(action, subject, attempt, "Succeeded after retry");
                }
                return RetryOutcome::Done(value);
            }
            Err(StoreError::Unauthorized) => {
                debug!(action, subject, attempt, "Token rejected");
                last = StoreError::Unauthorized;
                match session.try_refresh(&creds).await {
                    RefreshOutcome::Refreshed => continue,
                    RefreshOutcome::Busy => {}
                    RefreshOutcome::Failed(e) => return RetryOutcome::AuthFailed(e),
                }
            }
            Err(e @ StoreError::LocalIo(_)) => {
                warn!(action, subject, error = %e, "Local file unavailable, giving up");
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last: e,
                };
            }
            Err(e) => {
                warn!(
                    action,
                    subject,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed"
                );
                last = e;
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    RetryOutcome::Exhausted {
        attempts: max_attempts,
        last,
    }
}
