//! Authentication session
//!
//! Holds the current [`Credentials`] and serializes reauthentication.
//!
//! Readers take a cheap `Arc` snapshot and never block on a refresh in
//! progress. When a request comes back 401, the caller asks for a refresh:
//! at most one task performs the identity exchange while the others are told
//! the refresh is busy and retry later with whatever credentials are current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use cfsync_core::ports::{Credentials, IdentityError, IdentityProvider};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::retry::RetryPolicy;

/// Result of [`AuthSession::try_refresh`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Credentials newer than the caller's snapshot are now current
    Refreshed,
    /// Another task holds the refresh; back off and retry
    Busy,
    /// Every identity exchange attempt failed
    Failed(IdentityError),
}

/// Current credentials plus the single-writer refresh gate
pub struct AuthSession {
    identity: Arc<dyn IdentityProvider>,
    current: RwLock<Arc<Credentials>>,
    refresh_gate: Mutex<()>,
    policy: RetryPolicy,
    refreshes: AtomicU64,
}

impl AuthSession {
    /// Performs the initial identity exchange
    ///
    /// # Errors
    /// Returns the identity error unchanged; failing here is fatal for the daemon
    pub async fn establish(
        identity: Arc<dyn IdentityProvider>,
        policy: RetryPolicy,
    ) -> Result<Self, IdentityError> {
        let creds = identity.authenticate().await?;
        info!(endpoint = creds.endpoint(), "Authenticated");
        Ok(Self::with_credentials(identity, creds, policy))
    }

    /// Builds a session around credentials obtained elsewhere
    pub fn with_credentials(
        identity: Arc<dyn IdentityProvider>,
        creds: Credentials,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            current: RwLock::new(Arc::new(creds)),
            refresh_gate: Mutex::new(()),
            policy,
            refreshes: AtomicU64::new(0),
        }
    }

    /// The credentials to use for the next request
    pub fn snapshot(&self) -> Arc<Credentials> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Number of successful refreshes since the session was established
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Replaces `stale` with fresh credentials, unless someone already did
    ///
    /// # Arguments
    /// * `stale` - The snapshot whose token was rejected
    ///
    /// # Returns
    /// - `Refreshed` if this call (or an earlier one) replaced `stale`
    /// - `Busy` if another task is refreshing right now
    /// - `Failed` if the identity exchange failed `max_attempts` times
    pub async fn try_refresh(&self, stale: &Credentials) -> RefreshOutcome {
        if *self.snapshot() != *stale {
            return RefreshOutcome::Refreshed;
        }

        let Ok(_guard) = self.refresh_gate.try_lock() else {
            return RefreshOutcome::Busy;
        };

        // Re-check under the gate: a refresh may have finished in between
        if *self.snapshot() != *stale {
            return RefreshOutcome::Refreshed;
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = IdentityError::Transport("no attempt made".to_string());
        for attempt in 1..=max_attempts {
            match self.identity.authenticate().await {
                Ok(creds) => {
                    self.install(creds);
                    let count = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(attempt, refreshes = count, "Reauthenticated");
                    return RefreshOutcome::Refreshed;
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Reauthentication attempt failed");
                    last = e;
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        error!(error = %last, "Reauthentication failed");
        RefreshOutcome::Failed(last)
    }

    fn install(&self, creds: Credentials) {
        let fresh = Arc::new(creds);
        match self.current.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("current", &self.snapshot())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}
