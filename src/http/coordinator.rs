//! Single-flight token refresh.
//!
//! The first caller that hits an auth failure while the coordinator is idle
//! runs the refresh. Every caller that arrives while it is in flight is parked
//! in a FIFO queue and released, in order, with the same outcome once the
//! refresh settles.
//!
//! On failure the credential slot is cleared and the navigator is sent to the
//! login route, so no request is ever retried against a known-bad token. If the
//! refreshing task is dropped instead, parked callers get
//! [`AuthError::RefreshCancelled`] and the session is left untouched.

use crate::auth::TokenRefresher;
use crate::error::AuthError;
use crate::router::navigator::Navigator;
use crate::store::{CredentialStore, Token};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Outcome = Result<Token, AuthError>;

/// A caller waiting for the in-flight refresh to settle.
type Waiter = oneshot::Sender<Outcome>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
}

/// Owns the refresh gate and the queue of parked callers.
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    timeout: Option<Duration>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            refresher,
            store,
            navigator,
            login_path: login_path.into(),
            timeout: None,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Treat a refresh that takes longer than `timeout` as failed.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether a refresh call is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of callers parked behind the in-flight refresh.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Obtain a fresh token after an auth failure.
    ///
    /// Starts a refresh if none is in flight, otherwise waits for the current
    /// one. All callers of one refresh receive the same token or the same error.
    pub async fn acquire_token(&self) -> Result<Token, AuthError> {
        let parked = {
            let mut state = self.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                debug!(queued = state.queue.len(), "Refresh in flight, parking request");
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        match parked {
            // A dropped sender means the refresh was abandoned.
            Some(rx) => rx.await.unwrap_or(Err(AuthError::RefreshCancelled)),
            None => self.run_refresh().await,
        }
    }

    /// Drop the session without attempting a refresh.
    pub fn abandon_session(&self) {
        warn!("Clearing session and redirecting to {}", self.login_path);
        self.store.clear();
        self.navigator.redirect(&self.login_path);
    }

    async fn run_refresh(&self) -> Outcome {
        let mut in_flight = InFlight {
            coordinator: self,
            settled: false,
        };

        info!("Refreshing token");
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.refresher.refresh_token()).await {
                Ok(token) => token.ok_or(AuthError::RefreshExhausted),
                Err(_) => {
                    warn!("Token refresh did not finish within {:?}", limit);
                    Err(AuthError::RefreshTimedOut)
                }
            },
            None => self
                .refresher
                .refresh_token()
                .await
                .ok_or(AuthError::RefreshExhausted),
        };

        in_flight.settled = true;
        self.settle(outcome)
    }

    fn settle(&self, outcome: Outcome) -> Outcome {
        if let Ok(token) = &outcome {
            self.store.set(token.clone());
        }

        let waiters = self.finish();
        let released = waiters.len();
        for waiter in waiters {
            // The receiver may have given up; nothing to deliver then.
            let _ = waiter.send(outcome.clone());
        }

        match &outcome {
            Ok(_) => info!(released, "Token refresh succeeded"),
            Err(e) => {
                warn!(released, "Token refresh failed: {}", e);
                self.abandon_session();
            }
        }

        outcome
    }

    /// Return to idle and hand back the parked callers in FIFO order.
    fn finish(&self) -> VecDeque<Waiter> {
        let mut state = self.lock();
        state.refreshing = false;
        std::mem::take(&mut state.queue)
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases parked callers if the refreshing task is cancelled mid-flight.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("Token refresh abandoned before completion");
        for waiter in self.coordinator.finish() {
            let _ = waiter.send(Err(AuthError::RefreshCancelled));
        }
    }
}
