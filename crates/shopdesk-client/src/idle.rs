//! Logs the user out after a stretch without qualifying input.

use crate::api::ApiGateway;
use shopdesk_core::NotifyStatus;
use shopdesk_core::config::{IdleConfig, InputKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

const IDLE_LOGOUT_MESSAGE: &str = "Logged out due to inactivity";

#[derive(Debug, Default)]
struct WatchdogInner {
    idle_secs: u64,
    /// Whether input events are being counted at all.
    listening: bool,
    cancel: Option<CancellationToken>,
}

/// Counts idle ticks while a session is live.
///
/// Armed on login and disarmed on logout by the lifecycle. Each tick first
/// checks that the session is still authenticated and ends the loop if not,
/// so no tick outlives the session it was counting for.
#[derive(Clone)]
pub struct IdleWatchdog {
    gateway: ApiGateway,
    config: IdleConfig,
    inner: Arc<Mutex<WatchdogInner>>,
}

impl IdleWatchdog {
    pub fn new(gateway: ApiGateway, config: IdleConfig) -> Self {
        Self {
            gateway,
            config,
            inner: Arc::new(Mutex::new(WatchdogInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchdogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts counting from zero. Re-arming replaces the running loop.
    pub fn arm(&self) {
        let cancel = CancellationToken::new();
        {
            let mut inner = self.lock();
            if let Some(previous) = inner.cancel.replace(cancel.clone()) {
                previous.cancel();
            }
            inner.idle_secs = 0;
            inner.listening = true;
        }

        tracing::debug!(
            max_secs = self.config.user_idle_max_secs,
            "[IdleWatchdog] Armed"
        );
        tokio::spawn(self.clone().run(cancel));
    }

    pub fn disarm(&self) {
        let mut inner = self.lock();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
            tracing::debug!("[IdleWatchdog] Disarmed");
        }
        inner.idle_secs = 0;
        inner.listening = false;
    }

    pub fn is_armed(&self) -> bool {
        self.lock().cancel.is_some()
    }

    /// Reports a user input. Returns true if it reset the idle counter.
    pub fn record_input(&self, kind: InputKind) -> bool {
        if !self.config.qualifies(kind) {
            return false;
        }
        let mut inner = self.lock();
        if !inner.listening {
            return false;
        }
        inner.idle_secs = 0;
        true
    }

    pub fn idle_seconds(&self) -> u64 {
        self.lock().idle_secs
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.tick()) => {}
            }

            let Some(username) = self.gateway.context().session.authenticated_username() else {
                tracing::debug!("[IdleWatchdog] Session ended, stopping");
                return;
            };

            let idle_secs = {
                let mut inner = self.lock();
                if cancel.is_cancelled() {
                    return;
                }
                inner.idle_secs += 1;
                inner.idle_secs
            };

            if idle_secs > self.config.user_idle_max_secs {
                self.trigger(&username, idle_secs).await;
            }
        }
    }

    async fn trigger(&self, username: &str, idle_secs: u64) {
        tracing::info!(username = %username, idle_secs, "[IdleWatchdog] Idle limit exceeded");

        match self.gateway.logout(username).await {
            Ok(()) => {
                {
                    let mut inner = self.lock();
                    inner.idle_secs = 0;
                    inner.listening = false;
                }
                self.gateway
                    .complete_logout(NotifyStatus::Info, IDLE_LOGOUT_MESSAGE)
                    .await;
            }
            // A token expiry on the logout call has already ended the session
            Err(_) if !self.gateway.context().session.is_authenticated() => {}
            Err(e) => {
                tracing::warn!(error = %e, "[IdleWatchdog] Logout failed");
                self.gateway
                    .context()
                    .notifier
                    .notify(NotifyStatus::Error, format!("Logout failed: {e}"));
            }
        }
    }
}
