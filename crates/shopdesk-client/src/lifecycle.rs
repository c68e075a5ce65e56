//! Wires the session to everything that depends on it.
//!
//! The lifecycle watches the session store. When a user becomes
//! authenticated it connects presence, arms the idle watchdog and persists
//! the session; when the session ends it undoes all three.

use crate::api::{ApiError, ApiGateway};
use crate::idle::IdleWatchdog;
use crate::presence::PresenceChannel;
use shopdesk_core::config::InputKind;
use shopdesk_core::session::SessionFile;
use shopdesk_core::{ClientContext, Identity, NotifyStatus, Session, StatusFlag};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const LOGOUT_MESSAGE: &str = "Logged out";

#[derive(Clone)]
pub struct SessionLifecycle {
    gateway: ApiGateway,
    presence: PresenceChannel,
    watchdog: IdleWatchdog,
    session_file: Option<SessionFile>,
    observer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionLifecycle {
    pub fn new(
        gateway: ApiGateway,
        presence: PresenceChannel,
        watchdog: IdleWatchdog,
        session_file: Option<SessionFile>,
    ) -> Self {
        Self {
            gateway,
            presence,
            watchdog,
            session_file,
            observer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn context(&self) -> &ClientContext {
        self.gateway.context()
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    pub fn presence(&self) -> &PresenceChannel {
        &self.presence
    }

    pub fn watchdog(&self) -> &IdleWatchdog {
        &self.watchdog
    }

    /// Starts observing the session. Calling it again restarts the observer.
    pub fn start(&self) {
        let rx = self.context().session.subscribe();
        let handle = tokio::spawn(self.clone().observe(rx));

        let mut observer = self.observer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = observer.replace(handle) {
            previous.abort();
        }
    }

    /// Restores a saved session, if any, then marks the client initialized.
    ///
    /// Returns whether a session was restored. A broken session file is
    /// logged and treated as absent.
    pub async fn bootstrap(&self) -> bool {
        let ctx = self.context();
        let mut restored = false;

        if let Some(file) = &self.session_file {
            match file.load().await {
                Ok(Some(session)) => {
                    tracing::info!(username = %session.username, "[Lifecycle] Session restored");
                    ctx.session.restore(session);
                    restored = true;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %file.path().display(), error = %e, "[Lifecycle] Ignoring session file");
                }
            }
        }

        ctx.ui.set_flag(StatusFlag::Init, true);
        restored
    }

    /// Logs in and stores the resulting identity.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        let ctx = self.context();
        ctx.ui.set_flag(StatusFlag::Loading, true);
        let result = self.gateway.login(username, password).await;
        ctx.ui.set_flag(StatusFlag::Loading, false);

        match result {
            Ok(identity) => {
                tracing::info!(username = %identity.username, level = identity.level, "[Lifecycle] Logged in");
                ctx.session.set_session(identity.clone());
                Ok(identity)
            }
            Err(e) => {
                ctx.notifier
                    .notify(NotifyStatus::Error, format!("Login failed: {e}"));
                Err(e)
            }
        }
    }

    /// User-initiated logout. On failure the session is left as it is.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let ctx = self.context();
        let Some(username) = ctx.session.authenticated_username() else {
            return Ok(());
        };

        match self.gateway.logout(&username).await {
            Ok(()) => {
                self.gateway
                    .complete_logout(NotifyStatus::Info, LOGOUT_MESSAGE)
                    .await;
                Ok(())
            }
            Err(e) => {
                if ctx.session.is_authenticated() {
                    ctx.notifier
                        .notify(NotifyStatus::Error, format!("Logout failed: {e}"));
                }
                Err(e)
            }
        }
    }

    /// Forwards a user input to the idle watchdog.
    pub fn record_input(&self, kind: InputKind) -> bool {
        self.watchdog.record_input(kind)
    }

    /// Stops observing and tears down presence and the watchdog. The session
    /// itself is kept so it can be restored next time.
    pub fn shutdown(&self) {
        let handle = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.presence.disconnect();
        self.watchdog.disarm();
    }

    async fn observe(self, mut rx: watch::Receiver<Session>) {
        // Token of the session the dependents were started for. A logout and
        // re-login can reach us as one update, and only the token tells them
        // apart.
        let mut active: Option<String> = None;

        loop {
            let session = rx.borrow_and_update().clone();

            if session.is_authenticated() {
                if active.as_deref() != Some(session.token.as_str()) {
                    self.on_authenticated(&session.username);
                    active = Some(session.token.clone());
                }
                self.persist(&session).await;
            } else if active.take().is_some() {
                self.on_ended().await;
            }

            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn on_authenticated(&self, username: &str) {
        tracing::debug!(username = %username, "[Lifecycle] Session started");
        if let Err(e) = self.presence.connect(username) {
            tracing::warn!(error = %e, "[Lifecycle] Presence not started");
        }
        self.watchdog.arm();
    }

    async fn on_ended(&self) {
        tracing::debug!("[Lifecycle] Session ended");
        self.presence.disconnect();
        self.watchdog.disarm();

        if let Some(file) = &self.session_file {
            if let Err(e) = file.clear().await {
                tracing::warn!(error = %e, "[Lifecycle] Failed to remove session file");
            }
        }
    }

    async fn persist(&self, session: &Session) {
        if let Some(file) = &self.session_file {
            if let Err(e) = file.save(session).await {
                tracing::warn!(error = %e, "[Lifecycle] Failed to save session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, LOGIN_PATH, LOGOUT_PATH};
    use crate::presence::ChannelState;
    use crate::testutil::{MockPresenceTransport, MockTransport, RecordingNavigator};
    use serde_json::json;
    use shopdesk_core::config::{IdleConfig, PresenceConfig};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        lifecycle: SessionLifecycle,
        transport: Arc<MockTransport>,
        presence: Arc<MockPresenceTransport>,
        navigator: Arc<RecordingNavigator>,
        _dir: TempDir,
    }

    fn fixture(transport: MockTransport) -> Fixture {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(transport);
        let presence = Arc::new(MockPresenceTransport::default());
        let navigator = Arc::new(RecordingNavigator::default());

        let gateway = ApiGateway::new(transport.clone(), ClientContext::new(), navigator.clone());
        let channel =
            PresenceChannel::new(presence.clone(), "ws://shop.local", PresenceConfig::default())
                .unwrap();
        let watchdog = IdleWatchdog::new(gateway.clone(), IdleConfig::default());
        let file = SessionFile::new(dir.path().join("session.toml"));

        Fixture {
            lifecycle: SessionLifecycle::new(gateway, channel, watchdog, Some(file)),
            transport,
            presence,
            navigator,
            _dir: dir,
        }
    }

    fn login_server() -> MockTransport {
        MockTransport::new(|request| {
            if request.path == LOGIN_PATH {
                Ok(ApiResponse::json(
                    200,
                    &json!({"username": "clerk", "access_token": "jwt", "level": 1}),
                ))
            } else {
                Ok(ApiResponse::json(200, &json!({})))
            }
        })
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn session_path(fixture: &Fixture) -> std::path::PathBuf {
        fixture
            .lifecycle
            .session_file
            .as_ref()
            .unwrap()
            .path()
            .to_path_buf()
    }

    #[tokio::test]
    async fn test_login_starts_dependents() {
        let fx = fixture(login_server());
        fx.lifecycle.start();

        let identity = fx.lifecycle.login("clerk", "secret").await.unwrap();
        assert_eq!(identity.username, "clerk");
        assert!(fx.lifecycle.context().session.is_authenticated());

        wait_until(|| fx.lifecycle.watchdog().is_armed()).await;
        wait_until(|| !fx.presence.attempt_urls().is_empty()).await;
        assert_eq!(
            fx.presence.attempt_urls()[0].as_str(),
            "ws://shop.local/ws/clerk"
        );

        let path = session_path(&fx);
        wait_until(|| path.exists()).await;
    }

    #[tokio::test]
    async fn test_logout_tears_down_dependents() {
        let fx = fixture(login_server());
        fx.lifecycle.start();
        fx.lifecycle.login("clerk", "secret").await.unwrap();
        wait_until(|| fx.lifecycle.watchdog().is_armed()).await;
        let path = session_path(&fx);
        wait_until(|| path.exists()).await;

        fx.lifecycle.logout().await.unwrap();

        let ctx = fx.lifecycle.context();
        assert!(!ctx.session.is_authenticated());
        assert_eq!(fx.navigator.visits(), vec!["/".to_string()]);
        let notes = ctx.notifier.notifications();
        assert_eq!(notes.last().unwrap().status, NotifyStatus::Info);

        wait_until(|| !fx.lifecycle.watchdog().is_armed()).await;
        wait_until(|| !path.exists()).await;
        assert_eq!(fx.lifecycle.presence().state(), ChannelState::Disconnected);

        let logout = fx
            .transport
            .requests()
            .into_iter()
            .find(|r| r.path == LOGOUT_PATH)
            .unwrap();
        assert_eq!(logout.body, Some(json!({"username": "clerk"})));
        assert_eq!(logout.bearer.as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn test_relogin_in_one_update_restarts_dependents() {
        let fx = fixture(login_server());
        fx.lifecycle.start();
        fx.lifecycle.login("clerk", "secret").await.unwrap();
        wait_until(|| fx.lifecycle.watchdog().is_armed()).await;

        // What an idle logout leaves behind
        fx.lifecycle.watchdog().disarm();

        let session = &fx.lifecycle.context().session;
        session.clear_session();
        session.set_session(Identity::new("clerk", "jwt-2", 1));

        wait_until(|| fx.lifecycle.watchdog().is_armed()).await;
        assert!(fx.lifecycle.record_input(InputKind::PointerDown));
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_session() {
        let fx = fixture(MockTransport::new(|request| {
            if request.path == LOGOUT_PATH {
                Ok(ApiResponse::json(500, &json!({"detail": "boom"})))
            } else {
                Ok(ApiResponse::json(
                    200,
                    &json!({"username": "clerk", "access_token": "jwt", "level": 1}),
                ))
            }
        }));
        fx.lifecycle.login("clerk", "secret").await.unwrap();

        assert!(fx.lifecycle.logout().await.is_err());

        let ctx = fx.lifecycle.context();
        assert!(ctx.session.is_authenticated());
        assert!(fx.navigator.visits().is_empty());
        assert_eq!(
            ctx.notifier.notifications().last().unwrap().status,
            NotifyStatus::Error
        );
    }

    #[tokio::test]
    async fn test_failed_login_notifies() {
        let fx = fixture(MockTransport::new(|_| {
            Ok(ApiResponse::json(400, &json!({"detail": "Incorrect username or password"})))
        }));

        let err = fx.lifecycle.login("clerk", "wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(400));

        let ctx = fx.lifecycle.context();
        assert!(!ctx.session.is_authenticated());
        assert!(!ctx.ui.flag(StatusFlag::Loading));
        let notes = ctx.notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].status, NotifyStatus::Error);
    }

    #[tokio::test]
    async fn test_bootstrap_restores_saved_session() {
        let fx = fixture(login_server());
        let path = session_path(&fx);
        SessionFile::new(path.clone())
            .save(&Session {
                username: "clerk".to_string(),
                token: "jwt".to_string(),
                level: 1,
                shift: "morning".to_string(),
            })
            .await
            .unwrap();

        fx.lifecycle.start();
        assert!(fx.lifecycle.bootstrap().await);

        let ctx = fx.lifecycle.context();
        assert!(ctx.ui.flag(StatusFlag::Init));
        assert_eq!(ctx.session.snapshot().shift, "morning");
        wait_until(|| fx.lifecycle.watchdog().is_armed()).await;
    }

    #[tokio::test]
    async fn test_bootstrap_without_file_still_initializes() {
        let fx = fixture(login_server());

        assert!(!fx.lifecycle.bootstrap().await);
        assert!(fx.lifecycle.context().ui.flag(StatusFlag::Init));
        assert!(!fx.lifecycle.context().session.is_authenticated());
    }

    #[tokio::test]
    async fn test_shutdown_keeps_session_file() {
        let fx = fixture(login_server());
        fx.lifecycle.start();
        fx.lifecycle.login("clerk", "secret").await.unwrap();
        let path = session_path(&fx);
        wait_until(|| path.exists()).await;

        fx.lifecycle.shutdown();
        assert!(!fx.lifecycle.watchdog().is_armed());
        assert_eq!(fx.lifecycle.presence().state(), ChannelState::Disconnected);
        assert!(path.exists());
    }
}
