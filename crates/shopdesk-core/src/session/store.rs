use super::model::{Identity, Session};
use std::sync::Arc;
use tokio::sync::watch;

/// Sole owner of the process-wide [`Session`].
///
/// Every mutation is a synchronous replacement of the whole record, so a
/// reader never observes a half-applied session. Other components read
/// snapshots or `subscribe()` to be told about every mutation.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::anonymous());
        Self { tx: Arc::new(tx) }
    }

    /// Replaces identity fields with a successful login result.
    ///
    /// The display shift is kept; it is chosen separately via [`set_shift`](Self::set_shift).
    pub fn set_session(&self, identity: Identity) {
        self.tx.send_modify(|session| {
            session.username = identity.username;
            session.token = identity.token;
            session.level = identity.level;
        });
        tracing::debug!(username = %self.tx.borrow().username, "[SessionStore] Session set");
    }

    /// Restores a complete session record, including its shift.
    pub fn restore(&self, session: Session) {
        self.tx.send_replace(session);
    }

    pub fn set_shift(&self, shift: impl Into<String>) {
        let shift = shift.into();
        self.tx.send_modify(|session| session.shift = shift);
    }

    /// Resets the session to the anonymous sentinel.
    ///
    /// Returns the previous session if it was authenticated. Clearing an
    /// already anonymous session is a no-op that returns `None` and does not
    /// wake subscribers, so concurrent logout triggers can tell which one
    /// actually ended the session.
    pub fn clear_session(&self) -> Option<Session> {
        let mut previous = None;
        self.tx.send_if_modified(|session| {
            if *session == Session::anonymous() {
                return false;
            }
            let old = std::mem::replace(session, Session::anonymous());
            if old.is_authenticated() {
                previous = Some(old);
            }
            true
        });

        if let Some(old) = &previous {
            tracing::debug!(username = %old.username, "[SessionStore] Session cleared");
        }
        previous
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Username of the authenticated session, `None` when anonymous.
    pub fn authenticated_username(&self) -> Option<String> {
        let session = self.tx.borrow();
        session
            .is_authenticated()
            .then(|| session.username.clone())
    }

    /// Bearer token of the authenticated session, `None` when anonymous.
    pub fn token(&self) -> Option<String> {
        let session = self.tx.borrow();
        session.is_authenticated().then(|| session.token.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::{ANONYMOUS_LEVEL, UNSET_SHIFT};

    #[test]
    fn test_authenticated_tracks_token_after_every_mutation() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());

        store.set_session(Identity::new("u", "t", 1));
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("t"));
        assert_eq!(store.authenticated_username().as_deref(), Some("u"));

        store.clear_session();
        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);

        store.set_session(Identity::new("u", "", 1));
        assert!(!store.is_authenticated());
        assert_eq!(store.authenticated_username(), None);
    }

    #[test]
    fn test_clear_resets_every_field() {
        let store = SessionStore::new();
        store.set_session(Identity::new("clerk", "token", 1));
        store.set_shift("night");

        let previous = store.clear_session().unwrap();
        assert_eq!(previous.username, "clerk");
        assert_eq!(previous.shift, "night");

        let session = store.snapshot();
        assert_eq!(session, Session::anonymous());
        assert_eq!(session.level, ANONYMOUS_LEVEL);
        assert_eq!(session.shift, UNSET_SHIFT);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = SessionStore::new();
        store.set_session(Identity::new("clerk", "token", 1));

        assert!(store.clear_session().is_some());
        assert!(store.clear_session().is_none());
        assert_eq!(store.snapshot(), Session::anonymous());
    }

    #[test]
    fn test_set_session_keeps_shift() {
        let store = SessionStore::new();
        store.set_shift("morning");
        store.set_session(Identity::new("clerk", "token", 3));

        let session = store.snapshot();
        assert_eq!(session.shift, "morning");
        assert_eq!(session.level, 3);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.set_session(Identity::new("clerk", "token", 1));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        store.clear_session();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());

        // Clearing again does not notify
        store.clear_session();
        assert!(!rx.has_changed().unwrap());
    }
}
