use super::transport::{PresenceError, PresenceLink, PresenceTransport};
use serde_json::Value;
use shopdesk_core::config::PresenceConfig;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the delay before the next reconnect attempt.
    Retrying,
}

/// Something to push to the server: raw text, or a JSON value that is
/// serialized first.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Json(Value),
}

impl OutboundMessage {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Default)]
struct ChannelInner {
    retry_count: u32,
    /// Cleared by `disconnect()` so a deliberate close is not retried.
    retry_allowed: bool,
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// Cancels the running driver (its read loop and any pending retry).
    cancel: Option<CancellationToken>,
}

/// Keeps the presence connection up while a user is logged in.
///
/// Every inbound frame is the full list of online users and replaces the
/// stored set. After an unexpected close the channel reconnects after a
/// fixed delay, up to `max_retries` times in a row; a successful open starts
/// the count over. When the retries run out the counter resets and the
/// channel stays down without telling the user.
#[derive(Clone)]
pub struct PresenceChannel {
    transport: Arc<dyn PresenceTransport>,
    base_url: Url,
    config: PresenceConfig,
    inner: Arc<Mutex<ChannelInner>>,
    state: Arc<watch::Sender<ChannelState>>,
    online: Arc<watch::Sender<Vec<String>>>,
}

impl PresenceChannel {
    pub fn new(
        transport: Arc<dyn PresenceTransport>,
        ws_url: &str,
        config: PresenceConfig,
    ) -> Result<Self, PresenceError> {
        let base_url =
            Url::parse(ws_url).map_err(|e| PresenceError::InvalidUrl(format!("{ws_url}: {e}")))?;
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let (online, _) = watch::channel(Vec::new());

        Ok(Self {
            transport,
            base_url,
            config,
            inner: Arc::new(Mutex::new(ChannelInner::default())),
            state: Arc::new(state),
            online: Arc::new(online),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `<ws_url>/ws/<username>`, with the username encoded as one segment.
    pub fn endpoint(&self, username: &str) -> Result<Url, PresenceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PresenceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("ws")
            .push(username);
        Ok(url)
    }

    /// Starts connecting as `username`. Any previous driver is cancelled
    /// first.
    pub fn connect(&self, username: &str) -> Result<(), PresenceError> {
        let url = self.endpoint(username)?;
        let cancel = CancellationToken::new();
        {
            let mut inner = self.lock();
            if let Some(previous) = inner.cancel.replace(cancel.clone()) {
                previous.cancel();
            }
            inner.outbound = None;
            inner.retry_allowed = true;
        }

        tokio::spawn(self.clone().drive(url, cancel));
        Ok(())
    }

    /// Closes the connection on purpose: no reconnect follows, a pending
    /// retry is cancelled, and the online set is cleared.
    pub fn disconnect(&self) {
        {
            let mut inner = self.lock();
            inner.retry_allowed = false;
            inner.retry_count = 0;
            inner.outbound = None;
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            self.state.send_replace(ChannelState::Disconnected);
            self.online.send_replace(Vec::new());
        }
        tracing::debug!("[Presence] Disconnected");
    }

    /// Queues a message on the open connection.
    ///
    /// Returns false when there is no open connection; nothing is buffered
    /// and delivery is never confirmed.
    pub fn send(&self, message: impl Into<OutboundMessage>) -> bool {
        let inner = self.lock();
        match &inner.outbound {
            Some(outbound) => outbound.send(message.into().into_text()).is_ok(),
            None => {
                tracing::debug!("[Presence] Not connected, message dropped");
                false
            }
        }
    }

    pub fn online_users(&self) -> Vec<String> {
        self.online.borrow().clone()
    }

    pub fn subscribe_online(&self) -> watch::Receiver<Vec<String>> {
        self.online.subscribe()
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    async fn drive(self, url: Url, cancel: CancellationToken) {
        loop {
            if !self.set_state(&cancel, ChannelState::Connecting) {
                return;
            }

            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.transport.connect(&url) => result,
            };

            match connected {
                Ok(link) => {
                    if !self.run_link(link, &cancel).await {
                        return;
                    }
                    tracing::info!(url = %url, "[Presence] Connection closed");
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "[Presence] Connect failed"),
            }

            let Some(attempt) = self.next_retry(&cancel) else {
                self.set_state(&cancel, ChannelState::Disconnected);
                return;
            };

            tracing::info!(attempt, "[Presence] Reconnect scheduled");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_delay()) => {}
            }
        }
    }

    /// Serves one open connection. Returns false if cancelled, true when the
    /// connection closed by itself.
    async fn run_link(&self, link: PresenceLink, cancel: &CancellationToken) -> bool {
        let PresenceLink {
            outbound,
            mut inbound,
        } = link;

        {
            let mut inner = self.lock();
            if cancel.is_cancelled() {
                return false;
            }
            inner.retry_count = 0;
            inner.retry_allowed = true;
            inner.outbound = Some(outbound);
            self.state.send_replace(ChannelState::Connected);
        }
        tracing::info!("[Presence] Connected");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                frame = inbound.recv() => match frame {
                    Some(text) => self.apply_snapshot(&text),
                    None => return true,
                },
            }
        }
    }

    /// Decides whether a close is retried; returns the attempt number if so.
    fn next_retry(&self, cancel: &CancellationToken) -> Option<u32> {
        let mut inner = self.lock();
        inner.outbound = None;

        if cancel.is_cancelled() || !inner.retry_allowed {
            return None;
        }
        if inner.retry_count >= self.config.max_retries {
            tracing::info!("[Presence] Reconnect attempts exhausted");
            inner.retry_count = 0;
            return None;
        }
        inner.retry_count += 1;
        self.state.send_replace(ChannelState::Retrying);
        Some(inner.retry_count)
    }

    /// State changes from a driver are taken under the lock so they cannot
    /// land after a `disconnect()`.
    fn set_state(&self, cancel: &CancellationToken, state: ChannelState) -> bool {
        let _inner = self.lock();
        if cancel.is_cancelled() {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn apply_snapshot(&self, text: &str) {
        match serde_json::from_str::<Vec<String>>(text) {
            Ok(users) => {
                tracing::debug!(count = users.len(), "[Presence] Online users updated");
                self.online.send_replace(users);
            }
            Err(_) => tracing::debug!(frame = %text, "[Presence] Ignoring non-snapshot frame"),
        }
    }
}
