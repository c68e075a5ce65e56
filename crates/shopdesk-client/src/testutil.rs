//! In-memory stand-ins for the network seams, shared by unit tests.

use crate::api::{ApiError, ApiRequest, ApiResponse, HttpTransport, SIGNATURE_EXPIRED};
use crate::presence::{PresenceError, PresenceLink, PresenceTransport};
use async_trait::async_trait;
use serde_json::{Value, json};
use shopdesk_core::route::Navigator;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Answers every request with `handler` and records what was sent.
pub struct MockTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<(String, Duration)>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Holds every response for `path` back by `delay`.
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delay = Some((path.to_string(), delay));
        self
    }

    /// Replies 200 with `body` to everything.
    pub fn ok(body: Value) -> Self {
        Self::new(move |_| Ok(ApiResponse::json(200, &body)))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = (self.handler)(&request);
        let delay = self
            .delay
            .as_ref()
            .filter(|(path, _)| *path == request.path)
            .map(|(_, delay)| *delay);
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        // Let concurrent callers interleave like real I/O would
        tokio::task::yield_now().await;
        response
    }
}

pub fn expired_response() -> ApiResponse {
    ApiResponse::json(401, &json!({ "detail": SIGNATURE_EXPIRED }))
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, path: &str) {
        self.visits.lock().unwrap().push(path.to_string());
    }
}

/// Hands out queued links in order; fails once the queue is empty.
#[derive(Default)]
pub struct MockPresenceTransport {
    links: Mutex<VecDeque<PresenceLink>>,
    attempts: Mutex<Vec<(Url, Instant)>>,
}

impl MockPresenceTransport {
    pub fn push_link(&self, link: PresenceLink) {
        self.links.lock().unwrap().push_back(link);
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn attempt_urls(&self) -> Vec<Url> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl PresenceTransport for MockPresenceTransport {
    async fn connect(&self, url: &Url) -> Result<PresenceLink, PresenceError> {
        self.attempts
            .lock()
            .unwrap()
            .push((url.clone(), Instant::now()));
        self.links
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PresenceError::Connect("connection refused".to_string()))
    }
}

/// Server side of a [`PresenceLink`]. Dropping `tx` closes the connection.
pub struct ServerEnd {
    pub tx: mpsc::UnboundedSender<String>,
    pub rx: mpsc::UnboundedReceiver<String>,
}

pub fn link_pair() -> (PresenceLink, ServerEnd) {
    let (outbound, rx) = mpsc::unbounded_channel();
    let (tx, inbound) = mpsc::unbounded_channel();
    (PresenceLink { outbound, inbound }, ServerEnd { tx, rx })
}
