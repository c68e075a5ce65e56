//! Process-wide queue of transient user-facing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Severity tag of a notification. The set is open: any other tag is kept
/// verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotifyStatus {
    Info,
    Success,
    Warning,
    Error,
    Custom(String),
}

impl NotifyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Custom(tag) => tag,
        }
    }
}

impl From<&str> for NotifyStatus {
    fn from(tag: &str) -> Self {
        match tag {
            "info" => Self::Info,
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for NotifyStatus {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<NotifyStatus> for String {
    fn from(status: NotifyStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for NotifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One or more text lines; lets `notify` take a single message or a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages(Vec<String>);

impl From<&str> for Messages {
    fn from(message: &str) -> Self {
        Self(vec![message.to_string()])
    }
}

impl From<String> for Messages {
    fn from(message: String) -> Self {
        Self(vec![message])
    }
}

impl From<Vec<String>> for Messages {
    fn from(messages: Vec<String>) -> Self {
        Self(messages)
    }
}

impl From<Vec<&str>> for Messages {
    fn from(messages: Vec<&str>) -> Self {
        Self(messages.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Messages {
    fn from(messages: [&str; N]) -> Self {
        Self(messages.iter().map(|m| m.to_string()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub status: NotifyStatus,
    pub messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct NotifyState {
    /// Number of notifications ever created; source of the next id.
    history_count: u64,
    max_count: usize,
    items: Vec<Notification>,
}

/// Ordered list of live notifications.
///
/// Ids are `notify-<n>` where `n` counts every notification ever created,
/// so an id is never handed out twice even after its notification is gone.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    state: Arc<Mutex<NotifyState>>,
    events: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(NotifyState::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NotifyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a notification and returns its id.
    pub fn notify(&self, status: impl Into<NotifyStatus>, messages: impl Into<Messages>) -> String {
        let notification = {
            let mut state = self.lock();
            let notification = Notification {
                id: format!("notify-{}", state.history_count),
                status: status.into(),
                messages: messages.into().0,
                created_at: Utc::now(),
            };
            state.items.push(notification.clone());
            state.history_count += 1;
            notification
        };

        tracing::debug!(
            id = %notification.id,
            status = %notification.status,
            "[Notify] {}",
            notification.messages.join(" / ")
        );

        // Nobody listening is fine
        let _ = self.events.send(notification.clone());
        notification.id
    }

    /// Removes the notification with `id`. Unknown ids are ignored.
    ///
    /// Returns whether anything was removed.
    pub fn dismiss(&self, id: &str) -> bool {
        let mut state = self.lock();
        match state.items.iter().position(|n| n.id == id) {
            Some(index) => {
                state.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Dismisses `id` once `delay` has elapsed.
    pub fn dismiss_after(&self, id: String, delay: Duration) -> tokio::task::JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.dismiss(&id);
        })
    }

    /// All live notifications in display order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().items.clone()
    }

    /// The most recent `max_count` notifications (all when the cap is 0).
    pub fn visible(&self) -> Vec<Notification> {
        let state = self.lock();
        let skip = match state.max_count {
            0 => 0,
            max => state.items.len().saturating_sub(max),
        };
        state.items[skip..].to_vec()
    }

    pub fn set_max_count(&self, max_count: usize) {
        self.lock().max_count = max_count;
    }

    pub fn history_count(&self) -> u64 {
        self.lock().history_count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
