//! The process-wide stores, bundled for injection.

use crate::notify::NotificationBus;
use crate::session::SessionStore;
use crate::ui_state::UiStore;

/// One instance per running client. Cloning shares the same stores; tests
/// build a fresh context each.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub session: SessionStore,
    pub ui: UiStore,
    pub notifier: NotificationBus,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }
}
