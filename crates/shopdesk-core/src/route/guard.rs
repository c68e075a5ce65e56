use super::table::RouteTable;
use crate::session::SessionStore;
use crate::ui_state::{StatusFlag, UiStore};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of the pre-navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed(String),
    Redirect(String),
}

/// Gate run before every navigation.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    table: Arc<RouteTable>,
    session: SessionStore,
    ui: UiStore,
    poll_interval: Duration,
}

impl RouteGuard {
    pub fn new(
        table: Arc<RouteTable>,
        session: SessionStore,
        ui: UiStore,
        poll_interval: Duration,
    ) -> Self {
        Self {
            table,
            session,
            ui,
            poll_interval,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Decides whether navigation to `to` may proceed.
    ///
    /// Nothing is decided until the `init` flag is set: the guard sleeps in
    /// short steps until bootstrap has finished.
    pub async fn before_each(&self, to: &str) -> Navigation {
        while !self.ui.flag(StatusFlag::Init) {
            tokio::time::sleep(self.poll_interval).await;
        }

        let route = match self.table.resolve(to) {
            Some(route) => route,
            None => match self.table.not_found() {
                Some(fallback) => return Navigation::Redirect(fallback.to_string()),
                None => return Navigation::Redirect(self.table.entry().to_string()),
            },
        };

        if route.requires_auth && !self.session.is_authenticated() {
            tracing::debug!(to = %to, "[RouteGuard] Not logged in, redirecting to entry");
            return Navigation::Redirect(self.table.entry().to_string());
        }

        Navigation::Proceed(to.to_string())
    }
}
