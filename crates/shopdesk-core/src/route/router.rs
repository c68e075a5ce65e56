use super::guard::{Navigation, RouteGuard};
use super::table::strip_query;
use crate::error::{Result, ShopError};
use crate::ui_state::{PageParams, UiStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Redirect chains longer than this are treated as a loop.
const MAX_REDIRECTS: usize = 8;

/// Navigation primitive used by components that must move the user
/// elsewhere (e.g. back to the entry route after a forced logout).
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, path: &str);
}

/// Holds the current location and runs the guard on every move.
#[derive(Debug, Clone)]
pub struct Router {
    guard: RouteGuard,
    ui: UiStore,
    current: Arc<watch::Sender<String>>,
}

impl Router {
    pub fn new(guard: RouteGuard, ui: UiStore) -> Self {
        let (current, _rx) = watch::channel(String::new());
        Self {
            guard,
            ui,
            current: Arc::new(current),
        }
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }

    /// Navigates to `path`, following guard redirects, and returns the path
    /// actually landed on.
    pub async fn push(&self, path: &str) -> Result<String> {
        let mut target = path.to_string();

        for _ in 0..=MAX_REDIRECTS {
            match self.guard.before_each(&target).await {
                Navigation::Proceed(landed) => {
                    tracing::debug!(path = %landed, "[Router] Navigated");
                    self.current.send_replace(landed.clone());
                    return Ok(landed);
                }
                Navigation::Redirect(next) => {
                    tracing::debug!(from = %target, to = %next, "[Router] Redirected");
                    target = next;
                }
            }
        }

        Err(ShopError::navigation(format!(
            "Too many redirects while navigating to '{path}'"
        )))
    }

    /// Navigates to a page, handing it `params`.
    ///
    /// Parameters are cached under the page's top-level segment
    /// (`/members/edit` belongs to `members`) and merged into whatever that
    /// page already holds. Every other page's parameters are dropped so
    /// nothing leaks between unrelated pages.
    pub async fn go_page(&self, path: &str, params: Option<PageParams>) -> Result<String> {
        let page = page_of(path);
        self.ui.enter_page(page, params);
        self.push(path).await
    }
}

#[async_trait]
impl Navigator for Router {
    async fn navigate(&self, path: &str) {
        if let Err(e) = self.push(path).await {
            tracing::warn!(path = %path, error = %e, "[Router] Navigation failed");
        }
    }
}

/// Top-level segment of a path: `/members/edit?id=7` -> `members`.
fn page_of(path: &str) -> &str {
    strip_query(path)
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
}
