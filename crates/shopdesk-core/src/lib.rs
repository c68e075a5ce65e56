//! Client-side state for the shop console: who is logged in, what the user
//! should be told, and where they are allowed to go.
//!
//! Nothing in this crate touches the network; see `shopdesk-client` for the
//! API gateway, presence channel and idle watchdog built on top of it.

pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod route;
pub mod session;
pub mod ui_state;

// Re-export common types
pub use config::{ClientConfig, InputKind};
pub use context::ClientContext;
pub use error::{Result, ShopError};
pub use notify::{Notification, NotificationBus, NotifyStatus};
pub use session::{Identity, Session, SessionStore};
pub use ui_state::{PageParams, StatusFlag, UiStore};
