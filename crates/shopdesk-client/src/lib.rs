//! Network-facing side of the shop console client.
//!
//! Builds on the stores in `shopdesk-core`:
//! - `api`: REST gateway with bearer auth and token-expiry cleanup
//! - `presence`: websocket feed of online users with bounded reconnects
//! - `idle`: inactivity logout
//! - `lifecycle`: starts and stops the above as the session comes and goes

pub mod api;
pub mod idle;
pub mod lifecycle;
pub mod presence;

#[cfg(test)]
mod testutil;

pub use api::{ApiError, ApiGateway, HttpTransport, ReqwestTransport};
pub use idle::IdleWatchdog;
pub use lifecycle::SessionLifecycle;
pub use presence::{ChannelState, PresenceChannel, PresenceTransport, WsPresenceTransport};
