//! Live "who is online" feed over a websocket.
//!
//! - `transport`: the connection seam (`PresenceTransport`) and its
//!   tokio-tungstenite implementation
//! - `channel`: connection lifecycle with bounded reconnects (`PresenceChannel`)

mod channel;
mod transport;

pub use channel::{ChannelState, OutboundMessage, PresenceChannel};
pub use transport::{PresenceError, PresenceLink, PresenceTransport, WsPresenceTransport};
