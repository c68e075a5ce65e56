//! REST access to the shop server.
//!
//! - `transport`: the HTTP seam (`HttpTransport`) and its reqwest implementation
//! - `gateway`: bearer auth, payload cleanup and token-expiry handling (`ApiGateway`)
//! - `error`: `ApiError`

mod error;
mod gateway;
mod transport;

pub use error::{ApiError, SIGNATURE_EXPIRED};
pub use gateway::{ApiGateway, Blob, LOGIN_PATH, LOGOUT_PATH, ResponseBody};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
