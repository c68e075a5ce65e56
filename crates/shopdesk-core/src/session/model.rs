use serde::{Deserialize, Serialize};

/// Privilege rank of an anonymous session. Lower ranks are more privileged.
pub const ANONYMOUS_LEVEL: i32 = 99;

/// Shift label shown before a shift is chosen.
pub const UNSET_SHIFT: &str = "unset";

/// The client-held record of who is logged in.
///
/// A session is authenticated exactly when `token` is non-empty. The
/// anonymous sentinel has an empty username and token, the lowest privilege
/// level and the unset shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
    pub level: i32,
    pub shift: String,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            token: String::new(),
            level: ANONYMOUS_LEVEL,
            shift: UNSET_SHIFT.to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// The identity returned by a successful login.
///
/// The server answers login with its user record, where the bearer token is
/// stored as `access_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default = "default_level")]
    pub level: i32,
}

fn default_level() -> i32 {
    ANONYMOUS_LEVEL
}

impl Identity {
    pub fn new(username: impl Into<String>, token: impl Into<String>, level: i32) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            level,
        }
    }
}
