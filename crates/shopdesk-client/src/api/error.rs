use serde_json::Value;
use thiserror::Error;

/// `detail` the server sends with a 401 once the bearer token has expired.
pub const SIGNATURE_EXPIRED: &str = "Signature has expired";

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{path} failed with status {status}: {}", detail_text(.body))]
    Status {
        path: String,
        status: u16,
        body: Value,
    },

    /// The request never produced a response.
    #[error("Request to {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    /// Some calls of a concurrent batch failed; holds `(index, error)` pairs.
    #[error("{} of {total} requests failed", .failures.len())]
    Batch {
        total: usize,
        failures: Vec<(usize, ApiError)>,
    },
}

impl ApiError {
    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's `detail` field, if the body carries one as text.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body_detail(body),
            _ => None,
        }
    }

    /// True only for a 401 whose detail is exactly [`SIGNATURE_EXPIRED`].
    /// Any other 401 is an ordinary failure.
    pub fn is_signature_expired(&self) -> bool {
        self.status() == Some(401) && self.detail() == Some(SIGNATURE_EXPIRED)
    }
}

fn body_detail(body: &Value) -> Option<&str> {
    body.get("detail").and_then(Value::as_str)
}

fn detail_text(body: &Value) -> &str {
    body_detail(body).unwrap_or("no detail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(code: u16, body: Value) -> ApiError {
        ApiError::Status {
            path: "/apis/games".to_string(),
            status: code,
            body,
        }
    }

    #[test]
    fn test_signature_expired_classification() {
        assert!(status(401, json!({"detail": "Signature has expired"})).is_signature_expired());
        assert!(!status(401, json!({"detail": "Could not validate credentials"})).is_signature_expired());
        assert!(!status(401, json!({"detail": "Signature has expired."})).is_signature_expired());
        assert!(!status(403, json!({"detail": "Signature has expired"})).is_signature_expired());
        assert!(!status(401, json!("Signature has expired")).is_signature_expired());
        assert!(!ApiError::transport("/apis/games", "refused").is_signature_expired());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = status(404, json!({"detail": "Game not found"}));
        assert_eq!(err.to_string(), "/apis/games failed with status 404: Game not found");

        let err = status(500, json!(null));
        assert_eq!(err.to_string(), "/apis/games failed with status 500: no detail");
    }
}
