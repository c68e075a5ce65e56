use super::error::ApiError;
use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use futures::future::join_all;
use reqwest::Method;
use serde_json::{Map, Value, json};
use shopdesk_core::route::{ENTRY_ROUTE, Navigator};
use shopdesk_core::{ClientContext, Identity, NotifyStatus, StatusFlag};
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/apis/users/login";
pub const LOGOUT_PATH: &str = "/apis/users/logout";

const EXPIRED_MESSAGE: &str = "Session expired, please log in again";
const EXPIRED_LOGOUT_FAILED: &str = "Session expired, and the server logout failed";
const DEFAULT_BLOB_TYPE: &str = "application/octet-stream";

/// Binary response body with the server-reported content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Blob(Blob),
}

impl ResponseBody {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Blob(_) => None,
        }
    }

    pub fn into_blob(self) -> Option<Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            Self::Json(_) => None,
        }
    }
}

/// Single exit point for REST calls.
///
/// Attaches the bearer token of the current session, drops blank form
/// fields from payloads, and classifies every failure. A 401 carrying
/// [`SIGNATURE_EXPIRED`](super::SIGNATURE_EXPIRED) ends the local session
/// before the error is handed back to the caller.
#[derive(Clone)]
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    ctx: ClientContext,
    navigator: Arc<dyn Navigator>,
    entry_route: String,
}

impl ApiGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        ctx: ClientContext,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            ctx,
            navigator,
            entry_route: ENTRY_ROUTE.to_string(),
        }
    }

    pub fn with_entry_route(mut self, entry_route: impl Into<String>) -> Self {
        self.entry_route = entry_route.into();
        self
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    /// Issues one call.
    ///
    /// With `expect_binary` the body is returned as a [`Blob`]; otherwise it
    /// is parsed as JSON (an empty body reads as `null`).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        expect_binary: bool,
    ) -> Result<ResponseBody, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer: self.ctx.session.token(),
            body: payload.map(strip_empty_fields),
        };

        let result = match self.send(request).await {
            Ok(response) if expect_binary => Ok(ResponseBody::Blob(read_blob(response))),
            Ok(response) => read_json(path, &response).map(ResponseBody::Json),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.on_failure(e).await;
        }
        result
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request_json(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, payload: &Value) -> Result<Value, ApiError> {
        self.request_json(Method::POST, path, Some(payload)).await
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let body = self.request(method, path, payload, false).await?;
        Ok(body.into_json().unwrap_or(Value::Null))
    }

    /// Issues one GET per path concurrently.
    ///
    /// Bodies come back in input order. If any call fails, every failure is
    /// logged and the whole batch fails with [`ApiError::Batch`].
    pub async fn request_many(&self, paths: &[&str]) -> Result<Vec<Value>, ApiError> {
        let bearer = self.ctx.session.token();
        let calls = paths.iter().map(|path| {
            let request = ApiRequest {
                method: Method::GET,
                path: path.to_string(),
                bearer: bearer.clone(),
                body: None,
            };
            async move {
                let response = self.send(request).await?;
                read_json(path, &response)
            }
        });

        let mut bodies = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();
        for (index, result) in join_all(calls).await.into_iter().enumerate() {
            match result {
                Ok(body) => bodies.push(body),
                Err(e) => {
                    tracing::warn!(
                        path = %paths[index],
                        status = ?e.status(),
                        detail = e.detail().unwrap_or_default(),
                        "[Gateway] Batch call failed"
                    );
                    failures.push((index, e));
                }
            }
        }

        if failures.is_empty() {
            return Ok(bodies);
        }

        if failures.iter().any(|(_, e)| e.is_signature_expired()) {
            self.handle_auth_expiry().await;
        }
        Err(ApiError::Batch {
            total: paths.len(),
            failures,
        })
    }

    /// Exchanges credentials for an identity. The session is not touched.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        let payload = json!({ "username": username, "password": password });
        let body = self.post(LOGIN_PATH, &payload).await?;
        serde_json::from_value(body).map_err(|e| ApiError::decode(LOGIN_PATH, e.to_string()))
    }

    /// Tells the server that `username` is logging out. The session is not
    /// touched.
    pub async fn logout(&self, username: &str) -> Result<(), ApiError> {
        self.post(LOGOUT_PATH, &json!({ "username": username }))
            .await
            .map(|_| ())
    }

    /// Ends the local session: clears it, drops the loading flag, tells the
    /// user why, and returns to the entry route.
    ///
    /// Safe to run more than once; the session clear is a plain overwrite.
    pub(crate) async fn complete_logout(&self, status: NotifyStatus, message: &str) {
        self.ctx.session.clear_session();
        self.ctx.ui.set_flag(StatusFlag::Loading, false);
        self.ctx.notifier.notify(status, message);
        self.navigator.navigate(&self.entry_route).await;
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let path = request.path.clone();
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        // Error bodies are JSON in practice; keep raw text otherwise
        let body = serde_json::from_slice(&response.body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&response.body).into_owned())
        });
        Err(ApiError::Status {
            path,
            status: response.status,
            body,
        })
    }

    async fn on_failure(&self, error: &ApiError) {
        tracing::debug!(
            status = ?error.status(),
            detail = error.detail().unwrap_or_default(),
            "[Gateway] {}",
            error
        );

        if error.is_signature_expired() {
            self.handle_auth_expiry().await;
        }
    }

    /// Runs once per expired session: later triggers find the session
    /// already anonymous and return immediately.
    ///
    /// The local cleanup finishes before this returns. The server-side
    /// logout runs in the background and only decides which notification
    /// the user sees.
    async fn handle_auth_expiry(&self) {
        let Some(expired) = self.ctx.session.clear_session() else {
            tracing::debug!("[Gateway] Token expiry already handled");
            return;
        };
        tracing::info!(username = %expired.username, "[Gateway] Token expired, logging out");

        self.ctx.ui.set_flag(StatusFlag::Loading, false);
        self.navigator.navigate(&self.entry_route).await;

        // Best-effort server-side logout with the token we still hold
        let request = ApiRequest {
            method: Method::POST,
            path: LOGOUT_PATH.to_string(),
            bearer: Some(expired.token),
            body: Some(json!({ "username": expired.username })),
        };
        let gateway = self.clone();
        tokio::spawn(async move {
            match gateway.send(request).await {
                Ok(_) => {
                    gateway.ctx.notifier.notify(NotifyStatus::Info, EXPIRED_MESSAGE);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "[Gateway] Logout after token expiry failed");
                    gateway
                        .ctx
                        .notifier
                        .notify(NotifyStatus::Error, EXPIRED_LOGOUT_FAILED);
                }
            }
        });
    }
}

/// Drops keys whose value is the empty string so blank form fields do not
/// overwrite server defaults. `0`, `false` and `null` are kept. Non-object
/// payloads pass through unchanged.
pub(crate) fn strip_empty_fields(payload: &Value) -> Value {
    match payload {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, value)| value.as_str() != Some(""))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

fn read_json(path: &str, response: &ApiResponse) -> Result<Value, ApiError> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| ApiError::decode(path, e.to_string()))
}

fn read_blob(response: ApiResponse) -> Blob {
    Blob {
        content_type: response
            .content_type
            .unwrap_or_else(|| DEFAULT_BLOB_TYPE.to_string()),
        data: response.body,
    }
}
