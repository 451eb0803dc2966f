//! services/portal/src/adapters/http.rs
//!
//! The Remote API Gateway: a reqwest-backed implementation of the `ApiGateway`
//! port. It owns transport details only: attaching the bearer credential, evicting
//! it on a 401, and turning every failure into one displayable `PortError`.

use async_trait::async_trait;
use pcas_core::domain::ServerEnvelope;
use pcas_core::ports::{ApiGateway, HttpMethod, LocalCache, PortError, PortResult};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persistence;

const HEALTH_PATH: &str = "/api/health";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Gateway adapter that sends JSON requests to the portal REST API.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    cache: Arc<dyn LocalCache>,
}

impl HttpGateway {
    /// Builds the gateway. The credential is read from `cache` on every request,
    /// so an eviction is seen by the very next call.
    pub fn new(base_url: Url, cache: Arc<dyn LocalCache>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url, cache))
    }

    /// Builds the gateway around an already configured client.
    pub fn with_client(client: Client, base_url: Url, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            client,
            base_url,
            cache,
        }
    }

    fn endpoint(&self, path: &str) -> PortResult<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined)
            .map_err(|e| PortError::InvalidInput(format!("invalid request path '{}': {}", path, e)))
    }

    fn evict_credential(&self) {
        if persistence::clear_token(self.cache.as_ref()) {
            debug!("Evicted stored credential after an unauthorized response");
        }
    }
}

//=========================================================================================
// `ApiGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> PortResult<ServerEnvelope> {
        let request_id = Uuid::new_v4();
        let url = self.endpoint(path)?;

        let mut builder = self
            .client
            .request(to_reqwest_method(method), url)
            .header(ACCEPT, "application/json")
            .header("x-request-id", request_id.to_string());
        if let Some(token) = persistence::load_token(self.cache.as_ref()) {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        debug!(%request_id, method = method.as_str(), path, "Sending API request");
        let response = builder.send().await.map_err(|e| {
            warn!(%request_id, path, "API request failed before a response: {}", e);
            PortError::network()
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!(%request_id, path, "Failed to read API response body: {}", e);
            PortError::network()
        })?;
        debug!(%request_id, status = status.as_u16(), "Received API response");

        if status == StatusCode::UNAUTHORIZED {
            self.evict_credential();
        }
        if !status.is_success() {
            return Err(normalize_failure(status, bytes.as_ref()));
        }
        parse_envelope(status, bytes.as_ref())
    }

    async fn health(&self) -> PortResult<()> {
        let url = self.endpoint(HEALTH_PATH)?;
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("Health check failed: {}", e);
            PortError::network()
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.unwrap_or_default();
        Err(normalize_failure(status, bytes.as_ref()))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}

//=========================================================================================
// Response Mapping
//=========================================================================================

/// The fields an error response may carry.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

/// Decodes a successful response. A body explicitly marked `success: false`
/// is treated as a failure even under a 2xx status.
fn parse_envelope(status: StatusCode, body: &[u8]) -> PortResult<ServerEnvelope> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ServerEnvelope::ok(Value::Null));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PortError::Unexpected(format!("invalid JSON in API response: {}", e)))?;
    if value.get("success") == Some(&Value::Bool(false)) {
        return Err(normalize_failure(status, body));
    }
    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("unexpected API response shape: {}", e)))
}

/// Prefers the server's field-error list, then its single message, then a
/// status-based fallback.
fn normalize_failure(status: StatusCode, body: &[u8]) -> PortError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let field_errors: Vec<String> = parsed.errors.iter().filter_map(error_text).collect();
    let message = parsed
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    if status == StatusCode::UNAUTHORIZED {
        let text = if field_errors.is_empty() {
            message.unwrap_or_else(|| "Unauthorized".to_string())
        } else {
            field_errors.join(", ")
        };
        return PortError::Unauthorized(text);
    }
    if !field_errors.is_empty() {
        return PortError::Validation(field_errors);
    }
    PortError::Rejected {
        status: status.as_u16(),
        message: message
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16())),
    }
}

/// Field errors arrive either as plain strings or as `{ msg | message }` objects.
fn error_text(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("msg")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for the non-network response mapping helpers.

    use super::*;
    use rstest::rstest;

    #[test]
    fn joins_field_error_lists() {
        let body = br#"{"success":false,"message":"Validation failed","errors":["Email is invalid",{"msg":"Phone is required"}]}"#;
        let error = normalize_failure(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            error,
            PortError::Validation(vec![
                "Email is invalid".to_string(),
                "Phone is required".to_string()
            ])
        );
        assert_eq!(error.to_string(), "Email is invalid, Phone is required");
    }

    #[test]
    fn falls_back_to_single_message() {
        let error = normalize_failure(StatusCode::INTERNAL_SERVER_ERROR, br#"{"message":"server error"}"#);
        assert_eq!(error.to_string(), "server error");
        assert!(matches!(error, PortError::Rejected { status: 500, .. }));
    }

    #[rstest]
    #[case::empty_body(b"".as_slice())]
    #[case::html_body(b"<html>Bad Gateway</html>".as_slice())]
    #[case::blank_message(br#"{"message":"  "}"#.as_slice())]
    fn uses_status_fallback_without_a_message(#[case] body: &[u8]) {
        let error = normalize_failure(StatusCode::BAD_GATEWAY, body);
        assert_eq!(error.to_string(), "Request failed with status code 502");
    }

    #[rstest]
    #[case::with_message(br#"{"message":"Token expired"}"#.as_slice(), "Token expired")]
    #[case::without_body(b"".as_slice(), "Unauthorized")]
    fn maps_401_to_unauthorized(#[case] body: &[u8], #[case] expected: &str) {
        let error = normalize_failure(StatusCode::UNAUTHORIZED, body);
        assert!(error.is_unauthorized(), "401 should map to Unauthorized");
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn success_false_under_2xx_is_a_failure() {
        let error = parse_envelope(StatusCode::OK, br#"{"success":false,"message":"Not allowed"}"#)
            .expect_err("success=false must fail");
        assert_eq!(error.to_string(), "Not allowed");
    }

    #[test]
    fn empty_success_body_is_an_empty_envelope() {
        let envelope = parse_envelope(StatusCode::NO_CONTENT, b"").expect("empty body is fine");
        assert!(envelope.success);
        assert_eq!(envelope.data, Value::Null);
    }

    #[test]
    fn decodes_success_envelope() {
        let envelope = parse_envelope(
            StatusCode::OK,
            br#"{"success":true,"message":"ok","data":{"token":"T1"}}"#,
        )
        .expect("valid envelope should decode");
        let token: String = envelope.field("token").expect("token should decode");
        assert_eq!(token, "T1");
    }
}
