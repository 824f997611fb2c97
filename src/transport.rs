//! ==============================================================================
//! transport.rs - http transport seam
//! ==============================================================================
//!
//! purpose:
//!     one trait in front of the generic http client so the core never talks
//!     to reqwest directly. requests carry an optional bearer token that the
//!     transport attaches as `Authorization: Bearer <token>`.
//!
//! implementations:
//!     - HttpTransport: reqwest client against a configured base url
//!     - mock::MockBackend (tests only): in-memory backend serving the same
//!       rest surface, with request logging and failure injection
//!
//! relationships:
//!     - used by: repository.rs, uid.rs, session.rs
//!
//! ==============================================================================

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// path below the api base url, starting with `/`
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self { method, path: path.into(), body, bearer: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// `GET /sensors` style label for logs and error messages
    pub fn describe(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// decoded json body; `Null` when empty, a json string when not json
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

// ==============================================================================
// reqwest implementation
// ==============================================================================

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!("[HTTP] {}", request.describe());
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        tracing::debug!("[HTTP] {} -> {}", request.describe(), status);

        Ok(ApiResponse { status, body })
    }
}

// ==============================================================================
// in-memory backend (tests)
// ==============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::put("/sensors/temperature/3", json!({ "value": 1.0 })).with_bearer("t");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.describe(), "PUT /sensors/temperature/3");
        assert_eq!(request.bearer.as_deref(), Some("t"));
        assert!(ApiRequest::delete("/x").body.is_none());
    }

    #[test]
    fn test_response_success_range() {
        let ok = ApiResponse { status: 204, body: Value::Null };
        let missing = ApiResponse { status: 404, body: Value::Null };
        assert!(ok.is_success());
        assert!(!missing.is_success());
        let number = ApiResponse { status: 200, body: json!(12) };
        assert_eq!(number.json::<u64>().unwrap(), 12);
    }

    #[test]
    fn test_http_transport_trims_base_url() {
        let transport = HttpTransport::new("http://localhost:8080/api/").unwrap();
        assert_eq!(transport.base_url, "http://localhost:8080/api");
    }
}
