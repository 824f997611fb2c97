//! ==============================================================================
//! session.rs - bearer session and the login/register gateway
//! ==============================================================================
//!
//! purpose:
//!     the session is an explicit object passed by reference to whatever needs
//!     credentials. login and logout are its only mutators. the gateway turns
//!     username/password into a session token against `/auth/*`.
//!
//! persistence:
//!     the cli keeps the token in a one-line file between invocations. an
//!     anonymous session removes the file.
//!
//! ==============================================================================

use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::error::ConsoleError;
use crate::transport::{ApiRequest, Transport};

/// Where the user should land after an auth transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn login(&mut self, token: impl Into<String>) -> Surface {
        self.token = Some(token.into());
        Surface::Dashboard
    }

    pub fn logout(&mut self) -> Surface {
        self.token = None;
        Surface::Login
    }

    /// Attach the bearer token to an outgoing request.
    ///
    /// Fails with `AuthRequired` when there is no token, so an
    /// unauthenticated call never reaches the transport.
    pub fn authorize(&self, request: ApiRequest) -> Result<ApiRequest, ConsoleError> {
        match &self.token {
            Some(token) => Ok(request.with_bearer(token.as_str())),
            None => Err(ConsoleError::AuthRequired),
        }
    }

    /// Load a previously persisted session; a missing file is an anonymous session.
    pub fn restore(path: &Path) -> Result<Self, ConsoleError> {
        if !path.exists() {
            return Ok(Self::anonymous());
        }
        let token = std::fs::read_to_string(path)?.trim().to_string();
        Ok(Self { token: (!token.is_empty()).then_some(token) })
    }

    pub fn persist(&self, path: &Path) -> Result<(), ConsoleError> {
        match &self.token {
            Some(token) => std::fs::write(path, format!("{}\n", token))?,
            None if path.exists() => std::fs::remove_file(path)?,
            None => {}
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

pub struct AuthGateway {
    transport: Arc<dyn Transport>,
}

impl AuthGateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST /auth/login`; on success the session carries the returned token.
    pub async fn login(&self, session: &mut Session, username: &str, password: &str) -> Result<Surface, ConsoleError> {
        let body = credentials_body(username, password)?;
        if session.is_authenticated() {
            tracing::warn!("[AUTH] Already logged in, replacing the current session");
        }

        let response = self
            .transport
            .send(ApiRequest::post("/auth/login", body))
            .await
            .map_err(|e| ConsoleError::AuthFailed(e.to_string()))?;
        if response.status != 200 {
            tracing::warn!("[AUTH] Login rejected with status {}", response.status);
            return Err(ConsoleError::AuthFailed("please check your credentials".to_string()));
        }

        let token = response
            .json::<LoginResponse>()
            .ok()
            .and_then(|r| r.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConsoleError::AuthFailed("no token received".to_string()))?;

        tracing::info!("[AUTH] Logged in as {}", username);
        Ok(session.login(token))
    }

    /// `POST /auth/register`. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), ConsoleError> {
        let body = credentials_body(username, password)?;
        let response = self
            .transport
            .send(ApiRequest::post("/auth/register", body))
            .await
            .map_err(|e| ConsoleError::AuthFailed(e.to_string()))?;
        if !response.is_success() {
            tracing::warn!("[AUTH] Registration rejected with status {}", response.status);
            return Err(ConsoleError::AuthFailed(format!(
                "registration rejected (status {})",
                response.status
            )));
        }
        tracing::info!("[AUTH] Registered {}", username);
        Ok(())
    }
}

fn credentials_body(username: &str, password: &str) -> Result<serde_json::Value, ConsoleError> {
    if username.trim().is_empty() {
        return Err(ConsoleError::ValidationFailed("username is required".to_string()));
    }
    if password.is_empty() {
        return Err(ConsoleError::ValidationFailed("password is required".to_string()));
    }
    Ok(json!({ "username": username, "password": password }))
}
