//! ==============================================================================
//! repository.rs - sensor records against the backend
//! ==============================================================================
//!
//! purpose:
//!     reads and mutates sensor records. every operation on a record is routed
//!     by its kind: `/sensors/{kind}` and `/sensors/{kind}/{id}`. there is no
//!     shared resource for mutations.
//!
//! ```text
//!     nothing here caches. after a successful mutation the caller re-fetches
//!     (see board.rs) to observe the new state.
//! ```
//!
//! relationships:
//!     - uses: transport.rs (http), session.rs (bearer token)
//!     - used by: board.rs (refresh, delete), form.rs (create, update)
//!
//! ==============================================================================

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::domain::{RecordId, SensorKind, SensorRecord, SensorValue, Uid};
use crate::error::ConsoleError;
use crate::session::Session;
use crate::transport::{ApiRequest, Transport};

pub fn collection_path(kind: SensorKind) -> String {
    format!("/sensors/{}", kind.segment())
}

/// `/sensors/{kind}/{id}`. The id must stay a single path segment under its
/// kind, so separators, dot segments and pre-escaped text are refused.
pub fn record_path(kind: SensorKind, id: &RecordId) -> Result<String, ConsoleError> {
    let raw = id.as_str();
    let unsafe_char = |c: char| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control();
    if raw.is_empty() || raw == "." || raw == ".." || raw.chars().any(unsafe_char) {
        return Err(ConsoleError::ValidationFailed(format!("'{}' is not a valid record id", raw)));
    }
    Ok(format!("/sensors/{}/{}", kind.segment(), raw))
}

pub struct SensorRepository {
    transport: Arc<dyn Transport>,
}

impl SensorRepository {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `GET /sensors`: every record of both kinds.
    pub async fn list_all(&self, session: &Session) -> Result<Vec<SensorRecord>, ConsoleError> {
        self.fetch_records(session, ApiRequest::get("/sensors")).await
    }

    /// `GET /sensors/{kind}`
    pub async fn list_by_kind(&self, session: &Session, kind: SensorKind) -> Result<Vec<SensorRecord>, ConsoleError> {
        let records = self.fetch_records(session, ApiRequest::get(collection_path(kind))).await?;
        if let Some(stray) = records.iter().find(|r| r.kind != kind) {
            return Err(ConsoleError::FetchFailed(format!(
                "{} listing returned a {} record ({})",
                kind, stray.kind, stray.id
            )));
        }
        Ok(records)
    }

    /// `POST /sensors/{kind}` with `{type, value, uid}`.
    pub async fn create(&self, session: &Session, kind: SensorKind, value: SensorValue, uid: Uid) -> Result<(), ConsoleError> {
        ensure_value_kind(kind, value)?;
        let body = json!({ "type": kind, "value": value, "uid": uid });
        self.mutate(session, ApiRequest::post(collection_path(kind), body)).await?;
        tracing::info!("[SENSORS] Created {} {} (uid {})", kind, value, uid);
        Ok(())
    }

    /// `PUT /sensors/{kind}/{id}` with `{type, value, timestamp}`.
    ///
    /// `kind` only selects the resource; it is never changed on the record.
    pub async fn update(
        &self,
        session: &Session,
        id: &RecordId,
        kind: SensorKind,
        value: SensorValue,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ConsoleError> {
        ensure_value_kind(kind, value)?;
        let body = json!({
            "type": kind,
            "value": value,
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        self.mutate(session, ApiRequest::put(record_path(kind, id)?, body)).await?;
        tracing::info!("[SENSORS] Updated {} {} -> {}", kind, id, value);
        Ok(())
    }

    /// `DELETE /sensors/{kind}/{id}`. Deleting an id that is already gone
    /// reports `MutationFailed`.
    pub async fn remove(&self, session: &Session, id: &RecordId, kind: SensorKind) -> Result<(), ConsoleError> {
        self.mutate(session, ApiRequest::delete(record_path(kind, id)?)).await?;
        tracing::info!("[SENSORS] Deleted {} {}", kind, id);
        Ok(())
    }

    async fn fetch_records(&self, session: &Session, request: ApiRequest) -> Result<Vec<SensorRecord>, ConsoleError> {
        let request = session.authorize(request)?;
        let label = request.describe();

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!("[SENSORS] {} failed: {}", label, e);
            ConsoleError::FetchFailed(format!("{}: {}", label, e))
        })?;
        if !response.is_success() {
            tracing::warn!("[SENSORS] {} returned {}", label, response.status);
            return Err(ConsoleError::FetchFailed(format!("{} returned {}", label, response.status)));
        }

        let records: Vec<SensorRecord> = response.json().map_err(|e| {
            tracing::warn!("[SENSORS] {} returned an unreadable body: {}", label, e);
            ConsoleError::FetchFailed(format!("{}: {}", label, e))
        })?;
        tracing::debug!("[SENSORS] {} -> {} records", label, records.len());
        Ok(records)
    }

    async fn mutate(&self, session: &Session, request: ApiRequest) -> Result<(), ConsoleError> {
        let request = session.authorize(request)?;
        let label = request.describe();

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!("[SENSORS] {} failed: {}", label, e);
            ConsoleError::MutationFailed(format!("{}: {}", label, e))
        })?;

        match response.status {
            200..=299 => Ok(()),
            400 | 422 => {
                tracing::warn!("[SENSORS] {} rejected the payload ({})", label, response.status);
                Err(ConsoleError::ValidationFailed(format!(
                    "{} rejected the payload ({})",
                    label, response.status
                )))
            }
            status => {
                tracing::warn!("[SENSORS] {} returned {}", label, status);
                Err(ConsoleError::MutationFailed(format!("{} returned {}", label, status)))
            }
        }
    }
}

fn ensure_value_kind(kind: SensorKind, value: SensorValue) -> Result<(), ConsoleError> {
    if value.kind() != kind {
        return Err(ConsoleError::ValidationFailed(format!(
            "a {} value cannot be stored as {}",
            value.kind(),
            kind
        )));
    }
    Ok(())
}
