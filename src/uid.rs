//! Next-uid allocation. The backend reports the highest uid handed out so far
//! across both kinds; the next one is that plus one. Nothing is cached: every
//! creation form asks again right before it opens.

use std::sync::Arc;

use crate::domain::Uid;
use crate::error::ConsoleError;
use crate::session::Session;
use crate::transport::{ApiRequest, Transport};

pub const CURRENT_UID_PATH: &str = "/sensors/current-uid";

pub struct UidAllocator {
    transport: Arc<dyn Transport>,
}

impl UidAllocator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `GET /sensors/current-uid` + 1. A pure read on the backend.
    pub async fn next_uid(&self, session: &Session) -> Result<Uid, ConsoleError> {
        let request = session.authorize(ApiRequest::get(CURRENT_UID_PATH))?;

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!("[UID] Failed to fetch current uid: {}", e);
            ConsoleError::FetchFailed(format!("current uid: {}", e))
        })?;
        if !response.is_success() {
            tracing::warn!("[UID] Current uid request returned {}", response.status);
            return Err(ConsoleError::FetchFailed(format!(
                "current uid returned {}",
                response.status
            )));
        }

        let current: Uid = response
            .json()
            .map_err(|e| ConsoleError::FetchFailed(format!("current uid is not a number: {}", e)))?;
        let next = current.next().ok_or_else(|| {
            tracing::warn!("[UID] Current uid {} leaves no room for another", current);
            ConsoleError::FetchFailed(format!("current uid {} cannot be incremented", current))
        })?;
        tracing::debug!("[UID] Current {}, next {}", current, next);
        Ok(next)
    }
}
