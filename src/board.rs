//! ==============================================================================
//! board.rs - the record set as of the last successful fetch
//! ==============================================================================
//!
//! purpose:
//!     holds the client's view of the sensor records and the `loading` flag.
//!     the set is replaced only by a successful fetch; a failed fetch leaves
//!     the previous set in place. mutations never patch it locally, they are
//!     followed by a full refresh.
//!
//! relationships:
//!     - uses: repository.rs (fetch, delete), stats.rs (summary)
//!     - read by: export.rs (subsets), the cli dashboard
//!
//! ==============================================================================

use serde::Serialize;

use crate::domain::{RecordId, SensorKind, SensorRecord};
use crate::error::ConsoleError;
use crate::export::ExportSubset;
use crate::repository::SensorRepository;
use crate::session::Session;
use crate::stats::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindSummary {
    pub kind: SensorKind,
    pub stats: Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub temperature: KindSummary,
    pub luminosity: KindSummary,
}

/// What happened to the record set after a mutation went through.
#[derive(Debug)]
pub enum Resync {
    Refreshed,
    /// the mutation stands but the re-fetch did not; the set is stale
    Stale(ConsoleError),
}

#[derive(Debug, Default)]
pub struct SensorBoard {
    records: Vec<SensorRecord>,
    loading: bool,
}

impl SensorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SensorRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn find(&self, id: &RecordId, kind: SensorKind) -> Option<&SensorRecord> {
        self.records.iter().find(|r| r.kind == kind && &r.id == id)
    }

    /// Records of a subset; `All` lists temperature first, then luminosity.
    pub fn subset(&self, subset: ExportSubset) -> Vec<&SensorRecord> {
        subset
            .kinds()
            .iter()
            .flat_map(|kind| self.records.iter().filter(move |r| r.kind == *kind))
            .collect()
    }

    pub fn summary(&self) -> DashboardSummary {
        let summarize = |kind| KindSummary { kind, stats: Stats::for_kind(&self.records, kind) };
        DashboardSummary {
            temperature: summarize(SensorKind::Temperature),
            luminosity: summarize(SensorKind::Luminosity),
        }
    }

    /// Re-synchronize from `GET /sensors`.
    pub async fn refresh(&mut self, repo: &SensorRepository, session: &Session) -> Result<(), ConsoleError> {
        self.loading = true;
        let result = repo.list_all(session).await;
        self.loading = false;
        self.apply(result)
    }

    /// Re-synchronize from the two per-kind listings, fetched concurrently.
    /// The set is replaced only when both succeed.
    pub async fn refresh_by_kind(&mut self, repo: &SensorRepository, session: &Session) -> Result<(), ConsoleError> {
        self.loading = true;
        let (temperature, luminosity) = tokio::join!(
            repo.list_by_kind(session, SensorKind::Temperature),
            repo.list_by_kind(session, SensorKind::Luminosity),
        );
        self.loading = false;

        let result = temperature.and_then(|mut records| {
            records.extend(luminosity?);
            Ok(records)
        });
        self.apply(result)
    }

    /// Kind-qualified delete followed by a refresh. `Err` means the record
    /// was not deleted; a failed refresh after a delete is `Resync::Stale`.
    pub async fn delete(
        &mut self,
        repo: &SensorRepository,
        session: &Session,
        id: &RecordId,
        kind: SensorKind,
    ) -> Result<Resync, ConsoleError> {
        repo.remove(session, id, kind).await?;
        Ok(self.resync(repo, session).await)
    }

    /// Refresh after a mutation that has already succeeded.
    pub async fn resync(&mut self, repo: &SensorRepository, session: &Session) -> Resync {
        match self.refresh(repo, session).await {
            Ok(()) => Resync::Refreshed,
            Err(e) => Resync::Stale(e),
        }
    }

    fn apply(&mut self, result: Result<Vec<SensorRecord>, ConsoleError>) -> Result<(), ConsoleError> {
        match result {
            Ok(records) => {
                tracing::debug!("[BOARD] Record set refreshed ({} records)", records.len());
                self.records = records;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[BOARD] Keeping {} cached records: {}", self.records.len(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SensorValue;
    use crate::transport::mock::{MockBackend, MOCK_TOKEN};
    use crate::transport::Method;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn setup() -> (Arc<MockBackend>, SensorRepository, Session) {
        let backend = Arc::new(MockBackend::new());
        let mut session = Session::anonymous();
        session.login(MOCK_TOKEN);
        (backend.clone(), SensorRepository::new(backend), session)
    }

    #[tokio::test]
    async fn test_refresh_replaces_set() {
        let (backend, repo, session) = setup();
        backend.seed("temperature", 20.0, 1);
        let mut board = SensorBoard::new();

        board.refresh(&repo, &session).await.unwrap();

        assert_eq!(board.records().len(), 1);
        assert!(!board.is_loading());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_set() {
        let (backend, repo, session) = setup();
        backend.seed("temperature", 20.0, 1);
        let mut board = SensorBoard::new();
        board.refresh(&repo, &session).await.unwrap();

        backend.set_offline(true);
        let result = board.refresh(&repo, &session).await;

        assert!(matches!(result, Err(ConsoleError::FetchFailed(_))));
        assert_eq!(board.records().len(), 1);
        assert!(!board.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_by_kind_orders_and_summarizes() {
        let (backend, repo, session) = setup();
        backend.seed("luminosity", 100.0, 1);
        backend.seed("temperature", 20.0, 2);
        backend.seed("luminosity", 300.0, 3);
        backend.seed("temperature", 22.0, 4);
        let mut board = SensorBoard::new();

        board.refresh_by_kind(&repo, &session).await.unwrap();

        let kinds: Vec<_> = board.subset(ExportSubset::All).iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![SensorKind::Temperature, SensorKind::Temperature, SensorKind::Luminosity, SensorKind::Luminosity]
        );
        let summary = board.summary();
        assert_eq!(summary.temperature.stats.count, 2);
        assert_eq!(summary.temperature.stats.avg, 21.0);
        assert_eq!(summary.luminosity.stats.max, 300.0);
        assert_eq!(board.subset(ExportSubset::Luminosity).len(), 2);
    }

    #[test]
    fn test_empty_board_summary_is_zero() {
        let summary = SensorBoard::new().summary();
        assert_eq!(summary.temperature.stats, Stats::default());
        assert_eq!(summary.luminosity.stats, Stats::default());
    }

    #[tokio::test]
    async fn test_delete_refreshes() {
        let (backend, repo, session) = setup();
        let id = RecordId::new(backend.seed("luminosity", 100.0, 1).to_string());
        backend.seed("temperature", 20.0, 2);
        let mut board = SensorBoard::new();
        board.refresh(&repo, &session).await.unwrap();

        let resync = board.delete(&repo, &session, &id, SensorKind::Luminosity).await.unwrap();

        assert!(matches!(resync, Resync::Refreshed));

        assert_eq!(board.records().len(), 1);
        assert_eq!(board.records()[0].value, SensorValue::Temperature { tenths: 200 });
        assert!(backend.requests().contains(&format!("DELETE /sensors/luminosity/{}", id)));
    }

    #[tokio::test]
    async fn test_deleting_missing_id_keeps_cache() {
        let (backend, repo, session) = setup();
        backend.seed("temperature", 20.0, 1);
        let mut board = SensorBoard::new();
        board.refresh(&repo, &session).await.unwrap();
        let before = board.records().to_vec();

        let result = board
            .delete(&repo, &session, &RecordId::new("999"), SensorKind::Temperature)
            .await;

        assert!(matches!(result, Err(ConsoleError::MutationFailed(_))));
        assert_eq!(board.records(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_stands_when_refresh_fails() {
        let (backend, repo, session) = setup();
        let id = RecordId::new(backend.seed("temperature", 20.0, 1).to_string());
        backend.seed("luminosity", 80.0, 2);
        let mut board = SensorBoard::new();
        board.refresh(&repo, &session).await.unwrap();
        backend.cut(Method::Get, "/sensors");

        let resync = board.delete(&repo, &session, &id, SensorKind::Temperature).await.unwrap();

        assert!(matches!(resync, Resync::Stale(ConsoleError::FetchFailed(_))));
        assert_eq!(backend.records().len(), 1);
        assert_eq!(board.records().len(), 2);
        assert!(!board.is_loading());
    }

    #[tokio::test]
    async fn test_unreadable_listing_keeps_last_set() {
        let (backend, repo, session) = setup();
        backend.seed("temperature", 20.0, 1);
        backend.seed("luminosity", 80.0, 2);
        let mut board = SensorBoard::new();
        board.refresh(&repo, &session).await.unwrap();
        let before = board.records().to_vec();

        backend.respond(Method::Get, "/sensors", 200, json!({ "error": "not a list" }));
        backend.respond(Method::Get, "/sensors/luminosity", 200, Value::Null);

        assert!(matches!(board.refresh(&repo, &session).await, Err(ConsoleError::FetchFailed(_))));
        assert_eq!(board.records(), before.as_slice());
        assert!(matches!(board.refresh_by_kind(&repo, &session).await, Err(ConsoleError::FetchFailed(_))));
        assert_eq!(board.records(), before.as_slice());
    }

    #[test]
    fn test_summary_serializes_per_kind() {
        let summary = SensorBoard::new().summary();
        let value = serde_json::to_value(summary).unwrap();

        assert_eq!(value["temperature"]["kind"], "temperature");
        assert_eq!(value["luminosity"]["stats"]["count"], 0);
        assert_eq!(value["luminosity"]["stats"]["std_dev"], 0.0);
    }
}
