//! ==============================================================================
//! form.rs - create/edit form lifecycle
//! ==============================================================================
//!
//! purpose:
//!
//! ```text
//!     drives the sensor form as an explicit state machine:
//!
//!         Closed -> Creating -> Saving -> Closed
//!                                  \--> ErrorOpen -> (edit / resubmit)
//!         Closed -> Editing  -> Saving -> Closed
//!                                  \--> ErrorOpen -> (edit / resubmit)
//!
//!     a save is only possible from an open form, and only one save can be
//!     pending at a time. validation runs before anything reaches the
//!     repository; on failure the form stays open with the draft intact.
//! ```
//!
//! rules:
//!     - creating: the uid is allocated on open and submitted verbatim.
//!       without a uid the form cannot be submitted.
//!     - editing: the kind is read-only; the timestamp is edited in the
//!       `YYYY-MM-DDTHH:MM` editor form.
//!     - values are coerced by kind on submit (one fraction digit / integer).
//!
//! relationships:
//!     - uses: uid.rs (allocation), repository.rs (create/update),
//!       board.rs (refresh after a successful save)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use std::mem;

use crate::board::{Resync, SensorBoard};
use crate::domain::{parse_timestamp, RecordId, SensorKind, SensorRecord, SensorValue, Uid};
use crate::error::ConsoleError;
use crate::repository::SensorRepository;
use crate::session::Session;
use crate::uid::UidAllocator;

/// Field values as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    pub kind: Option<SensorKind>,
    pub value: String,
    /// editor timestamp; only used when editing
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenForm {
    Create {
        /// `None` when allocation failed; submission is blocked until a retry succeeds
        uid: Option<Uid>,
        draft: FormDraft,
    },
    Edit {
        record: SensorRecord,
        draft: FormDraft,
    },
}

impl OpenForm {
    pub fn draft(&self) -> &FormDraft {
        match self {
            OpenForm::Create { draft, .. } | OpenForm::Edit { draft, .. } => draft,
        }
    }

    fn draft_mut(&mut self) -> &mut FormDraft {
        match self {
            OpenForm::Create { draft, .. } | OpenForm::Edit { draft, .. } => draft,
        }
    }

    /// uid shown on the form: the allocated one, or the record's own
    pub fn uid(&self) -> Option<Uid> {
        match self {
            OpenForm::Create { uid, .. } => *uid,
            OpenForm::Edit { record, .. } => Some(record.uid),
        }
    }

    pub fn kind_editable(&self) -> bool {
        matches!(self, OpenForm::Create { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormState {
    #[default]
    Closed,
    Open(OpenForm),
    Saving(OpenForm),
    ErrorOpen { form: OpenForm, reason: String },
}

/// Coarse view of `FormState` for display and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Closed,
    Creating,
    Editing,
    Saving,
    ErrorOpen,
}

/// A validated, coerced mutation ready for the repository.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Create {
        kind: SensorKind,
        value: SensorValue,
        uid: Uid,
    },
    Update {
        id: RecordId,
        kind: SensorKind,
        value: SensorValue,
        timestamp: DateTime<Utc>,
    },
}

impl SaveRequest {
    pub async fn execute(&self, repo: &SensorRepository, session: &Session) -> Result<(), ConsoleError> {
        match self {
            SaveRequest::Create { kind, value, uid } => repo.create(session, *kind, *value, *uid).await,
            SaveRequest::Update { id, kind, value, timestamp } => {
                repo.update(session, id, *kind, *value, *timestamp).await
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct FormCoordinator {
    state: FormState,
}

impl FormCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn phase(&self) -> FormPhase {
        match &self.state {
            FormState::Closed => FormPhase::Closed,
            FormState::Open(OpenForm::Create { .. }) => FormPhase::Creating,
            FormState::Open(OpenForm::Edit { .. }) => FormPhase::Editing,
            FormState::Saving(_) => FormPhase::Saving,
            FormState::ErrorOpen { .. } => FormPhase::ErrorOpen,
        }
    }

    /// The submit control is enabled only for an open form that is not
    /// saving and, when creating, has a uid.
    pub fn can_submit(&self) -> bool {
        match &self.state {
            FormState::Open(form) | FormState::ErrorOpen { form, .. } => form.uid().is_some(),
            FormState::Closed | FormState::Saving(_) => false,
        }
    }

    /// Open the creation form and allocate its uid.
    ///
    /// If allocation fails the form is still open but cannot be submitted;
    /// the error is returned so the caller can notify the user, and
    /// `retry_uid` may be called.
    pub async fn open_create(&mut self, allocator: &UidAllocator, session: &Session) -> Result<(), ConsoleError> {
        self.ensure_not_saving()?;
        let allocated = allocator.next_uid(session).await;
        let uid = allocated.as_ref().ok().copied();
        self.state = FormState::Open(OpenForm::Create { uid, draft: FormDraft::default() });
        match allocated {
            Ok(uid) => {
                tracing::debug!("[FORM] Creating with uid {}", uid);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[FORM] No uid allocated, submission blocked: {}", e);
                Err(e)
            }
        }
    }

    pub async fn retry_uid(&mut self, allocator: &UidAllocator, session: &Session) -> Result<Uid, ConsoleError> {
        self.ensure_not_saving()?;
        if !matches!(self.form(), Some(OpenForm::Create { uid: None, .. })) {
            return Err(ConsoleError::ValidationFailed("no creation form awaiting a uid".to_string()));
        }
        let next = allocator.next_uid(session).await?;
        if let Some(OpenForm::Create { uid, .. }) = self.form_mut() {
            *uid = Some(next);
        }
        Ok(next)
    }

    /// Open the edit form preloaded from an existing record.
    pub fn open_edit(&mut self, record: &SensorRecord) -> Result<(), ConsoleError> {
        self.ensure_not_saving()?;
        let draft = FormDraft {
            kind: Some(record.kind),
            value: record.value.plain(),
            timestamp: record.editor_timestamp(),
        };
        tracing::debug!("[FORM] Editing {} {}", record.kind, record.id);
        self.state = FormState::Open(OpenForm::Edit { record: record.clone(), draft });
        Ok(())
    }

    pub fn set_kind(&mut self, kind: SensorKind) -> Result<(), ConsoleError> {
        self.edit_draft(|form| {
            if let OpenForm::Edit { record, .. } = &*form {
                if record.kind != kind {
                    return Err(ConsoleError::ValidationFailed(
                        "the sensor type cannot change on update".to_string(),
                    ));
                }
            }
            form.draft_mut().kind = Some(kind);
            Ok(())
        })
    }

    pub fn set_value(&mut self, value: impl Into<String>) -> Result<(), ConsoleError> {
        let value = value.into();
        self.edit_draft(|form| {
            form.draft_mut().value = value;
            Ok(())
        })
    }

    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) -> Result<(), ConsoleError> {
        let timestamp = timestamp.into();
        self.edit_draft(|form| match form {
            OpenForm::Create { .. } => Err(ConsoleError::ValidationFailed(
                "the timestamp is assigned when the reading is created".to_string(),
            )),
            OpenForm::Edit { draft, .. } => {
                draft.timestamp = timestamp;
                Ok(())
            }
        })
    }

    /// Close the form, discarding the draft.
    pub fn cancel(&mut self) -> Result<(), ConsoleError> {
        self.ensure_not_saving()?;
        self.state = FormState::Closed;
        Ok(())
    }

    /// Validate and coerce the draft, then move to `Saving`.
    ///
    /// On a validation failure the state is unchanged and nothing is sent.
    pub fn begin_save(&mut self) -> Result<SaveRequest, ConsoleError> {
        let request = match &self.state {
            FormState::Saving(_) => return Err(ConsoleError::SaveInProgress),
            FormState::Closed => return Err(ConsoleError::ValidationFailed("no form is open".to_string())),
            FormState::Open(form) | FormState::ErrorOpen { form, .. } => build_request(form)?,
        };

        if let FormState::Open(form) | FormState::ErrorOpen { form, .. } = mem::take(&mut self.state) {
            self.state = FormState::Saving(form);
        }
        Ok(request)
    }

    /// Settle a pending save: `Closed` on success, `ErrorOpen` with the
    /// draft intact on failure.
    pub fn finish_save(&mut self, result: Result<(), ConsoleError>) -> Result<(), ConsoleError> {
        let form = match mem::take(&mut self.state) {
            FormState::Saving(form) => form,
            other => {
                self.state = other;
                return Err(ConsoleError::ValidationFailed("no save is pending".to_string()));
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("[FORM] Sensor saved");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[FORM] Failed to save sensor: {}", e);
                self.state = FormState::ErrorOpen { form, reason: e.to_string() };
                Err(e)
            }
        }
    }

    /// Save through the repository, then re-synchronize the board.
    pub async fn submit(
        &mut self,
        repo: &SensorRepository,
        board: &mut SensorBoard,
        session: &Session,
    ) -> Result<Resync, ConsoleError> {
        let request = self.begin_save()?;
        let result = request.execute(repo, session).await;
        self.finish_save(result)?;

        Ok(board.resync(repo, session).await)
    }

    fn form(&self) -> Option<&OpenForm> {
        match &self.state {
            FormState::Open(form) | FormState::ErrorOpen { form, .. } | FormState::Saving(form) => Some(form),
            FormState::Closed => None,
        }
    }

    fn form_mut(&mut self) -> Option<&mut OpenForm> {
        match &mut self.state {
            FormState::Open(form) | FormState::ErrorOpen { form, .. } | FormState::Saving(form) => Some(form),
            FormState::Closed => None,
        }
    }

    fn ensure_not_saving(&self) -> Result<(), ConsoleError> {
        match self.state {
            FormState::Saving(_) => Err(ConsoleError::SaveInProgress),
            _ => Ok(()),
        }
    }

    /// Apply a field edit. Editing out of `ErrorOpen` returns to the open form.
    fn edit_draft<F>(&mut self, edit: F) -> Result<(), ConsoleError>
    where
        F: FnOnce(&mut OpenForm) -> Result<(), ConsoleError>,
    {
        let mut form = match mem::take(&mut self.state) {
            FormState::Open(form) | FormState::ErrorOpen { form, .. } => form,
            other => {
                let error = match &other {
                    FormState::Saving(_) => ConsoleError::SaveInProgress,
                    _ => ConsoleError::ValidationFailed("no form is open".to_string()),
                };
                self.state = other;
                return Err(error);
            }
        };
        let result = edit(&mut form);
        self.state = FormState::Open(form);
        result
    }
}

fn build_request(form: &OpenForm) -> Result<SaveRequest, ConsoleError> {
    let draft = form.draft();
    let kind = draft
        .kind
        .ok_or_else(|| ConsoleError::ValidationFailed("please select the type".to_string()))?;
    if draft.value.trim().is_empty() {
        return Err(ConsoleError::ValidationFailed("please input the value".to_string()));
    }
    let value = kind.coerce(&draft.value)?;

    match form {
        OpenForm::Create { uid, .. } => {
            let uid = uid.ok_or_else(|| {
                ConsoleError::ValidationFailed("no uid allocated; retry allocation before saving".to_string())
            })?;
            Ok(SaveRequest::Create { kind, value, uid })
        }
        OpenForm::Edit { record, .. } => {
            if kind != record.kind {
                return Err(ConsoleError::ValidationFailed(
                    "the sensor type cannot change on update".to_string(),
                ));
            }
            // an untouched editor field keeps the full-precision original
            let timestamp = if draft.timestamp == record.editor_timestamp() {
                record.timestamp
            } else {
                parse_timestamp(draft.timestamp.trim()).ok_or_else(|| {
                    ConsoleError::ValidationFailed(format!("'{}' is not a valid timestamp", draft.timestamp))
                })?
            };
            Ok(SaveRequest::Update { id: record.id.clone(), kind, value, timestamp })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBackend, MOCK_TOKEN};
    use chrono::TimeZone;
    use std::sync::Arc;

    struct Fixture {
        backend: Arc<MockBackend>,
        repo: SensorRepository,
        allocator: UidAllocator,
        board: SensorBoard,
        session: Session,
        form: FormCoordinator,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MockBackend::new());
        let mut session = Session::anonymous();
        session.login(MOCK_TOKEN);
        Fixture {
            repo: SensorRepository::new(backend.clone()),
            allocator: UidAllocator::new(backend.clone()),
            backend,
            board: SensorBoard::new(),
            session,
            form: FormCoordinator::new(),
        }
    }

    async fn first_record(f: &mut Fixture) -> SensorRecord {
        f.board.refresh(&f.repo, &f.session).await.unwrap();
        f.board.records()[0].clone()
    }

    #[tokio::test]
    async fn test_create_flow() {
        let mut f = fixture();
        f.backend.seed("luminosity", 80.0, 6);

        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        assert_eq!(f.form.phase(), FormPhase::Creating);
        assert_eq!(f.form.form().unwrap().uid(), Some(Uid(7)));

        f.form.set_kind(SensorKind::Temperature).unwrap();
        f.form.set_value("21.46").unwrap();
        let resync = f.form.submit(&f.repo, &mut f.board, &f.session).await.unwrap();

        assert!(matches!(resync, Resync::Refreshed));
        assert_eq!(f.form.phase(), FormPhase::Closed);
        let created: Vec<_> = f.board.records().iter().filter(|r| r.uid == Uid(7)).collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, SensorKind::Temperature);
        assert_eq!(created[0].value, SensorValue::Temperature { tenths: 215 });

        let requests = f.backend.requests();
        let post = requests.iter().position(|r| r == "POST /sensors/temperature").unwrap();
        let list = requests.iter().rposition(|r| r == "GET /sensors").unwrap();
        assert!(post < list, "refresh must follow the create");
    }

    #[tokio::test]
    async fn test_luminosity_is_sent_as_integer() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        f.form.set_kind(SensorKind::Luminosity).unwrap();
        f.form.set_value("312.9").unwrap();

        f.form.submit(&f.repo, &mut f.board, &f.session).await.unwrap();

        let body = f.backend.records()[0].clone();
        assert_eq!(body["value"].as_f64(), Some(312.0));
        assert_eq!(body["uid"], 1);
    }

    #[tokio::test]
    async fn test_required_fields_never_reach_network() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        let sent_before = f.backend.requests().len();

        let missing_kind = f.form.submit(&f.repo, &mut f.board, &f.session).await;
        assert!(matches!(missing_kind, Err(ConsoleError::ValidationFailed(_))));

        f.form.set_kind(SensorKind::Temperature).unwrap();
        let missing_value = f.form.submit(&f.repo, &mut f.board, &f.session).await;
        assert!(matches!(missing_value, Err(ConsoleError::ValidationFailed(_))));

        assert_eq!(f.form.phase(), FormPhase::Creating);
        assert_eq!(f.backend.requests().len(), sent_before);
    }

    #[tokio::test]
    async fn test_failed_allocation_blocks_submission() {
        let mut f = fixture();
        f.backend.set_offline(true);

        let opened = f.form.open_create(&f.allocator, &f.session).await;
        assert!(matches!(opened, Err(ConsoleError::FetchFailed(_))));
        assert_eq!(f.form.phase(), FormPhase::Creating);
        assert!(!f.form.can_submit());

        f.form.set_kind(SensorKind::Temperature).unwrap();
        f.form.set_value("20").unwrap();
        assert!(matches!(f.form.begin_save(), Err(ConsoleError::ValidationFailed(_))));

        f.backend.set_offline(false);
        assert_eq!(f.form.retry_uid(&f.allocator, &f.session).await.unwrap(), Uid(1));
        assert!(f.form.can_submit());
    }

    #[tokio::test]
    async fn test_edit_preloads_and_locks_kind() {
        let mut f = fixture();
        f.backend.seed("temperature", 19.5, 3);
        let record = first_record(&mut f).await;

        f.form.open_edit(&record).unwrap();

        assert_eq!(f.form.phase(), FormPhase::Editing);
        let draft = f.form.form().unwrap().draft().clone();
        assert_eq!(draft.kind, Some(SensorKind::Temperature));
        assert_eq!(draft.value, "19.5");
        assert_eq!(draft.timestamp, "2024-05-01T12:00");
        assert!(!f.form.form().unwrap().kind_editable());
        assert!(matches!(f.form.set_kind(SensorKind::Luminosity), Err(ConsoleError::ValidationFailed(_))));
        assert!(f.form.set_kind(SensorKind::Temperature).is_ok());
    }

    #[tokio::test]
    async fn test_update_with_differing_kind_is_rejected_before_repository() {
        let mut f = fixture();
        f.backend.seed("temperature", 19.5, 3);
        let record = first_record(&mut f).await;
        f.form.open_edit(&record).unwrap();
        let sent_before = f.backend.requests().len();

        // a draft tampered with outside the setters
        if let Some(OpenForm::Edit { draft, .. }) = f.form.form_mut() {
            draft.kind = Some(SensorKind::Luminosity);
        }
        let result = f.form.begin_save();

        assert!(matches!(result, Err(ConsoleError::ValidationFailed(_))));
        assert_eq!(f.form.phase(), FormPhase::Editing);
        assert_eq!(f.backend.requests().len(), sent_before);
    }

    #[tokio::test]
    async fn test_edit_flow_updates_value_and_timestamp() {
        let mut f = fixture();
        f.backend.seed("temperature", 19.5, 3);
        let record = first_record(&mut f).await;

        f.form.open_edit(&record).unwrap();
        f.form.set_value("23.04").unwrap();
        f.form.set_timestamp("2024-05-02T08:30").unwrap();
        f.form.submit(&f.repo, &mut f.board, &f.session).await.unwrap();

        let updated = &f.board.records()[0];
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.kind, SensorKind::Temperature);
        assert_eq!(updated.uid, Uid(3));
        assert_eq!(updated.value, SensorValue::Temperature { tenths: 230 });
        assert_eq!(updated.timestamp, Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_untouched_timestamp_is_sent_unchanged() {
        let mut f = fixture();
        f.backend.seed("luminosity", 40.0, 1);
        let record = first_record(&mut f).await;
        f.form.open_edit(&record).unwrap();
        f.form.set_value("45").unwrap();

        let request = f.form.begin_save().unwrap();

        assert_eq!(
            request,
            SaveRequest::Update {
                id: record.id.clone(),
                kind: SensorKind::Luminosity,
                value: SensorValue::Luminosity(45),
                timestamp: record.timestamp,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_form_open() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        f.form.set_kind(SensorKind::Temperature).unwrap();
        f.form.set_value("18.2").unwrap();
        f.backend.set_offline(true);

        let result = f.form.submit(&f.repo, &mut f.board, &f.session).await;

        assert!(matches!(result, Err(ConsoleError::MutationFailed(_))));
        assert_eq!(f.form.phase(), FormPhase::ErrorOpen);
        assert_eq!(f.form.form().unwrap().draft().value, "18.2");
        assert!(f.form.can_submit());

        f.backend.set_offline(false);
        f.form.submit(&f.repo, &mut f.board, &f.session).await.unwrap();
        assert_eq!(f.form.phase(), FormPhase::Closed);
        assert_eq!(f.board.records().len(), 1);
    }

    #[tokio::test]
    async fn test_editing_after_error_returns_to_open_form() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        f.form.set_kind(SensorKind::Luminosity).unwrap();
        f.form.set_value("5").unwrap();
        f.form.begin_save().unwrap();
        f.form.finish_save(Err(ConsoleError::MutationFailed("boom".to_string()))).unwrap_err();
        assert!(matches!(f.form.state(), FormState::ErrorOpen { reason, .. } if reason.contains("boom")));

        f.form.set_value("6").unwrap();

        assert_eq!(f.form.phase(), FormPhase::Creating);
    }

    #[tokio::test]
    async fn test_no_overlapping_saves() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        f.form.set_kind(SensorKind::Luminosity).unwrap();
        f.form.set_value("10").unwrap();

        f.form.begin_save().unwrap();

        assert_eq!(f.form.phase(), FormPhase::Saving);
        assert!(!f.form.can_submit());
        assert!(matches!(f.form.begin_save(), Err(ConsoleError::SaveInProgress)));
        assert!(matches!(f.form.set_value("11"), Err(ConsoleError::SaveInProgress)));
        assert!(matches!(f.form.cancel(), Err(ConsoleError::SaveInProgress)));
        assert!(matches!(
            f.form.open_create(&f.allocator, &f.session).await,
            Err(ConsoleError::SaveInProgress)
        ));

        f.form.finish_save(Ok(())).unwrap();
        assert_eq!(f.form.phase(), FormPhase::Closed);
    }

    #[test]
    fn test_closed_form_rejects_edits() {
        let mut form = FormCoordinator::new();
        assert!(matches!(form.set_value("1"), Err(ConsoleError::ValidationFailed(_))));
        assert!(matches!(form.begin_save(), Err(ConsoleError::ValidationFailed(_))));
        assert!(matches!(form.finish_save(Ok(())), Err(ConsoleError::ValidationFailed(_))));
        assert_eq!(form.phase(), FormPhase::Closed);
    }

    #[tokio::test]
    async fn test_cancel_discards_draft() {
        let mut f = fixture();
        f.form.open_create(&f.allocator, &f.session).await.unwrap();
        f.form.set_value("3").unwrap();

        f.form.cancel().unwrap();

        assert_eq!(f.form.state(), &FormState::Closed);
    }
}
