//! WizardSession: owns the wizard state and the last server snapshot for
//! one signed-in user.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::api::types::{
    BankPayload, DraftRequest, IdentityPayload, OrgPayload, RolePayload, SessionLookup,
    SessionSnapshot,
};
use crate::api::OnboardingApi;
use crate::error::SubmitError;
use crate::store::SessionStorage;

use super::draft::WizardState;
use super::guard::{Route, guard};
use super::model::{
    BankDraft, EntityDraft, FormationDocType, IdentityDraft, LocalFile, OnboardingState,
    RoleDraft, SESSION_STORAGE_KEY,
};
use super::reconcile::reconcile;
use super::state::{ProgressState, WizardStep};
use super::submit::{build_submission, validate_step};

/// What the page layer does after a successful submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub status: OnboardingState,
    pub route: Route,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_account_id: Option<i64>,
}

/// The onboarding wizard's state container.
///
/// Every mutation writes the sanitized snapshot through to session storage.
/// Storage failures are logged and otherwise ignored; the in-memory state
/// stays authoritative.
pub struct WizardSession {
    api: Arc<dyn OnboardingApi>,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<WizardState>,
    server: RwLock<Option<SessionSnapshot>>,
    submitting: AtomicBool,
}

impl WizardSession {
    /// Build a session, hydrating drafts from storage if a snapshot exists.
    pub async fn load(api: Arc<dyn OnboardingApi>, storage: Arc<dyn SessionStorage>) -> Self {
        let state = match storage.get(SESSION_STORAGE_KEY).await {
            Ok(Some(stored)) => WizardState::hydrate(&stored),
            Ok(None) => WizardState::default(),
            Err(e) => {
                tracing::warn!("Failed to read wizard snapshot: {}", e);
                WizardState::default()
            }
        };
        tracing::debug!(
            completed_through = state.progress.completed_through,
            "Wizard session loaded"
        );

        Self {
            api,
            storage,
            state: RwLock::new(state),
            server: RwLock::new(None),
            submitting: AtomicBool::new(false),
        }
    }

    /// Copy of the full wizard state.
    pub async fn snapshot(&self) -> WizardState {
        self.state.read().await.clone()
    }

    pub async fn progress(&self) -> ProgressState {
        self.state.read().await.progress
    }

    /// The last server snapshot seen by `refresh_session`, if any.
    pub async fn server_snapshot(&self) -> Option<SessionSnapshot> {
        self.server.read().await.clone()
    }

    pub async fn server_state(&self) -> Option<OnboardingState> {
        self.server.read().await.as_ref().map(|s| s.state)
    }

    // ── Drafts ──────────────────────────────────────────────────────────

    pub async fn update_entity(&self, f: impl FnOnce(&mut EntityDraft)) {
        self.mutate(|state| f(&mut state.entity)).await;
    }

    pub async fn update_role(&self, f: impl FnOnce(&mut RoleDraft)) {
        self.mutate(|state| f(&mut state.role)).await;
    }

    pub async fn update_identity(&self, f: impl FnOnce(&mut IdentityDraft)) {
        self.mutate(|state| f(&mut state.identity)).await;
    }

    pub async fn update_bank(&self, f: impl FnOnce(&mut BankDraft)) {
        self.mutate(|state| f(&mut state.bank)).await;
    }

    /// The user opened `step`: it becomes current and everything before it
    /// counts as completed.
    pub async fn touch_step(&self, step: WizardStep) {
        self.mutate(|state| {
            state.progress.touch_step(step);
            state.progress.current_step = step;
        })
        .await;
    }

    pub async fn mark_step_complete(&self, step: WizardStep) {
        self.mutate(|state| state.progress.mark_step_complete(step))
            .await;
    }

    /// Erase the persisted snapshot. In-memory state is untouched.
    pub async fn clear_draft(&self) {
        if let Err(e) = self.storage.remove(SESSION_STORAGE_KEY).await {
            tracing::warn!("Failed to clear wizard snapshot: {}", e);
        }
    }

    /// Restore in-memory initial values and forget the server session.
    pub async fn reset(&self) {
        *self.state.write().await = WizardState::default();
        *self.server.write().await = None;
    }

    /// Drop everything local.
    pub async fn logout(&self) {
        self.clear_draft().await;
        self.reset().await;
        tracing::info!("Wizard session cleared on logout");
    }

    /// Discard the server's non-submitted session, then everything local.
    pub async fn restart(&self) -> Result<(), SubmitError> {
        self.api.reset_onboarding().await?;
        self.clear_draft().await;
        self.reset().await;
        tracing::info!("Onboarding restarted");
        Ok(())
    }

    // ── Server sync ─────────────────────────────────────────────────────

    /// Fetch the server session and merge it into the local drafts.
    ///
    /// Without a session (or when the lookup fails) the wizard starts over
    /// at step 1; progress is never lowered.
    pub async fn refresh_session(&self) -> Route {
        let lookup = self.api.current_onboarding().await;

        let route = match lookup {
            SessionLookup::Found(snapshot) => {
                let route = {
                    let mut state = self.state.write().await;
                    let merged = reconcile(&snapshot, state.clone());
                    *state = merged.state;
                    merged.route
                };
                tracing::info!(
                    session_id = %snapshot.session_id,
                    server_state = %snapshot.state,
                    ?route,
                    "Onboarding session reconciled"
                );
                *self.server.write().await = Some(snapshot);
                route
            }
            SessionLookup::NoSession => {
                tracing::debug!("No onboarding session on server");
                self.forget_server_session().await
            }
            SessionLookup::Transient(reason) => {
                tracing::warn!(reason = %reason, "Onboarding session lookup failed");
                self.forget_server_session().await
            }
        };

        self.persist_state().await;
        route
    }

    /// Redirect decision for a request to `requested`.
    pub async fn guard(&self, requested: WizardStep) -> Option<Route> {
        let completed_through = self.state.read().await.progress.completed_through;
        guard(completed_through, requested, self.server_state().await)
    }

    /// Save one step to the draft endpoint.
    ///
    /// Refused when the step guard would redirect `step`. With `completed`,
    /// the step's checks run first and a successful save marks it complete
    /// and moves to the next step.
    pub async fn save_step(&self, step: WizardStep, completed: bool) -> Result<(), SubmitError> {
        if !step.is_server_tracked() {
            return Err(SubmitError::Validation(format!(
                "Step {} is not saved to the server.",
                step.number()
            )));
        }
        if let Some(route) = self.guard(step).await {
            tracing::debug!(step = step.number(), ?route, "Save refused by step guard");
            return Err(SubmitError::Validation(
                "Complete the earlier steps first.".to_string(),
            ));
        }

        let state = self.snapshot().await;
        if completed {
            validate_step(step, &state, chrono::Utc::now().date_naive())?;
        }

        let request = DraftRequest {
            step: step.number(),
            completed,
            data: step_payload(step, &state).map_err(|e| SubmitError::Backend(e.to_string()))?,
        };
        let response = self.api.save_draft(&request).await?;
        tracing::debug!(
            step = step.number(),
            completed,
            server_step = response.current_step,
            "Step draft saved"
        );

        if completed {
            self.mutate(|state| {
                state.progress.mark_step_complete(step);
                state.progress.current_step = step.next().unwrap_or(step);
            })
            .await;
        }
        Ok(())
    }

    // ── Uploads ─────────────────────────────────────────────────────────

    /// Upload the government ID and keep only the returned `file_id`.
    pub async fn upload_id_document(&self, file: LocalFile) -> Result<String, SubmitError> {
        file.check_uploadable().map_err(SubmitError::Validation)?;
        let uploaded = self.api.upload_id_document(&file).await?;
        let file_id = uploaded.file_id;
        self.mutate(|state| {
            state.identity.id_document_id = Some(file_id.clone());
            state.identity.id_file = None;
        })
        .await;
        Ok(file_id)
    }

    pub async fn upload_formation_document(
        &self,
        file: LocalFile,
        doc_type: FormationDocType,
    ) -> Result<String, SubmitError> {
        file.check_uploadable().map_err(SubmitError::Validation)?;
        let uploaded = self.api.upload_formation_document(&file, doc_type).await?;
        let file_id = uploaded.file_id;
        self.mutate(|state| {
            let slot = state.entity.formation_document_mut(doc_type);
            slot.file_id = Some(file_id.clone());
            slot.file = None;
        })
        .await;
        Ok(file_id)
    }

    // ── Submission ──────────────────────────────────────────────────────

    /// Submit the whole wizard.
    ///
    /// A pending call keeps the drafts and moves to scheduling; any other
    /// status clears everything and sends the user to the dashboard. A
    /// second call while one is in flight fails with `InProgress`.
    pub async fn complete(&self) -> Result<CompletionOutcome, SubmitError> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(SubmitError::InProgress);
        }
        let _in_flight = InFlight(&self.submitting);

        let submission = build_submission(&*self.state.read().await)?;
        let response = self
            .api
            .complete_onboarding(&submission.payload, submission.id_file.as_ref())
            .await?;
        tracing::info!(status = %response.status, "Onboarding submitted");

        let outcome = if response.status == OnboardingState::PendingCall {
            self.mutate(|state| {
                state.progress.mark_step_complete(WizardStep::Review);
                state.progress.current_step = WizardStep::Scheduling;
            })
            .await;
            let mut server = self.server.write().await;
            *server = Some(SessionSnapshot {
                session_id: response.session_id.clone().unwrap_or_default(),
                org_id: response.org_id.clone().unwrap_or_default(),
                state: OnboardingState::PendingCall,
                current_step: WizardStep::Review.number(),
                risk_level: None,
                address_locked: false,
                step_statuses: serde_json::Value::Null,
                org: serde_json::Value::Null,
            });
            CompletionOutcome {
                status: response.status,
                route: Route::Step(WizardStep::Scheduling),
                upi: response.upi,
                payment_account_id: response.payment_account_id,
            }
        } else {
            self.clear_draft().await;
            self.reset().await;
            CompletionOutcome {
                status: response.status,
                route: Route::Dashboard,
                upi: response.upi,
                payment_account_id: response.payment_account_id,
            }
        };
        Ok(outcome)
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Apply `f` and write the result through while still holding the lock,
    /// so storage always ends on the latest state.
    async fn mutate(&self, f: impl FnOnce(&mut WizardState)) {
        let mut state = self.state.write().await;
        f(&mut state);
        let state = state.downgrade();
        self.write_snapshot(&state).await;
    }

    async fn forget_server_session(&self) -> Route {
        *self.server.write().await = None;
        self.state.write().await.progress.current_step = WizardStep::Entity;
        Route::Step(WizardStep::Entity)
    }

    async fn persist_state(&self) {
        let state = self.state.read().await;
        self.write_snapshot(&state).await;
    }

    /// Callers hold the state lock across the write; writers wait for it.
    async fn write_snapshot(&self, state: &WizardState) {
        let json = match serde_json::to_string(&state.to_persisted()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize wizard snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(SESSION_STORAGE_KEY, &json).await {
            tracing::warn!("Failed to persist wizard snapshot: {}", e);
        }
    }
}

/// Clears the in-flight flag when a submit finishes or is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn step_payload(step: WizardStep, state: &WizardState) -> Result<serde_json::Value, serde_json::Error> {
    match step {
        WizardStep::Entity => serde_json::to_value(OrgPayload::from(&state.entity)),
        WizardStep::Role => serde_json::to_value(RolePayload::from(&state.role)),
        WizardStep::Identity => serde_json::to_value(IdentityPayload::from(&state.identity)),
        WizardStep::Bank => serde_json::to_value(BankPayload::from(&state.bank)),
        WizardStep::Review | WizardStep::Scheduling => Ok(serde_json::json!({})),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::api::types::{CompletePayload, CompleteResponse, DraftResponse, UploadResponse};
    use crate::error::{ApiError, StorageError};
    use crate::onboarding::model::{FormationDocument, Role};
    use crate::store::MemoryStorage;

    /// Stub backend that records calls.
    struct StubApi {
        lookup: Mutex<SessionLookup>,
        complete_status: OnboardingState,
        calls: AtomicUsize,
        drafts: Mutex<Vec<DraftRequest>>,
        completed: Mutex<Vec<(CompletePayload, Option<LocalFile>)>>,
    }

    impl StubApi {
        fn new(lookup: SessionLookup, complete_status: OnboardingState) -> Arc<Self> {
            Arc::new(Self {
                lookup: Mutex::new(lookup),
                complete_status,
                calls: AtomicUsize::new(0),
                drafts: Mutex::new(Vec::new()),
                completed: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl OnboardingApi for StubApi {
        async fn current_onboarding(&self) -> SessionLookup {
            self.hit();
            self.lookup.lock().unwrap().clone()
        }

        async fn save_draft(&self, request: &DraftRequest) -> Result<DraftResponse, ApiError> {
            self.hit();
            self.drafts.lock().unwrap().push(request.clone());
            Ok(DraftResponse {
                session_id: "s1".into(),
                org_id: "o1".into(),
                current_step: request.step,
                step_statuses: serde_json::Value::Null,
            })
        }

        async fn reset_onboarding(&self) -> Result<(), ApiError> {
            self.hit();
            Ok(())
        }

        async fn upload_id_document(&self, _file: &LocalFile) -> Result<UploadResponse, ApiError> {
            self.hit();
            Ok(UploadResponse {
                file_id: "id_0001".into(),
                storage: Some("local".into()),
            })
        }

        async fn upload_formation_document(
            &self,
            _file: &LocalFile,
            doc_type: FormationDocType,
        ) -> Result<UploadResponse, ApiError> {
            self.hit();
            Ok(UploadResponse {
                file_id: format!("form_{}", doc_type.as_str()),
                storage: None,
            })
        }

        async fn complete_onboarding(
            &self,
            payload: &CompletePayload,
            id_file: Option<&LocalFile>,
        ) -> Result<CompleteResponse, ApiError> {
            self.hit();
            self.completed
                .lock()
                .unwrap()
                .push((payload.clone(), id_file.cloned()));
            Ok(CompleteResponse {
                status: self.complete_status,
                org_id: Some("o1".into()),
                session_id: Some("s1".into()),
                upi: (self.complete_status == OnboardingState::PendingReview)
                    .then(|| "UPI123".to_string()),
                payment_account_id: Some(7),
            })
        }

        async fn onboarding_status(&self) -> Result<OnboardingState, ApiError> {
            self.hit();
            Ok(OnboardingState::Draft)
        }
    }

    async fn session_with(api: Arc<StubApi>) -> (WizardSession, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let session = WizardSession::load(api, storage.clone()).await;
        (session, storage)
    }

    async fn fill_owner(session: &WizardSession) {
        session
            .update_entity(|e| {
                e.legal_name = "Acme LLC".into();
                e.industry = "Technology".into();
            })
            .await;
        session.update_role(|r| r.role = Some(Role::Owner)).await;
        session.update_identity(|i| {
            i.full_name = "Jane Doe".into();
            i.attestation = true;
        })
        .await;
        session
            .update_bank(|b| {
                b.bank_name = "First Bank".into();
                b.account_number = "123456789".into();
            })
            .await;
    }

    fn snapshot(state: OnboardingState, current_step: u8, statuses: serde_json::Value) -> SessionSnapshot {
        SessionSnapshot {
            session_id: "s1".into(),
            org_id: "o1".into(),
            state,
            current_step,
            risk_level: None,
            address_locked: false,
            step_statuses: statuses,
            org: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn mutations_write_through_without_file_handles() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, storage) = session_with(api).await;

        session
            .update_identity(|i| {
                i.full_name = "Jane".into();
                i.id_file = Some(LocalFile::new("id.png", "image/png", vec![1, 2, 3]));
            })
            .await;

        let stored = storage.get(SESSION_STORAGE_KEY).await.unwrap().unwrap();
        assert!(stored.contains("\"full_name\":\"Jane\""));
        assert!(!stored.contains("id.png"));
        // The in-memory handle survives.
        assert!(session.snapshot().await.identity.id_file.is_some());
    }

    #[tokio::test]
    async fn load_hydrates_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                SESSION_STORAGE_KEY,
                r#"{"step1": {"legal_name": "Stored Co"}, "completedThrough": 2}"#,
            )
            .await
            .unwrap();
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let session = WizardSession::load(api, storage).await;

        let state = session.snapshot().await;
        assert_eq!(state.entity.legal_name, "Stored Co");
        assert_eq!(state.progress.completed_through, 2);
        assert_eq!(state.progress.current_step, WizardStep::Identity);
    }

    #[tokio::test]
    async fn clear_then_fresh_load_gives_defaults() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, storage) = session_with(api.clone()).await;
        fill_owner(&session).await;
        session.mark_step_complete(WizardStep::Bank).await;

        session.logout().await;
        assert_eq!(session.snapshot().await, WizardState::default());

        let fresh = WizardSession::load(api, storage).await;
        assert_eq!(fresh.snapshot().await, WizardState::default());
    }

    #[tokio::test]
    async fn touch_step_is_monotonic() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api).await;

        session.touch_step(WizardStep::Bank).await;
        session.touch_step(WizardStep::Role).await;
        let progress = session.progress().await;
        assert_eq!(progress.completed_through, 3);
        assert_eq!(progress.current_step, WizardStep::Role);
    }

    #[tokio::test]
    async fn refresh_without_session_restarts_at_step_one() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api).await;
        session.touch_step(WizardStep::Identity).await;

        let route = session.refresh_session().await;
        assert_eq!(route, Route::Step(WizardStep::Entity));
        let progress = session.progress().await;
        assert_eq!(progress.current_step, WizardStep::Entity);
        assert_eq!(progress.completed_through, 2);
        assert_eq!(session.server_state().await, None);
    }

    #[tokio::test]
    async fn transient_lookup_is_not_an_error() {
        let api = StubApi::new(
            SessionLookup::Transient("connection refused".into()),
            OnboardingState::Verified,
        );
        let (session, _) = session_with(api).await;
        assert_eq!(session.refresh_session().await, Route::Step(WizardStep::Entity));
    }

    #[tokio::test]
    async fn refresh_merges_server_progress() {
        let api = StubApi::new(
            SessionLookup::Found(snapshot(
                OnboardingState::Draft,
                3,
                serde_json::json!({
                    "step1": {"legal_name": "Server Co"},
                    "completed_steps": [1, 2]
                }),
            )),
            OnboardingState::Verified,
        );
        let (session, storage) = session_with(api).await;
        session.update_bank(|b| b.bank_name = "Local Bank".into()).await;

        let route = session.refresh_session().await;
        assert_eq!(route, Route::Step(WizardStep::Identity));

        let state = session.snapshot().await;
        assert_eq!(state.entity.legal_name, "Server Co");
        assert_eq!(state.bank.bank_name, "Local Bank");
        assert_eq!(state.progress.completed_through, 2);
        assert_eq!(session.server_state().await, Some(OnboardingState::Draft));

        let stored = storage.get(SESSION_STORAGE_KEY).await.unwrap().unwrap();
        assert!(stored.contains("Server Co"));
    }

    #[tokio::test]
    async fn guard_uses_server_state() {
        let api = StubApi::new(
            SessionLookup::Found(snapshot(OnboardingState::Verified, 5, serde_json::Value::Null)),
            OnboardingState::Verified,
        );
        let (session, _) = session_with(api).await;
        assert_eq!(
            session.guard(WizardStep::Role).await,
            Some(Route::Step(WizardStep::Entity))
        );

        assert_eq!(session.refresh_session().await, Route::Dashboard);
        assert_eq!(session.guard(WizardStep::Entity).await, Some(Route::Dashboard));
    }

    #[tokio::test]
    async fn save_step_completed_advances_progress() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api.clone()).await;
        session.update_role(|r| r.role = Some(Role::Owner)).await;
        session.touch_step(WizardStep::Role).await;

        session.save_step(WizardStep::Role, true).await.unwrap();

        let progress = session.progress().await;
        assert_eq!(progress.completed_through, 2);
        assert_eq!(progress.current_step, WizardStep::Identity);

        let drafts = api.drafts.lock().unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].step, 2);
        assert_eq!(drafts[0].data["role"], "owner");
    }

    #[tokio::test]
    async fn save_step_partial_keeps_progress() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api.clone()).await;

        session.save_step(WizardStep::Entity, false).await.unwrap();
        assert_eq!(session.progress().await.completed_through, 0);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn save_step_validation_fails_before_network() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api.clone()).await;
        session.touch_step(WizardStep::Role).await;

        let err = session.save_step(WizardStep::Role, true).await.unwrap_err();
        assert_eq!(err, SubmitError::Validation("Please select your role.".to_string()));
        assert!(session.save_step(WizardStep::Scheduling, false).await.is_err());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn save_step_ahead_of_progress_is_refused() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api.clone()).await;
        session
            .update_bank(|b| {
                b.bank_name = "First Bank".into();
                b.account_number = "123456789".into();
                b.ach_routing = "021000021".into();
            })
            .await;
        assert_eq!(
            session.guard(WizardStep::Bank).await,
            Some(Route::Step(WizardStep::Entity))
        );

        let err = session.save_step(WizardStep::Bank, true).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(_)));
        assert!(session.save_step(WizardStep::Bank, false).await.is_err());

        assert_eq!(session.progress().await.completed_through, 0);
        assert!(session.guard(WizardStep::Review).await.is_some());
        assert_eq!(api.calls(), 0);
    }

    /// Memory storage whose first write stalls.
    struct SlowFirstWrite {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl SessionStorage for SlowFirstWrite {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn slow_write_never_overwrites_a_newer_snapshot() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let storage = Arc::new(SlowFirstWrite {
            inner: MemoryStorage::new(),
            writes: AtomicUsize::new(0),
        });
        let session = Arc::new(WizardSession::load(api.clone(), storage.clone()).await);

        let first = {
            let session = session.clone();
            tokio::spawn(async move {
                session.update_entity(|e| e.legal_name = "Acme LLC".into()).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        session.update_bank(|b| b.bank_name = "First Bank".into()).await;
        first.await.unwrap();

        let stored = storage.get(SESSION_STORAGE_KEY).await.unwrap().unwrap();
        assert!(stored.contains("First Bank"));
        assert!(stored.contains("Acme LLC"));

        let reloaded = WizardSession::load(api, storage).await;
        let state = reloaded.snapshot().await;
        assert_eq!(state.bank.bank_name, "First Bank");
        assert_eq!(state.entity.legal_name, "Acme LLC");
    }

    #[tokio::test]
    async fn uploads_keep_only_file_ids() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, storage) = session_with(api.clone()).await;
        session
            .update_identity(|i| i.id_file = Some(LocalFile::new("id.png", "image/png", vec![1])))
            .await;

        let id = session
            .upload_id_document(LocalFile::new("id.png", "image/png", vec![1]))
            .await
            .unwrap();
        assert_eq!(id, "id_0001");

        let doc_id = session
            .upload_formation_document(
                LocalFile::new("a.pdf", "application/pdf", vec![2]),
                FormationDocType::ArticlesOfOrganization,
            )
            .await
            .unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.identity.id_document_id.as_deref(), Some("id_0001"));
        assert!(state.identity.id_file.is_none());
        assert_eq!(
            state.entity.formation_documents,
            vec![FormationDocument {
                doc_type: FormationDocType::ArticlesOfOrganization,
                file: None,
                file_id: Some(doc_id),
            }]
        );

        let stored = storage.get(SESSION_STORAGE_KEY).await.unwrap().unwrap();
        assert!(stored.contains("form_articles_of_organization"));
    }

    #[tokio::test]
    async fn rejected_upload_never_reaches_backend() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api.clone()).await;
        let err = session
            .upload_id_document(LocalFile::new("id.gif", "image/gif", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Validation(_)));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn rep_without_id_fails_before_any_network_call() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::PendingReview);
        let (session, _) = session_with(api.clone()).await;
        fill_owner(&session).await;
        session.update_role(|r| r.role = Some(Role::AuthorizedRep)).await;

        let err = session.complete().await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ref m) if m.contains("government ID")));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn pending_call_keeps_drafts_and_routes_to_scheduling() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::PendingCall);
        let (session, storage) = session_with(api.clone()).await;
        fill_owner(&session).await;

        let outcome = session.complete().await.unwrap();
        assert_eq!(outcome.status, OnboardingState::PendingCall);
        assert_eq!(outcome.route, Route::Step(WizardStep::Scheduling));

        let state = session.snapshot().await;
        assert_eq!(state.entity.legal_name, "Acme LLC");
        assert_eq!(state.progress.completed_through, 5);
        assert_eq!(state.progress.current_step, WizardStep::Scheduling);
        assert!(storage.get(SESSION_STORAGE_KEY).await.unwrap().is_some());

        assert_eq!(
            session.guard(WizardStep::Entity).await,
            Some(Route::Step(WizardStep::Scheduling))
        );
        let (payload, _) = api.completed.lock().unwrap()[0].clone();
        assert_eq!(serde_json::to_value(&payload).unwrap()["verification_method"], "call");
    }

    #[tokio::test]
    async fn other_status_clears_and_routes_to_dashboard() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::PendingReview);
        let (session, storage) = session_with(api.clone()).await;
        fill_owner(&session).await;
        session.update_role(|r| r.role = Some(Role::AuthorizedRep)).await;
        session
            .update_identity(|i| i.id_file = Some(LocalFile::new("id.pdf", "application/pdf", vec![1])))
            .await;

        let outcome = session.complete().await.unwrap();
        assert_eq!(outcome.route, Route::Dashboard);
        assert_eq!(outcome.upi.as_deref(), Some("UPI123"));
        assert_eq!(session.snapshot().await, WizardState::default());
        assert!(storage.is_empty().await);

        let (_, id_file) = api.completed.lock().unwrap()[0].clone();
        assert_eq!(id_file.unwrap().file_name, "id.pdf");
    }

    #[tokio::test]
    async fn overlapping_submit_is_rejected() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, _) = session_with(api).await;
        fill_owner(&session).await;

        session.submitting.store(true, Ordering::SeqCst);
        assert_eq!(session.complete().await.unwrap_err(), SubmitError::InProgress);

        session.submitting.store(false, Ordering::SeqCst);
        assert!(session.complete().await.is_ok());
        assert!(!session.submitting.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn restart_resets_server_and_local() {
        let api = StubApi::new(SessionLookup::NoSession, OnboardingState::Verified);
        let (session, storage) = session_with(api.clone()).await;
        fill_owner(&session).await;

        session.restart().await.unwrap();
        assert_eq!(api.calls(), 1);
        assert_eq!(session.snapshot().await, WizardState::default());
        assert!(storage.is_empty().await);
    }
}
