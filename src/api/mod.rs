//! Aplite backend API.
//!
//! Three traits split by audience: the signed-in applicant
//! ([`OnboardingApi`]), reviewers holding the admin key ([`AdminApi`]) and
//! anonymous visitors ([`DirectoryApi`]). [`ApliteClient`] implements all
//! three over HTTP.

pub mod client;
pub mod types;

pub use client::ApliteClient;
pub use types::*;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiError;
use crate::onboarding::model::{FormationDocType, LocalFile, OnboardingState};

/// Endpoints used by the onboarding wizard.
#[async_trait]
pub trait OnboardingApi: Send + Sync {
    /// Fetch the active onboarding session. Never fails: absence and errors
    /// are explicit variants.
    async fn current_onboarding(&self) -> SessionLookup;

    /// Save one step's draft.
    async fn save_draft(&self, request: &DraftRequest) -> Result<DraftResponse, ApiError>;

    /// Drop any non-submitted session on the server.
    async fn reset_onboarding(&self) -> Result<(), ApiError>;

    async fn upload_id_document(&self, file: &LocalFile) -> Result<UploadResponse, ApiError>;

    async fn upload_formation_document(
        &self,
        file: &LocalFile,
        doc_type: FormationDocType,
    ) -> Result<UploadResponse, ApiError>;

    /// Submit the whole wizard. `id_file` rides along when the ID was picked
    /// but never uploaded separately.
    async fn complete_onboarding(
        &self,
        payload: &CompletePayload,
        id_file: Option<&LocalFile>,
    ) -> Result<CompleteResponse, ApiError>;

    /// Canonical onboarding status for the dashboard guard and poller.
    async fn onboarding_status(&self) -> Result<OnboardingState, ApiError>;
}

/// Endpoints for the admin review queue.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn list_queue(&self) -> Result<Vec<QueueItem>, ApiError>;

    async fn session_detail(&self, session_id: Uuid) -> Result<SessionDetail, ApiError>;

    async fn approve(&self, session_id: Uuid) -> Result<ReviewDecision, ApiError>;

    /// Reject with a reason; a blank reason fails before any request.
    async fn reject(&self, session_id: Uuid, reason: &str) -> Result<ReviewDecision, ApiError>;

    async fn fetch_file(&self, file_id: &str) -> Result<FileDownload, ApiError>;
}

/// Public client directory.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn list_clients(&self, query: &ClientQuery) -> Result<Vec<PublicClient>, ApiError>;
}
