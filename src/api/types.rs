//! Request and response shapes for the Aplite backend.
//!
//! The backend owns these shapes; fields the client does not act on are
//! kept as raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::onboarding::model::{
    Address, BankDraft, EntityDraft, FormationDocType, IdentityDraft, OnboardingState, Role,
    RoleDraft, VerificationMethod,
};
use crate::onboarding::normalize::normalize_website;

// ── Onboarding ──────────────────────────────────────────────────────────

/// The server's view of an in-progress onboarding session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub org_id: String,
    pub state: OnboardingState,
    pub current_step: u8,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub address_locked: bool,
    /// `step1`..`step4`, `formation_documents`, `role`, `completed_steps`.
    #[serde(default)]
    pub step_statuses: serde_json::Value,
    #[serde(default)]
    pub org: serde_json::Value,
}

/// Outcome of asking the backend for the current onboarding session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    Found(SessionSnapshot),
    /// The user has no session yet; the wizard is client-driven until the
    /// first saved step or the final submit.
    NoSession,
    /// Network failure or unexpected response.
    Transient(String),
}

/// `POST /onboarding/draft` body.
#[derive(Debug, Clone, Serialize)]
pub struct DraftRequest {
    pub step: u8,
    pub completed: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftResponse {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub org_id: String,
    pub current_step: u8,
    #[serde(default)]
    pub step_statuses: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(default)]
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDetails {
    pub onboarding_status: OnboardingState,
    #[serde(default)]
    pub organization: serde_json::Value,
    #[serde(default)]
    pub verification_review: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPayload {
    pub street1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl From<&Address> for AddressPayload {
    fn from(address: &Address) -> Self {
        Self {
            street1: address.street1.trim().to_string(),
            street2: non_empty(&address.street2),
            city: address.city.trim().to_string(),
            state: address.state.trim().to_string(),
            zip: address.zip.trim().to_string(),
            country: address.country.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormationDocRef {
    pub doc_type: FormationDocType,
    pub file_id: String,
}

/// Step 1 as the backend expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgPayload {
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dba: Option<String>,
    pub ein: String,
    pub formation_date: String,
    pub formation_state: String,
    pub entity_type: String,
    pub address: AddressPayload,
    /// Custom value when "Other" was chosen.
    pub industry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only documents that already have a `file_id`.
    pub formation_documents: Vec<FormationDocRef>,
}

impl From<&EntityDraft> for OrgPayload {
    fn from(draft: &EntityDraft) -> Self {
        Self {
            legal_name: draft.legal_name.trim().to_string(),
            dba: non_empty(&draft.dba),
            ein: draft.ein.trim().to_string(),
            formation_date: draft.formation_date.trim().to_string(),
            formation_state: draft.formation_state.trim().to_string(),
            entity_type: draft.entity_type.trim().to_string(),
            address: AddressPayload::from(&draft.address),
            industry: draft.resolved_industry().unwrap_or_default(),
            website: non_empty(&normalize_website(&draft.website)),
            description: non_empty(&draft.description),
            formation_documents: draft
                .formation_documents
                .iter()
                .filter_map(|doc| {
                    let file_id = doc.file_id.as_deref().filter(|id| !id.is_empty())?;
                    Some(FormationDocRef {
                        doc_type: doc.doc_type,
                        file_id: file_id.to_string(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&RoleDraft> for RolePayload {
    fn from(draft: &RoleDraft) -> Self {
        Self {
            role: draft.role,
            title: non_empty(&draft.title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityPayload {
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub attestation: bool,
}

impl From<&IdentityDraft> for IdentityPayload {
    fn from(draft: &IdentityDraft) -> Self {
        Self {
            full_name: draft.full_name.trim().to_string(),
            title: non_empty(&draft.title),
            id_document_id: draft.id_document_id.as_deref().and_then(non_empty),
            phone: non_empty(&draft.phone),
            attestation: draft.attestation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankPayload {
    pub bank_name: String,
    pub account_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ach_routing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wire_routing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift: Option<String>,
}

impl From<&BankDraft> for BankPayload {
    fn from(draft: &BankDraft) -> Self {
        Self {
            bank_name: draft.bank_name.trim().to_string(),
            account_number: draft.account_number.trim().replace(' ', ""),
            ach_routing: non_empty(&draft.ach_routing),
            wire_routing: non_empty(&draft.wire_routing),
            swift: non_empty(&draft.swift).map(|s| s.to_uppercase()),
        }
    }
}

/// `POST /onboarding/complete` body (sent as the `data` multipart field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletePayload {
    pub org: OrgPayload,
    pub role: RolePayload,
    pub identity: IdentityPayload,
    pub bank: BankPayload,
    pub verification_method: VerificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResponse {
    pub status: OnboardingState,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub upi: Option<String>,
    #[serde(default)]
    pub payment_account_id: Option<i64>,
}

// ── Admin review ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueueOrg {
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub verification_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueueUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A session waiting on admin review.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueItem {
    pub session_id: Uuid,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub state: OnboardingState,
    #[serde(default)]
    pub current_step: Option<u8>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub org: QueueOrg,
    #[serde(default)]
    pub user: QueueUser,
    /// `call` or `id`.
    #[serde(default)]
    pub method: String,
}

impl QueueItem {
    pub fn display_name(&self) -> &str {
        self.org.legal_name.as_deref().unwrap_or("(unnamed organization)")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentMeta {
    pub file_id: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Everything a reviewer sees for one session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionDetail {
    #[serde(default)]
    pub session: serde_json::Value,
    #[serde(default)]
    pub org: serde_json::Value,
    #[serde(default)]
    pub user: serde_json::Value,
    #[serde(default)]
    pub identity: serde_json::Value,
    #[serde(default)]
    pub payment_account: serde_json::Value,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub formation_documents: Vec<DocumentMeta>,
    #[serde(default)]
    pub identity_document: Option<DocumentMeta>,
    #[serde(default)]
    pub latest_review: serde_json::Value,
    #[serde(default)]
    pub reviews: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewDecision {
    pub status: OnboardingState,
    #[serde(default)]
    pub upi: Option<String>,
}

/// Raw bytes of an uploaded document.
#[derive(Clone)]
pub struct FileDownload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .finish()
    }
}

// ── Public directory ────────────────────────────────────────────────────

/// Query for the public client directory.
#[derive(Debug, Clone, Serialize)]
pub struct ClientQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub limit: u16,
}

impl Default for ClientQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: 50,
        }
    }
}

impl ClientQuery {
    pub const MAX_SEARCH_LEN: usize = 120;
    pub const MAX_LIMIT: u16 = 200;

    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = non_empty(&term);
        self
    }

    pub fn limit(mut self, limit: u16) -> Self {
        self.limit = limit;
        self
    }

    /// Check the bounds the backend enforces.
    pub fn check(&self) -> Result<(), String> {
        if self.limit == 0 || self.limit > Self::MAX_LIMIT {
            return Err(format!("limit must be between 1 and {}", Self::MAX_LIMIT));
        }
        if self
            .search
            .as_deref()
            .is_some_and(|s| s.chars().count() > Self::MAX_SEARCH_LEN)
        {
            return Err(format!(
                "search must be at most {} characters",
                Self::MAX_SEARCH_LEN
            ));
        }
        Ok(())
    }
}

/// A verified client listed in the public directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicClient {
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub dba: Option<String>,
    #[serde(default)]
    pub upi: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Trimmed value, or `None` if blank.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
