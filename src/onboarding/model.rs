//! Step drafts and onboarding data models.

use serde::{Deserialize, Serialize};

/// Session storage key for the sanitized wizard snapshot.
pub const SESSION_STORAGE_KEY: &str = "aplite_onboarding_session_v2";

/// Industry choices offered on step 1. Anything else is a custom value.
pub const INDUSTRIES: &[&str] = &[
    "Technology",
    "Finance",
    "Healthcare",
    "Retail",
    "Manufacturing",
    "Real Estate",
    "Professional Services",
    "Education",
    "Nonprofit",
    INDUSTRY_OTHER,
];

/// The catch-all industry; pairs with `EntityDraft::industry_other`.
pub const INDUSTRY_OTHER: &str = "Other";

/// Whether `value` is one of the fixed industry choices.
pub fn is_known_industry(value: &str) -> bool {
    INDUSTRIES.contains(&value)
}

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types the backend accepts for uploads.
pub const ALLOWED_UPLOAD_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Who is filling out the wizard on behalf of the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    AuthorizedRep,
}

impl Role {
    /// Owners verify on a call; representatives upload a government ID.
    pub fn verification_method(&self) -> VerificationMethod {
        match self {
            Self::Owner => VerificationMethod::Call,
            Self::AuthorizedRep => VerificationMethod::Id,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "authorized_rep" => Some(Self::AuthorizedRep),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::AuthorizedRep => write!(f, "authorized_rep"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Call,
    Id,
}

/// Formation documents the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationDocType {
    ArticlesOfOrganization,
    CertificateOfFormation,
    ArticlesOfIncorporation,
    CertificateOfLimitedPartnership,
    PartnershipEquivalent,
}

impl FormationDocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArticlesOfOrganization => "articles_of_organization",
            Self::CertificateOfFormation => "certificate_of_formation",
            Self::ArticlesOfIncorporation => "articles_of_incorporation",
            Self::CertificateOfLimitedPartnership => "certificate_of_limited_partnership",
            Self::PartnershipEquivalent => "partnership_equivalent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "articles_of_organization" => Some(Self::ArticlesOfOrganization),
            "certificate_of_formation" => Some(Self::CertificateOfFormation),
            "articles_of_incorporation" => Some(Self::ArticlesOfIncorporation),
            "certificate_of_limited_partnership" => Some(Self::CertificateOfLimitedPartnership),
            "partnership_equivalent" => Some(Self::PartnershipEquivalent),
            _ => None,
        }
    }

    /// Documents that satisfy the formation requirement for an entity type.
    ///
    /// Sole proprietors need none; unknown entity types return an empty list.
    pub fn allowed_for(entity_type: &str) -> &'static [FormationDocType] {
        use FormationDocType::*;
        let key: String = entity_type
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "llc" => &[ArticlesOfOrganization, CertificateOfFormation],
            "ccorp" | "scorp" | "nonprofit" | "nonprofitcorporation" => &[ArticlesOfIncorporation],
            "partnership" => &[CertificateOfLimitedPartnership, PartnershipEquivalent],
            _ => &[],
        }
    }

    /// Whether an entity type must upload a formation document at all.
    pub fn required_for(entity_type: &str) -> bool {
        let key: String = entity_type
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        key != "soleproprietor"
    }
}

/// A file picked on the client but not necessarily uploaded yet.
///
/// Never persisted: only the server-issued `file_id` survives a storage
/// round-trip.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into().to_lowercase(),
            bytes,
        }
    }

    /// Check the same limits the backend enforces, before uploading.
    pub fn check_uploadable(&self) -> Result<(), String> {
        if self.file_name.trim().is_empty() {
            return Err("Missing file.".to_string());
        }
        if !ALLOWED_UPLOAD_TYPES.contains(&self.content_type.as_str()) {
            return Err("Unsupported file type. Use jpg, png, or pdf.".to_string());
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err("File too large (max 10MB).".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A formation document slot on step 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationDocument {
    pub doc_type: FormationDocType,
    /// Local handle, dropped on every storage write.
    #[serde(skip)]
    pub file: Option<LocalFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl FormationDocument {
    pub fn new(doc_type: FormationDocType) -> Self {
        Self {
            doc_type,
            file: None,
            file_id: None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.file_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street1: String::new(),
            street2: String::new(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            country: "US".to_string(),
        }
    }
}

/// Step 1: the business entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDraft {
    pub legal_name: String,
    pub dba: String,
    pub ein: String,
    /// ISO date (`YYYY-MM-DD`) as typed into the form.
    pub formation_date: String,
    pub formation_state: String,
    pub entity_type: String,
    pub address: Address,
    pub industry: String,
    pub industry_other: String,
    pub website: String,
    pub description: String,
    pub formation_documents: Vec<FormationDocument>,
}

impl EntityDraft {
    /// The industry to send to the backend, or `None` if "Other" was chosen
    /// without a custom value.
    pub fn resolved_industry(&self) -> Option<String> {
        let industry = self.industry.trim();
        if industry == INDUSTRY_OTHER {
            let custom = self.industry_other.trim();
            return (!custom.is_empty()).then(|| custom.to_string());
        }
        (!industry.is_empty()).then(|| industry.to_string())
    }

    /// Slot for `doc_type`, inserting an empty one if missing.
    pub fn formation_document_mut(&mut self, doc_type: FormationDocType) -> &mut FormationDocument {
        let idx = match self
            .formation_documents
            .iter()
            .position(|d| d.doc_type == doc_type)
        {
            Some(idx) => idx,
            None => {
                self.formation_documents.push(FormationDocument::new(doc_type));
                self.formation_documents.len() - 1
            }
        };
        &mut self.formation_documents[idx]
    }
}

/// Step 2: the applicant's role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleDraft {
    pub role: Option<Role>,
    pub title: String,
}

/// Step 3: the applicant's identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityDraft {
    pub full_name: String,
    pub title: String,
    pub phone: String,
    pub attestation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document_id: Option<String>,
    /// Local ID document handle, dropped on every storage write.
    #[serde(skip)]
    pub id_file: Option<LocalFile>,
}

impl IdentityDraft {
    pub fn has_uploaded_id(&self) -> bool {
        self.id_document_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Step 4: bank rails for the payment account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDraft {
    pub bank_name: String,
    pub account_number: String,
    pub ach_routing: String,
    pub wire_routing: String,
    pub swift: String,
}

impl BankDraft {
    /// At least one of ACH routing, wire routing or SWIFT is filled in.
    pub fn has_rail(&self) -> bool {
        [&self.ach_routing, &self.wire_routing, &self.swift]
            .iter()
            .any(|v| !v.trim().is_empty())
    }
}

/// Server-side onboarding session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingState {
    NotStarted,
    Draft,
    PendingCall,
    PendingReview,
    Verified,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl OnboardingState {
    /// Submitted and waiting on a call or a reviewer.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingCall | Self::PendingReview)
    }

    /// No further transitions without user or admin action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }
}

impl std::fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Draft => "DRAFT",
            Self::PendingCall => "PENDING_CALL",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Verified => "VERIFIED",
            Self::Rejected => "REJECTED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}
