//! Submission gate and per-step checks.
//!
//! Everything here runs before any network call, so a failure costs the user
//! nothing but a message.

use chrono::NaiveDate;

use super::draft::WizardState;
use super::model::{FormationDocType, LocalFile, Role};
use super::normalize::{
    is_valid_ach_routing, is_valid_domain, is_valid_ein, is_valid_swift, is_valid_wire_routing,
    is_valid_zip, normalize_website, parse_formation_date,
};
use super::state::WizardStep;
use crate::api::types::{
    BankPayload, CompletePayload, IdentityPayload, OrgPayload, RolePayload,
};
use crate::error::SubmitError;

/// A validated submission ready for the complete endpoint.
#[derive(Debug, Clone)]
pub struct Submission {
    pub payload: CompletePayload,
    /// Picked but not yet uploaded ID, sent as the multipart `file`.
    pub id_file: Option<LocalFile>,
}

/// Assemble the four drafts into one payload.
///
/// Cross-step checks run in a fixed order and the first failure wins.
pub fn build_submission(state: &WizardState) -> Result<Submission, SubmitError> {
    if state.entity.resolved_industry().is_none() {
        return Err(invalid(
            "Please select an industry (or specify one for \"Other\").",
        ));
    }

    let role = state
        .role
        .role
        .ok_or_else(|| invalid("Please select your role."))?;

    if !state.identity.attestation {
        return Err(invalid("Please confirm the attestation."));
    }

    let id_file = match role {
        Role::AuthorizedRep if state.identity.has_uploaded_id() => None,
        Role::AuthorizedRep => match &state.identity.id_file {
            Some(file) => Some(file.clone()),
            None => return Err(invalid("Authorized representatives must upload a government ID.")),
        },
        Role::Owner => None,
    };

    if state.bank.bank_name.trim().is_empty() || state.bank.account_number.trim().is_empty() {
        return Err(invalid("Bank name and account number are required."));
    }

    let identity = IdentityPayload::from(&state.identity);
    let payload = CompletePayload {
        org: OrgPayload::from(&state.entity),
        role: RolePayload::from(&state.role),
        id_document_id: identity.id_document_id.clone(),
        identity,
        bank: BankPayload::from(&state.bank),
        verification_method: role.verification_method(),
    };

    Ok(Submission { payload, id_file })
}

/// Checks behind a step's "Continue" button.
///
/// Review and scheduling have nothing of their own to check.
pub fn validate_step(
    step: WizardStep,
    state: &WizardState,
    today: NaiveDate,
) -> Result<(), SubmitError> {
    match step {
        WizardStep::Entity => validate_entity(state, today),
        WizardStep::Role => validate_role(state),
        WizardStep::Identity => validate_identity(state),
        WizardStep::Bank => validate_bank(state),
        WizardStep::Review | WizardStep::Scheduling => Ok(()),
    }
}

fn validate_entity(state: &WizardState, today: NaiveDate) -> Result<(), SubmitError> {
    let entity = &state.entity;
    require(&entity.legal_name, "Legal name is required.")?;
    if !is_valid_ein(&entity.ein) {
        return Err(invalid("EIN must match NN-NNNNNNN format."));
    }
    require(&entity.formation_date, "Formation date is required.")?;
    parse_formation_date(&entity.formation_date, today).map_err(SubmitError::Validation)?;
    require(&entity.formation_state, "Formation state is required.")?;
    require(&entity.entity_type, "Entity type is required.")?;

    let address = &entity.address;
    require(&address.street1, "Street address is required.")?;
    require(&address.city, "City is required.")?;
    require(&address.state, "State is required.")?;
    if !is_valid_zip(&address.zip) {
        return Err(invalid("ZIP must be 5 digits or ZIP+4."));
    }

    if entity.resolved_industry().is_none() {
        return Err(invalid(
            "Please select an industry (or specify one for \"Other\").",
        ));
    }

    let website = normalize_website(&entity.website);
    if !website.is_empty() && !is_valid_domain(&website) {
        return Err(invalid("Website must be a valid domain."));
    }

    if FormationDocType::required_for(&entity.entity_type) {
        let allowed = FormationDocType::allowed_for(&entity.entity_type);
        let uploaded = entity
            .formation_documents
            .iter()
            .any(|doc| doc.is_uploaded() && (allowed.is_empty() || allowed.contains(&doc.doc_type)));
        if !uploaded {
            return Err(invalid("Please upload a formation document."));
        }
    }
    Ok(())
}

fn validate_role(state: &WizardState) -> Result<(), SubmitError> {
    match state.role.role {
        None => Err(invalid("Please select your role.")),
        Some(Role::AuthorizedRep) => require(&state.role.title, "Title is required."),
        Some(Role::Owner) => Ok(()),
    }
}

fn validate_identity(state: &WizardState) -> Result<(), SubmitError> {
    let identity = &state.identity;
    require(&identity.full_name, "Full name is required.")?;
    if state.role.role == Some(Role::AuthorizedRep)
        && !identity.has_uploaded_id()
        && identity.id_file.is_none()
    {
        return Err(invalid("Authorized representatives must upload a government ID."));
    }
    if !identity.attestation {
        return Err(invalid("Please confirm the attestation."));
    }
    Ok(())
}

fn validate_bank(state: &WizardState) -> Result<(), SubmitError> {
    let bank = &state.bank;
    require(&bank.bank_name, "Bank name is required.")?;
    require(&bank.account_number, "Account number is required.")?;
    if !bank.has_rail() {
        return Err(invalid(
            "Provide at least one of ACH routing, wire routing, or SWIFT.",
        ));
    }
    if !bank.ach_routing.trim().is_empty() && !is_valid_ach_routing(&bank.ach_routing) {
        return Err(invalid("ACH routing number must be 9 digits."));
    }
    if !bank.wire_routing.trim().is_empty() && !is_valid_wire_routing(&bank.wire_routing) {
        return Err(invalid("Wire routing number must be digits only."));
    }
    if !bank.swift.trim().is_empty() && !is_valid_swift(&bank.swift.to_uppercase()) {
        return Err(invalid("SWIFT code must be 8 or 11 characters."));
    }
    Ok(())
}

fn require(value: &str, message: &str) -> Result<(), SubmitError> {
    if value.trim().is_empty() {
        return Err(invalid(message));
    }
    Ok(())
}

fn invalid(message: &str) -> SubmitError {
    SubmitError::Validation(message.to_string())
}
