//! Session reconciliation: merge the server's snapshot into local drafts.
//!
//! Field-level `server ?? local`: a field is overwritten only when the
//! server sent a non-null value. Progress only ever moves forward; when the
//! two sides disagree the higher value wins.

use serde_json::Value;

use super::draft::WizardState;
use super::guard::Route;
use super::model::{
    FormationDocType, INDUSTRY_OTHER, OnboardingState, Role, is_known_industry,
};
use super::state::WizardStep;
use crate::api::types::SessionSnapshot;

/// Result of merging a server snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub state: WizardState,
    /// Where the user should be sent next.
    pub route: Route,
}

/// Merge `snapshot` into `local`, returning the merged state and the
/// resolved route.
pub fn reconcile(snapshot: &SessionSnapshot, mut local: WizardState) -> Reconciled {
    let statuses = &snapshot.step_statuses;
    let step1 = statuses.get("step1");
    let org = Some(&snapshot.org);

    merge_entity(&mut local, &[step1, org]);
    if let Some(docs) = statuses.get("formation_documents").and_then(|v| v.as_array()) {
        merge_formation_documents(&mut local, docs);
    }
    merge_role(&mut local, &[statuses.get("role"), statuses.get("step2")]);
    merge_identity(&mut local, statuses.get("step3"));
    merge_bank(&mut local, statuses.get("step4"));

    let server_completed = completed_from_server(snapshot);
    local.progress.raise_to(server_completed);

    let route = resolve_route(snapshot, local.progress.completed_through);
    if let Route::Step(step) = route {
        local.progress.current_step = step;
    }

    Reconciled {
        state: local,
        route,
    }
}

/// The server's completed-through: the highest entry of `completed_steps`
/// when present, otherwise `current_step - 1`.
pub fn completed_from_server(snapshot: &SessionSnapshot) -> u8 {
    let listed = snapshot
        .step_statuses
        .get("completed_steps")
        .and_then(|v| v.as_array())
        .and_then(|steps| steps.iter().filter_map(|s| s.as_u64()).max());
    match listed {
        Some(max) => max.min(u64::from(WizardStep::LAST_SERVER_STEP.number())) as u8,
        None => snapshot.current_step.saturating_sub(1),
    }
}

fn resolve_route(snapshot: &SessionSnapshot, completed_through: u8) -> Route {
    match snapshot.state {
        OnboardingState::Verified => Route::Dashboard,
        OnboardingState::PendingCall => Route::Step(WizardStep::Scheduling),
        OnboardingState::PendingReview => Route::Pending,
        _ => {
            let local_next = completed_through.saturating_add(1);
            Route::Step(WizardStep::clamped(
                snapshot.current_step.max(local_next),
                WizardStep::Entity,
                WizardStep::LAST_SERVER_STEP,
            ))
        }
    }
}

/// First non-null string for `key` across `sources`, in order.
fn pick_str(sources: &[Option<&Value>], key: &str) -> Option<String> {
    sources.iter().flatten().find_map(|src| match src.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn pick_bool(sources: &[Option<&Value>], key: &str) -> Option<bool> {
    sources
        .iter()
        .flatten()
        .find_map(|src| src.get(key)?.as_bool())
}

fn merge_into(field: &mut String, server: Option<String>) {
    if let Some(value) = server {
        *field = value;
    }
}

fn merge_entity(local: &mut WizardState, sources: &[Option<&Value>]) {
    let entity = &mut local.entity;
    merge_into(&mut entity.legal_name, pick_str(sources, "legal_name"));
    merge_into(&mut entity.dba, pick_str(sources, "dba"));
    merge_into(&mut entity.ein, pick_str(sources, "ein"));
    merge_into(&mut entity.formation_date, pick_str(sources, "formation_date"));
    merge_into(&mut entity.formation_state, pick_str(sources, "formation_state"));
    merge_into(&mut entity.entity_type, pick_str(sources, "entity_type"));
    merge_into(&mut entity.website, pick_str(sources, "website"));
    merge_into(&mut entity.description, pick_str(sources, "description"));

    let addresses: Vec<Option<&Value>> = sources
        .iter()
        .map(|src| src.and_then(|s| s.get("address")).filter(|a| a.is_object()))
        .collect();
    let address = &mut entity.address;
    merge_into(&mut address.street1, pick_str(&addresses, "street1"));
    merge_into(&mut address.street2, pick_str(&addresses, "street2"));
    merge_into(&mut address.city, pick_str(&addresses, "city"));
    merge_into(&mut address.state, pick_str(&addresses, "state"));
    merge_into(&mut address.zip, pick_str(&addresses, "zip"));
    merge_into(&mut address.country, pick_str(&addresses, "country"));

    if let Some(industry) = pick_str(sources, "industry") {
        if industry.is_empty() || is_known_industry(&industry) {
            entity.industry = industry;
            merge_into(&mut entity.industry_other, pick_str(sources, "industry_other"));
        } else {
            entity.industry = INDUSTRY_OTHER.to_string();
            entity.industry_other = industry;
        }
    }
}

fn merge_formation_documents(local: &mut WizardState, docs: &[Value]) {
    for doc in docs {
        let Some(doc_type) = doc
            .get("doc_type")
            .and_then(|v| v.as_str())
            .and_then(FormationDocType::parse)
        else {
            continue;
        };
        let file_id = doc.get("file_id").and_then(|v| v.as_str());
        let slot = local.entity.formation_document_mut(doc_type);
        if let Some(file_id) = file_id {
            slot.file_id = Some(file_id.to_string());
        }
    }
}

fn merge_role(local: &mut WizardState, sources: &[Option<&Value>]) {
    if let Some(role) = pick_str(sources, "role").as_deref().and_then(Role::parse) {
        local.role.role = Some(role);
    }
    merge_into(&mut local.role.title, pick_str(sources, "title"));
}

fn merge_identity(local: &mut WizardState, step3: Option<&Value>) {
    let sources = [step3];
    let identity = &mut local.identity;
    merge_into(&mut identity.full_name, pick_str(&sources, "full_name"));
    merge_into(&mut identity.title, pick_str(&sources, "title"));
    merge_into(&mut identity.phone, pick_str(&sources, "phone"));
    if let Some(attestation) = pick_bool(&sources, "attestation") {
        identity.attestation = attestation;
    }
    if let Some(id) = pick_str(&sources, "id_document_id") {
        identity.id_document_id = Some(id);
    }
}

fn merge_bank(local: &mut WizardState, step4: Option<&Value>) {
    let sources = [step4];
    let bank = &mut local.bank;
    merge_into(&mut bank.bank_name, pick_str(&sources, "bank_name"));
    merge_into(&mut bank.account_number, pick_str(&sources, "account_number"));
    merge_into(&mut bank.ach_routing, pick_str(&sources, "ach_routing"));
    merge_into(&mut bank.wire_routing, pick_str(&sources, "wire_routing"));
    merge_into(&mut bank.swift, pick_str(&sources, "swift"));
}
