//! Wizard state container and its session-storage snapshot.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::model::{BankDraft, EntityDraft, IdentityDraft, RoleDraft};
use super::state::{ProgressState, WizardStep};

/// All four step drafts plus progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub entity: EntityDraft,
    pub role: RoleDraft,
    pub identity: IdentityDraft,
    pub bank: BankDraft,
    pub progress: ProgressState,
}

/// What goes into session storage.
///
/// File handles are `#[serde(skip)]` on the draft types, so serializing a
/// snapshot can never carry one; only server `file_id`s survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWizard {
    pub step1: EntityDraft,
    pub step2: RoleDraft,
    pub step3: IdentityDraft,
    pub step4: BankDraft,
    #[serde(rename = "completedThrough")]
    pub completed_through: u8,
}

impl WizardState {
    /// Sanitized snapshot for storage.
    pub fn to_persisted(&self) -> PersistedWizard {
        let mut step1 = self.entity.clone();
        for doc in &mut step1.formation_documents {
            doc.file = None;
        }
        let mut step3 = self.identity.clone();
        step3.id_file = None;

        PersistedWizard {
            step1,
            step2: self.role.clone(),
            step3,
            step4: self.bank.clone(),
            completed_through: self.progress.completed_through,
        }
    }

    /// Rebuild state from a stored blob, merging each slice shallowly over
    /// the initial values.
    ///
    /// Unreadable blobs or slices fall back to initial values; a stale blob
    /// from an older shape should never block the wizard.
    pub fn hydrate(stored: &str) -> Self {
        let initial = Self::default();
        let value: serde_json::Value = match serde_json::from_str(stored) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable wizard snapshot");
                return initial;
            }
        };

        let completed_through = value
            .get("completedThrough")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u64::from(u8::MAX)) as u8)
            .unwrap_or(0);

        let mut state = Self {
            entity: merge_slice(initial.entity, value.get("step1")),
            role: merge_slice(initial.role, value.get("step2")),
            identity: merge_slice(initial.identity, value.get("step3")),
            bank: merge_slice(initial.bank, value.get("step4")),
            progress: initial.progress,
        };
        state.progress.raise_to(completed_through);
        state.progress.current_step = state.progress.first_incomplete().min(WizardStep::Review);
        state
    }
}

/// Overlay the top-level keys of `stored` onto `initial`.
///
/// Nested objects (the address) are replaced whole, not merged.
fn merge_slice<T>(initial: T, stored: Option<&serde_json::Value>) -> T
where
    T: Serialize + DeserializeOwned,
{
    let Some(serde_json::Value::Object(stored)) = stored else {
        return initial;
    };
    let mut base = match serde_json::to_value(&initial) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return initial,
    };
    for (key, value) in stored {
        base.insert(key.clone(), value.clone());
    }
    match serde_json::from_value(serde_json::Value::Object(base)) {
        Ok(merged) => merged,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable draft slice");
            initial
        }
    }
}
