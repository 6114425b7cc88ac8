//! Step guard: where a wizard page should send the user instead.

use serde::Serialize;

use super::model::OnboardingState;
use super::state::WizardStep;

/// A routing target outside the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Route {
    Step(WizardStep),
    /// The pending-verification screen.
    Pending,
    Dashboard,
}

/// Decide whether a request for `requested` must be redirected.
///
/// Returns `None` when the requested page may render. Evaluated in order:
/// a verified account always goes to the dashboard, a pending call forces
/// the scheduling step, a pending review shows the pending screen, and a
/// step ahead of `completed_through + 1` falls back to the first incomplete
/// step.
pub fn guard(
    completed_through: u8,
    requested: WizardStep,
    server_state: Option<OnboardingState>,
) -> Option<Route> {
    match server_state {
        Some(OnboardingState::Verified) => return Some(Route::Dashboard),
        Some(OnboardingState::PendingCall) => {
            return (requested != WizardStep::Scheduling)
                .then_some(Route::Step(WizardStep::Scheduling));
        }
        Some(OnboardingState::PendingReview) => return Some(Route::Pending),
        _ => {}
    }

    let first_incomplete = WizardStep::clamped(
        completed_through.saturating_add(1),
        WizardStep::Entity,
        WizardStep::Scheduling,
    );

    if requested == WizardStep::Review && completed_through < WizardStep::Bank.number() {
        return Some(Route::Step(first_incomplete));
    }

    if completed_through < requested.number() - 1 {
        return Some(Route::Step(first_incomplete));
    }

    None
}
