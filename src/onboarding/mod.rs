//! Onboarding wizard: drafts, progress, reconciliation and submission.
//!
//! The wizard walks a business through six pages: entity, role, identity,
//! bank, review and (for owners) call scheduling. `WizardSession` owns the
//! state; the guard, reconciler and submission gate are pure functions over
//! it.

pub mod draft;
pub mod guard;
pub mod model;
pub mod normalize;
pub mod poller;
pub mod reconcile;
pub mod routes;
pub mod session;
pub mod state;
pub mod submit;

pub use draft::{PersistedWizard, WizardState};
pub use guard::{Route, guard};
pub use model::{OnboardingState, Role};
pub use poller::spawn_status_poller;
pub use reconcile::{Reconciled, reconcile};
pub use routes::{WizardRouteState, wizard_routes};
pub use session::{CompletionOutcome, WizardSession};
pub use state::{ProgressState, WizardStep};
pub use submit::{Submission, build_submission, validate_step};
