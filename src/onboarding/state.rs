//! Wizard steps and progress tracking.

use serde::{Deserialize, Serialize};

/// The pages of the onboarding wizard.
///
/// Progresses linearly: Entity → Role → Identity → Bank → Review →
/// Scheduling. Scheduling is client-only; the backend tracks steps 1–5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WizardStep {
    Entity = 1,
    Role = 2,
    Identity = 3,
    Bank = 4,
    Review = 5,
    Scheduling = 6,
}

impl WizardStep {
    /// All steps in order.
    pub const ALL: [WizardStep; 6] = [
        Self::Entity,
        Self::Role,
        Self::Identity,
        Self::Bank,
        Self::Review,
        Self::Scheduling,
    ];

    /// Last step the backend knows about.
    pub const LAST_SERVER_STEP: WizardStep = WizardStep::Review;

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// Step number clamped into `lo..=hi`.
    pub fn clamped(n: u8, lo: WizardStep, hi: WizardStep) -> Self {
        let n = n.clamp(lo.number(), hi.number());
        // In range by construction.
        Self::from_number(n).unwrap_or(lo)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<WizardStep> {
        Self::from_number(self.number() + 1)
    }

    /// Whether the backend tracks this step.
    pub fn is_server_tracked(&self) -> bool {
        *self <= Self::LAST_SERVER_STEP
    }

    /// Whether this step holds one of the four drafts.
    pub fn has_draft(&self) -> bool {
        self.number() <= 4
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> u8 {
        step.number()
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("invalid wizard step {n}"))
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Entity => "entity",
            Self::Role => "role",
            Self::Identity => "identity",
            Self::Bank => "bank",
            Self::Review => "review",
            Self::Scheduling => "scheduling",
        };
        write!(f, "{s}")
    }
}

/// Where the user is and how far they have linearly completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current_step: WizardStep,
    /// High-water mark of completed steps. Never decreases within a session.
    pub completed_through: u8,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            current_step: WizardStep::Entity,
            completed_through: 0,
        }
    }
}

impl ProgressState {
    /// Mark a step as visited: raises `completed_through` to at least `n - 1`.
    pub fn touch_step(&mut self, step: WizardStep) {
        self.raise_to(step.number() - 1);
    }

    /// Mark a step as completed: raises `completed_through` to at least `n`.
    pub fn mark_step_complete(&mut self, step: WizardStep) {
        self.raise_to(step.number());
    }

    /// Monotonic raise of the high-water mark.
    pub fn raise_to(&mut self, completed: u8) {
        self.completed_through = self.completed_through.max(completed);
    }

    /// Whether the content of `step` may be edited.
    pub fn can_edit(&self, step: WizardStep) -> bool {
        self.completed_through >= step.number() - 1
    }

    /// The first step not yet completed.
    pub fn first_incomplete(&self) -> WizardStep {
        WizardStep::clamped(
            self.completed_through.saturating_add(1),
            WizardStep::Entity,
            WizardStep::Scheduling,
        )
    }
}
