use crate::domain::reconcile::{
    Choice, ReconcileError, ReconciliationResult, apply_choices, ensure_unique_names, reconcile,
};
use crate::domain::tool::Tool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    Reviewing {
        existing: Vec<Tool>,
        result: ReconciliationResult,
    },
    Applied,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Idle => "idle",
            ReviewState::Reviewing { .. } => "reviewing",
            ReviewState::Applied => "applied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No conflicts; the merged list is ready to commit.
    Merged { tools: Vec<Tool>, added: usize },
    /// Conflicts are waiting for a decision.
    NeedsReview { conflicts: usize, new_tools: usize },
}

/// Drives one form's `Idle -> Reviewing -> Applied -> Idle` cycle.
#[derive(Debug, Clone)]
pub struct ReconcileSession {
    state: ReviewState,
}

impl Default for ReconcileSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileSession {
    pub fn new() -> Self {
        Self {
            state: ReviewState::Idle,
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn is_reviewing(&self) -> bool {
        matches!(self.state, ReviewState::Reviewing { .. })
    }

    pub fn pending(&self) -> Option<&ReconciliationResult> {
        match &self.state {
            ReviewState::Reviewing { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn begin(
        &mut self,
        existing: &[Tool],
        discovered: &[Tool],
    ) -> Result<MergeOutcome, ReconcileError> {
        if self.is_reviewing() {
            return Err(ReconcileError::ReviewInProgress);
        }
        ensure_unique_names(existing, "existing")?;
        ensure_unique_names(discovered, "discovered")?;

        let result = reconcile(existing, discovered);
        if !result.has_conflicts() {
            let added = result.new_tools.len();
            let tools = apply_choices(existing, &result);
            self.state = ReviewState::Applied;
            return Ok(MergeOutcome::Merged { tools, added });
        }

        let outcome = MergeOutcome::NeedsReview {
            conflicts: result.conflicts.len(),
            new_tools: result.new_tools.len(),
        };
        self.state = ReviewState::Reviewing {
            existing: existing.to_vec(),
            result,
        };
        Ok(outcome)
    }

    pub fn toggle(&mut self, name: &str) -> Result<Choice, ReconcileError> {
        self.pending_mut()?.toggle(name)
    }

    pub fn set_choice(&mut self, name: &str, choice: Choice) -> Result<(), ReconcileError> {
        self.pending_mut()?.set_choice(name, choice)
    }

    pub fn choose_all(&mut self, choice: Choice) -> Result<(), ReconcileError> {
        self.pending_mut()?.choose_all(choice);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<Vec<Tool>, ReconcileError> {
        match std::mem::replace(&mut self.state, ReviewState::Applied) {
            ReviewState::Reviewing { existing, result } => Ok(apply_choices(&existing, &result)),
            other => {
                self.state = other;
                Err(ReconcileError::NotReviewing)
            }
        }
    }

    /// Abandon the review. Returns the tool list as it was before `begin`.
    pub fn cancel(&mut self) -> Result<Vec<Tool>, ReconcileError> {
        match std::mem::replace(&mut self.state, ReviewState::Idle) {
            ReviewState::Reviewing { existing, .. } => Ok(existing),
            other => {
                self.state = other;
                Err(ReconcileError::NotReviewing)
            }
        }
    }

    /// Acknowledge an applied merge.
    pub fn reset(&mut self) {
        if matches!(self.state, ReviewState::Applied) {
            self.state = ReviewState::Idle;
        }
    }

    fn pending_mut(&mut self) -> Result<&mut ReconciliationResult, ReconcileError> {
        match &mut self.state {
            ReviewState::Reviewing { result, .. } => Ok(result),
            _ => Err(ReconcileError::NotReviewing),
        }
    }
}
