//! Merging freshly discovered tools into a server's existing tool list.
//!
//! Tools are matched by exact, case-sensitive name. A discovered tool whose
//! name is new is always added; one whose name already exists becomes a
//! [`Conflict`] that needs a [`Choice`] before the merge is applied.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use crate::domain::tool::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    #[default]
    Existing,
    Discovered,
}

impl Choice {
    pub fn toggled(self) -> Self {
        match self {
            Self::Existing => Self::Discovered,
            Self::Discovered => Self::Existing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Discovered => "discovered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub existing: Tool,
    pub discovered: Tool,
}

impl Conflict {
    pub fn name(&self) -> &str {
        &self.existing.name
    }

    /// Both sides carry the same description and parameters.
    pub fn is_identical(&self) -> bool {
        self.existing == self.discovered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub new_tools: Vec<Tool>,
    pub conflicts: Vec<Conflict>,
    choices: BTreeMap<String, Choice>,
}

impl ReconciliationResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn choice(&self, name: &str) -> Option<Choice> {
        self.choices.get(name).copied()
    }

    pub fn choices(&self) -> &BTreeMap<String, Choice> {
        &self.choices
    }

    pub fn set_choice(&mut self, name: &str, choice: Choice) -> Result<(), ReconcileError> {
        let slot = self
            .choices
            .get_mut(name)
            .ok_or_else(|| ReconcileError::UnknownConflict(name.to_string()))?;
        *slot = choice;
        Ok(())
    }

    pub fn toggle(&mut self, name: &str) -> Result<Choice, ReconcileError> {
        let slot = self
            .choices
            .get_mut(name)
            .ok_or_else(|| ReconcileError::UnknownConflict(name.to_string()))?;
        *slot = slot.toggled();
        Ok(*slot)
    }

    pub fn choose_all(&mut self, choice: Choice) {
        for slot in self.choices.values_mut() {
            *slot = choice;
        }
    }

    /// Names of conflicts currently resolved in favour of the discovered tool.
    pub fn replaced_names(&self) -> impl Iterator<Item = &str> {
        self.conflicts
            .iter()
            .map(Conflict::name)
            .filter(|name| self.choice(name) == Some(Choice::Discovered))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("tool '{name}' appears more than once in the {list} tool list")]
    DuplicateName { list: &'static str, name: String },
    #[error("no conflict named '{0}'")]
    UnknownConflict(String),
    #[error("a tool review is already in progress")]
    ReviewInProgress,
    #[error("no tool review is in progress")]
    NotReviewing,
}

pub fn first_duplicate(tools: &[Tool]) -> Option<&str> {
    let mut seen = HashSet::new();
    tools
        .iter()
        .map(|tool| tool.name.as_str())
        .find(|name| !seen.insert(*name))
}

pub fn ensure_unique_names(tools: &[Tool], list: &'static str) -> Result<(), ReconcileError> {
    match first_duplicate(tools) {
        Some(name) => Err(ReconcileError::DuplicateName {
            list,
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Partition `discovered` into new tools and conflicts, in discovered order.
/// Every conflict starts out resolved as [`Choice::Existing`].
pub fn reconcile(existing: &[Tool], discovered: &[Tool]) -> ReconciliationResult {
    debug_assert!(
        first_duplicate(existing).is_none(),
        "existing tools must have unique names"
    );
    debug_assert!(
        first_duplicate(discovered).is_none(),
        "discovered tools must have unique names"
    );

    let by_name: HashMap<&str, &Tool> = existing.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut new_tools = Vec::new();
    let mut conflicts = Vec::new();
    let mut choices = BTreeMap::new();

    for tool in discovered {
        match by_name.get(tool.name.as_str()) {
            Some(current) => {
                choices.insert(tool.name.clone(), Choice::Existing);
                conflicts.push(Conflict {
                    existing: (*current).clone(),
                    discovered: tool.clone(),
                });
            }
            None => new_tools.push(tool.clone()),
        }
    }

    ReconciliationResult {
        new_tools,
        conflicts,
        choices,
    }
}

/// Final tool list: existing tools not replaced, then discovered
/// replacements, then new tools.
pub fn apply_choices(existing: &[Tool], result: &ReconciliationResult) -> Vec<Tool> {
    let replaced: HashSet<&str> = result.replaced_names().collect();
    let replacements = result
        .conflicts
        .iter()
        .filter(|conflict| replaced.contains(conflict.name()))
        .map(|conflict| conflict.discovered.clone());

    existing
        .iter()
        .filter(|tool| !replaced.contains(tool.name.as_str()))
        .cloned()
        .chain(replacements)
        .chain(result.new_tools.iter().cloned())
        .collect()
}
