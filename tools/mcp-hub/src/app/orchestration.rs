//! Per-form glue between connection fields, discovery and reconciliation.
//!
//! The create and edit forms behave identically apart from where the
//! existing tool list comes from and how the record is saved.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::discovery::{DiscoveryBackend, DiscoveryClient, DiscoveryError, log_discovery_error};
use crate::app::repository::{RepositoryError, ServerRecord, ServerRepository};
use crate::domain::connection::{ConnectionDescriptor, EnvVar, Transport};
use crate::domain::reconcile::{Choice, ReconcileError, ReconciliationResult};
use crate::domain::session::{MergeOutcome, ReconcileSession};
use crate::domain::tool::{Tool, ToolError};

/// Raw connection inputs as typed into the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionFields {
    pub transport: String,
    pub url: String,
    pub command: String,
    pub args: String,
    pub cwd: String,
    pub env: Vec<EnvVar>,
}

impl ConnectionFields {
    pub fn to_descriptor(&self) -> ConnectionDescriptor {
        let transport = Transport::new(self.transport.trim());
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        if transport.is_stdio() {
            ConnectionDescriptor {
                transport,
                url: None,
                command: non_empty(&self.command),
                args: non_empty(&self.args),
                cwd: non_empty(&self.cwd),
                env: self.env.clone(),
            }
        } else {
            ConnectionDescriptor {
                transport,
                url: non_empty(&self.url),
                command: None,
                args: None,
                cwd: None,
                env: Vec::new(),
            }
        }
    }

    /// URL transports discover as soon as both protocol and URL are filled in.
    pub fn should_auto_discover(&self) -> bool {
        let transport = Transport::new(self.transport.trim());
        !transport.is_empty() && !transport.is_stdio() && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { server_id: String },
}

#[derive(Debug)]
pub enum DiscoveryFeedback {
    /// No conflicts: the new tools were merged straight in.
    ToolsAdded { added: usize },
    /// Some discovered tools collide with existing ones.
    ReviewRequired { conflicts: usize, new_tools: usize },
    /// Nothing to merge. `cause` tells a dead connection apart from a
    /// server without tools.
    NothingFound { cause: DiscoveryError },
    /// A previous review is still open; no request was made.
    ReviewPending,
    /// The tool lists could not be reconciled (duplicate names).
    Rejected { error: ReconcileError },
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("finish or cancel the tool review first")]
    ReviewOpen,
}

pub struct ServerForm {
    mode: FormMode,
    record: ServerRecord,
    pub fields: ConnectionFields,
    session: ReconcileSession,
}

impl ServerForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            record: ServerRecord::default(),
            fields: ConnectionFields::default(),
            session: ReconcileSession::new(),
        }
    }

    /// Seed the form from the persisted record.
    pub async fn edit<R: ServerRepository + ?Sized>(
        server_id: &str,
        repository: &R,
    ) -> Result<Self, FormError> {
        let record = repository.fetch(server_id).await?;
        tracing::debug!(server_id, tools = record.tools.len(), "loaded server for edit");
        Ok(Self {
            mode: FormMode::Edit {
                server_id: server_id.to_string(),
            },
            record,
            fields: ConnectionFields::default(),
            session: ReconcileSession::new(),
        })
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn tools(&self) -> &[Tool] {
        &self.record.tools
    }

    pub fn record_mut(&mut self) -> &mut ServerRecord {
        &mut self.record
    }

    /// Manual edits are refused while a review is open: committing or
    /// cancelling the review rebuilds the list from its starting point.
    pub fn add_tool(&mut self, tool: Tool) -> Result<(), FormError> {
        self.ensure_not_reviewing()?;
        tool.validate()?;
        if self.record.tools.iter().any(|t| t.name == tool.name) {
            return Err(ToolError::DuplicateTool(tool.name).into());
        }
        self.record.tools.push(tool);
        Ok(())
    }

    pub fn remove_tool(&mut self, name: &str) -> Result<Option<Tool>, FormError> {
        self.ensure_not_reviewing()?;
        Ok(self
            .record
            .tools
            .iter()
            .position(|t| t.name == name)
            .map(|index| self.record.tools.remove(index)))
    }

    fn ensure_not_reviewing(&self) -> Result<(), FormError> {
        if self.session.is_reviewing() {
            return Err(FormError::ReviewOpen);
        }
        Ok(())
    }

    pub async fn discover<B: DiscoveryBackend>(
        &mut self,
        client: &DiscoveryClient<B>,
    ) -> DiscoveryFeedback {
        if self.session.is_reviewing() {
            return DiscoveryFeedback::ReviewPending;
        }
        let descriptor = self.fields.to_descriptor();
        let discovered = match client.try_discover_tools(&descriptor).await {
            Ok(tools) => tools,
            Err(cause) => {
                log_discovery_error(&descriptor, &cause);
                return DiscoveryFeedback::NothingFound { cause };
            }
        };
        self.merge_discovered(&discovered)
    }

    /// Feed an already discovered tool list into the reconciliation step.
    pub fn merge_discovered(&mut self, discovered: &[Tool]) -> DiscoveryFeedback {
        self.session.reset();
        match self.session.begin(&self.record.tools, discovered) {
            Ok(MergeOutcome::Merged { tools, added }) => {
                self.record.tools = tools;
                self.session.reset();
                tracing::info!(added, "discovered tools merged");
                DiscoveryFeedback::ToolsAdded { added }
            }
            Ok(MergeOutcome::NeedsReview {
                conflicts,
                new_tools,
            }) => {
                tracing::info!(conflicts, new_tools, "discovered tools need review");
                DiscoveryFeedback::ReviewRequired {
                    conflicts,
                    new_tools,
                }
            }
            Err(ReconcileError::ReviewInProgress) => DiscoveryFeedback::ReviewPending,
            Err(error) => {
                tracing::error!(%error, "cannot reconcile discovered tools");
                DiscoveryFeedback::Rejected { error }
            }
        }
    }

    pub fn review(&self) -> Option<&ReconciliationResult> {
        self.session.pending()
    }

    pub fn toggle_choice(&mut self, name: &str) -> Result<Choice, FormError> {
        Ok(self.session.toggle(name)?)
    }

    pub fn set_choice(&mut self, name: &str, choice: Choice) -> Result<(), FormError> {
        Ok(self.session.set_choice(name, choice)?)
    }

    pub fn choose_all(&mut self, choice: Choice) -> Result<(), FormError> {
        Ok(self.session.choose_all(choice)?)
    }

    /// Commit the review; returns the number of tools now on the form.
    pub fn apply_review(&mut self) -> Result<usize, FormError> {
        let merged = self.session.commit()?;
        self.record.tools = merged;
        self.session.reset();
        Ok(self.record.tools.len())
    }

    pub fn cancel_review(&mut self) -> Result<(), FormError> {
        let existing = self.session.cancel()?;
        self.record.tools = existing;
        Ok(())
    }

    /// Save the record with its final tool list.
    pub async fn submit<R: ServerRepository + ?Sized>(
        &self,
        repository: &R,
    ) -> Result<ServerRecord, FormError> {
        self.ensure_not_reviewing()?;
        let saved = match &self.mode {
            FormMode::Create => repository.create(&self.record).await?,
            FormMode::Edit { server_id } => {
                let mut record = self.record.clone();
                record.id = Some(server_id.clone());
                repository.update(&record).await?
            }
        };
        tracing::info!(id = ?saved.id, tools = saved.tools.len(), "server saved");
        Ok(saved)
    }
}
