//! # Command Lifecycle
//!
//! ```text
//! pending_approval -> pending -> {accepted | rejected} -> in_progress -> completed
//!          \             \            \                      \
//!           +-------------+------------+----------------------+--> cancelled
//! ```
//!
//! `pending_approval` is only used for AI-originated commands. `accepted` and
//! `rejected` are never set directly: while the command is in the `pending`
//! phase its status is whatever the target ledger aggregates to. Every change
//! of the resulting status is appended to the status history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    CommandCategory, CommandPriority, CommandResponse, CommandSource, CommandStatus,
    CommandStatusUpdate, NewCommand, TacticalGeoArea, TacticalGeoLocation, TargetLedger,
    TargetReply,
};
use crate::error::{DomainError, Result};
use crate::{Actor, Metadata};

/// What a response did to the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub previous: CommandStatus,
    pub current: CommandStatus,
    /// The target had already responded and this overwrote it
    pub replaced: bool,
}

impl ResponseOutcome {
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Command addressed to one or more assets/teams within a mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalCommand {
    pub id: Uuid,

    // Mission context
    pub mission_id: Uuid,
    pub mission_title: String,
    pub situation_summary: Option<String>,

    // Definition
    pub title: String,
    pub description: String,
    pub category: CommandCategory,

    // Navigation
    pub destination: Option<TacticalGeoLocation>,
    pub waypoints: Vec<TacticalGeoLocation>,
    pub area_of_operation: Option<TacticalGeoArea>,

    pub objective: Option<String>,
    pub priority: CommandPriority,

    ledger: TargetLedger,
    status_history: Vec<CommandStatusUpdate>,

    pub source: CommandSource,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl TacticalCommand {
    /// Create a command. AI-originated commands wait for approval, operator
    /// commands go straight to `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidCommand`] (or
    /// [`DomainError::InvalidBoundary`] for a bad polygon area) when the input
    /// is invalid.
    pub fn issue(new: NewCommand, actor: &Actor) -> Result<Self> {
        new.validate()?;
        let ledger = TargetLedger::new(new.targets)?;

        let now = Utc::now();
        let initial = match new.source {
            CommandSource::Ai => CommandStatus::PendingApproval,
            CommandSource::Operator => CommandStatus::Pending,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            mission_id: new.mission_id,
            mission_title: new.mission_title,
            situation_summary: new.situation_summary,
            title: new.title,
            description: new.description,
            category: new.category,
            destination: new.destination,
            waypoints: new.waypoints,
            area_of_operation: new.area_of_operation,
            objective: new.objective,
            priority: new.priority,
            ledger,
            status_history: vec![CommandStatusUpdate {
                status: initial,
                changed_by: actor.id.clone(),
                changed_by_name: actor.name.clone(),
                timestamp: now,
                notes: None,
            }],
            source: new.source,
            created_by: actor.id.clone(),
            created_by_name: actor.name.clone(),
            created_at: now,
            updated_at: now,
            metadata: new.metadata,
        })
    }

    pub fn ledger(&self) -> &TargetLedger {
        &self.ledger
    }

    pub fn status_history(&self) -> &[CommandStatusUpdate] {
        &self.status_history
    }

    pub fn responses(&self) -> impl Iterator<Item = &CommandResponse> {
        self.ledger.responses()
    }

    /// Current status, derived from the last operator phase and the ledger.
    #[must_use]
    pub fn status(&self) -> CommandStatus {
        let phase = self
            .status_history
            .iter()
            .rev()
            .map(|u| u.status)
            .find(CommandStatus::is_operator_phase)
            .unwrap_or(CommandStatus::Pending);

        match phase {
            CommandStatus::Pending => self.ledger.aggregate(),
            other => other,
        }
    }

    fn append(&mut self, status: CommandStatus, actor: &Actor, notes: Option<String>) {
        let now = Utc::now();
        self.status_history.push(CommandStatusUpdate {
            status,
            changed_by: actor.id.clone(),
            changed_by_name: actor.name.clone(),
            timestamp: now,
            notes,
        });
        self.updated_at = now;
    }

    fn require(&self, allowed: &[CommandStatus], to: CommandStatus) -> Result<CommandStatus> {
        let current = self.status();
        if allowed.contains(&current) {
            Ok(current)
        } else {
            Err(DomainError::transition(current, to))
        }
    }

    /// Operator sign-off on an AI suggestion.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless the command is
    /// `pending_approval`.
    pub fn approve(&mut self, actor: &Actor, notes: Option<String>) -> Result<()> {
        self.require(&[CommandStatus::PendingApproval], CommandStatus::Pending)?;
        self.append(CommandStatus::Pending, actor, notes);
        Ok(())
    }

    /// Record a target's decision.
    ///
    /// Responses are taken while the command is `pending` or `accepted`; a
    /// second response from the same target replaces the first. When the
    /// derived status changes, the new status is appended to the history.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidTransition`] outside the response phase
    /// - [`DomainError::NotFound`] for a target that is not on the command
    pub fn respond(&mut self, reply: TargetReply, actor: &Actor) -> Result<ResponseOutcome> {
        let decided = match reply.decision {
            super::Decision::Accepted => CommandStatus::Accepted,
            super::Decision::Rejected => CommandStatus::Rejected,
        };
        let previous = self.require(&[CommandStatus::Pending, CommandStatus::Accepted], decided)?;

        let target = self
            .ledger
            .target(reply.target_id)
            .filter(|t| t.target_type == reply.target_type)
            .ok_or_else(|| DomainError::not_found("CommandTarget", reply.target_id))?;

        let response = CommandResponse {
            target_id: reply.target_id,
            target_type: reply.target_type,
            target_name: target.target_name.clone(),
            decision: reply.decision,
            notes: reply.notes.clone(),
            responded_by: actor.id.clone(),
            responded_by_name: actor.name.clone(),
            responded_at: Utc::now(),
        };
        let replaced = self.ledger.record(response)?.is_some();
        self.updated_at = Utc::now();

        let current = self.status();
        if current != previous {
            self.append(current, actor, reply.notes);
        }

        Ok(ResponseOutcome {
            previous,
            current,
            replaced,
        })
    }

    /// Begin execution.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless the command is `accepted`.
    pub fn start(&mut self, actor: &Actor, notes: Option<String>) -> Result<()> {
        self.require(&[CommandStatus::Accepted], CommandStatus::InProgress)?;
        self.append(CommandStatus::InProgress, actor, notes);
        Ok(())
    }

    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless the command is `in_progress`.
    pub fn complete(&mut self, actor: &Actor, notes: Option<String>) -> Result<()> {
        self.require(&[CommandStatus::InProgress], CommandStatus::Completed)?;
        self.append(CommandStatus::Completed, actor, notes);
        Ok(())
    }

    /// Cancel from any non-terminal state.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] when the command is already
    /// `completed`, `cancelled` or `rejected`.
    pub fn cancel(&mut self, actor: &Actor, notes: Option<String>) -> Result<()> {
        let current = self.status();
        if current.is_terminal() {
            return Err(DomainError::transition(current, CommandStatus::Cancelled));
        }
        self.append(CommandStatus::Cancelled, actor, notes);
        Ok(())
    }

    /// Apply an operator-requested status.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] when the requested status is not
    /// reachable, including any request for `accepted`, `rejected` or
    /// `pending_approval`, which only the ledger or command creation set.
    pub fn transition(
        &mut self,
        to: CommandStatus,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<()> {
        match to {
            CommandStatus::Pending => self.approve(actor, notes),
            CommandStatus::InProgress => self.start(actor, notes),
            CommandStatus::Completed => self.complete(actor, notes),
            CommandStatus::Cancelled => self.cancel(actor, notes),
            CommandStatus::PendingApproval | CommandStatus::Accepted | CommandStatus::Rejected => {
                Err(DomainError::transition(self.status(), to))
            }
        }
    }
}
