//! Tactical command orchestration.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use phlx_domain::{
    Actor, CommandFilter, CommandResponse, CommandStatus, DomainError, NewCommand, Pagination,
    ResponseOutcome, TacticalCommand, TargetReply,
};
use phlx_persistence::{CommandRepository, NEW_REVISION, PersistenceError, Versioned};

use crate::config::{Catalog, Topic};
use crate::error::Result;
use crate::events::{Publisher, event_types};

#[derive(Serialize)]
struct ResponseRecorded<'a> {
    command_id: Uuid,
    mission_id: Uuid,
    response: &'a CommandResponse,
    replaced: bool,
    status: CommandStatus,
}

#[derive(Serialize)]
struct StatusChanged<'a> {
    command_id: Uuid,
    mission_id: Uuid,
    previous: CommandStatus,
    status: CommandStatus,
    changed_by: &'a str,
    changed_by_name: &'a str,
    notes: Option<&'a str>,
}

pub struct CommandService {
    commands: Arc<dyn CommandRepository>,
    catalog: Catalog,
    publisher: Publisher,
}

impl CommandService {
    pub fn new(
        commands: Arc<dyn CommandRepository>,
        catalog: Catalog,
        publisher: Publisher,
    ) -> Self {
        Self {
            commands,
            catalog,
            publisher,
        }
    }

    /// # Errors
    ///
    /// Persistence failures.
    pub async fn get(&self, command_id: Uuid) -> Result<Option<TacticalCommand>> {
        Ok(self
            .commands
            .get_command(command_id)
            .await?
            .map(Versioned::into_inner))
    }

    /// # Errors
    ///
    /// Persistence failures.
    pub async fn list(
        &self,
        filter: &CommandFilter,
        page: Pagination,
    ) -> Result<Vec<TacticalCommand>> {
        Ok(self.commands.list_commands(filter, page).await?)
    }

    /// Validate, store and announce a new command.
    ///
    /// # Errors
    ///
    /// `InvalidCommand` for bad input or a category/priority this deployment
    /// does not offer.
    pub async fn issue(&self, new: NewCommand, actor: &Actor) -> Result<TacticalCommand> {
        if !self.catalog.allows_category(new.category) {
            return Err(DomainError::InvalidCommand(format!(
                "category '{}' is not enabled",
                new.category.as_str()
            ))
            .into());
        }
        if !self.catalog.allows_priority(new.priority) {
            return Err(DomainError::InvalidCommand(format!(
                "priority '{}' is not enabled",
                new.priority.as_str()
            ))
            .into());
        }

        let command = TacticalCommand::issue(new, actor).inspect_err(|e| {
            tracing::warn!(error = %e, "Command rejected");
        })?;
        self.commands.save_command(&command, NEW_REVISION).await?;

        tracing::info!(
            command_id = %command.id,
            mission_id = %command.mission_id,
            status = command.status().as_str(),
            targets = command.ledger().slots().len(),
            "Command issued"
        );
        self.publisher
            .publish(
                Topic::TacticalCommands,
                event_types::TACTICAL_COMMAND_CREATED,
                &command,
            )
            .await?;
        Ok(command)
    }

    /// Load, apply `op` and save at the loaded revision. Returns the status
    /// the command had before `op` ran.
    async fn mutate<T, F>(
        &self,
        command_id: Uuid,
        op: F,
    ) -> Result<(TacticalCommand, CommandStatus, T)>
    where
        F: FnOnce(&mut TacticalCommand) -> phlx_domain::Result<T> + Send,
    {
        let Versioned {
            revision,
            value: mut command,
        } = self
            .commands
            .get_command(command_id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("TacticalCommand", command_id))?;

        let previous = command.status();
        let out = op(&mut command).inspect_err(|e| {
            tracing::warn!(
                %command_id,
                status = previous.as_str(),
                error = %e,
                "Command change rejected"
            );
        })?;
        self.commands.save_command(&command, revision).await?;
        Ok((command, previous, out))
    }

    /// Publish a status change when the derived status moved away from
    /// `previous`.
    async fn announce_status(
        &self,
        command: &TacticalCommand,
        previous: CommandStatus,
        actor: &Actor,
    ) -> Result<()> {
        let current = command.status();
        if current == previous {
            return Ok(());
        }

        let last = command.status_history().last();
        tracing::info!(
            command_id = %command.id,
            from = previous.as_str(),
            to = current.as_str(),
            "Command status changed"
        );
        self.publisher
            .publish(
                Topic::TacticalCommands,
                event_types::TACTICAL_COMMAND_STATUS_CHANGED,
                &StatusChanged {
                    command_id: command.id,
                    mission_id: command.mission_id,
                    previous,
                    status: current,
                    changed_by: last.map_or(actor.id.as_str(), |u| u.changed_by.as_str()),
                    changed_by_name: last
                        .map_or(actor.name.as_str(), |u| u.changed_by_name.as_str()),
                    notes: last.and_then(|u| u.notes.as_deref()),
                },
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` unless pending approval.
    pub async fn approve(
        &self,
        command_id: Uuid,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<TacticalCommand> {
        let (command, previous, ()) = self
            .mutate(command_id, |c| c.approve(actor, notes))
            .await?;
        self.announce_status(&command, previous, actor).await?;
        Ok(command)
    }

    /// Record a target's response.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown command or target, `InvalidTransition`
    /// outside the response phase.
    pub async fn respond(
        &self,
        command_id: Uuid,
        reply: TargetReply,
        actor: &Actor,
    ) -> Result<(TacticalCommand, ResponseOutcome)> {
        let target_id = reply.target_id;
        let (command, previous, outcome) = self
            .mutate(command_id, |c| c.respond(reply, actor))
            .await?;

        if let Some(response) = command.ledger().response_for(target_id) {
            tracing::info!(
                %command_id,
                %target_id,
                decision = ?response.decision,
                replaced = outcome.replaced,
                "Command response recorded"
            );
            self.publisher
                .publish(
                    Topic::TacticalCommands,
                    event_types::TACTICAL_COMMAND_RESPONSE,
                    &ResponseRecorded {
                        command_id,
                        mission_id: command.mission_id,
                        response,
                        replaced: outcome.replaced,
                        status: outcome.current,
                    },
                )
                .await?;
        }
        self.announce_status(&command, previous, actor).await?;
        Ok((command, outcome))
    }

    /// Apply an operator-requested status.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` when the status is not reachable.
    pub async fn transition(
        &self,
        command_id: Uuid,
        status: CommandStatus,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<TacticalCommand> {
        let (command, previous, ()) = self
            .mutate(command_id, |c| c.transition(status, actor, notes))
            .await?;
        self.announce_status(&command, previous, actor).await?;
        Ok(command)
    }

    /// # Errors
    ///
    /// `NotFound`, or `InvalidTransition` for a terminal command.
    pub async fn cancel(
        &self,
        command_id: Uuid,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<TacticalCommand> {
        self.transition(command_id, CommandStatus::Cancelled, actor, notes)
            .await
    }
}
