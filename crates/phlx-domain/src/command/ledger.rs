//! Per-command target ledger: one slot per target, holding that target's
//! current response.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CommandResponse, CommandStatus, CommandTarget, Decision};
use crate::error::{DomainError, Result};

/// A target and its latest response, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSlot {
    pub target: CommandTarget,
    pub response: Option<CommandResponse>,
}

/// Fixed set of targets with their current responses, in target order.
///
/// The target list cannot change after construction; only the responses do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LedgerSlot>", into = "Vec<LedgerSlot>")]
pub struct TargetLedger {
    slots: Vec<LedgerSlot>,
}

impl TryFrom<Vec<LedgerSlot>> for TargetLedger {
    type Error = DomainError;

    fn try_from(slots: Vec<LedgerSlot>) -> Result<Self> {
        check_targets(slots.iter().map(|s| &s.target))?;
        Ok(Self { slots })
    }
}

impl From<TargetLedger> for Vec<LedgerSlot> {
    fn from(ledger: TargetLedger) -> Self {
        ledger.slots
    }
}

fn check_targets<'a>(targets: impl Iterator<Item = &'a CommandTarget>) -> Result<()> {
    let mut seen = HashSet::new();
    let mut count = 0usize;
    for target in targets {
        count += 1;
        if !seen.insert(target.target_id) {
            return Err(DomainError::InvalidCommand(format!(
                "duplicate target {}",
                target.target_id
            )));
        }
    }
    if count == 0 {
        return Err(DomainError::InvalidCommand(
            "command needs at least one target".into(),
        ));
    }
    Ok(())
}

impl TargetLedger {
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidCommand`] for an empty target list or a
    /// repeated target id.
    pub fn new(targets: Vec<CommandTarget>) -> Result<Self> {
        check_targets(targets.iter())?;
        Ok(Self {
            slots: targets
                .into_iter()
                .map(|target| LedgerSlot {
                    target,
                    response: None,
                })
                .collect(),
        })
    }

    pub fn slots(&self) -> &[LedgerSlot] {
        &self.slots
    }

    pub fn targets(&self) -> impl Iterator<Item = &CommandTarget> {
        self.slots.iter().map(|s| &s.target)
    }

    pub fn target(&self, target_id: Uuid) -> Option<&CommandTarget> {
        self.targets().find(|t| t.target_id == target_id)
    }

    pub fn responses(&self) -> impl Iterator<Item = &CommandResponse> {
        self.slots.iter().filter_map(|s| s.response.as_ref())
    }

    pub fn response_for(&self, target_id: Uuid) -> Option<&CommandResponse> {
        self.slots
            .iter()
            .find(|s| s.target.target_id == target_id)
            .and_then(|s| s.response.as_ref())
    }

    /// Targets that have not responded yet.
    pub fn awaiting(&self) -> impl Iterator<Item = &CommandTarget> {
        self.slots
            .iter()
            .filter(|s| s.response.is_none())
            .map(|s| &s.target)
    }

    /// Store a response in its target's slot, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] when the response names a target
    /// (id and type) that is not on this command.
    pub fn record(&mut self, response: CommandResponse) -> Result<Option<CommandResponse>> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| {
                s.target.target_id == response.target_id
                    && s.target.target_type == response.target_type
            })
            .ok_or_else(|| DomainError::not_found("CommandTarget", response.target_id))?;

        Ok(slot.response.replace(response))
    }

    /// Aggregate status under the all-must-respond, any-accept rule.
    ///
    /// `Pending` until every target has responded; then `Accepted` if at
    /// least one target accepted, otherwise `Rejected`.
    #[must_use]
    pub fn aggregate(&self) -> CommandStatus {
        if self.awaiting().next().is_some() {
            return CommandStatus::Pending;
        }
        if self.responses().any(|r| r.decision == Decision::Accepted) {
            CommandStatus::Accepted
        } else {
            CommandStatus::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TargetType;
    use chrono::Utc;

    fn target(name: &str) -> CommandTarget {
        CommandTarget {
            target_type: TargetType::Asset,
            target_id: Uuid::new_v4(),
            target_name: name.into(),
        }
    }

    fn response(target: &CommandTarget, decision: Decision) -> CommandResponse {
        CommandResponse {
            target_id: target.target_id,
            target_type: target.target_type,
            target_name: target.target_name.clone(),
            decision,
            notes: None,
            responded_by: "u-1".into(),
            responded_by_name: "Field Lead".into(),
            responded_at: Utc::now(),
        }
    }

    #[test]
    fn test_rejects_empty_and_duplicate_targets() {
        assert!(TargetLedger::new(vec![]).is_err());
        let t = target("Alpha");
        assert!(TargetLedger::new(vec![t.clone(), t]).is_err());
    }

    #[test]
    fn test_aggregate_single_target() {
        let a = target("Alpha");
        let mut ledger = TargetLedger::new(vec![a.clone()]).unwrap();
        assert_eq!(ledger.aggregate(), CommandStatus::Pending);

        ledger.record(response(&a, Decision::Accepted)).unwrap();
        assert_eq!(ledger.aggregate(), CommandStatus::Accepted);
    }

    #[test]
    fn test_aggregate_waits_for_everyone() {
        let a = target("Alpha");
        let b = target("Bravo");
        let mut ledger = TargetLedger::new(vec![a.clone(), b.clone()]).unwrap();

        ledger.record(response(&a, Decision::Rejected)).unwrap();
        assert_eq!(ledger.aggregate(), CommandStatus::Pending);
        assert_eq!(ledger.awaiting().count(), 1);

        ledger.record(response(&b, Decision::Rejected)).unwrap();
        assert_eq!(ledger.aggregate(), CommandStatus::Rejected);
    }

    #[test]
    fn test_resubmission_overwrites_slot() {
        let a = target("Alpha");
        let mut ledger = TargetLedger::new(vec![a.clone()]).unwrap();

        assert!(ledger.record(response(&a, Decision::Rejected)).unwrap().is_none());
        let replaced = ledger.record(response(&a, Decision::Accepted)).unwrap();

        assert_eq!(replaced.unwrap().decision, Decision::Rejected);
        assert_eq!(ledger.responses().count(), 1);
        assert_eq!(ledger.response_for(a.target_id).unwrap().decision, Decision::Accepted);
    }

    #[test]
    fn test_unknown_target_is_not_found() {
        let a = target("Alpha");
        let mut ledger = TargetLedger::new(vec![a.clone()]).unwrap();

        let stranger = target("Zulu");
        let err = ledger.record(response(&stranger, Decision::Accepted)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let mut wrong_type = response(&a, Decision::Accepted);
        wrong_type.target_type = TargetType::Team;
        assert!(ledger.record(wrong_type).is_err());
        assert!(ledger.response_for(a.target_id).is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let a = target("Alpha");
        let json = serde_json::to_string(&vec![
            LedgerSlot { target: a.clone(), response: None },
            LedgerSlot { target: a, response: None },
        ])
        .unwrap();
        assert!(serde_json::from_str::<TargetLedger>(&json).is_err());
    }
}
