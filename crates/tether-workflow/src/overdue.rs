//! Read-time overdue derivation
//!
//! Overdue is never a stored status and never a transition target: it is
//! computed from the due date whenever a snapshot is displayed, so the
//! stored graph stays small and a due date edit never needs a workflow
//! write.

use chrono::{DateTime, Utc};
use std::fmt;
use tether_model::{Entity, Status};

/// Payload field the derivation reads
const DUE_DATE_FIELD: &str = "due_date";

/// What a snapshot's status looks like at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveStatus {
    /// The stored status, unmodified
    Stored(Status),
    /// Non-terminal and past its due date
    Overdue(Status),
}

impl EffectiveStatus {
    /// The stored status underneath
    #[inline]
    #[must_use]
    pub fn stored(self) -> Status {
        match self {
            EffectiveStatus::Stored(status) | EffectiveStatus::Overdue(status) => status,
        }
    }

    /// Check for the overdue decoration
    #[inline]
    #[must_use]
    pub fn is_overdue(self) -> bool {
        matches!(self, EffectiveStatus::Overdue(_))
    }
}

impl fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectiveStatus::Stored(status) => f.write_str(status.as_str()),
            EffectiveStatus::Overdue(_) => f.write_str("OVERDUE"),
        }
    }
}

/// Derive the display status of a snapshot at `now`
///
/// `None` when the entity carries no workflow status at all. Terminal
/// entities are never overdue, however old their due date.
#[must_use]
pub fn effective_status(entity: &Entity, now: DateTime<Utc>) -> Option<EffectiveStatus> {
    let status = entity.status?;
    if !status.is_terminal() {
        if let Some(due) = entity.payload.date_field(DUE_DATE_FIELD) {
            if due < now {
                return Some(EffectiveStatus::Overdue(status));
            }
        }
    }
    Some(EffectiveStatus::Stored(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tether_model::{EntityType, Payload};

    fn task_due(status: Status, due: &str) -> Entity {
        let mut payload = Payload::new();
        payload.set(DUE_DATE_FIELD, due);
        Entity::new(EntityType::Task, "7", payload).with_status(status)
    }

    fn at(date: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&format!("{date} 12:00:00"), "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn past_due_non_terminal_is_overdue() {
        let task = task_due(Status::Pending, "2024-02-20");
        let derived = effective_status(&task, at("2024-03-01")).unwrap();
        assert!(derived.is_overdue());
        assert_eq!(derived.stored(), Status::Pending);
        assert_eq!(derived.to_string(), "OVERDUE");
    }

    #[test]
    fn future_due_is_stored_status() {
        let task = task_due(Status::InProgress, "2024-02-20");
        let derived = effective_status(&task, at("2024-02-01")).unwrap();
        assert_eq!(derived, EffectiveStatus::Stored(Status::InProgress));
        assert_eq!(derived.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn terminal_states_are_never_overdue() {
        let done = task_due(Status::Completed, "2020-01-01");
        let derived = effective_status(&done, at("2024-03-01")).unwrap();
        assert!(!derived.is_overdue());

        let rejected = task_due(Status::Rejected, "2020-01-01");
        assert!(!effective_status(&rejected, at("2024-03-01"))
            .unwrap()
            .is_overdue());
    }

    #[test]
    fn missing_due_date_is_never_overdue() {
        let task = Entity::new(EntityType::Task, "7", Payload::new())
            .with_status(Status::Pending);
        let derived = effective_status(&task, Utc::now()).unwrap();
        assert!(!derived.is_overdue());
    }

    #[test]
    fn statusless_entities_derive_nothing() {
        let profile = Entity::new(EntityType::Profile, "u1", Payload::new());
        assert_eq!(effective_status(&profile, Utc::now()), None);
    }
}
