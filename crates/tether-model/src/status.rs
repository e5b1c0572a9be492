//! Status graph for task/document workflows
//!
//! The stored states and the legal transitions between them. `OVERDUE` is
//! deliberately absent: it is derived at read time from the due date and
//! never stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stored workflow status of a task or document entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Newly created, awaiting triage
    Pending,
    /// Accepted for work
    Accepted,
    /// Actively being worked on
    InProgress,
    /// Submitted for review
    Review,
    /// Finished (terminal)
    Completed,
    /// Declined at triage (terminal)
    Rejected,
}

impl Status {
    /// Legal transition targets from this status
    #[must_use]
    pub fn successors(self) -> &'static [Status] {
        use Status::*;
        match self {
            Pending => &[Accepted, Rejected],
            Accepted => &[InProgress],
            InProgress => &[Review],
            // Review may loop back for rework
            Review => &[Completed, InProgress],
            Completed | Rejected => &[],
        }
    }

    /// Check whether moving to `target` is legal
    #[inline]
    #[must_use]
    pub fn can_transition(self, target: Status) -> bool {
        self.successors().contains(&target)
    }

    /// Check whether this status admits no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Wire representation, matching the serde form
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Accepted => "ACCEPTED",
            Status::InProgress => "IN_PROGRESS",
            Status::Review => "REVIEW",
            Status::Completed => "COMPLETED",
            Status::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not part of the graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    /// Parse a wire status, tolerating case and separator drift
    /// (`in_progress`, `IN-PROGRESS`, `inProgress` all map to `InProgress`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match canonical.as_str() {
            "PENDING" => Ok(Status::Pending),
            "ACCEPTED" => Ok(Status::Accepted),
            "INPROGRESS" => Ok(Status::InProgress),
            "REVIEW" => Ok(Status::Review),
            "COMPLETED" => Ok(Status::Completed),
            "REJECTED" => Ok(Status::Rejected),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// All stored statuses, in graph order
pub const ALL_STATUSES: [Status; 6] = [
    Status::Pending,
    Status::Accepted,
    Status::InProgress,
    Status::Review,
    Status::Completed,
    Status::Rejected,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_branches_to_accepted_or_rejected() {
        assert!(Status::Pending.can_transition(Status::Accepted));
        assert!(Status::Pending.can_transition(Status::Rejected));
        assert!(!Status::Pending.can_transition(Status::Completed));
        assert!(!Status::Pending.can_transition(Status::InProgress));
    }

    #[test]
    fn review_allows_rework() {
        assert!(Status::Review.can_transition(Status::InProgress));
        assert!(Status::Review.can_transition(Status::Completed));
        assert!(!Status::Review.can_transition(Status::Pending));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Rejected.is_terminal());
        assert!(Status::Completed.successors().is_empty());
        assert!(Status::Rejected.successors().is_empty());
    }

    #[test]
    fn no_self_transitions() {
        for status in ALL_STATUSES {
            assert!(!status.can_transition(status), "{status} loops to itself");
        }
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");

        let back: Status = serde_json::from_str("\"REVIEW\"").unwrap();
        assert_eq!(back, Status::Review);
    }

    #[test]
    fn parse_tolerates_wire_drift() {
        assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("inProgress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("PENDING".parse::<Status>().unwrap(), Status::Pending);
        assert_eq!("Review".parse::<Status>().unwrap(), Status::Review);
        assert!("archived".parse::<Status>().is_err());
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(Status::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(Status::Accepted.to_string(), "ACCEPTED");
    }
}
