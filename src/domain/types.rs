//! Shared domain enumerations aligned with the backing API's string values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Ranking of a specialization within its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Primary,
    Secondary,
    Backup,
    /// Any tier value the backing API sends that this build does not know.
    #[serde(other)]
    Unrecognized,
}

impl PriorityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::Primary => "primary",
            PriorityTier::Secondary => "secondary",
            PriorityTier::Backup => "backup",
            PriorityTier::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityTier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(PriorityTier::Primary),
            "secondary" => Ok(PriorityTier::Secondary),
            "backup" => Ok(PriorityTier::Backup),
            other => Err(DomainError::validation(
                "priority_tier",
                format!("unknown tier `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

/// Caller role used for permission checks on mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Counselor,
    Client,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Counselor => "counselor",
            Role::Client => "client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_deserializes_as_unrecognized() {
        let tier: PriorityTier = serde_json::from_str("\"overflow\"").expect("tier");
        assert_eq!(tier, PriorityTier::Unrecognized);
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!(
            "Secondary".parse::<PriorityTier>().expect("tier"),
            PriorityTier::Secondary
        );
        assert!("overflow".parse::<PriorityTier>().is_err());
    }
}
