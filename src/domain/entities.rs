//! Domain entities as returned by the backing API.

use serde::{Deserialize, Serialize};

use crate::domain::types::{PriorityTier, TicketPriority, TicketStatus};

pub const DEFAULT_EXPERTISE_RATING: u8 = 3;
pub const MIN_EXPERTISE_RATING: u8 = 1;
pub const MAX_EXPERTISE_RATING: u8 = 5;

/// Association of one counselor with one ticket category.
///
/// Only the capacity inputs are stored. Utilization, assignment score and
/// `can_take_ticket` are derived on every read (see [`crate::domain::scoring`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializationRecord {
    pub id: i64,
    pub counselor_id: i64,
    pub category_id: i64,
    pub priority_tier: PriorityTier,
    #[serde(default)]
    pub expertise_rating: Option<u8>,
    pub max_workload: u32,
    pub current_workload: u32,
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counselor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: i64,
    pub subject: String,
    pub category_id: Option<i64>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(default)]
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub id: i64,
    pub category_id: Option<i64>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
