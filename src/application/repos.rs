//! Repository traits describing the backing data-access adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::filters::SpecializationFilter;
use crate::domain::entities::{
    CategoryRecord, FaqRecord, MAX_EXPERTISE_RATING, MIN_EXPERTISE_RATING, SpecializationRecord,
    TicketRecord,
};
use crate::domain::error::DomainError;
use crate::domain::types::{PriorityTier, TicketPriority, TicketStatus};

/// Failure reported by a backing adapter.
///
/// `Clone` so one failed coalesced fetch can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("backing source unavailable: {0}")]
    Unavailable(String),
    #[error("backing source timed out")]
    Timeout,
    #[error("resource not found")]
    NotFound,
    #[error("conflicting update: {message}")]
    Conflict { message: String },
}

impl RepoError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Unavailable(_) | RepoError::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpecialization {
    pub counselor_id: i64,
    pub category_id: i64,
    pub priority_tier: PriorityTier,
    pub expertise_rating: Option<u8>,
    pub max_workload: u32,
    pub is_available: bool,
}

impl NewSpecialization {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.counselor_id <= 0 {
            return Err(DomainError::validation("counselor_id", "is required"));
        }
        if self.category_id <= 0 {
            return Err(DomainError::validation("category_id", "is required"));
        }
        if self.priority_tier == PriorityTier::Unrecognized {
            return Err(DomainError::validation(
                "priority_tier",
                "must be primary, secondary or backup",
            ));
        }
        validate_rating(self.expertise_rating)
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecializationUpdate {
    pub id: i64,
    pub priority_tier: Option<PriorityTier>,
    pub expertise_rating: Option<u8>,
    pub max_workload: Option<u32>,
    pub current_workload: Option<u32>,
    pub is_available: Option<bool>,
}

impl SpecializationUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id <= 0 {
            return Err(DomainError::validation("id", "is required"));
        }
        if self.priority_tier == Some(PriorityTier::Unrecognized) {
            return Err(DomainError::validation(
                "priority_tier",
                "must be primary, secondary or backup",
            ));
        }
        validate_rating(self.expertise_rating)
    }

    /// Apply the present fields onto `record`.
    pub fn apply_to(&self, record: &SpecializationRecord) -> SpecializationRecord {
        let mut next = record.clone();
        if let Some(tier) = self.priority_tier {
            next.priority_tier = tier;
        }
        if let Some(rating) = self.expertise_rating {
            next.expertise_rating = Some(rating);
        }
        if let Some(max) = self.max_workload {
            next.max_workload = max;
        }
        if let Some(current) = self.current_workload {
            next.current_workload = current;
        }
        if let Some(available) = self.is_available {
            next.is_available = available;
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub id: i64,
    pub is_available: bool,
}

fn validate_rating(rating: Option<u8>) -> Result<(), DomainError> {
    match rating {
        Some(value) if !(MIN_EXPERTISE_RATING..=MAX_EXPERTISE_RATING).contains(&value) => {
            Err(DomainError::validation(
                "expertise_rating",
                format!("must be between {MIN_EXPERTISE_RATING} and {MAX_EXPERTISE_RATING}"),
            ))
        }
        _ => Ok(()),
    }
}

#[async_trait]
pub trait SpecializationsRepo: Send + Sync {
    async fn list_specializations(
        &self,
        filter: &SpecializationFilter,
    ) -> Result<Vec<SpecializationRecord>, RepoError>;

    async fn create_specialization(
        &self,
        params: &NewSpecialization,
    ) -> Result<SpecializationRecord, RepoError>;

    async fn update_specialization(
        &self,
        params: &SpecializationUpdate,
    ) -> Result<SpecializationRecord, RepoError>;

    async fn delete_specialization(&self, id: i64) -> Result<(), RepoError>;

    /// Apply every availability change in one backing call.
    async fn update_availability(&self, updates: &[AvailabilityUpdate]) -> Result<(), RepoError>;

    /// Zero `current_workload` for one counselor, or for everyone. Returns affected rows.
    async fn reset_workloads(&self, counselor_id: Option<i64>) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait TicketsRepo: Send + Sync {
    async fn assign_ticket(
        &self,
        ticket_id: i64,
        counselor_id: i64,
    ) -> Result<TicketRecord, RepoError>;

    async fn update_ticket_status(
        &self,
        ticket_id: i64,
        status: TicketStatus,
    ) -> Result<TicketRecord, RepoError>;

    async fn update_ticket_priority(
        &self,
        ticket_id: i64,
        priority: TicketPriority,
    ) -> Result<TicketRecord, RepoError>;
}

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_faqs(&self, category_id: Option<i64>) -> Result<Vec<FaqRecord>, RepoError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}
