//! In-memory backing source.
//!
//! Implements every repository trait over a seeded data set. Faults and
//! latency can be injected so the stale-fallback, coalescing and bulk paths
//! can be exercised without a network.

use std::collections::HashSet;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::application::filters::SpecializationFilter;
use crate::application::repos::{
    AvailabilityUpdate, CatalogRepo, NewSpecialization, RepoError, SpecializationUpdate,
    SpecializationsRepo, TicketsRepo,
};
use crate::cache::{rw_read, rw_write};
use crate::domain::entities::{CategoryRecord, FaqRecord, SpecializationRecord, TicketRecord};
use crate::domain::scoring::ScoredSpecialization;
use crate::domain::types::{TicketPriority, TicketStatus};

use super::error::InfraError;

const SOURCE: &str = "infra::memory";

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub specializations: Vec<SpecializationRecord>,
    pub tickets: Vec<TicketRecord>,
    pub faqs: Vec<FaqRecord>,
    pub categories: Vec<CategoryRecord>,
}

#[derive(Debug, Default)]
struct Faults {
    reads: Option<RepoError>,
    writes: Option<RepoError>,
    tickets: HashSet<i64>,
    latency: Duration,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<SeedData>,
    faults: RwLock<Faults>,
    list_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(seed: SeedData) -> Self {
        Self {
            data: RwLock::new(seed),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| InfraError::seed(path, err.to_string()))?;
        Self::from_json(&raw).map_err(|err| InfraError::seed(path, err.to_string()))
    }

    /// Make every listing call fail with `error` until cleared with `None`.
    pub fn fail_reads(&self, error: Option<RepoError>) {
        rw_write(&self.faults, SOURCE, "fail_reads").reads = error;
    }

    /// Make every specialization write fail with `error` until cleared with `None`.
    pub fn fail_writes(&self, error: Option<RepoError>) {
        rw_write(&self.faults, SOURCE, "fail_writes").writes = error;
    }

    /// Reject every ticket mutation targeting one of `ids`.
    pub fn fail_tickets(&self, ids: impl IntoIterator<Item = i64>) {
        rw_write(&self.faults, SOURCE, "fail_tickets")
            .tickets
            .extend(ids);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        rw_write(&self.faults, SOURCE, "set_latency").latency = latency;
    }

    /// Specialization listing calls that reached the backend.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// FAQ and category listing calls that reached the backend.
    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    /// Write calls that reached the backend, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn specializations(&self) -> Vec<SpecializationRecord> {
        rw_read(&self.data, SOURCE, "specializations")
            .specializations
            .clone()
    }

    pub fn ticket(&self, id: i64) -> Option<TicketRecord> {
        rw_read(&self.data, SOURCE, "ticket")
            .tickets
            .iter()
            .find(|ticket| ticket.id == id)
            .cloned()
    }

    async fn before_read(&self, calls: &AtomicUsize) -> Result<(), RepoError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let (latency, fault) = {
            let faults = rw_read(&self.faults, SOURCE, "before_read");
            (faults.latency, faults.reads.clone())
        };
        pause(latency).await;
        fault.map_or(Ok(()), Err)
    }

    async fn before_write(&self) -> Result<(), RepoError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let (latency, fault) = {
            let faults = rw_read(&self.faults, SOURCE, "before_write");
            (faults.latency, faults.writes.clone())
        };
        pause(latency).await;
        fault.map_or(Ok(()), Err)
    }

    async fn before_ticket_write(&self, ticket_id: i64) -> Result<(), RepoError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let (latency, rejected) = {
            let faults = rw_read(&self.faults, SOURCE, "before_ticket_write");
            (faults.latency, faults.tickets.contains(&ticket_id))
        };
        pause(latency).await;
        if rejected {
            return Err(RepoError::Unavailable(format!(
                "ticket `{ticket_id}` rejected"
            )));
        }
        Ok(())
    }

    fn update_ticket<F>(&self, ticket_id: i64, change: F) -> Result<TicketRecord, RepoError>
    where
        F: FnOnce(&mut SeedData, usize),
    {
        let mut data = rw_write(&self.data, SOURCE, "update_ticket");
        let index = data
            .tickets
            .iter()
            .position(|ticket| ticket.id == ticket_id)
            .ok_or(RepoError::NotFound)?;
        change(&mut data, index);
        Ok(data.tickets[index].clone())
    }
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

/// Adjust `current_workload` of the counselor's record for `category_id`.
fn shift_workload(data: &mut SeedData, counselor_id: i64, category_id: Option<i64>, up: bool) {
    let Some(category_id) = category_id else {
        return;
    };
    if let Some(record) = data
        .specializations
        .iter_mut()
        .find(|record| record.counselor_id == counselor_id && record.category_id == category_id)
    {
        record.current_workload = if up {
            record.current_workload.saturating_add(1)
        } else {
            record.current_workload.saturating_sub(1)
        };
    }
}

fn is_open(status: TicketStatus) -> bool {
    !matches!(status, TicketStatus::Resolved | TicketStatus::Closed)
}

#[async_trait]
impl SpecializationsRepo for InMemoryBackend {
    async fn list_specializations(
        &self,
        filter: &SpecializationFilter,
    ) -> Result<Vec<SpecializationRecord>, RepoError> {
        self.before_read(&self.list_calls).await?;
        let data = rw_read(&self.data, SOURCE, "list_specializations");
        let mut scored: Vec<ScoredSpecialization> = data
            .specializations
            .iter()
            .filter(|record| filter.matches(record))
            .map(SpecializationRecord::scored)
            .collect();
        scored.sort_by(|a, b| filter.compare(a, b));
        let page: Vec<SpecializationRecord> = scored
            .into_iter()
            .skip(filter.offset())
            .take(filter.per_page as usize)
            .map(|scored| scored.record)
            .collect();
        debug!(returned = page.len(), "in-memory specialization listing");
        Ok(page)
    }

    async fn create_specialization(
        &self,
        params: &NewSpecialization,
    ) -> Result<SpecializationRecord, RepoError> {
        self.before_write().await?;
        let mut data = rw_write(&self.data, SOURCE, "create_specialization");
        if data.specializations.iter().any(|record| {
            record.counselor_id == params.counselor_id && record.category_id == params.category_id
        }) {
            return Err(RepoError::Conflict {
                message: format!(
                    "counselor `{}` already covers category `{}`",
                    params.counselor_id, params.category_id
                ),
            });
        }
        let id = data
            .specializations
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
            + 1;
        let record = SpecializationRecord {
            id,
            counselor_id: params.counselor_id,
            category_id: params.category_id,
            priority_tier: params.priority_tier,
            expertise_rating: params.expertise_rating,
            max_workload: params.max_workload,
            current_workload: 0,
            is_available: params.is_available,
            counselor_name: None,
            category_name: None,
        };
        data.specializations.insert(0, record.clone());
        Ok(record)
    }

    async fn update_specialization(
        &self,
        params: &SpecializationUpdate,
    ) -> Result<SpecializationRecord, RepoError> {
        self.before_write().await?;
        let mut data = rw_write(&self.data, SOURCE, "update_specialization");
        let record = data
            .specializations
            .iter_mut()
            .find(|record| record.id == params.id)
            .ok_or(RepoError::NotFound)?;
        *record = params.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_specialization(&self, id: i64) -> Result<(), RepoError> {
        self.before_write().await?;
        let mut data = rw_write(&self.data, SOURCE, "delete_specialization");
        let before = data.specializations.len();
        data.specializations.retain(|record| record.id != id);
        if data.specializations.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_availability(&self, updates: &[AvailabilityUpdate]) -> Result<(), RepoError> {
        self.before_write().await?;
        let mut data = rw_write(&self.data, SOURCE, "update_availability");
        let known = updates.iter().all(|update| {
            data.specializations
                .iter()
                .any(|record| record.id == update.id)
        });
        if !known {
            return Err(RepoError::NotFound);
        }
        for update in updates {
            if let Some(record) = data
                .specializations
                .iter_mut()
                .find(|record| record.id == update.id)
            {
                record.is_available = update.is_available;
            }
        }
        Ok(())
    }

    async fn reset_workloads(&self, counselor_id: Option<i64>) -> Result<u64, RepoError> {
        self.before_write().await?;
        let mut data = rw_write(&self.data, SOURCE, "reset_workloads");
        let mut affected = 0;
        for record in data
            .specializations
            .iter_mut()
            .filter(|record| counselor_id.is_none_or(|id| record.counselor_id == id))
        {
            record.current_workload = 0;
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl TicketsRepo for InMemoryBackend {
    async fn assign_ticket(
        &self,
        ticket_id: i64,
        counselor_id: i64,
    ) -> Result<TicketRecord, RepoError> {
        self.before_ticket_write(ticket_id).await?;
        self.update_ticket(ticket_id, |data, index| {
            let ticket = data.tickets[index].clone();
            if is_open(ticket.status) {
                if let Some(previous) = ticket.assigned_to {
                    shift_workload(data, previous, ticket.category_id, false);
                }
                shift_workload(data, counselor_id, ticket.category_id, true);
            }
            let ticket = &mut data.tickets[index];
            ticket.assigned_to = Some(counselor_id);
            if ticket.status == TicketStatus::Open {
                ticket.status = TicketStatus::InProgress;
            }
        })
    }

    async fn update_ticket_status(
        &self,
        ticket_id: i64,
        status: TicketStatus,
    ) -> Result<TicketRecord, RepoError> {
        self.before_ticket_write(ticket_id).await?;
        self.update_ticket(ticket_id, |data, index| {
            let ticket = data.tickets[index].clone();
            if let Some(counselor_id) = ticket.assigned_to {
                match (is_open(ticket.status), is_open(status)) {
                    (true, false) => shift_workload(data, counselor_id, ticket.category_id, false),
                    (false, true) => shift_workload(data, counselor_id, ticket.category_id, true),
                    _ => {}
                }
            }
            data.tickets[index].status = status;
        })
    }

    async fn update_ticket_priority(
        &self,
        ticket_id: i64,
        priority: TicketPriority,
    ) -> Result<TicketRecord, RepoError> {
        self.before_ticket_write(ticket_id).await?;
        self.update_ticket(ticket_id, |data, index| {
            data.tickets[index].priority = priority;
        })
    }
}

#[async_trait]
impl CatalogRepo for InMemoryBackend {
    async fn list_faqs(&self, category_id: Option<i64>) -> Result<Vec<FaqRecord>, RepoError> {
        self.before_read(&self.catalog_calls).await?;
        let data = rw_read(&self.data, SOURCE, "list_faqs");
        Ok(data
            .faqs
            .iter()
            .filter(|faq| category_id.is_none_or(|id| faq.category_id == Some(id)))
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        self.before_read(&self.catalog_calls).await?;
        Ok(rw_read(&self.data, SOURCE, "list_categories")
            .categories
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "specializations": [
            {"id": 1, "counselor_id": 10, "category_id": 1, "priority_tier": "primary",
             "expertise_rating": 5, "max_workload": 10, "current_workload": 2, "is_available": true},
            {"id": 2, "counselor_id": 20, "category_id": 1, "priority_tier": "tertiary",
             "max_workload": 4, "current_workload": 1, "is_available": true}
        ],
        "tickets": [
            {"id": 100, "subject": "Locked out", "category_id": 1, "status": "open", "priority": "high"}
        ]
    }"#;

    #[tokio::test]
    async fn seed_parses_with_defaults() {
        let backend = InMemoryBackend::from_json(SEED).expect("seed");
        let records = backend
            .list_specializations(&SpecializationFilter::default())
            .await
            .expect("list");
        assert_eq!(records.len(), 2);
        let unknown = records.iter().find(|r| r.id == 2).expect("record 2");
        assert_eq!(
            unknown.priority_tier,
            crate::domain::types::PriorityTier::Unrecognized
        );
        assert_eq!(unknown.expertise_rating, None);
    }

    #[tokio::test]
    async fn assigning_moves_workload() {
        let backend = InMemoryBackend::from_json(SEED).expect("seed");
        let ticket = backend.assign_ticket(100, 10).await.expect("assign");
        assert_eq!(ticket.assigned_to, Some(10));
        assert_eq!(ticket.status, TicketStatus::InProgress);
        let record = backend
            .specializations()
            .into_iter()
            .find(|r| r.id == 1)
            .expect("record 1");
        assert_eq!(record.current_workload, 3);

        backend
            .update_ticket_status(100, TicketStatus::Resolved)
            .await
            .expect("resolve");
        let record = backend
            .specializations()
            .into_iter()
            .find(|r| r.id == 1)
            .expect("record 1");
        assert_eq!(record.current_workload, 2);
    }

    #[tokio::test]
    async fn availability_batch_is_all_or_nothing() {
        let backend = InMemoryBackend::from_json(SEED).expect("seed");
        let result = backend
            .update_availability(&[
                AvailabilityUpdate {
                    id: 1,
                    is_available: false,
                },
                AvailabilityUpdate {
                    id: 99,
                    is_available: false,
                },
            ])
            .await;
        assert_eq!(result, Err(RepoError::NotFound));
        assert!(backend.specializations().iter().all(|r| r.is_available));
    }

    #[tokio::test]
    async fn injected_faults_surface() {
        let backend = InMemoryBackend::from_json(SEED).expect("seed");
        backend.fail_reads(Some(RepoError::Timeout));
        assert_eq!(backend.list_categories().await, Err(RepoError::Timeout));
        backend.fail_reads(None);
        assert!(backend.list_categories().await.is_ok());

        backend.fail_tickets([100]);
        assert!(matches!(
            backend.assign_ticket(100, 10).await,
            Err(RepoError::Unavailable(_))
        ));
        assert_eq!(backend.catalog_calls(), 2);
        assert_eq!(backend.list_calls(), 0);
        assert_eq!(backend.write_calls(), 1);
    }
}
