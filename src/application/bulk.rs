//! Best-effort multi-ticket mutations.
//!
//! Every target is attempted on its own; one failure neither aborts nor
//! rolls back the others. Attempts run concurrently and the outcome is built
//! only after all of them have settled.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::histogram;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::application::access::Actor;
use crate::application::error::AppError;
use crate::application::notify::{Notice, NotificationSink};
use crate::application::repos::{RepoError, TicketsRepo};
use crate::cache::{KeyPattern, Namespace, StaleCache};
use crate::domain::types::{TicketPriority, TicketStatus};

pub(crate) const METRIC_BULK_APPLY_MS: &str = "deskroute_bulk_apply_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BulkMutation {
    Assign { counselor_id: i64 },
    Status { status: TicketStatus },
    Priority { priority: TicketPriority },
}

impl BulkMutation {
    pub fn label(&self) -> &'static str {
        match self {
            BulkMutation::Assign { .. } => "Assignment",
            BulkMutation::Status { .. } => "Status change",
            BulkMutation::Priority { .. } => "Priority change",
        }
    }

    /// Assignments and status changes move counselor load; priority does not.
    fn moves_workload(&self) -> bool {
        !matches!(self, BulkMutation::Priority { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub id: i64,
    #[serde(serialize_with = "serialize_display")]
    pub error: RepoError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub success_count: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn attempted(&self) -> usize {
        self.success_count + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<i64> {
        self.failures.iter().map(|failure| failure.id).collect()
    }
}

#[derive(Clone)]
pub struct BulkAssignmentCoordinator {
    tickets: Arc<dyn TicketsRepo>,
    cache: Arc<StaleCache>,
    notifier: Arc<dyn NotificationSink>,
    concurrency: usize,
}

impl BulkAssignmentCoordinator {
    pub fn new(
        tickets: Arc<dyn TicketsRepo>,
        cache: Arc<StaleCache>,
        notifier: Arc<dyn NotificationSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            tickets,
            cache,
            notifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Apply `mutation` to every ticket in `target_ids`.
    ///
    /// Only malformed input or a denied caller produce `Err`; per-ticket
    /// failures are collected in the outcome. Duplicate ids are attempted
    /// once and failures keep the input order.
    #[instrument(skip(self, target_ids), fields(targets = target_ids.len()))]
    pub async fn bulk_apply(
        &self,
        actor: &Actor,
        target_ids: &[i64],
        mutation: BulkMutation,
    ) -> Result<BulkOutcome, AppError> {
        actor.require_staff("bulk ticket update")?;
        if let BulkMutation::Assign { counselor_id } = mutation {
            if counselor_id <= 0 {
                return Err(AppError::validation("counselor_id is required"));
            }
        }
        let ids = unique_ids(target_ids)?;
        if ids.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let started_at = Instant::now();
        let results: Vec<(i64, Result<(), RepoError>)> = stream::iter(ids)
            .map(|id| async move { (id, self.apply_one(id, mutation).await) })
            .buffered(self.concurrency)
            .collect()
            .await;
        histogram!(METRIC_BULK_APPLY_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let mut outcome = BulkOutcome::default();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.success_count += 1,
                Err(error) => {
                    warn!(id, error = %error, "bulk item failed");
                    outcome.failures.push(BulkFailure { id, error });
                }
            }
        }

        if outcome.success_count > 0 {
            self.invalidate_affected(mutation);
        }

        info!(
            action = mutation.label(),
            succeeded = outcome.success_count,
            failed = outcome.failures.len(),
            "Bulk update settled"
        );
        self.notifier.notify(summary_notice(mutation, &outcome));
        Ok(outcome)
    }

    pub async fn bulk_assign(
        &self,
        actor: &Actor,
        target_ids: &[i64],
        counselor_id: i64,
    ) -> Result<BulkOutcome, AppError> {
        self.bulk_apply(actor, target_ids, BulkMutation::Assign { counselor_id })
            .await
    }

    async fn apply_one(&self, id: i64, mutation: BulkMutation) -> Result<(), RepoError> {
        match mutation {
            BulkMutation::Assign { counselor_id } => {
                self.tickets.assign_ticket(id, counselor_id).await?;
            }
            BulkMutation::Status { status } => {
                self.tickets.update_ticket_status(id, status).await?;
            }
            BulkMutation::Priority { priority } => {
                self.tickets.update_ticket_priority(id, priority).await?;
            }
        }
        Ok(())
    }

    fn invalidate_affected(&self, mutation: BulkMutation) {
        self.cache.invalidate(Some(&Namespace::Tickets.pattern()));
        if mutation.moves_workload() {
            self.cache.invalidate(Some(&Namespace::Workload.pattern()));
            self.cache
                .invalidate(Some(&KeyPattern::specialization_lists()));
        }
    }
}

fn unique_ids(target_ids: &[i64]) -> Result<Vec<i64>, AppError> {
    let mut seen = HashSet::with_capacity(target_ids.len());
    let mut ids = Vec::with_capacity(target_ids.len());
    for &id in target_ids {
        if id <= 0 {
            return Err(AppError::validation(format!("ticket id `{id}` is invalid")));
        }
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn summary_notice(mutation: BulkMutation, outcome: &BulkOutcome) -> Notice {
    let successes = outcome.success_count;
    match outcome.failures.first() {
        None => Notice::success(format!(
            "{} applied to {} ticket{}",
            mutation.label(),
            successes,
            if successes == 1 { "" } else { "s" }
        )),
        Some(sample) => {
            let text = format!(
                "{} succeeded, {} failed (e.g. #{}: {})",
                successes,
                outcome.failures.len(),
                sample.id,
                sample.error
            );
            let notice = if successes == 0 {
                Notice::error(text)
            } else {
                Notice::warning(text)
            };
            Notice {
                retryable: outcome.failures.iter().any(|f| f.error.is_transient()),
                ..notice
            }
        }
    }
}

fn serialize_display<S>(error: &RepoError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notify::NoticeKind;

    #[test]
    fn unique_ids_dedupes_in_order() {
        assert_eq!(unique_ids(&[3, 1, 3, 2, 1]).expect("ids"), vec![3, 1, 2]);
        assert!(unique_ids(&[1, -4]).is_err());
    }

    #[test]
    fn summary_reports_partial_failure_with_sample() {
        let outcome = BulkOutcome {
            success_count: 3,
            failures: vec![BulkFailure {
                id: 9,
                error: RepoError::Timeout,
            }],
        };
        let notice = summary_notice(BulkMutation::Assign { counselor_id: 1 }, &outcome);
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert_eq!(
            notice.text,
            "3 succeeded, 1 failed (e.g. #9: backing source timed out)"
        );
        assert!(notice.retryable);
    }

    #[test]
    fn summary_for_clean_run() {
        let outcome = BulkOutcome {
            success_count: 1,
            failures: Vec::new(),
        };
        let notice = summary_notice(
            BulkMutation::Priority {
                priority: TicketPriority::High,
            },
            &outcome,
        );
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.text, "Priority change applied to 1 ticket");
    }
}
