use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::access::Actor;
use crate::application::error::AppError;
use crate::application::notify::Notice;
use crate::application::registry::SpecializationRegistry;
use crate::application::repos::AvailabilityUpdate;
use crate::domain::entities::SpecializationRecord;
use crate::domain::scoring::ScoredSpecialization;

/// Availability toggles over the registry, single or batched.
#[derive(Clone)]
pub struct AvailabilityCoordinator {
    registry: Arc<SpecializationRegistry>,
}

impl AvailabilityCoordinator {
    pub fn new(registry: Arc<SpecializationRegistry>) -> Self {
        Self { registry }
    }

    /// Apply every update with one backing call and one snapshot write.
    ///
    /// Returns the recomputed records. When an id appears more than once the
    /// last update wins. A failed backing call leaves the registry as it was.
    /// Records a concurrent refresh dropped from the registry are still
    /// returned as written.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn set_availability(
        &self,
        actor: &Actor,
        updates: &[AvailabilityUpdate],
    ) -> Result<Vec<ScoredSpecialization>, AppError> {
        let wanted = collapse(updates)?;
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.registry.snapshot();
        let mut persisted = Vec::with_capacity(wanted.len());
        for (id, is_available) in &wanted {
            let record = snapshot
                .find(*id)
                .ok_or_else(|| AppError::not_found("specialization", *id))?;
            actor.require_owner_or_admin("set availability", record)?;
            persisted.push(SpecializationRecord {
                is_available: *is_available,
                ..record.clone()
            });
        }

        let batch: Vec<AvailabilityUpdate> = wanted
            .iter()
            .map(|(id, is_available)| AvailabilityUpdate {
                id: *id,
                is_available: *is_available,
            })
            .collect();
        if let Err(error) = self.registry.repo().update_availability(&batch).await {
            warn!(error = %error, "availability update rejected by backing source");
            let error = AppError::from(error);
            self.registry.notifier().notify(Notice::from_error(&error));
            return Err(error);
        }

        let next = self.registry.apply(|current| {
            let replacements: Vec<SpecializationRecord> = current
                .records()
                .iter()
                .filter_map(|record| {
                    wanted.get(&record.id).map(|is_available| SpecializationRecord {
                        is_available: *is_available,
                        ..record.clone()
                    })
                })
                .collect();
            current.with_replaced(&replacements)
        });
        let ids: Vec<i64> = wanted.keys().copied().collect();
        self.registry.invalidate_records(&ids);

        // A concurrent refresh may have replaced the snapshot without some of
        // these records; the write still went through.
        let vanished: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| next.find(*id).is_none())
            .collect();
        if !vanished.is_empty() {
            warn!(
                ?vanished,
                "availability persisted for records no longer in the registry"
            );
        }

        let updated: Vec<ScoredSpecialization> = persisted
            .iter()
            .map(|record| next.find(record.id).unwrap_or(record).scored())
            .collect();
        info!(updated = updated.len(), "Availability updated");
        self.registry
            .notifier()
            .notify(Notice::success(match updated.len() {
                1 => "Availability updated".to_string(),
                n => format!("Availability updated for {n} specializations"),
            }));
        Ok(updated)
    }

    pub async fn set_one(
        &self,
        actor: &Actor,
        id: i64,
        is_available: bool,
    ) -> Result<ScoredSpecialization, AppError> {
        let mut updated = self
            .set_availability(actor, &[AvailabilityUpdate { id, is_available }])
            .await?;
        updated
            .pop()
            .ok_or_else(|| AppError::not_found("specialization", id))
    }

    /// Apply one availability value to every selected record, then clear the
    /// selection.
    pub async fn set_for_selection(
        &self,
        actor: &Actor,
        is_available: bool,
    ) -> Result<Vec<ScoredSpecialization>, AppError> {
        let selected = self.registry.selected_ids();
        if selected.is_empty() {
            return Err(AppError::validation("no specializations selected"));
        }
        let updates: Vec<AvailabilityUpdate> = selected
            .into_iter()
            .map(|id| AvailabilityUpdate { id, is_available })
            .collect();
        let updated = self.set_availability(actor, &updates).await?;
        self.registry.clear_selection();
        Ok(updated)
    }
}

fn collapse(updates: &[AvailabilityUpdate]) -> Result<BTreeMap<i64, bool>, AppError> {
    let mut wanted = BTreeMap::new();
    for update in updates {
        if update.id <= 0 {
            return Err(AppError::validation(format!(
                "specialization id `{}` is invalid",
                update.id
            )));
        }
        wanted.insert(update.id, update.is_available);
    }
    Ok(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_keeps_last_update_per_id() {
        let wanted = collapse(&[
            AvailabilityUpdate {
                id: 2,
                is_available: true,
            },
            AvailabilityUpdate {
                id: 1,
                is_available: true,
            },
            AvailabilityUpdate {
                id: 2,
                is_available: false,
            },
        ])
        .expect("valid");
        assert_eq!(wanted, BTreeMap::from([(1, true), (2, false)]));
    }

    #[test]
    fn collapse_rejects_missing_ids() {
        let error = collapse(&[AvailabilityUpdate {
            id: 0,
            is_available: true,
        }])
        .expect_err("missing id");
        assert!(matches!(error, AppError::Validation(_)));
    }
}
