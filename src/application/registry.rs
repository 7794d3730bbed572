//! Authoritative in-memory list of specialization records.
//!
//! State is an immutable [`RegistrySnapshot`] behind a lock. Every mutation
//! reads the current snapshot, builds a complete replacement and swaps it in
//! with a single write, so readers only ever see whole snapshots. No lock is
//! held across an await.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use metrics::counter;
use tracing::{info, instrument, warn};

use crate::application::access::Actor;
use crate::application::error::AppError;
use crate::application::filters::SpecializationFilter;
use crate::application::notify::{Notice, NotificationSink};
use crate::application::outcome::{Fetched, METRIC_CACHE_FALLBACK, read_through};
use crate::application::repos::{
    NewSpecialization, RepoError, SpecializationUpdate, SpecializationsRepo,
};
use crate::cache::{
    CacheKey, KeyPattern, Namespace, RequestCoalescer, StaleCache, rw_read, rw_write,
};
use crate::domain::entities::SpecializationRecord;
use crate::domain::scoring::ScoredSpecialization;
use crate::domain::workload::{WorkloadSnapshot, aggregate};

const SOURCE: &str = "application::registry";

/// One consistent view of the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    records: Vec<SpecializationRecord>,
    selected: BTreeSet<i64>,
    version: u64,
}

impl RegistrySnapshot {
    pub fn records(&self) -> &[SpecializationRecord] {
        &self.records
    }

    pub fn find(&self, id: i64) -> Option<&SpecializationRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.find(id).is_some()
    }

    pub fn selected(&self) -> &BTreeSet<i64> {
        &self.selected
    }

    /// Bumped on every replacement.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy with `records` replaced; selections of vanished ids are dropped.
    pub(crate) fn with_records(&self, records: Vec<SpecializationRecord>) -> Self {
        let selected = self
            .selected
            .iter()
            .copied()
            .filter(|id| records.iter().any(|record| record.id == *id))
            .collect();
        Self {
            records,
            selected,
            version: self.version,
        }
    }

    /// Copy with every record in `replacements` swapped in by id.
    pub(crate) fn with_replaced(&self, replacements: &[SpecializationRecord]) -> Self {
        let records = self
            .records
            .iter()
            .map(|record| {
                replacements
                    .iter()
                    .find(|candidate| candidate.id == record.id)
                    .unwrap_or(record)
                    .clone()
            })
            .collect();
        self.with_records(records)
    }

    fn with_selected(&self, selected: BTreeSet<i64>) -> Self {
        Self {
            selected,
            ..self.clone()
        }
    }
}

pub struct SpecializationRegistry {
    repo: Arc<dyn SpecializationsRepo>,
    cache: Arc<StaleCache>,
    notifier: Arc<dyn NotificationSink>,
    coalescer: RequestCoalescer<Vec<SpecializationRecord>, RepoError>,
    state: RwLock<Arc<RegistrySnapshot>>,
}

impl SpecializationRegistry {
    pub fn new(
        repo: Arc<dyn SpecializationsRepo>,
        cache: Arc<StaleCache>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let window = cache.config().coalesce_window();
        Self {
            repo,
            cache,
            notifier,
            coalescer: RequestCoalescer::new(window),
            state: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    pub fn repo(&self) -> &Arc<dyn SpecializationsRepo> {
        &self.repo
    }

    pub fn cache(&self) -> &Arc<StaleCache> {
        &self.cache
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&rw_read(&self.state, SOURCE, "snapshot"))
    }

    /// Swap in the snapshot built by `transform` from the current one.
    pub(crate) fn apply<F>(&self, transform: F) -> Arc<RegistrySnapshot>
    where
        F: FnOnce(&RegistrySnapshot) -> RegistrySnapshot,
    {
        let mut guard = rw_write(&self.state, SOURCE, "apply");
        let mut next = transform(&guard);
        next.version = guard.version.wrapping_add(1);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    /// Load records matching `filter` into the registry.
    ///
    /// The snapshot takes whatever the read path produced, stale fallback
    /// included, so the returned freshness applies to the registry contents.
    #[instrument(skip(self))]
    pub async fn fetch_specializations(
        &self,
        filter: &SpecializationFilter,
        force: bool,
    ) -> Result<Fetched<usize>, AppError> {
        let fetched = self.list(filter, force).await?;
        let count = fetched.data.len();
        let records = fetched.data;
        self.apply(|current| current.with_records(records));
        Ok(Fetched {
            data: count,
            freshness: fetched.freshness,
        })
    }

    /// Cache-first listing that leaves the snapshot untouched.
    pub async fn list(
        &self,
        filter: &SpecializationFilter,
        force: bool,
    ) -> Result<Fetched<Vec<SpecializationRecord>>, AppError> {
        let key = CacheKey::specialization_list(filter);
        let repo = Arc::clone(&self.repo);
        let owned = filter.clone();
        read_through(&self.cache, &self.coalescer, &key, force, move || async move {
            repo.list_specializations(&owned).await
        })
        .await
    }

    /// Aggregate statistics for `filter`, cached in the workload namespace.
    ///
    /// When no listing can be produced the last cached statistics are served
    /// stale.
    #[instrument(skip(self))]
    pub async fn fetch_workload_stats(
        &self,
        filter: &SpecializationFilter,
        force: bool,
    ) -> Result<Fetched<WorkloadSnapshot>, AppError> {
        let key = CacheKey::workload_stats(filter);
        let cached = self.cache.get::<WorkloadSnapshot>(&key);
        if !force {
            if let Some(hit) = cached.as_ref().filter(|hit| !hit.is_stale) {
                return Ok(Fetched::fresh(hit.data.clone()));
            }
        }

        let listing = match self.list(filter, force).await {
            Ok(listing) => listing,
            Err(error) => {
                let Some(previous) = cached else {
                    return Err(error);
                };
                counter!(METRIC_CACHE_FALLBACK, "namespace" => key.namespace().prefix())
                    .increment(1);
                warn!(
                    key = %key,
                    error = %error,
                    age_secs = previous.age.as_secs(),
                    "listing unavailable; serving last cached statistics"
                );
                return Ok(Fetched::stale(previous.data, error.to_string()));
            }
        };
        let stats = listing.map(|records| aggregate(&records));
        if !stats.is_stale() {
            self.cache.put(&key, stats.data);
        }
        Ok(stats)
    }

    pub fn get(&self, id: i64) -> Option<ScoredSpecialization> {
        self.snapshot().find(id).map(SpecializationRecord::scored)
    }

    /// Registry records matching `filter`, ordered and paged by it.
    pub fn ranked(&self, filter: &SpecializationFilter) -> Vec<ScoredSpecialization> {
        let snapshot = self.snapshot();
        let mut scored: Vec<ScoredSpecialization> = snapshot
            .records()
            .iter()
            .filter(|record| filter.matches(record))
            .map(SpecializationRecord::scored)
            .collect();
        scored.sort_by(|a, b| filter.compare(a, b));
        scored
            .into_iter()
            .skip(filter.offset())
            .take(filter.per_page as usize)
            .collect()
    }

    /// Assignable records for a category, best first.
    pub fn best_candidates(&self, category_id: i64, limit: usize) -> Vec<ScoredSpecialization> {
        let snapshot = self.snapshot();
        let mut candidates: Vec<ScoredSpecialization> = snapshot
            .records()
            .iter()
            .filter(|record| record.category_id == category_id && record.can_take_ticket())
            .map(SpecializationRecord::scored)
            .collect();
        candidates.sort_by(|a, b| {
            b.assignment_score
                .cmp(&a.assignment_score)
                .then_with(|| a.utilization_rate.cmp(&b.utilization_rate))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Statistics over the live registry, recomputed on every call.
    pub fn workload_snapshot(&self) -> WorkloadSnapshot {
        aggregate(self.snapshot().records())
    }

    #[instrument(skip(self, params), fields(counselor_id = params.counselor_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        params: NewSpecialization,
    ) -> Result<ScoredSpecialization, AppError> {
        actor.require_admin("create specialization")?;
        params.validate()?;

        let created = self
            .notify_on_error(self.repo.create_specialization(&params).await)
            .map_err(AppError::from)?;
        let inserted = created.clone();
        self.apply(|current| {
            let mut records = Vec::with_capacity(current.len() + 1);
            records.push(inserted.clone());
            records.extend(
                current
                    .records()
                    .iter()
                    .filter(|record| record.id != inserted.id)
                    .cloned(),
            );
            current.with_records(records)
        });
        self.invalidate_records(&[created.id]);

        info!(id = created.id, "Specialization created");
        self.notifier.notify(Notice::success("Specialization created"));
        Ok(created.scored())
    }

    #[instrument(skip(self, params), fields(id = params.id))]
    pub async fn update(
        &self,
        actor: &Actor,
        params: SpecializationUpdate,
    ) -> Result<ScoredSpecialization, AppError> {
        actor.require_admin("update specialization")?;
        params.validate()?;
        self.require_known(params.id)?;

        let updated = self
            .notify_on_error(self.repo.update_specialization(&params).await)
            .map_err(AppError::from)?;
        self.apply(|current| current.with_replaced(std::slice::from_ref(&updated)));
        self.invalidate_records(&[updated.id]);

        info!(id = updated.id, "Specialization updated");
        self.notifier.notify(Notice::success("Specialization updated"));
        Ok(updated.scored())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), AppError> {
        actor.require_admin("delete specialization")?;
        if id <= 0 {
            return Err(AppError::validation("id is required"));
        }
        self.require_known(id)?;

        self.notify_on_error(self.repo.delete_specialization(id).await)
            .map_err(AppError::from)?;
        self.apply(|current| {
            let records = current
                .records()
                .iter()
                .filter(|record| record.id != id)
                .cloned()
                .collect();
            current.with_records(records)
        });
        self.invalidate_records(&[id]);

        info!(id, "Specialization deleted");
        self.notifier.notify(Notice::success("Specialization deleted"));
        Ok(())
    }

    /// Zero `current_workload` for one counselor or for everyone.
    #[instrument(skip(self))]
    pub async fn reset_workloads(
        &self,
        actor: &Actor,
        counselor_id: Option<i64>,
    ) -> Result<u64, AppError> {
        actor.require_admin("reset workloads")?;
        if counselor_id.is_some_and(|id| id <= 0) {
            return Err(AppError::validation("counselor_id must be positive"));
        }

        let affected = self
            .notify_on_error(self.repo.reset_workloads(counselor_id).await)
            .map_err(AppError::from)?;
        let snapshot = self.apply(|current| {
            let records = current
                .records()
                .iter()
                .map(|record| {
                    if counselor_id.is_none_or(|id| record.counselor_id == id) {
                        SpecializationRecord {
                            current_workload: 0,
                            ..record.clone()
                        }
                    } else {
                        record.clone()
                    }
                })
                .collect();
            current.with_records(records)
        });
        let touched: Vec<i64> = snapshot
            .records()
            .iter()
            .filter(|record| counselor_id.is_none_or(|id| record.counselor_id == id))
            .map(|record| record.id)
            .collect();
        self.invalidate_records(&touched);

        info!(affected, ?counselor_id, "Workloads reset");
        self.notifier
            .notify(Notice::success(format!("Reset {affected} workloads")));
        Ok(affected)
    }

    pub fn select(&self, id: i64) -> Result<(), AppError> {
        self.require_known(id)?;
        self.apply(|current| {
            let mut selected = current.selected().clone();
            selected.insert(id);
            current.with_selected(selected)
        });
        Ok(())
    }

    /// Returns whether `id` was selected.
    pub fn deselect(&self, id: i64) -> bool {
        let mut removed = false;
        self.apply(|current| {
            let mut selected = current.selected().clone();
            removed = selected.remove(&id);
            current.with_selected(selected)
        });
        removed
    }

    /// Flip the selection of `id`; returns whether it is now selected.
    pub fn toggle_selection(&self, id: i64) -> Result<bool, AppError> {
        self.require_known(id)?;
        let snapshot = self.apply(|current| {
            let mut selected = current.selected().clone();
            if !selected.remove(&id) {
                selected.insert(id);
            }
            current.with_selected(selected)
        });
        Ok(snapshot.selected().contains(&id))
    }

    pub fn clear_selection(&self) {
        self.apply(|current| current.with_selected(BTreeSet::new()));
    }

    pub fn selected_ids(&self) -> Vec<i64> {
        self.snapshot().selected().iter().copied().collect()
    }

    /// Drop cached specialization and workload entries.
    pub fn invalidate_cache(&self) -> usize {
        self.cache
            .invalidate_namespaces(&[Namespace::Specializations, Namespace::Workload])
    }

    /// Drop every cached entry, in every namespace.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Drop the entries a change to `ids` can affect: each record, every
    /// listing and every workload aggregate.
    pub(crate) fn invalidate_records(&self, ids: &[i64]) {
        for id in ids {
            self.cache
                .invalidate(Some(&KeyPattern::from(&CacheKey::specialization(*id))));
        }
        self.cache
            .invalidate(Some(&KeyPattern::specialization_lists()));
        self.cache.invalidate(Some(&Namespace::Workload.pattern()));
    }

    pub(crate) fn purge_settled_fetches(&self) -> usize {
        self.coalescer.purge_settled()
    }

    pub(crate) fn require_known(&self, id: i64) -> Result<(), AppError> {
        if self.snapshot().contains(id) {
            Ok(())
        } else {
            Err(AppError::not_found("specialization", id))
        }
    }

    fn notify_on_error<T>(&self, result: Result<T, RepoError>) -> Result<T, RepoError> {
        if let Err(error) = &result {
            let app_error = AppError::from(error.clone());
            warn!(error = %error, "specialization write rejected by backing source");
            self.notifier.notify(Notice::from_error(&app_error));
        }
        result
    }
}
