//! The assignment engine: one explicitly constructed container wiring the
//! registry, coordinators and catalog onto a shared cache.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::application::access::Actor;
use crate::application::availability::AvailabilityCoordinator;
use crate::application::bulk::{BulkAssignmentCoordinator, BulkOutcome};
use crate::application::catalog::CatalogService;
use crate::application::error::AppError;
use crate::application::filters::SpecializationFilter;
use crate::application::notify::NotificationSink;
use crate::application::outcome::Fetched;
use crate::application::registry::SpecializationRegistry;
use crate::application::repos::{AvailabilityUpdate, CatalogRepo, SpecializationsRepo, TicketsRepo};
use crate::cache::{CacheConfig, StaleCache, cleanup};
use crate::domain::scoring::ScoredSpecialization;

pub const DEFAULT_BULK_CONCURRENCY: usize = 8;

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub specializations: Arc<dyn SpecializationsRepo>,
    pub tickets: Arc<dyn TicketsRepo>,
    pub catalog: Arc<dyn CatalogRepo>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl EngineParts {
    /// Use one backend for every repository.
    pub fn from_backend<B>(backend: Arc<B>, notifier: Arc<dyn NotificationSink>) -> Self
    where
        B: SpecializationsRepo + TicketsRepo + CatalogRepo + 'static,
    {
        Self {
            specializations: backend.clone(),
            tickets: backend.clone(),
            catalog: backend,
            notifier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub cache: CacheConfig,
    pub bulk_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }
}

#[derive(Clone)]
pub struct AssignmentEngine {
    cache: Arc<StaleCache>,
    registry: Arc<SpecializationRegistry>,
    availability: AvailabilityCoordinator,
    bulk: BulkAssignmentCoordinator,
    catalog: Arc<CatalogService>,
}

impl AssignmentEngine {
    pub fn new(parts: EngineParts, options: EngineOptions) -> Self {
        let EngineParts {
            specializations,
            tickets,
            catalog,
            notifier,
        } = parts;

        let cache = Arc::new(StaleCache::new(options.cache));
        let registry = Arc::new(SpecializationRegistry::new(
            specializations,
            Arc::clone(&cache),
            Arc::clone(&notifier),
        ));
        let availability = AvailabilityCoordinator::new(Arc::clone(&registry));
        let bulk = BulkAssignmentCoordinator::new(
            tickets,
            Arc::clone(&cache),
            notifier,
            options.bulk_concurrency,
        );
        let catalog = Arc::new(CatalogService::new(catalog, Arc::clone(&cache)));

        Self {
            cache,
            registry,
            availability,
            bulk,
            catalog,
        }
    }

    pub fn cache(&self) -> &Arc<StaleCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SpecializationRegistry> {
        &self.registry
    }

    pub fn availability(&self) -> &AvailabilityCoordinator {
        &self.availability
    }

    pub fn bulk(&self) -> &BulkAssignmentCoordinator {
        &self.bulk
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub async fn fetch_specializations(
        &self,
        filter: &SpecializationFilter,
        force: bool,
    ) -> Result<Fetched<usize>, AppError> {
        self.registry.fetch_specializations(filter, force).await
    }

    pub async fn set_availability(
        &self,
        actor: &Actor,
        updates: &[AvailabilityUpdate],
    ) -> Result<Vec<ScoredSpecialization>, AppError> {
        self.availability.set_availability(actor, updates).await
    }

    pub async fn bulk_assign(
        &self,
        actor: &Actor,
        ticket_ids: &[i64],
        counselor_id: i64,
    ) -> Result<BulkOutcome, AppError> {
        self.bulk.bulk_assign(actor, ticket_ids, counselor_id).await
    }

    pub async fn reset_workloads(
        &self,
        actor: &Actor,
        counselor_id: Option<i64>,
    ) -> Result<u64, AppError> {
        self.registry.reset_workloads(actor, counselor_id).await
    }

    pub fn invalidate_cache(&self) -> usize {
        self.registry.invalidate_cache()
    }

    pub fn clear_cache(&self) -> usize {
        self.registry.clear_cache()
    }

    /// Remove cache entries past their stale horizon and forget settled
    /// fetches that can no longer be joined.
    pub fn sweep(&self) -> usize {
        self.registry.purge_settled_fetches();
        self.catalog.purge_settled_fetches();
        self.cache.cleanup()
    }

    /// Start the periodic sweep; abort the handle to stop it.
    pub fn spawn_cleanup(&self) -> JoinHandle<()> {
        let engine = self.clone();
        cleanup::spawn_cleanup(self.cache.config().cleanup_interval(), move || engine.sweep())
    }
}
