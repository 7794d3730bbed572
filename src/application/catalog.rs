use std::sync::Arc;

use tracing::instrument;

use crate::application::error::AppError;
use crate::application::outcome::{Fetched, read_through};
use crate::application::repos::{CatalogRepo, RepoError};
use crate::cache::{CacheKey, Namespace, RequestCoalescer, StaleCache};
use crate::domain::entities::{CategoryRecord, FaqRecord};

/// Help-center catalog reads on the long-TTL namespaces.
pub struct CatalogService {
    repo: Arc<dyn CatalogRepo>,
    cache: Arc<StaleCache>,
    faqs: RequestCoalescer<Vec<FaqRecord>, RepoError>,
    categories: RequestCoalescer<Vec<CategoryRecord>, RepoError>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepo>, cache: Arc<StaleCache>) -> Self {
        let window = cache.config().coalesce_window();
        Self {
            repo,
            cache,
            faqs: RequestCoalescer::new(window),
            categories: RequestCoalescer::new(window),
        }
    }

    #[instrument(skip(self))]
    pub async fn faqs(
        &self,
        category_id: Option<i64>,
        force: bool,
    ) -> Result<Fetched<Vec<FaqRecord>>, AppError> {
        if category_id.is_some_and(|id| id <= 0) {
            return Err(AppError::validation("category_id must be positive"));
        }
        let key = CacheKey::faqs(category_id);
        let repo = Arc::clone(&self.repo);
        read_through(&self.cache, &self.faqs, &key, force, move || async move {
            repo.list_faqs(category_id).await
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn categories(&self, force: bool) -> Result<Fetched<Vec<CategoryRecord>>, AppError> {
        let key = CacheKey::categories();
        let repo = Arc::clone(&self.repo);
        read_through(&self.cache, &self.categories, &key, force, move || async move {
            repo.list_categories().await
        })
        .await
    }

    pub(crate) fn purge_settled_fetches(&self) -> usize {
        self.faqs.purge_settled() + self.categories.purge_settled()
    }

    /// Drop cached FAQ and category listings.
    pub fn invalidate(&self) -> usize {
        self.cache
            .invalidate_namespaces(&[Namespace::Faqs, Namespace::Categories])
    }
}
