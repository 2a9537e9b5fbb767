//! Metrics data: complete message, conversation, and edital collections, each cached on its own.
//!
//! Collections are fetched first page, then the remaining pages in parallel. Failures never
//! reach the caller: the collection comes back empty, tagged `Failed`, and is not cached.

mod aggregate;

pub use aggregate::{
    edital_distribution, messages_per_day, summarize, EditalDistribution, EngagementSummary,
    TimeSeriesPoint,
};

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, Backend, BackendConversation, BackendMessage, Edital, Page, PageQuery};
use crate::cache::{CacheStatus, TtlCache};
use crate::config::{Config, MetricsConfig};
use crate::paging::{self, Collected};

const MESSAGES_KEY: &str = "metrics_messages";
const CONVERSATIONS_KEY: &str = "metrics_conversations";
const EDITALS_KEY: &str = "metrics_editals";

/// All three metrics collections, loaded together.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsData {
    pub messages: Arc<Collected<BackendMessage>>,
    pub conversations: Arc<Collected<BackendConversation>>,
    pub editals: Arc<Collected<Edital>>,
}

impl MetricsData {
    pub fn summary(&self) -> EngagementSummary {
        summarize(&self.messages.items, &self.conversations.items, &self.editals.items)
    }

    pub fn messages_per_day(&self) -> Vec<TimeSeriesPoint> {
        messages_per_day(&self.messages.items)
    }

    pub fn edital_distribution(&self) -> Vec<EditalDistribution> {
        edital_distribution(&self.messages.items, &self.editals.items)
    }
}

pub struct MetricsService {
    backend: Arc<dyn Backend>,
    settings: MetricsConfig,
    messages: TtlCache<Collected<BackendMessage>>,
    conversations: TtlCache<Collected<BackendConversation>>,
    editals: TtlCache<Collected<Edital>>,
}

impl MetricsService {
    pub fn new(backend: Arc<dyn Backend>, settings: MetricsConfig, ttl: Duration) -> Self {
        Self {
            backend,
            settings,
            messages: TtlCache::new(ttl),
            conversations: TtlCache::new(ttl),
            editals: TtlCache::new(ttl),
        }
    }

    pub fn from_config(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self::new(backend, config.metrics.clone(), config.cache.ttl())
    }

    async fn collect<T, F, Fut>(
        &self,
        cache: &TtlCache<Collected<T>>,
        key: &str,
        resource: &str,
        id_of: fn(&T) -> i64,
        fetch: F,
    ) -> Arc<Collected<T>>
    where
        F: Fn(PageQuery) -> Fut,
        Fut: Future<Output = Result<Page<T>, ApiError>>,
    {
        let page_size = self.settings.page_size;
        let concurrency = self.settings.concurrency;
        cache
            .get_or_fill(
                key,
                || async move {
                    match paging::fetch_all(resource, page_size, concurrency, id_of, fetch).await {
                        Ok(collected) => collected,
                        Err(failure) => {
                            log::warn!(
                                "loading {} failed on page {}: {}",
                                resource,
                                failure.page,
                                failure.error
                            );
                            Collected::failed(failure.page, &failure.error)
                        }
                    }
                },
                |c| !c.completeness.is_failed(),
            )
            .await
    }

    pub async fn all_messages(&self) -> Arc<Collected<BackendMessage>> {
        self.collect(&self.messages, MESSAGES_KEY, "messages", |m: &BackendMessage| m.id, |q| {
            self.backend.list_messages(q, None)
        })
        .await
    }

    pub async fn all_conversations(&self) -> Arc<Collected<BackendConversation>> {
        self.collect(&self.conversations, CONVERSATIONS_KEY, "conversations", |c: &BackendConversation| c.id, |q| {
            self.backend.list_conversations(q)
        })
        .await
    }

    pub async fn all_editals(&self) -> Arc<Collected<Edital>> {
        self.collect(&self.editals, EDITALS_KEY, "editals", |e: &Edital| e.id, |q| {
            self.backend.list_editals(q)
        })
        .await
    }

    /// Messages, conversations, and editals, loaded concurrently.
    pub async fn all_data(&self) -> MetricsData {
        log::info!("loading all metrics data in parallel");
        let (messages, conversations, editals) = tokio::join!(
            self.all_messages(),
            self.all_conversations(),
            self.all_editals()
        );
        MetricsData {
            messages,
            conversations,
            editals,
        }
    }

    pub async fn clear_cache(&self) {
        self.messages.clear().await;
        self.conversations.clear().await;
        self.editals.clear().await;
        log::info!("metrics cache cleared");
    }

    /// Age in seconds and validity of each cached collection, by cache key.
    pub async fn cache_status(&self) -> BTreeMap<String, CacheStatus> {
        let mut status = self.messages.status().await;
        status.extend(self.conversations.status().await);
        status.extend(self.editals.status().await);
        status
    }
}
