//! Conversation listing with the page-echo workaround.
//!
//! Some backend deployments ignore the requested `page` and always answer with the first page.
//! The echoed `meta.current_page` gives this away: on a mismatch the whole collection is loaded
//! once in large pages, cached, and every page request is then answered by slicing the cached
//! list until the cache window closes.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{
    adapt_conversation, adapt_message, sort_by_timestamp, ConversationMessage, ConversationSession,
};
use crate::api::{ApiError, Backend, BackendConversation, PageQuery};
use crate::cache::TtlCache;
use crate::config::{Config, PaginationConfig};
use crate::paging::{self, Collected, Completeness};

const ALL_CONVERSATIONS_KEY: &str = "conversations_all";

/// Where a page of conversations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageSource {
    /// The backend honored the requested page.
    Backend,
    /// Sliced from the locally accumulated collection.
    LocalSlice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl PageInfo {
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        u32::try_from(self.total.div_ceil(u64::from(self.per_page))).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationPage {
    pub sessions: Vec<ConversationSession>,
    pub meta: PageInfo,
    pub source: PageSource,
    /// For local slices, how the backing accumulation ended. Always `Complete` for backend pages.
    pub completeness: Completeness,
}

/// A conversation with all its messages loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationDetail {
    pub session: ConversationSession,
    pub messages_completeness: Completeness,
}

pub struct ConversationService {
    backend: Arc<dyn Backend>,
    settings: PaginationConfig,
    all: TtlCache<Collected<ConversationSession>>,
}

impl ConversationService {
    pub fn new(backend: Arc<dyn Backend>, settings: PaginationConfig, ttl: Duration) -> Self {
        Self {
            backend,
            settings,
            all: TtlCache::new(ttl),
        }
    }

    pub fn from_config(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self::new(backend, config.pagination.clone(), config.cache.ttl())
    }

    /// One page of conversations. Pages start at 1.
    ///
    /// While a locally accumulated collection is fresh, pages are sliced from it without any
    /// backend call. Otherwise the backend is asked for the page; if it echoes a different page
    /// number the full collection is accumulated and sliced instead.
    pub async fn list_page(&self, page: u32, per_page: u32) -> Result<ConversationPage, ApiError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        if let Some(all) = self.all.get(ALL_CONVERSATIONS_KEY).await {
            log::debug!("serving conversations page {} from local collection", page);
            return Ok(slice_page(&all, page, per_page));
        }

        log::debug!("loading conversations page {} ({} per page)", page, per_page);
        let res = self
            .backend
            .list_conversations(PageQuery::new(page, per_page))
            .await?;

        if res.meta.current_page != page {
            log::warn!(
                "requested conversations page {} but backend answered page {}; paginating locally",
                page,
                res.meta.current_page
            );
            return Ok(self.local_page(page, per_page).await);
        }

        let sessions = self.adapt_with_counts(&res.data).await;
        log::info!("{} conversations loaded from page {}", sessions.len(), page);
        Ok(ConversationPage {
            sessions,
            meta: PageInfo {
                current_page: res.meta.current_page,
                per_page: res.meta.per_page,
                total: res.meta.total,
            },
            source: PageSource::Backend,
            completeness: Completeness::Complete,
        })
    }

    async fn local_page(&self, page: u32, per_page: u32) -> ConversationPage {
        let all = self
            .all
            .get_or_fill(
                ALL_CONVERSATIONS_KEY,
                || self.load_all(),
                |c| !c.completeness.is_failed(),
            )
            .await;
        slice_page(&all, page, per_page)
    }

    async fn load_all(&self) -> Collected<ConversationSession> {
        log::info!("loading every conversation for local pagination");
        let collected = paging::accumulate(
            "conversations",
            self.settings.full_fetch_page_size,
            self.settings.max_full_fetch_pages,
            |c: &BackendConversation| c.id,
            |q| self.backend.list_conversations(q),
        )
        .await;
        let items = self.adapt_with_counts(&collected.items).await;
        log::info!("local conversation collection holds {} records", items.len());
        Collected {
            items,
            total: collected.total,
            completeness: collected.completeness,
        }
    }

    /// Drop the locally accumulated collection so the next request goes to the backend.
    pub async fn invalidate(&self) {
        self.all.invalidate(ALL_CONVERSATIONS_KEY).await;
    }

    async fn adapt_with_counts(&self, records: &[BackendConversation]) -> Vec<ConversationSession> {
        if !self.settings.count_messages {
            return records.iter().map(adapt_conversation).collect();
        }
        stream::iter(records)
            .map(|c| async move {
                let mut session = adapt_conversation(c);
                session.message_count = self.message_count(c.id).await;
                session
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await
    }

    /// Total messages of a conversation, read from the envelope of a one-record page. 0 on failure.
    async fn message_count(&self, conversation: i64) -> u64 {
        match self
            .backend
            .list_messages(PageQuery::new(1, 1), Some(conversation))
            .await
        {
            Ok(res) => res.meta.total,
            Err(e) => {
                log::warn!("counting messages of conversation {} failed: {}", conversation, e);
                0
            }
        }
    }

    pub async fn conversation(&self, id: i64) -> Result<ConversationSession, ApiError> {
        let conversa = self.backend.get_conversation(id).await?;
        Ok(adapt_conversation(&conversa))
    }

    pub async fn message(&self, id: i64) -> Result<ConversationMessage, ApiError> {
        let mensagem = self.backend.get_message(id).await?;
        Ok(adapt_message(&mensagem))
    }

    /// Every message of one conversation, oldest first.
    pub async fn conversation_messages(&self, id: i64) -> Collected<ConversationMessage> {
        let resource = format!("messages of conversation {}", id);
        let collected = paging::accumulate(
            &resource,
            self.settings.message_page_size,
            self.settings.max_message_pages,
            |m: &crate::api::BackendMessage| m.id,
            |q| self.backend.list_messages(q, Some(id)),
        )
        .await;
        let mut messages = collected.map(|m| adapt_message(&m));
        sort_by_timestamp(&mut messages.items);
        messages
    }

    /// The conversation and all its messages, fetched concurrently.
    pub async fn conversation_detail(&self, id: i64) -> Result<ConversationDetail, ApiError> {
        let (conversa, messages) =
            tokio::join!(self.backend.get_conversation(id), self.conversation_messages(id));
        let mut session = adapt_conversation(&conversa?);
        session.message_count = messages.items.len() as u64;
        session.messages = Some(messages.items);
        Ok(ConversationDetail {
            session,
            messages_completeness: messages.completeness,
        })
    }
}

fn slice_page(all: &Collected<ConversationSession>, page: u32, per_page: u32) -> ConversationPage {
    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let sessions: Vec<ConversationSession> = all
        .items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect();
    log::debug!(
        "page {}: conversations {}-{} of {}",
        page,
        start + 1,
        start + sessions.len(),
        all.items.len()
    );
    ConversationPage {
        sessions,
        meta: PageInfo {
            current_page: page,
            per_page,
            total: all.total,
        },
        source: PageSource::LocalSlice,
        completeness: all.completeness.clone(),
    }
}
