//! Conversation list state for a dashboard view: loaded sessions, the open conversation,
//! loading and error flags, and pagination position.
//!
//! State lives behind a lock so a view can read a snapshot while a load is in flight.
//! A load requested while another is running is ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapters::{parse_timestamp, ConversationSession};
use crate::conversations::{ConversationService, PageSource};
use crate::paging::Completeness;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserState {
    pub conversations: Vec<ConversationSession>,
    pub current: Option<ConversationSession>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    /// Where the last page came from.
    pub source: PageSource,
    /// How the last page load ended (a local slice can come from a truncated collection).
    pub completeness: Completeness,
}

impl BrowserState {
    fn new(per_page: u32) -> Self {
        Self {
            conversations: Vec::new(),
            current: None,
            is_loading: false,
            error: None,
            current_page: 1,
            per_page: per_page.max(1),
            total: 0,
            source: PageSource::Backend,
            completeness: Completeness::Complete,
        }
    }

    pub fn has_more(&self) -> bool {
        (self.conversations.len() as u64) < self.total
    }

    pub fn total_pages(&self) -> u32 {
        u32::try_from(self.total.div_ceil(u64::from(self.per_page))).unwrap_or(u32::MAX)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ConversationSession> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Loaded conversations whose contact contains `email`, ignoring case.
    pub fn filter_by_user(&self, email: &str) -> Vec<&ConversationSession> {
        let needle = email.to_lowercase();
        self.conversations
            .iter()
            .filter(|c| c.user_email.to_lowercase().contains(&needle))
            .collect()
    }

    /// Loaded conversations that started within `[start, end]`.
    pub fn filter_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&ConversationSession> {
        self.conversations
            .iter()
            .filter(|c| {
                parse_timestamp(&c.start_time)
                    .map(|t| t >= start && t <= end)
                    .unwrap_or(false)
            })
            .collect()
    }
}

pub struct ConversationBrowser {
    service: Arc<ConversationService>,
    state: RwLock<BrowserState>,
}

impl ConversationBrowser {
    pub fn new(service: Arc<ConversationService>, per_page: u32) -> Self {
        Self {
            service,
            state: RwLock::new(BrowserState::new(per_page)),
        }
    }

    pub async fn snapshot(&self) -> BrowserState {
        self.state.read().await.clone()
    }

    /// Mark a load as started. False when one is already running.
    async fn begin(&self) -> bool {
        let mut state = self.state.write().await;
        if state.is_loading {
            return false;
        }
        state.is_loading = true;
        state.error = None;
        true
    }

    /// Load `page`; `reset` replaces the list, otherwise the page is appended.
    pub async fn load_page(&self, page: u32, reset: bool) {
        if !self.begin().await {
            return;
        }
        let per_page = self.state.read().await.per_page;
        let res = self.service.list_page(page, per_page).await;

        let mut state = self.state.write().await;
        match res {
            Ok(res) => {
                log::info!(
                    "{} conversations loaded of {}",
                    res.sessions.len(),
                    res.meta.total
                );
                if reset {
                    state.conversations = res.sessions;
                } else {
                    state.conversations.extend(res.sessions);
                }
                state.current_page = res.meta.current_page;
                state.total = res.meta.total;
                state.source = res.source;
                state.completeness = res.completeness;
            }
            Err(e) => {
                log::error!("loading conversations failed: {}", e);
                state.error = Some(e.to_string());
            }
        }
        state.is_loading = false;
    }

    /// Append the next page, if there is one.
    pub async fn load_more(&self) {
        let next = {
            let state = self.state.read().await;
            if !state.has_more() || state.is_loading {
                return;
            }
            state.current_page + 1
        };
        self.load_page(next, false).await;
    }

    /// Start over from page 1.
    pub async fn reload(&self) {
        self.state.write().await.current_page = 1;
        self.load_page(1, true).await;
    }

    /// Open one conversation with all its messages.
    pub async fn load_detail(&self, id: i64) {
        if !self.begin().await {
            return;
        }
        let res = self.service.conversation_detail(id).await;
        let mut state = self.state.write().await;
        match res {
            Ok(detail) => {
                log::info!("conversation {} loaded with {} messages", id, detail.session.message_count);
                state.current = Some(detail.session);
            }
            Err(e) => {
                log::error!("loading conversation {} failed: {}", id, e);
                state.error = Some(e.to_string());
            }
        }
        state.is_loading = false;
    }

    pub async fn clear_current(&self) {
        self.state.write().await.current = None;
    }
}
