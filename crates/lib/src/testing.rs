//! In-memory backend and record builders for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::api::types::{MessageConversationRef, ROLE_QUESTIONER, ROLE_RESPONDENT};
use crate::api::{
    ApiError, Backend, BackendConversation, BackendMessage, BackendUser, Edital, KnowledgeItem,
    Page, PageMeta, PageQuery,
};

pub fn user(id: i64, papel: &str) -> BackendUser {
    BackendUser {
        id,
        nome: format!("user {}", id),
        contato: format!("user{}@example.org", id),
        papel: papel.to_string(),
    }
}

pub fn conversation(id: i64) -> BackendConversation {
    BackendConversation {
        id,
        session_id: None,
        iniciada_em: format!("2024-03-{:02}T10:00:00Z", (id % 28) + 1),
        encerrada_em: Some(format!("2024-03-{:02}T10:30:00Z", (id % 28) + 1)),
        ultima_mensagem_em: format!("2024-03-{:02}T10:29:00Z", (id % 28) + 1),
        questionador: user(1000 + id, ROLE_QUESTIONER),
        respondente: user(1, ROLE_RESPONDENT),
    }
}

pub fn message(id: i64, conversation: i64, papel: &str, criada_em: &str) -> BackendMessage {
    BackendMessage {
        id,
        texto: format!("message {}", id),
        payload: serde_json::Value::Null,
        criada_em: criada_em.to_string(),
        conversa: MessageConversationRef {
            id: conversation,
            session_id: None,
            iniciada_em: String::new(),
            encerrada_em: None,
            ultima_mensagem_em: String::new(),
            questionador: Some(1000 + conversation),
            respondente: Some(1),
        },
        autor: if papel == ROLE_RESPONDENT {
            user(1, papel)
        } else {
            user(1000 + conversation, papel)
        },
        itensdeconhecimento: Vec::new(),
    }
}

pub fn cites(mut msg: BackendMessage, edital: &Edital) -> BackendMessage {
    msg.itensdeconhecimento.push(KnowledgeItem {
        id: edital.id,
        nome: edital.nome.clone(),
        arquivo: edital.arquivo.clone(),
    });
    msg
}

pub fn edital(id: i64) -> Edital {
    Edital {
        id,
        nome: format!("Edital {:02}/2024", id),
        arquivo: format!("edital-{}.pdf", id),
        metadata: serde_json::json!({ "link": "https://example.org" }),
        numero: None,
        status: "ATIVO".to_string(),
        tags: serde_json::Value::Null,
        setor_responsavel: None,
    }
}

/// How the fake conversation endpoint treats the `page` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEcho {
    /// Honors `page` and echoes it.
    Honest,
    /// Serves the requested page but always reports `current_page: 1`.
    AlwaysFirst,
    /// Ignores `page`: every request gets page 1.
    Ignored,
}

#[derive(Default)]
pub(crate) struct Calls {
    by_endpoint: HashMap<&'static str, usize>,
}

/// In-memory [`Backend`] that counts calls per endpoint.
pub struct FakeBackend {
    pub conversations: Vec<BackendConversation>,
    pub messages: Vec<BackendMessage>,
    pub editals: Vec<Edital>,
    pub echo: PageEcho,
    /// Largest page size the backend will serve; requests above it are capped.
    pub max_per_page: u32,
    /// (endpoint, page) pairs that answer with a 500.
    pub failing: HashSet<(&'static str, u32)>,
    pub credentials: Option<(String, String, String)>,
    pub(crate) calls: Mutex<Calls>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            messages: Vec::new(),
            editals: Vec::new(),
            echo: PageEcho::Honest,
            max_per_page: 100,
            failing: HashSet::new(),
            credentials: None,
            calls: Mutex::new(Calls::default()),
        }
    }
}

impl FakeBackend {
    pub fn with_conversations(n: i64) -> Self {
        Self {
            conversations: (1..=n).map(conversation).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.by_endpoint.get(endpoint).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|c| c.by_endpoint.values().sum())
            .unwrap_or(0)
    }

    fn record(&self, endpoint: &'static str, page: u32) -> Result<(), ApiError> {
        if let Ok(mut c) = self.calls.lock() {
            *c.by_endpoint.entry(endpoint).or_insert(0) += 1;
        }
        if self.failing.contains(&(endpoint, page)) {
            return Err(ApiError::Api {
                status: 500,
                detail: format!("{} page {} unavailable", endpoint, page),
            });
        }
        Ok(())
    }

    fn page_of<T: Clone>(&self, records: &[T], query: PageQuery, echo: PageEcho) -> Page<T> {
        let per_page = query.per_page.min(self.max_per_page).max(1);
        let page = match echo {
            PageEcho::Ignored => 1,
            _ => query.page,
        };
        let start = (page.saturating_sub(1) as usize) * per_page as usize;
        let data = records
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect();
        Page {
            meta: PageMeta {
                current_page: match echo {
                    PageEcho::Honest => query.page,
                    PageEcho::AlwaysFirst | PageEcho::Ignored => 1,
                },
                per_page,
                max_per_page: self.max_per_page,
                total: records.len() as u64,
            },
            data,
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_conversations(
        &self,
        query: PageQuery,
    ) -> Result<Page<BackendConversation>, ApiError> {
        self.record("conversations", query.page)?;
        Ok(self.page_of(&self.conversations, query, self.echo))
    }

    async fn get_conversation(&self, id: i64) -> Result<BackendConversation, ApiError> {
        self.record("conversation", 0)?;
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(ApiError::Api {
                status: 404,
                detail: "Não encontrado.".to_string(),
            })
    }

    async fn list_messages(
        &self,
        query: PageQuery,
        conversation: Option<i64>,
    ) -> Result<Page<BackendMessage>, ApiError> {
        self.record("messages", query.page)?;
        let filtered: Vec<BackendMessage> = self
            .messages
            .iter()
            .filter(|m| conversation.map_or(true, |id| m.conversa.id == id))
            .cloned()
            .collect();
        Ok(self.page_of(&filtered, query, PageEcho::Honest))
    }

    async fn get_message(&self, id: i64) -> Result<BackendMessage, ApiError> {
        self.record("message", 0)?;
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(ApiError::Api {
                status: 404,
                detail: "Não encontrado.".to_string(),
            })
    }

    async fn list_editals(&self, query: PageQuery) -> Result<Page<Edital>, ApiError> {
        self.record("editals", query.page)?;
        Ok(self.page_of(&self.editals, query, PageEcho::Honest))
    }

    async fn obtain_token(&self, username: &str, password: &str) -> Result<String, ApiError> {
        self.record("token", 0)?;
        match &self.credentials {
            Some((u, p, token)) if u == username && p == password => Ok(token.clone()),
            _ => Err(ApiError::Api {
                status: 400,
                detail: "Unable to log in with provided credentials.".to_string(),
            }),
        }
    }
}
