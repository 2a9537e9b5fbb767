//! Backend wire records (Django REST field names).

use serde::{Deserialize, Serialize};

/// Author role value the backend uses for the chatbot side of a conversation.
pub const ROLE_RESPONDENT: &str = "RESPONDENTE";

/// Author role value the backend uses for the human questioner.
pub const ROLE_QUESTIONER: &str = "QUESTIONANTE";

/// Page envelope metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub max_per_page: u32,
    #[serde(default)]
    pub total: u64,
}

fn first_page() -> u32 {
    1
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            current_page: 1,
            per_page: 0,
            max_per_page: 0,
            total: 0,
        }
    }
}

impl PageMeta {
    /// Number of pages implied by `total` and `per_page`. Falls back to `fallback_size` when the
    /// backend reports a zero page size.
    pub fn total_pages(&self, fallback_size: u32) -> u32 {
        let size = if self.per_page == 0 {
            fallback_size.max(1)
        } else {
            self.per_page
        };
        u32::try_from(self.total.div_ceil(u64::from(size))).unwrap_or(u32::MAX)
    }
}

/// Paged list response: `{ meta, data }`. A missing envelope decodes as an empty first page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub meta: PageMeta,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Requested page number and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }
}

/// A conversation participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendUser {
    pub id: i64,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub contato: String,
    #[serde(default)]
    pub papel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConversation {
    pub id: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    pub iniciada_em: String,
    #[serde(default)]
    pub encerrada_em: Option<String>,
    #[serde(default)]
    pub ultima_mensagem_em: String,
    pub questionador: BackendUser,
    pub respondente: BackendUser,
}

/// The conversation a message belongs to, as embedded in message records (participants by id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageConversationRef {
    pub id: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub iniciada_em: String,
    #[serde(default)]
    pub encerrada_em: Option<String>,
    #[serde(default)]
    pub ultima_mensagem_em: String,
    #[serde(default)]
    pub questionador: Option<i64>,
    #[serde(default)]
    pub respondente: Option<i64>,
}

/// Knowledge item cited by a message (an edital document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: i64,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub arquivo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendMessage {
    pub id: i64,
    #[serde(default)]
    pub texto: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub criada_em: String,
    pub conversa: MessageConversationRef,
    pub autor: BackendUser,
    #[serde(default)]
    pub itensdeconhecimento: Vec<KnowledgeItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsibleSector {
    pub id: i64,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub telefone: String,
}

/// Catalog/announcement entity tracked as a metrics dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edital {
    pub id: i64,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub arquivo: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub numero: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: serde_json::Value,
    #[serde(default)]
    pub setor_responsavel: Option<ResponsibleSector>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}
