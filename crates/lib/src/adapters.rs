//! Backend record → view model mapping.
//!
//! All functions here are pure: same record in, same view model out.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::types::{BackendConversation, BackendMessage, ROLE_RESPONDENT};

/// Who wrote a message, from the dashboard's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    /// Same text as the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation as shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub id: String,
    pub user_id: String,
    /// Questioner's contact string, shown as the user's email.
    pub user_email: String,
    pub start_time: String,
    pub end_time: String,
    /// 0 until filled from the message endpoint.
    pub message_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ConversationMessage>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// `RESPONDENTE` is the bot; every other value, recognized or not, is the user.
pub fn classify_role(papel: &str) -> Role {
    if papel == ROLE_RESPONDENT {
        Role::Bot
    } else {
        if !papel.is_empty() && papel != crate::api::types::ROLE_QUESTIONER {
            log::debug!("unrecognized author role {:?}, treating as user", papel);
        }
        Role::User
    }
}

/// Map a backend conversation. End time falls back to the last-message time for open conversations.
pub fn adapt_conversation(conversa: &BackendConversation) -> ConversationSession {
    ConversationSession {
        id: conversa.id.to_string(),
        user_id: conversa.questionador.id.to_string(),
        user_email: conversa.questionador.contato.clone(),
        start_time: conversa.iniciada_em.clone(),
        end_time: conversa
            .encerrada_em
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| conversa.ultima_mensagem_em.clone()),
        message_count: 0,
        edital: None,
        messages: None,
    }
}

pub fn adapt_message(mensagem: &BackendMessage) -> ConversationMessage {
    ConversationMessage {
        id: mensagem.id.to_string(),
        role: classify_role(&mensagem.autor.papel),
        content: mensagem.texto.clone(),
        timestamp: mensagem.criada_em.clone(),
    }
}

/// Parse a backend timestamp: RFC 3339 first, then naive ISO forms read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Sort messages by ascending timestamp. Stable; unparseable timestamps sort first.
pub fn sort_by_timestamp(messages: &mut [ConversationMessage]) {
    messages.sort_by_cached_key(|m| parse_timestamp(&m.timestamp));
}
