//! Dashboard figures computed from the metrics collections.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::adapters::{classify_role, parse_timestamp, Role};
use crate::api::{BackendConversation, BackendMessage, Edital};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub total_messages: u64,
    pub user_messages: u64,
    pub bot_messages: u64,
    pub total_conversations: u64,
    /// Distinct questioners across conversations and user-authored messages.
    pub total_users: u64,
    pub total_editals: u64,
}

/// Messages created on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: String,
    pub count: u64,
}

/// How often an edital is cited as a knowledge item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditalDistribution {
    pub edital_id: i64,
    pub edital_name: String,
    pub message_count: u64,
    pub conversation_count: u64,
    pub unique_users: u64,
    /// Creation time of the latest citing message.
    pub last_message: Option<String>,
}

pub fn summarize(
    messages: &[BackendMessage],
    conversations: &[BackendConversation],
    editals: &[Edital],
) -> EngagementSummary {
    let bot_messages = messages
        .iter()
        .filter(|m| classify_role(&m.autor.papel) == Role::Bot)
        .count() as u64;
    let users: HashSet<i64> = conversations
        .iter()
        .map(|c| c.questionador.id)
        .chain(
            messages
                .iter()
                .filter(|m| classify_role(&m.autor.papel) == Role::User)
                .map(|m| m.autor.id),
        )
        .collect();
    EngagementSummary {
        total_messages: messages.len() as u64,
        user_messages: messages.len() as u64 - bot_messages,
        bot_messages,
        total_conversations: conversations.len() as u64,
        total_users: users.len() as u64,
        total_editals: editals.len() as u64,
    }
}

/// Message counts per UTC day, oldest day first. Messages with unreadable timestamps are skipped.
pub fn messages_per_day(messages: &[BackendMessage]) -> Vec<TimeSeriesPoint> {
    let mut days: BTreeMap<chrono::NaiveDate, u64> = BTreeMap::new();
    for m in messages {
        match parse_timestamp(&m.criada_em) {
            Some(ts) => *days.entry(ts.date_naive()).or_insert(0) += 1,
            None => log::debug!("message {} has unreadable timestamp {:?}", m.id, m.criada_em),
        }
    }
    days.into_iter()
        .map(|(date, count)| TimeSeriesPoint {
            date: date.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

#[derive(Default)]
struct Tally<'a> {
    messages: u64,
    conversations: HashSet<i64>,
    users: HashSet<i64>,
    last: Option<&'a str>,
}

/// Per-edital citation figures, most cited first (ties by edital id). Editals never cited are
/// included with zero counts.
pub fn edital_distribution(
    messages: &[BackendMessage],
    editals: &[Edital],
) -> Vec<EditalDistribution> {
    let mut tallies: HashMap<i64, Tally<'_>> = HashMap::new();
    for m in messages {
        let cited: HashSet<i64> = m.itensdeconhecimento.iter().map(|k| k.id).collect();
        for id in cited {
            let t = tallies.entry(id).or_default();
            t.messages += 1;
            t.conversations.insert(m.conversa.id);
            if let Some(q) = m.conversa.questionador {
                t.users.insert(q);
            }
            let newer = match t.last {
                None => true,
                Some(prev) => parse_timestamp(&m.criada_em) > parse_timestamp(prev),
            };
            if newer {
                t.last = Some(m.criada_em.as_str());
            }
        }
    }

    let mut out: Vec<EditalDistribution> = editals
        .iter()
        .map(|e| {
            let t = tallies.remove(&e.id).unwrap_or_default();
            EditalDistribution {
                edital_id: e.id,
                edital_name: e.nome.clone(),
                message_count: t.messages,
                conversation_count: t.conversations.len() as u64,
                unique_users: t.users.len() as u64,
                last_message: t.last.map(str::to_string),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.message_count
            .cmp(&a.message_count)
            .then(a.edital_id.cmp(&b.edital_id))
    });
    out
}
