//! Backend REST access: wire types, the authenticated client, and the [`Backend`] seam.

mod backend;
mod client;
pub mod types;

pub use backend::{Backend, HttpBackend};
pub use client::{ApiClient, ApiError};
pub use types::{
    BackendConversation, BackendMessage, BackendUser, Edital, KnowledgeItem, Page, PageMeta,
    PageQuery,
};
