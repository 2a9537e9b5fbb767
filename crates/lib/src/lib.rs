//! Painel core library: backend access, page-echo workaround, caching, and metrics
//! for the conversation dashboard.

pub mod adapters;
pub mod api;
pub mod auth;
pub mod browser;
pub mod cache;
pub mod config;
pub mod conversations;
pub mod init;
pub mod metrics;
pub mod paging;

#[cfg(test)]
mod testing;
