//! Multi-page collection: sequential accumulation with an iteration ceiling, and the
//! first-page-then-parallel fetch used for metrics. Results carry a [`Completeness`] tag so a
//! truncated collection is never mistaken for the full one.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;

use crate::api::{ApiError, Page, PageQuery};

/// Why a multi-page collection stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Completeness {
    /// Accumulated count reached the backend-reported total.
    Complete,
    /// The page ceiling was hit before reaching the total.
    PageLimit { pages: u32 },
    /// A page came back empty or repeated records already seen, before reaching the total.
    Stalled { page: u32 },
    /// Fetching `page` failed; items hold whatever came before it.
    Failed { page: u32, error: String },
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completeness::Failed { .. })
    }
}

/// Records gathered across pages, the backend's reported total, and how collection ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub completeness: Completeness,
}

impl<T> Collected<T> {
    pub fn complete(items: Vec<T>, total: u64) -> Self {
        Self {
            items,
            total,
            completeness: Completeness::Complete,
        }
    }

    /// Empty collection for a fetch that failed outright.
    pub fn failed(page: u32, error: &ApiError) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            completeness: Completeness::Failed {
                page,
                error: error.to_string(),
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Collected<U> {
        Collected {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            completeness: self.completeness,
        }
    }
}

/// Request pages 1, 2, ... of `page_size` one at a time until the accumulated count reaches the
/// reported total, a page adds nothing new (records are deduplicated by `id_of`), a page fails,
/// or `max_pages` pages have been requested.
pub async fn accumulate<T, F, Fut>(
    resource: &str,
    page_size: u32,
    max_pages: u32,
    id_of: impl Fn(&T) -> i64,
    mut fetch: F,
) -> Collected<T>
where
    F: FnMut(PageQuery) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut total = 0u64;
    let mut completeness = Completeness::PageLimit { pages: max_pages };

    for page in 1..=max_pages {
        let res = match fetch(PageQuery::new(page, page_size)).await {
            Ok(res) => res,
            Err(e) => {
                log::warn!("loading {} page {} failed, keeping {} records: {}", resource, page, items.len(), e);
                completeness = Completeness::Failed {
                    page,
                    error: e.to_string(),
                };
                break;
            }
        };
        total = res.meta.total;
        let before = items.len();
        for record in res.data {
            if seen.insert(id_of(&record)) {
                items.push(record);
            }
        }
        log::info!("loaded {}/{} {}", items.len(), total, resource);

        if items.len() as u64 >= total {
            completeness = Completeness::Complete;
            break;
        }
        if items.len() == before {
            log::warn!(
                "{} page {} added no new records ({}/{}), stopping",
                resource,
                page,
                items.len(),
                total
            );
            completeness = Completeness::Stalled { page };
            break;
        }
    }

    if let Completeness::PageLimit { pages } = completeness {
        log::warn!("page limit ({}) reached while loading {}", pages, resource);
    }
    Collected {
        items,
        total,
        completeness,
    }
}

/// A page that could not be fetched.
#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: ApiError,
}

/// Fetch page 1 to learn the total and the backend's page size, then fetch pages 2..N with up
/// to `concurrency` requests in flight. Pages are concatenated in page order regardless of
/// which request finishes first, dropping records already seen (by `id_of`). Any failed page
/// fails the whole collection. A page that adds nothing new, or a deduplicated count short of
/// the total, yields `Stalled`.
pub async fn fetch_all<T, F, Fut>(
    resource: &str,
    page_size: u32,
    concurrency: usize,
    id_of: impl Fn(&T) -> i64,
    fetch: F,
) -> Result<Collected<T>, PageFailure>
where
    F: Fn(PageQuery) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let first = fetch(PageQuery::new(1, page_size))
        .await
        .map_err(|error| PageFailure { page: 1, error })?;
    let meta = first.meta;
    let per_page = if meta.per_page == 0 { page_size } else { meta.per_page };
    let total_pages = meta.total_pages(page_size);
    log::info!("{} {} in {} pages", meta.total, resource, total_pages);

    let mut items: Vec<T> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    for record in first.data {
        if seen.insert(id_of(&record)) {
            items.push(record);
        }
    }
    if total_pages <= 1 {
        return Ok(finish(resource, items, meta.total, None, 1));
    }

    log::info!("loading {} remaining {} pages in parallel", total_pages - 1, resource);
    let fetch = &fetch;
    let rest: Vec<(u32, Result<Page<T>, ApiError>)> = stream::iter(2..=total_pages)
        .map(|page| async move { (page, fetch(PageQuery::new(page, per_page)).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut stalled_at = None;
    for (page, res) in rest {
        let res = res.map_err(|error| PageFailure { page, error })?;
        let before = items.len();
        for record in res.data {
            if seen.insert(id_of(&record)) {
                items.push(record);
            }
        }
        if items.len() == before && stalled_at.is_none() {
            stalled_at = Some(page);
        }
    }
    Ok(finish(resource, items, meta.total, stalled_at, total_pages))
}

fn finish<T>(
    resource: &str,
    items: Vec<T>,
    total: u64,
    stalled_at: Option<u32>,
    last_page: u32,
) -> Collected<T> {
    log::info!("loaded {}/{} {}", items.len(), total, resource);
    if items.len() as u64 >= total {
        return Collected::complete(items, total);
    }
    let page = stalled_at.unwrap_or(last_page);
    log::warn!(
        "{} stopped short of the reported total ({}/{}), first unproductive page {}",
        resource,
        items.len(),
        total,
        page
    );
    Collected {
        items,
        total,
        completeness: Completeness::Stalled { page },
    }
}
