// src/api/fetcher.rs
//! Cursor-driven pagination with classified retry.
//!
//! `Fetcher` turns the remote listing API's cursor pages into complete,
//! order-preserving collections. Every transport call goes through the same
//! retry state machine: rate limits sleep for the server-specified delay,
//! server errors and timeouts sleep a fixed 30s, everything else surfaces
//! to the caller. Retries are unbounded by default — the upstream guidance
//! is to wait out throttling — with an opt-in wall-clock budget as the
//! escape hatch.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{AppError, RetryClass};

/// One page of listing results with the cursor to the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResponse<T> {
    pub results: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Drives paginated fetches and retry policy.
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    retry_budget: Option<Duration>,
}

impl Fetcher {
    /// A fetcher with unbounded retries (the production default).
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher that stops retrying once `budget` of wall-clock time has
    /// elapsed since the first attempt of the current operation.
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            retry_budget: Some(budget),
        }
    }

    /// Runs one operation through the retry state machine.
    ///
    /// The operation is re-issued verbatim after each transient failure, so
    /// no cursor state is lost across retries.
    pub async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let started = tokio::time::Instant::now();
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = match err.retry_class() {
                RetryClass::RateLimited(delay) => {
                    log::warn!(
                        "API rate limit reached! retrying after {} seconds...",
                        delay.as_secs()
                    );
                    delay
                }
                RetryClass::Transient(delay) => {
                    log::warn!(
                        "Transient failure ({}); retrying after {} seconds...",
                        err,
                        delay.as_secs()
                    );
                    delay
                }
                RetryClass::Fatal => return Err(err),
            };

            if let Some(budget) = self.retry_budget {
                if started.elapsed() + delay > budget {
                    return Err(AppError::RetryBudgetExhausted {
                        budget,
                        last: Box::new(err),
                    });
                }
            }

            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches every page of a cursor-based listing, in arrival order.
    ///
    /// `request` is invoked with `None` first, then with each returned
    /// cursor, until a page reports no next cursor.
    pub async fn fetch_all<T, F, Fut>(&self, mut request: F) -> Result<Vec<T>, AppError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<PagedResponse<T>, AppError>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.with_retry(|| request(cursor.clone())).await?;
            items.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    /// Like [`fetch_all`](Self::fetch_all), but maps each listed item
    /// through an async enrichment step.
    ///
    /// Within one page of results, enrichments run concurrently in batches
    /// of at most `chunk_size` (default: the whole page as one batch);
    /// batch N+1 starts only after batch N has settled, bounding peak
    /// in-flight requests. A failed enrichment drops that one item from the
    /// result with a warning while the rest of the batch proceeds.
    pub async fn fetch_all_chunked<T, U, F, Fut, M, MFut>(
        &self,
        mut request: F,
        enrich: M,
        chunk_size: Option<usize>,
    ) -> Result<Vec<U>, AppError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<PagedResponse<T>, AppError>>,
        M: Fn(T) -> MFut,
        MFut: Future<Output = Result<U, AppError>>,
    {
        let chunk_size = chunk_size.filter(|size| *size > 0);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.with_retry(|| request(cursor.clone())).await?;
            let next_cursor = page.next_cursor;

            let mut queue = page.results;
            while !queue.is_empty() {
                let batch_len = chunk_size.unwrap_or(queue.len()).min(queue.len());
                let rest = queue.split_off(batch_len);
                let batch = std::mem::replace(&mut queue, rest);

                for outcome in join_all(batch.into_iter().map(&enrich)).await {
                    match outcome {
                        Ok(item) => items.push(item),
                        Err(err) => {
                            log::warn!("Dropping item after failed enrichment: {}", err)
                        }
                    }
                }
            }

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }
}
