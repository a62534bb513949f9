// src/api/loader.rs
//! Materializes full page and block trees, choosing cache vs. fetch per
//! item.
//!
//! The loader is the meeting point of the fetcher and the cache: every
//! subtree is keyed by its root id and invalidated by the server-supplied
//! last-edited timestamp, so an unchanged subtree costs one cache read
//! instead of a recursive fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;

use super::cache::{CacheKind, ContentCache};
use super::client::{rich_text_property_payload, RemoteSource};
use super::fetcher::{Fetcher, PagedResponse};
use super::parser;
use crate::error::AppError;
use crate::model::{Block, Page, PropertyValue};

/// Orchestrates fetcher + cache to load page and block trees top-down.
pub struct ContentTreeLoader {
    remote: Arc<dyn RemoteSource>,
    fetcher: Fetcher,
    cache: ContentCache,
    chunk_size: Option<usize>,
}

impl ContentTreeLoader {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        fetcher: Fetcher,
        cache: ContentCache,
        chunk_size: Option<usize>,
    ) -> Self {
        Self {
            remote,
            fetcher,
            cache,
            chunk_size,
        }
    }

    /// Loads the full child subtree of `id`, from cache when the source has
    /// not been edited since the entry was written.
    pub async fn load_blocks(
        &self,
        id: &str,
        last_edited_time: DateTime<Utc>,
    ) -> Result<Vec<Block>, AppError> {
        self.load_blocks_inner(id.to_string(), last_edited_time)
            .await
    }

    // Boxed for async recursion through child enrichment.
    fn load_blocks_inner(
        &self,
        id: String,
        last_edited_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Block>, AppError>> {
        Box::pin(async move {
            if let Some(blocks) =
                self.cache
                    .get_if_fresh::<Vec<Block>>(CacheKind::Blocks, &id, last_edited_time)
            {
                return Ok(blocks);
            }

            let this = self;
            let parent_id = id.as_str();
            let blocks = self
                .fetcher
                .fetch_all_chunked(
                    move |cursor| async move {
                        let envelope = this
                            .remote
                            .list_children(parent_id, cursor.as_deref())
                            .await?;
                        parse_block_page(&envelope)
                    },
                    move |mut block: Block| async move {
                        if block.has_children() {
                            let edited = block
                                .common
                                .last_edited_time
                                .unwrap_or_else(Utc::now);
                            let child_id = block.common.id.clone();
                            block.common.children =
                                this.load_blocks_inner(child_id, edited).await?;
                        }
                        Ok(block)
                    },
                    self.chunk_size,
                )
                .await?;

            Ok(self.cache.set(CacheKind::Blocks, &id, blocks).payload)
        })
    }

    /// Completes a page (as returned by a database query) with its block
    /// subtree, serving the whole page from cache when it is unchanged.
    pub async fn load_page(&self, mut page: Page) -> Result<Page, AppError> {
        if let Some(cached) =
            self.cache
                .get_if_fresh::<Page>(CacheKind::Page, &page.id, page.last_edited_time)
        {
            return Ok(cached);
        }

        page.children = self
            .load_blocks(&page.id, page.last_edited_time)
            .await?;
        Ok(self.cache.set(CacheKind::Page, &page.id.clone(), page).payload)
    }

    /// Queries a database and loads every accessible page with its full
    /// block tree, preserving the query's result order per results page.
    pub async fn load_pages(
        &self,
        database_id: &str,
        filter: Option<&Value>,
    ) -> Result<Vec<Page>, AppError> {
        let this = self;
        self.fetcher
            .fetch_all_chunked(
                move |cursor| async move {
                    let envelope = this
                        .remote
                        .query_database(database_id, filter, cursor.as_deref())
                        .await?;
                    parse_page_listing(&envelope)
                },
                move |page: Page| this.load_page(page),
                self.chunk_size,
            )
            .await
    }

    /// Writes a rich_text property on a page through the retry wrapper,
    /// returning the updated property value as the server reports it.
    pub async fn update_page_property(
        &self,
        page_id: &str,
        key: &str,
        value: &str,
        url: Option<&str>,
    ) -> Result<Option<PropertyValue>, AppError> {
        let payload = rich_text_property_payload(value, url);
        let updated = self
            .fetcher
            .with_retry(|| self.remote.update_property(page_id, key, &payload))
            .await?;

        Ok(updated
            .get("properties")
            .and_then(|properties| properties.get(key))
            .map(parser::parse_property))
    }

    /// Drops any cached copy of this page so a later pass cannot observe a
    /// pre-mutation snapshot.
    pub fn invalidate_page(&self, page_id: &str) {
        self.cache.invalidate(CacheKind::Page, page_id);
    }
}

fn parse_block_page(envelope: &Value) -> Result<PagedResponse<Block>, AppError> {
    let paged = parser::parse_paged_envelope(envelope)?;
    let mut results = Vec::with_capacity(paged.results.len());
    for raw in &paged.results {
        if let Some(block) = parser::parse_block(raw)? {
            results.push(block);
        }
    }
    Ok(PagedResponse {
        results,
        next_cursor: paged.next_cursor,
    })
}

fn parse_page_listing(envelope: &Value) -> Result<PagedResponse<Page>, AppError> {
    let paged = parser::parse_paged_envelope(envelope)?;
    let mut results = Vec::with_capacity(paged.results.len());
    for raw in &paged.results {
        if let Some(page) = parser::parse_page(raw)? {
            results.push(page);
        }
    }
    Ok(PagedResponse {
        results,
        next_cursor: paged.next_cursor,
    })
}
