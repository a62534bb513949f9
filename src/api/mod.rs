// src/api/mod.rs
//! Notion API interaction — fetching workspace content and caching it.
//!
//! This module keeps a clear separation between I/O operations (client),
//! parsing (parser), retry and pagination policy (fetcher), storage
//! (cache), and the tree assembly that ties them together (loader).

pub mod cache;
pub mod client;
pub mod fetcher;
pub mod loader;
pub mod parser;

// Re-export the public interface
pub use cache::{CacheKind, ContentCache, DiskStore, KeyValueStore, MemoryStore};
pub use client::{NotionHttpClient, RemoteSource};
pub use fetcher::Fetcher;
pub use loader::ContentTreeLoader;
