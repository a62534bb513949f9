// src/lib.rs
//! notion-source library — ingests a Notion database into flat documents
//! for a static-site build.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling** — `AppError`, `NotionErrorCode`, `RetryClass`
//! - **Configuration** — `CommandLineInput`, `SourceOptions`
//! - **Domain model** — `Page`, `Block`, `BlockKind`, `Document`, etc.
//! - **Domain types** — `RichTextRun`, `Annotations`, `NormalizedValue`, etc.
//! - **API client** — `NotionHttpClient`, `Fetcher`, `ContentTreeLoader`, stores
//! - **Formatting** — `BlockTreeCompiler`, `render_rich_text`, `normalize_property`
//! - **Ingestion** — `IngestionDriver`, `DocumentSink`, `SlugPolicy`

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod formatting;
pub mod ingest;
pub mod model;
pub mod types;

// --- Error Handling ---
pub use crate::error::{AppError, NotionErrorCode, RetryClass};

// --- Configuration ---
pub use crate::config::{CommandLineInput, SourceOptions};

// --- Domain Model ---
pub use crate::model::{
    Block, BlockCommon, BlockKind, Document, FileSource, Page, PropertyValue, User,
};

// --- Domain Types ---
pub use crate::types::{
    Annotations, DateValue, FileRef, MentionKind, NormalizedValue, Person, RenderMode,
    RichTextRun, RunKind, SelectOption,
};

// --- API Client ---
pub use crate::api::{
    CacheKind, ContentCache, ContentTreeLoader, DiskStore, Fetcher, KeyValueStore, MemoryStore,
    NotionHttpClient, RemoteSource,
};

// --- Formatting ---
pub use crate::formatting::{
    blocks::BlockTreeCompiler, properties::normalize_property, properties::page_title,
    rich_text::plain_text, rich_text::render_rich_text,
};

// --- Ingestion ---
pub use crate::ingest::{
    DocumentSink, GeneratedSlug, IngestionDriver, KeyConverter, SlugGenerator, SlugPolicy,
    ValueConverter,
};
