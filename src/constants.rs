// src/constants.rs
//! Domain constants that define the operational boundaries of the system.

// ---------------------------------------------------------------------------
// Notion API boundaries
// ---------------------------------------------------------------------------

/// Base URL for all Notion API requests.
pub const API_BASE_URL: &str = "https://api.notion.com/v1";

/// The Notion API version header value this crate speaks.
pub const NOTION_VERSION: &str = "2022-06-28";

/// How many objects the Notion API returns per page of results.
///
/// The API maximum is 100. We use the maximum to minimize round-trips
/// during recursive fetching.
pub const NOTION_API_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Retry backoff
// ---------------------------------------------------------------------------

/// Fallback backoff when a rate-limit response carries no `retry-after`
/// header, in seconds.
pub const RATE_LIMIT_DEFAULT_BACKOFF_SECS: u64 = 60;

/// Backoff before retrying a server-side (5xx) failure or a request
/// timeout, in seconds.
pub const TRANSIENT_BACKOFF_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Namespace prefix for every cache key written by this crate.
pub const CACHE_NAMESPACE: &str = "NOTION";

/// Cache key tag for a full page (properties + block subtree).
pub const CACHE_KIND_PAGE: &str = "PAGE";

/// Cache key tag for a block subtree keyed by its parent block id.
pub const CACHE_KIND_BLOCK: &str = "BLOCK";
