// src/formatting/mod.rs
//! Renders loaded Notion content into document text.

// Sub-modules
pub mod blocks;
pub mod properties;
pub mod rich_text;

pub use self::blocks::BlockTreeCompiler;
pub use self::properties::{normalize_property, page_title};
pub use self::rich_text::{plain_text, render_rich_text};
