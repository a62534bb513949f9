// src/types/mod.rs
//! Shared domain types: rich text runs, normalized property values, and the
//! small structured shapes (date, file, person, option) they reduce to.

use serde::{Deserialize, Serialize};

/// Output mode for the rich text renderer and the block compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Markdown with embedded HTML where markdown has no syntax.
    Markdown,
    /// Plain HTML tags throughout.
    Html,
}

/// Styling flags attached to a single rich text run.
///
/// Multiple annotations stack on one run; the renderer applies them in a
/// fixed order so the nesting in the output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: String,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            color: "default".to_string(),
        }
    }
}

impl Annotations {
    /// Whether the run carries a non-default color.
    pub fn has_color(&self) -> bool {
        self.color != "default"
    }
}

/// What a rich text run fundamentally is, beyond its styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunKind {
    Text,
    Equation { expression: String },
    Mention(MentionKind),
}

/// The target of a mention run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MentionKind {
    User,
    Page,
    Date {
        start: String,
        end: Option<String>,
    },
    /// A mention type this version doesn't know; renders as plain text.
    Other(String),
}

/// One annotated span of inline text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextRun {
    pub kind: RunKind,
    pub plain_text: String,
    pub annotations: Annotations,
    pub link: Option<String>,
}

impl RichTextRun {
    /// A plain, unannotated, unlinked text run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: RunKind::Text,
            plain_text: text.into(),
            annotations: Annotations::default(),
            link: None,
        }
    }
}

/// A date or date range property payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateValue {
    pub start: String,
    pub end: Option<String>,
    pub time_zone: Option<String>,
}

/// A named file attachment (external or workspace-uploaded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: Option<String>,
    pub url: String,
}

/// A human user, reduced to the fields a site build cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
}

/// A select/multi-select/status option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
    pub color: Option<String>,
}

/// A property value reduced to a small closed set of portable shapes.
///
/// Serializes untagged so a preamble encoder sees plain scalars, objects
/// and arrays rather than enum wrappers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateValue),
    File(FileRef),
    Person(Person),
    Option(SelectOption),
    List(Vec<NormalizedValue>),
}

impl NormalizedValue {
    /// The string payload, when this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}
