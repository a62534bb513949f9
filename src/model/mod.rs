// src/model/mod.rs
//! Domain model: pages, blocks, and property values as closed sum types.
//!
//! Everything derives `Serialize`/`Deserialize` so the content cache can
//! round-trip whole subtrees without a second wire format.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DateValue, NormalizedValue, RichTextRun, SelectOption};

/// Fields shared by every block variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockCommon {
    pub id: String,
    #[serde(default)]
    pub last_edited_time: Option<DateTime<Utc>>,
    pub has_children: bool,
    /// Populated only when `has_children` is true; owned exclusively by this
    /// block, so the source tree cannot form cycles.
    #[serde(default)]
    pub children: Vec<Block>,
}

/// One node in the nested content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub common: BlockCommon,
    pub kind: BlockKind,
}

/// Rich text payload shared by the text-bearing block variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextContent {
    pub rich_text: Vec<RichTextRun>,
}

/// A to-do line with its checked state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TodoContent {
    pub rich_text: Vec<RichTextRun>,
    pub checked: bool,
}

/// A fenced code block with its language tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CodeContent {
    pub rich_text: Vec<RichTextRun>,
    pub language: String,
    pub caption: Vec<RichTextRun>,
}

/// Where a media block's bytes come from.
///
/// External vs workspace-uploaded is distinguished only by which URL field
/// the API populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileSource {
    External { url: String },
    Uploaded { url: String },
}

impl FileSource {
    /// The URL regardless of origin.
    pub fn url(&self) -> &str {
        match self {
            Self::External { url } | Self::Uploaded { url } => url,
        }
    }
}

/// An image/audio/video block payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    pub source: FileSource,
    pub caption: Vec<RichTextRun>,
}

/// An embed or bookmark payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkContent {
    pub url: String,
    pub caption: Vec<RichTextRun>,
}

/// Header declarations for a table block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableContent {
    pub has_column_header: bool,
    pub has_row_header: bool,
}

/// One table row; each cell is a rich text run sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableRowContent {
    pub cells: Vec<Vec<RichTextRun>>,
}

/// The fixed block vocabulary.
///
/// Closed on purpose: the compiler is total over this enum, and the
/// `Unsupported` arm is how a remote type this version doesn't know
/// degrades to a visible comment instead of a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph(TextContent),
    Heading1(TextContent),
    Heading2(TextContent),
    Heading3(TextContent),
    BulletedListItem(TextContent),
    NumberedListItem(TextContent),
    ToDo(TodoContent),
    Toggle(TextContent),
    Quote(TextContent),
    Code(CodeContent),
    Image(MediaContent),
    Audio(MediaContent),
    Video(MediaContent),
    Embed(LinkContent),
    Bookmark(LinkContent),
    Divider,
    Column,
    ColumnList,
    Table(TableContent),
    TableRow(TableRowContent),
    ChildPage { title: String },
    Unsupported { kind: String },
}

impl Block {
    pub fn id(&self) -> &str {
        &self.common.id
    }

    pub fn children(&self) -> &[Block] {
        &self.common.children
    }

    pub fn has_children(&self) -> bool {
        self.common.has_children
    }

    /// The wire-format type tag for this block, used in log lines and
    /// unsupported-type comments.
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            BlockKind::Paragraph(_) => "paragraph",
            BlockKind::Heading1(_) => "heading_1",
            BlockKind::Heading2(_) => "heading_2",
            BlockKind::Heading3(_) => "heading_3",
            BlockKind::BulletedListItem(_) => "bulleted_list_item",
            BlockKind::NumberedListItem(_) => "numbered_list_item",
            BlockKind::ToDo(_) => "to_do",
            BlockKind::Toggle(_) => "toggle",
            BlockKind::Quote(_) => "quote",
            BlockKind::Code(_) => "code",
            BlockKind::Image(_) => "image",
            BlockKind::Audio(_) => "audio",
            BlockKind::Video(_) => "video",
            BlockKind::Embed(_) => "embed",
            BlockKind::Bookmark(_) => "bookmark",
            BlockKind::Divider => "divider",
            BlockKind::Column => "column",
            BlockKind::ColumnList => "column_list",
            BlockKind::Table(_) => "table",
            BlockKind::TableRow(_) => "table_row",
            BlockKind::ChildPage { .. } => "child_page",
            BlockKind::Unsupported { kind } => kind,
        }
    }

    /// The rich text runs this block carries, when its variant has any.
    pub fn rich_text(&self) -> &[RichTextRun] {
        match &self.kind {
            BlockKind::Paragraph(t)
            | BlockKind::Heading1(t)
            | BlockKind::Heading2(t)
            | BlockKind::Heading3(t)
            | BlockKind::BulletedListItem(t)
            | BlockKind::NumberedListItem(t)
            | BlockKind::Toggle(t)
            | BlockKind::Quote(t) => &t.rich_text,
            BlockKind::ToDo(t) => &t.rich_text,
            BlockKind::Code(c) => &c.rich_text,
            _ => &[],
        }
    }
}

/// A user as the API reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub detail: Option<UserDetail>,
}

/// The accessible portion of a user record.
///
/// `detail` stays `None` for users the integration cannot read; property
/// normalization yields null for those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserDetail {
    Person {
        name: Option<String>,
        avatar_url: Option<String>,
        email: Option<String>,
    },
    Bot {
        name: Option<String>,
        /// The user that authorized the bot, when the integration is
        /// user-owned. Workspace-internal bots have no owner user.
        owner: Option<Box<User>>,
    },
}

/// The result of a formula property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaResult {
    String(Option<String>),
    Number(Option<f64>),
    Boolean(Option<bool>),
    Date(Option<DateValue>),
    Unknown { kind: String },
}

/// The result of a rollup property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RollupResult {
    Number(Option<f64>),
    Date(Option<DateValue>),
    Array(Vec<PropertyValue>),
    Unknown { kind: String },
}

/// A typed page property value, one variant per property kind the API
/// exposes, plus a forward-compatible `Unknown` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Title(Vec<RichTextRun>),
    RichText(Vec<RichTextRun>),
    Number(Option<f64>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Status(Option<SelectOption>),
    Date(Option<DateValue>),
    People(Vec<User>),
    Files(Vec<NamedFile>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    Formula(FormulaResult),
    Rollup(RollupResult),
    CreatedBy(User),
    CreatedTime(String),
    LastEditedBy(User),
    LastEditedTime(String),
    UniqueId {
        prefix: Option<String>,
        number: Option<f64>,
    },
    Unknown {
        kind: String,
    },
}

/// A file property entry: display name plus its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFile {
    pub name: Option<String>,
    pub source: FileSource,
}

/// A page with its full block subtree loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub created_time: String,
    pub last_edited_time: DateTime<Utc>,
    pub archived: bool,
    pub url: String,
    /// Keyed by user-defined field name; insertion order preserved so the
    /// emitted document matches the source snapshot.
    pub properties: IndexMap<String, PropertyValue>,
    pub children: Vec<Block>,
    /// The source page JSON as received, passed through to the document.
    pub raw: Value,
}

/// One flat output record, handed to the document sink per page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub properties: IndexMap<String, NormalizedValue>,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
    pub slug: Option<String>,
    pub raw: Value,
}
