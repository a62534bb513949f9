// src/api/parser.rs
//! Decodes raw Notion API JSON into the domain model.
//!
//! Parsing is deliberately tolerant: objects the integration cannot access
//! are skipped, and type tags this version doesn't know map to the
//! `Unsupported`/`Unknown` arms instead of failing the response.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{
    Block, BlockCommon, BlockKind, CodeContent, FileSource, FormulaResult, LinkContent,
    MediaContent, NamedFile, Page, PropertyValue, RollupResult, TableContent, TableRowContent,
    TextContent, TodoContent, User, UserDetail,
};
use crate::types::{
    Annotations, DateValue, MentionKind, RichTextRun, RunKind, SelectOption,
};

/// One page of a paginated listing, already split into items and cursor.
pub struct PagedResults {
    pub results: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Splits a listing envelope into its results array and next cursor.
pub fn parse_paged_envelope(value: &Value) -> Result<PagedResults, AppError> {
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AppError::MalformedResponse("listing response has no 'results' array".to_string())
        })?
        .clone();
    let next_cursor = value
        .get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(PagedResults {
        results,
        next_cursor,
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn required_str<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a str, AppError> {
    str_field(value, key).ok_or_else(|| {
        AppError::MalformedResponse(format!("{} is missing string field '{}'", context, key))
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::MalformedResponse(format!("bad timestamp '{}': {}", raw, e)))
}

// ---------------------------------------------------------------------------
// Rich text
// ---------------------------------------------------------------------------

fn parse_annotations(value: &Value) -> Annotations {
    let flag = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(false);
    Annotations {
        bold: flag("bold"),
        italic: flag("italic"),
        strikethrough: flag("strikethrough"),
        underline: flag("underline"),
        code: flag("code"),
        color: str_field(value, "color").unwrap_or("default").to_string(),
    }
}

fn parse_rich_text_run(value: &Value) -> Option<RichTextRun> {
    let run_type = str_field(value, "type")?;
    let plain_text = str_field(value, "plain_text").unwrap_or_default().to_string();
    let annotations = value
        .get("annotations")
        .map(parse_annotations)
        .unwrap_or_default();

    let (kind, link) = match run_type {
        "text" => {
            let link = value
                .pointer("/text/link/url")
                .and_then(Value::as_str)
                .map(str::to_string);
            (RunKind::Text, link)
        }
        "equation" => {
            let expression = value
                .pointer("/equation/expression")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            (RunKind::Equation { expression }, None)
        }
        "mention" => {
            let mention = value.get("mention");
            let mention_type = mention
                .and_then(|m| str_field(m, "type"))
                .unwrap_or("unknown");
            let kind = match mention_type {
                "user" => MentionKind::User,
                "page" => MentionKind::Page,
                "date" => {
                    let start = mention
                        .and_then(|m| m.pointer("/date/start"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let end = mention
                        .and_then(|m| m.pointer("/date/end"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    MentionKind::Date { start, end }
                }
                other => MentionKind::Other(other.to_string()),
            };
            (RunKind::Mention(kind), None)
        }
        other => {
            log::warn!("Unknown rich text type '{}'; treating as plain text", other);
            (RunKind::Text, None)
        }
    };

    Some(RichTextRun {
        kind,
        plain_text,
        annotations,
        link,
    })
}

/// Parses a `rich_text` array, dropping malformed entries.
pub fn parse_rich_text(value: Option<&Value>) -> Vec<RichTextRun> {
    value
        .and_then(Value::as_array)
        .map(|runs| runs.iter().filter_map(parse_rich_text_run).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

fn parse_file_source(value: &Value, context: &str) -> Result<FileSource, AppError> {
    match str_field(value, "type") {
        Some("external") => Ok(FileSource::External {
            url: value
                .pointer("/external/url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        Some("file") => Ok(FileSource::Uploaded {
            url: value
                .pointer("/file/url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(AppError::MalformedResponse(format!(
            "{}: unknown file source type {:?}",
            context, other
        ))),
    }
}

fn parse_media(payload: &Value, context: &str) -> Result<MediaContent, AppError> {
    Ok(MediaContent {
        source: parse_file_source(payload, context)?,
        caption: parse_rich_text(payload.get("caption")),
    })
}

fn parse_text_content(payload: &Value) -> TextContent {
    TextContent {
        rich_text: parse_rich_text(payload.get("rich_text")),
    }
}

/// Parses one block object, without descending into children.
///
/// Returns `None` for blocks the integration cannot read (no type tag) and
/// for the API's own `unsupported` placeholder, matching the listing
/// filters of the source system.
pub fn parse_block(value: &Value) -> Result<Option<Block>, AppError> {
    let block_type = match str_field(value, "type") {
        Some("unsupported") | None => return Ok(None),
        Some(t) => t,
    };
    let id = required_str(value, "id", "block")?.to_string();
    let payload = value.get(block_type).cloned().unwrap_or(Value::Null);

    let kind = match block_type {
        "paragraph" => BlockKind::Paragraph(parse_text_content(&payload)),
        "heading_1" => BlockKind::Heading1(parse_text_content(&payload)),
        "heading_2" => BlockKind::Heading2(parse_text_content(&payload)),
        "heading_3" => BlockKind::Heading3(parse_text_content(&payload)),
        "bulleted_list_item" => BlockKind::BulletedListItem(parse_text_content(&payload)),
        "numbered_list_item" => BlockKind::NumberedListItem(parse_text_content(&payload)),
        "toggle" => BlockKind::Toggle(parse_text_content(&payload)),
        "quote" => BlockKind::Quote(parse_text_content(&payload)),
        "to_do" => BlockKind::ToDo(TodoContent {
            rich_text: parse_rich_text(payload.get("rich_text")),
            checked: payload
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "code" => BlockKind::Code(CodeContent {
            rich_text: parse_rich_text(payload.get("rich_text")),
            language: str_field(&payload, "language")
                .unwrap_or("plain text")
                .to_string(),
            caption: parse_rich_text(payload.get("caption")),
        }),
        "image" => BlockKind::Image(parse_media(&payload, "image block")?),
        "audio" => BlockKind::Audio(parse_media(&payload, "audio block")?),
        "video" => BlockKind::Video(parse_media(&payload, "video block")?),
        "embed" => BlockKind::Embed(LinkContent {
            url: str_field(&payload, "url").unwrap_or_default().to_string(),
            caption: parse_rich_text(payload.get("caption")),
        }),
        "bookmark" => BlockKind::Bookmark(LinkContent {
            url: str_field(&payload, "url").unwrap_or_default().to_string(),
            caption: parse_rich_text(payload.get("caption")),
        }),
        "divider" => BlockKind::Divider,
        "column" => BlockKind::Column,
        "column_list" => BlockKind::ColumnList,
        "table" => BlockKind::Table(TableContent {
            has_column_header: payload
                .get("has_column_header")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            has_row_header: payload
                .get("has_row_header")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "table_row" => BlockKind::TableRow(TableRowContent {
            cells: payload
                .get("cells")
                .and_then(Value::as_array)
                .map(|cells| {
                    cells
                        .iter()
                        .map(|cell| parse_rich_text(Some(cell)))
                        .collect()
                })
                .unwrap_or_default(),
        }),
        "child_page" => BlockKind::ChildPage {
            title: str_field(&payload, "title").unwrap_or_default().to_string(),
        },
        other => BlockKind::Unsupported {
            kind: other.to_string(),
        },
    };

    let last_edited_time = match str_field(value, "last_edited_time") {
        Some(raw) => Some(parse_timestamp(raw)?),
        None => None,
    };

    Ok(Some(Block {
        common: BlockCommon {
            id,
            last_edited_time,
            has_children: value
                .get("has_children")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            children: Vec::new(),
        },
        kind,
    }))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

fn parse_user(value: &Value) -> Option<User> {
    let id = str_field(value, "id")?.to_string();
    let name = str_field(value, "name").map(str::to_string);
    let avatar_url = str_field(value, "avatar_url").map(str::to_string);

    let detail = match str_field(value, "type") {
        Some("person") => Some(UserDetail::Person {
            name,
            avatar_url,
            email: value
                .pointer("/person/email")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        Some("bot") => {
            let owner = match value.pointer("/bot/owner/type").and_then(Value::as_str) {
                Some("user") => value
                    .pointer("/bot/owner/user")
                    .and_then(parse_user_boxed),
                _ => None,
            };
            Some(UserDetail::Bot { name, owner })
        }
        // Partial user objects carry only {object, id}.
        _ => None,
    };

    Some(User { id, detail })
}

fn parse_user_boxed(value: &Value) -> Option<Box<User>> {
    parse_user(value).map(Box::new)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn parse_select_option(value: &Value) -> Option<SelectOption> {
    Some(SelectOption {
        name: str_field(value, "name")?.to_string(),
        color: str_field(value, "color").map(str::to_string),
    })
}

fn parse_date_value(value: &Value) -> Option<DateValue> {
    Some(DateValue {
        start: str_field(value, "start")?.to_string(),
        end: str_field(value, "end").map(str::to_string),
        time_zone: str_field(value, "time_zone").map(str::to_string),
    })
}

fn parse_formula(value: &Value) -> FormulaResult {
    match str_field(value, "type") {
        Some("string") => FormulaResult::String(
            str_field(value, "string").map(str::to_string),
        ),
        Some("number") => FormulaResult::Number(value.get("number").and_then(Value::as_f64)),
        Some("boolean") => FormulaResult::Boolean(value.get("boolean").and_then(Value::as_bool)),
        Some("date") => FormulaResult::Date(value.get("date").and_then(parse_date_value)),
        other => FormulaResult::Unknown {
            kind: other.unwrap_or("missing").to_string(),
        },
    }
}

fn parse_rollup(value: &Value) -> RollupResult {
    match str_field(value, "type") {
        Some("number") => RollupResult::Number(value.get("number").and_then(Value::as_f64)),
        Some("date") => RollupResult::Date(value.get("date").and_then(parse_date_value)),
        Some("array") => RollupResult::Array(
            value
                .get("array")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(parse_property).collect())
                .unwrap_or_default(),
        ),
        other => RollupResult::Unknown {
            kind: other.unwrap_or("missing").to_string(),
        },
    }
}

/// Parses one property value object into the typed union.
pub fn parse_property(value: &Value) -> PropertyValue {
    let property_type = match str_field(value, "type") {
        Some(t) => t,
        None => {
            return PropertyValue::Unknown {
                kind: "inaccessible".to_string(),
            }
        }
    };
    let payload = value.get(property_type).cloned().unwrap_or(Value::Null);

    match property_type {
        "title" => PropertyValue::Title(parse_rich_text(Some(&payload))),
        "rich_text" => PropertyValue::RichText(parse_rich_text(Some(&payload))),
        "number" => PropertyValue::Number(payload.as_f64()),
        "select" => PropertyValue::Select(parse_select_option(&payload)),
        "multi_select" => PropertyValue::MultiSelect(
            payload
                .as_array()
                .map(|options| options.iter().filter_map(parse_select_option).collect())
                .unwrap_or_default(),
        ),
        "status" => PropertyValue::Status(parse_select_option(&payload)),
        "date" => PropertyValue::Date(parse_date_value(&payload)),
        "people" => PropertyValue::People(
            payload
                .as_array()
                .map(|users| users.iter().filter_map(parse_user).collect())
                .unwrap_or_default(),
        ),
        "files" => PropertyValue::Files(
            payload
                .as_array()
                .map(|files| {
                    files
                        .iter()
                        .filter_map(|file| {
                            let source = parse_file_source(file, "file property").ok()?;
                            Some(NamedFile {
                                name: str_field(file, "name").map(str::to_string),
                                source,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "checkbox" => PropertyValue::Checkbox(payload.as_bool().unwrap_or(false)),
        "url" => PropertyValue::Url(payload.as_str().map(str::to_string)),
        "email" => PropertyValue::Email(payload.as_str().map(str::to_string)),
        "phone_number" => PropertyValue::PhoneNumber(payload.as_str().map(str::to_string)),
        "formula" => PropertyValue::Formula(parse_formula(&payload)),
        "rollup" => PropertyValue::Rollup(parse_rollup(&payload)),
        "created_by" => match parse_user(&payload) {
            Some(user) => PropertyValue::CreatedBy(user),
            None => PropertyValue::Unknown {
                kind: "created_by".to_string(),
            },
        },
        "created_time" => {
            PropertyValue::CreatedTime(payload.as_str().unwrap_or_default().to_string())
        }
        "last_edited_by" => match parse_user(&payload) {
            Some(user) => PropertyValue::LastEditedBy(user),
            None => PropertyValue::Unknown {
                kind: "last_edited_by".to_string(),
            },
        },
        "last_edited_time" => {
            PropertyValue::LastEditedTime(payload.as_str().unwrap_or_default().to_string())
        }
        "unique_id" => PropertyValue::UniqueId {
            prefix: str_field(&payload, "prefix").map(str::to_string),
            number: payload.get("number").and_then(Value::as_f64),
        },
        other => PropertyValue::Unknown {
            kind: other.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Parses one page object from a database query result.
///
/// Returns `None` for non-page results and for pages the integration cannot
/// access (no `url` field). Children are left empty; the loader fills them.
pub fn parse_page(value: &Value) -> Result<Option<Page>, AppError> {
    if str_field(value, "object") != Some("page") || str_field(value, "url").is_none() {
        return Ok(None);
    }

    let id = required_str(value, "id", "page")?.to_string();
    let last_edited_time =
        parse_timestamp(required_str(value, "last_edited_time", "page")?)?;

    let mut properties = IndexMap::new();
    if let Some(map) = value.get("properties").and_then(Value::as_object) {
        for (name, property) in map {
            properties.insert(name.clone(), parse_property(property));
        }
    }

    Ok(Some(Page {
        id,
        created_time: str_field(value, "created_time")
            .unwrap_or_default()
            .to_string(),
        last_edited_time,
        archived: value
            .get("archived")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        url: str_field(value, "url").unwrap_or_default().to_string(),
        properties,
        children: Vec::new(),
        raw: value.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text_run(content: &str) -> Value {
        json!({
            "type": "text",
            "text": { "content": content, "link": null },
            "plain_text": content,
            "annotations": {
                "bold": false, "italic": false, "strikethrough": false,
                "underline": false, "code": false, "color": "default"
            }
        })
    }

    #[test]
    fn parses_a_paragraph_block() {
        let raw = json!({
            "object": "block",
            "id": "b1",
            "type": "paragraph",
            "has_children": false,
            "last_edited_time": "2024-01-15T10:30:00.000Z",
            "paragraph": { "rich_text": [text_run("Hello")], "color": "default" }
        });

        let block = parse_block(&raw).unwrap().expect("accessible block");
        assert_eq!(block.id(), "b1");
        assert_eq!(block.kind_name(), "paragraph");
        assert_eq!(block.rich_text()[0].plain_text, "Hello");
        assert!(!block.has_children());
    }

    #[test]
    fn unsupported_wire_tag_is_skipped() {
        let raw = json!({
            "object": "block",
            "id": "b2",
            "type": "unsupported",
            "has_children": false,
            "unsupported": {}
        });
        assert!(parse_block(&raw).unwrap().is_none());
    }

    #[test]
    fn unknown_block_type_becomes_unsupported_kind() {
        let raw = json!({
            "object": "block",
            "id": "b3",
            "type": "callout",
            "has_children": false,
            "callout": { "rich_text": [] }
        });
        let block = parse_block(&raw).unwrap().unwrap();
        assert_eq!(
            block.kind,
            BlockKind::Unsupported { kind: "callout".to_string() }
        );
    }

    #[test]
    fn external_and_uploaded_media_sources_are_distinguished() {
        let external = json!({
            "object": "block", "id": "b4", "type": "image", "has_children": false,
            "image": { "type": "external", "external": { "url": "https://x/a.png" }, "caption": [] }
        });
        let uploaded = json!({
            "object": "block", "id": "b5", "type": "image", "has_children": false,
            "image": { "type": "file", "file": { "url": "https://files/b.png" }, "caption": [] }
        });

        let BlockKind::Image(media) = parse_block(&external).unwrap().unwrap().kind else {
            panic!("expected image block");
        };
        assert_eq!(media.source, FileSource::External { url: "https://x/a.png".to_string() });

        let BlockKind::Image(media) = parse_block(&uploaded).unwrap().unwrap().kind else {
            panic!("expected image block");
        };
        assert_eq!(media.source, FileSource::Uploaded { url: "https://files/b.png".to_string() });
    }

    #[test]
    fn parses_table_row_cells() {
        let raw = json!({
            "object": "block", "id": "r1", "type": "table_row", "has_children": false,
            "table_row": { "cells": [[text_run("a")], [text_run("b")]] }
        });
        let BlockKind::TableRow(row) = parse_block(&raw).unwrap().unwrap().kind else {
            panic!("expected table row");
        };
        assert_eq!(row.cells.len(), 2);
        assert_eq!(row.cells[1][0].plain_text, "b");
    }

    #[test]
    fn parses_page_with_properties_and_keeps_raw() {
        let raw = json!({
            "object": "page",
            "id": "p1",
            "url": "https://www.notion.so/p1",
            "archived": false,
            "created_time": "2024-01-01T00:00:00.000Z",
            "last_edited_time": "2024-01-15T10:30:00.000Z",
            "properties": {
                "Name": { "id": "t", "type": "title", "title": [text_run("My Post")] },
                "Done": { "id": "c", "type": "checkbox", "checkbox": true }
            }
        });

        let page = parse_page(&raw).unwrap().expect("accessible page");
        assert_eq!(page.id, "p1");
        assert_eq!(page.properties.len(), 2);
        assert_eq!(
            page.properties["Done"],
            PropertyValue::Checkbox(true)
        );
        assert_eq!(page.raw, raw);
    }

    #[test]
    fn inaccessible_page_is_skipped() {
        let raw = json!({ "object": "page", "id": "p2" });
        assert!(parse_page(&raw).unwrap().is_none());
    }

    #[test]
    fn parses_bot_user_with_owner() {
        let raw = json!({
            "object": "user", "id": "u1", "type": "bot", "name": "Integration",
            "bot": { "owner": { "type": "user", "user": {
                "object": "user", "id": "u2", "type": "person",
                "name": "Ada", "avatar_url": null,
                "person": { "email": "ada@example.com" }
            }}}
        });
        let user = parse_user(&raw).unwrap();
        let Some(UserDetail::Bot { owner: Some(owner), .. }) = user.detail else {
            panic!("expected bot with owner");
        };
        assert_eq!(owner.id, "u2");
    }

    #[test]
    fn unknown_property_kind_is_preserved_as_unknown() {
        let raw = json!({ "id": "x", "type": "verification", "verification": {} });
        assert_eq!(
            parse_property(&raw),
            PropertyValue::Unknown { kind: "verification".to_string() }
        );
    }

    #[test]
    fn rollup_array_recurses_into_properties() {
        let raw = json!({
            "id": "r", "type": "rollup",
            "rollup": { "type": "array", "array": [
                { "type": "number", "number": 3.5 },
                { "type": "checkbox", "checkbox": false }
            ]}
        });
        let PropertyValue::Rollup(RollupResult::Array(items)) = parse_property(&raw) else {
            panic!("expected rollup array");
        };
        assert_eq!(items[0], PropertyValue::Number(Some(3.5)));
        assert_eq!(items[1], PropertyValue::Checkbox(false));
    }

    #[test]
    fn paged_envelope_splits_results_and_cursor() {
        let raw = json!({ "results": [1, 2], "next_cursor": "abc", "has_more": true });
        let paged = parse_paged_envelope(&raw).unwrap();
        assert_eq!(paged.results.len(), 2);
        assert_eq!(paged.next_cursor.as_deref(), Some("abc"));

        let done = json!({ "results": [], "next_cursor": null, "has_more": false });
        assert!(parse_paged_envelope(&done).unwrap().next_cursor.is_none());
    }
}
