// src/formatting/blocks.rs
//! Compiles a loaded block subtree into markdown or HTML text.
//!
//! The compiler is total over the block vocabulary: every kind has an
//! emission rule, and the fallback arm emits a visible comment naming the
//! unsupported type instead of failing the build.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::formatting::rich_text::{html_escape, plain_text, render_rich_text};
use crate::model::{Block, BlockKind, CodeContent, MediaContent, TableContent};
use crate::types::{RenderMode, RichTextRun};

// https://stackoverflow.com/questions/19377262/regex-for-youtube-url
static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((?:https?:)?//)?((?:www|m)\.)?((?:youtube(?:-nocookie)?\.com|youtu.be))(/(?:[\w\-]+\?v=|embed/|live/|v/)?)(?P<id>[\w\-]+)(\S+)?$",
    )
    .expect("youtube url pattern is valid")
});

/// The embed URL for an external video, when it is recognizably YouTube.
pub fn youtube_embed_url(url: &str) -> Option<String> {
    let captures = YOUTUBE_URL.captures(url)?;
    Some(format!(
        "https://www.youtube.com/embed/{}",
        captures.name("id")?.as_str()
    ))
}

/// Renders block trees under a fixed mode and heading policy.
pub struct BlockTreeCompiler {
    mode: RenderMode,
    /// Shift headings one level down, for sites that reserve `<h1>` for the
    /// page title.
    lower_heading_level: bool,
}

impl BlockTreeCompiler {
    pub fn new(mode: RenderMode, lower_heading_level: bool) -> Self {
        Self {
            mode,
            lower_heading_level,
        }
    }

    /// Compiles root-level blocks, joining siblings and trimming. This is
    /// also the page-root rule: a page has no markup of its own, only its
    /// children's.
    pub fn compile(&self, blocks: &[Block]) -> String {
        match self.mode {
            RenderMode::Markdown => blocks
                .iter()
                .map(|block| self.compile_block(block))
                .collect::<Vec<_>>()
                .join("\n\n")
                .trim()
                .to_string(),
            RenderMode::Html => self.compile_html_siblings(blocks),
        }
    }

    /// HTML sibling join: consecutive list items group under one
    /// `<ul>`/`<ol>`, everything else joins with newlines.
    fn compile_html_siblings(&self, blocks: &[Block]) -> String {
        fn flush(out: &mut Vec<String>, buffer: &mut Vec<String>, tag: &mut Option<&'static str>) {
            if let Some(tag) = tag.take() {
                if !buffer.is_empty() {
                    out.push(format!("<{}>\n{}\n</{}>", tag, buffer.join("\n"), tag));
                    buffer.clear();
                }
            }
        }

        let mut out = Vec::new();
        let mut buffer = Vec::new();
        let mut open_tag: Option<&'static str> = None;

        for block in blocks {
            let list_tag = match block.kind {
                BlockKind::BulletedListItem(_) => Some("ul"),
                BlockKind::NumberedListItem(_) => Some("ol"),
                _ => None,
            };
            let rendered = self.compile_block(block);
            match list_tag {
                Some(tag) => {
                    if open_tag != Some(tag) {
                        flush(&mut out, &mut buffer, &mut open_tag);
                        open_tag = Some(tag);
                    }
                    buffer.push(rendered);
                }
                None => {
                    flush(&mut out, &mut buffer, &mut open_tag);
                    out.push(rendered);
                }
            }
        }
        flush(&mut out, &mut buffer, &mut open_tag);

        out.join("\n").trim().to_string()
    }

    fn escape_text(&self) -> bool {
        self.mode == RenderMode::Html
    }

    fn text(&self, runs: &[RichTextRun]) -> String {
        render_rich_text(runs, self.mode, self.escape_text())
            .trim()
            .to_string()
    }

    fn children_text(&self, block: &Block) -> String {
        if block.has_children() {
            self.compile(block.children())
        } else {
            String::new()
        }
    }

    fn compile_block(&self, block: &Block) -> String {
        let text = self.text(block.rich_text());
        let children = self.children_text(block);

        match &block.kind {
            BlockKind::Paragraph(_) => text,
            BlockKind::Heading1(_) => self.heading(1, &text),
            BlockKind::Heading2(_) => self.heading(2, &text),
            BlockKind::Heading3(_) => self.heading(3, &text),
            BlockKind::BulletedListItem(_) => match self.mode {
                RenderMode::Markdown => format!("* {}", text),
                RenderMode::Html => format!("<li>{}</li>", text),
            },
            BlockKind::NumberedListItem(_) => match self.mode {
                RenderMode::Markdown => format!("1. {}", text),
                RenderMode::Html => format!("<li>{}</li>", text),
            },
            BlockKind::ToDo(todo) => {
                let marker = if todo.checked { "x" } else { " " };
                match self.mode {
                    RenderMode::Markdown => format!("- [{}] {}", marker, text),
                    RenderMode::Html => {
                        let checked = if todo.checked { " checked" } else { "" };
                        format!(
                            "<div {}><input type=\"checkbox\"{} disabled /> {}</div>",
                            html_class("to_do"),
                            checked,
                            text
                        )
                    }
                }
            }
            BlockKind::Toggle(_) => format!(
                "<details {}><summary {}>{}</summary>{}</details>",
                html_class("details"),
                html_class("summary"),
                text,
                children
            ),
            BlockKind::Quote(_) => match self.mode {
                RenderMode::Markdown => format!("> {}", text),
                RenderMode::Html => {
                    format!("<blockquote {}>{}</blockquote>", html_class("quote"), text)
                }
            },
            // Rich text inside code is never HTML-escaped; the fence or
            // <pre> carries it verbatim.
            BlockKind::Code(code) => {
                let raw = render_rich_text(&code.rich_text, self.mode, false);
                match self.mode {
                    RenderMode::Markdown => {
                        format!("```{}\n{}\n```", code.language, raw.trim())
                    }
                    RenderMode::Html => format!(
                        "<pre {}><code class=\"language-{}\">{}</code></pre>",
                        html_class("code"),
                        code.language,
                        raw.trim()
                    ),
                }
            }
            BlockKind::Image(media) => self.image(media),
            BlockKind::Audio(media) => format!(
                "<audio {} controls><source src=\"{}\" /></audio>",
                html_class("audio"),
                media.source.url()
            ),
            BlockKind::Video(media) => self.video(media),
            BlockKind::Embed(embed) => self.captionize(
                format!(
                    "<iframe {} src=\"{}\"></iframe>",
                    html_class("embed"),
                    embed.url
                ),
                &embed.caption,
            ),
            BlockKind::Bookmark(bookmark) => {
                let caption = self.text(&bookmark.caption);
                let label = if caption.is_empty() {
                    bookmark.url.clone()
                } else {
                    caption
                };
                match self.mode {
                    RenderMode::Markdown => format!("[{}]({})", label, bookmark.url),
                    RenderMode::Html => format!(
                        "<a {} href=\"{}\">{}</a>",
                        html_class("bookmark"),
                        bookmark.url,
                        label
                    ),
                }
            }
            BlockKind::Divider => match self.mode {
                RenderMode::Markdown => "---".to_string(),
                RenderMode::Html => "<hr />".to_string(),
            },
            BlockKind::Column => format!("<div {}>{}</div>", html_class("column"), children),
            BlockKind::ColumnList => {
                format!("<div {}>{}</div>", html_class("column_list"), children)
            }
            BlockKind::Table(table) => self.table(block, table),
            // A row outside its table has no header context; render every
            // cell as data.
            BlockKind::TableRow(row) => self.table_row(&row.cells, false, false),
            BlockKind::ChildPage { .. } => self.inject_child_page(block),
            BlockKind::Unsupported { kind } => unsupported_comment(&format!(
                "Block type '{}' is not supported yet.",
                kind
            )),
        }
    }

    fn heading(&self, level: usize, text: &str) -> String {
        let level = level + usize::from(self.lower_heading_level);
        match self.mode {
            RenderMode::Markdown => format!("{} {}", "#".repeat(level), text),
            RenderMode::Html => format!("<h{n}>{}</h{n}>", text, n = level.min(6)),
        }
    }

    fn image(&self, media: &MediaContent) -> String {
        let caption = self.text(&media.caption);
        match self.mode {
            RenderMode::Markdown => format!("![{}]({})", caption, media.source.url()),
            RenderMode::Html => self.captionize(
                format!(
                    "<img {} src=\"{}\" alt=\"{}\" />",
                    html_class("image"),
                    media.source.url(),
                    html_escape(&plain_text(&media.caption))
                ),
                &media.caption,
            ),
        }
    }

    fn video(&self, media: &MediaContent) -> String {
        use crate::model::FileSource;

        let caption = self.text(&media.caption);
        match &media.source {
            FileSource::Uploaded { url } => self.captionize(
                format!(
                    "<video {} controls><source src=\"{}\">{}</video>",
                    html_class("video"),
                    url,
                    caption
                ),
                &media.caption,
            ),
            FileSource::External { url } => match youtube_embed_url(url) {
                Some(embed_url) => self.captionize(
                    format!(
                        "<iframe width=\"100%\" height=\"600\" src=\"{}\" title=\"YouTube video player\" frameborder=\"0\" allow=\"accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share\" allowfullscreen></iframe>",
                        embed_url
                    ),
                    &media.caption,
                ),
                None => {
                    unsupported_comment(&format!(
                        "External video ({}) is not supported yet: please upload video file directly or to youtube.",
                        url
                    ))
                }
            },
        }
    }

    fn table(&self, block: &Block, table: &TableContent) -> String {
        let rows: Vec<String> = block
            .children()
            .iter()
            .enumerate()
            .map(|(index, row)| match &row.kind {
                BlockKind::TableRow(row) => self.table_row(
                    &row.cells,
                    table.has_row_header && index == 0,
                    table.has_column_header,
                ),
                _ => self.compile_block(row),
            })
            .collect();
        format!(
            "<table {}>{}</table>",
            html_class("table"),
            rows.join("")
        )
    }

    fn table_row(&self, cells: &[Vec<RichTextRun>], header_row: bool, header_column: bool) -> String {
        let rendered: String = cells
            .iter()
            .enumerate()
            .map(|(column, cell)| {
                let tag = if header_row || (header_column && column == 0) {
                    "th"
                } else {
                    "td"
                };
                // Cells are HTML in both modes; escape accordingly.
                format!(
                    "<{tag}>{}</{tag}>",
                    render_rich_text(cell, self.mode, true).trim()
                )
            })
            .collect();
        format!("<tr>{}</tr>", rendered)
    }

    /// The raw-injection escape hatch: a child page's direct `code` children
    /// pass through as markup, bypassing escaping. `html`/`markdown` blocks
    /// inject verbatim, `css` wraps in `<style>`, `javascript` in
    /// `<script>`; other languages are skipped. A childless child page
    /// compiles to nothing.
    fn inject_child_page(&self, block: &Block) -> String {
        if !block.has_children() {
            return String::new();
        }
        block
            .children()
            .iter()
            .filter_map(|child| match &child.kind {
                BlockKind::Code(code) => inject_code_child(code),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn captionize(&self, content: String, caption: &[RichTextRun]) -> String {
        let caption = self.text(caption);
        if caption.is_empty() {
            content
        } else {
            format!(
                "<figure {}>{}<figcaption {}>{}</figcaption></figure>",
                html_class("figure"),
                content,
                html_class("figcaption"),
                caption
            )
        }
    }
}

fn inject_code_child(code: &CodeContent) -> Option<String> {
    let raw = plain_text(&code.rich_text);
    match code.language.as_str() {
        "markdown" | "html" => Some(raw),
        "css" => Some(format!("<style>\n{}\n</style>", raw)),
        "javascript" => Some(format!("<script>\n{}\n</script>", raw)),
        _ => None,
    }
}

fn html_class(block_type: &str) -> String {
    format!("class=\"notion-{}-block\"", block_type.replace('_', "-"))
}

fn unsupported_comment(comment: &str) -> String {
    log::warn!("{}", comment);
    format!("<!-- {} -->", comment)
}
