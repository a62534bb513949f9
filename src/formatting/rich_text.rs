// src/formatting/rich_text.rs
//! Renders ordered rich text runs into one styled string.
//!
//! Annotations apply in a fixed, order-significant pipeline: inline code,
//! bold, italic, strikethrough, underline, color, link — each step a no-op
//! unless its annotation is set, later steps wrapping the output of earlier
//! ones. The order is observable in the output (a bold linked run nests the
//! strong inside the anchor), so it must not be reordered.

use crate::types::{MentionKind, RenderMode, RichTextRun, RunKind};

/// Escapes text for safe inclusion in HTML element content or attributes.
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// The unstyled text of a run sequence, concatenated in order.
pub fn plain_text(runs: &[RichTextRun]) -> String {
    runs.iter().map(|run| run.plain_text.as_str()).collect()
}

/// Renders runs into a single string, concatenated in original order with
/// no added separators.
pub fn render_rich_text(runs: &[RichTextRun], mode: RenderMode, escape_html: bool) -> String {
    runs.iter()
        .map(|run| render_run(run, mode, escape_html))
        .collect()
}

fn render_run(run: &RichTextRun, mode: RenderMode, escape_html: bool) -> String {
    let escape = |text: &str| {
        if escape_html {
            html_escape(text)
        } else {
            text.to_string()
        }
    };

    // Base content selection. Equations become an image embed of the
    // rendered expression; date mentions become a <time>-tagged point or
    // range; user/page mentions fall back to their plain text.
    let mut content = match &run.kind {
        RunKind::Text => escape(&run.plain_text),
        RunKind::Equation { expression } => equation_embed(expression, mode),
        RunKind::Mention(MentionKind::Date { start, end }) => {
            let point_or_range = match end {
                Some(end) => format!("{} → {}", start, end),
                None => start.clone(),
            };
            format!(
                "<time datetime=\"{}\">{}</time>",
                point_or_range, point_or_range
            )
        }
        RunKind::Mention(_) => escape(&run.plain_text),
    };

    let annotations = &run.annotations;

    if annotations.code {
        content = match mode {
            RenderMode::Markdown => format!("`{}`", content),
            RenderMode::Html => format!("<code>{}</code>", content),
        };
    }
    if annotations.bold {
        content = match mode {
            RenderMode::Markdown => format!("**{}**", content),
            RenderMode::Html => format!("<strong>{}</strong>", content),
        };
    }
    if annotations.italic {
        content = match mode {
            RenderMode::Markdown => format!("_{}_", content),
            RenderMode::Html => format!("<em>{}</em>", content),
        };
    }
    if annotations.strikethrough {
        content = match mode {
            RenderMode::Markdown => format!("~~{}~~", content),
            RenderMode::Html => format!("<del>{}</del>", content),
        };
    }
    if annotations.underline {
        content = format!("<u>{}</u>", content);
    }
    if annotations.has_color() {
        content = format!(
            "<span data-color=\"{}\">{}</span>",
            annotations.color, content
        );
    }
    if let Some(url) = &run.link {
        content = match mode {
            RenderMode::Markdown => format!("[{}]({})", content, url),
            RenderMode::Html => format!("<a href=\"{}\">{}</a>", url, content),
        };
    }

    content
}

fn equation_embed(expression: &str, mode: RenderMode) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(expression.as_bytes()).collect();
    let src = format!(
        "http://www.sciweavers.org/tex2img.php?eq={}&bc=White&fc=Black&im=jpg&fs=20&ff=arev&edit=",
        encoded
    );
    match mode {
        RenderMode::Markdown => format!("![{}]({})", expression, src),
        RenderMode::Html => format!("<img src=\"{}\" alt=\"{}\" />", src, html_escape(expression)),
    }
}
