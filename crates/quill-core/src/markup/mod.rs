//! Content tree to markdown conversion
//!
//! `Converter::convert` renders a node sequence in order. Children are
//! fetched on demand through the shared `Fetcher`, so every child listing
//! goes through the same spacing and retry rules as the rest of a run.
//!
//! The only state carried through recursion is a `RenderContext` holding
//! the indent depth, passed by value.

mod callout;
mod inline;

pub use callout::{callout_kind, DEFAULT_KIND};
pub use inline::{annotate, reference_token, render_run, render_runs};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::content::{plain_text, ContentNode, InlineRun, Media, MediaKind, NodeKind};
use crate::remote::{Fetcher, RemoteApi, RemoteResult};

/// Language value that gets no fence tag
const PLAIN_TEXT_LANGUAGE: &str = "plain text";

/// Separator between the columns of a column layout
const COLUMN_SEPARATOR: &str = "\n\n---\n\n";

/// Formatting context for one level of recursion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub depth: usize,
}

impl RenderContext {
    /// Context for children one indent level deeper
    pub fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
        }
    }

    fn indent(self) -> String {
        "\t".repeat(self.depth)
    }
}

/// Renders content trees, fetching children as needed
pub struct Converter<'a, A> {
    fetcher: &'a Fetcher<A>,
}

impl<'a, A: RemoteApi> Converter<'a, A> {
    pub fn new(fetcher: &'a Fetcher<A>) -> Self {
        Self { fetcher }
    }

    /// Fetch and render the whole body of a record
    pub async fn convert_record(&self, record_id: &str) -> RemoteResult<String> {
        let nodes = self.fetcher.children(record_id).await?;
        debug!("Converting {} top-level nodes of {}", nodes.len(), record_id);
        self.convert(&nodes, RenderContext::default()).await
    }

    /// Render a node sequence
    ///
    /// Consecutive list items are separated by a single newline, all other
    /// neighbours by a blank line. Nodes rendering to nothing are skipped
    /// and break list adjacency.
    pub fn convert<'s>(
        &'s self,
        nodes: &'s [ContentNode],
        ctx: RenderContext,
    ) -> BoxFuture<'s, RemoteResult<String>> {
        async move {
            let mut out = String::new();
            let mut previous_was_list = false;
            let mut number = 0usize;

            for node in nodes {
                if node.kind.is_numbered_item() {
                    number += 1;
                } else {
                    number = 0;
                }

                let rendered = self.render_node(node, ctx, number).await?;
                if rendered.is_empty() {
                    previous_was_list = false;
                    continue;
                }

                let is_list = node.kind.is_list_item();
                if !out.is_empty() {
                    out.push_str(if previous_was_list && is_list { "\n" } else { "\n\n" });
                }
                out.push_str(&rendered);
                previous_was_list = is_list;
            }

            Ok(out)
        }
        .boxed()
    }

    async fn render_node(
        &self,
        node: &ContentNode,
        ctx: RenderContext,
        number: usize,
    ) -> RemoteResult<String> {
        let indent = ctx.indent();

        let rendered = match &node.kind {
            NodeKind::Paragraph(text) => {
                // Children follow as sibling blocks; a deeper indent
                // would read as an indented code block
                let line = indent_lines(&render_runs(text), &indent);
                let children = self.children(node, ctx).await?;
                join_nonempty(&[line, children], "\n\n")
            }
            NodeKind::Heading {
                level,
                text,
                collapsible,
            } => {
                let marker = "#".repeat(usize::from((*level).clamp(1, 3)));
                let title = render_runs(text);
                if *collapsible && node.has_children {
                    let body = self.children(node, RenderContext::default()).await?;
                    quote_block(&format!("[!note]- {marker} {title}"), &body, &indent)
                } else {
                    let heading = format!("{indent}{marker} {title}");
                    let children = self.children(node, ctx).await?;
                    join_nonempty(&[heading, children], "\n\n")
                }
            }
            NodeKind::BulletedItem(text) => self.list_item(node, "-", text, ctx).await?,
            NodeKind::NumberedItem(text) => {
                self.list_item(node, &format!("{number}."), text, ctx).await?
            }
            NodeKind::Checklist { text, checked } => {
                let marker = if *checked { "- [x]" } else { "- [ ]" };
                self.list_item(node, marker, text, ctx).await?
            }
            NodeKind::Toggle(text) => {
                let body = self.children(node, RenderContext::default()).await?;
                quote_block(&format!("[!note]- {}", render_runs(text)), &body, &indent)
            }
            NodeKind::Quote(text) => {
                let body = self.children(node, RenderContext::default()).await?;
                quote_block(&render_runs(text), &body, &indent)
            }
            NodeKind::Callout { text, icon } => {
                let kind = callout_kind(icon.as_deref());
                let body = self.children(node, RenderContext::default()).await?;
                quote_block(&format!("[!{kind}] {}", render_runs(text)), &body, &indent)
            }
            NodeKind::Code { text, language } => {
                let tag = language
                    .as_deref()
                    .filter(|lang| *lang != PLAIN_TEXT_LANGUAGE)
                    .unwrap_or("");
                let fenced = format!("```{tag}\n{}\n```", plain_text(text));
                indent_lines(&fenced, &indent)
            }
            NodeKind::Equation(expr) => indent_lines(&format!("$$\n{}\n$$", expr.trim()), &indent),
            NodeKind::Divider => format!("{indent}---"),
            NodeKind::Table => self.table(node, &indent).await?,
            NodeKind::TableRow(cells) => indent_lines(&table_row(cells), &indent),
            NodeKind::ColumnList => self.column_list(node, ctx).await?,
            NodeKind::Column | NodeKind::Synced => self.children(node, ctx).await?,
            NodeKind::Media(media) => indent_lines(&render_media(media), &indent),
            NodeKind::LinkToPage(target) => format!("{indent}{}", reference_token(target.id(), "")),
            NodeKind::ChildRecord { title } | NodeKind::ChildCollection { title } => {
                format!("{indent}{}", reference_token(&node.id, title))
            }
            NodeKind::Structural(tag) => {
                debug!("Skipping structural node {} ({})", node.id, tag);
                String::new()
            }
            NodeKind::Unsupported(tag) => {
                warn!("Unsupported node type '{}' in {}; rendering nothing", tag, node.id);
                String::new()
            }
        };

        Ok(rendered)
    }

    /// Render a node's children, or nothing if it has none
    async fn children(&self, node: &ContentNode, ctx: RenderContext) -> RemoteResult<String> {
        if !node.has_children {
            return Ok(String::new());
        }
        let children = self.fetcher.children(&node.id).await?;
        self.convert(&children, ctx).await
    }

    async fn list_item(
        &self,
        node: &ContentNode,
        marker: &str,
        text: &[InlineRun],
        ctx: RenderContext,
    ) -> RemoteResult<String> {
        let indent = ctx.indent();
        let continuation = format!("\n{indent}\t");
        let line = format!(
            "{indent}{marker} {}",
            render_runs(text).replace('\n', &continuation)
        );
        let children = self.children(node, ctx.nested()).await?;
        Ok(join_nonempty(&[line, children], "\n"))
    }

    /// Header row, separator row, then the data rows
    async fn table(&self, node: &ContentNode, indent: &str) -> RemoteResult<String> {
        if !node.has_children {
            return Ok(String::new());
        }

        let rows: Vec<_> = self
            .fetcher
            .children(&node.id)
            .await?
            .into_iter()
            .filter_map(|row| match row.kind {
                NodeKind::TableRow(cells) => Some(cells),
                _ => None,
            })
            .collect();

        let Some((header, body)) = rows.split_first() else {
            return Ok(String::new());
        };

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(table_row(header));
        lines.push(format!("|{}", " --- |".repeat(header.len().max(1))));
        lines.extend(body.iter().map(|cells| table_row(cells)));

        Ok(indent_lines(&lines.join("\n"), indent))
    }

    async fn column_list(&self, node: &ContentNode, ctx: RenderContext) -> RemoteResult<String> {
        if !node.has_children {
            return Ok(String::new());
        }

        let columns = self.fetcher.children(&node.id).await?;
        let mut rendered = Vec::with_capacity(columns.len());
        for column in &columns {
            let text = self.children(column, ctx).await?;
            if !text.is_empty() {
                rendered.push(text);
            }
        }
        Ok(rendered.join(COLUMN_SEPARATOR))
    }
}

fn table_row(cells: &[Vec<InlineRun>]) -> String {
    let cells: Vec<String> = cells
        .iter()
        .map(|cell| {
            render_runs(cell)
                .replace('|', "\\|")
                .replace('\n', "<br>")
        })
        .collect();
    format!("| {} |", cells.join(" | "))
}

fn render_media(media: &Media) -> String {
    let Some(url) = media.url() else {
        return String::new();
    };
    let caption = render_runs(&media.caption);

    match media.kind {
        MediaKind::Image => format!("![{caption}]({url})"),
        _ => {
            let label = if caption.trim().is_empty() { url } else { caption.as_str() };
            format!("[{label}]({url})")
        }
    }
}

/// Blockquote with a first line followed by a body
fn quote_block(first: &str, body: &str, indent: &str) -> String {
    let text = join_nonempty(&[first.trim_end().to_string(), body.to_string()], "\n");
    text.lines()
        .map(|line| {
            if line.is_empty() {
                format!("{indent}>")
            } else {
                format!("{indent}> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_nonempty(parts: &[String], separator: &str) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
