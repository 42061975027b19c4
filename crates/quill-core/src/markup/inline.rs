//! Inline run rendering
//!
//! Annotations nest in a fixed order, innermost first: code, bold,
//! italic, strikethrough, underline, highlight.

use crate::content::{Annotations, InlineKind, InlineRun, Mention};

/// Render a run sequence as one markup string
pub fn render_runs(runs: &[InlineRun]) -> String {
    runs.iter().map(render_run).collect()
}

/// Render a single run
pub fn render_run(run: &InlineRun) -> String {
    match &run.kind {
        InlineKind::Text => {
            let text = annotate(&run.text, &run.annotations);
            match run.href.as_deref() {
                Some(href) if !href.is_empty() && !run.text.trim().is_empty() => {
                    format!("[{text}]({href})")
                }
                _ => text,
            }
        }
        InlineKind::Equation(expr) => format!("${}$", expr.trim()),
        InlineKind::Mention(mention) => render_mention(run, mention),
    }
}

fn render_mention(run: &InlineRun, mention: &Mention) -> String {
    match mention {
        Mention::Record(id) | Mention::Collection(id) => reference_token(id, &run.text),
        Mention::Date(date) => annotate(&date.to_string(), &run.annotations),
        Mention::Person(name) => {
            let name = name.trim_start_matches('@');
            annotate(&format!("@{name}"), &run.annotations)
        }
        Mention::Link(url) => {
            let label = if run.text.trim().is_empty() {
                url.as_str()
            } else {
                run.text.as_str()
            };
            format!("[{label}]({url})")
        }
    }
}

/// Internal reference to another remote record, resolved later by the host
pub fn reference_token(id: &str, label: &str) -> String {
    let label: String = label
        .trim()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '|'))
        .collect();

    if label.is_empty() {
        format!("[[remote:{id}]]")
    } else {
        format!("[[remote:{id}|{label}]]")
    }
}

/// Wrap text in markers for each active annotation
///
/// Surrounding whitespace stays outside the markers; a run that is all
/// whitespace is returned untouched.
pub fn annotate(text: &str, annotations: &Annotations) -> String {
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }

    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    let (leading, trailing) = (&text[..start], &text[end..]);

    let mut wrapped = core.to_string();
    if annotations.code {
        wrapped = format!("`{wrapped}`");
    }
    if annotations.bold {
        wrapped = format!("**{wrapped}**");
    }
    if annotations.italic {
        wrapped = format!("*{wrapped}*");
    }
    if annotations.strikethrough {
        wrapped = format!("~~{wrapped}~~");
    }
    if annotations.underline {
        wrapped = format!("<u>{wrapped}</u>");
    }
    if annotations.is_highlighted() {
        wrapped = format!("=={wrapped}==");
    }

    format!("{leading}{wrapped}{trailing}")
}
