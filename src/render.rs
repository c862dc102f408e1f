//! Document rendering.
//!
//! A rendered document is, in order: an optional `[REVIEW_NEEDED]` sentinel
//! block, a header block delimited by `---` lines holding double-quoted
//! `key: value` pairs in fixed order, a `#` title, and a sequence of `## `
//! sections. Downstream readers are naive line-based parsers, so values are
//! quote-escaped and the sentinel appears only as the literal first bytes
//! of a flagged document.

use std::path::{Path, PathBuf};

use crate::market::Section;
use crate::models::ProductRecord;

/// Sentinel marking a document as excluded from downstream statistics.
pub const REVIEW_SENTINEL: &str = "[REVIEW_NEEDED]";

/// Placeholder for a section whose source field is empty. Sections are
/// never rendered empty.
pub const EMPTY_SECTION: &str = "(no data)";

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Identifiers feed directly into filenames; some registries use slashes,
/// colons, or non-Latin scripts in theirs. Sanitization is idempotent.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Backslash-escape ASCII double quotes so header values stay parseable
/// by a line-based reader.
pub fn escape_value(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Document path: `<corpus>/<layer>/<category>/<sanitized id>.md`.
pub fn document_path(corpus_root: &Path, record: &ProductRecord) -> PathBuf {
    corpus_root
        .join(&record.layer)
        .join(record.category.as_str())
        .join(format!("{}.md", sanitize_id(&record.source_id)))
}

/// Render the full document text for a canonical record.
pub fn render_document(record: &ProductRecord, sections: &[Section]) -> String {
    let mut out = String::new();

    if record.review_flagged() {
        out.push_str(REVIEW_SENTINEL);
        out.push('\n');
        out.push_str(&format!("Reasons: {}\n", record.review_reasons.join(", ")));
        out.push('\n');
    }

    out.push_str("---\n");
    header_line(&mut out, "source_id", &record.source_id);
    header_line(&mut out, "source_layer", &record.layer);
    header_line(&mut out, "source_url", &record.source_url);
    header_line(&mut out, "market", &record.market);
    header_line(&mut out, "product_name", &record.product_name);
    header_line(&mut out, "brand", &record.brand);
    header_line(&mut out, "manufacturer", &record.manufacturer);
    header_line(&mut out, "category", record.category.as_str());
    header_line(&mut out, "product_form", record.product_form.as_str());
    header_line(&mut out, "date_entered", &record.date_entered);
    header_line(&mut out, "fetched_at", &record.fetched_at.to_rfc3339());
    out.push_str("---\n\n");

    out.push_str(&format!("# {}\n", record.product_name));

    for section in sections {
        out.push('\n');
        out.push_str(&format!("## {}\n", section.title));
        let text = section.text.trim_end();
        if text.trim().is_empty() {
            out.push_str(EMPTY_SECTION);
        } else {
            out.push_str(text);
        }
        out.push('\n');
    }

    out
}

fn header_line(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("{}: \"{}\"\n", key, escape_value(value)));
}
