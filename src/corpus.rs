//! Reading the rendered document corpus.
//!
//! The aggregator and the existing-ID index both consume documents through
//! this module: a walker that skips `raw/` extract directories, a per-file
//! reader returning an explicit outcome (document / review-flagged /
//! unreadable) instead of using errors for ordinary skip control flow, a
//! naive line-based header-block parser matching the renderer's emission,
//! and a three-state section scanner.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::render::REVIEW_SENTINEL;

/// How far into a document the review sentinel is looked for. The gate
/// emits it as the first bytes, so scanning further would only produce
/// false positives from body text mentioning the marker.
pub const SENTINEL_SCAN_CHARS: usize = 500;

/// Outcome of reading one corpus file.
#[derive(Debug)]
pub enum DocRead {
    /// A parseable, unflagged document.
    Document(ParsedDocument),
    /// Carries the review sentinel; excluded from statistics, not an error.
    ReviewFlagged,
    /// Could not be read or lacks a header block; skipped with a note.
    Unreadable(String),
}

/// A parsed document: header key/value pairs plus the body text after the
/// closing delimiter.
#[derive(Debug)]
pub struct ParsedDocument {
    pub header: BTreeMap<String, String>,
    pub body: String,
}

impl ParsedDocument {
    pub fn header_value(&self, key: &str) -> &str {
        self.header.get(key).map(String::as_str).unwrap_or("")
    }
}

/// True when the first [`SENTINEL_SCAN_CHARS`] characters contain the
/// review sentinel.
pub fn is_review_flagged(content: &str) -> bool {
    let head_end = content
        .char_indices()
        .nth(SENTINEL_SCAN_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    content[..head_end].contains(REVIEW_SENTINEL)
}

/// Read and classify one corpus file.
pub fn read_document(path: &Path) -> DocRead {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return DocRead::Unreadable(e.to_string()),
    };
    if is_review_flagged(&content) {
        return DocRead::ReviewFlagged;
    }
    match parse_document(&content) {
        Some(doc) => DocRead::Document(doc),
        None => DocRead::Unreadable("missing header block".to_string()),
    }
}

/// Parse a document's header block and body.
///
/// The header block is delimited by a line containing exactly three
/// dashes before and after; values are double-quoted with backslash
/// escapes. Returns `None` when no complete header block exists.
pub fn parse_document(content: &str) -> Option<ParsedDocument> {
    let mut lines = content.lines();

    // Skip anything (sentinel block, blank lines) before the opening
    // delimiter.
    loop {
        match lines.next() {
            Some("---") => break,
            Some(_) => continue,
            None => return None,
        }
    }

    let mut header = BTreeMap::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line == "---" {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            header.insert(key.trim().to_string(), unquote(value.trim()));
        }
    }
    if !closed {
        return None;
    }

    let body: String = lines.collect::<Vec<_>>().join("\n");
    Some(ParsedDocument { header, body })
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\\\"", "\"")
}

/// Extract the embedded `source_id` header value without parsing the whole
/// document. Used by the existing-ID index, which must not rely on the
/// (lossy) filename sanitization.
pub fn embedded_source_id(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("source_id:") {
            return Some(unquote(rest.trim()));
        }
    }
    None
}

/// Extract the text of one `## `-titled section via a single line walk.
///
/// Explicit states rather than a capturing regex: heading lines flip the
/// scanner between target and non-target sections, everything else
/// accumulates while in the target.
pub fn section_text(body: &str, title: &str) -> Option<String> {
    enum State {
        BeforeSection,
        InTarget,
        InOther,
    }

    let wanted = format!("## {}", title);
    let mut state = State::BeforeSection;
    let mut collected: Vec<&str> = Vec::new();
    let mut found = false;

    for line in body.lines() {
        if line.starts_with("## ") {
            if line.trim_end() == wanted {
                state = State::InTarget;
                found = true;
            } else {
                if matches!(state, State::InTarget) {
                    break;
                }
                state = State::InOther;
            }
            continue;
        }
        if matches!(state, State::InTarget) {
            collected.push(line);
        }
    }

    if found {
        Some(collected.join("\n").trim().to_string())
    } else {
        None
    }
}

/// All markdown documents under a layer root, excluding `raw/` extract
/// subtrees, in deterministic path order.
pub fn walk_documents(layer_root: &Path) -> Vec<PathBuf> {
    let exclude = raw_exclude_set();
    let mut paths = Vec::new();

    for entry in WalkDir::new(layer_root).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map(|e| e != "md").unwrap_or(true) {
            continue;
        }
        let relative = path.strip_prefix(layer_root).unwrap_or(path);
        if exclude.is_match(relative) {
            continue;
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();
    paths
}

fn raw_exclude_set() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["raw/**", "**/raw/**"] {
        builder.add(Glob::new(pattern).expect("static glob"));
    }
    builder.build().expect("static glob set")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\n\
source_id: \"AB_1\"\n\
source_layer: \"us_dsld\"\n\
market: \"us\"\n\
product_name: \"Say \\\"Cheese\\\"\"\n\
category: \"botanicals\"\n\
---\n\
\n\
# Say \"Cheese\"\n\
\n\
## Basic Info\n\
- Brand: Acme\n\
\n\
## Ingredients\n\
- Green Tea Extract\n\
- Vitamin C\n\
\n\
## Notes\n\
(no data)\n";

    #[test]
    fn parses_header_and_body() {
        let doc = parse_document(DOC).unwrap();
        assert_eq!(doc.header_value("source_id"), "AB_1");
        assert_eq!(doc.header_value("product_name"), "Say \"Cheese\"");
        assert_eq!(doc.header_value("missing"), "");
        assert!(doc.body.contains("## Ingredients"));
    }

    #[test]
    fn parses_header_behind_sentinel() {
        let flagged = format!("[REVIEW_NEEDED]\nReasons: x\n\n{}", DOC);
        let doc = parse_document(&flagged).unwrap();
        assert_eq!(doc.header_value("source_id"), "AB_1");
    }

    #[test]
    fn incomplete_header_is_none() {
        assert!(parse_document("---\nsource_id: \"x\"\n").is_none());
        assert!(parse_document("no delimiters at all\n").is_none());
    }

    #[test]
    fn section_scanner_finds_target() {
        let doc = parse_document(DOC).unwrap();
        let text = section_text(&doc.body, "Ingredients").unwrap();
        assert_eq!(text, "- Green Tea Extract\n- Vitamin C");
    }

    #[test]
    fn section_scanner_stops_at_next_heading() {
        let doc = parse_document(DOC).unwrap();
        let text = section_text(&doc.body, "Basic Info").unwrap();
        assert_eq!(text, "- Brand: Acme");
        assert!(!text.contains("Green Tea"));
    }

    #[test]
    fn missing_section_is_none() {
        let doc = parse_document(DOC).unwrap();
        assert!(section_text(&doc.body, "Claims").is_none());
    }

    #[test]
    fn sentinel_only_in_first_500_chars() {
        let mut content = String::from("---\nsource_id: \"x\"\n---\n\n# P\n\n## Notes\n");
        content.push_str(&"filler line\n".repeat(60));
        content.push_str("[REVIEW_NEEDED] mentioned deep in the body\n");
        assert!(!is_review_flagged(&content));
        assert!(is_review_flagged(&format!("[REVIEW_NEEDED]\n\n{}", content)));
    }

    #[test]
    fn embedded_id_scan() {
        assert_eq!(embedded_source_id(DOC), Some("AB_1".to_string()));
        assert_eq!(embedded_source_id("# nothing\n"), None);
    }

    #[test]
    fn walker_skips_raw_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("botanicals")).unwrap();
        std::fs::create_dir_all(root.join("raw")).unwrap();
        std::fs::write(root.join("botanicals/a.md"), DOC).unwrap();
        std::fs::write(root.join("raw/extract.md"), "not a document").unwrap();
        std::fs::write(root.join("raw/extract.jsonl"), "{}").unwrap();

        let docs = walk_documents(root);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].ends_with("botanicals/a.md"));
    }
}
