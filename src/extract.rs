//! Extraction run orchestration.
//!
//! Coordinates one layer's flow: source lines → adapter field mapping →
//! review gate → document rendering → incremental write, with per-record
//! problems absorbed into counters. The process exits 0 on completion
//! regardless of per-record errors; only a missing input file or config
//! aborts the run.

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::PipelineError;
use crate::market::{IngredientIndex, MapContext, MarketAdapter, MarketRegistry};
use crate::models::{Disposition, RunStats, WriteOutcome};
use crate::progress::{ProgressEvent, ProgressMode};
use crate::render;
use crate::writer::IncrementalWriter;

/// Extraction options from the CLI.
#[derive(Debug, Default)]
pub struct ExtractOptions {
    /// Overwrite existing documents.
    pub force: bool,
    /// Incremental-update mode; implies force.
    pub delta: bool,
    /// Supplementary ingredient JSONL to join, for markets that support it.
    pub ingredients: Option<PathBuf>,
    pub progress: Option<ProgressMode>,
}

impl ExtractOptions {
    pub fn effective_force(&self) -> bool {
        self.force || self.delta
    }
}

pub fn run_extract(
    config: &Config,
    registry: &MarketRegistry,
    layer: &str,
    input: Option<PathBuf>,
    opts: &ExtractOptions,
) -> Result<RunStats> {
    let adapter = registry
        .find(layer)
        .ok_or_else(|| PipelineError::UnknownLayer(layer.to_string()))?;

    let input = resolve_input(&config.corpus.root, layer, input)?;
    let force = opts.effective_force();

    let ingredient_index = load_ingredient_index(adapter, opts.ingredients.as_deref())?;

    let mode = if opts.delta {
        "delta"
    } else if opts.force {
        "force"
    } else {
        "default"
    };
    println!("extract {}", layer);
    println!("  input: {}", input.display());
    println!("  mode: {}", mode);

    let mut writer = IncrementalWriter::open(&config.corpus.root, layer, force);
    if !force {
        println!("  existing documents: {}", writer.known());
    }
    if let Some(index) = &ingredient_index {
        println!(
            "  ingredient join: {} records across {} products",
            index.records(),
            index.products()
        );
    }

    let reporter = opts
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let ctx = MapContext {
        ingredients: ingredient_index.as_ref(),
        fetched_at: Utc::now(),
    };

    let file = std::fs::File::open(&input).map_err(|e| PipelineError::io(&input, e))?;
    let reader = std::io::BufReader::new(file);

    let mut stats = RunStats::default();

    for (line_num, line) in reader.lines().enumerate() {
        let line_num = line_num + 1;
        stats.total += 1;

        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("  line {}: read error: {}", line_num, e);
                stats.errors += 1;
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("  line {}: JSON parse error: {}", line_num, e);
                stats.errors += 1;
                continue;
            }
        };

        let mut record = match adapter.map_fields(&raw, &ctx) {
            Disposition::Record(record) => record,
            Disposition::Skip(_) => {
                stats.filtered += 1;
                continue;
            }
            Disposition::Error(reason) => {
                eprintln!("  line {}: {}", line_num, reason);
                stats.errors += 1;
                continue;
            }
        };

        record.review_reasons = adapter.review_reasons(&raw, &record);

        let sections = adapter.body_sections(&raw, &record, &ctx);
        let content = render::render_document(&record, &sections);

        match writer.write(&record, &content)? {
            WriteOutcome::ExistingSkip => {
                stats.skipped += 1;
            }
            outcome => {
                stats.record_written(
                    record.category,
                    outcome == WriteOutcome::ExistingOverwrite,
                    record.review_flagged(),
                );
                let written = stats.extracted + stats.updated;
                if written % 1000 == 0 {
                    reporter.report(ProgressEvent::Extracting {
                        layer: layer.to_string(),
                        written,
                    });
                }
            }
        }
    }

    print_summary(&stats);
    Ok(stats)
}

fn print_summary(stats: &RunStats) {
    println!("  total lines: {}", stats.total);
    println!("  skipped (existing): {}", stats.skipped);
    if stats.filtered > 0 {
        println!("  skipped (filtered): {}", stats.filtered);
    }
    println!("  extracted: {}", stats.extracted);
    if stats.updated > 0 {
        println!("  updated: {}", stats.updated);
    }
    println!("  review needed: {}", stats.review_needed);
    println!("  errors: {}", stats.errors);
    if !stats.by_category.is_empty() {
        println!("  by category:");
        for (category, count) in &stats.by_category {
            println!("    {}: {}", category, count);
        }
    }
    println!("ok");
}

/// Use the named input, or fall back to the newest `*.jsonl` under the
/// layer's raw directory.
fn resolve_input(
    corpus_root: &Path,
    layer: &str,
    input: Option<PathBuf>,
) -> Result<PathBuf, PipelineError> {
    if let Some(path) = input {
        if !path.exists() {
            return Err(PipelineError::InputMissing(path));
        }
        return Ok(path);
    }

    let raw_dir = corpus_root.join(layer).join("raw");
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    let entries =
        std::fs::read_dir(&raw_dir).map_err(|_| PipelineError::NoRawExtract(raw_dir.clone()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or(PipelineError::NoRawExtract(raw_dir))
}

fn load_ingredient_index(
    adapter: &dyn MarketAdapter,
    path: Option<&Path>,
) -> Result<Option<IngredientIndex>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let Some(join_key) = adapter.ingredient_join_key() else {
        eprintln!(
            "  warning: {} does not support an ingredient join, ignoring --ingredients",
            adapter.id()
        );
        return Ok(None);
    };
    if !path.exists() {
        eprintln!(
            "  warning: ingredient file not found: {}, skipping join",
            path.display()
        );
        return Ok(None);
    }

    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let reader = std::io::BufReader::new(file);
    let mut index = IngredientIndex::default();

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let id = crate::market::scalar_string(value.get(join_key.as_str()));
        if !id.is_empty() {
            index.insert(id, value);
        }
    }

    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_named_input() {
        let tmp = tempfile::tempdir().unwrap();
        let named = tmp.path().join("input.jsonl");
        std::fs::write(&named, "{}\n").unwrap();
        let resolved = resolve_input(tmp.path(), "tw_hf", Some(named.clone())).unwrap();
        assert_eq!(resolved, named);
    }

    #[test]
    fn resolve_missing_named_input_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_input(
            tmp.path(),
            "tw_hf",
            Some(tmp.path().join("nope.jsonl")),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing(_)));
    }

    #[test]
    fn resolve_discovers_newest_raw_extract() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("tw_hf/raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join("tw_hf-2024-01-01.jsonl"), "{}\n").unwrap();
        // Ensure a later mtime on the second file.
        let newer = raw.join("tw_hf-2024-06-01.jsonl");
        std::fs::write(&newer, "{}\n").unwrap();
        let old = std::fs::File::open(raw.join("tw_hf-2024-01-01.jsonl")).unwrap();
        old.set_modified(std::time::SystemTime::UNIX_EPOCH).unwrap();

        let resolved = resolve_input(tmp.path(), "tw_hf", None).unwrap();
        assert_eq!(resolved, newer);
    }

    #[test]
    fn resolve_empty_raw_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tw_hf/raw")).unwrap();
        let err = resolve_input(tmp.path(), "tw_hf", None).unwrap_err();
        assert!(matches!(err, PipelineError::NoRawExtract(_)));
    }
}
