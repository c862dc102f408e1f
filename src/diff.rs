//! Snapshot diffing between two raw extracts.
//!
//! Compares an old and a new JSONL snapshot of the same layer by primary
//! identifier, using the layer's change-detection field (typically the
//! registry entry date) to distinguish updates from unchanged records.
//! The output is classification only: id lists and a delta extract for
//! `extract --delta`. Records absent from the new snapshot are reported,
//! never removed from the corpus.

use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::market::MarketRegistry;

#[derive(Debug, Default, Clone, Copy)]
pub struct DiffSummary {
    pub added: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
    pub errors: u64,
}

pub fn run_diff(
    registry: &MarketRegistry,
    layer: &str,
    old: &Path,
    new: &Path,
    out_dir: Option<PathBuf>,
) -> Result<DiffSummary> {
    let adapter = registry
        .find(layer)
        .ok_or_else(|| PipelineError::UnknownLayer(layer.to_string()))?;
    let id_key = adapter.id_key();
    let change_key = adapter.change_key();

    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("diff"));
    std::fs::create_dir_all(&out_dir).map_err(|e| PipelineError::io(&out_dir, e))?;

    let old_index = load_change_index(old, &id_key, &change_key)?;

    println!("diff {}", layer);
    println!("  old: {} ({} records)", old.display(), old_index.len());

    let new_file = std::fs::File::open(new).map_err(|_| PipelineError::InputMissing(new.into()))?;
    let reader = std::io::BufReader::new(new_file);

    let new_ids_path = out_dir.join("new_ids.txt");
    let updated_ids_path = out_dir.join("updated_ids.txt");
    let delta_path = out_dir.join("delta.jsonl");
    let mut new_ids =
        std::fs::File::create(&new_ids_path).map_err(|e| PipelineError::io(&new_ids_path, e))?;
    let mut updated_ids = std::fs::File::create(&updated_ids_path)
        .map_err(|e| PipelineError::io(&updated_ids_path, e))?;
    let mut delta =
        std::fs::File::create(&delta_path).map_err(|e| PipelineError::io(&delta_path, e))?;

    let mut summary = DiffSummary::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut new_total = 0u64;

    for line in reader.lines() {
        let Ok(line) = line else {
            summary.errors += 1;
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            summary.errors += 1;
            continue;
        };
        let id = crate::market::scalar_string(value.get(id_key.as_str()));
        if id.is_empty() {
            summary.errors += 1;
            continue;
        }
        new_total += 1;
        let change = crate::market::scalar_string(value.get(change_key.as_str()));

        match old_index.get(&id) {
            None => {
                summary.added += 1;
                writeln!(new_ids, "{}", id).map_err(|e| PipelineError::io(&new_ids_path, e))?;
                writeln!(delta, "{}", line).map_err(|e| PipelineError::io(&delta_path, e))?;
            }
            Some(old_change) if *old_change != change => {
                summary.updated += 1;
                writeln!(updated_ids, "{}", id)
                    .map_err(|e| PipelineError::io(&updated_ids_path, e))?;
                writeln!(delta, "{}", line).map_err(|e| PipelineError::io(&delta_path, e))?;
            }
            Some(_) => {
                summary.unchanged += 1;
            }
        }
        seen.insert(id);
    }

    summary.removed = old_index.keys().filter(|id| !seen.contains(*id)).count() as u64;

    println!("  new: {} ({} records)", new.display(), new_total);
    println!("  added: {}", summary.added);
    println!("  updated: {}", summary.updated);
    println!("  unchanged: {}", summary.unchanged);
    println!("  removed: {}", summary.removed);
    if summary.errors > 0 {
        println!("  errors: {}", summary.errors);
    }
    println!(
        "  delta: {} ({} records)",
        delta_path.display(),
        summary.added + summary.updated
    );
    println!("ok");

    Ok(summary)
}

/// Index one snapshot: id → change-field value. Later duplicates of an id
/// overwrite earlier ones (latest wins).
fn load_change_index(
    path: &Path,
    id_key: &str,
    change_key: &str,
) -> Result<HashMap<String, String>> {
    let file = std::fs::File::open(path).map_err(|_| PipelineError::InputMissing(path.into()))?;
    let reader = std::io::BufReader::new(file);
    let mut index = HashMap::new();

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let id = crate::market::scalar_string(value.get(id_key));
        if id.is_empty() {
            continue;
        }
        let change = crate::market::scalar_string(value.get(change_key));
        index.insert(id, change);
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn classifies_added_updated_unchanged_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old.jsonl");
        let new = tmp.path().join("new.jsonl");
        std::fs::write(
            &old,
            concat!(
                "{\"dsld_id\": 1, \"entryDate\": \"2024-01-01\"}\n",
                "{\"dsld_id\": 2, \"entryDate\": \"2024-01-01\"}\n",
                "{\"dsld_id\": 3, \"entryDate\": \"2024-01-01\"}\n",
            ),
        )
        .unwrap();
        std::fs::write(
            &new,
            concat!(
                "{\"dsld_id\": 1, \"entryDate\": \"2024-01-01\"}\n",
                "{\"dsld_id\": 2, \"entryDate\": \"2024-06-01\"}\n",
                "{\"dsld_id\": 4, \"entryDate\": \"2024-06-01\"}\n",
                "not json\n",
            ),
        )
        .unwrap();

        let registry = MarketRegistry::from_config(&Config::minimal());
        let out_dir = tmp.path().join("diff");
        let summary = run_diff(
            &registry,
            "us_dsld",
            &old,
            &new,
            Some(out_dir.clone()),
        )
        .unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.errors, 1);

        let new_ids = std::fs::read_to_string(out_dir.join("new_ids.txt")).unwrap();
        assert_eq!(new_ids.trim(), "4");
        let updated_ids = std::fs::read_to_string(out_dir.join("updated_ids.txt")).unwrap();
        assert_eq!(updated_ids.trim(), "2");
        let delta = std::fs::read_to_string(out_dir.join("delta.jsonl")).unwrap();
        assert_eq!(delta.lines().count(), 2);
        // Delta preserves the raw lines verbatim for extract --delta.
        assert!(delta.contains("\"dsld_id\": 4"));
    }

    #[test]
    fn unknown_layer_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.jsonl");
        std::fs::write(&file, "{}\n").unwrap();
        let registry = MarketRegistry::from_config(&Config::minimal());
        let err = run_diff(&registry, "nope", &file, &file, None).unwrap_err();
        assert!(err.to_string().contains("unknown market layer"));
    }
}
