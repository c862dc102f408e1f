//! Incremental document writing.
//!
//! The writer owns document creation and overwrite. Existence is decided
//! against an index of embedded `source_id` header values built once per
//! run; filenames are sanitized lossily, so the filesystem listing alone
//! cannot answer "is this identifier already extracted". Default runs skip
//! existing identifiers (making re-runs no-ops); force/delta runs replace
//! the whole file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::corpus;
use crate::error::PipelineError;
use crate::models::{ProductRecord, WriteOutcome};
use crate::render;

pub struct IncrementalWriter {
    corpus_root: PathBuf,
    force: bool,
    existing: HashSet<String>,
    /// Documents that could not be indexed (unreadable or missing id).
    pub index_skipped: u64,
}

impl IncrementalWriter {
    /// Build the writer and snapshot the existing-ID index for one layer.
    ///
    /// The index is snapshotted once; concurrent writers against the same
    /// layer root are not coordinated here.
    pub fn open(corpus_root: &Path, layer: &str, force: bool) -> Self {
        let layer_root = corpus_root.join(layer);
        let mut existing = HashSet::new();
        let mut index_skipped = 0u64;

        if layer_root.is_dir() {
            for path in corpus::walk_documents(&layer_root) {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match corpus::embedded_source_id(&content) {
                        Some(id) => {
                            existing.insert(id);
                        }
                        None => {
                            eprintln!(
                                "  warning: document without source_id: {}",
                                path.display()
                            );
                            index_skipped += 1;
                        }
                    },
                    Err(e) => {
                        eprintln!("  warning: unreadable document {}: {}", path.display(), e);
                        index_skipped += 1;
                    }
                }
            }
        }

        Self {
            corpus_root: corpus_root.to_path_buf(),
            force,
            existing,
            index_skipped,
        }
    }

    /// Number of identifiers already present in the corpus.
    pub fn known(&self) -> usize {
        self.existing.len()
    }

    /// Apply the write policy for one record.
    pub fn write(
        &mut self,
        record: &ProductRecord,
        content: &str,
    ) -> Result<WriteOutcome, PipelineError> {
        let exists = self.existing.contains(&record.source_id);

        if exists && !self.force {
            return Ok(WriteOutcome::ExistingSkip);
        }

        let path = render::document_path(&self.corpus_root, record);
        let parent = path.parent().expect("document path always has a parent");
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        std::fs::write(&path, content).map_err(|e| PipelineError::io(&path, e))?;

        self.existing.insert(record.source_id.clone());
        Ok(if exists {
            WriteOutcome::ExistingOverwrite
        } else {
            WriteOutcome::New
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ProductForm};
    use chrono::Utc;

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            source_id: id.to_string(),
            layer: "tw_hf".to_string(),
            market: "tw".to_string(),
            source_url: String::new(),
            product_name: "Product".to_string(),
            brand: String::new(),
            manufacturer: String::new(),
            category: Category::Other,
            product_form: ProductForm::Other,
            ingredients: vec![],
            date_entered: String::new(),
            review_reasons: vec![],
            fetched_at: Utc::now(),
        }
    }

    fn content(id: &str) -> String {
        format!("---\nsource_id: \"{}\"\n---\n\n# Product\n", id)
    }

    #[test]
    fn new_then_skip_then_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        let mut writer = IncrementalWriter::open(root, "tw_hf", false);
        assert_eq!(writer.known(), 0);
        assert_eq!(
            writer.write(&record("A:1"), &content("A:1")).unwrap(),
            WriteOutcome::New
        );
        // The in-run index picks up what was just written.
        assert_eq!(
            writer.write(&record("A:1"), &content("A:1")).unwrap(),
            WriteOutcome::ExistingSkip
        );

        // A fresh default-mode run indexes the embedded id (which the
        // sanitized filename `A_1.md` cannot be recovered from).
        let mut second = IncrementalWriter::open(root, "tw_hf", false);
        assert_eq!(second.known(), 1);
        assert_eq!(
            second.write(&record("A:1"), &content("A:1")).unwrap(),
            WriteOutcome::ExistingSkip
        );

        // Force mode replaces the file and reports the overwrite.
        let mut forced = IncrementalWriter::open(root, "tw_hf", true);
        assert_eq!(
            forced.write(&record("A:1"), &content("A:1")).unwrap(),
            WriteOutcome::ExistingOverwrite
        );
    }

    #[test]
    fn index_excludes_raw_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("tw_hf/raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join("stale.md"), content("RAW-1")).unwrap();

        let writer = IncrementalWriter::open(tmp.path(), "tw_hf", false);
        assert_eq!(writer.known(), 0);
    }

    #[test]
    fn sanitized_path_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = IncrementalWriter::open(tmp.path(), "tw_hf", false);
        writer.write(&record("衛:1/2"), &content("衛:1/2")).unwrap();
        assert!(tmp.path().join("tw_hf/other/__1_2.md").exists());
    }
}
