//! Corpus aggregation.
//!
//! Walks every rendered document, extracts normalized ingredient mentions,
//! and folds them into the cross-tabulation tables: ingredient → count,
//! ingredient → markets, ingredient → category counts, and market →
//! ingredient counts. Mentions are deduplicated *within* each document
//! first, so a document contributes at most 1 to any ingredient's count no
//! matter how often its section repeats the name.
//!
//! The tables are ephemeral, rebuilt wholesale on every run, and are
//! persisted only as a derived JSON artifact for the report renderer to
//! consume without recomputation. First-encounter order is preserved so
//! ranking tie-breaks stay deterministic.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::corpus::{self, DocRead};
use crate::error::PipelineError;
use crate::ingredient::IngredientNormalizer;
use crate::market::MarketRegistry;

/// The persisted aggregate artifact.
#[derive(Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub generated_at: String,
    /// Per-layer document tallies, for the report's data-quality section.
    pub layers: BTreeMap<String, LayerTally>,
    /// Global ingredient table in first-encounter order (not ranked).
    pub ingredients: Vec<IngredientEntry>,
    /// Per-market ingredient counts in first-encounter order.
    pub markets: BTreeMap<String, Vec<MarketCount>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LayerTally {
    /// Documents scanned (excluding the raw directory).
    pub total: u64,
    /// Documents that contributed at least one ingredient mention.
    pub included: u64,
    /// Documents excluded by the review sentinel.
    pub review_skipped: u64,
    /// Documents that could not be read or parsed.
    pub unreadable: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientEntry {
    pub name: String,
    /// Number of documents mentioning the ingredient.
    pub count: u64,
    /// Markets the ingredient appears in, sorted.
    pub markets: Vec<String>,
    /// Document counts per category.
    pub categories: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCount {
    pub name: String,
    pub count: u64,
}

/// Order-preserving accumulator for the four aggregate tables.
#[derive(Default)]
struct Tables {
    entries: Vec<IngredientEntry>,
    index: HashMap<String, usize>,
    markets: BTreeMap<String, MarketTable>,
}

#[derive(Default)]
struct MarketTable {
    counts: Vec<MarketCount>,
    index: HashMap<String, usize>,
}

impl Tables {
    fn add(&mut self, name: &str, market: &str, category: &str) {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.entries.push(IngredientEntry {
                    name: name.to_string(),
                    count: 0,
                    markets: Vec::new(),
                    categories: BTreeMap::new(),
                });
                let idx = self.entries.len() - 1;
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        let entry = &mut self.entries[idx];
        entry.count += 1;
        if let Err(pos) = entry.markets.binary_search(&market.to_string()) {
            entry.markets.insert(pos, market.to_string());
        }
        *entry.categories.entry(category.to_string()).or_insert(0) += 1;

        let table = self.markets.entry(market.to_string()).or_default();
        match table.index.get(name) {
            Some(&i) => table.counts[i].count += 1,
            None => {
                table.counts.push(MarketCount {
                    name: name.to_string(),
                    count: 1,
                });
                table.index.insert(name.to_string(), table.counts.len() - 1);
            }
        }
    }
}

/// Rank entries by descending count. The sort is stable, so ties keep
/// their first-encountered order.
pub fn ranked(entries: &[IngredientEntry]) -> Vec<&IngredientEntry> {
    let mut sorted: Vec<&IngredientEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| std::cmp::Reverse(e.count));
    sorted
}

/// Rank per-market counts, same tie-break.
pub fn ranked_market(counts: &[MarketCount]) -> Vec<&MarketCount> {
    let mut sorted: Vec<&MarketCount> = counts.iter().collect();
    sorted.sort_by_key(|e| std::cmp::Reverse(e.count));
    sorted
}

pub fn run_aggregate(
    config: &Config,
    registry: &MarketRegistry,
    out: Option<PathBuf>,
) -> Result<Analysis> {
    let normalizer = IngredientNormalizer::new();
    let mut tables = Tables::default();
    let mut layers: BTreeMap<String, LayerTally> = BTreeMap::new();

    println!("aggregate");

    for adapter in registry.adapters() {
        let layer_root = config.corpus.root.join(adapter.id());
        if !layer_root.is_dir() {
            eprintln!("  warning: layer not found: {}", layer_root.display());
            continue;
        }

        let tally = layers.entry(adapter.id().to_string()).or_default();

        let mut sections = vec![adapter.ingredient_section()];
        if let Some(extra) = adapter.extra_ingredient_section() {
            sections.push(extra);
        }

        for path in corpus::walk_documents(&layer_root) {
            tally.total += 1;

            let doc = match corpus::read_document(&path) {
                DocRead::Document(doc) => doc,
                DocRead::ReviewFlagged => {
                    tally.review_skipped += 1;
                    continue;
                }
                DocRead::Unreadable(reason) => {
                    eprintln!("  warning: skipping {}: {}", path.display(), reason);
                    tally.unreadable += 1;
                    continue;
                }
            };

            let market = match doc.header_value("market") {
                "" => adapter.market().to_string(),
                m => m.to_string(),
            };
            let category = match doc.header_value("category") {
                "" => "other".to_string(),
                c => c.to_string(),
            };

            // Dedup within the document before counting.
            let mut mentions: Vec<String> = Vec::new();
            for section in &sections {
                let Some(text) = corpus::section_text(&doc.body, section) else {
                    continue;
                };
                for raw_mention in adapter.split_ingredients(section, &text) {
                    let Some(canonical) = normalizer.normalize(&raw_mention) else {
                        continue;
                    };
                    if !mentions.contains(&canonical) {
                        mentions.push(canonical);
                    }
                }
            }

            if mentions.is_empty() {
                continue;
            }
            tally.included += 1;
            for mention in &mentions {
                tables.add(mention, &market, &category);
            }
        }
    }

    let analysis = Analysis {
        generated_at: chrono::Utc::now().to_rfc3339(),
        layers,
        ingredients: tables.entries,
        markets: tables
            .markets
            .into_iter()
            .map(|(market, table)| (market, table.counts))
            .collect(),
    };

    let out_path = out.unwrap_or_else(|| config.report.output_dir.join("ingredient_analysis.json"));
    write_analysis(&analysis, &out_path)?;

    let total: u64 = analysis.layers.values().map(|t| t.total).sum();
    let included: u64 = analysis.layers.values().map(|t| t.included).sum();
    let review_skipped: u64 = analysis.layers.values().map(|t| t.review_skipped).sum();
    println!("  documents: {}", total);
    println!("  included: {}", included);
    println!("  review skipped: {}", review_skipped);
    println!("  unique ingredients: {}", analysis.ingredients.len());
    println!("  wrote: {}", out_path.display());

    let leaders = ranked(&analysis.ingredients);
    if !leaders.is_empty() {
        println!("  top ingredients:");
        for (rank, entry) in leaders.iter().take(20).enumerate() {
            println!(
                "    {:2}. {} — {} ({})",
                rank + 1,
                entry.name,
                entry.count,
                entry.markets.join(", ")
            );
        }
    }
    println!("ok");

    Ok(analysis)
}

fn write_analysis(analysis: &Analysis, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    let json = serde_json::to_string_pretty(analysis)?;
    std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// Load a previously written analysis artifact.
pub fn load_analysis(path: &Path) -> Result<Analysis> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}
