//! The `radar markets` listing.
//!
//! Shows each registered market adapter with its corpus status: how many
//! documents have been extracted and whether raw extracts are waiting
//! under the layer's `raw/` directory. Useful for verifying configuration
//! before a run.

use crate::config::Config;
use crate::corpus;
use crate::market::MarketRegistry;

pub fn list_markets(config: &Config, registry: &MarketRegistry) {
    println!("Markets:\n");

    for adapter in registry.adapters() {
        let layer_root = config.corpus.root.join(adapter.id());

        let documents = if layer_root.is_dir() {
            corpus::walk_documents(&layer_root).len()
        } else {
            0
        };

        let raw_extracts = std::fs::read_dir(layer_root.join("raw"))
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| {
                        e.path()
                            .extension()
                            .map(|ext| ext == "jsonl")
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0);

        println!(
            "  {} ({}) — {}",
            adapter.id(),
            adapter.market(),
            adapter.description()
        );
        println!(
            "    documents: {}, raw extracts: {}",
            documents, raw_extracts
        );
    }

    println!("\nCorpus root: {}", config.corpus.root.display());
}
