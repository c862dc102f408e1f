//! # Ingredient Radar
//!
//! A multi-market supplement registry pipeline: ingest line-delimited JSON
//! extracts from national registries, normalize them into canonical
//! markdown documents via per-market adapters, and aggregate ingredient
//! statistics into cross-market reports.
//!
//! The pipeline is a pair of independent batch flows over flat files:
//!
//! ```text
//! raw JSONL ─→ MarketAdapter ─→ classifier ─→ review gate ─→ renderer ─→ incremental writer
//!                                                                              │
//!                                                    document corpus  ←────────┘
//!                                                          │
//!                                 aggregator ─→ analysis JSON ─→ report renderer
//! ```
//!
//! Custom market adapters can be registered on a [`market::MarketRegistry`]
//! and run through the same pipeline as the built-in ones.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod diff;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ingredient;
pub mod market;
pub mod markets;
pub mod models;
pub mod progress;
pub mod render;
pub mod report;
pub mod sources;
pub mod writer;
