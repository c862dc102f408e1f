//! Core data models used throughout Ingredient Radar.
//!
//! These types represent the canonical product records, classification
//! enumerations, and per-record dispositions that flow through the
//! extraction and aggregation pipeline.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Coarse product category. Closed set: every record carries exactly one
/// value, defaulting to [`Category::Other`] when nothing can be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    VitaminsMinerals,
    Botanicals,
    ProteinAmino,
    Probiotics,
    OmegaFattyAcids,
    Specialty,
    SportsFitness,
    Other,
}

impl Category {
    /// The closed set, in canonical order.
    pub const ALL: [Category; 8] = [
        Category::VitaminsMinerals,
        Category::Botanicals,
        Category::ProteinAmino,
        Category::Probiotics,
        Category::OmegaFattyAcids,
        Category::Specialty,
        Category::SportsFitness,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VitaminsMinerals => "vitamins_minerals",
            Category::Botanicals => "botanicals",
            Category::ProteinAmino => "protein_amino",
            Category::Probiotics => "probiotics",
            Category::OmegaFattyAcids => "omega_fatty_acids",
            Category::Specialty => "specialty",
            Category::SportsFitness => "sports_fitness",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vitamins_minerals" => Some(Category::VitaminsMinerals),
            "botanicals" => Some(Category::Botanicals),
            "protein_amino" => Some(Category::ProteinAmino),
            "probiotics" => Some(Category::Probiotics),
            "omega_fatty_acids" => Some(Category::OmegaFattyAcids),
            "specialty" => Some(Category::Specialty),
            "sports_fitness" => Some(Category::SportsFitness),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid category: {}", s))
    }
}

/// Physical product form. Closed set, defaulting to [`ProductForm::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductForm {
    Tablet,
    Capsule,
    Softgel,
    Powder,
    Liquid,
    Gummy,
    Other,
}

impl ProductForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductForm::Tablet => "tablet",
            ProductForm::Capsule => "capsule",
            ProductForm::Softgel => "softgel",
            ProductForm::Powder => "powder",
            ProductForm::Liquid => "liquid",
            ProductForm::Gummy => "gummy",
            ProductForm::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tablet" => Some(ProductForm::Tablet),
            "capsule" => Some(ProductForm::Capsule),
            "softgel" => Some(ProductForm::Softgel),
            "powder" => Some(ProductForm::Powder),
            "liquid" => Some(ProductForm::Liquid),
            "gummy" => Some(ProductForm::Gummy),
            "other" => Some(ProductForm::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical product record produced by a market adapter.
///
/// All string fields are present but possibly empty; `category` and
/// `product_form` are always populated so downstream consumers never
/// handle a missing classification.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    /// Stable identifier from the upstream registry, unique per layer.
    pub source_id: String,
    /// Source layer id (e.g. `"us_dsld"`).
    pub layer: String,
    /// Market tag (e.g. `"us"`, `"jp"`).
    pub market: String,
    /// Registry detail URL for this record.
    pub source_url: String,
    pub product_name: String,
    pub brand: String,
    pub manufacturer: String,
    pub category: Category,
    pub product_form: ProductForm,
    /// Raw ingredient mentions in source order; duplicates permitted here.
    pub ingredients: Vec<String>,
    /// Free-text date from the source; format varies per registry.
    pub date_entered: String,
    /// Review-gate reasons. Non-empty means the rendered document carries
    /// the `[REVIEW_NEEDED]` sentinel.
    pub review_reasons: Vec<String>,
    /// Processing time, not the original registry entry time.
    pub fetched_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn review_flagged(&self) -> bool {
        !self.review_reasons.is_empty()
    }
}

/// Outcome of mapping one raw source line.
///
/// Per-record problems are data, not exceptions: a record that cannot be
/// processed is reported as a skip or error disposition and the run
/// continues.
#[derive(Debug)]
pub enum Disposition {
    /// A canonical record ready for rendering.
    Record(Box<ProductRecord>),
    /// Filtered out by the adapter (e.g. a non-primary product name).
    /// Counted separately from errors.
    Skip(String),
    /// Unusable record (e.g. missing primary identifier). Counted under
    /// the run's error tally.
    Error(String),
}

/// Write decision for one record against the existing-document index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No document existed; a new one was created.
    New,
    /// Document existed and the run is in default mode; nothing written.
    ExistingSkip,
    /// Document existed and the run is in force/delta mode; replaced whole.
    ExistingOverwrite,
}

/// Per-run counters, printed as the end-of-run summary.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Input lines seen, including blank ones.
    pub total: u64,
    /// Records skipped because the document already existed.
    pub skipped: u64,
    /// Records filtered out by the adapter before mapping.
    pub filtered: u64,
    /// New documents written.
    pub extracted: u64,
    /// Existing documents overwritten (force/delta mode).
    pub updated: u64,
    /// Written documents carrying the review sentinel.
    pub review_needed: u64,
    /// Malformed lines and records without a primary identifier.
    pub errors: u64,
    /// Written documents per category.
    pub by_category: BTreeMap<&'static str, u64>,
}

impl RunStats {
    pub fn record_written(&mut self, category: Category, overwrote: bool, flagged: bool) {
        if overwrote {
            self.updated += 1;
        } else {
            self.extracted += 1;
        }
        if flagged {
            self.review_needed += 1;
        }
        *self.by_category.entry(category.as_str()).or_insert(0) += 1;
    }
}
