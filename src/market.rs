//! Market adapter trait and registry.
//!
//! Each national registry ("layer") differs in raw field names, languages,
//! classification keywords, review checklists, document sections, and
//! ingredient list syntax. One [`MarketAdapter`] implementation per layer
//! owns all of that, and a [`MarketRegistry`] keyed by layer id replaces
//! the central per-market conditional that would otherwise grow with every
//! new source.
//!
//! Raw→canonical field names are carried by a [`FieldMap`]: pure data,
//! overridable per market from the config file, so a registry renaming a
//! column is a config edit, not a code change.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::models::Disposition;

/// Canonical-field → raw-key table for one market.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn new(defaults: &[(&str, &str)]) -> Self {
        let entries = defaults
            .iter()
            .map(|(canonical, raw)| (canonical.to_string(), raw.to_string()))
            .collect();
        Self { entries }
    }

    /// Apply config overrides on top of the adapter defaults.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (canonical, raw) in overrides {
            self.entries.insert(canonical.clone(), raw.clone());
        }
        self
    }

    /// Raw key for a canonical field. Falls back to the canonical name
    /// itself when no mapping entry exists.
    pub fn raw_key<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.entries
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Fetch a canonical field from the raw record as a trimmed string.
    /// Absent, null, or non-scalar values become the empty string; the
    /// canonical record never carries missing fields.
    pub fn str_field(&self, raw: &Value, canonical: &str) -> String {
        scalar_string(raw.get(self.raw_key(canonical)))
    }
}

/// Coerce a raw JSON scalar into the canonical empty-string-for-missing
/// representation. Numbers are rendered as written (identifiers arrive as
/// numbers in some registries).
pub fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Supplementary ingredient dataset joined into an extraction run
/// (`--ingredients`), indexed by the adapter's join key.
#[derive(Debug, Default)]
pub struct IngredientIndex {
    by_id: HashMap<String, Vec<Value>>,
}

impl IngredientIndex {
    pub fn insert(&mut self, id: String, record: Value) {
        self.by_id.entry(id).or_default().push(record);
    }

    pub fn get(&self, id: &str) -> &[Value] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn products(&self) -> usize {
        self.by_id.len()
    }

    pub fn records(&self) -> usize {
        self.by_id.values().map(Vec::len).sum()
    }
}

/// Shared context handed to adapters during field mapping.
pub struct MapContext<'a> {
    /// Joined supplementary ingredient data, when the run provided one.
    pub ingredients: Option<&'a IngredientIndex>,
    /// Run timestamp, stamped on every record of the run.
    pub fetched_at: DateTime<Utc>,
}

/// One named body section of a rendered document.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: &'static str,
    pub text: String,
}

impl Section {
    pub fn new(title: &'static str, text: impl Into<String>) -> Self {
        Self {
            title,
            text: text.into(),
        }
    }
}

/// A national registry source.
///
/// Implementations are pure: all lookup tables are built once at
/// construction and never mutated.
pub trait MarketAdapter {
    /// Layer id, used as corpus directory name and `source_layer` header
    /// value (e.g. `"us_dsld"`).
    fn id(&self) -> &'static str;

    /// Market tag for aggregation (e.g. `"us"`; both Japanese registries
    /// share `"jp"`).
    fn market(&self) -> &'static str;

    /// One-line description for `radar markets`.
    fn description(&self) -> &'static str;

    /// Map one raw record to a canonical record, or report why it was
    /// skipped or unusable. Only a missing primary identifier is an
    /// error; missing optional fields become empty strings.
    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition;

    /// The market's fixed advisory review checklist. Reasons are ordered
    /// and human-readable; a non-empty result flags, never rejects.
    fn review_reasons(&self, raw: &Value, record: &crate::models::ProductRecord) -> Vec<String>;

    /// The fixed, ordered body sections for this market's documents.
    fn body_sections(
        &self,
        raw: &Value,
        record: &crate::models::ProductRecord,
        ctx: &MapContext,
    ) -> Vec<Section>;

    /// Name of the section the aggregator reads ingredient mentions from.
    fn ingredient_section(&self) -> &'static str;

    /// Optional second ingredient-bearing section (the Korean registry
    /// lists ingredients in both its function and specification sections).
    fn extra_ingredient_section(&self) -> Option<&'static str> {
        None
    }

    /// Split one ingredient-bearing section's text into raw mentions,
    /// using this market's list syntax.
    fn split_ingredients(&self, section: &str, text: &str) -> Vec<String>;

    /// Raw key joining the `--ingredients` supplementary dataset to this
    /// market's records, when the market supports such a join.
    fn ingredient_join_key(&self) -> Option<String> {
        None
    }

    /// Raw key whose change marks a record as updated in snapshot diffs.
    /// Defaults to the mapped `date_entered` key.
    fn change_key(&self) -> String;

    /// The raw key carrying the primary identifier (for diffs).
    fn id_key(&self) -> String;
}

/// Registry of market adapters, keyed by layer id.
pub struct MarketRegistry {
    adapters: Vec<Box<dyn MarketAdapter>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry pre-loaded with every built-in adapter, with field-map
    /// overrides applied from the config.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mut registry = Self::new();
        for adapter in crate::markets::builtin_adapters(config) {
            registry.register(adapter);
        }
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn MarketAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn find(&self, id: &str) -> Option<&dyn MarketAdapter> {
        self.adapters
            .iter()
            .find(|a| a.id() == id)
            .map(|a| a.as_ref())
    }

    pub fn adapters(&self) -> &[Box<dyn MarketAdapter>] {
        &self.adapters
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
