//! Pipeline integration through a custom market adapter.
//!
//! Exercises the public extension seam: a minimal adapter registered on a
//! `MarketRegistry` flows through the same extract pipeline as the
//! built-in ones.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use ingredient_radar::classify::{CategoryRules, MatchMode};
use ingredient_radar::config::Config;
use ingredient_radar::extract::{run_extract, ExtractOptions};
use ingredient_radar::market::{FieldMap, MapContext, MarketAdapter, MarketRegistry, Section};
use ingredient_radar::models::{Category, Disposition, ProductForm, ProductRecord};
use ingredient_radar::progress::ProgressMode;

/// A bare-bones English-language market: `id` → source_id, `name` →
/// product_name, classification over an `ingredients_text` field.
struct TestMarket {
    fields: FieldMap,
    rules: CategoryRules,
}

impl TestMarket {
    fn new() -> Self {
        Self {
            fields: FieldMap::new(&[
                ("source_id", "id"),
                ("product_name", "name"),
                ("brand", "brand"),
                ("date_entered", "entered"),
            ]),
            rules: CategoryRules::new(
                MatchMode::CaseInsensitive,
                &[
                    (
                        &["probiotic", "lactobacillus", "bifidobacterium"],
                        Category::Probiotics,
                    ),
                    (
                        &["vitamin", "mineral", "calcium"],
                        Category::VitaminsMinerals,
                    ),
                    (&["omega", "fish oil"], Category::OmegaFattyAcids),
                ],
            ),
        }
    }

    fn mentions(text: &str) -> Vec<String> {
        text.split(" and ")
            .flat_map(|part| part.split(','))
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl MarketAdapter for TestMarket {
    fn id(&self) -> &'static str {
        "test_market"
    }

    fn market(&self) -> &'static str {
        "test"
    }

    fn description(&self) -> &'static str {
        "In-test market adapter"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing id".to_string());
        }
        let ingredients_text =
            ingredient_radar::market::scalar_string(raw.get("ingredients_text"));

        Disposition::Record(Box::new(ProductRecord {
            source_id,
            layer: self.id().to_string(),
            market: self.market().to_string(),
            source_url: String::new(),
            product_name: self.fields.str_field(raw, "product_name"),
            brand: self.fields.str_field(raw, "brand"),
            manufacturer: self.fields.str_field(raw, "brand"),
            category: self.rules.classify(&ingredients_text),
            product_form: ProductForm::Other,
            ingredients: Self::mentions(&ingredients_text),
            date_entered: self.fields.str_field(raw, "date_entered"),
            review_reasons: Vec::new(),
            fetched_at: ctx.fetched_at,
        }))
    }

    fn review_reasons(&self, raw: &Value, record: &ProductRecord) -> Vec<String> {
        let mut reasons = Vec::new();
        if record.product_name.is_empty() {
            reasons.push("missing product name".to_string());
        }
        if ingredient_radar::market::scalar_string(raw.get("ingredients_text")).is_empty() {
            reasons.push("ingredient list empty".to_string());
        }
        reasons
    }

    fn body_sections(&self, _raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let ingredients = record
            .ingredients
            .iter()
            .map(|m| format!("- {}", m))
            .collect::<Vec<_>>()
            .join("\n");
        vec![
            Section::new(
                "Basic Info",
                format!("- Brand: {}\n- Market: test", record.brand),
            ),
            Section::new("Ingredients", ingredients),
            Section::new("Notes", ""),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Ingredients"
    }

    fn split_ingredients(&self, _section: &str, text: &str) -> Vec<String> {
        text.lines()
            .filter_map(|l| l.trim().strip_prefix('-').map(|r| r.trim().to_string()))
            .filter(|m| !m.is_empty())
            .collect()
    }

    fn change_key(&self) -> String {
        "entered".to_string()
    }

    fn id_key(&self) -> String {
        "id".to_string()
    }
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::minimal();
    config.corpus.root = root.join("corpus");
    config.report.output_dir = root.join("reports");
    config
}

fn quiet_opts() -> ExtractOptions {
    ExtractOptions {
        progress: Some(ProgressMode::Off),
        ..Default::default()
    }
}

#[test]
fn multi_category_record_lands_in_specialty() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let input = tmp.path().join("input.jsonl");
    std::fs::write(
        &input,
        "{\"id\": \"ABC-1\", \"name\": \"Test Multi\", \"ingredients_text\": \"Vitamin C and Lactobacillus\"}\n",
    )
    .unwrap();

    let mut registry = MarketRegistry::new();
    registry.register(Box::new(TestMarket::new()));

    let stats = run_extract(&config, &registry, "test_market", Some(input), &quiet_opts()).unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.review_needed, 0);
    assert_eq!(stats.errors, 0);

    // "vitamin" and "lactobacillus" match rules from two categories, so
    // the record is specialty regardless of which matched first.
    let doc_path = tmp.path().join("corpus/test_market/specialty/ABC-1.md");
    let doc = std::fs::read_to_string(&doc_path).unwrap();

    assert!(!doc.starts_with("[REVIEW_NEEDED]"));
    assert!(doc.contains("category: \"specialty\""));
    assert!(doc.contains("## Ingredients\n- Vitamin C\n- Lactobacillus"));
}

#[test]
fn incomplete_record_is_flagged_not_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let input = tmp.path().join("input.jsonl");
    std::fs::write(&input, "{\"id\": \"NX-2\", \"name\": \"\"}\n").unwrap();

    let mut registry = MarketRegistry::new();
    registry.register(Box::new(TestMarket::new()));

    let stats = run_extract(&config, &registry, "test_market", Some(input), &quiet_opts()).unwrap();
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.review_needed, 1);

    let doc =
        std::fs::read_to_string(tmp.path().join("corpus/test_market/other/NX-2.md")).unwrap();
    assert!(doc.starts_with("[REVIEW_NEEDED]\n"));
    assert!(doc.contains("Reasons: missing product name, ingredient list empty"));
}

#[test]
fn config_overrides_remap_builtin_adapter_fields() {
    // A registry that renames its id column is handled by a field-map
    // override, with no adapter code involved.
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    let mut fields = BTreeMap::new();
    fields.insert("source_id".to_string(), "licence_id".to_string());
    config.markets.insert(
        "ca_lnhpd".to_string(),
        ingredient_radar::config::MarketConfig {
            fields,
            fetch: None,
        },
    );

    let input = tmp.path().join("ca.jsonl");
    std::fs::write(
        &input,
        "{\"licence_id\": 99, \"flag_primary_name\": 1, \"product_name\": \"Calcium Plus\", \"company_name\": \"North\", \"dosage_form\": \"Tablet\", \"flag_product_status\": 1}\n",
    )
    .unwrap();

    let registry = MarketRegistry::from_config(&config);
    let stats = run_extract(&config, &registry, "ca_lnhpd", Some(input), &quiet_opts()).unwrap();
    assert_eq!(stats.extracted, 1);
    assert!(tmp
        .path()
        .join("corpus/ca_lnhpd/vitamins_minerals/99.md")
        .exists());
}
