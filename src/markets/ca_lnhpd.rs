//! Canada — Licensed Natural Health Products Database (LNHPD).
//!
//! LNHPD ships one row per product *name*, so alternate names are filtered
//! out before mapping to keep a product from landing in several category
//! directories. It is also the one market classified from the product name:
//! the product rows carry no ingredient or claim text, medicinal
//! ingredients live in a separate dataset joined via `--ingredients`.

use serde_json::Value;

use crate::classify::{CategoryRules, FormRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Category, Disposition, ProductForm, ProductRecord};

use super::split_bullet_mentions;

const INGREDIENTS_PLACEHOLDER: &str =
    "Ingredient data requires a separate retrieval (see the MedicinalIngredient API)";

const SUPPLEMENT_NAME_HINTS: &[&str] = &[
    "supplement",
    "health",
    "natural",
    "wellness",
    "nutraceutical",
    "dietary",
];

pub struct CaLnhpd {
    fields: FieldMap,
    category_rules: CategoryRules,
    form_rules: FormRules,
}

impl CaLnhpd {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "lnhpd_id"),
            ("product_name", "product_name"),
            ("brand", "company_name"),
            ("date_entered", "licence_date"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let category_rules = CategoryRules::new(
            MatchMode::CaseInsensitive,
            &[
                (
                    &["probiotic", "lactobacillus", "bifidobacterium"],
                    Category::Probiotics,
                ),
                (
                    &["omega", "fish oil", "dha", "epa", "flax"],
                    Category::OmegaFattyAcids,
                ),
                (
                    &["herbal", "herb", "botanical", "ginseng", "echinacea", "turmeric", "st. john"],
                    Category::Botanicals,
                ),
                (
                    &[
                        "vitamin",
                        "vit",
                        "multi-vitamin",
                        "multivitamin",
                        "mineral",
                        "calcium",
                        "iron",
                        "zinc",
                        "magnesium",
                        "selenium",
                    ],
                    Category::VitaminsMinerals,
                ),
                (
                    &["protein", "amino", "collagen", "bcaa", "whey"],
                    Category::ProteinAmino,
                ),
                (
                    &["sport", "creatine", "electrolyte", "pre-workout"],
                    Category::SportsFitness,
                ),
            ],
        );
        let form_rules = FormRules::new(
            MatchMode::CaseInsensitive,
            &[
                (&["tablet"], ProductForm::Tablet),
                (&["capsule"], ProductForm::Capsule),
                (&["softgel"], ProductForm::Softgel),
                (&["powder"], ProductForm::Powder),
                (&["liquid"], ProductForm::Liquid),
                (&["gummy"], ProductForm::Gummy),
                (&["cream", "ointment", "lotion"], ProductForm::Other),
            ],
        );
        Self {
            fields,
            category_rules,
            form_rules,
        }
    }

    fn joined_ingredient_lines(&self, joined: &[Value]) -> Vec<String> {
        joined
            .iter()
            .filter_map(|ing| {
                let name = crate::market::scalar_string(ing.get("ingredient_name"));
                if name.is_empty() {
                    return None;
                }
                let amount = match ing.get("potency_amount") {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.trim().to_string(),
                    _ => String::new(),
                };
                let unit = crate::market::scalar_string(ing.get("potency_unit_of_measure"));
                let source = crate::market::scalar_string(ing.get("source_material"));

                let dosage = match (amount.is_empty(), unit.is_empty()) {
                    (false, false) => format!("{} {}", amount, unit),
                    (false, true) => amount,
                    _ => String::new(),
                };
                let source_note = if !source.is_empty() && source.to_lowercase() != name.to_lowercase()
                {
                    format!("（{}）", source)
                } else {
                    String::new()
                };

                Some(if dosage.is_empty() {
                    format!("- {}{}", name, source_note)
                } else {
                    format!("- {}: {}{}", name, dosage, source_note)
                })
            })
            .collect()
    }
}

impl MarketAdapter for CaLnhpd {
    fn id(&self) -> &'static str {
        "ca_lnhpd"
    }

    fn market(&self) -> &'static str {
        "ca"
    }

    fn description(&self) -> &'static str {
        "Health Canada Licensed Natural Health Products Database"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        // One product licence appears once per name variant; only the
        // primary name row becomes a document.
        if raw.get("flag_primary_name").and_then(Value::as_i64) != Some(1) {
            return Disposition::Skip("non-primary name".to_string());
        }

        let source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing lnhpd_id".to_string());
        }

        let product_name = self.fields.str_field(raw, "product_name");
        let company = self.fields.str_field(raw, "brand");
        let licence_number = crate::market::scalar_string(raw.get("licence_number"));
        let dosage_form = crate::market::scalar_string(raw.get("dosage_form"));

        let source_url = if licence_number.is_empty() {
            String::new()
        } else {
            format!(
                "https://health-products.canada.ca/lnhpd-bdpsnh/info.do?licence={}&lang=en",
                licence_number
            )
        };

        let ingredients = ctx
            .ingredients
            .map(|index| {
                index
                    .get(&source_id)
                    .iter()
                    .map(|ing| crate::market::scalar_string(ing.get("ingredient_name")))
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Disposition::Record(Box::new(ProductRecord {
            category: self.category_rules.classify(&product_name),
            product_form: self.form_rules.classify(&dosage_form),
            manufacturer: company.clone(),
            brand: company,
            product_name,
            source_url,
            ingredients,
            date_entered: self.fields.str_field(raw, "date_entered"),
            review_reasons: Vec::new(),
            fetched_at: ctx.fetched_at,
            source_id,
            layer: self.id().to_string(),
            market: self.market().to_string(),
        }))
    }

    fn review_reasons(&self, raw: &Value, record: &ProductRecord) -> Vec<String> {
        let mut reasons = Vec::new();
        if record.product_name.is_empty() {
            reasons.push("missing product name".to_string());
        }
        if crate::market::scalar_string(raw.get("dosage_form")).is_empty() {
            reasons.push("missing dosage form".to_string());
        }
        if record.category == Category::Other && !record.product_name.is_empty() {
            let name = record.product_name.to_lowercase();
            if SUPPLEMENT_NAME_HINTS.iter().any(|kw| name.contains(kw)) {
                reasons.push(
                    "category inferred as 'other' but the product name suggests a supplement"
                        .to_string(),
                );
            }
        }
        if raw.get("flag_product_status").is_none() {
            reasons.push("missing product status flag".to_string());
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, ctx: &MapContext) -> Vec<Section> {
        let dosage_form = crate::market::scalar_string(raw.get("dosage_form"));
        let licence_number = crate::market::scalar_string(raw.get("licence_number"));
        let status = match raw.get("flag_product_status").and_then(Value::as_i64) {
            Some(1) => "Active",
            Some(0) => "Inactive",
            _ => "Unknown",
        };
        let submission = crate::market::scalar_string(raw.get("sub_submission_type_desc"));

        let basic = format!(
            "- Company: {}\n- Form: {} ({})\n- Market: Canada\n- NPN: {}\n- Licence status: {}\n- Licence date: {}\n- Submission type: {}",
            record.brand,
            record.product_form,
            dosage_form,
            licence_number,
            status,
            record.date_entered,
            submission,
        );

        // The section keeps dosage and source annotations that the
        // canonical mention list drops.
        let ingredient_lines = ctx
            .ingredients
            .map(|index| self.joined_ingredient_lines(index.get(&record.source_id)))
            .unwrap_or_default();
        let ingredients = if ingredient_lines.is_empty() {
            INGREDIENTS_PLACEHOLDER.to_string()
        } else {
            ingredient_lines.join("\n")
        };

        let claims = if record.source_url.is_empty() {
            String::new()
        } else {
            format!("See the [Health Canada product page]({})", record.source_url)
        };

        vec![
            Section::new("Basic Info", basic),
            Section::new("Ingredients", ingredients),
            Section::new("Claims", claims),
            Section::new(
                "Notes",
                "- LNHPD has no separate brand field; the company name doubles as brand\n- Category inferred from product name keywords",
            ),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Ingredients"
    }

    fn split_ingredients(&self, _section: &str, text: &str) -> Vec<String> {
        split_bullet_mentions(text)
    }

    fn ingredient_join_key(&self) -> Option<String> {
        Some(self.fields.raw_key("source_id").to_string())
    }

    fn change_key(&self) -> String {
        self.fields.raw_key("date_entered").to_string()
    }

    fn id_key(&self) -> String {
        self.fields.raw_key("source_id").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::IngredientIndex;
    use chrono::Utc;
    use serde_json::json;

    fn ctx<'a>(index: Option<&'a IngredientIndex>) -> MapContext<'a> {
        MapContext {
            ingredients: index,
            fetched_at: Utc::now(),
        }
    }

    fn sample() -> Value {
        json!({
            "lnhpd_id": 4242,
            "flag_primary_name": 1,
            "product_name": "Super Vitamin D Drops",
            "company_name": "Northern Health Inc.",
            "dosage_form": "Liquid",
            "licence_number": "80001234",
            "licence_date": "2020-06-15",
            "flag_product_status": 1,
            "sub_submission_type_desc": "Compendial"
        })
    }

    #[test]
    fn non_primary_name_is_filtered() {
        let adapter = CaLnhpd::new(None);
        let mut raw = sample();
        raw["flag_primary_name"] = json!(2);
        assert!(matches!(
            adapter.map_fields(&raw, &ctx(None)),
            Disposition::Skip(_)
        ));
    }

    #[test]
    fn maps_and_classifies_from_product_name() {
        let adapter = CaLnhpd::new(None);
        let Disposition::Record(record) = adapter.map_fields(&sample(), &ctx(None)) else {
            panic!("expected record");
        };
        assert_eq!(record.source_id, "4242");
        assert_eq!(record.category, Category::VitaminsMinerals);
        assert_eq!(record.product_form, ProductForm::Liquid);
        assert!(record.source_url.contains("licence=80001234"));
    }

    #[test]
    fn name_spanning_two_categories_is_specialty() {
        let adapter = CaLnhpd::new(None);
        let mut raw = sample();
        raw["product_name"] = json!("Vitamin C + Probiotic Complex");
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx(None)) else {
            panic!("expected record");
        };
        assert_eq!(record.category, Category::Specialty);
    }

    #[test]
    fn joined_ingredients_fill_mentions() {
        let adapter = CaLnhpd::new(None);
        let mut index = IngredientIndex::default();
        index.insert(
            "4242".to_string(),
            json!({"ingredient_name": "Vitamin D3", "potency_amount": 1000, "potency_unit_of_measure": "IU"}),
        );
        index.insert("4242".to_string(), json!({"ingredient_name": "Zinc"}));
        let Disposition::Record(record) = adapter.map_fields(&sample(), &ctx(Some(&index))) else {
            panic!("expected record");
        };
        assert_eq!(record.ingredients, vec!["Vitamin D3", "Zinc"]);
    }

    #[test]
    fn joined_lines_carry_dosage_and_source() {
        let adapter = CaLnhpd::new(None);
        let lines = adapter.joined_ingredient_lines(&[
            json!({"ingredient_name": "Vitamin D3", "potency_amount": 1000, "potency_unit_of_measure": "IU"}),
            json!({"ingredient_name": "Echinacea", "source_material": "Echinacea purpurea"}),
        ]);
        assert_eq!(lines[0], "- Vitamin D3: 1000 IU");
        assert_eq!(lines[1], "- Echinacea（Echinacea purpurea）");
    }

    #[test]
    fn review_checklist() {
        let adapter = CaLnhpd::new(None);
        let raw = json!({
            "lnhpd_id": 7,
            "flag_primary_name": 1,
            "product_name": "Daily Wellness Support"
        });
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx(None)) else {
            panic!("expected record");
        };
        let reasons = adapter.review_reasons(&raw, &record);
        assert!(reasons.contains(&"missing dosage form".to_string()));
        assert!(reasons.contains(&"missing product status flag".to_string()));
        assert!(reasons
            .iter()
            .any(|r| r.contains("suggests a supplement")));
    }
}
