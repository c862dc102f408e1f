//! United States — NIH Dietary Supplement Label Database (DSLD).
//!
//! DSLD is the one registry that ships a usable taxonomy: records carry a
//! LanguaL product-type code, so the category comes from a fixed code map
//! rather than the keyword classifier. Physical form is inferred from the
//! LanguaL physical-state description.

use serde_json::Value;

use crate::classify::{FormRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Category, Disposition, ProductForm, ProductRecord};

use super::split_bullet_mentions;

/// LanguaL product-type code → category.
const CATEGORY_CODES: &[(&str, Category)] = &[
    ("A1299", Category::VitaminsMinerals), // Mineral
    ("A1302", Category::VitaminsMinerals), // Vitamin
    ("A1305", Category::ProteinAmino),     // Amino acid/Protein
    ("A1306", Category::Botanicals),       // Botanical
    ("A1309", Category::Other),            // Non-Nutrient/Non-Botanical
    ("A1310", Category::OmegaFattyAcids),  // Fat/Fatty Acid
    ("A1315", Category::VitaminsMinerals), // Multi-Vitamin and Mineral
    ("A1317", Category::Botanicals),       // Botanical with Nutrients
    ("A1325", Category::Specialty),        // Other Combinations
    ("A1326", Category::Other),            // Fiber and Other Nutrients
];

/// Ingredient keywords that suggest a record classified `other` actually
/// belongs somewhere specific (review rule, not classification).
const CATEGORY_HINTS: &[(&str, &[&str])] = &[
    ("vitamins_minerals", &["vitamin", "mineral", "calcium", "iron", "zinc"]),
    ("botanicals", &["botanical", "herbal", "plant", "extract"]),
    ("protein_amino", &["protein", "amino", "collagen", "whey"]),
    ("probiotics", &["probiotic", "lactobacillus", "bifidobacterium"]),
    ("omega_fatty_acids", &["omega", "fish oil", "dha", "epa", "fatty acid"]),
];

pub struct UsDsld {
    fields: FieldMap,
    form_rules: FormRules,
}

impl UsDsld {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "dsld_id"),
            ("product_name", "fullName"),
            ("brand", "brandName"),
            ("date_entered", "entryDate"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let form_rules = FormRules::new(
            MatchMode::CaseInsensitive,
            &[
                (&["tablet", "pill"], ProductForm::Tablet),
                (&["capsule"], ProductForm::Capsule),
                (&["softgel"], ProductForm::Softgel),
                (&["powder"], ProductForm::Powder),
                (&["liquid"], ProductForm::Liquid),
                (&["gummy"], ProductForm::Gummy),
            ],
        );
        Self { fields, form_rules }
    }

    fn category(&self, raw: &Value) -> Category {
        let code = langual_field(raw.get("productType"), "langualCode");
        CATEGORY_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, cat)| *cat)
            .unwrap_or(Category::Other)
    }

    fn form(&self, raw: &Value) -> ProductForm {
        let desc = langual_field(raw.get("physicalState"), "langualCodeDescription");
        self.form_rules.classify(&desc)
    }

    fn ingredient_text(raw: &Value) -> String {
        ingredient_entries(raw)
            .iter()
            .map(|ing| {
                format!(
                    "{} {}",
                    text(ing, "ingredientGroup"),
                    text(ing, "name")
                )
                .to_lowercase()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// LanguaL annotations arrive as either an object or a one-element list.
fn langual_field(value: Option<&Value>, key: &str) -> String {
    match value {
        Some(Value::Object(map)) => map
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        Some(Value::Array(items)) => items
            .first()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        _ => String::new(),
    }
}

fn ingredient_entries(raw: &Value) -> Vec<&Value> {
    raw.get("allIngredients")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|i| i.is_object()).collect())
        .unwrap_or_default()
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

impl MarketAdapter for UsDsld {
    fn id(&self) -> &'static str {
        "us_dsld"
    }

    fn market(&self) -> &'static str {
        "us"
    }

    fn description(&self) -> &'static str {
        "NIH Dietary Supplement Label Database (United States)"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing dsld_id".to_string());
        }

        let brand = self.fields.str_field(raw, "brand");
        let ingredients = ingredient_entries(raw)
            .iter()
            .map(|ing| text(ing, "name"))
            .filter(|name| !name.is_empty())
            .collect();

        Disposition::Record(Box::new(ProductRecord {
            source_url: format!("https://dsld.od.nih.gov/label/{}", source_id),
            product_name: self.fields.str_field(raw, "product_name"),
            manufacturer: brand.clone(),
            brand,
            category: self.category(raw),
            product_form: self.form(raw),
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
        if raw.get("productType").map(Value::is_null).unwrap_or(true) {
            reasons.push("productType is null".to_string());
        }
        if record.product_name.is_empty() {
            reasons.push("product name is empty".to_string());
        }
        let empty_list = raw
            .get("allIngredients")
            .and_then(Value::as_array)
            .map(|a| a.is_empty())
            .unwrap_or(false);
        if empty_list {
            reasons.push("ingredient list is empty".to_string());
        }
        if record.category == Category::Other {
            let ing_text = Self::ingredient_text(raw);
            if !ing_text.is_empty()
                && CATEGORY_HINTS
                    .iter()
                    .any(|(_, hints)| hints.iter().any(|h| ing_text.contains(h)))
            {
                reasons
                    .push("category is 'other' but ingredients suggest a specific category".to_string());
            }
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let market_status = if raw.get("offMarket").and_then(Value::as_i64).unwrap_or(0) != 0 {
            "Off Market"
        } else {
            "On Market"
        };

        let net_contents = raw
            .get("netContents")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|nc| text(nc, "display"))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        let basic = format!(
            "- Brand: {}\n- Form: {}\n- Market: United States\n- Market status: {}\n- Net contents: {}",
            record.brand,
            record.product_form,
            market_status,
            if net_contents.is_empty() { "N/A" } else { &net_contents },
        );

        let ingredients = ingredient_entries(raw)
            .iter()
            .filter_map(|ing| {
                let name = text(ing, "name");
                if name.is_empty() {
                    return None;
                }
                let mut line = format!("- {}", name);
                let group = text(ing, "ingredientGroup");
                if !group.is_empty() {
                    line.push_str(&format!("（{}）", group));
                }
                let notes = text(ing, "notes");
                if !notes.is_empty() {
                    line.push_str(&format!(" — {}", notes));
                }
                Some(line)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let claims = raw
            .get("claims")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|c| {
                        let desc = text(c, "langualCodeDescription");
                        if desc.is_empty() {
                            format!("- {}", c)
                        } else {
                            format!("- {}", desc)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let notes = if record.review_flagged() {
            format!("REVIEW: {}", record.review_reasons.join(", "))
        } else {
            "(no special notes)".to_string()
        };

        vec![
            Section::new("Basic Info", basic),
            Section::new("Ingredients", ingredients),
            Section::new("Claims", claims),
            Section::new("Notes", notes),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Ingredients"
    }

    fn split_ingredients(&self, _section: &str, text: &str) -> Vec<String> {
        split_bullet_mentions(text)
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
    use chrono::Utc;
    use serde_json::json;

    fn ctx() -> MapContext<'static> {
        MapContext {
            ingredients: None,
            fetched_at: Utc::now(),
        }
    }

    fn sample() -> Value {
        json!({
            "dsld_id": 112233,
            "fullName": "Daily Multi",
            "brandName": "Acme",
            "entryDate": "2024-05-01",
            "offMarket": 0,
            "productType": {"langualCode": "A1315"},
            "physicalState": {"langualCodeDescription": "Tablet or Pill"},
            "netContents": [{"display": "60 tablets"}],
            "claims": [{"langualCodeDescription": "Immune support"}],
            "allIngredients": [
                {"name": "Vitamin C", "ingredientGroup": "Vitamins", "notes": "as ascorbic acid"},
                {"name": "Zinc", "ingredientGroup": "Minerals"}
            ]
        })
    }

    #[test]
    fn maps_canonical_fields() {
        let adapter = UsDsld::new(None);
        let Disposition::Record(record) = adapter.map_fields(&sample(), &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.source_id, "112233");
        assert_eq!(record.product_name, "Daily Multi");
        assert_eq!(record.brand, "Acme");
        assert_eq!(record.category, Category::VitaminsMinerals);
        assert_eq!(record.product_form, ProductForm::Tablet);
        assert_eq!(record.ingredients, vec!["Vitamin C", "Zinc"]);
        assert_eq!(record.source_url, "https://dsld.od.nih.gov/label/112233");
    }

    #[test]
    fn missing_id_is_error() {
        let adapter = UsDsld::new(None);
        let raw = json!({"fullName": "No Id"});
        assert!(matches!(
            adapter.map_fields(&raw, &ctx()),
            Disposition::Error(_)
        ));
    }

    #[test]
    fn langual_code_in_list_form() {
        let adapter = UsDsld::new(None);
        let mut raw = sample();
        raw["productType"] = json!([{"langualCode": "A1306"}]);
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.category, Category::Botanicals);
    }

    #[test]
    fn unknown_code_is_other() {
        let adapter = UsDsld::new(None);
        let mut raw = sample();
        raw["productType"] = json!({"langualCode": "A9999"});
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.category, Category::Other);
    }

    #[test]
    fn review_flags_null_product_type_and_hints() {
        let adapter = UsDsld::new(None);
        let raw = json!({
            "dsld_id": "9",
            "fullName": "",
            "productType": null,
            "allIngredients": [{"name": "Whey Protein Isolate", "ingredientGroup": "Protein"}]
        });
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        let reasons = adapter.review_reasons(&raw, &record);
        assert!(reasons.contains(&"productType is null".to_string()));
        assert!(reasons.contains(&"product name is empty".to_string()));
        assert!(reasons
            .iter()
            .any(|r| r.contains("suggest a specific category")));
    }

    #[test]
    fn sections_render_bullets() {
        let adapter = UsDsld::new(None);
        let raw = sample();
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        let sections = adapter.body_sections(&raw, &record, &ctx());
        let ingredients = &sections[1];
        assert_eq!(ingredients.title, "Ingredients");
        assert!(ingredients
            .text
            .contains("- Vitamin C（Vitamins） — as ascorbic acid"));
        assert!(ingredients.text.contains("- Zinc（Minerals）"));
    }

    #[test]
    fn split_recovers_mentions_from_rendered_section() {
        let adapter = UsDsld::new(None);
        let mentions = adapter.split_ingredients(
            "Ingredients",
            "- Vitamin C（Vitamins） — as ascorbic acid\n- Zinc（Minerals）",
        );
        assert_eq!(mentions, vec!["Vitamin C", "Zinc"]);
    }
}
