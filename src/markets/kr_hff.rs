//! South Korea — Health Functional Foods registry (건강기능식품, HFF).
//!
//! The open-data API wraps each record in an `item` envelope. Ingredient
//! mentions live in two places: the main-function text lists them in
//! square brackets (`[비타민E]`), and the specification section lists them
//! behind circled-number markers (`② 비타민B1 : …`), mixed with assay rows
//! (heavy metals, microbial limits) that must not be counted as
//! ingredients.

use regex::Regex;
use serde_json::Value;

use crate::classify::{CategoryRules, FormRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Category, Disposition, ProductForm, ProductRecord};

const SOURCE_URL: &str = "https://www.data.go.kr/data/15056760/openapi.do";

/// Specification rows that are assay criteria, not ingredients.
const NON_INGREDIENT_SPEC_ROWS: &[&str] = &[
    "성상",
    "헥산",
    "납",
    "카드뮴",
    "수은",
    "비소",
    "대장균군",
    "붕해",
    "붕해시험",
    "세균수",
    "대장균",
    "황색포도상구균",
    "살모넬라",
    "아플라톡신",
];

pub struct KrHff {
    fields: FieldMap,
    category_rules: CategoryRules,
    form_rules: FormRules,
    bracketed: Regex,
    spec_marker: Regex,
}

impl KrHff {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "STTEMNT_NO"),
            ("product_name", "PRDUCT"),
            ("brand", "ENTRPS"),
            ("date_entered", "REGIST_DT"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let category_rules = CategoryRules::new(
            MatchMode::Exact,
            &[
                (
                    &["유산균", "프로바이오틱스", "비피더스"],
                    Category::Probiotics,
                ),
                (&["오메가", "EPA", "DHA", "지방산"], Category::OmegaFattyAcids),
                (
                    &["인삼", "홍삼", "녹차", "쏘팔메토", "식물"],
                    Category::Botanicals,
                ),
                (
                    &["비타민", "미네랄", "칼슘", "철", "아연", "마그네슘"],
                    Category::VitaminsMinerals,
                ),
                (&["단백질", "아미노산", "콜라겐"], Category::ProteinAmino),
                (&["운동", "체력", "근력", "스포츠"], Category::SportsFitness),
            ],
        );
        let form_rules = FormRules::new(
            MatchMode::Exact,
            &[
                (&["연질캡슐"], ProductForm::Softgel),
                (&["캡슐"], ProductForm::Capsule),
                (&["정제"], ProductForm::Tablet),
                (&["분말"], ProductForm::Powder),
                (&["액상", "액제"], ProductForm::Liquid),
                (&["젤리"], ProductForm::Gummy),
            ],
        );
        Self {
            fields,
            category_rules,
            form_rules,
            bracketed: Regex::new(r"\[([^\]]+)\]").expect("static"),
            spec_marker: Regex::new(r"[①②③④⑤⑥⑦⑧⑨⑩]\s*([^:：\s]+)\s*[:：]").expect("static"),
        }
    }

    /// Unwrap the API's `item` envelope; bare records pass through.
    fn item<'a>(raw: &'a Value) -> &'a Value {
        raw.get("item").unwrap_or(raw)
    }
}

impl MarketAdapter for KrHff {
    fn id(&self) -> &'static str {
        "kr_hff"
    }

    fn market(&self) -> &'static str {
        "kr"
    }

    fn description(&self) -> &'static str {
        "Korea MFDS Health Functional Foods statement registry"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let item = Self::item(raw);

        let source_id = self.fields.str_field(item, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing statement number".to_string());
        }

        let company = self.fields.str_field(item, "brand");
        let main_function = crate::market::scalar_string(item.get("MAIN_FNCTN"));
        let appearance = crate::market::scalar_string(item.get("SUNGSANG"));

        let ingredients = self
            .bracketed
            .captures_iter(&main_function)
            .map(|cap| cap[1].trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        Disposition::Record(Box::new(ProductRecord {
            source_url: SOURCE_URL.to_string(),
            product_name: self.fields.str_field(item, "product_name"),
            manufacturer: company.clone(),
            brand: company,
            category: self.category_rules.classify(&main_function),
            product_form: self.form_rules.classify(&appearance),
            ingredients,
            date_entered: self.fields.str_field(item, "date_entered"),
            review_reasons: Vec::new(),
            fetched_at: ctx.fetched_at,
            source_id,
            layer: self.id().to_string(),
            market: self.market().to_string(),
        }))
    }

    fn review_reasons(&self, raw: &Value, record: &ProductRecord) -> Vec<String> {
        let item = Self::item(raw);
        let mut reasons = Vec::new();
        if record.product_name.is_empty() {
            reasons.push("product name is empty".to_string());
        }
        if crate::market::scalar_string(item.get("MAIN_FNCTN")).is_empty() {
            reasons.push("main function text is empty".to_string());
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let item = Self::item(raw);
        let appearance = crate::market::scalar_string(item.get("SUNGSANG"));
        let shelf_life = crate::market::scalar_string(item.get("DISTB_PD"));

        let basic = format!(
            "- Manufacturer: {}\n- Form: {}\n- Market: South Korea\n- Statement no: {}\n- Appearance: {}",
            record.brand, record.product_form, record.source_id, appearance,
        );

        let notes = if shelf_life.is_empty() {
            "(no shelf life information)".to_string()
        } else {
            format!("Shelf life: {}", shelf_life)
        };

        vec![
            Section::new("Basic Info", basic),
            Section::new(
                "Main Function",
                crate::market::scalar_string(item.get("MAIN_FNCTN")),
            ),
            Section::new("Usage", crate::market::scalar_string(item.get("SRV_USE"))),
            Section::new(
                "Precautions",
                crate::market::scalar_string(item.get("INTAKE_HINT1")),
            ),
            Section::new(
                "Specifications",
                crate::market::scalar_string(item.get("BASE_STANDARD")),
            ),
            Section::new("Notes", notes),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Main Function"
    }

    fn extra_ingredient_section(&self) -> Option<&'static str> {
        Some("Specifications")
    }

    fn split_ingredients(&self, section: &str, text: &str) -> Vec<String> {
        match section {
            "Main Function" => self
                .bracketed
                .captures_iter(text)
                .map(|cap| cap[1].trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            "Specifications" => {
                let mut mentions: Vec<String> = Vec::new();
                for cap in self.spec_marker.captures_iter(text) {
                    let token = cap[1].trim();
                    if token.is_empty() || NON_INGREDIENT_SPEC_ROWS.contains(&token) {
                        continue;
                    }
                    if !mentions.iter().any(|m| m == token) {
                        mentions.push(token.to_string());
                    }
                }
                mentions
            }
            _ => Vec::new(),
        }
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
            "item": {
                "STTEMNT_NO": "2004-12",
                "PRDUCT": "비타민C 1000",
                "ENTRPS": "한국건강",
                "REGIST_DT": "20040301",
                "SUNGSANG": "흰색의 정제",
                "MAIN_FNCTN": "[비타민C] 항산화 작용",
                "SRV_USE": "1일 1회 1정",
                "BASE_STANDARD": "① 성상 : 고유의 색택\n② 비타민C : 표시량의 80~150%\n③ 납 : 1.0 mg/kg 이하"
            }
        })
    }

    #[test]
    fn unwraps_item_envelope() {
        let adapter = KrHff::new(None);
        let Disposition::Record(record) = adapter.map_fields(&sample(), &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.source_id, "2004-12");
        assert_eq!(record.product_name, "비타민C 1000");
        assert_eq!(record.category, Category::VitaminsMinerals);
        assert_eq!(record.product_form, ProductForm::Tablet);
        assert_eq!(record.ingredients, vec!["비타민C"]);
    }

    #[test]
    fn bare_record_without_envelope() {
        let adapter = KrHff::new(None);
        let raw = json!({"STTEMNT_NO": "9", "PRDUCT": "테스트", "MAIN_FNCTN": "유산균 증식"});
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.category, Category::Probiotics);
    }

    #[test]
    fn softgel_beats_capsule_substring() {
        let adapter = KrHff::new(None);
        let mut raw = sample();
        raw["item"]["SUNGSANG"] = json!("투명한 연질캡슐");
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        assert_eq!(record.product_form, ProductForm::Softgel);
    }

    #[test]
    fn bracketed_mentions_from_main_function() {
        let adapter = KrHff::new(None);
        let mentions =
            adapter.split_ingredients("Main Function", "[비타민E] 항산화 [유산균] 장 건강");
        assert_eq!(mentions, vec!["비타민E", "유산균"]);
    }

    #[test]
    fn spec_markers_skip_assay_rows() {
        let adapter = KrHff::new(None);
        let text = "① 성상 : 고유의 색택\n② 비타민B1 : 표시량의 80~150%\n③ 납 : 1.0 mg/kg 이하\n④ 비타민B1 : 중복";
        let mentions = adapter.split_ingredients("Specifications", text);
        assert_eq!(mentions, vec!["비타민B1"]);
    }

    #[test]
    fn review_flags_empty_main_function() {
        let adapter = KrHff::new(None);
        let raw = json!({"item": {"STTEMNT_NO": "1", "PRDUCT": ""}});
        let Disposition::Record(record) = adapter.map_fields(&raw, &ctx()) else {
            panic!("expected record");
        };
        let reasons = adapter.review_reasons(&raw, &record);
        assert_eq!(
            reasons,
            vec!["product name is empty", "main function text is empty"]
        );
    }
}
