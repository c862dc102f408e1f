//! Taiwan — approved Health Food registry (健康食品).
//!
//! The TFDA consumer dataset uses Chinese column names. Category is
//! inferred from the approved health effect text, form from the product
//! name itself (the dataset has no dosage-form column), and ingredient
//! mentions are comma/newline-delimited free text.

use serde_json::Value;

use crate::classify::{CategoryRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Category, Disposition, ProductForm, ProductRecord};

use super::{compact_date_to_dashed, split_delimited};

const FALLBACK_URL: &str = "https://consumer.fda.gov.tw/Food/InfoHealthFood.aspx?nodeID=162";

pub struct TwHf {
    fields: FieldMap,
    category_rules: CategoryRules,
}

impl TwHf {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "許可證字號"),
            ("product_name", "中文品名"),
            ("brand", "申請商"),
            ("date_entered", "核可日期"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let category_rules = CategoryRules::new(
            MatchMode::Exact,
            &[
                (
                    &["胃腸", "益生菌", "腸道", "乳酸菌", "雙歧桿菌"],
                    Category::Probiotics,
                ),
                (
                    &["血脂", "調節血脂", "膽固醇", "魚油"],
                    Category::OmegaFattyAcids,
                ),
                (
                    &["骨質", "牙齒", "鈣質", "鈣", "鐵", "維生素"],
                    Category::VitaminsMinerals,
                ),
                (
                    &["護肝", "體脂肪", "茶多酚", "抗氧化", "輔助調節血壓"],
                    Category::Botanicals,
                ),
                (
                    &["免疫", "血糖", "抗疲勞", "調節免疫"],
                    Category::Specialty,
                ),
            ],
        );
        Self {
            fields,
            category_rules,
        }
    }

    /// Form from the Chinese product name.
    fn form(product_name: &str) -> ProductForm {
        if product_name.is_empty() {
            return ProductForm::Other;
        }
        if ["錠", "片"].iter().any(|kw| product_name.contains(kw)) {
            return ProductForm::Tablet;
        }
        if product_name.contains("膠囊") {
            return ProductForm::Capsule;
        }
        if ["粉", "顆粒"].iter().any(|kw| product_name.contains(kw)) {
            return ProductForm::Powder;
        }
        if ["飲", "飲料", "液", "乳", "發酵乳", "優酪乳"]
            .iter()
            .any(|kw| product_name.contains(kw))
        {
            return ProductForm::Liquid;
        }
        if ["軟糖", "果凍", "凝膠"]
            .iter()
            .any(|kw| product_name.contains(kw))
        {
            return ProductForm::Gummy;
        }
        ProductForm::Other
    }
}

impl MarketAdapter for TwHf {
    fn id(&self) -> &'static str {
        "tw_hf"
    }

    fn market(&self) -> &'static str {
        "tw"
    }

    fn description(&self) -> &'static str {
        "Taiwan FDA approved Health Food registry"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing licence number".to_string());
        }

        let product_name = self.fields.str_field(raw, "product_name");
        let company = self.fields.str_field(raw, "brand");
        let health_effect = crate::market::scalar_string(raw.get("保健功效"));
        let health_ingredient = crate::market::scalar_string(raw.get("保健功效相關成分"));
        let product_url = crate::market::scalar_string(raw.get("網址"));

        let ingredients = split_delimited(&health_ingredient);

        Disposition::Record(Box::new(ProductRecord {
            source_url: if product_url.is_empty() {
                FALLBACK_URL.to_string()
            } else {
                product_url
            },
            category: self.category_rules.classify(&health_effect),
            product_form: Self::form(&product_name),
            product_name,
            manufacturer: company.clone(),
            brand: company,
            ingredients,
            date_entered: compact_date_to_dashed(&self.fields.str_field(raw, "date_entered")),
            review_reasons: Vec::new(),
            fetched_at: ctx.fetched_at,
            source_id,
            layer: self.id().to_string(),
            market: self.market().to_string(),
        }))
    }

    fn review_reasons(&self, raw: &Value, record: &ProductRecord) -> Vec<String> {
        let mut reasons = Vec::new();
        if record.source_id.is_empty() {
            reasons.push("licence number is empty".to_string());
        }
        if record.product_name.is_empty() {
            reasons.push("product name is empty".to_string());
        }
        if crate::market::scalar_string(raw.get("保健功效")).is_empty() {
            reasons.push("health effect text is empty".to_string());
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let basic = format!(
            "- Applicant: {}\n- Form: {}\n- Market: Taiwan\n- Licence no: {}",
            record.brand, record.product_form, record.source_id,
        );

        vec![
            Section::new("Basic Info", basic),
            Section::new(
                "Health Effect Ingredients",
                crate::market::scalar_string(raw.get("保健功效相關成分")),
            ),
            Section::new(
                "Health Effects",
                crate::market::scalar_string(raw.get("保健功效")),
            ),
            Section::new(
                "Health Claims",
                crate::market::scalar_string(raw.get("保健功效宣稱")),
            ),
            Section::new("Warnings", crate::market::scalar_string(raw.get("警語"))),
            Section::new(
                "Precautions",
                crate::market::scalar_string(raw.get("注意事項")),
            ),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Health Effect Ingredients"
    }

    fn split_ingredients(&self, _section: &str, text: &str) -> Vec<String> {
        split_delimited(text)
    }

    fn change_key(&self) -> String {
        self.fields.raw_key("date_entered").to_string()
    }

    fn id_key(&self) -> String {
        self.fields.raw_key("source_id").to_string()
    }
}
