//! Japan — Foods for Specified Health Uses (特定保健用食品, FOSHU).
//!
//! The FOSHU approval list is the older of the two Japanese registries and
//! comes pre-normalized to English keys. Records without an approval
//! number fall back to their serial number as identifier.

use serde_json::Value;

use crate::classify::{CategoryRules, FormRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Category, Disposition, ProductForm, ProductRecord};

use super::split_text_or_bullets;

const SOURCE_URL: &str =
    "https://www.caa.go.jp/policies/policy/food_labeling/foods_for_specified_health_uses/";

pub struct JpFoshu {
    fields: FieldMap,
    category_rules: CategoryRules,
    form_rules: FormRules,
}

impl JpFoshu {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "approval_no"),
            ("source_id_fallback", "serial_no"),
            ("product_name", "product_name"),
            ("brand", "applicant"),
            ("date_entered", "approval_date"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let category_rules = CategoryRules::new(
            MatchMode::Exact,
            &[
                (
                    &[
                        "Lactobacillus",
                        "ビフィズス菌",
                        "乳酸菌",
                        "Bifidobacterium",
                        "L.カゼイ",
                        "L.アシドフィルス",
                        "B.ブレーベ",
                        "B.ロンガム",
                        "ラクトバチルス",
                        "Streptococcus",
                    ],
                    Category::Probiotics,
                ),
                (
                    &["DHA", "EPA", "脂肪酸", "フィッシュオイル"],
                    Category::OmegaFattyAcids,
                ),
                (
                    &[
                        "茶カテキン",
                        "イソフラボン",
                        "植物ステロール",
                        "ポリフェノール",
                        "難消化性デキストリン",
                        "食物繊維",
                    ],
                    Category::Botanicals,
                ),
                (
                    &["ビタミン", "カルシウム", "鉄", "マグネシウム", "亜鉛"],
                    Category::VitaminsMinerals,
                ),
                (
                    &["ペプチド", "アミノ酸", "たんぱく質", "コラーゲン", "カゼイン"],
                    Category::ProteinAmino,
                ),
            ],
        );
        let form_rules = FormRules::new(
            MatchMode::Exact,
            &[
                (&["錠剤"], ProductForm::Tablet),
                (&["カプセル"], ProductForm::Capsule),
                (&["粉末", "顆粒"], ProductForm::Powder),
                (
                    &["飲料", "清涼飲料水", "はっ酵乳", "乳酸菌飲料", "豆乳"],
                    ProductForm::Liquid,
                ),
                (&["ゼリー"], ProductForm::Gummy),
            ],
        );
        Self {
            fields,
            category_rules,
            form_rules,
        }
    }
}

impl MarketAdapter for JpFoshu {
    fn id(&self) -> &'static str {
        "jp_foshu"
    }

    fn market(&self) -> &'static str {
        "jp"
    }

    fn description(&self) -> &'static str {
        "Japan Foods for Specified Health Uses approval list"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let mut source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            source_id = self.fields.str_field(raw, "source_id_fallback");
        }
        if source_id.is_empty() {
            return Disposition::Error("missing approval and serial number".to_string());
        }

        let applicant = self.fields.str_field(raw, "brand");
        let functional_ingredient = crate::market::scalar_string(raw.get("functional_ingredient"));
        let food_type = crate::market::scalar_string(raw.get("food_type"));

        let ingredients = if functional_ingredient.is_empty() {
            Vec::new()
        } else {
            vec![functional_ingredient.clone()]
        };

        Disposition::Record(Box::new(ProductRecord {
            source_url: SOURCE_URL.to_string(),
            product_name: self.fields.str_field(raw, "product_name"),
            manufacturer: applicant.clone(),
            brand: applicant,
            category: self.category_rules.classify(&functional_ingredient),
            product_form: self.form_rules.classify(&food_type),
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
            reasons.push("product name is empty".to_string());
        }
        if crate::market::scalar_string(raw.get("functional_ingredient")).is_empty() {
            reasons.push("functional ingredient is empty".to_string());
        }
        if self.fields.str_field(raw, "source_id").is_empty() {
            reasons.push("approval number is empty".to_string());
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let food_type = crate::market::scalar_string(raw.get("food_type"));
        let foshu_category = crate::market::scalar_string(raw.get("foshu_category"));
        let corporate_no = crate::market::scalar_string(raw.get("corporate_no"));
        let sales_record = crate::market::scalar_string(raw.get("sales_record"));

        let basic = format!(
            "- Applicant: {}\n- Food type: {}\n- Form: {}\n- Market: Japan\n- Approval no: {}\n- FOSHU category: {}\n- Corporate no: {}",
            record.brand,
            food_type,
            record.product_form,
            record.source_id,
            foshu_category,
            corporate_no,
        );

        let notes = if sales_record.is_empty() {
            String::new()
        } else {
            "Sales record: yes".to_string()
        };

        vec![
            Section::new("Basic Info", basic),
            Section::new(
                "Functional Ingredients",
                crate::market::scalar_string(raw.get("functional_ingredient")),
            ),
            Section::new(
                "Health Claims",
                crate::market::scalar_string(raw.get("health_claim")),
            ),
            Section::new(
                "Intake Precautions",
                crate::market::scalar_string(raw.get("precautions")),
            ),
            Section::new(
                "Daily Intake",
                crate::market::scalar_string(raw.get("daily_intake")),
            ),
            Section::new("Notes", notes),
        ]
    }

    fn ingredient_section(&self) -> &'static str {
        "Functional Ingredients"
    }

    fn split_ingredients(&self, _section: &str, text: &str) -> Vec<String> {
        split_text_or_bullets(text)
    }

    fn change_key(&self) -> String {
        self.fields.raw_key("date_entered").to_string()
    }

    fn id_key(&self) -> String {
        self.fields.raw_key("source_id").to_string()
    }
}
