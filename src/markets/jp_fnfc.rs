//! Japan — Foods with Function Claims (機能性表示食品, FNFC).
//!
//! The consumer-agency export uses Japanese column names verbatim; the
//! field map carries them so a renamed column is a config edit. Category
//! comes from the functional-ingredient name; form needs both the food
//! classification and the food name, because supplements and beverages are
//! split across those two columns.

use serde_json::Value;

use crate::classify::{CategoryRules, MatchMode};
use crate::market::{FieldMap, MapContext, MarketAdapter, Section};
use crate::models::{Disposition, ProductForm, ProductRecord};

use super::{slash_date_to_dashed, split_text_or_bullets};

pub struct JpFnfc {
    fields: FieldMap,
    category_rules: CategoryRules,
}

impl JpFnfc {
    pub fn new(overrides: Option<&std::collections::BTreeMap<String, String>>) -> Self {
        let mut fields = FieldMap::new(&[
            ("source_id", "届出番号"),
            ("product_name", "商品名"),
            ("brand", "法人名"),
            ("date_entered", "届出日"),
        ]);
        if let Some(overrides) = overrides {
            fields = fields.with_overrides(overrides);
        }
        let category_rules = CategoryRules::new(
            MatchMode::Exact,
            &[
                (
                    &["乳酸菌", "ビフィズス菌", "プロバイオティクス"],
                    crate::models::Category::Probiotics,
                ),
                (
                    &["DHA", "EPA", "オメガ", "n-3系脂肪酸"],
                    crate::models::Category::OmegaFattyAcids,
                ),
                (
                    &[
                        "ルテイン",
                        "イチョウ",
                        "ブルーベリー",
                        "クルクミン",
                        "茶カテキン",
                        "イソフラボン",
                        "GABA",
                        "難消化性デキストリン",
                        "食物繊維",
                        "ヒアルロン酸",
                    ],
                    crate::models::Category::Botanicals,
                ),
                (
                    &["ビタミン", "葉酸", "カルシウム", "鉄", "亜鉛", "マグネシウム"],
                    crate::models::Category::VitaminsMinerals,
                ),
                (
                    &["コラーゲン", "ペプチド", "アミノ酸", "HMB"],
                    crate::models::Category::ProteinAmino,
                ),
            ],
        );
        Self {
            fields,
            category_rules,
        }
    }

    /// Form from 食品の区分 plus 名称. Supplement-classified foods default
    /// to tablet; everything else is recognized by name keywords.
    fn form(&self, food_category: &str, food_name: &str) -> ProductForm {
        let combined = format!("{}{}", food_category, food_name);

        if food_category.contains("サプリメント") || food_category.contains("錠剤") {
            if combined.contains("カプセル") {
                return ProductForm::Capsule;
            }
            if combined.contains("錠") {
                return ProductForm::Tablet;
            }
            if combined.contains("粉末") || combined.contains("顆粒") {
                return ProductForm::Powder;
            }
            return ProductForm::Tablet;
        }

        if combined.contains("飲料") || combined.contains("ドリンク") {
            return ProductForm::Liquid;
        }
        if combined.contains("ゼリー") {
            return ProductForm::Gummy;
        }
        if combined.contains("粉末") || combined.contains("顆粒") {
            return ProductForm::Powder;
        }

        ProductForm::Other
    }
}

impl MarketAdapter for JpFnfc {
    fn id(&self) -> &'static str {
        "jp_fnfc"
    }

    fn market(&self) -> &'static str {
        "jp"
    }

    fn description(&self) -> &'static str {
        "Japan Foods with Function Claims notification database"
    }

    fn map_fields(&self, raw: &Value, ctx: &MapContext) -> Disposition {
        let source_id = self.fields.str_field(raw, "source_id");
        if source_id.is_empty() {
            return Disposition::Error("missing notification number".to_string());
        }

        let company = self.fields.str_field(raw, "brand");
        let functional_ingredient = crate::market::scalar_string(raw.get("機能性関与成分名"));
        let food_category = crate::market::scalar_string(raw.get("食品の区分"));
        let food_name = crate::market::scalar_string(raw.get("名称"));

        let ingredients = if functional_ingredient.is_empty() {
            Vec::new()
        } else {
            vec![functional_ingredient.clone()]
        };

        Disposition::Record(Box::new(ProductRecord {
            source_url: format!(
                "https://www.fld.caa.go.jp/caaks/cssc02/?recordSeq={}",
                source_id
            ),
            product_name: self.fields.str_field(raw, "product_name"),
            manufacturer: company.clone(),
            brand: company,
            category: self.category_rules.classify(&functional_ingredient),
            product_form: self.form(&food_category, &food_name),
            ingredients,
            date_entered: slash_date_to_dashed(&self.fields.str_field(raw, "date_entered")),
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
        if record.source_id.is_empty() {
            reasons.push("notification number is empty".to_string());
        }
        if crate::market::scalar_string(raw.get("機能性関与成分名")).is_empty() {
            reasons.push("functional ingredient is empty".to_string());
        }
        reasons
    }

    fn body_sections(&self, raw: &Value, record: &ProductRecord, _ctx: &MapContext) -> Vec<Section> {
        let food_category = crate::market::scalar_string(raw.get("食品の区分"));
        let withdrawal = slash_date_to_dashed(&crate::market::scalar_string(raw.get("撤回日")));

        let basic = format!(
            "- Notifier: {}\n- Food category: {}\n- Form: {}\n- Market: Japan\n- Notification no: {}",
            record.brand, food_category, record.product_form, record.source_id,
        );

        let notes = if withdrawal.is_empty() {
            "(no special notes)".to_string()
        } else {
            format!("Withdrawn ({})", withdrawal)
        };

        vec![
            Section::new("Basic Info", basic),
            Section::new(
                "Functional Ingredients",
                crate::market::scalar_string(raw.get("機能性関与成分名")),
            ),
            Section::new(
                "Functional Claims",
                crate::market::scalar_string(raw.get("表示しようとする機能性")),
            ),
            Section::new(
                "Intake Precautions",
                crate::market::scalar_string(raw.get("摂取をする上での注意事項")),
            ),
            Section::new(
                "Raw Materials",
                crate::market::scalar_string(raw.get("機能性関与成分を含む原材料名")),
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
