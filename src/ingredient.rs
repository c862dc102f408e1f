//! Ingredient mention normalization.
//!
//! Raw mentions arrive in English, Japanese, Korean, and Chinese, often
//! with dosage suffixes ("Vitamin C 500 mg") or parenthetical form notes.
//! Normalization strips that noise and folds the mention through a fixed
//! multilingual synonym table to one canonical name. Many raw tokens map
//! to one canonical ingredient; the table is data, not inference.
//!
//! Folding is idempotent: normalizing an already-canonical name (e.g.
//! `"Vitamin C"`) returns it unchanged.

use regex::Regex;

/// Synonym table: alias (lowercased where alphabetic) → canonical name.
///
/// Order matters for the substring fallback scan, so the table is a slice,
/// not a map: earlier entries win (e.g. `vitamin d3` before `vitamin d`).
const SYNONYMS: &[(&str, &str)] = &[
    // Vitamin D
    ("vitamin d3", "Vitamin D3"),
    ("cholecalciferol", "Vitamin D3"),
    ("コレカルシフェロール", "Vitamin D3"),
    ("vitamin d", "Vitamin D"),
    // Omega fatty acids
    ("dha", "DHA"),
    ("docosahexaenoic acid", "DHA"),
    ("epa", "EPA"),
    ("eicosapentaenoic acid", "EPA"),
    ("omega-3", "Omega-3"),
    ("オメガ3", "Omega-3"),
    ("오메가3", "Omega-3"),
    // Vitamin C
    ("vitamin c", "Vitamin C"),
    ("ビタミンc", "Vitamin C"),
    ("ascorbic acid", "Vitamin C"),
    ("비타민c", "Vitamin C"),
    ("維生素c", "Vitamin C"),
    // Probiotics
    ("bifidobacterium", "Bifidobacterium"),
    ("ビフィズス菌", "Bifidobacterium"),
    ("雙歧桿菌", "Bifidobacterium"),
    ("lactobacillus", "Lactobacillus"),
    ("乳酸菌", "Lactobacillus"),
    ("유산균", "Lactobacillus"),
    ("probiotic", "Probiotics"),
    ("프로바이오틱스", "Probiotics"),
    // Functional ingredients common in the Japanese registries
    ("gaba", "GABA"),
    ("γ-アミノ酪酸", "GABA"),
    ("γ-aminobutyric acid", "GABA"),
    ("lutein", "Lutein"),
    ("ルテイン", "Lutein"),
    ("indigestible dextrin", "Indigestible Dextrin"),
    ("難消化性デキストリン", "Indigestible Dextrin"),
    ("tea catechins", "Tea Catechins"),
    ("茶カテキン", "Tea Catechins"),
    ("茶多酚", "Tea Catechins"),
    ("isoflavone", "Isoflavone"),
    ("イソフラボン", "Isoflavone"),
    // Vitamins and minerals
    ("folic acid", "Folate"),
    ("folate", "Folate"),
    ("葉酸", "Folate"),
    ("엽산", "Folate"),
    ("collagen", "Collagen"),
    ("コラーゲン", "Collagen"),
    ("glucosamine", "Glucosamine"),
    ("グルコサミン", "Glucosamine"),
    ("calcium", "Calcium"),
    ("カルシウム", "Calcium"),
    ("칼슘", "Calcium"),
    ("vitamin e", "Vitamin E"),
    ("ビタミンe", "Vitamin E"),
    ("비타민e", "Vitamin E"),
    ("vitamin b12", "Vitamin B12"),
    ("ビタミンb12", "Vitamin B12"),
    ("비타민b12", "Vitamin B12"),
    ("vitamin b6", "Vitamin B6"),
    ("ビタミンb6", "Vitamin B6"),
    ("비타민b6", "Vitamin B6"),
    ("iron", "Iron"),
    ("鉄", "Iron"),
    ("철", "Iron"),
    ("zinc", "Zinc"),
    ("亜鉛", "Zinc"),
    ("아연", "Zinc"),
    ("magnesium", "Magnesium"),
    ("マグネシウム", "Magnesium"),
    ("마그네슘", "Magnesium"),
    ("coenzyme q10", "Coenzyme Q10"),
    ("コエンザイムq10", "Coenzyme Q10"),
    ("coq10", "Coenzyme Q10"),
    // Korean registry vocabulary
    ("비타민d", "Vitamin D"),
    ("비타민b1", "Vitamin B1"),
    ("비타민b2", "Vitamin B2"),
    ("비타민a", "Vitamin A"),
    ("비타민k", "Vitamin K"),
    ("판토텐산", "Pantothenic Acid"),
    ("나이아신", "Niacin"),
    ("비오틴", "Biotin"),
    ("홍삼", "Red Ginseng"),
    ("紅麴", "Red Yeast Rice"),
    ("실리마린", "Silymarin"),
    ("셀레늄", "Selenium"),
    ("망간", "Manganese"),
    ("요오드", "Iodine"),
    ("구리", "Copper"),
    ("크롬", "Chromium"),
];

/// Normalizer holding the compiled noise-stripping patterns.
pub struct IngredientNormalizer {
    dosage: Regex,
    form_note: Regex,
}

impl IngredientNormalizer {
    pub fn new() -> Self {
        Self {
            // "Vitamin C 500 mg (buffered)" → "Vitamin C"; everything from
            // the dosage number onward is noise.
            dosage: Regex::new(r"(?i)\d+\.?\d*\s*(mg|g|kg|mcg|ug|μg|iu|ml|l).*").expect("static"),
            form_note: Regex::new(r"(?i)\s*\([^)]*form[^)]*\)").expect("static"),
        }
    }

    /// Normalize one raw mention to its canonical name.
    ///
    /// Returns `None` when nothing remains after noise stripping.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let stripped = self.dosage.replace(raw, "");
        let stripped = self.form_note.replace(&stripped, "");
        let cleaned = stripped
            .trim()
            .trim_matches(|c| matches!(c, '(' | ')' | '（' | '）'))
            .trim();
        if cleaned.is_empty() {
            return None;
        }

        let lookup = cleaned.to_lowercase();

        for (alias, canonical) in SYNONYMS {
            if lookup == *alias {
                return Some((*canonical).to_string());
            }
        }
        for (alias, canonical) in SYNONYMS {
            if lookup.contains(alias) {
                return Some((*canonical).to_string());
            }
        }

        Some(title_case(cleaned))
    }
}

impl Default for IngredientNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Title-case an unmapped mention: uppercase each letter that follows a
/// non-alphabetic character, lowercase the rest. Non-alphabetic scripts
/// pass through unchanged.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
