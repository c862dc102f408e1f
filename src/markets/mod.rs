//! Built-in market adapters, one per national registry, plus the list
//! splitting helpers they share.

pub mod ca_lnhpd;
pub mod jp_fnfc;
pub mod jp_foshu;
pub mod kr_hff;
pub mod tw_hf;
pub mod us_dsld;

use crate::config::Config;
use crate::market::MarketAdapter;

/// Every built-in adapter, with field-map overrides applied from config.
pub fn builtin_adapters(config: &Config) -> Vec<Box<dyn MarketAdapter>> {
    vec![
        Box::new(us_dsld::UsDsld::new(config.field_overrides("us_dsld"))),
        Box::new(ca_lnhpd::CaLnhpd::new(config.field_overrides("ca_lnhpd"))),
        Box::new(jp_fnfc::JpFnfc::new(config.field_overrides("jp_fnfc"))),
        Box::new(jp_foshu::JpFoshu::new(config.field_overrides("jp_foshu"))),
        Box::new(kr_hff::KrHff::new(config.field_overrides("kr_hff"))),
        Box::new(tw_hf::TwHf::new(config.field_overrides("tw_hf"))),
    ]
}

/// Nutrition-panel rows that show up in ingredient lists without being
/// supplement ingredients.
const NUTRITION_ROWS: &[&str] = &[
    "calories",
    "calories from fat",
    "total fat",
    "total carbohydrates",
    "sodium",
    "potassium",
    "protein",
    "dietary fiber",
    "sugars",
    "cholesterol",
];

/// Split a bulleted ingredient section into raw mentions.
///
/// A mention is the text of a `- ` line up to the first annotation
/// delimiter (open parenthesis or em dash); dosage and source annotations
/// after the cut are dropped. Nutrition-panel rows are skipped.
pub(crate) fn split_bullet_mentions(text: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('-') else {
            continue;
        };
        let rest = rest.trim();
        let cut = ['（', '(', '—']
            .iter()
            .filter_map(|d| rest.find(*d))
            .min()
            .unwrap_or(rest.len());
        let mention = rest[..cut].trim();
        if mention.is_empty() {
            continue;
        }
        let lowered = mention.to_lowercase();
        let lowered = lowered.trim_end_matches(':').trim();
        if NUTRITION_ROWS.contains(&lowered) {
            continue;
        }
        mentions.push(mention.to_string());
    }
    mentions
}

/// Split a section that is either one free-text mention or a bullet list
/// (the Japanese registries use both shapes).
pub(crate) fn split_text_or_bullets(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == crate::render::EMPTY_SECTION {
        return Vec::new();
    }
    if !trimmed.starts_with('-') {
        return vec![trimmed.to_string()];
    }
    trimmed
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix('-').map(|rest| rest.trim().to_string())
        })
        .filter(|m| !m.is_empty())
        .collect()
}

/// Split comma/newline-delimited free text into mentions.
pub(crate) fn split_delimited(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed == crate::render::EMPTY_SECTION {
        return Vec::new();
    }
    trimmed
        .split(|c| matches!(c, ',' | '，' | '、' | ';' | '；' | '\n'))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// `YYYY/MM/DD` → `YYYY-MM-DD`; anything else passes through.
pub(crate) fn slash_date_to_dashed(date: &str) -> String {
    let date = date.trim();
    if date.contains('/') {
        date.replace('/', "-")
    } else {
        date.to_string()
    }
}

/// `YYYYMMDD` → `YYYY-MM-DD`; slashed dates are dashed; anything else
/// passes through.
pub(crate) fn compact_date_to_dashed(date: &str) -> String {
    let date = date.trim();
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..8])
    } else {
        slash_date_to_dashed(date)
    }
}
