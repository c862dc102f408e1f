//! Keyword-rule category and form classification.
//!
//! Every market carries an ordered table of `(keywords, category)` rules.
//! Classification scans **all** rules, with no short-circuit on the first
//! match, collecting the set of distinct categories whose rule matched.
//! The tie-break is cardinality-dependent, not order-dependent:
//!
//! - no rule matched → `other`
//! - exactly one category matched → that category
//! - two or more distinct categories matched → `specialty`
//!
//! So a product whose text mentions both a vitamin keyword and a probiotic
//! keyword is always `specialty`, regardless of which rule matched first
//! or how many keywords matched each.
//!
//! Form rules are different: the first matching rule wins.

use std::collections::BTreeSet;

use crate::models::{Category, ProductForm};

/// How keywords are matched against input text.
///
/// Latin-script sources match case-insensitively; CJK/Hangul sources match
/// exact substrings (case has no meaning there, and lowercasing the text
/// would corrupt nothing but costs a pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    CaseInsensitive,
    Exact,
}

/// Immutable ordered category rule table for one market.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<(Vec<String>, Category)>,
    mode: MatchMode,
}

impl CategoryRules {
    pub fn new(mode: MatchMode, table: &[(&[&str], Category)]) -> Self {
        let rules = table
            .iter()
            .map(|(keywords, cat)| {
                let keywords = keywords
                    .iter()
                    .map(|kw| match mode {
                        MatchMode::CaseInsensitive => kw.to_lowercase(),
                        MatchMode::Exact => kw.to_string(),
                    })
                    .collect();
                (keywords, *cat)
            })
            .collect();
        Self { rules, mode }
    }

    /// Classify free text per the table. Empty input is always `other`.
    pub fn classify(&self, text: &str) -> Category {
        if text.trim().is_empty() {
            return Category::Other;
        }
        let haystack = match self.mode {
            MatchMode::CaseInsensitive => text.to_lowercase(),
            MatchMode::Exact => text.to_string(),
        };

        let mut matched: BTreeSet<Category> = BTreeSet::new();
        for (keywords, category) in &self.rules {
            if keywords.iter().any(|kw| haystack.contains(kw.as_str())) {
                matched.insert(*category);
            }
        }

        match matched.len() {
            0 => Category::Other,
            1 => *matched.iter().next().expect("len checked"),
            _ => Category::Specialty,
        }
    }
}

/// Immutable ordered product-form rule table. First match wins.
#[derive(Debug, Clone)]
pub struct FormRules {
    rules: Vec<(Vec<String>, ProductForm)>,
    mode: MatchMode,
}

impl FormRules {
    pub fn new(mode: MatchMode, table: &[(&[&str], ProductForm)]) -> Self {
        let rules = table
            .iter()
            .map(|(keywords, form)| {
                let keywords = keywords
                    .iter()
                    .map(|kw| match mode {
                        MatchMode::CaseInsensitive => kw.to_lowercase(),
                        MatchMode::Exact => kw.to_string(),
                    })
                    .collect();
                (keywords, *form)
            })
            .collect();
        Self { rules, mode }
    }

    pub fn classify(&self, text: &str) -> ProductForm {
        if text.trim().is_empty() {
            return ProductForm::Other;
        }
        let haystack = match self.mode {
            MatchMode::CaseInsensitive => text.to_lowercase(),
            MatchMode::Exact => text.to_string(),
        };
        for (keywords, form) in &self.rules {
            if keywords.iter().any(|kw| haystack.contains(kw.as_str())) {
                return *form;
            }
        }
        ProductForm::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_rules() -> CategoryRules {
        CategoryRules::new(
            MatchMode::CaseInsensitive,
            &[
                (
                    &["probiotic", "lactobacillus", "bifidobacterium"],
                    Category::Probiotics,
                ),
                (&["omega", "fish oil", "dha", "epa"], Category::OmegaFattyAcids),
                (&["vitamin", "mineral", "calcium"], Category::VitaminsMinerals),
            ],
        )
    }

    #[test]
    fn empty_text_is_other() {
        assert_eq!(english_rules().classify(""), Category::Other);
        assert_eq!(english_rules().classify("   "), Category::Other);
    }

    #[test]
    fn no_match_is_other() {
        assert_eq!(english_rules().classify("charcoal tablets"), Category::Other);
    }

    #[test]
    fn single_category_wins() {
        assert_eq!(
            english_rules().classify("Vitamin C with rose hips"),
            Category::VitaminsMinerals
        );
    }

    #[test]
    fn two_categories_become_specialty() {
        // "vitamin" and "lactobacillus" land in different rules, so the
        // result is specialty no matter which matched "more".
        assert_eq!(
            english_rules().classify("Vitamin C and Lactobacillus blend"),
            Category::Specialty
        );
        // Order of mention does not matter either.
        assert_eq!(
            english_rules().classify("Lactobacillus plus vitamin D"),
            Category::Specialty
        );
    }

    #[test]
    fn multiple_keywords_same_rule_still_single() {
        assert_eq!(
            english_rules().classify("vitamin and mineral and calcium complex"),
            Category::VitaminsMinerals
        );
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(
            english_rules().classify("VITAMIN D3"),
            Category::VitaminsMinerals
        );
    }

    #[test]
    fn exact_mode_keeps_case() {
        let rules = CategoryRules::new(
            MatchMode::Exact,
            &[(&["DHA"], Category::OmegaFattyAcids)],
        );
        assert_eq!(rules.classify("contains DHA"), Category::OmegaFattyAcids);
        assert_eq!(rules.classify("contains dha"), Category::Other);
    }

    #[test]
    fn korean_rules_match_hangul() {
        let rules = CategoryRules::new(
            MatchMode::Exact,
            &[
                (&["유산균", "프로바이오틱스"], Category::Probiotics),
                (&["비타민", "칼슘"], Category::VitaminsMinerals),
            ],
        );
        assert_eq!(rules.classify("비타민C 함유"), Category::VitaminsMinerals);
        assert_eq!(rules.classify("유산균과 비타민"), Category::Specialty);
    }

    #[test]
    fn form_first_match_wins() {
        let rules = FormRules::new(
            MatchMode::Exact,
            &[
                (&["연질캡슐"], ProductForm::Softgel),
                (&["캡슐"], ProductForm::Capsule),
                (&["정제"], ProductForm::Tablet),
            ],
        );
        // A softgel mentions both 연질캡슐 and its 캡슐 substring; the
        // earlier rule must win.
        assert_eq!(rules.classify("연질캡슐"), ProductForm::Softgel);
        assert_eq!(rules.classify("경질캡슐"), ProductForm::Capsule);
        assert_eq!(rules.classify("시럽"), ProductForm::Other);
    }
}
