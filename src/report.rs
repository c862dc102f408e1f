//! Narrative report rendering.
//!
//! Renders the monthly ingredient radar report from the aggregate JSON
//! artifact alone: every displayed count is copied from the tables, never
//! recomputed from the corpus. Sections are fixed; rankings use a stable
//! descending sort so ties keep their first-encountered order.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::aggregate::{ranked, ranked_market, Analysis, IngredientEntry};
use crate::config::Config;
use crate::error::PipelineError;

/// Preferred market column/section order; markets outside this list are
/// appended alphabetically.
const MARKET_ORDER: &[&str] = &["us", "ca", "kr", "jp", "tw"];

pub fn run_report(
    config: &Config,
    analysis_path: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    let analysis_path = analysis_path.unwrap_or_else(|| default_analysis_path(config));
    let analysis = crate::aggregate::load_analysis(&analysis_path)?;

    let now = chrono::Utc::now();
    let period = now.format("%Y-%m").to_string();

    let report = render_report(&analysis, &config.report, &period, &now.to_rfc3339());

    let out_path = out.unwrap_or_else(|| {
        config
            .report
            .output_dir
            .join(format!("{}-ingredient-radar.md", period))
    });
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    std::fs::write(&out_path, report).map_err(|e| PipelineError::io(&out_path, e))?;

    println!("report");
    println!("  analysis: {}", analysis_path.display());
    println!("  wrote: {}", out_path.display());
    println!("ok");

    Ok(out_path)
}

/// Market keys in display order.
fn ordered_markets(analysis: &Analysis) -> Vec<String> {
    let mut markets: Vec<String> = MARKET_ORDER
        .iter()
        .filter(|m| analysis.markets.contains_key(**m))
        .map(|m| m.to_string())
        .collect();
    for market in analysis.markets.keys() {
        if !markets.contains(market) {
            markets.push(market.clone());
        }
    }
    markets
}

/// The category with the most documents for this ingredient; earlier key
/// wins ties.
fn primary_category(entry: &IngredientEntry) -> &str {
    let mut best: Option<(&str, u64)> = None;
    for (category, count) in &entry.categories {
        if best.map(|(_, c)| *count > c).unwrap_or(true) {
            best = Some((category, *count));
        }
    }
    best.map(|(c, _)| c).unwrap_or("unknown")
}

pub fn render_report(
    analysis: &Analysis,
    report_config: &crate::config::ReportConfig,
    period: &str,
    generated_at: &str,
) -> String {
    let mut out = String::new();
    let markets = ordered_markets(analysis);
    let leaders = ranked(&analysis.ingredients);

    let total: u64 = analysis.layers.values().map(|t| t.total).sum();
    let included: u64 = analysis.layers.values().map(|t| t.included).sum();
    let review_skipped: u64 = analysis.layers.values().map(|t| t.review_skipped).sum();
    let rate = if total > 0 {
        included as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    // Header block
    out.push_str("---\n");
    let _ = writeln!(out, "mode: \"ingredient_radar\"");
    let _ = writeln!(out, "period: \"{}\"", period);
    let _ = writeln!(out, "generated_at: \"{}\"", generated_at);
    out.push_str("source_layers:\n");
    for layer in analysis.layers.keys() {
        let _ = writeln!(out, "  - {}", layer);
    }
    out.push_str("---\n\n");

    let _ = writeln!(out, "# Ingredient Radar Report — {}\n", period);
    let _ = writeln!(out, "> Generated at: {}\n", generated_at);

    // Summary
    out.push_str("## Summary\n\n");
    let _ = writeln!(
        out,
        "This report covers {} registered products across {} market(s); {} ({:.1}%) contributed usable ingredient data, while {} carried a review flag and were excluded from every table.",
        total,
        markets.len(),
        included,
        rate,
        review_skipped,
    );
    if leaders.len() >= 3 {
        let _ = writeln!(
            out,
            "\nThe leading ingredients worldwide are **{}** ({} products), **{}** ({} products), and **{}** ({} products).",
            leaders[0].name,
            leaders[0].count,
            leaders[1].name,
            leaders[1].count,
            leaders[2].name,
            leaders[2].count,
        );
    }

    // Global ranking
    let _ = writeln!(
        out,
        "\n## Global Top {} Ingredients\n",
        report_config.top_global
    );
    out.push_str("| Rank | Ingredient | Products | Markets | Primary category |\n");
    out.push_str("|------|------------|----------|---------|------------------|\n");
    for (rank, entry) in leaders.iter().take(report_config.top_global).enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            rank + 1,
            entry.name,
            entry.count,
            entry.markets.join(", "),
            primary_category(entry),
        );
    }

    // Per-market rankings
    out.push_str("\n## Market Preferences\n");
    for market in &markets {
        let Some(counts) = analysis.markets.get(market) else {
            continue;
        };
        let _ = writeln!(
            out,
            "\n### {} Top {}\n",
            market.to_uppercase(),
            report_config.top_market
        );
        out.push_str("| Rank | Ingredient | Products |\n");
        out.push_str("|------|------------|----------|\n");
        for (rank, entry) in ranked_market(counts)
            .iter()
            .take(report_config.top_market)
            .enumerate()
        {
            let _ = writeln!(out, "| {} | {} | {} |", rank + 1, entry.name, entry.count);
        }
    }

    // Cross-market comparison
    out.push_str("\n## Cross-Market Comparison\n\n");
    let _ = writeln!(
        out,
        "Ingredients from the global top {} present in some but not all markets:\n",
        report_config.cross_market_scan
    );
    let mut header = String::from("| Ingredient |");
    let mut divider = String::from("|------------|");
    for market in &markets {
        let _ = write!(header, " {} |", market.to_uppercase());
        divider.push_str("----|");
    }
    header.push_str(" Note |\n");
    divider.push_str("------|\n");
    out.push_str(&header);
    out.push_str(&divider);

    let market_lookup: BTreeMap<&str, BTreeMap<&str, u64>> = analysis
        .markets
        .iter()
        .map(|(market, counts)| {
            (
                market.as_str(),
                counts
                    .iter()
                    .map(|c| (c.name.as_str(), c.count))
                    .collect(),
            )
        })
        .collect();

    let mut rows = 0usize;
    for entry in leaders.iter().take(report_config.cross_market_scan) {
        if entry.markets.len() < 2 || entry.markets.len() >= markets.len() || markets.len() < 3 {
            continue;
        }
        let mut row = format!("| {} |", entry.name);
        for market in &markets {
            let count = market_lookup
                .get(market.as_str())
                .and_then(|m| m.get(entry.name.as_str()))
                .copied()
                .unwrap_or(0);
            if count > 0 {
                let _ = write!(row, " {} |", count);
            } else {
                row.push_str(" — |");
            }
        }
        let _ = writeln!(row, " Present in {} |", entry.markets.join(", "));
        out.push_str(&row);
        rows += 1;
        if rows >= 10 {
            break;
        }
    }
    if rows == 0 {
        out.push_str("\nNo ingredient in the scanned range shows a partial market footprint.\n");
    }

    // Category breakdown
    out.push_str("\n## Category Breakdown\n");
    for category in [
        "vitamins_minerals",
        "botanicals",
        "probiotics",
        "omega_fatty_acids",
        "protein_amino",
    ] {
        let _ = writeln!(out, "\n### {}\n", category);
        let mut in_category: Vec<(&IngredientEntry, u64)> = analysis
            .ingredients
            .iter()
            .filter_map(|e| e.categories.get(category).map(|c| (e, *c)))
            .collect();
        in_category.sort_by_key(|(_, c)| std::cmp::Reverse(*c));

        if in_category.is_empty() {
            out.push_str("- Core ingredients: insufficient data\n");
            continue;
        }

        let top: Vec<String> = in_category
            .iter()
            .take(5)
            .map(|(e, c)| format!("{} ({})", e.name, c))
            .collect();
        let _ = writeln!(out, "- Core ingredients: {}", top.join(", "));

        let mut market_presence: BTreeMap<&str, usize> = BTreeMap::new();
        for (entry, _) in in_category.iter().take(5) {
            for market in &entry.markets {
                *market_presence.entry(market.as_str()).or_insert(0) += 1;
            }
        }
        if let Some((dominant, present)) = market_presence
            .iter()
            .max_by_key(|(_, present)| **present)
            .map(|(m, p)| (*m, *p))
        {
            let _ = writeln!(
                out,
                "- Most active market: {} ({}/{} core ingredients present)",
                dominant.to_uppercase(),
                present,
                top.len(),
            );
        }
    }

    // Data quality
    out.push_str("\n## Data Quality\n\n");
    let _ = writeln!(out, "- Documents analyzed: {}", total);
    let _ = writeln!(
        out,
        "- Documents with usable ingredient data: {} ({:.1}%)",
        included, rate
    );
    let _ = writeln!(out, "- Review-flagged documents excluded: {}", review_skipped);
    out.push_str("- Per layer:\n");
    for (layer, tally) in &analysis.layers {
        let layer_rate = if tally.total > 0 {
            tally.included as f64 / tally.total as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "  - {}: {}/{} ({:.1}%), {} review-flagged",
            layer, tally.included, tally.total, layer_rate, tally.review_skipped
        );
    }

    // Methodology
    out.push_str("\n## Methodology\n\n");
    out.push_str(
        "- Ingredient names are folded through a fixed multilingual synonym table (Japanese, Korean, and Chinese aliases map to English canonical names) after dosage and parenthetical-form noise is stripped.\n",
    );
    out.push_str(
        "- Each document contributes at most one count per ingredient, regardless of how often its ingredient section repeats a name.\n",
    );
    out.push_str(
        "- Documents carrying the review sentinel are excluded from every table rather than treated as errors.\n",
    );
    out.push_str(
        "- Registries disagree on what counts as an ingredient; cross-market comparisons should account for regulatory differences.\n",
    );

    out.push_str("\n## Disclaimer\n\n");
    out.push_str(
        "Counts reflect registry entries, not sales or consumption. Name folding is automatic and may merge or miss compound ingredients. This report is descriptive and is not formulation or regulatory advice.\n",
    );

    out
}

/// Resolve the default analysis artifact path for a config.
pub fn default_analysis_path(config: &Config) -> PathBuf {
    config.report.output_dir.join("ingredient_analysis.json")
}
