//! Report rendering and export.
//!
//! Renderers and exporters take the finished [`AnalysisReport`] as a
//! parameter; nothing here keeps report state.

pub mod export;
pub mod generator;

pub use export::{generate_csv_report, generate_json_report};
pub use generator::{generate_html_report, generate_markdown_report, generate_terminal_summary};

use crate::cli::OutputFormat;
use crate::models::{AnalysisReport, Category, CheckItem};
use anyhow::Result;

/// Qualitative band for a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Excellent,
    Good,
    Average,
    Poor,
}

impl ScoreTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => ScoreTier::Excellent,
            75..=89 => ScoreTier::Good,
            60..=74 => ScoreTier::Average,
            _ => ScoreTier::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Excellent",
            ScoreTier::Good => "Good",
            ScoreTier::Average => "Average",
            ScoreTier::Poor => "Needs improvement",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Your site shows excellent results!",
            ScoreTier::Good => "Good results with room for improvement",
            ScoreTier::Average => "There are serious opportunities for optimization",
            ScoreTier::Poor => "The site needs serious optimization",
        }
    }

    /// CSS class used by the HTML report.
    pub fn css_class(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "score-excellent",
            ScoreTier::Good => "score-good",
            ScoreTier::Average => "score-average",
            ScoreTier::Poor => "score-poor",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ScoreTier::Excellent => "🟢",
            ScoreTier::Good => "🔵",
            ScoreTier::Average => "🟡",
            ScoreTier::Poor => "🔴",
        }
    }
}

/// A check that needs attention, tagged with its category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation<'a> {
    pub category: Category,
    pub check: &'a CheckItem,
}

/// Every failing or warning check, in category then check order.
pub fn recommendations(report: &AnalysisReport) -> Vec<Recommendation<'_>> {
    report
        .all_checks()
        .filter(|(_, check)| check.status.needs_attention())
        .map(|(category, check)| Recommendation { category, check })
        .collect()
}

/// One-line summary suitable for sharing.
pub fn share_text(report: &AnalysisReport) -> String {
    format!(
        "Website analysis of {}: overall score {}/100",
        report.url, report.overall_score
    )
}

/// Default export file name for a file-based format.
pub fn default_file_name(format: OutputFormat, unix_millis: i64) -> Option<String> {
    format
        .extension()
        .map(|ext| format!("webmaster-analysis-{}.{}", unix_millis, ext))
}

/// Render a report in a file-based format.
pub fn render(report: &AnalysisReport, format: OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Terminal => generate_terminal_summary(report),
        OutputFormat::Markdown => generate_markdown_report(report),
        OutputFormat::Html => generate_html_report(report),
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Csv => generate_csv_report(report),
    };
    Ok(content)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{CategoryResult, CheckStatus, Device, Priority};

    pub(crate) fn sample_report() -> AnalysisReport {
        let mut report = AnalysisReport::new("https://example.com/".to_string(), Device::Mobile);
        report.scores.insert(
            Category::Security,
            CategoryResult {
                score: 90,
                checks: vec![
                    CheckItem::new(
                        CheckStatus::Pass,
                        "SSL/TLS certificate",
                        "The site uses TLS encryption",
                        Priority::High,
                        "Great! The TLS certificate is active",
                    ),
                    CheckItem::new(
                        CheckStatus::Warning,
                        "Security headers",
                        "Missing HTTP security headers: X-Frame-Options",
                        Priority::High,
                        "Configure CSP, HSTS and other security headers",
                    )
                    .with_code("Content-Security-Policy: default-src 'self'"),
                ],
            },
        );
        report.scores.insert(
            Category::Seo,
            CategoryResult {
                score: 50,
                checks: vec![
                    CheckItem::new(
                        CheckStatus::Info,
                        "Domain",
                        "Analyzed domain: example.com",
                        Priority::Low,
                        "Use a relevant domain name",
                    ),
                    CheckItem::new(
                        CheckStatus::Fail,
                        "URL structure",
                        "Path with \"quotes\", commas & <tags>",
                        Priority::Medium,
                        "Use short, readable URLs",
                    ),
                ],
            },
        );
        report.website_accessible = true;
        report.response_time = Some(321);
        report.http_status = Some(crate::models::HttpStatus::Code(200));
        crate::analysis::aggregator::finalize(&mut report);
        report
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(ScoreTier::from_score(100), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(90), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(89), ScoreTier::Good);
        assert_eq!(ScoreTier::from_score(75), ScoreTier::Good);
        assert_eq!(ScoreTier::from_score(74), ScoreTier::Average);
        assert_eq!(ScoreTier::from_score(60), ScoreTier::Average);
        assert_eq!(ScoreTier::from_score(59), ScoreTier::Poor);
        assert_eq!(ScoreTier::from_score(0), ScoreTier::Poor);
    }

    #[test]
    fn test_recommendations_keep_traversal_order() {
        let report = sample_report();
        let recs = recommendations(&report);
        let titles: Vec<_> = recs
            .iter()
            .map(|r| (r.category, r.check.title.as_str()))
            .collect();
        assert_eq!(
            titles,
            vec![
                (Category::Security, "Security headers"),
                (Category::Seo, "URL structure")
            ]
        );
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(
            default_file_name(OutputFormat::Json, 1_700_000_000_000),
            Some("webmaster-analysis-1700000000000.json".to_string())
        );
        assert_eq!(default_file_name(OutputFormat::Terminal, 1), None);
    }

    #[test]
    fn test_share_text() {
        let report = sample_report();
        assert_eq!(
            share_text(&report),
            "Website analysis of https://example.com/: overall score 70/100"
        );
    }
}
