//! Report generation.
//!
//! Markdown, standalone HTML and the terminal summary. All three show the
//! same content: overall score, per-category checks and recommendations.

use super::{recommendations, share_text, Recommendation, ScoreTier};
use crate::analysis::aggregator::{status_breakdown, weakest_category};
use crate::models::{AnalysisReport, CategoryResult, CheckItem, CheckStatus};

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Website Analysis Report\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_overall_section(report));

    output.push_str("## Detailed Assessment\n\n");
    for (category, result) in report.scores.iter() {
        output.push_str(&format!(
            "### {} {}: {}/100\n\n",
            category.icon(),
            category.title(),
            result.score
        ));
        output.push_str(&generate_checks_table(result));
    }

    if !report.skipped_categories.is_empty() {
        output.push_str("### Skipped Categories\n\n");
        for skipped in &report.skipped_categories {
            output.push_str(&format!(
                "- {} {}: {}\n",
                skipped.category.icon(),
                skipped.category.title(),
                skipped.reason
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_recommendations_section(&recommendations(report)));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &AnalysisReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **URL:** {}\n", report.url));
    section.push_str(&format!(
        "- **Analysis Date:** {} ({})\n",
        report.timestamp, report.device
    ));
    if let Some(status) = report.http_status {
        section.push_str(&format!("- **HTTP Status:** {}\n", status));
    }
    section.push_str(&format!(
        "- **Response Time:** {}\n",
        format_response_time(report.response_time)
    ));
    if !report.website_accessible {
        section.push_str(&format!(
            "- **Reachable:** no{}\n",
            report
                .error
                .as_deref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default()
        ));
    }
    section.push('\n');

    section
}

fn generate_overall_section(report: &AnalysisReport) -> String {
    let tier = ScoreTier::from_score(report.overall_score);
    let mut section = String::new();

    section.push_str("## Overall Score\n\n");
    section.push_str(&format!(
        "{} **{}/100** ({})\n\n",
        tier.emoji(),
        report.overall_score,
        tier.label()
    ));
    section.push_str(&format!("*{}*\n\n", tier.description()));
    section.push_str(&format!(
        "✅ {}/{} checks passed\n\n",
        report.passed_checks, report.total_checks
    ));

    section.push_str("| Category | Score | Rating |\n");
    section.push_str("|:---|:---:|:---|\n");
    for (category, result) in report.scores.iter() {
        section.push_str(&format!(
            "| {} {} | {} | {} |\n",
            category.icon(),
            category.title(),
            result.score,
            ScoreTier::from_score(result.score).label()
        ));
    }
    section.push('\n');

    section
}

fn generate_checks_table(result: &CategoryResult) -> String {
    if result.checks.is_empty() {
        return "*No checks.*\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| Status | Check | Priority | Details | Solution |\n");
    table.push_str("|:---:|:---|:---:|:---|:---|\n");
    for check in &result.checks {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            check.status.emoji(),
            md_cell(&check.title),
            check.priority.label(),
            md_cell(&check.desc),
            md_cell(&check.solution)
        ));
    }
    table.push('\n');

    table
}

fn generate_recommendations_section(recs: &[Recommendation<'_>]) -> String {
    let mut section = String::new();

    section.push_str("## Recommendations\n\n");
    if recs.is_empty() {
        section.push_str("🎉 Excellent! No serious problems found.\n\n");
        return section;
    }

    for (i, rec) in recs.iter().enumerate() {
        section.push_str(&format!(
            "{}. **{}: {}** ({} priority)\n   {}\n",
            i + 1,
            rec.category.title(),
            rec.check.title,
            rec.check.priority.label(),
            rec.check.solution
        ));
        if let Some(ref code) = rec.check.code {
            section.push_str(&format!("\n   ```\n   {}\n   ```\n", code));
        }
        section.push('\n');
    }

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by webmaster v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

fn md_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn format_response_time(ms: Option<u64>) -> String {
    ms.map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "n/a".to_string())
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

const HTML_STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; color: #222; }
.overall { display: flex; gap: 1.5rem; align-items: center; padding: 1rem; border-radius: 8px; }
.score-number { font-size: 3rem; font-weight: bold; }
.score-excellent { background: #e6f7ec; }
.score-good { background: #e7f0fb; }
.score-average { background: #fff6db; }
.score-poor { background: #fde8e8; }
.section { margin: 1.5rem 0; padding: 1rem; border-radius: 8px; }
.check-item { border-left: 4px solid #ccc; margin: .5rem 0; padding: .25rem .75rem; }
.check-item.pass { border-color: #2e9d55; }
.check-item.warning { border-color: #e0a100; }
.check-item.fail { border-color: #d23b3b; }
.check-item.info { border-color: #3b7dd2; }
.priority { float: right; font-size: .85rem; color: #666; }
pre { background: #f4f4f4; padding: .5rem; overflow-x: auto; }
@media print { body { margin: 0; } .section { break-inside: avoid; } }
"#;

/// Generate a standalone HTML page. Printing it from a browser gives the
/// PDF export.
pub fn generate_html_report(report: &AnalysisReport) -> String {
    let tier = ScoreTier::from_score(report.overall_score);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    );
    html.push_str(&format!(
        "<title>Website analysis: {}</title>\n",
        escape_html(&report.url)
    ));
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", HTML_STYLE));

    html.push_str("<header>\n<h1>📊 Analysis Results</h1>\n");
    html.push_str(&format!(
        "<p>🌐 <strong>{}</strong></p>\n<p>📅 {} ({})</p>\n</header>\n",
        escape_html(&report.url),
        escape_html(&report.timestamp),
        report.device
    ));

    html.push_str(&format!(
        "<div class=\"overall {}\">\n<div><span class=\"score-number\">{}</span>/100</div>\n",
        tier.css_class(),
        report.overall_score
    ));
    html.push_str(&format!(
        "<div><h2>{}</h2><p>{}</p><p>✅ {}/{} checks · ⏱️ {}</p></div>\n</div>\n",
        tier.label(),
        tier.description(),
        report.passed_checks,
        report.total_checks,
        format_response_time(report.response_time)
    ));
    html.push_str(&html_reachability(report));

    html.push_str("<h2>📋 Detailed Assessment</h2>\n");
    for (category, result) in report.scores.iter() {
        html.push_str(&format!(
            "<section class=\"section {}\">\n<h3>{} {} <span class=\"priority\">{}/100</span></h3>\n",
            ScoreTier::from_score(result.score).css_class(),
            category.icon(),
            category.title(),
            result.score
        ));
        for check in &result.checks {
            html.push_str(&html_check(check));
        }
        html.push_str("</section>\n");
    }

    if !report.skipped_categories.is_empty() {
        html.push_str("<section class=\"section skipped\">\n<h3>Skipped Categories</h3>\n<ul>\n");
        for skipped in &report.skipped_categories {
            html.push_str(&format!(
                "<li>{} {}: {}</li>\n",
                skipped.category.icon(),
                skipped.category.title(),
                escape_html(&skipped.reason)
            ));
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str("<h2>🔍 Recommendations</h2>\n");
    let recs = recommendations(report);
    if recs.is_empty() {
        html.push_str("<p>🎉 Excellent! No serious problems found.</p>\n");
    }
    for rec in recs {
        html.push_str(&format!(
            "<div class=\"check-item {}\">\n<h4>{}: {}</h4>\n<p>{}</p>\n",
            rec.check.status,
            rec.category.title(),
            escape_html(&rec.check.title),
            escape_html(&rec.check.solution)
        ));
        if let Some(ref code) = rec.check.code {
            html.push_str(&format!("<pre><code>{}</code></pre>\n", escape_html(code)));
        }
        html.push_str("</div>\n");
    }

    html.push_str(&format!(
        "<footer><p>Report generated by webmaster v{}</p></footer>\n</body>\n</html>\n",
        env!("CARGO_PKG_VERSION")
    ));

    html
}

fn html_reachability(report: &AnalysisReport) -> String {
    let status = report
        .http_status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let mut block = format!(
        "<p class=\"reachability\">🌐 HTTP status: {} · Reachable: {}</p>\n",
        status,
        if report.website_accessible { "yes" } else { "no" }
    );
    if let Some(ref error) = report.error {
        block.push_str(&format!("<p class=\"error\">⚠️ {}</p>\n", escape_html(error)));
    }
    block
}

fn html_check(check: &CheckItem) -> String {
    let mut item = format!(
        "<div class=\"check-item {}\">\n<p>{} <strong>{}</strong><span class=\"priority\">{}</span></p>\n<p>{}</p>\n<p><em>{}</em></p>\n",
        check.status,
        check.status.emoji(),
        escape_html(&check.title),
        check.priority.label(),
        escape_html(&check.desc),
        escape_html(&check.solution)
    );
    if let Some(ref code) = check.code {
        item.push_str(&format!("<pre><code>{}</code></pre>\n", escape_html(code)));
    }
    item.push_str("</div>\n");
    item
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// Summary printed when no export format is chosen.
pub fn generate_terminal_summary(report: &AnalysisReport) -> String {
    let tier = ScoreTier::from_score(report.overall_score);
    let breakdown = status_breakdown(&report.scores);
    let mut lines = Vec::new();

    lines.push(format!("📊 Analysis Results: {}", report.url));
    lines.push(format!("   📅 {} ({})", report.timestamp, report.device));
    match report.http_status {
        Some(status) => lines.push(format!(
            "   🌐 HTTP {} in {}",
            status,
            format_response_time(report.response_time)
        )),
        None => lines.push("   🌐 No probe data".to_string()),
    }
    if let Some(ref error) = report.error {
        lines.push(format!("   ⚠️  {}", error));
    }

    lines.push(String::new());
    lines.push(format!(
        "{} Overall: {}/100, {}",
        tier.emoji(),
        report.overall_score,
        tier.label()
    ));
    lines.push(format!("   {}", tier.description()));
    lines.push(format!(
        "   ✅ {}/{} checks passed | {} Warning: {} | {} Fail: {} | {} Info: {}",
        report.passed_checks,
        report.total_checks,
        CheckStatus::Warning.emoji(),
        breakdown.warning,
        CheckStatus::Fail.emoji(),
        breakdown.fail,
        CheckStatus::Info.emoji(),
        breakdown.info
    ));

    lines.push(String::new());
    for (category, result) in report.scores.iter() {
        lines.push(format!(
            "   {} {:<16} {:>3}/100",
            category.icon(),
            category.title(),
            result.score
        ));
    }
    for skipped in &report.skipped_categories {
        lines.push(format!(
            "   {} {:<16} skipped: {}",
            skipped.category.icon(),
            skipped.category.title(),
            skipped.reason
        ));
    }
    if let Some((category, score)) = weakest_category(&report.scores) {
        if report.scores.len() > 1 {
            lines.push(format!("   Weakest area: {} ({}/100)", category.title(), score));
        }
    }

    let recs = recommendations(report);
    if !recs.is_empty() {
        lines.push(String::new());
        lines.push("🔍 Recommendations:".to_string());
        for rec in &recs {
            lines.push(format!(
                "   {} [{}] {}: {}",
                rec.check.status.emoji(),
                rec.check.priority.label(),
                rec.category.title(),
                rec.check.title
            ));
            lines.push(format!("      💡 {}", rec.check.solution));
        }
    }

    lines.push(String::new());
    lines.push(share_text(report));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, HttpStatus, SkippedCategory};
    use crate::report::tests::sample_report;

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&sample_report());

        assert!(markdown.contains("# Website Analysis Report"));
        assert!(markdown.contains("https://example.com/"));
        assert!(markdown.contains("## Overall Score"));
        assert!(markdown.contains("**70/100** (Average)"));
        assert!(markdown.contains("🔒 Security: 90/100"));
        assert!(markdown.contains("## Recommendations"));
        assert!(markdown.contains("1. **Security: Security headers**"));
        assert!(markdown.contains("2. **SEO: URL structure**"));
        assert!(markdown.contains("Content-Security-Policy: default-src 'self'"));
    }

    #[test]
    fn test_markdown_without_recommendations() {
        let mut report = sample_report();
        report.scores = Default::default();
        crate::analysis::aggregator::finalize(&mut report);

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No serious problems found"));
    }

    #[test]
    fn test_generate_html_report_escapes() {
        let html = generate_html_report(&sample_report());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("score-average"));
        assert!(html.contains("&lt;tags&gt;"));
        assert!(html.contains("&quot;quotes&quot;"));
        assert!(!html.contains("<tags>"));
        assert!(html.contains("&#39;self&#39;"));
    }

    #[test]
    fn test_html_shows_unreachable_site_and_skipped_categories() {
        let mut report = sample_report();
        report.website_accessible = false;
        report.http_status = Some(HttpStatus::TIMEOUT);
        report.error = Some("No response within 10000ms".to_string());
        report.skipped_categories.push(SkippedCategory {
            category: Category::Mobile,
            reason: "viewport <check> crashed".to_string(),
        });

        let html = generate_html_report(&report);
        assert!(html.contains("HTTP status: timeout · Reachable: no"));
        assert!(html.contains("No response within 10000ms"));
        assert!(html.contains("Skipped Categories"));
        assert!(html.contains("Mobile: viewport &lt;check&gt; crashed"));

        let reachable = generate_html_report(&sample_report());
        assert!(reachable.contains("HTTP status: 200 · Reachable: yes"));
        assert!(!reachable.contains("Skipped Categories"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & <b>"), "a &amp; &lt;b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_terminal_summary() {
        let summary = generate_terminal_summary(&sample_report());

        assert!(summary.contains("Overall: 70/100, Average"));
        assert!(summary.contains("1/4 checks passed"));
        assert!(summary.contains("HTTP 200 in 321ms"));
        assert!(summary.contains("Weakest area: SEO (50/100)"));
        assert!(summary.contains("URL structure"));
        assert!(summary.ends_with("overall score 70/100"));
    }
}
