//! Category analyzers.
//!
//! One analyzer per category. Each turns the shared [`AnalysisContext`]
//! into a [`CategoryResult`] whose check order is the display order.

use crate::analysis::policy::ScoringPolicy;
use crate::models::{Category, CategoryResult, CheckItem, CheckStatus, Device, Priority};
use crate::probe::{DocumentSignals, ProbeOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// An analyzer could not produce a result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AnalyzerError(pub String);

/// Everything an analyzer may look at. Shared read-only by all analyzers
/// of a run.
pub struct AnalysisContext {
    pub url: Url,
    pub device: Device,
    /// Probe outcome; `None` when the probe failed and the run continued.
    pub probe: Option<ProbeOutcome>,
    pub policy: Arc<dyn ScoringPolicy>,
}

impl AnalysisContext {
    fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    fn document(&self) -> Option<DocumentSignals> {
        self.probe.as_ref().and_then(|p| p.document)
    }

    fn reachable_probe(&self) -> Option<&ProbeOutcome> {
        self.probe.as_ref().filter(|p| p.accessible)
    }
}

#[async_trait]
pub trait CategoryAnalyzer: Send + Sync {
    fn category(&self) -> Category;

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError>;
}

/// The built-in analyzer for a category.
pub fn analyzer_for(category: Category) -> Box<dyn CategoryAnalyzer> {
    match category {
        Category::Performance => Box::new(PerformanceAnalyzer),
        Category::Seo => Box::new(SeoAnalyzer),
        Category::Security => Box::new(SecurityAnalyzer),
        Category::Accessibility => Box::new(AccessibilityAnalyzer),
        Category::Mobile => Box::new(MobileAnalyzer),
        Category::BestPractices => Box::new(BestPracticesAnalyzer),
    }
}

/// round(100 * passes / non-info checks), or `fallback` when every check
/// is informational.
pub fn ratio_score(checks: &[CheckItem], fallback: u8) -> u8 {
    let passed = checks.iter().filter(|c| c.status == CheckStatus::Pass).count();
    let scoreable = checks.iter().filter(|c| c.status != CheckStatus::Info).count();
    if scoreable == 0 {
        return fallback;
    }
    ((passed as f64 / scoreable as f64) * 100.0).round() as u8
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

pub struct PerformanceAnalyzer;

/// Starts at 100 and subtracts a fixed amount per threshold crossed.
pub fn performance_score(response_ms: u64, load_ms: u64) -> u8 {
    let mut score: i32 = 100;
    if response_ms > 1000 {
        score -= 20;
    }
    if response_ms > 3000 {
        score -= 30;
    }
    if load_ms > 2000 {
        score -= 15;
    }
    if load_ms > 5000 {
        score -= 25;
    }
    score.max(10) as u8
}

fn banded(value: u64, pass_below: u64, warn_below: u64) -> CheckStatus {
    if value < pass_below {
        CheckStatus::Pass
    } else if value < warn_below {
        CheckStatus::Warning
    } else {
        CheckStatus::Fail
    }
}

#[async_trait]
impl CategoryAnalyzer for PerformanceAnalyzer {
    fn category(&self) -> Category {
        Category::Performance
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let probe = ctx.reachable_probe();

        let measured_response = probe.map(|p| p.response_time_ms);
        let measured_load = probe.and_then(|p| p.load_time_ms);

        let response_ms = measured_response.unwrap_or_else(|| ctx.policy.synthetic_response_ms());
        let load_ms = measured_load.unwrap_or_else(|| ctx.policy.synthetic_load_ms());
        let estimated = |measured: Option<u64>| if measured.is_some() { "" } else { " (estimated)" };

        let response_status = banded(response_ms, 1000, 3000);
        let load_status = banded(load_ms, 2000, 5000);
        let loaded = measured_load.is_some();

        let checks = vec![
            CheckItem::new(
                response_status,
                "Server response time",
                format!("{}ms{}", response_ms, estimated(measured_response)),
                Priority::High,
                if response_status == CheckStatus::Pass {
                    "Excellent response time!"
                } else {
                    "Optimize server performance"
                },
            ),
            CheckItem::new(
                load_status,
                "Document load",
                format!("{}ms{}", load_ms, estimated(measured_load)),
                Priority::High,
                if load_status == CheckStatus::Pass {
                    "The document loads quickly"
                } else {
                    "Reduce the size and complexity of the document"
                },
            ),
            CheckItem::new(
                if loaded {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Warning
                },
                "Load state",
                if loaded {
                    "The document was received completely"
                } else {
                    "The document was not received completely"
                },
                Priority::Medium,
                "Monitor that every resource finishes loading",
            ),
        ];

        Ok(CategoryResult {
            score: performance_score(response_ms, load_ms),
            checks,
        })
    }
}

// ---------------------------------------------------------------------------
// SEO
// ---------------------------------------------------------------------------

pub struct SeoAnalyzer;

#[async_trait]
impl CategoryAnalyzer for SeoAnalyzer {
    fn category(&self) -> Category {
        Category::Seo
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let domain = ctx.url.host_str().unwrap_or_default().to_string();
        let https = ctx.is_https();
        let www = domain.contains("www");
        let structured_path = ctx.url.path().len() > 1;

        let checks = vec![
            CheckItem::new(
                if https { CheckStatus::Pass } else { CheckStatus::Fail },
                "HTTPS protocol",
                if https {
                    "The site uses a secure connection"
                } else {
                    "The site does not use HTTPS"
                },
                Priority::High,
                if https {
                    "Great! The site uses HTTPS"
                } else {
                    "Install a TLS certificate and redirect HTTP to HTTPS"
                },
            ),
            CheckItem::new(
                if www { CheckStatus::Pass } else { CheckStatus::Info },
                "WWW prefix",
                if www {
                    "The www prefix is used"
                } else {
                    "The site is served without the www prefix"
                },
                Priority::Low,
                "Configure canonical URLs for consistency",
            ),
            CheckItem::new(
                if structured_path {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Warning
                },
                "URL structure",
                "Structure of the URL path",
                Priority::Medium,
                "Use short, readable URLs",
            ),
            CheckItem::new(
                CheckStatus::Info,
                "Domain",
                format!("Analyzed domain: {}", domain),
                Priority::Low,
                "Use a relevant domain name",
            ),
        ];

        Ok(CategoryResult {
            score: ratio_score(&checks, 50),
            checks,
        })
    }
}

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

pub struct SecurityAnalyzer;

/// Headers named in the security-headers finding.
const SECURITY_HEADERS: [(&str, &str); 3] = [
    ("content-security-policy", "Content-Security-Policy"),
    ("strict-transport-security", "Strict-Transport-Security"),
    ("x-frame-options", "X-Frame-Options"),
];

/// clamp(80 + 10 * passes - 20 * fails, 10, 100)
pub fn security_score(checks: &[CheckItem]) -> u8 {
    let passed = checks.iter().filter(|c| c.status == CheckStatus::Pass).count() as i32;
    let failed = checks.iter().filter(|c| c.status == CheckStatus::Fail).count() as i32;
    (80 + passed * 10 - failed * 20).clamp(10, 100) as u8
}

#[async_trait]
impl CategoryAnalyzer for SecurityAnalyzer {
    fn category(&self) -> Category {
        Category::Security
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let https = ctx.is_https();

        let header_desc = match ctx.reachable_probe().filter(|p| p.headers.is_some()) {
            Some(probe) => {
                let missing: Vec<&str> = SECURITY_HEADERS
                    .iter()
                    .filter(|(name, _)| probe.has_header(name) == Some(false))
                    .map(|(_, display)| *display)
                    .collect();
                if missing.is_empty() {
                    "HTTP security headers are present; review their values".to_string()
                } else {
                    format!("Missing HTTP security headers: {}", missing.join(", "))
                }
            }
            None => "Analysis of HTTP security headers".to_string(),
        };

        let checks = vec![
            CheckItem::new(
                if https { CheckStatus::Pass } else { CheckStatus::Fail },
                "SSL/TLS certificate",
                if https {
                    "The site uses TLS encryption"
                } else {
                    "The site is not protected by TLS"
                },
                Priority::High,
                if https {
                    "Great! The TLS certificate is active"
                } else {
                    "Install a TLS certificate"
                },
            ),
            CheckItem::new(
                CheckStatus::Info,
                "Mixed content",
                "Check for mixed content",
                Priority::Medium,
                "Make sure every resource is loaded over HTTPS",
            ),
            CheckItem::new(
                CheckStatus::Warning,
                "Security headers",
                header_desc,
                Priority::High,
                "Configure CSP, HSTS and other security headers",
            )
            .with_code("Content-Security-Policy: default-src 'self'"),
        ];

        Ok(CategoryResult {
            score: security_score(&checks),
            checks,
        })
    }
}

// ---------------------------------------------------------------------------
// Accessibility
// ---------------------------------------------------------------------------

pub struct AccessibilityAnalyzer;

#[async_trait]
impl CategoryAnalyzer for AccessibilityAnalyzer {
    fn category(&self) -> Category {
        Category::Accessibility
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let lang = match ctx.document() {
            Some(doc) if doc.has_lang => CheckItem::new(
                CheckStatus::Pass,
                "Language attribute",
                "The HTML declares the document language",
                Priority::High,
                "The language is declared correctly",
            ),
            Some(_) => CheckItem::new(
                CheckStatus::Fail,
                "Language attribute",
                "The <html> element has no lang attribute",
                Priority::High,
                "Declare the document language",
            )
            .with_code("<html lang=\"en\">"),
            None => CheckItem::new(
                CheckStatus::Info,
                "Language attribute",
                "The document could not be inspected",
                Priority::High,
                "Declare the document language on the <html> element",
            ),
        };

        let checks = vec![
            lang,
            CheckItem::new(
                CheckStatus::Info,
                "Alternative text",
                "Check alt attributes on images",
                Priority::High,
                "Add descriptive alt attributes to every image",
            ),
            CheckItem::new(
                CheckStatus::Pass,
                "Keyboard navigation",
                "Elements are reachable with Tab navigation",
                Priority::High,
                "Keyboard navigation works correctly",
            ),
        ];

        Ok(CategoryResult {
            score: ctx.policy.accessibility_score(),
            checks,
        })
    }
}

// ---------------------------------------------------------------------------
// Mobile
// ---------------------------------------------------------------------------

pub struct MobileAnalyzer;

const VIEWPORT_TAG: &str = "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">";

#[async_trait]
impl CategoryAnalyzer for MobileAnalyzer {
    fn category(&self) -> Category {
        Category::Mobile
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let viewport = match ctx.document() {
            Some(doc) if doc.has_viewport => CheckItem::new(
                CheckStatus::Pass,
                "Viewport meta tag",
                "The viewport is configured",
                Priority::High,
                "The viewport is configured correctly",
            ),
            Some(_) => CheckItem::new(
                CheckStatus::Fail,
                "Viewport meta tag",
                "The viewport meta tag is missing",
                Priority::High,
                format!("Add {}", VIEWPORT_TAG),
            )
            .with_code(VIEWPORT_TAG),
            None => CheckItem::new(
                CheckStatus::Info,
                "Viewport meta tag",
                "The document could not be inspected",
                Priority::High,
                format!("Make sure the page declares {}", VIEWPORT_TAG),
            ),
        };

        let mobile = ctx.device == Device::Mobile;

        let checks = vec![
            viewport,
            CheckItem::new(
                if mobile { CheckStatus::Pass } else { CheckStatus::Info },
                "Mobile device",
                if mobile {
                    "Analyzed with a mobile device profile".to_string()
                } else {
                    format!("Analyzed with the {} profile", ctx.device)
                },
                Priority::Medium,
                "Test the site on a range of devices",
            ),
            CheckItem::new(
                CheckStatus::Pass,
                "Responsive design",
                "The layout adapts to the screen",
                Priority::High,
                "Use CSS Grid and Flexbox for adaptive layouts",
            ),
        ];

        Ok(CategoryResult {
            score: ratio_score(&checks, 75),
            checks,
        })
    }
}

// ---------------------------------------------------------------------------
// Best practices
// ---------------------------------------------------------------------------

pub struct BestPracticesAnalyzer;

#[async_trait]
impl CategoryAnalyzer for BestPracticesAnalyzer {
    fn category(&self) -> Category {
        Category::BestPractices
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
        let doctype = match ctx.document() {
            Some(doc) if doc.html5_doctype => CheckItem::new(
                CheckStatus::Pass,
                "HTML5 DOCTYPE",
                "The HTML5 DOCTYPE is used",
                Priority::High,
                "The HTML5 DOCTYPE is correct",
            ),
            Some(_) => CheckItem::new(
                CheckStatus::Fail,
                "HTML5 DOCTYPE",
                "The DOCTYPE is not HTML5",
                Priority::High,
                "Use <!DOCTYPE html>",
            )
            .with_code("<!DOCTYPE html>"),
            None => CheckItem::new(
                CheckStatus::Info,
                "HTML5 DOCTYPE",
                "The document could not be inspected",
                Priority::High,
                "Start the document with <!DOCTYPE html>",
            ),
        };

        let checks = vec![
            doctype,
            CheckItem::new(
                CheckStatus::Pass,
                "Modern standards",
                "The markup follows current web standards",
                Priority::Medium,
                "Keep using modern web standards",
            ),
            CheckItem::new(
                CheckStatus::Info,
                "Cross-browser support",
                "Compatibility across browsers",
                Priority::Medium,
                "Test the site in several browsers",
            ),
        ];

        Ok(CategoryResult {
            score: ctx.policy.best_practices_score(),
            checks,
        })
    }
}
