//! Data models for the website analyzer.
//!
//! This module contains the core data structures shared by the
//! orchestrator, the category analyzers and the report renderers.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One analysis dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Performance,
    Seo,
    Security,
    Accessibility,
    Mobile,
    #[value(alias = "bestpractices")]
    BestPractices,
}

impl Category {
    /// Every category, in the order the selection form lists them.
    pub const ALL: [Category; 6] = [
        Category::Performance,
        Category::Seo,
        Category::Security,
        Category::Accessibility,
        Category::Mobile,
        Category::BestPractices,
    ];

    /// Key used in the `scores` map of an exported report.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Performance => "performance",
            Category::Seo => "seo",
            Category::Security => "security",
            Category::Accessibility => "accessibility",
            Category::Mobile => "mobile",
            Category::BestPractices => "bestPractices",
        }
    }

    /// Parses a `scores` map key back into a category.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Human readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Performance => "Performance",
            Category::Seo => "SEO",
            Category::Security => "Security",
            Category::Accessibility => "Accessibility",
            Category::Mobile => "Mobile",
            Category::BestPractices => "Best Practices",
        }
    }

    /// Returns an emoji representation of the category.
    pub fn icon(&self) -> &'static str {
        match self {
            Category::Performance => "⚡",
            Category::Seo => "🔍",
            Category::Security => "🔒",
            Category::Accessibility => "♿",
            Category::Mobile => "📱",
            Category::BestPractices => "✨",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Device profile the site is analyzed for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Desktop => write!(f, "desktop"),
            Device::Mobile => write!(f, "mobile"),
            Device::Tablet => write!(f, "tablet"),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Fail,
    /// Informational only; never counted when computing ratio scores.
    Info,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "pass"),
            CheckStatus::Warning => write!(f, "warning"),
            CheckStatus::Fail => write!(f, "fail"),
            CheckStatus::Info => write!(f, "info"),
        }
    }
}

impl CheckStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "✅",
            CheckStatus::Warning => "⚠️",
            CheckStatus::Fail => "❌",
            CheckStatus::Info => "ℹ️",
        }
    }

    /// Whether the check ends up in the recommendations view.
    pub fn needs_attention(&self) -> bool {
        matches!(self, CheckStatus::Fail | CheckStatus::Warning)
    }
}

/// Priority of a check's remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl Priority {
    /// Capitalized label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

/// A single finding within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    /// Outcome of the check.
    pub status: CheckStatus,
    /// Short title of the check.
    pub title: String,
    /// What was observed.
    pub desc: String,
    /// Priority of fixing it.
    pub priority: Priority,
    /// Suggested fix or confirmation text.
    pub solution: String,
    /// Literal remediation snippet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CheckItem {
    pub fn new(
        status: CheckStatus,
        title: impl Into<String>,
        desc: impl Into<String>,
        priority: Priority,
        solution: impl Into<String>,
    ) -> Self {
        Self {
            status,
            title: title.into(),
            desc: desc.into(),
            priority,
            solution: solution.into(),
            code: None,
        }
    }

    /// Attaches a remediation snippet.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Result of one category analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Category score, 0-100.
    pub score: u8,
    /// Checks in display order.
    pub checks: Vec<CheckItem>,
}

impl CategoryResult {
    /// Number of checks with the given status.
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

/// Insertion-ordered map from category to its result.
///
/// Serialized as a JSON object keyed by [`Category::key`]; the key order is
/// the order in which results were inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryScores {
    entries: Vec<(Category, CategoryResult)>,
}

impl CategoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a result, replacing any previous result for the category
    /// in place.
    pub fn insert(&mut self, category: Category, result: CategoryResult) {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some(slot) => slot.1 = result,
            None => self.entries.push((category, result)),
        }
    }

    pub fn get(&self, category: Category) -> Option<&CategoryResult> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryResult)> {
        self.entries.iter().map(|(c, r)| (*c, r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, result) in &self.entries {
            map.serialize_entry(category.key(), result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = CategoryScores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category keys to category results")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scores = CategoryScores::new();
                while let Some(key) = access.next_key::<String>()? {
                    let category = Category::from_key(&key).ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown category key: {}", key))
                    })?;
                    let result: CategoryResult = access.next_value()?;
                    scores.insert(category, result);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// HTTP status reported by the reachability probe.
///
/// Serialized as the bare status code, or as one of the markers
/// `"timeout"`, `"opaque"`, `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HttpStatus {
    Code(u16),
    Marker(StatusMarker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusMarker {
    /// No response within the probe bound.
    Timeout,
    /// The server answered but the response could not be observed.
    Opaque,
    Unknown,
}

impl HttpStatus {
    pub const TIMEOUT: HttpStatus = HttpStatus::Marker(StatusMarker::Timeout);
    pub const OPAQUE: HttpStatus = HttpStatus::Marker(StatusMarker::Opaque);
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpStatus::Code(code) => write!(f, "{}", code),
            HttpStatus::Marker(StatusMarker::Timeout) => write!(f, "timeout"),
            HttpStatus::Marker(StatusMarker::Opaque) => write!(f, "opaque"),
            HttpStatus::Marker(StatusMarker::Unknown) => write!(f, "unknown"),
        }
    }
}

/// A category whose analyzer failed under the best-effort join policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category: Category,
    pub reason: String,
}

/// The complete analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Normalized, protocol-qualified URL.
    pub url: String,
    /// Device profile used for the run.
    pub device: Device,
    /// Local display timestamp.
    pub timestamp: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Mean of all category scores.
    pub overall_score: u8,
    /// Category results in completion order.
    pub scores: CategoryScores,
    pub total_checks: usize,
    pub passed_checks: usize,
    /// Whether the reachability probe reached the site.
    pub website_accessible: bool,
    /// Time to response headers in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<HttpStatus>,
    /// Probe error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_categories: Vec<SkippedCategory>,
}

impl AnalysisReport {
    /// Creates an empty report for a run that starts now.
    pub fn new(url: String, device: Device) -> Self {
        let now = chrono::Local::now();
        Self {
            url,
            device,
            timestamp: now.format("%d.%m.%Y, %H:%M:%S").to_string(),
            analysis_date: now.with_timezone(&Utc),
            overall_score: 0,
            scores: CategoryScores::new(),
            total_checks: 0,
            passed_checks: 0,
            website_accessible: false,
            response_time: None,
            http_status: None,
            error: None,
            skipped_categories: Vec::new(),
        }
    }

    /// Every check across all categories, in traversal order.
    pub fn all_checks(&self) -> impl Iterator<Item = (Category, &CheckItem)> {
        self.scores
            .iter()
            .flat_map(|(category, result)| result.checks.iter().map(move |c| (category, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: u8, statuses: &[CheckStatus]) -> CategoryResult {
        CategoryResult {
            score,
            checks: statuses
                .iter()
                .map(|s| CheckItem::new(*s, "Check", "desc", Priority::Medium, "fix"))
                .collect(),
        }
    }

    #[test]
    fn test_category_keys_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_key(category.key()), Some(category));
        }
        assert_eq!(Category::BestPractices.key(), "bestPractices");
        assert_eq!(Category::from_key("bestpractices"), None);
    }

    #[test]
    fn test_scores_keep_insertion_order() {
        let mut scores = CategoryScores::new();
        scores.insert(Category::Security, result(90, &[CheckStatus::Pass]));
        scores.insert(Category::Performance, result(70, &[CheckStatus::Fail]));
        scores.insert(Category::Security, result(60, &[CheckStatus::Fail]));

        let order: Vec<_> = scores.iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec![Category::Security, Category::Performance]);
        assert_eq!(scores.get(Category::Security).map(|r| r.score), Some(60));
    }

    #[test]
    fn test_scores_serialize_as_ordered_object() {
        let mut scores = CategoryScores::new();
        scores.insert(Category::Mobile, result(75, &[]));
        scores.insert(Category::BestPractices, result(88, &[]));

        let json = serde_json::to_string(&scores).unwrap();
        assert!(json.find("\"mobile\"").unwrap() < json.find("\"bestPractices\"").unwrap());

        let back: CategoryScores = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scores);
    }

    #[test]
    fn test_unknown_category_key_is_rejected() {
        let err = serde_json::from_str::<CategoryScores>(r#"{"speed":{"score":1,"checks":[]}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_http_status_serialization() {
        assert_eq!(serde_json::to_string(&HttpStatus::Code(200)).unwrap(), "200");
        assert_eq!(
            serde_json::to_string(&HttpStatus::TIMEOUT).unwrap(),
            "\"timeout\""
        );
        let parsed: HttpStatus = serde_json::from_str("\"opaque\"").unwrap();
        assert_eq!(parsed, HttpStatus::OPAQUE);
        let parsed: HttpStatus = serde_json::from_str("404").unwrap();
        assert_eq!(parsed, HttpStatus::Code(404));
    }

    #[test]
    fn test_category_result_counts() {
        let r = result(
            50,
            &[
                CheckStatus::Pass,
                CheckStatus::Info,
                CheckStatus::Warning,
                CheckStatus::Pass,
            ],
        );
        assert_eq!(r.count(CheckStatus::Pass), 2);
        assert_eq!(r.count(CheckStatus::Info), 1);
    }

    #[test]
    fn test_report_uses_camel_case_keys() {
        let report = AnalysisReport::new("https://example.com/".to_string(), Device::Tablet);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("overallScore").is_some());
        assert!(json.get("analysisDate").is_some());
        assert!(json.get("websiteAccessible").is_some());
        assert_eq!(json["device"], "tablet");
        assert!(json.get("skippedCategories").is_none());
    }

    #[test]
    fn test_status_emoji() {
        assert_eq!(CheckStatus::Pass.emoji(), "✅");
        assert_eq!(CheckStatus::Fail.emoji(), "❌");
        assert!(CheckStatus::Warning.needs_attention());
        assert!(!CheckStatus::Info.needs_attention());
    }
}
