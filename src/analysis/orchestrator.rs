//! Analysis orchestration.
//!
//! Runs the reachability probe, fans the selected category analyzers out
//! concurrently and joins their results into one [`AnalysisReport`].

use crate::analysis::aggregator;
use crate::analysis::analyzers::{analyzer_for, AnalysisContext, CategoryAnalyzer};
use crate::analysis::policy::ScoringPolicy;
use crate::input::{AnalysisRequest, InputError};
use crate::models::{
    AnalysisReport, Category, CategoryResult, Device, HttpStatus, SkippedCategory, StatusMarker,
};
use crate::probe::{Probe, ProbeError, ProbeOutcome};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What a run does when the probe or an analyzer fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum JoinPolicy {
    /// Any failure aborts the run and no report is produced
    #[default]
    AllOrNothing,
    /// Failures are recorded on the report and the rest is aggregated
    BestEffort,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Unreachable(#[from] ProbeError),

    #[error("Timed out waiting for {url}: {reason}")]
    Timeout { url: String, reason: String },

    #[error("{category} analysis failed: {reason}")]
    AnalyzerFailed { category: Category, reason: String },
}

/// Receives a short description of each step as the run advances.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

pub struct Orchestrator {
    probe: Arc<dyn Probe>,
    policy: Arc<dyn ScoringPolicy>,
    join: JoinPolicy,
    overrides: HashMap<Category, Arc<dyn CategoryAnalyzer>>,
    progress: Option<ProgressFn>,
}

impl Orchestrator {
    pub fn new(probe: Arc<dyn Probe>, policy: Arc<dyn ScoringPolicy>, join: JoinPolicy) -> Self {
        Self {
            probe,
            policy,
            join,
            overrides: HashMap::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    fn step(&self, message: &str) {
        if let Some(ref progress) = self.progress {
            progress(message);
        }
    }

    /// Replace the built-in analyzer for the analyzer's category.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn CategoryAnalyzer>) -> Self {
        self.overrides.insert(analyzer.category(), analyzer);
        self
    }

    fn analyzer(&self, category: Category) -> Arc<dyn CategoryAnalyzer> {
        self.overrides
            .get(&category)
            .cloned()
            .unwrap_or_else(|| Arc::from(analyzer_for(category)))
    }

    /// Validate raw input and run it.
    pub async fn analyze(
        &self,
        raw_url: &str,
        picked: Option<&[Category]>,
        skipped: &[Category],
        device: Device,
    ) -> Result<AnalysisReport, AnalysisError> {
        let request = AnalysisRequest::build(raw_url, picked, skipped, device)?;
        self.run(&request).await
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        info!(
            "Analyzing {} for {} ({} categories, {:?})",
            request.url,
            request.device,
            request.categories.len(),
            self.join
        );

        let mut report = AnalysisReport::new(request.url.to_string(), request.device);
        self.step("Checking site accessibility");
        let probe = self.probe_site(request, &mut report).await?;

        let ctx = AnalysisContext {
            url: request.url.clone(),
            device: request.device,
            probe,
            policy: Arc::clone(&self.policy),
        };

        let analyzers: Vec<(Category, Arc<dyn CategoryAnalyzer>)> = request
            .categories
            .iter()
            .map(|category| (category, self.analyzer(category)))
            .collect();

        let mut pending: FuturesUnordered<_> = analyzers
            .iter()
            .map(|(category, analyzer)| {
                let ctx = &ctx;
                async move { (*category, analyzer.analyze(ctx).await) }
            })
            .collect();

        let total = analyzers.len();
        let mut done = 0;
        self.step(&format!("Running {} analyzers", total));

        while let Some((category, outcome)) = pending.next().await {
            done += 1;
            self.step(&format!("Analyzed {} ({}/{})", category.title(), done, total));
            match outcome {
                Ok(result) => self.record(&mut report, category, result),
                Err(e) => match self.join {
                    JoinPolicy::AllOrNothing => {
                        return Err(AnalysisError::AnalyzerFailed {
                            category,
                            reason: e.to_string(),
                        });
                    }
                    JoinPolicy::BestEffort => {
                        warn!("Skipping {}: {}", category, e);
                        report.skipped_categories.push(SkippedCategory {
                            category,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        self.step("Computing scores");
        aggregator::finalize(&mut report);
        info!(
            "Analysis complete: overall {} ({} of {} checks passed)",
            report.overall_score, report.passed_checks, report.total_checks
        );

        Ok(report)
    }

    fn record(&self, report: &mut AnalysisReport, category: Category, result: CategoryResult) {
        debug!(
            "{} finished with score {} ({} checks)",
            category,
            result.score,
            result.checks.len()
        );
        report.scores.insert(category, result);
    }

    /// Run the probe and seed the report with its outcome.
    async fn probe_site(
        &self,
        request: &AnalysisRequest,
        report: &mut AnalysisReport,
    ) -> Result<Option<ProbeOutcome>, AnalysisError> {
        match self.probe.probe(&request.url, request.device).await {
            Ok(outcome) if outcome.timed_out() && self.join == JoinPolicy::AllOrNothing => {
                Err(AnalysisError::Timeout {
                    url: request.url.to_string(),
                    reason: outcome
                        .error
                        .unwrap_or_else(|| "no response".to_string()),
                })
            }
            Ok(outcome) => {
                report.website_accessible = outcome.accessible;
                report.response_time = Some(outcome.response_time_ms);
                report.http_status = Some(outcome.status);
                report.error = outcome.error.clone();
                Ok(Some(outcome))
            }
            Err(e) if self.join == JoinPolicy::AllOrNothing => Err(AnalysisError::Unreachable(e)),
            Err(e) => {
                warn!("Continuing without probe data: {}", e);
                report.website_accessible = false;
                report.response_time = Some(e.elapsed_ms);
                report.http_status = Some(HttpStatus::Marker(StatusMarker::Unknown));
                report.error = Some(e.to_string());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzers::tests::reachable;
    use crate::analysis::analyzers::AnalyzerError;
    use crate::analysis::policy::FixedPolicy;
    use crate::models::CheckStatus;
    use crate::probe::DocumentSignals;
    use async_trait::async_trait;
    use std::time::Duration;
    use url::Url;

    struct FakeProbe(Result<ProbeOutcome, ProbeError>);

    #[async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, _url: &Url, _device: Device) -> Result<ProbeOutcome, ProbeError> {
            self.0.clone()
        }
    }

    struct FailingAnalyzer(Category);

    #[async_trait]
    impl CategoryAnalyzer for FailingAnalyzer {
        fn category(&self) -> Category {
            self.0
        }

        async fn analyze(&self, _ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
            Err(AnalyzerError("boom".to_string()))
        }
    }

    struct SlowAnalyzer(Category);

    #[async_trait]
    impl CategoryAnalyzer for SlowAnalyzer {
        fn category(&self) -> Category {
            self.0
        }

        async fn analyze(&self, _ctx: &AnalysisContext) -> Result<CategoryResult, AnalyzerError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(CategoryResult {
                score: 42,
                checks: Vec::new(),
            })
        }
    }

    fn full_document() -> DocumentSignals {
        DocumentSignals {
            has_lang: true,
            has_viewport: true,
            html5_doctype: true,
        }
    }

    fn timeout_outcome() -> ProbeOutcome {
        ProbeOutcome {
            accessible: false,
            response_time_ms: 10_000,
            load_time_ms: None,
            status: HttpStatus::TIMEOUT,
            headers: None,
            document: None,
            error: Some("No response within 10000ms".to_string()),
        }
    }

    fn orchestrator(probe: Result<ProbeOutcome, ProbeError>, join: JoinPolicy) -> Orchestrator {
        Orchestrator::new(
            Arc::new(FakeProbe(probe)),
            Arc::new(FixedPolicy::default()),
            join,
        )
    }

    #[tokio::test]
    async fn test_example_com_all_categories() {
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::AllOrNothing,
        );
        let report = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap();

        assert_eq!(report.url, "https://example.com/");
        assert!(report.website_accessible);
        assert_eq!(report.http_status, Some(HttpStatus::Code(200)));
        assert_eq!(report.response_time, Some(120));
        assert_eq!(report.scores.len(), 6);

        let security = report.scores.get(Category::Security).unwrap();
        assert_eq!(security.checks[0].status, CheckStatus::Pass);
        let seo = report.scores.get(Category::Seo).unwrap();
        assert_eq!(seo.checks[0].status, CheckStatus::Pass);

        // 100 + 50 + 90 + 85 + 100 + 88 = 513, mean 85.5
        assert_eq!(report.overall_score, 86);
        assert_eq!(report.total_checks, report.all_checks().count());
        assert!(report.skipped_categories.is_empty());
    }

    #[tokio::test]
    async fn test_selected_categories_only() {
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::AllOrNothing,
        );
        let report = orch
            .analyze(
                "https://example.com",
                Some(&[Category::Seo, Category::Security]),
                &[],
                Device::Desktop,
            )
            .await
            .unwrap();

        assert_eq!(report.scores.len(), 2);
        assert!(report.scores.get(Category::Performance).is_none());
        assert_eq!(report.overall_score, 70);
        assert_eq!(report.total_checks, 7);
    }

    #[tokio::test]
    async fn test_invalid_input_runs_nothing() {
        let orch = orchestrator(Ok(timeout_outcome()), JoinPolicy::AllOrNothing);
        let err = orch
            .analyze("http://", None, &[], Device::Desktop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Input(InputError::InvalidUrl(_))));

        let err = orch
            .analyze("example.com", None, &Category::ALL, Device::Desktop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Input(InputError::NoCategories)));
    }

    #[tokio::test]
    async fn test_timeout_aborts_all_or_nothing() {
        let orch = orchestrator(Ok(timeout_outcome()), JoinPolicy::AllOrNothing);
        let err = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_timeout_recorded_best_effort() {
        let orch = orchestrator(Ok(timeout_outcome()), JoinPolicy::BestEffort);
        let report = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap();
        assert!(!report.website_accessible);
        assert_eq!(report.http_status, Some(HttpStatus::TIMEOUT));
        assert!(report.error.is_some());
        assert_eq!(report.scores.len(), 6);
    }

    #[tokio::test]
    async fn test_network_failure_per_policy() {
        let failure = || {
            Err(ProbeError {
                reason: "connection refused".to_string(),
                elapsed_ms: 3,
            })
        };

        let err = orchestrator(failure(), JoinPolicy::AllOrNothing)
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unreachable(_)));

        let report = orchestrator(failure(), JoinPolicy::BestEffort)
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap();
        assert!(!report.website_accessible);
        assert_eq!(
            report.error.as_deref(),
            Some("Site unreachable: connection refused")
        );
        assert_eq!(report.http_status, Some(HttpStatus::Marker(StatusMarker::Unknown)));
    }

    #[tokio::test]
    async fn test_failing_analyzer_aborts_all_or_nothing() {
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::AllOrNothing,
        )
        .with_analyzer(Arc::new(FailingAnalyzer(Category::Mobile)));

        let err = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap_err();
        match err {
            AnalysisError::AnalyzerFailed { category, reason } => {
                assert_eq!(category, Category::Mobile);
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_analyzer_skipped_best_effort() {
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::BestEffort,
        )
        .with_analyzer(Arc::new(FailingAnalyzer(Category::Mobile)));

        let report = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap();

        assert_eq!(report.scores.len(), 5);
        assert!(report.scores.get(Category::Mobile).is_none());
        assert_eq!(
            report.skipped_categories,
            vec![SkippedCategory {
                category: Category::Mobile,
                reason: "boom".to_string()
            }]
        );
        assert_eq!(report.overall_score, aggregator::overall_score(&report.scores));
    }

    #[tokio::test]
    async fn test_progress_steps() {
        let steps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&steps);
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::AllOrNothing,
        )
        .with_progress(move |step| sink.lock().unwrap().push(step.to_string()));

        orch.analyze("example.com", Some(&[Category::Seo]), &[], Device::Desktop)
            .await
            .unwrap();

        assert_eq!(
            *steps.lock().unwrap(),
            vec![
                "Checking site accessibility",
                "Running 1 analyzers",
                "Analyzed SEO (1/1)",
                "Computing scores"
            ]
        );
    }

    #[tokio::test]
    async fn test_scores_follow_completion_order() {
        let orch = orchestrator(
            Ok(reachable(120, 300, full_document())),
            JoinPolicy::AllOrNothing,
        )
        .with_analyzer(Arc::new(SlowAnalyzer(Category::Performance)));

        let report = orch
            .analyze("example.com", None, &[], Device::Desktop)
            .await
            .unwrap();

        let last = report.scores.iter().last().map(|(c, _)| c);
        assert_eq!(last, Some(Category::Performance));
        assert_eq!(report.scores.get(Category::Performance).unwrap().score, 42);
    }
}
