//! Score aggregation and statistics.
//!
//! Pure functions over [`CategoryScores`] that derive the report-level
//! numbers and the figures the terminal summary prints.

use crate::models::{AnalysisReport, Category, CategoryScores, CheckStatus};

/// Total and passed check counts across all categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckTally {
    pub total: usize,
    pub passed: usize,
}

/// Count of checks per status across all categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub pass: usize,
    pub warning: usize,
    pub fail: usize,
    pub info: usize,
}

/// Rounded arithmetic mean of the category scores, 0 when there are none.
pub fn overall_score(scores: &CategoryScores) -> u8 {
    if scores.is_empty() {
        return 0;
    }
    let sum: u32 = scores.iter().map(|(_, r)| u32::from(r.score)).sum();
    (f64::from(sum) / scores.len() as f64).round() as u8
}

pub fn tally_checks(scores: &CategoryScores) -> CheckTally {
    scores.iter().fold(CheckTally::default(), |tally, (_, result)| CheckTally {
        total: tally.total + result.checks.len(),
        passed: tally.passed + result.count(CheckStatus::Pass),
    })
}

/// Recompute the derived fields of a report from its scores.
///
/// Safe to call any number of times.
pub fn finalize(report: &mut AnalysisReport) {
    let tally = tally_checks(&report.scores);
    report.overall_score = overall_score(&report.scores);
    report.total_checks = tally.total;
    report.passed_checks = tally.passed;
}

pub fn status_breakdown(scores: &CategoryScores) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown::default();
    for (_, result) in scores.iter() {
        for check in &result.checks {
            match check.status {
                CheckStatus::Pass => breakdown.pass += 1,
                CheckStatus::Warning => breakdown.warning += 1,
                CheckStatus::Fail => breakdown.fail += 1,
                CheckStatus::Info => breakdown.info += 1,
            }
        }
    }
    breakdown
}

/// Lowest scoring category; the first one wins on ties.
pub fn weakest_category(scores: &CategoryScores) -> Option<(Category, u8)> {
    scores
        .iter()
        .map(|(category, result)| (category, result.score))
        .fold(None, |lowest, (category, score)| match lowest {
            Some((_, low)) if low <= score => lowest,
            _ => Some((category, score)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryResult, CheckItem, Device, Priority};

    fn result(score: u8, statuses: &[CheckStatus]) -> CategoryResult {
        CategoryResult {
            score,
            checks: statuses
                .iter()
                .map(|s| CheckItem::new(*s, "check", "desc", Priority::Medium, "fix"))
                .collect(),
        }
    }

    fn sample_scores() -> CategoryScores {
        let mut scores = CategoryScores::new();
        scores.insert(
            Category::Seo,
            result(50, &[CheckStatus::Pass, CheckStatus::Info, CheckStatus::Warning]),
        );
        scores.insert(Category::Security, result(90, &[CheckStatus::Pass, CheckStatus::Warning]));
        scores.insert(Category::Accessibility, result(85, &[CheckStatus::Fail]));
        scores
    }

    #[test]
    fn test_overall_score_is_rounded_mean() {
        // (50 + 90 + 85) / 3 = 75
        assert_eq!(overall_score(&sample_scores()), 75);

        let mut scores = CategoryScores::new();
        scores.insert(Category::Seo, result(50, &[]));
        scores.insert(Category::Mobile, result(67, &[]));
        // 58.5 rounds up
        assert_eq!(overall_score(&scores), 59);
    }

    #[test]
    fn test_overall_score_empty() {
        assert_eq!(overall_score(&CategoryScores::new()), 0);
    }

    #[test]
    fn test_tally_checks() {
        let tally = tally_checks(&sample_scores());
        assert_eq!(tally, CheckTally { total: 6, passed: 2 });
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut report = AnalysisReport::new("https://example.com/".to_string(), Device::Desktop);
        report.scores = sample_scores();

        finalize(&mut report);
        let first = report.clone();
        finalize(&mut report);

        assert_eq!(report, first);
        assert_eq!(report.overall_score, 75);
        assert_eq!(report.total_checks, 6);
        assert_eq!(report.passed_checks, 2);
    }

    #[test]
    fn test_status_breakdown() {
        let breakdown = status_breakdown(&sample_scores());
        assert_eq!(
            breakdown,
            StatusBreakdown {
                pass: 2,
                warning: 2,
                fail: 1,
                info: 1
            }
        );
    }

    #[test]
    fn test_weakest_category() {
        assert_eq!(weakest_category(&sample_scores()), Some((Category::Seo, 50)));
        assert_eq!(weakest_category(&CategoryScores::new()), None);

        let mut tied = CategoryScores::new();
        tied.insert(Category::Mobile, result(70, &[]));
        tied.insert(Category::Performance, result(70, &[]));
        assert_eq!(weakest_category(&tied), Some((Category::Mobile, 70)));
    }
}
