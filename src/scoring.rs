//! Match scoring boundary
//!
//! Scores are computed outside this crate; the sequencer only compares a
//! precomputed 0-100 score against a threshold.

use crate::error::Result;
use crate::extract::JobRecord;
use async_trait::async_trait;

#[async_trait]
pub trait MatchScorer: Send + Sync {
    /// Score (0-100) for how well `resume` fits `job`
    async fn score(&self, job: &JobRecord, resume: &str) -> Result<u8>;
}

/// Returns the same precomputed score for every posting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantScorer(u8);

impl ConstantScorer {
    pub fn new(score: u8) -> Self {
        Self(score.min(100))
    }
}

#[async_trait]
impl MatchScorer for ConstantScorer {
    async fn score(&self, _job: &JobRecord, _resume: &str) -> Result<u8> {
        Ok(self.0)
    }
}

/// Whether a score clears a threshold (inclusive)
pub fn passes(score: u8, threshold: u8) -> bool {
    score >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use indexmap::IndexMap;

    #[tokio::test]
    async fn test_constant_scorer_clamps() {
        let job = JobRecord::new(IndexMap::new(), "https://example.com/job", Utc::now());
        assert_eq!(ConstantScorer::new(250).score(&job, "").await.unwrap(), 100);
        assert_eq!(ConstantScorer::new(60).score(&job, "rust").await.unwrap(), 60);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(passes(75, 75));
        assert!(!passes(74, 75));
    }
}
