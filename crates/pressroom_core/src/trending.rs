//! crates/pressroom_core/src/trending.rs
//!
//! Trend-score math: a log-scaled vote score with a half-life-like decay.
//! Log-scaling keeps vote-count outliers from dominating indefinitely; the
//! decay halves roughly every 12 hours and is floored so old high-scoring
//! articles never fully vanish from ranking.

use chrono::{DateTime, Utc};

/// Hours for the decay denominator; the decay halves roughly this often.
pub const DECAY_HALF_LIFE_HOURS: f64 = 12.0;

/// Decay never drops below this floor.
pub const DECAY_FLOOR: f64 = 0.1;

/// Score above which an article counts as trending.
pub const TRENDING_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendScore {
    pub score: f64,
    pub is_trending: bool,
}

/// Computes the decayed trend score for an article.
///
/// `basis` is the publish date, falling back to creation time for
/// articles that predate the approval workflow.
pub fn trend_score(upvotes: i64, vote_score: i64, basis: DateTime<Utc>, now: DateTime<Utc>) -> TrendScore {
    let hours = (now - basis).num_seconds().max(0) as f64 / 3600.0;
    let log_score = if vote_score > 0 {
        (vote_score as f64 + 1.0).ln()
    } else {
        0.0
    };
    let time_decay = (1.0 / (1.0 + hours / DECAY_HALF_LIFE_HOURS)).max(DECAY_FLOOR);
    let score = log_score * time_decay + upvotes as f64 * 0.1 * time_decay;

    TrendScore {
        score,
        is_trending: score > TRENDING_THRESHOLD && vote_score > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn six_hour_old_article_with_strong_votes_is_trending() {
        let now = Utc::now();
        let basis = now - Duration::hours(6);
        // upvotes=15, downvotes=2 -> vote_score=13
        let ts = trend_score(15, 13, basis, now);
        // ln(14) * (1/1.5) + 15 * 0.1 * (1/1.5) ~= 2.76
        assert!((ts.score - 2.76).abs() < 0.01, "score was {}", ts.score);
        assert!(ts.is_trending);
    }

    #[test]
    fn score_decreases_monotonically_with_age() {
        let now = Utc::now();
        let mut last = f64::INFINITY;
        for hours in [0, 1, 6, 12, 24, 72, 240] {
            let ts = trend_score(20, 18, now - Duration::hours(hours), now);
            assert!(ts.score < last, "score did not decay at {} hours", hours);
            last = ts.score;
        }
    }

    #[test]
    fn decay_is_floored_for_very_old_articles() {
        let now = Utc::now();
        let ancient = trend_score(50, 45, now - Duration::days(365), now);
        let floor = ((45f64 + 1.0).ln() + 50.0 * 0.1) * DECAY_FLOOR;
        assert!((ancient.score - floor).abs() < 1e-9);
    }

    #[test]
    fn never_trending_without_positive_score() {
        let now = Utc::now();
        let ts = trend_score(0, 0, now, now);
        assert_eq!(ts.score, 0.0);
        assert!(!ts.is_trending);

        // Heavily downvoted: score contribution from upvotes alone can
        // exceed the threshold, but a non-positive vote_score blocks it.
        let ts = trend_score(30, -5, now, now);
        assert!(ts.score > TRENDING_THRESHOLD);
        assert!(!ts.is_trending);
    }

    #[test]
    fn future_basis_clamps_to_zero_hours() {
        let now = Utc::now();
        let ts = trend_score(10, 8, now + Duration::hours(2), now);
        let fresh = trend_score(10, 8, now, now);
        assert_eq!(ts.score, fresh.score);
    }
}
