//! crates/pressroom_core/src/analytics.rs
//!
//! Aggregate formulas over the event ledger. Real-time article counters and
//! daily rollup rows both derive from raw events with the same arithmetic;
//! the rollup just scopes the input to a single calendar date. Anonymous
//! events never count.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{ArticleEvent, DailyAnalytics, EventType};

/// Read times under this many seconds count as a bounce.
pub const BOUNCE_READ_TIME_SECONDS: i32 = 10;

/// Real-time engagement counters for one article, recomputed from the
/// event ledger on every write. `total_saves` is overwritten from the
/// saved relation by the engine; the event-derived value only stands in
/// when no relation count is available.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngagementTotals {
    pub total_views: i64,
    pub unique_views: i64,
    pub total_shares: i64,
    pub total_saves: i64,
    pub total_comments: i64,
    pub avg_read_time: f64,
    pub bounce_rate: f64,
    pub engagement: f64,
}

/// Computes real-time counters from an article's events, counting only
/// authenticated actors.
pub fn engagement_totals(events: &[ArticleEvent]) -> EngagementTotals {
    let counted: Vec<&ArticleEvent> = events.iter().filter(|e| e.user_id.is_some()).collect();

    let views: Vec<&&ArticleEvent> = counted
        .iter()
        .filter(|e| e.event_type == EventType::View)
        .collect();
    let unique_viewers: HashSet<Uuid> = views.iter().filter_map(|e| e.user_id).collect();

    let count_of = |ty: EventType| counted.iter().filter(|e| e.event_type == ty).count() as i64;
    let total_views = views.len() as i64;
    let total_shares = count_of(EventType::Share);
    let total_saves = count_of(EventType::Save);
    let total_comments = count_of(EventType::Comment);

    EngagementTotals {
        total_views,
        unique_views: unique_viewers.len() as i64,
        total_shares,
        total_saves,
        total_comments,
        avg_read_time: average_read_time(&views),
        bounce_rate: bounce_rate(&views),
        engagement: engagement_rate(total_views, total_shares, total_saves, total_comments),
    }
}

/// Groups one day's events into rollup rows, one per (article, account)
/// pair with at least one authenticated event. The output is a pure
/// function of the input events, so re-running for the same date is an
/// idempotent overwrite.
pub fn daily_rollups(date: NaiveDate, events: &[ArticleEvent]) -> Vec<DailyAnalytics> {
    let mut by_article: BTreeMap<(Uuid, Uuid), Vec<&ArticleEvent>> = BTreeMap::new();
    for event in events {
        if event.user_id.is_none() || event.created_at.date_naive() != date {
            continue;
        }
        by_article
            .entry((event.article_id, event.account_id))
            .or_default()
            .push(event);
    }

    by_article
        .into_iter()
        .map(|((article_id, account_id), day_events)| {
            let views: Vec<&&ArticleEvent> = day_events
                .iter()
                .filter(|e| e.event_type == EventType::View)
                .collect();
            let unique_viewers: HashSet<Uuid> = views.iter().filter_map(|e| e.user_id).collect();
            let count_of =
                |ty: EventType| day_events.iter().filter(|e| e.event_type == ty).count() as i64;

            DailyAnalytics {
                article_id,
                account_id,
                date,
                views: views.len() as i64,
                unique_views: unique_viewers.len() as i64,
                shares: count_of(EventType::Share),
                saves: count_of(EventType::Save),
                comments: count_of(EventType::Comment),
                likes: count_of(EventType::Like),
                votes: count_of(EventType::Upvote) + count_of(EventType::Downvote),
                avg_read_time: average_read_time(&views),
                avg_scroll_percentage: average_scroll(&views),
                bounce_rate: bounce_rate(&views),
            }
        })
        .collect()
}

/// Average read time over view events that reported a positive read time.
fn average_read_time(views: &[&&ArticleEvent]) -> f64 {
    let timed: Vec<i32> = views
        .iter()
        .filter_map(|e| e.read_time_seconds)
        .filter(|&t| t > 0)
        .collect();
    if timed.is_empty() {
        0.0
    } else {
        timed.iter().map(|&t| t as f64).sum::<f64>() / timed.len() as f64
    }
}

/// Average scroll depth over view events that reported one.
fn average_scroll(views: &[&&ArticleEvent]) -> f64 {
    let scrolled: Vec<f64> = views.iter().filter_map(|e| e.scroll_percentage).collect();
    if scrolled.is_empty() {
        0.0
    } else {
        scrolled.iter().sum::<f64>() / scrolled.len() as f64
    }
}

/// Percentage of views that bounced. A view with no reported read time
/// counts as a bounce.
fn bounce_rate(views: &[&&ArticleEvent]) -> f64 {
    if views.is_empty() {
        return 0.0;
    }
    let bounces = views
        .iter()
        .filter(|e| e.read_time_seconds.unwrap_or(0) < BOUNCE_READ_TIME_SECONDS)
        .count();
    bounces as f64 * 100.0 / views.len() as f64
}

/// Legacy engagement rate: interactions per hundred views.
fn engagement_rate(views: i64, shares: i64, saves: i64, comments: i64) -> f64 {
    if views > 0 {
        (shares + saves + comments) as f64 * 100.0 / views as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(
        article_id: Uuid,
        user_id: Option<Uuid>,
        event_type: EventType,
        read_time: Option<i32>,
    ) -> ArticleEvent {
        ArticleEvent {
            id: Uuid::new_v4(),
            article_id,
            account_id: Uuid::nil(),
            user_id,
            event_type,
            read_time_seconds: read_time,
            scroll_percentage: None,
            metadata: serde_json::Value::Null,
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn totals_count_only_authenticated_events() {
        let article = Uuid::new_v4();
        let reader = Uuid::new_v4();
        let events = vec![
            event(article, Some(reader), EventType::View, Some(45)),
            event(article, None, EventType::View, Some(200)),
            event(article, Some(reader), EventType::Share, None),
        ];

        let totals = engagement_totals(&events);
        assert_eq!(totals.total_views, 1);
        assert_eq!(totals.unique_views, 1);
        assert_eq!(totals.total_shares, 1);
        assert_eq!(totals.avg_read_time, 45.0);
    }

    #[test]
    fn bounce_rate_counts_short_and_missing_read_times() {
        let article = Uuid::new_v4();
        let events = vec![
            event(article, Some(Uuid::new_v4()), EventType::View, Some(3)),
            event(article, Some(Uuid::new_v4()), EventType::View, None),
            event(article, Some(Uuid::new_v4()), EventType::View, Some(60)),
            event(article, Some(Uuid::new_v4()), EventType::View, Some(120)),
        ];

        let totals = engagement_totals(&events);
        assert_eq!(totals.bounce_rate, 50.0);
        // Only the two positive read times feed the average.
        assert_eq!(totals.avg_read_time, (3.0 + 60.0 + 120.0) / 3.0);
    }

    #[test]
    fn engagement_rate_is_interactions_per_hundred_views() {
        let article = Uuid::new_v4();
        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(event(article, Some(Uuid::new_v4()), EventType::View, Some(30)));
        }
        events.push(event(article, Some(Uuid::new_v4()), EventType::Share, None));
        events.push(event(article, Some(Uuid::new_v4()), EventType::Comment, None));

        let totals = engagement_totals(&events);
        assert_eq!(totals.engagement, 50.0);
    }

    #[test]
    fn engagement_rate_is_zero_without_views() {
        let article = Uuid::new_v4();
        let events = vec![event(article, Some(Uuid::new_v4()), EventType::Share, None)];
        assert_eq!(engagement_totals(&events).engagement, 0.0);
    }

    #[test]
    fn rollup_groups_by_article_and_skips_other_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut events = vec![
            event(first, Some(Uuid::new_v4()), EventType::View, Some(20)),
            event(first, Some(Uuid::new_v4()), EventType::Upvote, None),
            event(second, Some(Uuid::new_v4()), EventType::View, Some(40)),
        ];
        // An event from the following day must not leak into the rollup.
        let mut stray = event(first, Some(Uuid::new_v4()), EventType::View, Some(5));
        stray.created_at = Utc.with_ymd_and_hms(2026, 3, 15, 0, 30, 0).unwrap();
        events.push(stray);

        let rows = daily_rollups(date, &events);
        assert_eq!(rows.len(), 2);
        let row = rows.iter().find(|r| r.article_id == first).unwrap();
        assert_eq!(row.views, 1);
        assert_eq!(row.votes, 1);
        assert_eq!(row.date, date);
    }

    #[test]
    fn rollup_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let article = Uuid::new_v4();
        let reader = Uuid::new_v4();
        let events = vec![
            event(article, Some(reader), EventType::View, Some(25)),
            event(article, Some(reader), EventType::Save, None),
        ];
        assert_eq!(daily_rollups(date, &events), daily_rollups(date, &events));
    }
}
