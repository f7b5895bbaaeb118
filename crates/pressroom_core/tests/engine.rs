//! Integration tests driving the full engine against an in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use pressroom_core::analytics::EngagementTotals;
use pressroom_core::domain::{
    AccountRole, AccountStats, Actor, Article, ArticleEvent, ArticleFilters, ArticlePatch,
    ArticleStatus, DailyAnalytics, EventType, Membership, NewArticle, Pagination, Visibility,
    Vote, VoteType,
};
use pressroom_core::engine::{Engine, EngineError, EventInput, RecordOutcome};
use pressroom_core::ports::{ArticleStore, PortError, PortResult};
use pressroom_core::workflow::ApprovalUpdate;

//=========================================================================================
// In-Memory Store
//=========================================================================================

#[derive(Default)]
struct Inner {
    articles: HashMap<Uuid, Article>,
    votes: Vec<Vote>,
    events: Vec<ArticleEvent>,
    saved: HashSet<(Uuid, Uuid)>,
    daily: HashMap<(Uuid, NaiveDate), DailyAnalytics>,
}

#[derive(Default)]
struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn events(&self) -> Vec<ArticleEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    fn daily_rows(&self) -> Vec<DailyAnalytics> {
        let mut rows: Vec<DailyAnalytics> =
            self.inner.lock().unwrap().daily.values().cloned().collect();
        rows.sort_by_key(|r| (r.article_id, r.date));
        rows
    }

    fn push_event(&self, event: ArticleEvent) {
        self.inner.lock().unwrap().events.push(event);
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_article(&self, article: &Article) -> PortResult<()> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .insert(article.id, article.clone());
        Ok(())
    }

    async fn get_article(&self, article_id: Uuid) -> PortResult<Article> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .get(&article_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))
    }

    async fn update_content(
        &self,
        article_id: Uuid,
        patch: &ArticlePatch,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .get_mut(&article_id)
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))?;
        if let Some(title) = &patch.title {
            article.title = title.clone();
        }
        if let Some(subtitle) = &patch.subtitle {
            article.subtitle = subtitle.clone();
        }
        if let Some(body) = &patch.body {
            article.body = body.clone();
        }
        if let Some(category) = &patch.category {
            article.category = category.clone();
        }
        if let Some(tags) = &patch.tags {
            article.tags = tags.clone();
        }
        if let Some(visibility) = patch.visibility {
            article.visibility = visibility;
        }
        article.updated_at = updated_at;
        Ok(())
    }

    async fn delete_article(&self, article_id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.articles.remove(&article_id);
        inner.votes.retain(|v| v.article_id != article_id);
        inner.events.retain(|e| e.article_id != article_id);
        inner.saved.retain(|(a, _)| *a != article_id);
        Ok(())
    }

    async fn list_articles(&self, filters: &ArticleFilters) -> PortResult<Vec<Article>> {
        let inner = self.inner.lock().unwrap();
        let mut articles: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| filters.status.map_or(true, |s| a.status == s))
            .filter(|a| filters.visibility.map_or(true, |v| a.visibility == v))
            .filter(|a| filters.account_id.map_or(true, |id| a.account_id == id))
            .filter(|a| {
                filters
                    .category
                    .as_deref()
                    .map_or(true, |c| a.category == c)
            })
            .filter(|a| {
                filters.search.as_deref().map_or(true, |s| {
                    let needle = s.to_lowercase();
                    a.title.to_lowercase().contains(&needle)
                        || a.subtitle.to_lowercase().contains(&needle)
                })
            })
            .cloned()
            .collect();
        articles.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        Ok(articles)
    }

    async fn list_published_public(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> PortResult<Vec<Article>> {
        let inner = self.inner.lock().unwrap();
        let mut articles: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| {
                a.visibility == Visibility::Public && a.status == ArticleStatus::Published
            })
            .filter(|a| category.map_or(true, |c| a.category == c))
            .filter(|a| {
                search.map_or(true, |s| a.title.to_lowercase().contains(&s.to_lowercase()))
            })
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.trend_score.total_cmp(&a.trend_score));
        Ok(articles)
    }

    async fn published_articles(&self) -> PortResult<Vec<Article>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .articles
            .values()
            .filter(|a| a.status == ArticleStatus::Published)
            .cloned()
            .collect())
    }

    async fn find_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<Option<Vote>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .votes
            .iter()
            .find(|v| v.article_id == article_id && v.user_id == user_id)
            .cloned())
    }

    async fn insert_vote(&self, vote: &Vote) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .votes
            .iter()
            .any(|v| v.article_id == vote.article_id && v.user_id == vote.user_id)
        {
            return Err(PortError::Conflict("vote already exists".into()));
        }
        inner.votes.push(vote.clone());
        Ok(())
    }

    async fn update_vote_type(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        vote_type: VoteType,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for vote in inner.votes.iter_mut() {
            if vote.article_id == article_id && vote.user_id == user_id {
                vote.vote_type = vote_type;
            }
        }
        Ok(())
    }

    async fn delete_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()> {
        self.inner
            .lock()
            .unwrap()
            .votes
            .retain(|v| !(v.article_id == article_id && v.user_id == user_id));
        Ok(())
    }

    async fn votes_for_article(&self, article_id: Uuid) -> PortResult<Vec<Vote>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .votes
            .iter()
            .filter(|v| v.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn update_vote_counts(
        &self,
        article_id: Uuid,
        upvotes: i64,
        downvotes: i64,
        vote_score: i64,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(article) = inner.articles.get_mut(&article_id) {
            article.upvotes = upvotes;
            article.downvotes = downvotes;
            article.vote_score = vote_score;
        }
        Ok(())
    }

    async fn update_trend(
        &self,
        article_id: Uuid,
        trend_score: f64,
        is_trending: bool,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(article) = inner.articles.get_mut(&article_id) {
            article.trend_score = trend_score;
            article.is_trending = is_trending;
        }
        Ok(())
    }

    async fn insert_event(&self, event: &ArticleEvent) -> PortResult<()> {
        self.inner.lock().unwrap().events.push(event.clone());
        Ok(())
    }

    async fn has_event(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<bool> {
        Ok(self.inner.lock().unwrap().events.iter().any(|e| {
            e.article_id == article_id
                && e.user_id == Some(user_id)
                && e.event_type == event_type
        }))
    }

    async fn delete_events(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<()> {
        self.inner.lock().unwrap().events.retain(|e| {
            !(e.article_id == article_id
                && e.user_id == Some(user_id)
                && e.event_type == event_type)
        });
        Ok(())
    }

    async fn events_for_article(&self, article_id: Uuid) -> PortResult<Vec<ArticleEvent>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn events_on_date(&self, date: NaiveDate) -> PortResult<Vec<ArticleEvent>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.created_at.date_naive() == date)
            .cloned()
            .collect())
    }

    async fn update_engagement(
        &self,
        article_id: Uuid,
        totals: &EngagementTotals,
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(article) = inner.articles.get_mut(&article_id) {
            article.total_views = totals.total_views;
            article.unique_views = totals.unique_views;
            article.total_shares = totals.total_shares;
            article.total_saves = totals.total_saves;
            article.total_comments = totals.total_comments;
            article.avg_read_time = totals.avg_read_time;
            article.bounce_rate = totals.bounce_rate;
            article.engagement = totals.engagement;
        }
        Ok(())
    }

    async fn is_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .saved
            .contains(&(article_id, user_id)))
    }

    async fn insert_saved(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        _saved_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner.lock().unwrap().saved.insert((article_id, user_id));
        Ok(())
    }

    async fn delete_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()> {
        self.inner.lock().unwrap().saved.remove(&(article_id, user_id));
        Ok(())
    }

    async fn count_saved(&self, article_id: Uuid) -> PortResult<i64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .saved
            .iter()
            .filter(|(a, _)| *a == article_id)
            .count() as i64)
    }

    async fn apply_approval(&self, article_id: Uuid, update: &ApprovalUpdate) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .get_mut(&article_id)
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))?;
        article.status = update.status;
        article.visibility = update.visibility;
        article.publish_date = update.publish_date;
        article.submitted_for_approval_at = update.submitted_for_approval_at;
        article.approved_by = update.approved_by;
        article.approved_at = update.approved_at;
        article.rejection_reason = update.rejection_reason.clone();
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_daily_analytics(&self, row: &DailyAnalytics) -> PortResult<()> {
        self.inner
            .lock()
            .unwrap()
            .daily
            .insert((row.article_id, row.date), row.clone());
        Ok(())
    }

    async fn account_stats(&self, account_id: Uuid) -> PortResult<AccountStats> {
        let inner = self.inner.lock().unwrap();
        let articles: Vec<&Article> = inner
            .articles
            .values()
            .filter(|a| a.account_id == account_id)
            .collect();
        let votes = articles
            .iter()
            .map(|a| {
                inner
                    .votes
                    .iter()
                    .filter(|v| v.article_id == a.id)
                    .count() as i64
            })
            .sum();
        Ok(AccountStats {
            account_id,
            total_articles: articles.len() as i64,
            published_articles: articles
                .iter()
                .filter(|a| a.status == ArticleStatus::Published)
                .count() as i64,
            draft_articles: articles
                .iter()
                .filter(|a| a.status == ArticleStatus::Draft)
                .count() as i64,
            total_views: articles.iter().map(|a| a.total_views).sum(),
            total_votes: votes,
        })
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

fn engine_with_store() -> (Arc<MemoryStore>, Engine) {
    let store = Arc::new(MemoryStore::default());
    let engine = Engine::new(store.clone());
    (store, engine)
}

fn member_of(account_id: Uuid, role: AccountRole) -> Actor {
    Actor::identified(Uuid::new_v4(), vec![Membership { account_id, role }], false)
}

fn reader() -> Actor {
    Actor::identified(Uuid::new_v4(), Vec::new(), false)
}

fn global_admin() -> Actor {
    Actor::identified(Uuid::new_v4(), Vec::new(), true)
}

fn published_article(account_id: Uuid, created_by: Uuid) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        account_id,
        created_by,
        title: "Launch notes".into(),
        subtitle: String::new(),
        body: "body".into(),
        category: "news".into(),
        tags: Vec::new(),
        status: ArticleStatus::Published,
        visibility: Visibility::Public,
        upvotes: 0,
        downvotes: 0,
        vote_score: 0,
        trend_score: 0.0,
        is_trending: false,
        total_views: 0,
        unique_views: 0,
        total_shares: 0,
        total_saves: 0,
        total_comments: 0,
        avg_read_time: 0.0,
        bounce_rate: 0.0,
        engagement: 0.0,
        approved_by: None,
        approved_at: None,
        rejection_reason: None,
        submitted_for_approval_at: None,
        publish_date: Some(now - Duration::hours(6)),
        created_at: now - Duration::hours(7),
        updated_at: now,
    }
}

async fn seed_published(store: &MemoryStore) -> Article {
    let article = published_article(Uuid::new_v4(), Uuid::new_v4());
    store.insert_article(&article).await.unwrap();
    article
}

fn new_article(account_id: Uuid) -> NewArticle {
    NewArticle {
        account_id,
        title: "Quarterly roadmap".into(),
        subtitle: "what ships next".into(),
        body: "…".into(),
        category: "product".into(),
        tags: vec!["roadmap".into()],
        visibility: Visibility::Account,
    }
}

//=========================================================================================
// Vote Ledger
//=========================================================================================

#[tokio::test]
async fn vote_toggles_off_when_repeated() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let voter = reader();

    let first = engine
        .cast_vote(&voter, article.id, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!(first.upvotes, 1);
    assert_eq!(first.vote_score, 1);
    assert_eq!(first.user_vote, Some(VoteType::Upvote));

    let second = engine
        .cast_vote(&voter, article.id, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!(second.upvotes, 0);
    assert_eq!(second.vote_score, 0);
    assert_eq!(second.user_vote, None);
}

#[tokio::test]
async fn changing_vote_type_updates_in_place() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let voter = reader();

    engine
        .cast_vote(&voter, article.id, VoteType::Upvote)
        .await
        .unwrap();
    let flipped = engine
        .cast_vote(&voter, article.id, VoteType::Downvote)
        .await
        .unwrap();
    assert_eq!(flipped.upvotes, 0);
    assert_eq!(flipped.downvotes, 1);
    assert_eq!(flipped.vote_score, -1);
    assert_eq!(flipped.user_vote, Some(VoteType::Downvote));

    // Still exactly one vote row for this voter.
    let votes = store.votes_for_article(article.id).await.unwrap();
    assert_eq!(votes.len(), 1);
}

#[tokio::test]
async fn vote_score_stays_consistent_across_voters() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;

    for _ in 0..3 {
        engine
            .cast_vote(&reader(), article.id, VoteType::Upvote)
            .await
            .unwrap();
    }
    engine
        .cast_vote(&reader(), article.id, VoteType::Downvote)
        .await
        .unwrap();

    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.upvotes, 3);
    assert_eq!(stored.downvotes, 1);
    assert_eq!(stored.vote_score, stored.upvotes - stored.downvotes);
    assert!(stored.trend_score > 0.0);
}

#[tokio::test]
async fn anonymous_voters_are_rejected() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let err = engine
        .cast_vote(&Actor::anonymous(), article.id, VoteType::Upvote)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthenticated));
}

#[tokio::test]
async fn voting_requires_read_access() {
    let (store, engine) = engine_with_store();
    let mut article = published_article(Uuid::new_v4(), Uuid::new_v4());
    article.visibility = Visibility::Private;
    store.insert_article(&article).await.unwrap();

    let err = engine
        .cast_vote(&reader(), article.id, VoteType::Upvote)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[tokio::test]
async fn votes_leave_an_event_trail_except_retractions() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let voter = reader();

    engine
        .cast_vote(&voter, article.id, VoteType::Upvote)
        .await
        .unwrap();
    engine
        .cast_vote(&voter, article.id, VoteType::Downvote)
        .await
        .unwrap();
    // Toggle the downvote off; retraction records nothing.
    engine
        .cast_vote(&voter, article.id, VoteType::Downvote)
        .await
        .unwrap();

    let events = store.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::Upvote);
    assert_eq!(events[1].event_type, EventType::Downvote);
}

//=========================================================================================
// Event Ledger
//=========================================================================================

#[tokio::test]
async fn views_count_once_per_reader() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let viewer = reader();

    let first = engine
        .record_event(
            &viewer,
            article.id,
            EventType::View,
            EventInput {
                read_time_seconds: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(first, RecordOutcome::Recorded { .. }));

    for _ in 0..2 {
        let repeat = engine
            .record_event(&viewer, article.id, EventType::View, EventInput::default())
            .await
            .unwrap();
        assert_eq!(repeat, RecordOutcome::Duplicate);
    }

    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.total_views, 1);
    assert_eq!(stored.unique_views, 1);
    assert_eq!(store.events().len(), 1);

    // A second reader still counts.
    engine
        .record_event(&reader(), article.id, EventType::View, EventInput::default())
        .await
        .unwrap();
    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.total_views, 2);
}

#[tokio::test]
async fn shares_are_not_deduplicated() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let sharer = reader();

    for _ in 0..3 {
        let outcome = engine
            .record_event(&sharer, article.id, EventType::Share, EventInput::default())
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded { .. }));
    }
    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.total_shares, 3);
}

#[tokio::test]
async fn anonymous_views_are_recorded_but_never_counted() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;

    let outcome = engine
        .record_event(
            &Actor::anonymous(),
            article.id,
            EventType::View,
            EventInput::default(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RecordOutcome::Recorded { .. }));

    assert_eq!(store.events().len(), 1);
    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.total_views, 0);
}

#[tokio::test]
async fn read_time_feeds_bounce_rate_and_average() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;

    engine
        .record_event(
            &reader(),
            article.id,
            EventType::View,
            EventInput {
                read_time_seconds: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine
        .record_event(
            &reader(),
            article.id,
            EventType::View,
            EventInput {
                read_time_seconds: Some(90),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.bounce_rate, 50.0);
    assert_eq!(stored.avg_read_time, 47.0);
}

//=========================================================================================
// Saved Relation
//=========================================================================================

#[tokio::test]
async fn save_unsave_resave_keeps_dedup_invariant() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let saver = reader();

    let saved = engine.save_article(&saver, article.id).await.unwrap();
    assert!(saved.saved);
    assert_eq!(saved.total_saves, 1);

    // Saving again changes nothing.
    let again = engine.save_article(&saver, article.id).await.unwrap();
    assert_eq!(again.total_saves, 1);
    assert_eq!(store.events().len(), 1);

    // Unsave removes the relation and retracts the mirrored event.
    let unsaved = engine.unsave_article(&saver, article.id).await.unwrap();
    assert!(!unsaved.saved);
    assert_eq!(unsaved.total_saves, 0);
    assert!(store.events().is_empty());
    let stored = store.get_article(article.id).await.unwrap();
    assert_eq!(stored.total_saves, 0);

    // Re-saving counts again, exactly once.
    let resaved = engine.save_article(&saver, article.id).await.unwrap();
    assert_eq!(resaved.total_saves, 1);
    assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn anonymous_saves_are_rejected() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let err = engine
        .save_article(&Actor::anonymous(), article.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthenticated));
}

//=========================================================================================
// Batch Operations
//=========================================================================================

#[tokio::test]
async fn rollup_is_idempotent_for_a_date() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let viewer = reader();

    engine
        .record_event(
            &viewer,
            article.id,
            EventType::View,
            EventInput {
                read_time_seconds: Some(30),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine
        .record_event(&viewer, article.id, EventType::Share, EventInput::default())
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let first = engine.rollup_day(today).await.unwrap();
    assert_eq!(first, 1);
    let rows_first = store.daily_rows();

    let second = engine.rollup_day(today).await.unwrap();
    assert_eq!(second, 1);
    assert_eq!(store.daily_rows(), rows_first);

    let row = &rows_first[0];
    assert_eq!(row.article_id, article.id);
    assert_eq!(row.views, 1);
    assert_eq!(row.shares, 1);
}

#[tokio::test]
async fn rollup_scopes_to_the_target_date() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let yesterday = Utc::now().date_naive().pred_opt().unwrap();

    // Yesterday's view, inserted straight into the ledger.
    let mut event = ArticleEvent {
        id: Uuid::new_v4(),
        article_id: article.id,
        account_id: article.account_id,
        user_id: Some(Uuid::new_v4()),
        event_type: EventType::View,
        read_time_seconds: Some(60),
        scroll_percentage: None,
        metadata: serde_json::Value::Null,
        created_at: Utc::now() - Duration::days(1),
    };
    store.push_event(event.clone());
    // And one anonymous view that must not count.
    event.id = Uuid::new_v4();
    event.user_id = None;
    store.push_event(event);

    assert_eq!(engine.rollup_day(yesterday).await.unwrap(), 1);
    assert_eq!(engine.rollup_day(Utc::now().date_naive()).await.unwrap(), 0);

    let rows = store.daily_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, yesterday);
    assert_eq!(rows[0].views, 1);
}

#[tokio::test]
async fn trend_batch_covers_published_articles() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;

    // 15 up, 2 down, published six hours ago.
    for _ in 0..15 {
        engine
            .cast_vote(&reader(), article.id, VoteType::Upvote)
            .await
            .unwrap();
    }
    for _ in 0..2 {
        engine
            .cast_vote(&reader(), article.id, VoteType::Downvote)
            .await
            .unwrap();
    }

    let updated = engine.recompute_trend_scores().await.unwrap();
    assert_eq!(updated, 1);

    let stored = store.get_article(article.id).await.unwrap();
    assert!((stored.trend_score - 2.76).abs() < 0.02);
    assert!(stored.is_trending);
}

#[tokio::test]
async fn downvoted_articles_never_trend() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    for _ in 0..5 {
        engine
            .cast_vote(&reader(), article.id, VoteType::Downvote)
            .await
            .unwrap();
    }
    engine.recompute_trend_scores().await.unwrap();
    let stored = store.get_article(article.id).await.unwrap();
    assert!(!stored.is_trending);
}

//=========================================================================================
// Approval Workflow
//=========================================================================================

#[tokio::test]
async fn full_approval_cycle() {
    let (store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);

    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();
    assert_eq!(article.status, ArticleStatus::Draft);

    let pending = engine
        .submit_for_approval(&author, article.id)
        .await
        .unwrap();
    assert_eq!(pending.status, ArticleStatus::PendingApproval);
    assert!(pending.submitted_for_approval_at.is_some());

    let admin = global_admin();
    let published = engine.approve_article(&admin, article.id).await.unwrap();
    assert_eq!(published.status, ArticleStatus::Published);
    assert_eq!(published.visibility, Visibility::Public);
    assert!(published.publish_date.is_some());
    assert_eq!(published.approved_by, admin.user_id);
    assert!(published.approved_at.is_some());
    assert!(published.rejection_reason.is_none());

    // Published is terminal for this machine.
    let err = engine
        .submit_for_approval(&author, article.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    assert_eq!(store.get_article(article.id).await.unwrap().status, ArticleStatus::Published);
}

#[tokio::test]
async fn reject_returns_to_draft_and_allows_resubmit() {
    let (_store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();
    engine
        .submit_for_approval(&author, article.id)
        .await
        .unwrap();

    let rejected = engine
        .reject_article(&global_admin(), article.id, Some("needs sources".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, ArticleStatus::Draft);
    assert_eq!(rejected.visibility, Visibility::Account);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("needs sources"));
    assert!(rejected.approved_by.is_none() && rejected.approved_at.is_none());

    // The cycle can repeat; resubmitting clears the reason.
    let resubmitted = engine
        .submit_for_approval(&author, article.id)
        .await
        .unwrap();
    assert_eq!(resubmitted.status, ArticleStatus::PendingApproval);
    assert!(resubmitted.rejection_reason.is_none());
}

#[tokio::test]
async fn only_the_creator_submits() {
    let (_store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();

    let other_member = member_of(account_id, AccountRole::Owner);
    let err = engine
        .submit_for_approval(&other_member, article.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[tokio::test]
async fn account_owners_cannot_approve() {
    let (_store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();
    engine
        .submit_for_approval(&author, article.id)
        .await
        .unwrap();

    let owner = member_of(account_id, AccountRole::Owner);
    let err = engine.approve_article(&owner, article.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[tokio::test]
async fn approve_requires_pending_status() {
    let (_store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();

    let err = engine
        .approve_article(&global_admin(), article.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

//=========================================================================================
// Queries
//=========================================================================================

#[tokio::test]
async fn get_article_reports_vote_and_save_state() {
    let (store, engine) = engine_with_store();
    let article = seed_published(&store).await;
    let user = reader();

    engine
        .cast_vote(&user, article.id, VoteType::Upvote)
        .await
        .unwrap();
    engine.save_article(&user, article.id).await.unwrap();

    let view = engine.get_article(&user, article.id).await.unwrap();
    assert_eq!(view.user_vote, Some(VoteType::Upvote));
    assert!(view.saved);

    let anonymous = engine
        .get_article(&Actor::anonymous(), article.id)
        .await
        .unwrap();
    assert_eq!(anonymous.user_vote, None);
    assert!(!anonymous.saved);
}

#[tokio::test]
async fn listing_filters_to_what_the_actor_may_read() {
    let (store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);

    // A draft in the author's account and a published public article elsewhere.
    engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();
    seed_published(&store).await;

    let mine = engine
        .list_articles(&author, ArticleFilters::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(mine.total_count, 2);

    let stranger = engine
        .list_articles(&reader(), ArticleFilters::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(stranger.total_count, 1);

    let anon = engine
        .list_articles(
            &Actor::anonymous(),
            ArticleFilters::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(anon.total_count, 1);
}

#[tokio::test]
async fn discover_feed_orders_by_trend_score() {
    let (store, engine) = engine_with_store();
    let cold = seed_published(&store).await;
    let hot = seed_published(&store).await;
    for _ in 0..10 {
        engine
            .cast_vote(&reader(), hot.id, VoteType::Upvote)
            .await
            .unwrap();
    }

    let page = engine
        .list_public(None, None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.articles[0].id, hot.id);
    assert_eq!(page.articles[1].id, cold.id);
    assert!(!page.has_more);
}

#[tokio::test]
async fn pagination_reports_has_more() {
    let (store, engine) = engine_with_store();
    for _ in 0..5 {
        seed_published(&store).await;
    }
    let page = engine
        .list_public(
            None,
            None,
            Pagination {
                page: 1,
                page_size: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.articles.len(), 2);
    assert_eq!(page.total_count, 5);
    assert!(page.has_more);

    let last = engine
        .list_public(
            None,
            None,
            Pagination {
                page: 3,
                page_size: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(last.articles.len(), 1);
    assert!(!last.has_more);
}

#[tokio::test]
async fn oversized_pages_are_rejected() {
    let (_store, engine) = engine_with_store();
    let err = engine
        .list_public(
            None,
            None,
            Pagination {
                page: 1,
                page_size: 500,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn account_stats_are_member_only() {
    let (_store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();

    let stats = engine.account_stats(&author, account_id).await.unwrap();
    assert_eq!(stats.total_articles, 1);
    assert_eq!(stats.draft_articles, 1);

    let err = engine
        .account_stats(&reader(), account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[tokio::test]
async fn update_preserves_ownership_fields() {
    let (store, engine) = engine_with_store();
    let account_id = Uuid::new_v4();
    let author = member_of(account_id, AccountRole::Member);
    let article = engine
        .create_article(&author, new_article(account_id))
        .await
        .unwrap();

    let updated = engine
        .update_article(
            &author,
            article.id,
            ArticlePatch {
                title: Some("Retitled".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Retitled");
    assert_eq!(updated.account_id, account_id);
    assert_eq!(updated.created_by, article.created_by);

    // A plain member who is not the author cannot edit.
    let err = engine
        .update_article(
            &member_of(account_id, AccountRole::Member),
            article.id,
            ArticlePatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    // But cannot delete either; deletion is owner/admin territory.
    let err = engine.delete_article(&author, article.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));

    let owner = member_of(account_id, AccountRole::Owner);
    engine.delete_article(&owner, article.id).await.unwrap();
    assert!(store.get_article(article.id).await.is_err());
}
