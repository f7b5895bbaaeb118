//! crates/pressroom_core/src/engine.rs
//!
//! The engagement engine: orchestrates the access predicate, vote ledger,
//! event ledger, trend scoring, daily rollup and approval workflow over an
//! `ArticleStore`. Every mutation is authorized first, and every aggregate
//! is recomputed from its ledger rather than incremented, so a bad write
//! heals on the next one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::access::{can_access, AccessAction};
use crate::analytics::{daily_rollups, engagement_totals};
use crate::domain::{
    AccountStats, Actor, Article, ArticleEvent, ArticleFilters, ArticlePatch, ArticleStatus,
    EventType, NewArticle, Pagination, Vote, VoteType,
};
use crate::ports::{ArticleStore, PortError};
use crate::trending::trend_score;
use crate::workflow;
use crate::workflow::InvalidTransition;

/// Maximum number of tags on an article.
pub const MAX_TAGS: usize = 10;

/// Maximum page size for listings.
pub const MAX_PAGE_SIZE: u32 = 100;

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

/// The engine's typed error taxonomy. `Unauthenticated` and `Forbidden`
/// are distinct so callers can redirect to login vs. show "not allowed".
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("not allowed")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Store(String),
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => EngineError::NotFound(what),
            PortError::Conflict(what) => EngineError::Conflict(what),
            PortError::Unexpected(what) => EngineError::Store(what),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Result of a vote cast: the fresh counts and where the voter ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteOutcome {
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub user_vote: Option<VoteType>,
}

/// Result of recording an event. A deduplicated call is a successful
/// no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { event_id: Uuid },
    Duplicate,
}

/// Result of a save or unsave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved: bool,
    pub total_saves: i64,
}

/// Extra measurements attached to a recorded event.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    pub read_time_seconds: Option<i32>,
    pub scroll_percentage: Option<f64>,
    pub metadata: serde_json::Value,
}

/// An article plus the acting user's relationship to it.
#[derive(Debug, Clone)]
pub struct ArticleView {
    pub article: Article,
    pub user_vote: Option<VoteType>,
    pub saved: bool,
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total_count: usize,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

//=========================================================================================
// Per-Article Serialization
//=========================================================================================

/// Hands out one async mutex per article so vote/event mutations on the
/// same article are serialized while different articles proceed in
/// parallel. The single-writer-per-article arrangement keeps the
/// recount-from-ledger writes consistent without database locking.
#[derive(Default)]
struct ArticleLocks {
    inner: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ArticleLocks {
    async fn lock(&self, article_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().expect("article lock map poisoned");
            map.entry(article_id).or_default().clone()
        };
        slot.lock_owned().await
    }
}

//=========================================================================================
// The Engine
//=========================================================================================

pub struct Engine {
    store: Arc<dyn ArticleStore>,
    locks: ArticleLocks,
}

impl Engine {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            locks: ArticleLocks::default(),
        }
    }

    //-------------------------------------------------------------------------------------
    // Articles (CRUD and queries)
    //-------------------------------------------------------------------------------------

    /// Creates a draft article in the target account. The creator is
    /// always the acting user, regardless of what the caller sends.
    pub async fn create_article(&self, actor: &Actor, input: NewArticle) -> EngineResult<Article> {
        let user_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        if !actor.is_member_of(input.account_id) {
            return Err(EngineError::Forbidden);
        }
        validate_content(&input.title, &input.tags)?;

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            account_id: input.account_id,
            created_by: user_id,
            title: input.title,
            subtitle: input.subtitle,
            body: input.body,
            category: input.category,
            tags: input.tags,
            status: ArticleStatus::Draft,
            visibility: input.visibility,
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
            publish_date: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_article(&article).await?;
        Ok(article)
    }

    /// Updates content fields. Account and creator never change here, and
    /// status only moves through the approval workflow.
    pub async fn update_article(
        &self,
        actor: &Actor,
        article_id: Uuid,
        patch: ArticlePatch,
    ) -> EngineResult<Article> {
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Write)?;
        if let Some(tags) = &patch.tags {
            if tags.len() > MAX_TAGS {
                return Err(EngineError::Validation(format!(
                    "maximum {} tags allowed",
                    MAX_TAGS
                )));
            }
        }
        self.store
            .update_content(article_id, &patch, Utc::now())
            .await?;
        Ok(self.store.get_article(article_id).await?)
    }

    /// Deletes an article. Account owners and admins only; authors may
    /// edit their articles but not remove them.
    pub async fn delete_article(&self, actor: &Actor, article_id: Uuid) -> EngineResult<()> {
        if actor.is_anonymous() {
            return Err(EngineError::Unauthenticated);
        }
        let article = self.store.get_article(article_id).await?;
        let can_delete = actor
            .role_in(article.account_id)
            .is_some_and(|role| role.can_manage());
        if !can_delete {
            return Err(EngineError::Forbidden);
        }
        self.store.delete_article(article_id).await?;
        Ok(())
    }

    /// Fetches one article with the acting user's vote and save state.
    pub async fn get_article(&self, actor: &Actor, article_id: Uuid) -> EngineResult<ArticleView> {
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Read)?;

        let (user_vote, saved) = match actor.user_id {
            Some(user_id) => {
                let vote = self.store.find_vote(article_id, user_id).await?;
                let saved = self.store.is_saved(article_id, user_id).await?;
                (vote.map(|v| v.vote_type), saved)
            }
            None => (None, false),
        };

        Ok(ArticleView {
            article,
            user_vote,
            saved,
        })
    }

    /// Paginated listing, filtered to what the actor may read.
    pub async fn list_articles(
        &self,
        actor: &Actor,
        filters: ArticleFilters,
        pagination: Pagination,
    ) -> EngineResult<ArticlePage> {
        validate_pagination(&pagination)?;
        let candidates = self.store.list_articles(&filters).await?;
        let visible: Vec<Article> = candidates
            .into_iter()
            .filter(|a| can_access(actor, a, AccessAction::Read))
            .collect();
        Ok(paginate(visible, pagination))
    }

    /// The anonymous discover feed: public + published only, ordered by
    /// trend score.
    pub async fn list_public(
        &self,
        category: Option<&str>,
        search: Option<&str>,
        pagination: Pagination,
    ) -> EngineResult<ArticlePage> {
        validate_pagination(&pagination)?;
        let articles = self.store.list_published_public(category, search).await?;
        Ok(paginate(articles, pagination))
    }

    /// Per-account article summary; members only.
    pub async fn account_stats(&self, actor: &Actor, account_id: Uuid) -> EngineResult<AccountStats> {
        if actor.is_anonymous() {
            return Err(EngineError::Unauthenticated);
        }
        if !actor.is_member_of(account_id) {
            return Err(EngineError::Forbidden);
        }
        Ok(self.store.account_stats(account_id).await?)
    }

    //-------------------------------------------------------------------------------------
    // Vote Ledger
    //-------------------------------------------------------------------------------------

    /// Casts, flips, or toggles off a vote, then recounts the ledger.
    ///
    /// Repeating the same vote type removes the vote; switching types
    /// updates the row in place. Counts are always a full recount over
    /// the vote table, never an increment.
    pub async fn cast_vote(
        &self,
        actor: &Actor,
        article_id: Uuid,
        vote_type: VoteType,
    ) -> EngineResult<VoteOutcome> {
        let user_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Vote)?;

        let _guard = self.locks.lock(article_id).await;

        let existing = self.store.find_vote(article_id, user_id).await?;
        let user_vote = match existing {
            None => {
                let vote = Vote {
                    id: Uuid::new_v4(),
                    article_id,
                    user_id,
                    vote_type,
                    created_at: Utc::now(),
                };
                match self.store.insert_vote(&vote).await {
                    Ok(()) => {}
                    // Lost a first-vote race to another writer; the row
                    // exists now, so retry as an update.
                    Err(PortError::Conflict(_)) => {
                        self.store
                            .update_vote_type(article_id, user_id, vote_type)
                            .await?;
                    }
                    Err(err) => return Err(err.into()),
                }
                self.record_vote_event(&article, user_id, vote_type).await?;
                Some(vote_type)
            }
            Some(vote) if vote.vote_type == vote_type => {
                // Toggle off. No event for a retraction.
                self.store.delete_vote(article_id, user_id).await?;
                None
            }
            Some(_) => {
                self.store
                    .update_vote_type(article_id, user_id, vote_type)
                    .await?;
                self.record_vote_event(&article, user_id, vote_type).await?;
                Some(vote_type)
            }
        };

        let (upvotes, downvotes, score) = self.recount_votes(&article).await?;
        Ok(VoteOutcome {
            upvotes,
            downvotes,
            vote_score: score,
            user_vote,
        })
    }

    async fn record_vote_event(
        &self,
        article: &Article,
        user_id: Uuid,
        vote_type: VoteType,
    ) -> EngineResult<()> {
        let event_type = match vote_type {
            VoteType::Upvote => EventType::Upvote,
            VoteType::Downvote => EventType::Downvote,
        };
        let event = ArticleEvent {
            id: Uuid::new_v4(),
            article_id: article.id,
            account_id: article.account_id,
            user_id: Some(user_id),
            event_type,
            read_time_seconds: None,
            scroll_percentage: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        self.store.insert_event(&event).await?;
        Ok(())
    }

    /// Full recount over the vote ledger, then an immediate trend-score
    /// refresh for this article.
    async fn recount_votes(&self, article: &Article) -> EngineResult<(i64, i64, i64)> {
        let votes = self.store.votes_for_article(article.id).await?;
        let upvotes = votes
            .iter()
            .filter(|v| v.vote_type == VoteType::Upvote)
            .count() as i64;
        let downvotes = votes.len() as i64 - upvotes;
        let score = upvotes - downvotes;
        self.store
            .update_vote_counts(article.id, upvotes, downvotes, score)
            .await?;

        let ts = trend_score(upvotes, score, article.trend_basis(), Utc::now());
        self.store
            .update_trend(article.id, ts.score, ts.is_trending)
            .await?;
        Ok((upvotes, downvotes, score))
    }

    //-------------------------------------------------------------------------------------
    // Event Ledger
    //-------------------------------------------------------------------------------------

    /// Records an interaction event and refreshes the article's real-time
    /// counters. Views and saves count at most once per (article, actor):
    /// a repeat is answered with `Duplicate` and nothing is written.
    pub async fn record_event(
        &self,
        actor: &Actor,
        article_id: Uuid,
        event_type: EventType,
        input: EventInput,
    ) -> EngineResult<RecordOutcome> {
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, action_for_event(event_type))?;
        // Saves are keyed by actor, so an anonymous save is meaningless.
        if event_type == EventType::Save && actor.is_anonymous() {
            return Err(EngineError::Unauthenticated);
        }

        let _guard = self.locks.lock(article_id).await;

        if event_type.is_deduplicated() {
            if let Some(user_id) = actor.user_id {
                if self.store.has_event(article_id, user_id, event_type).await? {
                    return Ok(RecordOutcome::Duplicate);
                }
            }
        }

        let event = ArticleEvent {
            id: Uuid::new_v4(),
            article_id,
            account_id: article.account_id,
            user_id: actor.user_id,
            event_type,
            read_time_seconds: input.read_time_seconds,
            scroll_percentage: input.scroll_percentage,
            metadata: input.metadata,
            created_at: Utc::now(),
        };
        self.store.insert_event(&event).await?;

        // Anonymous events land in the ledger but never move counters.
        if actor.user_id.is_some() {
            self.refresh_engagement(article_id).await?;
        }
        Ok(RecordOutcome::Recorded { event_id: event.id })
    }

    /// Recomputes the real-time counters from the event ledger, with
    /// `total_saves` taken from the saved relation as source of truth.
    async fn refresh_engagement(&self, article_id: Uuid) -> EngineResult<()> {
        let events = self.store.events_for_article(article_id).await?;
        let mut totals = engagement_totals(&events);
        totals.total_saves = self.store.count_saved(article_id).await?;
        self.store.update_engagement(article_id, &totals).await?;
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Saved Relation
    //-------------------------------------------------------------------------------------

    /// Saves an article for the acting user. Saving twice is a no-op; the
    /// mirrored `save` event stays unique per (article, actor).
    pub async fn save_article(&self, actor: &Actor, article_id: Uuid) -> EngineResult<SaveOutcome> {
        let user_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Save)?;

        let _guard = self.locks.lock(article_id).await;

        if !self.store.is_saved(article_id, user_id).await? {
            self.store
                .insert_saved(article_id, user_id, Utc::now())
                .await?;
            if !self
                .store
                .has_event(article_id, user_id, EventType::Save)
                .await?
            {
                let event = ArticleEvent {
                    id: Uuid::new_v4(),
                    article_id,
                    account_id: article.account_id,
                    user_id: Some(user_id),
                    event_type: EventType::Save,
                    read_time_seconds: None,
                    scroll_percentage: None,
                    metadata: serde_json::Value::Null,
                    created_at: Utc::now(),
                };
                self.store.insert_event(&event).await?;
            }
        }
        self.refresh_engagement(article_id).await?;
        let total_saves = self.store.count_saved(article_id).await?;
        Ok(SaveOutcome {
            saved: true,
            total_saves,
        })
    }

    /// Reverses a save: removes the relation row and retracts the
    /// mirrored `save` event so a later re-save counts again. Views are
    /// never retracted this way.
    pub async fn unsave_article(&self, actor: &Actor, article_id: Uuid) -> EngineResult<SaveOutcome> {
        let user_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        // Reversal needs no read gate; only the owner's own row is touched.
        self.store.get_article(article_id).await?;

        let _guard = self.locks.lock(article_id).await;

        self.store.delete_saved(article_id, user_id).await?;
        self.store
            .delete_events(article_id, user_id, EventType::Save)
            .await?;
        self.refresh_engagement(article_id).await?;
        let total_saves = self.store.count_saved(article_id).await?;
        Ok(SaveOutcome {
            saved: false,
            total_saves,
        })
    }

    //-------------------------------------------------------------------------------------
    // Batch Operations
    //-------------------------------------------------------------------------------------

    /// Recomputes the decayed trend score for every published article.
    /// Run on an interval so stale trends age out even without new votes.
    pub async fn recompute_trend_scores(&self) -> EngineResult<usize> {
        let now = Utc::now();
        let articles = self.store.published_articles().await?;
        let count = articles.len();
        for article in articles {
            let ts = trend_score(article.upvotes, article.vote_score, article.trend_basis(), now);
            self.store
                .update_trend(article.id, ts.score, ts.is_trending)
                .await?;
        }
        Ok(count)
    }

    /// Rolls one calendar date of events up into DailyAnalytics rows,
    /// one per (article, account) pair with at least one authenticated
    /// event. Re-running for the same date overwrites identically.
    pub async fn rollup_day(&self, date: NaiveDate) -> EngineResult<usize> {
        let events = self.store.events_on_date(date).await?;
        let rows = daily_rollups(date, &events);
        let count = rows.len();
        for row in &rows {
            self.store.upsert_daily_analytics(row).await?;
        }
        Ok(count)
    }

    //-------------------------------------------------------------------------------------
    // Approval Workflow
    //-------------------------------------------------------------------------------------

    /// Creator sends a draft for review.
    pub async fn submit_for_approval(&self, actor: &Actor, article_id: Uuid) -> EngineResult<Article> {
        let user_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        let article = self.store.get_article(article_id).await?;
        if user_id != article.created_by {
            return Err(EngineError::Forbidden);
        }
        let update = workflow::submit(&article, Utc::now())?;
        self.store.apply_approval(article_id, &update).await?;
        Ok(self.store.get_article(article_id).await?)
    }

    /// Global admin publishes a pending article.
    pub async fn approve_article(&self, actor: &Actor, article_id: Uuid) -> EngineResult<Article> {
        let admin_id = actor.user_id.ok_or(EngineError::Unauthenticated)?;
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Approve)?;
        let update = workflow::approve(&article, admin_id, Utc::now())?;
        self.store.apply_approval(article_id, &update).await?;
        Ok(self.store.get_article(article_id).await?)
    }

    /// Global admin sends a pending article back to draft.
    pub async fn reject_article(
        &self,
        actor: &Actor,
        article_id: Uuid,
        reason: Option<String>,
    ) -> EngineResult<Article> {
        if actor.is_anonymous() {
            return Err(EngineError::Unauthenticated);
        }
        let article = self.store.get_article(article_id).await?;
        self.authorize(actor, &article, AccessAction::Approve)?;
        let update = workflow::reject(&article, reason)?;
        self.store.apply_approval(article_id, &update).await?;
        Ok(self.store.get_article(article_id).await?)
    }

    //-------------------------------------------------------------------------------------
    // Helpers
    //-------------------------------------------------------------------------------------

    fn authorize(&self, actor: &Actor, article: &Article, action: AccessAction) -> EngineResult<()> {
        if can_access(actor, article, action) {
            return Ok(());
        }
        if actor.is_anonymous() {
            Err(EngineError::Unauthenticated)
        } else {
            Err(EngineError::Forbidden)
        }
    }
}

/// The access action implied by an event type.
fn action_for_event(event_type: EventType) -> AccessAction {
    match event_type {
        EventType::Upvote | EventType::Downvote => AccessAction::Vote,
        EventType::Save => AccessAction::Save,
        EventType::Comment => AccessAction::Comment,
        EventType::View | EventType::Share | EventType::Like => AccessAction::Read,
    }
}

fn validate_content(title: &str, tags: &[String]) -> EngineResult<()> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty".into()));
    }
    if tags.len() > MAX_TAGS {
        return Err(EngineError::Validation(format!(
            "maximum {} tags allowed",
            MAX_TAGS
        )));
    }
    Ok(())
}

fn validate_pagination(pagination: &Pagination) -> EngineResult<()> {
    if pagination.page == 0 {
        return Err(EngineError::Validation("page starts at 1".into()));
    }
    if pagination.page_size == 0 || pagination.page_size > MAX_PAGE_SIZE {
        return Err(EngineError::Validation(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

fn paginate(articles: Vec<Article>, pagination: Pagination) -> ArticlePage {
    let total_count = articles.len();
    let offset = ((pagination.page - 1) * pagination.page_size) as usize;
    let page_items: Vec<Article> = articles
        .into_iter()
        .skip(offset)
        .take(pagination.page_size as usize)
        .collect();
    ArticlePage {
        articles: page_items,
        total_count,
        page: pagination.page,
        page_size: pagination.page_size,
        has_more: offset + (pagination.page_size as usize) < total_count,
    }
}
