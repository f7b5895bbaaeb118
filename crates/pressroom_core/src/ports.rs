//! crates/pressroom_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing
//! the engine to be independent of the concrete store (PostgreSQL in the
//! api service, in-memory in tests).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::analytics::EngagementTotals;
use crate::domain::{
    AccountStats, Article, ArticleEvent, ArticleFilters, ArticlePatch, DailyAnalytics, EventType,
    Membership, User, UserCredentials, Vote, VoteType,
};
use crate::workflow::ApprovalUpdate;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the backing store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Article Store Port
//=========================================================================================

/// Storage operations the engine orchestrates. Methods are deliberately
/// primitive; all policy (authorization, dedup, recount) lives in the
/// engine on top of them.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    // --- Articles ---
    async fn insert_article(&self, article: &Article) -> PortResult<()>;

    async fn get_article(&self, article_id: Uuid) -> PortResult<Article>;

    async fn update_content(&self, article_id: Uuid, patch: &ArticlePatch, updated_at: DateTime<Utc>) -> PortResult<()>;

    async fn delete_article(&self, article_id: Uuid) -> PortResult<()>;

    /// Candidate articles matching the store-side filters, newest first.
    /// Per-actor access filtering happens in the engine.
    async fn list_articles(&self, filters: &ArticleFilters) -> PortResult<Vec<Article>>;

    /// Public + published articles for the discover feed, ordered by
    /// trend score descending.
    async fn list_published_public(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> PortResult<Vec<Article>>;

    /// All published articles, for the trend-score batch.
    async fn published_articles(&self) -> PortResult<Vec<Article>>;

    // --- Vote Ledger ---
    async fn find_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<Option<Vote>>;

    /// Inserts a new vote row. Returns `Conflict` if the voter already
    /// has a live vote on the article.
    async fn insert_vote(&self, vote: &Vote) -> PortResult<()>;

    async fn update_vote_type(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        vote_type: VoteType,
    ) -> PortResult<()>;

    async fn delete_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()>;

    async fn votes_for_article(&self, article_id: Uuid) -> PortResult<Vec<Vote>>;

    async fn update_vote_counts(
        &self,
        article_id: Uuid,
        upvotes: i64,
        downvotes: i64,
        vote_score: i64,
    ) -> PortResult<()>;

    async fn update_trend(
        &self,
        article_id: Uuid,
        trend_score: f64,
        is_trending: bool,
    ) -> PortResult<()>;

    // --- Event Ledger ---
    async fn insert_event(&self, event: &ArticleEvent) -> PortResult<()>;

    async fn has_event(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<bool>;

    /// Removes an actor's events of one type on an article. Only ever
    /// used to retract `save` events when a save is reversed.
    async fn delete_events(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<()>;

    async fn events_for_article(&self, article_id: Uuid) -> PortResult<Vec<ArticleEvent>>;

    async fn events_on_date(&self, date: NaiveDate) -> PortResult<Vec<ArticleEvent>>;

    async fn update_engagement(
        &self,
        article_id: Uuid,
        totals: &EngagementTotals,
    ) -> PortResult<()>;

    // --- Saved Relation ---
    async fn is_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<bool>;

    async fn insert_saved(&self, article_id: Uuid, user_id: Uuid, saved_at: DateTime<Utc>) -> PortResult<()>;

    async fn delete_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()>;

    async fn count_saved(&self, article_id: Uuid) -> PortResult<i64>;

    // --- Approval Workflow ---
    async fn apply_approval(&self, article_id: Uuid, update: &ApprovalUpdate) -> PortResult<()>;

    // --- Analytics ---
    /// Overwrites the rollup row keyed by (article, date).
    async fn upsert_daily_analytics(&self, row: &DailyAnalytics) -> PortResult<()>;

    async fn account_stats(&self, account_id: Uuid) -> PortResult<AccountStats>;
}

//=========================================================================================
// Collaborator Ports
//=========================================================================================

/// Tenant-membership lookups used to build the acting principal.
#[async_trait]
pub trait MembershipService: Send + Sync {
    async fn memberships_for_user(&self, user_id: Uuid) -> PortResult<Vec<Membership>>;

    async fn is_global_admin(&self, user_id: Uuid) -> PortResult<bool>;
}

/// User accounts and browser sessions, consumed by the web layer.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Creates the user plus their personal account with owner role.
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
