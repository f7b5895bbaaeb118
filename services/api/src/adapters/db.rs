//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `ArticleStore`, `MembershipService` and `AuthStore`
//! ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pressroom_core::analytics::EngagementTotals;
use pressroom_core::domain::{
    AccountRole, AccountStats, Article, ArticleEvent, ArticleFilters, ArticlePatch, ArticleStatus,
    DailyAnalytics, EventType, Membership, User, UserCredentials, Visibility, Vote, VoteType,
};
use pressroom_core::ports::{
    ArticleStore, AuthStore, MembershipService, PortError, PortResult,
};
use pressroom_core::workflow::ApprovalUpdate;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the core storage ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a sqlx error onto the port taxonomy. Unique-index violations
/// surface as `Conflict` so the engine can retry as an update.
fn map_db_err(what: &str, e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            PortError::Conflict(what.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_enum<T>(raw: &str, parse: impl Fn(&str) -> Option<T>, what: &str) -> PortResult<T> {
    parse(raw).ok_or_else(|| PortError::Unexpected(format!("invalid {} '{}' in database", what, raw)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const ARTICLE_COLUMNS: &str = "id, account_id, created_by, title, subtitle, body, category, tags, \
     status, visibility, upvotes, downvotes, vote_score, trend_score, is_trending, \
     total_views, unique_views, total_shares, total_saves, total_comments, \
     avg_read_time, bounce_rate, engagement, approved_by, approved_at, rejection_reason, \
     submitted_for_approval_at, publish_date, created_at, updated_at";

#[derive(FromRow)]
struct ArticleRecord {
    id: Uuid,
    account_id: Uuid,
    created_by: Uuid,
    title: String,
    subtitle: String,
    body: String,
    category: String,
    tags: Vec<String>,
    status: String,
    visibility: String,
    upvotes: i64,
    downvotes: i64,
    vote_score: i64,
    trend_score: f64,
    is_trending: bool,
    total_views: i64,
    unique_views: i64,
    total_shares: i64,
    total_saves: i64,
    total_comments: i64,
    avg_read_time: f64,
    bounce_rate: f64,
    engagement: f64,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    submitted_for_approval_at: Option<DateTime<Utc>>,
    publish_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ArticleRecord {
    fn to_domain(self) -> PortResult<Article> {
        Ok(Article {
            id: self.id,
            account_id: self.account_id,
            created_by: self.created_by,
            title: self.title,
            subtitle: self.subtitle,
            body: self.body,
            category: self.category,
            tags: self.tags,
            status: parse_enum(&self.status, ArticleStatus::parse, "article status")?,
            visibility: parse_enum(&self.visibility, Visibility::parse, "article visibility")?,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            vote_score: self.vote_score,
            trend_score: self.trend_score,
            is_trending: self.is_trending,
            total_views: self.total_views,
            unique_views: self.unique_views,
            total_shares: self.total_shares,
            total_saves: self.total_saves,
            total_comments: self.total_comments,
            avg_read_time: self.avg_read_time,
            bounce_rate: self.bounce_rate,
            engagement: self.engagement,
            approved_by: self.approved_by,
            approved_at: self.approved_at,
            rejection_reason: self.rejection_reason,
            submitted_for_approval_at: self.submitted_for_approval_at,
            publish_date: self.publish_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct VoteRecord {
    id: Uuid,
    article_id: Uuid,
    user_id: Uuid,
    vote_type: String,
    created_at: DateTime<Utc>,
}

impl VoteRecord {
    fn to_domain(self) -> PortResult<Vote> {
        Ok(Vote {
            id: self.id,
            article_id: self.article_id,
            user_id: self.user_id,
            vote_type: parse_enum(&self.vote_type, VoteType::parse, "vote type")?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct EventRecord {
    id: Uuid,
    article_id: Uuid,
    account_id: Uuid,
    user_id: Option<Uuid>,
    event_type: String,
    read_time_seconds: Option<i32>,
    scroll_percentage: Option<f64>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl EventRecord {
    fn to_domain(self) -> PortResult<ArticleEvent> {
        Ok(ArticleEvent {
            id: self.id,
            article_id: self.article_id,
            account_id: self.account_id,
            user_id: self.user_id,
            event_type: parse_enum(&self.event_type, EventType::parse, "event type")?,
            read_time_seconds: self.read_time_seconds,
            scroll_percentage: self.scroll_percentage,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct StatsRecord {
    total_articles: i64,
    published_articles: i64,
    draft_articles: i64,
    total_views: i64,
    total_votes: i64,
}

#[derive(FromRow)]
struct MembershipRecord {
    account_id: Uuid,
    account_role: String,
}

//=========================================================================================
// `ArticleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArticleStore for PgStore {
    async fn insert_article(&self, article: &Article) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO articles \
                 (id, account_id, created_by, title, subtitle, body, category, tags, \
                  status, visibility, publish_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(article.id)
        .bind(article.account_id)
        .bind(article.created_by)
        .bind(&article.title)
        .bind(&article.subtitle)
        .bind(&article.body)
        .bind(&article.category)
        .bind(&article.tags)
        .bind(article.status.as_str())
        .bind(article.visibility.as_str())
        .bind(article.publish_date)
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn get_article(&self, article_id: Uuid) -> PortResult<Article> {
        let sql = format!("SELECT {} FROM articles WHERE id = $1", ARTICLE_COLUMNS);
        let record = sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(article_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err(&format!("Article {} not found", article_id), e))?;
        record.to_domain()
    }

    async fn update_content(
        &self,
        article_id: Uuid,
        patch: &ArticlePatch,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE articles SET \
                 title = COALESCE($2, title), \
                 subtitle = COALESCE($3, subtitle), \
                 body = COALESCE($4, body), \
                 category = COALESCE($5, category), \
                 tags = COALESCE($6, tags), \
                 visibility = COALESCE($7, visibility), \
                 updated_at = $8 \
             WHERE id = $1",
        )
        .bind(article_id)
        .bind(patch.title.as_deref())
        .bind(patch.subtitle.as_deref())
        .bind(patch.body.as_deref())
        .bind(patch.category.as_deref())
        .bind(patch.tags.as_deref())
        .bind(patch.visibility.map(|v| v.as_str()))
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn delete_article(&self, article_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn list_articles(&self, filters: &ArticleFilters) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR category = $2) \
               AND ($3::text IS NULL OR visibility = $3) \
               AND ($4::uuid IS NULL OR account_id = $4) \
               AND ($5::text IS NULL OR title ILIKE $5 OR subtitle ILIKE $5) \
             ORDER BY created_at DESC",
            ARTICLE_COLUMNS
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(filters.status.map(|s| s.as_str()))
            .bind(filters.category.as_deref())
            .bind(filters.visibility.map(|v| v.as_str()))
            .bind(filters.account_id)
            .bind(filters.search.as_ref().map(|s| format!("%{}%", s)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("articles", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_published_public(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles \
             WHERE visibility = 'public' AND status = 'published' \
               AND ($1::text IS NULL OR category = $1) \
               AND ($2::text IS NULL OR title ILIKE $2 OR subtitle ILIKE $2) \
             ORDER BY trend_score DESC",
            ARTICLE_COLUMNS
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&sql)
            .bind(category)
            .bind(search.map(|s| format!("%{}%", s)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("articles", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn published_articles(&self) -> PortResult<Vec<Article>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE status = 'published'",
            ARTICLE_COLUMNS
        );
        let records = sqlx::query_as::<_, ArticleRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_err("articles", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn find_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<Option<Vote>> {
        let record = sqlx::query_as::<_, VoteRecord>(
            "SELECT id, article_id, user_id, vote_type, created_at \
             FROM article_votes WHERE article_id = $1 AND user_id = $2",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("vote", e))?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn insert_vote(&self, vote: &Vote) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO article_votes (id, article_id, user_id, vote_type, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(vote.id)
        .bind(vote.article_id)
        .bind(vote.user_id)
        .bind(vote.vote_type.as_str())
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("vote", e))?;
        Ok(())
    }

    async fn update_vote_type(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        vote_type: VoteType,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE article_votes SET vote_type = $3 WHERE article_id = $1 AND user_id = $2",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(vote_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("vote", e))?;
        Ok(())
    }

    async fn delete_vote(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM article_votes WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("vote", e))?;
        Ok(())
    }

    async fn votes_for_article(&self, article_id: Uuid) -> PortResult<Vec<Vote>> {
        let records = sqlx::query_as::<_, VoteRecord>(
            "SELECT id, article_id, user_id, vote_type, created_at \
             FROM article_votes WHERE article_id = $1",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("votes", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_vote_counts(
        &self,
        article_id: Uuid,
        upvotes: i64,
        downvotes: i64,
        vote_score: i64,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE articles SET upvotes = $2, downvotes = $3, vote_score = $4, \
             updated_at = now() WHERE id = $1",
        )
        .bind(article_id)
        .bind(upvotes)
        .bind(downvotes)
        .bind(vote_score)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn update_trend(
        &self,
        article_id: Uuid,
        trend_score: f64,
        is_trending: bool,
    ) -> PortResult<()> {
        sqlx::query("UPDATE articles SET trend_score = $2, is_trending = $3 WHERE id = $1")
            .bind(article_id)
            .bind(trend_score)
            .bind(is_trending)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn insert_event(&self, event: &ArticleEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO article_events \
                 (id, article_id, account_id, user_id, event_type, read_time_seconds, \
                  scroll_percentage, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.article_id)
        .bind(event.account_id)
        .bind(event.user_id)
        .bind(event.event_type.as_str())
        .bind(event.read_time_seconds)
        .bind(event.scroll_percentage)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("event", e))?;
        Ok(())
    }

    async fn has_event(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM article_events \
             WHERE article_id = $1 AND user_id = $2 AND event_type = $3)",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(event_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("event", e))?;
        Ok(exists)
    }

    async fn delete_events(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        event_type: EventType,
    ) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM article_events \
             WHERE article_id = $1 AND user_id = $2 AND event_type = $3",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(event_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("event", e))?;
        Ok(())
    }

    async fn events_for_article(&self, article_id: Uuid) -> PortResult<Vec<ArticleEvent>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT id, article_id, account_id, user_id, event_type, read_time_seconds, \
                    scroll_percentage, metadata, created_at \
             FROM article_events WHERE article_id = $1 ORDER BY created_at ASC",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("events", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn events_on_date(&self, date: NaiveDate) -> PortResult<Vec<ArticleEvent>> {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = (date + Days::new(1)).and_time(NaiveTime::MIN).and_utc();
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT id, article_id, account_id, user_id, event_type, read_time_seconds, \
                    scroll_percentage, metadata, created_at \
             FROM article_events WHERE created_at >= $1 AND created_at < $2 \
             ORDER BY created_at ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("events", e))?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_engagement(
        &self,
        article_id: Uuid,
        totals: &EngagementTotals,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE articles SET total_views = $2, unique_views = $3, total_shares = $4, \
                 total_saves = $5, total_comments = $6, avg_read_time = $7, \
                 bounce_rate = $8, engagement = $9, updated_at = now() \
             WHERE id = $1",
        )
        .bind(article_id)
        .bind(totals.total_views)
        .bind(totals.unique_views)
        .bind(totals.total_shares)
        .bind(totals.total_saves)
        .bind(totals.total_comments)
        .bind(totals.avg_read_time)
        .bind(totals.bounce_rate)
        .bind(totals.engagement)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn is_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM saved_articles WHERE article_id = $1 AND user_id = $2)",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("save", e))?;
        Ok(exists)
    }

    async fn insert_saved(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        saved_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO saved_articles (article_id, user_id, saved_at) VALUES ($1, $2, $3) \
             ON CONFLICT (article_id, user_id) DO NOTHING",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("save", e))?;
        Ok(())
    }

    async fn delete_saved(&self, article_id: Uuid, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM saved_articles WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("save", e))?;
        Ok(())
    }

    async fn count_saved(&self, article_id: Uuid) -> PortResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM saved_articles WHERE article_id = $1",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("saves", e))?;
        Ok(count)
    }

    async fn apply_approval(&self, article_id: Uuid, update: &ApprovalUpdate) -> PortResult<()> {
        sqlx::query(
            "UPDATE articles SET status = $2, visibility = $3, publish_date = $4, \
                 submitted_for_approval_at = $5, approved_by = $6, approved_at = $7, \
                 rejection_reason = $8, updated_at = now() \
             WHERE id = $1",
        )
        .bind(article_id)
        .bind(update.status.as_str())
        .bind(update.visibility.as_str())
        .bind(update.publish_date)
        .bind(update.submitted_for_approval_at)
        .bind(update.approved_by)
        .bind(update.approved_at)
        .bind(update.rejection_reason.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("article", e))?;
        Ok(())
    }

    async fn upsert_daily_analytics(&self, row: &DailyAnalytics) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO daily_analytics \
                 (article_id, account_id, date, views, unique_views, shares, saves, comments, \
                  likes, votes, avg_read_time, avg_scroll_percentage, bounce_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (article_id, date) DO UPDATE SET \
                 account_id = EXCLUDED.account_id, \
                 views = EXCLUDED.views, \
                 unique_views = EXCLUDED.unique_views, \
                 shares = EXCLUDED.shares, \
                 saves = EXCLUDED.saves, \
                 comments = EXCLUDED.comments, \
                 likes = EXCLUDED.likes, \
                 votes = EXCLUDED.votes, \
                 avg_read_time = EXCLUDED.avg_read_time, \
                 avg_scroll_percentage = EXCLUDED.avg_scroll_percentage, \
                 bounce_rate = EXCLUDED.bounce_rate",
        )
        .bind(row.article_id)
        .bind(row.account_id)
        .bind(row.date)
        .bind(row.views)
        .bind(row.unique_views)
        .bind(row.shares)
        .bind(row.saves)
        .bind(row.comments)
        .bind(row.likes)
        .bind(row.votes)
        .bind(row.avg_read_time)
        .bind(row.avg_scroll_percentage)
        .bind(row.bounce_rate)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("daily analytics", e))?;
        Ok(())
    }

    async fn account_stats(&self, account_id: Uuid) -> PortResult<AccountStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "SELECT COUNT(*) AS total_articles, \
                    COUNT(*) FILTER (WHERE status = 'published') AS published_articles, \
                    COUNT(*) FILTER (WHERE status = 'draft') AS draft_articles, \
                    COALESCE(SUM(total_views), 0)::BIGINT AS total_views, \
                    (SELECT COUNT(*) FROM article_votes v \
                       JOIN articles a ON a.id = v.article_id \
                      WHERE a.account_id = $1) AS total_votes \
             FROM articles WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("account stats", e))?;
        Ok(AccountStats {
            account_id,
            total_articles: record.total_articles,
            published_articles: record.published_articles,
            draft_articles: record.draft_articles,
            total_views: record.total_views,
            total_votes: record.total_votes,
        })
    }
}

//=========================================================================================
// `MembershipService` Trait Implementation
//=========================================================================================

#[async_trait]
impl MembershipService for PgStore {
    async fn memberships_for_user(&self, user_id: Uuid) -> PortResult<Vec<Membership>> {
        let records = sqlx::query_as::<_, MembershipRecord>(
            "SELECT account_id, account_role FROM account_user WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err("memberships", e))?;
        records
            .into_iter()
            .map(|r| {
                Ok(Membership {
                    account_id: r.account_id,
                    role: parse_enum(&r.account_role, AccountRole::parse, "account role")?,
                })
            })
            .collect()
    }

    async fn is_global_admin(&self, user_id: Uuid) -> PortResult<bool> {
        let is_admin = sqlx::query_scalar::<_, bool>(
            "SELECT is_admin FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_err("user", e))?;
        Ok(is_admin.unwrap_or(false))
    }
}

//=========================================================================================
// `AuthStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthStore for PgStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("user", e))?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err(&format!("user {}", email), e))?;

        // Every user gets a personal account they own.
        let account_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO accounts (name, personal_account) VALUES ($1, TRUE) RETURNING id",
        )
        .bind(email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_err("account", e))?;

        sqlx::query(
            "INSERT INTO account_user (account_id, user_id, account_role) VALUES ($1, $2, 'owner')",
        )
        .bind(account_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_err("membership", e))?;

        tx.commit().await.map_err(|e| map_db_err("user", e))?;

        Ok(User {
            user_id,
            email: Some(email.to_string()),
            is_global_admin: false,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        #[derive(FromRow)]
        struct CredentialsRecord {
            user_id: Uuid,
            email: String,
            hashed_password: String,
        }

        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(&format!("user {}", email), e))?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("auth session", e))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err("auth session", e))?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("auth session", e))?;
        Ok(())
    }
}
