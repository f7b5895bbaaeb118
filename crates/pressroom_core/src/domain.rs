//! crates/pressroom_core/src/domain.rs
//!
//! Defines the pure, core data structures for the engagement engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

//=========================================================================================
// Closed Enumerations
//=========================================================================================

/// Lifecycle status of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleStatus {
    Draft,
    PendingApproval,
    Published,
    Archived,
    Scheduled,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::PendingApproval => "pending_approval",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
            ArticleStatus::Scheduled => "scheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ArticleStatus::Draft),
            "pending_approval" => Some(ArticleStatus::PendingApproval),
            "published" => Some(ArticleStatus::Published),
            "archived" => Some(ArticleStatus::Archived),
            "scheduled" => Some(ArticleStatus::Scheduled),
            _ => None,
        }
    }
}

/// Exposure level of an article, independent of tenant membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Account,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Account => "account",
            Visibility::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Visibility::Private),
            "account" => Some(Visibility::Account),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

/// Role a user holds inside an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Owner,
    Admin,
    Member,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Owner => "owner",
            AccountRole::Admin => "admin",
            AccountRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(AccountRole::Owner),
            "admin" => Some(AccountRole::Admin),
            "member" => Some(AccountRole::Member),
            _ => None,
        }
    }

    /// Owners and admins can manage any article in their account.
    pub fn can_manage(&self) -> bool {
        matches!(self, AccountRole::Owner | AccountRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upvote" => Some(VoteType::Upvote),
            "downvote" => Some(VoteType::Downvote),
            _ => None,
        }
    }
}

/// Kind of interaction recorded in the event ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    View,
    Share,
    Save,
    Comment,
    Like,
    Upvote,
    Downvote,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::Share => "share",
            EventType::Save => "save",
            EventType::Comment => "comment",
            EventType::Like => "like",
            EventType::Upvote => "upvote",
            EventType::Downvote => "downvote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(EventType::View),
            "share" => Some(EventType::Share),
            "save" => Some(EventType::Save),
            "comment" => Some(EventType::Comment),
            "like" => Some(EventType::Like),
            "upvote" => Some(EventType::Upvote),
            "downvote" => Some(EventType::Downvote),
            _ => None,
        }
    }

    /// Views and saves count at most once per (article, actor); everything
    /// else is a distinct fact each time it happens.
    pub fn is_deduplicated(&self) -> bool {
        matches!(self, EventType::View | EventType::Save)
    }
}

//=========================================================================================
// Principals
//=========================================================================================

/// A user's membership in one account.
#[derive(Debug, Clone)]
pub struct Membership {
    pub account_id: Uuid,
    pub role: AccountRole,
}

/// The acting principal for a request: an identified user with their
/// account memberships, or an anonymous visitor.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub memberships: Vec<Membership>,
    pub is_global_admin: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            memberships: Vec::new(),
            is_global_admin: false,
        }
    }

    pub fn identified(user_id: Uuid, memberships: Vec<Membership>, is_global_admin: bool) -> Self {
        Self {
            user_id: Some(user_id),
            memberships,
            is_global_admin,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn role_in(&self, account_id: Uuid) -> Option<AccountRole> {
        self.memberships
            .iter()
            .find(|m| m.account_id == account_id)
            .map(|m| m.role)
    }

    pub fn is_member_of(&self, account_id: Uuid) -> bool {
        self.role_in(account_id).is_some()
    }
}

//=========================================================================================
// Articles
//=========================================================================================

/// A content unit owned by an account, written by one of its users.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: ArticleStatus,
    pub visibility: Visibility,
    // Vote aggregates, always recomputed from the vote ledger.
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub trend_score: f64,
    pub is_trending: bool,
    // Engagement aggregates, recomputed from the event ledger.
    pub total_views: i64,
    pub unique_views: i64,
    pub total_shares: i64,
    pub total_saves: i64,
    pub total_comments: i64,
    pub avg_read_time: f64,
    pub bounce_rate: f64,
    pub engagement: f64,
    // Approval metadata. Set and cleared together, never partially.
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub submitted_for_approval_at: Option<DateTime<Utc>>,
    pub publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// The timestamp the trend decay is measured from.
    pub fn trend_basis(&self) -> DateTime<Utc> {
        self.publish_date.unwrap_or(self.created_at)
    }
}

/// Fields a caller may change on an existing article. `None` leaves the
/// current value in place; account and creator never change on update,
/// and status only moves through the approval workflow.
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

/// Input for creating a new article. Status always starts at `draft`;
/// publication is only reachable through the approval workflow.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub account_id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
}

/// Filters for the article listing.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilters {
    pub status: Option<ArticleStatus>,
    pub category: Option<String>,
    pub visibility: Option<Visibility>,
    pub account_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

//=========================================================================================
// Votes, Events, Saves
//=========================================================================================

/// One live vote per (article, voter).
#[derive(Debug, Clone)]
pub struct Vote {
    pub id: Uuid,
    pub article_id: Uuid,
    pub user_id: Uuid,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// An append-only interaction record. `user_id` is `None` for anonymous
/// visitors, whose events stay in the ledger but never count toward
/// aggregates.
#[derive(Debug, Clone)]
pub struct ArticleEvent {
    pub id: Uuid,
    pub article_id: Uuid,
    pub account_id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: EventType,
    pub read_time_seconds: Option<i32>,
    pub scroll_percentage: Option<f64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Analytics
//=========================================================================================

/// One rollup row per (article, date), written only by the rollup job.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAnalytics {
    pub article_id: Uuid,
    pub account_id: Uuid,
    pub date: NaiveDate,
    pub views: i64,
    pub unique_views: i64,
    pub shares: i64,
    pub saves: i64,
    pub comments: i64,
    pub likes: i64,
    pub votes: i64,
    pub avg_read_time: f64,
    pub avg_scroll_percentage: f64,
    pub bounce_rate: f64,
}

/// Per-account article summary for the dashboard.
#[derive(Debug, Clone)]
pub struct AccountStats {
    pub account_id: Uuid,
    pub total_articles: i64,
    pub published_articles: i64,
    pub draft_articles: i64,
    pub total_views: i64,
    pub total_votes: i64,
}

//=========================================================================================
// Users and Auth (collaborator context)
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_global_admin: bool,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
