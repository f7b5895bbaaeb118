//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use pressroom_core::domain::{
    Actor, Article, ArticleFilters, ArticlePatch, ArticleStatus, EventType, NewArticle,
    Pagination, Visibility, VoteType,
};
use pressroom_core::engine::{ArticleView, EngineError, EventInput, RecordOutcome};

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        create_article_handler,
        list_articles_handler,
        get_article_handler,
        update_article_handler,
        delete_article_handler,
        vote_handler,
        record_event_handler,
        save_handler,
        unsave_handler,
        submit_handler,
        approve_handler,
        reject_handler,
        discover_handler,
        account_stats_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            CreateArticleRequest,
            UpdateArticleRequest,
            VoteRequest,
            EventRequest,
            RejectRequest,
            ArticleResponse,
            ArticleListResponse,
            VoteResponse,
            EventResponse,
            SaveResponse,
            AccountStatsResponse,
        )
    ),
    tags(
        (name = "Pressroom API", description = "Articles, engagement, and approval workflow.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateArticleRequest {
    pub account_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// One of `private`, `account`, `public`. Defaults to `account`.
    pub visibility: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct VoteRequest {
    /// `upvote` or `downvote`. Repeating the current vote removes it.
    pub vote_type: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EventRequest {
    /// One of `view`, `share`, `save`, `comment`, `like`.
    pub event_type: String,
    pub read_time_seconds: Option<i32>,
    pub scroll_percentage: Option<f64>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// Query parameters for the article listing.
#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<String>,
    pub account_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct DiscoverQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: String,
    pub visibility: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub trend_score: f64,
    pub is_trending: bool,
    pub total_views: i64,
    pub unique_views: i64,
    pub total_shares: i64,
    pub total_saves: i64,
    pub total_comments: i64,
    pub avg_read_time: f64,
    pub bounce_rate: f64,
    pub engagement: f64,
    pub rejection_reason: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The acting user's live vote, if any.
    pub user_vote: Option<String>,
    /// Whether the acting user currently has this article saved.
    pub saved: bool,
}

impl ArticleResponse {
    fn from_article(article: Article) -> Self {
        Self::new(article, None, false)
    }

    fn from_view(view: ArticleView) -> Self {
        Self::new(view.article, view.user_vote, view.saved)
    }

    fn new(article: Article, user_vote: Option<VoteType>, saved: bool) -> Self {
        Self {
            id: article.id,
            account_id: article.account_id,
            created_by: article.created_by,
            title: article.title,
            subtitle: article.subtitle,
            body: article.body,
            category: article.category,
            tags: article.tags,
            status: article.status.as_str().to_string(),
            visibility: article.visibility.as_str().to_string(),
            upvotes: article.upvotes,
            downvotes: article.downvotes,
            vote_score: article.vote_score,
            trend_score: article.trend_score,
            is_trending: article.is_trending,
            total_views: article.total_views,
            unique_views: article.unique_views,
            total_shares: article.total_shares,
            total_saves: article.total_saves,
            total_comments: article.total_comments,
            avg_read_time: article.avg_read_time,
            bounce_rate: article.bounce_rate,
            engagement: article.engagement,
            rejection_reason: article.rejection_reason,
            publish_date: article.publish_date,
            created_at: article.created_at,
            updated_at: article.updated_at,
            user_vote: user_vote.map(|v| v.as_str().to_string()),
            saved,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleResponse>,
    pub total_count: usize,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

#[derive(Serialize, ToSchema)]
pub struct VoteResponse {
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub user_vote: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EventResponse {
    /// False when the event was suppressed by view/save deduplication.
    pub recorded: bool,
    pub event_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    pub saved: bool,
    pub total_saves: i64,
}

#[derive(Serialize, ToSchema)]
pub struct AccountStatsResponse {
    pub account_id: Uuid,
    pub total_articles: i64,
    pub published_articles: i64,
    pub draft_articles: i64,
    pub total_views: i64,
    pub total_votes: i64,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps engine errors onto HTTP statuses. 401 vs 403 mirrors the engine's
/// Unauthenticated/Forbidden split so clients can redirect to login.
fn error_response(err: EngineError) -> (StatusCode, String) {
    let status = match &err {
        EngineError::Unauthenticated => StatusCode::UNAUTHORIZED,
        EngineError::Forbidden => StatusCode::FORBIDDEN,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidTransition(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Engine failure: {:?}", err);
        (status, "Internal server error".to_string())
    } else {
        (status, err.to_string())
    }
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

fn pagination_from(page: Option<u32>, page_size: Option<u32>) -> Pagination {
    let default = Pagination::default();
    Pagination {
        page: page.unwrap_or(default.page),
        page_size: page_size.unwrap_or(default.page_size),
    }
}

//=========================================================================================
// Article Handlers
//=========================================================================================

/// Create a new draft article in an account the user belongs to.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created", body = ArticleResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not a member of the account"),
        (status = 422, description = "Invalid article payload")
    )
)]
pub async fn create_article_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let visibility = match req.visibility.as_deref() {
        Some(raw) => Visibility::parse(raw)
            .ok_or_else(|| bad_request(format!("Unknown visibility '{}'", raw)))?,
        None => Visibility::Account,
    };
    let input = NewArticle {
        account_id: req.account_id,
        title: req.title,
        subtitle: req.subtitle,
        body: req.body,
        category: req.category,
        tags: req.tags,
        visibility,
    };

    let article = state
        .engine
        .create_article(&actor, input)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(ArticleResponse::from_article(article))))
}

/// List articles visible to the acting user, with filters and pagination.
#[utoipa::path(
    get,
    path = "/articles",
    responses(
        (status = 200, description = "One page of articles", body = ArticleListResponse),
        (status = 422, description = "Invalid pagination or filters")
    )
)]
pub async fn list_articles_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(|raw| ArticleStatus::parse(raw).ok_or_else(|| bad_request(format!("Unknown status '{}'", raw))))
        .transpose()?;
    let visibility = query
        .visibility
        .as_deref()
        .map(|raw| Visibility::parse(raw).ok_or_else(|| bad_request(format!("Unknown visibility '{}'", raw))))
        .transpose()?;

    let filters = ArticleFilters {
        status,
        category: query.category,
        visibility,
        account_id: query.account_id,
        search: query.search,
    };
    let page = state
        .engine
        .list_articles(&actor, filters, pagination_from(query.page, query.page_size))
        .await
        .map_err(error_response)?;

    Ok(Json(ArticleListResponse {
        articles: page.articles.into_iter().map(ArticleResponse::from_article).collect(),
        total_count: page.total_count,
        page: page.page,
        page_size: page.page_size,
        has_more: page.has_more,
    }))
}

/// Fetch one article, including the acting user's vote and save state.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    responses(
        (status = 200, description = "The article", body = ArticleResponse),
        (status = 401, description = "Login required to view this article"),
        (status = 403, description = "Not allowed to view this article"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn get_article_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .engine
        .get_article(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(ArticleResponse::from_view(view)))
}

/// Update an article's content fields.
#[utoipa::path(
    put,
    path = "/articles/{id}",
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "The updated article", body = ArticleResponse),
        (status = 403, description = "Only the author or an account owner/admin may edit"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn update_article_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let visibility = req
        .visibility
        .as_deref()
        .map(|raw| Visibility::parse(raw).ok_or_else(|| bad_request(format!("Unknown visibility '{}'", raw))))
        .transpose()?;
    let patch = ArticlePatch {
        title: req.title,
        subtitle: req.subtitle,
        body: req.body,
        category: req.category,
        tags: req.tags,
        visibility,
    };

    let article = state
        .engine
        .update_article(&actor, id, patch)
        .await
        .map_err(error_response)?;
    Ok(Json(ArticleResponse::from_article(article)))
}

/// Delete an article. Account owners and admins only.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    responses(
        (status = 200, description = "Article deleted"),
        (status = 403, description = "Only an account owner/admin may delete"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn delete_article_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .engine
        .delete_article(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "message": "Article deleted successfully" })))
}

//=========================================================================================
// Engagement Handlers
//=========================================================================================

/// Cast, flip, or toggle off a vote.
#[utoipa::path(
    post,
    path = "/articles/{id}/vote",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Fresh vote counts", body = VoteResponse),
        (status = 401, description = "Login required to vote"),
        (status = 403, description = "Cannot vote on articles you cannot view"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let vote_type = VoteType::parse(&req.vote_type)
        .ok_or_else(|| bad_request("Vote type must be 'upvote' or 'downvote'"))?;

    let outcome = state
        .engine
        .cast_vote(&actor, id, vote_type)
        .await
        .map_err(error_response)?;
    Ok(Json(VoteResponse {
        upvotes: outcome.upvotes,
        downvotes: outcome.downvotes,
        vote_score: outcome.vote_score,
        user_vote: outcome.user_vote.map(|v| v.as_str().to_string()),
    }))
}

/// Record an interaction event. Views and saves count once per reader.
#[utoipa::path(
    post,
    path = "/articles/{id}/events",
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event outcome", body = EventResponse),
        (status = 404, description = "No such article"),
        (status = 400, description = "Unknown event type")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn record_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let event_type = EventType::parse(&req.event_type)
        .ok_or_else(|| bad_request(format!("Unknown event type '{}'", req.event_type)))?;
    let input = EventInput {
        read_time_seconds: req.read_time_seconds,
        scroll_percentage: req.scroll_percentage,
        metadata: req.metadata.unwrap_or(serde_json::Value::Null),
    };

    let outcome = state
        .engine
        .record_event(&actor, id, event_type, input)
        .await
        .map_err(error_response)?;
    let response = match outcome {
        RecordOutcome::Recorded { event_id } => EventResponse {
            recorded: true,
            event_id: Some(event_id),
        },
        RecordOutcome::Duplicate => EventResponse {
            recorded: false,
            event_id: None,
        },
    };
    Ok(Json(response))
}

/// Save an article to the user's reading list.
#[utoipa::path(
    post,
    path = "/articles/{id}/save",
    responses(
        (status = 200, description = "Save state", body = SaveResponse),
        (status = 401, description = "Login required to save"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn save_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .engine
        .save_article(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(SaveResponse {
        saved: outcome.saved,
        total_saves: outcome.total_saves,
    }))
}

/// Remove an article from the user's reading list.
#[utoipa::path(
    delete,
    path = "/articles/{id}/save",
    responses(
        (status = 200, description = "Save state", body = SaveResponse),
        (status = 401, description = "Login required"),
        (status = 404, description = "No such article")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn unsave_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .engine
        .unsave_article(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(SaveResponse {
        saved: outcome.saved,
        total_saves: outcome.total_saves,
    }))
}

//=========================================================================================
// Approval Workflow Handlers
//=========================================================================================

/// Submit a draft for approval. Creator only.
#[utoipa::path(
    post,
    path = "/articles/{id}/submit",
    responses(
        (status = 200, description = "The pending article", body = ArticleResponse),
        (status = 403, description = "Only the creator may submit"),
        (status = 409, description = "Not in draft")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let article = state
        .engine
        .submit_for_approval(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(ArticleResponse::from_article(article)))
}

/// Approve a pending article and publish it. Global administrators only.
#[utoipa::path(
    post,
    path = "/articles/{id}/approve",
    responses(
        (status = 200, description = "The published article", body = ArticleResponse),
        (status = 403, description = "Administrator access required"),
        (status = 409, description = "Not pending approval")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn approve_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let article = state
        .engine
        .approve_article(&actor, id)
        .await
        .map_err(error_response)?;
    Ok(Json(ArticleResponse::from_article(article)))
}

/// Reject a pending article back to draft. Global administrators only.
#[utoipa::path(
    post,
    path = "/articles/{id}/reject",
    request_body = RejectRequest,
    responses(
        (status = 200, description = "The rejected article, back in draft", body = ArticleResponse),
        (status = 403, description = "Administrator access required"),
        (status = 409, description = "Not pending approval")
    ),
    params(("id" = Uuid, Path, description = "Article ID"))
)]
pub async fn reject_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let article = state
        .engine
        .reject_article(&actor, id, req.reason)
        .await
        .map_err(error_response)?;
    Ok(Json(ArticleResponse::from_article(article)))
}

//=========================================================================================
// Public and Dashboard Handlers
//=========================================================================================

/// The public discover feed: published public articles by trend score.
/// No authentication required.
#[utoipa::path(
    get,
    path = "/discover",
    responses(
        (status = 200, description = "One page of trending articles", body = ArticleListResponse)
    )
)]
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = state
        .engine
        .list_public(
            query.category.as_deref(),
            query.search.as_deref(),
            pagination_from(query.page, query.page_size),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(ArticleListResponse {
        articles: page.articles.into_iter().map(ArticleResponse::from_article).collect(),
        total_count: page.total_count,
        page: page.page,
        page_size: page.page_size,
        has_more: page.has_more,
    }))
}

/// Article statistics for an account. Members only.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/stats",
    responses(
        (status = 200, description = "Account article statistics", body = AccountStatsResponse),
        (status = 403, description = "Not a member of this account")
    ),
    params(("account_id" = Uuid, Path, description = "Account ID"))
)]
pub async fn account_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = state
        .engine
        .account_stats(&actor, account_id)
        .await
        .map_err(error_response)?;
    Ok(Json(AccountStatsResponse {
        account_id: stats.account_id,
        total_articles: stats.total_articles,
        published_articles: stats.published_articles,
        draft_articles: stats.draft_articles,
        total_views: stats.total_views,
        total_votes: stats.total_votes,
    }))
}
