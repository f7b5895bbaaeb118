//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::PgStore,
    config::Config,
    error::ApiError,
    jobs::spawn_engine_jobs,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        load_actor,
        rest::{
            account_stats_handler, approve_handler, create_article_handler,
            delete_article_handler, discover_handler, get_article_handler,
            list_articles_handler, record_event_handler, reject_handler, save_handler,
            submit_handler, unsave_handler, update_article_handler, vote_handler,
        },
        state::AppState,
        ApiDoc,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use pressroom_core::engine::Engine;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Engine & Shared AppState ---
    let engine = Arc::new(Engine::new(store.clone()));
    let app_state = Arc::new(AppState {
        engine: engine.clone(),
        auth: store.clone(),
        directory: store.clone(),
        config: config.clone(),
    });

    // --- 4. Start the Background Jobs ---
    let shutdown = CancellationToken::new();
    let jobs = spawn_engine_jobs(engine.clone(), &config, shutdown.clone());

    // --- 5. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Auth routes carry no actor context.
    let auth_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Engine routes resolve the session cookie into an Actor; anonymous
    // visitors pass through and the engine decides what they may do.
    let engine_routes = Router::new()
        .route("/articles", post(create_article_handler).get(list_articles_handler))
        .route(
            "/articles/{id}",
            get(get_article_handler)
                .put(update_article_handler)
                .delete(delete_article_handler),
        )
        .route("/articles/{id}/vote", post(vote_handler))
        .route("/articles/{id}/events", post(record_event_handler))
        .route(
            "/articles/{id}/save",
            post(save_handler).delete(unsave_handler),
        )
        .route("/articles/{id}/submit", post(submit_handler))
        .route("/articles/{id}/approve", post(approve_handler))
        .route("/articles/{id}/reject", post(reject_handler))
        .route("/discover", get(discover_handler))
        .route("/accounts/{account_id}/stats", get(account_stats_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            load_actor,
        ));

    let api_router = Router::new()
        .merge(auth_routes)
        .merge(engine_routes)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received.");
        })
        .await?;

    // --- 7. Stop the Background Jobs ---
    shutdown.cancel();
    for job in jobs {
        job.await.ok();
    }

    Ok(())
}
