//! services/api/src/web/middleware.rs
//!
//! Actor-loading middleware: resolves the session cookie into the acting
//! principal for the engine.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use pressroom_core::domain::Actor;

use crate::web::state::AppState;

/// Resolves the auth session cookie into an `Actor` and stores it in the
/// request extensions for handlers to use.
///
/// A missing or invalid cookie yields an anonymous actor rather than a
/// 401: the engine itself distinguishes operations that require identity
/// from those open to the public.
pub async fn load_actor(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let actor = match session_id_from_headers(&req) {
        Some(session_id) => resolve_actor(&state, &session_id).await,
        None => Actor::anonymous(),
    };
    req.extensions_mut().insert(actor);
    next.run(req).await
}

/// Extracts the session cookie value, if any.
fn session_id_from_headers(req: &Request) -> Option<String> {
    let cookie_header = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookie_header
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .map(|s| s.to_string())
}

/// Builds the full principal: validated user id, account memberships, and
/// the global-admin flag. Any lookup failure degrades to anonymous.
async fn resolve_actor(state: &AppState, session_id: &str) -> Actor {
    let user_id = match state.auth.validate_auth_session(session_id).await {
        Ok(user_id) => user_id,
        Err(_) => return Actor::anonymous(),
    };

    let memberships = match state.directory.memberships_for_user(user_id).await {
        Ok(memberships) => memberships,
        Err(e) => {
            warn!("Failed to load memberships for {}: {:?}", user_id, e);
            Vec::new()
        }
    };
    let is_global_admin = state
        .directory
        .is_global_admin(user_id)
        .await
        .unwrap_or(false);

    Actor::identified(user_id, memberships, is_global_admin)
}
