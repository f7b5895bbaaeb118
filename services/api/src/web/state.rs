//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use pressroom_core::engine::Engine;
use pressroom_core::ports::{AuthStore, MembershipService};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub auth: Arc<dyn AuthStore>,
    pub directory: Arc<dyn MembershipService>,
    pub config: Arc<Config>,
}
