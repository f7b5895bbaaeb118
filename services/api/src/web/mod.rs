pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the pieces the binary needs to build the router.
pub use middleware::load_actor;
pub use rest::ApiDoc;
