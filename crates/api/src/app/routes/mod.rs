use axum::Router;

pub mod groups;
pub mod members;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/members", members::router())
        .nest("/groups", groups::router())
}
