use crate::state::AppState;
use axum::{middleware, Router};

mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes()).merge(
        handlers::session_routes().route_layer(middleware::from_fn(extractors::require_auth)),
    )
}
