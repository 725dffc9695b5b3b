use crate::{auth::extractors::require_auth, state::AppState};
use axum::{middleware, Router};

pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::public_routes()).merge(
        handlers::member_routes().route_layer(middleware::from_fn(require_auth)),
    )
}
