use axum::{routing::get, Router};
use tracing::instrument;

use crate::{
    auth::{
        extractors::{AuthUser, MaybeUser},
        repo_types::User,
    },
    flash::{Flash, IncomingFlash},
    state::AppState,
    views::{self, Page},
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/market-data", get(market_data))
        .route("/ico-ido-calendar", get(ico_ido_calendar))
        .route("/crypto-news", get(crypto_news))
}

pub fn member_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[instrument(skip_all)]
pub async fn index(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page {
    Page::new("Home", views::index(user.as_ref()))
        .user(user.as_ref())
        .incoming(flash)
}

#[instrument(skip_all)]
pub async fn dashboard(
    AuthUser { user, .. }: AuthUser,
    IncomingFlash(flash): IncomingFlash,
) -> Page {
    Page::new("Dashboard", views::dashboard(&user))
        .user(Some(&user))
        .incoming(flash)
}

#[instrument(skip_all)]
pub async fn market_data(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page {
    placeholder("Market Data", user, flash)
}

#[instrument(skip_all)]
pub async fn ico_ido_calendar(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Page {
    placeholder("ICO/IDO Calendar", user, flash)
}

#[instrument(skip_all)]
pub async fn crypto_news(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page {
    placeholder("Crypto News", user, flash)
}

fn placeholder(title: &str, user: Option<User>, flash: Option<Flash>) -> Page {
    Page::new(title, views::placeholder(title))
        .user(user.as_ref())
        .incoming(flash)
}
