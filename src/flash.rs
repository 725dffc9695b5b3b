//! One-shot messages carried across a redirect in a short-lived cookie.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use cookie::{Cookie, SameSite};

use crate::auth::session::read_cookie;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Danger,
    Info,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Danger => "danger",
            Level::Info => "info",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Level::Success),
            "danger" => Some(Level::Danger),
            "info" => Some(Level::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: Level::Success, message: message.into() }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self { level: Level::Danger, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: Level::Info, message: message.into() }
    }

    /// `Set-Cookie` value carrying this message to the next page.
    pub fn cookie(&self) -> String {
        Cookie::build((FLASH_COOKIE, format!("{}:{}", self.level.as_str(), self.message)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
            .encoded()
            .to_string()
    }

    pub fn clear_cookie() -> String {
        let mut cookie = Cookie::build((FLASH_COOKIE, "")).path("/").build();
        cookie.make_removal();
        cookie.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        let (level, message) = raw.split_once(':')?;
        Some(Self {
            level: Level::parse(level)?,
            message: message.to_owned(),
        })
    }
}

/// Flash message left by the previous response, if any. The page that shows it is
/// responsible for clearing the cookie.
pub struct IncomingFlash(pub Option<Flash>);

#[async_trait]
impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            read_cookie(&parts.headers, FLASH_COOKIE).and_then(|raw| Flash::decode(&raw)),
        ))
    }
}
