use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, Uri},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

use super::{repo_types::User, session::SessionManager};
use crate::flash::Flash;

/// Who is making the request, resolved once per request by [`load_session`].
#[derive(Debug, Clone)]
pub enum CurrentSession {
    Anonymous,
    Authenticated { user: User, token: String },
}

/// Resolves the session cookie into a [`CurrentSession`] request extension.
/// Lookup failures degrade to anonymous; a stale cookie is cleared on the way out.
pub async fn load_session(
    State(sessions): State<SessionManager>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut stale = false;
    let current = match sessions.token_from_headers(req.headers()) {
        None => CurrentSession::Anonymous,
        Some(token) => match sessions.current_user(&token).await {
            Ok(Some(user)) => CurrentSession::Authenticated { user, token },
            Ok(None) => {
                debug!("unknown or expired session token");
                stale = true;
                CurrentSession::Anonymous
            }
            Err(e) => {
                error!(error = %e, "session lookup failed");
                CurrentSession::Anonymous
            }
        },
    };
    req.extensions_mut().insert(current);

    let mut res = next.run(req).await;
    if stale && !sets_cookie(&res, sessions.cookie_name()) {
        if let Ok(value) = HeaderValue::from_str(&sessions.clear_cookie()) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    res
}

fn sets_cookie(res: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Guard for protected routes; apply with `route_layer` beneath [`load_session`].
pub async fn require_auth(req: Request, next: Next) -> Response {
    match req.extensions().get::<CurrentSession>() {
        Some(CurrentSession::Authenticated { .. }) => next.run(req).await,
        _ => Unauthenticated::from_uri(req.uri()).into_response(),
    }
}

/// Rejection for anonymous callers: redirect to the login page, remembering where they were going.
#[derive(Debug)]
pub struct Unauthenticated {
    next: String,
}

impl Unauthenticated {
    fn from_uri(uri: &Uri) -> Self {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".into());
        Self { next }
    }
}

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        let location = format!("/login?next={}", urlencoding::encode(&self.next));
        (
            AppendHeaders([(
                header::SET_COOKIE,
                Flash::info("Please log in to access this page.").cookie(),
            )]),
            Redirect::to(&location),
        )
            .into_response()
    }
}

/// The authenticated user and their session token.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentSession>() {
            Some(CurrentSession::Authenticated { user, token }) => Ok(AuthUser {
                user: user.clone(),
                token: token.clone(),
            }),
            _ => Err(Unauthenticated::from_uri(&parts.uri)),
        }
    }
}

/// The current user if there is one; never rejects.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(match parts.extensions.get::<CurrentSession>() {
            Some(CurrentSession::Authenticated { user, .. }) => Some(user.clone()),
            _ => None,
        }))
    }
}
