use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{safe_next, LoginForm, NextQuery, RegisterForm},
        extractors::{AuthUser, MaybeUser},
        services::{authenticate, normalize_email, register_user, RegisterError},
        session::SessionManager,
    },
    error::AppError,
    flash::{Flash, IncomingFlash},
    state::AppState,
    views::{self, Page},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password. Please try again.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
}

/// Routes that need an authenticated session; the caller wraps them in the guard.
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/logout", get(logout))
}

#[instrument(skip_all)]
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Page::new("Log in", views::login_form("", safe_next(query.next.as_deref())))
        .incoming(flash)
        .into_response()
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    State(sessions): State<SessionManager>,
    MaybeUser(current): MaybeUser,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let next = safe_next(form.next.as_deref());
    let Some(user) = authenticate(&state.db, &form.email, &form.password).await? else {
        warn!(email = %normalize_email(&form.email), "login failed");
        return Ok(Page::new("Log in", views::login_form(form.email.trim(), next))
            .message(Flash::danger(INVALID_CREDENTIALS))
            .status(StatusCode::UNAUTHORIZED)
            .into_response());
    };

    let token = sessions.login(user.id).await?;
    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, sessions.cookie(&token)),
            (header::SET_COOKIE, Flash::success("Logged in successfully!").cookie()),
        ]),
        Redirect::to(next.unwrap_or("/dashboard")),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn register_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Page::new("Register", views::register_form("", ""))
        .incoming(flash)
        .into_response()
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    match register_user(&state.db, &form).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            Ok((
                AppendHeaders([(
                    header::SET_COOKIE,
                    Flash::success("Account created successfully! You can now log in.").cookie(),
                )]),
                Redirect::to("/login"),
            )
                .into_response())
        }
        Err(RegisterError::Internal(e)) => Err(e.into()),
        Err(err) => {
            let status = match err {
                RegisterError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::CONFLICT,
            };
            Ok(Page::new(
                "Register",
                views::register_form(form.username.trim(), form.email.trim()),
            )
            .message(Flash::danger(err.to_string()))
            .status(status)
            .into_response())
        }
    }
}

#[instrument(skip_all)]
pub async fn logout(
    State(sessions): State<SessionManager>,
    AuthUser { user, token }: AuthUser,
) -> Result<Response, AppError> {
    sessions.logout(&token).await?;
    info!(user_id = user.id, "user logged out");
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, sessions.clear_cookie()),
            (header::SET_COOKIE, Flash::info("You have been logged out.").cookie()),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}
