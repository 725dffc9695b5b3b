//! Server-rendered HTML. Every interpolated value goes through [`escape`].

use axum::{
    http::{header, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use time::macros::format_description;

use crate::{auth::repo_types::User, flash::Flash};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// A full HTML page: layout, navigation, flash messages and body.
pub struct Page {
    title: String,
    body: String,
    user: Option<User>,
    flashes: Vec<Flash>,
    clear_flash: bool,
    status: StatusCode,
}

impl Page {
    pub fn new(title: impl Into<String>, body: String) -> Self {
        Self {
            title: title.into(),
            body,
            user: None,
            flashes: Vec::new(),
            clear_flash: false,
            status: StatusCode::OK,
        }
    }

    pub fn user(mut self, user: Option<&User>) -> Self {
        self.user = user.cloned();
        self
    }

    /// Shows a message that arrived in the flash cookie and clears the cookie.
    pub fn incoming(mut self, flash: Option<Flash>) -> Self {
        if let Some(flash) = flash {
            self.flashes.push(flash);
            self.clear_flash = true;
        }
        self
    }

    pub fn message(mut self, flash: Flash) -> Self {
        self.flashes.push(flash);
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    fn render(&self) -> String {
        let nav_auth = match &self.user {
            Some(user) => format!(
                r#"<a href="/dashboard">{}</a> <a href="/logout">Log out</a>"#,
                escape(&user.username)
            ),
            None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_owned(),
        };
        let flashes: String = self
            .flashes
            .iter()
            .map(|f| {
                format!(
                    r#"<div class="flash flash-{}">{}</div>"#,
                    f.level.as_str(),
                    escape(&f.message)
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · CryptoDash</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; color: #1b1f24; }}
nav {{ display: flex; gap: 1rem; padding: 0.75rem 1.5rem; background: #11151c; }}
nav a {{ color: #e6edf3; text-decoration: none; }}
nav .auth {{ margin-left: auto; display: flex; gap: 1rem; }}
main {{ max-width: 48rem; margin: 2rem auto; padding: 0 1.5rem; }}
.flash {{ padding: 0.6rem 1rem; border-radius: 4px; margin-bottom: 1rem; }}
.flash-success {{ background: #dafbe1; }}
.flash-danger {{ background: #ffebe9; }}
.flash-info {{ background: #ddf4ff; }}
form label {{ display: block; margin-top: 0.75rem; }}
</style>
</head>
<body>
<nav>
<a href="/">CryptoDash</a>
<a href="/market-data">Market Data</a>
<a href="/ico-ido-calendar">ICO/IDO Calendar</a>
<a href="/crypto-news">Crypto News</a>
<span class="auth">{nav_auth}</span>
</nav>
<main>
{flashes}
{body}
</main>
</body>
</html>
"#,
            title = escape(&self.title),
            nav_auth = nav_auth,
            flashes = flashes,
            body = self.body,
        )
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let html = self.render();
        if self.clear_flash {
            (
                self.status,
                AppendHeaders([(header::SET_COOKIE, Flash::clear_cookie())]),
                Html(html),
            )
                .into_response()
        } else {
            (self.status, Html(html)).into_response()
        }
    }
}

pub fn index(user: Option<&User>) -> String {
    let cta = match user {
        Some(user) => format!(
            r#"<p>Welcome back, {}. <a href="/dashboard">Go to your dashboard</a>.</p>"#,
            escape(&user.username)
        ),
        None => r#"<p><a href="/register">Create an account</a> or <a href="/login">log in</a> to see your dashboard.</p>"#.to_owned(),
    };
    format!(
        r#"<h1>CryptoDash</h1>
<p>Markets, token launches and news in one place.</p>
{cta}"#
    )
}

pub fn dashboard(user: &User) -> String {
    let joined = user
        .joined_at()
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default();
    format!(
        r#"<h1>Dashboard</h1>
<p>Welcome, <strong class="username">{username}</strong>!</p>
<dl>
<dt>Email</dt><dd class="email">{email}</dd>
<dt>Member since</dt><dd>{joined}</dd>
</dl>"#,
        username = escape(&user.username),
        email = escape(&user.email),
        joined = joined,
    )
}

pub fn login_form(email: &str, next: Option<&str>) -> String {
    let next_field = next
        .map(|n| format!(r#"<input type="hidden" name="next" value="{}">"#, escape(n)))
        .unwrap_or_default();
    format!(
        r#"<h1>Log in</h1>
<form method="post" action="/login">
{next_field}
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account yet? <a href="/register">Register</a>.</p>"#,
        email = escape(email),
    )
}

pub fn register_form(username: &str, email: &str) -> String {
    format!(
        r#"<h1>Register</h1>
<form method="post" action="/register">
<label>Username <input type="text" name="username" value="{username}" minlength="3" maxlength="100" required></label>
<label>Email <input type="email" name="email" value="{email}" maxlength="100" required></label>
<label>Password <input type="password" name="password" minlength="8" required></label>
<button type="submit">Create account</button>
</form>
<p>Already registered? <a href="/login">Log in</a>.</p>"#,
        username = escape(username),
        email = escape(email),
    )
}

pub fn placeholder(heading: &str) -> String {
    format!(
        r#"<h1>{}</h1>
<p>Coming soon.</p>"#,
        escape(heading)
    )
}

pub fn internal_error() -> String {
    r#"<h1>Something went wrong</h1>
<p>Please try again in a moment.</p>"#
        .to_owned()
}
