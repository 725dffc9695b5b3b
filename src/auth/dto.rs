use serde::Deserialize;

/// Form body for `POST /register`.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Form body for `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

/// `?next=` on `GET /login`, set by the auth guard.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after login. `/logout` is refused
/// because following it would end the session that was just created.
pub(crate) fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        let path = n.split(|c| c == '?' || c == '#').next().unwrap_or_default();
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && path.trim_end_matches('/') != "/logout"
    })
}
