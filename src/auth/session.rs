use axum::{
    extract::FromRef,
    http::{header, HeaderMap},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use cookie::{Cookie, SameSite};
use rand::{rngs::OsRng, RngCore};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::debug;

use crate::{auth::repo_types::User, config::SessionConfig, state::AppState};

const TOKEN_BYTES: usize = 32;

/// Server-side sessions keyed by an opaque cookie token.
///
/// Expiry slides: each successful [`SessionManager::current_user`] call pushes the
/// deadline out by the configured TTL.
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    ttl_secs: i64,
    cookie_name: String,
    secure: bool,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.db.clone(), &state.config.session)
    }
}

impl SessionManager {
    pub fn new(db: SqlitePool, config: &SessionConfig) -> Self {
        Self {
            db,
            ttl_secs: config.ttl_minutes.max(1).saturating_mul(60),
            cookie_name: config.cookie_name.clone(),
            secure: config.secure_cookie,
        }
    }

    /// Starts a session for `user_id` and returns the token to hand to the client.
    pub async fn login(&self, user_id: i64) -> anyhow::Result<String> {
        let now = now_unix();
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.db)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }

        let token = generate_token();
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(now.saturating_add(self.ttl_secs))
        .execute(&self.db)
        .await?;
        debug!(user_id, "session started");
        Ok(token)
    }

    /// Ends the session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn current_user(&self, token: &str) -> anyhow::Result<Option<User>> {
        let now = now_unix();
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ? AND s.expires_at > ?
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        match user {
            Some(user) => {
                sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
                    .bind(now.saturating_add(self.ttl_secs))
                    .bind(token)
                    .execute(&self.db)
                    .await?;
                Ok(Some(user))
            }
            None => {
                sqlx::query("DELETE FROM sessions WHERE token = ? AND expires_at <= ?")
                    .bind(token)
                    .bind(now)
                    .execute(&self.db)
                    .await?;
                Ok(None)
            }
        }
    }

    /// `Set-Cookie` value installing `token`. No Max-Age: the browser drops it on close.
    pub fn cookie(&self, token: &str) -> String {
        Cookie::build((self.cookie_name.clone(), token.to_owned()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
            .to_string()
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie = Cookie::build((self.cookie_name.clone(), String::new()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        cookie.make_removal();
        cookie.to_string()
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.cookie_name)
    }
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_owned())
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use axum::http::HeaderValue;

    async fn setup() -> (SessionManager, User) {
        let db = connect_in_memory().await.expect("db");
        let user = User::create(&db, "hodler", "hodl@example.com", "hash")
            .await
            .expect("user");
        let config = SessionConfig {
            cookie_name: "session".into(),
            ttl_minutes: 30,
            secure_cookie: false,
        };
        (SessionManager::new(db, &config), user)
    }

    #[tokio::test]
    async fn login_then_resolve_returns_user() {
        let (sessions, user) = setup().await;
        let token = sessions.login(user.id).await.expect("login");
        let resolved = sessions.current_user(&token).await.expect("resolve");
        assert_eq!(resolved, Some(user));
    }

    #[tokio::test]
    async fn tokens_are_unique_and_opaque() {
        let (sessions, user) = setup().await;
        let a = sessions.login(user.id).await.unwrap();
        let b = sessions.login(user.id).await.unwrap();
        assert_ne!(a, b);
        // 32 bytes, base64url without padding
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn oversized_ttl_saturates_instead_of_overflowing() {
        let (sessions, user) = setup().await;
        let config = SessionConfig {
            cookie_name: "session".into(),
            ttl_minutes: i64::MAX,
            secure_cookie: false,
        };
        let sessions = SessionManager::new(sessions.db.clone(), &config);
        assert_eq!(sessions.ttl_secs, i64::MAX);

        let token = sessions.login(user.id).await.expect("login");
        assert_eq!(sessions.current_user(&token).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn unknown_token_is_anonymous() {
        let (sessions, _) = setup().await;
        assert!(sessions.current_user("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let (sessions, user) = setup().await;
        let token = sessions.login(user.id).await.unwrap();
        sessions.logout(&token).await.expect("logout");
        assert!(sessions.current_user(&token).await.unwrap().is_none());
        sessions.logout(&token).await.expect("second logout is a no-op");
    }

    #[tokio::test]
    async fn expired_session_is_anonymous_and_removed() {
        let (sessions, user) = setup().await;
        let token = sessions.login(user.id).await.unwrap();
        sqlx::query("UPDATE sessions SET expires_at = 0 WHERE token = ?")
            .bind(&token)
            .execute(&sessions.db)
            .await
            .unwrap();

        assert!(sessions.current_user(&token).await.unwrap().is_none());
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?")
            .bind(&token)
            .fetch_one(&sessions.db)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn resolve_slides_expiry_forward() {
        let (sessions, user) = setup().await;
        let token = sessions.login(user.id).await.unwrap();
        let near = now_unix() + 5;
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
            .bind(near)
            .bind(&token)
            .execute(&sessions.db)
            .await
            .unwrap();

        sessions.current_user(&token).await.unwrap().expect("still valid");
        let expires_at: i64 = sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token = ?")
            .bind(&token)
            .fetch_one(&sessions.db)
            .await
            .unwrap();
        assert!(expires_at >= now_unix() + 30 * 60 - 1);
    }

    #[tokio::test]
    async fn cookie_round_trips_through_headers() {
        let (sessions, _) = setup().await;
        let set_cookie = sessions.cookie("abc123");
        assert!(set_cookie.starts_with("session=abc123"));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(!set_cookie.contains("Max-Age"));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123"),
        );
        assert_eq!(sessions.token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn clear_cookie_expires_immediately() {
        let (sessions, _) = setup().await;
        let cleared = sessions.clear_cookie();
        assert!(cleared.starts_with("session=;"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
