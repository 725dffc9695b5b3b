use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::auth::{
    dto::RegisterForm,
    password::{hash_blocking, hash_password, verify_blocking, verify_password},
    repo_types::{CreateUserError, User},
};

const MAX_FIELD_LEN: usize = 100;
const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the email is unknown so both failure paths cost one argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("cryptodash-timing-equalizer").ok();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration failures; `Display` is the message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("An account with this email already exists.")]
    EmailTaken,
    #[error("This username is already taken.")]
    UsernameTaken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CreateUserError> for RegisterError {
    fn from(err: CreateUserError) -> Self {
        match err {
            CreateUserError::EmailTaken => RegisterError::EmailTaken,
            CreateUserError::UsernameTaken => RegisterError::UsernameTaken,
            CreateUserError::Database(e) => RegisterError::Internal(e.into()),
        }
    }
}

fn validate(username: &str, email: &str, password: &str) -> Result<(), RegisterError> {
    let username_len = username.chars().count();
    if username_len < MIN_USERNAME_LEN || username_len > MAX_FIELD_LEN {
        return Err(RegisterError::Invalid(
            "Username must be between 3 and 100 characters.",
        ));
    }
    if !is_valid_email(email) || email.chars().count() > MAX_FIELD_LEN {
        return Err(RegisterError::Invalid("Please enter a valid email address."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RegisterError::Invalid(
            "Password must be at least 8 characters long.",
        ));
    }
    Ok(())
}

/// Validates the form, checks email then username for conflicts, and creates the user.
pub async fn register_user(db: &SqlitePool, form: &RegisterForm) -> Result<User, RegisterError> {
    let username = form.username.trim();
    let email = normalize_email(&form.email);
    validate(username, &email, &form.password)?;

    if User::find_by_email(db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(RegisterError::EmailTaken);
    }
    if User::find_by_username(db, username).await?.is_some() {
        warn!(username, "username already taken");
        return Err(RegisterError::UsernameTaken);
    }

    let hash = hash_blocking(form.password.clone()).await?;
    let user = User::create(db, username, &email, &hash).await?;
    Ok(user)
}

/// Returns the user only when `email` exists and `password` verifies against it.
pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let email = normalize_email(email);
    let user = if is_valid_email(&email) {
        User::find_by_email(db, &email).await?
    } else {
        None
    };

    let Some(user) = user else {
        let password = password.to_owned();
        let _ = tokio::task::spawn_blocking(move || {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(&password, dummy);
            }
        })
        .await;
        debug!(email = %email, "login unknown email");
        return Ok(None);
    };

    if verify_blocking(password.to_owned(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        debug!(user_id = user.id, "login invalid password");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn form(username: &str, email: &str, password: &str) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("no-at-sign.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
    }

    #[test]
    fn email_normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[tokio::test]
    async fn registered_user_is_found_by_email_and_username() {
        let db = connect_in_memory().await.unwrap();
        let user = register_user(&db, &form(" alice ", "Alice@Example.com", "password123"))
            .await
            .expect("register");
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");

        let by_email = User::find_by_email(&db, "alice@example.com").await.unwrap();
        let by_name = User::find_by_username(&db, "alice").await.unwrap();
        assert_eq!(by_email.as_ref(), Some(&user));
        assert_eq!(by_name, by_email);
    }

    #[tokio::test]
    async fn duplicate_email_wins_over_duplicate_username() {
        let db = connect_in_memory().await.unwrap();
        register_user(&db, &form("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let both = register_user(&db, &form("alice", "alice@example.com", "password456"))
            .await
            .unwrap_err();
        assert!(matches!(both, RegisterError::EmailTaken));

        let email_only = register_user(&db, &form("someone", "ALICE@example.com", "password456"))
            .await
            .unwrap_err();
        assert!(matches!(email_only, RegisterError::EmailTaken));
        assert_eq!(
            email_only.to_string(),
            "An account with this email already exists."
        );
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let db = connect_in_memory().await.unwrap();
        register_user(&db, &form("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let err = register_user(&db, &form("alice", "other@example.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegisterError::UsernameTaken));
        assert_eq!(err.to_string(), "This username is already taken.");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_touching_the_store() {
        let db = connect_in_memory().await.unwrap();
        for bad in [
            form("ab", "ok@example.com", "password123"),
            form("   ", "ok@example.com", "password123"),
            form("valid", "not-an-email", "password123"),
            form("valid", "ok@example.com", "short"),
            form(&"x".repeat(101), "ok@example.com", "password123"),
        ] {
            let err = register_user(&db, &bad).await.unwrap_err();
            assert!(matches!(err, RegisterError::Invalid(_)), "got {err:?}");
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn authenticate_accepts_only_the_registered_password() {
        let db = connect_in_memory().await.unwrap();
        let user = register_user(&db, &form("bob", "bob@example.com", "hunter2hunter2"))
            .await
            .unwrap();

        let ok = authenticate(&db, " BOB@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(ok, Some(user));

        for wrong in ["hunter2", "hunter2hunter2 ", "HUNTER2HUNTER2", ""] {
            assert!(authenticate(&db, "bob@example.com", wrong)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn authenticate_unknown_or_malformed_email_is_none() {
        let db = connect_in_memory().await.unwrap();
        assert!(authenticate(&db, "ghost@example.com", "whatever1")
            .await
            .unwrap()
            .is_none());
        assert!(authenticate(&db, "not an email", "whatever1")
            .await
            .unwrap()
            .is_none());
    }
}
