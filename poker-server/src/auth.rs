//! Registration and login. Password storage uses `argon2` (salted,
//! memory-hard) rather than a bare fast hash.

use crate::error::ApiError;
use crate::persistence::{Db, UserRecord};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

const MIN_PASSWORD_LEN: usize = 8;

fn hash_secret(secret: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else { return false };
    Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

pub async fn register(
    db: &Db,
    email: &str,
    username: &str,
    password: &str,
    security_question_index: u32,
    security_answer: &str,
) -> Result<UserRecord, ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::PasswordTooShort);
    }
    if db.email_in_use(email).await? {
        return Err(ApiError::EmailInUse);
    }
    if db.username_in_use(username).await? {
        return Err(ApiError::UsernameInUse);
    }
    let password_hash = hash_secret(password)?;
    let answer_hash = hash_secret(&security_answer.to_lowercase())?;
    let user = db
        .create_user(email, username, &password_hash, security_question_index as i64, &answer_hash)
        .await?;
    Ok(user)
}

pub async fn login(db: &Db, email: &str, password: &str) -> Result<UserRecord, ApiError> {
    let user = db.find_user_by_email(email).await?.ok_or(ApiError::UnknownEmail)?;
    if user.suspended {
        return Err(ApiError::AccountSuspended);
    }
    if !verify_secret(&user.password_hash, password) {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let db = Db::connect_in_memory().await.unwrap();
        register(&db, "a@example.com", "alice", "hunter22", 0, "rex").await.unwrap();
        let user = login(&db, "a@example.com", "hunter22").await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let db = Db::connect_in_memory().await.unwrap();
        register(&db, "a@example.com", "alice", "hunter22", 0, "rex").await.unwrap();
        let err = login(&db, "a@example.com", "wrong-password").await.unwrap_err();
        assert_eq!(err, ApiError::InvalidCredentials);
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let db = Db::connect_in_memory().await.unwrap();
        let err = register(&db, "a@example.com", "alice", "short", 0, "rex").await.unwrap_err();
        assert_eq!(err, ApiError::PasswordTooShort);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = Db::connect_in_memory().await.unwrap();
        register(&db, "a@example.com", "alice", "hunter22", 0, "rex").await.unwrap();
        let err = register(&db, "a@example.com", "alice2", "hunter22", 0, "rex").await.unwrap_err();
        assert_eq!(err, ApiError::EmailInUse);
    }
}
