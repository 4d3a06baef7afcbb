//! User records backing identity lookup and sign-in.
//!
//! The subject of every token is the username.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;

use crate::identity::{CredentialVerifier, IdentityError, IdentityLookup, Principal};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub authorities: Vec<String>,
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal::new(user.username, user.authorities)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    authorities: String,
}

impl UserRow {
    fn into_user(self) -> (User, String) {
        let authorities = self
            .authorities
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        (
            User {
                id: self.id,
                username: self.username,
                authorities,
            },
            self.password_hash,
        )
    }
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with an Argon2id password hash. Returns the user ID.
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        authorities: &[&str],
    ) -> Result<i64, UserStoreError> {
        let hash = hash_password(password)?;

        let result =
            sqlx::query("INSERT INTO users (username, password_hash, authorities) VALUES (?, ?, ?)")
                .bind(username)
                .bind(&hash)
                .bind(authorities.join(","))
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .get_row(username)
            .await?
            .map(|row| row.into_user().0))
    }

    /// Delete a user. Outstanding tokens stop resolving to a principal.
    pub async fn delete(&self, username: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_row(&self, username: &str) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, authorities FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl IdentityLookup for UserStore {
    async fn resolve_by_subject(&self, subject: &str) -> Result<Option<Principal>, IdentityError> {
        self.get_by_username(subject)
            .await
            .map(|user| user.map(Principal::from))
            .map_err(|e| IdentityError(e.to_string()))
    }
}

#[async_trait]
impl CredentialVerifier for UserStore {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, IdentityError> {
        let Some(row) = self
            .get_row(username)
            .await
            .map_err(|e| IdentityError(e.to_string()))?
        else {
            return Ok(None);
        };

        let (user, hash) = row.into_user();
        let password = password.to_string();
        // Argon2 verification blocks for tens of milliseconds
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| IdentityError(e.to_string()))?;

        Ok(matches.then(|| Principal::from(user)))
    }
}

fn hash_password(password: &str) -> Result<String, UserStoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserStoreError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}
