//! User store trait and its PostgreSQL implementation.
//!
//! The auth core talks to persistence only through [`UserRepository`], which
//! keeps the workflows testable against [`MemoryUserRepository`](super::MemoryUserRepository).

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};

use crate::auth::{AuthError, AuthResult, NewUser, User, UserId, UserUpdate};

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, birthday, is_active, \
     email_confirmed, email_confirmed_at, confirmation_token, confirmation_token_created_at, \
     password_reset_token, password_reset_token_created_at, last_password_reset, \
     last_login_at, created_at";

/// Trait for user record persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find user by exact email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Insert a user
    ///
    /// # Errors
    ///
    /// * `AuthError::UserAlreadyExists` - Email is taken
    async fn create(&self, user: NewUser) -> AuthResult<User>;

    /// Apply a partial update, returning the updated record if the user exists
    async fn update(&self, user_id: UserId, update: UserUpdate) -> AuthResult<Option<User>>;

    /// Find a user whose email and stored password-reset token both match
    async fn find_by_email_and_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>>;

    /// Find a user whose email and stored confirmation token both match
    async fn find_by_email_and_confirmation_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>>;
}

/// PostgreSQL implementation of `UserRepository`
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        birthday: row.get("birthday"),
        is_active: row.get("is_active"),
        email_confirmed: row.get("email_confirmed"),
        email_confirmed_at: row.get("email_confirmed_at"),
        confirmation_token: row.get("confirmation_token"),
        confirmation_token_created_at: row.get("confirmation_token_created_at"),
        password_reset_token: row.get("password_reset_token"),
        password_reset_token_created_at: row.get("password_reset_token_created_at"),
        last_password_reset: row.get("last_password_reset"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, birthday,
                               email_confirmed, email_confirmed_at,
                               confirmation_token, confirmation_token_created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.birthday)
        .bind(user.email_confirmed)
        .bind(user.email_confirmed_at)
        .bind(&user.confirmation_token)
        .bind(user.confirmation_token_created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(user_from_row(&row)),
            // lost a registration race on the unique email index
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AuthError::UserAlreadyExists(user.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, user_id: UserId, update: UserUpdate) -> AuthResult<Option<User>> {
        if update.is_empty() {
            return self.find_by_id(user_id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        let mut columns = builder.separated(", ");

        if let Some(hash) = update.password_hash {
            columns.push("password_hash = ").push_bind_unseparated(hash);
        }
        if let Some(active) = update.is_active {
            columns.push("is_active = ").push_bind_unseparated(active);
        }
        if let Some(confirmed) = update.email_confirmed {
            columns.push("email_confirmed = ").push_bind_unseparated(confirmed);
        }
        if let Some(at) = update.email_confirmed_at {
            columns.push("email_confirmed_at = ").push_bind_unseparated(at);
        }
        if let Some(token) = update.confirmation_token {
            columns.push("confirmation_token = ").push_bind_unseparated(token);
        }
        if let Some(at) = update.confirmation_token_created_at {
            columns
                .push("confirmation_token_created_at = ")
                .push_bind_unseparated(at);
        }
        if let Some(token) = update.password_reset_token {
            columns.push("password_reset_token = ").push_bind_unseparated(token);
        }
        if let Some(at) = update.password_reset_token_created_at {
            columns
                .push("password_reset_token_created_at = ")
                .push_bind_unseparated(at);
        }
        if let Some(at) = update.last_password_reset {
            columns
                .push("last_password_reset = GREATEST(COALESCE(last_password_reset, ")
                .push_bind_unseparated(at)
                .push_unseparated("), ")
                .push_bind_unseparated(at)
                .push_unseparated(")");
        }
        if let Some(at) = update.last_login_at {
            columns.push("last_login_at = ").push_bind_unseparated(at);
        }

        builder.push(" WHERE id = ").push_bind(user_id);
        builder.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = builder.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email_and_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND password_reset_token = $2"
        ))
        .bind(email)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_email_and_confirmation_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND confirmation_token = $2"
        ))
        .bind(email)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}
