//! `PostgreSQL` user repository.

use crate::map_db_error;
use chrono::Utc;
use helpdesk_core::store::{BoxFuture, UserRepository};
use helpdesk_core::{NewUser, Result, User, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// [`UserRepository`] backed by the `users` table.
#[derive(Clone, Debug)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a repository over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get("id").map_err(|e| map_db_error("Bad user row", e))?),
            name: row.try_get("name").map_err(|e| map_db_error("Bad user row", e))?,
            email: row.try_get("email").map_err(|e| map_db_error("Bad user row", e))?,
            password_hash: row.try_get("password_hash").map_err(|e| map_db_error("Bad user row", e))?,
            is_admin: row.try_get("is_admin").map_err(|e| map_db_error("Bad user row", e))?,
            created_at: row.try_get("created_at").map_err(|e| map_db_error("Bad user row", e))?,
        })
    }
}

impl UserRepository for PostgresUserRepository {
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            let user = User {
                id: UserId::new(),
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                is_admin: user.is_admin,
                created_at: Utc::now(),
            };

            sqlx::query(
                r"
                INSERT INTO users (id, name, email, password_hash, is_admin, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_admin)
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to create user", e))?;

            tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User created");

            Ok(user)
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, email, password_hash, is_admin, created_at
                FROM users
                WHERE email = $1
                ",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load user", e))?;

            row.as_ref().map(Self::row_to_user).transpose()
        })
    }

    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>>> {
        Box::pin(async move {
            let uuid: Uuid = *id.as_uuid();
            let row = sqlx::query(
                r"
                SELECT id, name, email, password_hash, is_admin, created_at
                FROM users
                WHERE id = $1
                ",
            )
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load user", e))?;

            row.as_ref().map(Self::row_to_user).transpose()
        })
    }
}
