//! Users repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// List all users, oldest first
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Create a user provisioned by the identity provider
    pub async fn create(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, avatar, location, auth_provider, google_id, role,
                books_owned, books_borrowed, books_lent, lent_count, total_read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.location)
        .bind(user.auth_provider)
        .bind(&user.google_id)
        .bind(user.role)
        .bind(&user.books_owned)
        .bind(&user.books_borrowed)
        .bind(&user.books_lent)
        .bind(user.lent_count)
        .bind(user.total_read)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("A user with email {} already exists", user.email),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
