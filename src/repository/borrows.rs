//! Borrow requests repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookSummary,
        borrow::{BorrowRequest, BorrowRequestDetails, RequestScope},
        enums::BorrowStatus,
        user::UserSummary,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT r.*,
           b.title AS book_title, b.author AS book_author,
           fu.name AS from_name, fu.email AS from_email,
           tu.name AS to_name, tu.email AS to_email
    FROM borrow_requests r
    JOIN books b ON b.id = r.book_id
    JOIN users fu ON fu.id = r.from_user_id
    JOIN users tu ON tu.id = r.to_user_id
"#;

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrow request by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))
    }

    /// Get borrow request joined with book and users
    pub async fn get_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let query = format!("{} WHERE r.id = $1", DETAILS_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))?;

        details_from_row(&row, Utc::now())
    }

    pub async fn has_pending(&self, book_id: Uuid, borrower_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_requests
                WHERE book_id = $1 AND from_user_id = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(book_id)
        .bind(borrower_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a new request; the partial unique index rejects a second
    /// pending request for the same (book, borrower)
    pub async fn create(&self, request: &BorrowRequest) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO borrow_requests (
                id, book_id, from_user_id, to_user_id, status, message, requested_at,
                approved_at, rejected_at, due_date, return_confirmed, return_confirmed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id)
        .bind(request.book_id)
        .bind(request.from_user_id)
        .bind(request.to_user_id)
        .bind(request.status)
        .bind(&request.message)
        .bind(request.requested_at)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.due_date)
        .bind(request.return_confirmed)
        .bind(request.return_confirmed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::InvalidOperation("Request already sent".to_string()))
            }
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => Err(
                AppError::NotFound("Book or user referenced by the request not found".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// List requests in the given scope, newest first
    pub async fn list(&self, scope: RequestScope) -> AppResult<Vec<BorrowRequestDetails>> {
        let rows = match scope {
            RequestScope::ToLender(lender_id, status) => {
                let query = format!(
                    "{} WHERE r.to_user_id = $1 AND r.status = $2 ORDER BY r.requested_at DESC",
                    DETAILS_SELECT
                );
                sqlx::query(&query)
                    .bind(lender_id)
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
            RequestScope::FromBorrower(borrower_id) => {
                let query = format!(
                    "{} WHERE r.from_user_id = $1 AND r.status <> $2 ORDER BY r.requested_at DESC",
                    DETAILS_SELECT
                );
                sqlx::query(&query)
                    .bind(borrower_id)
                    .bind(BorrowStatus::Rejected)
                    .fetch_all(&self.pool)
                    .await?
            }
            RequestScope::All => {
                let query = format!("{} ORDER BY r.requested_at DESC", DETAILS_SELECT);
                sqlx::query(&query).fetch_all(&self.pool).await?
            }
        };

        let now = Utc::now();
        rows.iter().map(|row| details_from_row(row, now)).collect()
    }

    /// Approved requests due in `[from, to)`
    pub async fn list_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        let query = format!(
            "{} WHERE r.status = $1 AND r.due_date >= $2 AND r.due_date < $3 ORDER BY r.due_date",
            DETAILS_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(BorrowStatus::Approved)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let now = Utc::now();
        rows.iter().map(|row| details_from_row(row, now)).collect()
    }
}

fn details_from_row(row: &PgRow, now: DateTime<Utc>) -> AppResult<BorrowRequestDetails> {
    let request = BorrowRequest::from_row(row)?;
    let book = BookSummary {
        id: request.book_id,
        title: row.try_get("book_title")?,
        author: row.try_get("book_author")?,
    };
    let from_user = UserSummary {
        id: request.from_user_id,
        name: row.try_get("from_name")?,
        email: row.try_get("from_email")?,
    };
    let to_user = UserSummary {
        id: request.to_user_id,
        name: row.try_get("to_name")?,
        email: row.try_get("to_email")?,
    };
    Ok(BorrowRequestDetails::new(&request, book, from_user, to_user, now))
}
