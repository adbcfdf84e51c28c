//! PostgreSQL unit of work
//!
//! Rows read through `lock_*` are taken `FOR UPDATE`, so two transitions on
//! the same request or book run one after the other. Sibling accepts both
//! lock the book row; the second sees `is_available = false`.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::StoreTransaction;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::BorrowRequest,
        user::{LedgerChange, User},
    },
};

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_request(&mut self, id: Uuid) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))
    }

    async fn lock_book(&mut self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn lock_user(&mut self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn insert_book(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, author, genre, total_pages, pages_read, owner_id, price,
                is_public, reading_status, is_available, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.total_pages)
        .bind(book.pages_read)
        .bind(book.owner_id)
        .bind(book.price)
        .bind(book.is_public)
        .bind(book.reading_status)
        .bind(book.is_available)
        .bind(book.status)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_book_state(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query(
            "UPDATE books SET is_available = $2, reading_status = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(book.id)
        .bind(book.is_available)
        .bind(book.reading_status)
        .bind(book.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_book_fields(&mut self, book: &Book) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, genre = $4, total_pages = $5, pages_read = $6,
                price = $7, is_public = $8, reading_status = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.total_pages)
        .bind(book.pages_read)
        .bind(book.price)
        .bind(book.is_public)
        .bind(book.reading_status)
        .bind(book.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", book.id)));
        }
        Ok(())
    }

    async fn delete_book(&mut self, id: Uuid) -> AppResult<()> {
        // borrow_requests rows go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn save_request(&mut self, request: &BorrowRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE borrow_requests
            SET status = $2, approved_at = $3, rejected_at = $4, due_date = $5,
                return_confirmed = $6, return_confirmed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.due_date)
        .bind(request.return_confirmed)
        .bind(request.return_confirmed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_request(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM borrow_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn apply_ledger(&mut self, user_id: Uuid, change: LedgerChange) -> AppResult<()> {
        let (sql, book_id) = match change {
            LedgerChange::Owned(book) => (
                "UPDATE users SET books_owned = array_append(array_remove(books_owned, $2), $2) WHERE id = $1",
                book,
            ),
            LedgerChange::Disowned(book) => (
                "UPDATE users SET books_owned = array_remove(books_owned, $2) WHERE id = $1",
                book,
            ),
            LedgerChange::Borrowed(book) => (
                "UPDATE users SET books_borrowed = array_append(array_remove(books_borrowed, $2), $2) WHERE id = $1",
                book,
            ),
            LedgerChange::Lent(book) => (
                "UPDATE users SET books_lent = array_append(array_remove(books_lent, $2), $2), lent_count = lent_count + 1 WHERE id = $1",
                book,
            ),
            LedgerChange::BorrowReturned(book) => (
                "UPDATE users SET books_borrowed = array_remove(books_borrowed, $2), total_read = total_read + 1 WHERE id = $1",
                book,
            ),
            LedgerChange::LendReturned(book) => (
                "UPDATE users SET books_lent = array_remove(books_lent, $2), lent_count = GREATEST(lent_count - 1, 0) WHERE id = $1",
                book,
            ),
        };

        let result = sqlx::query(sql)
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM borrow_requests WHERE from_user_id = $1 OR to_user_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM books WHERE owner_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
