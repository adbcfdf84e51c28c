//! Books repository for database operations

use sqlx::{postgres::PgRow, FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookListing},
        user::OwnerInfo,
    },
};

const LISTING_SELECT: &str = r#"
    SELECT b.*, u.name AS owner_name, u.email AS owner_email, u.location AS owner_location
    FROM books b
    JOIN users u ON u.id = b.owner_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get several books at once
    pub async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Public and available books of other users
    pub async fn list_public(&self, viewer_id: Uuid) -> AppResult<Vec<BookListing>> {
        let query = format!(
            "{} WHERE b.is_public AND b.is_available AND b.owner_id <> $1 ORDER BY b.created_at DESC",
            LISTING_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(listing_from_row).collect()
    }

    /// Every book with its owner (admin)
    pub async fn list_all(&self) -> AppResult<Vec<BookListing>> {
        let query = format!("{} ORDER BY b.created_at DESC", LISTING_SELECT);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(listing_from_row).collect()
    }
}

fn listing_from_row(row: &PgRow) -> AppResult<BookListing> {
    let book = Book::from_row(row)?;
    Ok(BookListing {
        owner_info: OwnerInfo {
            id: book.owner_id,
            name: row.try_get("owner_name")?,
            email: row.try_get("owner_email")?,
            location: row.try_get("owner_location")?,
        },
        book,
    })
}
