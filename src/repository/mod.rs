//! Repository layer: the store port and its adapters
//!
//! [`LibraryStore`] covers single-statement reads and writes. Anything that
//! touches more than one record goes through a [`StoreTransaction`] obtained
//! from [`LibraryStore::begin`]; its writes become visible together on
//! [`StoreTransaction::commit`] and are discarded if it is dropped first.

pub mod books;
pub mod borrows;
pub mod memory;
pub mod transaction;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookListing},
        borrow::{BorrowRequest, BorrowRequestDetails, RequestScope},
        user::{LedgerChange, User},
    },
};

pub use memory::MemoryStore;

/// Persistence port used by every service
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Check that the backing store answers
    async fn ping(&self) -> AppResult<()>;

    async fn insert_user(&self, user: &User) -> AppResult<()>;
    async fn get_user(&self, id: Uuid) -> AppResult<User>;
    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn get_book(&self, id: Uuid) -> AppResult<Book>;
    /// Books with the given ids, in no particular order
    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>>;
    /// Public, available books not owned by `viewer_id`
    async fn list_public_books(&self, viewer_id: Uuid) -> AppResult<Vec<BookListing>>;
    async fn list_all_books(&self) -> AppResult<Vec<BookListing>>;

    async fn get_request(&self, id: Uuid) -> AppResult<BorrowRequest>;
    async fn get_request_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails>;
    async fn has_pending_request(&self, book_id: Uuid, borrower_id: Uuid) -> AppResult<bool>;
    /// Insert a pending request. A second pending request for the same
    /// (book, borrower) pair fails with `InvalidOperation`.
    async fn insert_request(&self, request: &BorrowRequest) -> AppResult<()>;
    /// Newest first
    async fn list_requests(&self, scope: RequestScope) -> AppResult<Vec<BorrowRequestDetails>>;
    /// Approved requests with `from <= due_date < to`
    async fn list_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRequestDetails>>;

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// Unit of work over requests, books and ledgers
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load a request and hold it until commit
    async fn lock_request(&mut self, id: Uuid) -> AppResult<BorrowRequest>;
    /// Load a book and hold it until commit
    async fn lock_book(&mut self, id: Uuid) -> AppResult<Book>;
    /// Load a user and hold it until commit
    async fn lock_user(&mut self, id: Uuid) -> AppResult<User>;

    async fn insert_book(&mut self, book: &Book) -> AppResult<()>;
    /// Persist availability and reading status of a locked book
    async fn save_book_state(&mut self, book: &Book) -> AppResult<()>;
    /// Persist the owner-editable fields of a locked book. Availability is
    /// left untouched.
    async fn save_book_fields(&mut self, book: &Book) -> AppResult<()>;
    /// Remove a book together with its borrow requests
    async fn delete_book(&mut self, id: Uuid) -> AppResult<()>;

    async fn save_request(&mut self, request: &BorrowRequest) -> AppResult<()>;
    async fn delete_request(&mut self, id: Uuid) -> AppResult<()>;

    async fn apply_ledger(&mut self, user_id: Uuid, change: LedgerChange) -> AppResult<()>;

    /// Remove a user with every book they own and every request they are
    /// party to
    async fn delete_user(&mut self, id: Uuid) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// PostgreSQL store holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub borrows: borrows::BorrowsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LibraryStore for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.users.create(user).await
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.users.list().await
    }

    async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        self.books.get_many(ids).await
    }

    async fn list_public_books(&self, viewer_id: Uuid) -> AppResult<Vec<BookListing>> {
        self.books.list_public(viewer_id).await
    }

    async fn list_all_books(&self) -> AppResult<Vec<BookListing>> {
        self.books.list_all().await
    }

    async fn get_request(&self, id: Uuid) -> AppResult<BorrowRequest> {
        self.borrows.get_by_id(id).await
    }

    async fn get_request_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        self.borrows.get_details(id).await
    }

    async fn has_pending_request(&self, book_id: Uuid, borrower_id: Uuid) -> AppResult<bool> {
        self.borrows.has_pending(book_id, borrower_id).await
    }

    async fn insert_request(&self, request: &BorrowRequest) -> AppResult<()> {
        self.borrows.create(request).await
    }

    async fn list_requests(&self, scope: RequestScope) -> AppResult<Vec<BorrowRequestDetails>> {
        self.borrows.list(scope).await
    }

    async fn list_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        self.borrows.list_due_between(from, to).await
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(transaction::PgTransaction::new(tx)))
    }
}
