//! Catalog management service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookListing, CreateBook, UpdateBook},
        enums::ReadingStatus,
        user::LedgerChange,
    },
    repository::{LibraryStore, StoreTransaction},
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LibraryStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Create a book owned by the caller and record it in their ledger
    pub async fn create(&self, owner_id: Uuid, data: CreateBook) -> AppResult<Book> {
        self.store.get_user(owner_id).await?;
        let book = Book::new(owner_id, data, Utc::now())?;

        let mut tx = self.store.begin().await?;
        tx.insert_book(&book).await?;
        tx.apply_ledger(owner_id, LedgerChange::Owned(book.id)).await?;
        tx.commit().await?;

        tracing::info!(book_id = %book.id, owner_id = %owner_id, "Book created");
        Ok(book)
    }

    /// Get a book visible to the viewer: owner, current borrower, or anyone if public
    pub async fn get(&self, book_id: Uuid, viewer_id: Uuid) -> AppResult<Book> {
        let book = self.store.get_book(book_id).await?;
        if book.is_owned_by(viewer_id) || book.is_public {
            return Ok(book);
        }

        let viewer = self.store.get_user(viewer_id).await?;
        if viewer.books_borrowed.contains(&book.id) {
            return Ok(book);
        }

        Err(AppError::Forbidden("Not authorized to view this book".to_string()))
    }

    /// Patch the catalog fields of a book (owner only)
    pub async fn update(&self, book_id: Uuid, caller_id: Uuid, patch: UpdateBook) -> AppResult<Book> {
        let mut tx = self.store.begin().await?;
        let mut book = lock_owned_book(&mut *tx, book_id, caller_id).await?;
        book.apply_patch(patch, Utc::now())?;
        tx.save_book_fields(&book).await?;
        tx.commit().await?;
        Ok(book)
    }

    /// Flip the public flag (owner only)
    pub async fn toggle_visibility(&self, book_id: Uuid, caller_id: Uuid) -> AppResult<Book> {
        let mut tx = self.store.begin().await?;
        let mut book = lock_owned_book(&mut *tx, book_id, caller_id).await?;
        book.is_public = !book.is_public;
        book.updated_at = Utc::now();
        tx.save_book_fields(&book).await?;
        tx.commit().await?;

        tracing::info!(book_id = %book_id, is_public = book.is_public, "Book visibility changed");
        Ok(book)
    }

    /// Delete a book (owner only)
    pub async fn delete(&self, book_id: Uuid, caller_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let book = tx.lock_book(book_id).await?;
        if !book.is_owned_by(caller_id) {
            return Err(AppError::Forbidden("Not authorized to delete this book".to_string()));
        }
        remove_book(tx, &book).await
    }

    /// Delete any book (admin)
    pub async fn admin_delete(&self, book_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let book = tx.lock_book(book_id).await?;
        remove_book(tx, &book).await
    }

    /// Books the user owns or currently borrows, newest first
    pub async fn list_mine(&self, user_id: Uuid) -> AppResult<Vec<Book>> {
        let user = self.store.get_user(user_id).await?;

        let mut ids = user.books_owned.clone();
        ids.extend(user.books_borrowed.iter().filter(|id| !user.books_owned.contains(id)));

        let mut books = self.store.books_by_ids(&ids).await?;
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    /// Books of the user currently being read
    pub async fn list_reading(&self, user_id: Uuid) -> AppResult<Vec<Book>> {
        let books = self.list_mine(user_id).await?;
        Ok(books
            .into_iter()
            .filter(|b| b.reading_status == ReadingStatus::Reading)
            .collect())
    }

    /// Public and available books of other users
    pub async fn list_public(&self, viewer_id: Uuid) -> AppResult<Vec<BookListing>> {
        self.store.list_public_books(viewer_id).await
    }

    /// Every book with its owner (admin)
    pub async fn list_all(&self) -> AppResult<Vec<BookListing>> {
        self.store.list_all_books().await
    }
}

/// Lock a book for an edit by its owner
async fn lock_owned_book(
    tx: &mut dyn StoreTransaction,
    book_id: Uuid,
    caller_id: Uuid,
) -> AppResult<Book> {
    let book = tx.lock_book(book_id).await?;
    if !book.is_owned_by(caller_id) {
        return Err(AppError::Forbidden("Not authorized to modify this book".to_string()));
    }
    Ok(book)
}

/// Drop a locked book and its requests, and clear it from the owner's ledger
async fn remove_book(mut tx: Box<dyn StoreTransaction>, book: &Book) -> AppResult<()> {
    if !book.is_available {
        return Err(AppError::Conflict(
            "Book is currently lent out and cannot be deleted".to_string(),
        ));
    }

    tx.delete_book(book.id).await?;
    tx.apply_ledger(book.owner_id, LedgerChange::Disowned(book.id)).await?;
    tx.commit().await?;

    tracing::info!(book_id = %book.id, owner_id = %book.owner_id, "Book deleted");
    Ok(())
}
