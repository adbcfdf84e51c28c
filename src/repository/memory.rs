//! In-process store
//!
//! All state sits behind one `tokio::sync::Mutex`. A transaction holds that
//! lock until it is committed or dropped and works on a staged copy, so
//! transactions are serialized and a dropped one leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LibraryStore, StoreTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookListing, BookSummary},
        borrow::{BorrowRequest, BorrowRequestDetails, RequestScope},
        enums::BorrowStatus,
        user::{LedgerChange, OwnerInfo, User, UserSummary},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
    requests: HashMap<Uuid, BorrowRequest>,
}

impl MemoryState {
    fn user(&self, id: Uuid) -> AppResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    fn book(&self, id: Uuid) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn request(&self, id: Uuid) -> AppResult<&BorrowRequest> {
        self.requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))
    }

    fn details(&self, request: &BorrowRequest, now: DateTime<Utc>) -> AppResult<BorrowRequestDetails> {
        let book = BookSummary::from(self.book(request.book_id)?);
        let from_user = UserSummary::from(self.user(request.from_user_id)?);
        let to_user = UserSummary::from(self.user(request.to_user_id)?);
        Ok(BorrowRequestDetails::new(request, book, from_user, to_user, now))
    }

    fn listing(&self, book: &Book) -> AppResult<BookListing> {
        Ok(BookListing {
            owner_info: OwnerInfo::from(self.user(book.owner_id)?),
            book: book.clone(),
        })
    }

    /// Build details for the matching requests, newest first
    fn collect_details<F>(&self, filter: F) -> AppResult<Vec<BorrowRequestDetails>>
    where
        F: Fn(&BorrowRequest) -> bool,
    {
        let mut requests: Vec<&BorrowRequest> =
            self.requests.values().filter(|r| filter(r)).collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

        let now = Utc::now();
        requests.into_iter().map(|r| self.details(r, now)).collect()
    }

    fn collect_listings<F>(&self, filter: F) -> AppResult<Vec<BookListing>>
    where
        F: Fn(&Book) -> bool,
    {
        let mut books: Vec<&Book> = self.books.values().filter(|b| filter(b)).collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        books.into_iter().map(|b| self.listing(b)).collect()
    }
}

/// Store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.state.lock().await.user(id).cloned()
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.state.lock().await.book(id).cloned()
    }

    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.books.get(id).cloned()).collect())
    }

    async fn list_public_books(&self, viewer_id: Uuid) -> AppResult<Vec<BookListing>> {
        self.state
            .lock()
            .await
            .collect_listings(|b| b.is_public && b.is_available && b.owner_id != viewer_id)
    }

    async fn list_all_books(&self) -> AppResult<Vec<BookListing>> {
        self.state.lock().await.collect_listings(|_| true)
    }

    async fn get_request(&self, id: Uuid) -> AppResult<BorrowRequest> {
        self.state.lock().await.request(id).cloned()
    }

    async fn get_request_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let state = self.state.lock().await;
        let request = state.request(id)?;
        state.details(request, Utc::now())
    }

    async fn has_pending_request(&self, book_id: Uuid, borrower_id: Uuid) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.requests.values().any(|r| {
            r.book_id == book_id && r.from_user_id == borrower_id && r.status == BorrowStatus::Pending
        }))
    }

    async fn insert_request(&self, request: &BorrowRequest) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.book(request.book_id)?;
        state.user(request.from_user_id)?;
        state.user(request.to_user_id)?;

        if request.status == BorrowStatus::Pending
            && state.requests.values().any(|r| {
                r.book_id == request.book_id
                    && r.from_user_id == request.from_user_id
                    && r.status == BorrowStatus::Pending
            })
        {
            return Err(AppError::InvalidOperation("Request already sent".to_string()));
        }

        state.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn list_requests(&self, scope: RequestScope) -> AppResult<Vec<BorrowRequestDetails>> {
        self.state.lock().await.collect_details(|r| scope.matches(r))
    }

    async fn list_due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        let mut due = self.state.lock().await.collect_details(|r| {
            r.status == BorrowStatus::Approved
                && r.due_date.map(|d| d >= from && d < to).unwrap_or(false)
        })?;
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(due)
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

/// Staged writes over an exclusively held state
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_request(&mut self, id: Uuid) -> AppResult<BorrowRequest> {
        self.staged.request(id).cloned()
    }

    async fn lock_book(&mut self, id: Uuid) -> AppResult<Book> {
        self.staged.book(id).cloned()
    }

    async fn lock_user(&mut self, id: Uuid) -> AppResult<User> {
        self.staged.user(id).cloned()
    }

    async fn insert_book(&mut self, book: &Book) -> AppResult<()> {
        self.staged.user(book.owner_id)?;
        self.staged.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn save_book_state(&mut self, book: &Book) -> AppResult<()> {
        let stored = self
            .staged
            .books
            .get_mut(&book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;
        stored.is_available = book.is_available;
        stored.reading_status = book.reading_status;
        stored.updated_at = book.updated_at;
        Ok(())
    }

    async fn save_book_fields(&mut self, book: &Book) -> AppResult<()> {
        let stored = self
            .staged
            .books
            .get_mut(&book.id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;

        let is_available = stored.is_available;
        *stored = book.clone();
        stored.is_available = is_available;
        Ok(())
    }

    async fn delete_book(&mut self, id: Uuid) -> AppResult<()> {
        self.staged.books.remove(&id);
        self.staged.requests.retain(|_, r| r.book_id != id);
        Ok(())
    }

    async fn save_request(&mut self, request: &BorrowRequest) -> AppResult<()> {
        if !self.staged.requests.contains_key(&request.id) {
            return Err(AppError::NotFound(format!(
                "Borrow request with id {} not found",
                request.id
            )));
        }
        self.staged.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn delete_request(&mut self, id: Uuid) -> AppResult<()> {
        self.staged.requests.remove(&id);
        Ok(())
    }

    async fn apply_ledger(&mut self, user_id: Uuid, change: LedgerChange) -> AppResult<()> {
        let user = self
            .staged
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;
        user.apply_ledger(change);
        Ok(())
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<()> {
        self.staged
            .requests
            .retain(|_, r| r.from_user_id != id && r.to_user_id != id);
        self.staged.books.retain(|_, b| b.owner_id != id);
        self.staged.users.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
