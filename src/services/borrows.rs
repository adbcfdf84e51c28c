//! Borrow request service
//!
//! Runs the transition rules of [`BorrowRequest`] inside one store
//! transaction per call: lock the request, then its book, apply the rule,
//! write everything back and commit. Any error before the commit drops the
//! transaction and nothing is written.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowRequest, BorrowRequestDetails, LedgerChanges, RequestScope},
        enums::BorrowStatus,
    },
    repository::{LibraryStore, StoreTransaction},
};

#[derive(Clone)]
pub struct BorrowsService {
    store: Arc<dyn LibraryStore>,
}

impl BorrowsService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    /// Open a pending request for a book
    pub async fn create(
        &self,
        book_id: Uuid,
        borrower_id: Uuid,
        message: Option<String>,
    ) -> AppResult<BorrowRequestDetails> {
        let book = self.store.get_book(book_id).await?;
        let request = BorrowRequest::open(&book, borrower_id, message, Utc::now())?;

        if self.store.has_pending_request(book_id, borrower_id).await? {
            return Err(AppError::InvalidOperation("Request already sent".to_string()));
        }
        self.store.insert_request(&request).await?;

        tracing::info!(
            request_id = %request.id,
            book_id = %book_id,
            borrower_id = %borrower_id,
            lender_id = %request.to_user_id,
            "Borrow request created"
        );

        self.store.get_request_details(request.id).await
    }

    /// Lender approves a pending request
    pub async fn accept(&self, request_id: Uuid, lender_id: Uuid) -> AppResult<BorrowRequestDetails> {
        let mut tx = self.store.begin().await?;
        let mut request = tx.lock_request(request_id).await?;
        let mut book = tx.lock_book(request.book_id).await?;

        let changes = request.accept(lender_id, &mut book, Utc::now())?;

        tx.save_request(&request).await?;
        tx.save_book_state(&book).await?;
        apply_ledger(&mut *tx, changes).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            book_id = %book.id,
            borrower_id = %request.from_user_id,
            due_date = ?request.due_date,
            "Borrow request accepted"
        );

        self.store.get_request_details(request_id).await
    }

    /// Lender declines a pending request
    pub async fn reject(&self, request_id: Uuid, lender_id: Uuid) -> AppResult<BorrowRequestDetails> {
        let mut tx = self.store.begin().await?;
        let mut request = tx.lock_request(request_id).await?;

        request.reject(lender_id, Utc::now())?;

        tx.save_request(&request).await?;
        tx.commit().await?;

        tracing::info!(request_id = %request_id, book_id = %request.book_id, "Borrow request rejected");

        self.store.get_request_details(request_id).await
    }

    /// Lender confirms the book came back
    pub async fn confirm_return(
        &self,
        request_id: Uuid,
        lender_id: Uuid,
    ) -> AppResult<BorrowRequestDetails> {
        let mut tx = self.store.begin().await?;
        let mut request = tx.lock_request(request_id).await?;
        let mut book = tx.lock_book(request.book_id).await?;

        let changes = request.confirm_return(lender_id, &mut book, Utc::now())?;

        tx.save_request(&request).await?;
        tx.save_book_state(&book).await?;
        apply_ledger(&mut *tx, changes).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            book_id = %book.id,
            borrower_id = %request.from_user_id,
            "Book return confirmed"
        );

        self.store.get_request_details(request_id).await
    }

    /// Borrower removes a completed request from their history
    pub async fn delete_completed(&self, request_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let request = tx.lock_request(request_id).await?;

        request.ensure_deletable_by(requester_id)?;

        tx.delete_request(request_id).await?;
        tx.commit().await?;

        tracing::info!(request_id = %request_id, "Completed borrow request deleted");
        Ok(())
    }

    /// Pending requests addressed to a lender
    pub async fn list_pending(&self, lender_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.store
            .list_requests(RequestScope::ToLender(lender_id, BorrowStatus::Pending))
            .await
    }

    /// Open loans of a lender
    pub async fn list_approved(&self, lender_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.store
            .list_requests(RequestScope::ToLender(lender_id, BorrowStatus::Approved))
            .await
    }

    /// A borrower's own requests, rejected ones excluded
    pub async fn list_mine(&self, borrower_id: Uuid) -> AppResult<Vec<BorrowRequestDetails>> {
        self.store
            .list_requests(RequestScope::FromBorrower(borrower_id))
            .await
    }

    /// Every request (admin)
    pub async fn list_all(&self) -> AppResult<Vec<BorrowRequestDetails>> {
        self.store.list_requests(RequestScope::All).await
    }
}

async fn apply_ledger(tx: &mut dyn StoreTransaction, changes: LedgerChanges) -> AppResult<()> {
    for (user_id, change) in changes {
        tx.apply_ledger(user_id, change).await?;
    }
    Ok(())
}
