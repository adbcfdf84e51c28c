//! Borrow request model and its lifecycle rules
//!
//! ```text
//! pending ──accept──▶ approved ──confirm_return──▶ completed ──(borrower delete)
//!    └────reject────▶ rejected
//! ```
//!
//! Every transition is a pure function over the request and, where needed,
//! its book. It validates the caller and the current state, mutates the
//! in-memory records and returns the ledger changes the caller must persist
//! in the same unit of work.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::book::{Book, BookSummary};
use super::enums::{BorrowStatus, ReadingStatus};
use super::user::{LedgerChange, UserSummary};
use crate::error::{AppError, AppResult};

/// Length of a loan, counted from approval
pub const LOAN_DURATION_DAYS: i64 = 14;

/// Borrow request record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: Uuid,
    #[serde(rename = "book")]
    pub book_id: Uuid,
    /// Borrower
    #[serde(rename = "fromUser")]
    pub from_user_id: Uuid,
    /// Lender, the book owner when the request was made
    #[serde(rename = "toUser")]
    pub to_user_id: Uuid,
    pub status: BorrowStatus,
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_confirmed: bool,
    pub return_confirmed_at: Option<DateTime<Utc>>,
}

/// Ledger writes produced by a transition, as (user, change) pairs
pub type LedgerChanges = Vec<(Uuid, LedgerChange)>;

impl BorrowRequest {
    /// Open a pending request from `borrower_id` for `book`.
    ///
    /// The duplicate-pending check needs the store and is done by the caller.
    pub fn open(
        book: &Book,
        borrower_id: Uuid,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        if !book.is_available {
            return Err(AppError::InvalidOperation("Book is not available".to_string()));
        }
        if book.is_owned_by(borrower_id) {
            return Err(AppError::InvalidOperation("Cannot borrow your own book".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            book_id: book.id,
            from_user_id: borrower_id,
            to_user_id: book.owner_id,
            status: BorrowStatus::Pending,
            message: message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            requested_at: now,
            approved_at: None,
            rejected_at: None,
            due_date: None,
            return_confirmed: false,
            return_confirmed_at: None,
        })
    }

    /// Approve the request. Fails with `Conflict` when the book was already
    /// lent through a sibling request.
    pub fn accept(
        &mut self,
        lender_id: Uuid,
        book: &mut Book,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerChanges> {
        self.require_lender(lender_id, "Not authorized to respond to this request")?;
        self.require_status(BorrowStatus::Pending, "Request already handled")?;
        self.require_book(book)?;
        if !book.is_available {
            return Err(AppError::Conflict(
                "Book is already lent through another request".to_string(),
            ));
        }

        self.status = BorrowStatus::Approved;
        self.approved_at = Some(now);
        self.due_date = Some(now + Duration::days(LOAN_DURATION_DAYS));

        book.is_available = false;
        book.updated_at = now;

        Ok(vec![
            (self.to_user_id, LedgerChange::Lent(book.id)),
            (self.from_user_id, LedgerChange::Borrowed(book.id)),
        ])
    }

    /// Decline the request. No book or ledger side effects.
    pub fn reject(&mut self, lender_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        self.require_lender(lender_id, "Not authorized to respond to this request")?;
        self.require_status(BorrowStatus::Pending, "Request already handled")?;

        self.status = BorrowStatus::Rejected;
        self.rejected_at = Some(now);
        Ok(())
    }

    /// Close the loan once the lender has the book back.
    pub fn confirm_return(
        &mut self,
        lender_id: Uuid,
        book: &mut Book,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerChanges> {
        self.require_lender(lender_id, "Only the owner can confirm the return")?;
        self.require_status(BorrowStatus::Approved, "Borrow request not in approved state")?;
        if self.return_confirmed {
            return Err(AppError::Conflict("Return already confirmed".to_string()));
        }
        self.require_book(book)?;

        self.return_confirmed = true;
        self.return_confirmed_at = Some(now);
        self.status = BorrowStatus::Completed;

        book.is_available = true;
        book.reading_status = ReadingStatus::ToRead;
        book.updated_at = now;

        Ok(vec![
            (self.from_user_id, LedgerChange::BorrowReturned(book.id)),
            (self.to_user_id, LedgerChange::LendReturned(book.id)),
        ])
    }

    /// Only the borrower may purge a completed request from their history.
    pub fn ensure_deletable_by(&self, requester_id: Uuid) -> AppResult<()> {
        if self.from_user_id != requester_id {
            return Err(AppError::Forbidden(
                "Not authorized to delete this request".to_string(),
            ));
        }
        self.require_status(BorrowStatus::Completed, "Can only delete completed requests")
    }

    /// A due-date reminder only makes sense for an open loan.
    pub fn ensure_remindable_by(&self, lender_id: Uuid) -> AppResult<()> {
        self.require_lender(lender_id, "Only the owner can send a reminder")?;
        self.require_status(BorrowStatus::Approved, "Borrow request not in approved state")
    }

    /// Approved and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BorrowStatus::Approved && self.due_date.map(|d| d < now).unwrap_or(false)
    }

    fn require_lender(&self, user_id: Uuid, message: &str) -> AppResult<()> {
        if self.to_user_id != user_id {
            return Err(AppError::Forbidden(message.to_string()));
        }
        Ok(())
    }

    fn require_status(&self, expected: BorrowStatus, message: &str) -> AppResult<()> {
        if self.status != expected {
            return Err(AppError::Conflict(format!("{} (status: {})", message, self.status)));
        }
        Ok(())
    }

    fn require_book(&self, book: &Book) -> AppResult<()> {
        if book.id != self.book_id {
            return Err(AppError::Internal(format!(
                "Request {} refers to book {}, got {}",
                self.id, self.book_id, book.id
            )));
        }
        Ok(())
    }
}

/// Borrow request joined with its book and both parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequestDetails {
    pub id: Uuid,
    pub status: BorrowStatus,
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_confirmed: bool,
    pub return_confirmed_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub book: BookSummary,
    pub from_user: UserSummary,
    pub to_user: UserSummary,
}

impl BorrowRequestDetails {
    pub fn new(
        request: &BorrowRequest,
        book: BookSummary,
        from_user: UserSummary,
        to_user: UserSummary,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: request.id,
            status: request.status,
            message: request.message.clone(),
            requested_at: request.requested_at,
            approved_at: request.approved_at,
            rejected_at: request.rejected_at,
            due_date: request.due_date,
            return_confirmed: request.return_confirmed,
            return_confirmed_at: request.return_confirmed_at,
            is_overdue: request.is_overdue(now),
            book,
            from_user,
            to_user,
        }
    }
}

/// Which requests a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Requests addressed to a lender in the given status
    ToLender(Uuid, BorrowStatus),
    /// A borrower's own pending, approved and completed requests
    FromBorrower(Uuid),
    /// Every request (admin)
    All,
}

impl RequestScope {
    pub fn matches(&self, request: &BorrowRequest) -> bool {
        match *self {
            RequestScope::ToLender(lender, status) => {
                request.to_user_id == lender && request.status == status
            }
            RequestScope::FromBorrower(borrower) => {
                request.from_user_id == borrower && request.status != BorrowStatus::Rejected
            }
            RequestScope::All => true,
        }
    }
}
