//! Data models for Bookshelf

pub mod book;
pub mod borrow;
pub mod enums;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookListing, BookSummary, CreateBook, UpdateBook};
pub use borrow::{BorrowRequest, BorrowRequestDetails, RequestScope};
pub use enums::{AuthProvider, BorrowStatus, ReadingStatus, Role};
pub use user::{
    DashboardStats, LedgerChange, ProvisionUser, User, UserClaims, UserLedger, UserSummary,
};
