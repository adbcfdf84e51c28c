//! User model, ledger views and JWT claims

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{AuthProvider, Role};
use crate::error::{AppError, AppResult};

/// User record, including the denormalized book ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub location: Option<String>,
    pub auth_provider: AuthProvider,
    pub google_id: Option<String>,
    pub role: Role,
    /// Authoritative ownership list
    pub books_owned: Vec<Uuid>,
    pub books_borrowed: Vec<Uuid>,
    pub books_lent: Vec<Uuid>,
    pub lent_count: i32,
    pub total_read: i32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into().trim().to_lowercase(),
            avatar: None,
            location: None,
            auth_provider: AuthProvider::Local,
            google_id: None,
            role,
            books_owned: Vec::new(),
            books_borrowed: Vec::new(),
            books_lent: Vec::new(),
            lent_count: 0,
            total_read: 0,
            created_at: Utc::now(),
        }
    }

    /// Apply one ledger change in place
    pub fn apply_ledger(&mut self, change: LedgerChange) {
        match change {
            LedgerChange::Owned(book) => add_unique(&mut self.books_owned, book),
            LedgerChange::Disowned(book) => self.books_owned.retain(|b| *b != book),
            LedgerChange::Borrowed(book) => add_unique(&mut self.books_borrowed, book),
            LedgerChange::Lent(book) => {
                add_unique(&mut self.books_lent, book);
                self.lent_count += 1;
            }
            LedgerChange::BorrowReturned(book) => {
                self.books_borrowed.retain(|b| *b != book);
                self.total_read += 1;
            }
            LedgerChange::LendReturned(book) => {
                self.books_lent.retain(|b| *b != book);
                self.lent_count = (self.lent_count - 1).max(0);
            }
        }
    }

    pub fn ledger(&self) -> UserLedger {
        UserLedger {
            books_owned: self.books_owned.clone(),
            books_borrowed: self.books_borrowed.clone(),
            books_lent: self.books_lent.clone(),
            lent_count: self.lent_count,
            total_read: self.total_read,
        }
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            books_read: self.total_read,
            borrowed_books: self.books_borrowed.len(),
            books_lent: self.lent_count,
        }
    }
}

fn add_unique(set: &mut Vec<Uuid>, book: Uuid) {
    if !set.contains(&book) {
        set.push(book);
    }
}

/// A single mutation of a user's ledger caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    /// Book created by this user
    Owned(Uuid),
    /// Book deleted by its owner or an admin
    Disowned(Uuid),
    /// Borrower side of an approved request
    Borrowed(Uuid),
    /// Lender side of an approved request (increments lentCount)
    Lent(Uuid),
    /// Borrower side of a confirmed return (increments totalRead)
    BorrowReturned(Uuid),
    /// Lender side of a confirmed return (decrements lentCount)
    LendReturned(Uuid),
}

/// Read-only view of a user's book ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLedger {
    pub books_owned: Vec<Uuid>,
    pub books_borrowed: Vec<Uuid>,
    pub books_lent: Vec<Uuid>,
    pub lent_count: i32,
    pub total_read: i32,
}

/// Dashboard counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub books_read: i32,
    pub borrowed_books: usize,
    pub books_lent: i32,
}

/// Counterpart user embedded in borrow request views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Owner shown next to a publicly listed book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OwnerInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
}

impl From<&User> for OwnerInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            location: user.location.clone(),
        }
    }
}

/// User handed over by the identity provider (admin provisioning)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionUser {
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub name: String,
    #[validate(email(message = "email is not a valid address"))]
    pub email: String,
    pub role: Option<Role>,
    pub auth_provider: Option<AuthProvider>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub location: Option<String>,
}

impl ProvisionUser {
    /// Validate and build a user with an empty ledger
    pub fn into_user(self) -> AppResult<User> {
        self.validate()?;

        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name must not be blank".to_string()));
        }

        let mut user = User::new(name, self.email, self.role.unwrap_or_default());
        user.auth_provider = self.auth_provider.unwrap_or_default();
        user.google_id = self.google_id;
        user.avatar = self.avatar;
        user.location = self.location;
        Ok(user)
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: Uuid, role: Role, ttl_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours as i64)).timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator privileges required".to_string()))
        }
    }
}
