//! Book model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::enums::ReadingStatus;
use super::user::OwnerInfo;
use crate::error::{AppError, AppResult};

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub total_pages: i32,
    pub pages_read: i32,
    #[serde(rename = "owner")]
    pub owner_id: Uuid,
    #[schema(value_type = String, example = "12.50")]
    pub price: Decimal,
    pub is_public: bool,
    pub reading_status: ReadingStatus,
    /// False while an approved borrow request is open
    pub is_available: bool,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Build a new available book owned by `owner_id`
    pub fn new(owner_id: Uuid, data: CreateBook, now: DateTime<Utc>) -> AppResult<Self> {
        data.validate()?;
        let pages_read = data.pages_read.unwrap_or(0);
        check_pages(data.total_pages, pages_read)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: data.title.trim().to_string(),
            author: data.author.trim().to_string(),
            genre: data.genre.filter(|g| !g.trim().is_empty()),
            total_pages: data.total_pages,
            pages_read,
            owner_id,
            price: data.price.unwrap_or_default(),
            is_public: data.is_public.unwrap_or(false),
            reading_status: data.reading_status.unwrap_or_default(),
            is_available: true,
            status: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update. Availability and ownership are not patchable.
    pub fn apply_patch(&mut self, patch: UpdateBook, now: DateTime<Utc>) -> AppResult<()> {
        patch.validate()?;

        let total_pages = patch.total_pages.unwrap_or(self.total_pages);
        let pages_read = patch.pages_read.unwrap_or(self.pages_read);
        check_pages(total_pages, pages_read)?;

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(author) = patch.author {
            self.author = author.trim().to_string();
        }
        if let Some(genre) = patch.genre {
            self.genre = Some(genre).filter(|g| !g.trim().is_empty());
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        if let Some(reading_status) = patch.reading_status {
            self.reading_status = reading_status;
        }
        self.total_pages = total_pages;
        self.pages_read = pages_read;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

fn check_pages(total_pages: i32, pages_read: i32) -> AppResult<()> {
    if pages_read > total_pages {
        return Err(AppError::Validation(format!(
            "pagesRead ({}) cannot exceed totalPages ({})",
            pages_read, total_pages
        )));
    }
    Ok(())
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        return Err(ValidationError::new("price must not be negative"));
    }
    Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("must not be blank"));
    }
    Ok(())
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub author: String,
    pub genre: Option<String>,
    #[validate(range(min = 1, message = "totalPages must be at least 1"))]
    pub total_pages: i32,
    #[validate(range(min = 0, message = "pagesRead must not be negative"))]
    pub pages_read: Option<i32>,
    #[validate(custom(function = "non_negative_price"))]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub is_public: Option<bool>,
    pub reading_status: Option<ReadingStatus>,
}

/// Partial book update (owner only)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub author: Option<String>,
    pub genre: Option<String>,
    #[validate(range(min = 1, message = "totalPages must be at least 1"))]
    pub total_pages: Option<i32>,
    #[validate(range(min = 0, message = "pagesRead must not be negative"))]
    pub pages_read: Option<i32>,
    #[validate(custom(function = "non_negative_price"))]
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub is_public: Option<bool>,
    pub reading_status: Option<ReadingStatus>,
}

/// Book as listed publicly or to admins, with its owner
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookListing {
    #[serde(flatten)]
    pub book: Book,
    pub owner_info: OwnerInfo,
}

/// Minimal book reference embedded in borrow request views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
        }
    }
}
