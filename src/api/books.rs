//! Book catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookListing, CreateBook, UpdateBook},
    AppState,
};

use super::AuthenticatedUser;

/// Books I own or currently borrow
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned and borrowed books", body = Vec<Book>)
    )
)]
pub async fn list_my_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_mine(claims.user_id()).await?;
    Ok(Json(books))
}

/// Add a book to my shelf
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create(claims.user_id(), data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Public books of other users that can be borrowed now
#[utoipa::path(
    get,
    path = "/books/public",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Public available books with their owner", body = Vec<BookListing>)
    )
)]
pub async fn list_public_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookListing>>> {
    let books = state.services.catalog.list_public(claims.user_id()).await?;
    Ok(Json(books))
}

/// Books I am reading
#[utoipa::path(
    get,
    path = "/books/reading",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Books with reading status 'reading'", body = Vec<Book>)
    )
)]
pub async fn list_reading_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_reading(claims.user_id()).await?;
    Ok(Json(books))
}

/// Get a book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 403, description = "Private book", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get(id, claims.user_id()).await?;
    Ok(Json(book))
}

/// Update a book (owner only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .catalog
        .update(id, claims.user_id(), patch)
        .await?;
    Ok(Json(book))
}

/// Delete a book (owner only)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is lent out", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete(id, claims.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle public visibility (owner only)
#[utoipa::path(
    post,
    path = "/books/{id}/visibility",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Visibility toggled", body = Book),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_visibility(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .catalog
        .toggle_visibility(id, claims.user_id())
        .await?;
    Ok(Json(book))
}
