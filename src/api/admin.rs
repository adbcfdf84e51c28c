//! Administration endpoints (role admin)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::BookListing,
        borrow::BorrowRequestDetails,
        user::{ProvisionUser, User},
    },
    AppState,
};

use super::AuthenticatedUser;

/// List all users
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let users = state.services.users.list().await?;
    Ok(Json(users))
}

/// Provision a user handed over by the identity provider
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = ProvisionUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid name or email", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<ProvisionUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;

    let user = state.services.users.provision(data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Remove a user with their books and requests
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "User has books lent or borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.users.admin_delete(id).await?;
    tracing::info!(user_id = %id, admin_id = %claims.user_id(), "User removed by administrator");
    Ok(StatusCode::NO_CONTENT)
}

/// List every book with its owner
#[utoipa::path(
    get,
    path = "/admin/books",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All books", body = Vec<BookListing>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookListing>>> {
    claims.require_admin()?;

    let books = state.services.catalog.list_all().await?;
    Ok(Json(books))
}

/// Remove any book
#[utoipa::path(
    delete,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is lent out", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.catalog.admin_delete(id).await?;
    tracing::info!(book_id = %id, admin_id = %claims.user_id(), "Book removed by administrator");
    Ok(StatusCode::NO_CONTENT)
}

/// List every borrow request
#[utoipa::path(
    get,
    path = "/admin/borrows",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All borrow requests, newest first", body = Vec<BorrowRequestDetails>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    claims.require_admin()?;

    let requests = state.services.borrows.list_all().await?;
    Ok(Json(requests))
}
