//! Borrow request endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::borrow::BorrowRequestDetails,
    AppState,
};

use super::AuthenticatedUser;

/// Create borrow request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrowRequest {
    /// Optional note for the owner
    pub message: Option<String>,
}

/// Ask the owner to lend a book
#[utoipa::path(
    post,
    path = "/borrows/books/{book_id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = Uuid, Path, description = "Book ID")
    ),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Request created", body = BorrowRequestDetails),
        (status = 400, description = "Malformed body, book unavailable, own book, or request already sent", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<BorrowRequestDetails>)> {
    // The body is optional; when present it must be a valid request
    let message = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<CreateBorrowRequest>(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
            .message
    };
    let request = state
        .services
        .borrows
        .create(book_id, claims.user_id(), message)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Approve a pending request (book owner)
#[utoipa::path(
    post,
    path = "/borrows/{id}/accept",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Request approved", body = BorrowRequestDetails),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already handled or book already lent", body = crate::error::ErrorResponse)
    )
)]
pub async fn accept_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let request = state.services.borrows.accept(id, claims.user_id()).await?;
    Ok(Json(request))
}

/// Decline a pending request (book owner)
#[utoipa::path(
    post,
    path = "/borrows/{id}/reject",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Request rejected", body = BorrowRequestDetails),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already handled", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let request = state.services.borrows.reject(id, claims.user_id()).await?;
    Ok(Json(request))
}

/// Confirm the book came back (book owner)
#[utoipa::path(
    post,
    path = "/borrows/{id}/confirm-return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Return confirmed", body = BorrowRequestDetails),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Not approved or already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let request = state
        .services
        .borrows
        .confirm_return(id, claims.user_id())
        .await?;
    Ok(Json(request))
}

/// Send the borrower a due-date reminder (book owner)
#[utoipa::path(
    post,
    path = "/borrows/{id}/remind",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 204, description = "Reminder sent"),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Request is not an open loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_reminder(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .reminders
        .send_reminder(id, claims.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a completed request from the borrower's history
#[utoipa::path(
    delete,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 403, description = "Not the borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Request not completed", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .services
        .borrows
        .delete_completed(id, claims.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pending requests for my books
#[utoipa::path(
    get,
    path = "/borrows/pending",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending requests, newest first", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_pending(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.borrows.list_pending(claims.user_id()).await?;
    Ok(Json(requests))
}

/// My books currently lent out
#[utoipa::path(
    get,
    path = "/borrows/approved",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans, newest first", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_approved(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.borrows.list_approved(claims.user_id()).await?;
    Ok(Json(requests))
}

/// Requests I made as a borrower
#[utoipa::path(
    get,
    path = "/borrows/mine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending, approved and completed requests, newest first", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.borrows.list_mine(claims.user_id()).await?;
    Ok(Json(requests))
}
