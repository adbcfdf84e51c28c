//! API handlers for Bookshelf REST endpoints

pub mod admin;
pub mod books;
pub mod borrows;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Borrow requests
        .route("/borrows/books/:book_id", post(borrows::create_request))
        .route("/borrows/pending", get(borrows::list_pending))
        .route("/borrows/approved", get(borrows::list_approved))
        .route("/borrows/mine", get(borrows::list_mine))
        .route("/borrows/:id", delete(borrows::delete_request))
        .route("/borrows/:id/accept", post(borrows::accept_request))
        .route("/borrows/:id/reject", post(borrows::reject_request))
        .route("/borrows/:id/confirm-return", post(borrows::confirm_return))
        .route("/borrows/:id/remind", post(borrows::send_reminder))
        // Books
        .route("/books", get(books::list_my_books).post(books::create_book))
        .route("/books/public", get(books::list_public_books))
        .route("/books/reading", get(books::list_reading_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/visibility", post(books::toggle_visibility))
        // Users
        .route("/users/me", get(users::me))
        .route("/users/me/ledger", get(users::my_ledger))
        .route("/users/me/stats", get(users::my_stats))
        // Administration
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/books", get(admin::list_books))
        .route("/admin/books/:id", delete(admin::delete_book))
        .route("/admin/borrows", get(admin::list_borrows))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
