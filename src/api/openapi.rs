//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, books, borrows, health, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "0.3.0",
        description = "Shared personal library REST API: catalogue books and lend them between users"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrows
        borrows::create_request,
        borrows::accept_request,
        borrows::reject_request,
        borrows::confirm_return,
        borrows::send_reminder,
        borrows::delete_request,
        borrows::list_pending,
        borrows::list_approved,
        borrows::list_mine,
        // Books
        books::list_my_books,
        books::create_book,
        books::list_public_books,
        books::list_reading_books,
        books::get_book,
        books::update_book,
        books::delete_book,
        books::toggle_visibility,
        // Users
        users::me,
        users::my_ledger,
        users::my_stats,
        // Admin
        admin::list_users,
        admin::create_user,
        admin::delete_user,
        admin::list_books,
        admin::delete_book,
        admin::list_borrows,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookListing,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::enums::ReadingStatus,
            // Borrows
            borrows::CreateBorrowRequest,
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::BorrowRequestDetails,
            crate::models::enums::BorrowStatus,
            // Users
            crate::models::user::User,
            crate::models::user::UserLedger,
            crate::models::user::DashboardStats,
            crate::models::user::UserSummary,
            crate::models::user::OwnerInfo,
            crate::models::user::ProvisionUser,
            crate::models::enums::Role,
            crate::models::enums::AuthProvider,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrows", description = "Borrow request lifecycle"),
        (name = "books", description = "Book catalog"),
        (name = "users", description = "Current user and ledger"),
        (name = "admin", description = "Administration")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
