//! Current user endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::user::{DashboardStats, User, UserLedger},
    AppState,
};

use super::AuthenticatedUser;

/// Get my profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get(claims.user_id()).await?;
    Ok(Json(user))
}

/// Get my book ledger
#[utoipa::path(
    get,
    path = "/users/me/ledger",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned, borrowed and lent books", body = UserLedger)
    )
)]
pub async fn my_ledger(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserLedger>> {
    let ledger = state.services.users.ledger(claims.user_id()).await?;
    Ok(Json(ledger))
}

/// Get my dashboard counters
#[utoipa::path(
    get,
    path = "/users/me/stats",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats)
    )
)]
pub async fn my_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    let stats = state.services.users.stats(claims.user_id()).await?;
    Ok(Json(stats))
}
