/// User Routes
///
/// Read-only access to user records for authenticated callers.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::{AppError, AuthError};
use crate::middleware::Identity;
use crate::routes::response::{ApiResponse, PageMeta, PaginatedResponse};
use crate::startup::AppState;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 15;

/// Raw query parameters; anything unparseable or non-positive falls back to
/// the default.
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

fn positive_or(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// GET /api/users?page=&per_page=
pub async fn list_users(
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = positive_or(query.page.as_deref(), DEFAULT_PAGE);
    let per_page = positive_or(query.per_page.as_deref(), DEFAULT_PER_PAGE);

    let total = state.users.count().await?;
    let users = state.users.find_page(page, per_page).await?;
    let meta = PageMeta::new(total, users.len(), per_page, page);

    Ok(HttpResponse::Ok().json(PaginatedResponse::new(
        "Users retrieved successfully",
        users,
        meta,
    )))
}

/// GET /api/users/me
pub async fn current_user(
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_data("User retrieved successfully", user)))
}

/// GET /api/users/{id}
///
/// # Errors
/// - 400: Non-numeric id
/// - 404: No such user
pub async fn show_user(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_data("User retrieved successfully", user)))
}
