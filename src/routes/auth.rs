/// Authentication Routes
///
/// Login, token validation, logout, password change, profile update and
/// access-token refresh. The refresh token travels only in an HttpOnly cookie
/// scoped to the refresh endpoint; response bodies carry access tokens only.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::IssuedToken;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::middleware::Identity;
use crate::routes::response::ApiResponse;
use crate::startup::AppState;
use crate::validators::{validate_email, validate_name, validate_optional_email, validate_password};

const REFRESH_COOKIE: &str = "refresh_token";

/// Path of the refresh endpoint; the refresh cookie is only sent there.
/// Must match the route registered in `startup::run`.
const REFRESH_COOKIE_PATH: &str = "/api/auth/refresh";

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Password change request
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirmation: String,
}

/// Profile update request; a blank or missing email keeps the current one
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
}

/// Body of every response that hands out an access token
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct TokenOwner {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
}

#[derive(Serialize)]
pub struct ValidateTokenResponse {
    pub user: TokenOwner,
}

/// Build the HttpOnly refresh cookie. It expires together with the token.
fn refresh_cookie(settings: &AuthSettings, refresh: &IssuedToken) -> Cookie<'static> {
    let max_age = refresh
        .record
        .expires_at
        .map(|expires_at| (expires_at - Utc::now()).num_seconds().max(0))
        .unwrap_or(settings.refresh_token_expiry);

    Cookie::build(REFRESH_COOKIE, refresh.wire_token.clone())
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age))
        .finish()
}

/// POST /api/auth/login
///
/// Check email and password, then issue a refresh token (cookie) and an
/// access token (body).
///
/// # Errors
/// - 422: Missing email/password, invalid email format, password under 6 chars
/// - 401: Invalid credentials (unknown email or wrong password, same message)
/// - 500: Token generation or database failure
pub async fn login(
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = validate_email(&form.email)?;
    let password = validate_password("password", &form.password)?;

    let pair = state.auth.login(&email, password).await.map_err(|e| {
        context.log_failure(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = pair.access.record.subject_id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(&state.settings, &pair.refresh))
        .json(ApiResponse::with_data(
            "Login successful",
            TokenResponse {
                token: pair.access.wire_token,
            },
        )))
}

/// GET /api/auth/validate-token
///
/// Confirms the bearer token and returns a summary of its owner.
pub async fn validate_token(
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_data(
        "Token is valid",
        ValidateTokenResponse {
            user: TokenOwner {
                id: user.id,
                code: user.code,
                name: user.name,
            },
        },
    )))
}

/// POST /api/auth/logout
///
/// Revokes only the access token that authenticated this request. Its
/// refresh token and the user's other sessions stay valid.
pub async fn logout(
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout").with_user_id(identity.user_id);

    state.auth.logout(&identity.token).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = identity.user_id,
        "User logged out"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::message(
        "Logout successful. Current access token has been revoked.",
    )))
}

/// POST /api/auth/change-password
///
/// Replaces the password, revokes every token the user holds (this one
/// included) and issues a fresh pair.
///
/// # Errors
/// - 422: Missing fields, passwords under 6 chars, confirmation mismatch
/// - 401: Current password is incorrect
pub async fn change_password(
    form: web::Json<ChangePasswordRequest>,
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password").with_user_id(identity.user_id);

    let current_password = validate_password("current_password", &form.current_password)?;
    let new_password = validate_password("new_password", &form.new_password)?;
    let confirmation =
        validate_password("new_password_confirmation", &form.new_password_confirmation)?;

    let pair = state
        .auth
        .change_password(identity.user_id, current_password, new_password, confirmation)
        .await
        .map_err(|e| {
            context.log_failure(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = identity.user_id,
        "Password changed successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(&state.settings, &pair.refresh))
        .json(ApiResponse::with_data(
            "Password changed successfully",
            TokenResponse {
                token: pair.access.wire_token,
            },
        )))
}

/// PUT /api/auth/profile
///
/// # Errors
/// - 422: Name missing or under 3 chars, malformed email
/// - 400: Email already used by another account
pub async fn update_profile(
    form: web::Json<UpdateProfileRequest>,
    identity: web::ReqData<Identity>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("update_profile").with_user_id(identity.user_id);

    let name = validate_name(&form.name)?;
    let email = validate_optional_email(form.email.as_deref())?;

    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    state
        .auth
        .update_profile(&user, &name, email.as_deref())
        .await
        .map_err(|e| {
            context.log_failure(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = identity.user_id,
        "Profile updated"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::message("Profile updated successfully")))
}

/// POST /api/auth/refresh
///
/// Mints a new access token under the refresh token in the `refresh_token`
/// cookie. The refresh token itself is not rotated.
///
/// # Errors
/// - 401: Cookie missing, malformed, unknown, or expired
pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let cookie = req
        .cookie(REFRESH_COOKIE)
        .ok_or(AuthError::MissingToken)?;

    let pair = state.auth.refresh(cookie.value()).await.map_err(|e| {
        context.log_failure(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = pair.access.record.subject_id,
        "Access token refreshed"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::with_data(
        "Token refreshed successfully",
        TokenResponse {
            token: pair.access.wire_token,
        },
    )))
}
