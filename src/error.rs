/// Application Error Handling
///
/// One error type crosses the service boundary: [`AppError`]. It covers:
/// 1. Input validation errors raised by the route layer
/// 2. Authentication and token errors (deliberately generic towards clients)
/// 3. Persistence errors from the token and user stores
/// 4. HTTP response mapping with structured logging of the internal detail

use actix_web::{
    error::ResponseError,
    http::{header::RETRY_AFTER, StatusCode},
    HttpResponse,
};
use std::collections::HashMap;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),
    #[error("{0} must be at least {1} characters")]
    TooShort(&'static str, usize),
    #[error("{0} must be at most {1} characters")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("Password confirmation does not match")]
    PasswordMismatch,
}

impl ValidationError {
    /// Name of the offending request field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyField(field)
            | ValidationError::TooShort(field, _)
            | ValidationError::TooLong(field, _)
            | ValidationError::InvalidFormat(field) => field,
            ValidationError::PasswordMismatch => "new_password",
        }
    }
}

/// Authentication and token errors
///
/// `InvalidToken` covers an unknown id, a digest mismatch and a kind mismatch
/// alike, and `InvalidCredentials` covers an unknown email and a wrong password
/// alike.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    CurrentPasswordIncorrect,
}

/// Errors raised by the token and user stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // 23505: unique_violation
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Email already used")]
    EmailAlreadyUsed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Too many requests, retry in {0}s")]
    TooManyRequests(u64),
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Entropy source unavailable: {0}")]
    EntropySource(String),
    #[error(transparent)]
    Persistence(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable, non-leaking message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// Unique error ID, also attached to the server-side log line
    pub error_id: String,
    pub timestamp: String,
    /// Field-level messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, Vec<String>>>,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String) -> Self {
        Self {
            success: false,
            message,
            code,
            error_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            errors: None,
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Validation(_) => ("VALIDATION_ERROR", "Validation error".to_string()),
            AppError::Auth(e) => match e {
                AuthError::MalformedToken => {
                    ("MALFORMED_TOKEN", "Unauthorized: Invalid token format".to_string())
                }
                AuthError::InvalidToken => ("TOKEN_INVALID", "Unauthorized: Invalid token".to_string()),
                AuthError::TokenExpired => ("TOKEN_EXPIRED", "Unauthorized: Token expired".to_string()),
                AuthError::MissingToken => {
                    ("MISSING_TOKEN", "Unauthorized: No token provided".to_string())
                }
                AuthError::InvalidCredentials => {
                    ("INVALID_CREDENTIALS", "Invalid credentials".to_string())
                }
                AuthError::CurrentPasswordIncorrect => (
                    "CURRENT_PASSWORD_INCORRECT",
                    "Current password is incorrect".to_string(),
                ),
            },
            AppError::EmailAlreadyUsed => ("EMAIL_ALREADY_USED", "Email already used".to_string()),
            AppError::NotFound(what) => ("NOT_FOUND", format!("{} not found", capitalize(what))),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            AppError::TooManyRequests(_) => (
                "TOO_MANY_REQUESTS",
                "Too many requests, please try again later".to_string(),
            ),
            AppError::Persistence(_) => ("DATABASE_ERROR", "Database error occurred".to_string()),
            AppError::TokenCreation(_) => ("TOKEN_CREATION_FAILED", "Failed to generate token".to_string()),
            AppError::EntropySource(_) | AppError::Internal(_) => {
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let status = ResponseError::status_code(self);
        let (code, message) = self.code_and_message();

        let mut error_response =
            ErrorResponse::new(request_id.to_string(), message, code.to_string());

        if let AppError::Validation(e) = self {
            let mut errors = HashMap::new();
            errors.insert(e.field().to_string(), vec![e.to_string()]);
            error_response.errors = Some(errors);
        }

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::info!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::EmailAlreadyUsed
            | AppError::NotFound(_)
            | AppError::BadRequest(_)
            | AppError::TooManyRequests(_) => {
                tracing::info!(request_id = request_id, error = %self, "Request rejected");
            }
            AppError::Persistence(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::TokenCreation(_) | AppError::EntropySource(_) | AppError::Internal(_) => {
                tracing::error!(request_id = request_id, error = %self, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        let mut builder = HttpResponse::build(status);
        if let AppError::TooManyRequests(retry_after) = self {
            builder.insert_header((RETRY_AFTER, retry_after.to_string()));
        }
        builder.json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::EmailAlreadyUsed | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Persistence(_)
            | AppError::TokenCreation(_)
            | AppError::EntropySource(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried through a handler for log correlation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<i64>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_failure(&self, error: &AppError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            user_id = ?self.user_id,
            error = %error,
            "Operation failed"
        );
    }
}
