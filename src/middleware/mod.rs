/// Middleware module
///
/// Bearer-token authentication for protected routes and per-IP rate limiting.

mod rate_limit;
mod token_auth;

pub use rate_limit::RateLimit;
pub use token_auth::{Identity, TokenAuth};
