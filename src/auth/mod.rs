/// Authentication module
///
/// Opaque personal access tokens: secret generation and hashing, issuance of
/// linked refresh/access pairs, validation, and the login, password-change,
/// profile and refresh flows built on them.

mod issuer;
mod password;
mod service;
mod token;
mod validator;

pub use issuer::{IssuedToken, TokenIssuer, TokenPair};
pub use password::{hash_password, verify_password, PasswordHasher};
pub use service::AuthService;
pub use token::{
    format_wire_token, generate_secure_token, hash_token, parse_wire_token, SecureToken,
    MIN_SECRET_BYTES, SECRET_BYTES,
};
pub use validator::{TokenValidator, ValidatedToken};
