//! Persisted entities shared by the stores, the auth core and the route layer.

mod personal_access_token;
mod user;

pub use personal_access_token::{
    NewPersonalAccessToken, PersonalAccessToken, TokenKind, TokenUpdate, TOKENABLE_TYPE,
    WILDCARD_ABILITIES,
};
pub use user::{NewUser, User, UserUpdate};
