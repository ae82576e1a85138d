mod auth;
mod health_check;
pub mod response;
mod users;

pub use auth::{change_password, login, logout, refresh, update_profile, validate_token};
pub use health_check::health_check;
pub use users::{current_user, list_users, show_user};
