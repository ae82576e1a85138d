use actix_cors::Cors;
use actix_files as fs;
use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, web, App, HttpRequest, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, PasswordHasher};
use crate::configuration::{AuthSettings, HttpSettings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{RateLimit, TokenAuth};
use crate::routes::{
    change_password, current_user, health_check, list_users, login, logout, refresh, show_user,
    update_profile, validate_token,
};
use crate::store::{PgTokenStore, PgUserStore, TokenStore, UserStore};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: Arc<dyn UserStore>,
    pub settings: AuthSettings,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        settings: AuthSettings,
    ) -> Result<Self, AppError> {
        settings.validate()?;

        let hasher = PasswordHasher::new(settings.password_hash_cost)?;
        let auth = AuthService::new(users.clone(), tokens, hasher, &settings);

        Ok(Self {
            auth,
            users,
            settings,
        })
    }

    /// State backed by the Postgres stores
    pub fn postgres(pool: PgPool, settings: AuthSettings) -> Result<Self, AppError> {
        Self::new(
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgTokenStore::new(pool)),
            settings,
        )
    }
}

/// Malformed or non-JSON bodies are validation failures (422)
fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!(path = %req.path(), error = %err, "Rejected request body");
    AppError::Validation(ValidationError::InvalidFormat("body")).into()
}

/// An empty origin list allows any origin
fn cors(settings: &HttpSettings) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if settings.cors_allowed_origins.is_empty() {
        cors.allow_any_origin()
    } else {
        settings
            .cors_allowed_origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

pub fn run(
    listener: TcpListener,
    state: AppState,
    http: HttpSettings,
) -> Result<Server, std::io::Error> {
    let invalid_limit = |e: AppError| {
        tracing::error!("Invalid rate limit settings: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    };
    let global_limit =
        RateLimit::per_minute(http.requests_per_minute, "global").map_err(invalid_limit)?;
    let auth_limit =
        RateLimit::per_minute(http.auth_requests_per_minute, "auth").map_err(invalid_limit)?;

    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let validator = state.auth.validator().clone();

        App::new()
            // Global middleware
            .wrap(global_limit.clone())
            .wrap(cors(&http))
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health_check))
                    .service(
                        web::scope("/auth")
                            .wrap(auth_limit.clone())
                            // Public auth routes
                            .route("/login", web::post().to(login))
                            .route("/refresh", web::post().to(refresh))
                            // Protected auth routes
                            .service(
                                web::resource("/validate-token")
                                    .wrap(TokenAuth::new(validator.clone()))
                                    .route(web::get().to(validate_token)),
                            )
                            .service(
                                web::resource("/logout")
                                    .wrap(TokenAuth::new(validator.clone()))
                                    .route(web::post().to(logout)),
                            )
                            .service(
                                web::resource("/change-password")
                                    .wrap(TokenAuth::new(validator.clone()))
                                    .route(web::post().to(change_password)),
                            )
                            .service(
                                web::resource("/profile")
                                    .wrap(TokenAuth::new(validator.clone()))
                                    .route(web::put().to(update_profile)),
                            ),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(TokenAuth::new(validator))
                            .route("", web::get().to(list_users))
                            .route("/", web::get().to(list_users))
                            .route("/me", web::get().to(current_user))
                            .route("/{id}", web::get().to(show_user)),
                    ),
            )

            // Static file serving (must be last to not override API routes)
            .service(fs::Files::new("/", "./public").index_file("index.html"))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
