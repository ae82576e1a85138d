/// Bearer Token Authentication Middleware
///
/// Reads `Authorization: Bearer {id}|{secret}`, validates it as an access
/// token, records the use and injects the caller's [`Identity`] into request
/// extensions for route handlers (`web::ReqData<Identity>`).

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::TokenValidator;
use crate::error::{AppError, AuthError};
use crate::models::{PersonalAccessToken, TokenKind};

const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated caller of a protected request
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    /// The access token that authenticated this request
    pub token: PersonalAccessToken,
}

impl From<PersonalAccessToken> for Identity {
    fn from(token: PersonalAccessToken) -> Self {
        Self {
            user_id: token.subject_id,
            token,
        }
    }
}

/// Token middleware for protecting routes
pub struct TokenAuth {
    validator: TokenValidator,
}

impl TokenAuth {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TokenAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(TokenAuthService {
            service: Rc::new(service),
            validator: self.validator.clone(),
        }))
    }
}

pub struct TokenAuthService<S> {
    service: Rc<S>,
    validator: TokenValidator,
}

impl<S, B> Service<ServiceRequest> for TokenAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = bearer_token(req.headers());
        let validator = self.validator.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = bearer.map_err(|e| {
                tracing::warn!(path = %req.path(), error = %e, "Missing or invalid Authorization header");
                AppError::from(e)
            })?;

            let validated = validator.validate(&token, TokenKind::AuthToken).await?;
            validator.touch(&validated.record).await;

            tracing::debug!(
                user_id = validated.record.subject_id,
                token_id = validated.record.id,
                "Access token validated"
            );

            req.extensions_mut().insert(Identity::from(validated.record));
            service.call(req).await
        })
    }
}

/// Extract the credential from an `Authorization: Bearer ...` header
fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::MalformedToken)?,
        None => return Err(AuthError::MissingToken),
    };

    if value.trim().is_empty() {
        return Err(AuthError::MissingToken);
    }

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AuthError::MalformedToken),
    }
}
