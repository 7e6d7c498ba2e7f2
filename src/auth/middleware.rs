use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;
use std::rc::Rc;

use crate::auth::extractors::AuthUser;
use crate::auth::token::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::models::Role;

/// Bearer-token authentication middleware.
///
/// Extracts the `Authorization: Bearer` token, verifies it, and re-resolves
/// the referenced user from the database so a deleted account can no longer
/// authenticate even with an unexpired token. On success an `AuthUser`
/// (id + role) is inserted into request extensions for handlers to extract.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
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
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            // Registration, login and the liveness check are public.
            let public = {
                let path = req.path();
                path == "/health"
                    || path.starts_with("/api/auth/login")
                    || path.starts_with("/api/auth/register")
            };
            if public {
                return service.call(req).await;
            }

            let token = req
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_owned);

            let token = match token {
                Some(token) => token,
                None => return Err(AppError::Auth("No token".into()).into()),
            };

            let config = req
                .app_data::<web::Data<Config>>()
                .cloned()
                .ok_or_else(|| {
                    Error::from(AppError::Internal("Config missing from app data".into()))
                })?;

            let claims = verify_token(&token, &config.jwt_secret).map_err(Error::from)?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .cloned()
                .ok_or_else(|| {
                    Error::from(AppError::Internal("Database pool missing from app data".into()))
                })?;

            // The token may outlive the account; the user must still exist.
            let row: Option<(i32, Role)> =
                sqlx::query_as("SELECT id, role FROM users WHERE id = $1")
                    .bind(claims.sub)
                    .fetch_optional(pool.get_ref())
                    .await
                    .map_err(|e| Error::from(AppError::from(e)))?;

            match row {
                Some((id, role)) => {
                    req.extensions_mut().insert(AuthUser { id, role });
                    service.call(req).await
                }
                None => Err(AppError::Auth("User not found".into()).into()),
            }
        })
    }
}
