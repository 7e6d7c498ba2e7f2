use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;
use crate::models::Role;

/// The authenticated caller, as resolved by `AuthMiddleware`: the user id
/// from the token plus the role re-read from the database.
///
/// Handlers take this as an extractor; it is only present on routes behind
/// `AuthMiddleware`, which inserts it into request extensions after
/// verifying the token and confirming the user still exists.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequest for AuthUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>().copied() {
            Some(user) => ready(Ok(user)),
            None => {
                // Reached only if a handler using this extractor was mounted
                // outside AuthMiddleware.
                let err = AppError::Auth("Authentication required".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
