//! Owner identity extraction
//!
//! Requests carry the opaque user id in the `X-Identity` header, placed
//! there by the fronting auth layer. Policy enforcement happens upstream;
//! here the header is only required so ownership scoping stays intact.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use std::future::{ready, Ready};
use vela_core::AppError;

/// Request header carrying the owner identity
pub const IDENTITY_HEADER: &str = "X-Identity";

/// The authenticated owner identity of a request
#[derive(Debug, Clone)]
pub struct Identity(pub String);

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = req
            .headers()
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Identity(value.to_string()));

        ready(identity.ok_or_else(|| {
            AppError::Unauthorized(format!("missing {} header", IDENTITY_HEADER))
        }))
    }
}
