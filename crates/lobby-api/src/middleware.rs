use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use lobby_types::api::Claims;

fn jwt_secret() -> String {
    std::env::var("LOBBY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

fn decode_bearer(header_value: &str) -> Option<Claims> {
    let token = header_value.strip_prefix("Bearer ")?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Extract and validate JWT from the Authorization header. Write routes sit
/// behind this; handlers read the caller via `Extension<Claims>`.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode_bearer(auth_header).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Optional-auth extractor for the listing endpoint: an absent or invalid
/// token is not a rejection, it just means the caller is anonymous.
pub struct MaybeUser(pub Option<Claims>);

impl MaybeUser {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        let claims = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_bearer);
        Ok(MaybeUser(claims))
    }
}
