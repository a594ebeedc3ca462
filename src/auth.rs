use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::err::Error;

/// Gate for every `/api` route. Only checks that a non-empty `Authorization`
/// header is present; the value itself is never verified.
pub async fn require_authorization<B>(req: Request<B>, next: Next<B>) -> Result<Response, Error> {
    let present = req
        .headers()
        .get(AUTHORIZATION)
        .map_or(false, |value| !value.is_empty());
    if !present {
        log::debug!("denied {} {}: no authorization header", req.method(), req.uri());
        return Err(Error::AccessDenied);
    }
    Ok(next.run(req).await)
}
