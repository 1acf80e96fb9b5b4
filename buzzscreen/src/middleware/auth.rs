use std::sync::Arc;

use axum::{
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use primitives::Auth;
use slog::warn;

use crate::{response::ResponseError, Application};

const BEARER_PREFIX: &str = "Bearer ";

/// Resolves the `Bearer` token of the `Authorization` header to an [`Auth`].
///
/// Requests without the header pass through without an [`Auth`],
/// a malformed header or a token rejected by the auth service is [`ResponseError::Unauthorized`].
pub async fn authenticate<B>(
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, ResponseError> {
    let app = request
        .extensions()
        .get::<Arc<Application>>()
        .expect("Application should always be present")
        .clone();

    let token = match request.headers().get(AUTHORIZATION) {
        Some(header_value) => header_value
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ResponseError::Unauthorized)?
            .to_string(),
        None => return Ok(next.run(request).await),
    };

    let auth = match app.auth.authenticate(&token).await {
        Ok(Some(auth)) => auth,
        Ok(None) => return Err(ResponseError::Unauthorized),
        Err(err) => {
            warn!(&app.logger, "Authenticating failed"; "error" => %err);

            return Err(ResponseError::Internal(err.to_string()));
        }
    };

    request.extensions_mut().insert(auth);

    Ok(next.run(request).await)
}

pub async fn authentication_required<B>(
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, ResponseError> {
    if request.extensions().get::<Auth>().is_some() {
        Ok(next.run(request).await)
    } else {
        Err(ResponseError::Unauthorized)
    }
}
