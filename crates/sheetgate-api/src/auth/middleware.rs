use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sheetgate_core::{AppError, TokenSigner};
use std::sync::Arc;

use crate::error::HttpAppError;
use crate::middleware::audit;

#[derive(Clone, Debug)]
pub struct AuthState {
    pub signer: TokenSigner,
}

/// Verified caller identity, stored in request extensions.
#[derive(Clone, Debug)]
pub struct AuthenticatedCaller {
    pub subject: String,
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            audit::log_authentication_failure("Missing authorization header");
            return HttpAppError(AppError::Unauthorized(
                "missing or invalid Authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => token.trim(),
        _ => {
            audit::log_authentication_failure("Authorization header is not a bearer token");
            return HttpAppError(AppError::Unauthorized(
                "missing or invalid Authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let claims = match auth_state.signer.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            audit::log_authentication_failure(&e.to_string());
            return HttpAppError(e).into_response();
        }
    };

    request.extensions_mut().insert(AuthenticatedCaller {
        subject: claims.sub,
    });

    next.run(request).await
}
