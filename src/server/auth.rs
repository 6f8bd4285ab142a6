//! Bearer token gate and the register/login endpoints.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::models::MessageResponse;

/// Authenticated caller, added to request extensions after auth
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
}

/// Auth error response
#[derive(Serialize)]
struct AuthError {
    error: &'static str,
    message: &'static str,
}

fn unauthorized(error: &'static str, message: &'static str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(AuthError { error, message })).into_response()
}

/// Authentication middleware
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(token) => token.trim(),
            None => {
                return unauthorized(
                    "invalid_auth",
                    "Authorization header must use Bearer scheme",
                )
            }
        },
        None => return unauthorized("missing_auth", "Authorization header is required"),
    };

    match state.tokens.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(Principal {
                username: claims.username,
            });
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            unauthorized("invalid_token", "Invalid or expired token")
        }
    }
}

/// Register/login request body. Passwords are accepted but not checked.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

fn credentials(payload: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, ApiError> {
    let Json(credentials) = payload?;
    if credentials.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    Ok(credentials)
}

pub async fn register(
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let credentials = credentials(payload)?;
    tracing::info!(username = %credentials.username, "User registered");

    Ok(Json(MessageResponse {
        message: "User registered successfully".to_string(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = credentials(payload)?;

    let token = state.tokens.issue(&credentials.username).map_err(|e| {
        tracing::error!(error = %e, "Could not generate token");
        ApiError::Internal("Could not generate token".to_string())
    })?;

    tracing::info!(username = %credentials.username, "Token issued");
    Ok(Json(TokenResponse { token }))
}
