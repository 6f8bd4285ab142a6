//! HTTP API for the configuration stores.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth)
//! - `POST /auth/register`, `POST /auth/login`: Token issuance (no auth)
//! - `/api/configuration`: `GET /all`, `GET /{id}`, `POST /`, `PUT /{id}`, `DELETE /{id}`
//! - `/api/specific`: `GET /?host=&url=&page=`, `GET /all`, `GET /{id}`, `POST /`,
//!   `PUT /{id}`, `DELETE /{id}`
//!
//! Everything under `/api` requires `Authorization: Bearer <token>`.

pub mod auth;
pub mod documents;
pub mod error;
pub mod specific;
pub mod tokens;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::models::{Config, SpecificConfig};
use crate::{ConfigStore, SpecificStore};

pub use auth::Principal;
pub use error::ApiError;
pub use tokens::{Claims, TokenError, TokenService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub configs: Arc<ConfigStore>,
    pub specifics: Arc<SpecificStore>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(configs: ConfigStore, specifics: SpecificStore, tokens: TokenService) -> Self {
        Self {
            configs: Arc::new(configs),
            specifics: Arc::new(specifics),
            tokens: Arc::new(tokens),
        }
    }
}

impl FromRef<AppState> for Arc<ConfigStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.configs)
    }
}

impl FromRef<AppState> for Arc<SpecificStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.specifics)
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Builds the router without transport layers.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/configuration", post(documents::create::<Config>))
        .route("/api/configuration/", post(documents::create::<Config>))
        .route("/api/configuration/all", get(documents::list::<Config>))
        .route(
            "/api/configuration/{id}",
            get(documents::get::<Config>)
                .put(documents::update::<Config>)
                .delete(documents::delete::<Config>),
        )
        .route(
            "/api/specific",
            get(specific::matching).post(documents::create::<SpecificConfig>),
        )
        .route(
            "/api/specific/",
            get(specific::matching).post(documents::create::<SpecificConfig>),
        )
        .route("/api/specific/all", get(documents::list::<SpecificConfig>))
        .route(
            "/api/specific/{id}",
            get(documents::get::<SpecificConfig>)
                .put(documents::update::<SpecificConfig>)
                .delete(documents::delete::<SpecificConfig>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Builds the full application: router plus tracing and CORS layers.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(cors_origins)),
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}
