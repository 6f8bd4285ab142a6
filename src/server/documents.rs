//! CRUD handlers shared by both document types.
//!
//! Each handler is generic over the document type; the concrete store is
//! pulled out of [`AppState`](super::AppState) through `FromRef`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use super::auth::Principal;
use super::error::ApiError;
use crate::models::MessageResponse;
use crate::store::{Document, DocumentStore, StoreError};

type Store<D> = Arc<DocumentStore<D>>;

/// Runs a store operation on the blocking pool.
///
/// Store operations hold a mutex across synchronous disk I/O.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

pub async fn list<D: Document>(State(store): State<Store<D>>) -> Result<Json<Vec<D>>, ApiError> {
    let docs = blocking(move || Ok(store.get_all())).await?;
    Ok(Json(docs))
}

pub async fn get<D: Document>(
    State(store): State<Store<D>>,
    Path(id): Path<String>,
) -> Result<Json<D>, ApiError> {
    let doc = blocking(move || store.get(&id)).await?;
    Ok(Json(doc))
}

pub async fn create<D: Document>(
    State(store): State<Store<D>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<D>, JsonRejection>,
) -> Result<(StatusCode, Json<D>), ApiError> {
    let Json(doc) = payload?;

    let stored = blocking(move || store.add(doc)).await.inspect_err(|e| {
        tracing::warn!(kind = D::KIND, error = %e, "Create rejected");
    })?;

    tracing::info!(
        kind = D::KIND,
        id = %stored.id(),
        by = %principal.username,
        "Document created"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update<D: Document>(
    State(store): State<Store<D>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<D>, JsonRejection>,
) -> Result<Json<D>, ApiError> {
    let Json(doc) = payload?;

    let stored = blocking(move || store.update(&id, doc)).await?;

    tracing::info!(
        kind = D::KIND,
        id = %stored.id(),
        by = %principal.username,
        "Document updated"
    );
    Ok(Json(stored))
}

pub async fn delete<D: Document>(
    State(store): State<Store<D>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = id.clone();
    blocking(move || store.delete(&id)).await?;

    tracing::info!(kind = D::KIND, id = %deleted, by = %principal.username, "Document deleted");
    Ok(Json(MessageResponse {
        message: format!("{} deleted", capitalize(D::KIND)),
    }))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
