//! Match query endpoint for specific configurations.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::sync::Arc;

use super::documents::blocking;
use super::error::ApiError;
use crate::matching::MatchQuery;
use crate::models::MatchResponse;
use crate::SpecificStore;

/// `GET /api/specific?host=&url=&page=`
pub async fn matching(
    State(store): State<Arc<SpecificStore>>,
    query: Result<Query<MatchQuery>, QueryRejection>,
) -> Result<Json<MatchResponse>, ApiError> {
    let Query(query) = query?;

    if query.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one parameter (host, url or page) is required".to_string(),
        ));
    }

    let config_ids = blocking(move || store.matching(&query)).await?;

    tracing::debug!(matches = config_ids.len(), "Match query answered");
    Ok(Json(MatchResponse { config_ids }))
}
