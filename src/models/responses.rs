use serde::{Deserialize, Serialize};

/// Body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body returned for operations that have nothing else to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Ranked configuration IDs for a match query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub config_ids: Vec<String>,
}
