//! API request and response types

use serde::Deserialize;
use serde::Serialize;

/// Error body in the shape `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Document ingestion request
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub filepath: String,
}

/// Document ingestion response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub chunks_ingested: usize,
}
