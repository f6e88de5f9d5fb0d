/// API request handlers
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::error;
use tracing::info;

use crate::api::types::ErrorResponse;
use crate::api::types::HealthResponse;
use crate::api::types::IngestRequest;
use crate::api::types::IngestResponse;
use crate::errors::DocRagError;
use crate::ingest::IngestionPipeline;
use crate::rag::Answer;
use crate::rag::Query;
use crate::rag::RagService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rag_service: Arc<RagService>,
    pub ingestion: Arc<IngestionPipeline>,
}

/// Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Answer a question from the ingested documents
pub async fn query_documents(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> Result<Json<Answer>, (StatusCode, Json<ErrorResponse>)> {
    info!("POST /query: {}", query.question);

    match state.rag_service.answer(query).await {
        Ok(answer) => Ok(Json(answer)),
        // A legitimate no-match outcome, not a fault.
        Err(DocRagError::NoRelevantDocuments) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("No relevant documents found")),
        )),
        Err(e) => {
            error!("Error processing query: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}

/// Ingest a document from a server-local path
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("POST /ingest: {}", request.filepath);

    match state.ingestion.ingest(&request.filepath).await {
        Ok(chunks_ingested) => Ok(Json(IngestResponse { chunks_ingested })),
        Err(e) => {
            error!("Error ingesting {}: {}", request.filepath, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}
