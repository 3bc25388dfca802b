//! HTTP surface - thin axum handlers over the core services
//!
//! Routing and schema are deliberately minimal; all behaviour lives in the
//! search, forecast, and store layers. The predict endpoint returns
//! quantities rounded to 2 decimal places (see `ForecastService::predict`).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::config::Config;
use crate::database::{
    Document, DocumentStore, FeedbackKind, NewDocument, PostgresPool, RegistryStore, SalesRecord,
    SalesStore, TagRow,
};
use crate::embedding::{document_embed_text, EmbeddingService};
use crate::error::Error;
use crate::forecast::{
    BatchTrainReport, ForecastService, FsModelStorage, TrainSummary,
};
use crate::search::{AskOutcome, RankingEngine, ScoredResult, SearchMode};
use std::sync::Arc;

// ---- App State ----

/// Shared application state: every field is cheaply cloneable and the
/// embedding handle is the process-wide singleton loaded at startup
#[derive(Clone)]
pub struct AppState {
    engine: RankingEngine,
    documents: DocumentStore,
    registry: RegistryStore,
    sales: SalesStore,
    forecast: Arc<ForecastService>,
    embedding: EmbeddingService,
}

impl AppState {
    /// Wire the stores and services over one pool and one embedding handle
    pub fn new(pool: PostgresPool, embedding: EmbeddingService, config: &Config) -> Self {
        let documents = DocumentStore::new(pool.clone());
        let sales = SalesStore::new(pool.clone());
        let forecast = Arc::new(ForecastService::new(
            Arc::new(sales.clone()),
            Arc::new(FsModelStorage::new(config.forecast.model_dir.clone())),
        ));

        AppState {
            engine: RankingEngine::new(documents.clone(), embedding.clone(), config.search.clone()),
            documents,
            registry: RegistryStore::new(pool),
            sales,
            forecast,
            embedding,
        }
    }
}

// ---- Error Handling ----

struct AppError(Error);

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) | Error::NotTrained(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

// ---- Request / Response Types ----

fn default_top_k() -> usize {
    5
}

fn default_days() -> u32 {
    7
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    search_type: SearchMode,
    #[serde(default)]
    category_filter: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredResult>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    question: String,
    #[serde(flatten)]
    outcome: AskOutcome,
}

#[derive(Deserialize)]
struct FeedbackRequest {
    action: FeedbackKind,
}

#[derive(Serialize)]
struct ConfigResponse {
    categories: Vec<String>,
    tags: Vec<TagRow>,
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

#[derive(Deserialize)]
struct SalesBatchRequest {
    records: Vec<SalesRecord>,
}

#[derive(Serialize)]
struct SalesBatchResponse {
    inserted: usize,
}

#[derive(Deserialize)]
struct PredictRequest {
    product_id: String,
    #[serde(default = "default_days")]
    days: u32,
}

#[derive(Serialize)]
struct PredictEntry {
    date: NaiveDate,
    predicted_sales: f64,
}

#[derive(Serialize)]
struct PredictResponse {
    product_id: String,
    forecast: Vec<PredictEntry>,
}

// ---- Handlers ----

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": crate::NAME }))
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = state
        .engine
        .search(
            &req.query,
            req.top_k,
            req.search_type,
            req.category_filter.as_deref(),
        )
        .await?;
    Ok(Json(SearchResponse { results }))
}

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let outcome = state.engine.ask(&req.question).await?;
    Ok(Json(AskResponse {
        question: req.question,
        outcome,
    }))
}

async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.documents.list().await?))
}

async fn create_document(
    State(state): State<AppState>,
    Json(doc): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let embedding = state
        .embedding
        .embed(&document_embed_text(&doc.title, &doc.content))
        .await?;
    let created = state.documents.insert(&doc, embedding).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(doc): Json<NewDocument>,
) -> Result<Json<Document>, AppError> {
    let embedding = state
        .embedding
        .embed(&document_embed_text(&doc.title, &doc.content))
        .await?;
    let updated = state.documents.update(id, &doc, embedding).await?;
    Ok(Json(updated))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn document_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FeedbackRequest>,
) -> Result<StatusCode, AppError> {
    state.documents.record_feedback(id, req.action).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigResponse>, AppError> {
    let categories = state.registry.list_categories().await?;
    let tags = state.registry.list_tags().await?;
    Ok(Json(ConfigResponse { categories, tags }))
}

async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<NameRequest>,
) -> Result<StatusCode, AppError> {
    state.registry.create_category(&req.name).await?;
    Ok(StatusCode::CREATED)
}

async fn delete_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.delete_category(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.delete_tag(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reload_sales(
    State(state): State<AppState>,
    Json(req): Json<SalesBatchRequest>,
) -> Result<Json<SalesBatchResponse>, AppError> {
    let inserted = state.sales.reload(&req.records).await?;
    Ok(Json(SalesBatchResponse { inserted }))
}

async fn append_sales(
    State(state): State<AppState>,
    Json(req): Json<SalesBatchRequest>,
) -> Result<Json<SalesBatchResponse>, AppError> {
    let inserted = state.sales.append(&req.records).await?;
    Ok(Json(SalesBatchResponse { inserted }))
}

async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let points = state.forecast.predict(&req.product_id, req.days).await?;
    Ok(Json(PredictResponse {
        product_id: req.product_id,
        forecast: points
            .into_iter()
            .map(|p| PredictEntry {
                date: p.date,
                predicted_sales: p.quantity,
            })
            .collect(),
    }))
}

async fn train_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<TrainSummary>, AppError> {
    Ok(Json(state.forecast.train(&product_id).await?))
}

async fn train_all(State(state): State<AppState>) -> Result<Json<BatchTrainReport>, AppError> {
    Ok(Json(state.forecast.train_all().await?))
}

// ---- Router ----

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/search", post(search))
        .route("/rag/ask", post(ask))
        .route("/documents", get(list_documents))
        .route("/documents/create", post(create_document))
        .route("/documents/{id}", put(update_document).delete(delete_document))
        .route("/documents/{id}/feedback", post(document_feedback))
        .route("/config", get(get_config))
        .route("/categories", post(create_category))
        .route("/categories/{name}", delete(delete_category))
        .route("/tags/{name}", delete(delete_tag))
        .route("/sales/reload", post(reload_sales))
        .route("/sales/append", post(append_sales))
        .route("/predict", post(predict))
        .route("/train", post(train_all))
        .route("/train/{product_id}", post(train_product))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(&Error::NotFound("doc".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::NotTrained("p1".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::InsufficientData {
                product_id: "p1".into(),
                points: 3,
                required: 14,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::Upstream("embedding".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::StorageCorruption("p1".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&Error::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "運費", "search_type": "smart"}"#).unwrap();
        assert_eq!(req.top_k, 5);
        assert_eq!(req.search_type, SearchMode::Smart);
        assert!(req.category_filter.is_none());
    }

    #[test]
    fn test_predict_request_defaults_to_a_week() {
        let req: PredictRequest = serde_json::from_str(r#"{"product_id": "p1"}"#).unwrap();
        assert_eq!(req.days, 7);
    }
}
