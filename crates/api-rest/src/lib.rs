//! # API REST
//!
//! REST API implementation for the behavioural analysis service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON rejections, error bodies, CORS)
//!
//! Uses `api-shared` for request/response bodies and `habit-core` for the analysis pipeline.

#![warn(rust_2018_idioms)]

mod error;

pub use error::ApiError;

use api_shared::{
    AnalyzeReq, AnalyzeRes, DailyProgressEntryRes, DailyProgressReq, DailyProgressRes, ErrorRes,
    FormattedAnalysisRes, HabitRes, HealthRes, HealthService, ListAnalysesRes,
    ListDailyProgressRes, StoredAnalysisRes, TaskDto, ViewingKeyQuery, ViewingKeyRes, WelcomeRes,
};
use axum::{
    extract::{FromRequest, FromRequestParts, Path, State},
    http::{HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use habit_core::{AnalysisRequest, AnalysisService, CoreError, DailyProgress, PatientId, ViewingKey};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Contains the shared analysis service used by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
}

/// JSON body extractor whose rejections become `400` error bodies.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections become `400` error bodies.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(OpenApi)]
#[openapi(
    paths(
        root,
        health,
        analyze,
        create_viewing_key,
        get_analyses,
        save_daily_progress,
        get_daily_progress,
    ),
    components(schemas(
        HealthRes,
        WelcomeRes,
        ErrorRes,
        AnalyzeReq,
        AnalyzeRes,
        FormattedAnalysisRes,
        HabitRes,
        ViewingKeyRes,
        StoredAnalysisRes,
        ListAnalysesRes,
        TaskDto,
        DailyProgressReq,
        DailyProgressRes,
        DailyProgressEntryRes,
        ListDailyProgressRes,
    ))
)]
pub struct ApiDoc;

/// Builds the application router with documentation and CORS applied.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/create-viewing-key/:patient_id", post(create_viewing_key))
        .route("/analyses/:patient_id", get(get_analyses))
        .route("/daily-progress", post(save_daily_progress))
        .route("/daily-progress/:patient_id", get(get_daily_progress))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

/// Builds the CORS layer.
///
/// An empty origin list allows any origin. Otherwise only the listed origins are allowed.
///
/// # Errors
///
/// Returns the offending origin if it is not a valid header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, String> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|_| o.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

/// Splits a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn patient_id(raw: &str) -> Result<PatientId, ApiError> {
    PatientId::parse(raw).map_err(|e| CoreError::from(e).into())
}

fn viewing_key(raw: &str) -> Result<ViewingKey, ApiError> {
    ViewingKey::new(raw).map_err(|e| CoreError::from(e).into())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Welcome message", body = WelcomeRes)
    )
)]
#[axum::debug_handler]
async fn root() -> Json<WelcomeRes> {
    Json(WelcomeRes {
        message: "Welcome to the Behavioral Analysis API".into(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeReq,
    responses(
        (status = 200, description = "Analysis generated and stored", body = AnalyzeRes),
        (status = 400, description = "Missing or invalid field", body = ErrorRes),
        (status = 502, description = "Language model or ledger unavailable", body = ErrorRes)
    )
)]
/// Run a behavioural analysis
///
/// Renders the analysis prompt, asks the language model, extracts the structured analysis from
/// its reply and stores it on the ledger.
///
/// # Arguments
/// * `req` - Patient identifier and the four functional-analysis fields
///
/// # Returns
/// * `Ok(Json<AnalyzeRes>)` - The extracted analysis and the storing transaction hash
///
/// # Errors
/// Returns `400 Bad Request` if a field is missing or the patient id is invalid, and
/// `502 Bad Gateway` if the model or the ledger fails.
#[axum::debug_handler]
async fn analyze(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AnalyzeReq>,
) -> Result<Json<AnalyzeRes>, ApiError> {
    let request = AnalysisRequest::try_from(req)?;
    let result = state.service.analyze(&request).await?;
    Ok(Json(result.into()))
}

#[utoipa::path(
    post,
    path = "/create-viewing-key/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Viewing key issued", body = ViewingKeyRes),
        (status = 400, description = "Invalid patient id", body = ErrorRes),
        (status = 502, description = "Ledger unavailable", body = ErrorRes)
    )
)]
/// Issue a viewing key for a patient
///
/// Reissuing replaces the patient's previous key.
#[axum::debug_handler]
async fn create_viewing_key(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ViewingKeyRes>, ApiError> {
    let id = patient_id(&raw_id)?;
    let grant = state.service.create_viewing_key(&id).await?;
    Ok(Json(grant.into()))
}

#[utoipa::path(
    get,
    path = "/analyses/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier"), ViewingKeyQuery),
    responses(
        (status = 200, description = "Stored analyses", body = ListAnalysesRes),
        (status = 400, description = "Invalid patient id or missing viewing key", body = ErrorRes),
        (status = 403, description = "Viewing key rejected", body = ErrorRes),
        (status = 502, description = "Ledger unavailable", body = ErrorRes)
    )
)]
/// List stored analyses for a patient
///
/// Records stored without habits are returned with the default habit set.
#[axum::debug_handler]
async fn get_analyses(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    ApiQuery(query): ApiQuery<ViewingKeyQuery>,
) -> Result<Json<ListAnalysesRes>, ApiError> {
    let id = patient_id(&raw_id)?;
    let key = viewing_key(&query.viewing_key)?;
    let analyses = state.service.list_analyses(&id, &key).await?;
    Ok(Json(ListAnalysesRes {
        analyses: analyses.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/daily-progress",
    request_body = DailyProgressReq,
    responses(
        (status = 200, description = "Progress stored", body = DailyProgressRes),
        (status = 400, description = "Missing or invalid field", body = ErrorRes),
        (status = 502, description = "Ledger unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn save_daily_progress(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DailyProgressReq>,
) -> Result<Json<DailyProgressRes>, ApiError> {
    let progress = DailyProgress::try_from(req)?;
    let tx_hash = state.service.save_daily_progress(&progress).await?;
    Ok(Json(DailyProgressRes { tx_hash }))
}

#[utoipa::path(
    get,
    path = "/daily-progress/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier"), ViewingKeyQuery),
    responses(
        (status = 200, description = "Daily progress entries", body = ListDailyProgressRes),
        (status = 400, description = "Invalid patient id or missing viewing key", body = ErrorRes),
        (status = 403, description = "Viewing key rejected", body = ErrorRes),
        (status = 502, description = "Ledger unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn get_daily_progress(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    ApiQuery(query): ApiQuery<ViewingKeyQuery>,
) -> Result<Json<ListDailyProgressRes>, ApiError> {
    let id = patient_id(&raw_id)?;
    let key = viewing_key(&query.viewing_key)?;
    let progress = state.service.list_daily_progress(&id, &key).await?;
    Ok(Json(ListDailyProgressRes {
        progress: progress.into_iter().map(Into::into).collect(),
    }))
}
