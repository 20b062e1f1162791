use crate::aggregator::SheetSet;
use crate::config::{AdminConfig, Config, Listener};
use crate::errors::ApiError;
use crate::images::{ImageUpload, UploadedImage, fetch_image, upload_image};
use crate::metrics_defs::REQUEST_DURATION;
use crate::pipeline::load_site_data;
use crate::rows::{SavedRow, delete_row, save_row};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, Request, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use google::{FileCatalog, FileStore, Google, SheetSource, SheetWriter, TokenSource};
use serde::Deserialize;
use serde_json::{Map, Value};
use shared::histogram;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const IMAGE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Capabilities and settings shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenSource>,
    pub sheets: Arc<dyn SheetSource>,
    pub writer: Arc<dyn SheetWriter>,
    pub files: Arc<dyn FileCatalog>,
    pub store: Arc<dyn FileStore>,
    pub admin: Arc<AdminConfig>,
    pub website_sheets: Arc<Vec<String>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(google: &Google, config: &Config) -> Self {
        AppState {
            tokens: google.tokens.clone(),
            sheets: google.sheets.clone(),
            writer: google.sheets.clone(),
            files: google.drive.clone(),
            store: google.drive.clone(),
            admin: Arc::new(config.admin.clone()),
            website_sheets: Arc::new(config.website.sheets.clone()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin-data", get(admin_data))
        .route("/api/rows/{sheet}", post(save_row_handler))
        .route("/api/rows/{sheet}/{id}", delete(delete_row_handler))
        .route("/api/images", post(upload_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/api/website-data", get(website_data))
        .route("/api/images/{id}", get(proxy_image))
        .merge(admin)
        .layer(DefaultBodyLimit::max(
            state.max_upload_bytes + MULTIPART_OVERHEAD,
        ))
        .with_state(state)
}

pub async fn serve(listener: &Listener, state: AppState) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{}:{}", listener.host, listener.port);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Back office listening");
    axum::serve(listener, app).await
}

async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if !provided.is_some_and(|provided| token_matches(provided, expected)) {
        tracing::debug!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

fn token_matches(provided: &str, expected: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize, Debug)]
struct DataParams {
    sheets: Option<String>,
}

impl DataParams {
    fn titles(&self) -> Option<Vec<String>> {
        let titles: Vec<String> = self
            .sheets
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(String::from)
            .collect();
        (!titles.is_empty()).then_some(titles)
    }
}

async fn site_data(
    state: &AppState,
    endpoint: &'static str,
    titles: &[String],
) -> Result<Json<SheetSet>, ApiError> {
    let start = Instant::now();

    // Credentials are checked before any sheet is touched.
    state.tokens.access_token().await?;
    let data = load_site_data(state.sheets.clone(), state.files.clone(), titles).await?;

    histogram!(REQUEST_DURATION, "endpoint" => endpoint).record(start.elapsed().as_secs_f64());
    Ok(Json(data))
}

async fn admin_data(
    State(state): State<AppState>,
    Query(params): Query<DataParams>,
) -> Result<Json<SheetSet>, ApiError> {
    let titles = params
        .titles()
        .unwrap_or_else(|| state.admin.sheets.clone());
    site_data(&state, "admin", &titles).await
}

async fn website_data(State(state): State<AppState>) -> Result<Json<SheetSet>, ApiError> {
    let titles = state.website_sheets.clone();
    site_data(&state, "website", &titles).await
}

fn writable_sheet(state: &AppState, sheet: &str) -> Result<(), ApiError> {
    if state.admin.sheets.iter().any(|title| title == sheet) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("sheet {sheet} is not editable")))
    }
}

async fn save_row_handler(
    State(state): State<AppState>,
    Path(sheet): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<SavedRow>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    writable_sheet(&state, &sheet)?;

    save_row(state.sheets.clone(), state.writer.clone(), &sheet, &payload)
        .await
        .map(Json)
}

async fn delete_row_handler(
    State(state): State<AppState>,
    Path((sheet, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    writable_sheet(&state, &sheet)?;

    delete_row(state.sheets.clone(), state.writer.clone(), &sheet, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadedImage>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let upload = ImageUpload {
            file_name: field.file_name().map(String::from),
            content_type: field.content_type().map(String::from),
            bytes: field.bytes().await.map_err(multipart_error)?,
        };
        return upload_image(state.store.clone(), upload, state.max_upload_bytes)
            .await
            .map(Json);
    }

    Err(ApiError::BadRequest("missing file field".into()))
}

async fn proxy_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let content = fetch_image(state.store.clone(), &id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
        ],
        content.bytes,
    )
        .into_response())
}
