use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use catalog_core::db::ModelDraft;
use catalog_core::search::{self, SearchOutcome, SearchResult};
use catalog_core::services::{BrandPage, CatalogStats};
use catalog_core::{Brand, BrandId, CatalogService, Model, ModelId, SubBrand, SubBrandId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{
    clear_session_cookie, credentials_match, extract_session_token, session_cookie, AdminSession,
    SessionSigner,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::media::{MediaFolder, MediaStore, Upload, PUBLIC_PREFIX};
use crate::rate_limit::{client_fingerprint, client_key, LoginRateLimiter, RateLimitMetricsSnapshot};

/// Upper bound on files accepted in one admin form.
const MAX_FILES_PER_REQUEST: usize = 10;
/// Allowance for the non-file multipart fields and framing.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    catalog: CatalogService,
    media: Arc<MediaStore>,
    sessions: Arc<SessionSigner>,
    login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, catalog: CatalogService) -> Self {
        Self {
            media: Arc::new(MediaStore::new(
                config.media_dir.clone(),
                config.max_upload_bytes,
            )),
            sessions: Arc::new(SessionSigner::from_config(&config)),
            login_limiter: Arc::new(LoginRateLimiter::from_config(&config)),
            catalog,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let admin_routes = Router::new()
        .route("/stats", get(admin_stats))
        .route("/brands", get(admin_list_brands).post(create_brand))
        .route("/brands/{id}", put(update_brand).delete(delete_brand))
        .route(
            "/sub-brands",
            get(admin_list_sub_brands).post(create_sub_brand),
        )
        .route(
            "/sub-brands/{id}",
            put(update_sub_brand).delete(delete_sub_brand),
        )
        .route("/models", get(admin_list_models).post(create_model))
        .route("/models/{id}", put(update_model).delete(delete_model))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route("/login", post(admin_login))
        .route("/logout", post(admin_logout))
        .layer(DefaultBodyLimit::max(body_limit));

    let api_routes = Router::new()
        .route("/search", get(search_catalog))
        .route("/brands", get(list_brands))
        .route("/brands/{brand_slug}", get(brand_page))
        .route("/models/{model_slug}", get(model_by_slug))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.media.root()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.login_limiter.metrics_snapshot(),
    })
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchFailure {
    error: &'static str,
    results: Vec<SearchResult>,
}

async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.unwrap_or_default();
    if search::searchable_query(&query).is_none() {
        return Json(search::search(&query, &[], &[], &[])).into_response();
    }

    let fetched = tokio::try_join!(
        state.catalog.list_brands(),
        state.catalog.list_sub_brands(),
        state.catalog.list_models(),
    );

    match fetched {
        Ok((brands, sub_brands, models)) => {
            let outcome: SearchOutcome = search::search(&query, &brands, &sub_brands, &models);
            tracing::info!(
                query_len = query.trim().chars().count(),
                results = outcome.results.len(),
                "Catalog search"
            );
            Json(outcome).into_response()
        }
        Err(error) => {
            tracing::error!(error = %error, "Catalog search failed to load data");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SearchFailure {
                    error: "Search failed",
                    results: Vec::new(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>, AppError> {
    Ok(Json(state.catalog.list_brands().await?))
}

async fn brand_page(
    State(state): State<AppState>,
    Path(brand_slug): Path<String>,
) -> Result<Json<BrandPage>, AppError> {
    state
        .catalog
        .brand_page(&brand_slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("brand {brand_slug}")))
}

async fn model_by_slug(
    State(state): State<AppState>,
    Path(model_slug): Path<String>,
) -> Result<Json<Model>, AppError> {
    state
        .catalog
        .model_by_slug(&model_slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("model {model_slug}")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn admin_login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let client = client_key(&headers, peer, state.config.trust_proxy_headers);
    state.login_limiter.check(&client).await?;

    let Json(request) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    if !credentials_match(&state.config, &request.email, &request.password) {
        tracing::warn!(client = client_fingerprint(&client), "Rejected admin login");
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let token = state.sessions.issue(&state.config.admin_email)?;
    let cookie = session_cookie(&token, state.sessions.ttl(), state.config.secure_cookies);
    tracing::info!(
        admin = client_fingerprint(&state.config.admin_email),
        client = client_fingerprint(&client),
        "Admin signed in"
    );

    Ok(([(header::SET_COOKIE, cookie)], Json(OkResponse { ok: true })).into_response())
}

async fn admin_logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(state.config.secure_cookies);
    ([(header::SET_COOKIE, cookie)], Json(OkResponse { ok: true })).into_response()
}

async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_session_token(request.headers())?;
    let session = state.sessions.verify(token)?;
    tracing::debug!(
        admin = client_fingerprint(&session.email),
        method = %request.method(),
        path = request.uri().path(),
        "Admin request"
    );
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<CatalogStats>, AppError> {
    Ok(Json(state.catalog.stats().await?))
}

/// Record which admin changed what; the identity is logged as a fingerprint.
fn audit(session: &AdminSession, action: &'static str, entity: &'static str, id: &impl Display) {
    tracing::info!(
        admin = client_fingerprint(&session.email),
        action,
        entity,
        id = %id,
        "Admin change"
    );
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    ok: bool,
    id: String,
}

impl DeletedResponse {
    fn new(id: impl ToString) -> Json<Self> {
        Json(Self {
            ok: true,
            id: id.to_string(),
        })
    }
}

fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid {kind} id")))
}

async fn read_upload(field: Field<'_>) -> Result<Option<Upload>, AppError> {
    let file_name = field
        .file_name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;

    // Browsers submit an empty part for a file input left blank.
    if bytes.is_empty() && file_name.is_none() {
        return Ok(None);
    }
    Ok(Some(Upload {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

// Brands

#[derive(Debug, Default)]
struct BrandForm {
    name: String,
    logo: Option<Upload>,
    remove_logo: bool,
}

async fn read_brand_form(mut multipart: Multipart) -> Result<BrandForm, AppError> {
    let mut form = BrandForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = field.text().await?,
            "logo" => form.logo = read_upload(field).await?,
            "removeLogo" => form.remove_logo = parse_flag(&field.text().await?),
            _ => {}
        }
    }

    if form.name.trim().is_empty() {
        return Err(AppError::bad_request("Brand name is required"));
    }
    Ok(form)
}

async fn admin_list_brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>, AppError> {
    Ok(Json(state.catalog.list_brands().await?))
}

async fn create_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Brand>), AppError> {
    let form = read_brand_form(multipart).await?;
    let logo = match &form.logo {
        Some(upload) => Some(state.media.store(MediaFolder::Brands, upload).await?),
        None => None,
    };

    match state.catalog.create_brand(&form.name, logo.as_deref()).await {
        Ok(brand) => {
            audit(&session, "create", "brand", &brand.id);
            Ok((StatusCode::CREATED, Json(brand)))
        }
        Err(error) => {
            if let Some(url) = &logo {
                state.media.remove(url).await;
            }
            Err(error.into())
        }
    }
}

async fn update_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Brand>, AppError> {
    let id: BrandId = parse_id(&id, "brand")?;
    let existing = state
        .catalog
        .get_brand(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("brand {id}")))?;
    let form = read_brand_form(multipart).await?;

    let uploaded = match &form.logo {
        Some(upload) => Some(state.media.store(MediaFolder::Brands, upload).await?),
        None => None,
    };
    let logo = match (&uploaded, form.remove_logo) {
        (Some(url), _) => Some(url.clone()),
        (None, true) => None,
        (None, false) => existing.logo.clone(),
    };

    match state
        .catalog
        .update_brand(&id, &form.name, logo.as_deref())
        .await
    {
        Ok(brand) => {
            if let Some(old) = existing.logo.filter(|old| brand.logo.as_ref() != Some(old)) {
                state.media.remove(&old).await;
            }
            audit(&session, "update", "brand", &brand.id);
            Ok(Json(brand))
        }
        Err(error) => {
            if let Some(url) = &uploaded {
                state.media.remove(url).await;
            }
            Err(error.into())
        }
    }
}

async fn delete_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id: BrandId = parse_id(&id, "brand")?;
    let brand = state.catalog.delete_brand(&id).await?;
    if let Some(logo) = &brand.logo {
        state.media.remove(logo).await;
    }
    audit(&session, "delete", "brand", &brand.id);
    Ok(DeletedResponse::new(brand.id))
}

// Sub-brands

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubBrandRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    brand_id: String,
}

impl SubBrandRequest {
    fn from_payload(
        payload: Result<Json<Self>, JsonRejection>,
    ) -> Result<(String, BrandId), AppError> {
        let Json(request) =
            payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        if request.name.trim().is_empty() {
            return Err(AppError::bad_request("Sub-brand name is required"));
        }
        if request.brand_id.trim().is_empty() {
            return Err(AppError::bad_request("brandId is required"));
        }
        let brand_id = parse_id(&request.brand_id, "brand")?;
        Ok((request.name, brand_id))
    }
}

async fn admin_list_sub_brands(
    State(state): State<AppState>,
) -> Result<Json<Vec<SubBrand>>, AppError> {
    Ok(Json(state.catalog.list_sub_brands().await?))
}

async fn create_sub_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    payload: Result<Json<SubBrandRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubBrand>), AppError> {
    let (name, brand_id) = SubBrandRequest::from_payload(payload)?;
    let sub_brand = state.catalog.create_sub_brand(&name, &brand_id).await?;
    audit(&session, "create", "sub_brand", &sub_brand.id);
    Ok((StatusCode::CREATED, Json(sub_brand)))
}

async fn update_sub_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
    payload: Result<Json<SubBrandRequest>, JsonRejection>,
) -> Result<Json<SubBrand>, AppError> {
    let id: SubBrandId = parse_id(&id, "sub-brand")?;
    let (name, brand_id) = SubBrandRequest::from_payload(payload)?;
    let sub_brand = state.catalog.update_sub_brand(&id, &name, &brand_id).await?;
    audit(&session, "update", "sub_brand", &sub_brand.id);
    Ok(Json(sub_brand))
}

async fn delete_sub_brand(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id: SubBrandId = parse_id(&id, "sub-brand")?;
    let sub_brand = state.catalog.delete_sub_brand(&id).await?;
    audit(&session, "delete", "sub_brand", &sub_brand.id);
    Ok(DeletedResponse::new(sub_brand.id))
}

// Models

#[derive(Debug, Default)]
struct ModelForm {
    name: String,
    description: Option<String>,
    sub_brand_id: String,
    images: Vec<Upload>,
    images_to_remove: Vec<String>,
}

async fn read_model_form(mut multipart: Multipart) -> Result<ModelForm, AppError> {
    let mut form = ModelForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = field.text().await?,
            "description" => form.description = Some(field.text().await?),
            "subBrandId" => form.sub_brand_id = field.text().await?,
            "images" => {
                if let Some(upload) = read_upload(field).await? {
                    if form.images.len() >= MAX_FILES_PER_REQUEST {
                        return Err(AppError::bad_request(format!(
                            "At most {MAX_FILES_PER_REQUEST} images can be uploaded at once"
                        )));
                    }
                    form.images.push(upload);
                }
            }
            "imagesToRemove" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    form.images_to_remove = serde_json::from_str(&raw).map_err(|_| {
                        AppError::bad_request("imagesToRemove must be a JSON array of URLs")
                    })?;
                }
            }
            _ => {}
        }
    }

    if form.name.trim().is_empty() {
        return Err(AppError::bad_request("Model name is required"));
    }
    if form.sub_brand_id.trim().is_empty() {
        return Err(AppError::bad_request("subBrandId is required"));
    }
    Ok(form)
}

impl ModelForm {
    /// Validate every upload before any of them is written.
    fn validate_uploads(&self, media: &MediaStore) -> Result<(), AppError> {
        for upload in &self.images {
            media.validate(upload)?;
        }
        Ok(())
    }
}

async fn store_images(media: &MediaStore, uploads: &[Upload]) -> Result<Vec<String>, AppError> {
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match media.store(MediaFolder::Models, upload).await {
            Ok(url) => stored.push(url),
            Err(error) => {
                media.remove_all(&stored).await;
                return Err(error);
            }
        }
    }
    Ok(stored)
}

async fn admin_list_models(State(state): State<AppState>) -> Result<Json<Vec<Model>>, AppError> {
    Ok(Json(state.catalog.list_models().await?))
}

async fn create_model(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Model>), AppError> {
    let form = read_model_form(multipart).await?;
    let sub_brand_id: SubBrandId = parse_id(&form.sub_brand_id, "sub-brand")?;
    form.validate_uploads(&state.media)?;

    let images = store_images(&state.media, &form.images).await?;
    let draft = ModelDraft {
        name: form.name,
        description: form.description,
        sub_brand_id,
        images: images.clone(),
    };

    match state.catalog.create_model(draft).await {
        Ok(model) => {
            audit(&session, "create", "model", &model.id);
            Ok((StatusCode::CREATED, Json(model)))
        }
        Err(error) => {
            state.media.remove_all(&images).await;
            Err(error.into())
        }
    }
}

async fn update_model(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Model>, AppError> {
    let id: ModelId = parse_id(&id, "model")?;
    let existing = state
        .catalog
        .get_model(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("model {id}")))?;
    let form = read_model_form(multipart).await?;
    let sub_brand_id: SubBrandId = parse_id(&form.sub_brand_id, "sub-brand")?;
    form.validate_uploads(&state.media)?;

    let (removed, mut images): (Vec<String>, Vec<String>) = existing
        .images
        .into_iter()
        .partition(|url| form.images_to_remove.contains(url));
    let uploaded = store_images(&state.media, &form.images).await?;
    images.extend(uploaded.iter().cloned());

    let draft = ModelDraft {
        name: form.name,
        description: form.description,
        sub_brand_id,
        images,
    };

    match state.catalog.update_model(&id, draft).await {
        Ok(model) => {
            state.media.remove_all(&removed).await;
            audit(&session, "update", "model", &model.id);
            Ok(Json(model))
        }
        Err(error) => {
            state.media.remove_all(&uploaded).await;
            Err(error.into())
        }
    }
}

async fn delete_model(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id: ModelId = parse_id(&id, "model")?;
    let model = state.catalog.delete_model(&id).await?;
    state.media.remove_all(&model.images).await;
    audit(&session, "delete", "model", &model.id);
    Ok(DeletedResponse::new(model.id))
}
