//! HTTP API Server
//!
//! REST API for registration, login, uploads and listings.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use super::auth::{require_bearer, AuthUser};
use crate::advisor::FolderAdvisor;
use crate::auth::{hash_password, verify_password, TokenIssuer};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::namespace::{FileEntry, Namespace, UserId};
use crate::users::{UserProfile, UserStore};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared application state
pub struct AppState {
    /// Per-user key space
    pub namespace: Arc<Namespace>,
    /// Registered users
    pub users: Arc<UserStore>,
    /// Bearer token issuer
    pub tokens: TokenIssuer,
    /// Optional folder advisor
    pub advisor: Option<FolderAdvisor>,
}

/// HTTP API server
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), &self.config)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/uploads", post(handle_upload))
        .route("/uploads/", post(handle_upload))
        .route("/listFiles", post(handle_list_files))
        .route("/listFiles/", post(handle_list_files))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_bearer,
        ));

    let api = Router::new()
        .route("/auth/register", post(handle_register))
        .route("/auth/login", post(handle_login))
        .merge(protected);

    let router = Router::new()
        .nest("/api", api)
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors_enabled {
        router.layer(cors_layer(&config.cors_origins))
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

// ============ Request/Response Types ============

/// Registration request
#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registration response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Login request
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Upload response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_folder: Option<String>,
}

/// Listing response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    pub user_folder: String,
    pub entries: Vec<FileEntry>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Set when repeating the whole request may succeed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let retryable = self.is_retryable();
        if retryable {
            warn!("Request failed, safe to retry: {}", self);
        } else if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: self.code().to_string(),
                retryable,
            }),
        )
            .into_response()
    }
}

// ============ Handlers ============

async fn handle_register(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let Json(req) = payload.map_err(|e| Error::InvalidInput(e.body_text()))?;

    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(Error::InvalidInput("name, email and password are required".into()));
    }
    if !email.contains('@') {
        return Err(Error::InvalidInput("email address is malformed".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = state.users.create(name, email, &hash).await?;
    info!("Registered user {}", user.id);

    // The account exists even if the marker cannot be written
    match UserId::parse(user.id.as_str()) {
        Ok(id) => {
            if let Err(e) = state.namespace.create_root(&id).await {
                warn!("Failed to create namespace root for {}: {}", user.id, e);
            }
        }
        Err(e) => warn!("Registered id {} is not a valid namespace: {}", user.id, e),
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: UserProfile::from(&user),
        }),
    ))
}

async fn handle_login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(req) = payload.map_err(|e| Error::InvalidInput(e.body_text()))?;

    let invalid = || Error::InvalidInput("Invalid credentials".into());

    let user = state.users.find_by_email(&req.email).await?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let id = UserId::parse(user.id.as_str())?;
    let token = state.tokens.issue(&id)?;
    debug!("Issued token for {}", id);

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

/// File part pulled out of a multipart upload
struct UploadedFile {
    name: String,
    content_type: String,
    body: Bytes,
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut file: Option<UploadedFile> = None;
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(Error::InvalidInput("upload carries more than one file".into()));
                }
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read file: {}", e)))?;
                file = Some(UploadedFile {
                    name,
                    content_type,
                    body,
                });
            }
            "description" => {
                description = field
                    .text()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read description: {}", e)))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| Error::InvalidInput("No file uploaded".into()))?;

    let key = state
        .namespace
        .upload(&user, &file.name, file.body, &file.content_type)
        .await?;

    let suggested_folder = match &state.advisor {
        Some(advisor) => {
            let entries = match state.namespace.list(&user).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Listing for folder advice failed: {}", e);
                    Vec::new()
                }
            };
            Some(advisor.suggest(&file.name, &description, &entries).await)
        }
        None => None,
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: key.into_string(),
            suggested_folder,
        }),
    ))
}

async fn handle_list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ListFilesResponse>> {
    let entries = state.namespace.list(&user).await?;

    Ok(Json(ListFilesResponse {
        user_folder: user.as_str().to_string(),
        entries,
    }))
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: crate::VERSION.to_string(),
    })
}
