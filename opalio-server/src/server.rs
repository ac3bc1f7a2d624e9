use crate::config::Config;
use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use opalio_core::{
    BlobStore, ContentFilter, MetadataStore, OpalError, ReadBlobOperation,
    ReadBlobOperationRequest, RegisterBlobOperation, RegisterBlobOperationRequest, ReplicaClient,
    UploadBlobOperation, UploadBlobOperationRequest, validate_digest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    register_op: RegisterBlobOperation,
    upload_op: UploadBlobOperation,
    read_op: ReadBlobOperation,
    public_url: String,
    get_url_expire: u64,
}

impl ServerState {
    fn get_url(&self, blob_id: &str) -> String {
        let expires = chrono::Utc::now().timestamp() as u64 + self.get_url_expire;
        format!("{}/get/{}?Expires={}", self.public_url, blob_id, expires)
    }
}

struct ApiError(OpalError);

impl From<OpalError> for ApiError {
    fn from(error: OpalError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OpalError::NotFound(_) => StatusCode::NOT_FOUND,
            OpalError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OpalError::HashMismatch { .. } => StatusCode::FORBIDDEN,
            OpalError::Forbidden(_) | OpalError::ReplicaFailed(_) => StatusCode::BAD_GATEWAY,
            OpalError::ContentUploaded(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "status": "error",
            "errors": [self.0.to_string()],
        }));
        (status, body).into_response()
    }
}

pub async fn run_server(config: Config) -> opalio_core::Result<()> {
    let store_config = config.store_config()?;

    let metadata_store = Arc::new(MetadataStore::new(&store_config));
    let blob_store = Arc::new(BlobStore::new(&store_config.save_root)?);
    let filter = Arc::new(ContentFilter::new(store_config.forbidden.clone()));
    let replicas = ReplicaClient::from_config(&store_config)?.map(Arc::new);
    if replicas.is_some() {
        tracing::info!(
            "Replication enabled, required={}",
            store_config.require_replica_upload
        );
    }

    let state = Arc::new(ServerState {
        register_op: RegisterBlobOperation::new(
            metadata_store.clone(),
            filter.clone(),
            &store_config,
        ),
        upload_op: UploadBlobOperation::new(
            metadata_store.clone(),
            blob_store.clone(),
            filter.clone(),
            replicas,
            &store_config,
        ),
        read_op: ReadBlobOperation::new(metadata_store, blob_store, filter, &store_config),
        public_url: config.server.public_url.trim_end_matches('/').to_string(),
        get_url_expire: config.server.get_url_expire,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/upload", post(upload_handler))
        .route("/upload/:blob_id", post(upload_existing_handler))
        .route("/get/:blob_id", get(get_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("Server listening on {}", config.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    hash: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    upload_url: String,
}

async fn register_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    validate_digest(&request.hash)?;
    let result = state.register_op.run(RegisterBlobOperationRequest {
        digest: request.hash.to_ascii_lowercase(),
    })?;
    let body = Json(RegisterResponse {
        upload_url: format!("{}/upload/{}", state.public_url, result.blob_id),
    });
    Ok((StatusCode::CREATED, body).into_response())
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    get_url: String,
    hash: String,
}

async fn upload_handler(
    State(state): State<Arc<ServerState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    upload_inner(state, None, multipart).await
}

async fn upload_existing_handler(
    State(state): State<Arc<ServerState>>,
    Path(blob_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    upload_inner(state, Some(blob_id), multipart).await
}

async fn upload_inner(
    state: Arc<ServerState>,
    blob_id: Option<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OpalError::InvalidRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("file").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| OpalError::InvalidRequest(e.to_string()))?;
            file = Some((filename, content_type, body));
        }
    }
    let Some((filename, content_type, body)) = file else {
        return Err(OpalError::InvalidRequest("multipart field 'file' is required".to_string()).into());
    };

    let result = state
        .upload_op
        .run(UploadBlobOperationRequest {
            filename,
            content_type,
            body,
            blob_id,
        })
        .await?;

    Ok(Json(UploadResponse {
        get_url: state.get_url(&result.blob_id),
        hash: result.digest,
    }))
}

async fn get_handler(
    State(state): State<Arc<ServerState>>,
    Path(blob_id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state.read_op.run(ReadBlobOperationRequest { blob_id })?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Accel-Redirect", header_value(&result.location)?);
    if let Some(disposition) = &result.content_disposition {
        headers.insert(header::CONTENT_DISPOSITION, header_value(disposition)?);
    }
    Ok((StatusCode::OK, headers, "").into_response())
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    value
        .parse()
        .map_err(|_| OpalError::Internal(format!("header value not representable: {}", value)).into())
}
