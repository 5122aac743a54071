use super::*;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

/// Envelope shared by every read endpoint.
#[derive(Debug, Serialize)]
pub(super) struct ApiResponse<T: Serialize> {
    pub(super) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug)]
pub(super) enum ApiError {
    Unauthorized(AuthError),
    BadTagId(String),
    TagNotFound,
    Store(&'static str, StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(AuthError::MissingHeader) => (
                StatusCode::UNAUTHORIZED,
                "Authorization header is required".to_string(),
            ),
            ApiError::Unauthorized(err) => {
                warn!("api auth rejected: {}", err);
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid authentication data".to_string(),
                )
            }
            ApiError::BadTagId(raw) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid tag ID format: '{}'", raw),
            ),
            ApiError::TagNotFound => (
                StatusCode::NOT_FOUND,
                "Tag not found or you don't have access to it".to_string(),
            ),
            ApiError::Store(context, err) => {
                error!("api store failure ({}): {}", context, err);
                (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
            }
        };
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

pub(super) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/user/tags", get(user_tags))
        .route("/api/user/tags/{tag_id}/messages", get(tag_messages))
        .layer(cors)
        .with_state(state)
}

pub(super) fn start_api_server(bind: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        if let Err(err) = serve_api(bind, state).await {
            error!("read api stopped: {:#}", err);
        }
    });
}

async fn serve_api(bind: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind read api on {}", bind))?;
    info!("read api listening on {}", bind);
    axum::serve(listener, router(state))
        .await
        .context("serve read api")?;
    Ok(())
}

/// GET /api/health
pub(super) async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// GET /api/user/tags
pub(super) async fn user_tags(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<TagWithCount>>>, ApiError> {
    let telegram_id = authenticate(&state, &headers)?;
    let tags = match state
        .store
        .find_user_id(telegram_id)
        .map_err(|err| ApiError::Store("Failed to fetch user tags", err))?
    {
        Some(user_id) => state
            .store
            .list_tags_with_counts(user_id)
            .map_err(|err| ApiError::Store("Failed to fetch user tags", err))?,
        // Never talked to the bot yet.
        None => Vec::new(),
    };
    Ok(Json(ApiResponse::ok(tags)))
}

/// GET /api/user/tags/{tag_id}/messages
pub(super) async fn tag_messages(
    State(state): State<Arc<AppState>>,
    UrlPath(raw_tag_id): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<MessageSummary>>>, ApiError> {
    let telegram_id = authenticate(&state, &headers)?;
    let tag_id: i64 = raw_tag_id
        .parse()
        .map_err(|_| ApiError::BadTagId(raw_tag_id.clone()))?;

    let user_id = state
        .store
        .find_user_id(telegram_id)
        .map_err(|err| ApiError::Store("Failed to fetch messages for tag", err))?
        .ok_or(ApiError::TagNotFound)?;

    match state.store.list_messages_for_tag(user_id, tag_id) {
        Ok(messages) => {
            info!(
                "api: {} messages for user {}, tag {}",
                messages.len(),
                user_id,
                tag_id
            );
            Ok(Json(ApiResponse::ok(messages)))
        }
        Err(StoreError::NotFoundOrForbidden) => Err(ApiError::TagNotFound),
        Err(err) => Err(ApiError::Store("Failed to fetch messages for tag", err)),
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<i64, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let init_data = init_data_from_header(header).map_err(ApiError::Unauthorized)?;
    let user = validate_init_data(init_data, &state.config.token).map_err(ApiError::Unauthorized)?;
    Ok(user.id)
}
