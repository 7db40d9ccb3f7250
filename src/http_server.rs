use crate::config::Config;
use crate::error::ApiError;
use crate::provider::{CallbackSetup, ProviderClient, ProviderError, ProviderResponse};
use crate::store::EventLogStore;
use crate::types::{EventLog, EventSetupRequest, MessageRequest};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub events: Arc<EventLogStore>,
    pub provider: ProviderClient,
}

impl AppState {
    pub fn new(config: Config, data_dir: PathBuf) -> Result<Self, ProviderError> {
        let config = Arc::new(config);
        let events = Arc::new(EventLogStore::new(data_dir, config.max_events));
        let provider = ProviderClient::new(Arc::clone(&config))?;
        Ok(Self {
            config,
            events,
            provider,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiKeyQuery {
    apikey: Option<String>,
}

impl ApiKeyQuery {
    fn into_api_key(self) -> Result<String, ApiError> {
        self.apikey
            .filter(|key| !key.is_empty())
            .ok_or(ApiError::MissingApiKey)
    }
}

/// Build the full application. Unmatched paths are served from `public_dir`.
/// `HEAD` is rejected explicitly since `get` would otherwise answer it.
pub fn router(state: AppState, public_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route(
            "/config",
            get(get_config)
                .head(unsupported_method)
                .fallback(unsupported_method),
        )
        .route(
            "/events",
            get(list_events_by_query)
                .head(unsupported_method)
                .post(append_event_by_query)
                .fallback(unsupported_method),
        )
        .route(
            "/apikey/{api_key}/events",
            get(list_events_by_path)
                .head(unsupported_method)
                .post(append_event_by_path)
                .fallback(unsupported_method),
        )
        .route(
            "/events/setup",
            post(setup_event_callback).fallback(unsupported_method),
        )
        .route("/messages", post(send_message).fallback(unsupported_method))
        .fallback_service(ServeDir::new(public_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();
    info!("Server started: http://localhost:{port}");
    axum::serve(listener, app).await
}

async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}

async fn list_events_by_query(
    State(state): State<AppState>,
    Query(query): Query<ApiKeyQuery>,
) -> Result<Response, ApiError> {
    let api_key = query.into_api_key()?;
    record_or_list(state.events, api_key, None).await
}

async fn append_event_by_query(
    State(state): State<AppState>,
    Query(query): Query<ApiKeyQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let api_key = query.into_api_key()?;
    record_or_list(state.events, api_key, Some(body)).await
}

async fn list_events_by_path(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
) -> Result<Response, ApiError> {
    record_or_list(state.events, api_key, None).await
}

async fn append_event_by_path(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    record_or_list(state.events, api_key, Some(body)).await
}

/// Append `body` when present, then answer with the key's whole log.
/// Store I/O is blocking, so it runs off the async workers.
async fn record_or_list(
    store: Arc<EventLogStore>,
    api_key: String,
    body: Option<Bytes>,
) -> Result<Response, ApiError> {
    let events: EventLog = tokio::task::spawn_blocking(move || match body {
        Some(body) => {
            info!(
                api_key = %api_key,
                payload = %String::from_utf8_lossy(&body),
                "New event payload received"
            );
            store.append(&api_key, &body)
        }
        None => store.list(&api_key),
    })
    .await??;

    Ok(([(header::CACHE_CONTROL, "no-cache")], Json(events)).into_response())
}

async fn send_message(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    info!(payload = %String::from_utf8_lossy(&body), "New message payload received");

    let request: MessageRequest = serde_json::from_slice(&body).unwrap_or_default();
    let (credentials, message) = request.into_send_payload()?;

    let response = state
        .provider
        .send_message(&credentials, &message)
        .await
        .map_err(ApiError::SendFailed)?;
    Ok(provider_response(response))
}

async fn setup_event_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    info!(payload = %String::from_utf8_lossy(&body), "New event setup payload received");

    let request: EventSetupRequest = serde_json::from_slice(&body).unwrap_or_default();
    let (credentials, payload) = request.into_callback_payload()?;

    match state
        .provider
        .setup_event_callback(&credentials, &payload)
        .await
        .map_err(ApiError::SetupFailed)?
    {
        CallbackSetup::Unauthorized => Err(ApiError::Unauthorized),
        CallbackSetup::Created(response) | CallbackSetup::Updated(response) => {
            Ok(provider_response(response))
        }
    }
}

async fn unsupported_method(method: Method) -> ApiError {
    ApiError::UnsupportedMethod(method)
}

fn provider_response(response: ProviderResponse) -> Response {
    (
        response.status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        response.body,
    )
        .into_response()
}
