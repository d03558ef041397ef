use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State, WebSocketUpgrade},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{BroadcastResponse, ControlCommand, MountRequest, MountResponse, CONTROL_PATH},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

mod config;
mod mounts;

use config::load_settings;
use mounts::MountTable;

const INDEX_PAGE: &str = "/static/live2d/index.html";

struct AppState {
    events: broadcast::Sender<ControlCommand>,
    mounts: MountTable,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    if !settings.assets_dir.is_dir() {
        warn!(assets_dir = %settings.assets_dir.display(), "assets directory not found; /static will 404");
    }
    let (events, _) = broadcast::channel(256);
    let state = AppState {
        events,
        mounts: MountTable::default(),
    };
    let app = build_router(Arc::new(state), settings.assets_dir);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "preview server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, assets_dir: PathBuf) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route(CONTROL_PATH, get(ws_handler))
        .route("/api/commands", post(post_command))
        .route("/api/models/mount", post(mount_model))
        .route("/model/:mount_id/*path", get(model_file))
        .nest_service("/static", ServeDir::new(assets_dir))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index() -> Redirect {
    Redirect::temporary(INDEX_PAGE)
}

async fn post_command(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<BroadcastResponse>> {
    let command = serde_json::from_slice::<ControlCommand>(&body)
        .map_err(|e| bad_request(format!("invalid command: {e}")))?;
    match &command {
        ControlCommand::Unknown => return Err(bad_request("unknown command type")),
        ControlCommand::LoadModel { .. } if command.locator().is_none() => {
            return Err(bad_request("loadModel requires modelUrl or modelPath"))
        }
        _ => {}
    }

    // No connected previewer is not an error; the command simply reaches nobody.
    let delivered = state.events.send(command.clone()).unwrap_or(0);
    info!(command = command.name(), delivered, "command broadcast");
    Ok(Json(BroadcastResponse { delivered }))
}

async fn mount_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MountRequest>,
) -> ApiResult<Json<MountResponse>> {
    let base_path = state.mounts.mount(&req.dir).map_err(|e| {
        let status = match e.code {
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ApiError::from(e)))
    })?;
    info!(dir = %req.dir, %base_path, "model directory mounted");
    Ok(Json(MountResponse { base_path }))
}

async fn model_file(
    State(state): State<Arc<AppState>>,
    Path((mount_id, path)): Path<(String, String)>,
) -> ApiResult<Response> {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "file not found")),
        )
    };
    let file = state.mounts.resolve(&mount_id, &path).ok_or_else(not_found)?;
    let bytes = tokio::fs::read(&file).await.map_err(|_| not_found())?;

    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut commands = BroadcastStream::new(state.events.subscribe());
    info!("previewer connected");

    let send_task = tokio::spawn(async move {
        while let Some(next) = commands.next().await {
            let command = match next {
                Ok(command) => command,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "previewer fell behind; commands dropped");
                    continue;
                }
            };
            let text = match serde_json::to_string(&command) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            debug!(len = text.len(), "ignoring message from previewer");
        }
    }

    send_task.abort();
    info!("previewer disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
