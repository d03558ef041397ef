use super::*;
use axum::{body, body::Body, http::Request};
use futures::StreamExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn test_app(assets_dir: PathBuf) -> (Router, Arc<AppState>) {
    let (events, _) = broadcast::channel(32);
    let state = Arc::new(AppState {
        events,
        mounts: MountTable::default(),
    });
    (build_router(Arc::clone(&state), assets_dir), state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _) = test_app(PathBuf::from("assets"));
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn root_redirects_to_preview_page_served_from_assets() {
    let assets = tempfile::tempdir().expect("temp dir");
    std::fs::create_dir_all(assets.path().join("live2d")).expect("mkdir");
    std::fs::write(assets.path().join("live2d/index.html"), "<html></html>").expect("write");
    let (app, _) = test_app(assets.path().to_path_buf());

    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).expect("location"),
        INDEX_PAGE
    );

    let response = app
        .oneshot(Request::get(INDEX_PAGE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn commands_are_broadcast_to_subscribers() {
    let (app, state) = test_app(PathBuf::from("assets"));
    let mut previewer = state.events.subscribe();

    let response = app
        .oneshot(post_json(
            "/api/commands",
            serde_json::json!({ "type": "playMotion", "motion": { "motion": "Tap", "index": 1 } }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: BroadcastResponse = body_json(response).await;
    assert_eq!(dto.delivered, 1);

    let command = previewer.recv().await.expect("command");
    assert_eq!(command.name(), "playMotion");
}

#[tokio::test]
async fn command_without_previewers_reaches_nobody() {
    let (app, _) = test_app(PathBuf::from("assets"));
    let response = app
        .oneshot(post_json("/api/commands", serde_json::json!({ "type": "clearModel" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: BroadcastResponse = body_json(response).await;
    assert_eq!(dto.delivered, 0);
}

#[tokio::test]
async fn invalid_commands_are_rejected() {
    let (app, _) = test_app(PathBuf::from("assets"));
    for body in [
        serde_json::json!({ "type": "setBackground" }),
        serde_json::json!({ "type": "loadModel" }),
        serde_json::json!({ "type": "setExpression" }),
        serde_json::json!({ "expression": "f01" }),
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/api/commands", body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = body_json(response).await;
        assert_eq!(err.code, ErrorCode::Validation);
    }
}

#[tokio::test]
async fn mounted_directory_serves_model_files() {
    let model_dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        model_dir.path().join("hiyori.model3.json"),
        r#"{"Version":3}"#,
    )
    .expect("write");
    let (app, _) = test_app(PathBuf::from("assets"));

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/models/mount",
            serde_json::json!({ "dir": model_dir.path().to_string_lossy() }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let mounted: MountResponse = body_json(response).await;

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("{}/hiyori.model3.json", mounted.base_path))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "application/json"
    );

    let response = app
        .oneshot(
            Request::get(format!("{}/missing.png", mounted.base_path))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mounting_missing_directory_is_bad_request() {
    let (app, _) = test_app(PathBuf::from("assets"));
    let response = app
        .oneshot(post_json(
            "/api/models/mount",
            serde_json::json!({ "dir": "/definitely/not/here" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connected_previewer_receives_posted_commands() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (app, state) = test_app(PathBuf::from("assets"));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{CONTROL_PATH}"))
        .await
        .expect("connect");

    // The subscription is made on upgrade; wait until the server sees the previewer.
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while state.events.receiver_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("previewer registered");

    let delivered = state
        .events
        .send(ControlCommand::load("/model/ab12cd34/hiyori.model3.json"))
        .expect("send");
    assert_eq!(delivered, 1);

    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
        .await
        .expect("frame in time")
        .expect("stream open")
        .expect("frame");
    let text = frame.into_text().expect("text frame");
    let command: ControlCommand = serde_json::from_str(&text).expect("command");
    assert_eq!(command.locator(), Some("/model/ab12cd34/hiyori.model3.json"));
}
