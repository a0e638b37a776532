//! End-to-end review flow against an in-process contract service and
//! review stream.
//!
//! The REST side is a small axum router speaking the `{code, message, data}`
//! envelope; the stream side is a raw tokio-tungstenite server that replays
//! a scripted list of frames per contract id and then waits for the client
//! to close.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cra_client::{
    ClientContext, DocMode, LoadState, MemoryNotifier, NoticeLevel, ReviewController, RunExit,
    SessionEvent, SocketState,
};
use cra_core::ClientConfig;
use cra_graph::GraphCache;
use cra_layout::ApproxTextMeasure;
use cra_pipeline::{PipelineRunState, StageEvent, StageStatus, KG_BUILD, OCR};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

const TOKEN: &str = "secret";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn get_contract(Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
    if !authorized(&headers) {
        return Json(json!({"code": 401, "message": "Unauthorized", "data": null}));
    }
    match id.as_str() {
        "404" => Json(json!({"code": 404, "message": "Contract not found", "data": null})),
        _ => Json(json!({
            "code": 200,
            "message": "ok",
            "data": {"id": id.parse::<i64>().unwrap_or(0), "contractName": "Supply Agreement", "status": 1}
        })),
    }
}

async fn get_content(Path(id): Path<String>) -> Json<Value> {
    match id.as_str() {
        "42" => Json(json!({"code": 200, "message": "ok", "data": "initial text"})),
        _ => Json(json!({"code": 500, "message": "no content", "data": null})),
    }
}

async fn get_file(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "7" => (StatusCode::NOT_FOUND, Vec::new()),
        _ => (StatusCode::OK, b"%PDF-1.7 test".to_vec()),
    }
}

async fn start_review(Json(contract): Json<Value>) -> Json<Value> {
    match contract["id"].as_i64() {
        Some(42) => Json(json!({"code": 200, "message": "ok", "data": contract})),
        _ => Json(json!({"code": 500, "message": "agent unavailable", "data": null})),
    }
}

async fn spawn_service() -> SocketAddr {
    let app = Router::new()
        .route("/api/contracts/agent/review", post(start_review))
        .route("/api/contracts/{id}", get(get_contract))
        .route("/api/contracts/{id}/content", get(get_content))
        .route("/api/contracts/{id}/file", get(get_file));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn frame(step: &str, status: &str, data: Value) -> String {
    json!({"step": step, "status": status, "data": data, "timestamp": 1_700_000_000_000i64}).to_string()
}

fn scripts() -> HashMap<String, Vec<String>> {
    let mut scripts = HashMap::new();
    scripts.insert(
        "42".to_string(),
        vec![
            frame("CONNECTION", "CONNECTED", Value::Null),
            frame("REVIEW_START", "PROCESSING", Value::Null),
            frame("OCR", "PROCESSING", Value::Null),
            "{this is not json".to_string(),
            frame("OCR", "COMPLETED", json!("# Title")),
            frame("KG_BUILD", "PROCESSING", Value::Null),
            frame(
                "KG_BUILD",
                "COMPLETED",
                json!({"edges": [["A", "B", {"relationship": "party_to"}]]}),
            ),
            frame("REVIEW_ALL", "COMPLETED", Value::Null),
        ],
    );
    scripts.insert(
        "7".to_string(),
        vec![
            frame("KG_BUILD", "COMPLETED", Value::Null),
            frame("KG_BUILD", "COMPLETED", json!({"edges": "broken"})),
            frame("REVIEW_ALL", "FAILED", Value::Null),
        ],
    );
    scripts
}

/// Serves the scripted frames; reports the contract id of every session the
/// client ends with a Close frame.
async fn spawn_stream() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let scripts = Arc::new(scripts());
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let scripts = scripts.clone();
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut path = String::new();
                let ws = tokio_tungstenite::accept_hdr_async(tcp, |req: &Request, resp: Response| {
                    path = req.uri().path().to_string();
                    Ok(resp)
                })
                .await;
                let Ok(mut ws) = ws else { return };
                let id = path.rsplit('/').next().unwrap_or_default().to_string();
                for text in scripts.get(&id).cloned().unwrap_or_default() {
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                // Hold the socket open until the client leaves.
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        let _ = closed_tx.send(id);
                        break;
                    }
                }
            });
        }
    });
    (addr, closed_rx)
}

struct Harness {
    controller: ReviewController,
    notifier: Arc<MemoryNotifier>,
    cache_dir: tempfile::TempDir,
    closed_sessions: mpsc::UnboundedReceiver<String>,
}

async fn harness() -> Harness {
    let service = spawn_service().await;
    let (stream, closed_sessions) = spawn_stream().await;
    let cache_dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        service_url: format!("http://{}/api/contracts", service),
        stream_url: format!("ws://{}/ws/review", stream),
        cache_dir: cache_dir.path().to_path_buf(),
        token: Some(TOKEN.into()),
        request_timeout_secs: 5,
    };
    let notifier = Arc::new(MemoryNotifier::default());
    let ctx = Arc::new(ClientContext::new(config, notifier.clone()).unwrap());
    Harness {
        controller: ReviewController::new(ctx),
        notifier,
        cache_dir,
        closed_sessions,
    }
}

async fn next_stage(controller: &mut ReviewController) -> StageEvent {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), controller.step())
            .await
            .expect("timed out waiting for the review stream")
            .expect("channel closed");
        if let SessionEvent::Stage(event) = message.event {
            return event;
        }
    }
}

#[tokio::test]
async fn test_stage_stream_drives_state_document_and_graph() {
    let Harness {
        mut controller,
        notifier,
        cache_dir,
        ..
    } = harness().await;
    controller.open("42");
    assert!(controller.load().await);

    let view = controller.view();
    assert_eq!(view.load_state(), &LoadState::Ready);
    assert_eq!(view.contract().unwrap().contract_name.as_deref(), Some("Supply Agreement"));
    assert_eq!(view.document_text(), "initial text");
    assert_eq!(view.doc_mode(), DocMode::Pdf);
    assert!(view.document().unwrap().path().unwrap().exists());
    assert!(view.frame(&ApproxTextMeasure).is_placeholder());

    // Handshake, then the run start.
    let handshake = next_stage(&mut controller).await;
    assert_eq!(handshake.status, StageStatus::Other("CONNECTED".into()));
    assert_eq!(controller.view().pipeline().active_stage_index, None);
    next_stage(&mut controller).await;

    let ocr = next_stage(&mut controller).await;
    assert!(ocr.is(OCR, &StageStatus::Processing));
    let after_ocr = controller.view().pipeline().clone();

    // The malformed frame in between is dropped without touching state.
    let completed = next_stage(&mut controller).await;
    assert!(completed.is(OCR, &StageStatus::Completed));
    assert_eq!(after_ocr.apply(&completed), *controller.view().pipeline());
    assert_eq!(controller.view().document_text(), "# Title");
    assert_eq!(controller.view().doc_mode(), DocMode::Markdown);

    let building = next_stage(&mut controller).await;
    assert!(building.is(KG_BUILD, &StageStatus::Processing));
    let state = controller.view().pipeline();
    assert_eq!(state.active_stage_index, Some(2));
    assert_eq!(state.active_status, Some(StageStatus::Processing));
    assert!(!state.is_complete);
    assert_eq!(state.busy_label(), Some("Building Graph..."));

    // Review cannot be restarted mid-run.
    assert!(!controller.start_review().await);

    let exit = tokio::time::timeout(Duration::from_secs(5), controller.run_until(std::future::pending()))
        .await
        .unwrap();
    assert_eq!(exit, RunExit::Completed);

    let view = controller.view();
    assert!(view.pipeline().is_complete);
    let snapshot = view.snapshot().unwrap();
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.links[0].label, "party_to");
    assert!(!view.frame(&ApproxTextMeasure).is_placeholder());

    let cached = GraphCache::new(cache_dir.path()).load("42").unwrap();
    assert_eq!(&cached, snapshot.as_ref());

    assert!(controller.start_review().await);
    let notices = notifier.notices();
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices.last().unwrap().level, NoticeLevel::Info);
}

#[tokio::test]
async fn test_unusable_graph_payloads_leave_placeholder() {
    let Harness {
        mut controller,
        notifier,
        cache_dir: _cache_dir,
        ..
    } = harness().await;
    controller.open("7");
    assert!(controller.load().await);
    assert!(controller.view().document().is_none());
    assert_eq!(controller.view().document_text(), "");

    let exit = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let message = controller.step().await.unwrap();
            if let SessionEvent::Stage(event) = &message.event {
                if event.step == "REVIEW_ALL" {
                    break;
                }
            }
        }
    })
    .await;
    assert!(exit.is_ok());

    let view = controller.view();
    assert!(view.snapshot().is_none());
    assert!(view.frame(&ApproxTextMeasure).is_placeholder());
    assert!(view.pipeline().finished_with(&StageStatus::Failed));
    assert!(!view.pipeline().is_complete);

    // The service rejects this contract's review; the failure is a notice.
    assert!(!controller.start_review().await);
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.starts_with("Failed to start review"));
}

#[tokio::test]
async fn test_failed_fetch_surfaces_single_error() {
    let Harness {
        mut controller,
        cache_dir: _cache_dir,
        ..
    } = harness().await;
    controller.open("404");
    assert!(!controller.load().await);
    match controller.view().load_state() {
        LoadState::Failed(message) => assert!(message.contains("Contract not found")),
        other => panic!("unexpected state {:?}", other),
    }
    assert!(controller.view().document().is_none());
}

#[tokio::test]
async fn test_switching_contracts_ignores_previous_session() {
    let Harness {
        mut controller,
        cache_dir: _cache_dir,
        ..
    } = harness().await;
    controller.open("42");
    controller.open("7");
    assert_eq!(controller.generation(), 2);
    assert_eq!(controller.view().contract_id(), "7");

    let exit = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let message = controller.step().await.unwrap();
            if message.generation == 2 {
                if let SessionEvent::Stage(event) = &message.event {
                    if event.step == "REVIEW_ALL" {
                        break;
                    }
                }
            }
        }
    })
    .await;
    assert!(exit.is_ok());

    // Nothing from contract 42 reached the view.
    let view = controller.view();
    assert!(view.snapshot().is_none());
    assert_eq!(view.document_text(), "");
    let expected = PipelineRunState::new()
        .apply(&StageEvent::new(KG_BUILD, StageStatus::Completed))
        .apply(&StageEvent::new(KG_BUILD, StageStatus::Completed))
        .apply(&StageEvent::new("REVIEW_ALL", StageStatus::Failed));
    assert_eq!(view.pipeline(), &expected);
}

#[tokio::test]
async fn test_closing_open_session_sends_close_frame() {
    let Harness {
        mut controller,
        cache_dir: _cache_dir,
        mut closed_sessions,
        ..
    } = harness().await;
    controller.open("42");
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), controller.step())
            .await
            .unwrap()
            .unwrap();
        if message.event == SessionEvent::Opened {
            break;
        }
    }
    assert_eq!(controller.session().unwrap().state(), SocketState::Open);

    controller.close();
    assert!(controller.session().is_none());
    let closed = tokio::time::timeout(Duration::from_secs(5), closed_sessions.recv())
        .await
        .unwrap();
    assert_eq!(closed.as_deref(), Some("42"));

    // Closing again has nothing left to close.
    controller.close();
    assert!(tokio::time::timeout(Duration::from_millis(200), closed_sessions.recv())
        .await
        .is_err());
}
