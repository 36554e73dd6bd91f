//! In-process mock backend: an axum server with the push channel on `/`
//! and a handful of plain and streamed routes.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use ssui_shell_lib::config::{BackoffStrategy, TransportSettings};
use ssui_shell_lib::transport::TransportClient;

enum Outgoing {
    Frame(Value),
    Close,
}

#[derive(Default)]
pub struct BackendState {
    sessions: DashMap<String, mpsc::UnboundedSender<Outgoing>>,
    /// Every session id handed out, in order
    issued: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl BackendState {
    fn push(&self, session: &str, frame: Value) -> bool {
        match self.sessions.get(session) {
            Some(tx) => tx.send(Outgoing::Frame(frame)).is_ok(),
            None => false,
        }
    }

    fn close(&self, session: &str) {
        if let Some(tx) = self.sessions.get(session) {
            let _ = tx.send(Outgoing::Close);
        }
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/", get(ws_handler))
            .route("/status", get(status))
            .route("/sleep", get(sleep))
            .route("/items/{id}", put(put_item).delete(delete_item))
            .route("/echo", post(echo))
            .route("/run/{session}", post(run))
            .route("/fanout/{session}", post(fanout))
            .route("/eager/{session}", post(eager))
            .route("/slow/{session}", post(slow))
            .route("/fail/{session}", post(fail))
            .route("/drop/{session}", post(drop_socket))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn settings() -> TransportSettings {
        TransportSettings {
            request_timeout_ms: 5000,
            session_wait_ms: 2000,
            reconnect: BackoffStrategy::Fixed { delay_ms: 100 },
        }
    }

    pub fn client(&self) -> TransportClient {
        self.client_with(&Self::settings())
    }

    pub fn client_with(&self, settings: &TransportSettings) -> TransportClient {
        TransportClient::with_urls(
            &format!("http://{}/", self.addr),
            &format!("ws://{}/", self.addr),
            settings,
        )
        .unwrap()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn issued(&self) -> Vec<String> {
        self.state.issued.lock().clone()
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn body_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn start_response(request_uuid: &str, callbacks: &[&str]) -> Json<Value> {
    Json(json!({ "type": "start", "request_uuid": request_uuid, "callbacks": callbacks }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<BackendState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BackendState>) {
    let session = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.sessions.insert(session.clone(), tx);
    state.issued.lock().push(session.clone());
    state.opened.fetch_add(1, Ordering::SeqCst);

    let (mut sink, mut stream) = socket.split();
    let hello = json!({ "type": "uuid", "uuid": session }).to_string();
    if sink.send(Message::Text(hello.into())).await.is_ok() {
        loop {
            tokio::select! {
                outgoing = rx.recv() => match outgoing {
                    Some(Outgoing::Frame(frame)) => {
                        if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    state.sessions.remove(&session);
    state.closed.fetch_add(1, Ordering::SeqCst);
}

async fn status() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn sleep() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "ok": true }))
}

async fn put_item(Path(id): Path<String>, body: Bytes) -> Json<Value> {
    Json(json!({ "id": id, "body": body_json(&body) }))
}

async fn delete_item(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "deleted": id }))
}

async fn echo(body: Bytes) -> Json<Value> {
    Json(body_json(&body))
}

/// progress, then log, then finish echoing the request body
async fn run(
    State(state): State<Arc<BackendState>>,
    Path(session): Path<String>,
    body: Bytes,
) -> Json<Value> {
    let request_uuid = Uuid::new_v4().to_string();
    let input = body_json(&body);
    let rid = request_uuid.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.push(&session, json!({ "type": "callback", "request_uuid": rid, "progress": 0.5 }));
        state.push(&session, json!({ "type": "callback", "request_uuid": rid, "log": "hello" }));
        state.push(&session, json!({ "type": "finish", "request_uuid": rid, "result": input }));
    });
    start_response(&request_uuid, &["progress", "log"])
}

/// one frame carrying two callbacks
async fn fanout(State(state): State<Arc<BackendState>>, Path(session): Path<String>) -> Json<Value> {
    let request_uuid = Uuid::new_v4().to_string();
    let rid = request_uuid.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        state.push(
            &session,
            json!({ "type": "callback", "request_uuid": rid, "progress": 1.0, "log": "done" }),
        );
        state.push(&session, json!({ "type": "finish", "request_uuid": rid }));
    });
    start_response(&request_uuid, &["progress", "log"])
}

/// pushes every frame before the HTTP response goes out
async fn eager(State(state): State<Arc<BackendState>>, Path(session): Path<String>) -> Json<Value> {
    let request_uuid = Uuid::new_v4().to_string();
    for step in 0..3 {
        state.push(
            &session,
            json!({ "type": "callback", "request_uuid": request_uuid, "step": step }),
        );
    }
    state.push(
        &session,
        json!({ "type": "finish", "request_uuid": request_uuid, "steps": 3 }),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    start_response(&request_uuid, &["step"])
}

/// finishes after `delay_ms` from the body
async fn slow(
    State(state): State<Arc<BackendState>>,
    Path(session): Path<String>,
    body: Bytes,
) -> Json<Value> {
    let delay = body_json(&body)["delay_ms"].as_u64().unwrap_or(100);
    let request_uuid = Uuid::new_v4().to_string();
    let rid = request_uuid.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        state.push(&session, json!({ "type": "finish", "request_uuid": rid, "delay_ms": delay }));
    });
    start_response(&request_uuid, &[])
}

async fn fail(Path(_session): Path<String>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

/// accepts the call, then closes the socket without ever finishing
async fn drop_socket(
    State(state): State<Arc<BackendState>>,
    Path(session): Path<String>,
) -> Json<Value> {
    let request_uuid = Uuid::new_v4().to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        state.close(&session);
    });
    start_response(&request_uuid, &[])
}
