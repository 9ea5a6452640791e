//! Loopback HTTP stubs standing in for the model server and image hosts.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// `/api/generate` that answers with the given replies in order and
/// returns 503 once they run out. Request bodies are kept for inspection.
#[derive(Clone, Default)]
pub(crate) struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedModel {
    pub(crate) fn new(replies: &[&str]) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.iter().map(|r| r.to_string()).collect())),
            requests: Arc::default(),
        }
    }

    pub(crate) fn router(&self) -> Router {
        Router::new()
            .route("/api/generate", post(generate))
            .with_state(self.clone())
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn generate(
    State(model): State<ScriptedModel>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    model.requests.lock().unwrap().push(body);
    let reply = model.replies.lock().unwrap().pop_front();
    match reply {
        Some(response) => Ok(Json(json!({ "response": response, "done": true }))),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// `/scan.png` serves `image`, `/busy.png` answers 503, anything else 404.
pub(crate) fn image_host(image: Vec<u8>) -> Router {
    Router::new()
        .route("/scan.png", get(move || async move { image }))
        .route("/busy.png", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
}

pub(crate) fn small_png() -> Vec<u8> {
    let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}
