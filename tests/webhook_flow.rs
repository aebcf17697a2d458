//! End-to-end webhook flow: a signed LINE callback request travels
//! through signature validation, event decoding and dispatch into stub
//! adapters, which record every side effect.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use hmac::{Hmac, Mac};
use linedrop::context::RelayContext;
use linedrop::dispatch::Dispatcher;
use linedrop::drive::MediaStore;
use linedrop::errors::RelayError;
use linedrop::gateway::{GatewayState, build_router};
use linedrop::line::{LineApi, Profile};
use linedrop::persist::{LocalLog, MessageStore};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

#[derive(Default)]
struct RecordingLine {
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl LineApi for RecordingLine {
    async fn reply_text(&self, _reply_token: &str, text: &str) -> Result<(), RelayError> {
        self.replies.lock().unwrap().push(text.to_string());
        Ok(())
    }
    async fn get_profile(&self, _user_id: &str) -> Result<Profile, RelayError> {
        Ok(Profile {
            display_name: "王小明 Ming".into(),
        })
    }
    async fn get_message_content(&self, _message_id: &str) -> Result<Vec<u8>, RelayError> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

#[derive(Default)]
struct RecordingMedia {
    uploads: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn upload(
        &self,
        _data: Vec<u8>,
        filename: &str,
        folder_name: &str,
        mime_type: &str,
    ) -> Result<String, RelayError> {
        self.uploads.lock().unwrap().push((
            filename.to_string(),
            folder_name.to_string(),
            mime_type.to_string(),
        ));
        Ok("remote-file-1".into())
    }
}

#[derive(Default)]
struct RecordingStore {
    rows: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl MessageStore for RecordingStore {
    async fn insert(
        &self,
        _dt: chrono::DateTime<chrono::Local>,
        user_id: &str,
        display_name: &str,
        text: &str,
    ) -> Result<i32, RelayError> {
        let mut rows = self.rows.lock().unwrap();
        rows.push((user_id.to_string(), display_name.to_string(), text.to_string()));
        Ok(rows.len() as i32)
    }
}

struct App {
    router: axum::Router,
    line: Arc<RecordingLine>,
    media: Arc<RecordingMedia>,
    store: Arc<RecordingStore>,
    _dir: TempDir,
}

fn make_app() -> App {
    let dir = TempDir::new().unwrap();
    let line = Arc::new(RecordingLine::default());
    let media = Arc::new(RecordingMedia::default());
    let store = Arc::new(RecordingStore::default());
    let dispatcher = Dispatcher::new(
        RelayContext::new(),
        line.clone(),
        media.clone(),
        store.clone(),
        LocalLog::new(dir.path()),
        HashMap::new(),
        false,
    );
    App {
        router: build_router(GatewayState::new(SECRET, Arc::new(dispatcher))),
        line,
        media,
        store,
        _dir: dir,
    }
}

fn sign(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn signed_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/callback")
        .header("X-Line-Signature", sign(body))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_mixed_batch_is_fully_processed() {
    let app = make_app();
    let body = r#"{
        "destination": "U_bot",
        "events": [
            {"type": "message", "replyToken": "rt-1", "timestamp": 1742000000000,
             "source": {"userId": "U_alice"},
             "message": {"type": "text", "id": "m-1", "text": "今天天氣真好"}},
            {"type": "message", "replyToken": "rt-2", "timestamp": 1742000000000,
             "source": {"userId": "U_alice"},
             "message": {"type": "image", "id": "img-77"}},
            {"type": "message", "replyToken": "rt-3", "timestamp": 1742000000000,
             "source": {"userId": "U_alice"},
             "message": {"type": "text", "id": "m-2", "text": "建立相簿"}}
        ]
    }"#;

    let resp = app.router.oneshot(signed_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Plain text row landed with the profile display name
    let rows = app.store.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "U_alice");
    assert_eq!(rows[0].1, "王小明 Ming");
    assert_eq!(rows[0].2, "今天天氣真好");

    // Image was uploaded with a sanitized name and the message id
    let uploads = app.media.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (filename, _folder, mime) = &uploads[0];
    assert!(filename.starts_with("Ming_"), "sanitized: {}", filename);
    assert!(filename.ends_with("_img-77.jpg"));
    assert_eq!(mime, "image/jpeg");

    // The bare command got its usage reply
    let replies = app.line.replies.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("建立相簿: YYYY-MM-DD, 相簿名稱"));
}

#[tokio::test]
async fn test_redelivered_batch_uploads_nothing_new() {
    let app = make_app();
    let body = r#"{
        "events": [{"type": "message", "replyToken": "rt-1", "timestamp": 1742000000000,
            "source": {"userId": "U_alice"},
            "message": {"type": "video", "id": "vid-1"}}]
    }"#;

    let first = app
        .router
        .clone()
        .oneshot(signed_request(body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app
        .router
        .clone()
        .oneshot(signed_request(body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK, "redelivery still gets OK");

    assert_eq!(app.media.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tampered_body_is_rejected_without_side_effects() {
    let app = make_app();
    let body = r#"{
        "events": [{"type": "message", "replyToken": "rt-1", "timestamp": 1742000000000,
            "source": {"userId": "U_alice"},
            "message": {"type": "text", "id": "m-1", "text": "hello"}}]
    }"#;
    // Signature computed over a different body
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .header("X-Line-Signature", sign("something else entirely"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.rows.lock().unwrap().is_empty());
    assert!(app.media.uploads.lock().unwrap().is_empty());
    assert!(app.line.replies.lock().unwrap().is_empty());
}
