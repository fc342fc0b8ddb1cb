//! End-to-end tests for the menucraft HTTP API.
//!
//! Most tests drive the axum router in-process with a canned vision model,
//! so they need no network and no API key. The live Gemini test is gated
//! behind `E2E_ENABLED` and a photo in `./test_cases/`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Live test:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e live -- --nocapture

#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use menucraft::server::{router, AppState};
use menucraft::{
    ExtractionConfig, GenerationConfig, ImageUpload, MenuError, VisionModel, EXPORT_FILE_NAME,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "menucraft-test-boundary";

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

const SCENARIO_A: &str = r#"{"name":"Lunch","restaurant":"Cafe X","sections":[{"name":"Mains","items":[{"name":"Burger","price":"$10","image":""}]}],"contact":{}}"#;

/// Answers every call with the same text, or the same upstream failure.
struct CannedModel(Result<String, String>);

#[async_trait]
impl VisionModel for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _image: &ImageUpload,
        _generation: &GenerationConfig,
    ) -> Result<String, MenuError> {
        self.0
            .clone()
            .map_err(|detail| MenuError::ExtractionFailure { detail })
    }
}

fn app(answer: &str) -> Router {
    app_with(CannedModel(Ok(answer.to_string())))
}

fn app_with(model: CannedModel) -> Router {
    router(AppState::new(Arc::new(model), ExtractionConfig::default()))
}

/// One multipart part: (field name, optional (filename, content type), bytes).
type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/process-menu")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn menu_upload(content_type: &str, data: &[u8]) -> Request<Body> {
    multipart_request(&[("menuImage", Some(("menu.png", content_type)), data)])
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ── /api/process-menu ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scenario_a_defaults_are_filled() {
    let (status, body) = send_json(app(SCENARIO_A), menu_upload("image/png", PNG)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Lunch");
    assert_eq!(body["restaurant"], "Cafe X");
    assert_eq!(body["contact"]["phone"], "123-456-7890");
    assert_eq!(body["contact"]["address"], "123 Anywhere St., Any City");
    let item = &body["sections"][0]["items"][0];
    assert_eq!(item["name"], "Burger");
    assert_eq!(item["price"], "$10");
    assert_eq!(item["image"], "/api/placeholder/200/200");
}

#[tokio::test]
async fn test_scenario_b_fenced_matches_unfenced() {
    let fenced = format!("```json\n{SCENARIO_A}\n```");
    let (_, plain) = send_json(app(SCENARIO_A), menu_upload("image/png", PNG)).await;
    let (status, wrapped) = send_json(app(&fenced), menu_upload("image/png", PNG)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(plain, wrapped);
}

#[tokio::test]
async fn test_scenario_c_no_file() {
    let req = multipart_request(&[("note", None, b"hello".as_slice())]);
    let (status, body) = send(app(SCENARIO_A), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, br#"{"error":"No file uploaded"}"#);
}

#[tokio::test]
async fn test_not_multipart_is_no_file() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/process-menu")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send_json(app(SCENARIO_A), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn test_scenario_d_unparseable_output() {
    let (status, body) = send_json(
        app("Sorry, I can't read this menu."),
        menu_upload("image/png", PNG),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error processing menu");
    assert!(!body["details"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_structure_is_server_error() {
    let (status, body) = send_json(
        app(r#"{"name":"Lunch","restaurant":"Cafe X"}"#),
        menu_upload("image/png", PNG),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains("sections"));
}

#[tokio::test]
async fn test_upstream_failure_is_server_error() {
    let model = CannedModel(Err("quota exhausted".into()));
    let (status, body) = send_json(app_with(model), menu_upload("image/png", PNG)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error processing menu");
    assert!(body["details"].as_str().unwrap().contains("quota exhausted"));
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let (status, body) = send_json(
        app(SCENARIO_A),
        menu_upload("text/plain", b"definitely not a picture"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please select a valid image file.");
    assert!(body.get("details").is_some());
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let (status, body) = send_json(app(SCENARIO_A), menu_upload("image/png", b"")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please select a valid image file.");
}

#[tokio::test]
async fn test_octet_stream_upload_is_sniffed() {
    let (status, _) = send_json(
        app(SCENARIO_A),
        menu_upload("application/octet-stream", PNG),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ── /api/export ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_export_returns_png_attachment() {
    let (_, doc) = send_json(app(SCENARIO_A), menu_upload("image/png", PNG)).await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&doc).unwrap()))
        .unwrap();
    let res = app(SCENARIO_A).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    let disposition = res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(EXPORT_FILE_NAME));

    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let png = image::load_from_memory(&bytes).unwrap();
    assert_eq!(png.width(), 1200);
    assert!(png.height() > 0);
}

#[tokio::test]
async fn test_export_rejects_invalid_document() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Lunch"}"#))
        .unwrap();
    let (status, body) = send_json(app(SCENARIO_A), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid menu document");
}

fn export_request(doc: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(doc).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_export_keeps_edited_blank_fields() {
    let (_, mut doc) = send_json(app(SCENARIO_A), menu_upload("image/png", PNG)).await;
    doc["contact"]["phone"] = json!("");
    doc["sections"][0]["items"][0]["price"] = json!("");

    let (status, body) = send(app(SCENARIO_A), export_request(&doc)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(image::load_from_memory(&body).is_ok());
}

#[tokio::test]
async fn test_export_does_not_default_missing_fields() {
    let (_, mut doc) = send_json(app(SCENARIO_A), menu_upload("image/png", PNG)).await;
    doc["contact"].as_object_mut().unwrap().remove("phone");

    let (status, body) = send_json(app(SCENARIO_A), export_request(&doc)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("contact.phone"));
}

#[tokio::test]
async fn test_export_refuses_oversized_menu() {
    let items: Vec<Value> = (0..2000)
        .map(|i| json!({ "name": format!("Dish {i}"), "price": "$1", "image": "" }))
        .collect();
    let doc = json!({
        "name": "Everything",
        "restaurant": "Cafe X",
        "sections": [ { "name": "All", "items": items } ],
        "contact": { "phone": "", "address": "" }
    });

    let (status, body) = send_json(app(SCENARIO_A), export_request(&doc)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Menu too large to render");
}

// ── /api/placeholder ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_placeholder_dimensions() {
    for (uri, expected) in [
        ("/api/placeholder/200/200", (200, 200)),
        ("/api/placeholder/5000/0", (2000, 1)),
    ] {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(app(SCENARIO_A), req).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        let img = image::load_from_memory(&body).unwrap();
        assert_eq!((img.width(), img.height()), expected, "{uri}");
    }
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_gemini_extraction() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let photo = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/menu.jpg");
    if !photo.exists() {
        println!("SKIP: test file not found: {}", photo.display());
        return;
    }

    let config = ExtractionConfig::default();
    let model = menucraft::resolve_model(&config).expect("GEMINI_API_KEY must be set");
    let doc = menucraft::extract_menu_from_file(model.as_ref(), &photo, &config)
        .await
        .expect("live extraction");

    assert!(!doc.sections.is_empty(), "no sections extracted");
    for section in &doc.sections {
        assert!(!section.name.trim().is_empty());
    }
    println!("{}", doc.to_json_pretty());
}
