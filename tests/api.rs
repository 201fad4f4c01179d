use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use inksync_lib::server::router;
use inksync_lib::storage::FileStorage;

fn setup() -> (TempDir, Arc<FileStorage>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path().to_path_buf()).unwrap());
    let app = router(storage.clone());
    (dir, storage, app)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn stroke_json(id: &str) -> Value {
    json!({
        "id": id,
        "points": [
            { "x": 0.0, "y": 0.0, "pressure": 0.5 },
            { "x": 10.0, "y": 4.0, "pressure": 0.7 }
        ],
        "color": "#222222",
        "width": 2.0,
        "createdAt": "2026-01-05T10:00:00Z"
    })
}

async fn create_notebook(app: &Router, title: &str) -> String {
    let (status, body) = send(app, "POST", "/api/notebooks", Some(json!({ "title": title }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_page(app: &Router, notebook_id: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/notebooks/{}/pages", notebook_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, _storage, app) = setup();
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn stroke_lifecycle() {
    let (_dir, _storage, app) = setup();
    let nb = create_notebook(&app, "Sketches").await;
    let page = create_page(&app, &nb).await;
    assert_eq!(page["pageNumber"], 1);
    let page_id = page["id"].as_str().unwrap();
    let strokes_uri = format!("/api/pages/{}/strokes", page_id);

    let batch = json!({ "strokes": [stroke_json("s1"), stroke_json("s2")] });
    let (status, body) = send(&app, "POST", &strokes_uri, Some(batch.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 2 }));

    // Resending an applied batch changes nothing.
    let (status, body) = send(&app, "POST", &strokes_uri, Some(batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 2 }));

    let (status, body) = send(&app, "GET", &strokes_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["s1", "s2"]);

    let (status, _) = send(&app, "DELETE", &format!("{}/s1", strokes_uri), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", &format!("{}/s1", strokes_uri), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "strokeNotFound");

    let (status, _) = send(&app, "DELETE", &strokes_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", &strokes_uri, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn append_errors_are_classified() {
    let (_dir, _storage, app) = setup();
    let nb = create_notebook(&app, "Errors").await;
    let page = create_page(&app, &nb).await;
    let strokes_uri = format!("/api/pages/{}/strokes", page["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        "POST",
        "/api/pages/pg_missing/strokes",
        Some(json!({ "strokes": [stroke_json("s1")] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "pageNotFound");
    assert!(body["error"].as_str().unwrap().contains("pg_missing"));

    let mut short = stroke_json("s2");
    short["points"] = json!([{ "x": 1.0, "y": 1.0, "pressure": 0.5 }]);
    let (status, body) = send(&app, "POST", &strokes_uri, Some(json!({ "strokes": [short] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalidStroke");

    let (status, body) = send(&app, "POST", &strokes_uri, Some(json!({ "wrong": true }))).await;
    assert!(status.is_client_error());
    assert_eq!(body["kind"], "invalidBody");

    let (status, body) = send(&app, "GET", "/api/pages/bad.id/strokes", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalidId");
}

#[tokio::test]
async fn move_pages_between_notebooks() {
    let (_dir, _storage, app) = setup();
    let a = create_notebook(&app, "A").await;
    let b = create_notebook(&app, "B").await;

    let mut a_pages = Vec::new();
    for _ in 0..3 {
        a_pages.push(create_page(&app, &a).await["id"].as_str().unwrap().to_string());
    }
    for _ in 0..2 {
        create_page(&app, &b).await;
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/pages/move",
        Some(json!({ "pageIds": [a_pages[0], a_pages[1]], "targetNotebookId": b })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let moved = body.as_array().unwrap();
    assert_eq!(moved.len(), 2);
    assert_eq!(moved[0]["pageNumber"], 3);
    assert_eq!(moved[1]["pageNumber"], 4);
    assert_eq!(moved[0]["notebookId"], b.as_str());

    let (_, body) = send(&app, "GET", &format!("/api/notebooks/{}/pages", a), None).await;
    let remaining = body.as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], a_pages[2].as_str());
    assert_eq!(remaining[0]["pageNumber"], 1);

    let (_, body) = send(&app, "GET", &format!("/api/pages/{}", a_pages[0]), None).await;
    assert_eq!(body["notebookId"], b.as_str());

    // Moving a page into the notebook it already lives in is refused.
    let (status, body) = send(
        &app,
        "POST",
        "/api/pages/move",
        Some(json!({ "pageIds": [a_pages[0]], "targetNotebookId": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "alreadyInTarget");

    let (status, body) = send(
        &app,
        "POST",
        "/api/pages/move",
        Some(json!({ "pageIds": [a_pages[2], "pg_nope"], "targetNotebookId": b })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "pageNotFound");
    let (_, body) = send(&app, "GET", &format!("/api/pages/{}", a_pages[2]), None).await;
    assert_eq!(body["notebookId"], a.as_str());
}

#[tokio::test]
async fn update_and_delete_pages_and_notebooks() {
    let (_dir, _storage, app) = setup();
    let nb = create_notebook(&app, "Journal").await;
    let first = create_page(&app, &nb).await;
    let second = create_page(&app, &nb).await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/pages/{}", second_id),
        Some(json!({ "tags": ["ideas"], "canvasX": 120.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["ideas"]));
    assert_eq!(body["canvasX"], 120.5);

    let (status, _) = send(&app, "DELETE", &format!("/api/pages/{}", first_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", &format!("/api/pages/{}", second_id), None).await;
    assert_eq!(body["pageNumber"], 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/notebooks/{}", nb), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/notebooks/{}", nb), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "notebookNotFound");
    let (status, _) = send(&app, "GET", &format!("/api/pages/{}", second_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/notebooks", None).await;
    assert_eq!(body, json!([]));
}
