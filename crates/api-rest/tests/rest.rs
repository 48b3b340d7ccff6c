//! End-to-end tests of the REST router against a temporary data directory.

use api_rest::{router, AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use hsr_core::config::resource_types_from_env_value;
use hsr_core::CoreConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(temp: &TempDir, api_key: Option<&str>) -> Router {
    let data_dir = temp.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    let cfg = CoreConfig::new(
        data_dir,
        temp.path().join("staging"),
        resource_types_from_env_value(Some("GenericResource,ModelProgram:run".into())).unwrap(),
        "R1 development".into(),
        "10.5072".into(),
    )
    .unwrap();
    router(AppState::new(Arc::new(cfg), api_key.map(str::to_string)))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-hs-user", user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, user, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register(app: &Router, username: &str) {
    let (status, _) = send_json(
        app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": username, "email": format!("{}@example.org", username) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn create(app: &Router, user: &str, body: Value) -> String {
    let (status, value) = send_json(app, Method::POST, "/resource", Some(user), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", value);
    value["pid"].as_str().unwrap().to_string()
}

fn b64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

#[tokio::test]
async fn health_is_open() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, Some("secret"));

    let (status, body) = send_json(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"], "HSR is alive");
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, Some("secret"));

    let (status, _) = send(&app, Method::GET, "/resources", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/resources")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/resources")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn resource_lifecycle() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, None);
    register(&app, "alice").await;

    let pid = create(
        &app,
        "alice",
        json!({
            "resource_type": "ModelProgram",
            "title": "Logan River flow",
            "abstract": "Daily discharge",
            "keywords": ["hydrology"],
            "files": [{ "name": "flow.csv", "file": b64(b"date,cfs\n"), "content-type": "text/csv" }]
        }),
    )
    .await;

    let (status, list) = send_json(&app, Method::GET, "/resources", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["resources"][0]["pid"], pid.as_str());

    let (status, meta) =
        send_json(&app, Method::GET, &format!("/scimeta/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["title"], "Logan River flow");
    assert_eq!(meta["description"], "Daily discharge");

    let (status, meta) = send_json(
        &app,
        Method::PUT,
        &format!("/scimeta/{}", pid),
        Some("alice"),
        Some(json!({ "title": "Logan River discharge" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["title"], "Logan River discharge");
    assert_eq!(meta["new_version"], false);

    let (status, raw) = send(
        &app,
        Method::GET,
        &format!("/resource/{}/files/flow.csv", pid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(raw, b"date,cfs\n");

    let (status, encoded) = send_json(
        &app,
        Method::GET,
        &format!("/resource/{}/files/flow.csv?format=base64", pid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(encoded["file"], b64(b"date,cfs\n"));
    assert_eq!(encoded["content_type"], "text/csv");

    let (status, added) = send_json(
        &app,
        Method::POST,
        &format!("/resource/{}/files", pid),
        Some("alice"),
        Some(json!({ "files": [{ "name": "readme.txt", "file": b64(b"notes") }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["files"][0]["name"], "readme.txt");

    let (status, caps) =
        send_json(&app, Method::GET, &format!("/capabilities/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(caps["capabilities"], json!(["run"]));

    let (status, zip) = send(&app, Method::GET, &format!("/resource/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(zip.starts_with(b"PK"));

    let (status, checksum) =
        send_json(&app, Method::GET, &format!("/checksum/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checksum["algorithm"], "MD5");
    assert_eq!(checksum["checksum"].as_str().unwrap().len(), 32);

    let (status, revisions) =
        send_json(&app, Method::GET, &format!("/revisions/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revisions["bags"].as_array().unwrap().len(), 1);
    assert_eq!(revisions["bags"][0]["md5"], checksum["checksum"]);

    let (status, map) =
        send_json(&app, Method::GET, &format!("/resourcemap/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map["aggregates"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::GET, &format!("/related/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, published) = send_json(
        &app,
        Method::PUT,
        &format!("/publishResource/{}", pid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["published_and_frozen"], true);
    let doi = published["doi"].as_str().unwrap().to_string();
    assert_eq!(doi, format!("10.5072/hs.{}", pid));

    let (status, resolved) =
        send_json(&app, Method::GET, &format!("/resolveDOI/{}", doi), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["pid"], pid.as_str());

    let (status, sysmeta) =
        send_json(&app, Method::GET, &format!("/sysmeta/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sysmeta["published_and_frozen"], true);

    let (status, history) = send_json(
        &app,
        Method::GET,
        &format!("/resource/{}/history", pid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(history["commits"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn changing_published_resource_creates_new_version() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, None);
    register(&app, "alice").await;
    let pid = create(
        &app,
        "alice",
        json!({ "resource_type": "GenericResource", "title": "Snow survey" }),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/publishResource/{}", pid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, updated) = send_json(
        &app,
        Method::PUT,
        &format!("/resource/{}", pid),
        Some("alice"),
        Some(json!({ "title": "Snow survey 2024" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["new_version"], true);
    assert_eq!(updated["obsoletes"], pid.as_str());
    assert_ne!(updated["pid"], pid.as_str());

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/resource/{}", pid),
        Some("alice"),
        Some(json!({ "title": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/resource/{}", pid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn error_statuses() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, None);
    register(&app, "alice").await;
    register(&app, "bob").await;

    let missing = "0123456789abcdef0123456789abcdef";
    let (status, _) = send(&app, Method::GET, &format!("/scimeta/{}", missing), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/scimeta/not-a-key", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/resource",
        None,
        Some(json!({ "resource_type": "GenericResource", "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/resource",
        Some("mallory"),
        Some(json!({ "resource_type": "GenericResource", "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/resource",
        Some("alice"),
        Some(json!({ "resource_type": "RasterResource", "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let pid = create(
        &app,
        "alice",
        json!({
            "resource_type": "GenericResource",
            "title": "Soil moisture",
            "files": [{ "name": "a.txt", "file": b64(b"a") }]
        }),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/resource/{}/files", pid),
        Some("alice"),
        Some(json!({ "files": [{ "name": "a.txt", "file": b64(b"again") }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/resource/{}/files", pid),
        Some("alice"),
        Some(json!({ "files": [{ "name": "b.txt", "file": "***" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/resource/{}/files/missing.txt", pid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/resource/{}/files/a.txt?format=xml", pid),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/scimeta/{}", pid),
        Some("bob"),
        Some(json!({ "title": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "alice", "email": "other@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "fay", "email": "fay@example.org", "full_name": "Fay <admin>" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/resource/{}", pid),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &format!("/resource/{}", pid), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn groups_grant_edit_access() {
    let temp = TempDir::new().unwrap();
    let app = app(&temp, None);
    register(&app, "alice").await;
    register(&app, "bob").await;

    let (status, group) = send_json(
        &app,
        Method::POST,
        "/groups",
        None,
        Some(json!({ "name": "hydro" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(group["members"], json!([]));

    let (status, group) = send_json(
        &app,
        Method::POST,
        "/groups/hydro/members",
        None,
        Some(json!({ "user": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["members"], json!(["bob"]));

    let pid = create(
        &app,
        "alice",
        json!({ "resource_type": "GenericResource", "title": "Groundwater", "edit_groups": ["hydro"] }),
    )
    .await;

    let (status, meta) = send_json(
        &app,
        Method::PUT,
        &format!("/scimeta/{}", pid),
        Some("bob"),
        Some(json!({ "keywords": ["aquifer"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["keywords"], json!(["aquifer"]));

    let (status, users) = send_json(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["users"].as_array().unwrap().len(), 2);
}
