//! HTTP API integration tests
//!
//! Drive the router with `oneshot` requests; collaborators are the fakes
//! from `helpers`.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use civic_intake::api::actor::{DEPARTMENT_HEADER, ROLE_HEADER, STAFF_SECRET_HEADER};
use civic_intake::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const STAFF_SECRET: &str = "gateway-shared-secret";

async fn create_test_app() -> (Router, TestContext) {
    let ctx = context().await;
    let state = AppState::new(ctx.pipeline.clone(), Some(STAFF_SECRET.to_string()));
    (build_router(state), ctx)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_issue(app: &Router, byte: u8) -> Value {
    let body = json!({
        "description": "Bin overflowing since Monday",
        "latitude": CITY_LAT,
        "longitude": CITY_LON,
        "image_base64": BASE64.encode(image(byte, 0)),
        "content_type": "image/jpeg",
    });
    let (status, json) = send(app, json_request("POST", "/issues", body)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", json);
    json
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _ctx) = create_test_app().await;

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "civic-intake");
    assert_eq!(json["indexed_images"], 0);
}

#[tokio::test]
async fn test_create_issue_returns_token_once() {
    let (app, _ctx) = create_test_app().await;

    let created = create_issue(&app, 3).await;
    assert_eq!(created["issue"]["department"], "municipality");
    assert_eq!(created["issue"]["status"], "Open");
    assert_eq!(created["duplicate"]["confidence"], "none");
    assert!(created["citizen_token"].as_str().unwrap().len() >= 10);
    assert!(created["issue"].get("citizen_token").is_none());

    let id = created["issue"]["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/issues/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert!(fetched.get("citizen_token").is_none());
}

#[tokio::test]
async fn test_create_issue_rejects_bad_base64() {
    let (app, _ctx) = create_test_app().await;

    let body = json!({
        "latitude": CITY_LAT,
        "longitude": CITY_LON,
        "image_base64": "not base64!!",
    });
    let (status, json) = send(&app, json_request("POST", "/issues", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_issue_is_json_404() {
    let (app, _ctx) = create_test_app().await;

    let (status, json) = send(&app, get("/issues/4242")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
    assert!(json["error"]["message"].is_string());
}

#[tokio::test]
async fn test_staff_routes_require_headers() {
    let (app, _ctx) = create_test_app().await;
    let id = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/issues/{}/status", id),
            json!({"status": "Resolved"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    let mut request = json_request(
        "PATCH",
        &format!("/issues/{}/status", id),
        json!({"status": "Resolved"}),
    );
    request
        .headers_mut()
        .insert(STAFF_SECRET_HEADER, "wrong".parse().unwrap());
    request
        .headers_mut()
        .insert(ROLE_HEADER, "super_admin".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_official_updates_own_department() {
    let (app, _ctx) = create_test_app().await;
    let id = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();

    let staff_request = |department: &str| {
        let mut request = json_request(
            "PATCH",
            &format!("/issues/{}/status", id),
            json!({"status": "In Progress"}),
        );
        let headers = request.headers_mut();
        headers.insert(STAFF_SECRET_HEADER, STAFF_SECRET.parse().unwrap());
        headers.insert(ROLE_HEADER, "official".parse().unwrap());
        headers.insert(DEPARTMENT_HEADER, department.parse().unwrap());
        request
    };

    let (status, _) = send(&app, staff_request("kseb")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, staff_request("municipality")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "In Progress");
}

#[tokio::test]
async fn test_invalid_status_value_is_bad_request() {
    let (app, _ctx) = create_test_app().await;
    let id = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();

    let mut request = json_request(
        "PATCH",
        &format!("/issues/{}/status", id),
        json!({"status": "Done"}),
    );
    request
        .headers_mut()
        .insert(STAFF_SECRET_HEADER, STAFF_SECRET.parse().unwrap());
    request
        .headers_mut()
        .insert(ROLE_HEADER, "super_admin".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vote_flow() {
    let (app, _ctx) = create_test_app().await;
    let id = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();
    let uri = format!("/issues/{}/vote", id);

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            &uri,
            json!({"citizen_token": "voter-token-0001", "vote_type": "upvote"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["upvote_count"], 1);
    assert_eq!(json["user_vote"], "upvote");

    let (status, json) = send(&app, get(&format!("{}?citizen_token=voter-token-0001", uri))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_vote"], "upvote");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("{}?citizen_token=voter-token-0001", uri))
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["upvote_count"], 0);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &uri,
            json!({"citizen_token": "voter-token-0001", "vote_type": "sideways"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comment_endpoints() {
    let (app, _ctx) = create_test_app().await;
    let id = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();
    let uri = format!("/issues/{}/comments", id);

    let (status, comment) = send(
        &app,
        json_request(
            "POST",
            &uri,
            json!({"citizen_token": "author-token-01", "text": "Still overflowing"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(comment.get("citizen_token").is_none());
    let comment_id = comment["id"].as_i64().unwrap();

    let (status, listed) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let delete = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("{}/{}?citizen_token={}", uri, comment_id, token))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, delete("someone-else-01")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, delete("author-token-01")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_notification_endpoints() {
    let (app, _ctx) = create_test_app().await;
    let created = create_issue(&app, 3).await;
    let token = created["citizen_token"].as_str().unwrap().to_string();

    let (status, counts) = send(&app, get(&format!("/notifications/count?token={}", token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["total"], 1);
    assert_eq!(counts["unread"], 1);

    let (status, listed) = send(&app, get(&format!("/notifications?token={}", token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["type"], "issue_created");
    assert_eq!(listed[0]["is_read"], false);

    let read_all = Request::builder()
        .method("PATCH")
        .uri(format!("/notifications/read-all?token={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, read_all).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["updated"], 1);

    let (status, _) = send(&app, get("/notifications?token=short")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_similar_endpoint() {
    let (app, _ctx) = create_test_app().await;
    let first = create_issue(&app, 3).await["issue"]["id"].as_i64().unwrap();
    let second = create_issue(&app, 3).await;
    assert_eq!(second["duplicate"]["confidence"], "definite");
    assert_eq!(second["duplicate"]["matched_issue_id"], first);

    let (status, similar) = send(&app, get(&format!("/issues/{}/similar?limit=3", first))).await;
    assert_eq!(status, StatusCode::OK);
    let similar = similar.as_array().unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["issue"]["id"], second["issue"]["id"]);
}
