//! HTTP gateway integration tests.
//!
//! Starts an axum server mimicking the pull backend and drives it through
//! `HttpPullGateway`.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use corelib::{Price, PullState, Role};
use serde_json::{Value, json};

use pulls::remote::{
    Auth, CreatePullRequest, GatewayError, HttpPullGateway, PullGateway, UpdatePullRequest,
};

const TOKEN: &str = "test-token";

fn pull_json(id: i64, gig_id: i64, buyer_id: i64, state: &str) -> Value {
    json!({
        "id": id,
        "sellerId": 5,
        "buyerId": buyer_id,
        "gigId": gig_id,
        "priceInit": 20.0,
        "priceUpdate": 20.0,
        "state": state
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "missing or bad token").into_response()
}

async fn create(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if body["gigId"] == 10 {
        return (StatusCode::BAD_REQUEST, "Pull already exists").into_response();
    }
    let mut created = body.clone();
    created["id"] = json!(31);
    Json(created).into_response()
}

async fn list_all(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": [pull_json(1, 10, 7, "pending"), pull_json(2, 11, 8, "payed")] }))
        .into_response()
}

async fn by_role(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match (q.get("role").map(String::as_str), q.get("userId")) {
        (Some("buyer"), Some(user)) if user == "7" => {
            Json(json!([pull_json(1, 10, 7, "pending")])).into_response()
        }
        (Some("seller"), Some(user)) if user == "5" => Json(json!({
            "items": [pull_json(1, 10, 7, "pending"), pull_json(2, 11, 8, "payed")]
        }))
        .into_response(),
        _ => (StatusCode::BAD_REQUEST, "unexpected query").into_response(),
    }
}

async fn by_id(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match id {
        1 => Json(pull_json(1, 10, 7, "pending")).into_response(),
        5 => "definitely not json".into_response(),
        _ => (StatusCode::NOT_FOUND, "Pull not found").into_response(),
    }
}

async fn update(headers: HeaderMap, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut p = pull_json(id, 10, 7, body["newState"].as_str().unwrap_or("pending"));
    p["priceUpdate"] = body["newPrice"].clone();
    Json(p).into_response()
}

async fn close(headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(pull_json(id, 10, 7, "complete")).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!([])).into_response()
}

/// Bind to port 0 and return the base URL.
async fn start_server() -> String {
    let app = Router::new()
        .route("/api/Pull", get(list_all).post(create))
        .route("/api/Pull/by-role", get(by_role))
        .route("/api/Pull/:id", get(by_id).put(update))
        .route("/api/Pull/:id/close", put(close))
        .route("/slow", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn gateway() -> HttpPullGateway {
    let base = start_server().await;
    HttpPullGateway::new(format!("{base}/api/Pull/"), Duration::from_secs(5)).unwrap()
}

fn auth() -> Auth {
    Auth::bearer(TOKEN).unwrap()
}

fn create_request(gig_id: i64) -> CreatePullRequest {
    CreatePullRequest {
        seller_id: 5,
        gig_id,
        price_init: 20.0,
        price_update: 20.0,
        buyer_id: 7,
        state: "pending".into(),
    }
}

#[tokio::test]
async fn create_posts_camel_case_body() {
    let gw = gateway().await;

    let dto = gw.create(&auth(), &create_request(12)).await.unwrap();

    assert_eq!(dto.id, 31);
    assert_eq!(dto.gig_id, 12);
    assert_eq!(dto.buyer_id, 7);
    assert_eq!(dto.state, "pending");
}

#[tokio::test]
async fn error_status_keeps_the_body() {
    let gw = gateway().await;

    let err = gw.create(&auth(), &create_request(10)).await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Status {
            status: 400,
            body: "Pull already exists".into()
        }
    );
}

#[tokio::test]
async fn wrong_token_is_401() {
    let gw = gateway().await;
    let other = Auth::bearer("someone-else").unwrap();

    let err = gw.list_all(&other).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn list_all_returns_raw_payload() {
    let gw = gateway().await;

    let raw = gw.list_all(&auth()).await.unwrap();
    assert_eq!(raw["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn list_by_role_sends_role_and_user() {
    let gw = gateway().await;

    let buyer = gw.list_by_role(&auth(), Role::Buyer, 7).await.unwrap();
    assert_eq!(buyer.as_array().map(Vec::len), Some(1));

    let seller = gw.list_by_role(&auth(), Role::Seller, 5).await.unwrap();
    assert_eq!(seller["items"].as_array().map(Vec::len), Some(2));

    let err = gw.list_by_role(&auth(), Role::Buyer, 8).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn get_by_id_statuses() {
    let gw = gateway().await;

    assert_eq!(gw.get_by_id(1, &auth()).await.unwrap().gig_id, 10);

    let missing = gw.get_by_id(2, &auth()).await.unwrap_err();
    assert_eq!(missing.status(), Some(404));

    let garbage = gw.get_by_id(5, &auth()).await.unwrap_err();
    assert!(matches!(garbage, GatewayError::Decode(_)));
}

#[tokio::test]
async fn update_and_close_hit_their_routes() {
    let gw = gateway().await;

    let req = UpdatePullRequest::new(Price::from_minor(1_500), &PullState::InProcess);
    let updated = gw.update(10, &auth(), &req).await.unwrap();
    assert_eq!(updated.id, 10);
    assert_eq!(updated.price_update, 15.0);
    assert_eq!(updated.state, "in_process");

    let closed = gw.close(10, &auth()).await.unwrap();
    assert_eq!(closed.state, "complete");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let base = start_server().await;
    let gw = HttpPullGateway::new(format!("{base}/slow"), Duration::from_millis(100)).unwrap();

    let err = gw.list_all(&auth()).await.unwrap_err();
    assert_eq!(err, GatewayError::Timeout);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let gw = HttpPullGateway::new("http://127.0.0.1:9/api/Pull", Duration::from_secs(2)).unwrap();

    let err = gw.list_all(&auth()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Http(_) | GatewayError::Timeout));
}
