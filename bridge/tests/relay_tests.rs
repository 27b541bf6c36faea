//! Relay client tests
//!
//! The wire format is the contract with the ERP: one JSON object per
//! punch, bearer authorization, HTTP 200 as the only success.

use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::NaiveDateTime;
use tokio_test::{assert_err, assert_ok};

use shared::{AttendanceRecord, PunchDirection};
use timeclock_bridge::error::BridgeError;
use timeclock_bridge::external::RelayClient;

#[derive(Clone, Default)]
struct Capture {
    status: u16,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    headers: Arc<Mutex<Vec<String>>>,
}

async fn capture_endpoint(
    State(capture): State<Capture>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        capture.headers.lock().unwrap().push(auth.to_string());
    }
    capture.bodies.lock().unwrap().push(body);
    StatusCode::from_u16(capture.status).unwrap()
}

async fn spawn_capture(status: u16) -> (String, Capture) {
    let capture = Capture {
        status,
        ..Capture::default()
    };
    let app = Router::new()
        .route("/attendance", post(capture_endpoint))
        .with_state(capture.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/attendance"), capture)
}

fn punch() -> AttendanceRecord {
    AttendanceRecord {
        user_id: 42,
        timestamp: NaiveDateTime::parse_from_str("2025-12-07 08:25:30", "%Y-%m-%d %H:%M:%S")
            .unwrap(),
        punch: PunchDirection::Out,
        status: 1,
    }
}

#[tokio::test]
async fn payload_matches_the_erp_contract() {
    let (url, capture) = spawn_capture(200).await;
    let client = RelayClient::with_base_url(url, "TokenSecret2025".to_string());

    assert_ok!(client.push_record(&punch()).await);

    let bodies = capture.bodies.lock().unwrap();
    assert_eq!(
        bodies[0],
        serde_json::json!({
            "user_id": 42,
            "timestamp": "2025-12-07 08:25:30",
            "punch_type": "out",
            "status": 1,
        })
    );
    let headers = capture.headers.lock().unwrap();
    assert_eq!(headers[0], "Bearer TokenSecret2025");
}

#[tokio::test]
async fn non_200_is_a_recoverable_rejection() {
    let (url, _capture) = spawn_capture(500).await;
    let client = RelayClient::with_base_url(url, "t".to_string());

    let err = client.push_record(&punch()).await.unwrap_err();
    match &err {
        BridgeError::RelayRejected { status, .. } => assert_eq!(*status, 500),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_recoverable());
}

/// Even 201 is a rejection; the ERP contract says 200 exactly.
#[tokio::test]
async fn only_200_counts_as_success() {
    let (url, _capture) = spawn_capture(201).await;
    let client = RelayClient::with_base_url(url, "t".to_string());

    let err = client.push_record(&punch()).await.unwrap_err();
    assert!(matches!(err, BridgeError::RelayRejected { status: 201, .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Bind to learn a free port, then drop the listener before posting
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RelayClient::with_base_url(format!("http://{addr}/attendance"), "t".to_string());
    let result = client.push_record(&punch()).await;
    assert_err!(&result);
    assert!(matches!(
        result.unwrap_err(),
        BridgeError::RelayTransport(_)
    ));
}
