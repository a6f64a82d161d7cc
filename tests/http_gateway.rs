use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{TimeDelta, Utc};
use hospital_records::{
    config::Config,
    db::{pool::ConnectionPool, postgres::PgConnector},
    error::Result,
    handlers::routes::route_table,
    models::{envelope::Reply, session::Role},
    server::{self, Gateway},
    services::{
        dispatcher::Dispatcher,
        sessions::{ManualClock, SessionStore},
    },
    state::AppState,
};
use sonic_rs::{JsonValueTrait, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn gateway_with(state: AppState) -> (Gateway, Router) {
    let gateway = Gateway::new(state, route_table().unwrap());
    let router = server::router(gateway.clone());
    (gateway, router)
}

fn gateway() -> (Gateway, Router) {
    gateway_with(AppState::unconnected(Config::default()))
}

async fn post_api(router: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, sonic_rs::from_slice(&bytes).unwrap())
}

async fn call(router: &Router, api: &str, data: Value) -> (StatusCode, Value) {
    let body = sonic_rs::to_string(&json!({ "api": api, "data": data })).unwrap();
    post_api(router, body).await
}

fn code(envelope: &Value) -> Option<u64> {
    envelope.get("code").and_then(|v| v.as_u64())
}

async fn health(router: &Router) -> Value {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    sonic_rs::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_pool_and_sessions() {
    let (gateway, router) = gateway();
    gateway.state().sessions.issue(1, Role::Patient, "Alice");

    let envelope = health(&router).await;
    assert_eq!(envelope.get("status").and_then(|v| v.as_str()), Some("success"));
    let data = envelope.get("data").unwrap();
    assert_eq!(data.get("activeSessions").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(data.get("idleConnections").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(data.get("maxConnections").and_then(|v| v.as_u64()), Some(10));
}

#[tokio::test]
async fn http_status_mirrors_envelope_code() {
    let (_, router) = gateway();

    let (status, envelope) = post_api(&router, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code(&envelope), Some(400));

    let (status, envelope) = call(&router, "patient.chat.send", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code(&envelope), Some(404));
    assert_eq!(
        envelope.get("message").and_then(|v| v.as_str()),
        Some("API not found: patient.chat.send")
    );
}

#[tokio::test]
async fn invalid_utf8_body_is_a_malformed_request() {
    let (_, router) = gateway();
    let (status, envelope) = post_api(&router, vec![0xff, 0xfe, 0x7b]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code(&envelope), Some(400));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (_, router) = gateway();
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .body(Body::from(vec![b' '; 2 * 1024 * 1024]))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn protected_apis_require_a_token() {
    let (_, router) = gateway();

    for api in [
        "patient.auth.logout",
        "patient.profile.get",
        "doctor.appointment.list",
        "system.stats",
    ] {
        let (status, envelope) = call(&router, api, json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "api: {api}");
        assert_eq!(
            envelope.get("message").and_then(|v| v.as_str()),
            Some("Missing authentication token"),
            "api: {api}"
        );
    }
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let (gateway, router) = gateway();
    let doctor = gateway.state().sessions.issue(3, Role::Doctor, "Dr. Li");
    let patient = gateway.state().sessions.issue(4, Role::Patient, "Bob");

    let (status, _) = call(&router, "patient.profile.get", json!({ "token": doctor })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&router, "system.stats", json!({ "token": patient })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let (gateway, router) = gateway();
    let token = gateway.state().sessions.issue(4, Role::Patient, "Bob");

    let (status, envelope) = call(&router, "patient.auth.logout", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        envelope.get("message").and_then(|v| v.as_str()),
        Some("Logout successful")
    );

    let (status, envelope) = call(&router, "patient.auth.logout", json!({ "token": token })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        envelope.get("message").and_then(|v| v.as_str()),
        Some("Invalid authentication token")
    );
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_the_store() {
    let (gateway, router) = gateway();

    let (status, envelope) =
        call(&router, "public.doctor.get", json!({ "doctorId": "DOC1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        envelope.get("message").and_then(|v| v.as_str()),
        Some("Invalid doctorId format")
    );

    let doctor = gateway.state().sessions.issue(3, Role::Doctor, "Dr. Li");
    let (status, _) = call(
        &router,
        "doctor.patient.getMedicalRecords",
        json!({ "token": doctor, "patientId": "patient-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &router,
        "doctor.prescription.create",
        json!({ "token": doctor, "patientId": "pat_9", "medicines": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn registration(email: &str, password: &str, date_of_birth: &str) -> Value {
    json!({
        "email": email,
        "password": password,
        "name": "Alice",
        "idCardNumber": "11010519491231002X",
        "dateOfBirth": date_of_birth
    })
}

#[tokio::test]
async fn registration_validates_input_before_the_store() {
    let (_, router) = gateway();

    for data in [
        registration("alice", "secret123", "1990-04-02"),
        registration("alice@example.com", "abc", "1990-04-02"),
        registration("alice@example.com", "secret123", "02/04/1990"),
        registration("alice@example.com", "secret123", "2999-01-01"),
        json!({ "email": "a@b.cn" }),
    ] {
        let (status, envelope) = call(&router, "patient.auth.register", data).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code(&envelope), Some(400));
    }
}

#[tokio::test]
async fn requests_sweep_idle_sessions() {
    let config = Config::default();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let sessions = SessionStore::with_clock(TimeDelta::hours(24), clock.clone());
    let pool = ConnectionPool::new(PgConnector, config.connect_params(), config.db_pool_size);
    let (gateway, router) = gateway_with(AppState::from_parts(config, pool, sessions));

    gateway.state().sessions.issue(1, Role::Patient, "Alice");
    gateway.state().sessions.issue(2, Role::Patient, "Bob");
    clock.advance(TimeDelta::hours(25));
    let fresh = gateway.state().sessions.issue(3, Role::Patient, "Carol");
    assert_eq!(gateway.state().sessions.active_count(), 3);

    let (status, _) = call(&router, "patient.auth.logout", json!({ "token": fresh })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.state().sessions.active_count(), 0);
}

#[tokio::test]
async fn process_file_writes_a_response_envelope() {
    let (gateway, _) = gateway();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("request.json");
    let output = dir.path().join("response.json");

    std::fs::write(&input, r#"{"api":"public.doctor.get","data":{"doctorId":"x"}}"#).unwrap();
    let envelope = server::process_file(&gateway, &input, &output).await.unwrap();
    assert_eq!(envelope.code, 400);

    let written: Value = sonic_rs::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(code(&written), Some(400));
    assert_eq!(written.get("status").and_then(|v| v.as_str()), Some("error"));
}

#[tokio::test]
async fn process_file_reports_unreadable_input_as_500() {
    let (gateway, _) = gateway();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("response.json");

    let envelope = server::process_file(&gateway, &dir.path().join("missing.json"), &output)
        .await
        .unwrap();
    assert_eq!(envelope.code, 500);

    let written: Value = sonic_rs::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(code(&written), Some(500));
    assert_eq!(
        written.get("message").and_then(|v| v.as_str()),
        Some("Internal server error")
    );
}

async fn slow(_state: AppState, _data: Value) -> Result<Reply> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(Reply::ok("Too late", json!({})))
}

#[tokio::test]
async fn requests_past_the_timeout_get_a_500_envelope() {
    let config = Config {
        request_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let dispatcher = Dispatcher::builder()
        .register("test.slow", slow)
        .unwrap()
        .build();
    let router = server::router(Gateway::new(AppState::unconnected(config), dispatcher));

    let (status, envelope) = call(&router, "test.slow", json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(code(&envelope), Some(500));
    assert_eq!(envelope.get("status").and_then(|v| v.as_str()), Some("error"));
    assert_eq!(
        envelope.get("message").and_then(|v| v.as_str()),
        Some("Internal server error")
    );
}
