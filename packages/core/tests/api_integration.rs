//! End-to-end tests for the notification service.
//!
//! Each test wires the same components `main.rs` does: an in-memory SQLite
//! pool with migrations applied, the repository, a dispatcher with
//! wiremocked push and email relays, the reminder scanner, and the HTTP
//! router driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use vet_notifier::{
    api,
    config::ReminderPolicy,
    db,
    metrics::AppMetrics,
    models::{NewNotification, NotificationType},
    notify::{EmailChannel, NotificationDispatcher, NotificationHub, PushChannel},
    repository::NotificationRepository,
    scheduler::ReminderScanner,
};

// ---- Helpers ----------------------------------------------------------------

struct TestApp {
    router: Router,
    scanner: ReminderScanner,
    dispatcher: Arc<NotificationDispatcher>,
    repository: Arc<NotificationRepository>,
    relay: MockServer,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 7, 30, 0).unwrap()
}

async fn build_test_app() -> TestApp {
    let relay = MockServer::start().await;

    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    let repository = Arc::new(NotificationRepository::new(pool));
    let metrics = Arc::new(AppMetrics::new().unwrap());

    let dispatcher = Arc::new(
        NotificationDispatcher::new(repository.clone(), NotificationHub::default(), metrics.clone())
            .with_channel(Arc::new(PushChannel::new(format!("{}/push", relay.uri()))))
            .with_channel(Arc::new(EmailChannel::new(format!("{}/mail", relay.uri())))),
    );
    let scanner = ReminderScanner::new(
        dispatcher.clone(),
        ReminderPolicy::default(),
        100,
        metrics.clone(),
    );

    TestApp {
        router: api::router(metrics),
        scanner,
        dispatcher,
        repository,
        relay,
    }
}

async fn seed_owner_with_pet(pool: &SqlitePool, email: &str, push_token: Option<&str>) -> (i64, i64) {
    let owner = sqlx::query(
        "INSERT INTO users (email, password_hash, first_name, push_token) VALUES (?, 'x', 'Jo', ?)",
    )
    .bind(email)
    .bind(push_token)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();

    let pet = sqlx::query("INSERT INTO pets (owner_id, name, species) VALUES (?, 'Biscuit', 'cat')")
        .bind(owner)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();

    (owner, pet)
}

async fn seed_appointment(pool: &SqlitePool, pet: i64, owner: i64, date: &str, time: &str) -> i64 {
    sqlx::query(
        "INSERT INTO appointments (pet_id, owner_id, appointment_date, appointment_time, reason)
         VALUES (?, ?, ?, ?, 'Vaccination visit')",
    )
    .bind(pet)
    .bind(owner)
    .bind(date)
    .bind(time)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

async fn mount_relay(relay: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(status))
        .mount(relay)
        .await;
    Mock::given(method("POST"))
        .and(path("/mail"))
        .respond_with(ResponseTemplate::new(status))
        .mount(relay)
        .await;
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let resp = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// ---- HTTP surface -----------------------------------------------------------

#[tokio::test]
async fn health_returns_200_with_ok_body() {
    let app = build_test_app().await;
    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn metrics_endpoint_uses_prometheus_content_type() {
    let app = build_test_app().await;
    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain; version=0.0.4");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app().await;
    let (status, _) = get(&app.router, "/alerts/config").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---- Reminder flow ----------------------------------------------------------

#[tokio::test]
async fn appointment_reminder_reaches_push_and_email_relays() {
    let app = build_test_app().await;
    let pool = app.repository.pool();
    let (owner, pet) = seed_owner_with_pet(pool, "jo@example.com", Some("device-jo")).await;
    let appointment = seed_appointment(pool, pet, owner, "2026-09-01", "16:00:00").await;

    Mock::given(method("POST"))
        .and(path("/push"))
        .and(body_partial_json(serde_json::json!({
            "to": "device-jo",
            "title": "Upcoming appointment",
            "data": { "appointment_id": appointment, "notification_type": "appointment_reminder" }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.relay)
        .await;
    Mock::given(method("POST"))
        .and(path("/mail"))
        .and(body_partial_json(serde_json::json!({ "to": "jo@example.com" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.relay)
        .await;

    let summary = app.scanner.scan_once(now()).await;
    assert_eq!(summary.appointment_reminders, 1);
    assert_eq!(summary.errors, 0);

    let inbox = app.repository.list_for_user(owner, 10, true).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(
        inbox[0].message,
        "Biscuit has an appointment today at 16:00 (Vaccination visit)."
    );
    assert!(inbox[0].is_sent);

    let (_, body) = get(&app.router, "/metrics").await;
    assert!(body.contains("vet_notifier_deliveries_total{channel=\"push\"} 1"));
    assert!(body.contains("vet_notifier_deliveries_total{channel=\"email\"} 1"));
    assert!(body.contains(
        "vet_notifier_notifications_created_total{type=\"appointment_reminder\"} 1"
    ));
}

#[tokio::test]
async fn relay_outage_is_logged_not_retried() {
    let app = build_test_app().await;
    let pool = app.repository.pool();
    let (owner, pet) = seed_owner_with_pet(pool, "jo@example.com", Some("device-jo")).await;
    seed_appointment(pool, pet, owner, "2026-09-02", "07:00:00").await;
    mount_relay(&app.relay, 503).await;

    let summary = app.scanner.scan_once(now()).await;
    assert_eq!(summary.appointment_reminders, 1);

    // One attempt per channel, then the row is done.
    let requests = app.relay.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let second = app.scanner.scan_once(now() + Duration::minutes(5)).await;
    assert_eq!(second.appointment_reminders, 0);
    assert_eq!(app.relay.received_requests().await.unwrap().len(), 2);

    let (_, body) = get(&app.router, "/metrics").await;
    assert!(body.contains("vet_notifier_delivery_failures_total{channel=\"push\"} 1"));
}

#[tokio::test]
async fn owner_without_push_token_still_gets_email() {
    let app = build_test_app().await;
    let pool = app.repository.pool();
    let (owner, pet) = seed_owner_with_pet(pool, "jo@example.com", None).await;
    seed_appointment(pool, pet, owner, "2026-09-01", "12:00:00").await;
    mount_relay(&app.relay, 200).await;

    app.scanner.scan_once(now()).await;

    let requests = app.relay.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/mail");
}

#[tokio::test]
async fn scheduled_notification_waits_for_its_time() {
    let app = build_test_app().await;
    let pool = app.repository.pool();
    let (owner, _) = seed_owner_with_pet(pool, "jo@example.com", Some("device-jo")).await;
    mount_relay(&app.relay, 200).await;

    let new = NewNotification::new(
        owner,
        NotificationType::MedicationReminder,
        "Medication",
        "Time for Biscuit's antibiotics",
    )
    .scheduled_for(now() + Duration::hours(2));
    let created = app.dispatcher.create(&new, now()).await.unwrap();
    assert!(!created.is_sent);
    assert_eq!(app.repository.unread_count(owner).await.unwrap(), 0);

    app.scanner.scan_once(now() + Duration::hours(1)).await;
    assert!(app.relay.received_requests().await.unwrap().is_empty());

    let summary = app.scanner.scan_once(now() + Duration::hours(2)).await;
    assert_eq!(summary.scheduled_sent, 1);
    assert_eq!(app.relay.received_requests().await.unwrap().len(), 2);
    assert_eq!(app.repository.unread_count(owner).await.unwrap(), 1);
}

#[tokio::test]
async fn realtime_subscriber_sees_vaccination_reminder() {
    let app = build_test_app().await;
    let pool = app.repository.pool();
    let (owner, pet) = seed_owner_with_pet(pool, "jo@example.com", None).await;
    sqlx::query(
        "INSERT INTO vaccinations (pet_id, vaccine_name, administered_date, next_due_date)
         VALUES (?, 'FVRCP', '2025-09-03', '2026-09-03')",
    )
    .bind(pet)
    .execute(pool)
    .await
    .unwrap();
    mount_relay(&app.relay, 200).await;

    let mut subscription = app.dispatcher.hub().subscribe(owner);
    let summary = app.scanner.scan_once(now()).await;
    assert_eq!(summary.vaccination_reminders, 1);

    let received = subscription.recv().await.unwrap();
    assert_eq!(received.notification_type, NotificationType::VaccinationDue);
    assert_eq!(
        received.message,
        "Biscuit's FVRCP vaccination is due on Thursday, September 3."
    );
}
