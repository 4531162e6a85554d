use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use sheetdesk::app::{AppState, router};
use sheetdesk::config::AppConfig;
use sheetdesk::error::NotificationError;
use sheetdesk::form::FormField;
use sheetdesk::notify::Notifier;
use sheetdesk::transport::MemoryTransport;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const REQUESTS: &str = "requests-sheet";
const FORM: &str = "form-sheet";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), NotificationError> {
        if self.fail_for.as_deref() == Some(recipient) {
            return Err(NotificationError::Rejected {
                recipient: recipient.to_string(),
                status: 403,
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(&self, recipient: &str, image_url: &str, _caption: &str) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), format!("image:{image_url}")));
        Ok(())
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryTransport>,
    notifier: Arc<RecordingNotifier>,
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sheets.requests_url = format!("https://docs.google.com/spreadsheets/d/{REQUESTS}/edit");
    config.sheets.requests_range = "A:O".to_string();
    config.sheets.form_url = FORM.to_string();
    config.sheets.form_range = "A:O".to_string();
    config.sheets.cache_ttl_secs = 0;
    config.notify.recipients = vec!["ops".to_string()];
    config
}

fn harness_with(notifier: RecordingNotifier) -> Harness {
    let store = Arc::new(MemoryTransport::new());
    store.seed(REQUESTS, "Sheet1", vec![FormField::default_headers()]);

    let mut options = vec![String::new(); 11];
    options[1] = "Maintenance".to_string();
    options[2] = "Repair".to_string();
    options[10] = "1001".to_string();
    store.seed(FORM, "Sheet1", vec![FormField::default_headers(), options]);

    let notifier = Arc::new(notifier);
    let state = AppState::new(&config(), store.clone(), Some(notifier.clone())).unwrap();
    Harness {
        app: router(Arc::new(state)),
        store,
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::default())
}

fn valid_request() -> Value {
    json!({
        "name": "Sam Vanthorn",
        "assigned_to": "Maintenance",
        "topic": "Repair",
        "description": "",
        "amount": 2,
        "unit": "pcs",
        "room": "R101",
        "building": "B1",
        "zone": "North",
        "contact": "012 345 678",
        "request_date": "2025-10-01",
        "to_date": "2025-10-03"
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_check() {
    let h = harness();
    let (status, body) = send_json(&h.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn valid_submission_is_stored_and_announced() {
    let h = harness();
    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["confirmation"]["updated_cells"], 15);
    assert_eq!(body["deliveries"].as_array().unwrap().len(), 2);

    let grid = h.store.snapshot(REQUESTS, "Sheet1");
    assert_eq!(grid.len(), 2);
    let row = &grid[1];
    assert_eq!(row.len(), 15);
    assert_eq!(row[0], "Sam Vanthorn");
    assert_eq!(row[3], "—");
    assert_eq!(row[4], "2 pcs");
    assert_eq!(row[5], "pcs");
    assert_eq!(row[8], "North");
    assert_eq!(row[10], "");
    assert_eq!(row[13], "2025-10-01");
    assert_eq!(row[14], "2025-10-03");

    let sent = h.notifier.sent.lock().unwrap();
    let recipients: Vec<&str> = sent.iter().map(|(r, _)| r.as_str()).collect();
    assert_eq!(recipients, vec!["ops", "1001"]);
    assert!(sent[0].1.contains("*Name:* Sam Vanthorn"));
}

#[tokio::test]
async fn image_goes_out_as_second_call() {
    let h = harness();
    let mut request = valid_request();
    request["image_url"] = json!("https://drive.example.com/img.png");
    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(request)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["deliveries"][0]["image_sent"], true);

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[1], ("ops".to_string(), "image:https://drive.example.com/img.png".to_string()));
}

#[tokio::test]
async fn invalid_submission_reports_every_violation_and_writes_nothing() {
    let h = harness();
    let mut request = valid_request();
    request["name"] = json!("  ");
    request["amount"] = json!(0);
    request["contact"] = json!("");
    request["zone"] = json!("");

    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let codes: Vec<&str> = body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert_eq!(
        codes,
        vec!["name_required", "amount_not_positive", "zone_required", "contact_required"]
    );
    assert_eq!(body["violations"][1]["message"], "Amount must be greater than zero.");

    assert_eq!(h.store.snapshot(REQUESTS, "Sheet1").len(), 1);
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn append_failure_echoes_the_request() {
    let h = harness();
    h.store.set_unreachable(true);

    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["request"]["name"], "Sam Vanthorn");
    assert_eq!(body["request"]["request_date"], "2025-10-01");
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn requests_sheet_with_other_headers_is_not_written() {
    let h = harness();
    let custom: Vec<String> = ["ឈ្មោះ/Name", "Assign To", "Topic *", "Description *", "Amount"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    h.store.seed(REQUESTS, "Sheet1", vec![custom]);

    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["request"]["name"], "Sam Vanthorn");
    assert_eq!(h.store.snapshot(REQUESTS, "Sheet1").len(), 1);
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn notification_failure_does_not_undo_the_append() {
    let h = harness_with(RecordingNotifier {
        fail_for: Some("ops".to_string()),
        ..RecordingNotifier::default()
    });

    let (status, body) = send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["deliveries"][0]["message_sent"], false);
    assert_eq!(body["deliveries"][1]["message_sent"], true);
    assert_eq!(h.store.snapshot(REQUESTS, "Sheet1").len(), 2);
}

#[tokio::test]
async fn form_definition_comes_from_the_form_sheet() {
    let h = harness();
    let (status, body) = send_json(&h.app, "GET", "/api/form", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Production Request Form");
    assert_eq!(body["source"]["state"], "ok");

    let fields = body["fields"].as_array().unwrap();
    let assigned = fields.iter().find(|f| f["field"] == "assigned_to").unwrap();
    assert_eq!(assigned["options"], json!(["Maintenance"]));
    let zone = fields.iter().find(|f| f["field"] == "zone").unwrap();
    assert_eq!(zone["label"], "Zoon");
}

#[tokio::test]
async fn form_definition_falls_back_to_defaults_when_unreachable() {
    let h = harness();
    h.store.set_unreachable(true);
    let (status, body) = send_json(&h.app, "GET", "/api/form", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"]["state"], "unreachable");
    assert_eq!(body["submit_label"], "Submit");
}

#[tokio::test]
async fn dashboard_reflects_submissions() {
    let h = harness();
    let (_, empty) = send_json(&h.app, "GET", "/api/dashboard", None).await;
    assert_eq!(empty["source"]["state"], "empty");
    assert_eq!(empty["total_requests"], 0);
    assert_eq!(empty["busiest_date"], "N/A");

    send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;
    let mut second = valid_request();
    second["request_date"] = json!("2025-10-02");
    send_json(&h.app, "POST", "/api/requests", Some(second)).await;
    let mut third = valid_request();
    third["name"] = json!("Dara");
    send_json(&h.app, "POST", "/api/requests", Some(third)).await;

    let (status, report) = send_json(&h.app, "GET", "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["source"]["state"], "ok");
    assert_eq!(report["total_requests"], 3);
    assert_eq!(report["unique_users"], 2);
    assert_eq!(report["busiest_date"], "2025-10-01");
    assert_eq!(report["by_requester"][0]["label"], "Sam Vanthorn");
    assert_eq!(report["by_requester"][0]["count"], 2);
    assert_eq!(report["retention"]["one_time"], 1);
    assert_eq!(report["retention"]["repeat"], 1);
    assert_eq!(report["daily"][1]["cumulative"], 3);
    assert_eq!(report["by_location"][0]["count"], 3);
}

#[tokio::test]
async fn unreachable_dashboard_still_renders() {
    let h = harness();
    h.store.set_unreachable(true);
    let (status, report) = send_json(&h.app, "GET", "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["source"]["state"], "unreachable");
    assert_eq!(report["total_requests"], 0);
}

#[tokio::test]
async fn stored_rows_are_listed_and_exported() {
    let h = harness();
    send_json(&h.app, "POST", "/api/requests", Some(valid_request())).await;

    let (status, body) = send_json(&h.app, "GET", "/api/requests", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema"].as_array().unwrap().len(), 15);
    assert_eq!(body["rows"][0][0], "Sam Vanthorn");

    let (status, csv) = send(&h.app, "GET", "/api/export/csv", None).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("Name,Assigned To,Topic,"));
    assert!(csv.lines().nth(1).unwrap().starts_with("Sam Vanthorn,Maintenance,Repair,—,2 pcs"));

    let (status, xlsx) = send(&h.app, "GET", "/api/export/xlsx", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&xlsx[..2], b"PK");
}

#[tokio::test]
async fn export_of_unreachable_store_is_503() {
    let h = harness();
    h.store.set_unreachable(true);
    let (status, _) = send(&h.app, "GET", "/api/export/csv", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
