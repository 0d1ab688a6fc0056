use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use staffgate_api::app::{self, services::AppServices};
use staffgate_core::{StaffId, STAFF_COLLECTION};
use staffgate_infra::document_store::{InMemoryDocumentStore, StoreOp};
use staffgate_infra::identity::{IdentityOp, InMemoryIdentityProvider};
use staffgate_infra::repairs::InMemoryRepairLog;
use staffgate_infra::{CompensationPolicy, StaffProvisioner};

struct TestServer {
    base_url: String,
    identity: Arc<InMemoryIdentityProvider>,
    store: Arc<InMemoryDocumentStore>,
    repairs: Arc<InMemoryRepairLog>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(policy: CompensationPolicy) -> Self {
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let repairs = Arc::new(InMemoryRepairLog::new());
        let provisioner = StaffProvisioner::new(identity.clone(), store.clone(), repairs.clone())
            .with_policy(policy)
            .with_timeout(Duration::from_secs(2));

        let app = app::build_app(Arc::new(AppServices::ready(Arc::new(provisioner))));
        let (base_url, handle) = serve(app).await;

        Self {
            base_url,
            identity,
            store,
            repairs,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn record(&self, id: &StaffId) -> Option<serde_json::Map<String, Value>> {
        self.store.document(STAFF_COLLECTION, id.as_str())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// Same router as prod, bound to an ephemeral port.
async fn serve(app: axum::Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

fn nurse(email: &str) -> Value {
    json!({
        "email": email,
        "password": "hunter22",
        "name": "Carla Espinosa",
        "role": "nurse",
        "phoneNumber": "555-0199",
        "licenseNumber": "RN-1001",
    })
}

async fn create(client: &reqwest::Client, srv: &TestServer, body: &Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url("/api/create-staff"))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn set_status(
    client: &reqwest::Client,
    srv: &TestServer,
    id: &str,
    body: &Value,
) -> (StatusCode, Value) {
    let res = client
        .patch(srv.url(&format!("/api/staff/{id}/status")))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn provisioned(client: &reqwest::Client, srv: &TestServer, email: &str) -> StaffId {
    let (status, body) = create(client, srv, &nurse(email)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["uid"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_reports_running() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;

    let res = reqwest::get(srv.url("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "Server is running" }));
}

#[tokio::test]
async fn create_staff_provisions_identity_and_record() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();

    let (status, body) = create(&client, &srv, &nurse("carla@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Staff member created successfully");

    let id: StaffId = body["uid"].as_str().unwrap().parse().unwrap();
    let account = srv.identity.account(&id).unwrap();
    assert_eq!(account.role(), Some("nurse"));
    assert!(!account.disabled);

    let record = srv.record(&id).unwrap();
    assert_eq!(record["email"], "carla@example.com");
    assert_eq!(record["role"], "nurse");
    assert_eq!(record["isActive"], true);
    assert_eq!(record["specialty"], "");
    assert!(record["createdAt"].is_string());
}

#[tokio::test]
async fn create_staff_missing_fields_is_400_without_side_effects() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();

    for field in ["email", "password", "name", "role"] {
        let mut body = nurse("carla@example.com");
        body.as_object_mut().unwrap().remove(field);

        let (status, res) = create(&client, &srv, &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "missing {field}");
        assert_eq!(res["success"], false);
        assert_eq!(res["message"], "Missing required fields");
        assert_eq!(res["missing"], json!([field]));
    }

    let mut empty = nurse("carla@example.com");
    empty["name"] = json!("");
    let (status, _) = create(&client, &srv, &empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(srv.identity.accounts().is_empty());
    assert_eq!(srv.store.count(STAFF_COLLECTION), 0);
}

#[tokio::test]
async fn create_staff_invalid_role_lists_valid_roles() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();

    let mut body = nurse("carla@example.com");
    body["role"] = json!("janitor");

    let (status, res) = create(&client, &srv, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res["message"],
        "Invalid role. Must be one of: doctor, nurse, receptionist, admin"
    );
    assert!(srv.identity.accounts().is_empty());
}

#[tokio::test]
async fn malformed_and_unknown_fields_are_400() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/create-staff"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);

    let mut extra = nurse("carla@example.com");
    extra["isAdmin"] = json!(true);
    let (status, _) = create(&client, &srv, &extra).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = set_status(&client, &srv, "abc", &json!({ "isActive": "yes" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(srv.identity.accounts().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_clean_abort() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    provisioned(&client, &srv, "carla@example.com").await;

    let (status, body) = create(&client, &srv, &nurse("carla@example.com")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to create staff member");
    assert_eq!(
        body["error"],
        "The email address is already in use by another account."
    );
    assert_eq!(body["stage"], "create_identity");
    assert_eq!(body["partial"], false);
    assert_eq!(srv.identity.accounts().len(), 1);
    assert_eq!(srv.store.count(STAFF_COLLECTION), 1);
}

#[tokio::test]
async fn role_failure_leaves_reported_orphan_when_recording_only() {
    let srv = TestServer::spawn(CompensationPolicy::RecordOnly).await;
    let client = reqwest::Client::new();
    srv.identity
        .faults()
        .fail_on(IdentityOp::SetCustomAttributes, "claims service down");

    let (status, body) = create(&client, &srv, &nurse("carla@example.com")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "claims service down");
    assert_eq!(body["stage"], "assign_role");
    assert_eq!(body["partial"], true);
    assert_eq!(body["compensated"], false);
    assert!(body["repairId"].is_string());

    // Orphan: identity without role and without record.
    let accounts = srv.identity.accounts();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].role(), None);
    assert_eq!(srv.store.count(STAFF_COLLECTION), 0);
    assert_eq!(srv.repairs.snapshot().len(), 1);
}

#[tokio::test]
async fn role_failure_is_compensated_by_default() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    srv.identity
        .faults()
        .fail_on(IdentityOp::SetCustomAttributes, "claims service down");

    let (status, body) = create(&client, &srv, &nurse("carla@example.com")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["partial"], true);
    assert_eq!(body["compensated"], true);
    assert!(body.get("repairId").is_none());
    assert!(srv.identity.accounts().is_empty());
    assert!(srv.repairs.snapshot().is_empty());
}

#[tokio::test]
async fn explicit_false_deactivates() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;

    let (status, body) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Staff member deactivated successfully");
    assert_eq!(srv.record(&id).unwrap()["isActive"], false);
    assert!(srv.identity.account(&id).unwrap().disabled);

    let (status, body) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Staff member activated successfully");
    assert!(!srv.identity.account(&id).unwrap().disabled);
}

#[tokio::test]
async fn missing_is_active_is_400() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;

    for body in [json!({}), json!({ "isActive": null })] {
        let (status, res) = set_status(&client, &srv, id.as_str(), &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(res["message"], "isActive status is required");
    }
    assert_eq!(srv.record(&id).unwrap()["isActive"], true);
}

#[tokio::test]
async fn repeated_toggle_is_idempotent() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;

    for _ in 0..2 {
        let (status, _) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": false })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(srv.record(&id).unwrap()["isActive"], false);
        assert!(srv.identity.account(&id).unwrap().disabled);
    }
}

#[tokio::test]
async fn mirror_failure_leaves_drift_until_swept() {
    let srv = TestServer::spawn(CompensationPolicy::RecordOnly).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;
    srv.identity
        .faults()
        .fail_on(IdentityOp::UpdateAccount, "provider unavailable");

    let (status, body) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": false })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to update staff status");
    assert_eq!(body["stage"], "mirror_identity");
    assert_eq!(body["partial"], true);
    assert_eq!(body["compensated"], false);

    // Drift: store says inactive, provider still enabled.
    assert_eq!(srv.record(&id).unwrap()["isActive"], false);
    assert!(!srv.identity.account(&id).unwrap().disabled);

    let res = client.get(srv.url("/api/reconciliation")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let pending: Value = res.json().await.unwrap();
    assert_eq!(pending["pending"].as_array().unwrap().len(), 1);
    assert_eq!(pending["pending"][0]["kind"], "status_drift");
    assert_eq!(pending["pending"][0]["staffId"], id.as_str());

    srv.identity.faults().clear_all();
    let res = client
        .post(srv.url("/api/reconciliation/run"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["repaired"], 1);
    assert_eq!(report["remaining"], 0);
    assert!(srv.identity.account(&id).unwrap().disabled);
    assert!(srv.repairs.snapshot().is_empty());
}

#[tokio::test]
async fn mirror_failure_restores_record_by_default() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;
    srv.identity
        .faults()
        .fail_on(IdentityOp::UpdateAccount, "provider unavailable");

    let (status, body) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": false })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["compensated"], true);
    assert_eq!(srv.record(&id).unwrap()["isActive"], true);
    assert!(!srv.identity.account(&id).unwrap().disabled);
}

#[tokio::test]
async fn record_update_failure_does_not_touch_provider() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = provisioned(&client, &srv, "carla@example.com").await;
    srv.store.faults().fail_on(StoreOp::Update, "write quota exceeded");

    let (status, body) = set_status(&client, &srv, id.as_str(), &json!({ "isActive": false })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["stage"], "update_record");
    assert_eq!(body["partial"], false);
    assert_eq!(body["error"], "write quota exceeded");
    assert_eq!(srv.record(&id).unwrap()["isActive"], true);
    assert!(!srv.identity.account(&id).unwrap().disabled);
}

#[tokio::test]
async fn unknown_staff_id_is_500() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();

    let (status, body) = set_status(&client, &srv, "nobody", &json!({ "isActive": true })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["partial"], false);
    assert!(body["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn overlong_staff_id_is_not_found() {
    let srv = TestServer::spawn(CompensationPolicy::Compensate).await;
    let client = reqwest::Client::new();
    let id = "x".repeat(129);

    let (status, body) = set_status(&client, &srv, &id, &json!({ "isActive": true })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to update staff status");
    assert_eq!(body["stage"], "load_record");
    assert_eq!(body["partial"], false);
    assert_eq!(body["error"], format!("No staff record for id {id}"));
}

#[tokio::test]
async fn unavailable_backends_answer_503_but_health_is_up() {
    let app = app::build_app(Arc::new(AppServices::unavailable("DATABASE_URL is not set")));
    let (base_url, handle) = serve(app).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{base_url}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{base_url}/api/create-staff"))
        .json(&nurse("carla@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "DATABASE_URL is not set");

    let res = client
        .patch(format!("{base_url}/api/staff/abc/status"))
        .json(&json!({ "isActive": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .post(format!("{base_url}/api/reconciliation/run"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    handle.abort();
}
