//! 线索提交与管理端 API 集成测试

use advisory_api::{
    models::{lead::LeadStatus, user::Role},
    repository::InquiryRepository,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use uuid::Uuid;

mod common;
use common::{create_test_config, TestApp};

fn contact_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "email": "lead@example.com",
        "phone": "+91 98765 43210",
        "subject": "GST filing",
        "message": "Please call me back about quarterly returns."
    })
}

fn inquiry_body(service_type: &str) -> serde_json::Value {
    json!({
        "serviceType": service_type,
        "name": "Ravi",
        "email": "ravi@example.com",
        "companyName": "Ravi Traders",
        "requirements": "Annual compliance"
    })
}

#[tokio::test]
async fn test_contact_submit_records_client_metadata() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/contact/submit")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::USER_AGENT, "integration-test/1.0")
                .body(Body::from(contact_body("Meera").to_string()))
                .unwrap(),
        )
        .await;
    let (status, body) = response;

    assert_eq!(status, StatusCode::CREATED);
    let id: Uuid = body["submissionId"].as_str().unwrap().parse().unwrap();

    let admin = app.seed_user("admin@example.com", Role::Admin).await;
    let token = app.login(&admin.email).await;
    let (status, list) = app.get("/api/contact/submissions", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let row = &list["submissions"][0];
    assert_eq!(row["id"], id.to_string());
    assert_eq!(row["status"], "new");
    assert_eq!(row["ip_address"], "127.0.0.1");
    assert_eq!(row["user_agent"], "integration-test/1.0");
}

#[tokio::test]
async fn test_contact_submit_validates_input() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/contact/submit",
            json!({ "name": "", "email": "bad", "message": "" }),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let app = TestApp::new();

    for uri in ["/api/contact/submissions", "/api/services/inquiries"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"]["message"], "Access token required");
    }

    let (status, _) = app
        .put(
            &format!("/api/contact/submissions/{}", Uuid::new_v4()),
            json!({ "status": "resolved" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_forbid_plain_users() {
    let app = TestApp::new();
    app.seed_user("user@example.com", Role::User).await;
    let token = app.login("user@example.com").await;

    for uri in ["/api/contact/submissions", "/api/services/inquiries"] {
        let (status, body) = app.get(uri, Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"]["message"], "Insufficient permissions");
    }
}

#[tokio::test]
async fn test_admin_routes_allow_staff_roles() {
    let app = TestApp::new();

    for (email, role) in [
        ("admin@example.com", Role::Admin),
        ("manager@example.com", Role::Manager),
    ] {
        app.seed_user(email, role).await;
        let token = app.login(email).await;

        let (status, body) = app.get("/api/contact/submissions", Some(&token)).await;
        assert_eq!(status, StatusCode::OK, "{}", email);
        assert!(body["submissions"].is_array());
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["limit"], 10);
    }
}

#[tokio::test]
async fn test_role_demotion_applies_to_existing_token() {
    let app = TestApp::new();
    let manager = app.seed_user("manager@example.com", Role::Manager).await;
    let token = app.login(&manager.email).await;

    let (status, _) = app.get("/api/services/inquiries", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    app.users.set_role(manager.id, Role::User).await;

    let (status, _) = app.get("/api/services/inquiries", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_configured_admin_roles() {
    let mut config = create_test_config();
    config.security.admin_roles = "admin".to_string();
    let app = TestApp::with_config(config);

    app.seed_user("manager@example.com", Role::Manager).await;
    let token = app.login("manager@example.com").await;

    let (status, _) = app.get("/api/contact/submissions", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_contact_status_update() {
    let app = TestApp::new();
    let (_, created) = app
        .post("/api/contact/submit", contact_body("Meera"), None)
        .await;
    let id = created["submissionId"].as_str().unwrap().to_string();

    app.seed_user("admin@example.com", Role::Admin).await;
    let token = app.login("admin@example.com").await;

    let (status, body) = app
        .put(
            &format!("/api/contact/submissions/{}", id),
            json!({ "status": "in_progress", "notes": "Called once" }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Contact submission updated successfully");
    assert_eq!(body["submission"]["status"], "in_progress");
    assert_eq!(body["submission"]["notes"], "Called once");

    // 未提供备注时保留原备注
    let (_, body) = app
        .put(
            &format!("/api/contact/submissions/{}", id),
            json!({ "status": "resolved" }),
            Some(&token),
        )
        .await;
    assert_eq!(body["submission"]["status"], "resolved");
    assert_eq!(body["submission"]["notes"], "Called once");

    let (status, list) = app
        .get("/api/contact/submissions?status=resolved", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_update_missing_submission_is_not_found() {
    let app = TestApp::new();
    app.seed_user("admin@example.com", Role::Admin).await;
    let token = app.login("admin@example.com").await;

    let (status, _) = app
        .put(
            &format!("/api/services/inquiries/{}", Uuid::new_v4()),
            json!({ "status": "closed" }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_contact_pagination_clamps() {
    let app = TestApp::new();
    for i in 0..3 {
        app.post("/api/contact/submit", contact_body(&format!("lead-{}", i)), None)
            .await;
    }

    app.seed_user("admin@example.com", Role::Admin).await;
    let token = app.login("admin@example.com").await;

    let (_, body) = app
        .get("/api/contact/submissions?page=0&limit=500", Some(&token))
        .await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 100);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 1);

    let (_, body) = app
        .get("/api/contact/submissions?page=2&limit=2", Some(&token))
        .await;
    assert_eq!(body["submissions"].as_array().unwrap().len(), 1);
    assert_eq!(body["submissions"][0]["name"], "lead-0");
    assert_eq!(body["pagination"]["totalPages"], 2);
}

#[tokio::test]
async fn test_contact_rate_limit() {
    let mut config = create_test_config();
    config.rate_limit.contact_max_requests = 1;
    let app = TestApp::with_config(config);

    let (status, _) = app
        .post("/api/contact/submit", contact_body("first"), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/api/contact/submit", contact_body("second"), None)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // 服务咨询使用独立的限流窗口
    let (status, _) = app
        .post("/api/services/inquiry", inquiry_body("gst"), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_service_catalog() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/services", None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "gst",
            "income-tax",
            "business-incorporation",
            "trademark",
            "compliance",
            "mca"
        ]
    );
    assert!(body["services"][0]["features"].is_array());
}

#[tokio::test]
async fn test_inquiry_rejects_unknown_service() {
    let app = TestApp::new();

    let (status, _) = app
        .post("/api/services/inquiry", inquiry_body("astrology"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inquiry_listing_filters() {
    let app = TestApp::new();
    for service_type in ["gst", "mca", "gst"] {
        let (status, body) = app
            .post("/api/services/inquiry", inquiry_body(service_type), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["inquiryId"].is_string());
    }

    app.seed_user("manager@example.com", Role::Manager).await;
    let token = app.login("manager@example.com").await;

    let (status, body) = app
        .get("/api/services/inquiries?serviceType=gst", Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    assert!(body["inquiries"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["service_type"] == "gst"));

    let id = body["inquiries"][0]["id"].as_str().unwrap().to_string();
    let (status, updated) = app
        .put(
            &format!("/api/services/inquiries/{}", id),
            json!({ "status": "closed" }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["inquiry"]["status"], "closed");
    assert_eq!(updated["message"], "Service inquiry updated successfully");

    let (_, body) = app
        .get("/api/services/inquiries?status=closed", Some(&token))
        .await;
    assert_eq!(body["pagination"]["total"], 1);

    // 直接检查存储
    let stored = app
        .inquiries
        .list(
            &advisory_api::models::lead::InquiryFilter {
                service_type: None,
                status: Some(LeadStatus::Closed),
            },
            advisory_api::models::lead::PageRequest::new(None, None),
        )
        .await
        .unwrap();
    assert_eq!(stored.total, 1);
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/api/does-not-exist");
    assert_eq!(body["method"], "GET");
    assert_eq!(body["error"], "Endpoint not found");
}
