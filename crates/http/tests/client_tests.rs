//! Integration tests for the module clients and services

use posadmin_core::types::{
    BillingCycle, CreatePlanRequest, ListQuery, TenantStatus, TicketStatus,
};
use posadmin_core::{AuthEvents, CredentialStore, MemoryStorage};
use posadmin_http::client::ErrorCategory;
use posadmin_http::{ClientError, ClientFactory};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> CredentialStore {
    CredentialStore::new(Arc::new(MemoryStorage::new()), AuthEvents::new())
}

fn factory(server: &MockServer, credentials: CredentialStore) -> ClientFactory {
    ClientFactory::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .credentials(credentials)
        .build()
        .unwrap()
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "OK",
        "data": data,
        "timestamp": "2026-03-01T12:00:00Z"
    }))
}

fn plan_page() -> serde_json::Value {
    json!({
        "items": [
            { "id": "plan_basic", "name": "Basic", "price": 29.99, "billing_cycle": "monthly" },
            { "id": "plan_pro", "name": "Pro", "price": 799, "billing_cycle": "yearly" }
        ],
        "total": 2,
        "page": 1,
        "per_page": 20
    })
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .and(header("authorization", "Bearer test-access"))
        .and(header("accept", "application/json"))
        .respond_with(ok(json!({
            "id": "u_1",
            "email": "admin@example.com",
            "permissions": ["plans:manage", "tickets:read"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials();
    store.set_session("test-access", Some("test-refresh"), None).unwrap();
    let perms = factory(&server, store).auth().permissions().await.unwrap();

    assert!(perms.allows("plans", posadmin_core::Action::Delete));
    assert!(!perms.allows("tickets", posadmin_core::Action::Update));
}

#[tokio::test]
async fn test_anonymous_request_has_no_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plans"))
        .respond_with(ok(plan_page()))
        .mount(&server)
        .await;

    let page = factory(&server, credentials())
        .plans()
        .list(&ListQuery::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_login_stores_session_and_logout_clears_it() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "email": "ops@example.com", "password": "hunter2" })))
        .respond_with(ok(json!({
            "access_token": "a-1",
            "refresh_token": "r-1",
            "user": { "id": "u_9", "email": "ops@example.com", "first_name": "Ops" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = credentials();
    let mut events = store.events().subscribe();
    let auth = factory(&server, store.clone()).auth();

    let login = auth.login("ops@example.com", "hunter2").await.unwrap();
    assert_eq!(login.user.unwrap().display_name(), "Ops");
    assert!(auth.is_logged_in());
    assert_eq!(auth.user_email().as_deref(), Some("ops@example.com"));
    assert_eq!(store.refresh_token().as_deref(), Some("r-1"));

    // Server failure on logout must not keep the local session alive
    auth.logout().await.unwrap();
    assert!(!auth.is_logged_in());
    assert!(store.access_token().is_none());

    assert_eq!(
        events.recv().await.unwrap(),
        posadmin_core::AuthEvent::StateChanged { logged_in: true }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        posadmin_core::AuthEvent::StateChanged { logged_in: false }
    );
}

#[tokio::test]
async fn test_list_forwards_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/tenants"))
        .and(query_param("page", "2"))
        .and(query_param("search", "bakery"))
        .respond_with(ok(json!({
            "data": [{
                "id": "t_1",
                "name": "Corner Bakery",
                "slug": "corner-bakery",
                "status": "active"
            }],
            "total": 45,
            "page": 2,
            "per_page": 20
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = factory(&server, credentials())
        .tenants()
        .list(&ListQuery::default().page(2).search("bakery"))
        .await
        .unwrap();

    assert_eq!(page.items[0].status, TenantStatus::Active);
    assert!(page.has_more());
}

#[tokio::test]
async fn test_validation_errors_surface() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/plans"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "success": false,
            "message": "Validation failed",
            "validation_errors": [{ "field": "price", "message": "must be positive" }]
        })))
        .mount(&server)
        .await;

    let request = CreatePlanRequest {
        name: "Broken".into(),
        description: None,
        price: "-1".parse().unwrap(),
        billing_cycle: BillingCycle::Monthly,
        features: vec![],
        max_users: None,
        max_locations: None,
    };
    let err = factory(&server, credentials())
        .plans()
        .create(&request)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Validation);
    match err {
        ClientError::Validation { errors, .. } => assert_eq!(errors[0].field, "price"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_status_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": "User not found"
        })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/roles/r_admin"))
        .respond_with(ResponseTemplate::new(403).set_body_string("system roles cannot be deleted"))
        .mount(&server)
        .await;

    let factory = factory(&server, credentials());

    let missing = factory.users().get("missing").await;
    assert!(matches!(missing, Err(ClientError::NotFound(ref m)) if m == "User not found"));

    let forbidden = factory.roles().delete("r_admin").await;
    assert!(matches!(forbidden, Err(ClientError::Forbidden(_))));
}

#[tokio::test]
async fn test_network_error_category() {
    let store = credentials();
    let factory = ClientFactory::builder()
        .base_url("http://127.0.0.1:9/api/v1")
        .credentials(store)
        .build()
        .unwrap();

    let err = factory.tickets().get("tk_1").await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_plan_list_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plans"))
        .respond_with(ok(plan_page()))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/plans/plan_basic"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let plans = factory(&server, credentials()).plans();
    let query = ListQuery::default();

    let first = plans.list_cached(&query).await.unwrap();
    let second = plans.list_cached(&query).await.unwrap();
    assert_eq!(first, second);

    plans.delete("plan_basic").await.unwrap();
    plans.list_cached(&query).await.unwrap();
}

#[tokio::test]
async fn test_status_and_assignment_endpoints() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/tenants/t_1/status"))
        .and(body_json(json!({ "status": "suspended" })))
        .respond_with(ok(json!({
            "id": "t_1", "name": "Corner Bakery", "slug": "corner-bakery", "status": "suspended"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/tickets/tk_1/status"))
        .and(body_json(json!({ "status": "closed" })))
        .respond_with(ok(json!({ "id": "tk_1", "subject": "Printer offline", "status": "closed" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/roles/r_support/permissions"))
        .and(body_json(json!({ "permissions": ["tickets:manage"] })))
        .respond_with(ok(json!({
            "id": "r_support", "name": "Support", "permissions": ["tickets:manage"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/users/u_1/role"))
        .and(body_json(json!({ "role_id": "r_support" })))
        .respond_with(ok(json!({ "id": "u_1", "email": "agent@example.com", "role": "Support" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/tk_1/replies"))
        .and(body_json(json!({ "body": "Restart the print server" })))
        .respond_with(ok(json!({ "id": "rp_1", "body": "Restart the print server" })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = factory(&server, credentials());

    let tenant = factory
        .tenants()
        .set_status("t_1", TenantStatus::Suspended)
        .await
        .unwrap();
    assert_eq!(tenant.status, TenantStatus::Suspended);

    let ticket = factory
        .tickets()
        .update_status("tk_1", TicketStatus::Closed)
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);

    let role = factory
        .roles()
        .assign_permissions("r_support", &["tickets:manage".to_string()])
        .await
        .unwrap();
    assert_eq!(role.permissions, vec!["tickets:manage"]);

    let user = factory.users().assign_role("u_1", "r_support").await.unwrap();
    assert_eq!(user.role.as_deref(), Some("Support"));

    let reply = factory
        .tickets()
        .reply("tk_1", "Restart the print server")
        .await
        .unwrap();
    assert_eq!(reply.id, "rp_1");

    assert!(matches!(
        factory.tickets().reply("tk_1", "   ").await,
        Err(ClientError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_ids_are_path_encoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/team%2Fops%3Fadmin"))
        .respond_with(ok(json!({ "id": "team/ops?admin", "email": "ops@example.com" })))
        .expect(1)
        .mount(&server)
        .await;

    let user = factory(&server, credentials())
        .users()
        .get("team/ops?admin")
        .await
        .unwrap();
    assert_eq!(user.id, "team/ops?admin");
}
