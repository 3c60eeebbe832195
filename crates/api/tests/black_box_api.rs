use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use splitledger_api::app::{build_app, services::AppServices};
use splitledger_infra::LedgerConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory(LedgerConfig::default())));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .post("/members", json!({ "name": name, "email": email }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn member_id_by_email(group: &Value, email: &str) -> String {
    group["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["email"] == email)
        .map(|m| m["id"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn three_way_split_and_payment_settlement() {
    let srv = TestServer::spawn().await;
    let a = srv.register("Alice", "alice@example.com").await;

    let (status, body) = srv
        .post(
            "/groups",
            json!({
                "name": "Trip",
                "description": "Mountain cabin",
                "founder_id": a,
                "invited_emails": ["bob@example.com", "carol@example.com", "BOB@example.com"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let group = &body["data"];
    let gid = group["id"].as_str().unwrap().to_string();
    assert_eq!(group["members"].as_array().unwrap().len(), 3);
    assert_eq!(group["members"][1]["pending"], true);
    let b = member_id_by_email(group, "bob@example.com");
    let c = member_id_by_email(group, "carol@example.com");

    let (status, body) = srv
        .post(
            &format!("/groups/{gid}/expenses"),
            json!({
                "title": "Groceries",
                "amount": "100.00",
                "paid_by": a,
                "split_among": [a, b, c],
                "date": "2024-07-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["paid_by_name"], "Alice");

    let (_, body) = srv.get(&format!("/groups/{gid}/balances")).await;
    let balances = &body["data"]["balances"];
    assert_eq!(balances[&a], "66.66");
    assert_eq!(balances[&b], "-33.33");
    assert_eq!(balances[&c], "-33.33");

    let (status, body) = srv
        .post(&format!("/groups/{gid}/settle"), json!({ "policy": "payment" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["outcome"], "proposed");
    let sid = body["data"]["proposal"]["settlement_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["proposal"]["transfers"].as_array().unwrap().len(), 2);

    let (status, body) = srv
        .post(&format!("/groups/{gid}/settlements/{sid}/confirm"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = srv.get(&format!("/groups/{gid}/balances")).await;
    for v in body["data"]["balances"].as_object().unwrap().values() {
        assert_eq!(v, "0.00");
    }

    let (status, body) = srv
        .post(&format!("/groups/{gid}/settlements/{sid}/confirm"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "settlement_not_found");
}

#[tokio::test]
async fn forgive_keeps_history_and_is_idempotent() {
    let srv = TestServer::spawn().await;
    let a = srv.register("A", "a@example.com").await;
    let (_, body) = srv
        .post(
            "/groups",
            json!({ "name": "Flat", "description": "Bills", "founder_id": a, "invited_emails": ["b@example.com"] }),
        )
        .await;
    let gid = body["data"]["id"].as_str().unwrap().to_string();
    let b = member_id_by_email(&body["data"], "b@example.com");

    srv.post(
        &format!("/groups/{gid}/expenses"),
        json!({ "title": "Power", "amount": "40", "paid_by": a, "split_among": [a, b], "date": "2024-07-02" }),
    )
    .await;

    let (_, body) = srv
        .post(&format!("/groups/{gid}/settle"), json!({ "policy": "forgive" }))
        .await;
    assert_eq!(body["data"]["outcome"], "forgiven");
    let (_, body) = srv
        .post(&format!("/groups/{gid}/settle"), json!({ "policy": "forgive" }))
        .await;
    assert_eq!(body["data"]["outcome"], "already_settled");

    let (_, body) = srv.get(&format!("/groups/{gid}")).await;
    assert_eq!(body["data"]["expenses"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["expenses"][0]["amount"], "40.00");
    assert!(
        body["data"]["members"]
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["balance"] == "0.00")
    );
}

#[tokio::test]
async fn errors_use_the_envelope_and_status_codes() {
    let srv = TestServer::spawn().await;
    let a = srv.register("A", "a@example.com").await;
    let (_, body) = srv
        .post(
            "/groups",
            json!({ "name": "G", "description": "D", "founder_id": a, "invited_emails": ["b@example.com"] }),
        )
        .await;
    let gid = body["data"]["id"].as_str().unwrap().to_string();
    let outsider = srv.register("X", "x@example.com").await;

    let (status, body) = srv
        .post(
            &format!("/groups/{gid}/expenses"),
            json!({ "title": "T", "amount": "10.00", "paid_by": outsider, "split_among": [a], "date": "2024-07-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "invalid_payer");

    let (status, body) = srv
        .post(
            &format!("/groups/{gid}/expenses"),
            json!({ "title": "T", "amount": "10.001", "paid_by": a, "split_among": [a], "date": "2024-07-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");

    let (status, body) = srv.get("/groups/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let missing = "0190a0b0-0000-7000-8000-000000000000";
    let (status, body) = srv.get(&format!("/groups/{missing}/balances")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "group_not_found");

    let (status, body) = srv
        .post("/members", json!({ "name": "Dup", "email": "A@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn pending_invitee_sees_groups_after_registering() {
    let srv = TestServer::spawn().await;
    let a = srv.register("A", "a@example.com").await;
    for name in ["One", "Two"] {
        let (status, _) = srv
            .post(
                "/groups",
                json!({ "name": name, "description": "D", "founder_id": a, "invited_emails": ["dana@example.com"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let dana = srv.register("Dana", "dana@example.com").await;
    let (status, body) = srv.get(&format!("/members/{dana}/groups")).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Two");

    let (_, body) = srv.get(&format!("/members/{a}/summary")).await;
    assert_eq!(body["data"]["total_groups"], 2);
    assert_eq!(body["data"]["net_balance"], "0.00");
}
