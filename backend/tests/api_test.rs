mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use helpers::*;
use kvitt_backend::api::{create_router, USER_ID_HEADER};
use kvitt_backend::models::LedgerEntry;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct ApiClient {
    router: Router,
}

impl ApiClient {
    fn new(app: &TestApp) -> Self {
        Self {
            router: create_router(app.state.clone()),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(USER_ID_HEADER, caller.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, caller: Uuid) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(caller), None).await
    }

    async fn post(&self, uri: &str, caller: Uuid, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(caller), Some(body)).await
    }
}

fn amount(value: &Value) -> rust_decimal::Decimal {
    dec(value.as_str().expect("decimal serialized as string"))
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);

    let (status, body) = client.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_caller_is_rejected() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);

    let (status, body) = client
        .send(Method::GET, "/ledger/balances", None, None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_malformed_caller_is_bad_request() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);

    let request = Request::builder()
        .uri("/ledger/balances")
        .header(USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = client.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_end_game_and_fetch_settlement() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let fx = app
        .game(&[
            ("Ana", "20", Some("40")),
            ("Ben", "20", None),
            ("Cy", "20", Some("20")),
        ])
        .await;
    let uri = format!("/games/{}/end", fx.game.id);

    let (status, body) = client.post(&uri, fx.host().id, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "settled");
    assert_eq!(body["has_discrepancy"], false);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);
    assert_eq!(body["payments"][0]["from_user_id"], fx.player(1).to_string());
    assert_eq!(body["payments"][0]["to_user_id"], fx.player(0).to_string());
    assert_eq!(amount(&body["payments"][0]["amount"]), dec("20"));

    let (status, body) = client.post(&uri, fx.host().id, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, body) = client
        .get(&format!("/games/{}/settlement", fx.game.id), fx.player(2))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_id"], fx.game.group_id.to_string());
    assert_eq!(body["results"].as_array().unwrap().len(), 3);
    assert_eq!(amount(&body["discrepancy"]), dec("0"));
}

#[tokio::test]
async fn test_non_host_cannot_end_game() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let fx = app
        .game(&[("Ana", "20", Some("30")), ("Ben", "20", Some("10"))])
        .await;

    let (status, body) = client
        .post(&format!("/games/{}/end", fx.game.id), fx.player(1), json!({}))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_game_is_not_found() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let caller = app.user("Ana").await;

    let (status, body) = client
        .get(&format!("/games/{}/settlement", Uuid::new_v4()), caller.id)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_dispute_locks_ledger_actions() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let fx = app
        .game(&[("Ana", "20", Some("30")), ("Ben", "20", Some("10"))])
        .await;
    let (_, settlement) = client
        .post(&format!("/games/{}/end", fx.game.id), fx.host().id, json!({}))
        .await;
    let ledger_id = settlement["ledger"][0]["id"].as_str().unwrap().to_string();
    let ben = fx.player(1);

    let (status, dispute) = client
        .post(
            &format!("/games/{}/settlement/dispute", fx.game.id),
            ben,
            json!({ "category": "wrong_cashout", "message": "I had 15 chips" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dispute["status"], "open");
    assert_eq!(dispute["category"], "wrong_cashout");

    let (status, body) = client
        .send(
            Method::PATCH,
            &format!("/ledger/{}", ledger_id),
            Some(ben),
            Some(json!({ "paid": true })),
        )
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["code"], "settlement_under_review");

    let (status, body) = client
        .post(
            &format!("/settlements/{}/pay", ledger_id),
            ben,
            json!({ "origin_url": "https://app.kvitt.test" }),
        )
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["code"], "settlement_under_review");

    let (status, body) = client
        .get(&format!("/games/{}/settlement", fx.game.id), ben)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "disputed");

    let (status, disputes) = client
        .get(&format!("/games/{}/settlement/disputes", fx.game.id), fx.host().id)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disputes.as_array().unwrap().len(), 1);

    let dispute_id = dispute["id"].as_str().unwrap();
    let (status, resolved) = client
        .post(
            &format!("/disputes/{}/resolve", dispute_id),
            fx.host().id,
            json!({
                "resolution_note": "Recounted",
                "corrections": {
                    "buy_ins": [
                        { "user_id": fx.player(0), "amount": "20" },
                        { "user_id": ben, "amount": "20" }
                    ],
                    "cash_outs": [
                        { "user_id": fx.player(0), "chips": "25" },
                        { "user_id": ben, "chips": "15" }
                    ]
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");
    assert_eq!(resolved["resolution_note"], "Recounted");

    let (_, body) = client
        .get(&format!("/games/{}/settlement", fx.game.id), ben)
        .await;
    assert_eq!(body["state"], "settled");
    assert_eq!(body["version"], 2);
    assert_eq!(amount(&body["payments"][0]["amount"]), dec("5"));

    let new_ledger_id = body["ledger"][0]["id"].as_str().unwrap();
    let (status, entry) = client
        .send(
            Method::PATCH,
            &format!("/ledger/{}", new_ledger_id),
            Some(ben),
            Some(json!({ "paid": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["paid"], true);
}

#[tokio::test]
async fn test_dispute_blocks_payment_confirmation() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let fx = app
        .game(&[("Ana", "20", Some("30")), ("Ben", "20", Some("10"))])
        .await;
    let (_, settlement) = client
        .post(&format!("/games/{}/end", fx.game.id), fx.host().id, json!({}))
        .await;
    let ledger_id = settlement["ledger"][0]["id"].as_str().unwrap().to_string();
    let ben = fx.player(1);

    let (status, _) = client
        .post(
            &format!("/games/{}/settlement/dispute", fx.game.id),
            ben,
            json!({ "category": "wrong_cashout", "message": "I had 15 chips" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = client
        .post("/payments/confirm", ben, json!({ "ledger_ids": [ledger_id] }))
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["code"], "settlement_under_review");

    let (_, body) = client
        .get(&format!("/games/{}/settlement", fx.game.id), ben)
        .await;
    assert_eq!(body["state"], "disputed");
    assert_eq!(body["ledger"][0]["paid"], false);
}

#[tokio::test]
async fn test_dispute_message_validation() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let fx = app
        .game(&[("Ana", "20", Some("30")), ("Ben", "20", Some("10"))])
        .await;
    client
        .post(&format!("/games/{}/end", fx.game.id), fx.host().id, json!({}))
        .await;

    let (status, body) = client
        .post(
            &format!("/games/{}/settlement/dispute", fx.game.id),
            fx.player(1),
            json!({ "category": "other", "message": "" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_consolidated_and_net_checkout() {
    let app = TestApp::new();
    let client = ApiClient::new(&app);
    let ana = app.user("Ana").await;
    let ben = app.user("Ben").await;
    let group = Uuid::new_v4();
    let owed = LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("30"));
    let offset = LedgerEntry::new(Uuid::new_v4(), group, ben.id, ana.id, dec("10"));
    app.store.seed_ledger([owed.clone(), offset.clone()]).await;

    let (status, report) = client.get("/ledger/consolidated-detailed", ana.id).await;
    assert_eq!(status, StatusCode::OK);
    let balance = &report["consolidated"][0];
    assert_eq!(balance["user"]["id"], ben.id.to_string());
    assert_eq!(balance["direction"], "you_owe");
    assert_eq!(amount(&balance["display_amount"]), dec("20"));
    assert_eq!(amount(&balance["offset_explanation"]["offset_amount"]), dec("10"));
    assert_eq!(amount(&report["net_balance"]), dec("-20"));
    assert!(report.get("warnings").is_none());

    let (status, balances) = client.get("/ledger/balances", ana.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balances["owes"].as_array().unwrap().len(), 1);
    assert_eq!(balances["owed"].as_array().unwrap().len(), 1);
    let line = &balances["owes"][0];
    assert_eq!(line["id"], owed.id.to_string());
    assert_eq!(line["from_user_id"], ana.id.to_string());
    assert_eq!(line["to_user_id"], ben.id.to_string());
    assert_eq!(line["paid"], false);
    assert!(line["created_at"].is_string());
    assert_eq!(line["counterparty"]["id"], ben.id.to_string());

    let (status, body) = client
        .post(
            "/ledger/pay-net/prepare",
            ana.id,
            json!({
                "other_user_id": ben.id,
                "ledger_ids": [owed.id],
                "origin_url": "https://app.kvitt.test"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = client
        .post(
            "/ledger/pay-net/prepare",
            ana.id,
            json!({
                "other_user_id": ben.id,
                "ledger_ids": [owed.id, offset.id],
                "origin_url": "https://app.kvitt.test"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&body["amount"]), dec("20"));
    assert_eq!(body["checkout"]["checkout_url"], "https://pay.test/chk_1");

    let (status, entries) = client
        .send(
            Method::POST,
            "/payments/confirm",
            None,
            Some(json!({ "ledger_ids": [owed.id, offset.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, entries) = client
        .post(
            "/payments/confirm",
            ana.id,
            json!({ "ledger_ids": [owed.id, offset.id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 2);

    let (_, report) = client.get("/ledger/consolidated-detailed", ana.id).await;
    assert_eq!(report["consolidated"].as_array().unwrap().len(), 0);
}
