//! Router tests against an in-memory database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use depot_db::Database;
use depot_db::models::NewUser;
use depot_gateway::dispatcher::Dispatcher;
use depot_types::api::StoreRequest;
use depot_types::events::GatewayEvent;
use depot_types::models::Role;

use crate::auth::{AppState, AppStateInner, create_token, hash_password};
use crate::router;
use crate::storage::Storage;

async fn make_state() -> AppState {
    let dir = std::env::temp_dir().join(format!("depot-api-test-{}", Uuid::new_v4()));
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        dispatcher: Dispatcher::new(),
        storage: Storage::new(dir).await.unwrap(),
    })
}

struct TestUser {
    id: Uuid,
    token: String,
}

fn add_user(state: &AppState, username: &str, role: Role, password: Option<&str>) -> TestUser {
    let id = Uuid::new_v4();
    let hash = password.map(|p| hash_password(p).unwrap());
    let user_id = id.to_string();
    state
        .db
        .create_user(
            &NewUser {
                id: &user_id,
                username,
                password_hash: hash.as_deref(),
                email: "",
                first_name: "",
                last_name: "",
                phone: None,
                role: role.as_str(),
                is_active: true,
            },
            None,
        )
        .unwrap();
    TestUser {
        id,
        token: create_token(&state.jwt_secret, id, username, role).unwrap(),
    }
}

fn add_store(state: &AppState, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    state
        .db
        .insert_store(
            &id.to_string(),
            &StoreRequest {
                name: name.into(),
                city: "Campinas".into(),
                state: "SP".into(),
                postal_code: "13000-000".into(),
                district: "Centro".into(),
                number: "1".into(),
                complement: None,
                address: "Rua B".into(),
                latitude: None,
                longitude: None,
                active: true,
            },
        )
        .unwrap();
    id
}

async fn call(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let resp = router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn send_message(state: &AppState, from: &TestUser, to: &TestUser, body: &str) -> Value {
    let (status, msg) = call(
        state,
        "POST",
        "/chat/messages",
        Some(&from.token),
        Some(json!({ "recipient_id": to.id, "body": body })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    msg
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_accepts_the_right_password_only() {
    let state = make_state().await;
    add_user(&state, "ana", Role::Operator, Some("password123"));
    add_user(&state, "nopass", Role::Operator, None);

    let (status, body) = call(
        &state,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "ana", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "operator");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = call(&state, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ana");

    for (username, password) in [("ana", "wrong-pass"), ("ghost", "password123"), ("nopass", "")] {
        let (status, _) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{username}");
    }
}

#[tokio::test]
async fn inactive_users_are_locked_out() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);
    let ana = add_user(&state, "ana", Role::Operator, Some("password123"));

    let (status, body) = call(
        &state,
        "POST",
        &format!("/users/{}/toggle-active", ana.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, _) = call(&state, "GET", "/me", Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &state,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "ana", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() {
    let state = make_state().await;
    let (status, body) = call(&state, "GET", "/chat/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(&state, "GET", "/chat/contacts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_link_can_be_redeemed_once() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);
    let ana = add_user(&state, "ana", Role::Courier, None);

    let (status, link) = call(
        &state,
        "POST",
        &format!("/users/{}/password-link", ana.id),
        Some(&admin.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = link["token"].as_str().unwrap().to_string();
    assert!(link["path"].as_str().unwrap().ends_with(&token));

    let reset = json!({ "token": token, "password": "brand-new-pass" });
    let (status, _) = call(&state, "POST", "/auth/password-reset", None, Some(reset.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, "POST", "/auth/password-reset", None, Some(reset)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "ana", "password": "brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ── Users ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_endpoints_reject_other_roles() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);

    for (method, uri) in [("GET", "/users"), ("GET", "/protocols"), ("GET", "/stock/movements")] {
        let (status, _) = call(&state, method, uri, Some(&operator.token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn create_user_checks_username_and_store_link() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);
    let store = add_store(&state, "Loja 1");

    let (status, user) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({ "username": "loja1", "role": "store", "store_id": store })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["store_id"], store.to_string());

    let (status, _) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({ "username": "loja1", "role": "operator" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({ "username": "loja1b", "role": "store", "store_id": store })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({
            "username": "bia",
            "role": "courier",
            "password": "password123",
            "password_confirmation": "password124"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn changing_role_away_from_store_releases_the_store() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);
    let store = add_store(&state, "Loja 1");

    let (_, first) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({ "username": "loja1", "role": "store", "store_id": store })),
    )
    .await;
    let first_id = first["id"].as_str().unwrap().to_string();

    let (status, moved) = call(
        &state,
        "PUT",
        &format!("/users/{first_id}/role"),
        Some(&admin.token),
        Some(json!({ "role": "courier" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["role"], "courier");
    assert!(moved["store_id"].is_null());

    let (status, second) = call(
        &state,
        "POST",
        "/users",
        Some(&admin.token),
        Some(json!({ "username": "loja1b", "role": "store", "store_id": store })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = second["id"].as_str().unwrap().to_string();

    // Same rule through the profile update
    let (status, updated) = call(
        &state,
        "PUT",
        &format!("/users/{second_id}"),
        Some(&admin.token),
        Some(json!({ "role": "operator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["store_id"].is_null());
    assert!(state.db.get_store(&store.to_string()).unwrap().unwrap().user_id.is_none());
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sending_pushes_to_every_connection_of_both_parties() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);

    let (_, mut ana_tab) = state.dispatcher.register(ana.id).await;
    let (_, mut bia_tab1) = state.dispatcher.register(bia.id).await;
    let (_, mut bia_tab2) = state.dispatcher.register(bia.id).await;

    let msg = send_message(&state, &ana, &bia, "hello").await;
    assert_eq!(msg["body"], "hello");
    assert_eq!(msg["sender_username"], "ana");

    for rx in [&mut ana_tab, &mut bia_tab1, &mut bia_tab2] {
        match rx.recv().await {
            Some(GatewayEvent::MessageCreate(pushed)) => {
                assert_eq!(pushed.id.to_string(), msg["id"].as_str().unwrap());
                assert_eq!(pushed.body, "hello");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn send_validates_recipient_and_body() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);

    let cases = [
        (json!({ "recipient_id": ana.id, "body": "me" }), StatusCode::BAD_REQUEST),
        (json!({ "recipient_id": bia.id, "body": "   " }), StatusCode::BAD_REQUEST),
        (json!({ "recipient_id": Uuid::new_v4(), "body": "hi" }), StatusCode::NOT_FOUND),
        (
            json!({ "recipient_id": bia.id, "attachment_id": Uuid::new_v4() }),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (body, expected) in cases {
        let (status, _) = call(&state, "POST", "/chat/messages", Some(&ana.token), Some(body.clone())).await;
        assert_eq!(status, expected, "{body}");
    }
}

#[tokio::test]
async fn only_the_sender_can_delete() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);
    let msg = send_message(&state, &ana, &bia, "keep me").await;
    let uri = format!("/chat/messages/{}", msg["id"].as_str().unwrap());

    let (status, body) = call(&state, "DELETE", &uri, Some(&bia.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "you can only delete your own messages");

    let (_, convo) = call(
        &state,
        "GET",
        &format!("/chat/conversations/{}/messages", ana.id),
        Some(&bia.token),
        None,
    )
    .await;
    assert_eq!(convo.as_array().unwrap().len(), 1);

    let (status, _) = call(&state, "DELETE", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&state, "DELETE", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edits_are_limited_to_the_sender_and_real_changes() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);
    let msg = send_message(&state, &ana, &bia, "draft").await;
    let uri = format!("/chat/messages/{}", msg["id"].as_str().unwrap());

    let (status, _) = call(&state, "PUT", &uri, Some(&bia.token), Some(json!({ "body": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": "draft" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, edited) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": "final" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["body"], "final");
    assert_eq!(edited["edited"], true);
}

#[tokio::test]
async fn message_bodies_keep_their_whitespace() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);

    let msg = send_message(&state, &ana, &bia, "  hi\n").await;
    assert_eq!(msg["body"], "  hi\n");
    let uri = format!("/chat/messages/{}", msg["id"].as_str().unwrap());

    let (_, convo) = call(
        &state,
        "GET",
        &format!("/chat/conversations/{}/messages", ana.id),
        Some(&bia.token),
        None,
    )
    .await;
    assert_eq!(convo[0]["body"], "  hi\n");

    // A whitespace-only change is still a change
    let (status, edited) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": "hi  " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["body"], "hi  ");

    let (status, _) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": "hi  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&state, "PUT", &uri, Some(&ana.token), Some(json!({ "body": " \n " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mark_read_clears_unread_and_notifies_the_sender() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);
    send_message(&state, &ana, &bia, "one").await;
    send_message(&state, &ana, &bia, "two").await;

    let (_, summary) = call(&state, "GET", "/chat/unread", Some(&bia.token), None).await;
    assert_eq!(summary, json!({ "has_unread": true, "count": 2 }));

    let (_, mut ana_rx) = state.dispatcher.register(ana.id).await;
    let (status, marked) = call(
        &state,
        "POST",
        &format!("/chat/conversations/{}/read", ana.id),
        Some(&bia.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["marked"], 2);
    assert_eq!(
        ana_rx.recv().await,
        Some(GatewayEvent::MessagesRead {
            reader_id: bia.id,
            count: 2
        })
    );

    let (_, summary) = call(&state, "GET", "/chat/unread", Some(&bia.token), None).await;
    assert_eq!(summary, json!({ "has_unread": false, "count": 0 }));

    let (_, contacts) = call(&state, "GET", "/chat/contacts", Some(&bia.token), None).await;
    assert_eq!(contacts[0]["username"], "ana");
    assert_eq!(contacts[0]["unread"], 0);
}

#[tokio::test]
async fn attachments_are_private_to_the_conversation() {
    let state = make_state().await;
    let ana = add_user(&state, "ana", Role::Operator, None);
    let bia = add_user(&state, "bia", Role::Courier, None);
    let caio = add_user(&state, "caio", Role::Courier, None);

    let upload = Request::builder()
        .method("POST")
        .uri("/files?filename=nota.txt")
        .header(header::AUTHORIZATION, format!("Bearer {}", ana.token))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("receipt"))
        .unwrap();
    let resp = router(state.clone()).oneshot(upload).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let uploaded: Value = serde_json::from_slice(&bytes).unwrap();
    let file_id = uploaded["file_id"].as_str().unwrap().to_string();
    assert_eq!(uploaded["size"], 7);

    let (status, msg) = call(
        &state,
        "POST",
        "/chat/messages",
        Some(&ana.token),
        Some(json!({ "recipient_id": bia.id, "attachment_id": file_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(msg["attachment_url"], format!("/files/{file_id}"));

    let uri = format!("/files/{file_id}");
    let (status, _) = call(&state, "GET", &uri, Some(&caio.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let download = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bia.token))
        .body(Body::empty())
        .unwrap();
    let resp = router(state.clone()).oneshot(download).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"receipt");
}

// ── Routes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn couriers_see_only_their_routes_and_get_notified() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto1 = add_user(&state, "moto1", Role::Courier, None);
    let moto2 = add_user(&state, "moto2", Role::Courier, None);
    let shop = add_user(&state, "shop", Role::Store, None);
    let a = add_store(&state, "A");
    let b = add_store(&state, "B");

    let (_, mut moto1_rx) = state.dispatcher.register(moto1.id).await;

    let (status, created) = call(
        &state,
        "POST",
        "/routes",
        Some(&operator.token),
        Some(json!({ "courier_id": moto1.id, "store_ids": [a, b] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let route_id = created["id"].as_str().unwrap().to_string();

    match moto1_rx.recv().await {
        Some(GatewayEvent::NotificationCreate(n)) => {
            assert_eq!(n.title, "New route assigned");
            assert!(n.body.contains("2 stops"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let (_, mine) = call(&state, "GET", "/routes", Some(&moto1.token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["total_stops"], 2);

    let (_, theirs) = call(&state, "GET", "/routes", Some(&moto2.token), None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let uri = format!("/routes/{route_id}");
    let (status, _) = call(&state, "GET", &uri, Some(&moto2.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&state, "GET", "/routes", Some(&shop.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, detail) = call(&state, "GET", &uri, Some(&moto1.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let positions: Vec<i64> = detail["stops"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2]);

    let (status, _) = call(
        &state,
        "POST",
        "/routes",
        Some(&operator.token),
        Some(json!({ "courier_id": operator.id, "store_ids": [a] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reorder_rejects_foreign_or_missing_stops() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto = add_user(&state, "moto", Role::Courier, None);
    let a = add_store(&state, "A");
    let b = add_store(&state, "B");

    let (_, created) = call(
        &state,
        "POST",
        "/routes",
        Some(&operator.token),
        Some(json!({ "courier_id": moto.id, "store_ids": [a, b] })),
    )
    .await;
    let route_uri = format!("/routes/{}", created["id"].as_str().unwrap());
    let (_, detail) = call(&state, "GET", &route_uri, Some(&operator.token), None).await;
    let ids: Vec<Value> = detail["stops"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].clone())
        .collect();

    let order_uri = format!("{route_uri}/stops/order");
    for bad in [json!([ids[0]]), json!([ids[0], Uuid::new_v4()]), json!([ids[0], ids[0]])] {
        let (status, _) = call(&state, "PUT", &order_uri, Some(&moto.token), Some(json!({ "ids": bad }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = call(
        &state,
        "PUT",
        &order_uri,
        Some(&moto.token),
        Some(json!({ "ids": [ids[1], ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = call(&state, "GET", &route_uri, Some(&operator.token), None).await;
    assert_eq!(detail["stops"][0]["id"], ids[1]);
    assert_eq!(detail["stops"][0]["position"], 1);
}

// ── Transfers ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transfers_must_be_picked_up_before_delivery() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto = add_user(&state, "moto", Role::Courier, None);
    let a = add_store(&state, "A");
    let b = add_store(&state, "B");

    let (status, transfer) = call(
        &state,
        "POST",
        "/transfers",
        Some(&operator.token),
        Some(json!({
            "kind": "exit",
            "origin_store_id": a,
            "destination_store_id": b,
            "product_name": "Chairs",
            "quantity": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(transfer["status"], "pending");
    assert!(transfer["transfer_number"].as_str().unwrap().starts_with("TRF-"));
    let uri = format!("/transfers/{}", transfer["id"].as_str().unwrap());

    let (status, body) = call(&state, "POST", &format!("{uri}/receive"), Some(&operator.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "the load must be picked up before delivery");

    let (status, picked) = call(&state, "POST", &format!("{uri}/pickup"), Some(&moto.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(picked["status"], "in_transit");
    assert_eq!(picked["courier_id"], moto.id.to_string());

    let (status, _) = call(&state, "POST", &format!("{uri}/pickup"), Some(&moto.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, received) = call(&state, "POST", &format!("{uri}/receive"), Some(&moto.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(received["status"], "confirmed");

    let (status, _) = call(
        &state,
        "PUT",
        &format!("{uri}/picked-up-by"),
        Some(&operator.token),
        Some(json!({ "picked_up_by": "João" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn transfer_visibility_follows_role() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto = add_user(&state, "moto", Role::Courier, None);
    let a = add_store(&state, "A");
    let b = add_store(&state, "B");

    for size in ["small", "large"] {
        let (status, _) = call(
            &state,
            "POST",
            "/transfers",
            Some(&operator.token),
            Some(json!({ "kind": "exit", "origin_store_id": a, "destination_store_id": b, "load_size": size })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, all) = call(&state, "GET", "/transfers", Some(&operator.token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, small) = call(&state, "GET", "/transfers", Some(&moto.token), None).await;
    assert_eq!(small.as_array().unwrap().len(), 1);
    assert_eq!(small[0]["load_size"], "small");

    let (status, _) = call(
        &state,
        "POST",
        "/transfers",
        Some(&moto.token),
        Some(json!({ "kind": "exit", "origin_store_id": a })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn courier_route_is_built_from_selected_transfers() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto = add_user(&state, "moto", Role::Courier, None);
    let a = add_store(&state, "A");
    let b = add_store(&state, "B");

    let (_, transfer) = call(
        &state,
        "POST",
        "/transfers",
        Some(&operator.token),
        Some(json!({ "kind": "exit", "origin_store_id": a, "destination_store_id": b })),
    )
    .await;
    let transfer_id = transfer["id"].clone();

    let (status, _) = call(&state, "POST", "/transfers/route", Some(&moto.token), Some(json!({ "transfer_ids": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = call(
        &state,
        "POST",
        "/transfers/route",
        Some(&moto.token),
        Some(json!({ "transfer_ids": [transfer_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, detail) = call(
        &state,
        "GET",
        &format!("/routes/{}", created["id"].as_str().unwrap()),
        Some(&moto.token),
        None,
    )
    .await;
    assert_eq!(detail["status"], "en_route");
    assert!(detail["name"].as_str().unwrap().starts_with("Route "));
    assert_eq!(detail["stops"].as_array().unwrap().len(), 2);
    assert_eq!(detail["stops"][0]["progress"], "pending");
    assert_eq!(detail["stops"][0]["transfer_to_collect"], transfer_id);

    let (status, _) = call(
        &state,
        "POST",
        "/transfers/route",
        Some(&moto.token),
        Some(json!({ "transfer_ids": [transfer_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ── Protocols ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn protocols_confirm_once() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);
    let moto = add_user(&state, "moto", Role::Courier, None);
    let operator = add_user(&state, "op", Role::Operator, None);

    let (status, protocol) = call(&state, "POST", "/protocols", Some(&admin.token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(protocol["number"].as_str().unwrap().starts_with("PRT-"));
    let uri = format!("/protocols/{}/confirm", protocol["id"].as_str().unwrap());

    let (status, _) = call(&state, "POST", &uri, Some(&operator.token), Some(json!({ "confirmed_name": "Maria" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&state, "POST", &uri, Some(&moto.token), Some(json!({ "confirmed_name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, confirmed) = call(&state, "POST", &uri, Some(&moto.token), Some(json!({ "confirmed_name": " Maria " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["confirmed_name"], "Maria");

    let (status, body) = call(&state, "POST", &uri, Some(&moto.token), Some(json!({ "confirmed_name": "Maria" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "protocol already finalized");
}

// ── Stock & notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn stock_movements_are_listed_by_kind() {
    let state = make_state().await;
    let admin = add_user(&state, "admin", Role::Admin, None);

    let (status, entry) = call(&state, "POST", "/stock/entries", Some(&admin.token), Some(json!({ "protocol": "P-1" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["kind"], "entry");
    call(&state, "POST", "/stock/exits", Some(&admin.token), Some(json!({ "protocol": "P-2" }))).await;

    let (_, exits) = call(&state, "GET", "/stock/movements?kind=exit", Some(&admin.token), None).await;
    assert_eq!(exits.as_array().unwrap().len(), 1);
    assert_eq!(exits[0]["protocol"], "P-2");
}

#[tokio::test]
async fn notifications_are_marked_read_by_their_owner() {
    let state = make_state().await;
    let operator = add_user(&state, "op", Role::Operator, None);
    let moto = add_user(&state, "moto", Role::Courier, None);

    call(
        &state,
        "POST",
        "/routes",
        Some(&operator.token),
        Some(json!({ "courier_id": moto.id })),
    )
    .await;

    let (_, list) = call(&state, "GET", "/notifications", Some(&moto.token), None).await;
    let uri = format!("/notifications/{}/read", list[0]["id"].as_str().unwrap());
    assert_eq!(list[0]["read"], false);

    let (status, _) = call(&state, "POST", &uri, Some(&operator.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&state, "POST", &uri, Some(&moto.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = call(&state, "GET", "/notifications", Some(&moto.token), None).await;
    assert_eq!(list[0]["read"], true);
}
