mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use std::sync::Arc;

use common::{harness, registered, session_config, Harness, ScriptedConnector};
use v_connect_wa::config::CacheConfig;
use v_connect_wa::protocol::{OwnIdentity, ProtocolEvent};
use v_connect_wa::router;
use v_connect_wa::server::VConnectWaServer;
use v_connect_wa::session::InstanceManager;
use v_connect_wa::store::{CredentialStore, FileCredentialStore};

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(VConnectWaServer::new($h.manager.clone())))
                .configure(router::configure),
        )
        .await
    };
}

async fn created_id(h: &Harness) -> String {
    h.manager.create(Some("Support".to_string())).await.unwrap().id
}

#[actix_web::test]
async fn test_health_probes() {
    let h = harness();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/v1/health/live").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/v1/health/ready").to_request(),
    )
    .await;
    assert_eq!(body["component"], "session_manager");
    assert_eq!(body["healthy"], true);
}

#[actix_web::test]
async fn test_create_list_get_delete() {
    let h = harness();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/v1/instances")
        .set_json(json!({ "name": "Sales" }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Sales");
    assert_eq!(created["status"], "connecting");

    // 请求体可省略 / The body is optional
    let resp = test::call_service(&app, test::TestRequest::post().uri("/v1/instances").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let list: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/v1/instances").to_request(),
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 2);

    let got: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri(&format!("/v1/instances/{}", id)).to_request(),
    )
    .await;
    assert_eq!(got["id"], id.as_str());

    let deleted: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::delete().uri(&format!("/v1/instances/{}", id)).to_request(),
    )
    .await;
    assert_eq!(deleted, json!({ "success": true }));

    for req in [
        test::TestRequest::get().uri(&format!("/v1/instances/{}", id)).to_request(),
        test::TestRequest::delete().uri(&format!("/v1/instances/{}", id)).to_request(),
        test::TestRequest::get().uri(&format!("/v1/instances/{}/qr", id)).to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

#[actix_web::test]
async fn test_create_handshake_failure_is_bad_gateway() {
    let h = harness();
    h.script.fail_opens(true);
    let app = app!(h);
    let resp = test::call_service(&app, test::TestRequest::post().uri("/v1/instances").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(h.manager.is_empty());
}

#[actix_web::test]
async fn test_qr_view_is_read_only() {
    let h = harness();
    let id = created_id(&h).await;
    let app = app!(h);
    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri(&format!("/v1/instances/{}/qr", id)).to_request(),
    )
    .await;
    assert_eq!(body["hasQR"], false);
    assert_eq!(body["status"], "connecting");
    assert_eq!(h.script.open_count(&id), 1);
}

#[actix_web::test]
async fn test_send_validation_and_not_connected() {
    let h = harness();
    let id = created_id(&h).await;
    let app = app!(h);
    let uri = format!("/v1/instances/{}/send", id);

    let req = test::TestRequest::post().uri(&uri).set_json(json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["to", "message"]);

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_json(json!({ "to": "5511999990000", "message": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "failed to send message");
    assert_eq!(h.script.sent_count(), 0);
}

#[actix_web::test]
async fn test_send_when_connected() {
    let h = harness();
    let mut rx = h.manager.subscribe();
    let id = created_id(&h).await;
    h.script.push(
        &id,
        ProtocolEvent::Open {
            me: Some(OwnIdentity {
                jid: "5511000001111@s.whatsapp.net".to_string(),
                lid: None,
                push_name: None,
            }),
        },
    );
    common::next_event(&mut rx, &id).await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri(&format!("/v1/instances/{}/send", id))
        .set_json(json!({ "to": "5511999990000", "message": "hi" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(h.script.sent_count(), 1);
}

#[actix_web::test]
async fn test_profile_picture_routes() {
    let h = harness();
    let id = created_id(&h).await;
    h.script.without_picture("5511002@s.whatsapp.net");
    let app = app!(h);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/v1/instances/{}/profile-picture?jid=5511001&tier=image", id))
            .to_request(),
    )
    .await;
    assert_eq!(body["jid"], "5511001");
    assert_eq!(body["url"], "https://pps.example/5511001@s.whatsapp.net.jpg");

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/v1/instances/{}/profile-pictures", id))
            .set_json(json!({ "jids": ["5511001@s.whatsapp.net", "5511002@s.whatsapp.net"] }))
            .to_request(),
    )
    .await;
    assert!(body["pictures"]["5511001@s.whatsapp.net"].is_string());
    assert!(body["pictures"]["5511002@s.whatsapp.net"].is_null());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/v1/instances/inst_missing/profile-picture?jid=5511001")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_unknown_contact_is_not_found() {
    let h = harness();
    let id = created_id(&h).await;
    let app = app!(h);
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/v1/instances/{}/contacts/5511999@s.whatsapp.net", id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_saved_sessions_and_restore() {
    let h = harness();
    h.store.save("inst_saved", &registered("Support")).await.unwrap();
    let app = app!(h);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/v1/sessions/saved").to_request(),
    )
    .await;
    assert_eq!(body, json!({ "sessions": ["inst_saved"] }));

    let restored: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/v1/sessions/inst_saved/restore").to_request(),
    )
    .await;
    assert_eq!(restored["id"], "inst_saved");
    assert_eq!(restored["name"], "Support");

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/v1/sessions/inst_saved/restore").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/v1/sessions/inst_ghost/restore").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_restore_id_outside_store_alphabet_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path()));
    store.save("inst_saved", &registered("Support")).await.unwrap();
    let manager = Arc::new(InstanceManager::new(
        Arc::new(ScriptedConnector::default()),
        store,
        session_config(),
        CacheConfig::default(),
        64,
    ));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(VConnectWaServer::new(manager.clone())))
            .configure(router::configure),
    )
    .await;

    for id in ["inst.abc", "inst%20x"] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/v1/sessions/{}/restore", id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "restoring {}", id);
    }
    assert!(manager.is_empty());

    let restored: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/v1/sessions/inst_saved/restore").to_request(),
    )
    .await;
    assert_eq!(restored["name"], "Support");
}
