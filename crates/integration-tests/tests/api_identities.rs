mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, PASSWORD};
use domains::{NotificationRepository, NotificationType};
use serde_json::json;
use services::secure_channel::generate_key_pair;

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/identities/register", None, json!({ "username": "ada", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["user"]["role"], "USER");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = app
        .post("/identities/login", None, json!({ "username": "ada", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "ada");

    let (status, body) = app
        .post("/identities/login", None, json!({ "username": "ada", "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthenticated");
}

#[tokio::test]
async fn registration_is_validated() {
    let app = TestApp::new();
    app.register("ada").await;

    let (status, body) = app
        .post("/identities/register", None, json!({ "username": "ada", "password": "other" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, body) = app
        .post("/identities/register", None, json!({ "username": "  ", "password": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation_error");
}

#[tokio::test]
async fn bad_tokens_are_rejected() {
    let app = TestApp::new();
    let (status, _) = app.post("/posts", None, json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/posts", Some("not-a-jwt"), json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suspension_blocks_login_and_existing_tokens() {
    let app = TestApp::new();
    let admin = app.admin("mod").await;
    let user = app.register("troll").await;
    let bystander = app.register("bystander").await;

    let (status, _) = app
        .post(&format!("/identities/{}/suspend", user.id), Some(&bystander.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/identities/{}/suspend", user.id),
            Some(&admin.token),
            json!({ "reason": "spam" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuspended"], true);
    assert_eq!(body["suspensionReason"], "spam");

    let (status, body) = app
        .post("/identities/login", None, json!({ "username": "troll", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"].as_str().unwrap().contains("spam"));

    let (status, _) = app.post("/posts", Some(&user.token), json!({ "content": "still here" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let inbox = app.store.list_for_recipient(user.id, 50).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].notification.kind, NotificationType::Suspension);
    assert_eq!(inbox[0].notification.reason.as_deref(), Some("spam"));

    // Lifting takes no body and records nothing new.
    let (status, body) = app
        .send(Method::POST, &format!("/identities/{}/suspend", user.id), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuspended"], false);
    assert!(body["suspensionReason"].is_null());
    assert_eq!(app.store.list_for_recipient(user.id, 50).await.unwrap().len(), 1);

    let (status, _) = app
        .post("/identities/login", None, json!({ "username": "troll", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn follow_toggle_and_profile() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let follow = format!("/identities/{}/follow", bob.id);

    let (status, body) = app.send(Method::POST, &follow, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["following"], true);

    let (_, profile) = app.get(&format!("/identities/{}", bob.id), Some(&ada.token)).await;
    assert_eq!(profile["username"], "bob");
    assert_eq!(profile["followers"], 1);
    assert_eq!(profile["isFollowing"], true);

    let (_, followers) = app.get(&format!("/identities/{}/followers", bob.id), None).await;
    assert_eq!(followers[0]["username"], "ada");
    let (_, following) = app.get(&format!("/identities/{}/following", ada.id), None).await;
    assert_eq!(following[0]["username"], "bob");

    let (_, body) = app.send(Method::POST, &follow, Some(&ada.token), None).await;
    assert_eq!(body["following"], false);
    let (_, profile) = app.get(&format!("/identities/{}", bob.id), None).await;
    assert_eq!(profile["followers"], 0);
    assert_eq!(profile["isFollowing"], false);

    // Follows are silent.
    assert!(app.store.list_for_recipient(bob.id, 50).await.unwrap().is_empty());

    let (status, _) = app
        .send(Method::POST, &format!("/identities/{}/follow", ada.id), Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profiles_resolve_by_username() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    app.send(Method::POST, &format!("/identities/{}/follow", bob.id), Some(&ada.token), None)
        .await;

    let (status, profile) = app.get("/identities/by-username/bob", Some(&ada.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], bob.id.to_string());
    assert_eq!(profile["followers"], 1);
    assert_eq!(profile["isFollowing"], true);

    let (status, anonymous) = app.get("/identities/by-username/bob", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anonymous["isFollowing"], false);

    let (status, body) = app.get("/identities/by-username/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn username_search_is_capped() {
    let app = TestApp::new();
    for name in ["dan", "dana", "danny", "jordan", "aidan", "sheridan", "bob"] {
        app.register(name).await;
    }

    let (status, hits) = app.get("/identities/search?q=DAN", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = hits
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["aidan", "dan", "dana", "danny", "jordan"]);

    let (_, none) = app.get("/identities/search?q=zzz", None).await;
    assert_eq!(none, json!([]));
    let (_, blank) = app.get("/identities/search", None).await;
    assert_eq!(blank, json!([]));
}

#[tokio::test]
async fn public_key_registration() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let uri = format!("/identities/{}/public-key", ada.id);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let keys = generate_key_pair().unwrap();
    let (status, _) = app
        .send(Method::PUT, &uri, Some(&bob.token), Some(json!({ "publicKey": keys.public_key })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::PUT, &uri, Some(&ada.token), Some(json!({ "publicKey": "bm90IGEga2V5" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "crypto_failure");

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&ada.token), Some(json!({ "publicKey": keys.public_key })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publicKey"], keys.public_key.as_str());

    let (_, profile) = app.get(&format!("/identities/{}", ada.id), None).await;
    assert_eq!(profile["hasPublicKey"], true);
}
