mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, TestApp};
use serde_json::json;

#[tokio::test]
async fn replies_notify_with_reply_or_branch() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;

    let root = app.publish(&ada, "root post", None).await;
    let reply = app.publish(&bob, "reply", Some(root)).await;
    app.publish(&ada, "branch", Some(reply)).await;
    // Replying to yourself is silent.
    app.publish(&ada, "self reply", Some(root)).await;

    let (status, ada_inbox) = app.get("/notifications", Some(&ada.token)).await;
    assert_eq!(status, StatusCode::OK);
    let ada_inbox = ada_inbox.as_array().unwrap();
    assert_eq!(ada_inbox.len(), 1);
    assert_eq!(ada_inbox[0]["type"], "REPLY");
    assert_eq!(ada_inbox[0]["actor"]["username"], "bob");
    assert_eq!(ada_inbox[0]["postSnippet"], "reply");
    assert_eq!(ada_inbox[0]["isRead"], false);

    let (_, bob_inbox) = app.get("/notifications", Some(&bob.token)).await;
    assert_eq!(bob_inbox[0]["type"], "BRANCH");
    assert_eq!(bob_inbox[0]["actor"]["username"], "ada");
}

#[tokio::test]
async fn unread_count_and_mark_read() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let post = app.publish(&ada, "hello", None).await;
    app.publish(&bob, "one", Some(post)).await;
    app.like(&bob, post).await;

    let (_, body) = app.get("/notifications/unread-count", Some(&ada.token)).await;
    assert_eq!(body, json!({ "count": 2 }));

    let (status, body) = app
        .send(Method::POST, "/notifications/mark-read", Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "updated": 2 }));

    let (_, body) = app.get("/notifications/unread-count", Some(&ada.token)).await;
    assert_eq!(body, json!({ "count": 0 }));
}

#[tokio::test]
async fn inboxes_are_private() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let post = app.publish(&ada, "hello", None).await;
    app.publish(&bob, "hey", Some(post)).await;

    let (status, _) = app.get("/notifications", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .get(&format!("/notifications?userId={}", ada.id), Some(&bob.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, inbox) = app
        .get(&format!("/notifications?userId={}", ada.id), Some(&ada.token))
        .await;
    let notification = id_of(&inbox[0]);
    let uri = format!("/notifications/{notification}");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
