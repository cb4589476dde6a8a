//! Shared harness: the real router over the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::{Argon2CredentialHasher, JwtTokenService};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use domains::{CredentialHasher, Identity, IdentityRepository, Role};
use serde_json::Value;
use services::{AppServices, Ports, RateLimitConfig, RealtimeBus, SubmissionThrottle};
use storage_adapters::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "hunter22";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub services: AppServices,
    hasher: Arc<Argon2CredentialHasher>,
}

/// A registered identity and its bearer token.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::unlimited())
    }

    pub fn with_rate_limit(config: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let hasher = Arc::new(Argon2CredentialHasher::low_cost().unwrap());
        let tokens = Arc::new(JwtTokenService::new(SECRET, 3600).unwrap());
        let ports = Ports {
            identities: store.clone(),
            content: store.clone(),
            likes: store.clone(),
            follows: store.clone(),
            notifications: store.clone(),
            messages: store.clone(),
            hasher: hasher.clone(),
            tokens,
        };
        let services = AppServices::new(ports, RealtimeBus::new(16), SubmissionThrottle::new(config));
        let router = router(AppState::new(services.clone()));
        Self {
            router,
            store,
            services,
            hasher,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn register(&self, username: &str) -> User {
        let (status, body) = self
            .post(
                "/identities/register",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
        session_user(&body)
    }

    /// Administrators are provisioned out of band, never through registration.
    pub async fn admin(&self, username: &str) -> User {
        let hash = self.hasher.hash_password(PASSWORD).unwrap();
        let mut identity = Identity::new(username.to_string(), hash);
        identity.role = Role::Admin;
        self.store.insert_identity(identity).await.unwrap();

        let (status, body) = self
            .post(
                "/identities/login",
                None,
                serde_json::json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login: {body}");
        session_user(&body)
    }

    /// Publishes a node and returns its id.
    pub async fn publish(&self, user: &User, content: &str, parent: Option<Uuid>) -> Uuid {
        let (status, body) = self
            .post(
                "/posts",
                Some(&user.token),
                serde_json::json!({ "content": content, "parentId": parent }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "publish: {body}");
        id_of(&body)
    }

    pub async fn like(&self, user: &User, post: Uuid) -> Value {
        let (status, body) = self
            .send(Method::POST, &format!("/posts/{post}/like"), Some(&user.token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "like: {body}");
        body
    }
}

pub fn session_user(body: &Value) -> User {
    User {
        id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
        token: body["token"].as_str().unwrap().to_string(),
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

pub fn ids(list: &Value) -> Vec<Uuid> {
    list.as_array().unwrap().iter().map(id_of).collect()
}
