//! # integration-tests
//!
//! Shared fixtures: a fully wired router over in-memory adapters, two
//! seeded users with static tokens, and recording fakes for media and mail.

use std::sync::{Arc, Mutex};

use api_adapters::{router, AppState, RouterOptions};
use async_trait::async_trait;
use auth_adapters::StaticPrincipalResolver;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use domains::{EmailMessage, Mailer, MediaStorage, Result, UserId, UserProfile};
use mime::Mime;
use serde_json::Value;
use services::{MediaLifecycle, NotificationDispatcher};
use storage_adapters::{InMemoryPostRepository, InMemoryUserDirectory};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const CAROL_TOKEN: &str = "carol-token";

/// Smallest payload `image::guess_format` recognises as PNG.
pub fn png_data_uri() -> String {
    let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Object store that keeps uploads in memory and records deletions.
#[derive(Default)]
pub struct RecordingMedia {
    pub uploaded: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaStorage for RecordingMedia {
    async fn upload(&self, _data: Bytes, content_type: &Mime) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let url = format!("https://media.test/posts/{id}.{}", content_type.subtype());
        self.uploaded.lock().unwrap().push(id);
        Ok(url)
    }

    async fn destroy(&self, object_id: &str) -> Result<()> {
        self.destroyed.lock().unwrap().push(object_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<InMemoryUserDirectory>,
    pub posts: Arc<InMemoryPostRepository>,
    pub media: Arc<RecordingMedia>,
    pub mailer: Arc<RecordingMailer>,
    pub alice: UserId,
    pub bob: UserId,
    pub carol: UserId,
    worker: JoinHandle<()>,
}

fn profile(username: &str) -> UserProfile {
    UserProfile {
        id: Uuid::now_v7(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        profile_pic: Some(format!("https://pics.test/{username}.png")),
        following: Vec::new(),
    }
}

impl TestApp {
    /// Must be called inside a Tokio runtime; the notification worker is
    /// spawned on it.
    pub fn spawn() -> Self {
        let users = Arc::new(InMemoryUserDirectory::new());
        let posts = Arc::new(InMemoryPostRepository::new());
        let media = Arc::new(RecordingMedia::default());
        let mailer = Arc::new(RecordingMailer::default());

        let (alice, bob, carol) = (profile("alice"), profile("bob"), profile("carol"));
        let ids = (alice.id, bob.id, carol.id);
        for user in [alice, bob, carol] {
            users.upsert(user);
        }

        let principals = StaticPrincipalResolver::new()
            .with_token(ALICE_TOKEN, ids.0)
            .with_token(BOB_TOKEN, ids.1)
            .with_token(CAROL_TOKEN, ids.2);

        let (notifier, worker) =
            NotificationDispatcher::spawn(mailer.clone(), posts.clone(), users.clone());
        let state = AppState::new(
            posts.clone(),
            users.clone(),
            MediaLifecycle::new(media.clone(), std::time::Duration::from_secs(1)),
            notifier,
            Arc::new(principals),
        );
        let router = router(state, &RouterOptions::default()).expect("default options are valid");

        Self {
            router,
            users,
            posts,
            media,
            mailer,
            alice: ids.0,
            bob: ids.1,
            carol: ids.2,
            worker,
        }
    }

    /// Sends one request through the full middleware stack. Non-JSON bodies
    /// come back as a JSON string.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.send_raw(req).await
    }

    pub async fn send_raw(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Creates a text-only post as `token`'s user and returns its id.
    pub async fn create_post(&self, token: &str, owner: UserId, text: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/posts",
                Some(token),
                Some(serde_json::json!({ "postedBy": owner, "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Tears the app down and returns every email the worker delivered.
    pub async fn finish(self) -> Vec<EmailMessage> {
        drop(self.router);
        self.worker.await.unwrap();
        std::mem::take(&mut *self.mailer.sent.lock().unwrap())
    }
}
