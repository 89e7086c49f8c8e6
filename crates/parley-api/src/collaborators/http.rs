//! Collaborators backed by the application backend's HTTP API.
//!
//! Endpoints, relative to `backend.base_url`:
//!
//! - `GET  /rooms/{room_id}/members/{user_id}` → `{"member": bool}`; 404 means not a member
//! - `POST /messages` with a [`PersistMessage`] body; any 2xx is success
//! - `GET  /users/{user_id}` → [`UserDisplayInfo`]; 404 means unknown

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use parley_core::config::BackendConfig;
use parley_core::error::ErrorKind;
use parley_core::traits::{
    MessagePersister, PersistMessage, RoomAuthorizer, UserDirectory, UserDisplayInfo,
};
use parley_core::types::{RoomId, UserId};
use parley_core::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct MembershipResponse {
    member: bool,
}

/// Room authorizer, message persister, and user directory over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Creates a client with the configured timeout.
    pub fn new(config: &BackendConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build backend HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: (!config.api_key.is_empty()).then(|| config.api_key.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> AppResult<Response> {
        self.authorized(request).send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("{what} request failed"),
                e,
            )
        })
    }
}

fn unexpected(what: &str, status: StatusCode) -> AppError {
    AppError::external(format!("{what} returned {status}"))
}

fn decode_error(what: &str, err: reqwest::Error) -> AppError {
    AppError::with_source(
        ErrorKind::ExternalService,
        format!("{what} returned an unreadable body"),
        err,
    )
}

#[async_trait]
impl RoomAuthorizer for HttpBackend {
    async fn is_room_member(&self, user_id: UserId, room_id: &RoomId) -> AppResult<bool> {
        let url = self.url(&format!("/rooms/{room_id}/members/{user_id}"));
        let response = self.execute(self.client.get(url), "Membership check").await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let body: MembershipResponse = response
                    .json()
                    .await
                    .map_err(|e| decode_error("Membership check", e))?;
                debug!(user_id = %user_id, room_id = %room_id, member = body.member, "Membership resolved");
                Ok(body.member)
            }
            status => Err(unexpected("Membership check", status)),
        }
    }
}

#[async_trait]
impl MessagePersister for HttpBackend {
    async fn persist_message(&self, message: PersistMessage) -> AppResult<()> {
        let request = self.client.post(self.url("/messages")).json(&message);
        let response = self.execute(request, "Message persist").await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(unexpected("Message persist", status))
        }
    }
}

#[async_trait]
impl UserDirectory for HttpBackend {
    async fn resolve_display_info(&self, user_id: UserId) -> AppResult<Option<UserDisplayInfo>> {
        let url = self.url(&format!("/users/{user_id}"));
        let response = self.execute(self.client.get(url), "User lookup").await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| decode_error("User lookup", e)),
            status => Err(unexpected("User lookup", status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parley_core::types::MessageId;

    #[derive(Clone, Default)]
    struct Fake {
        member: Arc<Mutex<Option<(String, String)>>>,
        stored: Arc<Mutex<Vec<PersistMessage>>>,
        auth: Arc<Mutex<Option<String>>>,
    }

    async fn membership(
        State(fake): State<Fake>,
        Path((room, user)): Path<(String, String)>,
    ) -> Result<Json<serde_json::Value>, AxumStatus> {
        match fake.member.lock().unwrap().as_ref() {
            Some((r, u)) if *r == room && *u == user => {
                Ok(Json(serde_json::json!({ "member": true })))
            }
            _ => Err(AxumStatus::NOT_FOUND),
        }
    }

    async fn store(
        State(fake): State<Fake>,
        headers: HeaderMap,
        Json(message): Json<PersistMessage>,
    ) -> AxumStatus {
        *fake.auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        fake.stored.lock().unwrap().push(message);
        AxumStatus::NO_CONTENT
    }

    async fn user(Path(user): Path<String>) -> Result<Json<serde_json::Value>, AxumStatus> {
        if user == "00000000-0000-0000-0000-000000000001" {
            Ok(Json(serde_json::json!({
                "user_id": user,
                "display_name": "Ada",
            })))
        } else {
            Err(AxumStatus::INTERNAL_SERVER_ERROR)
        }
    }

    async fn serve(fake: Fake) -> String {
        let app = Router::new()
            .route("/rooms/{room}/members/{user}", get(membership))
            .route("/messages", post(store))
            .route("/users/{user}", get(user))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn backend(base_url: String) -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url,
            api_key: "secret".to_string(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_membership_lookup() {
        let fake = Fake::default();
        let user = UserId::new();
        *fake.member.lock().unwrap() = Some(("t1".to_string(), user.to_string()));
        let backend = backend(serve(fake).await);

        let room = RoomId::parse("t1").unwrap();
        assert!(backend.is_room_member(user, &room).await.unwrap());
        assert!(!backend.is_room_member(UserId::new(), &room).await.unwrap());
    }

    #[tokio::test]
    async fn test_persist_posts_message_with_bearer() {
        let fake = Fake::default();
        let backend = backend(serve(fake.clone()).await);

        let message = PersistMessage {
            message_id: MessageId::new(),
            room_id: RoomId::parse("t1").unwrap(),
            sender_id: UserId::new(),
            content: "hi".to_string(),
            nonce: "n1".to_string(),
            accepted_at: chrono::Utc::now(),
        };
        backend.persist_message(message).await.unwrap();

        assert_eq!(fake.stored.lock().unwrap()[0].nonce, "n1");
        assert_eq!(fake.auth.lock().unwrap().as_deref(), Some("Bearer secret"));
    }

    #[tokio::test]
    async fn test_directory_lookup_and_failure() {
        let backend = backend(serve(Fake::default()).await);

        let known: UserId = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        let info = backend.resolve_display_info(known).await.unwrap().unwrap();
        assert_eq!(info.display_name, "Ada");
        assert_eq!(info.avatar_url, None);

        let err = backend
            .resolve_display_info(UserId::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_external_error() {
        let backend = backend("http://127.0.0.1:1".to_string());
        let err = backend
            .is_room_member(UserId::new(), &RoomId::parse("t1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalService);
    }
}
