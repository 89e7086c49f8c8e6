//! Shared helpers for end-to-end tests: a hub served on an ephemeral port
//! and a small JSON WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use parley_api::{AppState, build_app};
use parley_auth::JwtEncoder;
use parley_core::config::AppConfig;
use parley_core::types::{RoomId, UserId};
use parley_realtime::collab::{InMemoryPersister, StaticDirectory, StaticMembership};
use parley_realtime::{Collaborators, HubEngine};

/// A running server plus handles for arranging test state.
pub struct TestApp {
    pub addr: SocketAddr,
    pub hub: Arc<HubEngine>,
    pub membership: Arc<StaticMembership>,
    pub directory: Arc<StaticDirectory>,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Serve the full application on 127.0.0.1 with in-memory collaborators.
    pub async fn spawn() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "integration-secret".to_string();

        let membership = Arc::new(StaticMembership::new());
        let directory = Arc::new(StaticDirectory::new());
        let hub = Arc::new(HubEngine::new(
            config.hub.clone(),
            Collaborators {
                authorizer: membership.clone(),
                persister: Arc::new(InMemoryPersister::new()),
                directory: directory.clone(),
            },
        ));
        let encoder = JwtEncoder::new(&config.auth);
        let app = build_app(AppState::new(config, Arc::clone(&hub)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            hub,
            membership,
            directory,
            encoder,
        }
    }

    pub fn token(&self, user_id: UserId, username: &str) -> String {
        self.encoder
            .generate_access_token(user_id, username)
            .unwrap()
            .0
    }

    pub fn grant(&self, room: &str, user_id: UserId) {
        self.membership.grant(RoomId::parse(room).unwrap(), user_id);
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={token}", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Open an authenticated socket for `user_id`.
    pub async fn connect(&self, user_id: UserId, username: &str) -> WsClient {
        let (stream, _) = connect_async(self.ws_url(&self.token(user_id, username)))
            .await
            .unwrap();
        WsClient { user_id, stream }
    }
}

/// JSON-speaking WebSocket client.
pub struct WsClient {
    pub user_id: UserId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::text(frame.to_string()))
            .await
            .unwrap();
    }

    /// Next server event, skipping control frames.
    pub async fn next_event(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("timed out waiting for an event")
                .expect("socket closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    /// Skip events until one of type `event` arrives.
    pub async fn expect(&mut self, event: &str) -> Value {
        loop {
            let msg = self.next_event().await;
            if msg["type"] == event {
                return msg;
            }
        }
    }

    pub async fn join(&mut self, room: &str) -> Value {
        self.send(serde_json::json!({"type": "room:join", "room_id": room}))
            .await;
        self.expect("room:joined").await
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
