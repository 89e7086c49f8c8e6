//! Inbound and outbound WebSocket event definitions.
//!
//! Every frame is a JSON object tagged by `type` (`room:join`,
//! `message:send`, `call:signal`, ...). Call payloads are opaque
//! [`serde_json::Value`]s relayed verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::types::{CallId, MessageId, RoomId, UserId};

use crate::call::state::CallEndReason;
use crate::relay::status::DeliveryStatus;
use crate::room::LeaveReason;

/// Events sent by the client to the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Join a conversation room.
    #[serde(rename = "room:join")]
    JoinRoom {
        /// Room to join.
        room_id: String,
    },
    /// Leave a conversation room.
    #[serde(rename = "room:leave")]
    LeaveRoom {
        /// Room to leave.
        room_id: String,
    },
    /// Post a chat message.
    #[serde(rename = "message:send")]
    SendMessage {
        /// Target room.
        room_id: String,
        /// Message body.
        content: String,
        /// Client-generated idempotency key.
        nonce: String,
    },
    /// Read receipt for a message.
    #[serde(rename = "message:seen")]
    MessageSeen {
        /// Hub-assigned message id.
        message_id: MessageId,
    },
    #[serde(rename = "typing:start")]
    TypingStart { room_id: String },
    #[serde(rename = "typing:stop")]
    TypingStop { room_id: String },
    /// Ring another user.
    #[serde(rename = "call:start")]
    CallStart {
        /// User being called.
        callee_id: UserId,
        /// Opaque offer payload.
        #[serde(default)]
        payload: Value,
    },
    /// Accept a ringing call.
    #[serde(rename = "call:answer")]
    CallAnswer {
        call_id: CallId,
        /// Opaque answer payload.
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "call:reject")]
    CallReject { call_id: CallId },
    #[serde(rename = "call:end")]
    CallEnd { call_id: CallId },
    /// Relay an ICE candidate or renegotiation payload.
    #[serde(rename = "call:signal")]
    CallSignal { call_id: CallId, payload: Value },
    /// Application-level liveness ping.
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

impl InboundMessage {
    /// Wire name of the event, echoed back in error frames.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "room:join",
            Self::LeaveRoom { .. } => "room:leave",
            Self::SendMessage { .. } => "message:send",
            Self::MessageSeen { .. } => "message:seen",
            Self::TypingStart { .. } => "typing:start",
            Self::TypingStop { .. } => "typing:stop",
            Self::CallStart { .. } => "call:start",
            Self::CallAnswer { .. } => "call:answer",
            Self::CallReject { .. } => "call:reject",
            Self::CallEnd { .. } => "call:end",
            Self::CallSignal { .. } => "call:signal",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Events pushed by the hub to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Join acknowledged.
    #[serde(rename = "room:joined")]
    RoomJoined {
        room_id: RoomId,
        /// Users with at least one live connection in the room.
        online_user_ids: Vec<UserId>,
    },
    /// Leave acknowledged.
    #[serde(rename = "room:left")]
    RoomLeft { room_id: RoomId },
    /// Another user's connection entered the room.
    #[serde(rename = "room:peer_joined")]
    PeerJoined {
        room_id: RoomId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_url: Option<String>,
    },
    /// A user's last connection left the room.
    #[serde(rename = "room:peer_left")]
    PeerLeft {
        room_id: RoomId,
        user_id: UserId,
        reason: LeaveReason,
    },
    /// Acceptance of a `message:send`, repeated verbatim for replays.
    #[serde(rename = "message:ack")]
    MessageAck {
        nonce: String,
        message_id: MessageId,
        status: DeliveryStatus,
    },
    /// A chat message from another connection.
    #[serde(rename = "message:received")]
    MessageReceived {
        message_id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        content: String,
        nonce: String,
        sent_at: DateTime<Utc>,
    },
    /// A recipient's status for one of the sender's messages advanced.
    #[serde(rename = "message:status")]
    MessageStatus {
        message_id: MessageId,
        room_id: RoomId,
        nonce: String,
        user_id: UserId,
        status: DeliveryStatus,
    },
    #[serde(rename = "typing:changed")]
    TypingChanged {
        room_id: RoomId,
        user_id: UserId,
        active: bool,
    },
    /// The callee has been notified.
    #[serde(rename = "call:ringing")]
    CallRinging { call_id: CallId, callee_id: UserId },
    /// Incoming call offer, sent to every callee device.
    #[serde(rename = "call:incoming")]
    CallIncoming {
        call_id: CallId,
        caller_id: UserId,
        caller_name: String,
        payload: Value,
    },
    #[serde(rename = "call:accepted")]
    CallAccepted {
        call_id: CallId,
        callee_id: UserId,
        payload: Value,
    },
    #[serde(rename = "call:rejected")]
    CallRejected { call_id: CallId, callee_id: UserId },
    #[serde(rename = "call:ended")]
    CallEnded {
        call_id: CallId,
        reason: CallEndReason,
    },
    /// Opaque signaling payload from the other party.
    #[serde(rename = "call:signal")]
    CallSignal {
        call_id: CallId,
        from_user_id: UserId,
        payload: Value,
    },
    /// Another device of the same user already answered.
    #[serde(rename = "call:superseded")]
    CallSuperseded { call_id: CallId },
    #[serde(rename = "heartbeat:ack")]
    HeartbeatAck { server_time: DateTime<Utc> },
    /// Failure of a client event, correlated by event name.
    #[serde(rename = "error")]
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<String>,
    },
}

impl OutboundMessage {
    /// Build an error frame from an application error.
    ///
    /// Internal failures are reported with a generic message; the detail
    /// stays in the server log.
    pub fn from_error(err: &parley_core::AppError, event: Option<&str>) -> Self {
        let message = if err.kind.is_internal() {
            "Internal error".to_string()
        } else {
            err.message.clone()
        };
        Self::Error {
            code: err.code().to_string(),
            message,
            event: event.map(str::to_string),
        }
    }

    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room:joined",
            Self::RoomLeft { .. } => "room:left",
            Self::PeerJoined { .. } => "room:peer_joined",
            Self::PeerLeft { .. } => "room:peer_left",
            Self::MessageAck { .. } => "message:ack",
            Self::MessageReceived { .. } => "message:received",
            Self::MessageStatus { .. } => "message:status",
            Self::TypingChanged { .. } => "typing:changed",
            Self::CallRinging { .. } => "call:ringing",
            Self::CallIncoming { .. } => "call:incoming",
            Self::CallAccepted { .. } => "call:accepted",
            Self::CallRejected { .. } => "call:rejected",
            Self::CallEnded { .. } => "call:ended",
            Self::CallSignal { .. } => "call:signal",
            Self::CallSuperseded { .. } => "call:superseded",
            Self::HeartbeatAck { .. } => "heartbeat:ack",
            Self::Error { .. } => "error",
        }
    }
}
