//! JSON messages exchanged with viewers over the WebSocket connection.

use anyhow::{Context, Result};
use axum::extract::ws::Utf8Bytes;
use pipeline_monitor_core::models::StatusDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    InitialStatus { data: &'a StatusDocument },
    StatusUpdate { data: &'a StatusDocument },
    Error { message: &'a str },
    Pong,
}

impl ServerMessage<'_> {
    pub fn to_text(&self) -> Result<Utf8Bytes> {
        serde_json::to_string(self).map(Utf8Bytes::from).context("Failed to serialize message")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    RequestStatus,
}

/// Build the response to an inbound text frame.
pub fn reply<'a>(text: &str, current: &'a StatusDocument) -> ServerMessage<'a> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return ServerMessage::Error { message: "Invalid JSON" };
    };
    match ClientMessage::deserialize(value) {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Ok(ClientMessage::RequestStatus) => ServerMessage::StatusUpdate { data: current },
        Err(_) => ServerMessage::Error { message: "Unknown message type" },
    }
}
