//! Command bridge between a chat session and a front end.
//!
//! Front ends that are not written in Rust (a web view, a mobile shell, a
//! script driving the CLI with `--json`) cannot hold a [`ChatSession`]
//! directly.  This module exposes the session as a handful of *commands* that
//! return plain serializable snapshots.  Only this module references both the
//! application layer and the presentation side.
//!
//! # DTOs (Data Transfer Objects)
//!
//! [`UiState`] holds domain types such as the [`ConnectionState`] enum.  The
//! DTOs below flatten those into field-by-field records that map naturally to
//! JSON objects:
//!
//! ```json
//! { "status": "connected", "description": "Connected to 2001:db8::1",
//!   "peer_address": "2001:db8::1", "error": null }
//! ```
//!
//! # `CommandResult<T>`
//!
//! All commands return `CommandResult<T>`, a unified envelope:
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "..."  }
//! ```
//! so the caller handles every command's failure the same way.

use p2pchat_core::{ChatMessage, ConnectionState};
use serde::{Deserialize, Serialize};

use crate::application::{ChatSession, UiState};

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Connection status flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatusDto {
    /// Stable lowercase tag: `disconnected`, `listening`, `connecting`,
    /// `connected` or `error`.
    pub status: String,
    /// Human-readable one-liner for a status bar.
    pub description: String,
    pub peer_address: Option<String>,
    pub error: Option<String>,
}

impl From<&ConnectionState> for ConnectionStatusDto {
    fn from(state: &ConnectionState) -> Self {
        let (peer_address, error) = match state {
            ConnectionState::Connected { peer_address } => (Some(peer_address.clone()), None),
            ConnectionState::Error { message } => (None, Some(message.clone())),
            ConnectionState::Disconnected
            | ConnectionState::Listening
            | ConnectionState::Connecting => (None, None),
        };
        Self {
            status: state.label().to_string(),
            description: state.to_string(),
            peer_address,
            error,
        }
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub content: String,
    pub is_from_me: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl From<&ChatMessage> for ChatMessageDto {
    fn from(message: &ChatMessage) -> Self {
        Self {
            content: message.content.clone(),
            is_from_me: message.is_from_me,
            timestamp_ms: message.timestamp_ms,
        }
    }
}

/// Full screen snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiStateDto {
    pub connection: ConnectionStatusDto,
    pub messages: Vec<ChatMessageDto>,
    pub local_addresses: Vec<String>,
    pub local_port: u16,
    pub join_code: String,
    pub error_message: Option<String>,
}

impl From<&UiState> for UiStateDto {
    fn from(state: &UiState) -> Self {
        Self {
            connection: ConnectionStatusDto::from(&state.connection_state),
            messages: state.messages.iter().map(ChatMessageDto::from).collect(),
            local_addresses: state.local_addresses.clone(),
            local_port: state.local_port,
            join_code: state.join_code.clone(),
            error_message: state.error_message.clone(),
        }
    }
}

/// Result of `host_command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfoDto {
    pub port: u16,
    /// Empty when no global address was found.
    pub join_code: String,
    pub local_addresses: Vec<String>,
}

// ── Command result envelope ───────────────────────────────────────────────────

/// Uniform envelope returned by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> CommandResult<T> {
    /// Renders the envelope as one line of JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `T` fails to serialize.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub fn get_ui_state(session: &ChatSession) -> CommandResult<UiStateDto> {
    CommandResult::ok(UiStateDto::from(&session.ui_state()))
}

pub fn get_connection_status(session: &ChatSession) -> CommandResult<ConnectionStatusDto> {
    CommandResult::ok(ConnectionStatusDto::from(&session.connection().state()))
}

pub async fn host_command(session: &ChatSession, port: u16) -> CommandResult<HostInfoDto> {
    match session.start_hosting(port).await {
        Ok(port) => {
            let state = session.ui_state();
            CommandResult::ok(HostInfoDto {
                port,
                join_code: state.join_code,
                local_addresses: state.local_addresses,
            })
        }
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn join_command(session: &ChatSession, input: &str) -> CommandResult<ConnectionStatusDto> {
    match session.connect(input).await {
        Ok(_) => get_connection_status(session),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn send_command(session: &ChatSession, text: &str) -> CommandResult<ChatMessageDto> {
    if !session.send(text).await {
        return CommandResult::err("message not sent");
    }
    match session.connection().messages().last() {
        Some(message) => CommandResult::ok(ChatMessageDto::from(message)),
        None => CommandResult::err("message not recorded"),
    }
}

pub fn disconnect_command(session: &ChatSession) -> CommandResult<ConnectionStatusDto> {
    session.disconnect();
    get_connection_status(session)
}
