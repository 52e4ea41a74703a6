//! ChatSession: the use case behind a chat screen.
//!
//! A front end (the terminal UI in `main.rs`, or anything driving the
//! `ui_bridge`) talks only to this type.  It owns the [`ConnectionManager`],
//! asks an [`AddressDiscovery`] for local addresses, and keeps the few bits of
//! screen state that are not part of the connection itself: the discovered
//! addresses, the bound port, the join code to show, and the last user-facing
//! error.

use std::sync::{Mutex, MutexGuard, PoisonError};

use p2pchat_core::joincode::{parse_input, JoinCodeError, PeerInfo};
use p2pchat_core::{ChatMessage, ConnectionState};
use thiserror::Error;
use tracing::{info, warn};

use crate::infrastructure::discovery::{global_ipv6_addresses, AddressDiscovery};
use crate::infrastructure::network::{ConnectionError, ConnectionManager};

/// Shown when `connect` is given something that is neither a join code nor
/// an `address:port` pair.
pub const INVALID_INPUT_MESSAGE: &str = "Invalid join code or address format";

/// Error type for chat session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid join code or address format")]
    InvalidPeerInput,
    #[error("no global IPv6 address is available for a join code")]
    NoLocalAddress,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    JoinCode(#[from] JoinCodeError),
}

/// Everything a chat screen renders, captured at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub connection_state: ConnectionState,
    pub messages: Vec<ChatMessage>,
    pub local_addresses: Vec<String>,
    /// Bound listening port, 0 when not hosting.
    pub local_port: u16,
    /// Empty when not hosting or when no address was found.
    pub join_code: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Default)]
struct SessionFields {
    local_addresses: Vec<String>,
    local_port: u16,
    join_code: String,
    error_message: Option<String>,
}

pub struct ChatSession {
    connection: ConnectionManager,
    discovery: Box<dyn AddressDiscovery>,
    include_link_local: bool,
    fields: Mutex<SessionFields>,
}

impl ChatSession {
    /// Creates a session and performs an initial address discovery.
    pub fn new(discovery: impl AddressDiscovery + 'static) -> Self {
        Self::with_options(discovery, false)
    }

    /// Like [`new`](Self::new), optionally offering link-local addresses.
    pub fn with_options(discovery: impl AddressDiscovery + 'static, include_link_local: bool) -> Self {
        let session = Self {
            connection: ConnectionManager::new(),
            discovery: Box::new(discovery),
            include_link_local,
            fields: Mutex::new(SessionFields::default()),
        };
        session.refresh_local_addresses();
        session
    }

    fn fields(&self) -> MutexGuard<'_, SessionFields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The underlying connection manager, for subscribing to state and
    /// message updates.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn ui_state(&self) -> UiState {
        let fields = self.fields();
        UiState {
            connection_state: self.connection.state(),
            messages: self.connection.messages(),
            local_addresses: fields.local_addresses.clone(),
            local_port: fields.local_port,
            join_code: fields.join_code.clone(),
            error_message: fields.error_message.clone(),
        }
    }

    /// Re-queries the OS for candidate addresses and returns them.
    pub fn refresh_local_addresses(&self) -> Vec<String> {
        let addresses = global_ipv6_addresses(self.discovery.as_ref(), self.include_link_local);
        if addresses.is_empty() {
            warn!("no global IPv6 address found; peers will not be able to reach this host");
        }
        self.fields().local_addresses = addresses.clone();
        addresses
    }

    /// Builds the join code for the first discovered address and `port`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoLocalAddress`] when discovery found nothing.
    /// - [`SessionError::JoinCode`] if the address cannot be encoded.
    pub fn join_code_for(&self, port: u16) -> Result<String, SessionError> {
        let fields = self.fields();
        let address = fields
            .local_addresses
            .first()
            .ok_or(SessionError::NoLocalAddress)?;
        Ok(PeerInfo::new(address.as_str(), port).to_join_code()?)
    }

    /// Starts hosting on `port` (0 = OS-assigned) and publishes a join code.
    ///
    /// The join code is left empty when no address is available; the host
    /// still listens.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] if the listener cannot be bound.
    pub async fn start_hosting(&self, port: u16) -> Result<u16, SessionError> {
        let bound = match self.connection.start_server(port).await {
            Ok(bound) => bound,
            Err(err) => {
                self.fields().error_message = Some(err.to_string());
                return Err(err.into());
            }
        };

        self.refresh_local_addresses();
        let join_code = match self.join_code_for(bound) {
            Ok(code) => code,
            Err(e) => {
                warn!("hosting without a join code: {e}");
                String::new()
            }
        };
        if !join_code.is_empty() {
            info!("join code: {join_code}");
        }

        let mut fields = self.fields();
        fields.local_port = bound;
        fields.join_code = join_code;
        fields.error_message = None;
        Ok(bound)
    }

    /// Joins the peer named by `input`: a join code, `[addr]:port`, or
    /// `addr:port`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidPeerInput`] when `input` does not parse; the
    ///   connection is not touched and the error message is recorded.
    /// - [`SessionError::Connection`] when the connect attempt fails.
    pub async fn connect(&self, input: &str) -> Result<PeerInfo, SessionError> {
        let Some(peer) = parse_input(input) else {
            warn!("rejected peer input {:?}", input.trim());
            self.fields().error_message = Some(INVALID_INPUT_MESSAGE.to_string());
            return Err(SessionError::InvalidPeerInput);
        };

        {
            let mut fields = self.fields();
            fields.error_message = None;
            fields.local_port = 0;
            fields.join_code.clear();
        }

        match self.connection.connect_to_peer(&peer.address, peer.port).await {
            Ok(()) => Ok(peer),
            Err(ConnectionError::Cancelled) => Err(ConnectionError::Cancelled.into()),
            Err(err) => {
                self.fields().error_message = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Sends `text` unless it is blank.  Returns whether anything was sent.
    pub async fn send(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.connection.send_message(text).await
    }

    /// Ends the current connection or listener and clears the conversation.
    pub fn disconnect(&self) {
        self.connection.stop_connection();
        self.connection.clear_messages();
        let mut fields = self.fields();
        fields.local_port = 0;
        fields.join_code.clear();
    }

    pub fn clear_error(&self) {
        self.fields().error_message = None;
    }

    /// Releases every socket.  The session cannot be used afterwards.
    pub fn shutdown(&self) {
        self.connection.destroy();
    }
}
