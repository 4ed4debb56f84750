// Connection management for Missive.
// Contains login, disconnect, and connection helper methods for ChatClient.

use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::models::ConnectionState;
use crate::proto::{codec, ChatClient, ClientError, ClientEvent, Transport};

// The wire format is space-delimited, so a username must be a single token.
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

impl ChatClient {
    /// Authenticate against `host:port` and start the listen loop.
    ///
    /// Connecting is entered immediately and reverted on any failure. The
    /// server's reply carries no structure: any non-empty payload counts as a
    /// successful login, while end-of-stream before a reply is a connection
    /// failure.
    pub async fn login(
        &mut self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        if self.connection_state() == ConnectionState::Connected {
            return Err(ClientError::Connection(
                "already connected; disconnect first".to_string(),
            ));
        }
        if !Self::validate_username(username) {
            return Err(ClientError::Connection(format!(
                "invalid username '{}': must be a single word without spaces or '|'",
                username
            )));
        }

        self.lock_state().connection = ConnectionState::Connecting;
        info!("Connecting to {}:{}", host, port);

        let transport = match Transport::open(host, port).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                self.lock_state().connection = ConnectionState::Disconnected;
                error!("Failed to open connection to {}:{}: {}", host, port, e);
                return Err(ClientError::Connection(format!(
                    "could not reach {}:{}: {}",
                    host, port, e
                )));
            }
        };

        let line = codec::encode_login(username, password);
        if let Err(e) = transport.send_line(&line).await {
            self.lock_state().connection = ConnectionState::Disconnected;
            error!("Failed to send login request: {}", e);
            return Err(ClientError::Send(format!("login request failed: {}", e)));
        }

        // Block for the login acknowledgment. The listen loop is not running
        // yet, so this read cannot race with anything.
        match transport.read_chunk().await {
            Ok(Some(_reply)) => {}
            Ok(None) => {
                self.lock_state().connection = ConnectionState::Disconnected;
                error!("Server closed the stream before replying to login");
                return Err(ClientError::Connection(
                    "server closed the stream before replying to login".to_string(),
                ));
            }
            Err(e) => {
                self.lock_state().connection = ConnectionState::Disconnected;
                error!("No login reply: {}", e);
                return Err(ClientError::Connection(format!("no login reply: {}", e)));
            }
        }

        {
            let mut state = self.lock_state();
            state.current_user = username.to_string();
            state.connection = ConnectionState::Connected;
        }
        self.transport = Some(transport.clone());
        self.listen_task = Some(tokio::spawn(Self::listen_loop(
            transport,
            self.state.clone(),
            self.pending_reply.clone(),
            self.event_tx.clone(),
        )));

        info!("Logged in as {}", username);
        self.emit(ClientEvent::Connected {
            username: username.to_string(),
        })
        .await;
        Ok(())
    }

    /// Tear the session down: stop the listen loop, close the transport, and
    /// clear every piece of session state. Safe to call when already
    /// disconnected.
    pub async fn disconnect(&mut self) {
        if self.transport.is_none() && self.connection_state() == ConnectionState::Disconnected {
            return;
        }
        info!("Disconnecting");

        if let Some(task) = self.listen_task.take() {
            task.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        // Drop any waiter so a command stuck on a reply unblocks.
        self.clear_reply_waiter().await;

        {
            let mut state = self.lock_state();
            state.current_user.clear();
            state.messages.clear();
            state.contacts.clear();
            state.connection = ConnectionState::Disconnected;
        }
        self.emit(ClientEvent::Disconnected).await;
    }

    /// Check that a username fits in the space-delimited wire format.
    pub fn validate_username(username: &str) -> bool {
        if !USERNAME_RE.is_match(username) {
            warn!("Rejected malformed username: '{}'", username);
            return false;
        }
        true
    }
}
