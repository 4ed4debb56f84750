// Session engine for Missive.
// This file holds the ChatClient core: shared session state, the observer
// event channel, message sending, and the background listen loop. The
// individual protocol operations live in the submodules.

use log::{debug, error, info, warn};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};
use tokio::task::JoinHandle;

pub mod codec;
pub mod connection;
pub mod history;
pub mod roster;
pub mod transport;

pub use transport::Transport;

use crate::models::{ConnectionState, Message};
use codec::MessageRecord;

/// Errors surfaced to the caller. Only `login` propagates these; the other
/// commands are best-effort and log their failures instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("send error: {0}")]
    Send(String),
}

/// Notifications delivered to the observer context. State itself is read
/// through the snapshot accessors on [`ChatClient`]; events only say that
/// something changed and why.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected { username: String },
    Disconnected,
    /// The server closed the stream or a read failed; the listen loop ended.
    ConnectionClosed,
    /// A message this client sent was appended to the local list.
    MessageSent(Message),
    /// A pushed message from another party was appended.
    MessageReceived(Message),
    HistoryLoaded { contact: String, count: usize },
    ContactsLoaded { count: usize },
}

/// Everything mutated by the engine, behind one lock. Held only for short
/// synchronous sections, never across an await.
#[derive(Default)]
pub(crate) struct ClientState {
    pub(crate) current_user: String,
    pub(crate) connection: ConnectionState,
    pub(crate) messages: Vec<Message>,
    pub(crate) contacts: Vec<String>,
}

/// Slot for a command awaiting a reply. The listen loop hands the next
/// inbound chunk to whatever waiter is parked here; the protocol carries no
/// message-type tag, so which decode applies is decided by the waiting
/// command, not by inspecting the payload.
type ReplySlot = Arc<TokioMutex<Option<oneshot::Sender<String>>>>;

pub struct ChatClient {
    state: Arc<Mutex<ClientState>>,
    transport: Option<Arc<Transport>>,
    event_tx: mpsc::Sender<ClientEvent>,
    pending_reply: ReplySlot,
    next_message_id: AtomicU64,
    listen_task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Create a client plus the event receiver the observer context drains.
    pub fn new() -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(100);
        (
            ChatClient {
                state: Arc::new(Mutex::new(ClientState::default())),
                transport: None,
                event_tx,
                pending_reply: Arc::new(TokioMutex::new(None)),
                next_message_id: AtomicU64::new(1),
                listen_task: None,
            },
            event_rx,
        )
    }

    /// Send a text message to `receiver`. Fire-and-forget: the message is
    /// appended locally before the write happens and stays there even if the
    /// write fails. Empty arguments make this a no-op.
    pub async fn send_message(&self, receiver: &str, body: &str) {
        if receiver.is_empty() || body.is_empty() {
            debug!("Ignoring send with empty receiver or body");
            return;
        }
        let sender = {
            let state = self.lock_state();
            if state.connection != ConnectionState::Connected {
                warn!("Cannot send message while disconnected");
                return;
            }
            state.current_user.clone()
        };
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                warn!("Cannot send message: no open transport");
                return;
            }
        };

        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id,
            sender: sender.clone(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            is_read: false,
            timestamp: now_timestamp(),
        };
        {
            self.lock_state().messages.push(message.clone());
        }
        self.emit(ClientEvent::MessageSent(message)).await;

        let line = codec::encode_send(&sender, receiver, body);
        if let Err(e) = transport.send_line(&line).await {
            // The local copy is not rolled back; delivery was best-effort.
            error!("Failed to send message to {}: {}", receiver, e);
        }
    }

    /// Snapshot of the message list, in append order.
    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().messages.clone()
    }

    /// Snapshot of the contact list.
    pub fn contacts(&self) -> Vec<String> {
        self.lock_state().contacts.clone()
    }

    pub fn current_user(&self) -> String {
        self.lock_state().current_user.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock_state().connection
    }

    // Continuous read loop, spawned after a successful login. From that point
    // on it is the only reader of the transport: chunks are either routed to
    // a parked request/reply waiter or decoded as pushed message records.
    async fn listen_loop(
        transport: Arc<Transport>,
        state: Arc<Mutex<ClientState>>,
        pending_reply: ReplySlot,
        event_tx: mpsc::Sender<ClientEvent>,
    ) {
        info!("Listening for server pushes");
        loop {
            let chunk = match transport.read_chunk().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Read failed, stopping listener: {}", e);
                    break;
                }
            };
            let payload = String::from_utf8_lossy(&chunk).into_owned();

            if let Some(waiter) = pending_reply.lock().await.take() {
                if waiter.send(payload).is_err() {
                    debug!("Reply waiter dropped before the response arrived");
                }
                continue;
            }

            for record in codec::decode_messages(&payload) {
                let message = message_from_record(record);
                {
                    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    state.messages.push(message.clone());
                }
                if event_tx.send(ClientEvent::MessageReceived(message)).await.is_err() {
                    debug!("Event receiver dropped; push not delivered to observer");
                }
            }
        }

        // Unblock any command still waiting on a reply.
        pending_reply.lock().await.take();
        if event_tx.send(ClientEvent::ConnectionClosed).await.is_err() {
            debug!("Event receiver dropped during shutdown");
        }
    }

    // Park a fresh waiter in the reply slot, returning its receiving end.
    // Replacing a stale waiter drops it, which unblocks its command with an
    // error.
    pub(crate) async fn register_reply_waiter(&self) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.pending_reply.lock().await;
        if slot.replace(tx).is_some() {
            warn!("Replacing a stale reply waiter; a previous request never got its reply");
        }
        rx
    }

    pub(crate) async fn clear_reply_waiter(&self) {
        self.pending_reply.lock().await.take();
    }

    // Transport handle for a command, or None (logged) when disconnected.
    // Commands other than login fail fast but silently toward the observer.
    pub(crate) fn transport_for_command(&self, operation: &str) -> Option<Arc<Transport>> {
        let connected = self.lock_state().connection == ConnectionState::Connected;
        match (&self.transport, connected) {
            (Some(transport), true) => Some(transport.clone()),
            _ => {
                warn!(
                    "{}: {}",
                    operation,
                    ClientError::Connection("not connected".to_string())
                );
                None
            }
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) async fn emit(&self, event: ClientEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped; observer will not see this update");
        }
    }
}

pub(crate) fn now_timestamp() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

// Inbound and historical records get a locally randomized id. These can
// collide with the outgoing counter; ids are display handles, not keys.
pub(crate) fn message_from_record(record: MessageRecord) -> Message {
    Message {
        id: rand::thread_rng().gen_range(0..10_000u64),
        sender: record.sender,
        receiver: record.receiver,
        body: record.body,
        is_read: record.is_read,
        timestamp: now_timestamp(),
    }
}
