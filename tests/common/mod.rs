// Common test utilities for integration tests: a scripted in-process TCP
// server standing in for the messaging service, plus wait helpers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use missive::proto::ClientEvent;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

/// Scripted replies for the mock server.
#[derive(Clone)]
pub struct MockConfig {
    /// Reply to the login command; `None` closes the connection without
    /// replying.
    pub login_reply: Option<String>,
    /// Reply to a history request (opcode 2).
    pub history_reply: String,
    /// Reply to a contact-list request (opcode 4).
    pub contacts_reply: String,
    /// Payload written just before the history reply, separated by a short
    /// pause, to simulate a push racing an in-flight load.
    pub push_before_history: Option<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            login_reply: Some("OK".to_string()),
            history_reply: String::new(),
            contacts_reply: String::new(),
            push_before_history: None,
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    /// Raw payloads written to the client verbatim (server pushes).
    pub push_tx: mpsc::Sender<String>,
    /// Every request line the server has received, in order.
    pub received: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn push(&self, payload: &str) {
        self.push_tx
            .send(payload.to_string())
            .await
            .expect("mock server is gone");
    }

    pub fn received_lines(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

/// Start a mock server handling a single client connection according to
/// `config`.
pub async fn start_mock_server(config: MockConfig) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock server");
    let addr = listener.local_addr().expect("mock server has no address");
    let (push_tx, mut push_rx) = mpsc::channel::<String>(16);
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_log = received.clone();

    tokio::spawn(async move {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(_) => return,
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        _ => break,
                    };
                    received_log.lock().unwrap().push(line.clone());
                    let opcode = line.rsplit(' ').next().unwrap_or("");
                    match opcode {
                        "1" => match &config.login_reply {
                            Some(reply) => {
                                let _ = write_half.write_all(reply.as_bytes()).await;
                            }
                            // Close without a word: the client must treat
                            // this as a failed login.
                            None => break,
                        },
                        "2" => {
                            if let Some(push) = &config.push_before_history {
                                let _ = write_half.write_all(push.as_bytes()).await;
                                tokio::time::sleep(Duration::from_millis(50)).await;
                            }
                            let _ = write_half.write_all(config.history_reply.as_bytes()).await;
                        }
                        "4" => {
                            let _ = write_half.write_all(config.contacts_reply.as_bytes()).await;
                        }
                        // Outgoing messages (opcode 3) get no acknowledgment.
                        _ => {}
                    }
                }
                push = push_rx.recv() => {
                    match push {
                        Some(payload) => {
                            let _ = write_half.write_all(payload.as_bytes()).await;
                        }
                        None => break,
                    }
                }
            }
        }
    });

    MockServer {
        addr,
        push_tx,
        received,
    }
}

/// Poll `condition` until it holds or `timeout_secs` elapse.
pub async fn wait_for<F>(condition: F, timeout_secs: u64) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Wait for an event matching `predicate`, discarding the ones before it.
pub async fn wait_for_event<F>(
    events: &mut mpsc::Receiver<ClientEvent>,
    predicate: F,
    timeout_secs: u64,
) -> Result<ClientEvent>
where
    F: Fn(&ClientEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .ok_or_else(|| anyhow!("timed out waiting for event"))?;
        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Some(event)) if predicate(&event) => return Ok(event),
            Ok(Some(_)) => continue,
            Ok(None) => return Err(anyhow!("event channel closed")),
            Err(_) => return Err(anyhow!("timed out waiting for event")),
        }
    }
}
