// Message history retrieval for Missive.

use log::{error, info, warn};

use crate::proto::{codec, message_from_record, ChatClient, ClientEvent};

impl ChatClient {
    /// Load the conversation with `contact`, replacing the current message
    /// list wholesale.
    ///
    /// The list is cleared before the request goes out, so a failed load
    /// leaves it empty rather than stale. The reply is a single chunk of
    /// newline-separated records; malformed lines are dropped by the codec.
    /// Pushes arriving while the reply is in flight append to the same list
    /// and may interleave with it. Best-effort: failures are logged, never
    /// returned.
    pub async fn load_messages(&self, contact: &str) {
        {
            self.lock_state().messages.clear();
        }

        let transport = match self.transport_for_command("load_messages") {
            Some(transport) => transport,
            None => return,
        };
        let user = self.current_user();

        let reply = self.register_reply_waiter().await;
        let line = codec::encode_history_request(&user, contact);
        if let Err(e) = transport.send_line(&line).await {
            error!("Failed to request history for {}: {}", contact, e);
            self.clear_reply_waiter().await;
            return;
        }

        let payload = match reply.await {
            Ok(payload) => payload,
            Err(_) => {
                warn!("Connection dropped before the history reply for {} arrived", contact);
                return;
            }
        };

        let records = codec::decode_messages(&payload);
        let count = records.len();
        let messages: Vec<_> = records.into_iter().map(message_from_record).collect();
        {
            self.lock_state().messages.extend(messages);
        }

        info!("Loaded {} messages with {}", count, contact);
        self.emit(ClientEvent::HistoryLoaded {
            contact: contact.to_string(),
            count,
        })
        .await;
    }
}
