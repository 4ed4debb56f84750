// Contact list handling for Missive.

use log::{error, info, warn};

use crate::proto::{codec, ChatClient, ClientEvent};

impl ChatClient {
    /// Fetch the contact list from the server and replace the local one
    /// wholesale. Best-effort: failures are logged, never returned.
    pub async fn load_contacts(&self) {
        let transport = match self.transport_for_command("load_contacts") {
            Some(transport) => transport,
            None => return,
        };
        let user = self.current_user();

        let reply = self.register_reply_waiter().await;
        let line = codec::encode_contacts_request(&user);
        if let Err(e) = transport.send_line(&line).await {
            error!("Failed to request contact list: {}", e);
            self.clear_reply_waiter().await;
            return;
        }

        let payload = match reply.await {
            Ok(payload) => payload,
            Err(_) => {
                warn!("Connection dropped before the contact list arrived");
                return;
            }
        };

        let contacts = codec::decode_contacts(&payload);
        let count = contacts.len();
        {
            self.lock_state().contacts = contacts;
        }

        info!("Loaded {} contacts", count);
        self.emit(ClientEvent::ContactsLoaded { count }).await;
    }
}
