// Re-export needed modules for testing
pub mod credentials;
pub mod models;
pub mod proto;

// Re-export main types for convenience
pub use models::*;
pub use proto::{ChatClient, ClientError, ClientEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_construction() {
        let msg = Message {
            id: 1,
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            body: "Hello, world!".to_string(),
            is_read: false,
            timestamp: 1650000000,
        };

        assert_eq!(msg.id, 1);
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.receiver, "bob");
        assert_eq!(msg.body, "Hello, world!");
        assert!(!msg.is_read);
        assert_eq!(msg.timestamp, 1650000000);
    }

    #[test]
    fn test_message_allows_empty_and_long_bodies() {
        let empty = Message {
            id: 2,
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            body: String::new(),
            is_read: false,
            timestamp: 1650000000,
        };

        let long_body = "A".repeat(10000);
        let long = Message {
            id: 3,
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            body: long_body,
            is_read: true,
            timestamp: 1650000000,
        };

        assert_eq!(empty.body.len(), 0);
        assert_eq!(long.body.len(), 10000);
        assert!(long.is_read);
    }

    #[test]
    fn test_connection_state_defaults_to_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);

        // The three states are distinct.
        assert_ne!(ConnectionState::Disconnected, ConnectionState::Connecting);
        assert_ne!(ConnectionState::Connecting, ConnectionState::Connected);
    }

    #[test]
    fn test_username_validation() {
        assert!(ChatClient::validate_username("alice"));
        assert!(ChatClient::validate_username("alice.b_2-x"));
        assert!(!ChatClient::validate_username(""));
        assert!(!ChatClient::validate_username("alice smith"));
        assert!(!ChatClient::validate_username("alice|bob"));
        assert!(!ChatClient::validate_username("alice\n"));
    }
}
