// Credentials cache tests.

use missive::credentials::{load_credentials, save_credentials, set_config_path_override, Credentials};

#[test]
fn test_password_is_masked_but_recoverable() {
    let creds = Credentials::new("localhost", 5000, "alice", "s3cret");

    // Stored form must not be the plaintext password.
    assert_ne!(creds.password.as_deref(), Some("s3cret"));
    assert_eq!(creds.get_password().as_deref(), Some("s3cret"));
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("credentials.json");
    set_config_path_override(path.clone()).expect("override should not be set yet");

    let creds = Credentials::new("chat.example.com", 5000, "alice", "s3cret");
    save_credentials(&creds).expect("save should succeed");

    // The file on disk never contains the plaintext password.
    let raw = std::fs::read_to_string(&path).expect("cache file should exist");
    assert!(!raw.contains("s3cret"));
    assert!(raw.contains("alice"));

    let loaded = load_credentials()
        .expect("load should succeed")
        .expect("credentials should be present");
    assert_eq!(loaded.host, "chat.example.com");
    assert_eq!(loaded.port, 5000);
    assert_eq!(loaded.username, "alice");
    assert_eq!(loaded.get_password().as_deref(), Some("s3cret"));
}
