#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub is_read: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}
