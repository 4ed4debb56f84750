// Wire codec for the messaging protocol.
// Commands are single newline-terminated lines with a trailing numeric
// opcode; message records are `sender|receiver|body|isRead`. Everything in
// this module is pure: ids and timestamps are assigned by the caller.

/// Opcode appended to the login command.
pub const OP_LOGIN: u8 = 1;
/// Opcode appended to a message-history request.
pub const OP_HISTORY: u8 = 2;
/// Opcode appended to an outgoing message.
pub const OP_SEND: u8 = 3;
/// Opcode appended to a contact-list request.
pub const OP_CONTACTS: u8 = 4;

/// One decoded `sender|receiver|body|isRead` record, before the session
/// engine attaches an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub is_read: bool,
}

pub fn encode_login(username: &str, password: &str) -> String {
    format!("{} {} {}", username, password, OP_LOGIN)
}

pub fn encode_history_request(username: &str, contact: &str) -> String {
    format!("{} {} {}", username, contact, OP_HISTORY)
}

pub fn encode_send(sender: &str, receiver: &str, body: &str) -> String {
    format!("{} {} {} {}", sender, receiver, body, OP_SEND)
}

pub fn encode_contacts_request(username: &str) -> String {
    format!("{} {}", username, OP_CONTACTS)
}

/// Re-encode a record in canonical wire form (`isRead` becomes the literal
/// `true` or `false`).
pub fn encode_record(record: &MessageRecord) -> String {
    format!(
        "{}|{}|{}|{}",
        record.sender,
        record.receiver,
        record.body,
        if record.is_read { "true" } else { "false" }
    )
}

/// Decode a history reply or push payload into message records.
///
/// The payload is split on newlines; each line is split on `|` at most three
/// times. Lines that do not yield all four fields are dropped; the protocol
/// has no error channel for malformed records, so decoding is lenient.
pub fn decode_messages(payload: &str) -> Vec<MessageRecord> {
    payload.lines().filter_map(decode_record).collect()
}

fn decode_record(line: &str) -> Option<MessageRecord> {
    let mut fields = line.splitn(4, '|');
    let sender = fields.next()?;
    let receiver = fields.next()?;
    let body = fields.next()?;
    let read_flag = fields.next()?;
    Some(MessageRecord {
        sender: sender.to_string(),
        receiver: receiver.to_string(),
        body: body.to_string(),
        is_read: read_flag == "true",
    })
}

/// Decode a contact-list reply: one bare username per line, empty lines
/// dropped.
pub fn decode_contacts(payload: &str) -> Vec<String> {
    payload
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
