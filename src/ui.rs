// Line-oriented driver for the session engine. This is the presentation
// collaborator: it issues commands from one task and drains engine events on
// that same task. All chat state lives in the engine; the driver only prints.

use anyhow::Result;
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use missive::proto::{ChatClient, ClientEvent};
use missive::models::Message;

pub async fn run(mut client: ChatClient, mut events: mpsc::Receiver<ClientEvent>) -> Result<()> {
    println!("Logged in as {}. Type /help for commands.", client.current_user());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut active_contact = String::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => render_event(&event),
                    None => break,
                }
            }
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                if !handle_input(&client, &mut active_contact, line.trim()).await {
                    break;
                }
            }
        }
    }

    client.disconnect().await;
    println!("Disconnected.");
    Ok(())
}

// Returns false when the user asked to quit.
async fn handle_input(client: &ChatClient, active_contact: &mut String, input: &str) -> bool {
    if input.is_empty() {
        return true;
    }

    if let Some(rest) = input.strip_prefix('/') {
        let mut parts = rest.splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let argument = parts.next().unwrap_or("").trim();

        match command {
            "quit" => return false,
            "help" => print_help(),
            "contacts" => {
                client.load_contacts().await;
                let contacts = client.contacts();
                if contacts.is_empty() {
                    println!("(no contacts)");
                } else {
                    for contact in contacts {
                        println!("  {}", contact);
                    }
                }
            }
            "open" => {
                if argument.is_empty() {
                    println!("Usage: /open <contact>");
                } else {
                    *active_contact = argument.to_string();
                    client.load_messages(argument).await;
                    for message in client.messages() {
                        render_message(&message);
                    }
                }
            }
            "msg" => {
                let mut msg_parts = argument.splitn(2, ' ');
                let receiver = msg_parts.next().unwrap_or("");
                let body = msg_parts.next().unwrap_or("");
                if receiver.is_empty() || body.is_empty() {
                    println!("Usage: /msg <contact> <text>");
                } else {
                    client.send_message(receiver, body).await;
                }
            }
            other => {
                debug!("Unknown command: {}", other);
                println!("Unknown command: /{}", other);
            }
        }
        return true;
    }

    // Plain text goes to the currently open conversation.
    if active_contact.is_empty() {
        println!("No open conversation. Use /open <contact> first.");
    } else {
        client.send_message(active_contact, input).await;
    }
    true
}

fn render_event(event: &ClientEvent) {
    match event {
        ClientEvent::Connected { username } => println!("-- connected as {} --", username),
        ClientEvent::Disconnected => println!("-- disconnected --"),
        ClientEvent::ConnectionClosed => println!("-- connection closed by server --"),
        ClientEvent::MessageSent(message) => render_message(message),
        ClientEvent::MessageReceived(message) => render_message(message),
        ClientEvent::HistoryLoaded { contact, count } => {
            println!("-- {} messages with {} --", count, contact)
        }
        ClientEvent::ContactsLoaded { count } => println!("-- {} contacts --", count),
    }
}

fn render_message(message: &Message) {
    println!("[{}] {}", message.sender, message.body);
}

fn print_help() {
    println!("Commands:");
    println!("  /contacts          refresh and list contacts");
    println!("  /open <contact>    load the conversation with a contact");
    println!("  /msg <contact> <text>   send a one-off message");
    println!("  <text>             send to the open conversation");
    println!("  /quit              disconnect and exit");
}
