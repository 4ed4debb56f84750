use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;

mod ui;
mod utils;

use missive::credentials::{load_credentials, save_credentials, Credentials};
use missive::proto::ChatClient;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5000;

/// Command line arguments for Missive
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Missive: a terminal client for a line-protocol messaging service."
)]
struct Args {
    /// Server host, overriding cached credentials and environment
    #[arg(long)]
    host: Option<String>,

    /// Server port, overriding cached credentials and environment
    #[arg(long)]
    port: Option<u16>,

    /// Log file path (defaults to missive.log in the working directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Prompts the user for login details or uses environment variables
fn prompt_credentials() -> (String, u16, String, String) {
    let host = env::var("MISSIVE_HOST").unwrap_or_else(|_| {
        eprintln!("Enter server host (e.g., localhost):");
        utils::read_line().unwrap_or_default()
    });

    let port = env::var("MISSIVE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("Enter server port (e.g., {}):", DEFAULT_PORT);
            utils::read_line()
                .unwrap_or_default()
                .parse()
                .unwrap_or(DEFAULT_PORT)
        });

    let username = env::var("MISSIVE_USERNAME").unwrap_or_else(|_| {
        eprintln!("Enter username:");
        utils::read_line().unwrap_or_default()
    });

    let password = env::var("MISSIVE_PASSWORD").unwrap_or_else(|_| {
        eprintln!("Enter password:");
        utils::read_line().unwrap_or_default()
    });

    (host, port, username, password)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("missive.log"));
    utils::setup_logging(log_file_path.to_str(), LevelFilter::Debug)?;

    info!("Missive client starting up");
    info!("Logging to file: {}", log_file_path.display());

    // Prefer environment variables, then the cached credentials file, then an
    // interactive prompt.
    let (host, port, username, password, from_env) = if let (Ok(host), Ok(username), Ok(password)) = (
        env::var("MISSIVE_HOST"),
        env::var("MISSIVE_USERNAME"),
        env::var("MISSIVE_PASSWORD"),
    ) {
        let port = env::var("MISSIVE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        (host, port, username, password, true)
    } else if let Some(creds) = load_credentials()? {
        info!("Using cached credentials for {}", creds.username);
        if let Some(password) = creds.get_password() {
            (creds.host, creds.port, creds.username, password, false)
        } else {
            eprintln!("Enter password for {}@{}:", creds.username, creds.host);
            let password = utils::read_line().unwrap_or_default();
            (creds.host, creds.port, creds.username, password, false)
        }
    } else {
        let (host, port, username, password) = prompt_credentials();
        (host, port, username, password, false)
    };

    let host = args.host.unwrap_or(host);
    let port = args.port.unwrap_or(port);
    let host = if host.is_empty() { DEFAULT_HOST.to_string() } else { host };

    println!("Connecting to {}:{}...", host, port);

    let (mut client, events) = ChatClient::new();
    if let Err(e) = client.login(&host, port, &username, &password).await {
        eprintln!("Login failed: {}", e);
        return Err(e.into());
    }

    if !from_env {
        if let Err(e) = save_credentials(&Credentials::new(&host, port, &username, &password)) {
            info!("Could not save credentials: {}", e);
        }
    }

    // Prime the contact list before handing over to the driver loop.
    client.load_contacts().await;

    ui::run(client, events).await
}
