//! Interactive OpenChat client for the terminal.
//!
//! Connects to the realtime channel, seeds the room list from the REST
//! API and reads commands from stdin:
//!
//! ```not_rust
//! /rooms          list joined rooms
//! /join <roomId>  switch the active room (backfills history)
//! /leave          leave the active room
//! /quit           disconnect and exit
//! <anything else> send it as a message to the active room
//! ```
//!
//! Run with:
//! ```not_rust
//! cargo run --bin openchat-client -- --user-id 5
//! ```

use std::sync::Arc;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use openchat_client::api::RestClient;
use openchat_client::config::ClientConfig;
use openchat_client::logger::setup_logger;
use openchat_client::session::ChatSession;
use openchat_client::state::Identity;
use openchat_client::transport::WebSocketTransport;

#[derive(Parser, Debug)]
#[command(name = "openchat-client")]
#[command(about = "Terminal client for the OpenChat realtime service", long_about = None)]
struct Args {
    /// User id to connect as
    #[arg(short = 'i', long)]
    user_id: u64,

    /// Nickname used when the REST API is unreachable
    #[arg(short = 'n', long)]
    nickname: Option<String>,

    /// WebSocket endpoint
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    ws_url: String,

    /// REST API base url
    #[arg(long, default_value = "http://127.0.0.1:8080/api/v1")]
    api_url: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig {
        ws_base_url: args.ws_url.clone(),
        api_base_url: args.api_url.clone(),
        ..ClientConfig::default()
    };

    let rest = RestClient::new(config.api_base_url.clone());

    // Identity and room list come from the REST collaborator; fall back to
    // the CLI arguments when the API is not reachable so the realtime
    // channel can still be exercised.
    let identity = match rest.my_info().await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("could not fetch identity, using CLI arguments: {}", e);
            Identity {
                user_id: args.user_id,
                nickname: args
                    .nickname
                    .clone()
                    .unwrap_or_else(|| format!("user-{}", args.user_id)),
                status_text: String::new(),
            }
        }
    };

    let session = ChatSession::new(
        config,
        Arc::new(WebSocketTransport),
        Arc::new(rest.clone()),
    );

    match rest.joined_rooms().await {
        Ok(rooms) => session.seed_rooms(rooms).await,
        Err(e) => tracing::warn!("could not fetch joined rooms: {}", e),
    }

    session.connect(identity).await?;
    println!("Connected as user {}. Type /rooms to list rooms, /quit to exit.", args.user_id);

    // rustyline is synchronous; run it on its own thread and bridge lines
    // into the async loop over a channel.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("failed to initialize readline: {e}");
                return;
            }
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(&line).ok();
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("readline error: {e}");
                    break;
                }
            }
        }
    });

    while let Some(line) = input_rx.recv().await {
        if let Some(command) = line.strip_prefix('/') {
            match handle_command(&session, command).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => tracing::warn!("command failed: {}", e),
            }
        } else if let Err(e) = session.send_message(line).await {
            tracing::warn!("send failed: {}", e);
        }
    }

    session.disconnect().await;
    Ok(())
}

/// Execute one slash command. Returns `true` when the client should exit.
async fn handle_command(
    session: &ChatSession,
    command: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("rooms") => {
            for room in session.store().rooms().await {
                println!("  {} {} ({} messages)", room.id, room.name, room.messages.len());
            }
        }
        Some("join") => {
            let Some(room_id) = parts.next().and_then(|raw| raw.parse::<u64>().ok()) else {
                println!("usage: /join <roomId>");
                return Ok(false);
            };
            session.select_room(room_id).await?;
            if let Some(room) = session.store().selected_room().await {
                println!("-- {} --", room.name);
                for message in &room.messages {
                    println!("  {}: {}", message.sender_name, message.message);
                }
            }
        }
        Some("leave") => session.leave_room().await,
        Some("quit") => return Ok(true),
        _ => println!("commands: /rooms /join <roomId> /leave /quit"),
    }
    Ok(false)
}
