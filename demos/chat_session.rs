//! Interactive chat driven by the config file.
//!
//! Reads `$STREAMCHAT_CONFIG` or `~/.config/streamchat/config.toml` when
//! present, otherwise talks to OpenAI with `OPENAI_API_KEY`. Ctrl-C stops
//! the response being streamed; an empty line or EOF quits.
//!
//! ```bash
//! RUST_LOG=streamchat=debug cargo run --example chat_session
//! ```

use std::io::Write;

use streamchat::config::Config;
use streamchat::session::{SessionState, StreamSession};
use streamchat::tokens::estimate_tokens;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::default_path() {
        Some(path) => Config::load_optional(path)?.unwrap_or_default(),
        None => Config::default(),
    };
    let costs = config.cost_table();
    let client = config.client()?;
    let model = client.config().model.clone();
    tracing::info!("Chatting with {} ({})", model, client.config().provider);

    let mut session = StreamSession::new(client);
    let stop = session.stop_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        let state = session
            .run_with(message, |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();

        match state {
            SessionState::Failed => {
                eprintln!("[error] {}", session.error().unwrap_or("unknown error"));
            }
            SessionState::Cancelled => println!("[stopped]"),
            _ => {}
        }

        let input = estimate_tokens(message);
        let output = estimate_tokens(session.output());
        println!(
            "[~{} in / ~{} out tokens, ~${:.6}]",
            input,
            output,
            costs.calculate(input, output, &model)
        );
    }

    Ok(())
}
