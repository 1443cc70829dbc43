//! `songboard` - CLI for the song-request board
//!
//! This binary runs the board server and offers a few commands for
//! inspecting requests and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use songboard::cli::{Cli, Command, ConfigCommand, ListCommand, ServeCommand};
use songboard::{init_logging, web, Backend, Config, RequestChannel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, serve_cmd).await,
        Command::List(list_cmd) => handle_list(&config, &list_cmd).await,
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
        config.validate().context("invalid --bind address")?;
    }

    let backend = Backend::connect(&config).context("failed to open request storage")?;
    let channel: Arc<dyn RequestChannel> = Arc::new(backend);

    web::serve(Arc::new(config), channel)
        .await
        .context("server failed")?;
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let backend = Backend::connect(config).context("failed to open request storage")?;
    let snapshot = backend.snapshot().await?;
    let stats = backend.stats().await?;
    let shown = &snapshot[..cmd.limit.map_or(snapshot.len(), |n| n.min(snapshot.len()))];

    if cmd.json {
        let out = serde_json::json!({
            "requests": shown,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No requests yet.");
    }
    for request in shown {
        let marker = if request.priority { " [priority]" } else { "" };
        match &request.note {
            Some(note) => println!("{}  {} — {note}{marker}", request.time_label(), request.song),
            None => println!("{}  {}{marker}", request.time_label(), request.song),
        }
    }

    println!();
    println!("Total:     {}", stats.total_requests);
    println!("Priority:  {}", stats.priority_requests);
    if let Some(newest) = stats.newest_request {
        println!("Newest:    {}", newest.to_rfc3339());
    }
    println!("Database:  {} ({} bytes)", config.database_path().display(), stats.db_size_bytes);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!(
                    "  Public origin:      {}",
                    config.public_origin().unwrap_or("(from Host header)")
                );
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Board]");
                println!("  Title:              {}", config.board.title);
                println!("  Sent banner (s):    {}", config.board.sent_banner_secs);
                println!();
                println!("[Priority]");
                println!("  Enabled:            {}", config.priority.enabled);
                println!("  Price:              {}", config.priority.price);
                println!("  Contact:            {}", config.priority.contact);
                println!();
                println!("[QR]");
                println!("  Size (px):          {}", config.qr.size_px);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
