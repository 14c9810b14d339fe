//! mcp_google_spreadsheet - MCP server for Google Drive and Google Sheets.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_google_spreadsheet::auth::{default_token_path, REDIRECT_PORT};
use mcp_google_spreadsheet::{
    ApiClient, Authenticator, DriveClient, DriveOperations, SheetOperations, SheetsClient,
    ToolHost,
};

/// MCP server exposing a Google Drive folder and its spreadsheets over stdio.
#[derive(Parser)]
#[command(name = "mcp_google_spreadsheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the OAuth client secret or service account JSON file.
    #[arg(long, env = "MCPGS_CLIENT_SECRET_PATH")]
    client_secret: PathBuf,

    /// Where the user token is cached (defaults to ~/.mcp_google_spreadsheet.json).
    #[arg(long, env = "MCPGS_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    /// ID of the Drive folder all paths are relative to.
    #[arg(long, env = "MCPGS_FOLDER_ID")]
    folder_id: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP requests on stdin/stdout (the default).
    Serve,

    /// Run the browser authorization flow and save the token.
    Auth,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let token_path = match cli.token_path {
        Some(path) => path,
        None => default_token_path()?,
    };

    // Initialize authenticator
    let auth = Authenticator::from_files(&cli.client_secret, token_path.clone())
        .with_context(|| format!("Failed to load credentials from {:?}", cli.client_secret))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Auth => {
            if auth.is_installed_app() {
                auth.authorize_interactive(REDIRECT_PORT)
                    .await
                    .context("Authorization failed")?;
                println!("Token saved to {:?}", token_path);
            } else {
                println!("Service account credentials need no interactive authorization");
            }
        }

        Commands::Serve => {
            let folder_id = cli
                .folder_id
                .context("MCPGS_FOLDER_ID (or --folder-id) is required")?;

            auth.ensure_authorized()
                .await
                .context("Failed to authorize with Google")?;

            let api = ApiClient::new(Arc::new(auth));
            let files = Arc::new(DriveClient::new(api.clone()));
            let sheets = Arc::new(SheetsClient::new(api));

            let host = ToolHost::new(
                DriveOperations::new(files.clone(), folder_id.clone()),
                SheetOperations::new(files, sheets, folder_id.clone()),
            );

            info!(folder_id = %folder_id, "serving on stdio");
            tokio::select! {
                result = Arc::new(host).serve(tokio::io::stdin(), tokio::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
    }

    Ok(())
}
