//! mcp_google_spreadsheet - an MCP server exposing a Google Drive folder and
//! the spreadsheets inside it through path-addressed tools.
//!
//! This library provides:
//! - Resolution of paths like `Reports/2024/Budget` beneath a root folder
//! - File listing, copying and renaming in Drive
//! - Sheet listing, copying and renaming, row/column insertion and deletion,
//!   and cell reads and writes in Google Sheets
//! - A stdio JSON-RPC host registering all of the above as MCP tools
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_google_spreadsheet::{ApiClient, Authenticator, DriveClient, DriveOperations};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_files("client_secret.json", "token.json".into())?;
//!     auth.ensure_authorized().await?;
//!     let api = ApiClient::new(Arc::new(auth));
//!     let drive = DriveOperations::new(Arc::new(DriveClient::new(api)), "root-folder-id");
//!
//!     println!("{}", drive.list_files("Reports").await?);
//!     Ok(())
//! }
//! ```

pub mod a1;
pub mod auth;
pub mod client;
pub mod drive_ops;
pub mod error;
pub mod format;
pub mod loopback;
pub mod models;
pub mod protocol;
pub mod resolver;
pub mod server;
pub mod sheet_ops;
pub mod sheets_client;
pub mod store;

// Re-exports for convenience
pub use auth::{Authenticator, TokenSource};
pub use client::{ApiClient, DriveClient};
pub use drive_ops::DriveOperations;
pub use error::{Error, Result};
pub use models::FileMetadata;
pub use resolver::PathResolver;
pub use server::ToolHost;
pub use sheet_ops::SheetOperations;
pub use sheets_client::SheetsClient;
pub use store::{FileStore, TabularDocumentStore};
