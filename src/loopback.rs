//! One-shot loopback HTTP listener for the OAuth authorization-code callback.

use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Error, Result};

/// Path Google redirects to after consent.
pub const CALLBACK_PATH: &str = "/oauth2callback";

const SUCCESS_PAGE: &str = "<html><head><title>Authentication Successful</title></head>\
<body style=\"font-family: Arial, sans-serif; text-align: center; padding: 50px;\">\
<h2>Authentication Successful!</h2>\
<p>You can close this window and return to the application.</p></body></html>";

/// Listener bound for the duration of a single authorization round-trip.
///
/// Dropping it (after success, failure or timeout) closes the port.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

enum Callback {
    Code(String),
    Denied(String),
    Ignored,
}

impl CallbackListener {
    /// Bind on localhost. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
            Error::AuthenticationError(format!("failed to bind callback port {}: {}", port, e))
        })?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    /// Wait for the browser redirect and return the authorization code.
    pub async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Result<String> {
        match tokio::time::timeout(timeout, self.accept_code(expected_state)).await {
            Ok(result) => result,
            Err(_) => Err(Error::AuthenticationError(
                "authentication timed out".to_string(),
            )),
        }
    }

    /// Each connection is served on its own task, so a client that connects
    /// and never sends a request cannot hold up the browser redirect.
    async fn accept_code(&self, expected_state: &str) -> Result<String> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "callback connection");
                    let state = expected_state.to_string();
                    connections.spawn(async move { handle_connection(stream, &state).await });
                }
                Some(joined) = connections.join_next() => match joined {
                    Ok(Ok(Callback::Code(code))) => return Ok(code),
                    Ok(Ok(Callback::Denied(reason))) => {
                        return Err(Error::AuthenticationError(reason))
                    }
                    Ok(Ok(Callback::Ignored)) => {}
                    Ok(Err(err)) => return Err(err),
                    Err(err) => debug!(error = %err, "callback connection task failed"),
                },
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, expected_state: &str) -> Result<Callback> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so the browser sees a clean response.
    let mut header = String::new();
    loop {
        header.clear();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let url = Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", target, e)))?;

    let mut stream = reader.into_inner();
    if url.path() != CALLBACK_PATH {
        respond(&mut stream, "404 Not Found", "Not found").await?;
        return Ok(Callback::Ignored);
    }

    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    let outcome = if let Some(error) = query("error") {
        Callback::Denied(format!("authorization denied: {}", error))
    } else if query("state").as_deref() != Some(expected_state) {
        Callback::Denied("state mismatch in callback".to_string())
    } else {
        match query("code").filter(|code| !code.is_empty()) {
            Some(code) => Callback::Code(code),
            None => Callback::Denied("no code in request".to_string()),
        }
    };

    match &outcome {
        Callback::Code(_) => respond(&mut stream, "200 OK", SUCCESS_PAGE).await?,
        Callback::Denied(reason) => respond(&mut stream, "400 Bad Request", reason).await?,
        Callback::Ignored => {}
    }
    Ok(outcome)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
