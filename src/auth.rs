//! Access-token acquisition for Google APIs.
//!
//! Two credential shapes are supported: a service account key (JWT bearer
//! grant) and an OAuth client secret for an installed app, whose user token
//! is cached on disk and refreshed with its refresh token.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::loopback::CallbackListener;
use crate::models::{
    CredentialsFile, OAuthClient, ServiceAccountCredentials, StoredToken, TokenResponse,
};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 consent endpoint.
const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google Drive API scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Google Sheets API scope.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Port the authorization callback listener binds to.
pub const REDIRECT_PORT: u16 = 8080;

const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Token file name used when no explicit path is configured.
const DEFAULT_TOKEN_FILE: &str = ".mcp_google_spreadsheet.json";

/// Supplies bearer tokens to the API clients.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid access token.
    async fn access_token(&self) -> Result<String>;

    /// Forget the cached token after the API rejected it.
    async fn invalidate(&self) {}
}

/// `$HOME/.mcp_google_spreadsheet.json`.
pub fn default_token_path() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(DEFAULT_TOKEN_FILE))
        .ok_or_else(|| {
            Error::AuthenticationError("failed to determine home directory".to_string())
        })
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scopes, space separated
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum Grant {
    ServiceAccount(ServiceAccountCredentials),
    Installed {
        client: OAuthClient,
        token_path: PathBuf,
        refresh_token: RwLock<Option<String>>,
    },
}

/// Authenticator for Google APIs.
#[derive(Clone)]
pub struct Authenticator {
    grant: Arc<Grant>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a credentials file.
    ///
    /// For installed-app credentials the token file at `token_path` is
    /// loaded when it exists; it is (re)written after every refresh.
    pub fn from_files<P: AsRef<Path>>(credentials_path: P, token_path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(credentials_path)?;
        let credentials: CredentialsFile = serde_json::from_str(&content)?;

        match credentials {
            CredentialsFile::ServiceAccount(credentials) => Ok(Self::service_account(credentials)),
            CredentialsFile::OAuth(file) => {
                let client = file.installed.or(file.web).ok_or_else(|| {
                    Error::AuthenticationError(
                        "client secret file has neither an \"installed\" nor a \"web\" entry"
                            .to_string(),
                    )
                })?;
                let stored = load_stored_token(&token_path)?;
                Ok(Self::installed(client, token_path, stored))
            }
        }
    }

    /// Create an authenticator from service account credentials.
    pub fn service_account(credentials: ServiceAccountCredentials) -> Self {
        Self {
            grant: Arc::new(Grant::ServiceAccount(credentials)),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an authenticator for an installed OAuth client.
    pub fn installed(client: OAuthClient, token_path: PathBuf, stored: Option<StoredToken>) -> Self {
        let (cached, refresh_token) = match stored {
            Some(token) => {
                let expires_at = token
                    .expires_at
                    .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
                    .unwrap_or(UNIX_EPOCH);
                (
                    Some(CachedToken {
                        access_token: token.access_token,
                        expires_at,
                    }),
                    token.refresh_token,
                )
            }
            None => (None, None),
        };

        Self {
            grant: Arc::new(Grant::Installed {
                client,
                token_path,
                refresh_token: RwLock::new(refresh_token),
            }),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Whether this grant uses the installed-app browser flow.
    pub fn is_installed_app(&self) -> bool {
        matches!(self.grant.as_ref(), Grant::Installed { .. })
    }

    /// Whether a user token is available without interaction.
    pub async fn has_token(&self) -> bool {
        match self.grant.as_ref() {
            Grant::ServiceAccount(_) => true,
            Grant::Installed { refresh_token, .. } => {
                refresh_token.read().await.is_some() || self.cached_token.read().await.is_some()
            }
        }
    }

    /// Make sure a usable token exists, running the browser flow when an
    /// installed-app user has never authorized this machine.
    pub async fn ensure_authorized(&self) -> Result<()> {
        if !self.has_token().await {
            self.authorize_interactive(REDIRECT_PORT).await?;
        }
        self.get_access_token().await.map(|_| ())
    }

    /// Run the authorization-code flow through a loopback listener on `port`.
    pub async fn authorize_interactive(&self, port: u16) -> Result<()> {
        let Grant::Installed {
            client,
            token_path,
            refresh_token,
        } = self.grant.as_ref()
        else {
            return Ok(());
        };

        let listener = CallbackListener::bind(port).await?;
        let redirect_uri = listener.redirect_uri();
        let state = new_state();
        let auth_url = authorization_url(client, &redirect_uri, &state)?;

        info!("opening browser for authentication");
        if let Err(e) = open_browser(auth_url.as_str()) {
            warn!(error = %e, "could not open browser automatically");
        }
        // stdout belongs to the protocol, so the URL goes to stderr.
        eprintln!(
            "Open the following URL in your browser to authorize access:\n{}",
            auth_url
        );

        let code = listener.wait_for_code(&state, AUTHORIZATION_TIMEOUT).await?;

        let token_uri = client.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let params = [
            ("code", code.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let token_response = self.request_token(token_uri, &params).await?;

        let new_refresh = token_response.refresh_token.clone();
        let cached = self.cache_response(token_response).await;
        if new_refresh.is_some() {
            *refresh_token.write().await = new_refresh;
        }
        let refresh = refresh_token.read().await.clone();
        save_token(token_path, &cached, refresh)?;
        info!(path = %token_path.display(), "saved authorization token");
        Ok(())
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        // Check if we have a valid cached token
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                // Add 60 second buffer before expiration
                let buffer = Duration::from_secs(60);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = match self.grant.as_ref() {
            Grant::ServiceAccount(credentials) => self.refresh_service_account(credentials).await?,
            Grant::Installed {
                client,
                token_path,
                refresh_token,
            } => {
                let refresh = refresh_token.read().await.clone().ok_or_else(|| {
                    Error::AuthenticationError(
                        "no refresh token available; run the `auth` command first".to_string(),
                    )
                })?;
                let token = self.refresh_installed(client, &refresh).await?;
                save_token(token_path, &token, Some(refresh))?;
                token
            }
        };

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_service_account(
        &self,
        credentials: &ServiceAccountCredentials,
    ) -> Result<CachedToken> {
        let now = unix_now();
        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: format!("{} {}", DRIVE_SCOPE, SPREADSHEETS_SCOPE),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        // Create JWT
        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        // Exchange JWT for access token
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let response = self.request_token(token_uri, &params).await?;
        Ok(self.cache_response(response).await)
    }

    async fn refresh_installed(&self, client: &OAuthClient, refresh: &str) -> Result<CachedToken> {
        warn!("access token expired, refreshing");
        let token_uri = client.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let params = [
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ];
        let response = self.request_token(token_uri, &params).await?;
        Ok(self.cache_response(response).await)
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn cache_response(&self, response: TokenResponse) -> CachedToken {
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        };
        *self.cached_token.write().await = Some(token.clone());
        token
    }
}

#[async_trait]
impl TokenSource for Authenticator {
    async fn access_token(&self) -> Result<String> {
        self.get_access_token().await
    }

    async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn new_state() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}{:x}", nanos, std::process::id())
}

fn authorization_url(client: &OAuthClient, redirect_uri: &str, state: &str) -> Result<Url> {
    let auth_uri = client.auth_uri.as_deref().unwrap_or(AUTH_URI);
    let scope = format!("{} {}", DRIVE_SCOPE, SPREADSHEETS_SCOPE);
    Url::parse_with_params(
        auth_uri,
        &[
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("{}: {}", auth_uri, e)))
}

fn load_stored_token(path: &Path) -> Result<Option<StoredToken>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_token(path: &Path, token: &CachedToken, refresh_token: Option<String>) -> Result<()> {
    let expires_at = token
        .expires_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .ok();
    let stored = StoredToken {
        access_token: token.access_token.clone(),
        token_type: Some("Bearer".to_string()),
        refresh_token,
        expires_at,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&stored)?)?;
    Ok(())
}

fn open_browser(url: &str) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut cmd = std::process::Command::new("open");
        cmd.arg(url);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = std::process::Command::new("rundll32");
        cmd.args(["url.dll,FileProtocolHandler", url]);
        cmd
    } else {
        let mut cmd = std::process::Command::new("xdg-open");
        cmd.arg(url);
        cmd
    };
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
}
