//! Authorized HTTP transport and the Google Drive API v3 client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::TokenSource;
use crate::error::{Error, Result};
use crate::models::{ApiErrorResponse, FileKind, FileListResponse, FileMetadata};
use crate::store::FileStore;

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id, name, mimeType, parents, trashed, size, createdTime, modifiedTime";

/// Sends bearer-authorized requests and decodes Google API errors.
///
/// A request rejected with 401 is retried once with a fresh token.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    auth: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(auth: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            auth,
        }
    }

    /// Send the request produced by `build` and decode the JSON body.
    pub async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send(build).await?;
        Ok(response.json().await?)
    }

    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.auth.access_token().await?;
        let mut response = build(&self.http).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("access token rejected, retrying with a fresh token");
            self.auth.invalidate().await;
            let token = self.auth.access_token().await?;
            response = build(&self.http).bearer_auth(&token).send().await?;
        }

        check_status(response).await
    }
}

/// Turn a non-success response into `Error::ApiError`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(Error::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(Error::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build the files.list query for the children of `parent_id`.
pub fn children_query(parent_id: &str, name: Option<&str>, kind: Option<FileKind>) -> String {
    let mut query = format!(
        "'{}' in parents and trashed = false",
        escape_query_value(parent_id)
    );
    if let Some(name) = name {
        query.push_str(&format!(" and name = '{}'", escape_query_value(name)));
    }
    if let Some(mime) = kind.and_then(FileKind::mime_type) {
        query.push_str(&format!(" and mimeType = '{}'", mime));
    }
    query
}

/// Client for the Google Drive files API.
pub struct DriveClient {
    api: ApiClient,
    base_url: String,
}

impl DriveClient {
    pub fn new(api: ApiClient) -> Self {
        Self::with_base_url(api, DRIVE_API_BASE)
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_base_url(api: ApiClient, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Query files using Google Drive query syntax, following every page.
    pub async fn query_files(&self, query: &str) -> Result<Vec<FileMetadata>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let url = format!("{}/files", self.base_url);

        loop {
            let list_response: FileListResponse = self
                .api
                .send_json(|http| {
                    let mut request = http.get(&url).query(&[
                        ("q", query),
                        ("fields", fields.as_str()),
                        ("pageSize", "1000"),
                        ("supportsAllDrives", "true"),
                        ("includeItemsFromAllDrives", "true"),
                    ]);
                    if let Some(ref token) = page_token {
                        request = request.query(&[("pageToken", token)]);
                    }
                    request
                })
                .await?;

            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }
}

#[async_trait]
impl FileStore for DriveClient {
    async fn list_children(
        &self,
        parent_id: &str,
        name: Option<&str>,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileMetadata>> {
        let query = children_query(parent_id, name, kind);
        self.query_files(&query).await
    }

    async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        self.api
            .send_json(|http| {
                http.get(&url)
                    .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            })
            .await
    }

    async fn copy_file(
        &self,
        file_id: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<FileMetadata> {
        let url = format!("{}/files/{}/copy", self.base_url, file_id);
        let body = json!({
            "name": name,
            "parents": [parent_id]
        });
        let copied: FileMetadata = self
            .api
            .send_json(|http| {
                http.post(&url)
                    .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
                    .json(&body)
            })
            .await?;
        info!(source = file_id, new_id = %copied.id, name, "copied file");
        Ok(copied)
    }

    async fn rename_file(&self, file_id: &str, name: &str) -> Result<FileMetadata> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        let body = json!({ "name": name });
        let renamed: FileMetadata = self
            .api
            .send_json(|http| {
                http.patch(&url)
                    .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
                    .json(&body)
            })
            .await?;
        info!(file_id, name, "renamed file");
        Ok(renamed)
    }
}
