//! Tests for the Drive and Sheets HTTP clients with mocked responses.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::NamedTempFile;

use mcp_google_spreadsheet::models::{
    Dimension, DimensionRange, FileKind, FileListResponse, FileMetadata, OAuthClient,
    SheetRequest, StoredToken,
};
use mcp_google_spreadsheet::{
    ApiClient, Authenticator, DriveClient, Error, FileStore, SheetsClient, TabularDocumentStore,
    TokenSource,
};

/// Hands out `stale` until invalidated, then `fresh`.
struct RotatingToken {
    current: Mutex<&'static str>,
    invalidations: AtomicUsize,
}

impl RotatingToken {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new("stale"),
            invalidations: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenSource for RotatingToken {
    async fn access_token(&self) -> mcp_google_spreadsheet::Result<String> {
        Ok(self.current.lock().unwrap().to_string())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = "fresh";
    }
}

fn drive_client(server: &Server, token: Arc<RotatingToken>) -> DriveClient {
    DriveClient::with_base_url(ApiClient::new(token), server.url())
}

fn sheets_client(server: &Server, token: Arc<RotatingToken>) -> SheetsClient {
    SheetsClient::with_base_url(ApiClient::new(token), server.url())
}

mod models {
    use super::*;

    #[test]
    fn test_file_metadata_deserialization() {
        let json = json!({
            "id": "file123",
            "name": "Budget",
            "mimeType": "application/vnd.google-apps.spreadsheet",
            "parents": ["root1"],
            "size": "2048"
        });

        let metadata: FileMetadata = serde_json::from_value(json).unwrap();

        assert_eq!(metadata.id, "file123");
        assert_eq!(metadata.kind(), FileKind::Spreadsheet);
        assert_eq!(metadata.parents, vec!["root1".to_string()]);
        assert_eq!(metadata.size, Some(2048));
        assert!(!metadata.trashed);
    }

    #[test]
    fn test_file_list_response_empty() {
        let response: FileListResponse = serde_json::from_value(json!({ "files": [] })).unwrap();

        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_display_spreadsheet_and_folder() {
        let sheet: FileMetadata = serde_json::from_value(json!({
            "id": "s1",
            "name": "Budget",
            "mimeType": "application/vnd.google-apps.spreadsheet"
        }))
        .unwrap();
        let pdf: FileMetadata = serde_json::from_value(json!({
            "id": "p1",
            "name": "scan.pdf",
            "mimeType": "application/pdf",
            "size": "1048576"
        }))
        .unwrap();

        assert_eq!(sheet.to_string(), "Budget (Spreadsheet)");
        assert_eq!(pdf.to_string(), "scan.pdf (1.00 MB)");
    }

    #[test]
    fn test_sheet_request_wire_shape() {
        let request = SheetRequest::InsertDimension {
            range: DimensionRange {
                sheet_id: 7,
                dimension: Dimension::Rows,
                start_index: 4,
                end_index: 7,
            },
            inherit_from_before: false,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "insertDimension": {
                    "range": {"sheetId": 7, "dimension": "ROWS", "startIndex": 4, "endIndex": 7},
                    "inheritFromBefore": false
                }
            })
        );
        assert_eq!(
            serde_json::to_value(SheetRequest::rename(3, "Q2")).unwrap(),
            json!({
                "updateSheetProperties": {
                    "properties": {"sheetId": 3, "title": "Q2"},
                    "fields": "title"
                }
            })
        );
    }
}

mod drive {
    use super::*;

    #[tokio::test]
    async fn test_list_children_sends_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_header("authorization", "Bearer stale")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "'root1' in parents and trashed = false and name = 'Reports' \
                     and mimeType = 'application/vnd.google-apps.folder'"
                        .into(),
                ),
                Matcher::UrlEncoded("supportsAllDrives".into(), "true".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "files": [{
                        "id": "f1",
                        "name": "Reports",
                        "mimeType": "application/vnd.google-apps.folder"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = drive_client(&server, RotatingToken::new());
        let files = client
            .list_children("root1", Some("Reports"), Some(FileKind::Folder))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(files.len(), 1);
        assert!(files[0].is_folder());
    }

    #[tokio::test]
    async fn test_copy_file_posts_name_and_parent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/files/src1/copy")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({ "name": "Copy", "parents": ["dst1"] })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "id": "new1", "name": "Copy" }).to_string())
            .create_async()
            .await;

        let client = drive_client(&server, RotatingToken::new());
        let copied = client.copy_file("src1", "dst1", "Copy").await.unwrap();

        mock.assert_async().await;
        assert_eq!(copied.id, "new1");
    }

    #[tokio::test]
    async fn test_retries_once_after_unauthorized() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/files/abc")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .with_body(json!({ "error": { "code": 401, "message": "Invalid Credentials" } }).to_string())
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/files/abc")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "id": "abc", "name": "Budget" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let token = RotatingToken::new();
        let client = drive_client(&server, token.clone());
        let file = client.get_file("abc").await.unwrap();

        rejected.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(file.name, "Budget");
        assert_eq!(token.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_api_error_is_decoded() {
        let mut server = Server::new_async().await;
        server
            .mock("PATCH", "/files/abc")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(
                json!({ "error": { "code": 403, "message": "Insufficient permissions" } })
                    .to_string(),
            )
            .create_async()
            .await;

        let client = drive_client(&server, RotatingToken::new());
        let err = client.rename_file("abc", "New").await.unwrap_err();

        match err {
            Error::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Insufficient permissions");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

mod sheets {
    use super::*;

    #[tokio::test]
    async fn test_list_tabs() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/spreadsheets/doc1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "sheets": [
                        {"properties": {"sheetId": 0, "title": "Summary", "index": 0}},
                        {"properties": {"sheetId": 42, "title": "Data", "index": 1}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = sheets_client(&server, RotatingToken::new());
        let tabs = client.list_tabs("doc1").await.unwrap();

        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[1].title, "Data");
        assert_eq!(tabs[1].sheet_id, 42);
    }

    #[tokio::test]
    async fn test_update_values_uses_user_entered() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex(r"^/spreadsheets/doc1/values/.+".to_string()))
            .match_query(Matcher::UrlEncoded(
                "valueInputOption".into(),
                "USER_ENTERED".into(),
            ))
            .match_body(Matcher::PartialJson(json!({ "values": [["=SUM(A1:A2)"]] })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "updatedCells": 1, "updatedRange": "Data!A3" }).to_string())
            .create_async()
            .await;

        let client = sheets_client(&server, RotatingToken::new());
        let response = client
            .update_values("doc1", "'Data'!A3", vec![vec![json!("=SUM(A1:A2)")]])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.updated_cells, 1);
    }

    #[tokio::test]
    async fn test_apply_sends_requests() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/spreadsheets/doc1:batchUpdate")
            .match_body(Matcher::Json(json!({
                "requests": [{
                    "deleteDimension": {
                        "range": {"sheetId": 7, "dimension": "COLUMNS", "startIndex": 1, "endIndex": 3}
                    }
                }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "spreadsheetId": "doc1", "replies": [{}] }).to_string())
            .create_async()
            .await;

        let client = sheets_client(&server, RotatingToken::new());
        client
            .apply(
                "doc1",
                vec![SheetRequest::DeleteDimension {
                    range: DimensionRange {
                        sheet_id: 7,
                        dimension: Dimension::Columns,
                        start_index: 1,
                        end_index: 3,
                    },
                }],
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_values_missing_values_is_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/spreadsheets/doc1/values/".to_string()))
            .match_query(Matcher::UrlEncoded("majorDimension".into(), "ROWS".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "range": "Data!A1:Z1000", "majorDimension": "ROWS" }).to_string())
            .create_async()
            .await;

        let client = sheets_client(&server, RotatingToken::new());
        let values = client.get_values("doc1", "'Data'").await.unwrap();

        assert!(values.values.is_empty());
    }
}

mod credentials {
    use super::*;

    fn client_for(token_uri: String) -> OAuthClient {
        OAuthClient {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: None,
            token_uri: Some(token_uri),
        }
    }

    #[test]
    fn test_authenticator_from_service_account_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({
            "type": "service_account",
            "client_email": "test@project.iam.gserviceaccount.com",
            "private_key": "key"
        });
        temp_file.write_all(creds_json.to_string().as_bytes()).unwrap();

        let auth = Authenticator::from_files(temp_file.path(), "unused.json".into());
        assert!(auth.is_ok());
    }

    #[tokio::test]
    async fn test_installed_client_without_token_needs_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({
            "installed": {"client_id": "id", "client_secret": "secret"}
        });
        temp_file.write_all(creds_json.to_string().as_bytes()).unwrap();

        let auth =
            Authenticator::from_files(temp_file.path(), dir.path().join("token.json")).unwrap();
        assert!(!auth.has_token().await);
    }

    #[test]
    fn test_authenticator_from_invalid_file() {
        let auth =
            Authenticator::from_files("/nonexistent/path/credentials.json", "unused.json".into());
        assert!(matches!(auth, Err(Error::CredentialsFileError(_))));
    }

    #[test]
    fn test_authenticator_from_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid json").unwrap();

        let auth = Authenticator::from_files(temp_file.path(), "unused.json".into());
        assert!(matches!(auth, Err(Error::CredentialsParseError(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "access_token": "ya29.new", "expires_in": 3600 }).to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let stored = StoredToken {
            access_token: "ya29.old".to_string(),
            token_type: Some("Bearer".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(0),
        };
        let auth = Authenticator::installed(
            client_for(format!("{}/token", server.url())),
            token_path.clone(),
            Some(stored),
        );

        assert_eq!(auth.access_token().await.unwrap(), "ya29.new");
        mock.assert_async().await;

        let saved: StoredToken =
            serde_json::from_str(&std::fs::read_to_string(&token_path).unwrap()).unwrap();
        assert_eq!(saved.access_token, "ya29.new");
        assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(json!({ "error": "invalid_grant" }).to_string())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let stored = StoredToken {
            access_token: "ya29.old".to_string(),
            token_type: None,
            refresh_token: Some("1//revoked".to_string()),
            expires_at: Some(0),
        };
        let auth = Authenticator::installed(
            client_for(format!("{}/token", server.url())),
            dir.path().join("token.json"),
            Some(stored),
        );

        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, Error::TokenRefreshError(_)));
        assert_eq!(err.code(), "auth_failed");
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ApiError {
            status: 404,
            message: "File not found".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("404"));
        assert!(display.contains("File not found"));
        assert_eq!(err.code(), "remote_call_failed");
    }

    #[test]
    fn test_step_failure_keeps_inner_code() {
        let err = Error::NotFound("sheet Data".to_string()).in_step("failed to copy sheet");
        let display = err.to_string();

        assert!(display.starts_with("failed to copy sheet"));
        assert!(display.contains("sheet Data"));
        assert_eq!(err.code(), "not_found");
    }
}
