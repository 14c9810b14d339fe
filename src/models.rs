//! Data models for Google Drive, Sheets and OAuth2 API payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// MIME type Drive uses for native spreadsheets.
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";
const FORM_MIME: &str = "application/vnd.google-apps.form";

/// Coarse classification of a Drive object by MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    Spreadsheet,
    Document,
    Presentation,
    Form,
    Other,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            FOLDER_MIME => FileKind::Folder,
            SPREADSHEET_MIME => FileKind::Spreadsheet,
            DOCUMENT_MIME => FileKind::Document,
            PRESENTATION_MIME => FileKind::Presentation,
            FORM_MIME => FileKind::Form,
            _ => FileKind::Other,
        }
    }

    /// MIME type usable in a Drive query filter, if the kind has exactly one.
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            FileKind::Folder => Some(FOLDER_MIME),
            FileKind::Spreadsheet => Some(SPREADSHEET_MIME),
            FileKind::Document => Some(DOCUMENT_MIME),
            FileKind::Presentation => Some(PRESENTATION_MIME),
            FileKind::Form => Some(FORM_MIME),
            FileKind::Other => None,
        }
    }

    /// Human label for well-known Google document kinds.
    pub fn label(self) -> Option<&'static str> {
        match self {
            FileKind::Document => Some("Document"),
            FileKind::Spreadsheet => Some("Spreadsheet"),
            FileKind::Presentation => Some("Presentation"),
            FileKind::Form => Some("Form"),
            FileKind::Folder | FileKind::Other => None,
        }
    }
}

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl FileMetadata {
    pub fn kind(&self) -> FileKind {
        self.mime_type
            .as_deref()
            .map(FileKind::from_mime)
            .unwrap_or(FileKind::Other)
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == FileKind::Folder
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl std::fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        let label = self.kind().label();
        match (label, self.size) {
            (Some(label), Some(size)) => write!(f, " ({}, {})", label, format_size(size)),
            (Some(label), None) => write!(f, " ({})", label),
            (None, Some(size)) => write!(f, " ({})", format_size(size)),
            (None, None) => Ok(()),
        }
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

/// Properties of one tab within a spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Debug, Deserialize)]
pub struct Sheet {
    pub properties: SheetProperties,
}

/// Subset of a spreadsheet resource returned by spreadsheets.get.
#[derive(Debug, Deserialize)]
pub struct Spreadsheet {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

/// A block of cell values addressed in A1 notation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: String,
    #[serde(default)]
    pub updated_rows: u64,
    #[serde(default)]
    pub updated_columns: u64,
    #[serde(default)]
    pub updated_cells: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateValuesResponse {
    #[serde(default)]
    pub total_updated_rows: u64,
    #[serde(default)]
    pub total_updated_columns: u64,
    #[serde(default)]
    pub total_updated_cells: u64,
    #[serde(default)]
    pub total_updated_sheets: u64,
    #[serde(default)]
    pub responses: Vec<UpdateValuesResponse>,
}

/// Row or column axis of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dimension {
    Rows,
    Columns,
}

impl Dimension {
    pub fn noun(self) -> &'static str {
        match self {
            Dimension::Rows => "row",
            Dimension::Columns => "column",
        }
    }
}

/// Zero-based half-open span along one dimension of a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: Dimension,
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleUpdate {
    pub sheet_id: i64,
    pub title: String,
}

/// A structural edit sent through spreadsheets.batchUpdate.
///
/// Serializes in the externally tagged form the API expects, e.g.
/// `{"deleteDimension": {"range": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetRequest {
    UpdateSheetProperties {
        properties: TitleUpdate,
        fields: String,
    },
    #[serde(rename_all = "camelCase")]
    InsertDimension {
        range: DimensionRange,
        inherit_from_before: bool,
    },
    #[serde(rename_all = "camelCase")]
    AppendDimension {
        sheet_id: i64,
        dimension: Dimension,
        length: u32,
    },
    DeleteDimension {
        range: DimensionRange,
    },
}

impl SheetRequest {
    pub fn rename(sheet_id: i64, title: impl Into<String>) -> Self {
        SheetRequest::UpdateSheetProperties {
            properties: TitleUpdate {
                sheet_id,
                title: title.into(),
            },
            fields: "title".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// OAuth2
// ---------------------------------------------------------------------------

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth client registration (the `installed` or `web` block of a client secret file).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthClientFile {
    pub installed: Option<OAuthClient>,
    pub web: Option<OAuthClient>,
}

/// Either credential file shape accepted by the authenticator.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountCredentials),
    OAuth(OAuthClientFile),
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Token persisted between runs for the installed-app flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub expires_at: Option<u64>,
}
