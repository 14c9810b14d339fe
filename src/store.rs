//! The two remote services the operations are written against.
//!
//! `DriveClient` and `SheetsClient` are the HTTP implementations; tests
//! substitute in-memory stores.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    BatchUpdateValuesResponse, FileKind, FileMetadata, SheetProperties, SheetRequest,
    UpdateValuesResponse, ValueRange,
};

/// Object storage with parent links, names and a trash flag.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Non-trashed direct children of `parent_id`, in the store's own order.
    ///
    /// `name` restricts to an exact name match, `kind` to one object kind.
    async fn list_children(
        &self,
        parent_id: &str,
        name: Option<&str>,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileMetadata>>;

    async fn get_file(&self, file_id: &str) -> Result<FileMetadata>;

    /// Copy `file_id` into `parent_id` under `name`, returning the new object.
    async fn copy_file(&self, file_id: &str, parent_id: &str, name: &str)
        -> Result<FileMetadata>;

    /// Change the name of `file_id` in place.
    async fn rename_file(&self, file_id: &str, name: &str) -> Result<FileMetadata>;
}

/// Spreadsheet documents: tabs, structural edits and cell values.
#[async_trait]
pub trait TabularDocumentStore: Send + Sync {
    /// Tabs of a document in display order.
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>>;

    /// Copy a tab into another document. The copy keeps the source title.
    async fn copy_tab(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        destination_spreadsheet_id: &str,
    ) -> Result<SheetProperties>;

    /// Apply structural requests in one batchUpdate call.
    async fn apply(&self, spreadsheet_id: &str, requests: Vec<SheetRequest>) -> Result<()>;

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange>;

    /// Write values with user-entered input semantics.
    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse>;

    /// Write several ranges in a single call, user-entered semantics.
    async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<BatchUpdateValuesResponse>;
}
