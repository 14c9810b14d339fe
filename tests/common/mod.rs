//! In-memory stores shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use mcp_google_spreadsheet::models::{
    BatchUpdateValuesResponse, FileKind, FileMetadata, SheetProperties, SheetRequest,
    UpdateValuesResponse, ValueRange, FOLDER_MIME, SPREADSHEET_MIME,
};
use mcp_google_spreadsheet::store::{FileStore, TabularDocumentStore};
use mcp_google_spreadsheet::{Error, Result};

pub const ROOT: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCall {
    List {
        parent: String,
        name: Option<String>,
        kind: Option<FileKind>,
    },
    Get(String),
    Copy {
        file_id: String,
        parent_id: String,
        name: String,
    },
    Rename {
        file_id: String,
        name: String,
    },
}

/// Flat list of objects linked by parent ids.
#[derive(Default)]
pub struct FakeDrive {
    files: Mutex<Vec<FileMetadata>>,
    calls: Mutex<Vec<DriveCall>>,
}

fn entry(id: &str, name: &str, mime: &str, parent: &str) -> FileMetadata {
    FileMetadata {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some(mime.to_string()),
        parents: vec![parent.to_string()],
        trashed: false,
        size: None,
        created_time: None,
        modified_time: None,
    }
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder(self, id: &str, name: &str, parent: &str) -> Self {
        self.with(entry(id, name, FOLDER_MIME, parent))
    }

    pub fn spreadsheet(self, id: &str, name: &str, parent: &str) -> Self {
        self.with(entry(id, name, SPREADSHEET_MIME, parent))
    }

    pub fn file(self, id: &str, name: &str, mime: &str, parent: &str) -> Self {
        self.with(entry(id, name, mime, parent))
    }

    pub fn trashed(self, id: &str, name: &str, parent: &str) -> Self {
        let mut metadata = entry(id, name, "text/plain", parent);
        metadata.trashed = true;
        self.with(metadata)
    }

    fn with(self, metadata: FileMetadata) -> Self {
        self.files.lock().unwrap().push(metadata);
        self
    }

    pub fn calls(&self) -> Vec<DriveCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<DriveCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, DriveCall::List { .. }))
            .collect()
    }

    pub fn mutations(&self) -> Vec<DriveCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, DriveCall::Copy { .. } | DriveCall::Rename { .. }))
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<FileMetadata> {
        self.files.lock().unwrap().iter().find(|f| f.id == id).cloned()
    }

    fn record(&self, call: DriveCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FileStore for FakeDrive {
    async fn list_children(
        &self,
        parent_id: &str,
        name: Option<&str>,
        kind: Option<FileKind>,
    ) -> Result<Vec<FileMetadata>> {
        self.record(DriveCall::List {
            parent: parent_id.to_string(),
            name: name.map(str::to_string),
            kind,
        });
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .filter(|f| !f.trashed && f.parents.iter().any(|p| p == parent_id))
            .filter(|f| name.map_or(true, |name| f.name == name))
            .filter(|f| match kind.and_then(FileKind::mime_type) {
                Some(mime) => f.mime_type.as_deref() == Some(mime),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        self.record(DriveCall::Get(file_id.to_string()));
        self.find(file_id)
            .ok_or_else(|| Error::NotFound(file_id.to_string()))
    }

    async fn copy_file(&self, file_id: &str, parent_id: &str, name: &str) -> Result<FileMetadata> {
        self.record(DriveCall::Copy {
            file_id: file_id.to_string(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
        });
        let source = self
            .find(file_id)
            .ok_or_else(|| Error::NotFound(file_id.to_string()))?;
        let mut copy = source.clone();
        copy.id = format!("{}-copy", file_id);
        copy.name = name.to_string();
        copy.parents = vec![parent_id.to_string()];
        self.files.lock().unwrap().push(copy.clone());
        Ok(copy)
    }

    async fn rename_file(&self, file_id: &str, name: &str) -> Result<FileMetadata> {
        self.record(DriveCall::Rename {
            file_id: file_id.to_string(),
            name: name.to_string(),
        });
        let mut files = self.files.lock().unwrap();
        let file = files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| Error::NotFound(file_id.to_string()))?;
        file.name = name.to_string();
        Ok(file.clone())
    }
}

#[derive(Debug, Clone)]
pub enum SheetCall {
    ListTabs(String),
    CopyTab {
        spreadsheet_id: String,
        sheet_id: i64,
        destination: String,
    },
    Apply(String, Vec<SheetRequest>),
    GetValues(String, String),
    UpdateValues(String, String, Vec<Vec<Value>>),
    BatchUpdateValues(String, Vec<ValueRange>),
}

/// Tabs per spreadsheet id and canned values per exact range string.
pub struct FakeSheets {
    tabs: Mutex<HashMap<String, Vec<SheetProperties>>>,
    values: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    calls: Mutex<Vec<SheetCall>>,
    next_sheet_id: AtomicI64,
    fail_apply: AtomicBool,
}

impl Default for FakeSheets {
    fn default() -> Self {
        Self {
            tabs: Mutex::default(),
            values: Mutex::default(),
            calls: Mutex::default(),
            next_sheet_id: AtomicI64::new(900),
            fail_apply: AtomicBool::new(false),
        }
    }
}

impl FakeSheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(self, spreadsheet_id: &str, sheet_id: i64, title: &str) -> Self {
        {
            let mut tabs = self.tabs.lock().unwrap();
            let list = tabs.entry(spreadsheet_id.to_string()).or_default();
            let index = list.len() as i64;
            list.push(SheetProperties {
                sheet_id,
                title: title.to_string(),
                index,
            });
        }
        self
    }

    /// Values returned when exactly `range` is read.
    pub fn values(self, range: &str, values: Vec<Vec<Value>>) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(range.to_string(), values);
        self
    }

    pub fn failing_apply(self) -> Self {
        self.fail_apply.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<SheetCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied(&self) -> Vec<SheetRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SheetCall::Apply(_, requests) => Some(requests),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, call: SheetCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn cell_count(values: &[Vec<Value>]) -> u64 {
    values.iter().map(|row| row.len() as u64).sum()
}

#[async_trait]
impl TabularDocumentStore for FakeSheets {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        self.record(SheetCall::ListTabs(spreadsheet_id.to_string()));
        Ok(self
            .tabs
            .lock()
            .unwrap()
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn copy_tab(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        destination_spreadsheet_id: &str,
    ) -> Result<SheetProperties> {
        self.record(SheetCall::CopyTab {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_id,
            destination: destination_spreadsheet_id.to_string(),
        });
        let title = self
            .tabs
            .lock()
            .unwrap()
            .get(spreadsheet_id)
            .and_then(|tabs| tabs.iter().find(|t| t.sheet_id == sheet_id))
            .map(|t| format!("Copy of {}", t.title))
            .ok_or_else(|| Error::NotFound(format!("sheet {}", sheet_id)))?;
        Ok(SheetProperties {
            sheet_id: self.next_sheet_id.fetch_add(1, Ordering::SeqCst),
            title,
            index: 0,
        })
    }

    async fn apply(&self, spreadsheet_id: &str, requests: Vec<SheetRequest>) -> Result<()> {
        self.record(SheetCall::Apply(spreadsheet_id.to_string(), requests));
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(Error::ApiError {
                status: 500,
                message: "backend error".to_string(),
            });
        }
        Ok(())
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        self.record(SheetCall::GetValues(
            spreadsheet_id.to_string(),
            range.to_string(),
        ));
        Ok(ValueRange {
            range: range.to_string(),
            values: self
                .values
                .lock()
                .unwrap()
                .get(range)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse> {
        let updated_cells = cell_count(&values);
        self.record(SheetCall::UpdateValues(
            spreadsheet_id.to_string(),
            range.to_string(),
            values,
        ));
        Ok(UpdateValuesResponse {
            updated_range: range.to_string(),
            updated_cells,
            ..Default::default()
        })
    }

    async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<BatchUpdateValuesResponse> {
        let total_updated_cells = data.iter().map(|d| cell_count(&d.values)).sum();
        self.record(SheetCall::BatchUpdateValues(spreadsheet_id.to_string(), data));
        Ok(BatchUpdateValuesResponse {
            total_updated_cells,
            total_updated_sheets: 1,
            ..Default::default()
        })
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
