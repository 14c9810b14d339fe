//! MCP server over stdio: tool registry, argument decoding and dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::a1::column_letter_to_index;
use crate::drive_ops::DriveOperations;
use crate::error::Error;
use crate::protocol::{Request, Response, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::sheet_ops::SheetOperations;

const SERVER_NAME: &str = "mcp-google-spreadsheet";

const PROTOCOL_VERSION: &str = "2024-11-05";

const INSTRUCTIONS: &str = "MCP server for Google Drive file management and Google Sheets operations. \
Workflow: 1) Use google_drive_list_files to browse and find spreadsheets, \
2) Use google_sheets_list_sheets to see sheets in a spreadsheet, \
3) Use google_sheets_read_data to view content, \
4) Use other google_sheets_* tools to modify data. \
Paths are relative to the configured root folder, e.g. 'Reports/2024/Budget'.";

/// Every tool this server registers, in listing order.
pub const TOOL_NAMES: [&str; 13] = [
    "google_drive_list_files",
    "google_drive_copy_file",
    "google_drive_rename_file",
    "google_sheets_list_sheets",
    "google_sheets_copy_sheet",
    "google_sheets_rename_sheet",
    "google_sheets_read_data",
    "google_sheets_add_rows",
    "google_sheets_add_columns",
    "google_sheets_delete_rows",
    "google_sheets_delete_columns",
    "google_sheets_update_cells",
    "google_sheets_batch_update_cells",
];

#[derive(Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct CopyFileArgs {
    src_path: String,
    dst_path: String,
}

#[derive(Deserialize)]
struct RenameFileArgs {
    path: String,
    new_name: String,
}

#[derive(Deserialize)]
struct ListSheetsArgs {
    spreadsheet: String,
}

#[derive(Deserialize)]
struct CopySheetArgs {
    src_spreadsheet: String,
    src_sheet: String,
    dst_spreadsheet: String,
    dst_sheet: String,
}

#[derive(Deserialize)]
struct RenameSheetArgs {
    spreadsheet: String,
    sheet: String,
    new_name: String,
}

#[derive(Deserialize)]
struct ReadDataArgs {
    spreadsheet: String,
    sheet: String,
    #[serde(default)]
    range: Option<String>,
}

#[derive(Deserialize)]
struct AddRowsArgs {
    spreadsheet: String,
    sheet: String,
    count: i64,
    #[serde(default)]
    start_row: Option<i64>,
}

#[derive(Deserialize)]
struct AddColumnsArgs {
    spreadsheet: String,
    sheet: String,
    count: i64,
    #[serde(default)]
    start_column: Option<ColumnRef>,
}

#[derive(Deserialize)]
struct DeleteRowsArgs {
    spreadsheet: String,
    sheet: String,
    count: i64,
    start_row: i64,
}

#[derive(Deserialize)]
struct DeleteColumnsArgs {
    spreadsheet: String,
    sheet: String,
    count: i64,
    start_column: ColumnRef,
}

#[derive(Deserialize)]
struct UpdateCellsArgs {
    spreadsheet: String,
    sheet: String,
    range: String,
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct BatchUpdateCellsArgs {
    spreadsheet: String,
    sheet: String,
    ranges: BTreeMap<String, Vec<Vec<Value>>>,
}

/// A column given either as a 1-based number or as letters ("C").
#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnRef {
    Index(i64),
    Letters(String),
}

impl ColumnRef {
    fn index(&self) -> crate::Result<i64> {
        match self {
            ColumnRef::Index(index) => Ok(*index),
            ColumnRef::Letters(text) => {
                let text = text.trim();
                if let Ok(index) = text.parse::<i64>() {
                    return Ok(index);
                }
                column_letter_to_index(text)
                    .map(i64::from)
                    .ok_or_else(|| Error::InvalidArgument(format!("invalid column: {}", text)))
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> crate::Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| Error::InvalidArgument(format!("invalid arguments for {}: {}", tool, e)))
}

/// Hosts the Drive and Sheets operations as MCP tools.
pub struct ToolHost {
    drive: DriveOperations,
    sheets: SheetOperations,
}

impl ToolHost {
    pub fn new(drive: DriveOperations, sheets: SheetOperations) -> Self {
        Self { drive, sheets }
    }

    /// Run one tool and return its text rendering.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> crate::Result<String> {
        let text = match name {
            "google_drive_list_files" => {
                let args: ListFilesArgs = parse_args(name, arguments)?;
                self.drive.list_files(&args.path).await?.to_string()
            }
            "google_drive_copy_file" => {
                let args: CopyFileArgs = parse_args(name, arguments)?;
                self.drive
                    .copy_file(&args.src_path, &args.dst_path)
                    .await?
                    .to_string()
            }
            "google_drive_rename_file" => {
                let args: RenameFileArgs = parse_args(name, arguments)?;
                self.drive
                    .rename_file(&args.path, &args.new_name)
                    .await?
                    .to_string()
            }
            "google_sheets_list_sheets" => {
                let args: ListSheetsArgs = parse_args(name, arguments)?;
                self.sheets.list_tabs(&args.spreadsheet).await?.to_string()
            }
            "google_sheets_copy_sheet" => {
                let args: CopySheetArgs = parse_args(name, arguments)?;
                self.sheets
                    .copy_tab(
                        &args.src_spreadsheet,
                        &args.src_sheet,
                        &args.dst_spreadsheet,
                        &args.dst_sheet,
                    )
                    .await?
                    .to_string()
            }
            "google_sheets_rename_sheet" => {
                let args: RenameSheetArgs = parse_args(name, arguments)?;
                self.sheets
                    .rename_tab(&args.spreadsheet, &args.sheet, &args.new_name)
                    .await?
                    .to_string()
            }
            "google_sheets_read_data" => {
                let args: ReadDataArgs = parse_args(name, arguments)?;
                self.sheets
                    .get_sheet_data(&args.spreadsheet, &args.sheet, args.range.as_deref())
                    .await?
                    .to_string()
            }
            "google_sheets_add_rows" => {
                let args: AddRowsArgs = parse_args(name, arguments)?;
                self.sheets
                    .add_rows(&args.spreadsheet, &args.sheet, args.count, args.start_row)
                    .await?
                    .to_string()
            }
            "google_sheets_add_columns" => {
                let args: AddColumnsArgs = parse_args(name, arguments)?;
                let start = args.start_column.as_ref().map(ColumnRef::index).transpose()?;
                self.sheets
                    .add_columns(&args.spreadsheet, &args.sheet, args.count, start)
                    .await?
                    .to_string()
            }
            "google_sheets_delete_rows" => {
                let args: DeleteRowsArgs = parse_args(name, arguments)?;
                self.sheets
                    .delete_rows(&args.spreadsheet, &args.sheet, args.count, args.start_row)
                    .await?
                    .to_string()
            }
            "google_sheets_delete_columns" => {
                let args: DeleteColumnsArgs = parse_args(name, arguments)?;
                let start = args.start_column.index()?;
                self.sheets
                    .delete_columns(&args.spreadsheet, &args.sheet, args.count, start)
                    .await?
                    .to_string()
            }
            "google_sheets_update_cells" => {
                let args: UpdateCellsArgs = parse_args(name, arguments)?;
                self.sheets
                    .update_cells(&args.spreadsheet, &args.sheet, &args.range, args.data)
                    .await?
                    .to_string()
            }
            "google_sheets_batch_update_cells" => {
                let args: BatchUpdateCellsArgs = parse_args(name, arguments)?;
                self.sheets
                    .batch_update_cells(&args.spreadsheet, &args.sheet, args.ranges)
                    .await?
                    .to_string()
            }
            other => {
                return Err(Error::InvalidArgument(format!("unknown tool: {}", other)));
            }
        };
        Ok(text)
    }

    /// Answer one request. Notifications yield no response.
    pub async fn handle_request(&self, req: Request) -> Option<Response> {
        let Some(id) = req.id.clone() else {
            debug!(method = %req.method, "notification");
            return None;
        };

        let response = match req.method.as_str() {
            "initialize" => {
                let version = req
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(PROTOCOL_VERSION);
                Response::ok(
                    id,
                    json!({
                        "protocolVersion": version,
                        "capabilities": {
                            "tools": { "listChanged": false }
                        },
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "title": "Google Drive & Sheets MCP Server",
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "instructions": INSTRUCTIONS
                    }),
                )
            }
            "ping" => Response::ok(id, json!({})),
            "tools/list" => Response::ok(id, json!({ "tools": tool_definitions() })),
            "tools/call" => {
                let Some(name) = req.params.get("name").and_then(Value::as_str) else {
                    return Some(Response::err(id, INVALID_PARAMS, "name is required"));
                };
                if !TOOL_NAMES.contains(&name) {
                    return Some(Response::err(
                        id,
                        INVALID_PARAMS,
                        format!("unknown tool: {}", name),
                    ));
                }
                let arguments = req
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                Response::ok(id, tool_result(name, self.call_tool(name, arguments).await))
            }
            _ => Response::err(id, METHOD_NOT_FOUND, "method not found"),
        };
        Some(response)
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Requests run concurrently. A `notifications/cancelled` naming an
    /// in-flight request drops that request's future, aborting its remote
    /// calls, and no response is sent for it.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(resp) = rx.recv().await {
                write_response(&mut writer, resp).await?;
            }
            Ok::<_, anyhow::Error>(())
        });

        let in_flight: Arc<Mutex<HashMap<String, CancellationToken>>> = Arc::default();
        let tracker = TaskTracker::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(err) => {
                    let _ = tx.send(Response::err(Value::Null, PARSE_ERROR, err.to_string()));
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let req: Request = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(err) => {
                    let _ = tx.send(Response::err(Value::Null, PARSE_ERROR, err.to_string()));
                    continue;
                }
            };

            if req.method == "notifications/cancelled" {
                if let Some(request_id) = req.params.get("requestId") {
                    let token = in_flight
                        .lock()
                        .ok()
                        .and_then(|map| map.get(&request_id.to_string()).cloned());
                    if let Some(token) = token {
                        info!(request_id = %request_id, "cancelling request");
                        token.cancel();
                    }
                }
                continue;
            }

            let key = req.id.as_ref().map(Value::to_string);
            let token = CancellationToken::new();
            if let (Some(key), Ok(mut map)) = (&key, in_flight.lock()) {
                map.insert(key.clone(), token.clone());
            }

            let tool = req
                .params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let span = info_span!("mcp.request", method = %req.method, tool = %tool);

            let host = Arc::clone(&self);
            let tx = tx.clone();
            let in_flight = Arc::clone(&in_flight);
            tracker.spawn(
                async move {
                    let outcome = tokio::select! {
                        _ = token.cancelled() => None,
                        resp = host.handle_request(req) => resp,
                    };
                    if let (Some(key), Ok(mut map)) = (&key, in_flight.lock()) {
                        map.remove(key);
                    }
                    if let Some(resp) = outcome {
                        let _ = tx.send(resp);
                    }
                }
                .instrument(span),
            );
        }

        tracker.close();
        tracker.wait().await;
        drop(tx);
        writer_task.await??;
        Ok(())
    }
}

/// Wrap a tool outcome in the MCP `tools/call` result shape.
fn tool_result(name: &str, outcome: crate::Result<String>) -> Value {
    match outcome {
        Ok(text) => json!({
            "content": [
                { "type": "text", "text": text }
            ]
        }),
        Err(err) => {
            warn!(tool = name, error = %err, "tool failed");
            json!({
                "isError": true,
                "structuredContent": {
                    "code": err.code()
                },
                "content": [
                    { "type": "text", "text": err.to_string() }
                ]
            })
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, resp: Response) -> Result<()> {
    let line = serde_json::to_string(&resp)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn tool(name: &str, title: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "name": name,
        "title": title,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required
        }
    })
}

fn string_prop(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn integer_prop(description: &str) -> Value {
    json!({ "type": "integer", "minimum": 1, "description": description })
}

fn grid_prop(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": { "type": "array", "items": {} }
    })
}

/// Tool descriptors for `tools/list`.
pub fn tool_definitions() -> Vec<Value> {
    let spreadsheet = string_prop("Spreadsheet path relative to the root folder, e.g. 'Reports/Budget'");
    let sheet = string_prop("Sheet (tab) name");
    vec![
        tool(
            "google_drive_list_files",
            "Google Drive: List Files and Folders",
            "Browse and list files and folders in Google Drive. Use this to explore directory structure and find spreadsheets before working with them.",
            json!({ "path": string_prop("Folder path relative to the root folder; empty for the root") }),
            &[],
        ),
        tool(
            "google_drive_copy_file",
            "Google Drive: Copy File",
            "Copy a file to another location in Google Drive. A destination ending in '/' keeps the source name.",
            json!({
                "src_path": string_prop("Source path"),
                "dst_path": string_prop("Destination path")
            }),
            &["src_path", "dst_path"],
        ),
        tool(
            "google_drive_rename_file",
            "Google Drive: Rename File",
            "Rename a file or folder in Google Drive. Provide the current file path and new name.",
            json!({
                "path": string_prop("Current path"),
                "new_name": string_prop("New name")
            }),
            &["path", "new_name"],
        ),
        tool(
            "google_sheets_list_sheets",
            "Google Sheets: List Sheets in Spreadsheet",
            "List all sheets (tabs) within a specific Google Spreadsheet. Use this after finding the spreadsheet with google_drive_list_files.",
            json!({ "spreadsheet": spreadsheet }),
            &["spreadsheet"],
        ),
        tool(
            "google_sheets_copy_sheet",
            "Google Sheets: Copy Sheet",
            "Copy a sheet from one Google Spreadsheet to another and name the copy.",
            json!({
                "src_spreadsheet": string_prop("Source spreadsheet path"),
                "src_sheet": string_prop("Source sheet name"),
                "dst_spreadsheet": string_prop("Destination spreadsheet path"),
                "dst_sheet": string_prop("Name for the copied sheet")
            }),
            &["src_spreadsheet", "src_sheet", "dst_spreadsheet", "dst_sheet"],
        ),
        tool(
            "google_sheets_rename_sheet",
            "Google Sheets: Rename Sheet",
            "Rename a sheet (tab) within a Google Spreadsheet.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "new_name": string_prop("New sheet name")
            }),
            &["spreadsheet", "sheet", "new_name"],
        ),
        tool(
            "google_sheets_read_data",
            "Google Sheets: Read Data from Sheet",
            "Read data from a sheet, optionally limited to a cell range (e.g. A1:C10). This is how you 'open' and view spreadsheet content.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "range": string_prop("A1 range; the whole sheet when omitted")
            }),
            &["spreadsheet", "sheet"],
        ),
        tool(
            "google_sheets_add_rows",
            "Google Sheets: Insert Rows",
            "Insert empty rows before start_row, or append them at the end when start_row is omitted.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "count": integer_prop("Number of rows to add"),
                "start_row": integer_prop("1-based row to insert before")
            }),
            &["spreadsheet", "sheet", "count"],
        ),
        tool(
            "google_sheets_add_columns",
            "Google Sheets: Insert Columns",
            "Insert empty columns before start_column, or append them at the end when start_column is omitted.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "count": integer_prop("Number of columns to add"),
                "start_column": {
                    "type": ["integer", "string"],
                    "description": "1-based column number or letters (e.g. 3 or \"C\") to insert before"
                }
            }),
            &["spreadsheet", "sheet", "count"],
        ),
        tool(
            "google_sheets_delete_rows",
            "Google Sheets: Delete Rows",
            "Delete rows from a sheet. The deleted values are returned for manual undo.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "count": integer_prop("Number of rows to delete"),
                "start_row": integer_prop("1-based first row to delete")
            }),
            &["spreadsheet", "sheet", "count", "start_row"],
        ),
        tool(
            "google_sheets_delete_columns",
            "Google Sheets: Delete Columns",
            "Delete columns from a sheet. The deleted values are returned for manual undo.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "count": integer_prop("Number of columns to delete"),
                "start_column": {
                    "type": ["integer", "string"],
                    "description": "1-based first column number or letters to delete"
                }
            }),
            &["spreadsheet", "sheet", "count", "start_column"],
        ),
        tool(
            "google_sheets_update_cells",
            "Google Sheets: Update Cell Values",
            "Update cell values in a range (e.g. A1:C3) with a 2D array. Values are parsed as if typed, so formulas work. The previous values are returned.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "range": string_prop("A1 range to update"),
                "data": grid_prop("Rows of cell values")
            }),
            &["spreadsheet", "sheet", "range", "data"],
        ),
        tool(
            "google_sheets_batch_update_cells",
            "Google Sheets: Batch Update Multiple Ranges",
            "Update multiple cell ranges of one sheet in a single operation. Provide a map of A1 ranges to 2D arrays of values.",
            json!({
                "spreadsheet": spreadsheet,
                "sheet": sheet,
                "ranges": {
                    "type": "object",
                    "description": "Map of A1 range to rows of cell values",
                    "additionalProperties": { "type": "array", "items": { "type": "array", "items": {} } }
                }
            }),
            &["spreadsheet", "sheet", "ranges"],
        ),
    ]
}
