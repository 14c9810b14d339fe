//! Spreadsheet operations: tabs, structure and cell values.
//!
//! Spreadsheets are addressed by path beneath the root folder and tabs by
//! title. Reads that precede writes (cell updates, deletions) are reported
//! back to the caller so changes can be undone by hand; nothing here is
//! transactional and nothing is rolled back when a later step fails.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::info;

use crate::a1::{column_index_to_letter, parse_range_start, sheet_range, CellRef};
use crate::error::{Error, Result};
use crate::format::CellTable;
use crate::models::{Dimension, DimensionRange, FileKind, SheetProperties, SheetRequest, ValueRange};
use crate::resolver::{normalize, PathResolver};
use crate::store::{FileStore, TabularDocumentStore};

/// Marker used instead of an empty table.
pub const NO_DATA: &str = "No data found";

#[derive(Debug, Clone)]
pub struct TabListing {
    pub spreadsheet: String,
    pub tabs: Vec<SheetProperties>,
}

impl fmt::Display for TabListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Spreadsheet: {}", self.spreadsheet)?;
        writeln!(f, "Total sheets: {}", self.tabs.len())?;
        writeln!(f)?;
        for tab in &self.tabs {
            writeln!(f, "{}. {} (ID: {})", tab.index, tab.title, tab.sheet_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CopiedTab {
    pub source: String,
    pub destination: String,
    pub new_sheet_id: i64,
}

impl fmt::Display for CopiedTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sheet '{}' successfully copied to '{}' (new sheet ID: {})",
            self.source, self.destination, self.new_sheet_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct RenamedTab {
    pub spreadsheet: String,
    pub old_name: String,
    pub new_name: String,
}

impl fmt::Display for RenamedTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sheet '{}' in '{}' successfully renamed to '{}'",
            self.old_name, self.spreadsheet, self.new_name
        )
    }
}

/// Rows or columns inserted into a tab.
#[derive(Debug, Clone)]
pub struct InsertedDimension {
    pub sheet: String,
    pub dimension: Dimension,
    pub count: u32,
    /// 1-based position of the first new row/column; `None` when appended.
    pub start: Option<u32>,
}

impl fmt::Display for InsertedDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = plural(self.dimension, self.count);
        match self.start {
            Some(start) => write!(
                f,
                "Added {} {} before {} {} in sheet '{}'",
                self.count,
                noun,
                self.dimension.noun(),
                position_label(self.dimension, start),
                self.sheet
            ),
            None => write!(
                f,
                "Appended {} {} at the end of sheet '{}'",
                self.count, noun, self.sheet
            ),
        }
    }
}

/// Rows or columns removed from a tab, with the values they held.
#[derive(Debug, Clone)]
pub struct DeletedDimension {
    pub sheet: String,
    pub dimension: Dimension,
    pub count: u32,
    pub start: u32,
    pub previous: CellTable,
}

impl fmt::Display for DeletedDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.start + self.count - 1;
        writeln!(
            f,
            "Deleted {} {} ({} {} to {}) from sheet '{}'",
            self.count,
            plural(self.dimension, self.count),
            self.dimension.noun(),
            position_label(self.dimension, self.start),
            position_label(self.dimension, end),
            self.sheet
        )?;
        writeln!(f)?;
        writeln!(f, "Previous data (for manual undo):")?;
        write_table(f, &self.previous)
    }
}

#[derive(Debug, Clone)]
pub struct CellUpdate {
    pub sheet: String,
    pub range: String,
    pub updated_cells: u64,
    pub previous: CellTable,
}

impl fmt::Display for CellUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Updated {} cells in range {} of sheet '{}'",
            self.updated_cells, self.range, self.sheet
        )?;
        writeln!(f)?;
        writeln!(f, "Previous data:")?;
        write_table(f, &self.previous)
    }
}

#[derive(Debug, Clone)]
pub struct RangeSnapshot {
    pub range: String,
    pub previous: CellTable,
}

#[derive(Debug, Clone)]
pub struct BatchCellUpdate {
    pub sheet: String,
    pub total_updated_cells: u64,
    pub total_updated_sheets: u64,
    pub ranges: Vec<RangeSnapshot>,
}

impl fmt::Display for BatchCellUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Batch update completed in sheet '{}': {} ranges, {} cells updated across {} sheets",
            self.sheet,
            self.ranges.len(),
            self.total_updated_cells,
            self.total_updated_sheets
        )?;
        for snapshot in &self.ranges {
            writeln!(f)?;
            writeln!(f, "Previous data for {}:", snapshot.range)?;
            write_table(f, &snapshot.previous)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SheetData {
    pub spreadsheet: String,
    pub sheet: String,
    pub range: Option<String>,
    pub table: CellTable,
}

impl SheetData {
    pub fn total_rows(&self) -> usize {
        if self.table.is_empty() {
            0
        } else {
            self.table.row_count()
        }
    }

    pub fn total_columns(&self) -> usize {
        self.table.column_count()
    }
}

impl fmt::Display for SheetData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spreadsheet: {}\nSheet: {}", self.spreadsheet, self.sheet)?;
        if let Some(range) = &self.range {
            write!(f, "\nRange: {}", range)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Total rows: {}, Total columns: {}",
            self.total_rows(),
            self.total_columns()
        )?;
        writeln!(f)?;
        write_table(f, &self.table)
    }
}

fn write_table(f: &mut fmt::Formatter<'_>, table: &CellTable) -> fmt::Result {
    if table.is_empty() {
        writeln!(f, "{}", NO_DATA)
    } else {
        write!(f, "{}", table)
    }
}

fn plural(dimension: Dimension, count: u32) -> String {
    if count == 1 {
        dimension.noun().to_string()
    } else {
        format!("{}s", dimension.noun())
    }
}

fn position_label(dimension: Dimension, position: u32) -> String {
    match dimension {
        Dimension::Rows => position.to_string(),
        Dimension::Columns => column_index_to_letter(position),
    }
}

fn positive(value: i64, name: &str) -> Result<u32> {
    if value <= 0 {
        return Err(Error::InvalidArgument(format!(
            "{} must be greater than 0",
            name
        )));
    }
    u32::try_from(value).map_err(|_| Error::InvalidArgument(format!("{} is too large", name)))
}

fn required<'s>(value: &'s str, name: &str) -> Result<&'s str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{} is required", name)));
    }
    Ok(trimmed)
}

fn check_data(range: &str, data: &[Vec<Value>]) -> Result<()> {
    if data.iter().all(Vec::is_empty) {
        return Err(Error::InvalidArgument(format!(
            "data for range {} cannot be empty",
            range
        )));
    }
    Ok(())
}

/// Zero-based half-open span for `count` items starting at 1-based `start`.
pub fn dimension_span(start: u32, count: u32) -> Result<(u32, u32)> {
    let begin = start - 1;
    let end = begin
        .checked_add(count)
        .ok_or_else(|| Error::InvalidArgument("range exceeds sheet limits".to_string()))?;
    Ok((begin, end))
}

/// Tab and cell operations against a `TabularDocumentStore`.
pub struct SheetOperations {
    files: Arc<dyn FileStore>,
    sheets: Arc<dyn TabularDocumentStore>,
    root_id: String,
}

impl SheetOperations {
    pub fn new(
        files: Arc<dyn FileStore>,
        sheets: Arc<dyn TabularDocumentStore>,
        root_id: impl Into<String>,
    ) -> Self {
        Self {
            files,
            sheets,
            root_id: root_id.into(),
        }
    }

    /// Resolve a spreadsheet path; intermediate segments must be folders.
    pub async fn resolve_spreadsheet(&self, path: &str) -> Result<String> {
        if normalize(path)?.is_empty() {
            return Err(Error::InvalidPath("spreadsheet path is empty".to_string()));
        }
        PathResolver::new(self.files.as_ref(), &self.root_id)
            .resolve(path, Some(FileKind::Spreadsheet))
            .await
    }

    /// Find a tab by exact title.
    pub async fn resolve_tab(&self, spreadsheet_id: &str, title: &str) -> Result<SheetProperties> {
        self.sheets
            .list_tabs(spreadsheet_id)
            .await?
            .into_iter()
            .find(|tab| tab.title == title)
            .ok_or_else(|| Error::NotFound(format!("sheet {}", title)))
    }

    async fn locate(&self, spreadsheet: &str, sheet: &str) -> Result<(String, SheetProperties)> {
        let spreadsheet_id = self.resolve_spreadsheet(spreadsheet).await?;
        let tab = self.resolve_tab(&spreadsheet_id, sheet).await?;
        Ok((spreadsheet_id, tab))
    }

    pub async fn list_tabs(&self, spreadsheet: &str) -> Result<TabListing> {
        let spreadsheet_id = self.resolve_spreadsheet(spreadsheet).await?;
        let tabs = self.sheets.list_tabs(&spreadsheet_id).await?;
        Ok(TabListing {
            spreadsheet: spreadsheet.to_string(),
            tabs,
        })
    }

    /// Copy a tab into another spreadsheet and give the copy `dst_sheet` as title.
    ///
    /// Two remote calls: the copy (which keeps the source title) and a
    /// rename of the new tab by id. A failed rename leaves the copy in place.
    pub async fn copy_tab(
        &self,
        src_spreadsheet: &str,
        src_sheet: &str,
        dst_spreadsheet: &str,
        dst_sheet: &str,
    ) -> Result<CopiedTab> {
        let dst_sheet = required(dst_sheet, "destination sheet name")?;
        let (src_id, src_tab) = self.locate(src_spreadsheet, src_sheet).await?;
        let dst_id = self.resolve_spreadsheet(dst_spreadsheet).await?;

        let copied = self
            .sheets
            .copy_tab(&src_id, src_tab.sheet_id, &dst_id)
            .await
            .map_err(|e| e.in_step("failed to copy sheet"))?;

        self.sheets
            .apply(&dst_id, vec![SheetRequest::rename(copied.sheet_id, dst_sheet)])
            .await
            .map_err(|e| {
                e.in_step(format!(
                    "sheet copied as '{}' (ID: {}) but renaming it to '{}' failed",
                    copied.title, copied.sheet_id, dst_sheet
                ))
            })?;

        Ok(CopiedTab {
            source: format!("{}/{}", src_spreadsheet, src_sheet),
            destination: format!("{}/{}", dst_spreadsheet, dst_sheet),
            new_sheet_id: copied.sheet_id,
        })
    }

    pub async fn rename_tab(
        &self,
        spreadsheet: &str,
        sheet: &str,
        new_name: &str,
    ) -> Result<RenamedTab> {
        let new_name = required(new_name, "new sheet name")?;
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;

        self.sheets
            .apply(&spreadsheet_id, vec![SheetRequest::rename(tab.sheet_id, new_name)])
            .await?;
        info!(spreadsheet, sheet, new_name, "renamed sheet");

        Ok(RenamedTab {
            spreadsheet: spreadsheet.to_string(),
            old_name: sheet.to_string(),
            new_name: new_name.to_string(),
        })
    }

    pub async fn add_rows(
        &self,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start_row: Option<i64>,
    ) -> Result<InsertedDimension> {
        self.insert_dimension(Dimension::Rows, spreadsheet, sheet, count, start_row)
            .await
    }

    pub async fn add_columns(
        &self,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start_column: Option<i64>,
    ) -> Result<InsertedDimension> {
        self.insert_dimension(Dimension::Columns, spreadsheet, sheet, count, start_column)
            .await
    }

    /// Insert blank rows/columns before 1-based `start`, or append them.
    async fn insert_dimension(
        &self,
        dimension: Dimension,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start: Option<i64>,
    ) -> Result<InsertedDimension> {
        let count = positive(count, "count")?;
        let start = match start {
            Some(start) => Some(positive(start, &format!("start {}", dimension.noun()))?),
            None => None,
        };
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;

        let request = match start {
            Some(start) => {
                let (start_index, end_index) = dimension_span(start, count)?;
                SheetRequest::InsertDimension {
                    range: DimensionRange {
                        sheet_id: tab.sheet_id,
                        dimension,
                        start_index,
                        end_index,
                    },
                    inherit_from_before: false,
                }
            }
            None => SheetRequest::AppendDimension {
                sheet_id: tab.sheet_id,
                dimension,
                length: count,
            },
        };
        self.sheets.apply(&spreadsheet_id, vec![request]).await?;

        Ok(InsertedDimension {
            sheet: sheet.to_string(),
            dimension,
            count,
            start,
        })
    }

    pub async fn delete_rows(
        &self,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start_row: i64,
    ) -> Result<DeletedDimension> {
        self.delete_dimension(Dimension::Rows, spreadsheet, sheet, count, start_row)
            .await
    }

    pub async fn delete_columns(
        &self,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start_column: i64,
    ) -> Result<DeletedDimension> {
        self.delete_dimension(Dimension::Columns, spreadsheet, sheet, count, start_column)
            .await
    }

    /// Read, then delete, `count` rows/columns from 1-based `start`.
    async fn delete_dimension(
        &self,
        dimension: Dimension,
        spreadsheet: &str,
        sheet: &str,
        count: i64,
        start: i64,
    ) -> Result<DeletedDimension> {
        let count = positive(count, "count")?;
        let start = positive(start, &format!("start {}", dimension.noun()))?;
        let (start_index, end_index) = dimension_span(start, count)?;
        // The exclusive 0-based end is also the inclusive 1-based end.
        let end = end_index;
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;

        let (span, origin) = match dimension {
            Dimension::Rows => (format!("{}:{}", start, end), CellRef { column: 1, row: start }),
            Dimension::Columns => (
                format!(
                    "{}:{}",
                    column_index_to_letter(start),
                    column_index_to_letter(end)
                ),
                CellRef { column: start, row: 1 },
            ),
        };
        let current = self
            .sheets
            .get_values(&spreadsheet_id, &sheet_range(&tab.title, Some(&span)))
            .await
            .map_err(|e| e.in_step("failed to read data before deletion"))?;

        let previous = CellTable::new(origin, &current.values);
        let previous = match dimension {
            Dimension::Rows => previous.pad_rows(count as usize),
            Dimension::Columns => previous.pad_columns(count as usize),
        };

        self.sheets
            .apply(
                &spreadsheet_id,
                vec![SheetRequest::DeleteDimension {
                    range: DimensionRange {
                        sheet_id: tab.sheet_id,
                        dimension,
                        start_index,
                        end_index,
                    },
                }],
            )
            .await
            .map_err(|e| e.in_step(format!("failed to delete {}s", dimension.noun())))?;
        info!(spreadsheet, sheet, count, start, dimension = dimension.noun(), "deleted");

        Ok(DeletedDimension {
            sheet: sheet.to_string(),
            dimension,
            count,
            start,
            previous,
        })
    }

    /// Overwrite `range` with `data`, returning the values it replaced.
    pub async fn update_cells(
        &self,
        spreadsheet: &str,
        sheet: &str,
        range: &str,
        data: Vec<Vec<Value>>,
    ) -> Result<CellUpdate> {
        let range = required(range, "range")?;
        check_data(range, &data)?;
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;
        let target = sheet_range(&tab.title, Some(range));

        let current = self
            .sheets
            .get_values(&spreadsheet_id, &target)
            .await
            .map_err(|e| e.in_step("failed to read current values"))?;

        let response = self
            .sheets
            .update_values(&spreadsheet_id, &target, data)
            .await
            .map_err(|e| e.in_step("failed to update cells"))?;

        Ok(CellUpdate {
            sheet: sheet.to_string(),
            range: range.to_string(),
            updated_cells: response.updated_cells,
            previous: CellTable::new(parse_range_start(range), &current.values),
        })
    }

    /// Overwrite several ranges of one tab with a single write call.
    ///
    /// Ranges are processed in lexicographic order and assumed not to overlap.
    pub async fn batch_update_cells(
        &self,
        spreadsheet: &str,
        sheet: &str,
        ranges: BTreeMap<String, Vec<Vec<Value>>>,
    ) -> Result<BatchCellUpdate> {
        if ranges.is_empty() {
            return Err(Error::InvalidArgument("ranges cannot be empty".to_string()));
        }
        for (range, data) in &ranges {
            required(range, "range")?;
            check_data(range, data)?;
        }
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;

        let targets: Vec<(String, String)> = ranges
            .keys()
            .map(|range| {
                let range = range.trim().to_string();
                let target = sheet_range(&tab.title, Some(&range));
                (range, target)
            })
            .collect();

        let current = try_join_all(
            targets
                .iter()
                .map(|(_, target)| self.sheets.get_values(&spreadsheet_id, target)),
        )
        .await
        .map_err(|e| e.in_step("failed to read current values"))?;

        let data = targets
            .iter()
            .zip(ranges.into_values())
            .map(|((_, target), values)| ValueRange {
                range: target.clone(),
                values,
            })
            .collect();

        let response = self
            .sheets
            .batch_update_values(&spreadsheet_id, data)
            .await
            .map_err(|e| e.in_step("failed to batch update cells"))?;

        let snapshots = targets
            .into_iter()
            .zip(current)
            .map(|((range, _), values)| RangeSnapshot {
                previous: CellTable::new(parse_range_start(&range), &values.values),
                range,
            })
            .collect();

        Ok(BatchCellUpdate {
            sheet: sheet.to_string(),
            total_updated_cells: response.total_updated_cells,
            total_updated_sheets: response.total_updated_sheets,
            ranges: snapshots,
        })
    }

    /// Read `range`, or the whole tab when no range is given.
    pub async fn get_sheet_data(
        &self,
        spreadsheet: &str,
        sheet: &str,
        range: Option<&str>,
    ) -> Result<SheetData> {
        let range = range.map(str::trim).filter(|r| !r.is_empty());
        let (spreadsheet_id, tab) = self.locate(spreadsheet, sheet).await?;

        let values = self
            .sheets
            .get_values(&spreadsheet_id, &sheet_range(&tab.title, range))
            .await?;
        let start = range.map(parse_range_start).unwrap_or_default();

        Ok(SheetData {
            spreadsheet: spreadsheet.to_string(),
            sheet: sheet.to_string(),
            range: range.map(str::to_string),
            table: CellTable::new(start, &values.values),
        })
    }
}
