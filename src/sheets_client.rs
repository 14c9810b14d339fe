//! Google Sheets API v4 client.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::info;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{
    BatchUpdateValuesResponse, SheetProperties, SheetRequest, Spreadsheet, UpdateValuesResponse,
    ValueRange,
};
use crate::store::TabularDocumentStore;

/// Base URL for Google Sheets API v4.
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Formulas and locale-formatted literals are parsed as if typed by a user.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

pub struct SheetsClient {
    api: ApiClient,
    base_url: String,
}

impl SheetsClient {
    pub fn new(api: ApiClient) -> Self {
        Self::with_base_url(api, SHEETS_API_BASE)
    }

    /// Point the client at a different endpoint (used by tests).
    pub fn with_base_url(api: ApiClient, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.base_url, spreadsheet_id)
    }

    /// `.../values/<range>` with the range percent-encoded as one path segment.
    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url> {
        let base = format!("{}/values", self.spreadsheet_url(spreadsheet_id));
        let mut url = Url::parse(&base).map_err(|e| Error::InvalidUrl(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(base.clone()))?
            .push(range);
        Ok(url)
    }
}

#[async_trait]
impl TabularDocumentStore for SheetsClient {
    async fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        let url = self.spreadsheet_url(spreadsheet_id);
        let spreadsheet: Spreadsheet = self
            .api
            .send_json(|http| {
                http.get(&url)
                    .query(&[("fields", "sheets.properties(sheetId,title,index)")])
            })
            .await?;
        Ok(spreadsheet.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn copy_tab(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        destination_spreadsheet_id: &str,
    ) -> Result<SheetProperties> {
        let url = format!(
            "{}/sheets/{}:copyTo",
            self.spreadsheet_url(spreadsheet_id),
            sheet_id
        );
        let body = json!({ "destinationSpreadsheetId": destination_spreadsheet_id });
        let copied: SheetProperties = self
            .api
            .send_json(|http| http.post(&url).json(&body))
            .await?;
        info!(
            spreadsheet_id,
            sheet_id,
            destination_spreadsheet_id,
            new_sheet_id = copied.sheet_id,
            "copied sheet"
        );
        Ok(copied)
    }

    async fn apply(&self, spreadsheet_id: &str, requests: Vec<SheetRequest>) -> Result<()> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id));
        let body = json!({ "requests": requests });
        let _: Value = self
            .api
            .send_json(|http| http.post(&url).json(&body))
            .await?;
        info!(spreadsheet_id, count = requests.len(), "applied sheet requests");
        Ok(())
    }

    async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let url = self.values_url(spreadsheet_id, range)?;
        self.api
            .send_json(|http| http.get(url.clone()).query(&[("majorDimension", "ROWS")]))
            .await
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse> {
        let url = self.values_url(spreadsheet_id, range)?;
        let body = ValueRange {
            range: range.to_string(),
            values,
        };
        let response: UpdateValuesResponse = self
            .api
            .send_json(|http| {
                http.put(url.clone())
                    .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
                    .json(&body)
            })
            .await?;
        info!(spreadsheet_id, range, cells = response.updated_cells, "updated values");
        Ok(response)
    }

    async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<BatchUpdateValuesResponse> {
        let url = format!("{}/values:batchUpdate", self.spreadsheet_url(spreadsheet_id));
        let body = json!({
            "valueInputOption": VALUE_INPUT_OPTION,
            "data": data
        });
        let response: BatchUpdateValuesResponse = self
            .api
            .send_json(|http| http.post(&url).json(&body))
            .await?;
        info!(
            spreadsheet_id,
            ranges = data.len(),
            cells = response.total_updated_cells,
            "batch updated values"
        );
        Ok(response)
    }
}
