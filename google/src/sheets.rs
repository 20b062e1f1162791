//! Sheets v4 client. The spreadsheet is used as a table store: the first row
//! of every sheet holds the headers, every following row is one record.

use crate::errors::{GoogleError, check_status};
use crate::{ApiClient, SheetData, SheetProperties, SheetSource, SheetWriter, join_segments};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

#[derive(Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetEntryProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetEntryProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A1 range covering a whole sheet.
fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<ValueRange> for SheetData {
    fn from(range: ValueRange) -> Self {
        let mut rows = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>());

        let headers = rows.next().unwrap_or_default();
        let width = headers.len();
        let rows = rows
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        SheetData { headers, rows }
    }
}

pub struct SheetsClient {
    api: ApiClient,
    base_url: Url,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub(crate) fn new(api: ApiClient, base_url: Url, spreadsheet_id: String) -> Self {
        SheetsClient {
            api,
            base_url,
            spreadsheet_id,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GoogleError> {
        let mut path = vec!["v4", "spreadsheets"];
        path.extend_from_slice(segments);
        join_segments(&self.base_url, &path)
    }

    fn values_endpoint(&self, range: &str) -> Result<Url, GoogleError> {
        self.endpoint(&[self.spreadsheet_id.as_str(), "values", range])
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn sheets(&self) -> Result<Vec<SheetProperties>, GoogleError> {
        let mut url = self.endpoint(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");

        let response = self.api.request(Method::GET, url).await?.send().await?;
        let spreadsheet = check_status(response)
            .await?
            .json::<SpreadsheetResponse>()
            .await?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|entry| SheetProperties {
                sheet_id: entry.properties.sheet_id,
                title: entry.properties.title,
            })
            .collect())
    }

    async fn load_sheet(&self, title: &str) -> Result<SheetData, GoogleError> {
        let url = self.values_endpoint(&sheet_range(title))?;

        let response = self.api.request(Method::GET, url).await?.send().await?;
        let range = check_status(response).await?.json::<ValueRange>().await?;

        Ok(range.into())
    }
}

#[async_trait]
impl SheetWriter for SheetsClient {
    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<(), GoogleError> {
        let mut url = self.values_endpoint(&format!("{}:append", sheet_range(title)))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!(sheet = title, "Appended row");
        Ok(())
    }

    async fn update_row(
        &self,
        title: &str,
        row_number: usize,
        values: Vec<String>,
    ) -> Result<(), GoogleError> {
        let range = format!("{}!A{row_number}", sheet_range(title));
        let mut url = self.values_endpoint(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values],
        });

        let response = self
            .api
            .request(Method::PUT, url)
            .await?
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!(sheet = title, row_number, "Updated row");
        Ok(())
    }

    async fn delete_row(&self, sheet_id: i64, row_index: usize) -> Result<(), GoogleError> {
        let url = self.endpoint(&[format!("{}:batchUpdate", self.spreadsheet_id).as_str()])?;

        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row_index,
                        "endIndex": row_index + 1,
                    }
                }
            }]
        });

        let response = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;

        tracing::debug!(sheet_id, row_index, "Deleted row");
        Ok(())
    }
}
