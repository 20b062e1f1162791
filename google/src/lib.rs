//! Google Sheets and Drive clients used by the back office.
//!
//! The capability traits below are what the rest of the workspace depends on;
//! `SheetsClient` and `DriveClient` implement them against the REST APIs.

pub mod auth;
pub mod config;
pub mod drive;
pub mod errors;
pub mod sheets;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use auth::Authenticator;
pub use config::GoogleConfig;
pub use drive::DriveClient;
pub use errors::GoogleError;
pub use sheets::SheetsClient;

#[derive(Clone, Debug, PartialEq)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

/// A sheet as stored: the header row and every row below it.
///
/// Rows are padded to the header width, so missing trailing cells read as "".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub thumbnail_link: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileContent {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Supplies bearer tokens for API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, GoogleError>;
}

/// Read access to the spreadsheet.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Lists the sheets of the spreadsheet. Fails when the spreadsheet
    /// itself cannot be opened.
    async fn sheets(&self) -> Result<Vec<SheetProperties>, GoogleError>;

    async fn load_sheet(&self, title: &str) -> Result<SheetData, GoogleError>;
}

/// Row level writes.
#[async_trait]
pub trait SheetWriter: Send + Sync {
    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<(), GoogleError>;

    /// Overwrites the row at the 1-based `row_number` (the header is row 1).
    async fn update_row(
        &self,
        title: &str,
        row_number: usize,
        values: Vec<String>,
    ) -> Result<(), GoogleError>;

    /// Removes the row at the 0-based `row_index` (the header is index 0).
    async fn delete_row(&self, sheet_id: i64, row_index: usize) -> Result<(), GoogleError>;
}

/// File listing and metadata lookup.
#[async_trait]
pub trait FileCatalog: Send + Sync {
    async fn list_files(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FilePage, GoogleError>;

    async fn file_metadata(&self, id: &str) -> Result<DriveFile, GoogleError>;
}

/// File content storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<DriveFile, GoogleError>;

    async fn download(&self, id: &str) -> Result<FileContent, GoogleError>;
}

/// HTTP client plus the token source every request is signed with.
#[derive(Clone)]
pub(crate) struct ApiClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub(crate) fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        ApiClient { http, tokens }
    }

    pub(crate) async fn request(
        &self,
        method: reqwest::Method,
        url: Url,
    ) -> Result<reqwest::RequestBuilder, GoogleError> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

/// Appends percent-encoded path segments to an API base URL.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, GoogleError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            GoogleError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Every Google capability built from one config.
#[derive(Clone)]
pub struct Google {
    pub tokens: Arc<Authenticator>,
    pub sheets: Arc<SheetsClient>,
    pub drive: Arc<DriveClient>,
}

impl Google {
    pub fn new(config: &GoogleConfig) -> Result<Self, GoogleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let tokens = Arc::new(Authenticator::new(
            http.clone(),
            config.endpoints.token_url.clone(),
            config.credentials.clone(),
        ));
        let api = ApiClient::new(http, tokens.clone());

        Ok(Google {
            tokens,
            sheets: Arc::new(SheetsClient::new(
                api.clone(),
                config.endpoints.sheets_url.clone(),
                config.spreadsheet_id.clone(),
            )),
            drive: Arc::new(DriveClient::new(
                api,
                config.endpoints.drive_url.clone(),
                config.upload_folder_id.clone(),
            )),
        })
    }
}
