//! In-memory stand-ins for the Google capabilities.

use async_trait::async_trait;
use bytes::Bytes;
use google::{
    DriveFile, FileCatalog, FileContent, FilePage, FileStore, GoogleError, SheetData,
    SheetProperties, SheetSource, SheetWriter, TokenSource,
};
use http::StatusCode;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn server_error(message: &str) -> GoogleError {
    GoogleError::Api {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetWrite {
    Append(String, Vec<String>),
    Update(String, usize, Vec<String>),
    Delete(i64, usize),
}

#[derive(Default)]
pub struct FakeSheets {
    // None marks a sheet that exists but fails to load.
    sheets: IndexMap<String, Option<SheetData>>,
    unauthorized: bool,
    loaded: Mutex<Vec<String>>,
    writes: Mutex<Vec<SheetWrite>>,
}

impl FakeSheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, title: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        let data = SheetData {
            headers: strings(headers),
            rows: rows.iter().map(|row| strings(row)).collect(),
        };
        self.sheets.insert(title.into(), Some(data));
        self
    }

    pub fn with_failing_sheet(mut self, title: &str) -> Self {
        self.sheets.insert(title.into(), None);
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<SheetWrite> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetSource for FakeSheets {
    async fn sheets(&self) -> Result<Vec<SheetProperties>, GoogleError> {
        if self.unauthorized {
            return Err(GoogleError::Auth("invalid credentials".into()));
        }
        Ok(self
            .sheets
            .keys()
            .enumerate()
            .map(|(i, title)| SheetProperties {
                sheet_id: 100 + i as i64,
                title: title.clone(),
            })
            .collect())
    }

    async fn load_sheet(&self, title: &str) -> Result<SheetData, GoogleError> {
        self.loaded.lock().unwrap().push(title.to_string());
        match self.sheets.get(title) {
            Some(Some(data)) => Ok(data.clone()),
            Some(None) => Err(server_error("backend error")),
            None => Err(GoogleError::Api {
                status: StatusCode::BAD_REQUEST,
                message: format!("Unable to parse range: '{title}'"),
            }),
        }
    }
}

#[async_trait]
impl SheetWriter for FakeSheets {
    async fn append_row(&self, title: &str, values: Vec<String>) -> Result<(), GoogleError> {
        self.writes
            .lock()
            .unwrap()
            .push(SheetWrite::Append(title.into(), values));
        Ok(())
    }

    async fn update_row(
        &self,
        title: &str,
        row_number: usize,
        values: Vec<String>,
    ) -> Result<(), GoogleError> {
        self.writes
            .lock()
            .unwrap()
            .push(SheetWrite::Update(title.into(), row_number, values));
        Ok(())
    }

    async fn delete_row(&self, sheet_id: i64, row_index: usize) -> Result<(), GoogleError> {
        self.writes
            .lock()
            .unwrap()
            .push(SheetWrite::Delete(sheet_id, row_index));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDrive {
    pages: Vec<Vec<DriveFile>>,
    metadata: HashMap<String, DriveFile>,
    contents: HashMap<String, FileContent>,
    fail_list_after: Option<usize>,
    blank_page_tokens: bool,
    list_calls: AtomicUsize,
    metadata_calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, String, usize)>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, files: &[(&str, Option<&str>)]) -> Self {
        self.pages.push(
            files
                .iter()
                .map(|(id, link)| DriveFile {
                    id: id.to_string(),
                    thumbnail_link: link.map(String::from),
                })
                .collect(),
        );
        self
    }

    pub fn with_metadata(mut self, id: &str, link: Option<&str>) -> Self {
        self.metadata.insert(
            id.into(),
            DriveFile {
                id: id.into(),
                thumbnail_link: link.map(String::from),
            },
        );
        self
    }

    pub fn with_content(mut self, id: &str, content_type: &str, bytes: &'static [u8]) -> Self {
        self.contents.insert(
            id.into(),
            FileContent {
                content_type: content_type.into(),
                bytes: Bytes::from_static(bytes),
            },
        );
        self
    }

    /// Every listing call after the first `pages` fails.
    pub fn failing_list_after(mut self, pages: usize) -> Self {
        self.fail_list_after = Some(pages);
        self
    }

    /// Pages that have a successor report `""` instead of a usable token.
    pub fn with_blank_page_tokens(mut self) -> Self {
        self.blank_page_tokens = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> Vec<String> {
        self.metadata_calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileCatalog for FakeDrive {
    async fn list_files(
        &self,
        _query: &str,
        page_token: Option<&str>,
        _page_size: u32,
    ) -> Result<FilePage, GoogleError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_after.is_some_and(|after| call >= after) {
            return Err(server_error("listing failed"));
        }

        let index = page_token
            .and_then(|token| token.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        let next_page_token = (index + 1 < self.pages.len()).then(|| {
            if self.blank_page_tokens {
                String::new()
            } else {
                format!("page-{}", index + 1)
            }
        });

        Ok(FilePage {
            files: self.pages.get(index).cloned().unwrap_or_default(),
            next_page_token,
        })
    }

    async fn file_metadata(&self, id: &str) -> Result<DriveFile, GoogleError> {
        self.metadata_calls.lock().unwrap().push(id.to_string());
        self.metadata
            .get(id)
            .cloned()
            .ok_or_else(|| GoogleError::NotFound(format!("File not found: {id}")))
    }
}

#[async_trait]
impl FileStore for FakeDrive {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<DriveFile, GoogleError> {
        self.uploads
            .lock()
            .unwrap()
            .push((name.into(), content_type.into(), bytes.len()));
        Ok(DriveFile {
            id: "uploaded-1".into(),
            thumbnail_link: Some("http://lh3.test/uploaded=s220".into()),
        })
    }

    async fn download(&self, id: &str) -> Result<FileContent, GoogleError> {
        self.contents
            .get(id)
            .cloned()
            .ok_or_else(|| GoogleError::NotFound(format!("File not found: {id}")))
    }
}

pub struct FakeTokens {
    pub valid: bool,
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn access_token(&self) -> Result<String, GoogleError> {
        if self.valid {
            Ok("token".into())
        } else {
            Err(GoogleError::Auth("invalid_grant: Token has been expired or revoked.".into()))
        }
    }
}
