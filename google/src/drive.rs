//! Drive v3 client: image listing, metadata, uploads and downloads.

use crate::errors::{GoogleError, check_status};
use crate::{ApiClient, DriveFile, FileCatalog, FileContent, FilePage, FileStore, join_segments};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

const FILE_FIELDS: &str = "id,thumbnailLink";
const LIST_FIELDS: &str = "nextPageToken,files(id,thumbnailLink)";
const BOUNDARY_PREFIX: &str = "studio-upload-";

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn boundary_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ BOUNDARY_COUNTER
        .fetch_add(1, Ordering::Relaxed)
        .rotate_left(32)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// First boundary, counting up from `seed`, that occurs in none of `parts`.
fn pick_boundary(seed: u64, parts: &[&[u8]]) -> String {
    let mut candidate = seed;
    loop {
        let boundary = format!("{BOUNDARY_PREFIX}{candidate:016x}");
        if !parts.iter().any(|part| contains(part, boundary.as_bytes())) {
            return boundary;
        }
        candidate = candidate.wrapping_add(1);
    }
}

fn multipart_body(boundary: &str, metadata: &str, content_type: &str, bytes: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(bytes.len() + metadata.len() + 256);
    body.put_slice(format!("--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata.as_bytes());
    body.put_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.put_slice(bytes);
    body.put_slice(format!("\r\n--{boundary}--").as_bytes());
    body.freeze()
}

pub struct DriveClient {
    api: ApiClient,
    base_url: Url,
    upload_folder_id: Option<String>,
}

impl DriveClient {
    pub(crate) fn new(api: ApiClient, base_url: Url, upload_folder_id: Option<String>) -> Self {
        DriveClient {
            api,
            base_url,
            upload_folder_id,
        }
    }

    fn files_endpoint(&self, segments: &[&str]) -> Result<Url, GoogleError> {
        let mut path = vec!["drive", "v3", "files"];
        path.extend_from_slice(segments);
        join_segments(&self.base_url, &path)
    }

    /// Makes the file readable by anyone holding the link, which is what
    /// lets the public website render its thumbnail.
    async fn share_publicly(&self, id: &str) -> Result<(), GoogleError> {
        let url = self.files_endpoint(&[id, "permissions"])?;
        let response = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> Result<(), GoogleError> {
        let url = self.files_endpoint(&[id])?;
        let response = self.api.request(Method::DELETE, url).await?.send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn upload_metadata(&self, name: &str, content_type: &str) -> String {
        let mut metadata = json!({ "name": name, "mimeType": content_type });
        if let Some(folder) = &self.upload_folder_id {
            metadata["parents"] = json!([folder]);
        }
        metadata.to_string()
    }
}

#[async_trait]
impl FileCatalog for DriveClient {
    async fn list_files(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<FilePage, GoogleError> {
        let mut url = self.files_endpoint(&[])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("pageSize", &page_size.to_string())
                .append_pair("fields", LIST_FIELDS);
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        let response = self.api.request(Method::GET, url).await?.send().await?;
        Ok(check_status(response).await?.json::<FilePage>().await?)
    }

    async fn file_metadata(&self, id: &str) -> Result<DriveFile, GoogleError> {
        let mut url = self.files_endpoint(&[id])?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);

        let response = self.api.request(Method::GET, url).await?.send().await?;
        Ok(check_status(response).await?.json::<DriveFile>().await?)
    }
}

#[async_trait]
impl FileStore for DriveClient {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<DriveFile, GoogleError> {
        let mut url = join_segments(&self.base_url, &["upload", "drive", "v3", "files"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", FILE_FIELDS);

        let metadata = self.upload_metadata(name, content_type);
        let boundary = pick_boundary(boundary_seed(), &[metadata.as_bytes(), bytes.as_ref()]);

        let response = self
            .api
            .request(Method::POST, url)
            .await?
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(multipart_body(&boundary, &metadata, content_type, &bytes))
            .send()
            .await?;
        let file = check_status(response).await?.json::<DriveFile>().await?;

        // Unshared uploads are removed.
        if let Err(e) = self.share_publicly(&file.id).await {
            tracing::warn!(file_id = %file.id, error = %e, "Could not share uploaded image, removing it");
            if let Err(cleanup) = self.delete_file(&file.id).await {
                tracing::error!(file_id = %file.id, error = %cleanup, "Could not remove unshared image");
            }
            return Err(e);
        }

        tracing::info!(file_id = %file.id, size = bytes.len(), "Uploaded image");
        Ok(file)
    }

    async fn download(&self, id: &str) -> Result<FileContent, GoogleError> {
        let mut url = self.files_endpoint(&[id])?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.api.request(Method::GET, url).await?.send().await?;
        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?;

        Ok(FileContent {
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Authenticator;
    use crate::config::Credentials;
    use std::sync::Arc;
    use wiremock::matchers::{
        body_json, body_string_contains, header_regex, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, folder: Option<&str>) -> DriveClient {
        let http = reqwest::Client::new();
        let tokens = Arc::new(Authenticator::new(
            http.clone(),
            Url::parse("http://unused.invalid/token").unwrap(),
            Credentials::AccessToken {
                token: "test-token".into(),
            },
        ));
        DriveClient::new(
            ApiClient::new(http, tokens),
            Url::parse(&server.uri()).unwrap(),
            folder.map(String::from),
        )
    }

    #[tokio::test]
    async fn test_list_files_with_page_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "trashed = false"))
            .and(query_param("pageSize", "1000"))
            .and(query_param("pageToken", "page-2"))
            .and(query_param("fields", LIST_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [
                    {"id": "a", "thumbnailLink": "https://lh3.googleusercontent.com/a=s220"},
                    {"id": "b"}
                ],
                "nextPageToken": "page-3"
            })))
            .mount(&mock_server)
            .await;

        let page = client(&mock_server, None)
            .list_files("trashed = false", Some("page-2"), 1000)
            .await
            .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("page-3"));
        assert_eq!(page.files.len(), 2);
        assert_eq!(
            page.files[0].thumbnail_link.as_deref(),
            Some("https://lh3.googleusercontent.com/a=s220")
        );
        assert_eq!(page.files[1].thumbnail_link, None);
    }

    #[tokio::test]
    async fn test_file_metadata_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "File not found: gone."}
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server, None)
            .file_metadata("gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{err:?}");
    }

    #[tokio::test]
    async fn test_upload_shares_file() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(header_regex(
                "content-type",
                "^multipart/related; boundary=studio-upload-[0-9a-f]{16}$",
            ))
            .and(body_string_contains(r#""parents":["folder-9"]"#))
            .and(body_string_contains("PNGDATA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-file"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files/new-file/permissions"))
            .and(body_json(json!({"role": "reader", "type": "anyone"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "anyoneWithLink"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let file = client(&mock_server, Some("folder-9"))
            .upload("shoot.png", "image/png", Bytes::from_static(b"PNGDATA"))
            .await
            .unwrap();
        assert_eq!(file.id, "new-file");
        assert_eq!(file.thumbnail_link, None);
    }

    #[tokio::test]
    async fn test_upload_removes_file_when_sharing_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-file"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files/new-file/permissions"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Sharing is disabled."}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/new-file"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client(&mock_server, None)
            .upload("shoot.png", "image/png", Bytes::from_static(b"PNGDATA"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, GoogleError::PermissionDenied(ref message) if message == "Sharing is disabled."),
            "{err:?}"
        );
    }

    #[test]
    fn test_boundary_avoids_payload() {
        assert_eq!(
            pick_boundary(7, &[&b"{}"[..], &b"PNGDATA"[..]]),
            "studio-upload-0000000000000007"
        );

        let image = b"\x89PNG--studio-upload-0000000000000007\r\n";
        assert_eq!(
            pick_boundary(7, &[&b"{}"[..], &image[..]]),
            "studio-upload-0000000000000008"
        );
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("b1", r#"{"name":"x"}"#, "image/png", b"DATA");
        assert_eq!(
            &body[..],
            b"--b1\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"x\"}\r\n--b1\r\nContent-Type: image/png\r\n\r\nDATA\r\n--b1--"
        );
    }

    #[tokio::test]
    async fn test_download() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files/img-1"))
            .and(query_param("alt", "media"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(b"JPEGDATA".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let content = client(&mock_server, None).download("img-1").await.unwrap();
        assert_eq!(content.content_type, "image/jpeg");
        assert_eq!(content.bytes, Bytes::from_static(b"JPEGDATA"));
    }
}
