//! Live remote storage backed by the Google Drive v3 API.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{checked_text, parse_json, truncate};
use crate::error::PipelineError;
use crate::ports::{PortFuture, RemoteFile, RemoteStorage};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const MULTIPART_BOUNDARY: &str = "nanogen-upload-boundary";

/// Drive client authorized with an OAuth access token.
pub struct DriveStorage {
    client: Client,
    access_token: String,
}

impl DriveStorage {
    /// Create a client using `access_token` as the bearer credential.
    #[must_use]
    pub fn new(access_token: String) -> Self {
        Self { client: Client::new(), access_token }
    }
}

fn folder_query(folder_id: &str) -> String {
    format!("'{folder_id}' in parents and mimeType contains 'image/' and trashed = false")
}

/// A `multipart/related` body: JSON metadata, then the file bytes.
fn multipart_body(metadata: &serde_json::Value, mime_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{MULTIPART_BOUNDARY}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

impl RemoteStorage for DriveStorage {
    fn list_images(&self, folder_id: &str) -> PortFuture<'_, Vec<RemoteFile>> {
        let query = folder_query(folder_id);
        Box::pin(async move {
            let mut files = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .get(DRIVE_FILES_URL)
                    .bearer_auth(&self.access_token)
                    .query(&[("q", query.as_str()), ("fields", "nextPageToken, files(id, name)")]);
                if let Some(ref token) = page_token {
                    request = request.query(&[("pageToken", token.as_str())]);
                }
                let page: FileList = parse_json(&checked_text(request.send().await?).await?)?;
                files.extend(page.files);
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            debug!(count = files.len(), "Listed drive folder");
            Ok(files)
        })
    }

    fn rename(&self, file_id: &str, new_name: &str) -> PortFuture<'_, ()> {
        let url = format!("{DRIVE_FILES_URL}/{file_id}");
        let body = json!({ "name": new_name });
        Box::pin(async move {
            let response =
                self.client.patch(&url).bearer_auth(&self.access_token).json(&body).send().await?;
            checked_text(response).await?;
            Ok(())
        })
    }

    fn download(&self, file_id: &str) -> PortFuture<'_, Vec<u8>> {
        let url = format!("{DRIVE_FILES_URL}/{file_id}");
        Box::pin(async move {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("alt", "media")])
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(PipelineError::Api { status: status.as_u16(), message: truncate(&message) });
            }
            Ok(response.bytes().await?.to_vec())
        })
    }

    fn upload(
        &self,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
        folder_id: &str,
    ) -> PortFuture<'_, String> {
        let metadata = json!({ "name": name, "parents": [folder_id] });
        let body = multipart_body(&metadata, mime_type, &data);
        Box::pin(async move {
            let response = self
                .client
                .post(DRIVE_UPLOAD_URL)
                .bearer_auth(&self.access_token)
                .query(&[("uploadType", "multipart"), ("fields", "id")])
                .header(
                    reqwest::header::CONTENT_TYPE,
                    format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
                )
                .body(body)
                .send()
                .await?;
            let created: CreatedFile = parse_json(&checked_text(response).await?)?;
            Ok(created.id)
        })
    }
}

// --- Drive API response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_query_filters_images() {
        assert_eq!(
            folder_query("abc"),
            "'abc' in parents and mimeType contains 'image/' and trashed = false"
        );
    }

    #[test]
    fn multipart_layout() {
        let body = multipart_body(&json!({"name": "a.png"}), "image/png", b"PNGDATA");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--nanogen-upload-boundary\r\nContent-Type: application/json"));
        assert!(text.contains(r#"{"name":"a.png"}"#));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNGDATA\r\n"));
        assert!(text.ends_with("--nanogen-upload-boundary--\r\n"));
    }

    #[test]
    fn file_list_parsing() {
        let page: FileList = parse_json(
            r#"{"nextPageToken":"p2","files":[{"id":"1","name":"a.png"},{"id":"2","name":"used_b.png"}]}"#,
        )
        .unwrap();
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
    }
}
