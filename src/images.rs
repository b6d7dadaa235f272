//! Reference image loading from local paths, web URLs and drive links.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use base64::Engine;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE, SET_COOKIE};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::ports::RemoteStorage;

const DRIVE_PUBLIC_DOWNLOAD: &str = "https://drive.google.com/uc?export=download";

static DRIVE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"/file/d/([a-zA-Z0-9_-]+)", r"id=([a-zA-Z0-9_-]+)", r"/open\?id=([a-zA-Z0-9_-]+)"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Where a reference image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// A file on local disk.
    Local(PathBuf),
    /// A drive link; `None` when no file id could be extracted.
    Drive(Option<String>),
    /// Any other URL.
    Web(String),
}

impl ImageReference {
    /// Classify a reference string.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        match url::Url::parse(reference) {
            Ok(url) if url.has_host() => {
                if url.host_str().is_some_and(|h| h.contains("drive.google.com")) {
                    Self::Drive(drive_file_id(reference))
                } else {
                    Self::Web(reference.to_string())
                }
            }
            _ => Self::Local(PathBuf::from(reference)),
        }
    }
}

/// Extract the file id from a drive share link.
#[must_use]
pub fn drive_file_id(url: &str) -> Option<String> {
    DRIVE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
}

/// Share link for a drive file, in a form [`drive_file_id`] understands.
#[must_use]
pub fn drive_view_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view?usp=drive_link")
}

/// Loaded image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// MIME type.
    pub mime_type: String,
}

impl SourceImage {
    /// Encode as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{encoded}", self.mime_type)
    }
}

/// Loads reference images so they can be inlined into generation requests.
pub struct ImageLoader {
    client: Client,
    storage: Option<Arc<dyn RemoteStorage>>,
}

impl ImageLoader {
    /// Create a loader; drive links use `storage` first when present.
    #[must_use]
    pub fn new(storage: Option<Arc<dyn RemoteStorage>>) -> Self {
        Self { client: Client::new(), storage }
    }

    /// Load one reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference cannot be read or is not an image.
    pub async fn load(&self, reference: &str) -> Result<SourceImage, PipelineError> {
        match ImageReference::parse(reference) {
            ImageReference::Local(path) => load_local(&path).await,
            ImageReference::Drive(Some(id)) => self.load_drive(&id).await,
            ImageReference::Drive(None) => Err(PipelineError::ImageSource(format!(
                "Could not parse drive file id from {reference}"
            ))),
            ImageReference::Web(url) => self.load_web(&url).await,
        }
    }

    async fn load_drive(&self, file_id: &str) -> Result<SourceImage, PipelineError> {
        if let Some(ref storage) = self.storage {
            match storage.download(file_id).await {
                Ok(data) => {
                    let mime_type = sniff_mime(&data);
                    return Ok(SourceImage { data, mime_type });
                }
                Err(e) => {
                    warn!(file_id, error = %e, "Drive API download failed; trying public link");
                }
            }
        }

        debug!(file_id, "Downloading drive file via public link");
        let response =
            self.client.get(DRIVE_PUBLIC_DOWNLOAD).query(&[("id", file_id)]).send().await?;
        let response = match confirm_token(response.headers()) {
            Some(token) => {
                self.client
                    .get(DRIVE_PUBLIC_DOWNLOAD)
                    .query(&[("id", file_id), ("confirm", token.as_str())])
                    .send()
                    .await?
            }
            None => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Public drive download failed for {file_id}"),
            });
        }
        let data = response.bytes().await?.to_vec();
        let mime_type = sniff_mime(&data);
        Ok(SourceImage { data, mime_type })
    }

    async fn load_web(&self, url: &str) -> Result<SourceImage, PipelineError> {
        let head = self.client.head(url).send().await?;
        let content_type = header_mime(head.headers()).unwrap_or_default();
        if !content_type.contains("image") {
            let mut message = format!("{url} does not appear to be an image (Content-Type: {content_type})");
            if url.contains("postimg.cc") && !url.contains("i.postimg.cc") {
                message.push_str("; use the direct i.postimg.cc image address");
            }
            return Err(PipelineError::ImageSource(message));
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Failed to download {url}"),
            });
        }
        let mime_type = header_mime(response.headers()).unwrap_or(content_type);
        let data = response.bytes().await?.to_vec();
        Ok(SourceImage { data, mime_type })
    }
}

async fn load_local(path: &Path) -> Result<SourceImage, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::ImageSource(format!("File not found: {}", path.display())));
    }
    let data = tokio::fs::read(path).await?;
    let mime_type = mime_guess::from_path(path)
        .first()
        .map_or_else(|| sniff_mime(&data), |m| m.essence_str().to_string());
    Ok(SourceImage { data, mime_type })
}

fn sniff_mime(data: &[u8]) -> String {
    image::guess_format(data)
        .map_or_else(|_| "application/octet-stream".to_string(), |f| f.to_mime_type().to_string())
}

fn header_mime(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
}

/// Drive answers large public downloads with a virus-scan interstitial and a
/// `download_warning*` cookie whose value confirms the download.
fn confirm_token(headers: &HeaderMap) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()).find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        key.trim().starts_with("download_warning").then(|| value.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;
    use crate::testing::{tiny_png, FakeStorage};

    #[test]
    fn classify_references() {
        assert_eq!(
            ImageReference::parse("https://drive.google.com/file/d/19lwb1fYk2B15N7Y8vJW3LvfSmjz-YuNb/view?usp=drive_link"),
            ImageReference::Drive(Some("19lwb1fYk2B15N7Y8vJW3LvfSmjz-YuNb".into()))
        );
        assert_eq!(
            ImageReference::parse("https://i.postimg.cc/d16QV3VC/Comfy-UI-00119.png"),
            ImageReference::Web("https://i.postimg.cc/d16QV3VC/Comfy-UI-00119.png".into())
        );
        assert_eq!(
            ImageReference::parse("input/face.png"),
            ImageReference::Local(PathBuf::from("input/face.png"))
        );
        assert_eq!(
            ImageReference::parse("C:\\input\\face.png"),
            ImageReference::Local(PathBuf::from("C:\\input\\face.png"))
        );
    }

    #[test]
    fn drive_id_patterns() {
        assert_eq!(drive_file_id("https://drive.google.com/open?id=abc_123").as_deref(), Some("abc_123"));
        assert_eq!(
            drive_file_id("https://drive.google.com/uc?export=download&id=X-y").as_deref(),
            Some("X-y")
        );
        assert_eq!(drive_file_id("https://drive.google.com/drive/my-drive"), None);
        assert_eq!(drive_file_id(&drive_view_url("f1")).as_deref(), Some("f1"));
    }

    #[test]
    fn data_url_encoding() {
        let image = SourceImage { data: vec![1, 2, 3], mime_type: "image/png".into() };
        assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn confirm_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("NID=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("download_warning_123=t0k3n; Path=/"));
        assert_eq!(confirm_token(&headers).as_deref(), Some("t0k3n"));
        assert_eq!(confirm_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn local_file_loads_with_extension_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let loader = ImageLoader::new(None);
        let image = loader.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert!(image.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn missing_local_file_fails() {
        let loader = ImageLoader::new(None);
        let err = loader.load("/nonexistent/face.png").await.unwrap_err();
        assert!(matches!(err, PipelineError::ImageSource(_)));
    }

    #[tokio::test]
    async fn drive_link_uses_storage_and_sniffs_mime() {
        let storage = FakeStorage::default().with_file("f1", tiny_png());
        let loader = ImageLoader::new(Some(Arc::new(storage)));
        let image = loader.load(&drive_view_url("f1")).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
    }
}
