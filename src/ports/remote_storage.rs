//! Remote storage port: cloud-drive folders used for sourcing and uploads.

use serde::{Deserialize, Serialize};

use super::PortFuture;

/// A file in a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Storage-service file id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Folder-based remote file storage.
pub trait RemoteStorage: Send + Sync {
    /// List image files directly inside a folder.
    fn list_images(&self, folder_id: &str) -> PortFuture<'_, Vec<RemoteFile>>;

    /// Rename a file.
    fn rename(&self, file_id: &str, new_name: &str) -> PortFuture<'_, ()>;

    /// Download a file's contents.
    fn download(&self, file_id: &str) -> PortFuture<'_, Vec<u8>>;

    /// Upload a file into a folder, returning the new file id.
    fn upload(
        &self,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
        folder_id: &str,
    ) -> PortFuture<'_, String>;
}
