//! Revocable local handle to the viewable contract file.
//!
//! The downloaded bytes live in a temporary file for as long as the handle
//! is held. Revocation removes the file; it happens once, either through
//! `revoke` or when the handle is dropped.

use std::path::Path;

use cra_core::Result;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct DocumentHandle {
    id: Uuid,
    content_type: Option<String>,
    len: usize,
    file: Option<NamedTempFile>,
}

impl DocumentHandle {
    /// Write `bytes` to a fresh temporary file.
    pub fn create(bytes: &[u8], content_type: Option<String>) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("cra-document-")
            .tempfile()?;
        std::io::Write::write_all(&mut file, bytes)?;
        let id = Uuid::new_v4();
        debug!("Created document handle {} ({} bytes)", id, bytes.len());
        Ok(Self {
            id,
            content_type,
            len: bytes.len(),
            file: Some(file),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Local path of the previewable file.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path())
    }

    /// Release the file now. Consumes the handle so it cannot be revoked twice.
    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => debug!("Revoked document handle {}", self.id),
                Err(e) => warn!("Failed to remove document {}: {}", self.id, e),
            }
        }
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.release();
    }
}
