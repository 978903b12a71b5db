//! Object URLs for compiled modules

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::LoaderConfig;

/// `URL.createObjectURL` / `URL.revokeObjectURL` for module code.
pub trait BlobStore {
    fn create_object_url(&self, contents: &str, mime_type: &str) -> String;
    fn revoke_object_url(&self, url: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub contents: Rc<str>,
}

/// In-process blob registry issuing `blob:<origin>/<n>` URLs.
#[derive(Debug)]
pub struct MemoryBlobStore {
    origin: String,
    next_id: Cell<u64>,
    blobs: RefCell<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            next_id: Cell::new(1),
            blobs: RefCell::new(HashMap::new()),
        }
    }

    /// Store using the configured `blobOrigin`.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(config.blob_origin.clone())
    }

    pub fn get(&self, url: &str) -> Option<Blob> {
        self.blobs.borrow().get(url).cloned()
    }

    /// Number of live (not revoked) object URLs.
    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("null")
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_object_url(&self, contents: &str, mime_type: &str) -> String {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let url = format!("blob:{}/{:08x}", self.origin, id);
        self.blobs.borrow_mut().insert(
            url.clone(),
            Blob {
                mime_type: mime_type.to_string(),
                contents: Rc::from(contents),
            },
        );
        url
    }

    fn revoke_object_url(&self, url: &str) {
        self.blobs.borrow_mut().remove(url);
    }
}
