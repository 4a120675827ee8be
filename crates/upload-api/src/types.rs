//! Session and credential types.

/// A backend upload session.
///
/// Deliberately not `Clone`: finalizing consumes the session, so a second
/// completion request for the same `upload_id` cannot be expressed.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadSession {
    upload_id: String,
    storage_key: String,
}

impl UploadSession {
    pub fn new(upload_id: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            storage_key: storage_key.into(),
        }
    }

    /// Opaque session identifier (`upload_id` on the wire).
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Object key of the assembled file (`s3_key` on the wire).
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Consumes the session, returning its storage key.
    pub fn into_storage_key(self) -> String {
        self.storage_key
    }
}

/// Presigned URL authorizing exactly one PUT of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartCredential {
    pub part_number: u32,
    pub upload_url: String,
}
