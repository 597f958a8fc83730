//! Collaborator contracts: the query layer, the file store and the notifier.
//!
//! The pipeline never performs I/O itself; it goes through these traits.
//! Errors carry a platform `code` and a human `detail`, which is the pair
//! logged and written to the run receipt.

use std::fmt;

use auditlog_types::{AuditType, RawAuditEntry};

/// A failure to select entries, or to read one entry of the selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("query error {code}: {detail}")]
pub struct QueryError {
    pub code: String,
    pub detail: String,
}

/// The report file could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage error {code}: {detail}")]
pub struct StorageError {
    pub code: String,
    pub detail: String,
}

/// The notification could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification error {code}: {detail}")]
pub struct NotificationError {
    pub code: String,
    pub detail: String,
}

impl QueryError {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}

impl StorageError {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}

impl NotificationError {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}

/// Lazy sequence of selected entries. A per-item error skips that item.
pub type EntryStream = Box<dyn Iterator<Item = Result<RawAuditEntry, QueryError>> + Send>;

pub trait QuerySelector {
    /// Select the change-log entries for `audit_type`.
    ///
    /// Every yielded entry must carry `audit_type`.
    fn select(&self, audit_type: AuditType) -> Result<EntryStream, QueryError>;
}

/// Opaque identifier of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(pub String);

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait FileStore {
    fn store(&self, bytes: &[u8], file_name: &str, folder_id: u64)
    -> Result<FileHandle, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub handle: FileHandle,
    pub bytes: Vec<u8>,
}

/// One outbound report notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub author_id: u64,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body_html: String,
    pub attachments: Vec<Attachment>,
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}
