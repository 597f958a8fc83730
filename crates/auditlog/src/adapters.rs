//! File-backed collaborators for the command line.
//!
//! - [`JsonLinesSelector`] reads raw entries from a JSON-lines export
//! - [`DirectoryStore`] writes report files under `<out>/folders/<id>/`
//! - [`OutboxNotifier`] drops each notification into `<out>/outbox/`

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use auditlog_core::{
    EntryStream, FileHandle, FileStore, Notification, NotificationError, Notifier, QueryError,
    QuerySelector, StorageError,
};
use auditlog_types::{AuditType, RawAuditEntry, RawField};

/// Error code for a line that is not a valid entry.
pub const CODE_INVALID_ENTRY: &str = "INVALID_ENTRY";
/// Error code for an entries file that cannot be read.
pub const CODE_READ_ERROR: &str = "READ_ERROR";

/// Search export ids come out as strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryId {
    Text(String),
    Number(serde_json::Number),
}

/// One line of an entries file.
///
/// `audit_type` is optional; entries without one belong to the query.
#[derive(Debug, Deserialize)]
struct EntryLine {
    id: EntryId,
    #[serde(default)]
    audit_type: Option<AuditType>,
    #[serde(default)]
    values: BTreeMap<String, RawField>,
}

impl EntryLine {
    fn into_entry(self, query_type: AuditType) -> RawAuditEntry {
        let id = match self.id {
            EntryId::Text(s) => s,
            EntryId::Number(n) => n.to_string(),
        };
        RawAuditEntry {
            audit_type: self.audit_type.unwrap_or(query_type),
            id,
            values: self.values,
        }
    }
}

/// Parse one non-blank line of an entries file.
pub fn parse_entry_line(
    line: &str,
    line_no: usize,
    query_type: AuditType,
) -> Result<RawAuditEntry, QueryError> {
    serde_json::from_str::<EntryLine>(line)
        .map(|l| l.into_entry(query_type))
        .map_err(|e| QueryError::new(CODE_INVALID_ENTRY, format!("line {line_no}: {e}")))
}

/// Query selector over a JSON-lines file, one raw entry per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSelector {
    path: PathBuf,
}

impl JsonLinesSelector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuerySelector for JsonLinesSelector {
    fn select(&self, audit_type: AuditType) -> Result<EntryStream, QueryError> {
        let file = File::open(&self.path).map_err(|e| {
            QueryError::new(
                CODE_READ_ERROR,
                format!("open entries '{}': {e}", self.path.display()),
            )
        })?;
        debug!(path = %self.path.display(), audit_type = audit_type.as_str(), "selecting entries");

        let lines = BufReader::new(file).lines().enumerate();
        Ok(Box::new(lines.filter_map(move |(idx, line)| {
            let line_no = idx + 1;
            match line {
                Ok(text) if text.trim().is_empty() => None,
                Ok(text) => Some(parse_entry_line(&text, line_no, audit_type)),
                Err(e) => Some(Err(QueryError::new(
                    CODE_READ_ERROR,
                    format!("line {line_no}: {e}"),
                ))),
            }
        })))
    }
}

fn io_code(err: &io::Error) -> String {
    format!("{:?}", err.kind())
}

/// File store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute location of a handle returned by [`FileStore::store`].
    pub fn resolve(&self, handle: &FileHandle) -> PathBuf {
        self.root.join(&handle.0)
    }
}

impl FileStore for DirectoryStore {
    fn store(
        &self,
        bytes: &[u8],
        file_name: &str,
        folder_id: u64,
    ) -> Result<FileHandle, StorageError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(StorageError::new(
                "INVALID_FILE_NAME",
                format!("'{file_name}' is not a plain file name"),
            ));
        }

        let relative = format!("folders/{folder_id}/{file_name}");
        let dir = self.root.join("folders").join(folder_id.to_string());
        std::fs::create_dir_all(&dir).map_err(|e| {
            StorageError::new(io_code(&e), format!("create folder '{}': {e}", dir.display()))
        })?;

        let path = dir.join(file_name);
        std::fs::write(&path, bytes).map_err(|e| {
            StorageError::new(io_code(&e), format!("write '{}': {e}", path.display()))
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), "stored file");
        Ok(FileHandle(relative))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboxAttachment {
    pub file_name: String,
    pub handle: String,
}

/// Metadata written next to each outgoing HTML body.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboxMessage {
    pub author_id: u64,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body_file: String,
    pub attachments: Vec<OutboxAttachment>,
}

/// Notifier that writes messages to `<root>/outbox/` for a mailer to pick up.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("outbox"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Outbox file stem: the first attachment's stem, else the subject.
fn message_stem(notification: &Notification) -> String {
    let base = notification
        .attachments
        .first()
        .map(|a| {
            a.file_name
                .strip_suffix(".csv")
                .unwrap_or(&a.file_name)
                .to_string()
        })
        .unwrap_or_else(|| notification.subject.clone());
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

impl Notifier for OutboxNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let stem = message_stem(notification);
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            NotificationError::new(io_code(&e), format!("create outbox '{}': {e}", self.dir.display()))
        })?;

        let body_file = format!("{stem}.html");
        let body_path = self.dir.join(&body_file);
        std::fs::write(&body_path, &notification.body_html).map_err(|e| {
            NotificationError::new(io_code(&e), format!("write '{}': {e}", body_path.display()))
        })?;

        let message = OutboxMessage {
            author_id: notification.author_id,
            recipients: notification.recipients.clone(),
            subject: notification.subject.clone(),
            body_file,
            attachments: notification
                .attachments
                .iter()
                .map(|a| OutboxAttachment {
                    file_name: a.file_name.clone(),
                    handle: a.handle.0.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&message)
            .map_err(|e| NotificationError::new("SERIALIZE_ERROR", e.to_string()))?;
        let meta_path = self.dir.join(format!("{stem}.json"));
        std::fs::write(&meta_path, json).map_err(|e| {
            NotificationError::new(io_code(&e), format!("write '{}': {e}", meta_path.display()))
        })?;

        debug!(path = %meta_path.display(), "queued notification");
        Ok(())
    }
}
