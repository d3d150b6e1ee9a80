//! Append-only audit trail for A2A traffic.
//!
//! Every inbound message, routing decision, success, and failure becomes one line:
//!
//! ```text
//! 2026-10-17T09:30:00.123+00:00 | INFO | ROUTING | conversation_id=c1 | target=alice | message=hello
//! ```
//!
//! Lines go to an optional file sink and are mirrored to the `log` facade under the `a2a`
//! target. Writing never fails from the caller's point of view: a broken sink is reported
//! through `log::warn!` and the record is dropped.

use chrono::Utc;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Kind of audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditEvent {
    Incoming,
    Routing,
    Success,
    Error,
    NoTarget,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Incoming => "INCOMING",
            AuditEvent::Routing => "ROUTING",
            AuditEvent::Success => "SUCCESS",
            AuditEvent::Error => "ERROR",
            AuditEvent::NoTarget => "NO_TARGET",
        }
    }

    fn level(&self) -> log::Level {
        match self {
            AuditEvent::Error | AuditEvent::NoTarget => log::Level::Error,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide audit sink. Share it behind an `Arc`.
pub struct AuditLog {
    path: Option<PathBuf>,
    // Opened lazily on the first record.
    file: Mutex<Option<File>>,
}

impl AuditLog {
    /// Audit records are appended to `path` (parent directories are created on demand).
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            file: Mutex::new(None),
        }
    }

    /// Audit records only reach the `log` facade.
    pub fn log_only() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::to_file(path),
            None => Self::log_only(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one event. `fields` are rendered as `key=value` in the given order; values
    /// and the conversation id are escaped so an event always stays on one line.
    ///
    /// The file write happens on the calling thread; async callers use
    /// [`record_async`](Self::record_async).
    pub fn record(&self, event: AuditEvent, conversation_id: &str, fields: &[(&str, &str)]) {
        if let Some(stamped) = self.render(event, conversation_id, fields) {
            self.append(&stamped);
        }
    }

    /// Like [`record`](Self::record), with the file append moved to tokio's blocking pool.
    /// Returns once the line is written.
    pub async fn record_async(
        self: &Arc<Self>,
        event: AuditEvent,
        conversation_id: &str,
        fields: &[(&str, &str)],
    ) {
        let stamped = match self.render(event, conversation_id, fields) {
            Some(stamped) => stamped,
            None => return,
        };
        let audit = Arc::clone(self);
        if let Err(err) = tokio::task::spawn_blocking(move || audit.append(&stamped)).await {
            log::warn!("audit: writer task failed: {}", err);
        }
    }

    /// Mirrors the event to the `log` facade and returns the stamped file line, if a file
    /// sink is configured.
    fn render(
        &self,
        event: AuditEvent,
        conversation_id: &str,
        fields: &[(&str, &str)],
    ) -> Option<String> {
        let mut line = format!("{} | conversation_id={}", event, escape_value(conversation_id));
        for (key, value) in fields {
            line.push_str(" | ");
            line.push_str(key);
            line.push('=');
            line.push_str(&escape_value(value));
        }

        log::log!(target: "a2a", event.level(), "{}", line);

        self.path.as_ref().map(|_| {
            format!("{} | {} | {}\n", Utc::now().to_rfc3339(), event.level(), line)
        })
    }

    fn append(&self, line: &str) {
        let path = match &self.path {
            Some(path) => path,
            None => return,
        };
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            match open_append(path) {
                Ok(file) => *guard = Some(file),
                Err(err) => {
                    log::warn!("audit: cannot open {}: {}", path.display(), err);
                    return;
                }
            }
        }
        if let Some(file) = guard.as_mut() {
            if let Err(err) = file.write_all(line.as_bytes()) {
                log::warn!("audit: write to {} failed: {}", path.display(), err);
                // Reopen on the next record.
                *guard = None;
            }
        }
    }
}

/// Backslash-escapes line breaks and the field separator.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '|' => escaped.push_str("\\|"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
