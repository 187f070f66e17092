use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::TitleUpdateError;
use super::session_parser::{find_session_jsonl_path, normalize_title};

/// Rewrites the title stored in a transcript's `session_start` record
pub struct TitleEditor {
    sessions_dir: PathBuf,
}

impl TitleEditor {
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    /// Update a session's title. Returns false, leaving the file untouched,
    /// when the transcript is missing or doesn't open with `session_start`.
    pub fn update_title(&self, session_id: &str, new_title: &str) -> bool {
        match self.try_update_title(session_id, new_title) {
            Ok(path) => {
                info!("Renamed session {session_id} in {}", path.display());
                true
            }
            Err(e) => {
                warn!("Title update failed: {e}");
                false
            }
        }
    }

    /// Like [`update_title`](Self::update_title) but reports why it failed
    pub fn try_update_title(
        &self,
        session_id: &str,
        new_title: &str,
    ) -> Result<PathBuf, TitleUpdateError> {
        let path = find_session_jsonl_path(&self.sessions_dir, session_id).ok_or_else(|| {
            TitleUpdateError::SessionNotFound {
                session_id: session_id.to_string(),
            }
        })?;
        let title = normalize_title(Some(new_title));

        rewrite_first_record(&path, &title)?;
        Ok(path)
    }
}

/// Replace line one of the transcript, keeping every later byte as it was
fn rewrite_first_record(path: &Path, title: &str) -> Result<(), TitleUpdateError> {
    let io_err = |source: std::io::Error| TitleUpdateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = fs::read(path).map_err(io_err)?;
    if bytes.is_empty() {
        return Err(TitleUpdateError::EmptyTranscript {
            path: path.to_path_buf(),
        });
    }

    let (first_line, rest) = match bytes.iter().position(|b| *b == b'\n') {
        Some(idx) => (&bytes[..idx], &bytes[idx + 1..]),
        None => (&bytes[..], &[][..]),
    };

    let mut record: Value =
        serde_json::from_slice(first_line).map_err(|source| TitleUpdateError::MalformedFirstLine {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(fields) = record
        .as_object_mut()
        .filter(|obj| obj.get("type").and_then(Value::as_str) == Some("session_start"))
    else {
        return Err(TitleUpdateError::NotSessionStart {
            path: path.to_path_buf(),
        });
    };

    fields.insert("title".to_string(), Value::from(title));
    if fields.contains_key("sessionTitle") {
        fields.insert("sessionTitle".to_string(), Value::from(title));
    }

    let mut output = serde_json::to_vec(&record).map_err(|source| {
        TitleUpdateError::MalformedFirstLine {
            path: path.to_path_buf(),
            source,
        }
    })?;
    output.push(b'\n');
    output.extend_from_slice(rest);

    fs::write(path, output).map_err(io_err)
}
