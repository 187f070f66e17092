use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ParseError;
use super::favorites::FavoritesStore;
use super::models::{Session, TokenUsage, UserPrompt};
use super::path_codec;

pub const SETTINGS_SUFFIX: &str = ".settings.json";
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

const MAX_TITLE_CHARS: usize = 80;
const UNTITLED: &str = "Untitled Session";
const UNKNOWN: &str = "unknown";
/// Prompts must be longer than this (after trimming) to count
const MIN_PROMPT_CHARS: usize = 10;
const SYSTEM_MARKERS: [&str; 2] = ["<system-reminder>", "<system"];

/// Contents of `<id>.settings.json`. Every field falls back to its default
/// when it is absent, `null` or of the wrong type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    /// Defaults to `"unknown"`
    #[serde(deserialize_with = "string_or_unknown")]
    pub model: String,
    /// Defaults to `"unknown"`
    #[serde(deserialize_with = "string_or_unknown")]
    pub autonomy_mode: String,
    /// Defaults to 0
    #[serde(deserialize_with = "lenient_count")]
    pub assistant_active_time_ms: u64,
    /// All counters default to 0
    #[serde(deserialize_with = "lenient_token_usage")]
    pub token_usage: SettingsTokenUsage,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: UNKNOWN.to_string(),
            autonomy_mode: UNKNOWN.to_string(),
            assistant_active_time_ms: 0,
            token_usage: SettingsTokenUsage::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsTokenUsage {
    #[serde(deserialize_with = "lenient_count")]
    pub input_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub output_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub cache_creation_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub cache_read_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub thinking_tokens: u64,
}

fn string_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().unwrap_or(UNKNOWN).to_string())
}

/// Non-negative integer, or a float with no fractional part. Anything else is 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

fn count_from_value(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => f as u64,
        _ => 0,
    }
}

fn lenient_token_usage<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<SettingsTokenUsage, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(SettingsTokenUsage::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl From<SettingsTokenUsage> for TokenUsage {
    fn from(usage: SettingsTokenUsage) -> Self {
        TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_creation_tokens: usage.cache_creation_tokens,
            cache_read_tokens: usage.cache_read_tokens,
            thinking_tokens: usage.thinking_tokens,
        }
    }
}

/// Facts extracted from one transcript file
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSummary {
    pub title: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub message_count: usize,
    pub user_prompt_count: usize,
    pub cwd: Option<String>,
}

impl Default for TranscriptSummary {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            timestamp: None,
            message_count: 0,
            user_prompt_count: 0,
            cwd: None,
        }
    }
}

/// Session parser for a Droid sessions directory
pub struct SessionParser {
    sessions_dir: PathBuf,
}

impl SessionParser {
    /// Create new session parser
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Parse every session below the sessions directory.
    /// A missing root yields no sessions; unreadable settings drop only that session.
    pub fn parse_all_sessions(&self, favorites: &FavoritesStore) -> Vec<Session> {
        let mut sessions = Vec::new();

        for project_dir in project_dirs(&self.sessions_dir) {
            let Some(dir_name) = project_dir.file_name().and_then(|s| s.to_str()) else {
                continue;
            };

            for settings_path in settings_files(&project_dir) {
                let Some(session_id) = Self::extract_session_id_from_path(&settings_path) else {
                    continue;
                };
                let transcript_path =
                    project_dir.join(format!("{session_id}.{TRANSCRIPT_EXTENSION}"));

                match self.parse_session(&settings_path, &transcript_path, dir_name, favorites) {
                    Ok(session) => sessions.push(session),
                    Err(e) => warn!("Dropping session: {e}"),
                }
            }
        }

        info!(
            "Parsed {} sessions from {}",
            sessions.len(),
            self.sessions_dir.display()
        );
        sessions
    }

    /// Parse one session from its settings file and transcript
    pub fn parse_session(
        &self,
        settings_path: &Path,
        transcript_path: &Path,
        project_dir_name: &str,
        favorites: &FavoritesStore,
    ) -> Result<Session, ParseError> {
        let settings = Self::read_settings(settings_path)?;
        let id = Self::extract_session_id_from_path(settings_path).unwrap_or_default();
        let project = path_codec::decode(project_dir_name);
        let transcript = Self::parse_transcript(transcript_path);

        Ok(Session {
            is_favorite: favorites.contains(&id),
            id,
            project_path: project.path,
            project_name: project.name,
            project_group: project.group,
            title: transcript.title,
            timestamp: transcript.timestamp,
            model: settings.model,
            autonomy_mode: settings.autonomy_mode,
            active_time_ms: settings.assistant_active_time_ms,
            tokens: settings.token_usage.into(),
            message_count: transcript.message_count,
            user_prompt_count: transcript.user_prompt_count,
            cwd: transcript.cwd,
        })
    }

    /// Read and decode a settings file
    pub fn read_settings(settings_path: &Path) -> Result<SessionSettings, ParseError> {
        let content =
            fs::read_to_string(settings_path).map_err(|e| ParseError::io(settings_path, e))?;
        serde_json::from_str(&content).map_err(|source| ParseError::MalformedSettings {
            path: settings_path.to_path_buf(),
            source,
        })
    }

    /// Summarize a transcript. A missing or unreadable file gives the defaults;
    /// lines that are not valid JSON are skipped.
    pub fn parse_transcript(transcript_path: &Path) -> TranscriptSummary {
        let mut summary = TranscriptSummary::default();
        let Some(records) = read_records(transcript_path) else {
            return summary;
        };

        let mut seen_session_start = false;
        for entry in records {
            match entry.get("type").and_then(Value::as_str) {
                Some("session_start") if !seen_session_start => {
                    seen_session_start = true;
                    let raw_title = non_empty_str(&entry, "sessionTitle")
                        .or_else(|| entry.get("title").and_then(Value::as_str));
                    summary.title = normalize_title(raw_title);
                    summary.cwd = entry.get("cwd").and_then(Value::as_str).map(str::to_string);
                }
                Some("message") => {
                    summary.message_count += 1;
                    if summary.timestamp.is_none() {
                        summary.timestamp = entry
                            .get("timestamp")
                            .and_then(Value::as_str)
                            .and_then(parse_timestamp);
                    }
                    if is_user_prompt(&entry) {
                        summary.user_prompt_count += 1;
                    }
                }
                _ => {}
            }
        }

        summary
    }

    /// Every user prompt of a session, in transcript order
    pub fn get_session_prompts(&self, session_id: &str) -> Vec<UserPrompt> {
        let Some(transcript_path) = self.find_session_jsonl_path(session_id) else {
            return Vec::new();
        };
        let Some(records) = read_records(&transcript_path) else {
            return Vec::new();
        };

        records
            .iter()
            .filter(|entry| is_user_prompt(entry))
            .filter_map(|entry| {
                let text = extract_user_prompt_text(entry)?;
                let timestamp = entry
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp);
                Some((timestamp, text))
            })
            .enumerate()
            .map(|(i, (timestamp, text))| UserPrompt {
                index: i + 1,
                timestamp,
                char_count: text.chars().count(),
                text,
            })
            .collect()
    }

    /// Locate `<id>.jsonl` in any project directory
    pub fn find_session_jsonl_path(&self, session_id: &str) -> Option<PathBuf> {
        find_session_jsonl_path(&self.sessions_dir, session_id)
    }

    /// Session id from a settings file name (`abc.settings.json` -> `abc`)
    pub fn extract_session_id_from_path(settings_path: &Path) -> Option<String> {
        settings_path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|name| name.strip_suffix(SETTINGS_SUFFIX))
            .map(str::to_string)
    }
}

/// Locate `<id>.jsonl` in any project directory below `sessions_dir`
pub fn find_session_jsonl_path(sessions_dir: &Path, session_id: &str) -> Option<PathBuf> {
    project_dirs(sessions_dir)
        .into_iter()
        .map(|dir| dir.join(format!("{session_id}.{TRANSCRIPT_EXTENSION}")))
        .find(|path| path.is_file())
}

/// Project directories below the root, skipping hidden entries, in name order
fn project_dirs(sessions_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(sessions_dir) else {
        debug!("Sessions directory unavailable: {}", sessions_dir.display());
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| !name.starts_with('.'))
        })
        .collect();
    dirs.sort();
    dirs
}

fn settings_files(project_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(project_dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| name.ends_with(SETTINGS_SUFFIX))
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Decode each line of a JSONL file, skipping the ones that don't parse
fn read_records(transcript_path: &Path) -> Option<Vec<Value>> {
    let bytes = fs::read(transcript_path).ok()?;
    let mut records = Vec::new();

    for (line_no, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(value) => records.push(value),
            Err(e) => debug!(
                "Skipping line {} of {}: {e}",
                line_no + 1,
                transcript_path.display()
            ),
        }
    }

    Some(records)
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Trim, cap at 80 characters, and fall back to "Untitled Session"
pub fn normalize_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.chars().take(MAX_TITLE_CHARS).collect(),
        _ => UNTITLED.to_string(),
    }
}

/// Parse an ISO-8601 instant. `Z` means UTC; a value without an offset is
/// read as UTC. Anything unparsable is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        return Some(dt);
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive).fixed_offset())
}

fn text_items(entry: &Value) -> impl Iterator<Item = &str> {
    entry
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .map(|item| item.get("text").and_then(Value::as_str).unwrap_or(""))
}

fn qualifying_text(text: &str) -> Option<&str> {
    if SYSTEM_MARKERS.iter().any(|marker| text.starts_with(marker)) {
        return None;
    }
    let trimmed = text.trim();
    (trimmed.chars().count() > MIN_PROMPT_CHARS).then_some(trimmed)
}

/// A user-authored `message` record carrying real prompt text.
/// System reminders, short texts and tool results don't count.
pub fn is_user_prompt(entry: &Value) -> bool {
    if entry.get("type").and_then(Value::as_str) != Some("message") {
        return false;
    }
    if entry.get("message").and_then(|m| m.get("role")).and_then(Value::as_str) != Some("user") {
        return false;
    }
    text_items(entry).any(|text| qualifying_text(text).is_some())
}

fn extract_user_prompt_text(entry: &Value) -> Option<String> {
    text_items(entry)
        .find_map(qualifying_text)
        .map(str::to_string)
}
