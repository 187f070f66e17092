use anyhow::Result;
use serde::Serialize;

use super::models::Session;

/// Flat, spreadsheet-friendly view of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord<'a> {
    pub id: &'a str,
    pub project_name: &'a str,
    pub project_group: &'a str,
    pub project_path: &'a str,
    pub title: &'a str,
    /// RFC 3339 with the recorded offset
    pub timestamp: Option<String>,
    pub model: &'a str,
    pub autonomy_mode: &'a str,
    pub active_time_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub thinking_tokens: u64,
    pub total_tokens: u64,
    pub message_count: usize,
}

impl<'a> From<&'a Session> for SessionRecord<'a> {
    fn from(s: &'a Session) -> Self {
        Self {
            id: &s.id,
            project_name: &s.project_name,
            project_group: &s.project_group,
            project_path: &s.project_path,
            title: &s.title,
            timestamp: s.timestamp.map(|ts| ts.to_rfc3339()),
            model: &s.model,
            autonomy_mode: &s.autonomy_mode,
            active_time_ms: s.active_time_ms,
            input_tokens: s.tokens.input_tokens,
            output_tokens: s.tokens.output_tokens,
            cache_creation_tokens: s.tokens.cache_creation_tokens,
            cache_read_tokens: s.tokens.cache_read_tokens,
            thinking_tokens: s.tokens.thinking_tokens,
            total_tokens: s.tokens.total_tokens(),
            message_count: s.message_count,
        }
    }
}

/// Pretty-printed JSON array with one record per session
pub fn export_sessions_json(sessions: &[Session]) -> Result<String> {
    let records: Vec<SessionRecord> = sessions.iter().map(SessionRecord::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

const CSV_HEADER: &str = "id,project_name,project_group,project_path,title,timestamp,model,\
autonomy_mode,active_time_ms,input_tokens,output_tokens,cache_creation_tokens,\
cache_read_tokens,thinking_tokens,total_tokens,message_count";

/// The same records as CSV, header first. An empty slice gives just the header.
pub fn export_sessions_csv(sessions: &[Session]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for r in sessions.iter().map(SessionRecord::from) {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            escape_csv_field(r.id),
            escape_csv_field(r.project_name),
            escape_csv_field(r.project_group),
            escape_csv_field(r.project_path),
            escape_csv_field(r.title),
            r.timestamp.as_deref().unwrap_or(""),
            escape_csv_field(r.model),
            escape_csv_field(r.autonomy_mode),
            r.active_time_ms,
            r.input_tokens,
            r.output_tokens,
            r.cache_creation_tokens,
            r.cache_read_tokens,
            r.thinking_tokens,
            r.total_tokens,
            r.message_count,
        ));
    }

    csv
}

/// Quote a field holding a comma, quote or line break, doubling inner quotes
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
