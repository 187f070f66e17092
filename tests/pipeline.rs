use std::fs;
use std::path::Path;

use droid_dash::droid::aggregator::SessionFilter;
use droid_dash::droid::export::{export_sessions_csv, export_sessions_json};
use droid_dash::droid::{
    CostEstimator, FavoritesStore, SessionAggregator, SessionParser, TitleEditor,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_session(
    root: &Path,
    project_dir: &str,
    id: &str,
    settings: Value,
    transcript: &[Value],
) {
    let dir = root.join(project_dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{id}.settings.json")), settings.to_string()).unwrap();
    let body: String = transcript.iter().map(|l| format!("{l}\n")).collect();
    fs::write(dir.join(format!("{id}.jsonl")), body).unwrap();
}

fn start(title: &str) -> Value {
    json!({"type": "session_start", "title": title, "cwd": "/tmp"})
}

fn prompt(ts: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "timestamp": ts,
        "message": {"role": "user", "content": [{"type": "text", "text": text}]}
    })
}

fn reply(ts: &str) -> Value {
    json!({
        "type": "message",
        "timestamp": ts,
        "message": {"role": "assistant", "content": [{"type": "text", "text": "Done."}]}
    })
}

fn settings(model: &str, input: u64, output: u64, active_ms: u64) -> Value {
    json!({
        "model": model,
        "autonomyMode": "auto-medium",
        "assistantActiveTimeMs": active_ms,
        "tokenUsage": {"inputTokens": input, "outputTokens": output}
    })
}

/// Two groups, three projects, one broken settings file and a hidden directory
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write_session(
        root,
        "-Users-dev-projects-work-atlas",
        "a1",
        settings("claude-sonnet-4-20250514", 1_000_000, 100_000, 600_000),
        &[
            start("Wire up login"),
            prompt("2025-03-01T09:00:00Z", "Add OAuth login to the web app"),
            reply("2025-03-01T09:05:00Z"),
        ],
    );
    write_session(
        root,
        "-Users-dev-projects-work-atlas",
        "a2",
        settings("claude-opus-4-5-20251101", 200_000, 50_000, 1_200_000),
        &[
            start("Refactor session store"),
            prompt("2025-03-02T14:00:00Z", "Refactor the session store to use Redis"),
            reply("2025-03-02T14:30:00Z"),
        ],
    );
    write_session(
        root,
        "-Users-dev-projects-work-infra",
        "i1",
        settings("claude-sonnet-4-20250514", 50_000, 5_000, 60_000),
        &[
            start("Terraform plan"),
            prompt("2025-03-02T16:00:00Z", "Why does terraform plan want to recreate the VPC?"),
        ],
    );
    write_session(
        root,
        "-Users-dev-projects-personal-blog",
        "b1",
        settings("claude-3-haiku-20240307", 10_000, 2_000, 30_000),
        &[start("New Session")],
    );

    let broken = root.join("-Users-dev-projects-personal-blog");
    fs::write(broken.join("zz.settings.json"), "{not json").unwrap();

    let hidden = root.join(".cache");
    fs::create_dir_all(&hidden).unwrap();
    fs::write(hidden.join("h1.settings.json"), "{}").unwrap();

    dir
}

fn scan(root: &Path) -> SessionAggregator {
    let parser = SessionParser::new(root.to_path_buf());
    let favorites = FavoritesStore::load(root);
    SessionAggregator::new(parser.parse_all_sessions(&favorites))
}

#[test]
fn test_scan_group_aggregate_cost() {
    let dir = fixture();
    let agg = scan(dir.path());
    let stats = agg.get_dashboard_stats();

    assert_eq!(stats.total_sessions, 4);
    assert_eq!(stats.total_active_time_ms, 1_890_000);

    let group_names: Vec<&str> = stats.project_groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(group_names, vec!["work", "personal"]);
    assert_eq!(stats.projects[0].name, "atlas");
    assert_eq!(stats.projects[0].path, "/Users/dev/projects/work/atlas");

    let newest: Vec<&str> = stats.sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(newest, vec!["i1", "a2", "a1", "b1"]);

    let b1 = stats.sessions.iter().find(|s| s.id == "b1").unwrap();
    assert!(b1.is_empty());
    assert!(b1.timestamp.is_none());

    let estimator = CostEstimator::default();
    let by_model = estimator.estimate_cost_by_model(agg.sessions());
    assert!((by_model["claude-sonnet-4-20250514"] - (3.0 + 1.5 + 0.15 + 0.075)).abs() < 1e-9);
    assert!((by_model["claude-opus-4-5-20251101"] - (3.0 + 3.75)).abs() < 1e-9);

    let daily = agg.get_daily_stats();
    assert_eq!(daily.active_days, 2);
    assert_eq!(daily.peak_token_day.unwrap().0.to_string(), "2025-03-01");

    let work = agg.filter_sessions(&SessionFilter::default().group("work"));
    assert_eq!(work.len(), 3);
}

#[test]
fn test_favorites_survive_rescan() {
    let dir = fixture();

    let mut favorites = FavoritesStore::load(dir.path());
    assert!(favorites.toggle("a2"));

    let agg = scan(dir.path());
    let favorited: Vec<&str> = agg
        .sessions()
        .iter()
        .filter(|s| s.is_favorite)
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(favorited, vec!["a2"]);
}

#[test]
fn test_title_update_then_rescan() {
    let dir = fixture();
    let editor = TitleEditor::new(dir.path().to_path_buf());

    assert!(editor.update_title("i1", "  VPC drift investigation  "));
    assert!(!editor.update_title("nope", "Anything"));

    let agg = scan(dir.path());
    let i1 = agg.sessions().iter().find(|s| s.id == "i1").unwrap();
    assert_eq!(i1.title, "VPC drift investigation");
    assert_eq!(i1.user_prompt_count, 1);
}

#[test]
fn test_export_covers_every_session() {
    let dir = fixture();
    let agg = scan(dir.path());

    let json = export_sessions_json(agg.sessions()).unwrap();
    let records: Vec<Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().any(|r| r["id"] == "b1" && r["timestamp"].is_null()));

    let csv = export_sessions_csv(agg.sessions());
    assert_eq!(csv.lines().count(), 5);
}

#[test]
fn test_hostile_settings_values_keep_the_session() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let transcript = [start("Huge"), prompt("2025-04-01T08:00:00Z", "Count every token in this repo")];

    write_session(
        root,
        "-Users-dev-projects-work-atlas",
        "max",
        json!({"tokenUsage": {"inputTokens": u64::MAX, "outputTokens": 1}}),
        &transcript,
    );
    write_session(root, "-Users-dev-projects-work-atlas", "nulls", json!({"model": null}), &transcript);
    write_session(
        root,
        "-Users-dev-projects-work-atlas",
        "floats",
        json!({"tokenUsage": {"inputTokens": 1500.0}}),
        &transcript,
    );

    let agg = scan(root);
    assert_eq!(agg.sessions().len(), 3);

    let daily = agg.get_daily_stats();
    assert_eq!(daily.peak_token_day.unwrap().1, u64::MAX);
    assert_eq!(agg.get_dashboard_stats().total_tokens.total_tokens(), u64::MAX);

    let nulls = agg.sessions().iter().find(|s| s.id == "nulls").unwrap();
    assert_eq!(nulls.model, "unknown");
    let floats = agg.sessions().iter().find(|s| s.id == "floats").unwrap();
    assert_eq!(floats.tokens.input_tokens, 1500);
}
