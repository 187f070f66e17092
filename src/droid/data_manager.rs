use log::info;
use std::path::{Path, PathBuf};

use super::aggregator::SessionAggregator;
use super::favorites::FavoritesStore;
use super::models::{DashboardStats, Session, UserPrompt};
use super::pricing::CostEstimator;
use super::session_parser::SessionParser;
use super::session_view::{hide_empty_sessions, sort_sessions};
use super::title_editor::TitleEditor;
use crate::shared::config::{Config, DisplayConfig};

/// Everything derived from one scan of the sessions directory
struct Snapshot {
    aggregator: SessionAggregator,
    stats: DashboardStats,
}

impl Snapshot {
    fn build(sessions: Vec<Session>) -> Self {
        let aggregator = SessionAggregator::new(sessions);
        let stats = aggregator.get_dashboard_stats();
        Self { aggregator, stats }
    }
}

/// Main Droid data orchestration layer.
///
/// Owns the parser, favorites store, title editor and cost estimator for one
/// sessions directory, plus the statistics of the latest scan. A refresh
/// builds a complete new snapshot before replacing the old one.
pub struct DroidDataManager {
    sessions_dir: PathBuf,
    session_parser: SessionParser,
    title_editor: TitleEditor,
    cost_estimator: CostEstimator,
    favorites: FavoritesStore,
    snapshot: Snapshot,
}

impl DroidDataManager {
    /// Create a manager and run the first scan
    pub fn new(sessions_dir: PathBuf, cost_estimator: CostEstimator) -> Self {
        let session_parser = SessionParser::new(sessions_dir.clone());
        let title_editor = TitleEditor::new(sessions_dir.clone());
        let favorites = FavoritesStore::load(&sessions_dir);
        let snapshot = Snapshot::build(session_parser.parse_all_sessions(&favorites));

        Self {
            sessions_dir,
            session_parser,
            title_editor,
            cost_estimator,
            favorites,
            snapshot,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sessions_dir(), CostEstimator::from_config(config))
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Re-read favorites and every session from disk
    pub fn refresh(&mut self) {
        let favorites = FavoritesStore::load(&self.sessions_dir);
        let snapshot = Snapshot::build(self.session_parser.parse_all_sessions(&favorites));
        info!(
            "Refreshed {} sessions across {} projects",
            snapshot.stats.total_sessions,
            snapshot.stats.projects.len()
        );
        self.favorites = favorites;
        self.snapshot = snapshot;
    }

    pub fn stats(&self) -> &DashboardStats {
        &self.snapshot.stats
    }

    pub fn aggregator(&self) -> &SessionAggregator {
        &self.snapshot.aggregator
    }

    pub fn cost_estimator(&self) -> &CostEstimator {
        &self.cost_estimator
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn get_session(&self, session_id: &str) -> Option<&Session> {
        self.snapshot.stats.sessions.iter().find(|s| s.id == session_id)
    }

    /// Sessions as the display preferences want them listed
    pub fn visible_sessions(&self, display: &DisplayConfig) -> Vec<Session> {
        let mut sessions = if display.hide_empty_sessions {
            hide_empty_sessions(&self.snapshot.stats.sessions)
        } else {
            self.snapshot.stats.sessions.clone()
        };
        sort_sessions(&mut sessions, display.default_sort);
        sessions
    }

    /// Flip a session's favorite flag, persist it and patch the current
    /// snapshot without rescanning. Returns the new flag.
    pub fn toggle_favorite(&mut self, session_id: &str) -> bool {
        let is_favorite = self.favorites.toggle(session_id);

        let mut sessions = self.snapshot.aggregator.sessions().to_vec();
        for session in sessions.iter_mut().filter(|s| s.id == session_id) {
            session.is_favorite = is_favorite;
        }
        self.snapshot = Snapshot::build(sessions);

        is_favorite
    }

    /// Rename a session on disk; a successful rename triggers a rescan
    pub fn update_title(&mut self, session_id: &str, new_title: &str) -> bool {
        let updated = self.title_editor.update_title(session_id, new_title);
        if updated {
            self.refresh();
        }
        updated
    }

    pub fn session_prompts(&self, session_id: &str) -> Vec<UserPrompt> {
        self.session_parser.get_session_prompts(session_id)
    }

    /// Estimated USD cost of every session in the snapshot
    pub fn total_cost(&self) -> f64 {
        self.cost_estimator
            .estimate_total_cost(self.snapshot.aggregator.sessions())
    }
}
