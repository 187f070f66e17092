use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar file at the sessions root holding the favorited ids
pub const FAVORITES_FILE: &str = ".favorites";

/// Persisted set of favorited session ids
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl FavoritesStore {
    /// Load favorites from `<sessions_dir>/.favorites`.
    /// A missing or unreadable file yields an empty set.
    pub fn load(sessions_dir: &Path) -> Self {
        let path = sessions_dir.join(FAVORITES_FILE);
        let ids = Self::read_ids(&path).unwrap_or_default();
        debug!("Loaded {} favorites from {}", ids.len(), path.display());
        Self { path, ids }
    }

    fn read_ids(path: &Path) -> Option<BTreeSet<String>> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(ids) => Some(ids.into_iter().collect()),
            Err(e) => {
                warn!("Ignoring corrupt favorites file {}: {e}", path.display());
                None
            }
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.ids.contains(session_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flip membership and persist the whole list. Returns the new membership.
    ///
    /// The in-memory change is kept even when the write fails; the failure is
    /// only logged.
    pub fn toggle(&mut self, session_id: &str) -> bool {
        let is_favorite = if self.ids.remove(session_id) {
            false
        } else {
            self.ids.insert(session_id.to_string());
            true
        };

        if let Err(e) = self.save() {
            warn!("Failed to persist favorites: {e:#}");
        }

        is_favorite
    }

    /// Overwrite the favorites file with the current set
    pub fn save(&self) -> Result<()> {
        let ids: Vec<&String> = self.ids.iter().collect();
        let content = serde_json::to_string_pretty(&ids)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
