use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Five-category token counters for a session or an aggregate of sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub thinking_tokens: u64,
}

impl TokenUsage {
    /// Sum of all five counters, clamped at `u64::MAX`
    pub fn total_tokens(&self) -> u64 {
        saturating_sum([
            self.input_tokens,
            self.output_tokens,
            self.cache_creation_tokens,
            self.cache_read_tokens,
            self.thinking_tokens,
        ])
    }

    /// Share of cache traffic that was served from cache rather than written to it.
    /// Zero when there was no cache traffic at all.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total_cache = self.cache_creation_tokens as f64 + self.cache_read_tokens as f64;
        if total_cache == 0.0 {
            return 0.0;
        }
        self.cache_read_tokens as f64 / total_cache
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            cache_creation_tokens: self
                .cache_creation_tokens
                .saturating_add(other.cache_creation_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_add(other.cache_read_tokens),
            thinking_tokens: self.thinking_tokens.saturating_add(other.thinking_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> TokenUsage {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

impl<'a> Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a TokenUsage>>(iter: I) -> TokenUsage {
        iter.copied().sum()
    }
}

/// Counter sum that clamps at `u64::MAX` instead of overflowing
pub fn saturating_sum(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

/// One recorded Droid session: settings metadata plus facts pulled from its transcript
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub project_path: String,
    pub project_name: String,
    pub project_group: String,
    pub title: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub model: String,
    pub autonomy_mode: String,
    pub active_time_ms: u64,
    pub tokens: TokenUsage,
    pub message_count: usize,
    pub user_prompt_count: usize,
    pub is_favorite: bool,
    /// Working directory recorded by the `session_start` record
    pub cwd: Option<String>,
}

impl Session {
    pub fn active_time_minutes(&self) -> f64 {
        self.active_time_ms as f64 / 60_000.0
    }

    pub fn active_time_hours(&self) -> f64 {
        self.active_time_ms as f64 / 3_600_000.0
    }

    /// A freshly opened session nobody actually typed into
    pub fn is_empty(&self) -> bool {
        if self.title == "New Session" || self.title == "Untitled Session" {
            return true;
        }
        self.user_prompt_count == 0
    }

    /// Short display name for the model ("Opus", "Sonnet", "Haiku", ...)
    pub fn short_model(&self) -> &str {
        short_model_name(&self.model)
    }

    /// Key used at every session sort site
    pub fn order_key(&self) -> SessionOrderKey<'_> {
        SessionOrderKey {
            has_timestamp: self.timestamp.is_some(),
            timestamp: self.timestamp,
            id: &self.id,
        }
    }
}

pub fn short_model_name(model: &str) -> &str {
    let lower = model.to_lowercase();
    if lower.contains("opus") {
        "Opus"
    } else if lower.contains("sonnet") {
        "Sonnet"
    } else if lower.contains("haiku") {
        "Haiku"
    } else {
        model.split('-').nth(1).unwrap_or(model)
    }
}

/// Total order over sessions: timestamped before untimestamped, then by instant,
/// then by id. Fields are compared in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionOrderKey<'a> {
    has_timestamp: bool,
    timestamp: Option<DateTime<FixedOffset>>,
    id: &'a str,
}

/// Comparator for newest-first listings. Sessions without a timestamp sink to the end.
pub fn newest_first(a: &Session, b: &Session) -> Ordering {
    b.order_key().cmp(&a.order_key())
}

/// A single user prompt pulled out of a transcript
#[derive(Debug, Clone, PartialEq)]
pub struct UserPrompt {
    /// 1-based position among the session's prompts
    pub index: usize,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub text: String,
    pub char_count: usize,
}

/// All sessions sharing one working-directory path
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub path: String,
    pub group: String,
    pub sessions: Vec<Session>,
}

impl Project {
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_tokens(&self) -> TokenUsage {
        self.sessions.iter().map(|s| s.tokens).sum()
    }

    pub fn total_active_time_ms(&self) -> u64 {
        saturating_sum(self.sessions.iter().map(|s| s.active_time_ms))
    }

    pub fn first_session_date(&self) -> Option<DateTime<FixedOffset>> {
        self.sessions.iter().filter_map(|s| s.timestamp).min()
    }

    pub fn last_session_date(&self) -> Option<DateTime<FixedOffset>> {
        self.sessions.iter().filter_map(|s| s.timestamp).max()
    }
}

/// Classification tier above projects (work, personal, opensource, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectGroup {
    pub name: String,
    pub projects: Vec<Project>,
}

impl ProjectGroup {
    pub fn session_count(&self) -> usize {
        self.projects.iter().map(Project::session_count).sum()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn total_tokens(&self) -> TokenUsage {
        self.projects.iter().map(Project::total_tokens).sum()
    }

    pub fn total_active_time_ms(&self) -> u64 {
        saturating_sum(self.projects.iter().map(Project::total_active_time_ms))
    }
}

/// Point-in-time view over every parsed session
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_sessions: usize,
    pub total_tokens: TokenUsage,
    pub total_active_time_ms: u64,
    pub project_groups: Vec<ProjectGroup>,
    pub projects: Vec<Project>,
    pub sessions: Vec<Session>,
    pub date_range: (Option<DateTime<FixedOffset>>, Option<DateTime<FixedOffset>>),
    pub model_distribution: BTreeMap<String, usize>,
}

impl DashboardStats {
    pub fn total_active_hours(&self) -> f64 {
        self.total_active_time_ms as f64 / 3_600_000.0
    }
}
