//! Sorting, hiding and grouping of session lists for display.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::models::{saturating_sum, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSort {
    DateDesc,
    DateAsc,
    #[default]
    TokensDesc,
    TokensAsc,
    DurationDesc,
    DurationAsc,
}

impl SessionSort {
    pub const ALL: [SessionSort; 6] = [
        SessionSort::DateDesc,
        SessionSort::DateAsc,
        SessionSort::TokensDesc,
        SessionSort::TokensAsc,
        SessionSort::DurationDesc,
        SessionSort::DurationAsc,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SessionSort::DateDesc => "date_desc",
            SessionSort::DateAsc => "date_asc",
            SessionSort::TokensDesc => "tokens_desc",
            SessionSort::TokensAsc => "tokens_asc",
            SessionSort::DurationDesc => "duration_desc",
            SessionSort::DurationAsc => "duration_asc",
        }
    }
}

impl fmt::Display for SessionSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SessionSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match SessionSort::ALL.iter().find(|sort| sort.key() == s) {
            Some(sort) => Ok(*sort),
            None => bail!("Unknown sort key: {s}"),
        }
    }
}

/// Field a session list is grouped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Project,
    Group,
    Model,
    /// Everything in a single "All" bucket
    #[serde(rename = "none")]
    Flat,
}

impl FromStr for GroupBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "project" => Ok(GroupBy::Project),
            "group" => Ok(GroupBy::Group),
            "model" => Ok(GroupBy::Model),
            "none" => Ok(GroupBy::Flat),
            other => bail!("Unknown grouping: {other}"),
        }
    }
}

/// Sessions sharing one grouping key
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBucket {
    pub key: String,
    pub sessions: Vec<Session>,
}

impl SessionBucket {
    pub fn total_tokens(&self) -> u64 {
        saturating_sum(self.sessions.iter().map(|s| s.tokens.total_tokens()))
    }

    pub fn total_prompts(&self) -> usize {
        self.sessions.iter().map(|s| s.user_prompt_count).sum()
    }

    pub fn total_active_time_ms(&self) -> u64 {
        saturating_sum(self.sessions.iter().map(|s| s.active_time_ms))
    }
}

/// Stable sort; sessions without a timestamp count as the oldest
pub fn sort_sessions(sessions: &mut [Session], sort: SessionSort) {
    match sort {
        SessionSort::DateDesc => sessions.sort_by(|a, b| b.order_key().cmp(&a.order_key())),
        SessionSort::DateAsc => sessions.sort_by(|a, b| a.order_key().cmp(&b.order_key())),
        SessionSort::TokensDesc => sessions.sort_by_key(|s| Reverse(s.tokens.total_tokens())),
        SessionSort::TokensAsc => sessions.sort_by_key(|s| s.tokens.total_tokens()),
        SessionSort::DurationDesc => sessions.sort_by_key(|s| Reverse(s.active_time_ms)),
        SessionSort::DurationAsc => sessions.sort_by_key(|s| s.active_time_ms),
    }
}

/// Drop sessions that never received a real prompt
pub fn hide_empty_sessions(sessions: &[Session]) -> Vec<Session> {
    sessions.iter().filter(|s| !s.is_empty()).cloned().collect()
}

/// Bucket sessions by `group_by`, heaviest bucket first
pub fn group_sessions_by(sessions: &[Session], group_by: GroupBy) -> Vec<SessionBucket> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<SessionBucket> = Vec::new();

    for session in sessions {
        let key = match group_by {
            GroupBy::Project => session.project_name.clone(),
            GroupBy::Group => session.project_group.clone(),
            GroupBy::Model => session.short_model().to_string(),
            GroupBy::Flat => "All".to_string(),
        };
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            buckets.push(SessionBucket {
                key,
                sessions: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[idx].sessions.push(session.clone());
    }

    buckets.sort_by_cached_key(|b| Reverse(b.total_tokens()));
    buckets
}
