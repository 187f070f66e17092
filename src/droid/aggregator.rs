use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::grouping::ProjectGrouper;
use super::models::{
    newest_first, saturating_sum, DashboardStats, Project, Session, TokenUsage,
};

/// ISO (year, week number)
pub type IsoWeekKey = (i32, u32);
/// (year, month)
pub type MonthKey = (i32, u32);

/// Day-level usage summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyStats {
    pub active_days: usize,
    pub median_daily_tokens: f64,
    pub median_daily_time_ms: f64,
    pub peak_token_day: Option<(NaiveDate, u64)>,
    pub peak_time_day: Option<(NaiveDate, u64)>,
}

/// Week- or month-level usage summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodStats<K> {
    pub active_periods: usize,
    pub avg_tokens: f64,
    pub avg_time_ms: f64,
    /// Period with the highest token total
    pub peak: Option<(K, u64)>,
}

pub type WeeklyStats = PeriodStats<IsoWeekKey>;
pub type MonthlyStats = PeriodStats<MonthKey>;

/// Conjunctive session filter. Unset criteria match everything; any date
/// bound excludes sessions without a timestamp.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub group: Option<String>,
    pub project: Option<String>,
    pub model: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SessionFilter {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn matches(&self, session: &Session) -> bool {
        if self.group.as_ref().is_some_and(|g| *g != session.project_group) {
            return false;
        }
        if self.project.as_ref().is_some_and(|p| *p != session.project_name) {
            return false;
        }
        if self.model.as_ref().is_some_and(|m| *m != session.model) {
            return false;
        }
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }

        let Some(date) = session.timestamp.map(|ts| ts.date_naive()) else {
            return false;
        };
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Daily token totals of one project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDailyTokens {
    pub project: String,
    pub daily: BTreeMap<NaiveDate, u64>,
}

impl ProjectDailyTokens {
    pub fn total_tokens(&self) -> u64 {
        saturating_sum(self.daily.values().copied())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BucketTotals {
    tokens: u64,
    active_time_ms: u64,
}

/// Per-bucket totals in first-seen order. Sessions without a timestamp are skipped.
fn bucketize<K, F>(sessions: &[Session], key_of: F) -> Vec<(K, BucketTotals)>
where
    K: Copy + Eq + Hash,
    F: Fn(&DateTime<FixedOffset>) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, BucketTotals)> = Vec::new();

    for session in sessions {
        let Some(ts) = session.timestamp.as_ref() else {
            continue;
        };
        let key = key_of(ts);
        let idx = *index.entry(key).or_insert_with(|| {
            buckets.push((key, BucketTotals::default()));
            buckets.len() - 1
        });
        let totals = &mut buckets[idx].1;
        totals.tokens = totals.tokens.saturating_add(session.tokens.total_tokens());
        totals.active_time_ms = totals.active_time_ms.saturating_add(session.active_time_ms);
    }

    buckets
}

/// Median with the even-count midpoint rule. Empty input gives 0.
fn median(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

/// Largest value; the earliest entry wins a tie
fn leftmost_max<K: Copy>(items: impl Iterator<Item = (K, u64)>) -> Option<(K, u64)> {
    items.fold(None, |best, (key, value)| match best {
        Some((_, best_value)) if best_value >= value => best,
        _ => Some((key, value)),
    })
}

fn period_stats<K: Copy>(buckets: &[(K, BucketTotals)]) -> PeriodStats<K> {
    let tokens: Vec<u64> = buckets.iter().map(|(_, t)| t.tokens).collect();
    let times: Vec<u64> = buckets.iter().map(|(_, t)| t.active_time_ms).collect();

    PeriodStats {
        active_periods: buckets.len(),
        avg_tokens: mean(&tokens),
        avg_time_ms: mean(&times),
        peak: leftmost_max(buckets.iter().map(|(k, t)| (*k, t.tokens))),
    }
}

/// Aggregates session data into statistics
pub struct SessionAggregator {
    sessions: Vec<Session>,
    grouper: ProjectGrouper,
}

impl SessionAggregator {
    pub fn new(sessions: Vec<Session>) -> Self {
        let grouper = ProjectGrouper::new(&sessions);
        Self { sessions, grouper }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn grouper(&self) -> &ProjectGrouper {
        &self.grouper
    }

    /// Whole-dataset snapshot
    pub fn get_dashboard_stats(&self) -> DashboardStats {
        let mut total_tokens = TokenUsage::default();
        let mut total_active_time_ms: u64 = 0;
        let mut model_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut earliest: Option<DateTime<FixedOffset>> = None;
        let mut latest: Option<DateTime<FixedOffset>> = None;

        for session in &self.sessions {
            total_tokens += session.tokens;
            total_active_time_ms = total_active_time_ms.saturating_add(session.active_time_ms);
            *model_distribution.entry(session.model.clone()).or_insert(0) += 1;

            if let Some(ts) = session.timestamp {
                earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
        }

        let mut sessions = self.sessions.clone();
        sessions.sort_by(newest_first);

        DashboardStats {
            total_sessions: self.sessions.len(),
            total_tokens,
            total_active_time_ms,
            project_groups: self.grouper.get_all_groups(),
            projects: self.grouper.get_all_projects(),
            sessions,
            date_range: (earliest, latest),
            model_distribution,
        }
    }

    /// Medians and peaks over calendar days that had at least one session
    pub fn get_daily_stats(&self) -> DailyStats {
        let buckets = bucketize(&self.sessions, |ts| ts.date_naive());
        let tokens: Vec<u64> = buckets.iter().map(|(_, t)| t.tokens).collect();
        let times: Vec<u64> = buckets.iter().map(|(_, t)| t.active_time_ms).collect();

        DailyStats {
            active_days: buckets.len(),
            median_daily_tokens: median(&tokens),
            median_daily_time_ms: median(&times),
            peak_token_day: leftmost_max(buckets.iter().map(|(d, t)| (*d, t.tokens))),
            peak_time_day: leftmost_max(buckets.iter().map(|(d, t)| (*d, t.active_time_ms))),
        }
    }

    pub fn get_weekly_stats(&self) -> WeeklyStats {
        let buckets = bucketize(&self.sessions, |ts| {
            let week = ts.date_naive().iso_week();
            (week.year(), week.week())
        });
        period_stats(&buckets)
    }

    pub fn get_monthly_stats(&self) -> MonthlyStats {
        let buckets = bucketize(&self.sessions, |ts| {
            let date = ts.date_naive();
            (date.year(), date.month())
        });
        period_stats(&buckets)
    }

    /// Sessions grouped by calendar date
    pub fn activity_by_date(&self) -> BTreeMap<NaiveDate, Vec<Session>> {
        let mut by_date: BTreeMap<NaiveDate, Vec<Session>> = BTreeMap::new();
        for session in &self.sessions {
            if let Some(ts) = session.timestamp {
                by_date.entry(ts.date_naive()).or_default().push(session.clone());
            }
        }
        by_date
    }

    /// Token usage summed per calendar date
    pub fn daily_token_usage(&self) -> BTreeMap<NaiveDate, TokenUsage> {
        let mut by_date: BTreeMap<NaiveDate, TokenUsage> = BTreeMap::new();
        for session in &self.sessions {
            if let Some(ts) = session.timestamp {
                *by_date.entry(ts.date_naive()).or_default() += session.tokens;
            }
        }
        by_date
    }

    pub fn sessions_by_model(&self) -> BTreeMap<String, Vec<Session>> {
        let mut by_model: BTreeMap<String, Vec<Session>> = BTreeMap::new();
        for session in &self.sessions {
            by_model
                .entry(session.model.clone())
                .or_default()
                .push(session.clone());
        }
        by_model
    }

    /// Projects with the most tokens. Ties keep session-count order.
    pub fn get_top_projects_by_tokens(&self, limit: usize) -> Vec<Project> {
        let mut projects = self.grouper.get_all_projects();
        projects.sort_by_cached_key(|p| std::cmp::Reverse(p.total_tokens().total_tokens()));
        projects.truncate(limit);
        projects
    }

    pub fn get_top_projects_by_sessions(&self, limit: usize) -> Vec<Project> {
        let mut projects = self.grouper.get_all_projects();
        projects.truncate(limit);
        projects
    }

    pub fn filter_sessions(&self, filter: &SessionFilter) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    /// Daily token totals per project name, heaviest project first
    pub fn get_project_daily_tokens(&self) -> Vec<ProjectDailyTokens> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut result: Vec<ProjectDailyTokens> = Vec::new();

        for session in &self.sessions {
            let Some(ts) = session.timestamp else {
                continue;
            };
            let idx = *index.entry(session.project_name.as_str()).or_insert_with(|| {
                result.push(ProjectDailyTokens {
                    project: session.project_name.clone(),
                    daily: BTreeMap::new(),
                });
                result.len() - 1
            });
            let day_total = result[idx].daily.entry(ts.date_naive()).or_insert(0);
            *day_total = day_total.saturating_add(session.tokens.total_tokens());
        }

        result.sort_by_cached_key(|p| std::cmp::Reverse(p.total_tokens()));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::droid::models::tests::{session, ts};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn with_project(mut s: Session, name: &str) -> Session {
        s.project_name = name.to_string();
        s.project_path = format!("/Users/dev/projects/work/{name}");
        s
    }

    fn timed(mut s: Session, ms: u64) -> Session {
        s.active_time_ms = ms;
        s
    }

    #[test]
    fn test_daily_median_and_peak() {
        let agg = SessionAggregator::new(vec![
            session("a", Some("2025-01-01T09:00:00Z"), 100),
            session("b", Some("2025-01-02T09:00:00Z"), 300),
            session("c", Some("2025-01-03T09:00:00Z"), 200),
        ]);
        let daily = agg.get_daily_stats();
        assert_eq!(daily.active_days, 3);
        assert_eq!(daily.median_daily_tokens, 200.0);
        assert_eq!(daily.peak_token_day, Some((date("2025-01-02"), 300)));
    }

    #[test]
    fn test_daily_median_even_count_and_time_peak() {
        let agg = SessionAggregator::new(vec![
            timed(session("a", Some("2025-01-01T09:00:00Z"), 100), 1_000),
            timed(session("b", Some("2025-01-01T18:00:00Z"), 50), 4_000),
            timed(session("c", Some("2025-01-02T09:00:00Z"), 10), 5_000),
            timed(session("d", None, 999), 99_000),
        ]);
        let daily = agg.get_daily_stats();
        assert_eq!(daily.active_days, 2);
        assert_eq!(daily.median_daily_tokens, 80.0);
        assert_eq!(daily.median_daily_time_ms, 5_000.0);
        assert_eq!(daily.peak_time_day, Some((date("2025-01-01"), 5_000)));
    }

    #[test]
    fn test_peak_tie_keeps_first_seen_bucket() {
        let agg = SessionAggregator::new(vec![
            session("late", Some("2025-05-09T09:00:00Z"), 500),
            session("early", Some("2025-05-01T09:00:00Z"), 500),
        ]);
        assert_eq!(
            agg.get_daily_stats().peak_token_day,
            Some((date("2025-05-09"), 500))
        );
    }

    #[test]
    fn test_bucket_date_uses_recorded_offset() {
        let agg = SessionAggregator::new(vec![session("a", Some("2025-01-01T23:30:00-05:00"), 1)]);
        assert_eq!(
            agg.get_daily_stats().peak_token_day,
            Some((date("2025-01-01"), 1))
        );
    }

    #[test]
    fn test_overflowing_totals_clamp() {
        let mut huge = session("a", Some("2025-01-01T09:00:00Z"), u64::MAX);
        huge.tokens.output_tokens = 1;
        huge.active_time_ms = u64::MAX;
        let agg = SessionAggregator::new(vec![
            huge,
            timed(session("b", Some("2025-01-01T10:00:00Z"), 5), 10),
        ]);

        let daily = agg.get_daily_stats();
        assert_eq!(daily.peak_token_day, Some((date("2025-01-01"), u64::MAX)));
        assert_eq!(daily.peak_time_day, Some((date("2025-01-01"), u64::MAX)));
        assert_eq!(agg.get_weekly_stats().peak.unwrap().1, u64::MAX);
        assert_eq!(agg.get_dashboard_stats().total_active_time_ms, u64::MAX);
        assert_eq!(agg.get_project_daily_tokens()[0].total_tokens(), u64::MAX);
        assert_eq!(agg.get_top_projects_by_tokens(1)[0].total_active_time_ms(), u64::MAX);
    }

    #[test]
    fn test_empty_stats() {
        let agg = SessionAggregator::new(Vec::new());
        assert_eq!(agg.get_daily_stats(), DailyStats::default());
        assert_eq!(agg.get_weekly_stats().peak, None);
        assert_eq!(agg.get_monthly_stats().avg_tokens, 0.0);

        let stats = agg.get_dashboard_stats();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.date_range, (None, None));
    }

    #[test]
    fn test_weekly_and_monthly() {
        let agg = SessionAggregator::new(vec![
            session("a", Some("2024-12-30T09:00:00Z"), 100),
            session("b", Some("2025-01-05T09:00:00Z"), 200),
            session("c", Some("2025-01-06T09:00:00Z"), 600),
            session("d", Some("2025-02-10T09:00:00Z"), 50),
        ]);

        let weekly = agg.get_weekly_stats();
        assert_eq!(weekly.active_periods, 3);
        assert_eq!(weekly.peak, Some(((2025, 2), 600)));
        assert!((weekly.avg_tokens - 950.0 / 3.0).abs() < 1e-9);

        let monthly = agg.get_monthly_stats();
        assert_eq!(monthly.active_periods, 3);
        assert_eq!(monthly.peak, Some(((2025, 1), 800)));
    }

    #[test]
    fn test_dashboard_totals_and_ordering() {
        let agg = SessionAggregator::new(vec![
            session("s3", None, 0),
            session("s1", Some("2025-01-01T09:00:00Z"), 100),
            session("s2", Some("2025-01-02T09:00:00Z"), 200),
        ]);
        let stats = agg.get_dashboard_stats();

        assert_eq!(stats.total_tokens.total_tokens(), 300);
        let ids: Vec<&str> = stats.sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1", "s3"]);
        assert_eq!(
            stats.date_range,
            (Some(ts("2025-01-01T09:00:00Z")), Some(ts("2025-01-02T09:00:00Z")))
        );
        assert_eq!(stats.model_distribution.get("claude-sonnet-4-20250514"), Some(&3));
        assert_eq!(stats.projects.len(), 1);
        assert_eq!(stats.project_groups.len(), 1);
    }

    #[test]
    fn test_top_projects_by_tokens() {
        let agg = SessionAggregator::new(vec![
            with_project(session("a", None, 500), "small"),
            with_project(session("b", None, 1000), "big"),
        ]);
        let top = agg.get_top_projects_by_tokens(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "big");
    }

    #[test]
    fn test_top_projects_ties_are_stable() {
        let agg = SessionAggregator::new(vec![
            with_project(session("a", None, 100), "one"),
            with_project(session("b", None, 50), "two"),
            with_project(session("c", None, 50), "two"),
            with_project(session("d", None, 100), "three"),
        ]);
        let by_tokens: Vec<String> = agg
            .get_top_projects_by_tokens(10)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(by_tokens, vec!["two", "one", "three"]);

        let by_sessions = agg.get_top_projects_by_sessions(2);
        assert_eq!(by_sessions[0].name, "two");
        assert_eq!(by_sessions[1].name, "one");
    }

    #[test]
    fn test_filter_sessions() {
        let mut other = session("x", Some("2025-03-01T09:00:00Z"), 1);
        other.model = "claude-opus-4-5-20251101".to_string();
        other.project_group = "priv".to_string();

        let agg = SessionAggregator::new(vec![
            session("a", Some("2025-01-01T09:00:00Z"), 1),
            session("b", Some("2025-02-01T09:00:00Z"), 1),
            session("c", None, 1),
            other,
        ]);

        assert_eq!(agg.filter_sessions(&SessionFilter::default()).len(), 4);
        assert_eq!(agg.filter_sessions(&SessionFilter::default().group("work")).len(), 3);
        assert_eq!(
            agg.filter_sessions(&SessionFilter::default().model("claude-opus-4-5-20251101"))
                .len(),
            1
        );

        let ranged = agg.filter_sessions(
            &SessionFilter::default()
                .start_date(date("2025-01-15"))
                .end_date(date("2025-02-28")),
        );
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].id, "b");

        let wide_open = agg.filter_sessions(&SessionFilter::default().start_date(NaiveDate::MIN));
        assert!(wide_open.iter().all(|s| s.id != "c"));
        assert_eq!(wide_open.len(), 3);
    }

    #[test]
    fn test_project_daily_tokens_ordered_by_total() {
        let agg = SessionAggregator::new(vec![
            with_project(session("a", Some("2025-01-01T09:00:00Z"), 10), "light"),
            with_project(session("b", Some("2025-01-01T10:00:00Z"), 300), "heavy"),
            with_project(session("c", Some("2025-01-02T10:00:00Z"), 5), "light"),
            with_project(session("d", Some("2025-01-02T11:00:00Z"), 5), "heavy"),
            with_project(session("e", None, 10_000), "untimed"),
        ]);
        let daily = agg.get_project_daily_tokens();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].project, "heavy");
        assert_eq!(daily[0].total_tokens(), 305);
        assert_eq!(daily[1].daily.get(&date("2025-01-02")), Some(&5));
    }

    #[test]
    fn test_groupings_by_date_and_model() {
        let agg = SessionAggregator::new(vec![
            session("a", Some("2025-01-01T09:00:00Z"), 10),
            session("b", Some("2025-01-01T10:00:00Z"), 20),
            session("c", None, 30),
        ]);
        assert_eq!(agg.activity_by_date()[&date("2025-01-01")].len(), 2);
        assert_eq!(
            agg.daily_token_usage()[&date("2025-01-01")].total_tokens(),
            30
        );
        assert_eq!(agg.sessions_by_model()["claude-sonnet-4-20250514"].len(), 3);
    }
}
