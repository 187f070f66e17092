use anyhow::Result;
use log::info;

use droid_dash::droid::session_view::group_sessions_by;
use droid_dash::droid::{DroidDataManager, GroupBy};
use droid_dash::shared::{format_cost, format_duration, format_tokens, logging, Config};

const TOP_PROJECTS: usize = 5;

fn main() -> Result<()> {
    logging::init();

    let config = Config::load();
    info!("Reading sessions from {}", config.sessions_dir().display());
    let manager = DroidDataManager::from_config(&config);
    let stats = manager.stats();
    let estimator = manager.cost_estimator();

    if stats.total_sessions == 0 {
        println!("No sessions found in {}", manager.sessions_dir().display());
        return Ok(());
    }

    println!("Droid sessions in {}", manager.sessions_dir().display());
    println!(
        "  {} sessions, {} tokens, {} active, {} estimated",
        stats.total_sessions,
        format_tokens(stats.total_tokens.total_tokens()),
        format_duration(stats.total_active_time_ms),
        format_cost(manager.total_cost()),
    );
    if let (Some(first), Some(last)) = stats.date_range {
        println!("  {} to {}", first.date_naive(), last.date_naive());
    }

    let daily = manager.aggregator().get_daily_stats();
    if let Some((day, tokens)) = daily.peak_token_day {
        println!(
            "  {} active days, median {} tokens/day, peak {} on {day}",
            daily.active_days,
            format_tokens(daily.median_daily_tokens.round() as u64),
            format_tokens(tokens),
        );
    }

    println!();
    println!("Groups");
    for group in &stats.project_groups {
        let sessions: Vec<_> = group.projects.iter().flat_map(|p| &p.sessions).collect();
        println!(
            "  {:<20} {:>4} sessions {:>3} projects {:>8} {:>10}",
            group.name,
            group.session_count(),
            group.project_count(),
            format_tokens(group.total_tokens().total_tokens()),
            format_cost(estimator.estimate_total_cost(sessions)),
        );
    }

    println!();
    println!("Top projects by tokens");
    for project in manager.aggregator().get_top_projects_by_tokens(TOP_PROJECTS) {
        println!(
            "  {:<30} {:>8} {:>8} {:>10}",
            project.name,
            format_tokens(project.total_tokens().total_tokens()),
            format_duration(project.total_active_time_ms()),
            format_cost(estimator.estimate_total_cost(&project.sessions)),
        );
    }

    println!();
    println!("Models");
    let visible = manager.visible_sessions(&config.display);
    for bucket in group_sessions_by(&visible, GroupBy::Model) {
        println!(
            "  {:<12} {:>4} sessions {:>8}",
            bucket.key,
            bucket.sessions.len(),
            format_tokens(bucket.total_tokens()),
        );
    }

    Ok(())
}
