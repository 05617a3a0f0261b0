use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::{
    daemon::tracker::{ActivityTracker, DailyProgress},
    utils::time::{format_hours_minutes, format_minutes_seconds, local_date},
};

const PROGRESS_BAR_WIDTH: usize = 20;

#[derive(Debug, PartialEq)]
pub struct AppUsage {
    pub application: Arc<str>,
    pub seconds: i64,
    pub is_work: bool,
}

/// Current session usage per application, most used first.
pub fn app_usage(tracker: &ActivityTracker) -> Vec<AppUsage> {
    let mut usages = tracker
        .summarize()
        .into_iter()
        .map(|(application, seconds)| AppUsage {
            is_work: tracker.is_work_app(&application),
            application,
            seconds,
        })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| {
        b.seconds
            .cmp(&a.seconds)
            .then_with(|| a.application.cmp(&b.application))
    });
    usages
}

/// Lines of the `today` command.
pub fn today_report(tracker: &ActivityTracker, now: DateTime<Utc>) -> Vec<String> {
    let goal = tracker.effective_goal(local_date(now));
    let mut lines = vec![
        format!(
            "Active today\t{}",
            format_hours_minutes(tracker.total_active_today(now))
        ),
        format!(
            "Work today\t{}",
            format_hours_minutes(tracker.work_time_today(now))
        ),
        format!(
            "Goal progress\t{}% of {goal}h",
            percent(tracker.current_session_progress(now))
        ),
    ];

    let usages = app_usage(tracker);
    if !usages.is_empty() {
        lines.push(String::new());
    }
    for usage in usages {
        lines.push(format!(
            "{}\t{}\t{}",
            format_hours_minutes(usage.seconds),
            if usage.is_work { "work" } else { "personal" },
            usage.application
        ));
    }
    lines
}

/// Lines of the `timeline` command: an hour header followed by the records that started in it.
pub fn timeline_report(tracker: &ActivityTracker) -> Vec<String> {
    let mut lines = vec![];
    for (hour, records) in tracker.hourly_breakdown() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("{hour:02}:00"));
        for record in records {
            let mut line = format!(
                "  {}\t{}\t{}",
                record.start_time().with_timezone(&Local).format("%H:%M:%S"),
                format_minutes_seconds(record.duration_in_seconds()),
                record.application()
            );
            if let Some(title) = record.window_title() {
                line.push('\t');
                line.push_str(title);
            }
            lines.push(line);
        }
    }
    lines
}

/// Lines of the `progress` command, newest day first.
pub fn progress_report(series: &[DailyProgress]) -> Vec<String> {
    series
        .iter()
        .map(|entry| {
            let filled = (entry.progress * PROGRESS_BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(PROGRESS_BAR_WIDTH);
            format!(
                "{}\t{:>3}%\t{}{}",
                entry.date.format("%Y-%m-%d"),
                percent(entry.progress),
                "#".repeat(filled),
                ".".repeat(PROGRESS_BAR_WIDTH - filled)
            )
        })
        .collect()
}

fn percent(progress: f64) -> u32 {
    (progress * 100.).round() as u32
}
