//! Session accounting. [ActivityTracker] owns the append-only list of spans, decides on every
//! sample whether to grow the last span or start a new one, and derives the daily aggregates
//! (per application totals, goal progress) from it.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Days, Local, NaiveDate, Timelike, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::utils::time::{date_key, local_date};

use super::{
    collection::{observation::Observation, sampler::Sampler},
    storage::entities::ActivityRecord,
};

/// Number of days shown in the goal progress chart.
pub const DEFAULT_PROGRESS_DAYS: u32 = 30;

/// What a sample did to the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    /// The last span was pushed forward.
    Extended,
    /// A new span was started.
    Appended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyProgress {
    pub date: NaiveDate,
    /// Share of the day's goal reached by work applications, in `[0, 1]`.
    pub progress: f64,
}

/// Everything the tracker needs to resume where it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerState {
    pub records: Vec<ActivityRecord>,
    pub current_session_id: Uuid,
    pub work_apps: Vec<String>,
    pub daily_goals: BTreeMap<String, f64>,
    pub current_goal: f64,
    pub last_reset_date: Option<NaiveDate>,
}

pub struct ActivityTracker {
    records: Vec<ActivityRecord>,
    current_session_id: Uuid,
    work_apps: Vec<String>,
    daily_goals: BTreeMap<String, f64>,
    current_goal: f64,
    last_reset_date: Option<NaiveDate>,
}

impl ActivityTracker {
    pub fn new(state: TrackerState) -> Self {
        let TrackerState {
            records,
            current_session_id,
            work_apps,
            daily_goals,
            current_goal,
            last_reset_date,
        } = state;
        Self {
            records,
            current_session_id,
            work_apps,
            daily_goals,
            current_goal,
            last_reset_date,
        }
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn current_session_id(&self) -> Uuid {
        self.current_session_id
    }

    pub fn work_apps(&self) -> &[String] {
        &self.work_apps
    }

    pub fn daily_goals(&self) -> &BTreeMap<String, f64> {
        &self.daily_goals
    }

    pub fn current_goal(&self) -> f64 {
        self.current_goal
    }

    pub fn last_reset_date(&self) -> Option<NaiveDate> {
        self.last_reset_date
    }

    pub fn is_work_app(&self, application: &str) -> bool {
        self.work_apps.iter().any(|app| app == application)
    }

    /// Goal in hours for `date`: the per day override if one was set, otherwise the default goal.
    pub fn effective_goal(&self, date: NaiveDate) -> f64 {
        self.daily_goals
            .get(&date_key(date))
            .copied()
            .unwrap_or(self.current_goal)
    }

    /// One sampling step: looks at what is in front and folds it into the record list. Returns
    /// `None` when nothing could be observed.
    pub fn tick(&mut self, sampler: &mut Sampler, now: DateTime<Utc>) -> Option<RecordChange> {
        let observation = sampler.sample(now)?;
        Some(self.record_observation(observation))
    }

    /// Continuous use of the same application and title on the same day grows the last span;
    /// anything else starts a new one.
    pub fn record_observation(&mut self, observation: Observation) -> RecordChange {
        let Observation {
            application,
            window_title,
            moment,
        } = observation;
        let today = local_date(moment);

        if let Some(last) = self.records.last_mut() {
            if *last.application() == application
                && last.window_title() == window_title.as_ref()
                && last.day() == today
            {
                last.extend_to(moment);
                return RecordChange::Extended;
            }
        }

        let record = ActivityRecord::start(
            application,
            window_title,
            moment,
            self.current_session_id,
            self.effective_goal(today),
            self.work_apps.clone(),
        );
        debug!(
            "Starting record {} for {}",
            record.id(),
            record.application()
        );
        self.records.push(record);
        RecordChange::Appended
    }

    /// Starts a new session and drops every record that started today, whatever its session.
    pub fn reset_today(&mut self, now: DateTime<Utc>) {
        let today = local_date(now);
        let before = self.records.len();
        self.current_session_id = Uuid::new_v4();
        self.records.retain(|record| record.day() != today);
        info!(
            "Reset today, removed {} records, new session {}",
            before - self.records.len(),
            self.current_session_id
        );
    }

    /// Day rollover check. Resets today when the last reset happened on another day and
    /// remembers today as the reset day. Returns whether a reset happened.
    pub fn check_for_new_day(&mut self, now: DateTime<Utc>) -> bool {
        let today = local_date(now);
        if self.last_reset_date == Some(today) {
            return false;
        }
        info!(
            "Day changed from {:?} to {today}",
            self.last_reset_date
        );
        self.reset_today(now);
        self.last_reset_date = Some(today);
        true
    }

    /// Records of the live session in their original order.
    pub fn records_for_current_session(&self) -> Vec<&ActivityRecord> {
        self.current_session_records().collect()
    }

    fn current_session_records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records
            .iter()
            .filter(|record| record.session_id() == self.current_session_id)
    }

    /// Records that started today, from any session.
    pub fn today_records(&self, now: DateTime<Utc>) -> Vec<&ActivityRecord> {
        let today = local_date(now);
        self.records
            .iter()
            .filter(|record| record.day() == today)
            .collect()
    }

    /// Seconds spent per application in the current session.
    pub fn summarize(&self) -> HashMap<Arc<str>, i64> {
        let mut summary = HashMap::<Arc<str>, i64>::new();
        for record in self.current_session_records() {
            *summary.entry(record.application().clone()).or_default() +=
                record.duration_in_seconds();
        }
        summary
    }

    /// Seconds of every record started today.
    pub fn total_active_today(&self, now: DateTime<Utc>) -> i64 {
        self.today_records(now)
            .into_iter()
            .map(ActivityRecord::duration_in_seconds)
            .sum()
    }

    /// Seconds of today's records whose application is currently a work app.
    pub fn work_time_today(&self, now: DateTime<Utc>) -> i64 {
        self.today_records(now)
            .into_iter()
            .filter(|record| self.is_work_app(record.application()))
            .map(ActivityRecord::duration_in_seconds)
            .sum()
    }

    /// Goal progress of the live session against today's goal.
    pub fn current_session_progress(&self, now: DateTime<Utc>) -> f64 {
        let work_seconds = self
            .current_session_records()
            .filter(|record| self.is_work_app(record.application()))
            .map(ActivityRecord::duration_in_seconds)
            .sum();
        goal_progress(work_seconds, self.effective_goal(local_date(now)))
    }

    /// Current session records grouped by the local hour they started in. Only hours with records
    /// are returned, earliest first.
    pub fn hourly_breakdown(&self) -> Vec<(u32, Vec<&ActivityRecord>)> {
        let mut hours = BTreeMap::<u32, Vec<&ActivityRecord>>::new();
        for record in self.current_session_records() {
            let hour = record.start_time().with_timezone(&Local).hour();
            hours.entry(hour).or_default().push(record);
        }
        hours.into_iter().collect()
    }

    /// Goal progress for each of the last `days` days, newest first. Today is measured against
    /// the live work-app set and goal; earlier days use what their records snapshotted, so later
    /// edits never rewrite history.
    pub fn daily_progress_series(&self, days: u32, now: DateTime<Utc>) -> Vec<DailyProgress> {
        let today = local_date(now);
        let mut grouped = HashMap::<NaiveDate, Vec<&ActivityRecord>>::new();
        for record in &self.records {
            grouped.entry(record.day()).or_default().push(record);
        }

        (0..days)
            .map_while(|offset| today.checked_sub_days(Days::new(offset.into())))
            .map(|date| {
                let Some(records) = grouped.get(&date) else {
                    return DailyProgress {
                        date,
                        progress: 0.,
                    };
                };

                let is_today = date == today;
                let work_seconds = records
                    .iter()
                    .filter(|record| {
                        if is_today {
                            self.is_work_app(record.application())
                        } else {
                            record.counted_as_work()
                        }
                    })
                    .map(|record| record.duration_in_seconds())
                    .sum();
                let goal = if is_today {
                    self.effective_goal(today)
                } else {
                    records
                        .first()
                        .map(|record| record.daily_goal())
                        .unwrap_or(self.current_goal)
                };

                DailyProgress {
                    date,
                    progress: goal_progress(work_seconds, goal),
                }
            })
            .collect()
    }

    pub fn set_work_apps(&mut self, work_apps: Vec<String>) {
        self.work_apps = work_apps;
    }

    /// Adds or removes `application` from the work apps. Returns whether the set changed.
    pub fn set_work_app(&mut self, application: &str, is_work: bool) -> bool {
        match (self.is_work_app(application), is_work) {
            (false, true) => {
                self.work_apps.push(application.to_string());
                true
            }
            (true, false) => {
                self.work_apps.retain(|app| app != application);
                true
            }
            _ => false,
        }
    }

    /// Changes the default goal, which also becomes today's goal.
    pub fn set_default_goal(&mut self, hours: f64, now: DateTime<Utc>) {
        self.current_goal = hours;
        self.daily_goals.insert(date_key(local_date(now)), hours);
    }
}

/// Work seconds over a goal in hours, clamped to `[0, 1]`. Goals that can't be divided by give 0.
pub fn goal_progress(work_seconds: i64, goal_hours: f64) -> f64 {
    if !goal_hours.is_finite() || goal_hours <= 0. {
        return 0.;
    }
    (work_seconds.max(0) as f64 / 3600. / goal_hours).min(1.)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use uuid::Uuid;

    use crate::{
        daemon::{
            collection::{observation::Observation, sampler::Sampler, title_cache::TitleCache},
            storage::entities::ActivityRecord,
        },
        utils::time::{date_key, local_to_utc},
        window_api::MockActiveWindowObserver,
    };

    use super::{goal_progress, ActivityTracker, RecordChange, TrackerState};

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 5).unwrap()
    }

    fn noon(date: NaiveDate) -> DateTime<Utc> {
        local_to_utc(NaiveDateTime::new(
            date,
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        ))
    }

    fn today_noon() -> DateTime<Utc> {
        noon(test_date())
    }

    fn tracker(work_apps: &[&str], goal: f64) -> ActivityTracker {
        ActivityTracker::new(TrackerState {
            records: vec![],
            current_session_id: Uuid::new_v4(),
            work_apps: work_apps.iter().map(|v| v.to_string()).collect(),
            daily_goals: BTreeMap::new(),
            current_goal: goal,
            last_reset_date: Some(test_date()),
        })
    }

    fn observation(app: &str, title: Option<&str>, moment: DateTime<Utc>) -> Observation {
        Observation {
            application: app.into(),
            window_title: title.map(Into::into),
            moment,
        }
    }

    fn span(
        tracker: &ActivityTracker,
        app: &str,
        start: DateTime<Utc>,
        seconds: i64,
    ) -> ActivityRecord {
        let mut record = ActivityRecord::start(
            app.into(),
            None,
            start,
            tracker.current_session_id(),
            tracker.current_goal(),
            tracker.work_apps().to_vec(),
        );
        record.extend_to(start + Duration::seconds(seconds));
        record
    }

    #[test]
    fn same_app_and_title_extends_one_record() {
        let mut tracker = tracker(&[], 8.);
        let start = today_noon();

        let mut last_end = None;
        for second in 0..10 {
            let change = tracker.record_observation(observation(
                "Editor",
                Some("main.rs"),
                start + Duration::seconds(second),
            ));
            let expected = if second == 0 {
                RecordChange::Appended
            } else {
                RecordChange::Extended
            };
            assert_eq!(change, expected);
            assert_eq!(tracker.records().len(), 1);

            let end = tracker.records()[0].end_time();
            if let Some(last_end) = last_end {
                assert!(end > last_end);
            }
            last_end = Some(end);
        }
        assert_eq!(tracker.records()[0].duration_in_seconds(), 9);
    }

    #[test]
    fn editor_then_browser_scenario() {
        let mut tracker = tracker(&[], 8.);
        let t0 = today_noon();

        tracker.record_observation(observation("Editor", None, t0));
        tracker.record_observation(observation("Editor", None, t0 + Duration::seconds(5)));
        assert_eq!(tracker.records().len(), 1);
        assert_eq!(
            tracker.records()[0].end_time(),
            t0 + Duration::seconds(5)
        );

        let change =
            tracker.record_observation(observation("Browser", None, t0 + Duration::seconds(6)));
        assert_eq!(change, RecordChange::Appended);
        assert_eq!(tracker.records().len(), 2);
        let browser = &tracker.records()[1];
        assert_eq!(browser.start_time(), t0 + Duration::seconds(6));
        assert_eq!(browser.end_time(), t0 + Duration::seconds(6));
    }

    #[test]
    fn different_title_or_day_appends() {
        let mut tracker = tracker(&[], 8.);
        let t0 = today_noon();

        tracker.record_observation(observation("Safari", Some("News"), t0));
        tracker.record_observation(observation("Safari", Some("Mail"), t0 + Duration::seconds(1)));
        assert_eq!(tracker.records().len(), 2);

        let tomorrow = noon(test_date().succ_opt().unwrap());
        let change = tracker.record_observation(observation("Safari", Some("Mail"), tomorrow));
        assert_eq!(change, RecordChange::Appended);
        assert_eq!(tracker.records().len(), 3);
        assert_eq!(tracker.records()[1].end_time(), t0 + Duration::seconds(1));
    }

    #[test]
    fn new_records_snapshot_settings() {
        let mut tracker = tracker(&["Editor"], 8.);
        let t0 = today_noon();
        tracker.set_default_goal(4., t0);

        tracker.record_observation(observation("Editor", None, t0));
        tracker.set_work_app("Editor", false);
        tracker.set_work_app("Terminal", true);

        let record = &tracker.records()[0];
        assert_eq!(record.daily_goal(), 4.);
        assert_eq!(record.work_apps(), ["Editor".to_string()]);
        assert_eq!(record.session_id(), tracker.current_session_id());
        assert_eq!(tracker.work_apps(), ["Terminal".to_string()]);
    }

    #[test]
    fn tick_uses_the_sampler() {
        let mut observer = MockActiveWindowObserver::new();
        let mut apps = vec![None, Some("Editor".to_string())].into_iter();
        observer
            .expect_current_foreground_app()
            .returning(move || Ok(apps.next().flatten()));
        let mut sampler = Sampler::new(Box::new(observer), TitleCache::default());
        let mut tracker = tracker(&[], 8.);

        assert_eq!(tracker.tick(&mut sampler, today_noon()), None);
        assert!(tracker.records().is_empty());
        assert_eq!(
            tracker.tick(&mut sampler, today_noon()),
            Some(RecordChange::Appended)
        );
        assert_eq!(tracker.records().len(), 1);
    }

    #[test]
    fn reset_today_keeps_earlier_days() {
        let mut tracker = tracker(&[], 8.);
        let yesterday = noon(test_date().pred_opt().unwrap());
        let today = today_noon();
        let old_session = tracker.current_session_id();

        let records = vec![
            span(&tracker, "Editor", yesterday, 60),
            span(&tracker, "Browser", yesterday + Duration::minutes(5), 60),
            span(&tracker, "Editor", today, 60),
            span(&tracker, "Mail", today + Duration::minutes(5), 60),
            span(&tracker, "Editor", today + Duration::minutes(10), 60),
        ];
        tracker.records = records;

        tracker.reset_today(today + Duration::hours(1));

        assert_eq!(tracker.records().len(), 2);
        assert!(tracker.records().iter().all(|r| r.start_time() < today));
        assert_ne!(tracker.current_session_id(), old_session);
        assert!(tracker.records_for_current_session().is_empty());

        tracker.record_observation(observation("Editor", None, today + Duration::hours(2)));
        let session = tracker.records_for_current_session();
        assert_eq!(session.len(), 1);
        assert_eq!(session[0].session_id(), tracker.current_session_id());
    }

    #[test]
    fn session_filter_preserves_order() {
        let mut tracker = tracker(&[], 8.);
        let t0 = today_noon();
        let other = Uuid::new_v4();
        tracker.records = vec![
            span(&tracker, "A", t0, 10),
            span(&tracker, "B", t0 + Duration::seconds(10), 10).with_session(other),
            span(&tracker, "C", t0 + Duration::seconds(20), 10),
        ];

        let names = tracker
            .records_for_current_session()
            .iter()
            .map(|r| r.application().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn summary_matches_session_durations() {
        let mut tracker = tracker(&[], 8.);
        let t0 = today_noon();
        tracker.records = vec![
            span(&tracker, "Editor", t0, 120),
            span(&tracker, "Browser", t0 + Duration::minutes(2), 30),
            span(&tracker, "Editor", t0 + Duration::minutes(3), 45),
            span(&tracker, "Mail", t0 + Duration::minutes(4), 500).with_session(Uuid::new_v4()),
        ];

        let summary = tracker.summarize();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["Editor"], 165);
        assert_eq!(summary["Browser"], 30);

        let session_total: i64 = tracker
            .records_for_current_session()
            .iter()
            .map(|r| r.duration_in_seconds())
            .sum();
        assert_eq!(summary.values().sum::<i64>(), session_total);
    }

    #[test]
    fn progress_scenario_half_goal() {
        let mut tracker = tracker(&["Editor"], 8.);
        let t0 = local_to_utc(NaiveDateTime::new(
            test_date(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ));
        tracker.records = vec![span(&tracker, "Editor", t0, 4 * 3600)];

        let series = tracker.daily_progress_series(30, today_noon());
        assert_eq!(series.len(), 30);
        assert_eq!(series[0].date, test_date());
        assert_eq!(series[0].progress, 0.5);
    }

    #[test]
    fn progress_series_shape() {
        let mut tracker = tracker(&["Editor"], 1.);
        let two_days_ago = test_date().checked_sub_days(chrono::Days::new(2)).unwrap();
        tracker.records = vec![
            span(&tracker, "Editor", noon(two_days_ago), 5 * 3600),
            span(&tracker, "Editor", today_noon(), 1800),
        ];

        let series = tracker.daily_progress_series(30, today_noon());
        assert_eq!(series.len(), 30);
        for (offset, entry) in series.iter().enumerate() {
            assert_eq!(
                entry.date,
                test_date()
                    .checked_sub_days(chrono::Days::new(offset as u64))
                    .unwrap()
            );
            assert!((0. ..=1.).contains(&entry.progress));
        }
        assert_eq!(series[0].progress, 0.5);
        assert_eq!(series[1].progress, 0.);
        // Five hours against a one hour goal is clamped.
        assert_eq!(series[2].progress, 1.);
        assert!(series[3..].iter().all(|v| v.progress == 0.));
    }

    #[test]
    fn past_days_use_snapshots() {
        let mut tracker = tracker(&["Editor"], 4.);
        let yesterday = test_date().pred_opt().unwrap();
        tracker.records = vec![
            span(&tracker, "Editor", noon(yesterday), 3600),
            span(&tracker, "Browser", noon(yesterday) + Duration::hours(1), 3600),
            span(&tracker, "Browser", today_noon(), 3600),
        ];

        // Later edits change how today is counted, never yesterday.
        tracker.set_work_app("Editor", false);
        tracker.set_work_app("Browser", true);
        tracker.set_default_goal(2., today_noon());

        let series = tracker.daily_progress_series(2, today_noon());
        assert_eq!(series[0].progress, 0.5);
        assert_eq!(series[1].progress, 0.25);
    }

    #[test]
    fn day_rollover_resets_once_per_day() {
        let mut tracker = tracker(&[], 8.);
        let today = today_noon();
        tracker.record_observation(observation("Editor", None, today));
        let session = tracker.current_session_id();

        assert!(!tracker.check_for_new_day(today + Duration::minutes(1)));
        assert_eq!(tracker.current_session_id(), session);

        let tomorrow = noon(test_date().succ_opt().unwrap());
        tracker.record_observation(observation("Editor", None, tomorrow));
        assert!(tracker.check_for_new_day(tomorrow + Duration::minutes(1)));
        assert_ne!(tracker.current_session_id(), session);
        assert_eq!(tracker.last_reset_date(), test_date().succ_opt());
        // Yesterday's record survives, tomorrow's is gone.
        assert_eq!(tracker.records().len(), 1);
        assert_eq!(tracker.records()[0].start_time(), today);

        assert!(!tracker.check_for_new_day(tomorrow + Duration::minutes(2)));
    }

    #[test]
    fn today_aggregates() {
        let mut tracker = tracker(&["Editor"], 2.);
        let yesterday = noon(test_date().pred_opt().unwrap());
        let t0 = today_noon();
        tracker.records = vec![
            span(&tracker, "Editor", yesterday, 600).with_session(Uuid::new_v4()),
            span(&tracker, "Editor", t0, 1800),
            span(&tracker, "Browser", t0 + Duration::hours(1), 600),
            span(&tracker, "Editor", t0 + Duration::hours(2), 1800).with_session(Uuid::new_v4()),
        ];

        assert_eq!(tracker.total_active_today(t0), 4200);
        assert_eq!(tracker.work_time_today(t0), 3600);
        assert_eq!(tracker.today_records(t0).len(), 3);
        assert_eq!(tracker.current_session_progress(t0), 0.25);

        let hours = tracker.hourly_breakdown();
        let counts = hours.iter().map(|(_, r)| r.len()).sum::<usize>();
        assert_eq!(counts, 3);
        assert!(hours.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn goal_overrides_per_day() {
        let mut tracker = tracker(&[], 8.);
        tracker.daily_goals.insert(date_key(test_date()), 2.);
        assert_eq!(tracker.effective_goal(test_date()), 2.);
        assert_eq!(tracker.effective_goal(test_date().pred_opt().unwrap()), 8.);

        tracker.record_observation(observation("Editor", None, today_noon()));
        assert_eq!(tracker.records()[0].daily_goal(), 2.);
    }

    #[test]
    fn work_app_edits() {
        let mut tracker = tracker(&["Editor"], 8.);
        assert!(!tracker.set_work_app("Editor", true));
        assert!(!tracker.set_work_app("Mail", false));
        assert!(tracker.set_work_app("Mail", true));
        assert!(tracker.is_work_app("Mail"));

        tracker.set_work_apps(vec!["Terminal".into()]);
        assert!(!tracker.is_work_app("Editor"));
        assert_eq!(tracker.work_apps(), ["Terminal".to_string()]);
    }

    #[test]
    fn degenerate_goals_give_no_progress() {
        assert_eq!(goal_progress(3600, 0.), 0.);
        assert_eq!(goal_progress(3600, f64::NAN), 0.);
        assert_eq!(goal_progress(-10, 1.), 0.);
        assert_eq!(goal_progress(1800, 1.), 0.5);
    }
}
