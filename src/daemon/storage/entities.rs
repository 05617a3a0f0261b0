use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::local_date;

/// One contiguous span during which the same application (and window title) stayed in front.
/// Identity, application, title, start and the snapshotted goal/work-app set never change after
/// creation; only the end is pushed forward while the span keeps being confirmed.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRecord {
    id: Uuid,
    application: Arc<str>,
    #[serde(default)]
    window_title: Option<Arc<str>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    end_time: DateTime<Utc>,
    session_id: Uuid,
    /// Goal in hours that applied on the day the span started.
    daily_goal: f64,
    /// Applications counted as work when the span started.
    work_apps: Vec<String>,
}

impl ActivityRecord {
    /// Starts a new zero-length span at `moment`.
    pub fn start(
        application: Arc<str>,
        window_title: Option<Arc<str>>,
        moment: DateTime<Utc>,
        session_id: Uuid,
        daily_goal: f64,
        work_apps: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application,
            window_title,
            start_time: moment,
            end_time: moment,
            session_id,
            daily_goal,
            work_apps,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn application(&self) -> &Arc<str> {
        &self.application
    }

    pub fn window_title(&self) -> Option<&Arc<str>> {
        self.window_title.as_ref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn daily_goal(&self) -> f64 {
        self.daily_goal
    }

    pub fn work_apps(&self) -> &[String] {
        &self.work_apps
    }

    /// Moves the end of the span. The end never goes before the start.
    pub fn extend_to(&mut self, end: DateTime<Utc>) {
        self.end_time = end.max(self.start_time);
    }

    pub fn duration_in_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }

    /// Local calendar day the span started on.
    pub fn day(&self) -> NaiveDate {
        local_date(self.start_time)
    }

    /// Whether the snapshotted work-app set of this record contains its own application.
    pub fn counted_as_work(&self) -> bool {
        self.work_apps
            .iter()
            .any(|app| app.as_str() == &*self.application)
    }

    #[cfg(test)]
    pub fn with_session(self, session_id: Uuid) -> Self {
        Self { session_id, ..self }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::ActivityRecord;

    fn record() -> ActivityRecord {
        ActivityRecord::start(
            "Xcode".into(),
            None,
            Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap(),
            Uuid::new_v4(),
            8.,
            vec!["Xcode".into()],
        )
    }

    #[test]
    fn end_never_precedes_start() {
        let mut record = record();
        let start = record.start_time();
        record.extend_to(start - Duration::seconds(10));
        assert_eq!(record.end_time(), start);
        assert_eq!(record.duration_in_seconds(), 0);

        record.extend_to(start + Duration::milliseconds(90_500));
        assert_eq!(record.duration_in_seconds(), 90);
    }

    #[test]
    fn deserializes_without_window_title() {
        let mut value = serde_json::to_value(record()).unwrap();
        value.as_object_mut().unwrap().remove("window_title");
        let decoded: ActivityRecord = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.window_title(), None);
        assert!(decoded.counted_as_work());
    }
}
