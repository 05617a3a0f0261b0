use std::{collections::BTreeMap, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::{AppLanguage, DEFAULT_GOAL_HOURS, DEFAULT_UPDATE_INTERVAL, DEFAULT_WORK_APPS},
    daemon::{
        storage::{entities::ActivityRecord, store::KeyValueStore},
        tracker::TrackerState,
    },
};

pub const ACTIVITY_RECORDS: &str = "activity_records";
pub const WORK_APPS: &str = "work_apps";
pub const DAILY_GOALS: &str = "daily_goals";
pub const CURRENT_SESSION_ID: &str = "current_session_id";
pub const LAST_RESET_DATE: &str = "last_reset_date";
pub const WORK_TIME: &str = "work_time";
pub const APP_LANGUAGE: &str = "app_language";
pub const UPDATE_INTERVAL: &str = "update_interval";

/// Everything restored on startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub tracker: TrackerState,
    pub update_interval: Duration,
    pub language: AppLanguage,
}

/// Maps tracker state onto store keys. Values are JSON. Loading never fails on bad data: a value
/// that can't be read or decoded is logged and replaced with its default.
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<PersistedState> {
        let records = self
            .read_value::<Vec<ActivityRecord>>(ACTIVITY_RECORDS)
            .await?
            .unwrap_or_default();
        let work_apps = self
            .read_value::<Vec<String>>(WORK_APPS)
            .await?
            .unwrap_or_else(|| DEFAULT_WORK_APPS.map(String::from).to_vec());
        let daily_goals = self
            .read_value::<BTreeMap<String, f64>>(DAILY_GOALS)
            .await?
            .unwrap_or_default();
        let current_goal = self
            .read_value::<f64>(WORK_TIME)
            .await?
            .unwrap_or(DEFAULT_GOAL_HOURS);
        let last_reset_date = self.read_value::<NaiveDate>(LAST_RESET_DATE).await?;
        let language = self
            .read_value::<AppLanguage>(APP_LANGUAGE)
            .await?
            .unwrap_or_default();
        let update_interval = self
            .read_value::<u64>(UPDATE_INTERVAL)
            .await?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL);

        let current_session_id = match self.read_value::<Uuid>(CURRENT_SESSION_ID).await? {
            Some(v) => v,
            None => {
                let session_id = Uuid::new_v4();
                info!("No session found, starting {session_id}");
                if let Err(e) = self.save_session(session_id, last_reset_date).await {
                    warn!("Failed to store new session {session_id}: {e:?}");
                }
                session_id
            }
        };

        debug!(
            "Loaded {} records, session {current_session_id}",
            records.len()
        );

        Ok(PersistedState {
            tracker: TrackerState {
                records,
                current_session_id,
                work_apps,
                daily_goals,
                current_goal,
                last_reset_date,
            },
            update_interval,
            language,
        })
    }

    pub async fn save_records(&self, records: &[ActivityRecord]) -> Result<()> {
        self.write_value(ACTIVITY_RECORDS, &records).await
    }

    pub async fn save_work_apps(&self, work_apps: &[String]) -> Result<()> {
        self.write_value(WORK_APPS, &work_apps).await
    }

    pub async fn save_goals(&self, current_goal: f64, daily_goals: &BTreeMap<String, f64>) -> Result<()> {
        self.write_value(WORK_TIME, &current_goal).await?;
        self.write_value(DAILY_GOALS, daily_goals).await
    }

    /// The session id and the reset marker always change together.
    pub async fn save_session(
        &self,
        session_id: Uuid,
        last_reset_date: Option<NaiveDate>,
    ) -> Result<()> {
        self.write_value(CURRENT_SESSION_ID, &session_id).await?;
        match last_reset_date {
            Some(date) => self.write_value(LAST_RESET_DATE, &date).await,
            None => Ok(()),
        }
    }

    pub async fn save_update_interval(&self, interval: Duration) -> Result<()> {
        self.write_value(UPDATE_INTERVAL, &interval.as_secs()).await
    }

    pub async fn save_language(&self, language: AppLanguage) -> Result<()> {
        self.write_value(APP_LANGUAGE, &language).await
    }

    /// Writes every tracker owned key.
    pub async fn save_tracker(&self, state: &TrackerState) -> Result<()> {
        self.save_records(&state.records).await?;
        self.save_work_apps(&state.work_apps).await?;
        self.save_goals(state.current_goal, &state.daily_goals).await?;
        self.save_session(state.current_session_id, state.last_reset_date)
            .await
    }

    async fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = match self.store.read(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Failed to read {key}, using default: {e:?}");
                return Ok(None);
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Discarding undecodable value for {key}: {e}");
                Ok(None)
            }
        }
    }

    async fn write_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.write(key, &bytes).await
    }
}
