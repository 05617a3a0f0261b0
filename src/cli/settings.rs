use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    config::{validate_goal, validate_interval, AppLanguage},
    daemon::{
        processing::persistence::{Persistence, PersistedState},
        storage::store::{FileStore, KeyValueStore},
        tracker::ActivityTracker,
        STATE_DIR,
    },
};

use super::process::{restart_server, stop_servers};

/// Edits the cli can make to the persisted state.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsChange {
    AddWorkApp(String),
    RemoveWorkApp(String),
    Goal(f64),
    Interval(u64),
    Language(AppLanguage),
    ResetToday,
}

impl SettingsChange {
    /// Rejects values outside the presets before anything is touched.
    pub fn validate(&self) -> Result<()> {
        match self {
            SettingsChange::Goal(hours) => validate_goal(*hours).map(|_| ()),
            SettingsChange::Interval(seconds) => validate_interval(*seconds).map(|_| ()),
            _ => Ok(()),
        }
    }
}

pub fn open_store(dir: &Path) -> Result<FileStore> {
    Ok(FileStore::new(dir.join(STATE_DIR))?)
}

pub async fn load_state(dir: &Path) -> Result<PersistedState> {
    Persistence::new(open_store(dir)?).load().await
}

/// Applies `change` to the store. Goes through [ActivityTracker] so the cli and the daemon follow
/// the same rules.
pub async fn apply_change(
    store: impl KeyValueStore,
    change: SettingsChange,
    now: DateTime<Utc>,
) -> Result<()> {
    change.validate()?;
    let persistence = Persistence::new(store);
    let state = persistence.load().await?;
    let mut tracker = ActivityTracker::new(state.tracker);

    match change {
        SettingsChange::AddWorkApp(application) => {
            if tracker.set_work_app(&application, true) {
                persistence.save_work_apps(tracker.work_apps()).await?;
            }
        }
        SettingsChange::RemoveWorkApp(application) => {
            if tracker.set_work_app(&application, false) {
                persistence.save_work_apps(tracker.work_apps()).await?;
            }
        }
        SettingsChange::Goal(hours) => {
            tracker.set_default_goal(hours, now);
            persistence
                .save_goals(tracker.current_goal(), tracker.daily_goals())
                .await?;
        }
        SettingsChange::Interval(seconds) => {
            persistence
                .save_update_interval(validate_interval(seconds)?)
                .await?;
        }
        SettingsChange::Language(language) => {
            persistence.save_language(language).await?;
        }
        SettingsChange::ResetToday => {
            tracker.reset_today(now);
            persistence
                .save_session(tracker.current_session_id(), tracker.last_reset_date())
                .await?;
            persistence.save_records(tracker.records()).await?;
        }
    }
    Ok(())
}

/// A running daemon keeps its own copy of the state, so it is stopped (which makes it save),
/// the change is written and the daemon is started again.
pub async fn apply_with_daemon_stopped(dir: &Path, change: SettingsChange) -> Result<()> {
    change.validate()?;
    let was_running = stop_servers()?;
    info!("Applying {change:?}, daemon was running: {was_running}");
    let result = apply_change(open_store(dir)?, change, Utc::now()).await;
    if was_running {
        restart_server(Some(dir))?;
    }
    result
}
