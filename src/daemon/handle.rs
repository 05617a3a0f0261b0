use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use uuid::Uuid;

use crate::{
    analysis::AnalysisState,
    config::{validate_goal, validate_interval},
};

use super::{storage::entities::ActivityRecord, tracker::DailyProgress};

/// Messages accepted by the [TrackerHost](super::processing::TrackerHost). Queries carry the
/// sender their answer goes to.
#[derive(Debug)]
pub enum TrackerCommand {
    SetUpdateInterval(Duration),
    SetDefaultGoal(f64),
    SetWorkApp {
        application: String,
        is_work: bool,
    },
    ResetToday,
    GenerateAnalysis {
        response_tx: oneshot::Sender<Result<watch::Receiver<AnalysisState>>>,
    },
    Summary {
        response_tx: oneshot::Sender<HashMap<Arc<str>, i64>>,
    },
    DailyProgress {
        days: u32,
        response_tx: oneshot::Sender<Vec<DailyProgress>>,
    },
    CurrentSessionRecords {
        response_tx: oneshot::Sender<Vec<ActivityRecord>>,
    },
}

/// Published after the host changed something.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    RecordsChanged,
    SessionReset { session_id: Uuid },
    SettingsChanged,
}

/// Cheap to clone entry point for talking to a running tracker from inside the same process.
/// The daemon binary itself never sends commands, the cli edits the store instead; this is the
/// surface for embedding the tracker in a host application.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<TrackerCommand>,
    events: broadcast::Sender<TrackerEvent>,
}

impl TrackerHandle {
    pub fn new(
        commands: mpsc::Sender<TrackerCommand>,
        events: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self { commands, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Only the interval presets are accepted.
    pub async fn set_update_interval(&self, seconds: u64) -> Result<()> {
        let interval = validate_interval(seconds)?;
        self.send(TrackerCommand::SetUpdateInterval(interval)).await
    }

    /// Only the goal presets are accepted.
    pub async fn set_default_goal(&self, hours: f64) -> Result<()> {
        let hours = validate_goal(hours)?;
        self.send(TrackerCommand::SetDefaultGoal(hours)).await
    }

    pub async fn set_work_app(&self, application: impl Into<String>, is_work: bool) -> Result<()> {
        self.send(TrackerCommand::SetWorkApp {
            application: application.into(),
            is_work,
        })
        .await
    }

    pub async fn reset_today(&self) -> Result<()> {
        self.send(TrackerCommand::ResetToday).await
    }

    /// Starts an analysis of today's records and returns a receiver tracking its progress.
    pub async fn generate_analysis(&self) -> Result<watch::Receiver<AnalysisState>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TrackerCommand::GenerateAnalysis { response_tx })
            .await?;
        response_rx.await?
    }

    pub async fn summary(&self) -> Result<HashMap<Arc<str>, i64>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TrackerCommand::Summary { response_tx }).await?;
        Ok(response_rx.await?)
    }

    pub async fn daily_progress(&self, days: u32) -> Result<Vec<DailyProgress>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TrackerCommand::DailyProgress { days, response_tx })
            .await?;
        Ok(response_rx.await?)
    }

    pub async fn current_session_records(&self) -> Result<Vec<ActivityRecord>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(TrackerCommand::CurrentSessionRecords { response_tx })
            .await?;
        Ok(response_rx.await?)
    }

    async fn send(&self, command: TrackerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Tracker is no longer running"))
    }
}
