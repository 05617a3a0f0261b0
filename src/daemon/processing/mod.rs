use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use futures::future::OptionFuture;
use persistence::Persistence;
use tokio::{
    select,
    sync::{broadcast, mpsc, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{
    analysis::{AnalysisService, AnalysisState},
    utils::{clock::Clock, time::local_date},
};

use super::{
    collection::sampler::Sampler,
    handle::{TrackerCommand, TrackerEvent},
    storage::store::KeyValueStore,
    tracker::ActivityTracker,
};

pub mod persistence;

/// How often the calendar day is checked for a change.
pub const ROLLOVER_INTERVAL: Duration = Duration::from_secs(60);

/// Quiet period after the last record change before the records are written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(3);

/// Upper bound on how long a change may stay unsaved. Sampling every second never leaves a quiet
/// period otherwise.
pub const SAVE_MAX_DELAY: Duration = Duration::from_secs(30);

/// Owns the tracker and is the only place its state changes. Sampling, day rollover, saving and
/// commands from [TrackerHandle](super::handle::TrackerHandle)s are all served from one loop, so
/// they never interleave.
pub struct TrackerHost<S> {
    tracker: ActivityTracker,
    sampler: Sampler,
    persistence: Persistence<S>,
    clock: Box<dyn Clock>,
    commands: mpsc::Receiver<TrackerCommand>,
    events: broadcast::Sender<TrackerEvent>,
    shutdown_token: CancellationToken,
    analysis: Option<Arc<AnalysisService>>,
    update_interval: Duration,
    next_sample: Instant,
    next_rollover: Instant,
    save_deadline: Option<Instant>,
    unsaved_since: Option<Instant>,
}

impl<S: KeyValueStore> TrackerHost<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tracker: ActivityTracker,
        sampler: Sampler,
        persistence: Persistence<S>,
        clock: Box<dyn Clock>,
        commands: mpsc::Receiver<TrackerCommand>,
        events: broadcast::Sender<TrackerEvent>,
        shutdown_token: CancellationToken,
        analysis: Option<Arc<AnalysisService>>,
        update_interval: Duration,
    ) -> Self {
        let now = clock.instant();
        Self {
            tracker,
            sampler,
            persistence,
            clock,
            commands,
            events,
            shutdown_token,
            analysis,
            update_interval,
            next_sample: now,
            next_rollover: now + ROLLOVER_INTERVAL,
            save_deadline: None,
            unsaved_since: None,
        }
    }

    /// Runs until the shutdown token is cancelled or every handle is gone. Pending records are
    /// written before returning.
    pub async fn run(mut self) -> Result<()> {
        self.check_for_new_day().await;

        loop {
            select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutting down tracker");
                    break;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.process_command(command).await,
                        None => {
                            info!("Every handle was dropped, stopping tracker");
                            break;
                        }
                    }
                }
                _ = self.clock.sleep_until(self.next_sample) => {
                    self.next_sample = self.next_deadline(self.next_sample, self.update_interval);
                    self.sample();
                }
                _ = self.clock.sleep_until(self.next_rollover) => {
                    self.next_rollover = self.next_deadline(self.next_rollover, ROLLOVER_INTERVAL);
                    self.check_for_new_day().await;
                }
                Some(_) = OptionFuture::from(self.save_deadline.map(|v| self.clock.sleep_until(v))) => {
                    self.save_records().await;
                }
            }
        }

        self.save_records().await;
        Ok(())
    }

    /// Deadlines that fell behind (the machine slept) fire once and then continue from now.
    fn next_deadline(&self, previous: Instant, period: Duration) -> Instant {
        (previous + period).max(self.clock.instant())
    }

    fn sample(&mut self) {
        let now = self.clock.time();
        if let Some(change) = self.tracker.tick(&mut self.sampler, now) {
            debug!("Sample at {now} {change:?}");
            self.schedule_save();
            self.publish(TrackerEvent::RecordsChanged);
        }
    }

    fn schedule_save(&mut self) {
        let now = self.clock.instant();
        let unsaved_since = *self.unsaved_since.get_or_insert(now);
        self.save_deadline = Some((now + SAVE_DEBOUNCE).min(unsaved_since + SAVE_MAX_DELAY));
    }

    async fn check_for_new_day(&mut self) {
        if self.tracker.check_for_new_day(self.clock.time()) {
            self.after_reset().await;
        }
    }

    /// A reset drops records, so they are written right away rather than debounced.
    async fn after_reset(&mut self) {
        let session_id = self.tracker.current_session_id();
        if let Err(e) = self
            .persistence
            .save_session(session_id, self.tracker.last_reset_date())
            .await
        {
            error!("Failed to save session {e:?}");
        }
        self.save_records().await;
        self.publish(TrackerEvent::SessionReset { session_id });
        self.publish(TrackerEvent::RecordsChanged);
    }

    #[instrument(skip(self))]
    async fn save_records(&mut self) {
        self.save_deadline = None;
        self.unsaved_since = None;
        if let Err(e) = self.persistence.save_records(self.tracker.records()).await {
            error!("Failed to save records {e:?}");
        }
    }

    async fn process_command(&mut self, command: TrackerCommand) {
        debug!("Processing command {command:?}");
        match command {
            TrackerCommand::SetUpdateInterval(interval) => {
                self.update_interval = interval;
                self.next_sample = self.clock.instant() + interval;
                self.log_error(self.persistence.save_update_interval(interval).await);
                self.publish(TrackerEvent::SettingsChanged);
            }
            TrackerCommand::SetDefaultGoal(hours) => {
                self.tracker.set_default_goal(hours, self.clock.time());
                self.log_error(
                    self.persistence
                        .save_goals(self.tracker.current_goal(), self.tracker.daily_goals())
                        .await,
                );
                self.publish(TrackerEvent::SettingsChanged);
            }
            TrackerCommand::SetWorkApp {
                application,
                is_work,
            } => {
                if self.tracker.set_work_app(&application, is_work) {
                    self.log_error(
                        self.persistence
                            .save_work_apps(self.tracker.work_apps())
                            .await,
                    );
                    self.publish(TrackerEvent::SettingsChanged);
                }
            }
            TrackerCommand::ResetToday => {
                self.tracker.reset_today(self.clock.time());
                self.after_reset().await;
            }
            TrackerCommand::GenerateAnalysis { response_tx } => {
                let _ = response_tx.send(self.start_analysis());
            }
            TrackerCommand::Summary { response_tx } => {
                let _ = response_tx.send(self.tracker.summarize());
            }
            TrackerCommand::DailyProgress { days, response_tx } => {
                let _ = response_tx.send(
                    self.tracker
                        .daily_progress_series(days, self.clock.time()),
                );
            }
            TrackerCommand::CurrentSessionRecords { response_tx } => {
                let records = self
                    .tracker
                    .records_for_current_session()
                    .into_iter()
                    .cloned()
                    .collect();
                let _ = response_tx.send(records);
            }
        }
    }

    /// The request runs on its own task so sampling carries on while it is in flight.
    fn start_analysis(&self) -> Result<watch::Receiver<AnalysisState>> {
        let service = self
            .analysis
            .clone()
            .ok_or_else(|| anyhow!("Analysis is not configured"))?;
        let now = self.clock.time();
        let records = self
            .tracker
            .today_records(now)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let receiver = service.subscribe();
        tokio::spawn(async move {
            service.analyze(&records, local_date(now)).await;
        });
        Ok(receiver)
    }

    fn publish(&self, event: TrackerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn log_error(&self, result: Result<()>) {
        if let Err(e) = result {
            error!("Failed to save settings {e:?}");
        }
    }
}
