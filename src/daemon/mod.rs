use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use collection::{sampler::Sampler, title_cache::TitleCache};
use handle::TrackerHandle;
use processing::{persistence::Persistence, TrackerHost};
use storage::store::{FileStore, KeyValueStore};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracker::ActivityTracker;

use crate::{
    analysis::{client::ChatCompletionClient, AnalysisService},
    config::AnalysisConfig,
    utils::clock::{Clock, DefaultClock},
    window_api::{ActiveWindowObserver, GenericObserver},
};

pub mod args;
pub mod collection;
pub mod handle;
pub mod processing;
pub mod shutdown;
pub mod storage;
pub mod tracker;

/// Subdirectory of the application directory that holds the persisted state.
pub const STATE_DIR: &str = "state";

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let store = FileStore::new(dir.join(STATE_DIR))?;
    std::env::set_current_dir("/")?;

    let observer = GenericObserver::new()?;
    let shutdown_token = CancellationToken::new();

    let (host, handle) = create_host(
        store,
        Box::new(observer),
        Box::new(DefaultClock),
        &shutdown_token,
        create_analysis(),
    )
    .await?;

    let (_, result) = tokio::join!(shutdown::detect_shutdown(shutdown_token.clone()), async {
        let result = host.run().await;
        shutdown_token.cancel();
        result
    });
    drop(handle);

    result.inspect_err(|e| error!("Tracker stopped with an error {e:?}"))
}

fn create_analysis() -> Option<Arc<AnalysisService>> {
    match AnalysisConfig::from_env() {
        Ok(config) => Some(Arc::new(AnalysisService::new(Arc::new(
            ChatCompletionClient::new(config),
        )))),
        Err(e) => {
            info!("Analysis disabled: {e}");
            None
        }
    }
}

/// Restores persisted state and wires a host with a handle to it.
pub async fn create_host<S: KeyValueStore>(
    store: S,
    observer: Box<dyn ActiveWindowObserver>,
    clock: Box<dyn Clock>,
    shutdown_token: &CancellationToken,
    analysis: Option<Arc<AnalysisService>>,
) -> Result<(TrackerHost<S>, TrackerHandle)> {
    let persistence = Persistence::new(store);
    let state = persistence.load().await?;

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
    let handle = TrackerHandle::new(commands_tx, events_tx.clone());

    let host = TrackerHost::new(
        ActivityTracker::new(state.tracker),
        Sampler::new(observer, TitleCache::default()),
        persistence,
        clock,
        commands_rx,
        events_tx,
        shutdown_token.clone(),
        analysis,
        state.update_interval,
    );
    Ok((host, handle))
}
