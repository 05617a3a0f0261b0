use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "pacering-daemon", about = "Background tracker for pacering")]
pub struct DaemonArgs {
    /// Stay in the foreground instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// Application directory holding `state/` and `logs/`.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
