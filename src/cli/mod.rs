pub mod daemon_path;
pub mod process;
pub mod report;
pub mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use process::{restart_server, stop_servers};
use settings::{apply_with_daemon_stopped, load_state, SettingsChange};
use tracing::level_filters::LevelFilter;

use crate::{
    analysis::{client::ChatCompletionClient, AnalysisService},
    config::{AnalysisConfig, AppLanguage},
    daemon::{
        start_daemon,
        tracker::{ActivityTracker, DEFAULT_PROGRESS_DAYS},
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::local_date,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Pacering", version, long_about = None)]
#[command(about = "Tracks the application in front and measures it against a daily work goal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $HOME/Library/Application Support/pacering on macOS"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Usage of the current session per application")]
    Today {},
    #[command(about = "Records of the current session grouped by hour")]
    Timeline {},
    #[command(about = "Daily goal progress, newest day first")]
    Progress {
        #[arg(long, default_value_t = DEFAULT_PROGRESS_DAYS)]
        days: u32,
    },
    #[command(about = "Applications counted as work")]
    WorkApps {
        #[command(subcommand)]
        command: WorkAppsCommand,
    },
    #[command(about = "Set the daily goal in hours. One of 0.5, 1, 2, 4, 8, 12")]
    Goal { hours: f64 },
    #[command(about = "Set the sampling interval in seconds. One of 1, 5, 10, 15, 30, 300")]
    Interval { seconds: u64 },
    #[command(about = "Set the interface language")]
    Language { language: AppLanguage },
    #[command(about = "Start a new session and forget today's records")]
    Reset {},
    #[command(about = "Ask a language model for insights about today. Needs PACERING_API_KEY")]
    Analyze {
        #[arg(long, help = "Language of the printed report. Defaults to the configured one")]
        language: Option<AppLanguage>,
    },
}

#[derive(Subcommand, Debug)]
enum WorkAppsCommand {
    List {},
    Add { application: String },
    Remove { application: String },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let dir = args.dir.map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => restart_server(Some(&dir)),
        Commands::Stop {} => {
            if !stop_servers()? {
                println!("No daemon is running");
            }
            Ok(())
        }
        Commands::Serve {} => start_daemon(dir).await,
        Commands::Today {} => {
            let tracker = ActivityTracker::new(load_state(&dir).await?.tracker);
            print_lines(report::today_report(&tracker, Utc::now()));
            Ok(())
        }
        Commands::Timeline {} => {
            let tracker = ActivityTracker::new(load_state(&dir).await?.tracker);
            print_lines(report::timeline_report(&tracker));
            Ok(())
        }
        Commands::Progress { days } => {
            let tracker = ActivityTracker::new(load_state(&dir).await?.tracker);
            print_lines(report::progress_report(
                &tracker.daily_progress_series(days, Utc::now()),
            ));
            Ok(())
        }
        Commands::WorkApps { command } => match command {
            WorkAppsCommand::List {} => {
                print_lines(load_state(&dir).await?.tracker.work_apps);
                Ok(())
            }
            WorkAppsCommand::Add { application } => {
                apply_with_daemon_stopped(&dir, SettingsChange::AddWorkApp(application)).await
            }
            WorkAppsCommand::Remove { application } => {
                apply_with_daemon_stopped(&dir, SettingsChange::RemoveWorkApp(application)).await
            }
        },
        Commands::Goal { hours } => {
            apply_with_daemon_stopped(&dir, SettingsChange::Goal(hours)).await
        }
        Commands::Interval { seconds } => {
            apply_with_daemon_stopped(&dir, SettingsChange::Interval(seconds)).await
        }
        Commands::Language { language } => {
            apply_with_daemon_stopped(&dir, SettingsChange::Language(language)).await
        }
        Commands::Reset {} => apply_with_daemon_stopped(&dir, SettingsChange::ResetToday).await,
        Commands::Analyze { language } => {
            let state = load_state(&dir).await?;
            let language = language.unwrap_or(state.language);
            let service = AnalysisService::new(Arc::new(ChatCompletionClient::new(
                AnalysisConfig::from_env()?,
            )));

            let now = Utc::now();
            let result = service
                .analyze(&state.tracker.records, local_date(now))
                .await;
            if let Some(error) = result.error {
                return Err(anyhow!(error));
            }
            match result.result(language) {
                Some(report) => println!("{report}"),
                None => println!("No analysis was produced"),
            }
            Ok(())
        }
    }
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}
