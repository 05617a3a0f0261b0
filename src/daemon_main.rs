use std::{env::args, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use pacering::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> ExitCode {
    match run_service(args().collect::<Vec<_>>()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Daemon failed {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    if !args.force {
        #[cfg(unix)]
        {
            use daemonize::Daemonize;
            use tracing::error;

            let daemonize = Daemonize::new()
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent
                        .inspect_err(|e| error!("Failed to create daemon on parent side {e:?}"))?;
                    println!("Created daemon");
                    return Ok(());
                }
                daemonize::Outcome::Child(_) => (),
            }
        }
    }

    run(args)
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    single_thread_runtime()?.block_on(async move { start_daemon(app_dir).await })?;
    Ok(())
}
