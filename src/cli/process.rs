use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Context, Result};
use sysinfo::{get_current_pid, Process, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// A daemon is either `pacering serve` or the standalone `pacering-daemon` binary next to it.
fn is_daemon(process: &Process, cli: &Path, daemon: &Path) -> bool {
    let Some(exe) = process.exe().filter(|v| v.exists()) else {
        return false;
    };
    if exe == daemon {
        return true;
    }
    exe == cli && process.cmd().iter().any(|arg| arg == OsStr::new("serve"))
}

/// Stops every running daemon and waits for it to exit. Returns whether one was running.
pub fn kill_previous_servers(cli: &Path) -> Result<bool> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("{e}"))?;
    let daemon = to_daemon_path(cli.to_path_buf());
    let mut killed = false;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if is_daemon(process, cli, &daemon) {
            info!("Stopping daemon {pid}");
            // SIGTERM lets the daemon write its records before exiting.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            killed = true;
        }
    }
    Ok(killed)
}

fn current_cli() -> Result<PathBuf> {
    env::current_exe().context("Can't operate without an executable")
}

/// Stops running daemons. Returns whether one was running.
pub fn stop_servers() -> Result<bool> {
    kill_previous_servers(&current_cli()?)
}

/// Intended for shutting down previous server and starting new one. The new server is a detached
/// `serve` process of this executable.
pub fn restart_server(dir: Option<&Path>) -> Result<()> {
    let process_name = current_cli()?;
    kill_previous_servers(&process_name)?;
    let mut command = std::process::Command::new(process_name);
    command.arg("serve");
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
    }
    #[cfg(not(unix))]
    {
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}
