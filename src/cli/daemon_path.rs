use std::path::PathBuf;

/// Path of the `pacering-daemon` binary installed next to the cli binary `path`.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("pacering-daemon");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
