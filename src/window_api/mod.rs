//! Contains logic for finding out which application is in front.
//! [GenericObserver] is the main artifact of this module that abstracts
//! the operations.

#[cfg(target_os = "macos")]
pub mod macos;

use anyhow::Result;
#[cfg(test)]
use mockall::automock;

/// Intended to serve as a contract every supported platform must implement.
#[cfg_attr(test, automock)]
pub trait ActiveWindowObserver: Send {
    /// Name of the foregrounded application, e.g. `Xcode` or `Google Chrome`. `None` when nothing
    /// is in front (login window, screen saver, a transition between spaces).
    fn current_foreground_app(&mut self) -> Result<Option<String>>;

    /// Best-effort title of the front window or tab of `application`. Lookups that fail yield
    /// `None`.
    fn current_window_title(&mut self, application: &str) -> Option<String>;
}

/// Serves as a cross-compatible [ActiveWindowObserver] implementation.
pub struct GenericObserver {
    inner: Box<dyn ActiveWindowObserver>,
}

impl GenericObserver {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                use macos::WorkspaceObserver;
                Ok(Self {
                    inner: Box::new(WorkspaceObserver::new()),
                })
            }
            else {
                Err(anyhow::anyhow!("No active window observer exists for this platform"))
            }
        }
    }
}

impl ActiveWindowObserver for GenericObserver {
    fn current_foreground_app(&mut self) -> Result<Option<String>> {
        self.inner.current_foreground_app()
    }

    fn current_window_title(&mut self, application: &str) -> Option<String> {
        self.inner.current_window_title(application)
    }
}
