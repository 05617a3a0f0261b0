use anyhow::Result;
use objc2::rc::Retained;
use objc2_app_kit::{NSRunningApplication, NSWorkspace};
use tracing::{instrument, trace};

use super::ActiveWindowObserver;

/// Reads the frontmost application from the shared `NSWorkspace`.
pub struct WorkspaceObserver {}

impl WorkspaceObserver {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WorkspaceObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveWindowObserver for WorkspaceObserver {
    #[instrument(skip(self))]
    fn current_foreground_app(&mut self) -> Result<Option<String>> {
        let workspace = NSWorkspace::sharedWorkspace();
        let Some(application): Option<Retained<NSRunningApplication>> =
            workspace.frontmostApplication()
        else {
            trace!("No frontmost application");
            return Ok(None);
        };
        Ok(application.localizedName().map(|name| name.to_string()))
    }

    /// Window titles are not resolved on this platform; every span is keyed by application only.
    fn current_window_title(&mut self, _application: &str) -> Option<String> {
        None
    }
}
