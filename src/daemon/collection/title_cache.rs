use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

/// How long a looked up title is trusted before asking again.
pub const TITLE_EXPIRATION: Duration = Duration::seconds(30);

/// Short lived application → title cache. Titles are only looked up for browsers, where the tab
/// is the interesting part; every other application resolves to no title without a lookup.
pub struct TitleCache {
    expiration: Duration,
    entries: HashMap<String, CachedTitle>,
}

struct CachedTitle {
    title: Option<Arc<str>>,
    captured_at: DateTime<Utc>,
}

impl Default for TitleCache {
    fn default() -> Self {
        Self::new(TITLE_EXPIRATION)
    }
}

impl TitleCache {
    pub fn new(expiration: Duration) -> Self {
        Self {
            expiration,
            entries: HashMap::new(),
        }
    }

    pub fn is_browser(application: &str) -> bool {
        let name = application.to_lowercase();
        name.contains("safari") || name.contains("chrome")
    }

    /// Returns the cached title of `application` when it is fresh, otherwise refreshes the entry.
    /// `lookup` is only called for browsers.
    pub fn resolve(
        &mut self,
        application: &str,
        now: DateTime<Utc>,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Option<Arc<str>> {
        if let Some(cached) = self.entries.get(application) {
            if now - cached.captured_at < self.expiration {
                return cached.title.clone();
            }
        }

        let title: Option<Arc<str>> = if Self::is_browser(application) {
            trace!("Looking up window title of {application}");
            lookup(application).map(Into::into)
        } else {
            None
        };

        self.entries.insert(
            application.to_string(),
            CachedTitle {
                title: title.clone(),
                captured_at: now,
            },
        );
        title
    }
}
