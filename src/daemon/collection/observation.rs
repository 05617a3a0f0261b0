use std::sync::Arc;

use chrono::{DateTime, Utc};

/// What a single sample saw in front of the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub application: Arc<str>,
    pub window_title: Option<Arc<str>>,
    pub moment: DateTime<Utc>,
}
