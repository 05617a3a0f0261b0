//! User facing knobs: the preset lists offered for the sampling interval and the daily goal,
//! the interface language, and where the analysis requests go.

use std::{fmt::Display, time::Duration};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Sampling intervals offered to the user, in seconds.
pub const INTERVAL_PRESETS: [u64; 6] = [1, 5, 10, 15, 30, 300];

/// Daily work goals offered to the user, in hours.
pub const GOAL_PRESETS: [f64; 6] = [0.5, 1., 2., 4., 8., 12.];

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_GOAL_HOURS: f64 = 8.;

/// Applications counted as work until the user edits the list.
pub const DEFAULT_WORK_APPS: [&str; 5] = [
    "Microsoft Excel",
    "Microsoft Outlook",
    "Google Chrome",
    "Pacering",
    "Xcode",
];

pub fn validate_interval(seconds: u64) -> Result<Duration> {
    if INTERVAL_PRESETS.contains(&seconds) {
        Ok(Duration::from_secs(seconds))
    } else {
        Err(anyhow!(
            "Interval {seconds}s is not one of {INTERVAL_PRESETS:?}"
        ))
    }
}

pub fn validate_goal(hours: f64) -> Result<f64> {
    if GOAL_PRESETS.iter().any(|v| (v - hours).abs() < f64::EPSILON) {
        Ok(hours)
    } else {
        Err(anyhow!("Goal {hours}h is not one of {GOAL_PRESETS:?}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AppLanguage {
    #[default]
    #[serde(rename = "en")]
    #[value(name = "en")]
    English,
    #[serde(rename = "zh")]
    #[value(name = "zh")]
    Chinese,
}

impl Display for AppLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppLanguage::English => write!(f, "en"),
            AppLanguage::Chinese => write!(f, "zh"),
        }
    }
}

const API_KEY_VAR: &str = "PACERING_API_KEY";
const API_URL_VAR: &str = "PACERING_API_URL";
const MODEL_VAR: &str = "PACERING_MODEL";

const DEFAULT_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const DEFAULT_MODEL: &str = "glm-4-flash";

/// Where insight requests are sent to. Read from the environment so the key never lands in the
/// state directory.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{API_KEY_VAR} must be set to generate an analysis"))?;
        Ok(Self {
            api_key,
            api_url: lookup(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.into()),
            model: lookup(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.into()),
        })
    }
}
