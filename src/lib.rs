//! Pacering keeps track of which application is in front, adds the time up per application and
//! measures it against a daily work goal. A background daemon does the sampling, the cli reads
//! what it stored.
//!

pub mod analysis;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod fs;
pub mod utils;
pub mod window_api;
