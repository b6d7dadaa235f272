//! YAML cassettes for recording port interactions and replaying them offline.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
