//! Fully resolved units of work and their outcomes.

use std::path::PathBuf;

use uuid::Uuid;

use crate::ports::ModelParameters;

/// A job with every field concrete, ready for the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJob {
    /// Identifier used in logs.
    pub id: Uuid,
    /// Category the job resolved to, if one was needed.
    pub category: Option<String>,
    /// Reference image URLs or paths.
    pub image_urls: Vec<String>,
    /// Prompts to generate; never empty.
    pub prompts: Vec<String>,
    /// Model version passed to the generator.
    pub model_version: String,
    /// Merged generation parameters.
    pub parameters: ModelParameters,
    /// Upload results to remote storage.
    pub save_remotely: bool,
    /// Destination folder for uploads.
    pub storage_folder_id: Option<String>,
}

/// What a finished job produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// The job this report belongs to.
    pub job_id: Uuid,
    /// Local paths of every saved image.
    pub saved: Vec<PathBuf>,
    /// Number of images uploaded to remote storage.
    pub uploaded: usize,
    /// Prompts whose generation failed.
    pub failed_prompts: usize,
}
