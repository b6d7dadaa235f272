//! Inbound job requests as accepted by the endpoint and the CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which stored instruction variant list feeds prompt generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Draw from the record's `standard_prompt` list.
    #[default]
    Standard,
    /// Draw from the record's `dynamic_prompt` list.
    #[serde(alias = "dynamic")]
    Random,
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "random" | "dynamic" => Ok(Self::Random),
            other => Err(format!("Unknown mode '{other}'. Valid: standard, random")),
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Random => f.write_str("random"),
        }
    }
}

/// How one image is picked from each source folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSelectionStrategy {
    /// Any image in the folder.
    #[default]
    Random,
    /// Only images not yet marked with the used-prefix; the pick gets marked.
    Unused,
}

impl FromStr for ImageSelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "unused" => Ok(Self::Unused),
            other => Err(format!("Unknown image selection strategy '{other}'. Valid: random, unused")),
        }
    }
}

/// A partially specified generation job.
///
/// Absent fields are filled in by the resolvers. `Some(vec![])` for
/// `image_urls` or `prompts` counts as supplied: it suppresses lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    /// Content category; picked at random when needed and absent.
    pub category: Option<String>,
    /// Lower bound on generated prompt count.
    #[serde(alias = "min_val")]
    pub min_count: Option<i64>,
    /// Upper bound on generated prompt count; also the fan-out count.
    #[serde(alias = "max_val")]
    pub max_count: Option<i64>,
    /// Resolution override.
    pub resolution: Option<String>,
    /// Aspect ratio override.
    pub aspect_ratio: Option<String>,
    /// Instruction variant list selector.
    pub mode: PromptMode,
    /// Stored model parameter record to use.
    pub model_version: Option<String>,
    /// Explicit reference images.
    pub image_urls: Option<Vec<String>>,
    /// Explicit prompts.
    pub prompts: Option<Vec<String>>,
    /// Upload outputs to remote storage.
    pub save_remotely: bool,
    /// Remote storage folder for uploads.
    #[serde(alias = "drive_folder_id")]
    pub storage_folder_id: Option<String>,
    /// Fan this request out into several jobs.
    pub duplicate: bool,
    /// Strategy for picking from `source_folder_ids`.
    pub image_selection_strategy: ImageSelectionStrategy,
    /// Remote folders to draw one reference image from each.
    pub source_folder_ids: Option<Vec<String>>,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            category: None,
            min_count: None,
            max_count: None,
            resolution: None,
            aspect_ratio: None,
            mode: PromptMode::Standard,
            model_version: None,
            image_urls: None,
            prompts: None,
            save_remotely: true,
            storage_folder_id: None,
            duplicate: false,
            image_selection_strategy: ImageSelectionStrategy::Random,
            source_folder_ids: None,
        }
    }
}

/// Body of `POST /run`: one request or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RunPayload {
    /// A batch of requests.
    Batch(Vec<JobRequest>),
    /// A single request.
    Single(Box<JobRequest>),
}

impl RunPayload {
    /// Flatten into a list of requests.
    #[must_use]
    pub fn into_requests(self) -> Vec<JobRequest> {
        match self {
            Self::Batch(requests) => requests,
            Self::Single(request) => vec![*request],
        }
    }
}
