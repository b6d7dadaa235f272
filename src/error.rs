//! Unified error type for nanogen.

use thiserror::Error;

/// Errors that can occur while resolving or executing a generation job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An API returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file error.
    #[error("Config error: {0}")]
    Config(String),

    /// A required credential or endpoint is not configured.
    #[error("Configuration missing: set {env_var} or add {key} to the config file.")]
    ConfigurationMissing {
        /// Config file key.
        key: String,
        /// The environment variable name.
        env_var: String,
    },

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A count range whose lower bound exceeds its upper bound.
    #[error("Invalid range: min {min} is greater than max {max}")]
    InvalidRange {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },

    /// Prompt resolution produced nothing to generate.
    #[error("No prompts to generate (category: {category:?})")]
    GenerationEmpty {
        /// The category the job resolved to, if any.
        category: Option<String>,
    },

    /// Image format conversion error.
    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    /// A reference image could not be loaded.
    #[error("Image source error: {0}")]
    ImageSource(String),

    /// A duplicated request asked for more copies than allowed.
    #[error("Too many copies requested: {requested} (max {max})")]
    TooManyCopies {
        /// Copies asked for.
        requested: i64,
        /// Upper bound.
        max: i64,
    },

    /// The job queue cannot take a whole batch right now.
    #[error("Job queue is full: {requested} jobs requested, {available} slots free")]
    QueueFull {
        /// Jobs in the batch.
        requested: usize,
        /// Free queue slots.
        available: usize,
    },

    /// The dispatcher queue no longer accepts jobs.
    #[error("Dispatcher is shut down")]
    DispatcherClosed,
}
