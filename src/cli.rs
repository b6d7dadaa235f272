//! CLI argument parsing with clap.

use clap::{Args, Parser, Subcommand};

use crate::request::{ImageSelectionStrategy, JobRequest, PromptMode};

/// Category-driven image generation: HTTP dispatcher and one-shot runner.
#[derive(Parser, Debug)]
#[command(name = "nanogen", version, about)]
pub struct Cli {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP dispatch endpoint.
    Serve {
        /// Interface to bind (overrides the config file).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides `PORT` and the config file).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one request in the foreground.
    Run(RunArgs),
}

/// Flags for `nanogen run`; each maps to a request field.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Category to generate for; picked at random when omitted.
    #[arg(short, long)]
    pub category: Option<String>,

    /// Minimum number of prompts to generate.
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<i64>,

    /// Maximum number of prompts to generate.
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<i64>,

    /// Output resolution, e.g. 1K, 2K, 4K.
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Aspect ratio, e.g. 16:9.
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// Instruction variant list: standard or random.
    #[arg(short, long, default_value = "standard")]
    pub mode: PromptMode,

    /// Model version, e.g. google/nano-banana-pro.
    #[arg(long)]
    pub model_version: Option<String>,

    /// Reference image (path or URL); repeatable.
    #[arg(short = 'i', long = "image-url")]
    pub image_urls: Vec<String>,

    /// Use no reference images at all.
    #[arg(long, conflicts_with = "image_urls")]
    pub no_images: bool,

    /// Prompt to generate; repeatable. Skips prompt generation.
    #[arg(short, long = "prompt")]
    pub prompts: Vec<String>,

    /// Keep results local; do not upload.
    #[arg(long)]
    pub local_only: bool,

    /// Upload folder id.
    #[arg(long)]
    pub folder_id: Option<String>,

    /// How to pick from source folders: random or unused.
    #[arg(long, default_value = "random")]
    pub strategy: ImageSelectionStrategy,

    /// Folder to draw one reference image from; repeatable.
    #[arg(long = "source-folder")]
    pub source_folders: Vec<String>,

    /// Fan out into copies, as the endpoint does.
    #[arg(long)]
    pub duplicate: bool,

    /// Local output directory (overrides the config file).
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

impl RunArgs {
    /// Build the request these flags describe.
    #[must_use]
    pub fn to_request(&self) -> JobRequest {
        let image_urls = if self.no_images {
            Some(Vec::new())
        } else {
            non_empty(&self.image_urls)
        };
        JobRequest {
            category: self.category.clone(),
            min_count: self.min,
            max_count: self.max,
            resolution: self.resolution.clone(),
            aspect_ratio: self.aspect_ratio.clone(),
            mode: self.mode,
            model_version: self.model_version.clone(),
            image_urls,
            prompts: non_empty(&self.prompts),
            save_remotely: !self.local_only,
            storage_folder_id: self.folder_id.clone(),
            duplicate: self.duplicate,
            image_selection_strategy: self.strategy,
            source_folder_ids: non_empty(&self.source_folders),
        }
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}
