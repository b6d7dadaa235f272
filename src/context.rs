//! Service context that bundles all port trait objects.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::adapters::live::gdrive::DriveStorage;
use crate::adapters::live::openai::OpenAiExpander;
use crate::adapters::live::replicate::ReplicateGenerator;
use crate::adapters::live::supabase::SupabaseStore;
use crate::adapters::recording::config_store::RecordingConfigStore;
use crate::adapters::recording::image_generator::RecordingImageGenerator;
use crate::adapters::recording::prompt_expander::RecordingPromptExpander;
use crate::adapters::replaying::config_store::ReplayingConfigStore;
use crate::adapters::replaying::image_generator::ReplayingImageGenerator;
use crate::adapters::replaying::prompt_expander::ReplayingPromptExpander;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::Config;
use crate::error::PipelineError;
use crate::ports::{ConfigStore, ImageGenerator, PromptExpander, RemoteStorage};

/// Bundles all port trait objects into a single context.
pub struct ServiceContext {
    /// Prompt and model configuration.
    pub store: Arc<dyn ConfigStore>,
    /// Instruction-to-prompts expansion.
    pub expander: Arc<dyn PromptExpander>,
    /// Image generation.
    pub generator: Arc<dyn ImageGenerator>,
    /// Remote folders; absent when no credentials are configured.
    pub storage: Option<Arc<dyn RemoteStorage>>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Finish the recording and write the cassette file to disk.
    ///
    /// Every recording adapter must have been dropped first.
    ///
    /// # Errors
    ///
    /// Returns an error if adapters are still alive or the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, PipelineError> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| PipelineError::Config("Recording adapter still has references".into()))?
            .into_inner()
            .map_err(|e| PipelineError::Config(format!("Recorder lock poisoned: {e}")))?;
        let count = recorder.len();
        let path = recorder.finish()?;
        info!(interactions = count, path = %path.display(), "Cassette written");
        Ok(path)
    }
}

fn required(value: Option<String>, key: &str, env_var: &str) -> Result<String, PipelineError> {
    value.ok_or_else(|| PipelineError::ConfigurationMissing {
        key: key.to_string(),
        env_var: env_var.to_string(),
    })
}

impl ServiceContext {
    /// Create a live context.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigurationMissing`] if a store, expander, or
    /// generator credential is not configured. Storage is optional.
    pub fn live(config: &Config) -> Result<Self, PipelineError> {
        let supabase_url = required(config.supabase_url(), "supabase.url", "SUPABASE_URL")?;
        let supabase_key = required(config.supabase_key(), "keys.supabase", "SUPABASE_KEY")?;
        let openai_key = required(config.openai_key(), "keys.openai", "OPENAI_API_KEY")?;
        let replicate_token =
            required(config.replicate_token(), "keys.replicate", "REPLICATE_API_TOKEN")?;

        let storage: Option<Arc<dyn RemoteStorage>> = match config.drive_token() {
            Some(token) => Some(Arc::new(DriveStorage::new(token))),
            None => {
                warn!("GOOGLE_DRIVE_ACCESS_TOKEN not set; remote storage disabled");
                None
            }
        };

        Ok(Self {
            store: Arc::new(SupabaseStore::new(&supabase_url, supabase_key)),
            expander: Arc::new(OpenAiExpander::new(
                openai_key,
                config.generation.prompt_model.clone(),
            )),
            generator: Arc::new(ReplicateGenerator::new(
                replicate_token,
                Duration::from_secs(config.generation.timeout_secs),
            )),
            storage,
        })
    }

    /// Create a recording context that wraps the live adapters with a recorder.
    ///
    /// Remote storage is used live but not recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the live context cannot be created.
    pub fn recording(config: &Config) -> Result<(Self, RecordingSession), PipelineError> {
        let live_ctx = Self::live(config)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = PathBuf::from(".nanogen/cassettes").join(format!("{timestamp}.cassette.yaml"));
        info!(path = %path.display(), "Recording port interactions");

        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(path, timestamp, get_commit_hash())));

        let ctx = Self {
            store: Arc::new(RecordingConfigStore::new(live_ctx.store, Arc::clone(&recorder))),
            expander: Arc::new(RecordingPromptExpander::new(
                live_ctx.expander,
                Arc::clone(&recorder),
            )),
            generator: Arc::new(RecordingImageGenerator::new(
                live_ctx.generator,
                Arc::clone(&recorder),
            )),
            storage: live_ctx.storage,
        };
        Ok((ctx, RecordingSession { recorder }))
    }

    /// Create a replaying context from a cassette file. No network is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, PipelineError> {
        let replayer = Arc::new(Mutex::new(load_cassette(path)?));
        Ok(Self {
            store: Arc::new(ReplayingConfigStore::new(Arc::clone(&replayer))),
            expander: Arc::new(ReplayingPromptExpander::new(Arc::clone(&replayer))),
            generator: Arc::new(ReplayingImageGenerator::new(replayer)),
            storage: None,
        })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}
