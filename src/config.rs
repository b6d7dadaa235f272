//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PipelineError;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Credentials.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Config store location.
    #[serde(default)]
    pub supabase: SupabaseConfig,

    /// Dispatch endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Prompt and image generation settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Where and how results are written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Credentials; each is overridden by its environment variable.
#[derive(Debug, Default, Deserialize)]
pub struct KeysConfig {
    /// Supabase service key (`SUPABASE_KEY`).
    pub supabase: Option<String>,
    /// `OpenAI` API key (`OPENAI_API_KEY`).
    pub openai: Option<String>,
    /// Replicate API token (`REPLICATE_API_TOKEN`).
    pub replicate: Option<String>,
    /// Google Drive OAuth access token (`GOOGLE_DRIVE_ACCESS_TOKEN`).
    pub google_drive: Option<String>,
    /// Bearer token required by `POST /run` (`API_AUTH_TOKEN`).
    pub api_auth: Option<String>,
}

/// Supabase project settings.
#[derive(Debug, Default, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (`SUPABASE_URL`).
    pub url: Option<String>,
}

/// Dispatch endpoint settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind (`PORT`).
    pub port: u16,
    /// Jobs run concurrently.
    pub workers: usize,
    /// Jobs buffered before `/run` answers 503.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000, workers: 4, queue_capacity: 256 }
    }
}

/// Prompt and image generation settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model used to expand instructions into prompts.
    pub prompt_model: String,
    /// Upper bound on one image generation call, in seconds.
    pub timeout_secs: u64,
    /// Category used whenever one must be chosen.
    pub pinned_category: Option<String>,
    /// Marker prepended to source images once used.
    pub used_prefix: String,
    /// Fixed seed for every random choice; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt_model: "gpt-4o".to_string(),
            timeout_secs: 600,
            pinned_category: None,
            used_prefix: "used_".to_string(),
            seed: None,
        }
    }
}

/// Output settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Local directory for generated images.
    pub dir: PathBuf,
    /// Convert results to this format (`jpeg`, `png`, `webp`); keep as-is when unset.
    pub format: Option<String>,
    /// Upload folder used when a request names none.
    pub default_folder_id: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output/nano_banana_results"),
            format: None,
            default_folder_id: Some("1H4wWGNaY01skMzUvQtQmHWlabaTc4rHx".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or names an
    /// unsupported output format.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            PipelineError::Config(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        if let Some(ref format) = config.output.format {
            crate::output::validate_format(format).map_err(PipelineError::Config)?;
        }
        Ok(config)
    }

    /// Supabase project URL, preferring `SUPABASE_URL`.
    #[must_use]
    pub fn supabase_url(&self) -> Option<String> {
        env_or("SUPABASE_URL", self.supabase.url.as_ref())
    }

    /// Supabase key, preferring `SUPABASE_KEY`.
    #[must_use]
    pub fn supabase_key(&self) -> Option<String> {
        env_or("SUPABASE_KEY", self.keys.supabase.as_ref())
    }

    /// `OpenAI` API key, preferring `OPENAI_API_KEY`.
    #[must_use]
    pub fn openai_key(&self) -> Option<String> {
        env_or("OPENAI_API_KEY", self.keys.openai.as_ref())
    }

    /// Replicate token, preferring `REPLICATE_API_TOKEN`.
    #[must_use]
    pub fn replicate_token(&self) -> Option<String> {
        env_or("REPLICATE_API_TOKEN", self.keys.replicate.as_ref())
    }

    /// Drive access token, preferring `GOOGLE_DRIVE_ACCESS_TOKEN`.
    #[must_use]
    pub fn drive_token(&self) -> Option<String> {
        env_or("GOOGLE_DRIVE_ACCESS_TOKEN", self.keys.google_drive.as_ref())
    }

    /// Endpoint bearer token, preferring `API_AUTH_TOKEN`.
    #[must_use]
    pub fn api_auth_token(&self) -> Option<String> {
        env_or("API_AUTH_TOKEN", self.keys.api_auth.as_ref())
    }

    /// Listen port, preferring `PORT`.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number.
    pub fn port(&self) -> Result<u16, PipelineError> {
        match std::env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => port
                .trim()
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid PORT value '{port}'"))),
            _ => Ok(self.server.port),
        }
    }
}

/// Non-empty environment value, else the file value.
fn env_or(var: &str, file_value: Option<&String>) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty()).or_else(|| file_value.cloned())
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `NANOGEN_CONFIG` environment variable
/// 3. `~/.config/nanogen/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("NANOGEN_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/nanogen/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/nanogen/config.toml")
    } else {
        PathBuf::from("nanogen.toml")
    }
}
