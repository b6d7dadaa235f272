//! Replaying adapters that serve recorded interactions from cassettes.

pub mod config_store;
pub mod image_generator;
pub mod prompt_expander;

use std::sync::{Arc, Mutex, PoisonError};

use crate::cassette::replayer::CassetteReplayer;
use crate::error::PipelineError;

/// Retrieve the next recorded output for a given port and method.
pub(crate) fn next_output(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> Result<serde_json::Value, PipelineError> {
    let mut guard = replayer.lock().unwrap_or_else(PoisonError::into_inner);
    guard.next_interaction(port, method).map(|i| i.output)
}

/// Deserialize a replayed output as `Result<T, PipelineError>`.
///
/// Recorded errors come back as [`PipelineError::Api`] with status 0.
pub(crate) fn replay_result<T: serde::de::DeserializeOwned>(
    output: Result<serde_json::Value, PipelineError>,
) -> Result<T, PipelineError> {
    let output = output?;
    let replay_error = |message: String| PipelineError::Api { status: 0, message };
    if let Some(err_val) = output.get("Err").or_else(|| output.get("err")) {
        let msg = err_val.as_str().unwrap_or("replayed error").to_string();
        return Err(replay_error(msg));
    }
    let value = output.get("Ok").or_else(|| output.get("ok")).cloned().unwrap_or(output);
    serde_json::from_value(value).map_err(|e| replay_error(format!("Malformed cassette output: {e}")))
}
