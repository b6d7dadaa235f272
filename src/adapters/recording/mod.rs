//! Adapters that pass calls through to a live port and record each one.

pub mod config_store;
pub mod image_generator;
pub mod prompt_expander;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::cassette::recorder::CassetteRecorder;

/// Record a call as `{"Ok": value}` or `{"Err": message}`.
///
/// Recording never fails the call it observes; problems are logged.
pub(crate) fn record_result<T, E, I>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    T: Serialize,
    E: std::fmt::Display,
    I: Serialize,
{
    let output = match result {
        Ok(v) => json!({ "Ok": to_value(v, port, method) }),
        Err(e) => json!({ "Err": e.to_string() }),
    };
    let input = to_value(input, port, method);

    match recorder.lock() {
        Ok(mut guard) => guard.record(port, method, input, output),
        Err(_) => warn!(port, method, "Recorder lock poisoned; interaction dropped"),
    }
}

fn to_value<T: Serialize>(value: &T, port: &str, method: &str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(port, method, error = %e, "Unserializable value recorded as null");
        Value::Null
    })
}
