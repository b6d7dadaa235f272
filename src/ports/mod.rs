//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the pipeline core and an
//! external system. Implementations live in `src/adapters/`.

pub mod config_store;
pub mod image_generator;
pub mod prompt_expander;
pub mod remote_storage;

use std::future::Future;
use std::pin::Pin;

use crate::error::PipelineError;

pub use config_store::{ConfigStore, ModelParameterRecord, ModelParameters, PromptTemplateRecord};
pub use image_generator::{GeneratedImage, ImageGenerator, ImageRequest, ImageResponse};
pub use prompt_expander::PromptExpander;
pub use remote_storage::{RemoteFile, RemoteStorage};

/// Boxed future returned by every port method.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;
