//! Fills in a request's category, reference images and prompts.
//!
//! Caller-supplied values always win. Stored configuration is fetched only
//! when something is still missing, and prompt generation runs only when
//! no prompts were supplied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::images::drive_view_url;
use crate::ports::{ConfigStore, PromptExpander, PromptTemplateRecord, RemoteFile, RemoteStorage};
use crate::request::{ImageSelectionStrategy, JobRequest, PromptMode};
use crate::selector::RandomSelector;

/// Prompt count lower bound when the request has none.
pub const DEFAULT_MIN_COUNT: i64 = 2;
/// Prompt count upper bound when the request has none.
pub const DEFAULT_MAX_COUNT: i64 = 5;

/// Category, images and prompts for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// `None` only when nothing had to be looked up and none was given.
    pub category: Option<String>,
    /// Reference image URLs or paths.
    pub image_urls: Vec<String>,
    /// Prompts to generate.
    pub prompts: Vec<String>,
}

/// One async lock per category, serializing appends to its prompt log.
#[derive(Debug, Default)]
struct PromptLogLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PromptLogLocks {
    async fn lock(&self, category: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(category.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Resolves the sparse parts of a [`JobRequest`].
pub struct RequestResolver {
    store: Arc<dyn ConfigStore>,
    expander: Arc<dyn PromptExpander>,
    storage: Option<Arc<dyn RemoteStorage>>,
    selector: Arc<RandomSelector>,
    used_prefix: String,
    prompt_log_locks: PromptLogLocks,
}

impl RequestResolver {
    /// Create a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        expander: Arc<dyn PromptExpander>,
        storage: Option<Arc<dyn RemoteStorage>>,
        selector: Arc<RandomSelector>,
        used_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            expander,
            storage,
            selector,
            used_prefix: used_prefix.into(),
            prompt_log_locks: PromptLogLocks::default(),
        }
    }

    /// Resolve category, images and prompts.
    ///
    /// Store and expander failures degrade to empty results; the returned
    /// lists may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRange`] if prompts must be generated
    /// and `min_count > max_count`.
    pub async fn resolve(&self, request: &JobRequest) -> Result<ResolvedRequest, PipelineError> {
        let mut image_urls = request.image_urls.clone();
        if image_urls.is_none() {
            if let Some(folders) = request.source_folder_ids.as_deref().filter(|f| !f.is_empty()) {
                let picked = self.images_from_folders(folders, request.image_selection_strategy).await;
                if !picked.is_empty() {
                    image_urls = Some(picked);
                }
            }
        }
        let prompts = request.prompts.clone();
        let needs_config = image_urls.is_none() || prompts.is_none();

        let category = match request.category.as_deref().filter(|c| !c.is_empty()) {
            Some(category) => {
                debug!(category, "Using provided category");
                Some(category.to_string())
            }
            None if needs_config => {
                let category = self.selector.pick_category();
                info!(%category, "Selected category");
                Some(category)
            }
            None => {
                debug!("Skipping category selection; images and prompts supplied");
                None
            }
        };

        let record = match category {
            Some(ref category) if needs_config => self.fetch_template(category).await,
            _ => None,
        };

        let image_urls = match image_urls {
            Some(urls) => {
                debug!(count = urls.len(), "Using provided image URLs");
                urls
            }
            None => {
                let urls = record.as_ref().map(|r| r.image_urls.to_urls()).unwrap_or_default();
                debug!(count = urls.len(), "Image URLs from stored config");
                urls
            }
        };

        let prompts = match (prompts, record, category.as_deref()) {
            (Some(prompts), _, _) => {
                debug!(count = prompts.len(), "Using provided prompts");
                prompts
            }
            (None, Some(record), Some(category)) => {
                self.generate_prompts(request, &record, category).await?
            }
            _ => {
                warn!(?category, "No config available to generate prompts");
                Vec::new()
            }
        };

        Ok(ResolvedRequest { category, image_urls, prompts })
    }

    async fn fetch_template(&self, category: &str) -> Option<PromptTemplateRecord> {
        match self.store.fetch_prompt_template(category).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                warn!(category, "No prompt configuration found for category");
                None
            }
            Err(e) => {
                warn!(category, error = %e, "Failed to fetch prompt configuration");
                None
            }
        }
    }

    async fn generate_prompts(
        &self,
        request: &JobRequest,
        record: &PromptTemplateRecord,
        category: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let variants = match request.mode {
            PromptMode::Standard => &record.standard_prompts,
            PromptMode::Random => &record.dynamic_prompts,
        };
        let variant = self.selector.choose(variants).cloned().unwrap_or_else(|| {
            warn!(mode = %request.mode, category, "No instruction variants; using empty instruction");
            String::new()
        });
        let instruction = format!("{}\n\n{variant}", record.system_prompt);

        let min = request.min_count.unwrap_or(DEFAULT_MIN_COUNT);
        let max = request.max_count.unwrap_or(DEFAULT_MAX_COUNT);
        let count = self.selector.pick_count(min, max)?;
        info!(min, max, count, "Determined prompt count");

        let generated =
            match self.expander.expand(&instruction, usize::try_from(count).unwrap_or(0)).await {
                Ok(prompts) => prompts,
                Err(e) => {
                    warn!(category, error = %e, "Prompt generation failed");
                    Vec::new()
                }
            };
        info!(requested = count, generated = generated.len(), "Generated prompts");

        if !generated.is_empty() {
            self.record_prompts(category, &generated).await;
        }
        Ok(generated)
    }

    async fn record_prompts(&self, category: &str, prompts: &[String]) {
        let _guard = self.prompt_log_locks.lock(category).await;
        if let Err(e) = self.store.append_generated_prompts(category, prompts).await {
            warn!(category, error = %e, "Failed to append generated prompts");
        }
    }

    async fn images_from_folders(
        &self,
        folders: &[String],
        strategy: ImageSelectionStrategy,
    ) -> Vec<String> {
        let Some(ref storage) = self.storage else {
            warn!("Source folders given but no remote storage is configured");
            return Vec::new();
        };

        let mut picked = Vec::with_capacity(folders.len());
        for folder_id in folders {
            let files = match storage.list_images(folder_id).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(%folder_id, error = %e, "Failed to list source folder");
                    continue;
                }
            };
            let candidates: Vec<&RemoteFile> = match strategy {
                ImageSelectionStrategy::Random => files.iter().collect(),
                ImageSelectionStrategy::Unused => {
                    files.iter().filter(|f| !f.name.contains(&self.used_prefix)).collect()
                }
            };
            let Some(file) = self.selector.choose(&candidates).copied() else {
                warn!(%folder_id, ?strategy, "No eligible images in source folder");
                continue;
            };

            if strategy == ImageSelectionStrategy::Unused {
                let new_name = format!("{}{}", self.used_prefix, file.name);
                if let Err(e) = storage.rename(&file.id, &new_name).await {
                    warn!(file_id = %file.id, error = %e, "Failed to mark source image as used");
                }
            }
            debug!(%folder_id, file = %file.name, "Picked source image");
            picked.push(drive_view_url(&file.id));
        }
        picked
    }
}
