//! Request to report: resolution followed by execution.

use tracing::info;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::job::{JobReport, ResolvedJob};
use crate::model_config::{ModelConfigResolver, ParameterOverrides};
use crate::request::JobRequest;
use crate::resolver::RequestResolver;
use crate::runner::JobRunner;

/// The full per-job pipeline.
pub struct Pipeline {
    resolver: RequestResolver,
    model_config: ModelConfigResolver,
    runner: JobRunner,
    default_folder_id: Option<String>,
}

impl Pipeline {
    /// Assemble a pipeline from its stages.
    #[must_use]
    pub fn new(
        resolver: RequestResolver,
        model_config: ModelConfigResolver,
        runner: JobRunner,
        default_folder_id: Option<String>,
    ) -> Self {
        Self { resolver, model_config, runner, default_folder_id }
    }

    /// Turn a request into a fully concrete job.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRange`] for an inverted count range and
    /// [`PipelineError::GenerationEmpty`] when no prompts could be resolved.
    pub async fn prepare(&self, request: &JobRequest) -> Result<ResolvedJob, PipelineError> {
        let overrides = ParameterOverrides {
            resolution: request.resolution.clone(),
            aspect_ratio: request.aspect_ratio.clone(),
        };
        let model = self.model_config.resolve(request.model_version.as_deref(), &overrides).await;
        let resolved = self.resolver.resolve(request).await?;

        if resolved.prompts.is_empty() {
            return Err(PipelineError::GenerationEmpty { category: resolved.category });
        }

        Ok(ResolvedJob {
            id: Uuid::new_v4(),
            category: resolved.category,
            image_urls: resolved.image_urls,
            prompts: resolved.prompts,
            model_version: model.version,
            parameters: model.parameters,
            save_remotely: request.save_remotely,
            storage_folder_id: request
                .storage_folder_id
                .clone()
                .filter(|f| !f.is_empty())
                .or_else(|| self.default_folder_id.clone()),
        })
    }

    /// Prepare and execute one request.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Pipeline::prepare`] or the runner.
    pub async fn run(&self, request: &JobRequest) -> Result<JobReport, PipelineError> {
        let job = self.prepare(request).await?;
        info!(
            job_id = %job.id,
            category = ?job.category,
            model = %job.model_version,
            prompts = job.prompts.len(),
            images = job.image_urls.len(),
            "Starting job"
        );
        let report = self.runner.execute(&job).await?;
        info!(
            job_id = %report.job_id,
            saved = report.saved.len(),
            uploaded = report.uploaded,
            failed = report.failed_prompts,
            "Job finished"
        );
        Ok(report)
    }
}
