//! Executes a resolved job: generate, save, upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::images::ImageLoader;
use crate::job::{JobReport, ResolvedJob};
use crate::output::{image_extension, output_filename, save_image};
use crate::ports::{GeneratedImage, ImageGenerator, ImageRequest, RemoteStorage};

/// Runs generation for every prompt of a [`ResolvedJob`].
pub struct JobRunner {
    generator: Arc<dyn ImageGenerator>,
    loader: ImageLoader,
    storage: Option<Arc<dyn RemoteStorage>>,
    output_dir: PathBuf,
    output_format: Option<String>,
}

impl JobRunner {
    /// Create a runner writing into `output_dir`.
    #[must_use]
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        storage: Option<Arc<dyn RemoteStorage>>,
        output_dir: impl Into<PathBuf>,
        output_format: Option<String>,
    ) -> Self {
        Self {
            generator,
            loader: ImageLoader::new(storage.clone()),
            storage,
            output_dir: output_dir.into(),
            output_format,
        }
    }

    /// Execute a job.
    ///
    /// Failures of individual prompts, reference images and uploads are
    /// logged and counted; they do not abort the job.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created.
    pub async fn execute(&self, job: &ResolvedJob) -> Result<JobReport, PipelineError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let images = self.load_references(&job.image_urls).await;

        let mut report = JobReport { job_id: job.id, ..JobReport::default() };
        let mut timings = Vec::with_capacity(job.prompts.len());

        for (index, prompt) in job.prompts.iter().enumerate() {
            info!(job_id = %job.id, prompt = index + 1, total = job.prompts.len(), "Generating image");
            let request = ImageRequest {
                model: job.model_version.clone(),
                input: job.parameters.to_input(prompt, &images),
            };

            let started = Instant::now();
            let response = match self.generator.generate(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Image generation failed");
                    report.failed_prompts += 1;
                    continue;
                }
            };
            let elapsed = started.elapsed();
            timings.push(elapsed);
            info!(job_id = %job.id, seconds = elapsed.as_secs_f64(), "Image generated");

            if response.images.is_empty() {
                warn!(job_id = %job.id, "Generator returned no images");
                report.failed_prompts += 1;
                continue;
            }

            for image in &response.images {
                let path = match self.save(prompt, image).await {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to save image");
                        continue;
                    }
                };
                info!(path = %path.display(), "Saved image");
                if job.save_remotely && self.upload(job, &path, image).await {
                    report.uploaded += 1;
                }
                report.saved.push(path);
            }
        }

        if let Some(average) = average(&timings) {
            info!(
                job_id = %job.id,
                images = timings.len(),
                average_seconds = average.as_secs_f64(),
                "Generation timings"
            );
        }
        Ok(report)
    }

    async fn load_references(&self, references: &[String]) -> Vec<String> {
        let mut loaded = Vec::with_capacity(references.len());
        for reference in references {
            match self.loader.load(reference).await {
                Ok(image) => {
                    debug!(%reference, mime = %image.mime_type, "Loaded reference image");
                    loaded.push(image.to_data_url());
                }
                Err(e) => warn!(%reference, error = %e, "Skipping reference image"),
            }
        }
        if !references.is_empty() && loaded.is_empty() {
            warn!(given = references.len(), "No reference images could be loaded");
        }
        loaded
    }

    /// Write one image; decoding and encoding run on the blocking pool.
    async fn save(&self, prompt: &str, image: &GeneratedImage) -> Result<PathBuf, PipelineError> {
        let extension = image_extension(image, self.output_format.as_deref());
        let path = self.output_dir.join(output_filename(prompt, &extension));
        let data = image.data.clone();
        let mime_type = image.mime_type.clone();
        let format = self.output_format.clone();
        tokio::task::spawn_blocking(move || {
            save_image(&data, &mime_type, format.as_deref(), &path).map(|()| path)
        })
        .await
        .map_err(|e| PipelineError::ImageConversion(format!("Save task failed: {e}")))?
    }

    async fn upload(&self, job: &ResolvedJob, path: &Path, image: &GeneratedImage) -> bool {
        let Some(ref storage) = self.storage else {
            warn!(job_id = %job.id, "Remote save requested but no remote storage is configured");
            return false;
        };
        let Some(ref folder_id) = job.storage_folder_id else {
            warn!(job_id = %job.id, "Remote save requested but no folder id is set");
            return false;
        };
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("image").to_string();
        let mime_type = mime_guess::from_path(path)
            .first()
            .map_or_else(|| image.mime_type.clone(), |m| m.essence_str().to_string());

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read saved image for upload");
                return false;
            }
        };
        match storage.upload(&name, &mime_type, data, folder_id).await {
            Ok(file_id) => {
                info!(%file_id, %folder_id, "Uploaded image");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Upload failed");
                false
            }
        }
    }
}

fn average(timings: &[Duration]) -> Option<Duration> {
    let count = u32::try_from(timings.len()).ok().filter(|n| *n > 0)?;
    Some(timings.iter().sum::<Duration>() / count)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::ports::ModelParameters;
    use crate::testing::{tiny_png, FakeGenerator, FakeStorage};

    fn job(prompts: &[&str], save_remotely: bool, folder: Option<&str>) -> ResolvedJob {
        ResolvedJob {
            id: Uuid::new_v4(),
            category: Some("MD".into()),
            image_urls: vec![],
            prompts: prompts.iter().map(|p| (*p).to_string()).collect(),
            model_version: "google/nano-banana-pro".into(),
            parameters: ModelParameters {
                resolution: Some("2K".into()),
                aspect_ratio: Some("16:9".into()),
                ..ModelParameters::default()
            },
            save_remotely,
            storage_folder_id: folder.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn saves_one_file_per_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator::default());
        let runner = JobRunner::new(generator.clone(), None, dir.path(), None);

        let report = runner.execute(&job(&["a red fox", "a blue owl"], false, None)).await.unwrap();
        assert_eq!(report.saved.len(), 2);
        assert_eq!(report.failed_prompts, 0);
        for path in &report.saved {
            assert!(path.exists());
            assert_eq!(path.extension().unwrap(), "png");
        }
        let requests = generator.requests();
        assert_eq!(requests[0].model, "google/nano-banana-pro");
        assert_eq!(requests[0].input["prompt"], "a red fox");
        assert_eq!(requests[1].input["aspect_ratio"], "16:9");
    }

    #[tokio::test]
    async fn failed_prompt_does_not_abort_job() {
        let dir = tempfile::tempdir().unwrap();
        let runner = JobRunner::new(Arc::new(FakeGenerator::default()), None, dir.path(), None);
        let report =
            runner.execute(&job(&["please fail", "a calm lake"], false, None)).await.unwrap();
        assert_eq!(report.failed_prompts, 1);
        assert_eq!(report.saved.len(), 1);
    }

    #[tokio::test]
    async fn uploads_when_remote_save_requested() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FakeStorage::default());
        let runner =
            JobRunner::new(Arc::new(FakeGenerator::default()), Some(storage.clone()), dir.path(), None);

        let report = runner.execute(&job(&["a tall tree"], true, Some("folder-1"))).await.unwrap();
        assert_eq!(report.uploaded, 1);
        let uploads = storage.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].0.starts_with("a-tall-tree-"));
        assert_eq!(uploads[0].1, "image/png");
        assert_eq!(uploads[0].2, "folder-1");
    }

    #[tokio::test]
    async fn missing_folder_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FakeStorage::default());
        let runner =
            JobRunner::new(Arc::new(FakeGenerator::default()), Some(storage.clone()), dir.path(), None);

        let report = runner.execute(&job(&["a tall tree"], true, None)).await.unwrap();
        assert_eq!(report.saved.len(), 1);
        assert_eq!(report.uploaded, 0);
        assert!(storage.uploads().is_empty());
    }

    #[tokio::test]
    async fn unloadable_references_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("face.png");
        std::fs::write(&reference, tiny_png()).unwrap();

        let generator = Arc::new(FakeGenerator::default());
        let runner = JobRunner::new(generator.clone(), None, dir.path().join("out"), None);
        let mut job = job(&["a portrait"], false, None);
        job.image_urls =
            vec![reference.to_string_lossy().into_owned(), "/nonexistent/missing.png".into()];

        runner.execute(&job).await.unwrap();
        let input = &generator.requests()[0].input;
        let images = input["image_input"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn converts_to_configured_format() {
        let dir = tempfile::tempdir().unwrap();
        let runner = JobRunner::new(
            Arc::new(FakeGenerator::default()),
            None,
            dir.path(),
            Some("jpeg".into()),
        );
        let report = runner.execute(&job(&["a sunset"], false, None)).await.unwrap();
        assert_eq!(report.saved[0].extension().unwrap(), "jpg");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_jobs_convert_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let runner = JobRunner::new(
            Arc::new(FakeGenerator::default()),
            None,
            dir.path(),
            Some("jpeg".into()),
        );
        let first = job(&["a harbor", "a market"], false, None);
        let second = job(&["a canyon"], false, None);

        let (a, b) = tokio::join!(runner.execute(&first), runner.execute(&second));
        let saved: Vec<PathBuf> = a.unwrap().saved.into_iter().chain(b.unwrap().saved).collect();
        assert_eq!(saved.len(), 3);
        for path in saved {
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        }
    }

    #[test]
    fn average_of_timings() {
        assert_eq!(average(&[]), None);
        assert_eq!(
            average(&[Duration::from_secs(2), Duration::from_secs(4)]),
            Some(Duration::from_secs(3))
        );
    }
}
