//! In-process fakes for the port traits, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::PipelineError;
use crate::ports::image_generator::GenerateFuture;
use crate::ports::{
    ConfigStore, GeneratedImage, ImageGenerator, ImageRequest, ImageResponse, ModelParameterRecord,
    PortFuture, PromptExpander, PromptTemplateRecord, RemoteFile, RemoteStorage,
};

fn unavailable(what: &str) -> PipelineError {
    PipelineError::Api { status: 503, message: format!("{what} unavailable") }
}

#[derive(Default)]
pub struct FakeStore {
    templates: HashMap<String, PromptTemplateRecord>,
    model: Option<ModelParameterRecord>,
    fail_reads: bool,
    fail_appends: bool,
    pub calls: Mutex<Vec<String>>,
    pub appended: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeStore {
    pub fn with_template(mut self, category: &str, record: PromptTemplateRecord) -> Self {
        self.templates.insert(category.to_string(), record);
        self
    }

    pub fn with_model(mut self, record: ModelParameterRecord) -> Self {
        self.model = Some(record);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_appends(mut self) -> Self {
        self.fail_appends = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ConfigStore for FakeStore {
    fn fetch_prompt_template(&self, category: &str) -> PortFuture<'_, Option<PromptTemplateRecord>> {
        self.calls.lock().unwrap().push(format!("fetch_prompt_template:{category}"));
        let result = if self.fail_reads {
            Err(unavailable("store"))
        } else {
            Ok(self.templates.get(category).cloned())
        };
        Box::pin(async move { result })
    }

    fn append_generated_prompts(&self, category: &str, prompts: &[String]) -> PortFuture<'_, ()> {
        self.calls.lock().unwrap().push(format!("append_generated_prompts:{category}"));
        let result = if self.fail_appends {
            Err(unavailable("store"))
        } else {
            self.appended.lock().unwrap().push((category.to_string(), prompts.to_vec()));
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn fetch_model_parameters(
        &self,
        version: Option<&str>,
    ) -> PortFuture<'_, Option<ModelParameterRecord>> {
        self.calls.lock().unwrap().push(format!("fetch_model_parameters:{version:?}"));
        let result = if self.fail_reads { Err(unavailable("store")) } else { Ok(self.model.clone()) };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct FakeExpander {
    prompts: Vec<String>,
    fail: bool,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl FakeExpander {
    pub fn returning(prompts: &[&str]) -> Self {
        Self { prompts: prompts.iter().map(|p| (*p).to_string()).collect(), ..Self::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PromptExpander for FakeExpander {
    fn expand(&self, instruction: &str, count: usize) -> PortFuture<'_, Vec<String>> {
        self.calls.lock().unwrap().push((instruction.to_string(), count));
        let result = if self.fail { Err(unavailable("llm")) } else { Ok(self.prompts.clone()) };
        Box::pin(async move { result })
    }
}

/// Returns one tiny PNG per call, or fails for prompts containing "fail".
#[derive(Default)]
pub struct FakeGenerator {
    pub requests: Mutex<Vec<ImageRequest>>,
}

impl FakeGenerator {
    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn tiny_png() -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(1, 1);
    let mut buf = std::io::Cursor::new(Vec::<u8>::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

impl ImageGenerator for FakeGenerator {
    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        self.requests.lock().unwrap().push(request.clone());
        let fail = request.input.get("prompt").and_then(|p| p.as_str()).is_some_and(|p| p.contains("fail"));
        Box::pin(async move {
            if fail {
                return Err(unavailable("generator"));
            }
            Ok(ImageResponse {
                images: vec![GeneratedImage {
                    data: tiny_png(),
                    mime_type: "image/png".into(),
                    source_url: Some("https://replicate.delivery/abc/out-0.png".into()),
                }],
            })
        })
    }
}

#[derive(Default)]
pub struct FakeStorage {
    folders: HashMap<String, Vec<RemoteFile>>,
    files: HashMap<String, Vec<u8>>,
    pub renames: Mutex<Vec<(String, String)>>,
    pub uploads: Mutex<Vec<(String, String, String)>>,
}

impl FakeStorage {
    pub fn with_folder(mut self, folder_id: &str, files: &[(&str, &str)]) -> Self {
        self.folders.insert(
            folder_id.to_string(),
            files
                .iter()
                .map(|(id, name)| RemoteFile { id: (*id).to_string(), name: (*name).to_string() })
                .collect(),
        );
        self
    }

    pub fn with_file(mut self, file_id: &str, data: Vec<u8>) -> Self {
        self.files.insert(file_id.to_string(), data);
        self
    }

    pub fn renames(&self) -> Vec<(String, String)> {
        self.renames.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl RemoteStorage for FakeStorage {
    fn list_images(&self, folder_id: &str) -> PortFuture<'_, Vec<RemoteFile>> {
        let result = self.folders.get(folder_id).cloned().ok_or_else(|| PipelineError::Api {
            status: 404,
            message: format!("folder {folder_id} not found"),
        });
        Box::pin(async move { result })
    }

    fn rename(&self, file_id: &str, new_name: &str) -> PortFuture<'_, ()> {
        self.renames.lock().unwrap().push((file_id.to_string(), new_name.to_string()));
        Box::pin(async move { Ok(()) })
    }

    fn download(&self, file_id: &str) -> PortFuture<'_, Vec<u8>> {
        let result = self.files.get(file_id).cloned().ok_or_else(|| unavailable("file"));
        Box::pin(async move { result })
    }

    fn upload(
        &self,
        name: &str,
        mime_type: &str,
        _data: Vec<u8>,
        folder_id: &str,
    ) -> PortFuture<'_, String> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((name.to_string(), mime_type.to_string(), folder_id.to_string()));
        let id = format!("uploaded-{}", uploads.len());
        Box::pin(async move { Ok(id) })
    }
}
