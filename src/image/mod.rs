//! Image bridge: one preview image per concept, generated concurrently.
//!
//! A failed image never fails the batch. The concept gets a placeholder
//! preview instead and the failure is logged with the concept name.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures::future::join_all;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::ImageBackend;
use crate::config::Config;
use crate::errors::BlueprintError;
use crate::exec;
use crate::prompt;
use crate::provider::DynProvider;
use crate::wire::{DesignConcept, GenerationRequest, Modality, Part};

pub const GENERATION_FAILED_PREVIEW: &str = "<div class='p-8 text-center text-gray-500 bg-gray-100 flex items-center justify-center h-full'><span>Image Generation Failed</span></div>";
pub const UNAVAILABLE_PREVIEW: &str = "<div class='p-8 text-center text-gray-500 bg-gray-100 flex items-center justify-center h-full'><span>Preview Unavailable</span></div>";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>>;
}

pub type DynImageGenerator = Arc<dyn ImageGenerator + Send + Sync>;

pub fn make_image_generator(cfg: &Config, provider: DynProvider) -> Result<DynImageGenerator> {
    match cfg.image_backend {
        ImageBackend::Gemini => Ok(Arc::new(GeminiImageGenerator::new(provider, cfg.image_model.clone()))),
        ImageBackend::Process => Ok(Arc::new(ProcessImageGenerator::from_helper(&cfg.image_helper)?)),
    }
}

/// Contract of the helper: a JSON array of base64 images, or `{"error": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HelperOutput {
    Images(Vec<String>),
    Failure { error: String },
}

pub struct ProcessImageGenerator {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessImageGenerator {
    pub fn from_helper(helper: &[String]) -> Result<Self> {
        let (program, args) = exec::resolve_helper(helper)?;
        Ok(Self { program, args })
    }
}

#[async_trait]
impl ImageGenerator for ProcessImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>> {
        let r = exec::run_capture(&self.program, &self.args, prompt).await?;
        if !r.stderr.trim().is_empty() {
            tracing::warn!(helper = %r.program, "image helper stderr: {}", r.stderr.trim());
        }
        if !r.success() {
            return Err(BlueprintError::ImageBridge(format!("{} exited with status {}", r.program, r.status)).into());
        }
        let parsed: HelperOutput = serde_json::from_str(r.stdout.trim()).map_err(|e| {
            BlueprintError::ImageBridge(format!("helper printed invalid JSON: {e}"))
        })?;
        match parsed {
            HelperOutput::Failure { error } => {
                tracing::warn!(helper = %r.program, "image helper reported: {error}");
                Ok(Vec::new())
            }
            HelperOutput::Images(list) => list
                .iter()
                .map(|b64| {
                    let bytes = BASE64.decode(b64.trim()).context("helper returned invalid base64")?;
                    Ok(GeneratedImage { mime_type: "image/png".into(), bytes: Bytes::from(bytes) })
                })
                .collect(),
        }
    }
}

pub struct GeminiImageGenerator {
    provider: DynProvider,
    model: String,
}

impl GeminiImageGenerator {
    pub fn new(provider: DynProvider, model: String) -> Self {
        Self { provider, model }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>> {
        let req = GenerationRequest::new(self.model.clone(), vec![Part::text(prompt)]).modalities(vec![Modality::Image]);
        let out = self.provider.generate(&req).await?;
        out.images
            .into_iter()
            .map(|img| {
                let bytes = BASE64.decode(img.data.trim()).context("model returned invalid base64 image")?;
                Ok(GeneratedImage { mime_type: img.mime_type, bytes: Bytes::from(bytes) })
            })
            .collect()
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn image_preview(img: &GeneratedImage, alt: &str) -> String {
    format!(
        r#"<div class="w-full h-full relative"><img src="data:{};base64,{}" class="w-full h-full object-cover" alt="{}" /></div>"#,
        img.mime_type,
        BASE64.encode(&img.bytes),
        escape_attr(alt)
    )
}

async fn preview_for(gen: &dyn ImageGenerator, concept: &DesignConcept, intent: &str) -> String {
    let prompt = prompt::image_prompt(concept, intent);
    match gen.generate_image(&prompt).await {
        Ok(images) => match images.first() {
            Some(img) => image_preview(img, &concept.name),
            None => {
                tracing::warn!(concept = %concept.name, "image generation returned no images");
                GENERATION_FAILED_PREVIEW.to_string()
            }
        },
        Err(e) => {
            tracing::warn!(concept = %concept.name, "image generation failed: {e:#}");
            UNAVAILABLE_PREVIEW.to_string()
        }
    }
}

/// Generate every preview concurrently and wait for all of them.
pub async fn attach_previews(gen: &dyn ImageGenerator, concepts: Vec<DesignConcept>, intent: &str) -> Vec<DesignConcept> {
    let previews = join_all(concepts.iter().map(|c| preview_for(gen, c, intent))).await;
    concepts
        .into_iter()
        .zip(previews)
        .map(|(mut c, html)| {
            c.html_preview = html;
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize_concept;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Scripted {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageGenerator for Scripted {
        async fn generate_image(&self, prompt: &str) -> Result<Vec<GeneratedImage>> {
            self.seen.lock().push(prompt.to_string());
            if prompt.contains("Broken") {
                anyhow::bail!("quota exceeded");
            }
            if prompt.contains("Empty") {
                return Ok(vec![]);
            }
            Ok(vec![GeneratedImage { mime_type: "image/png".into(), bytes: Bytes::from_static(b"png") }])
        }
    }

    fn concept(name: &str) -> DesignConcept {
        sanitize_concept(&json!({ "name": name, "theme": "Calm", "description": "Soft" }))
    }

    #[tokio::test]
    async fn per_item_fallback_keeps_the_batch() {
        let gen = Scripted { seen: Mutex::new(vec![]) };
        let out = attach_previews(&gen, vec![concept("Good"), concept("Broken"), concept("Empty")], "cafe").await;

        assert_eq!(out.len(), 3);
        assert!(out[0].html_preview.contains("data:image/png;base64,cG5n"));
        assert!(out[0].html_preview.contains(r#"alt="Good""#));
        assert_eq!(out[1].html_preview, UNAVAILABLE_PREVIEW);
        assert_eq!(out[2].html_preview, GENERATION_FAILED_PREVIEW);
        assert_eq!(gen.seen.lock().len(), 3);
    }

    #[test]
    fn alt_text_is_escaped() {
        let img = GeneratedImage { mime_type: "image/png".into(), bytes: Bytes::new() };
        assert!(image_preview(&img, r#"A "quoted" <name>"#).contains("alt=\"A &quot;quoted&quot; &lt;name&gt;\""));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn helper(script: &str) -> ProcessImageGenerator {
            ProcessImageGenerator::from_helper(&["sh".into(), "-c".into(), script.into()]).unwrap()
        }

        #[tokio::test]
        async fn parses_base64_list() {
            let imgs = helper(r#"echo '["cG5n"]'"#).generate_image("p").await.unwrap();
            assert_eq!(imgs[0].bytes, Bytes::from_static(b"png"));
        }

        #[tokio::test]
        async fn reported_error_means_generation_failed() {
            let gen = helper(r#"echo '{"error": "no key"}'"#);
            assert!(gen.generate_image("p").await.unwrap().is_empty());
            let out = attach_previews(&gen, vec![concept("A")], "x").await;
            assert_eq!(out[0].html_preview, GENERATION_FAILED_PREVIEW);
        }

        #[tokio::test]
        async fn non_zero_exit_still_yields_a_preview() {
            let out = attach_previews(&helper("exit 1"), vec![concept("A")], "x").await;
            assert!(!out[0].html_preview.is_empty());
            assert_eq!(out[0].html_preview, UNAVAILABLE_PREVIEW);
        }

        #[tokio::test]
        async fn invalid_json_still_yields_a_preview() {
            let out = attach_previews(&helper("echo not-json"), vec![concept("A")], "x").await;
            assert_eq!(out[0].html_preview, UNAVAILABLE_PREVIEW);
        }

        #[tokio::test]
        async fn prompt_arrives_as_one_argument() {
            let imgs = helper(r#"case "$0" in *"Quote \"me\""*) echo '["b2s="]';; *) exit 2;; esac"#)
                .generate_image(r#"Quote "me" please"#)
                .await
                .unwrap();
            assert_eq!(imgs[0].bytes, Bytes::from_static(b"ok"));
        }
    }
}
