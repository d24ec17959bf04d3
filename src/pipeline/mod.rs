use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::BlueprintError;
use crate::image::{self, DynImageGenerator};
use crate::log;
use crate::prompt::{self, CONCEPT_COUNT};
use crate::provider::{self, DynProvider};
use crate::sanitize;
use crate::wire::{CodeBundle, DataUrl, DesignConcept, GenerationRequest, Part};

/// The two orchestration operations behind the HTTP routes and the wizard.
#[derive(Clone)]
pub struct Pipeline {
    cfg: Arc<Config>,
    provider: DynProvider,
    images: DynImageGenerator,
}

impl Pipeline {
    pub fn new(cfg: Config, provider: DynProvider, images: DynImageGenerator) -> Self {
        Self { cfg: Arc::new(cfg), provider, images }
    }

    pub fn from_config(cfg: Config) -> Result<Self> {
        let provider = provider::make_provider(&cfg)?;
        let images = image::make_image_generator(&cfg, provider.clone())?;
        Ok(Self::new(cfg, provider, images))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn save(&self, stage: &str, req: &GenerationRequest, raw: &str, tx: Uuid) {
        if let Err(e) = log::save_stage(stage, req, raw, tx, &self.cfg) {
            tracing::warn!(stage, "could not save stage artifacts: {e:#}");
        }
    }

    /// Intent + sketch -> sanitized concepts, each with a preview attached.
    /// A response that does not parse fails the whole call; previews never do.
    pub async fn concepts(&self, intent: &str, sketch_data: &str, metadata: &Value) -> Result<Vec<DesignConcept>> {
        let tx = Uuid::new_v4();
        tracing::info!(%tx, intent, "generating concepts");
        tracing::debug!(%tx, %metadata, "layout metadata");

        let mut parts = vec![Part::text(prompt::concepts_prompt(intent))];
        let sketch = DataUrl::parse(sketch_data);
        if sketch.data.is_empty() {
            tracing::warn!(%tx, "no sketch payload; sending text only");
        } else {
            parts.push(Part::inline(sketch.mime_type, sketch.data));
        }
        let req = GenerationRequest::new(self.cfg.concepts_model.clone(), parts).json();

        let out = self.provider.generate(&req).await.context("concepts call failed")?;
        self.save("concepts", &req, &out.text, tx);

        let value = sanitize::parse_json_response(&out.text)?;
        let mut concepts = sanitize::sanitize_concepts(&value);
        if concepts.is_empty() {
            return Err(BlueprintError::Schema("model returned no concepts".into()).into());
        }
        if concepts.len() != CONCEPT_COUNT {
            tracing::warn!(%tx, got = concepts.len(), "expected {CONCEPT_COUNT} concepts");
            concepts.truncate(CONCEPT_COUNT);
        }

        let concepts = image::attach_previews(&*self.images, concepts, intent).await;
        tracing::info!(%tx, count = concepts.len(), "concepts ready");
        Ok(concepts)
    }

    /// Intent + chosen concept -> file map. The concept's preview is dropped
    /// before it reaches the prompt.
    pub async fn generate_code(&self, intent: &str, concept: &Value) -> Result<CodeBundle> {
        let tx = Uuid::new_v4();
        let stripped = prompt::strip_preview(concept);
        tracing::info!(%tx, concept_bytes = stripped.to_string().len(), "generating code");

        let req = GenerationRequest::new(
            self.cfg.code_model.clone(),
            vec![Part::text(prompt::code_prompt(intent, &stripped))],
        );
        let out = self.provider.generate(&req).await.context("code call failed")?;
        self.save("code", &req, &out.text, tx);

        let value = sanitize::parse_json_response(&out.text)?;
        let bundle = sanitize::sanitize_bundle(&value)?;
        if bundle.is_empty() {
            return Err(BlueprintError::Schema("model returned an empty file map".into()).into());
        }
        tracing::info!(%tx, files = bundle.len(), bytes = bundle.total_bytes(), "code ready");
        Ok(bundle)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process stand-ins for the provider and the image generator.

    use super::*;
    use crate::image::{GeneratedImage, ImageGenerator};
    use crate::provider::Provider;
    use crate::wire::GenerationOutput;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::channel::oneshot;
    use parking_lot::Mutex;

    pub struct CannedProvider {
        pub replies: Mutex<Vec<Result<String, String>>>,
        pub seen: Mutex<Vec<GenerationRequest>>,
    }

    impl CannedProvider {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        async fn generate(&self, req: &GenerationRequest) -> Result<GenerationOutput> {
            self.seen.lock().push(req.clone());
            match self.replies.lock().pop() {
                Some(Ok(text)) => Ok(GenerationOutput { text, images: vec![] }),
                Some(Err(e)) => Err(BlueprintError::Provider(e).into()),
                None => Err(BlueprintError::Provider("no canned reply left".into()).into()),
            }
        }
    }

    /// Never answers; the caller's future stays pending until it is dropped.
    pub struct PendingProvider;

    #[async_trait]
    impl Provider for PendingProvider {
        async fn generate(&self, _req: &GenerationRequest) -> Result<GenerationOutput> {
            futures::future::pending().await
        }
    }

    /// Reports when a call arrives, then holds the reply until released.
    pub struct GatedProvider {
        entered: Mutex<Option<oneshot::Sender<()>>>,
        release: Mutex<Option<oneshot::Receiver<()>>>,
        reply: String,
    }

    impl GatedProvider {
        /// Returns the provider, a receiver that fires once the call is in
        /// flight, and the sender that lets it finish.
        pub fn new(reply: &str) -> (Arc<Self>, oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (entered_tx, entered_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            let provider = Arc::new(Self {
                entered: Mutex::new(Some(entered_tx)),
                release: Mutex::new(Some(release_rx)),
                reply: reply.to_string(),
            });
            (provider, entered_rx, release_tx)
        }
    }

    #[async_trait]
    impl Provider for GatedProvider {
        async fn generate(&self, _req: &GenerationRequest) -> Result<GenerationOutput> {
            if let Some(tx) = self.entered.lock().take() {
                let _ = tx.send(());
            }
            let release = self.release.lock().take();
            if let Some(rx) = release {
                let _ = rx.await;
            }
            Ok(GenerationOutput { text: self.reply.clone(), images: vec![] })
        }
    }

    pub struct OkImages;

    #[async_trait]
    impl ImageGenerator for OkImages {
        async fn generate_image(&self, _prompt: &str) -> Result<Vec<GeneratedImage>> {
            Ok(vec![GeneratedImage { mime_type: "image/png".into(), bytes: Bytes::from_static(b"img") }])
        }
    }

    pub fn pipeline(provider: DynProvider) -> Pipeline {
        Pipeline::new(Config::default(), provider, Arc::new(OkImages))
    }

    pub const FOUR_CONCEPTS: &str = r##"```json
[
  {"id":"a","name":"Roast","theme":"Warm","description":"Brown","colorPalette":["#3b2f2f"]},
  {"id":"b","name":"Bloom","theme":{"primary":"Floral"},"description":"Pink","colorPalette":{"a":"#fcc"}},
  {"name":"Grid","theme":"Swiss","description":"Mono","colorPalette":["#000","#fff"]},
  {"id":"d","name":"Night","theme":"Dark","description":"Neon"}
]
```"##;
}
