use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::wire::{GenerationOutput, GenerationRequest};

pub mod gemini;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationOutput>;
}

pub type DynProvider = Arc<dyn Provider + Send + Sync>;

pub fn make_provider(cfg: &Config) -> Result<DynProvider> {
    Ok(Arc::new(gemini::GeminiProvider::new(
        cfg.api_base.clone(),
        cfg.api_key.clone(),
        cfg.timeout_secs.map(Duration::from_secs),
    )?))
}
