use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Config;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    /// Call the Gemini image model directly.
    #[value(alias = "google")]
    Gemini,
    /// Shell out to an external helper that prints JSON on stdout.
    #[value(alias = "helper")]
    Process,
}

#[derive(Parser, Debug)]
#[command(name = "blueprint", version, about = "Sketch-to-site concept and code generator backed by Gemini")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// TOML or YAML config file; flags override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub root: Option<String>,

    #[arg(long, global = true)]
    pub api_base: Option<String>,

    #[arg(long, global = true)]
    pub concepts_model: Option<String>,

    #[arg(long, global = true)]
    pub code_model: Option<String>,

    #[arg(long, global = true)]
    pub image_model: Option<String>,

    #[arg(long, value_enum, global = true)]
    pub image_backend: Option<ImageBackend>,

    /// Helper program and leading args, e.g. `--image-helper python3 --image-helper gen.py`.
    #[arg(long, global = true)]
    pub image_helper: Vec<String>,

    #[arg(long, global = true)]
    pub env_file: Option<String>,

    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = false, global = true)]
    pub save_request: bool,

    #[arg(long, default_value_t = false, global = true)]
    pub save_response: bool,

    #[arg(long, default_value_t = false, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Walk the wizard in the terminal and write the generated app to disk.
    Run {
        #[arg(long)]
        intent: String,
        /// PNG sketch; a blank canvas is used when omitted.
        #[arg(long)]
        sketch: Option<PathBuf>,
        /// 1-based concept to pick without prompting.
        #[arg(long)]
        pick: Option<usize>,
        #[arg(long, default_value = "blueprint-out")]
        out: PathBuf,
        #[arg(long, default_value_t = false)]
        auto_approve: bool,
    },
}

impl Args {
    /// Defaults <- config file <- flags.
    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        self.apply(&mut cfg);
        Ok(cfg)
    }

    pub fn apply(&self, cfg: &mut Config) {
        if let Some(v) = &self.root { cfg.root = v.clone(); }
        if let Some(v) = &self.api_base { cfg.api_base = v.clone(); }
        if let Some(v) = &self.concepts_model { cfg.concepts_model = v.clone(); }
        if let Some(v) = &self.code_model { cfg.code_model = v.clone(); }
        if let Some(v) = &self.image_model { cfg.image_model = v.clone(); }
        if let Some(v) = self.image_backend { cfg.image_backend = v; }
        if !self.image_helper.is_empty() { cfg.image_helper = self.image_helper.clone(); }
        if let Some(v) = &self.env_file { cfg.env_file = v.clone(); }
        if self.timeout_secs.is_some() { cfg.timeout_secs = self.timeout_secs; }
        cfg.save_request |= self.save_request;
        cfg.save_response |= self.save_response;
        if let Command::Serve { bind, port } = &self.command {
            if let Some(b) = bind { cfg.bind = b.clone(); }
            if let Some(p) = port { cfg.port = *p; }
        }
    }
}
