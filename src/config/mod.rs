use anyhow::{bail, Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::ImageBackend;

/// Names the API key may be stored under, in lookup order.
pub const API_KEY_VARS: &[&str] = &["NEXT_PUBLIC_GEMINI_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: String,
    pub root: String,
    pub api_base: String,
    pub concepts_model: String,
    pub code_model: String,
    pub image_model: String,
    pub image_backend: ImageBackend,
    /// Program (+ leading args) for the process image backend; the prompt is
    /// appended as the last argument.
    pub image_helper: Vec<String>,
    pub env_file: String,
    pub bind: String,
    pub port: u16,
    /// `None` means requests wait as long as the provider takes.
    pub timeout_secs: Option<u64>,
    pub save_request: bool,
    pub save_response: bool,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: "2026-10-01".into(),
            root: ".".into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            concepts_model: "gemini-3-flash-preview".into(),
            code_model: "gemini-3-pro-preview".into(),
            image_model: "gemini-3-pro-image-preview".into(),
            image_backend: ImageBackend::Gemini,
            image_helper: vec!["scripts/generate_images.py".into()],
            env_file: ".env.local".into(),
            bind: "127.0.0.1".into(),
            port: 3000,
            timeout_secs: None,
            save_request: false,
            save_response: false,
            api_key: None,
        }
    }
}

impl Config {
    /// Read a config file; the format follows the extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        let cfg: Config = match ext.as_str() {
            "toml" => toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?,
            other => bail!("unsupported config format '{other}' for {}", path.display()),
        };
        Ok(cfg)
    }

    pub fn artifacts_root(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Resolve the API key from the process environment, then the env file.
    /// A missing key is only warned about: requests go out and fail upstream.
    pub fn load_api_key(&mut self) {
        let file_vars = read_env_file(Path::new(&self.env_file));
        self.api_key = pick_api_key(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()))
        });
        if self.api_key.is_none() {
            tracing::warn!("missing GEMINI_API_KEY in environment variables");
        }
    }
}

/// First non-empty value among [`API_KEY_VARS`].
pub fn pick_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn read_env_file(path: &Path) -> Vec<(String, String)> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
        Err(e) => {
            tracing::debug!("env file {} not loaded: {e}", path.display());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn public_name_wins_over_plain_name() {
        let key = pick_api_key(lookup_from(&[("GEMINI_API_KEY", "b"), ("NEXT_PUBLIC_GEMINI_API_KEY", "a")]));
        assert_eq!(key.as_deref(), Some("a"));
    }

    #[test]
    fn blank_values_are_skipped() {
        let key = pick_api_key(lookup_from(&[("NEXT_PUBLIC_GEMINI_API_KEY", "  "), ("GEMINI_API_KEY", "k")]));
        assert_eq!(key.as_deref(), Some("k"));
        assert!(pick_api_key(lookup_from(&[])).is_none());
    }

    #[test]
    fn env_file_is_read_without_touching_process_env() {
        let mut f = tempfile::Builder::new().suffix(".env").tempfile().unwrap();
        writeln!(f, "GEMINI_API_KEY=\"from-file\"").unwrap();
        let vars = read_env_file(f.path());
        assert!(vars.contains(&("GEMINI_API_KEY".to_string(), "from-file".to_string())));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "port = 8088\ncode_model = \"custom\"\nimage_backend = \"process\"").unwrap();
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.code_model, "custom");
        assert_eq!(cfg.image_backend, ImageBackend::Process);
        assert_eq!(cfg.concepts_model, Config::default().concepts_model);
    }

    #[test]
    fn yaml_file_is_accepted() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "bind: 0.0.0.0\ntimeout_secs: 30").unwrap();
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0");
        assert_eq!(cfg.timeout_secs, Some(30));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let f = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(Config::from_file(f.path()).is_err());
    }
}
