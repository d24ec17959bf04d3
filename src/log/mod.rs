use fs_err as fs;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::Config;

/// `RUST_LOG` wins; otherwise `info`, or `debug` when asked for.
pub fn init(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();
}

#[derive(Debug)]
pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: Option<PathBuf>,
    pub response: Option<PathBuf>,
}

pub fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join(".blueprint").join("tx").join(tx.to_string())
}

/// Persist one generation stage as pretty JSON, when the config asks for it.
/// The response is stored as the raw model text wrapped in a small envelope,
/// since it is frequently not valid JSON on its own.
pub fn save_stage<Req: Serialize>(
    stage: &str,
    req: &Req,
    raw_response: &str,
    tx: Uuid,
    cfg: &Config,
) -> anyhow::Result<Option<SavedPaths>> {
    if !cfg.save_request && !cfg.save_response {
        return Ok(None);
    }
    let dir = tx_dir(&cfg.artifacts_root(), tx);
    fs::create_dir_all(&dir)?;

    let mut request_path = None;
    let mut response_path = None;

    if cfg.save_request {
        let p = dir.join(format!("{stage}.request.json"));
        fs::write(&p, to_string_pretty(req)?)?;
        request_path = Some(p);
    }

    if cfg.save_response {
        let p = dir.join(format!("{stage}.response.json"));
        let envelope = serde_json::json!({
            "stage": stage,
            "saved_at": chrono::Utc::now(),
            "raw": raw_response,
        });
        fs::write(&p, to_string_pretty(&envelope)?)?;
        response_path = Some(p);
    }

    let saved = SavedPaths { dir, request: request_path, response: response_path };
    tracing::debug!(stage, dir = %saved.dir.display(), "saved stage artifacts");
    Ok(Some(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nothing_is_written_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config { root: tmp.path().display().to_string(), ..Config::default() };
        let saved = save_stage("concepts", &json!({}), "[]", Uuid::new_v4(), &cfg).unwrap();
        assert!(saved.is_none());
        assert!(!tmp.path().join(".blueprint").exists());
    }

    #[test]
    fn request_and_response_land_in_tx_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = Config {
            root: tmp.path().display().to_string(),
            save_request: true,
            save_response: true,
            ..Config::default()
        };
        let tx = Uuid::new_v4();
        let saved = save_stage("code", &json!({ "model": "m" }), "```json\n{}\n```", tx, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(saved.dir, tx_dir(tmp.path(), tx));
        let req = fs::read_to_string(saved.request.unwrap()).unwrap();
        assert!(req.contains("\"model\": \"m\""));
        let resp: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(saved.response.unwrap()).unwrap()).unwrap();
        assert_eq!(resp["raw"], "```json\n{}\n```");
        assert_eq!(resp["stage"], "code");
    }
}
