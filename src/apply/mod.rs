use anyhow::{Context, Result};
use fs_err as fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::safety;
use crate::wire::CodeBundle;

#[derive(Debug, Default, Clone)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub bytes: usize,
    pub written: Vec<PathBuf>,
}

/// Write every file of the bundle under `root`. All paths are checked before
/// anything is written, so a bad path leaves the directory untouched.
pub fn write_bundle(root: &Path, bundle: &CodeBundle, dry_run: bool) -> Result<ApplySummary> {
    let planned = bundle
        .files()
        .map(|(path, body)| -> Result<(PathBuf, &String)> {
            Ok((root.join(safety::bundle_path_to_relative(path)?), body))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summary = ApplySummary::default();
    for (abs, body) in planned {
        if abs.exists() {
            summary.updated += 1;
        } else {
            summary.created += 1;
        }
        summary.bytes += body.len();
        if !dry_run {
            let parent = abs.parent().unwrap_or(root);
            fs::create_dir_all(parent)?;
            let tmp = NamedTempFile::new_in(parent)?;
            fs::write(tmp.path(), body)?;
            tmp.persist(&abs).with_context(|| format!("writing {}", abs.display()))?;
        }
        summary.written.push(abs);
    }
    Ok(summary)
}
