use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CmdResult {
    pub program: String,
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Turn a configured helper command into (program, leading args). A bare
/// `.py` script gets the platform's Python interpreter in front of it.
pub fn resolve_helper(helper: &[String]) -> Result<(PathBuf, Vec<String>)> {
    let Some((first, rest)) = helper.split_first() else {
        bail!("empty helper command");
    };
    if first.ends_with(".py") {
        let python = find_python()?;
        return Ok((python, helper.to_vec()));
    }
    let program = which::which(first).unwrap_or_else(|_| PathBuf::from(first));
    Ok((program, rest.to_vec()))
}

fn find_python() -> Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "windows") { &["python", "python3"] } else { &["python3", "python"] };
    candidates
        .iter()
        .find_map(|c| which::which(c).ok())
        .with_context(|| format!("no Python interpreter found (tried {candidates:?})"))
}

/// Spawn `program args.. last_arg` directly (no shell, so the argument needs no
/// quoting) and capture its output. A non-zero exit is reported, not raised.
pub async fn run_capture(program: &Path, args: &[String], last_arg: &str) -> Result<CmdResult> {
    let out = Command::new(program)
        .args(args)
        .arg(last_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to spawn {}", program.display()))?;

    Ok(CmdResult {
        program: program.display().to_string(),
        status: out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_passes_last_arg() {
        let (program, args) = resolve_helper(&["sh".into(), "-c".into(), "printf '%s' \"$0\"".into()]).unwrap();
        let r = run_capture(&program, &args, "hello \"quoted\" world").await.unwrap();
        assert!(r.success());
        assert_eq!(r.stdout, "hello \"quoted\" world");
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let (program, args) = resolve_helper(&["sh".into(), "-c".into(), "echo boom >&2; exit 3".into()]).unwrap();
        let r = run_capture(&program, &args, "x").await.unwrap();
        assert_eq!(r.status, 3);
        assert!(r.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let (program, args) = resolve_helper(&["definitely-not-a-real-binary-xyz".into()]).unwrap();
        assert!(run_capture(&program, &args, "x").await.is_err());
    }

    #[test]
    fn empty_helper_is_rejected() {
        assert!(resolve_helper(&[]).is_err());
    }
}
