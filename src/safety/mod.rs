use std::path::{Component, Path, PathBuf};

use crate::errors::BlueprintError;

/// Map a bundle path such as `/components/Hero.js` onto a relative path under
/// the output root. Anything that could escape the root is refused.
pub fn bundle_path_to_relative(candidate: &str) -> Result<PathBuf, BlueprintError> {
    let trimmed = candidate.trim().trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        return Err(BlueprintError::Safety(format!("empty file path: {candidate:?}")));
    }
    let mut out = PathBuf::new();
    for comp in Path::new(trimmed).components() {
        match comp {
            Component::Normal(seg) => out.push(seg),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BlueprintError::Safety(format!("path escapes output root: {candidate}")));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(BlueprintError::Safety(format!("empty file path: {candidate:?}")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slash_becomes_relative() {
        assert_eq!(bundle_path_to_relative("/components/Hero.js").unwrap(), PathBuf::from("components/Hero.js"));
        assert_eq!(bundle_path_to_relative("App.js").unwrap(), PathBuf::from("App.js"));
        assert_eq!(bundle_path_to_relative("/./styles.css").unwrap(), PathBuf::from("styles.css"));
    }

    #[test]
    fn traversal_is_refused() {
        assert!(bundle_path_to_relative("/../etc/passwd").is_err());
        assert!(bundle_path_to_relative("components/../../x.js").is_err());
        assert!(bundle_path_to_relative("/").is_err());
        assert!(bundle_path_to_relative("  ").is_err());
    }
}
