//! Shape checks for paths supplied to the text editor tool.
//!
//! Only absolute paths are accepted. A relative path is rejected with a
//! suggestion anchored at the workspace root so the agent can retry with the
//! path it most likely meant.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Require `raw` to be an absolute path and return it lexically normalized.
///
/// `.` segments are dropped and `..` segments pop the previous component;
/// symlinks are not resolved.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if `raw` is empty or relative.
pub fn require_absolute(raw: &str, workspace_root: &Path) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(AppError::PathViolation("path must not be empty".into()));
    }

    let candidate = Path::new(raw);
    if !candidate.is_absolute() {
        let suggested = normalize(&workspace_root.join(candidate));
        return Err(AppError::PathViolation(format!(
            "the path {raw} is not an absolute path, it should start with `/`. \
             Maybe you meant {}?",
            suggested.display()
        )));
    }

    Ok(normalize(candidate))
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if normalized.parent().is_some() {
                    normalized.pop();
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }
    normalized
}
