use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Errors for resolving the application home directory
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("{0} environment variable is not set")]
    VarMissing(&'static str),
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(target_os = "windows")]
const USER_HOME_VARS: &[&str] = &["USERPROFILE", "HOME"];
#[cfg(not(target_os = "windows"))]
const USER_HOME_VARS: &[&str] = &["HOME"];

#[cfg(target_os = "windows")]
const DEFAULT_BASE_VAR: &str = "APPDATA";
#[cfg(not(target_os = "windows"))]
const DEFAULT_BASE_VAR: &str = "HOME";

fn user_home() -> Result<PathBuf, HomeDirError> {
    USER_HOME_VARS
        .iter()
        .find_map(|var| env::var(var).ok())
        .map(PathBuf::from)
        .ok_or(HomeDirError::VarMissing(USER_HOME_VARS[0]))
}

/// Expands a leading `~` to the user's home directory.
fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    if raw == "~" {
        return user_home();
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => Ok(user_home()?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}

/// Resolve the directory logs and other runtime files are written under.
///
/// - `config_home` given: `~` is expanded and the result must be absolute.
/// - `config_home` absent: `$HOME/<default_subdir>` (`%APPDATA%` on Windows).
///
/// With `create`, the directory is created if missing.
pub fn resolve_home_dir(
    config_home: Option<&str>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let expanded = expand_tilde(raw)?;
            if !expanded.is_absolute() {
                return Err(HomeDirError::AbsoluteRequired(
                    expanded.to_string_lossy().into(),
                ));
            }
            expanded
        }
        None => {
            let base = env::var(DEFAULT_BASE_VAR).map_err(|_| HomeDirError::VarMissing(DEFAULT_BASE_VAR))?;
            Path::new(&base).join(default_subdir)
        }
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_kept_and_created() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("nested").join("home");
        let raw = target.to_string_lossy().to_string();

        let resolved = resolve_home_dir(Some(&raw), ".viewkit", true).unwrap();

        assert_eq!(resolved, target);
        assert!(resolved.is_dir());
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = resolve_home_dir(Some("relative/dir"), ".viewkit", false).unwrap_err();
        assert!(matches!(err, HomeDirError::AbsoluteRequired(p) if p == "relative/dir"));
    }

    #[test]
    fn blank_value_falls_back_to_default_subdir() {
        // Only meaningful where the platform variable is set (CI and dev machines).
        if env::var(DEFAULT_BASE_VAR).is_err() {
            return;
        }
        let resolved = resolve_home_dir(Some("   "), ".viewkit-test", false).unwrap();
        assert!(resolved.ends_with(".viewkit-test"));
    }
}
