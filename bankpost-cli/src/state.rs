use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `$BANKPOST_HOME`, else `~/.bankpost`.
pub fn bankpost_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("BANKPOST_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set (or set BANKPOST_HOME)")?;
    Ok(PathBuf::from(home).join(".bankpost"))
}

pub fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

pub fn ensure_bankpost_home() -> Result<PathBuf> {
    ensure_dir(&bankpost_home()?)
}

/// Relative paths in the config are relative to the home directory.
pub fn resolve_under(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}
