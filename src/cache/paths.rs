//! Data directory paths - uses ~/.local/share/gamechurn/ for persisted model state

use std::path::{Path, PathBuf};

/// Base data directory.
/// Uses ~/.local/share/gamechurn on Unix, %LOCALAPPDATA%/gamechurn on Windows.
pub fn data_dir() -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::data_dir().unwrap_or_else(|| {
            // Fallback to ~/.local/share
            dirs::home_dir()
                .map(|h| h.join(".local").join("share"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("gamechurn")
}

/// Default model store root.
pub fn default_models_dir() -> PathBuf {
    data_dir().join("models")
}

/// Saved prediction exports live next to the models unless `--output` says otherwise.
pub fn default_export_path(models_dir: &Path, method: &str) -> PathBuf {
    models_dir
        .parent()
        .unwrap_or(models_dir)
        .join("exports")
        .join(format!("predictions-{method}.json"))
}

/// Ensure a directory exists.
pub fn ensure_dir(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}
