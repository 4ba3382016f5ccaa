//! Storage Layer
//!
//! Locates the platform directories used for configuration and for
//! visualization artifacts. The assembly core itself never writes files.

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "ocrfusion", "OcrFusion")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default directory for visualization images
pub fn get_visualization_dir() -> Result<PathBuf> {
    let dir = get_data_dir()?.join("visualizations");
    std::fs::create_dir_all(&dir)?;

    Ok(dir)
}
