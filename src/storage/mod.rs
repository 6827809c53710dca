//! Storage Layer
//!
//! Platform directories and the tag table file.

pub mod tags;

use anyhow::Result;
use std::path::PathBuf;

pub use tags::{load_tag_table, load_tag_table_or_builtin, save_tag_table};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "docscan", "DocScan")
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

/// Default location of the user's tag table
pub fn default_tag_table_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("tags.json"))
}
