use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const FILE_NAME: &str = "todos.json";
const APP_DIR: &str = "todo-list";

/// Where the task list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub file: PathBuf,
}

impl Config {
    /// Picks the task file: an explicit `--file` wins, then `--global` (the
    /// per-user data directory), then `todos.json` in `work_dir`.
    pub fn resolve(file: Option<PathBuf>, global: bool, work_dir: &Path) -> Result<Self> {
        let file = match file {
            Some(file) if file.is_absolute() => file,
            Some(file) => work_dir.join(file),
            None if global => Self::global_file()?,
            None => work_dir.join(FILE_NAME),
        };
        Ok(Self { file })
    }

    pub fn global_file() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("could not determine the user data directory")?;
        Ok(data_dir.join(APP_DIR).join(FILE_NAME))
    }
}
