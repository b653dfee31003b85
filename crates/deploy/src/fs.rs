//! File system utils for persisted deployment state.

use std::path::Path;

use anyhow::Context;
use serde::{Serialize, de::DeserializeOwned};

pub struct FsHandler;

impl FsHandler {
    // Create the parent directory of a state file if it doesn't exist
    pub fn create_parent_directory(path: &Path) -> anyhow::Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        if !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create state directory")?;
            tracing::debug!("Created state directory: {}", parent.display());
        }

        Ok(())
    }

    /// Read and parse a JSON file, returning `None` if it does not exist.
    pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
        if !path
            .try_exists()
            .with_context(|| format!("Failed to check if {} exists", path.display()))?
        {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;

        Ok(Some(value))
    }

    /// Write a value as pretty JSON.
    ///
    /// The content goes to a sibling temporary file first and is then renamed
    /// over the target, so a crash mid-write never leaves a truncated file.
    pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
        Self::create_parent_directory(path)?;

        let json = serde_json::to_string_pretty(value).context("Failed to serialize state")?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = Path::new(&tmp_name);

        std::fs::write(tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
