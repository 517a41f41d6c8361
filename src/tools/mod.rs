//! Built-in tools.

mod list_roots;
pub mod params;
mod search;
mod summarize;
mod words;

use std::path::Path;

pub use list_roots::{describe as describe_permissions, ListRoots};
pub use search::SearchFiles;
pub use summarize::{extractive_summary, SummarizeFile};
pub use words::{CountWords, TextStats};

use crate::config::SamplingConfig;
use crate::error::ToolError;
use crate::registry::{RegistryError, ToolRegistry};

/// Registry holding every built-in tool.
pub fn builtin_registry(sampling: &SamplingConfig) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry
        .register(CountWords)?
        .register(SearchFiles)?
        .register(SummarizeFile::new(sampling.clone()))?
        .register(ListRoots)?;
    Ok(registry)
}

/// Read an authorized file as UTF-8 text.
pub(crate) async fn read_text(path: &Path) -> Result<String, ToolError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ToolError::from_io(path, e))?;
    if metadata.is_dir() {
        return Err(ToolError::InvalidArgument(format!(
            "{} is a directory",
            path.display()
        )));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::from_io(path, e))?;
    String::from_utf8(bytes).map_err(|_| {
        ToolError::InvalidArgument(format!("{} is not valid UTF-8 text", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_lists_all_tools() {
        let registry = builtin_registry(&SamplingConfig::default()).unwrap();
        let names: Vec<&str> = registry.definitions().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["count_words", "search_files", "summarize_file", "list_roots"]
        );
        let fs: Vec<bool> = registry.definitions().map(|d| d.filesystem).collect();
        assert_eq!(fs, vec![true, true, true, false]);
    }

    #[tokio::test]
    async fn read_text_rejects_directories_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_text(dir.path()).await,
            Err(ToolError::InvalidArgument(_))
        ));

        let bin = dir.path().join("blob.bin");
        std::fs::write(&bin, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            read_text(&bin).await,
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn read_text_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_text(&dir.path().join("gone.txt")).await,
            Err(ToolError::NotFound(_))
        ));
    }
}
