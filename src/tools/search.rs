use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::params::{SearchFilesParams, MAX_RESULTS_CEILING};
use crate::error::ToolError;
use crate::notify::LogLevel;
use crate::registry::Tool;
use crate::supervisor::ToolContext;

/// Hard cap on files visited by one walk.
const MAX_FILES: usize = 10_000;
/// Matched lines longer than this are cut.
const MAX_LINE_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
struct Match {
    path: String,
    line: usize,
    text: String,
}

/// Literal text search over a file or a directory tree.
pub struct SearchFiles;

impl Tool for SearchFiles {
    type Params = SearchFilesParams;

    const NAME: &'static str = "search_files";
    const DESCRIPTION: &'static str = "Search a file, or every file under a directory, for a literal \
         string. Returns matching lines with their line numbers.";
    const FILESYSTEM: bool = true;

    fn target_path(params: &Self::Params) -> Option<&str> {
        Some(&params.path)
    }

    fn validate(params: &Self::Params) -> Result<(), ToolError> {
        if params.pattern.is_empty() {
            return Err(ToolError::InvalidArgument(
                "pattern must not be empty".to_string(),
            ));
        }
        if params.max_results == 0 || params.max_results > MAX_RESULTS_CEILING {
            return Err(ToolError::InvalidArgument(format!(
                "max_results must be between 1 and {MAX_RESULTS_CEILING}"
            )));
        }
        Ok(())
    }

    async fn run(&self, cx: ToolContext, params: Self::Params) -> Result<Value, ToolError> {
        let root = cx.target_path()?.to_path_buf();
        let (files, capped) = collect_files(&cx, &root).await?;
        if capped {
            cx.log(
                LogLevel::Warning,
                format!("stopped walking {} after {MAX_FILES} files", root.display()),
            );
        }

        let needle = if params.case_sensitive {
            params.pattern.clone()
        } else {
            params.pattern.to_lowercase()
        };

        let mut progress = cx.progress(files.len() as u64);
        let mut matches: Vec<Match> = Vec::new();
        let mut files_scanned = 0u64;
        let mut truncated = capped;

        'files: for file in &files {
            cx.checkpoint()?;
            let Some(text) = read_searchable(file).await else {
                progress.advance(1);
                continue;
            };
            files_scanned += 1;

            for (idx, line) in text.lines().enumerate() {
                let haystack = if params.case_sensitive {
                    Cow::Borrowed(line)
                } else {
                    Cow::Owned(line.to_lowercase())
                };
                if !haystack.contains(needle.as_str()) {
                    continue;
                }
                if matches.len() == params.max_results {
                    truncated = true;
                    progress.finish();
                    break 'files;
                }
                matches.push(Match {
                    path: file.display().to_string(),
                    line: idx + 1,
                    text: clip(line),
                });
            }
            progress.advance(1);
        }

        tracing::debug!(
            path = %root.display(),
            files_scanned,
            matches = matches.len(),
            truncated,
            "search finished"
        );
        Ok(serde_json::json!({
            "path": root.display().to_string(),
            "pattern": params.pattern,
            "files_scanned": files_scanned,
            "matches": matches,
            "truncated": truncated,
        }))
    }
}

/// Files under `root` in sorted depth-first order, each one re-authorized.
/// The flag is set when the walk stopped at [`MAX_FILES`].
async fn collect_files(cx: &ToolContext, root: &Path) -> Result<(Vec<PathBuf>, bool), ToolError> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| ToolError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Ok((vec![root.to_path_buf()], false));
    }

    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        cx.checkpoint()?;
        if !visited.insert(dir.clone()) {
            continue;
        }
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        let mut children = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => children.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(path = %dir.display(), error = %e, "directory listing cut short");
                    break;
                }
            }
        }
        children.sort();

        let mut subdirs = Vec::new();
        for child in children {
            // Symlinks may point anywhere; the authorizer resolves them.
            let Some(resolved) = cx.authorize(&child).await else {
                continue;
            };
            let Ok(metadata) = tokio::fs::metadata(&resolved).await else {
                continue;
            };
            if metadata.is_dir() {
                subdirs.push(resolved);
            } else if metadata.is_file() {
                files.push(resolved);
                if files.len() >= MAX_FILES {
                    return Ok((files, true));
                }
            }
        }
        pending.extend(subdirs.into_iter().rev());
    }

    Ok((files, false))
}

async fn read_searchable(path: &Path) -> Option<String> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            tracing::debug!(path = %path.display(), "skipping non-UTF-8 file");
            None
        }
    }
}

fn clip(line: &str) -> String {
    let line = line.trim_end();
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((cut, _)) => format!("{}…", &line[..cut]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pattern: &str, max_results: usize) -> SearchFilesParams {
        SearchFilesParams {
            path: "/docs".into(),
            pattern: pattern.into(),
            case_sensitive: false,
            max_results,
        }
    }

    #[test]
    fn validate_rejects_empty_pattern() {
        assert!(matches!(
            SearchFiles::validate(&params("", 10)),
            Err(ToolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_bounds_max_results() {
        assert!(SearchFiles::validate(&params("x", 0)).is_err());
        assert!(SearchFiles::validate(&params("x", 1001)).is_err());
        assert!(SearchFiles::validate(&params("x", 1000)).is_ok());
    }

    #[test]
    fn clip_keeps_short_lines() {
        assert_eq!(clip("short line   "), "short line");
    }

    #[test]
    fn clip_cuts_long_lines_on_char_boundary() {
        let long = "é".repeat(300);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_LINE_CHARS + 1);
        assert!(clipped.ends_with('…'));
    }
}
