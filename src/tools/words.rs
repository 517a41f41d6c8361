use serde::Serialize;
use serde_json::Value;

use super::params::CountWordsParams;
use super::read_text;
use crate::error::ToolError;
use crate::registry::Tool;
use crate::supervisor::ToolContext;

/// Line, word and character counts of a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub lines: u64,
    pub words: u64,
    pub characters: u64,
    pub bytes: u64,
}

impl TextStats {
    fn add_line(&mut self, line: &str) {
        self.lines += 1;
        self.words += line.split_whitespace().count() as u64;
        self.characters += line.chars().count() as u64;
        self.bytes += line.len() as u64;
    }

    /// Count `text` in one pass.
    pub fn of(text: &str) -> Self {
        let mut stats = Self::default();
        for line in text.split_inclusive('\n') {
            stats.add_line(line);
        }
        stats
    }
}

/// Counts lines, words and characters of a file, reporting progress per line.
pub struct CountWords;

impl Tool for CountWords {
    type Params = CountWordsParams;

    const NAME: &'static str = "count_words";
    const DESCRIPTION: &'static str =
        "Count lines, words, characters and bytes in a text file inside an approved root.";
    const FILESYSTEM: bool = true;

    fn target_path(params: &Self::Params) -> Option<&str> {
        Some(&params.path)
    }

    async fn run(&self, cx: ToolContext, _params: Self::Params) -> Result<Value, ToolError> {
        let path = cx.target_path()?.to_path_buf();
        let text = read_text(&path).await?;

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let mut progress = cx.progress(lines.len() as u64);
        let mut stats = TextStats::default();
        for line in lines {
            cx.checkpoint()?;
            stats.add_line(line);
            progress.advance(1);
        }

        tracing::debug!(path = %path.display(), lines = stats.lines, words = stats.words, "counted");
        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "lines": stats.lines,
            "words": stats.words,
            "characters": stats.characters,
            "bytes": stats.bytes,
        }))
    }
}
