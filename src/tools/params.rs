// Tool parameter types

use serde::Deserialize;

/// Parameters for the `count_words` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CountWordsParams {
    /// File to count.
    #[schemars(description = "Path of the text file to count. Must lie inside an approved root.")]
    pub path: String,
}

fn default_max_results() -> usize {
    100
}

/// Upper bound accepted for `max_results`.
pub const MAX_RESULTS_CEILING: usize = 1000;

/// Parameters for the `search_files` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchFilesParams {
    /// File or directory to search.
    #[schemars(description = "File or directory to search. Directories are searched recursively.")]
    pub path: String,

    /// Literal text to look for.
    #[schemars(description = "Literal text to search for. Must not be empty.")]
    pub pattern: String,

    /// Match case exactly. Defaults to false.
    #[serde(default)]
    #[schemars(description = "Match case exactly. Defaults to false.")]
    pub case_sensitive: bool,

    /// Stop after this many matching lines. Defaults to 100.
    #[serde(default = "default_max_results")]
    #[schemars(description = "Maximum number of matching lines to return (1-1000). Defaults to 100.")]
    pub max_results: usize,
}

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_CEILING: u32 = 4096;

/// Parameters for the `summarize_file` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SummarizeFileParams {
    /// File to summarize.
    #[schemars(description = "Path of the text file to summarize. Must lie inside an approved root.")]
    pub path: String,

    /// Completion budget for the client's model.
    #[schemars(description = "Token budget for the summary (1-4096). Defaults to the server setting.")]
    pub max_tokens: Option<u32>,
}

/// Parameters for the `list_roots` tool (none).
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListRootsParams {}
