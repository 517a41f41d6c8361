use serde_json::Value;

use super::params::{SummarizeFileParams, MAX_TOKENS_CEILING};
use super::read_text;
use crate::config::SamplingConfig;
use crate::delegate::{DelegatedOutcome, DelegatedRequest};
use crate::error::ToolError;
use crate::notify::LogLevel;
use crate::registry::Tool;
use crate::supervisor::ToolContext;

/// File content beyond this many characters is not sent to the client.
const MAX_PROMPT_CHARS: usize = 20_000;
const FALLBACK_SENTENCES: usize = 3;
const FALLBACK_MAX_CHARS: usize = 600;

const SYSTEM_PROMPT: &str = "You summarize documents for a developer. Reply with a short plain-text \
     summary of the key points. Do not add commentary about the request.";

/// Summarizes a file through the client's model, falling back to an
/// extractive summary when the client cannot or does not answer.
pub struct SummarizeFile {
    sampling: SamplingConfig,
}

impl SummarizeFile {
    pub fn new(sampling: SamplingConfig) -> Self {
        Self { sampling }
    }

    fn request_for(&self, name: &str, text: &str, max_tokens: Option<u32>) -> DelegatedRequest {
        let body = match text.char_indices().nth(MAX_PROMPT_CHARS) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        let prompt = format!("Summarize the file `{name}`.\n\n{body}");
        let mut request =
            DelegatedRequest::new(prompt, max_tokens.unwrap_or(self.sampling.max_tokens))
                .with_system_prompt(SYSTEM_PROMPT)
                .with_temperature(self.sampling.temperature);
        if let Some(hint) = &self.sampling.model_hint {
            request = request.with_model_hint(hint.clone());
        }
        request
    }
}

impl Tool for SummarizeFile {
    type Params = SummarizeFileParams;

    const NAME: &'static str = "summarize_file";
    const DESCRIPTION: &'static str = "Summarize a text file inside an approved root. Uses the \
         client's model when available and a local extractive summary otherwise.";
    const FILESYSTEM: bool = true;

    fn target_path(params: &Self::Params) -> Option<&str> {
        Some(&params.path)
    }

    fn validate(params: &Self::Params) -> Result<(), ToolError> {
        match params.max_tokens {
            Some(n) if n == 0 || n > MAX_TOKENS_CEILING => Err(ToolError::InvalidArgument(
                format!("max_tokens must be between 1 and {MAX_TOKENS_CEILING}"),
            )),
            _ => Ok(()),
        }
    }

    async fn run(&self, cx: ToolContext, params: Self::Params) -> Result<Value, ToolError> {
        let path = cx.target_path()?.to_path_buf();
        let text = read_text(&path).await?;
        if text.trim().is_empty() {
            return Err(ToolError::InvalidArgument(format!(
                "{} is empty",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let request = self.request_for(&name, &text, params.max_tokens);

        let (summary, source, fallback_reason) = match cx.delegate(&request).await? {
            DelegatedOutcome::Fulfilled(completion) => {
                (completion.trim().to_string(), "sampling", None)
            }
            DelegatedOutcome::Declined(reason) => {
                cx.log(LogLevel::Info, format!("summarizing locally: {reason}"));
                (
                    extractive_summary(&text),
                    "fallback",
                    Some(format!("declined: {reason}")),
                )
            }
            DelegatedOutcome::Failed(err) => {
                cx.log(
                    LogLevel::Warning,
                    format!("client summary failed, summarizing locally: {err}"),
                );
                (
                    extractive_summary(&text),
                    "fallback",
                    Some(format!("failed: {err}")),
                )
            }
        };

        let mut result = serde_json::json!({
            "path": path.display().to_string(),
            "summary": summary,
            "source": source,
        });
        if let Some(reason) = fallback_reason {
            result["fallback_reason"] = Value::String(reason);
        }
        Ok(result)
    }
}

/// The first few sentences of `text`, whitespace-normalized and bounded in
/// length. Depends only on `text`.
pub fn extractive_summary(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut end = normalized.len();
    let mut sentences = 0;
    let mut chars = normalized.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let at_boundary = chars.peek().map_or(true, |&(_, next)| next == ' ');
        if matches!(c, '.' | '!' | '?') && at_boundary {
            sentences += 1;
            if sentences == FALLBACK_SENTENCES {
                end = i + c.len_utf8();
                break;
            }
        }
    }

    let summary = &normalized[..end];
    let Some((cut, _)) = summary.char_indices().nth(FALLBACK_MAX_CHARS) else {
        return summary.to_string();
    };
    let head = &summary[..cut];
    let head = head.rfind(' ').map_or(head, |space| &head[..space]);
    format!("{}…", head.trim_end())
}
