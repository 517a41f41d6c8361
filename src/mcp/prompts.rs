// MCP prompt handlers
//
// Exposes usage guides as MCP prompts. Each guide is a markdown document
// that teaches agents how to work with the docscout tools.

use rmcp::model::*;

struct GuideDef {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

const GUIDES: &[GuideDef] = &[
    GuideDef {
        name: "docscout:guide",
        description: "Approved roots, the four tools, and the error kinds they return",
        content: include_str!("../../skills/docscout/guide.md"),
    },
    GuideDef {
        name: "docscout:summarize",
        description: "How summarize_file uses sampling and when it falls back",
        content: include_str!("../../skills/docscout/summarize.md"),
    },
];

pub async fn list_prompts() -> Result<ListPromptsResult, ErrorData> {
    let prompts = GUIDES
        .iter()
        .map(|g| Prompt::new(g.name, Some(g.description), None))
        .collect();

    Ok(ListPromptsResult {
        prompts,
        next_cursor: None,
        meta: None,
    })
}

pub async fn get_prompt(name: &str) -> Result<GetPromptResult, ErrorData> {
    let guide = GUIDES
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| ErrorData::invalid_params(format!("unknown prompt: {name}"), None))?;

    Ok(GetPromptResult {
        description: Some(guide.description.to_string()),
        messages: vec![PromptMessage::new_text(
            PromptMessageRole::User,
            guide.content.to_string(),
        )],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_prompts_has_expected_names() {
        let result = list_prompts().await.unwrap();
        let names: Vec<&str> = result.prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["docscout:guide", "docscout:summarize"]);
        assert!(result.prompts.iter().all(|p| p.description.is_some()));
    }

    #[tokio::test]
    async fn get_prompt_guide_mentions_every_tool() {
        let result = get_prompt("docscout:guide").await.unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, PromptMessageRole::User);

        match &result.messages[0].content {
            PromptMessageContent::Text { text } => {
                for tool in ["list_roots", "count_words", "search_files", "summarize_file"] {
                    assert!(text.contains(tool), "guide should mention {tool}");
                }
            }
            _ => panic!("expected text content"),
        }
    }

    #[tokio::test]
    async fn get_prompt_nonexistent_returns_error() {
        let err = get_prompt("nonexistent").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
