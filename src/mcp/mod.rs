pub mod peer;
pub mod prompts;
pub mod resources;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rmcp::{model::*, service::RequestContext, RoleServer, ServerHandler, ServiceExt};

use crate::delegate::DelegatedComputeClient;
use crate::notify::{LogLevel, NotificationSink};
use crate::registry::ToolRegistry;
use crate::roots::PathAuthorizer;
use crate::supervisor::{InvocationRequest, Supervisor};
use peer::{PeerNotifier, PeerSampler};

/// MCP front end: lists registered tools and runs calls through the
/// [`Supervisor`].
///
/// The supervisor is built on first use from the connected peer, so its
/// notification sink and delegation client talk to that client.
#[derive(Clone)]
pub struct DocscoutMcpServer {
    registry: Arc<ToolRegistry>,
    authorizer: PathAuthorizer,
    sampling_timeout: Duration,
    supervisor: Arc<OnceLock<Supervisor>>,
}

impl DocscoutMcpServer {
    pub fn new(registry: ToolRegistry, authorizer: PathAuthorizer, sampling_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            authorizer,
            sampling_timeout,
            supervisor: Arc::new(OnceLock::new()),
        }
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;
        Ok(())
    }

    fn supervisor(&self, context: &RequestContext<RoleServer>) -> &Supervisor {
        self.supervisor.get_or_init(|| {
            let sink = NotificationSink::spawn(PeerNotifier::new(context.peer.clone()));
            let delegate = DelegatedComputeClient::new(
                Arc::new(PeerSampler::new(context.peer.clone())),
                self.sampling_timeout,
            );
            tracing::debug!("supervisor bound to client connection");
            Supervisor::new(
                self.registry.clone(),
                self.authorizer.clone(),
                sink,
                delegate,
            )
        })
    }
}

impl ServerHandler for DocscoutMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: "docscout".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "Read-only access to local documents inside approved directories, \
                     with progress reporting and client-side summarization."
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "docscout reads text files inside approved root directories. Call list_roots \
                 to see them. Use search_files to find files by content, count_words for \
                 file statistics, and summarize_file for a summary (produced by your model \
                 when sampling is available, otherwise extracted locally). Paths outside the \
                 roots fail with data.kind = access_denied."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.registry.definitions().map(|d| d.to_mcp()).collect(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut invocation =
            InvocationRequest::new(request.name.to_string(), request.arguments.unwrap_or_default())
                .with_cancellation(context.ct.clone());
        if let Some(token) = context.meta.get_progress_token() {
            invocation = invocation.with_progress_token(token);
        }

        let outcome = self.supervisor(&context).invoke(invocation).await;
        let value = outcome.into_result()?;
        let text = serde_json::to_string(&value)
            .map_err(|e| ErrorData::internal_error(format!("failed to encode result: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    async fn set_level(
        &self,
        request: SetLevelRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<(), ErrorData> {
        let level = LogLevel::from(request.level);
        self.supervisor(&context).sink().set_min_level(level);
        tracing::info!(level = level.as_str(), "client log level set");
        Ok(())
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        resources::list_resources().await
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, ErrorData> {
        resources::list_resource_templates().await
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        resources::read_resource(self.authorizer.permissions(), &self.registry, request).await
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        prompts::list_prompts().await
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        prompts::get_prompt(&request.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::roots::PermissionSet;
    use crate::tools::builtin_registry;

    fn server() -> DocscoutMcpServer {
        DocscoutMcpServer::new(
            builtin_registry(&SamplingConfig::default()).unwrap(),
            PathAuthorizer::new(PermissionSet::empty()),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn info_advertises_logging_and_tools() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "docscout");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.logging.is_some());
        let instructions = info.instructions.unwrap();
        for tool in ["list_roots", "search_files", "count_words", "summarize_file"] {
            assert!(instructions.contains(tool));
        }
    }

    #[test]
    fn published_tools_have_object_schemas() {
        let server = server();
        let tools: Vec<Tool> = server.registry.definitions().map(|d| d.to_mcp()).collect();
        assert_eq!(tools.len(), 4);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        }
    }
}
