//! Name → handler lookup table with declared parameter shapes.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ToolError;
use crate::supervisor::ToolContext;

/// A named operation the server exposes.
///
/// `Params` is deserialized from the request's argument object before any
/// authorization happens; its JSON schema is published as the tool's input
/// shape.
pub trait Tool: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + 'static;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    /// Tools that touch the filesystem must also return their path from
    /// [`Tool::target_path`].
    const FILESYSTEM: bool = false;

    /// The path that must pass authorization before `run` is called.
    fn target_path(_params: &Self::Params) -> Option<&str> {
        None
    }

    /// Argument checks that go beyond the schema.
    fn validate(_params: &Self::Params) -> Result<(), ToolError> {
        Ok(())
    }

    fn run(
        &self,
        cx: ToolContext,
        params: Self::Params,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

/// Published description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Arc<JsonObject>,
    pub filesystem: bool,
}

impl ToolDefinition {
    pub fn to_mcp(&self) -> rmcp::model::Tool {
        rmcp::model::Tool::new(self.name, self.description, self.input_schema.clone())
    }
}

type RunFn = Box<dyn FnOnce(ToolContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send>;

/// A validated call, ready to run once its target path is authorized.
pub struct PreparedCall {
    target: Option<String>,
    run: RunFn,
}

impl PreparedCall {
    pub fn target_path(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn run(self, cx: ToolContext) -> BoxFuture<'static, Result<Value, ToolError>> {
        (self.run)(cx)
    }
}

/// Object-safe view of a [`Tool`].
pub trait DynTool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;
    fn prepare(&self, arguments: JsonObject) -> Result<PreparedCall, ToolError>;
}

struct Registered<T: Tool> {
    tool: Arc<T>,
    definition: ToolDefinition,
}

impl<T: Tool> DynTool for Registered<T> {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn prepare(&self, arguments: JsonObject) -> Result<PreparedCall, ToolError> {
        let params: T::Params = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::InvalidArgument(format!("{}: {e}", T::NAME)))?;
        T::validate(&params)?;

        let target = T::target_path(&params).map(str::to_string);
        if T::FILESYSTEM && target.is_none() {
            return Err(ToolError::InvalidArgument(format!(
                "{}: a path is required",
                T::NAME
            )));
        }

        let tool = self.tool.clone();
        Ok(PreparedCall {
            target,
            run: Box::new(move |cx| Box::pin(async move { tool.run(cx, params).await })),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(&'static str),
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool>(&mut self, tool: T) -> Result<&mut Self, RegistryError> {
        if self.get(T::NAME).is_some() {
            return Err(RegistryError::Duplicate(T::NAME));
        }
        let definition = ToolDefinition {
            name: T::NAME,
            description: T::DESCRIPTION,
            input_schema: Arc::new(input_schema::<T::Params>()),
            filesystem: T::FILESYSTEM,
        };
        self.tools.push(Arc::new(Registered {
            tool: Arc::new(tool),
            definition,
        }));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynTool>> {
        self.tools
            .iter()
            .find(|t| t.definition().name == name)
            .cloned()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| t.definition())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn input_schema<P: JsonSchema>() -> JsonObject {
    match serde_json::to_value(schemars::schema_for!(P)) {
        Ok(Value::Object(mut map)) => {
            map.remove("$schema");
            map
        }
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".to_string(), Value::String("object".to_string()));
            map
        }
    }
}
