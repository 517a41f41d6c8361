// MCP resource handlers
//
// - docscout://roots  -> approved roots and access policy
// - docscout://server -> server name, version and tool list

use rmcp::model::*;

use crate::registry::ToolRegistry;
use crate::roots::PermissionSet;
use crate::tools::describe_permissions;

const ROOTS_URI: &str = "docscout://roots";
const SERVER_URI: &str = "docscout://server";

pub async fn list_resources() -> Result<ListResourcesResult, ErrorData> {
    let resources = vec![
        RawResource::new(ROOTS_URI, "roots").no_annotation(),
        RawResource::new(SERVER_URI, "server").no_annotation(),
    ];

    Ok(ListResourcesResult {
        meta: None,
        next_cursor: None,
        resources,
    })
}

/// No parameterized resources.
pub async fn list_resource_templates() -> Result<ListResourceTemplatesResult, ErrorData> {
    Ok(ListResourceTemplatesResult {
        meta: None,
        next_cursor: None,
        resource_templates: Vec::new(),
    })
}

pub async fn read_resource(
    permissions: &PermissionSet,
    registry: &ToolRegistry,
    request: ReadResourceRequestParams,
) -> Result<ReadResourceResult, ErrorData> {
    let uri = &request.uri;
    let body = match uri.as_str() {
        ROOTS_URI => describe_permissions(permissions),
        SERVER_URI => server_snapshot(registry),
        _ => {
            return Err(ErrorData::resource_not_found(
                format!("unknown resource: {uri}"),
                None,
            ))
        }
    };

    let json = serde_json::to_string(&body)
        .map_err(|e| ErrorData::internal_error(format!("failed to encode resource: {e}"), None))?;
    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(json, uri.clone())],
    })
}

fn server_snapshot(registry: &ToolRegistry) -> serde_json::Value {
    let tools: Vec<serde_json::Value> = registry
        .definitions()
        .map(|d| {
            serde_json::json!({
                "name": d.name,
                "description": d.description,
                "filesystem": d.filesystem,
            })
        })
        .collect();
    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "tools": tools,
    })
}
