use rmcp::model::{ErrorCode, ErrorData};
use thiserror::Error;

/// Machine-readable classification of every failure an invocation can
/// observe, including the delegation kinds that are normally recovered by a
/// fallback and never reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    InvalidArgument,
    DelegationTimeout,
    DelegationDeclined,
    DelegationFailed,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::DelegationTimeout => "delegation_timeout",
            ErrorKind::DelegationDeclined => "delegation_declined",
            ErrorKind::DelegationFailed => "delegation_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of a tool invocation.
///
/// Each variant maps to an [`ErrorKind`] and a human-readable message. The
/// MCP layer converts it into an [`ErrorData`] whose `data.kind` carries the
/// kind string, so clients never receive a bare backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The path resolved outside every approved root, or could not be resolved.
    #[error("access denied: {path}: {reason}")]
    AccessDenied { path: String, reason: String },
    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A parameter was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The caller cancelled the invocation.
    #[error("invocation cancelled")]
    Cancelled,
    /// Unexpected infrastructure fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::AccessDenied { .. } => ErrorKind::AccessDenied,
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ToolError::Cancelled => ErrorKind::Cancelled,
            ToolError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// JSON-RPC error code used when the error reaches the caller.
    pub fn code(&self) -> ErrorCode {
        match self.kind() {
            ErrorKind::InvalidArgument => ErrorCode::INVALID_PARAMS,
            ErrorKind::NotFound => ErrorCode::RESOURCE_NOT_FOUND,
            ErrorKind::AccessDenied => ErrorCode::INVALID_REQUEST,
            _ => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// Map a filesystem error on an already-authorized path.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(path.display().to_string()),
            std::io::ErrorKind::InvalidData => ToolError::InvalidArgument(format!(
                "{} is not valid UTF-8 text",
                path.display()
            )),
            std::io::ErrorKind::PermissionDenied => ToolError::AccessDenied {
                path: path.display().to_string(),
                reason: "the operating system refused access".to_string(),
            },
            _ => ToolError::Internal(format!("failed to read {}: {err}", path.display())),
        }
    }
}

impl From<ToolError> for ErrorData {
    fn from(err: ToolError) -> Self {
        let data = Some(serde_json::json!({ "kind": err.kind().as_str() }));
        ErrorData::new(err.code(), err.to_string(), data)
    }
}
