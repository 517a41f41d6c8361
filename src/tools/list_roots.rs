use serde_json::Value;

use super::params::ListRootsParams;
use crate::error::ToolError;
use crate::registry::Tool;
use crate::roots::{CaseSensitivity, PermissionSet};
use crate::supervisor::ToolContext;

/// Reports the approved roots and access policy.
pub struct ListRoots;

impl Tool for ListRoots {
    type Params = ListRootsParams;

    const NAME: &'static str = "list_roots";
    const DESCRIPTION: &'static str =
        "List the directories this server may read, and the policy applied when none are set.";

    async fn run(&self, cx: ToolContext, _params: Self::Params) -> Result<Value, ToolError> {
        Ok(describe(cx.permissions()))
    }
}

/// JSON view of a permission set, shared with the `docscout://roots` resource.
pub fn describe(permissions: &PermissionSet) -> Value {
    let roots: Vec<String> = permissions
        .roots()
        .iter()
        .map(|r| r.display().to_string())
        .collect();
    serde_json::json!({
        "roots": roots,
        "empty_policy": permissions.empty_policy().as_str(),
        "case_insensitive": permissions.case_sensitivity() == CaseSensitivity::Insensitive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::EmptyRootsPolicy;

    #[test]
    fn describes_empty_set() {
        let value = describe(&PermissionSet::empty().with_empty_policy(EmptyRootsPolicy::Deny));
        assert_eq!(value["roots"], serde_json::json!([]));
        assert_eq!(value["empty_policy"], "deny");
        assert_eq!(value["case_insensitive"], false);
    }

    #[test]
    fn lists_canonical_roots() {
        let dir = tempfile::tempdir().unwrap();
        let set = PermissionSet::new([dir.path()]).unwrap();
        let value = describe(&set);
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(value["roots"][0], canonical.display().to_string());
    }
}
