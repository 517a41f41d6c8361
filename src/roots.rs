//! Filesystem permission boundary.
//!
//! A [`PermissionSet`] is the list of approved root directories, fixed when
//! the process starts. [`PathAuthorizer`] answers whether a candidate path
//! lies under one of those roots. Comparison always happens on resolved
//! paths: the candidate is made absolute, `.`/`..` segments are folded, and
//! symlinks are resolved before matching component-wise against each root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when no roots are configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRootsPolicy {
    /// Allow every path (fail open). This is the default.
    #[default]
    Allow,
    /// Deny every path until roots are configured.
    Deny,
}

impl EmptyRootsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyRootsPolicy::Allow => "allow",
            EmptyRootsPolicy::Deny => "deny",
        }
    }
}

/// How path components are compared against roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    /// Only for case-insensitive filesystems; must be configured explicitly.
    Insensitive,
}

#[derive(Debug, Error)]
pub enum RootsError {
    #[error("root {} cannot be resolved: {source}", .path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Ordered set of approved root directories.
///
/// Roots are canonicalized once at construction; duplicates are dropped
/// while preserving the order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    roots: Vec<PathBuf>,
    empty_policy: EmptyRootsPolicy,
    case: CaseSensitivity,
}

impl PermissionSet {
    pub fn new<I, P>(roots: I) -> Result<Self, RootsError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut resolved: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = root.as_ref();
            let canonical =
                std::fs::canonicalize(root).map_err(|source| RootsError::Unresolvable {
                    path: root.to_path_buf(),
                    source,
                })?;
            if !canonical.is_dir() {
                return Err(RootsError::NotADirectory(canonical));
            }
            if !resolved.contains(&canonical) {
                resolved.push(canonical);
            }
        }
        Ok(Self {
            roots: resolved,
            ..Self::default()
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_empty_policy(mut self, policy: EmptyRootsPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    pub fn with_case_sensitivity(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn empty_policy(&self) -> EmptyRootsPolicy {
        self.empty_policy
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }
}

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The path resolved, but not under any approved root.
    OutsideRoots { resolved: PathBuf },
    /// The path could not be resolved (missing, dangling link, bad characters).
    Unresolvable { reason: String },
    /// No roots are configured and the policy is to deny.
    NoRootsConfigured,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::OutsideRoots { resolved } => {
                write!(f, "{} is outside the approved roots", resolved.display())
            }
            Denial::Unresolvable { reason } => write!(f, "path cannot be resolved: {reason}"),
            Denial::NoRootsConfigured => f.write_str("no roots are configured"),
        }
    }
}

/// Result of an authorization check. `Allow` carries the resolved path that
/// callers must use from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow(PathBuf),
    Deny(Denial),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow(_))
    }
}

/// Decides whether paths fall inside a [`PermissionSet`].
///
/// Cheap to clone; the permission set is shared read-only.
#[derive(Debug, Clone)]
pub struct PathAuthorizer {
    permissions: Arc<PermissionSet>,
}

impl PathAuthorizer {
    pub fn new(permissions: PermissionSet) -> Self {
        if permissions.is_empty() {
            match permissions.empty_policy() {
                EmptyRootsPolicy::Allow => tracing::warn!(
                    "no roots configured; every path is allowed (set access.empty_roots = \"deny\" to refuse)"
                ),
                EmptyRootsPolicy::Deny => {
                    tracing::info!("no roots configured; every path will be denied")
                }
            }
        } else {
            for root in permissions.roots() {
                tracing::info!(root = %root.display(), "approved root");
            }
        }
        Self {
            permissions: Arc::new(permissions),
        }
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// [`PathAuthorizer::check`] run on the blocking pool, so path resolution
    /// never stalls a runtime worker.
    pub async fn check_async(&self, candidate: &Path) -> Access {
        let authorizer = self.clone();
        let candidate = candidate.to_path_buf();
        match tokio::task::spawn_blocking(move || authorizer.check(&candidate)).await {
            Ok(access) => access,
            Err(e) => Access::Deny(Denial::Unresolvable {
                reason: format!("authorization task failed: {e}"),
            }),
        }
    }

    /// Check a candidate path. Any resolution failure denies, except under
    /// the empty-set allow policy, where the best-effort normalized path is
    /// returned.
    pub fn check(&self, candidate: &Path) -> Access {
        if candidate.as_os_str().is_empty() {
            return Access::Deny(Denial::Unresolvable {
                reason: "empty path".to_string(),
            });
        }

        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(candidate),
                Err(e) => {
                    return Access::Deny(Denial::Unresolvable {
                        reason: format!("working directory unavailable: {e}"),
                    });
                }
            }
        };
        let normalized = normalize_lexically(&absolute);

        if self.permissions.is_empty() {
            return match self.permissions.empty_policy() {
                EmptyRootsPolicy::Allow => {
                    let resolved = std::fs::canonicalize(&normalized).unwrap_or(normalized);
                    Access::Allow(resolved)
                }
                EmptyRootsPolicy::Deny => Access::Deny(Denial::NoRootsConfigured),
            };
        }

        let resolved = match std::fs::canonicalize(&normalized) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(path = %normalized.display(), error = %e, "path resolution failed");
                return Access::Deny(Denial::Unresolvable {
                    reason: e.to_string(),
                });
            }
        };

        let case = self.permissions.case_sensitivity();
        if self
            .permissions
            .roots()
            .iter()
            .any(|root| is_within(&resolved, root, case))
        {
            Access::Allow(resolved)
        } else {
            Access::Deny(Denial::OutsideRoots { resolved })
        }
    }
}

/// Fold `.` and `..` without touching the filesystem. `..` at the root stays
/// at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Component-wise prefix test, so `/docsEvil` is never inside `/docs`.
pub fn is_within(path: &Path, root: &Path, case: CaseSensitivity) -> bool {
    match case {
        CaseSensitivity::Sensitive => path.starts_with(root),
        CaseSensitivity::Insensitive => {
            let mut path_components = path.components();
            root.components().all(|root_component| {
                path_components.next().is_some_and(|c| {
                    c.as_os_str().to_string_lossy().to_lowercase()
                        == root_component.as_os_str().to_string_lossy().to_lowercase()
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let approved = dir.path().join("approved");
        std::fs::create_dir_all(approved.join("nested")).unwrap();
        std::fs::write(approved.join("nested/report.txt"), "hello").unwrap();
        std::fs::create_dir_all(dir.path().join("secret")).unwrap();
        std::fs::write(dir.path().join("secret/keys.txt"), "nope").unwrap();
        (dir, approved)
    }

    #[test]
    fn normalize_folds_dot_segments() {
        assert_eq!(
            normalize_lexically(Path::new("/approved/./a/../../secret")),
            PathBuf::from("/secret")
        );
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
    }

    #[test]
    fn boundary_is_component_aligned() {
        let case = CaseSensitivity::Sensitive;
        assert!(is_within(Path::new("/docs/report.txt"), Path::new("/docs"), case));
        assert!(is_within(Path::new("/docs"), Path::new("/docs"), case));
        assert!(!is_within(Path::new("/docsEvil/x"), Path::new("/docs"), case));
        assert!(!is_within(Path::new("/"), Path::new("/docs"), case));
    }

    #[test]
    fn case_insensitive_only_when_asked() {
        assert!(!is_within(
            Path::new("/Docs/a.txt"),
            Path::new("/docs"),
            CaseSensitivity::Sensitive
        ));
        assert!(is_within(
            Path::new("/Docs/a.txt"),
            Path::new("/docs"),
            CaseSensitivity::Insensitive
        ));
        assert!(!is_within(
            Path::new("/DocsEvil/a.txt"),
            Path::new("/docs"),
            CaseSensitivity::Insensitive
        ));
    }

    #[test]
    fn allows_file_under_root() {
        let (_dir, approved) = fixture();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        let access = auth.check(&approved.join("nested/report.txt"));
        let expected = std::fs::canonicalize(approved.join("nested/report.txt")).unwrap();
        assert_eq!(access, Access::Allow(expected));
    }

    #[test]
    fn traversal_out_of_root_is_denied() {
        let (_dir, approved) = fixture();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        let access = auth.check(&approved.join("../secret/keys.txt"));
        assert!(matches!(access, Access::Deny(Denial::OutsideRoots { .. })));
    }

    #[tokio::test]
    async fn async_check_agrees_with_check() {
        let (_dir, approved) = fixture();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        for candidate in [
            approved.join("nested/report.txt"),
            approved.join("../secret/keys.txt"),
            approved.join("does-not-exist.txt"),
        ] {
            assert_eq!(auth.check_async(&candidate).await, auth.check(&candidate));
        }
        assert!(auth
            .check_async(&approved.join("nested/report.txt"))
            .await
            .is_allowed());
    }

    #[test]
    fn sibling_with_shared_prefix_is_denied() {
        let (dir, approved) = fixture();
        let evil = dir.path().join("approvedEvil");
        std::fs::create_dir_all(&evil).unwrap();
        std::fs::write(evil.join("x.txt"), "x").unwrap();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        assert!(!auth.check(&evil.join("x.txt")).is_allowed());
    }

    #[test]
    fn missing_path_fails_closed() {
        let (_dir, approved) = fixture();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        let access = auth.check(&approved.join("does-not-exist.txt"));
        assert!(matches!(access, Access::Deny(Denial::Unresolvable { .. })));
    }

    #[test]
    fn empty_path_is_denied() {
        let auth = PathAuthorizer::new(PermissionSet::empty());
        assert!(!auth.check(Path::new("")).is_allowed());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_denied() {
        let (dir, approved) = fixture();
        std::os::unix::fs::symlink(dir.path().join("secret"), approved.join("link")).unwrap();
        let auth = PathAuthorizer::new(PermissionSet::new([&approved]).unwrap());
        assert!(!auth.check(&approved.join("link/keys.txt")).is_allowed());
    }

    #[test]
    fn empty_set_allows_by_default() {
        let auth = PathAuthorizer::new(PermissionSet::empty());
        assert!(auth.check(Path::new("/definitely/not/here")).is_allowed());
    }

    #[test]
    fn empty_set_denies_when_configured() {
        let auth =
            PathAuthorizer::new(PermissionSet::empty().with_empty_policy(EmptyRootsPolicy::Deny));
        assert_eq!(
            auth.check(Path::new("/etc/hosts")),
            Access::Deny(Denial::NoRootsConfigured)
        );
    }

    #[test]
    fn duplicate_roots_are_collapsed() {
        let (_dir, approved) = fixture();
        let set = PermissionSet::new([approved.clone(), approved.join("nested/..")]).unwrap();
        assert_eq!(set.roots().len(), 1);
    }

    #[test]
    fn missing_root_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PermissionSet::new([dir.path().join("nope")]).unwrap_err();
        assert!(matches!(err, RootsError::Unresolvable { .. }));
    }

    #[test]
    fn file_root_is_rejected() {
        let (_dir, approved) = fixture();
        let err = PermissionSet::new([approved.join("nested/report.txt")]).unwrap_err();
        assert!(matches!(err, RootsError::NotADirectory(_)));
    }
}
