//! Access checks for the filesystem content service.
//!
//! Tickets handed to [`crate::services::FsContentService`] come from the
//! index, but the index artifact is an external input. Every ticket is
//! resolved against the content root and must:
//! - be relative and stay inside the root after normalization
//! - not name a credential or key file
//!
//! The indexer applies the same sensitive-file list so such files never get
//! a posting list in the first place.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Security-related errors.
#[derive(Error, Debug, Clone)]
pub enum SecurityError {
    #[error("Path traversal blocked: '{attempted}' escapes root '{}'", root.display())]
    PathTraversal { attempted: String, root: PathBuf },

    #[error("Access denied: '{path}' is a sensitive file ({reason})")]
    SensitiveFile { path: String, reason: &'static str },

    #[error("Absolute path not allowed: '{path}'")]
    AbsolutePath { path: String },
}

impl SecurityError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PathTraversal { .. } => "PATH_TRAVERSAL",
            Self::SensitiveFile { .. } => "SENSITIVE_FILE",
            Self::AbsolutePath { .. } => "ABSOLUTE_PATH",
        }
    }
}

// ============================================================================
// Path Validation
// ============================================================================

/// Resolves a ticket to a path that is guaranteed to stay within `root`.
///
/// # Example
///
/// ```
/// use codesearch::security::validate_path;
/// use std::path::Path;
///
/// let root = Path::new("/corpus");
/// assert!(validate_path(root, "src/main.go").is_ok());
/// assert!(validate_path(root, "./src/../lib.go").is_ok());
/// assert!(validate_path(root, "../etc/passwd").is_err());
/// assert!(validate_path(root, "/etc/passwd").is_err());
/// ```
pub fn validate_path(root: &Path, ticket: &str) -> Result<PathBuf, SecurityError> {
    let ticket_path = Path::new(ticket);

    if ticket_path.is_absolute() {
        return Err(SecurityError::AbsolutePath {
            path: ticket.to_string(),
        });
    }

    let normalized = normalize_path(ticket_path);
    if normalized
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SecurityError::PathTraversal {
            attempted: ticket.to_string(),
            root: root.to_path_buf(),
        });
    }

    let canonical_root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let joined = canonical_root.join(&normalized);

    // Existing paths are canonicalized so symlinks pointing outside are caught.
    let resolved = if joined.exists() {
        dunce::canonicalize(&joined).map_err(|_| SecurityError::PathTraversal {
            attempted: ticket.to_string(),
            root: root.to_path_buf(),
        })?
    } else {
        joined
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(SecurityError::PathTraversal {
            attempted: ticket.to_string(),
            root: root.to_path_buf(),
        });
    }

    Ok(resolved)
}

/// Resolves `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| !matches!(c, Component::ParentDir))
                {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

// ============================================================================
// Sensitive File Detection
// ============================================================================

/// How a [`SensitivePattern`] is compared against a path.
#[derive(Debug, Clone, Copy)]
pub enum PatternMatchType {
    /// Exact filename match
    Exact,
    /// Filename starts with pattern
    Prefix,
    /// Filename ends with pattern
    Suffix,
    /// Full path contains pattern
    PathContains,
}

/// A filename pattern for credential and key material.
#[derive(Debug, Clone, Copy)]
pub struct SensitivePattern {
    pub pattern: &'static str,
    pub reason: &'static str,
    pub match_type: PatternMatchType,
}

impl SensitivePattern {
    const fn exact(pattern: &'static str, reason: &'static str) -> Self {
        Self {
            pattern,
            reason,
            match_type: PatternMatchType::Exact,
        }
    }

    const fn prefix(pattern: &'static str, reason: &'static str) -> Self {
        Self {
            pattern,
            reason,
            match_type: PatternMatchType::Prefix,
        }
    }

    const fn suffix(pattern: &'static str, reason: &'static str) -> Self {
        Self {
            pattern,
            reason,
            match_type: PatternMatchType::Suffix,
        }
    }

    const fn path_contains(pattern: &'static str, reason: &'static str) -> Self {
        Self {
            pattern,
            reason,
            match_type: PatternMatchType::PathContains,
        }
    }

    /// Checks if the given path matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        match self.match_type {
            PatternMatchType::Exact => filename == self.pattern,
            PatternMatchType::Prefix => filename.starts_with(self.pattern),
            PatternMatchType::Suffix => filename.ends_with(self.pattern),
            PatternMatchType::PathContains => {
                path.to_string_lossy().replace('\\', "/").contains(self.pattern)
            }
        }
    }
}

/// Credential, key and secret-bearing files that are never indexed or served.
pub const SENSITIVE_PATTERNS: &[SensitivePattern] = &[
    SensitivePattern::exact(".env", "environment variables"),
    SensitivePattern::prefix(".env.", "environment variables"),
    SensitivePattern::exact("credentials.json", "credentials file"),
    SensitivePattern::exact("secrets.json", "secrets file"),
    SensitivePattern::exact("secrets.yaml", "secrets file"),
    SensitivePattern::suffix(".pem", "private key/certificate"),
    SensitivePattern::suffix(".key", "private key"),
    SensitivePattern::suffix(".p12", "PKCS#12 keystore"),
    SensitivePattern::suffix(".pfx", "PKCS#12 keystore"),
    SensitivePattern::suffix(".jks", "Java keystore"),
    SensitivePattern::exact("id_rsa", "SSH private key"),
    SensitivePattern::exact("id_ed25519", "SSH private key"),
    SensitivePattern::exact("id_ecdsa", "SSH private key"),
    SensitivePattern::path_contains(".aws/credentials", "AWS credentials"),
    SensitivePattern::path_contains(".kube/config", "Kubernetes config"),
    SensitivePattern::path_contains(".docker/config.json", "Docker credentials"),
    SensitivePattern::suffix(".tfstate", "Terraform state"),
    SensitivePattern::exact(".npmrc", "npm config (may contain tokens)"),
    SensitivePattern::exact(".pypirc", "PyPI credentials"),
    SensitivePattern::exact(".git-credentials", "Git credentials"),
    SensitivePattern::exact(".netrc", "network credentials"),
    SensitivePattern::exact(".htpasswd", "htpasswd file"),
];

/// Returns `Some(reason)` if the path names a sensitive file.
///
/// ```
/// use codesearch::security::is_sensitive_file;
/// use std::path::Path;
///
/// assert!(is_sensitive_file(Path::new(".env.local")).is_some());
/// assert!(is_sensitive_file(Path::new("deploy/id_rsa")).is_some());
/// assert!(is_sensitive_file(Path::new("main.go")).is_none());
/// ```
#[must_use]
pub fn is_sensitive_file(path: &Path) -> Option<&'static str> {
    SENSITIVE_PATTERNS
        .iter()
        .find(|p| p.matches(path))
        .map(|p| p.reason)
}

/// Validates that a ticket is safe to read: inside the root and not sensitive.
pub fn validate_read_access(root: &Path, ticket: &str) -> Result<PathBuf, SecurityError> {
    let resolved = validate_path(root, ticket)?;

    let reason = is_sensitive_file(Path::new(ticket)).or_else(|| is_sensitive_file(&resolved));
    if let Some(reason) = reason {
        return Err(SecurityError::SensitiveFile {
            path: ticket.to_string(),
            reason,
        });
    }

    Ok(resolved)
}
