//! Reference name rules.
//!
//! A full reference name is `HEAD` or `refs/<path>`. The `<path>` part (and a
//! bare branch name) is a `/`-separated list of components where each
//! component is non-empty, does not begin with `.`, and the whole name holds
//! no whitespace, no `~ ^ : ? * [ \`, no `..` or `@{`, does not end with `.`
//! and does not end with `.lock`.

use crate::error::{RefError, Result};

/// Namespace holding branch references.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Substrings that may not appear anywhere in a name.
const BANNED_SEQUENCES: &[(&str, &str)] = &[("..", "'..'"), ("@{", "'@{'"), ("//", "'//'")];

fn banned_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')
}

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Check a branch name such as `main` or `feature/auth`.
///
/// ```
/// use arbor_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty name"));
    }
    if let Some(c) = name.chars().find(|&c| banned_char(c)) {
        return Err(invalid(name, format!("contains {c:?}")));
    }
    if let Some((_, shown)) = BANNED_SEQUENCES.iter().find(|(seq, _)| name.contains(seq)) {
        return Err(invalid(name, format!("contains {shown}")));
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return Err(invalid(name, "ends with '.' or '.lock'"));
    }
    for part in name.split('/') {
        match part.chars().next() {
            None => return Err(invalid(name, "empty path component")),
            Some('.') => return Err(invalid(name, format!("component {part:?} starts with '.'"))),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Check a full reference name such as `HEAD` or `refs/heads/main`.
///
/// Errors report the full name, not just the part after `refs/`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name == crate::resolve::HEAD {
        return Ok(());
    }
    let Some(rest) = name.strip_prefix("refs/") else {
        return Err(invalid(name, "must be HEAD or start with 'refs/'"));
    };
    validate_branch_name(rest).map_err(|err| match err {
        RefError::InvalidName { reason, .. } => invalid(name, reason),
        other => other,
    })
}

/// `main` becomes `refs/heads/main`.
pub fn branch_ref_name(branch: &str) -> Result<String> {
    validate_branch_name(branch)?;
    Ok(format!("{HEADS_PREFIX}{branch}"))
}
