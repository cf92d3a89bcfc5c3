use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason codes for malformed authz constructs. Carried inside
/// [`AuthzError::Syntax`] together with the 1-based line number.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("[aliases] section must appear before any other section")]
    AliasesSectionNotFirst,

    #[error("[groups] section must appear before any path section")]
    GroupsSectionMisplaced,

    #[error("line must contain '='")]
    MissingSeparator,

    #[error("malformed section header '{0}'")]
    MalformedSection(String),

    #[error("group '{0}' is already defined")]
    DuplicateGroup(String),

    #[error("duplicate path section '{0}'")]
    DuplicatePath(String),

    #[error("alias '{0}' is not defined")]
    UndefinedAlias(String),

    #[error("invalid access level '{0}'")]
    InvalidAccessLevel(String),

    #[error("blank line inside a continued group member list")]
    BlankLineInContinuation,

    #[error("continuation line must start with a space")]
    InvalidContinuation,

    #[error("line appears before any section")]
    LineOutsideSection,

    #[error("identifier missing before '='")]
    EmptyIdentifier,
}

/// All errors surfaced by this crate.
///
/// Syntax errors terminate parsing at the first malformed line; no partial
/// document is returned. Resource errors cover the read/write path and are
/// raised before or instead of parsing. Invariant errors indicate a corrupt
/// document (e.g. a rule holding a stale id) and are internal failures, not
/// user input problems.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum AuthzError {
    #[error("syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: SyntaxError },

    #[error("cannot access '{path}': {detail}")]
    Resource { path: String, detail: String },

    #[error("document invariant violated: {0}")]
    Invariant(String),
}

impl AuthzError {
    /// Build a syntax error for a 1-based line number.
    pub(crate) fn syntax(line: usize, reason: SyntaxError) -> Self {
        AuthzError::Syntax { line, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_message_carries_line() {
        let err = AuthzError::syntax(12, SyntaxError::MissingSeparator);
        assert_eq!(err.to_string(), "syntax error at line 12: line must contain '='");
    }

    #[test]
    fn test_duplicate_group_names_group() {
        let err = AuthzError::syntax(3, SyntaxError::DuplicateGroup("devs".to_string()));
        assert!(err.to_string().contains("'devs'"));
    }

    #[test]
    fn test_error_serialization() {
        let err = AuthzError::Syntax {
            line: 4,
            reason: SyntaxError::UndefinedAlias("bob".to_string()),
        };
        let serialized = serde_json::to_value(&err).unwrap();
        let deserialized: AuthzError = serde_json::from_value(serialized).unwrap();
        assert!(matches!(
            deserialized,
            AuthzError::Syntax {
                line: 4,
                reason: SyntaxError::UndefinedAlias(_)
            }
        ));
    }
}
