//! Path entities scoping access rules.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::id::{RepositoryId, RuleId};

/// A `(repository, path)` pair owning an ordered list of access rules.
///
/// `repository` of `None` means server-wide scope: the section header is
/// `[/some/path]` instead of `[repo:/some/path]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathEntry {
    repository: Option<RepositoryId>,
    path: String,
    rules: Vec<RuleId>,
}

impl PathEntry {
    pub fn new<T: Into<String>>(repository: Option<RepositoryId>, path: T) -> Self {
        PathEntry {
            repository,
            path: path.into(),
            rules: Vec::new(),
        }
    }

    pub fn repository(&self) -> Option<RepositoryId> {
        self.repository
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    /// Whether this path scope is server-wide (no repository).
    pub fn is_server_path(&self) -> bool {
        self.repository.is_none()
    }

    pub(crate) fn push_rule(&mut self, rule: RuleId) {
        self.rules.push(rule);
    }

    pub(crate) fn remove_rule(&mut self, rule: RuleId) {
        self.rules.retain(|r| *r != rule);
    }
}

impl Display for PathEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_path() {
        let path = PathEntry::new(None, "/");
        assert!(path.is_server_path());
        assert_eq!(path.path(), "/");
        assert!(path.rules().is_empty());
    }

    #[test]
    fn test_repository_path_keeps_rule_order() {
        let mut path = PathEntry::new(Some(RepositoryId::new(0)), "/trunk");
        path.push_rule(RuleId::new(1));
        path.push_rule(RuleId::new(0));
        assert_eq!(path.rules(), &[RuleId::new(1), RuleId::new(0)]);
        path.remove_rule(RuleId::new(1));
        assert_eq!(path.rules(), &[RuleId::new(0)]);
    }
}
