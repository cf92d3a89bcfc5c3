//! Access rules: a grantee plus an access level, owned by a path.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

use super::id::{GroupId, PathId, UserId};

/// Access level token as written on a rule line. The empty token denies
/// access entirely.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumString,
)]
pub enum AccessLevel {
    #[strum(serialize = "")]
    Deny,
    #[strum(serialize = "r")]
    ReadOnly,
    #[strum(serialize = "rw")]
    ReadWrite,
}

impl AccessLevel {
    /// Parse a level token the way editing front-ends do, where `none` is a
    /// synonym for the empty deny token. The file parser itself only accepts
    /// the literal tokens `""`, `r`, and `rw`.
    pub fn from_token_lenient(token: &str) -> Option<Self> {
        match token.trim() {
            "none" => Some(AccessLevel::Deny),
            other => other.parse().ok(),
        }
    }
}

/// The subject of an access rule: exactly one of a user or a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Grantee {
    User(UserId),
    Group(GroupId),
}

impl Grantee {
    pub fn is_group(&self) -> bool {
        matches!(self, Grantee::Group(_))
    }
}

/// A single access rule line, owned by its path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRule {
    path: PathId,
    grantee: Grantee,
    level: AccessLevel,
}

impl AccessRule {
    pub fn new(path: PathId, grantee: Grantee, level: AccessLevel) -> Self {
        AccessRule {
            path,
            grantee,
            level,
        }
    }

    pub fn path(&self) -> PathId {
        self.path
    }

    pub fn grantee(&self) -> Grantee {
        self.grantee
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn set_level(&mut self, level: AccessLevel) {
        self.level = level;
    }
}

impl Display for AccessRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.grantee {
            Grantee::User(id) => write!(f, "user {} = {}", id, self.level),
            Grantee::Group(id) => write!(f, "group {} = {}", id, self.level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use yare::parameterized;

    #[parameterized(
        deny = { "", AccessLevel::Deny },
        read_only = { "r", AccessLevel::ReadOnly },
        read_write = { "rw", AccessLevel::ReadWrite },
    )]
    fn test_level_from_str(token: &str, expected: AccessLevel) {
        assert_eq!(AccessLevel::from_str(token).unwrap(), expected);
    }

    #[parameterized(
        write_only = { "w" },
        uppercase = { "RW" },
        none_token = { "none" },
    )]
    fn test_level_from_str_rejects(token: &str) {
        assert!(AccessLevel::from_str(token).is_err());
    }

    #[parameterized(
        none_is_deny = { "none", Some(AccessLevel::Deny) },
        empty_is_deny = { "", Some(AccessLevel::Deny) },
        padded_rw = { " rw ", Some(AccessLevel::ReadWrite) },
        garbage = { "write", None },
    )]
    fn test_level_lenient(token: &str, expected: Option<AccessLevel>) {
        assert_eq!(AccessLevel::from_token_lenient(token), expected);
    }

    #[test]
    fn test_level_display_tokens() {
        assert_eq!(AccessLevel::Deny.to_string(), "");
        assert_eq!(AccessLevel::ReadOnly.to_string(), "r");
        assert_eq!(AccessLevel::ReadWrite.to_string(), "rw");
    }

    #[test]
    fn test_grantee_kind() {
        assert!(Grantee::Group(GroupId::new(0)).is_group());
        assert!(!Grantee::User(UserId::new(0)).is_group());
    }

    #[test]
    fn test_rule_serialization() {
        let rule = AccessRule::new(
            PathId::new(0),
            Grantee::User(UserId::new(1)),
            AccessLevel::ReadOnly,
        );
        let serialized = serde_json::to_value(&rule).unwrap();
        let deserialized: AccessRule = serde_json::from_value(serialized).unwrap();
        assert_eq!(rule, deserialized);
    }
}
