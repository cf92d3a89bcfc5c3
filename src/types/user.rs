//! User entities with optional aliases.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// A user known to the document, possibly carrying an alias declared in the
/// `[aliases]` section (e.g. `harry = harry_h_hirsch`).
///
/// The wildcard user `*` is stored like any other user; its "all users"
/// meaning is assigned by consumers, not by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct User {
    name: String,
    alias: Option<String>,
}

impl User {
    /// Create a new user without an alias.
    pub fn new<T: Into<String>>(name: T) -> Self {
        User {
            name: name.into(),
            alias: None,
        }
    }

    /// Create a new user with an alias.
    pub fn with_alias<T: Into<String>, A: Into<String>>(name: T, alias: A) -> Self {
        User {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Whether the user carries a non-blank alias.
    pub fn has_alias(&self) -> bool {
        self.alias.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    /// Assign or replace the alias. Redefinition overwrites (last write wins).
    pub fn set_alias<A: Into<String>>(&mut self, alias: A) {
        self.alias = Some(alias.into());
    }

    pub fn clear_alias(&mut self) {
        self.alias = None;
    }

    /// How this user is referenced in member lists and rule lines:
    /// `&alias` when an alias exists, otherwise the bare name.
    pub fn reference(&self) -> String {
        match &self.alias {
            Some(alias) => format!("&{alias}"),
            None => self.name.clone(),
        }
    }

    /// Whether this is the `*` wildcard entry.
    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.alias {
            Some(alias) => write!(f, "{} (&{alias})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
