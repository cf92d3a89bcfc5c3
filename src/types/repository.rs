//! Repository entities.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// A named repository, as it appears before the colon in a section header
/// like `[calc:/trunk]`. Paths with no repository are server-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Repository {
    name: String,
}

impl Repository {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Repository { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}
