//! Typed arena indices for document entities.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Marker type for Users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserMarker {}

/// Marker type for Groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupMarker {}

/// Marker type for Repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RepositoryMarker {}

/// Marker type for Paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathMarker {}

/// Marker type for AccessRules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleMarker {}

/// A typed index into one of the `Document` arenas, with zero runtime cost
/// over a bare `usize`. The marker keeps a `UserId` from being handed to a
/// group lookup and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T> {
    index: usize,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Construct from a raw arena index. Only the `Document` hands these out.
    pub(crate) fn new(index: usize) -> Self {
        Id {
            index,
            _marker: PhantomData,
        }
    }

    /// Get the raw arena index.
    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.index)
    }
}

/// A User's arena id.
pub type UserId = Id<UserMarker>;
/// A Group's arena id.
pub type GroupId = Id<GroupMarker>;
/// A Repository's arena id.
pub type RepositoryId = Id<RepositoryMarker>;
/// A Path's arena id.
pub type PathId = Id<PathMarker>;
/// An AccessRule's arena id.
pub type RuleId = Id<RuleMarker>;
