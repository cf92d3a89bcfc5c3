//! Group entities and their member lists.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::id::{GroupId, UserId};

/// A named group of users and other groups, as declared in the `[groups]`
/// section. Members are held by arena id, so a group may reference another
/// group that has not been declared yet (forward reference) or that refers
/// back to it (the model does not force acyclicity; see
/// [`Document::has_circular_reference`](crate::Document::has_circular_reference)).
///
/// Member order is insertion order; the generator sorts on output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    name: String,
    group_members: Vec<GroupId>,
    user_members: Vec<UserId>,
}

impl Group {
    /// Create a new, empty group.
    pub fn new<T: Into<String>>(name: T) -> Self {
        Group {
            name: name.into(),
            group_members: Vec::new(),
            user_members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_members(&self) -> &[GroupId] {
        &self.group_members
    }

    pub fn user_members(&self) -> &[UserId] {
        &self.user_members
    }

    /// Whether the group has no members of either kind. Forward-referenced
    /// groups stay empty until their defining line is parsed.
    pub fn is_empty(&self) -> bool {
        self.group_members.is_empty() && self.user_members.is_empty()
    }

    /// Total member count across both kinds.
    pub fn len(&self) -> usize {
        self.group_members.len() + self.user_members.len()
    }

    pub(crate) fn push_group_member(&mut self, member: GroupId) {
        if !self.group_members.contains(&member) {
            self.group_members.push(member);
        }
    }

    pub(crate) fn push_user_member(&mut self, member: UserId) {
        if !self.user_members.contains(&member) {
            self.user_members.push(member);
        }
    }

    pub(crate) fn remove_group_member(&mut self, member: GroupId) {
        self.group_members.retain(|m| *m != member);
    }

    pub(crate) fn remove_user_member(&mut self, member: UserId) {
        self.user_members.retain(|m| *m != member);
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "@{}", self.name)
    }
}
