//! The in-memory authz document: arenas of users, groups, repositories,
//! paths, and access rules, plus the mutation operations the parser and
//! editing front-ends share.
//!
//! The document is a plain value owned by the caller; there is no shared or
//! global state. Deleted entities leave a tombstone so existing ids stay
//! stable; any id that no longer resolves is reported as an invariant
//! violation rather than a panic.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthzError;
use crate::types::{
    AccessLevel, AccessRule, Grantee, Group, GroupId, PathEntry, PathId, Repository, RepositoryId,
    RuleId, User, UserId,
};

/// An editable authz document. Produced by the parser, consumed by the
/// generator, mutated in between through the operations below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    users: Vec<Option<User>>,
    groups: Vec<Option<Group>>,
    repositories: Vec<Option<Repository>>,
    paths: Vec<Option<PathEntry>>,
    rules: Vec<Option<AccessRule>>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    // ----- users ---------------------------------------------------------

    /// Look up a user by exact name.
    pub fn find_user(&self, name: &str) -> Option<UserId> {
        self.users()
            .find(|(_, u)| u.name() == name)
            .map(|(id, _)| id)
    }

    /// Look up a user by alias. When two users carry the same alias (last
    /// write wins at the user level), the earliest-created one is returned.
    pub fn find_user_by_alias(&self, alias: &str) -> Option<UserId> {
        self.users()
            .find(|(_, u)| u.alias() == Some(alias))
            .map(|(id, _)| id)
    }

    /// Add a user with a unique name.
    pub fn add_user<T: Into<String>>(&mut self, name: T) -> Result<UserId, AuthzError> {
        let name = name.into();
        if self.find_user(&name).is_some() {
            return Err(AuthzError::Invariant(format!(
                "user '{name}' already exists"
            )));
        }
        let id = UserId::new(self.users.len());
        debug!(event = "Document", op = "AddUser", name = %name, id = %id);
        self.users.push(Some(User::new(name)));
        Ok(id)
    }

    /// Find a user by name, creating one if absent. Used by the parser for
    /// bare-name references in group and rule lines.
    pub fn find_or_create_user<T: Into<String>>(&mut self, name: T) -> UserId {
        let name = name.into();
        match self.find_user(&name) {
            Some(id) => id,
            None => {
                let id = UserId::new(self.users.len());
                debug!(event = "Document", op = "AddUser", name = %name, id = %id);
                self.users.push(Some(User::new(name)));
                id
            }
        }
    }

    /// Assign an alias to a user. Redefining an alias overwrites the user's
    /// previous one; an alias already held by another user is not cleared.
    pub fn set_user_alias<A: Into<String>>(
        &mut self,
        id: UserId,
        alias: A,
    ) -> Result<(), AuthzError> {
        let user = self
            .users
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| AuthzError::Invariant(format!("user id {id} does not resolve")))?;
        user.set_alias(alias);
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Resolve a user id, failing with an invariant error on tombstones.
    pub fn resolve_user(&self, id: UserId) -> Result<&User, AuthzError> {
        self.user(id)
            .ok_or_else(|| AuthzError::Invariant(format!("user id {id} does not resolve")))
    }

    /// Delete a user, along with every rule and group membership that
    /// references it.
    pub fn delete_user(&mut self, id: UserId) -> Result<(), AuthzError> {
        self.resolve_user(id)?;
        let stale: Vec<RuleId> = self
            .rules()
            .filter(|(_, r)| r.grantee() == Grantee::User(id))
            .map(|(rid, _)| rid)
            .collect();
        for rid in stale {
            self.delete_access_rule(rid)?;
        }
        for slot in self.groups.iter_mut().flatten() {
            slot.remove_user_member(id);
        }
        debug!(event = "Document", op = "DeleteUser", id = %id);
        self.users[id.index()] = None;
        Ok(())
    }

    /// Live users with their ids.
    pub fn users(&self) -> impl Iterator<Item = (UserId, &User)> {
        self.users
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|u| (UserId::new(i), u)))
    }

    // ----- groups --------------------------------------------------------

    pub fn find_group(&self, name: &str) -> Option<GroupId> {
        self.groups()
            .find(|(_, g)| g.name() == name)
            .map(|(id, _)| id)
    }

    /// Add a group with a unique name.
    pub fn add_group<T: Into<String>>(&mut self, name: T) -> Result<GroupId, AuthzError> {
        let name = name.into();
        if self.find_group(&name).is_some() {
            return Err(AuthzError::Invariant(format!(
                "group '{name}' already exists"
            )));
        }
        let id = GroupId::new(self.groups.len());
        debug!(event = "Document", op = "AddGroup", name = %name, id = %id);
        self.groups.push(Some(Group::new(name)));
        Ok(id)
    }

    /// Find a group by name, creating an empty one if absent. Forward
    /// references (`@later` before `later = ...`) resolve through this.
    pub fn find_or_create_group<T: Into<String>>(&mut self, name: T) -> GroupId {
        let name = name.into();
        match self.find_group(&name) {
            Some(id) => id,
            None => {
                let id = GroupId::new(self.groups.len());
                debug!(event = "Document", op = "AddGroup", name = %name, id = %id);
                self.groups.push(Some(Group::new(name)));
                id
            }
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Resolve a group id, failing with an invariant error on tombstones.
    pub fn resolve_group(&self, id: GroupId) -> Result<&Group, AuthzError> {
        self.group(id)
            .ok_or_else(|| AuthzError::Invariant(format!("group id {id} does not resolve")))
    }

    /// Add a group member to a group, rejecting direct or transitive
    /// self-inclusion. Parsed files are linked without this guard (see
    /// [`Document::has_circular_reference`]).
    pub fn add_group_member(&mut self, group: GroupId, member: GroupId) -> Result<(), AuthzError> {
        let group_name = self.resolve_group(group)?.name().to_string();
        self.resolve_group(member)?;
        if member == group || self.reaches(member, group) {
            return Err(AuthzError::Invariant(format!(
                "adding this member to group '{group_name}' would create a circular reference"
            )));
        }
        self.link_group_member(group, member)
    }

    /// Add a user member to a group.
    pub fn add_user_member(&mut self, group: GroupId, member: UserId) -> Result<(), AuthzError> {
        self.resolve_group(group)?;
        self.resolve_user(member)?;
        self.group_mut(group)?.push_user_member(member);
        Ok(())
    }

    pub fn remove_group_member(
        &mut self,
        group: GroupId,
        member: GroupId,
    ) -> Result<(), AuthzError> {
        self.group_mut(group)?.remove_group_member(member);
        Ok(())
    }

    pub fn remove_user_member(&mut self, group: GroupId, member: UserId) -> Result<(), AuthzError> {
        self.group_mut(group)?.remove_user_member(member);
        Ok(())
    }

    /// Link a group member without the cycle guard. The parser tolerates
    /// cyclic input structurally; callers validate afterwards if they care.
    pub(crate) fn link_group_member(
        &mut self,
        group: GroupId,
        member: GroupId,
    ) -> Result<(), AuthzError> {
        self.group_mut(group)?.push_group_member(member);
        Ok(())
    }

    /// Whether the group transitively contains itself.
    pub fn has_circular_reference(&self, group: GroupId) -> bool {
        self.group(group)
            .map(|g| {
                g.group_members()
                    .iter()
                    .any(|m| *m == group || self.reaches(*m, group))
            })
            .unwrap_or(false)
    }

    /// Depth-first reachability over group membership edges.
    fn reaches(&self, from: GroupId, target: GroupId) -> bool {
        let mut seen = vec![false; self.groups.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen[current.index()] {
                continue;
            }
            seen[current.index()] = true;
            if let Some(g) = self.group(current) {
                stack.extend(g.group_members().iter().copied());
            }
        }
        false
    }

    /// Delete a group, along with every rule and membership referencing it.
    pub fn delete_group(&mut self, id: GroupId) -> Result<(), AuthzError> {
        self.resolve_group(id)?;
        let stale: Vec<RuleId> = self
            .rules()
            .filter(|(_, r)| r.grantee() == Grantee::Group(id))
            .map(|(rid, _)| rid)
            .collect();
        for rid in stale {
            self.delete_access_rule(rid)?;
        }
        for slot in self.groups.iter_mut().flatten() {
            slot.remove_group_member(id);
        }
        debug!(event = "Document", op = "DeleteGroup", id = %id);
        self.groups[id.index()] = None;
        Ok(())
    }

    /// Live groups with their ids.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|g| (GroupId::new(i), g)))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, AuthzError> {
        self.groups
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| AuthzError::Invariant(format!("group id {id} does not resolve")))
    }

    // ----- repositories --------------------------------------------------

    pub fn find_repository(&self, name: &str) -> Option<RepositoryId> {
        self.repositories()
            .find(|(_, r)| r.name() == name)
            .map(|(id, _)| id)
    }

    pub fn add_repository<T: Into<String>>(&mut self, name: T) -> Result<RepositoryId, AuthzError> {
        let name = name.into();
        if self.find_repository(&name).is_some() {
            return Err(AuthzError::Invariant(format!(
                "repository '{name}' already exists"
            )));
        }
        let id = RepositoryId::new(self.repositories.len());
        debug!(event = "Document", op = "AddRepository", name = %name, id = %id);
        self.repositories.push(Some(Repository::new(name)));
        Ok(id)
    }

    pub fn find_or_create_repository<T: Into<String>>(&mut self, name: T) -> RepositoryId {
        let name = name.into();
        match self.find_repository(&name) {
            Some(id) => id,
            None => {
                let id = RepositoryId::new(self.repositories.len());
                debug!(event = "Document", op = "AddRepository", name = %name, id = %id);
                self.repositories.push(Some(Repository::new(name)));
                id
            }
        }
    }

    pub fn repository(&self, id: RepositoryId) -> Option<&Repository> {
        self.repositories
            .get(id.index())
            .and_then(|slot| slot.as_ref())
    }

    pub fn resolve_repository(&self, id: RepositoryId) -> Result<&Repository, AuthzError> {
        self.repository(id)
            .ok_or_else(|| AuthzError::Invariant(format!("repository id {id} does not resolve")))
    }

    /// Delete a repository along with its paths and their rules.
    pub fn delete_repository(&mut self, id: RepositoryId) -> Result<(), AuthzError> {
        self.resolve_repository(id)?;
        let owned: Vec<PathId> = self
            .paths()
            .filter(|(_, p)| p.repository() == Some(id))
            .map(|(pid, _)| pid)
            .collect();
        for pid in owned {
            self.delete_path(pid)?;
        }
        debug!(event = "Document", op = "DeleteRepository", id = %id);
        self.repositories[id.index()] = None;
        Ok(())
    }

    /// Live repositories with their ids.
    pub fn repositories(&self) -> impl Iterator<Item = (RepositoryId, &Repository)> {
        self.repositories
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (RepositoryId::new(i), r)))
    }

    // ----- paths ---------------------------------------------------------

    /// Look up a `(repository, path)` pair. `None` matches server paths.
    pub fn find_path(&self, repository: Option<RepositoryId>, path: &str) -> Option<PathId> {
        self.paths()
            .find(|(_, p)| p.repository() == repository && p.path() == path)
            .map(|(id, _)| id)
    }

    pub fn add_path<T: Into<String>>(
        &mut self,
        repository: Option<RepositoryId>,
        path: T,
    ) -> Result<PathId, AuthzError> {
        let path = path.into();
        if let Some(repo) = repository {
            self.resolve_repository(repo)?;
        }
        if self.find_path(repository, &path).is_some() {
            return Err(AuthzError::Invariant(format!(
                "path '{path}' already exists in this scope"
            )));
        }
        let id = PathId::new(self.paths.len());
        debug!(event = "Document", op = "AddPath", path = %path, id = %id);
        self.paths.push(Some(PathEntry::new(repository, path)));
        Ok(id)
    }

    pub fn path(&self, id: PathId) -> Option<&PathEntry> {
        self.paths.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub fn resolve_path(&self, id: PathId) -> Result<&PathEntry, AuthzError> {
        self.path(id)
            .ok_or_else(|| AuthzError::Invariant(format!("path id {id} does not resolve")))
    }

    /// Delete a path and the rules it owns.
    pub fn delete_path(&mut self, id: PathId) -> Result<(), AuthzError> {
        let owned: Vec<RuleId> = self.resolve_path(id)?.rules().to_vec();
        for rid in owned {
            self.rules[rid.index()] = None;
        }
        debug!(event = "Document", op = "DeletePath", id = %id);
        self.paths[id.index()] = None;
        Ok(())
    }

    /// Live paths with their ids.
    pub fn paths(&self) -> impl Iterator<Item = (PathId, &PathEntry)> {
        self.paths
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PathId::new(i), p)))
    }

    // ----- access rules --------------------------------------------------

    /// Add an access rule to a path. Duplicate grantees on one path are
    /// allowed; the generator emits them in order.
    pub fn add_access_rule(
        &mut self,
        path: PathId,
        grantee: Grantee,
        level: AccessLevel,
    ) -> Result<RuleId, AuthzError> {
        self.resolve_path(path)?;
        match grantee {
            Grantee::User(u) => {
                self.resolve_user(u)?;
            }
            Grantee::Group(g) => {
                self.resolve_group(g)?;
            }
        }
        let id = RuleId::new(self.rules.len());
        debug!(event = "Document", op = "AddRule", path = %path, id = %id, level = %level);
        self.rules.push(Some(AccessRule::new(path, grantee, level)));
        self.paths
            .get_mut(path.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| AuthzError::Invariant(format!("path id {path} does not resolve")))?
            .push_rule(id);
        Ok(id)
    }

    /// Look up the first rule for a grantee on a path.
    pub fn find_access_rule(&self, path: PathId, grantee: Grantee) -> Option<RuleId> {
        self.rules()
            .find(|(_, r)| r.path() == path && r.grantee() == grantee)
            .map(|(id, _)| id)
    }

    pub fn rule(&self, id: RuleId) -> Option<&AccessRule> {
        self.rules.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub fn resolve_rule(&self, id: RuleId) -> Result<&AccessRule, AuthzError> {
        self.rule(id)
            .ok_or_else(|| AuthzError::Invariant(format!("rule id {id} does not resolve")))
    }

    /// Change the level of an existing rule.
    pub fn set_rule_level(&mut self, id: RuleId, level: AccessLevel) -> Result<(), AuthzError> {
        self.rules
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| AuthzError::Invariant(format!("rule id {id} does not resolve")))?
            .set_level(level);
        Ok(())
    }

    pub fn delete_access_rule(&mut self, id: RuleId) -> Result<(), AuthzError> {
        let path = self.resolve_rule(id)?.path();
        if let Some(slot) = self.paths.get_mut(path.index()).and_then(|s| s.as_mut()) {
            slot.remove_rule(id);
        }
        debug!(event = "Document", op = "DeleteRule", id = %id);
        self.rules[id.index()] = None;
        Ok(())
    }

    /// Live rules with their ids.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &AccessRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (RuleId::new(i), r)))
    }
}
