//! Data model types for authz documents.
//!
//! Canonical text forms:
//! - User: bare name, or `&alias` when referenced through an alias
//! - Group reference: `@name`
//! - Section header: `[aliases]`, `[groups]`, `[/path]`, `[repo:/path]`
//! - Access level: `` (deny), `r`, `rw`
//!
//! All cross-references between entities are typed arena ids handed out by
//! the owning [`Document`](crate::Document).

mod access_rule;
mod group;
mod id;
mod path;
mod repository;
mod user;

pub use access_rule::{AccessLevel, AccessRule, Grantee};
pub use group::Group;
pub use id::{
    GroupId, GroupMarker, Id, PathId, PathMarker, RepositoryId, RepositoryMarker, RuleId,
    RuleMarker, UserId, UserMarker,
};
pub use path::PathEntry;
pub use repository::Repository;
pub use user::User;
