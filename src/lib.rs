// src/lib.rs
pub use document::Document;
pub use error::{AuthzError, SyntaxError};
pub use generator::FileGenerator;
pub use parser::FileParser;
pub use types::{
    AccessLevel, AccessRule, Grantee, Group, GroupId, PathEntry, PathId, Repository, RepositoryId,
    RuleId, User, UserId,
};

mod document;
mod error;
mod generator;
mod io;
mod parser;
mod types;
