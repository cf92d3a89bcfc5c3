//! Deterministic serializer from a [`Document`] back to authz text.
//!
//! Output ordering never depends on insertion order: users, groups, and
//! paths are sorted by name, rules by their subject. Re-parsing generated
//! text yields the same logical document (names, aliases, member sets, rule
//! sets); only whitespace and line wrapping may differ from the input.

use std::path::Path as StdPath;

use itertools::Itertools;
use tracing::{debug, info};

use crate::document::Document;
use crate::error::AuthzError;
use crate::io;
use crate::types::{Grantee, PathEntry, PathId};

/// Comment emitted as the first line of every generated file.
const HEADER: &str = "# This file is automatically generated. Manual edits may be overwritten.";

/// Generator for the authz file format.
pub struct FileGenerator;

impl FileGenerator {
    /// Serialize the document. When `max_line_length` is `Some(n)` with
    /// `n > 0`, group member lines longer than `n` are wrapped at member
    /// boundaries onto continuation lines aligned under the `=`.
    ///
    /// A rule or member holding an id that no longer resolves fails fast
    /// with [`AuthzError::Invariant`].
    pub fn generate(
        document: &Document,
        max_line_length: Option<usize>,
    ) -> Result<String, AuthzError> {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');

        emit_aliases(document, &mut out)?;
        emit_groups(document, &mut out, max_line_length)?;
        emit_paths(document, &mut out)?;

        info!(
            event = "Generate",
            phase = "Done",
            bytes = out.len(),
            wrapped = max_line_length.is_some(),
        );
        Ok(out)
    }

    /// Serialize the document and write it to `path` in one operation. The
    /// whole output is built in memory first; nothing is written when
    /// generation fails.
    pub fn generate_to_file(
        document: &Document,
        path: &StdPath,
        max_line_length: Option<usize>,
    ) -> Result<(), AuthzError> {
        let text = Self::generate(document, max_line_length)?;
        io::write_authz_file(path, &text)
    }
}

/// `[aliases]` block, only when at least one user carries an alias.
fn emit_aliases(document: &Document, out: &mut String) -> Result<(), AuthzError> {
    let aliased: Vec<_> = document
        .users()
        .filter(|(_, u)| u.has_alias())
        .sorted_by_key(|(_, u)| u.name().to_string())
        .collect();
    if aliased.is_empty() {
        return Ok(());
    }
    out.push_str("\n[aliases]\n");
    for (_, user) in aliased {
        // has_alias() filtered blank aliases out above
        if let Some(alias) = user.alias() {
            out.push_str(&format!("{alias} = {}\n", user.name()));
        }
    }
    Ok(())
}

/// `[groups]` block, always emitted.
fn emit_groups(
    document: &Document,
    out: &mut String,
    max_line_length: Option<usize>,
) -> Result<(), AuthzError> {
    out.push_str("\n[groups]\n");
    let groups = document
        .groups()
        .sorted_by_key(|(_, g)| g.name().to_string());
    for (id, group) in groups {
        let mut members: Vec<String> = Vec::new();
        for member in group
            .group_members()
            .iter()
            .map(|m| document.resolve_group(*m))
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .map(|g| format!("@{}", g.name()))
            .sorted()
        {
            members.push(member);
        }
        for member in group
            .user_members()
            .iter()
            .map(|m| document.resolve_user(*m))
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .map(|u| u.reference())
            .sorted()
        {
            members.push(member);
        }
        debug!(event = "Generate", phase = "Group", group = %id, members = members.len());
        emit_member_line(out, group.name(), &members, max_line_length);
    }
    Ok(())
}

/// Write `name = a, b, c`, wrapping at member boundaries when the line
/// would exceed `max_line_length`. Broken lines keep their trailing comma
/// and continuations are indented to align under the `=`, so the output
/// re-parses through the continuation rule.
fn emit_member_line(out: &mut String, name: &str, members: &[String], max_line_length: Option<usize>) {
    let wrap_at = max_line_length.filter(|n| *n > 0);
    // Each addition starts with a space, landing the member under the `=`.
    let indent = " ".repeat(name.len());
    let mut current = format!("{name} =");
    let mut has_member = false;

    for (i, member) in members.iter().enumerate() {
        let sep = if i + 1 < members.len() { "," } else { "" };
        let addition = format!(" {member}{sep}");
        if let Some(max) = wrap_at {
            if has_member && current.len() + addition.len() > max {
                out.push_str(&current);
                out.push('\n');
                current = indent.clone();
            }
        }
        current.push_str(&addition);
        has_member = true;
    }
    out.push_str(&current);
    out.push('\n');
}

/// One block per path that owns at least one rule.
fn emit_paths(document: &Document, out: &mut String) -> Result<(), AuthzError> {
    let paths: Vec<(PathId, &PathEntry)> = document
        .paths()
        .filter(|(_, p)| !p.rules().is_empty())
        .map(|(id, p)| {
            let repo_name = match p.repository() {
                Some(repo) => document.resolve_repository(repo).map(|r| r.name().to_string()),
                None => Ok(String::new()),
            };
            repo_name.map(|n| ((n, p.path().to_string()), (id, p)))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, entry)| entry)
        .collect();

    for (id, path) in paths {
        let header = match path.repository() {
            Some(repo) => {
                let repo = document.resolve_repository(repo)?;
                format!("[{}:{}]", repo.name(), path.path())
            }
            None => format!("[{}]", path.path()),
        };
        out.push('\n');
        out.push_str(&header);
        out.push('\n');
        debug!(event = "Generate", phase = "Path", path = %id, rules = path.rules().len());

        // Natural rule order: group rules first, then user rules, each by
        // subject, with the level as tiebreaker.
        let mut lines: Vec<(u8, String, String)> = Vec::new();
        for rule_id in path.rules() {
            let rule = document.resolve_rule(*rule_id)?;
            let (rank, subject) = match rule.grantee() {
                Grantee::Group(g) => (0, format!("@{}", document.resolve_group(g)?.name())),
                Grantee::User(u) => (1, document.resolve_user(u)?.reference()),
            };
            lines.push((rank, subject, rule.level().to_string()));
        }
        for (_, subject, level) in lines.into_iter().sorted() {
            out.push_str(&format!("{subject} = {level}\n"));
        }
    }
    Ok(())
}
