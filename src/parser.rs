//! Line-oriented parser turning authz text into a [`Document`].
//!
//! The parser is a five-state machine driven by section headers. Every line
//! is first normalized (tabs become single spaces) and classified into a
//! [`LineKind`]; a single dispatch over `(state, kind)` then applies the
//! transition or action. The first malformed line aborts parsing with a
//! [`AuthzError::Syntax`] carrying the 1-based line number; no partial
//! document is ever returned.

use std::path::Path as StdPath;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::Display as StrumDisplay;
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{AuthzError, SyntaxError};
use crate::io;
use crate::types::{AccessLevel, Grantee, PathId};

/// Matches a whole section header line, capturing the bracket contents.
static SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([^\[\]]*)\]$").unwrap());

/// Parser for the authz file format.
pub struct FileParser;

impl FileParser {
    /// Parse authz text into a fresh document.
    pub fn parse(text: &str) -> Result<Document, AuthzError> {
        let mut document = Document::new();
        let mut run = ParserRun {
            document: &mut document,
            state: ParserState::Start,
            current_path: None,
            pending: None,
        };
        run.consume(text)?;
        info!(
            event = "Parse",
            phase = "Done",
            users = document.users().count(),
            groups = document.groups().count(),
            paths = document.paths().count(),
            rules = document.rules().count(),
        );
        Ok(document)
    }

    /// Read a file (UTF-8, falling back to ISO-8859-1) and parse it.
    ///
    /// A missing or unreadable file is a [`AuthzError::Resource`] error,
    /// raised before any parsing happens.
    pub fn parse_file(path: &StdPath) -> Result<Document, AuthzError> {
        let text = io::read_authz_file(path)?;
        Self::parse(&text)
    }
}

/// The five parser states. Section headers drive the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
enum ParserState {
    Start,
    Aliases,
    Groups,
    Rules,
    ServerRules,
}

/// A classified input line.
#[derive(Debug)]
enum LineKind<'a> {
    Blank,
    Comment,
    AliasesSection,
    GroupsSection,
    ServerSection(&'a str),
    RepositorySection(&'a str, &'a str),
    Content(&'a str),
}

/// A group definition whose member list continues on following lines.
struct Continuation {
    buffer: String,
    start_line: usize,
}

struct ParserRun<'a> {
    document: &'a mut Document,
    state: ParserState,
    current_path: Option<PathId>,
    pending: Option<Continuation>,
}

impl ParserRun<'_> {
    fn consume(&mut self, text: &str) -> Result<(), AuthzError> {
        let mut last_line = 0;
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            last_line = line_no;
            let normalized = raw.replace('\t', " ");
            self.line(line_no, &normalized)?;
        }
        if let Some(pending) = &self.pending {
            return Err(AuthzError::syntax(
                pending.start_line,
                SyntaxError::InvalidContinuation,
            ));
        }
        debug!(event = "Parse", phase = "Consumed", lines = last_line);
        Ok(())
    }

    fn line(&mut self, line_no: usize, line: &str) -> Result<(), AuthzError> {
        let kind = classify(line, line_no)?;

        // A pending group continuation claims every line except comments.
        if self.pending.is_some() {
            return match kind {
                LineKind::Comment => Ok(()),
                LineKind::Blank => Err(AuthzError::syntax(
                    line_no,
                    SyntaxError::BlankLineInContinuation,
                )),
                _ if !line.starts_with(' ') => {
                    Err(AuthzError::syntax(line_no, SyntaxError::InvalidContinuation))
                }
                _ => self.continue_group(line),
            };
        }

        match (self.state, kind) {
            (_, LineKind::Blank) | (_, LineKind::Comment) => Ok(()),

            (ParserState::Start, LineKind::AliasesSection) => {
                self.transition(ParserState::Aliases);
                Ok(())
            }
            (_, LineKind::AliasesSection) => Err(AuthzError::syntax(
                line_no,
                SyntaxError::AliasesSectionNotFirst,
            )),

            (ParserState::Start | ParserState::Aliases, LineKind::GroupsSection) => {
                self.transition(ParserState::Groups);
                Ok(())
            }
            (_, LineKind::GroupsSection) => Err(AuthzError::syntax(
                line_no,
                SyntaxError::GroupsSectionMisplaced,
            )),

            (_, LineKind::ServerSection(path)) => {
                self.open_server_section(line_no, path)?;
                self.transition(ParserState::ServerRules);
                Ok(())
            }
            (_, LineKind::RepositorySection(repo, path)) => {
                self.open_repository_section(line_no, repo, path)?;
                self.transition(ParserState::Rules);
                Ok(())
            }

            (ParserState::Aliases, LineKind::Content(content)) => self.alias(line_no, content),
            (ParserState::Groups, LineKind::Content(content)) => self.begin_group(line_no, content),
            (ParserState::Rules | ParserState::ServerRules, LineKind::Content(content)) => {
                self.rule(line_no, content)
            }
            (ParserState::Start, LineKind::Content(_)) => {
                Err(AuthzError::syntax(line_no, SyntaxError::LineOutsideSection))
            }
        }
    }

    fn transition(&mut self, next: ParserState) {
        debug!(
            event = "Parse",
            phase = "Transition",
            from = %self.state,
            to = %next,
        );
        self.state = next;
    }

    /// `alias = username` inside `[aliases]`. Redefining an alias for a
    /// different user overwrites: last write wins.
    fn alias(&mut self, line_no: usize, content: &str) -> Result<(), AuthzError> {
        let (alias, name) = split_assignment(line_no, content)?;
        if alias.is_empty() || name.is_empty() {
            return Err(AuthzError::syntax(line_no, SyntaxError::EmptyIdentifier));
        }
        let user = self.document.find_or_create_user(name);
        self.document.set_user_alias(user, alias)?;
        Ok(())
    }

    /// First line of a group definition inside `[groups]`. A trailing comma
    /// means the member list continues on indented follow-up lines.
    fn begin_group(&mut self, line_no: usize, content: &str) -> Result<(), AuthzError> {
        let trimmed = content.trim();
        if trimmed.ends_with(',') {
            self.pending = Some(Continuation {
                buffer: trimmed.to_string(),
                start_line: line_no,
            });
            return Ok(());
        }
        self.group_definition(line_no, trimmed)
    }

    fn continue_group(&mut self, line: &str) -> Result<(), AuthzError> {
        // line() guarantees pending is set here
        let mut pending = self.pending.take().ok_or_else(|| {
            AuthzError::Invariant("group continuation consumed without pending state".to_string())
        })?;
        let content = line.trim();
        pending.buffer.push(' ');
        pending.buffer.push_str(content);
        if content.ends_with(',') {
            self.pending = Some(pending);
            return Ok(());
        }
        self.group_definition(pending.start_line, &pending.buffer)
    }

    /// A complete (possibly merged) `name = member, member, ...` line.
    fn group_definition(&mut self, line_no: usize, content: &str) -> Result<(), AuthzError> {
        let (name, members) = split_assignment(line_no, content)?;
        if name.is_empty() {
            return Err(AuthzError::syntax(line_no, SyntaxError::EmptyIdentifier));
        }

        if let Some(existing) = self.document.find_group(name) {
            let group = self.document.resolve_group(existing)?;
            if !group.is_empty() {
                return Err(AuthzError::syntax(
                    line_no,
                    SyntaxError::DuplicateGroup(name.to_string()),
                ));
            }
        }
        let group = self.document.find_or_create_group(name);

        for token in members.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(member) = token.strip_prefix('@') {
                if member.is_empty() {
                    return Err(AuthzError::syntax(line_no, SyntaxError::EmptyIdentifier));
                }
                let member = self.document.find_or_create_group(member);
                // No cycle guard here: cyclic input parses, callers validate.
                self.document.link_group_member(group, member)?;
            } else if let Some(alias) = token.strip_prefix('&') {
                let user = self.document.find_user_by_alias(alias).ok_or_else(|| {
                    AuthzError::syntax(line_no, SyntaxError::UndefinedAlias(alias.to_string()))
                })?;
                self.document.add_user_member(group, user)?;
            } else {
                let user = self.document.find_or_create_user(token);
                self.document.add_user_member(group, user)?;
            }
        }
        Ok(())
    }

    fn open_server_section(&mut self, line_no: usize, path: &str) -> Result<(), AuthzError> {
        if self.document.find_path(None, path).is_some() {
            return Err(AuthzError::syntax(
                line_no,
                SyntaxError::DuplicatePath(format!("[{path}]")),
            ));
        }
        let id = self.document.add_path(None, path)?;
        self.current_path = Some(id);
        Ok(())
    }

    fn open_repository_section(
        &mut self,
        line_no: usize,
        repo: &str,
        path: &str,
    ) -> Result<(), AuthzError> {
        let repo_id = self.document.find_or_create_repository(repo);
        if self.document.find_path(Some(repo_id), path).is_some() {
            return Err(AuthzError::syntax(
                line_no,
                SyntaxError::DuplicatePath(format!("[{repo}:{path}]")),
            ));
        }
        let id = self.document.add_path(Some(repo_id), path)?;
        self.current_path = Some(id);
        Ok(())
    }

    /// `@group = level` or `user_or_alias = level` inside a rules section.
    fn rule(&mut self, line_no: usize, content: &str) -> Result<(), AuthzError> {
        let (subject, level_token) = split_assignment(line_no, content)?;
        if subject.is_empty() {
            return Err(AuthzError::syntax(line_no, SyntaxError::EmptyIdentifier));
        }
        let level = AccessLevel::from_str(level_token).map_err(|_| {
            AuthzError::syntax(line_no, SyntaxError::InvalidAccessLevel(level_token.to_string()))
        })?;

        let grantee = if let Some(group) = subject.strip_prefix('@') {
            if group.is_empty() {
                return Err(AuthzError::syntax(line_no, SyntaxError::EmptyIdentifier));
            }
            Grantee::Group(self.document.find_or_create_group(group))
        } else if let Some(alias) = subject.strip_prefix('&') {
            let user = self.document.find_user_by_alias(alias).ok_or_else(|| {
                AuthzError::syntax(line_no, SyntaxError::UndefinedAlias(alias.to_string()))
            })?;
            Grantee::User(user)
        } else {
            // `*` is an ordinary user name at this layer.
            Grantee::User(self.document.find_or_create_user(subject))
        };

        let path = self.current_path.ok_or_else(|| {
            AuthzError::Invariant("rules state entered without an open path section".to_string())
        })?;
        self.document.add_access_rule(path, grantee, level)?;
        Ok(())
    }
}

/// Classify a tab-normalized line. Section-header errors (unbalanced or
/// empty brackets) surface here; everything else is `Content` for the
/// per-state handlers.
fn classify<'a>(line: &'a str, line_no: usize) -> Result<LineKind<'a>, AuthzError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(LineKind::Blank);
    }
    if trimmed.starts_with('#') {
        return Ok(LineKind::Comment);
    }
    if trimmed.starts_with('[') {
        let captures = SECTION_RE.captures(trimmed).ok_or_else(|| {
            AuthzError::syntax(line_no, SyntaxError::MalformedSection(trimmed.to_string()))
        })?;
        let inner = captures.get(1).map_or("", |m| m.as_str());
        return match inner {
            "aliases" => Ok(LineKind::AliasesSection),
            "groups" => Ok(LineKind::GroupsSection),
            _ => {
                if let Some((repo, path)) = inner.split_once(':') {
                    if repo.is_empty() || path.is_empty() {
                        return Err(AuthzError::syntax(
                            line_no,
                            SyntaxError::MalformedSection(trimmed.to_string()),
                        ));
                    }
                    Ok(LineKind::RepositorySection(repo, path))
                } else if inner.is_empty() {
                    Err(AuthzError::syntax(
                        line_no,
                        SyntaxError::MalformedSection(trimmed.to_string()),
                    ))
                } else {
                    Ok(LineKind::ServerSection(inner))
                }
            }
        };
    }
    Ok(LineKind::Content(trimmed))
}

/// Split a `key = value` line at the first `=`, trimming both sides.
fn split_assignment(line_no: usize, content: &str) -> Result<(&str, &str), AuthzError> {
    content
        .split_once('=')
        .map(|(lhs, rhs)| (lhs.trim(), rhs.trim()))
        .ok_or_else(|| AuthzError::syntax(line_no, SyntaxError::MissingSeparator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn syntax_error(input: &str) -> (usize, SyntaxError) {
        match FileParser::parse(input) {
            Err(AuthzError::Syntax { line, reason }) => (line, reason),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_yields_empty_document() {
        let doc = FileParser::parse("").unwrap();
        assert_eq!(doc.users().count(), 0);
        assert_eq!(doc.groups().count(), 0);
        assert_eq!(doc.paths().count(), 0);
    }

    #[test]
    fn test_comments_and_blanks_ignored_everywhere() {
        let doc = FileParser::parse(
            "# header\n\n[groups]\n# inside groups\ndevs = alice\n\n[/]\n# inside rules\n@devs = r\n",
        )
        .unwrap();
        assert_eq!(doc.groups().count(), 1);
        assert_eq!(doc.rules().count(), 1);
    }

    #[test]
    fn test_aliases_create_users() {
        let doc = FileParser::parse("[aliases]\nharry = harry_h_hirsch\n").unwrap();
        let id = doc.find_user("harry_h_hirsch").unwrap();
        assert_eq!(doc.user(id).unwrap().alias(), Some("harry"));
        assert_eq!(doc.find_user_by_alias("harry"), Some(id));
        assert_eq!(doc.users().count(), 1);
    }

    #[test]
    fn test_alias_redefinition_last_write_wins() {
        let doc = FileParser::parse("[aliases]\nh = harry_h_hirsch\nh = henry_higgins\n").unwrap();
        // Both users exist; the later line aliased a second user without
        // clearing the first. Alias lookup returns the earliest match.
        assert_eq!(doc.users().count(), 2);
        let first = doc.find_user("harry_h_hirsch").unwrap();
        assert_eq!(doc.find_user_by_alias("h"), Some(first));
        let second = doc.find_user("henry_higgins").unwrap();
        assert_eq!(doc.user(second).unwrap().alias(), Some("h"));
    }

    #[test]
    fn test_group_members_of_all_kinds() {
        let doc = FileParser::parse(
            "[aliases]\nbob = bob_b_builder\n[groups]\ndevs = alice, &bob, @ops\nops = carol\n",
        )
        .unwrap();
        let devs = doc.group(doc.find_group("devs").unwrap()).unwrap();
        assert_eq!(devs.user_members().len(), 2);
        assert_eq!(devs.group_members().len(), 1);
        let ops = doc.group(doc.find_group("ops").unwrap()).unwrap();
        assert_eq!(ops.user_members().len(), 1);
    }

    #[test]
    fn test_group_continuation_merges_members() {
        let doc = FileParser::parse("[groups]\ng = @a, @b,\n      @c\n").unwrap();
        let g = doc.group(doc.find_group("g").unwrap()).unwrap();
        let names: Vec<&str> = g
            .group_members()
            .iter()
            .map(|m| doc.group(*m).unwrap().name())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_group_continuation_over_multiple_lines() {
        let doc = FileParser::parse("[groups]\ng = u1,\n  u2,\n  u3\n").unwrap();
        let g = doc.group(doc.find_group("g").unwrap()).unwrap();
        assert_eq!(g.user_members().len(), 3);
    }

    #[test]
    fn test_forward_referenced_group_definition_appends() {
        let doc = FileParser::parse("[groups]\nall = @devs\ndevs = alice\n").unwrap();
        let devs = doc.group(doc.find_group("devs").unwrap()).unwrap();
        assert_eq!(devs.user_members().len(), 1);
    }

    #[test]
    fn test_duplicate_group_redefinition_rejected() {
        let (line, reason) = syntax_error("[groups]\ng = u1\ng = u2\n");
        assert_eq!(line, 3);
        assert_eq!(reason, SyntaxError::DuplicateGroup("g".to_string()));
    }

    #[test]
    fn test_cyclic_groups_parse_and_are_detectable() {
        let doc = FileParser::parse("[groups]\na = @b\nb = @a\n").unwrap();
        let a = doc.find_group("a").unwrap();
        assert!(doc.has_circular_reference(a));
    }

    #[test]
    fn test_repository_scoped_rules() {
        let doc = FileParser::parse("[groups]\ngrp = alice\n[repo1:/trunk]\n@grp = rw\nalice = r\n")
            .unwrap();
        let repo = doc.find_repository("repo1").unwrap();
        let path = doc.find_path(Some(repo), "/trunk").unwrap();
        let rules: Vec<_> = doc.path(path).unwrap().rules().to_vec();
        assert_eq!(rules.len(), 2);

        let group_rule = doc.rule(rules[0]).unwrap();
        assert!(group_rule.grantee().is_group());
        assert_eq!(group_rule.level(), AccessLevel::ReadWrite);

        let user_rule = doc.rule(rules[1]).unwrap();
        assert_eq!(user_rule.level(), AccessLevel::ReadOnly);
    }

    #[test]
    fn test_group_rule_without_prior_definition() {
        let doc = FileParser::parse("[repo1:/trunk]\n@grp = rw\n").unwrap();
        let grp = doc.find_group("grp").unwrap();
        assert!(doc.group(grp).unwrap().is_empty());
        assert_eq!(doc.rules().count(), 1);
    }

    #[test]
    fn test_server_path_deny_rule() {
        let doc = FileParser::parse("[/]\nbob = \n").unwrap();
        let path = doc.find_path(None, "/").unwrap();
        assert!(doc.path(path).unwrap().is_server_path());
        let rule = doc.rule(doc.path(path).unwrap().rules()[0]).unwrap();
        assert_eq!(rule.level(), AccessLevel::Deny);
        match rule.grantee() {
            Grantee::User(id) => assert_eq!(doc.user(id).unwrap().name(), "bob"),
            other => panic!("expected user grantee, got {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_is_ordinary_user() {
        let doc = FileParser::parse("[/]\n* = r\n").unwrap();
        let star = doc.find_user("*").unwrap();
        assert!(doc.user(star).unwrap().is_wildcard());
    }

    #[test]
    fn test_alias_rule_resolves_user() {
        let doc = FileParser::parse("[aliases]\nbob = bob_b_builder\n[/]\n&bob = rw\n").unwrap();
        let (_, rule) = doc.rules().next().unwrap();
        match rule.grantee() {
            Grantee::User(id) => assert_eq!(doc.user(id).unwrap().name(), "bob_b_builder"),
            other => panic!("expected user grantee, got {other:?}"),
        }
    }

    #[test]
    fn test_tabs_normalized_before_classification() {
        let doc = FileParser::parse("[groups]\ndevs\t=\talice,\tbob\n").unwrap();
        let devs = doc.group(doc.find_group("devs").unwrap()).unwrap();
        assert_eq!(devs.user_members().len(), 2);
    }

    #[parameterized(
        missing_equals_in_groups = { "[groups]\nbroken line\n", 2, SyntaxError::MissingSeparator },
        missing_equals_in_aliases = { "[aliases]\nbroken\n", 2, SyntaxError::MissingSeparator },
        aliases_after_groups = { "[groups]\n[aliases]\n", 2, SyntaxError::AliasesSectionNotFirst },
        aliases_after_rules = { "[/]\n[aliases]\n", 2, SyntaxError::AliasesSectionNotFirst },
        groups_after_rules = { "[/]\n[groups]\n", 2, SyntaxError::GroupsSectionMisplaced },
        duplicate_groups_section = { "[groups]\n[groups]\n", 2, SyntaxError::GroupsSectionMisplaced },
        rule_before_any_section = { "alice = r\n", 1, SyntaxError::LineOutsideSection },
        empty_section = { "[]\n", 1, SyntaxError::MalformedSection("[]".to_string()) },
        unterminated_section = { "[groups\n", 1, SyntaxError::MalformedSection("[groups".to_string()) },
        empty_repo_in_section = { "[:/trunk]\n", 1, SyntaxError::MalformedSection("[:/trunk]".to_string()) },
        empty_path_in_section = { "[repo:]\n", 1, SyntaxError::MalformedSection("[repo:]".to_string()) },
        bad_access_level = { "[/]\nalice = w\n", 2, SyntaxError::InvalidAccessLevel("w".to_string()) },
        undefined_alias_in_rule = { "[/]\n&ghost = r\n", 2, SyntaxError::UndefinedAlias("ghost".to_string()) },
        undefined_alias_in_group = { "[groups]\ndevs = &ghost\n", 2, SyntaxError::UndefinedAlias("ghost".to_string()) },
        empty_group_name = { "[groups]\n = alice\n", 2, SyntaxError::EmptyIdentifier },
        empty_group_reference = { "[groups]\ndevs = @\n", 2, SyntaxError::EmptyIdentifier },
    )]
    fn test_syntax_errors(input: &str, expected_line: usize, expected_reason: SyntaxError) {
        let (line, reason) = syntax_error(input);
        assert_eq!(line, expected_line);
        assert_eq!(reason, expected_reason);
    }

    #[test]
    fn test_blank_line_during_continuation() {
        let (line, reason) = syntax_error("[groups]\ng = a,\n\n  b\n");
        assert_eq!(line, 3);
        assert_eq!(reason, SyntaxError::BlankLineInContinuation);
    }

    #[test]
    fn test_continuation_must_start_with_space() {
        let (line, reason) = syntax_error("[groups]\ng = a,\nb\n");
        assert_eq!(line, 3);
        assert_eq!(reason, SyntaxError::InvalidContinuation);
    }

    #[test]
    fn test_continuation_open_at_eof() {
        let (line, reason) = syntax_error("[groups]\ng = a,\n");
        assert_eq!(line, 2);
        assert_eq!(reason, SyntaxError::InvalidContinuation);
    }

    #[test]
    fn test_duplicate_server_path() {
        let (line, reason) = syntax_error("[/trunk]\n[/trunk]\n");
        assert_eq!(line, 2);
        assert_eq!(reason, SyntaxError::DuplicatePath("[/trunk]".to_string()));
    }

    #[test]
    fn test_duplicate_repository_path() {
        let (line, reason) = syntax_error("[calc:/trunk]\nalice = r\n[calc:/trunk]\n");
        assert_eq!(line, 3);
        assert_eq!(
            reason,
            SyntaxError::DuplicatePath("[calc:/trunk]".to_string())
        );
    }

    #[test]
    fn test_same_path_in_different_repositories_is_fine() {
        let doc = FileParser::parse("[calc:/trunk]\n[paint:/trunk]\n[/trunk]\n").unwrap();
        assert_eq!(doc.paths().count(), 3);
        assert_eq!(doc.repositories().count(), 2);
    }

    #[test]
    fn test_parse_file_missing_is_resource_error() {
        let result = FileParser::parse_file(StdPath::new("/nonexistent/authz"));
        assert!(matches!(result, Err(AuthzError::Resource { .. })));
    }

    #[test]
    fn test_parse_file_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("authz");
        std::fs::write(&file, "[groups]\ndevs = alice\n[/]\n@devs = rw\n").unwrap();
        let doc = FileParser::parse_file(&file).unwrap();
        assert_eq!(doc.rules().count(), 1);
    }
}
