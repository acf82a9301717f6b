//! Change-set parsing for the CI diff listing.
//!
//! The CI step exports `git diff --name-status` output. Each line is a status
//! letter, a tab and a path (renames carry the old and the new path).

use hashlink::LinkedHashSet;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// Repo-relative, forward-slash paths grouped by change kind.
///
/// Insertion order is kept so ghost nodes are numbered in diff order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    added: LinkedHashSet<String>,
    modified: LinkedHashSet<String>,
    deleted: LinkedHashSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a diff listing; unrecognised lines are skipped.
    pub fn parse(diff: &str) -> Self {
        static LINE: OnceLock<Regex> = OnceLock::new();
        let line_re = LINE.get_or_init(|| {
            Regex::new(r"^([AMDR])(\d*)\t([^\t]+)(?:\t([^\t]+))?$").expect("static regex")
        });

        let mut changes = ChangeSet::new();
        for line in diff.lines() {
            let line = line.trim_end_matches('\r');
            let Some(caps) = line_re.captures(line) else {
                if !line.trim().is_empty() {
                    debug!(line, "Skipping unrecognised diff line");
                }
                continue;
            };
            let first = &caps[3];
            match (&caps[1], caps.get(4)) {
                ("A", _) => changes.insert(ChangeKind::Added, first),
                ("M", _) => changes.insert(ChangeKind::Modified, first),
                ("D", _) => changes.insert(ChangeKind::Deleted, first),
                ("R", Some(new_path)) => {
                    changes.insert(ChangeKind::Deleted, first);
                    changes.insert(ChangeKind::Added, new_path.as_str());
                }
                ("R", None) => changes.insert(ChangeKind::Added, first),
                _ => {}
            }
        }
        changes
    }

    /// Records `path` under `kind`, dropping any earlier classification.
    pub fn insert(&mut self, kind: ChangeKind, path: &str) {
        let path = normalize_path(path);
        if path.is_empty() {
            return;
        }
        self.added.remove(&path);
        self.modified.remove(&path);
        self.deleted.remove(&path);
        match kind {
            ChangeKind::Added => self.added.insert(path),
            ChangeKind::Modified => self.modified.insert(path),
            ChangeKind::Deleted => self.deleted.insert(path),
        };
    }

    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.added.iter().map(String::as_str)
    }

    pub fn modified(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.deleted.iter().map(String::as_str)
    }

    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Added)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else if self.deleted.contains(path) {
            Some(ChangeKind::Deleted)
        } else {
            None
        }
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.added.len(), self.modified.len(), self.deleted.len())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Forward slashes, no leading `./` or `/`, no trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let mut path = path.trim().replace('\\', "/");
    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }
    path.trim_matches('/').to_string()
}

/// Every proper ancestor of a relative path, shallowest first.
///
/// `"API/app/config.py"` yields `["API", "API/app"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').collect();
    (1..parts.len()).map(|i| parts[..i].join("/")).collect()
}
