//! Repository tree walker.
//!
//! Builds an in-memory [`TreeNode`] snapshot of a directory by recursive
//! enumeration. The walk is best-effort: unreadable entries are logged and
//! skipped, unreadable directories come back without children, and the caller
//! always receives a tree.

use icu_collator::{Collator, CollatorOptions};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default recursion limit used by the CLI.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Names (or name fragments) that are never included in the tree.
pub const IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "coverage",
    ".DS_Store",
    ".turbo",
    ".cache",
    "out",
    "tmp",
    "temp",
];

/// Hidden directory that is always kept so CI config shows up in the diagram.
pub const ALLOWED_HIDDEN: &str = ".github";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// A directory or file in the walked tree.
///
/// Field order matters: the serialised form feeds the content hash and must
/// stay `name, path, type, children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// `None` for files, so files can never carry children.
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>, children: Vec<TreeNode>) -> Self {
        TreeNode {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Some(children),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        TreeNode {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            children: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Children in walk order; always empty for files.
    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(TreeNode::count).sum::<usize>()
    }
}

fn serialize_path_lossy<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Walks `root` with the default ignore policy.
pub fn walk(root: impl AsRef<Path>, max_depth: usize) -> TreeNode {
    TreeWalker::default().walk(root, max_depth)
}

/// Tree walker with a configurable ignore list.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    ignore_patterns: Vec<String>,
}

impl Default for TreeWalker {
    fn default() -> Self {
        TreeWalker {
            ignore_patterns: IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl TreeWalker {
    /// Adds project-specific patterns on top of the built-in ignore list.
    pub fn with_extra_ignores<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn should_ignore(&self, name: &str) -> bool {
        if name == ALLOWED_HIDDEN {
            return false;
        }
        name.starts_with('.')
            || self
                .ignore_patterns
                .iter()
                .any(|pattern| name == pattern || name.contains(pattern.as_str()))
    }

    pub fn walk(&self, root: impl AsRef<Path>, max_depth: usize) -> TreeNode {
        let root = absolute_root(root.as_ref());
        debug!(root = %root.display(), max_depth, "Walking repository tree");
        self.walk_dir(&root, 0, max_depth)
    }

    fn walk_dir(&self, dir: &Path, depth: usize, max_depth: usize) -> TreeNode {
        let mut node = TreeNode::directory(dir_name(dir), dir, Vec::new());
        if depth >= max_depth {
            return node;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %dir.display(), "⚠️ Could not read directory, leaving it empty");
                return node;
            }
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry_res in entries {
            let entry = match entry_res {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, path = %dir.display(), "⚠️ Skipping unreadable directory entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.should_ignore(&name) {
                debug!(name = %name, "Ignoring entry");
                continue;
            }
            let path = entry.path();
            // Follows symlinks, so a link to a directory is walked as one.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => dirs.push((name, path)),
                Ok(_) => files.push((name, path)),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "⚠️ Skipping entry");
                }
            }
        }

        dirs.sort_by(|a, b| locale_cmp(&a.0, &b.0));
        files.sort_by(|a, b| locale_cmp(&a.0, &b.0));

        let mut children = Vec::with_capacity(dirs.len() + files.len());
        for (_, path) in dirs {
            children.push(self.walk_dir(&path, depth + 1, max_depth));
        }
        for (name, path) in files {
            children.push(TreeNode::file(name, path));
        }
        node.children = Some(children);
        node
    }
}

thread_local! {
    static COLLATOR: Option<Collator> =
        match Collator::try_new(&Default::default(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(e) => {
                warn!(error = ?e, "Could not load root collation, falling back to code point order");
                None
            }
        };
}

/// Root-locale (CLDR) collation of entry names, matching `localeCompare`
/// with default options: punctuation sorts before digits, accents and case
/// only break ties, and lowercase precedes uppercase.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    })
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(root),
        Err(e) => {
            warn!(error = %e, "Could not resolve current directory, using relative root");
            root.to_path_buf()
        }
    }
}

fn dir_name(dir: &Path) -> String {
    if let Some(name) = dir.file_name() {
        return name.to_string_lossy().into_owned();
    }
    std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}
