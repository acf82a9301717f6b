//! Mermaid flowchart rendering of a [`TreeNode`].
//!
//! Rendering walks the tree depth-first (subdirectories before files, the same
//! order the walker produces) and emits one `graph TD` edge per kept child.
//! When a [`ChangeSet`] lists deleted paths, the missing part of each path is
//! reconstructed as a chain of dashed "ghost" nodes hanging off the deepest
//! directory that still exists.
//!
//! All identifier state lives in a [`DiagramRenderer`] that is created inside
//! each [`render`] call, so repeated calls always number nodes from `Node0`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::changes::ChangeSet;
use crate::style;
use crate::tree::TreeNode;

/// File names kept in the diagram regardless of extension.
pub const IMPORTANT_NAMES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "README.md",
    ".gitignore",
    ".env.example",
    "turbo.json",
    "pnpm-workspace.yaml",
];

/// File suffixes kept in the diagram.
pub const IMPORTANT_EXTENSIONS: &[&str] = &[
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".json",
    ".yml",
    ".yaml",
    ".md",
    ".env.example",
    ".tf",
    ".sh",
];

/// Marker prefixed to ghost node labels.
pub const GHOST_MARKER: &str = "❌";

/// Mermaid node identifier, rendered as `Node<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{}", self.0)
    }
}

/// Output of one render: the graph text plus the identifier mapping the
/// style annotator needs.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub text: String,
    pub root_id: NodeId,
    pub ghost_ids: Vec<NodeId>,
    real_ids: HashMap<PathBuf, NodeId>,
    relative_ids: HashMap<String, NodeId>,
}

impl Diagram {
    /// Identifier of an emitted real node, by absolute path.
    pub fn id_for_path(&self, path: &Path) -> Option<NodeId> {
        self.real_ids.get(path).copied()
    }

    /// Identifier of an emitted real node, by repo-relative path.
    pub fn id_for_relative(&self, rel: &str) -> Option<NodeId> {
        self.relative_ids.get(rel).copied()
    }

    /// Number of nodes emitted, ghosts included.
    pub fn node_count(&self) -> usize {
        self.real_ids.len() + self.ghost_ids.len()
    }
}

/// Whether a file is significant enough to appear in the diagram.
pub fn is_important_file(name: &str) -> bool {
    IMPORTANT_NAMES.contains(&name) || IMPORTANT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Renders `tree` and, if given, ghost chains for the deleted paths.
pub fn render(tree: &TreeNode, changes: Option<&ChangeSet>) -> Diagram {
    DiagramRenderer::new(tree).render(changes)
}

/// Renders the graph followed by the default class and the style block.
pub fn render_with_styles(tree: &TreeNode, changes: Option<&ChangeSet>) -> String {
    let diagram = render(tree, changes);
    let styles = style::annotate(tree, changes, &diagram);
    format!("{}\n\n{}\n{}", diagram.text, style::DEFAULT_CLASS, styles)
}

/// Per-render identifier state.
pub struct DiagramRenderer<'t> {
    tree: &'t TreeNode,
    next_id: usize,
    real_ids: HashMap<PathBuf, NodeId>,
    relative_ids: HashMap<String, NodeId>,
    lines: Vec<String>,
}

impl<'t> DiagramRenderer<'t> {
    pub fn new(tree: &'t TreeNode) -> Self {
        DiagramRenderer {
            tree,
            next_id: 0,
            real_ids: HashMap::new(),
            relative_ids: HashMap::new(),
            lines: Vec::new(),
        }
    }

    pub fn render(mut self, changes: Option<&ChangeSet>) -> Diagram {
        let tree = self.tree;
        self.lines.push("graph TD".to_string());
        let root_id = self.real_id(tree);
        self.lines
            .push(format!("    {root_id}[\"{}/\"]", escape_label(&tree.name)));
        self.emit_children(tree, root_id);

        let ghost_ids = match changes {
            Some(changes) => self.emit_ghosts(root_id, changes),
            None => Vec::new(),
        };

        Diagram {
            text: self.lines.join("\n"),
            root_id,
            ghost_ids,
            real_ids: self.real_ids,
            relative_ids: self.relative_ids,
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn real_id(&mut self, node: &TreeNode) -> NodeId {
        if let Some(id) = self.real_ids.get(&node.path) {
            return *id;
        }
        let id = self.fresh_id();
        self.real_ids.insert(node.path.clone(), id);
        if let Some(rel) = relative_path(&self.tree.path, &node.path) {
            self.relative_ids.insert(rel, id);
        }
        id
    }

    fn emit_children(&mut self, parent: &TreeNode, parent_id: NodeId) {
        let (dirs, files): (Vec<&TreeNode>, Vec<&TreeNode>) =
            parent.children().iter().partition(|c| c.is_dir());

        for dir in dirs {
            let id = self.real_id(dir);
            self.lines.push(format!(
                "    {parent_id} --> {id}[\"{}/\"]",
                escape_label(&dir.name)
            ));
            self.emit_children(dir, id);
        }

        for file in files.into_iter().filter(|f| is_important_file(&f.name)) {
            let id = self.real_id(file);
            self.lines.push(format!(
                "    {parent_id} --> {id}[\"{}\"]",
                escape_label(&file.name)
            ));
        }
    }

    fn emit_ghosts(&mut self, root_id: NodeId, changes: &ChangeSet) -> Vec<NodeId> {
        let mut ghost_ids = Vec::new();
        let mut ghost_dirs: HashMap<String, NodeId> = HashMap::new();

        for deleted in changes.deleted() {
            let parts: Vec<&str> = deleted.split('/').collect();
            let Some((leaf, dir_parts)) = parts.split_last() else {
                continue;
            };

            // Deepest proper prefix of the path that was emitted as a real node.
            let anchor = (1..=dir_parts.len()).rev().find_map(|depth| {
                self.relative_ids
                    .get(&dir_parts[..depth].join("/"))
                    .map(|id| (depth, *id))
            });
            let (start, mut prev) = anchor.unwrap_or((0, root_id));

            for depth in start..dir_parts.len() {
                let rel = dir_parts[..=depth].join("/");
                if let Some(id) = self.relative_ids.get(&rel) {
                    prev = *id;
                    continue;
                }
                if let Some(id) = ghost_dirs.get(&rel) {
                    prev = *id;
                    continue;
                }
                let id = self.fresh_id();
                self.lines.push(format!(
                    "    {prev} -.-> {id}[\"{GHOST_MARKER} {}/\"]",
                    escape_label(dir_parts[depth])
                ));
                ghost_ids.push(id);
                ghost_dirs.insert(rel, id);
                prev = id;
            }

            let id = self.fresh_id();
            self.lines.push(format!(
                "    {prev} -.-> {id}[\"{GHOST_MARKER} {}\"]",
                escape_label(leaf)
            ));
            ghost_ids.push(id);
        }
        ghost_ids
    }
}

/// Repo-relative, forward-slash form of `path`; `None` for the root itself.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then_some(joined)
}

fn escape_label(name: &str) -> String {
    name.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TreeNode {
        TreeNode::directory(
            "repo",
            "/repo",
            vec![
                TreeNode::directory(
                    "dirA",
                    "/repo/dirA",
                    vec![TreeNode::file("x.js", "/repo/dirA/x.js")],
                ),
                TreeNode::file("README.md", "/repo/README.md"),
                TreeNode::file("notes.txt", "/repo/notes.txt"),
            ],
        )
    }

    #[test]
    fn renders_directories_before_files() {
        let diagram = render(&sample_tree(), None);
        let expected = [
            "graph TD",
            "    Node0[\"repo/\"]",
            "    Node0 --> Node1[\"dirA/\"]",
            "    Node1 --> Node2[\"x.js\"]",
            "    Node0 --> Node3[\"README.md\"]",
        ]
        .join("\n");
        assert_eq!(diagram.text, expected);
        assert!(diagram.ghost_ids.is_empty());
        assert_eq!(diagram.node_count(), 4);
    }

    #[test]
    fn unimportant_files_get_no_node() {
        let diagram = render(&sample_tree(), None);
        assert!(!diagram.text.contains("notes.txt"));
        assert_eq!(diagram.id_for_relative("notes.txt"), None);
        assert_eq!(diagram.id_for_relative("dirA/x.js"), Some(NodeId(2)));
    }

    #[test]
    fn importance_filter() {
        assert!(is_important_file("Dockerfile"));
        assert!(is_important_file("deploy.sh"));
        assert!(is_important_file("main.tf"));
        assert!(is_important_file(".env.example"));
        assert!(!is_important_file("main.rs"));
        assert!(!is_important_file("logo.png"));
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let tree = TreeNode::directory("r", "/r", vec![TreeNode::file("a\"b.md", "/r/a\"b.md")]);
        let diagram = render(&tree, None);
        assert!(diagram.text.contains("[\"a#quot;b.md\"]"));
    }

    #[test]
    fn deleted_top_level_file_hangs_off_root() {
        let changes = ChangeSet::parse("D\tgone.md\n");
        let diagram = render(&sample_tree(), Some(&changes));
        assert!(diagram
            .text
            .ends_with("    Node0 -.-> Node4[\"❌ gone.md\"]"));
        assert_eq!(diagram.ghost_ids, vec![NodeId(4)]);
    }

    #[test]
    fn relative_path_uses_forward_slashes() {
        let root = Path::new("/repo");
        assert_eq!(
            relative_path(root, &root.join("a").join("b.txt")),
            Some("a/b.txt".to_string())
        );
        assert_eq!(relative_path(root, root), None);
    }
}
