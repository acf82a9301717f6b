//! Mermaid `style` lines for a rendered [`Diagram`].
//!
//! Styling never assigns identifiers; it only looks up the ones the renderer
//! already handed out, so it must run after [`crate::diagram::render`].

use crate::changes::{ancestors, ChangeSet};
use crate::diagram::{Diagram, NodeId};
use crate::tree::TreeNode;

/// Class applied to every node.
pub const DEFAULT_CLASS: &str = "    classDef default color:#7B00FF,font-weight:bold";

pub const ROOT_FILL: &str = "#e1f5ff";

/// Fill colours for well-known top-level directories.
pub const CATEGORY_FILLS: &[(&str, &str)] = &[
    ("apps", "#fff4e1"),
    ("services", "#e8f5e9"),
    ("packages", "#f3e5f5"),
    ("infrastructure", "#e0f2f1"),
    ("docs", "#fce4ec"),
    ("scripts", "#e1f5fe"),
    ("tests", "#fff3e0"),
];

const ADDED: Palette = Palette {
    fill: "#d4edda",
    stroke: "#28a745",
    tint: "#e6ffec",
};
const MODIFIED: Palette = Palette {
    fill: "#fff3cd",
    stroke: "#ffc107",
    tint: "#fff9e6",
};
const DELETED: Palette = Palette {
    fill: "#f8d7da",
    stroke: "#dc3545",
    tint: "#ffeef0",
};

struct Palette {
    fill: &'static str,
    stroke: &'static str,
    tint: &'static str,
}

pub fn category_fill(name: &str) -> Option<&'static str> {
    CATEGORY_FILLS
        .iter()
        .find(|(category, _)| *category == name)
        .map(|(_, fill)| *fill)
}

/// Builds the style block for `diagram`.
pub fn annotate(tree: &TreeNode, changes: Option<&ChangeSet>, diagram: &Diagram) -> String {
    let mut styles = vec![format!("    style {} fill:{ROOT_FILL}", diagram.root_id)];

    for child in tree.children().iter().filter(|c| c.is_dir()) {
        if let (Some(fill), Some(id)) = (category_fill(&child.name), diagram.id_for_path(&child.path)) {
            styles.push(format!("    style {id} fill:{fill}"));
        }
    }

    let Some(changes) = changes.filter(|c| !c.is_empty()) else {
        return styles.join("\n");
    };

    let mut style_rel = |rel: &str, fill: &str, stroke: &str| {
        if let Some(id) = diagram.id_for_relative(rel) {
            styles.push(changed_style(id, fill, stroke));
        }
    };

    for path in changes.added() {
        style_rel(path, ADDED.fill, ADDED.stroke);
    }
    for path in changes.modified() {
        style_rel(path, MODIFIED.fill, MODIFIED.stroke);
    }

    for id in &diagram.ghost_ids {
        styles.push(format!(
            "    style {id} fill:{},stroke:{},stroke-width:2px,stroke-dasharray:5,color:#7B00FF",
            DELETED.fill, DELETED.stroke
        ));
    }

    for (paths, palette) in [
        (changes.added().collect::<Vec<_>>(), &ADDED),
        (changes.modified().collect(), &MODIFIED),
        (changes.deleted().collect(), &DELETED),
    ] {
        for dir in affected_dirs(&paths) {
            if let Some(id) = diagram.id_for_relative(&dir) {
                styles.push(changed_style(id, palette.tint, palette.stroke));
            }
        }
    }

    styles.join("\n")
}

fn changed_style(id: NodeId, fill: &str, stroke: &str) -> String {
    format!("    style {id} fill:{fill},stroke:{stroke},stroke-width:2px")
}

/// Unique ancestor directories of `paths`, in first-seen order.
fn affected_dirs(paths: &[&str]) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    for path in paths {
        for dir in ancestors(path) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs
}
