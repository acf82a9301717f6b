//! High-level pipeline: orchestrates walk → render → record → append for one CI run.
//!
//! This module provides the top-level orchestration for "synchronising" the
//! repository structure into the external document. A run:
//!   - Walks the repository into a [`TreeNode`]
//!   - Renders the Mermaid diagram with change colours and ghost nodes
//!   - Builds a [`VersionRecord`] carrying the structure hash
//!   - Finds the anchor toggle, then the branch's grouping toggle (creating it
//!     on first sync), and appends the record unless the hash is unchanged
//!
//! # Document layout
//! ```text
//! page
//! └── anchor toggle ("Code Structure History")
//!     ├── 🌿 main
//!     │   ├── record toggle (callout, commit link, mermaid code)
//!     │   └── ...
//!     └── 🌿 feature/foo
//! ```
//!
//! # Error Handling
//! Walk failures never surface (the tree is partial instead). Store failures
//! and a missing anchor abort the run with a [`SyncError`].
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Branch removal: [`mark_branch_deleted`]
//! - History: [`read_history`]

use tracing::{debug, error, info, warn};

use crate::blocks::{Block, BlockContent};
use crate::changes::ChangeSet;
use crate::config::SyncConfig;
use crate::contract::{BlockStore, StoreError};
use crate::diagram;
use crate::hash::ContentHash;
use crate::layout;
use crate::tree::{TreeNode, TreeWalker};
use crate::version::{self, Clock, VersionRecord, VersionSummary};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("anchor toggle containing {title:?} not found on page {page_id}; create a toggle block with that title")]
    AnchorNotFound { page_id: String, title: String },
    #[error("document API returned no block after appending to {parent_id}")]
    NothingCreated { parent_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new record toggle was appended.
    Appended { block_id: String, divider: bool },
    /// The latest stored record already has this structure hash.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub version: String,
    pub branch: String,
    pub content_hash: ContentHash,
    pub node_count: usize,
    pub outcome: SyncOutcome,
}

/// Result of [`append_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub block_id: String,
    /// 1-based position of the record among the grouping's records.
    pub position: usize,
    pub divider: bool,
}

/// Runs one full sync for the configured repository.
pub async fn synchronise<S, C>(
    config: &SyncConfig,
    store: &S,
    clock: &C,
) -> Result<SyncReport, SyncError>
where
    S: BlockStore + ?Sized,
    C: Clock + ?Sized,
{
    info!(path = %config.repo_path.display(), "📂 Parsing repository structure");
    let tree = TreeWalker::default()
        .with_extra_ignores(config.extra_ignores.iter().cloned())
        .walk(&config.repo_path, config.max_depth);
    let node_count = tree.count();
    info!(items = node_count, "✓ Parsed repository items");

    let changes = ChangeSet::parse(&config.diff);
    if !changes.is_empty() {
        let (added, modified, deleted) = changes.counts();
        info!(added, modified, deleted, "🔀 Git diff: +{added} ~{modified} -{deleted}");
    }

    let record = build_record(&tree, &changes, config, clock);
    info!(
        version = %record.version,
        author = %record.author,
        branch = %record.branch,
        commit = record.short_sha(),
        hash = %record.content_hash,
        "📝 Created version entry"
    );

    let anchor = require_anchor(store, &config.page_id, &config.anchor_title).await?;
    let grouping = find_or_create_grouping(store, &anchor.id, &record.branch).await?;

    if !config.force {
        let previous = latest_hash(store, &grouping.id).await?;
        if !version::has_changed(previous.as_ref(), &record.content_hash) {
            info!(hash = %record.content_hash, branch = %record.branch, "⏭️ Structure unchanged, skipping append");
            return Ok(SyncReport {
                version: record.version,
                branch: record.branch,
                content_hash: record.content_hash,
                node_count,
                outcome: SyncOutcome::Unchanged,
            });
        }
    }

    info!("📤 Appending new commit entry");
    let appended = append_record(store, &grouping.id, &record, config.divider_every).await?;
    info!(
        block_id = %appended.block_id,
        position = appended.position,
        divider = appended.divider,
        "✅ Appended version record"
    );

    Ok(SyncReport {
        version: record.version,
        branch: record.branch,
        content_hash: record.content_hash,
        node_count,
        outcome: SyncOutcome::Appended {
            block_id: appended.block_id,
            divider: appended.divider,
        },
    })
}

/// Renders `tree` and wraps the diagram in a record.
pub fn build_record<C: Clock + ?Sized>(
    tree: &TreeNode,
    changes: &ChangeSet,
    config: &SyncConfig,
    clock: &C,
) -> VersionRecord {
    info!("🎨 Generating Mermaid diagram");
    let diagram_text = diagram::render_with_styles(tree, Some(changes));
    let content_hash = ContentHash::of_tree(tree);
    debug!(hash = %content_hash, bytes = diagram_text.len(), "Generated diagram");
    version::build(clock, diagram_text, content_hash, config.metadata.clone())
}

/// Every child of `block_id`, following pagination cursors.
pub async fn list_all_children<S>(store: &S, block_id: &str) -> Result<Vec<Block>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let mut children = Vec::new();
    let mut cursor = None;
    loop {
        let page = store.list_children(block_id, cursor).await?;
        children.extend(page.results);
        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            _ => break,
        }
    }
    debug!(block_id, count = children.len(), "Listed children");
    Ok(children)
}

/// First toggle on the page whose title contains `title`, ignoring case.
pub async fn find_anchor<S>(
    store: &S,
    page_id: &str,
    title: &str,
) -> Result<Option<Block>, StoreError>
where
    S: BlockStore + ?Sized,
{
    info!(title, "📄 Searching for anchor toggle");
    let needle = title.to_lowercase();
    let blocks = list_all_children(store, page_id).await?;
    Ok(blocks.into_iter().find(|block| {
        block.is_toggle() && block.content.plain_text().to_lowercase().contains(&needle)
    }))
}

async fn require_anchor<S>(store: &S, page_id: &str, title: &str) -> Result<Block, SyncError>
where
    S: BlockStore + ?Sized,
{
    match find_anchor(store, page_id, title).await? {
        Some(anchor) => {
            info!(anchor_id = %anchor.id, "✅ Found anchor toggle");
            Ok(anchor)
        }
        None => {
            error!(page_id, title, "❌ Could not find the anchor toggle on the page");
            Err(SyncError::AnchorNotFound {
                page_id: page_id.to_string(),
                title: title.to_string(),
            })
        }
    }
}

/// The grouping toggle for `branch`, whether active or marked deleted.
pub async fn find_grouping<S>(
    store: &S,
    anchor_id: &str,
    branch: &str,
) -> Result<Option<Block>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let children = list_all_children(store, anchor_id).await?;
    Ok(children.into_iter().find(|block| {
        layout::grouping_of(block).is_some_and(|grouping| grouping.branch == branch)
    }))
}

/// Finds the grouping for `branch`, creating it on the branch's first sync.
///
/// A grouping previously marked deleted is restored to its active title.
pub async fn find_or_create_grouping<S>(
    store: &S,
    anchor_id: &str,
    branch: &str,
) -> Result<Block, SyncError>
where
    S: BlockStore + ?Sized,
{
    if let Some(existing) = find_grouping(store, anchor_id, branch).await? {
        if layout::grouping_of(&existing).is_some_and(|g| g.deleted) {
            warn!(branch, "♻️ Branch grouping was marked deleted, restoring it");
            store
                .update_block(&existing.id, layout::grouping_block(branch))
                .await?;
        }
        debug!(branch, grouping_id = %existing.id, "Found branch grouping");
        return Ok(existing);
    }

    info!(branch, "🌿 Creating grouping for new branch");
    // Created on its own: the record appended later would otherwise nest three levels deep.
    let created = store
        .append_children(anchor_id, vec![layout::grouping_block(branch)])
        .await?;
    created
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::NothingCreated {
            parent_id: anchor_id.to_string(),
        })
}

/// Appends `record` to the grouping, followed by a divider when the record
/// lands on a multiple of `divider_every`.
pub async fn append_record<S>(
    store: &S,
    grouping_id: &str,
    record: &VersionRecord,
    divider_every: usize,
) -> Result<AppendOutcome, SyncError>
where
    S: BlockStore + ?Sized,
{
    let existing = list_all_children(store, grouping_id)
        .await?
        .iter()
        .filter(|block| block.is_toggle())
        .count();
    let position = existing + 1;
    let divider = divider_every > 0 && position % divider_every == 0;

    let mut blocks = vec![layout::record_block(record)];
    if divider {
        blocks.push(BlockContent::divider());
    }

    let created = store.append_children(grouping_id, blocks).await?;
    let block_id = created
        .into_iter()
        .next()
        .map(|block| block.id)
        .ok_or_else(|| SyncError::NothingCreated {
            parent_id: grouping_id.to_string(),
        })?;

    Ok(AppendOutcome {
        block_id,
        position,
        divider,
    })
}

/// Record toggles of a grouping, newest first.
async fn record_toggles<S>(store: &S, grouping_id: &str) -> Result<Vec<Block>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let mut toggles: Vec<Block> = list_all_children(store, grouping_id)
        .await?
        .into_iter()
        .filter(|block| block.is_toggle() && block.has_children)
        .collect();
    toggles.reverse();
    Ok(toggles)
}

async fn callout_text_of<S>(store: &S, record_id: &str) -> Result<Option<String>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let inner = list_all_children(store, record_id).await?;
    Ok(inner
        .iter()
        .find(|block| matches!(block.content, BlockContent::Callout { .. }))
        .map(|block| block.content.plain_text()))
}

/// Structure hash stored in the most recent record of the grouping.
pub async fn latest_hash<S>(store: &S, grouping_id: &str) -> Result<Option<ContentHash>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let Some(newest) = record_toggles(store, grouping_id).await?.into_iter().next() else {
        return Ok(None);
    };
    let hash = callout_text_of(store, &newest.id)
        .await?
        .and_then(|text| version::extract_hash(&text));
    debug!(record_id = %newest.id, hash = ?hash, "Read latest stored hash");
    Ok(hash)
}

/// Summaries of the newest `max` records in the grouping, newest first.
pub async fn read_history<S>(
    store: &S,
    grouping_id: &str,
    max: usize,
) -> Result<Vec<VersionSummary>, StoreError>
where
    S: BlockStore + ?Sized,
{
    let toggles = version::prune_versions(record_toggles(store, grouping_id).await?, max);
    let mut history = Vec::with_capacity(toggles.len());
    for toggle in toggles {
        if let Some(text) = callout_text_of(store, &toggle.id).await? {
            history.push(version::parse_version_text(&text));
        }
    }
    Ok(history)
}

/// Flips the branch grouping to its deleted appearance.
///
/// Returns `false` when the branch never had a grouping.
pub async fn mark_branch_deleted<S>(
    store: &S,
    page_id: &str,
    anchor_title: &str,
    branch: &str,
) -> Result<bool, SyncError>
where
    S: BlockStore + ?Sized,
{
    let anchor = require_anchor(store, page_id, anchor_title).await?;
    let Some(grouping) = find_grouping(store, &anchor.id, branch).await? else {
        warn!(branch, "No grouping found for deleted branch, nothing to mark");
        return Ok(false);
    };
    store
        .update_block(&grouping.id, layout::deleted_grouping_block(branch))
        .await?;
    info!(branch, grouping_id = %grouping.id, "🗑️ Marked branch grouping as deleted");
    Ok(true)
}
