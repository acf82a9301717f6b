use std::path::PathBuf;
use tracing::{debug, info};

use crate::tree::DEFAULT_MAX_DEPTH;
use crate::version::CommitMetadata;

/// Title fragment identifying the anchor toggle on the target page.
pub const DEFAULT_ANCHOR_TITLE: &str = "Code Structure History";

/// A divider follows every n-th record in a branch grouping.
pub const DEFAULT_DIVIDER_EVERY: usize = 15;

/// Everything one sync run needs, secrets excluded.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_id: String,
    pub anchor_title: String,
    pub repo_path: PathBuf,
    pub max_depth: usize,
    pub extra_ignores: Vec<String>,
    pub divider_every: usize,
    /// Raw `--name-status` diff listing.
    pub diff: String,
    pub metadata: CommitMetadata,
    /// Append even when the structure hash is unchanged.
    pub force: bool,
}

impl SyncConfig {
    pub fn new(page_id: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        SyncConfig {
            page_id: page_id.into(),
            anchor_title: DEFAULT_ANCHOR_TITLE.to_string(),
            repo_path: repo_path.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            extra_ignores: Vec::new(),
            divider_every: DEFAULT_DIVIDER_EVERY,
            diff: String::new(),
            metadata: CommitMetadata::default(),
            force: false,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            repo_path = %self.repo_path.display(),
            max_depth = self.max_depth,
            anchor_title = %self.anchor_title,
            branch = self.metadata.branch.as_deref().unwrap_or("main"),
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

/// GitHub commit URL, when both parts are known.
pub fn commit_url(repository: Option<&str>, sha: Option<&str>) -> Option<String> {
    match (repository, sha) {
        (Some(repo), Some(sha)) if !repo.is_empty() && !sha.is_empty() => {
            Some(format!("https://github.com/{repo}/commit/{sha}"))
        }
        _ => None,
    }
}
