//! `load_config` module: assembles the run configuration from the CI
//! environment plus an optional static YAML file.
//!
//! Secrets (`NOTION_API_KEY`) and the target page only ever come from the
//! environment. The YAML file holds non-secret tuning knobs and overrides the
//! matching environment values.
//!
//! # Accepted YAML keys
//! ```yaml
//! repo_path: ./            # defaults to GITHUB_WORKSPACE, then "."
//! max_depth: 20
//! anchor_title: Code Structure History
//! extra_ignores: [vendor]
//! divider_every: 15
//! ```
//!
//! # Errors
//! Every failure is a [`ConfigError`]. Missing required variables are
//! collected and reported together so a misconfigured workflow can be fixed
//! in one pass.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use structure_sync_core::config::{commit_url, SyncConfig};
use structure_sync_core::version::CommitMetadata;
use tracing::{error, info};

/// Environment variables without which no run can start.
pub const REQUIRED_VARS: &[&str] = &["NOTION_API_KEY", "NOTION_PAGE_ID"];

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config YAML {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Non-secret settings from the optional YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOverlay {
    pub repo_path: Option<PathBuf>,
    pub max_depth: Option<usize>,
    pub anchor_title: Option<String>,
    #[serde(default)]
    pub extra_ignores: Vec<String>,
    pub divider_every: Option<usize>,
}

/// Everything the CLI needs for one run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api_key: String,
    pub base_url: String,
    pub sync: SyncConfig,
}

/// Loads the configuration from the process environment.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    from_lookup(path, |key| std::env::var(key).ok())
}

/// Loads the configuration using `lookup` in place of the environment.
pub fn from_lookup<F>(path: Option<&Path>, lookup: F) -> Result<CliConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let (api_key, page_id) = match (get(REQUIRED_VARS[0]), get(REQUIRED_VARS[1])) {
        (Some(api_key), Some(page_id)) => (api_key, page_id),
        (api_key, page_id) => {
            let missing: Vec<String> = [api_key.is_none(), page_id.is_none()]
                .into_iter()
                .zip(REQUIRED_VARS)
                .filter(|(absent, _)| *absent)
                .map(|(_, key)| key.to_string())
                .collect();
            error!(?missing, "Required environment variables are not set");
            return Err(ConfigError::Missing(missing));
        }
    };

    let repo_path = get("GITHUB_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut sync = SyncConfig::new(page_id, repo_path);
    if let Some(title) = get("NOTION_ANCHOR_TITLE") {
        sync.anchor_title = title;
    }
    sync.diff = lookup("GIT_DIFF").unwrap_or_default();

    let repository = get("GITHUB_REPOSITORY");
    let sha = get("GITHUB_SHA");
    sync.metadata = CommitMetadata {
        author: get("COMMIT_AUTHOR").or_else(|| get("GITHUB_ACTOR")),
        branch: get("GITHUB_REF_NAME"),
        commit_url: commit_url(repository.as_deref(), sha.as_deref()),
        commit_sha: sha,
        commit_message: get("COMMIT_MESSAGE"),
    };

    if let Some(path) = path {
        apply_overlay(&mut sync, read_overlay(path)?)?;
    }

    Ok(CliConfig {
        api_key,
        base_url: get("NOTION_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        sync,
    })
}

/// Reads and parses the YAML overlay file.
pub fn read_overlay(path: &Path) -> Result<FileOverlay, ConfigError> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, config_path = ?path, "Failed to read config file");
        ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    // An empty file is a valid, empty overlay.
    if content.trim().is_empty() {
        return Ok(FileOverlay::default());
    }
    serde_yaml::from_str(&content).map_err(|source| {
        error!(error = ?source, config_path = ?path, "Failed to parse config YAML");
        ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn apply_overlay(sync: &mut SyncConfig, overlay: FileOverlay) -> Result<(), ConfigError> {
    if let Some(repo_path) = overlay.repo_path {
        sync.repo_path = repo_path;
    }
    if let Some(max_depth) = overlay.max_depth {
        sync.max_depth = max_depth;
    }
    if let Some(title) = overlay.anchor_title {
        if title.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "anchor_title".into(),
                reason: "must not be empty".into(),
            });
        }
        sync.anchor_title = title;
    }
    if let Some(every) = overlay.divider_every {
        if every == 0 {
            return Err(ConfigError::Invalid {
                key: "divider_every".into(),
                reason: "must be at least 1".into(),
            });
        }
        sync.divider_every = every;
    }
    sync.extra_ignores.extend(overlay.extra_ignores);
    Ok(())
}
