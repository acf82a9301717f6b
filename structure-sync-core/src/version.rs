//! Version records: a diagram snapshot plus the commit it was taken at.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::hash::ContentHash;

/// Size of the rolling window used by history-driven flows.
pub const MAX_VERSIONS: usize = 5;

/// Provides the current time, so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Commit metadata as read from the CI environment. Empty fields get
/// defaults when the record is built.
#[derive(Debug, Clone, Default)]
pub struct CommitMetadata {
    pub author: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
    pub commit_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Minute-granularity label; two builds in the same minute share it.
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub branch: String,
    pub commit_sha: String,
    pub commit_message: String,
    pub commit_url: String,
    pub diagram_text: String,
    pub content_hash: ContentHash,
}

impl VersionRecord {
    pub fn short_sha(&self) -> &str {
        short_sha(&self.commit_sha)
    }
}

/// Packages a rendered diagram with its structure hash and commit metadata.
pub fn build<C: Clock + ?Sized>(
    clock: &C,
    diagram_text: String,
    content_hash: ContentHash,
    metadata: CommitMetadata,
) -> VersionRecord {
    let now = clock.now();
    VersionRecord {
        version: version_label(now),
        timestamp: now,
        author: non_empty_or(metadata.author, "Unknown"),
        branch: non_empty_or(metadata.branch, "main"),
        commit_sha: metadata.commit_sha.unwrap_or_default(),
        commit_message: metadata.commit_message.unwrap_or_default(),
        commit_url: metadata.commit_url.unwrap_or_default(),
        diagram_text,
        content_hash,
    }
}

/// `vYYYY.MM.DD.HHMM` in UTC.
pub fn version_label(now: DateTime<Utc>) -> String {
    now.format("v%Y.%m.%d.%H%M").to_string()
}

pub fn has_changed(previous: Option<&ContentHash>, current: &ContentHash) -> bool {
    previous != Some(current)
}

/// First seven characters of a commit SHA.
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// The fields of a record that survive in the stored callout text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSummary {
    pub version: Option<String>,
    pub author: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub hash: Option<ContentHash>,
}

/// Parses `Key: value` lines written by the record callout.
pub fn parse_version_text(text: &str) -> VersionSummary {
    let mut summary = VersionSummary::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "Version" => summary.version = Some(value),
            "Author" => summary.author = Some(value),
            "Branch" => summary.branch = Some(value),
            "Commit" => summary.commit_sha = Some(value),
            "Hash" => summary.hash = extract_hash(line),
            _ => {}
        }
    }
    summary
}

/// Pulls the `Hash: <value>` token out of free text.
pub fn extract_hash(text: &str) -> Option<ContentHash> {
    static HASH: OnceLock<Regex> = OnceLock::new();
    let re = HASH.get_or_init(|| Regex::new(r"(?i)Hash: ([a-z0-9-]+)").expect("static regex"));
    re.captures(text)
        .map(|caps| ContentHash::from(caps[1].to_string()))
}

/// Keeps the newest `max` entries of a newest-first sequence.
pub fn prune_versions<T>(mut versions: Vec<T>, max: usize) -> Vec<T> {
    versions.truncate(max);
    versions
}
