//! # contract: interface to the external document store
//!
//! Defines the [`BlockStore`] trait, the only seam between the sync pipeline
//! and the hosted document API. The pipeline needs three capabilities:
//! paginated child listing, appending block trees to a parent, and updating
//! a block in place.
//!
//! ## Limits implementors must respect
//! - Rich-text runs are capped at [`crate::blocks::MAX_TEXT_LEN`] characters.
//! - One append call may nest at most two levels (a block and its children).
//!   Deeper trees need a follow-up append targeting the created child.
//!
//! ## Mocking & Testing
//! The trait is annotated for `mockall`, so tests can generate a
//! `MockBlockStore` with per-call expectations.

use async_trait::async_trait;
use mockall::automock;

use crate::blocks::{Block, BlockContent, ChildrenPage};

/// Errors surfaced by a [`BlockStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport { .. } => true,
            StoreError::Api { status, .. } => *status == 429 || *status >= 500,
            StoreError::Decode { .. } => false,
        }
    }
}

/// Hierarchical block storage, as offered by the hosted document API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// One page of the children of `block_id`, starting at `start_cursor`.
    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<String>,
    ) -> Result<ChildrenPage, StoreError>;

    /// Appends `children` after the existing children of `parent_id` and
    /// returns the created top-level blocks in order.
    async fn append_children(
        &self,
        parent_id: &str,
        children: Vec<BlockContent>,
    ) -> Result<Vec<Block>, StoreError>;

    /// Replaces the payload of `block_id`. Children are left untouched.
    async fn update_block(&self, block_id: &str, content: BlockContent)
        -> Result<Block, StoreError>;
}
