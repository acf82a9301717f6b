#![doc = "structure-sync-core: core logic library for structure-sync."]

//! This crate contains the tree walker, the Mermaid renderer, version
//! records and the document synchronisation pipeline. The HTTP client for
//! the hosted document API lives in the `structure-sync` binary crate and
//! plugs in through [`contract::BlockStore`].
//!
//! # Pipeline
//! [`tree`] → [`diagram`] + [`style`] → [`version`] → [`synchronise`]

pub mod blocks;
pub mod changes;
pub mod config;
pub mod contract;
pub mod diagram;
pub mod hash;
pub mod layout;
pub mod style;
pub mod synchronise;
pub mod tree;
pub mod version;
