#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use structure_sync_core::blocks::{Block, BlockContent, ChildrenPage, RichText};
use structure_sync_core::contract::{BlockStore, StoreError};

/// In-memory document store with API-like pagination and nesting limits.
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

#[derive(Default)]
struct State {
    blocks: HashMap<String, Stored>,
    calls: Vec<String>,
}

struct Stored {
    content: BlockContent,
    children: Vec<String>,
}

impl MemoryStore {
    /// A store holding one page block with the given top-level toggles.
    pub fn with_page(page_id: &str, toggle_titles: &[&str]) -> Self {
        let store = MemoryStore {
            state: Mutex::new(State::default()),
            page_size: 2,
        };
        {
            let mut state = store.state.lock().unwrap();
            state.blocks.insert(
                page_id.to_string(),
                Stored {
                    content: BlockContent::Unsupported,
                    children: Vec::new(),
                },
            );
            for title in toggle_titles {
                let id = uuid::Uuid::new_v4().to_string();
                state.blocks.insert(
                    id.clone(),
                    Stored {
                        content: BlockContent::toggle(vec![RichText::text(title)], vec![]),
                        children: Vec::new(),
                    },
                );
                state
                    .blocks
                    .get_mut(page_id)
                    .unwrap()
                    .children
                    .push(id);
            }
        }
        store
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn children_of(&self, id: &str) -> Vec<Block> {
        let state = self.state.lock().unwrap();
        state.blocks[id]
            .children
            .iter()
            .map(|child| state.block(child))
            .collect()
    }

    pub fn child_id_titled(&self, parent: &str, title: &str) -> Option<String> {
        self.children_of(parent)
            .into_iter()
            .find(|b| b.content.plain_text().contains(title))
            .map(|b| b.id)
    }
}

impl State {
    fn block(&self, id: &str) -> Block {
        let stored = &self.blocks[id];
        Block {
            id: id.to_string(),
            has_children: !stored.children.is_empty(),
            content: stored.content.clone(),
        }
    }

    fn insert(&mut self, content: BlockContent, depth: usize) -> Result<String, StoreError> {
        if depth > 2 {
            return Err(StoreError::Api {
                endpoint: "append".into(),
                status: 400,
                body: "block nesting exceeds two levels".into(),
            });
        }
        let id = uuid::Uuid::new_v4().to_string();
        let (content, nested) = match content {
            BlockContent::Toggle { mut toggle } => {
                let nested = std::mem::take(&mut toggle.children);
                (BlockContent::Toggle { toggle }, nested)
            }
            other => (other, Vec::new()),
        };
        let mut children = Vec::new();
        for child in nested {
            children.push(self.insert(child, depth + 1)?);
        }
        self.blocks.insert(id.clone(), Stored { content, children });
        Ok(id)
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<String>,
    ) -> Result<ChildrenPage, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list {block_id}"));
        let Some(stored) = state.blocks.get(block_id) else {
            return Err(StoreError::Api {
                endpoint: format!("blocks/{block_id}/children"),
                status: 404,
                body: "not found".into(),
            });
        };
        let start = start_cursor
            .map(|c| c.parse::<usize>().unwrap())
            .unwrap_or(0);
        let end = (start + self.page_size).min(stored.children.len());
        let ids: Vec<String> = stored.children[start..end].to_vec();
        let has_more = end < stored.children.len();
        Ok(ChildrenPage {
            results: ids.iter().map(|id| state.block(id)).collect(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn append_children(
        &self,
        parent_id: &str,
        children: Vec<BlockContent>,
    ) -> Result<Vec<Block>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("append {parent_id} {}", children.len()));
        let mut created = Vec::new();
        for child in children {
            let id = state.insert(child, 1)?;
            state
                .blocks
                .get_mut(parent_id)
                .expect("parent exists")
                .children
                .push(id.clone());
            created.push(state.block(&id));
        }
        Ok(created)
    }

    async fn update_block(
        &self,
        block_id: &str,
        content: BlockContent,
    ) -> Result<Block, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update {block_id}"));
        state
            .blocks
            .get_mut(block_id)
            .expect("block exists")
            .content = content;
        Ok(state.block(block_id))
    }
}
