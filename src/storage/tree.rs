use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::StorageError;

pub type NodeKey = u64;

/// Key of the document root, present in every tree
pub const DOCUMENT_ROOT: NodeKey = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
    pub value: Value,
}

/// One revision of a resource: a tree of JSON-valued nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDocument {
    next_key: NodeKey,
    nodes: BTreeMap<NodeKey, Node>,
}

impl Default for TreeDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeDocument {
    /// Create a document holding only the document root
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            DOCUMENT_ROOT,
            Node {
                key: DOCUMENT_ROOT,
                parent: None,
                children: Vec::new(),
                value: Value::Null,
            },
        );
        Self { next_key: DOCUMENT_ROOT + 1, nodes }
    }

    /// Append a child under `parent` and return its key
    pub fn insert_child(&mut self, parent: NodeKey, value: Value) -> Result<NodeKey, StorageError> {
        let key = self.next_key;
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(StorageError::NodeNotFound(parent))?;
        parent_node.children.push(key);

        self.nodes.insert(
            key,
            Node {
                key,
                parent: Some(parent),
                children: Vec::new(),
                value,
            },
        );
        self.next_key += 1;
        Ok(key)
    }

    /// Remove `key` and everything beneath it. Returns the number of removed nodes.
    pub fn remove_subtree(&mut self, key: NodeKey) -> Result<usize, StorageError> {
        if key == DOCUMENT_ROOT {
            return Err(StorageError::CannotRemoveDocumentRoot);
        }
        let parent = self
            .nodes
            .get(&key)
            .ok_or(StorageError::NodeNotFound(key))?
            .parent;

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != key);
        }

        let mut removed = 0;
        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn parent_of(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|node| node.parent)
    }

    /// Number of nodes, document root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
