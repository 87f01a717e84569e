//! Reconstructed call hierarchy

use serde::{Deserialize, Serialize};

use super::Call;

/// A call together with its materialized children
///
/// Trees are built once per trace load and never patched; a new trace
/// selection rebuilds the forest from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTree {
    /// The call at this node
    #[serde(flatten)]
    pub call: Call,

    /// Child calls in hierarchy order
    pub children: Vec<CallTree>,
}

impl CallTree {
    /// Create a leaf node
    pub fn leaf(call: Call) -> Self {
        Self {
            call,
            children: Vec::new(),
        }
    }

    /// Pre-order iterator over this subtree
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Number of calls in this subtree
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Find a node by call id
    pub fn find(&self, id: &str) -> Option<&CallTree> {
        self.iter().find(|node| node.call.id == id)
    }

    /// Height of this subtree (a leaf has depth 0)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }
}

/// Pre-order iterator over a call tree
pub struct Iter<'a> {
    stack: Vec<&'a CallTree>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CallTree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Pre-order iterator over every node of a forest
pub fn walk(forest: &[CallTree]) -> impl Iterator<Item = &CallTree> {
    forest.iter().flat_map(CallTree::iter)
}

/// Find a node anywhere in a forest
pub fn find_in_forest<'a>(forest: &'a [CallTree], id: &str) -> Option<&'a CallTree> {
    forest.iter().find_map(|tree| tree.find(id))
}
