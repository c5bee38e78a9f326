use serde::{Deserialize, Serialize};

use super::frame::FrameId;

/// Index of a node in a [`CallTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The synthetic root node, present in every tree at slot 0.
    pub const ROOT: NodeId = NodeId(0);
}

/// One materialized occurrence of a frame in the reconstructed call tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTreeNode {
    pub frame: FrameId,
    /// Back-reference only; the parent owns this node through `children`.
    pub parent: Option<NodeId>,
    /// Insertion order matches the order frames were first opened here.
    pub children: Vec<NodeId>,
    /// Inclusive duration: this frame plus all descendants.
    pub total_weight: f64,
    /// Exclusive duration: `total_weight` minus the children's totals.
    pub self_weight: f64,
}

/// Arena holding every node of one reconstructed call tree.
///
/// Node 0 is a synthetic root carrying the root sentinel frame; the
/// top-level call stacks hang off its children. Parsers grow and weight
/// the arena; once a parser returns, the tree is frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
}

impl CallTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![CallTreeNode {
                frame: FrameId::ROOT,
                parent: None,
                children: Vec::new(),
                total_weight: 0.0,
                self_weight: 0.0,
            }],
        }
    }

    pub fn root(&self) -> &CallTreeNode {
        &self.nodes[NodeId::ROOT.0 as usize]
    }

    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.nodes.get(id.0 as usize)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut CallTreeNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Append a fresh node under `parent`, preserving insertion order.
    pub(crate) fn push_child(&mut self, parent: NodeId, frame: FrameId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(CallTreeNode {
            frame,
            parent: Some(parent),
            children: Vec::new(),
            total_weight: 0.0,
            self_weight: 0.0,
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the node's frame identity recurs anywhere up its ancestor
    /// chain — immediately (direct recursion) or further up (indirect).
    ///
    /// Walks the parent chain on demand; chains are short relative to
    /// profile size, so nothing is cached.
    pub fn is_recursive(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.frame == FrameId::ROOT {
            return false;
        }

        let mut cursor = node.parent;
        while let Some(parent_id) = cursor {
            let parent = &self.nodes[parent_id.0 as usize];
            if parent.frame == node.frame {
                return true;
            }
            cursor = parent.parent;
        }
        false
    }

    /// Path of node ids from the first top-level ancestor down to `id`,
    /// excluding the synthetic root.
    pub fn stack(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(node_id) = cursor {
            if node_id == NodeId::ROOT {
                break;
            }
            path.push(node_id);
            cursor = self.nodes[node_id.0 as usize].parent;
        }
        path.reverse();
        path
    }
}

impl Default for CallTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<NodeId> for CallTree {
    type Output = CallTreeNode;

    fn index(&self, id: NodeId) -> &CallTreeNode {
        &self.nodes[id.0 as usize]
    }
}

/// Output of a [`TreeBuilder`] run.
pub(crate) struct BuiltTree {
    pub tree: CallTree,
    pub samples: Vec<NodeId>,
    pub weights: Vec<f64>,
    /// Smallest nonzero weight attributed to any sample; infinite when no
    /// nonzero weight was seen.
    pub min_frame_duration: f64,
}

/// Materializes a call tree from consecutive root→leaf stacks.
///
/// Each stack is diffed against the previously materialized one: nodes
/// along the shared prefix are reused, fresh nodes are appended for the
/// diverging suffix. Returning to an earlier stack shape after diverging
/// creates new nodes, keeping the tree chronological.
pub(crate) struct TreeBuilder {
    tree: CallTree,
    /// Currently materialized path, root-exclusive.
    path: Vec<NodeId>,
    samples: Vec<NodeId>,
    weights: Vec<f64>,
    min_weight: f64,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            tree: CallTree::new(),
            path: Vec::new(),
            samples: Vec::new(),
            weights: Vec::new(),
            min_weight: f64::INFINITY,
        }
    }

    /// Record one captured instant: the active stack (root→leaf, empty for
    /// an idle instant) and the weight attributed to it.
    ///
    /// The weight lands on the leaf's `self_weight` and on the
    /// `total_weight` of every node along the path; an empty stack credits
    /// the synthetic root's own `self_weight`.
    pub fn advance(&mut self, stack: &[FrameId], weight: f64) {
        let mut common = 0;
        while common < self.path.len()
            && common < stack.len()
            && self.tree[self.path[common]].frame == stack[common]
        {
            common += 1;
        }

        self.path.truncate(common);
        for &frame in &stack[common..] {
            let parent = self.path.last().copied().unwrap_or(NodeId::ROOT);
            let node = self.tree.push_child(parent, frame);
            self.path.push(node);
        }

        let leaf = self.path.last().copied().unwrap_or(NodeId::ROOT);
        self.tree.node_mut(NodeId::ROOT).total_weight += weight;
        for &node in &self.path {
            self.tree.node_mut(node).total_weight += weight;
        }
        self.tree.node_mut(leaf).self_weight += weight;

        if weight > 0.0 {
            self.min_weight = self.min_weight.min(weight);
        }
        self.samples.push(leaf);
        self.weights.push(weight);
    }

    pub fn finish(self) -> BuiltTree {
        BuiltTree {
            tree: self.tree,
            samples: self.samples,
            weights: self.weights,
            min_frame_duration: self.min_weight,
        }
    }
}
