use serde::{Deserialize, Serialize};

use super::call_tree::{CallTree, CallTreeNode, NodeId};
use super::frame::{Frame, FrameId};

/// Span and frame-duration fallback for profiles with no observed
/// intervals; keeps downstream zoom math away from zero-length ranges.
pub const EMPTY_PROFILE_SPAN: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub name: String,
    /// Unit all weights and timestamps are expressed in (e.g. "milliseconds").
    pub unit: String,
    pub started_at: f64,
    pub ended_at: f64,
}

/// The canonical timeline reconstructed from one raw trace.
///
/// Owns the frame table and the entire call tree; `samples` point at the
/// deepest active node of each captured instant, with ancestors
/// recoverable through parent links. Read-only once a parser returns it,
/// so it can be shared freely across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub metadata: ProfileMetadata,
    /// Smallest nonzero frame duration observed anywhere in the tree.
    pub min_frame_duration: f64,
    frames: Vec<Frame>,
    tree: CallTree,
    samples: Vec<NodeId>,
    weights: Vec<f64>,
}

impl Profile {
    pub(crate) fn new(
        metadata: ProfileMetadata,
        frames: Vec<Frame>,
        tree: CallTree,
        samples: Vec<NodeId>,
        weights: Vec<f64>,
        min_frame_duration: f64,
    ) -> Self {
        Self {
            metadata,
            min_frame_duration: if min_frame_duration.is_finite() {
                min_frame_duration
            } else {
                EMPTY_PROFILE_SPAN
            },
            frames,
            tree,
            samples,
            weights,
        }
    }

    /// A profile with no samples at all.
    pub fn empty() -> Self {
        Self {
            metadata: ProfileMetadata {
                name: String::new(),
                unit: "milliseconds".to_owned(),
                started_at: 0.0,
                ended_at: EMPTY_PROFILE_SPAN,
            },
            min_frame_duration: EMPTY_PROFILE_SPAN,
            frames: vec![Frame::root()],
            tree: CallTree::new(),
            samples: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.metadata.ended_at - self.metadata.started_at
    }

    pub fn root(&self) -> &CallTreeNode {
        self.tree.root()
    }

    pub fn call_tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.tree.node(id)
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0 as usize)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// One entry per captured instant: the deepest active node.
    pub fn samples(&self) -> &[NodeId] {
        &self.samples
    }

    /// Weight attributed at each captured instant, parallel to `samples`.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn is_recursive(&self, id: NodeId) -> bool {
        self.tree.is_recursive(id)
    }

    /// Replay the tree as a chronological stream of open/close events.
    ///
    /// Adjacent samples are diffed by frame identity from the root down:
    /// frames below the deepest common ancestor close deepest-first, then
    /// the new sample's frames open shallowest-first. The first sample
    /// opens its whole stack; whatever is still open after the last sample
    /// is closed at the end. A root-sentinel sample closes everything,
    /// representing an idle gap.
    ///
    /// This is the only traversal surface renderers consume; they never
    /// walk `children` directly.
    pub fn for_each(
        &self,
        mut on_open: impl FnMut(&Frame, &CallTreeNode),
        mut on_close: impl FnMut(&Frame, &CallTreeNode),
    ) {
        let mut open_path: Vec<NodeId> = Vec::new();
        let mut previous: Option<NodeId> = None;

        for &sample in &self.samples {
            // Same deepest node as the previous instant: no transitions.
            if previous == Some(sample) {
                continue;
            }
            let stack = self.tree.stack(sample);

            let mut common = 0;
            while common < open_path.len()
                && common < stack.len()
                && self.tree[open_path[common]].frame == self.tree[stack[common]].frame
            {
                common += 1;
            }

            for &node in open_path[common..].iter().rev() {
                self.emit(&mut on_close, node);
            }
            for &node in &stack[common..] {
                self.emit(&mut on_open, node);
            }

            open_path = stack;
            previous = Some(sample);
        }

        for &node in open_path.iter().rev() {
            self.emit(&mut on_close, node);
        }
    }

    fn emit(&self, callback: &mut impl FnMut(&Frame, &CallTreeNode), node: NodeId) {
        let entry = &self.tree[node];
        callback(&self.frames[entry.frame.0 as usize], entry);
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::empty()
    }
}
