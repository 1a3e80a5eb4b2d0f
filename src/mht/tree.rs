//! Arena-backed hypothesis tree storage.
//!
//! Hypothesis nodes live in a slot arena addressed by generational indices,
//! so pruning is O(pruned nodes) and stale handles are detected rather than
//! dereferenced. The forest is strictly a tree with parent back-edges.

use smallvec::SmallVec;

use crate::mht::state::ObjectState;

/// Generational handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// What a report contributed to a branch, kept for track history emission.
#[derive(Debug, Clone, Copy)]
pub struct ReportSummary {
    /// Frame the report arrived in
    pub frame: u32,
    /// Measured x, after reference-point resolution
    pub x: f64,
    /// Measured y, after reference-point resolution
    pub y: f64,
    /// Corner index within the source object
    pub corner_id: usize,
}

/// Branch step taken by a node relative to its parent.
#[derive(Debug, Clone, Copy)]
pub enum BranchKind {
    /// First node of a new track hypothesis
    Start {
        /// The report that seeded the track
        report: ReportSummary,
    },
    /// Continuation that consumed a report
    Detect {
        /// The consumed report
        report: ReportSummary,
    },
    /// Continuation without a report
    Skip,
    /// Track termination
    End,
}

impl BranchKind {
    /// The report attached to this branch step, if any
    pub fn report(&self) -> Option<&ReportSummary> {
        match self {
            BranchKind::Start { report } | BranchKind::Detect { report } => Some(report),
            BranchKind::Skip | BranchKind::End => None,
        }
    }

    /// Whether this step terminates the branch
    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self, BranchKind::End)
    }
}

/// One node of a track hypothesis tree.
#[derive(Debug)]
pub struct HypothesisNode {
    /// Parent node, `None` at the committed chain head
    pub parent: Option<NodeId>,
    /// Child branches
    pub children: SmallVec<[NodeId; 4]>,
    /// Per-branch object state
    pub state: ObjectState,
    /// Branch step relative to the parent
    pub kind: BranchKind,
    /// Frame the step was taken in
    pub frame: u32,
    /// Cumulative branch log-likelihood: parent value plus the local
    /// transition term
    pub log_likelihood: f64,
    /// Whether the node has passed the N-scan horizon
    pub committed: bool,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<HypothesisNode>,
}

/// Slot arena holding all hypothesis nodes of one tracker.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl NodeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no nodes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a node, reusing a free slot when one exists.
    pub fn insert(&mut self, node: HypothesisNode) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|slot| slot.generation == id.generation && slot.node.is_some())
            .unwrap_or(false)
    }

    /// Borrow the node at `id`
    pub fn get(&self, id: NodeId) -> Option<&HypothesisNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    /// Mutably borrow the node at `id`
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut HypothesisNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Remove a single node. Does not touch parent or child links.
    pub fn remove(&mut self, id: NodeId) -> Option<HypothesisNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.node.is_none() {
            return None;
        }
        let node = slot.node.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        node
    }

    /// Remove `id` and every descendant. The parent's child list is left to
    /// the caller.
    pub fn remove_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.remove(current) {
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Path from the chain head down to `id`, inclusive, oldest first.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            path.push(node_id);
            current = self.get(node_id).and_then(|node| node.parent);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::kalman::KalmanFilter;
    use crate::mht::object::{ReferencePointSource, ReferencePointType};
    use nalgebra::{Matrix2, Matrix2x4, Matrix4};

    fn test_state() -> ObjectState {
        let filter = KalmanFilter::new(
            Matrix4::identity(),
            Matrix2x4::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            Matrix2::identity(),
            Matrix4::identity(),
            Matrix4::identity(),
        );
        ObjectState::new(
            filter,
            0.0,
            0,
            ReferencePointType::Centroid,
            &ReferencePointSource::new(),
        )
    }

    fn test_node(parent: Option<NodeId>, frame: u32) -> HypothesisNode {
        HypothesisNode {
            parent,
            children: SmallVec::new(),
            state: test_state(),
            kind: BranchKind::Skip,
            frame,
            log_likelihood: 0.0,
            committed: false,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = NodeArena::new();
        let id = arena.insert(test_node(None, 0));

        assert_eq!(arena.len(), 1);
        assert!(arena.contains(id));
        assert_eq!(arena.get(id).unwrap().frame, 0);
    }

    #[test]
    fn test_stale_id_after_removal() {
        let mut arena = NodeArena::new();
        let id = arena.insert(test_node(None, 0));
        arena.remove(id);

        assert!(!arena.contains(id));
        assert!(arena.get(id).is_none());

        // The slot is reused with a fresh generation.
        let reused = arena.insert(test_node(None, 1));
        assert_ne!(reused, id);
        assert!(arena.contains(reused));
    }

    #[test]
    fn test_remove_subtree() {
        let mut arena = NodeArena::new();
        let root = arena.insert(test_node(None, 0));
        let child = arena.insert(test_node(Some(root), 1));
        let grandchild = arena.insert(test_node(Some(child), 2));
        arena.get_mut(root).unwrap().children.push(child);
        arena.get_mut(child).unwrap().children.push(grandchild);

        arena.remove_subtree(child);

        assert!(arena.contains(root));
        assert!(!arena.contains(child));
        assert!(!arena.contains(grandchild));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_path_from_root() {
        let mut arena = NodeArena::new();
        let root = arena.insert(test_node(None, 0));
        let child = arena.insert(test_node(Some(root), 1));
        let leaf = arena.insert(test_node(Some(child), 2));
        arena.get_mut(root).unwrap().children.push(child);
        arena.get_mut(child).unwrap().children.push(leaf);

        let path = arena.path_from_root(leaf);
        assert_eq!(path, vec![root, child, leaf]);
    }
}
