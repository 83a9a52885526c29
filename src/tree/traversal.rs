//! Generic pre-order and post-order walks shared by every tree family.
//!
//! A walk is driven by an inclusion predicate: a node for which the predicate
//! returns `false` is not emitted and, if it is an inner node, its whole
//! subtree is skipped. This lets callers stop at boundaries they have already
//! processed without any scratch field stored on the nodes themselves.

use crate::errors::TreeError;

use super::NodeId;

/// Order in which nodes are emitted by a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// A node is emitted before its children
    Preorder,
    /// A node is emitted after its children
    Postorder,
}

/// Minimal view of a tree needed to walk it: a way to get a node from its
/// identifier and the identifiers of its children.
///
/// For unrooted trees the "children" of a half-edge are the half-edges on the
/// far side of the two other edges of its vertex.
pub trait Topology {
    /// The node type stored in the tree
    type Node;

    /// Get a reference to a node of the tree
    fn node(&self, id: NodeId) -> Result<&Self::Node, TreeError>;

    /// Identifiers of the children of a node, empty for a tip
    fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError>;

    /// Check if the node is a tip
    fn is_tip_node(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.child_ids(id)?.is_empty())
    }

    /// Tips of the subtree rooted at `root`, from left to right
    fn subtree_tips(&self, root: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut tips = vec![];
        for id in traverse(self, root, TraversalOrder::Preorder, |_| true)? {
            if self.is_tip_node(id)? {
                tips.push(id);
            }
        }
        Ok(tips)
    }
}

/// Walks the subtree rooted at `root` and returns the identifiers of the
/// nodes accepted by `include`, in the requested order.
///
/// The walk keeps its own stack on the heap, so arbitrarily deep trees
/// (e.g. long caterpillars) can be walked without growing the call stack.
pub fn traverse<T, F>(
    tree: &T,
    root: NodeId,
    order: TraversalOrder,
    mut include: F,
) -> Result<Vec<NodeId>, TreeError>
where
    T: Topology + ?Sized,
    F: FnMut(&T::Node) -> bool,
{
    let mut visited = vec![];
    traverse_into(tree, root, order, &mut include, &mut visited)?;
    Ok(visited)
}

/// Same as [`traverse`] but appends to an existing buffer, so that several
/// walks can be chained (e.g. both sides of an unrooted edge).
pub(crate) fn traverse_into<T, F>(
    tree: &T,
    root: NodeId,
    order: TraversalOrder,
    include: &mut F,
    visited: &mut Vec<NodeId>,
) -> Result<(), TreeError>
where
    T: Topology + ?Sized,
    F: FnMut(&T::Node) -> bool,
{
    // The flag is set once the children of a node have been pushed
    let mut stack = vec![(root, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            visited.push(id);
            continue;
        }
        if !include(tree.node(id)?) {
            continue;
        }

        let children = tree.child_ids(id)?;
        match order {
            TraversalOrder::Preorder => visited.push(id),
            TraversalOrder::Postorder => stack.push((id, true)),
        }
        stack.extend(children.into_iter().rev().map(|child| (child, false)));
    }

    Ok(())
}

/// Folds the subtree rooted at `root` bottom-up. `combine` is called on
/// every node, in post-order, with the values already computed for its
/// children, and the value of `root` is returned.
pub(crate) fn fold<T, V, F>(tree: &T, root: NodeId, mut combine: F) -> Result<V, TreeError>
where
    T: Topology + ?Sized,
    F: FnMut(NodeId, Vec<V>) -> Result<V, TreeError>,
{
    // The values of the subtrees closed so far, children of a node are on top
    let mut values = vec![];
    for id in traverse(tree, root, TraversalOrder::Postorder, |_| true)? {
        let n_children = tree.child_ids(id)?.len();
        let start = values
            .len()
            .checked_sub(n_children)
            .ok_or(TreeError::NodeNotFound(id))?;
        let children = values.split_off(start);
        values.push(combine(id, children)?);
    }

    values.pop().ok_or(TreeError::NodeNotFound(root))
}
