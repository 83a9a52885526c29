//! Order-independent walks of rooted trees and topology comparison.
//!
//! The canonical order of a rooted tree is a post-order walk in which the
//! two children of each inner node are visited in a fixed order, so that two
//! trees differing only by rotations of their inner nodes produce the same
//! sequence of tips and inner nodes.

use std::cmp::Ordering;
use std::iter::zip;

use crate::errors::TreeError;

use super::traversal::fold;
use super::{NodeId, RootedTree};

/// Canonical sequence of a subtree, stored as a run of links in a [`Chain`]
#[derive(Debug, Clone, Copy)]
struct Span {
    head: NodeId,
    tail: NodeId,
    len: usize,
}

/// Sequences of node ids stored as singly linked lists over the arena, so
/// that two sequences can be joined without copying them.
struct Chain {
    next: Vec<Option<NodeId>>,
}

impl Chain {
    fn ids(&self, span: Span) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(span.head), |id| self.next.get(*id).copied().flatten())
            .take(span.len)
    }

    /// Appends `second` then `node` after `first`
    fn join(&mut self, first: Span, second: Span, node: NodeId) -> Span {
        self.next[first.tail] = Some(second.head);
        self.next[second.tail] = Some(node);
        Span {
            head: first.head,
            tail: node,
            len: first.len + second.len + 1,
        }
    }
}

/// Compares two canonical sequences of the same tree. Shorter sequences come
/// first, then at the first position where exactly one side is a tip the tip
/// comes first, and at the first position where both are tips with different
/// labels the smaller label comes first. Inner node labels are ignored.
fn compare_sequences(
    tree: &RootedTree,
    chain: &Chain,
    first: Span,
    second: Span,
) -> Result<Ordering, TreeError> {
    if first.len != second.len {
        return Ok(first.len.cmp(&second.len));
    }

    for (a, b) in zip(chain.ids(first), chain.ids(second)) {
        let (a, b) = (tree.get(&a)?, tree.get(&b)?);
        match (a.is_tip(), b.is_tip()) {
            (true, false) => return Ok(Ordering::Less),
            (false, true) => return Ok(Ordering::Greater),
            (true, true) if a.label() != b.label() => return Ok(a.label().cmp(&b.label())),
            _ => {}
        }
    }

    Ok(Ordering::Equal)
}

/// Check that two canonical sequences agree on node kinds and tip labels
fn same_sequences(
    first_tree: &RootedTree,
    first: &[NodeId],
    second_tree: &RootedTree,
    second: &[NodeId],
) -> Result<bool, TreeError> {
    if first.len() != second.len() {
        return Ok(false);
    }
    for (a, b) in zip(first, second) {
        let (a, b) = (first_tree.get(a)?, second_tree.get(b)?);
        if a.is_tip() != b.is_tip() || (a.is_tip() && a.label() != b.label()) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Methods to walk a [`RootedTree`] independently of the order of children
impl RootedTree {
    /// Post-order walk of the subtree rooted at `root` where the children of
    /// every inner node are visited in canonical order: the smaller subtree
    /// first, then the one whose first differing position is a tip, or a tip
    /// with the smaller label.
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((D,(C,B)),A);").unwrap().into_rooted().unwrap();
    /// let order: Vec<_> = tree.sorted_order(&tree.root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .flat_map(|id| tree.get(id).unwrap().name.clone())
    ///     .collect();
    ///
    /// assert_eq!(order, vec!["A", "D", "B", "C"]);
    /// ```
    pub fn sorted_order(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut chain = Chain {
            next: vec![None; self.nodes_len()],
        };
        let span = fold(self, *root, |id, children: Vec<Span>| match children.as_slice() {
            [] => Ok(Span {
                head: id,
                tail: id,
                len: 1,
            }),
            [left, right] => {
                if compare_sequences(self, &chain, *left, *right)? == Ordering::Greater {
                    Ok(chain.join(*right, *left, id))
                } else {
                    Ok(chain.join(*left, *right, id))
                }
            }
            _ => Err(TreeError::IsNotBinary),
        })?;

        Ok(chain.ids(span).collect())
    }

    /// Swaps children so that a plain post-order walk follows the canonical
    /// order of [`RootedTree::sorted_order`].
    pub fn canonicalize(&mut self) -> Result<(), TreeError> {
        let root = self.root()?;
        let order = self.sorted_order(&root)?;
        let mut position = vec![0; order.iter().max().map_or(0, |max| max + 1)];
        for (index, id) in order.iter().enumerate() {
            position[*id] = index;
        }

        for id in self.inner_nodes()? {
            if let Some((left, right)) = self.get(&id)?.children() {
                if position[left] > position[right] {
                    self.swap_children(&id)?;
                }
            }
        }

        Ok(())
    }
}

/// Check if two rooted trees have the same topology, up to rotations of
/// their inner nodes. Branch lengths and inner node labels are ignored.
/// ```
/// use phylotopo::tree::{topologically_equal, Tree};
///
/// let first = Tree::from_newick("((A:1,B:2),(C,D));").unwrap().into_rooted().unwrap();
/// let second = Tree::from_newick("((D,C),(B,A)E);").unwrap().into_rooted().unwrap();
/// let third = Tree::from_newick("((A,C),(B,D));").unwrap().into_rooted().unwrap();
///
/// assert!(topologically_equal(&first, &second).unwrap());
/// assert!(!topologically_equal(&first, &third).unwrap());
/// ```
pub fn topologically_equal(first: &RootedTree, second: &RootedTree) -> Result<bool, TreeError> {
    if first.n_leaves() != second.n_leaves() {
        return Ok(false);
    }

    let first_order = first.sorted_order(&first.root()?)?;
    let second_order = second.sorted_order(&second.root()?)?;

    same_sequences(first, &first_order, second, &second_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick::NewickFormat;
    use crate::tree::Tree;

    fn rooted(newick: &str) -> RootedTree {
        Tree::from_newick(newick).unwrap().into_rooted().unwrap()
    }

    fn sorted_labels(tree: &RootedTree) -> Vec<String> {
        tree.sorted_order(&tree.root().unwrap())
            .unwrap()
            .iter()
            .map(|id| tree.get(id).unwrap().name.clone().unwrap_or("*".into()))
            .collect()
    }

    fn swap_everything(tree: &mut RootedTree) {
        for id in tree.inner_nodes().unwrap() {
            tree.swap_children(&id).unwrap();
        }
    }

    #[test]
    fn tips_before_inner_nodes() {
        let tree = rooted("(((A,B),C),((D,E),F));");
        assert_eq!(
            sorted_labels(&tree),
            vec!["C", "A", "B", "*", "*", "F", "D", "E", "*", "*", "*"]
        );
    }

    #[test]
    fn smaller_subtrees_first() {
        let tree = rooted("(((A,B),(C,D)),E);");
        assert_eq!(
            sorted_labels(&tree),
            vec!["E", "A", "B", "*", "C", "D", "*", "*", "*"]
        );
    }

    #[test]
    fn canonical_order_is_idempotent() {
        let mut tree = rooted("((((F,E),D),(C,(B,A))),(G,H));");
        let before = sorted_labels(&tree);

        tree.canonicalize().unwrap();
        let canonical = tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap();
        let postorder: Vec<_> = tree
            .postorder(&tree.root().unwrap())
            .unwrap()
            .iter()
            .map(|id| tree.get(id).unwrap().name.clone().unwrap_or("*".into()))
            .collect();
        assert_eq!(postorder, before);
        assert_eq!(sorted_labels(&tree), before);

        tree.canonicalize().unwrap();
        assert_eq!(
            tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
            canonical
        );
    }

    #[test]
    fn rotation_invariance() {
        let original = rooted("(((A:1,B:1):1,C:2):1,((D:1,E:3):1,(F:1,G:2):2):1);");
        let mut rotated = original.clone();
        swap_everything(&mut rotated);

        assert_ne!(
            original.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
            rotated.to_formatted_newick(NewickFormat::OnlyNames).unwrap()
        );
        assert_eq!(sorted_labels(&original), sorted_labels(&rotated));
        assert!(topologically_equal(&original, &rotated).unwrap());
        assert!(topologically_equal(&rotated, &original).unwrap());
    }

    #[test]
    fn equality_is_reflexive() {
        for newick in ["A;", "(A,B);", "((A,B),(C,D));", "(((A,B),C),D);"] {
            let tree = rooted(newick);
            assert!(topologically_equal(&tree, &tree).unwrap(), "{newick}");
        }
    }

    #[test]
    fn different_topologies() {
        let balanced = rooted("((A,B),(C,D));");
        let caterpillar = rooted("(((A,B),C),D);");
        let relabelled = rooted("((A,C),(B,D));");
        let smaller = rooted("((A,B),C);");

        assert!(!topologically_equal(&balanced, &caterpillar).unwrap());
        assert!(!topologically_equal(&balanced, &relabelled).unwrap());
        assert!(!topologically_equal(&balanced, &smaller).unwrap());
        assert!(!topologically_equal(&smaller, &balanced).unwrap());
    }

    #[test]
    fn same_shape_different_root() {
        let first = rooted("(((A,B),C),D);");
        let second = rooted("(((A,B),D),C);");
        assert!(!topologically_equal(&first, &second).unwrap());
    }
}
