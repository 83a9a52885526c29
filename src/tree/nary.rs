use std::fmt::Display;

use clap::ValueEnum;
use rand::seq::index;
use rand::Rng;

use crate::errors::TreeError;
use crate::newick::{format_node, write_subtree, NewickFormat};

use super::draw;
use super::traversal::{fold, traverse, TraversalOrder, Topology};
use super::{EdgeLength, NodeId, RootedNode, RootedTree, UnrootedTree};

/// A node of a tree with any number of children
#[derive(Debug, Clone, Default)]
pub struct NaryNode {
    /// Index of the node
    pub id: NodeId,
    /// Name of the node
    pub name: Option<String>,
    /// Length of the branch between the node and its parent
    pub branch_length: EdgeLength,
    /// Index of the parent node
    pub parent: Option<NodeId>,
    /// Indices of the child nodes, empty for a tip
    pub children: Vec<NodeId>,
}

impl NaryNode {
    /// Creates a new unnamed node with a zero length branch
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new named node with a zero length branch
    pub fn new_named(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::default()
        }
    }

    /// Check if the node is a tip node
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

impl Display for NaryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}) {:?}", self.branch_length, self.name)
    }
}

/// How multifurcations are turned into bifurcations
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ResolveMode {
    /// Repeatedly join two children drawn uniformly at random
    Random,
    /// Split off the first child until two remain, giving a caterpillar
    Ladder,
}

/// A phylogenetic tree where nodes can have any number of children.
///
/// Nodes are added top-down: the first node added is the root.
#[derive(Debug, Clone, Default)]
pub struct NaryTree {
    nodes: Vec<NaryNode>,
}

/// Base methods to build and query a [`NaryTree`]
impl NaryTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Check if the tree has no node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Adds a detached node to the tree
    pub fn add(&mut self, node: NaryNode) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        self.nodes.push(node);

        idx
    }

    /// Adds a node as the last child of `parent`
    pub fn add_child(&mut self, node: NaryNode, parent: NodeId) -> Result<NodeId, TreeError> {
        self.get(&parent)?;
        let mut node = node;
        node.parent = Some(parent);
        let id = self.add(node);
        self.get_mut(&parent)?.children.push(id);

        Ok(id)
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&NaryNode, TreeError> {
        self.nodes.get(*id).ok_or(TreeError::NodeNotFound(*id))
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut NaryNode, TreeError> {
        self.nodes.get_mut(*id).ok_or(TreeError::NodeNotFound(*id))
    }

    /// Gets the root node
    pub fn root(&self) -> Result<NodeId, TreeError> {
        if self.nodes.is_empty() {
            Err(TreeError::DegenerateTopology("the tree is empty"))
        } else {
            Ok(0)
        }
    }

    /// Returns a vector containing node ids in pre-order
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        traverse(self, *root, TraversalOrder::Preorder, |_| true)
    }

    /// Tip ids of the tree, from left to right
    pub fn tips(&self) -> Result<Vec<NodeId>, TreeError> {
        self.subtree_tips(self.root()?)
    }

    /// Names of the tips, from left to right
    pub fn tip_names(&self) -> Result<Vec<String>, TreeError> {
        self.tips()?
            .iter()
            .map(|id| Ok(self.get(id)?.name.clone().unwrap_or_default()))
            .collect()
    }

    /// Lengths of all branches of the tree, the root branch excluded
    pub fn branch_lengths(&self) -> Result<Vec<EdgeLength>, TreeError> {
        let root = self.root()?;
        Ok(self
            .nodes
            .iter()
            .filter(|node| node.id != root)
            .map(|node| node.branch_length)
            .collect())
    }

    /// Check that every inner node but the root has exactly two children
    pub fn is_binary(&self) -> Result<bool, TreeError> {
        let root = self.root()?;
        Ok(self
            .nodes
            .iter()
            .filter(|node| node.id != root)
            .all(|node| node.children.is_empty() || node.children.len() == 2))
    }
}

impl Topology for NaryTree {
    type Node = NaryNode;

    fn node(&self, id: NodeId) -> Result<&Self::Node, TreeError> {
        self.get(&id)
    }

    fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.get(&id)?.children.clone())
    }
}

/// Methods to convert a [`NaryTree`] to the bifurcating tree families
impl NaryTree {
    // #############################
    // # CONVERSION TO BIFURCATING #
    // #############################

    /// Follows a chain of single child nodes and returns the node ending it
    fn chain_end(&self, id: NodeId) -> Result<&NaryNode, TreeError> {
        let mut node = self.get(&id)?;
        while let [child] = node.children.as_slice() {
            node = self.get(child)?;
        }
        Ok(node)
    }

    /// Builds a rooted tree bottom-up. Single child nodes are collapsed and
    /// `join` reduces the resolved children of every multifurcation to the
    /// two subtrees joined under the node itself.
    fn resolve_with<F>(&self, mut join: F) -> Result<RootedTree, TreeError>
    where
        F: FnMut(&mut RootedTree, Vec<NodeId>) -> Result<(NodeId, NodeId), TreeError>,
    {
        let mut tree = RootedTree::new();
        let root = fold(self, self.root()?, |id, children: Vec<NodeId>| {
            let node = self.get(&id)?;
            match children.len() {
                0 => Ok(tree.add(RootedNode::new_tip(node.name.clone(), node.branch_length))),
                1 => {
                    // The last node of a chain keeps its label and gets the summed length
                    let below = children[0];
                    tree.get_mut(&below)?.branch_length += node.branch_length;
                    Ok(below)
                }
                _ => {
                    let (left, right) = join(&mut tree, children)?;
                    tree.add_inner(left, right, node.name.clone(), node.branch_length)
                }
            }
        })?;
        tree.set_root(root);

        Ok(tree)
    }

    /// Converts the tree to a [`RootedTree`], resolving multifurcations
    /// with the chosen [`ResolveMode`]. Chains of nodes with a single child
    /// are collapsed into one node carrying the label of the last node of
    /// the chain and the summed branch lengths.
    /// ```
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use phylotopo::newick::parse;
    /// use phylotopo::tree::ResolveMode;
    ///
    /// let tree = parse("(A,B,C,D,E);").unwrap();
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let resolved = tree.resolve(ResolveMode::Random, &mut rng).unwrap();
    ///
    /// assert_eq!(resolved.n_leaves(), 5);
    /// assert_eq!(resolved.size(), 9);
    /// ```
    pub fn resolve<R>(&self, mode: ResolveMode, rng: &mut R) -> Result<RootedTree, TreeError>
    where
        R: Rng + ?Sized,
    {
        match mode {
            ResolveMode::Ladder => self.resolve_ladder(),
            ResolveMode::Random => self.resolve_with(|tree, mut children| {
                while children.len() > 2 {
                    let picked = index::sample(&mut *rng, children.len(), 2);
                    let (r1, r2) = if picked.index(0) < picked.index(1) {
                        (picked.index(0), picked.index(1))
                    } else {
                        (picked.index(1), picked.index(0))
                    };
                    children[r1] = tree.add_inner(children[r1], children[r2], None, 0.0)?;
                    children.swap_remove(r2);
                }
                Ok((children[0], children[1]))
            }),
        }
    }

    /// Converts the tree to a [`RootedTree`], resolving multifurcations as
    /// caterpillars.
    /// ```
    /// use phylotopo::newick::{parse, NewickFormat};
    ///
    /// let tree = parse("(A,B,C,D);").unwrap().resolve_ladder().unwrap();
    /// assert_eq!(
    ///     tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
    ///     "(A,(B,(C,D)));"
    /// );
    /// ```
    pub fn resolve_ladder(&self) -> Result<RootedTree, TreeError> {
        let root = self.root()?;
        if self.chain_end(root)?.is_tip() {
            return Err(TreeError::DegenerateTopology(
                "the tree is a chain ending in a single tip",
            ));
        }

        self.resolve_with(|tree, children| {
            let Some((first, rest)) = children.split_first() else {
                return Err(TreeError::DegenerateTopology("cannot resolve an empty group"));
            };
            let Some((last, middle)) = rest.split_last() else {
                return Err(TreeError::DegenerateTopology("cannot resolve a single child"));
            };
            let mut right = *last;
            for left in middle.iter().rev() {
                right = tree.add_inner(*left, right, None, 0.0)?;
            }
            Ok((*first, right))
        })
    }

    /// Converts a strictly bifurcating tree to a [`RootedTree`]
    pub fn to_rooted(&self) -> Result<RootedTree, TreeError> {
        let mut tree = RootedTree::new();
        let root = fold(self, self.root()?, |id, children: Vec<NodeId>| {
            let node = self.get(&id)?;
            match children.as_slice() {
                [] => Ok(tree.add(RootedNode::new_tip(node.name.clone(), node.branch_length))),
                [left, right] => {
                    tree.add_inner(*left, *right, node.name.clone(), node.branch_length)
                }
                _ => Err(TreeError::IsNotBinary),
            }
        })?;
        tree.set_root(root);
        Ok(tree)
    }

    /// Builds the half-edges of the subtree rooted at `id` and returns the
    /// half-edge facing its parent.
    fn to_unrooted_impl(&self, id: NodeId, tree: &mut UnrootedTree) -> Result<NodeId, TreeError> {
        fold(self, id, |id, children: Vec<NodeId>| {
            let node = self.get(&id)?;
            match (children.as_slice(), node.children.as_slice()) {
                ([], _) => Ok(tree.add_tip(node.name.as_deref().unwrap_or_default())),
                ([left, right], [left_child, right_child]) => {
                    let up = tree.add_inner();
                    tree.get_mut(&up)?.name = node.name.clone();
                    let [_, second, third] = tree.vertex(&up)?;
                    tree.link(&second, left, self.get(left_child)?.branch_length)?;
                    tree.link(&third, right, self.get(right_child)?.branch_length)?;
                    Ok(up)
                }
                _ => Err(TreeError::IsNotBinary),
            }
        })
    }

    /// Converts a tree whose root has three children and every other inner
    /// node two children to an [`UnrootedTree`].
    pub fn to_unrooted(&self) -> Result<UnrootedTree, TreeError> {
        let root = self.get(&self.root()?)?;
        if root.children.len() != 3 {
            return Err(TreeError::IsNotBinary);
        }

        let mut tree = UnrootedTree::new();
        let entry = tree.add_inner();
        let vertex = tree.vertex(&entry)?;
        for (half_edge, child) in vertex.iter().zip(root.children.iter()) {
            let length = self.get(child)?.branch_length;
            let below = self.to_unrooted_impl(*child, &mut tree)?;
            tree.link(half_edge, &below, length)?;
        }
        tree.set_entry(entry)?;

        Ok(tree)
    }
}

/// Methods to write and display [`NaryTree`] objects.
impl NaryTree {
    fn to_newick_impl(&self, root: &NodeId, format: NewickFormat) -> Result<String, TreeError> {
        write_subtree(self, *root, |id| {
            let node = self.get(&id)?;
            Ok(format_node(node.name.as_deref(), node.branch_length, node.is_tip(), format))
        })
    }

    /// Writes the tree as a newick formatted string
    pub fn to_newick(&self) -> Result<String, TreeError> {
        self.to_formatted_newick(NewickFormat::AllFields)
    }

    /// Writes the tree as a newick formatted string with a specified
    /// output format from [`NewickFormat`].
    pub fn to_formatted_newick(&self, format: NewickFormat) -> Result<String, TreeError> {
        Ok(self.to_newick_impl(&self.root()?, format)? + ";")
    }

    /// Render the tree as an ASCII drawing
    pub fn to_ascii(&self) -> Result<String, TreeError> {
        let root = self.get(&self.root()?)?;
        draw::render(&draw::build(self, format!("{root}"), &root.children)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick::parse;
    use crate::tree::canonical::topologically_equal;
    use rand::{rngs::StdRng, SeedableRng};

    fn names(tree: &RootedTree) -> String {
        tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap()
    }

    #[test]
    fn strict_rooted() {
        let tree = parse("((A:1,B:2)E:3,C:4)R;").unwrap().to_rooted().unwrap();
        assert_eq!(tree.to_newick().unwrap(), "((A:1,B:2)E:3,C:4)R:0;");
        assert_eq!(tree.n_leaves(), 3);

        assert!(matches!(
            parse("(A,B,C);").unwrap().to_rooted(),
            Err(TreeError::IsNotBinary)
        ));
    }

    #[test]
    fn strict_unrooted() {
        let tree = parse("((A:1,B:2):3,C:4,D:5);").unwrap().to_unrooted().unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.n_leaves(), 4);

        assert!(matches!(
            parse("((A,B),C);").unwrap().to_unrooted(),
            Err(TreeError::IsNotBinary)
        ));
        assert!(matches!(
            parse("((A,B,E),C,D);").unwrap().to_unrooted(),
            Err(TreeError::IsNotBinary)
        ));
    }

    #[test]
    fn ladder() {
        let tree = parse("((A,B,C)X:1,D,E);").unwrap().resolve_ladder().unwrap();
        assert_eq!(names(&tree), "((A,(B,C))X,(D,E));");
        assert_eq!(tree.n_leaves(), 5);
    }

    #[test]
    fn ladder_collapses_chains() {
        let tree = parse("(((A:1)B:2)C:3,D:1)R;").unwrap().resolve_ladder().unwrap();
        assert_eq!(tree.to_newick().unwrap(), "(A:6,D:1)R:0;");

        // The root chain is collapsed as well
        let tree = parse("((A,B)X:2)Y:1;").unwrap().resolve_ladder().unwrap();
        assert_eq!(tree.to_newick().unwrap(), "(A:0,B:0)X:3;");
    }

    #[test]
    fn ladder_on_a_chain_fails() {
        assert!(matches!(
            parse("((A));").unwrap().resolve_ladder(),
            Err(TreeError::DegenerateTopology(_))
        ));
    }

    #[test]
    fn random_on_a_chain_gives_a_tip() {
        let mut rng = StdRng::seed_from_u64(1);
        let tree = parse("((A:1):1):1;")
            .unwrap()
            .resolve(ResolveMode::Random, &mut rng)
            .unwrap();
        assert_eq!(tree.to_newick().unwrap(), "A:3;");
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn random_resolution_is_binary() {
        let tree = parse("((A,B,C,D)X:1,(E,F,G),H,I);").unwrap();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let resolved = tree.resolve(ResolveMode::Random, &mut rng).unwrap();
            assert_eq!(resolved.n_leaves(), 9);
            assert_eq!(resolved.size(), 17);

            let mut tips = resolved.tip_names().unwrap();
            tips.sort();
            assert_eq!(tips, vec!["A", "B", "C", "D", "E", "F", "G", "H", "I"]);

            // Every tip keeps its leaf count, every inner node sums its children
            for id in resolved.postorder(&resolved.root().unwrap()).unwrap() {
                let node = resolved.get(&id).unwrap();
                let expected = match node.children() {
                    None => 1,
                    Some((l, r)) => {
                        resolved.get(&l).unwrap().leaf_count()
                            + resolved.get(&r).unwrap().leaf_count()
                    }
                };
                assert_eq!(node.leaf_count(), expected);
            }
        }
    }

    #[test]
    fn random_resolution_is_deterministic_with_a_seed() {
        let tree = parse("(A,B,C,D,E,F,G,H);").unwrap();
        let first = tree
            .resolve(ResolveMode::Random, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let second = tree
            .resolve(ResolveMode::Random, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert!(topologically_equal(&first, &second).unwrap());
    }

    #[test]
    fn binary_input_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(3);
        let newick = "((A:1,B:2)E:3,(C:1,D:1)F:1)R:0;";
        let tree = parse(newick).unwrap();
        assert_eq!(
            tree.resolve(ResolveMode::Random, &mut rng).unwrap().to_newick().unwrap(),
            newick
        );
        assert_eq!(tree.resolve_ladder().unwrap().to_newick().unwrap(), newick);
    }

    #[test]
    fn writing() {
        let tree = parse("(A:1,B:2,(C:3,D:4)E:5)F;").unwrap();
        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:2,(C:3,D:4)E:5)F:0;");
        assert!(tree.to_ascii().unwrap().contains("\"E\""));
    }
}
