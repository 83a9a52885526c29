use std::fmt::{Debug, Display};
use std::iter::zip;

use crate::errors::TreeError;
use crate::newick::{format_node, write_subtree, NewickFormat};

use super::draw;
use super::traversal::{traverse, TraversalOrder, Topology};
use super::{EdgeLength, NodeId, Side};

#[derive(Clone)]
/// A node of a strictly bifurcating rooted tree
pub struct RootedNode {
    /// Index of the node
    pub id: NodeId,
    /// Name of the node
    pub name: Option<String>,
    /// Length of the branch between the node and its parent
    pub branch_length: EdgeLength,
    /// Index of the parent node
    pub parent: Option<NodeId>,
    /// Left and right children, both present or both absent
    pub(crate) children: Option<(NodeId, NodeId)>,
    /// Number of tips below this node (1 for a tip)
    pub(crate) leaves: usize,
    /// Whether the node was removed from the tree
    pub(crate) deleted: bool,
}

impl RootedNode {
    /// Creates a new detached tip
    pub fn new_tip(name: Option<String>, branch_length: EdgeLength) -> Self {
        Self {
            id: 0,
            name,
            branch_length,
            parent: None,
            children: None,
            leaves: 1,
            deleted: false,
        }
    }

    /// Check if the node is a tip node
    pub fn is_tip(&self) -> bool {
        self.children.is_none()
    }

    /// Check if the node is a root node
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Left and right children of the node
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        self.children
    }

    /// The child on a given side
    pub fn child(&self, side: Side) -> Option<NodeId> {
        self.children.map(|(left, right)| match side {
            Side::Left => left,
            Side::Right => right,
        })
    }

    /// Number of tips in the subtree rooted at this node
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    /// The node name as a string slice
    pub fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns String with node in newick format
    pub fn to_newick(&self, format: NewickFormat) -> String {
        format_node(self.label(), self.branch_length, self.is_tip(), format)
    }
}

impl Display for RootedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}) {:?}", self.branch_length, self.name)
    }
}

impl Debug for RootedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}) {:?} Id[{}] Parent[{:?}] Leaves[{}] Children({:?})",
            self.branch_length, self.name, self.id, self.parent, self.leaves, self.children,
        )
    }
}

/// A strictly bifurcating rooted phylogenetic tree.
///
/// Nodes live in an arena and reference each other by [`NodeId`]. Trees are
/// built bottom-up: tips first, then inner nodes joining two existing
/// subtrees. The last node added is the root of the tree.
/// ```
/// use phylotopo::tree::RootedTree;
///
/// let mut tree = RootedTree::new();
/// let a = tree.add_tip("A", 0.1);
/// let b = tree.add_tip("B", 0.2);
/// let root = tree.add_inner(a, b, None, 0.0).unwrap();
///
/// assert_eq!(tree.root().unwrap(), root);
/// assert_eq!(tree.n_leaves(), 2);
/// assert_eq!(tree.to_newick().unwrap(), "(A:0.1,B:0.2):0;");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RootedTree {
    nodes: Vec<RootedNode>,
    root: Option<NodeId>,
}

/// Base methods to add and get [`RootedNode`] objects to and from the [`RootedTree`].
impl RootedTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    // ############################
    // # ADDING AND GETTING NODES #
    // ############################

    /// Adds a node to the arena, it becomes the root of the tree.
    pub(crate) fn add(&mut self, node: RootedNode) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        self.nodes.push(node);
        self.root = Some(idx);

        idx
    }

    /// Adds a detached tip to the tree.
    pub fn add_tip(&mut self, name: &str, branch_length: EdgeLength) -> NodeId {
        self.add(RootedNode::new_tip(Some(name.to_owned()), branch_length))
    }

    /// Adds an inner node joining two detached subtrees.
    pub fn add_inner(
        &mut self,
        left: NodeId,
        right: NodeId,
        name: Option<String>,
        branch_length: EdgeLength,
    ) -> Result<NodeId, TreeError> {
        for child in [left, right] {
            if self.get(&child)?.parent.is_some() {
                return Err(TreeError::DegenerateTopology(
                    "a node can only be joined to one parent",
                ));
            }
        }
        if left == right {
            return Err(TreeError::DegenerateTopology(
                "an inner node needs two distinct children",
            ));
        }

        let leaves = self.get(&left)?.leaves + self.get(&right)?.leaves;
        let id = self.add(RootedNode {
            id: 0,
            name,
            branch_length,
            parent: None,
            children: Some((left, right)),
            leaves,
            deleted: false,
        });
        self.get_mut(&left)?.parent = Some(id);
        self.get_mut(&right)?.parent = Some(id);

        Ok(id)
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&RootedNode, TreeError> {
        match self.nodes.get(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut RootedNode, TreeError> {
        match self.nodes.get_mut(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a reference to a tip of the tree by name.
    pub fn get_by_name(&self, name: &str) -> Option<&RootedNode> {
        self.nodes
            .iter()
            .find(|node| !node.deleted && node.is_tip() && node.label() == Some(name))
    }

    /// Gets the root node.
    pub fn root(&self) -> Result<NodeId, TreeError> {
        self.root.ok_or(TreeError::DegenerateTopology("the tree is empty"))
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub(crate) fn delete(&mut self, id: &NodeId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        node.deleted = true;
        node.parent = None;
        node.children = None;
        Ok(())
    }

    /// Number of tips of the tree, read from the leaf count of the root
    pub fn n_leaves(&self) -> usize {
        self.root
            .and_then(|root| self.get(&root).ok())
            .map(|root| root.leaves)
            .unwrap_or(0)
    }

    /// Length of the arena, deleted nodes included
    pub(crate) fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.iter().filter(|node| !node.deleted).count()
    }

    /// Tip ids of the tree, from left to right
    pub fn tips(&self) -> Result<Vec<NodeId>, TreeError> {
        self.subtree_tips(self.root()?)
    }

    /// Names of the tips of the tree, from left to right
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),(C,D));").unwrap().into_rooted().unwrap();
    /// assert_eq!(tree.tip_names().unwrap(), vec!["A", "B", "C", "D"]);
    /// ```
    pub fn tip_names(&self) -> Result<Vec<String>, TreeError> {
        self.tips()?
            .iter()
            .map(|id| Ok(self.get(id)?.name.clone().unwrap_or_default()))
            .collect()
    }

    /// Inner nodes of the tree in post-order
    pub fn inner_nodes(&self) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(&self.root()?, TraversalOrder::Postorder, |node| {
            !node.is_tip()
        })
    }

    /// Swap the left and right children of an inner node
    pub fn swap_children(&mut self, id: &NodeId) -> Result<(), TreeError> {
        let node = self.get_mut(id)?;
        node.children = node.children.map(|(left, right)| (right, left));
        Ok(())
    }

    /// Lengths of all branches of the tree, the root branch excluded
    pub fn branch_lengths(&self) -> Result<Vec<EdgeLength>, TreeError> {
        let root = self.root()?;
        self.preorder(&root)?
            .into_iter()
            .filter(|id| *id != root)
            .map(|id| Ok(self.get(&id)?.branch_length))
            .collect()
    }
}

/// Methods to traverse the [`RootedTree`]
impl RootedTree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Walks the subtree rooted at `root`, see [`traverse`]
    pub fn traverse<F>(
        &self,
        root: &NodeId,
        order: TraversalOrder,
        include: F,
    ) -> Result<Vec<NodeId>, TreeError>
    where
        F: FnMut(&RootedNode) -> bool,
    {
        traverse(self, *root, order, include)
    }

    /// Returns a vector containing node ids in pre-order
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B)E,(C,D)F)G;").unwrap().into_rooted().unwrap();
    /// let preorder: Vec<_> = tree.preorder(&tree.root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .flat_map(|id| tree.get(id).unwrap().name.clone())
    ///     .collect();
    ///
    /// assert_eq!(preorder, vec!["G", "E", "A", "B", "F", "C", "D"])
    /// ```
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(root, TraversalOrder::Preorder, |_| true)
    }

    /// Returns a vector containing node ids in post-order
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B)E,(C,D)F)G;").unwrap().into_rooted().unwrap();
    /// let postorder: Vec<_> = tree.postorder(&tree.root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .flat_map(|id| tree.get(id).unwrap().name.clone())
    ///     .collect();
    ///
    /// assert_eq!(postorder, vec!["A", "B", "E", "C", "D", "F", "G"])
    /// ```
    pub fn postorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(root, TraversalOrder::Postorder, |_| true)
    }

    /// Recompute the cached leaf counts bottom-up
    pub fn reset_leaves(&mut self) -> Result<(), TreeError> {
        let root = self.root()?;
        for id in self.postorder(&root)? {
            let leaves = match self.get(&id)?.children {
                Some((left, right)) => self.get(&left)?.leaves + self.get(&right)?.leaves,
                None => 1,
            };
            self.get_mut(&id)?.leaves = leaves;
        }

        Ok(())
    }
}

impl Topology for RootedTree {
    type Node = RootedNode;

    fn node(&self, id: NodeId) -> Result<&Self::Node, TreeError> {
        self.get(&id)
    }

    fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self
            .get(&id)?
            .children
            .map(|(left, right)| vec![left, right])
            .unwrap_or_default())
    }
}

/// Methods to find paths in a [`RootedTree`] and measure distances between nodes.
impl RootedTree {
    // ##########################
    // # FIND PATHS IN THE TREE #
    // ##########################

    /// Returns the path from the root to the node, both included
    pub fn get_path_from_root(&self, node: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut path = vec![];
        let mut current_node = *node;
        loop {
            path.push(current_node);
            match self.get(&current_node)?.parent {
                Some(parent) => current_node = parent,
                None => break,
            }
        }

        Ok(path.into_iter().rev().collect())
    }

    /// Index where the two root paths diverge
    fn divergence(source: &[NodeId], target: &[NodeId]) -> usize {
        zip(source.iter(), target.iter())
            .position(|(s, t)| s != t)
            .unwrap_or_else(|| {
                // One node is an ancestor of the other
                source.len().min(target.len())
            })
    }

    /// Gets the most recent common ancestor between two tree nodes
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B)E,(C,D)F)G;").unwrap().into_rooted().unwrap();
    /// let ancestor = tree.get_common_ancestor(
    ///     &tree.get_by_name("A").unwrap().id,
    ///     &tree.get_by_name("B").unwrap().id,
    /// ).unwrap();
    ///
    /// assert_eq!(tree.get(&ancestor).unwrap().name, Some("E".to_owned()))
    /// ```
    pub fn get_common_ancestor(
        &self,
        source: &NodeId,
        target: &NodeId,
    ) -> Result<NodeId, TreeError> {
        if source == target {
            return Ok(*source);
        }
        let root_to_source = self.get_path_from_root(source)?;
        let root_to_target = self.get_path_from_root(target)?;
        let cursor = Self::divergence(&root_to_source, &root_to_target);

        Ok(root_to_source[cursor - 1])
    }

    /// Sum of the branch lengths on the path between two nodes
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A:1,B:2):1,(C:1,D:1):2);").unwrap().into_rooted().unwrap();
    /// let distance = tree.get_distance(
    ///     &tree.get_by_name("A").unwrap().id,
    ///     &tree.get_by_name("D").unwrap().id,
    /// ).unwrap();
    ///
    /// assert_eq!(distance, 5.0);
    /// ```
    pub fn get_distance(&self, source: &NodeId, target: &NodeId) -> Result<EdgeLength, TreeError> {
        if source == target {
            return Ok(0.0);
        }

        let root_to_source = self.get_path_from_root(source)?;
        let root_to_target = self.get_path_from_root(target)?;
        let cursor = Self::divergence(&root_to_source, &root_to_target);

        let mut dist = 0.0;
        for list in [root_to_source, root_to_target] {
            for node in list.iter().skip(cursor) {
                dist += self.get(node)?.branch_length;
            }
        }

        Ok(dist)
    }

    /// Longest distance from the root to one of the tips
    pub fn height(&self) -> Result<EdgeLength, TreeError> {
        let root = self.root()?;
        let mut heights = vec![0.0; self.nodes.len()];
        let mut max: EdgeLength = 0.0;
        for id in self.preorder(&root)? {
            let node = self.get(&id)?;
            if let Some(parent) = node.parent {
                heights[id] = heights[parent] + node.branch_length;
            }
            max = max.max(heights[id]);
        }

        Ok(max)
    }

    /// Copies the subtree rooted at `root` into a new independent tree
    pub fn copy_subtree(&self, root: &NodeId) -> Result<RootedTree, TreeError> {
        let mut copy = RootedTree::new();
        copy.append_subtree(self, root)?;
        Ok(copy)
    }

    /// Copies the subtree of `other` rooted at `root` into this arena as a
    /// detached subtree and returns the id of its root. The root of `self`
    /// is left untouched, unless `self` was empty.
    pub(crate) fn append_subtree(
        &mut self,
        other: &RootedTree,
        root: &NodeId,
    ) -> Result<NodeId, TreeError> {
        let previous_root = self.root;
        let mut mapping = vec![None; other.nodes.len()];

        for id in other.postorder(root)? {
            let node = other.get(&id)?;
            let new_id = match node.children {
                None => self.add(RootedNode::new_tip(node.name.clone(), node.branch_length)),
                Some((left, right)) => {
                    let left = mapping[left].ok_or(TreeError::NodeNotFound(left))?;
                    let right = mapping[right].ok_or(TreeError::NodeNotFound(right))?;
                    self.add_inner(left, right, node.name.clone(), node.branch_length)?
                }
            };
            mapping[id] = Some(new_id);
        }

        let new_root = mapping[*root].ok_or(TreeError::NodeNotFound(*root))?;
        self.root = previous_root.or(Some(new_root));

        Ok(new_root)
    }
}

/// Methods to write and display [`RootedTree`] objects.
impl RootedTree {
    // ##########################
    // # WRITE AND DISPLAY TREE #
    // ##########################

    fn to_newick_impl(&self, root: &NodeId, format: NewickFormat) -> Result<String, TreeError> {
        write_subtree(self, *root, |id| Ok(self.get(&id)?.to_newick(format)))
    }

    /// Writes the tree as a newick formatted string
    pub fn to_newick(&self) -> Result<String, TreeError> {
        self.to_formatted_newick(NewickFormat::AllFields)
    }

    /// Writes the tree as a newick formatted string with a specified
    /// output format from [`NewickFormat`].
    /// ```
    /// use phylotopo::newick::NewickFormat;
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A:1,B:2):1,C:3);").unwrap().into_rooted().unwrap();
    /// assert_eq!(tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(), "((A,B),C);");
    /// assert_eq!(tree.to_formatted_newick(NewickFormat::Topology).unwrap(), "((,),);");
    /// ```
    pub fn to_formatted_newick(&self, format: NewickFormat) -> Result<String, TreeError> {
        Ok(self.to_newick_impl(&self.root()?, format)? + ";")
    }

    fn build_display(&self) -> Result<ptree::item::StringItem, TreeError> {
        let root = self.root()?;
        draw::build(self, format!("{}", self.get(&root)?), &self.child_ids(root)?)
    }

    /// Print the tree to the console
    pub fn print(&self) -> Result<(), TreeError> {
        draw::print(&self.build_display()?)
    }

    /// Render the tree as an ASCII drawing
    pub fn to_ascii(&self) -> Result<String, TreeError> {
        draw::render(&self.build_display()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn rooted(newick: &str) -> RootedTree {
        Tree::from_newick(newick).unwrap().into_rooted().unwrap()
    }

    fn names(tree: &RootedTree, ids: &[NodeId]) -> String {
        ids.iter()
            .map(|id| tree.get(id).unwrap().name.clone().unwrap_or("*".into()))
            .collect()
    }

    #[test]
    fn build_bottom_up() {
        let mut tree = RootedTree::new();
        let a = tree.add_tip("A", 1.0);
        let b = tree.add_tip("B", 2.0);
        let c = tree.add_tip("C", 3.0);
        let ab = tree.add_inner(a, b, None, 0.5).unwrap();
        let root = tree.add_inner(ab, c, Some("R".into()), 0.0).unwrap();

        assert_eq!(tree.root().unwrap(), root);
        assert_eq!(tree.n_leaves(), 3);
        assert_eq!(tree.get(&ab).unwrap().leaf_count(), 2);
        assert_eq!(tree.get(&a).unwrap().parent, Some(ab));
        assert_eq!(tree.to_newick().unwrap(), "((A:1,B:2):0.5,C:3)R:0;");
    }

    #[test]
    fn cannot_join_twice() {
        let mut tree = RootedTree::new();
        let a = tree.add_tip("A", 1.0);
        let b = tree.add_tip("B", 2.0);
        let c = tree.add_tip("C", 3.0);
        tree.add_inner(a, b, None, 0.0).unwrap();

        assert!(matches!(
            tree.add_inner(a, c, None, 0.0),
            Err(TreeError::DegenerateTopology(_))
        ));
        assert!(matches!(
            tree.add_inner(c, c, None, 0.0),
            Err(TreeError::DegenerateTopology(_))
        ));
    }

    #[test]
    fn traversals() {
        let tree = rooted("((3,4)2,(6,7)5)1;");
        let root = tree.root().unwrap();

        assert_eq!(names(&tree, &tree.preorder(&root).unwrap()), "1234567");
        assert_eq!(names(&tree, &tree.postorder(&root).unwrap()), "3426751");
        assert_eq!(names(&tree, &tree.inner_nodes().unwrap()), "251");
        assert_eq!(names(&tree, &tree.tips().unwrap()), "3467");
    }

    #[test]
    fn leaf_counts_are_reset() {
        let mut tree = rooted("((A,B),((C,D),E));");
        for node in tree.nodes.iter_mut() {
            node.leaves = 0;
        }
        tree.reset_leaves().unwrap();

        assert_eq!(tree.n_leaves(), 5);
        for id in tree.postorder(&tree.root().unwrap()).unwrap() {
            let node = tree.get(&id).unwrap();
            assert_eq!(node.leaf_count(), tree.subtree_tips(id).unwrap().len());
        }
    }

    #[test]
    fn distances() {
        let tree = rooted("((A:1,B:2):1,(C:1,D:1):2):0;");
        let a = tree.get_by_name("A").unwrap().id;
        let b = tree.get_by_name("B").unwrap().id;
        let c = tree.get_by_name("C").unwrap().id;

        assert_eq!(tree.get_distance(&a, &b).unwrap(), 3.0);
        assert_eq!(tree.get_distance(&a, &c).unwrap(), 5.0);
        assert_eq!(tree.get_distance(&a, &a).unwrap(), 0.0);
        assert_eq!(tree.height().unwrap(), 3.0);

        let mrca = tree.get_common_ancestor(&a, &c).unwrap();
        assert_eq!(mrca, tree.root().unwrap());
    }

    #[test]
    fn copy_is_independent() {
        let tree = rooted("((A:1,B:2)X:1,(C:1,D:1)Y:2):0;");
        let x = tree.get(&tree.root().unwrap()).unwrap().child(Side::Left).unwrap();
        let copy = tree.copy_subtree(&x).unwrap();

        assert_eq!(copy.to_newick().unwrap(), "(A:1,B:2)X:1;");
        assert_eq!(copy.n_leaves(), 2);
        assert!(copy.get(&copy.root().unwrap()).unwrap().is_root());
    }

    #[test]
    fn swapping_children() {
        let mut tree = rooted("((A,B),C);");
        let root = tree.root().unwrap();
        tree.swap_children(&root).unwrap();
        assert_eq!(
            tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
            "(C,(A,B));"
        );
    }

    #[test]
    fn ascii_drawing() {
        let tree = rooted("((A,B),C);");
        let drawing = tree.to_ascii().unwrap();
        assert!(drawing.contains("\"A\""));
        assert!(drawing.contains("\"C\""));
    }
}
