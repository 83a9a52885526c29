use std::collections::VecDeque;
use std::fmt::{Debug, Display};

use fixedbitset::FixedBitSet;

use crate::errors::TreeError;
use crate::newick::{format_node, write_subtree, NewickFormat};

use super::draw;
use super::traversal::{traverse_into, TraversalOrder, Topology};
use super::{EdgeLength, NodeId};

/// One end of an edge of an unrooted tree.
///
/// A tip is a single half-edge without `next`. An inner vertex is a cycle of
/// three half-edges linked through `next`. Two half-edges linked through
/// `back` form an edge and both store its length.
#[derive(Clone)]
pub struct HalfEdge {
    /// Index of the half-edge
    pub id: NodeId,
    /// Name of the tip, or of the inner node for the half-edge facing the
    /// node's parent in the parsed tree
    pub name: Option<String>,
    /// Length of the edge
    pub branch_length: EdgeLength,
    pub(crate) back: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) deleted: bool,
}

impl HalfEdge {
    fn new(name: Option<String>) -> Self {
        Self {
            id: 0,
            name,
            branch_length: 0.0,
            back: None,
            next: None,
            deleted: false,
        }
    }

    /// Check if the half-edge is a tip
    pub fn is_tip(&self) -> bool {
        self.next.is_none()
    }

    /// The half-edge on the other end of the edge
    pub fn back(&self) -> Option<NodeId> {
        self.back
    }

    /// The next half-edge of the same vertex
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

impl Display for HalfEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}) {:?}", self.branch_length, self.name)
    }
}

impl Debug for HalfEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}) {:?} Id[{}] Back[{:?}] Next[{:?}]",
            self.branch_length, self.name, self.id, self.back, self.next,
        )
    }
}

/// A bifurcating unrooted phylogenetic tree made of half-edges.
///
/// The tree keeps an entry half-edge, always on an inner vertex, from which
/// it is walked and written.
/// ```
/// use phylotopo::tree::Tree;
///
/// let tree = Tree::from_newick("(A:1,B:2,(C:1,D:1):0.5);").unwrap().into_unrooted().unwrap();
///
/// assert_eq!(tree.n_leaves(), 4);
/// assert_eq!(tree.to_newick().unwrap(), "(A:1,B:2,(C:1,D:1):0.5);");
/// assert!(tree.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnrootedTree {
    edges: Vec<HalfEdge>,
    entry: Option<NodeId>,
}

/// Base methods to create, link and get [`HalfEdge`] objects of the [`UnrootedTree`].
impl UnrootedTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            entry: None,
        }
    }

    // #################################
    // # ADDING AND LINKING HALF-EDGES #
    // #################################

    fn add(&mut self, edge: HalfEdge) -> NodeId {
        let idx = self.edges.len();
        let mut edge = edge;
        edge.id = idx;
        self.edges.push(edge);
        idx
    }

    /// Adds an unlinked tip
    pub fn add_tip(&mut self, name: &str) -> NodeId {
        self.add(HalfEdge::new(Some(name.to_owned())))
    }

    /// Adds an unlinked inner vertex and returns one of its three half-edges
    pub fn add_inner(&mut self) -> NodeId {
        let first = self.add(HalfEdge::new(None));
        let second = self.add(HalfEdge::new(None));
        let third = self.add(HalfEdge::new(None));
        self.edges[first].next = Some(second);
        self.edges[second].next = Some(third);
        self.edges[third].next = Some(first);
        first
    }

    /// Get a reference to a specific half-edge of the tree
    pub fn get(&self, id: &NodeId) -> Result<&HalfEdge, TreeError> {
        match self.edges.get(*id) {
            Some(edge) if !edge.deleted => Ok(edge),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a mutable reference to a specific half-edge of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut HalfEdge, TreeError> {
        match self.edges.get_mut(*id) {
            Some(edge) if !edge.deleted => Ok(edge),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a tip of the tree by name
    pub fn get_by_name(&self, name: &str) -> Option<&HalfEdge> {
        self.edges
            .iter()
            .find(|edge| !edge.deleted && edge.is_tip() && edge.name.as_deref() == Some(name))
    }

    /// Joins two half-edges into an edge of the given length
    pub fn link(&mut self, a: &NodeId, b: &NodeId, length: EdgeLength) -> Result<(), TreeError> {
        self.get(b)?;
        let first = self.get_mut(a)?;
        first.back = Some(*b);
        first.branch_length = length;
        let second = self.get_mut(b)?;
        second.back = Some(*a);
        second.branch_length = length;
        Ok(())
    }

    /// Detaches a half-edge from the other end of its edge
    pub(crate) fn unlink(&mut self, id: &NodeId) -> Result<(), TreeError> {
        if let Some(back) = self.get_mut(id)?.back.take() {
            self.get_mut(&back)?.back = None;
        }
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: &NodeId) -> Result<(), TreeError> {
        let edge = self.get_mut(id)?;
        edge.deleted = true;
        edge.back = None;
        edge.next = None;
        Ok(())
    }

    /// The half-edge on the other end of the edge
    pub fn back(&self, id: &NodeId) -> Result<NodeId, TreeError> {
        self.get(id)?.back.ok_or(TreeError::UnlinkedHalfEdge(*id))
    }

    /// The next half-edge of the same inner vertex
    pub fn next(&self, id: &NodeId) -> Result<NodeId, TreeError> {
        self.get(id)?.next.ok_or(TreeError::MalformedVertex(*id))
    }

    /// The three half-edges of the inner vertex holding `id`, starting with `id`
    pub fn vertex(&self, id: &NodeId) -> Result<[NodeId; 3], TreeError> {
        let second = self.next(id)?;
        let third = self.next(&second)?;
        if self.next(&third)? != *id {
            return Err(TreeError::MalformedVertex(*id));
        }
        Ok([*id, second, third])
    }

    /// Half-edges of the vertex holding `id`: one for a tip, three otherwise
    pub(crate) fn vertex_half_edges(&self, id: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        if self.get(id)?.is_tip() {
            Ok(vec![*id])
        } else {
            Ok(self.vertex(id)?.to_vec())
        }
    }

    /// Sets the half-edge the tree is walked and written from
    pub fn set_entry(&mut self, id: NodeId) -> Result<(), TreeError> {
        if self.get(&id)?.is_tip() {
            return Err(TreeError::DegenerateTopology(
                "the entry half-edge must be on an inner vertex",
            ));
        }
        self.entry = Some(id);
        Ok(())
    }

    /// Gets the entry half-edge
    pub fn entry(&self) -> Result<NodeId, TreeError> {
        self.entry.ok_or(TreeError::DegenerateTopology("the tree is empty"))
    }

    /// Number of tips in the tree
    pub fn n_leaves(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| !edge.deleted && edge.is_tip())
            .count()
    }

    /// Length of the arena, deleted half-edges included
    pub(crate) fn edges_len(&self) -> usize {
        self.edges.len()
    }

    /// Number of half-edges in the tree
    pub fn size(&self) -> usize {
        self.edges.iter().filter(|edge| !edge.deleted).count()
    }

    /// Lengths of the edges of the tree, each edge counted once
    pub fn branch_lengths(&self) -> Result<Vec<EdgeLength>, TreeError> {
        let mut lengths = vec![];
        for edge in self.edges.iter().filter(|edge| !edge.deleted) {
            if edge.id < self.back(&edge.id)? {
                lengths.push(edge.branch_length);
            }
        }
        Ok(lengths)
    }

    /// Checks the structure of the tree: symmetric back links, inner
    /// vertices made of three half-edges, `3(T-2)` inner half-edges for `T`
    /// tips, an inner entry half-edge and every vertex reachable from it.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut n_tips = 0;
        let mut n_inner = 0;

        for edge in self.edges.iter().filter(|edge| !edge.deleted) {
            let back = self.get(&self.back(&edge.id)?)?;
            if back.back != Some(edge.id) || back.branch_length != edge.branch_length {
                return Err(TreeError::UnlinkedHalfEdge(edge.id));
            }
            if edge.is_tip() {
                n_tips += 1;
            } else {
                let vertex = self.vertex(&edge.id)?;
                if vertex[1] == edge.id || vertex[2] == edge.id {
                    return Err(TreeError::MalformedVertex(edge.id));
                }
                n_inner += 1;
            }
        }

        if n_tips < 3 {
            return Err(TreeError::TooFewTaxaRemaining {
                remaining: n_tips,
                minimum: 3,
            });
        }
        if n_inner != 3 * (n_tips - 2) {
            return Err(TreeError::DegenerateTopology(
                "the number of inner vertices does not match the number of tips",
            ));
        }

        let entry = self.entry()?;
        if self.get(&entry)?.is_tip() {
            return Err(TreeError::DegenerateTopology(
                "the entry half-edge must be on an inner vertex",
            ));
        }

        // Breadth-first walk over vertices, the tree is connected iff it
        // reaches the 2T-2 vertices.
        let mut seen = FixedBitSet::with_capacity(self.edges.len());
        let mut queue = VecDeque::from([entry]);
        let mut n_vertices = 0;
        for id in self.vertex_half_edges(&entry)? {
            seen.insert(id);
        }
        while let Some(current) = queue.pop_front() {
            n_vertices += 1;
            for id in self.vertex_half_edges(&current)? {
                let back = self.back(&id)?;
                if !seen.contains(back) {
                    for other in self.vertex_half_edges(&back)? {
                        seen.insert(other);
                    }
                    queue.push_back(back);
                }
            }
        }
        if n_vertices != 2 * n_tips - 2 {
            return Err(TreeError::DegenerateTopology("the tree is not connected"));
        }

        Ok(())
    }
}

/// Methods to traverse the [`UnrootedTree`] and measure distances in it
impl UnrootedTree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Walks the whole tree from the edge of `root`: first the subtree behind
    /// `back(root)`, then the subtree rooted at `root`. A tip `root` is
    /// replaced by its back half-edge.
    pub fn traverse<F>(
        &self,
        root: &NodeId,
        order: TraversalOrder,
        mut include: F,
    ) -> Result<Vec<NodeId>, TreeError>
    where
        F: FnMut(&HalfEdge) -> bool,
    {
        let root = if self.get(root)?.is_tip() {
            self.back(root)?
        } else {
            *root
        };

        let mut visited = vec![];
        traverse_into(self, self.back(&root)?, order, &mut include, &mut visited)?;
        traverse_into(self, root, order, &mut include, &mut visited)?;
        Ok(visited)
    }

    /// Returns a vector containing half-edge ids in pre-order, one per vertex
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(root, TraversalOrder::Preorder, |_| true)
    }

    /// Returns a vector containing half-edge ids in post-order, one per vertex
    pub fn postorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(root, TraversalOrder::Postorder, |_| true)
    }

    /// Tips of the tree, walking from the entry half-edge
    pub fn tips(&self) -> Result<Vec<NodeId>, TreeError> {
        let mut tips = vec![];
        for id in self.preorder(&self.entry()?)? {
            if self.get(&id)?.is_tip() {
                tips.push(id);
            }
        }
        Ok(tips)
    }

    /// Inner vertices of the tree in post-order, one half-edge per vertex
    pub fn inner_nodes(&self) -> Result<Vec<NodeId>, TreeError> {
        self.traverse(&self.entry()?, TraversalOrder::Postorder, |edge| {
            !edge.is_tip()
        })
    }

    /// Names of the tips of the tree
    pub fn tip_names(&self) -> Result<Vec<String>, TreeError> {
        self.tips()?
            .iter()
            .map(|id| Ok(self.get(id)?.name.clone().unwrap_or_default()))
            .collect()
    }

    /// Sum of the edge lengths on the path between the vertices of two
    /// half-edges
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A:1,B:2,(C:1,D:1):0.5);").unwrap().into_unrooted().unwrap();
    /// let a = tree.get_by_name("A").unwrap().id;
    /// let d = tree.get_by_name("D").unwrap().id;
    ///
    /// assert_eq!(tree.path_length(&a, &d).unwrap(), 2.5);
    /// ```
    pub fn path_length(&self, a: &NodeId, b: &NodeId) -> Result<EdgeLength, TreeError> {
        let start = self.vertex_half_edges(a)?;
        if start.contains(b) {
            return Ok(0.0);
        }

        // Half-edges through which a vertex is entered, with the length walked so far
        let mut stack = vec![];
        for out in start {
            stack.push((self.back(&out)?, self.get(&out)?.branch_length));
        }
        while let Some((from, length)) = stack.pop() {
            let vertex = self.vertex_half_edges(&from)?;
            if vertex.contains(b) {
                return Ok(length);
            }
            for out in vertex.into_iter().filter(|id| *id != from) {
                stack.push((self.back(&out)?, length + self.get(&out)?.branch_length));
            }
        }

        Err(TreeError::DegenerateTopology("the two half-edges are not connected"))
    }
}

impl Topology for UnrootedTree {
    type Node = HalfEdge;

    fn node(&self, id: NodeId) -> Result<&Self::Node, TreeError> {
        self.get(&id)
    }

    fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if self.get(&id)?.is_tip() {
            return Ok(vec![]);
        }
        let [_, second, third] = self.vertex(&id)?;
        Ok(vec![self.back(&second)?, self.back(&third)?])
    }
}

/// Methods to write and display [`UnrootedTree`] objects.
impl UnrootedTree {
    // ##########################
    // # WRITE AND DISPLAY TREE #
    // ##########################

    fn to_newick_impl(&self, root: &NodeId, format: NewickFormat) -> Result<String, TreeError> {
        write_subtree(self, *root, |id| {
            let edge = self.get(&id)?;
            Ok(format_node(edge.name.as_deref(), edge.branch_length, edge.is_tip(), format))
        })
    }

    /// The three subtrees around the entry vertex
    fn entry_subtrees(&self) -> Result<Vec<NodeId>, TreeError> {
        self.vertex(&self.entry()?)?
            .iter()
            .map(|id| self.back(id))
            .collect()
    }

    /// Writes the tree as a newick formatted string
    pub fn to_newick(&self) -> Result<String, TreeError> {
        self.to_formatted_newick(NewickFormat::AllFields)
    }

    /// Writes the tree as a newick string, with a trifurcation at the entry
    /// vertex
    pub fn to_formatted_newick(&self, format: NewickFormat) -> Result<String, TreeError> {
        let subtrees = self
            .entry_subtrees()?
            .iter()
            .map(|id| self.to_newick_impl(id, format))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({});", subtrees.join(",")))
    }

    /// Print the tree to the console
    pub fn print(&self) -> Result<(), TreeError> {
        draw::print(&draw::build(self, "*".into(), &self.entry_subtrees()?)?)
    }

    /// Render the tree as an ASCII drawing
    pub fn to_ascii(&self) -> Result<String, TreeError> {
        draw::render(&draw::build(self, "*".into(), &self.entry_subtrees()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn unrooted(newick: &str) -> UnrootedTree {
        Tree::from_newick(newick).unwrap().into_unrooted().unwrap()
    }

    fn star() -> UnrootedTree {
        let mut tree = UnrootedTree::new();
        let center = tree.add_inner();
        let vertex = tree.vertex(&center).unwrap();
        for (name, half_edge) in ["A", "B", "C"].iter().zip(vertex) {
            let tip = tree.add_tip(name);
            tree.link(&half_edge, &tip, 1.0).unwrap();
        }
        tree.set_entry(center).unwrap();
        tree
    }

    #[test]
    fn build_star() {
        let tree = star();
        tree.validate().unwrap();
        assert_eq!(tree.n_leaves(), 3);
        assert_eq!(tree.size(), 6);
        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1,C:1);");
        assert_eq!(tree.branch_lengths().unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn links_are_symmetric() {
        let tree = unrooted("((A:1,B:2):3,C:4,(D:5,E:6):7);");
        for edge in tree.edges.iter() {
            let back = tree.back(&edge.id).unwrap();
            assert_eq!(tree.back(&back).unwrap(), edge.id);
            assert_eq!(tree.get(&back).unwrap().branch_length, edge.branch_length);
        }
        assert_eq!(tree.size(), 5 + 3 * 3);
    }

    #[test]
    fn validation_errors() {
        let mut tree = star();
        let tip = tree.get_by_name("A").unwrap().id;
        tree.unlink(&tip).unwrap();
        assert!(matches!(tree.validate(), Err(TreeError::UnlinkedHalfEdge(_))));

        let mut tree = star();
        let entry = tree.entry().unwrap();
        tree.edges[entry].next = Some(entry);
        assert!(matches!(tree.validate(), Err(TreeError::MalformedVertex(_))));

        let mut tree = UnrootedTree::new();
        let a = tree.add_tip("A");
        let b = tree.add_tip("B");
        tree.link(&a, &b, 1.0).unwrap();
        assert!(matches!(
            tree.validate(),
            Err(TreeError::TooFewTaxaRemaining { remaining: 2, minimum: 3 })
        ));
    }

    #[test]
    fn disconnected_trees_are_invalid() {
        // Two separate stars: 6 tips but only 2 inner vertices
        let mut tree = star();
        let other = star();
        let offset = tree.edges.len();
        for edge in other.edges.iter() {
            let mut copy = edge.clone();
            copy.back = copy.back.map(|id| id + offset);
            copy.next = copy.next.map(|id| id + offset);
            tree.add(copy);
        }
        assert!(matches!(
            tree.validate(),
            Err(TreeError::DegenerateTopology(_))
        ));
    }

    #[test]
    fn traversal_from_a_tip() {
        let tree = unrooted("(A,B,(C,D));");
        let a = tree.get_by_name("A").unwrap().id;
        let from_tip = tree.preorder(&a).unwrap();
        let from_inner = tree.preorder(&tree.back(&a).unwrap()).unwrap();
        assert_eq!(from_tip, from_inner);
        // One half-edge per vertex
        assert_eq!(from_tip.len(), 6);
        assert_eq!(tree.inner_nodes().unwrap().len(), 2);
    }

    #[test]
    fn tip_query_order() {
        let tree = unrooted("(A,B,(C,D));");
        assert_eq!(tree.tip_names().unwrap(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn path_lengths() {
        let tree = unrooted("((A:1,B:2):3,C:4,(D:5,E:6):7);");
        let id = |name| tree.get_by_name(name).unwrap().id;

        assert_eq!(tree.path_length(&id("A"), &id("B")).unwrap(), 3.0);
        assert_eq!(tree.path_length(&id("A"), &id("C")).unwrap(), 8.0);
        assert_eq!(tree.path_length(&id("A"), &id("E")).unwrap(), 17.0);
        assert_eq!(tree.path_length(&id("E"), &id("A")).unwrap(), 17.0);
        assert_eq!(tree.path_length(&id("D"), &id("D")).unwrap(), 0.0);
    }

    #[test]
    fn names_survive_writing() {
        let newick = "((A:1,B:2)X:3,C:4,(D:5,E:6)Y:7);";
        let tree = unrooted(newick);
        assert_eq!(tree.to_newick().unwrap(), newick);
        assert!(tree.to_ascii().unwrap().contains("\"Y\""));
    }
}
