//! Turn unrooted trees into rooted trees by placing a root on one edge.

use fixedbitset::FixedBitSet;
use itertools::Itertools;

use crate::errors::TreeError;

use super::traversal::{fold, Topology};
use super::{EdgeLength, NodeId, RootedNode, RootedTree, UnrootedTree};

/// How the root edge of an unrooted tree is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerootPolicy {
    /// The tip edge with the longest branch, the first one in tip order on ties
    LongestTipBranch,
    /// The edge of the tip with this name
    NamedTip(String),
    /// The edge separating these tips from all the others
    OutgroupSet(Vec<String>),
}

/// Content of the side of an edge, with respect to a set of marked tips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marks {
    Unmarked,
    FullyMarked,
    Mixed,
}

impl Marks {
    fn combine(self, other: Marks) -> Marks {
        if self == other {
            self
        } else {
            Marks::Mixed
        }
    }
}

impl UnrootedTree {
    /// Builds a rooted tree by placing a root on the edge selected by
    /// `policy`. The new root is unnamed with a zero length branch and the
    /// length of the selected edge is split evenly between its two children.
    /// The side of the selected tip or outgroup is the left child.
    /// ```
    /// use phylotopo::tree::{RerootPolicy, Side, Tree};
    ///
    /// let tree = Tree::from_newick("((A:1,B:1):2,C:1,(D:1,E:4):1);").unwrap().into_unrooted().unwrap();
    /// let rooted = tree.reroot(&RerootPolicy::LongestTipBranch).unwrap();
    ///
    /// let root = rooted.get(&rooted.root().unwrap()).unwrap();
    /// let outgroup = rooted.get(&root.child(Side::Left).unwrap()).unwrap();
    /// assert_eq!(outgroup.name, Some("E".to_owned()));
    /// assert_eq!(outgroup.branch_length, 2.0);
    /// assert_eq!(rooted.n_leaves(), 5);
    /// ```
    pub fn reroot(&self, policy: &RerootPolicy) -> Result<RootedTree, TreeError> {
        let edge = match policy {
            RerootPolicy::LongestTipBranch => self.longest_tip_branch()?,
            RerootPolicy::NamedTip(name) => self.find_tip(name)?,
            RerootPolicy::OutgroupSet(names) => self.outgroup_edge(names)?,
        };

        self.root_on_edge(&edge)
    }

    fn find_tip(&self, name: &str) -> Result<NodeId, TreeError> {
        self.get_by_name(name)
            .map(|edge| edge.id)
            .ok_or_else(|| TreeError::TaxonNotFound(name.to_owned()))
    }

    fn longest_tip_branch(&self) -> Result<NodeId, TreeError> {
        let tips = self.tips()?;
        let mut best = *tips
            .first()
            .ok_or(TreeError::DegenerateTopology("the tree has no tips"))?;
        let mut longest = 0.0;
        for tip in tips {
            let length = self.get(&tip)?.branch_length;
            if length > longest {
                longest = length;
                best = tip;
            }
        }
        Ok(best)
    }

    /// Content of the side of `id`, looking away from `back(id)`. Sides
    /// are classified bottom-up and stored in `memo`.
    fn classify(
        &self,
        id: NodeId,
        marked: &FixedBitSet,
        memo: &mut [Option<Marks>],
    ) -> Result<Marks, TreeError> {
        let mut stack = vec![id];
        while let Some(&top) = stack.last() {
            if memo[top].is_some() {
                stack.pop();
                continue;
            }

            let children = self.child_ids(top)?;
            if children.is_empty() {
                memo[top] = Some(if marked.contains(top) {
                    Marks::FullyMarked
                } else {
                    Marks::Unmarked
                });
                stack.pop();
                continue;
            }

            match (memo[children[0]], memo[children[1]]) {
                (Some(left), Some(right)) => {
                    memo[top] = Some(left.combine(right));
                    stack.pop();
                }
                _ => stack.extend(children),
            }
        }

        memo[id].ok_or(TreeError::NodeNotFound(id))
    }

    /// Finds the half-edge whose side holds exactly the outgroup tips
    fn outgroup_edge(&self, names: &[String]) -> Result<NodeId, TreeError> {
        let names: Vec<_> = names.iter().unique().collect();
        match names.as_slice() {
            [] => return Err(TreeError::EmptyTaxonSet),
            [name] => return self.find_tip(name),
            _ => {}
        }

        let mut marked = FixedBitSet::with_capacity(self.edges_len());
        for name in names {
            marked.insert(self.find_tip(name)?);
        }

        let mut memo = vec![None; self.edges_len()];
        let mut found = None;
        for id in self.preorder(&self.entry()?)? {
            // Every side of a vertex, not only the one facing away from the entry
            for side in self.vertex_half_edges(&id)? {
                let inside = self.classify(side, &marked, &mut memo)?;
                let outside = self.classify(self.back(&side)?, &marked, &mut memo)?;
                if inside == Marks::FullyMarked && outside == Marks::Unmarked {
                    if found.is_some() {
                        return Err(TreeError::AmbiguousOutgroup);
                    }
                    found = Some(side);
                }
            }
        }

        found.ok_or(TreeError::AmbiguousOutgroup)
    }

    /// Copies the side of `id` into a rooted tree, its root getting `length`
    fn copy_side(
        &self,
        id: NodeId,
        tree: &mut RootedTree,
        length: EdgeLength,
    ) -> Result<NodeId, TreeError> {
        let root = fold(self, id, |id, children: Vec<NodeId>| {
            let edge = self.get(&id)?;
            match children.as_slice() {
                [] => Ok(tree.add(RootedNode::new_tip(edge.name.clone(), edge.branch_length))),
                [left, right] => {
                    // The label of a vertex may sit on any of its half-edges
                    let name = self.vertex(&id)?.iter().find_map(|half_edge| {
                        self.get(half_edge).ok().and_then(|e| e.name.clone())
                    });
                    tree.add_inner(*left, *right, name, edge.branch_length)
                }
                _ => Err(TreeError::MalformedVertex(id)),
            }
        })?;
        tree.get_mut(&root)?.branch_length = length;

        Ok(root)
    }

    /// Places a new root in the middle of the edge of `id`
    fn root_on_edge(&self, id: &NodeId) -> Result<RootedTree, TreeError> {
        let back = self.back(id)?;
        let half = self.get(id)?.branch_length / 2.0;

        let mut tree = RootedTree::new();
        let left = self.copy_side(*id, &mut tree, half)?;
        let right = self.copy_side(back, &mut tree, half)?;
        let root = tree.add_inner(left, right, None, 0.0)?;
        tree.set_root(root);
        tree.reset_leaves()?;

        Ok(tree)
    }
}
