//! Structural edits: pruning tips, extracting and grafting subtrees.
//!
//! Every edit checks its arguments before the first mutation, so that an
//! error leaves the tree as it was.

use std::collections::HashSet;

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use rand::seq::index;
use rand::Rng;

use crate::errors::TreeError;

use super::traversal::Topology;
use super::{NodeId, RootedTree, Side, UnrootedTree};

/// Methods to remove tips from a [`RootedTree`] and extract parts of it
impl RootedTree {
    // ################
    // # PRUNING TIPS #
    // ################

    /// Ids of the tips with the given names
    pub fn find_tips<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<NodeId>, TreeError> {
        names
            .iter()
            .map(|name| {
                self.get_by_name(name.as_ref())
                    .map(|node| node.id)
                    .ok_or_else(|| TreeError::TaxonNotFound(name.as_ref().to_owned()))
            })
            .collect()
    }

    /// Removes the tips with the given names, see [`RootedTree::prune_tips`]
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:2):1,(C:1,D:1):2):0;").unwrap().into_rooted().unwrap();
    /// tree.prune(&["B"]).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(A:2,(C:1,D:1):2):0;");
    /// ```
    pub fn prune<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), TreeError> {
        let ids = self.find_tips(names)?;
        self.prune_tips(&ids)
    }

    /// Removes tips from the tree. The sibling of a removed tip takes the
    /// place of their parent and its branch grows by the parent's branch
    /// length. When the parent was the root, the sibling becomes the root
    /// and keeps its own branch length. Duplicated ids are ignored and at
    /// least two tips must remain.
    pub fn prune_tips(&mut self, ids: &[NodeId]) -> Result<(), TreeError> {
        let ids: Vec<NodeId> = ids.iter().copied().unique().collect();
        for id in ids.iter() {
            if !self.get(id)?.is_tip() {
                return Err(TreeError::NotATip(*id));
            }
        }

        let remaining = self.n_leaves().saturating_sub(ids.len());
        if remaining < 2 {
            return Err(TreeError::TooFewTaxaRemaining {
                remaining,
                minimum: 2,
            });
        }

        for id in ids {
            self.splice_out(id)?;
        }

        self.reset_leaves()
    }

    /// Removes a tip and its parent, joining the sibling to the grandparent
    fn splice_out(&mut self, tip: NodeId) -> Result<(), TreeError> {
        let parent = self
            .get(&tip)?
            .parent
            .ok_or(TreeError::DegenerateTopology("cannot prune the root"))?;
        let parent_node = self.get(&parent)?;
        let (left, right) = parent_node
            .children()
            .ok_or(TreeError::NodeNotFound(parent))?;
        let sibling = if left == tip { right } else { left };
        let (grandparent, length) = (parent_node.parent, parent_node.branch_length);

        match grandparent {
            None => {
                self.get_mut(&sibling)?.parent = None;
                self.set_root(sibling);
            }
            Some(grandparent) => {
                let sibling_node = self.get_mut(&sibling)?;
                sibling_node.parent = Some(grandparent);
                sibling_node.branch_length += length;

                let grandparent = self.get_mut(&grandparent)?;
                grandparent.children = grandparent.children.map(|(left, right)| {
                    if left == parent {
                        (sibling, right)
                    } else {
                        (left, sibling)
                    }
                });
            }
        }

        self.delete(&tip)?;
        self.delete(&parent)
    }

    /// Prunes `count` tips chosen uniformly at random and returns their names
    pub fn prune_random<R>(&mut self, count: usize, rng: &mut R) -> Result<Vec<String>, TreeError>
    where
        R: Rng + ?Sized,
    {
        let tips = self.tips()?;
        if count + 2 > tips.len() {
            return Err(TreeError::TooFewTaxaRemaining {
                remaining: tips.len().saturating_sub(count),
                minimum: 2,
            });
        }

        let chosen: Vec<NodeId> = index::sample(rng, tips.len(), count)
            .into_iter()
            .map(|i| tips[i])
            .collect();
        let names = chosen
            .iter()
            .map(|id| Ok(self.get(id)?.name.clone().unwrap_or_default()))
            .collect::<Result<Vec<_>, TreeError>>()?;
        self.prune_tips(&chosen)?;

        Ok(names)
    }

    /// Tips of the tree that are not in `ids`, from left to right
    pub fn tip_complement(&self, ids: &[NodeId]) -> Result<Vec<NodeId>, TreeError> {
        let excluded: HashSet<&NodeId> = ids.iter().collect();
        Ok(self
            .tips()?
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .collect())
    }

    /// Keeps only the tips with the given names
    /// ```
    /// use phylotopo::newick::NewickFormat;
    /// use phylotopo::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(((A,B),C),(D,(E,F)));").unwrap().into_rooted().unwrap();
    /// tree.induced_subtree(&["A", "C", "F", "E"]).unwrap();
    ///
    /// assert_eq!(tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(), "((A,C),(E,F));");
    /// ```
    pub fn induced_subtree<S: AsRef<str>>(&mut self, keep: &[S]) -> Result<(), TreeError> {
        if keep.is_empty() {
            return Err(TreeError::EmptyTaxonSet);
        }
        let kept = self.find_tips(keep)?;
        let pruned = self.tip_complement(&kept)?;
        self.prune_tips(&pruned)
    }

    // ########################
    // # SUBTREES OF THE ROOT #
    // ########################

    fn root_child(&self, side: Side) -> Result<NodeId, TreeError> {
        self.get(&self.root()?)?
            .child(side)
            .ok_or(TreeError::DegenerateTopology("the tree has a single node"))
    }

    /// Copies the left or right subtree of the root into a new tree
    pub fn extract_subtree(&self, side: Side) -> Result<RootedTree, TreeError> {
        self.copy_subtree(&self.root_child(side)?)
    }

    /// Leftmost and rightmost tips of the left or right subtree of the root.
    /// Their most recent common ancestor is that subtree's root.
    pub fn lca_tips(&self, side: Side) -> Result<(NodeId, NodeId), TreeError> {
        let tips = self.subtree_tips(self.root_child(side)?)?;
        match (tips.first(), tips.last()) {
            (Some(first), Some(last)) => Ok((*first, *last)),
            _ => Err(TreeError::DegenerateTopology("the subtree has no tips")),
        }
    }

    /// Replaces the tip named `tip` by a copy of `other`. The branch of the
    /// grafted root grows by the length of the replaced tip's branch.
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:2):1,C:1):0;").unwrap().into_rooted().unwrap();
    /// let other = Tree::from_newick("(X:1,Y:1):0.5;").unwrap().into_rooted().unwrap();
    /// tree.attach("B", &other).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:1,(X:1,Y:1):2.5):1,C:1):0;");
    /// ```
    pub fn attach(&mut self, tip: &str, other: &RootedTree) -> Result<(), TreeError> {
        let tip = self
            .get_by_name(tip)
            .map(|node| node.id)
            .ok_or_else(|| TreeError::TaxonNotFound(tip.to_owned()))?;
        let other_root = other.root()?;

        let grafted = self.append_subtree(other, &other_root)?;
        let (length, parent) = {
            let node = self.get(&tip)?;
            (node.branch_length, node.parent)
        };

        let grafted_node = self.get_mut(&grafted)?;
        grafted_node.branch_length += length;
        grafted_node.parent = parent;

        match parent {
            None => self.set_root(grafted),
            Some(parent) => {
                let parent = self.get_mut(&parent)?;
                parent.children = parent.children.map(|(left, right)| {
                    if left == tip {
                        (grafted, right)
                    } else {
                        (left, grafted)
                    }
                });
            }
        }

        self.delete(&tip)?;
        self.reset_leaves()
    }

    /// Roots of the largest subtrees in which every branch below the
    /// subtree root is at most `threshold` long, in post-order. Tips alone
    /// are not reported.
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(((A:0.1,B:0.1):0.1,C:0.1)X:1,(D:0.1,E:2)Y:1);")
    ///     .unwrap()
    ///     .into_rooted()
    ///     .unwrap();
    /// let roots = tree.short_subtrees(0.5).unwrap();
    ///
    /// assert_eq!(roots.len(), 1);
    /// assert_eq!(tree.get(&roots[0]).unwrap().name, Some("X".to_owned()));
    /// ```
    pub fn short_subtrees(&self, threshold: f64) -> Result<Vec<NodeId>, TreeError> {
        let root = self.root()?;
        let postorder = self.postorder(&root)?;
        let capacity = postorder.iter().max().map_or(0, |max| max + 1);
        let mut short = FixedBitSet::with_capacity(capacity);

        for id in postorder.iter() {
            let node = self.get(id)?;
            let is_short = match node.children() {
                None => true,
                Some((left, right)) => [left, right].iter().all(|child| {
                    short.contains(*child)
                        && self
                            .get(child)
                            .map(|child| child.branch_length <= threshold)
                            .unwrap_or(false)
                }),
            };
            short.set(*id, is_short);
        }

        let mut roots = vec![];
        for id in postorder {
            let node = self.get(&id)?;
            let parent_is_short = node.parent.map_or(false, |parent| short.contains(parent));
            if !node.is_tip() && short.contains(id) && !parent_is_short {
                roots.push(id);
            }
        }

        Ok(roots)
    }
}

/// Methods to remove tips from an [`UnrootedTree`]
impl UnrootedTree {
    /// Removes the tips with the given names, see [`UnrootedTree::prune_tips`]
    pub fn prune<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), TreeError> {
        let ids = names
            .iter()
            .map(|name| {
                self.get_by_name(name.as_ref())
                    .map(|edge| edge.id)
                    .ok_or_else(|| TreeError::TaxonNotFound(name.as_ref().to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.prune_tips(&ids)
    }

    /// Removes tips from the tree. Each tip goes with its inner vertex and
    /// the two other neighbours of that vertex are joined by an edge whose
    /// length is the sum of their former edges. At least three tips must
    /// remain.
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:2):3,C:4,(D:5,E:6):7);").unwrap().into_unrooted().unwrap();
    /// tree.prune(&["A"]).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(B:5,C:4,(D:5,E:6):7);");
    /// ```
    pub fn prune_tips(&mut self, ids: &[NodeId]) -> Result<(), TreeError> {
        self.validate()?;

        let ids: Vec<NodeId> = ids.iter().copied().unique().collect();
        for id in ids.iter() {
            if !self.get(id)?.is_tip() {
                return Err(TreeError::NotATip(*id));
            }
        }

        let remaining = self.n_leaves().saturating_sub(ids.len());
        if remaining < 3 {
            return Err(TreeError::TooFewTaxaRemaining {
                remaining,
                minimum: 3,
            });
        }

        for tip in ids {
            let [vertex, second, third] = self.vertex(&self.back(&tip)?)?;
            let x = self.back(&second)?;
            let y = self.back(&third)?;
            let length = self.get(&second)?.branch_length + self.get(&third)?.branch_length;

            for id in [tip, vertex, second, third] {
                self.delete(&id)?;
            }
            self.link(&x, &y, length)?;

            if self.get(&self.entry()?).is_err() {
                let inner = if self.get(&x)?.is_tip() { y } else { x };
                self.set_entry(inner)?;
            }
        }

        Ok(())
    }

    /// Keeps only the tips with the given names
    pub fn induced_subtree<S: AsRef<str>>(&mut self, keep: &[S]) -> Result<(), TreeError> {
        if keep.is_empty() {
            return Err(TreeError::EmptyTaxonSet);
        }
        let mut kept = HashSet::new();
        for name in keep {
            let tip = self
                .get_by_name(name.as_ref())
                .filter(|edge| edge.is_tip())
                .ok_or_else(|| TreeError::TaxonNotFound(name.as_ref().to_owned()))?;
            kept.insert(tip.id);
        }

        let pruned: Vec<NodeId> = self
            .tips()?
            .into_iter()
            .filter(|id| !kept.contains(id))
            .collect();
        self.prune_tips(&pruned)
    }

    /// Prunes `count` tips chosen uniformly at random and returns their names
    pub fn prune_random<R>(&mut self, count: usize, rng: &mut R) -> Result<Vec<String>, TreeError>
    where
        R: Rng + ?Sized,
    {
        let tips = self.tips()?;
        if count + 3 > tips.len() {
            return Err(TreeError::TooFewTaxaRemaining {
                remaining: tips.len().saturating_sub(count),
                minimum: 3,
            });
        }

        let chosen: Vec<NodeId> = index::sample(rng, tips.len(), count)
            .into_iter()
            .map(|i| tips[i])
            .collect();
        let names = chosen
            .iter()
            .map(|id| Ok(self.get(id)?.name.clone().unwrap_or_default()))
            .collect::<Result<Vec<_>, TreeError>>()?;
        self.prune_tips(&chosen)?;

        Ok(names)
    }
}
