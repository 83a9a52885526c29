//! Exhaustive enumeration of unrooted binary topologies.
//!
//! Trees are built by stepwise addition: starting from the three-tip star,
//! tip `k` is inserted on every edge of every tree over the first `k` tips.
//! Each of the `(2T-5)!!` unrooted topologies over `T` tips is produced
//! exactly once. Half-edges are allocated once and relinked in place, so a
//! single [`UnrootedTree`] is handed to the caller for every topology.

use crate::errors::TreeError;
use crate::tree::{NodeId, UnrootedTree};

/// Number of unrooted binary topologies over `n_tips` tips, `(2T-5)!!`.
/// Returns `None` if the count does not fit in a `u128`.
/// ```
/// use phylotopo::enumerate::topology_count;
///
/// assert_eq!(topology_count(3), Some(1));
/// assert_eq!(topology_count(6), Some(105));
/// assert_eq!(topology_count(10), Some(2_027_025));
/// ```
pub fn topology_count(n_tips: usize) -> Option<u128> {
    if n_tips < 4 {
        return Some(1);
    }
    (3..=(2 * n_tips - 5))
        .step_by(2)
        .try_fold(1u128, |count, factor| count.checked_mul(factor as u128))
}

struct Enumerator<F> {
    tree: UnrootedTree,
    tips: Vec<NodeId>,
    inner: Vec<NodeId>,
    /// One half-edge for each edge where the next tip can be inserted
    open: Vec<NodeId>,
    emitted: usize,
    sink: F,
}

impl<F> Enumerator<F>
where
    F: FnMut(&UnrootedTree) -> Result<(), TreeError>,
{
    /// Places tip `k` on every open edge in turn
    fn place(&mut self, k: usize) -> Result<(), TreeError> {
        if k == self.tips.len() {
            self.emitted += 1;
            return (self.sink)(&self.tree);
        }

        let [first, second, third] = self.tree.vertex(&self.inner[k - 2])?;
        let tip = self.tips[k];

        for i in 0..self.open.len() {
            let edge = self.open[i];
            let back = self.tree.back(&edge)?;

            // Split the edge with the new vertex and hang the tip on it
            self.tree.link(&edge, &first, 0.0)?;
            self.tree.link(&back, &second, 0.0)?;
            self.tree.link(&third, &tip, 0.0)?;
            self.open.push(second);
            self.open.push(third);

            self.place(k + 1)?;

            self.open.pop();
            self.open.pop();
            for id in [first, second, third] {
                self.tree.unlink(&id)?;
            }
            self.tree.link(&edge, &back, 0.0)?;
        }

        Ok(())
    }
}

/// Calls `sink` once for every unrooted binary topology over `labels` and
/// returns the number of topologies. All branch lengths are 0. At least three
/// labels are needed, and the labels are expected to be distinct.
///
/// The tree passed to `sink` is reused for the next topology: write it out
/// or copy what is needed before returning.
/// ```
/// use phylotopo::enumerate::enumerate_topologies;
/// use phylotopo::newick::NewickFormat;
///
/// let mut trees = vec![];
/// let count = enumerate_topologies(&["A", "B", "C", "D"], |tree| {
///     trees.push(tree.to_formatted_newick(NewickFormat::OnlyNames)?);
///     Ok(())
/// })
/// .unwrap();
///
/// assert_eq!(count, 3);
/// assert_eq!(trees.len(), 3);
/// ```
pub fn enumerate_topologies<S, F>(labels: &[S], sink: F) -> Result<usize, TreeError>
where
    S: AsRef<str>,
    F: FnMut(&UnrootedTree) -> Result<(), TreeError>,
{
    if labels.len() < 3 {
        return Err(TreeError::DegenerateTopology(
            "at least three taxa are needed to enumerate unrooted trees",
        ));
    }

    let mut tree = UnrootedTree::new();
    let tips: Vec<NodeId> = labels
        .iter()
        .map(|label| tree.add_tip(label.as_ref()))
        .collect();
    let inner: Vec<NodeId> = (0..labels.len() - 2).map(|_| tree.add_inner()).collect();

    // Three-tip star around the first inner vertex
    let center = inner[0];
    for (half_edge, tip) in tree.vertex(&center)?.iter().zip(tips.iter()) {
        tree.link(half_edge, tip, 0.0)?;
    }
    tree.set_entry(center)?;

    let mut enumerator = Enumerator {
        tree,
        open: tips[..3].to_vec(),
        tips,
        inner,
        emitted: 0,
        sink,
    };
    enumerator.place(3)?;

    Ok(enumerator.emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick::NewickFormat;
    use crate::tree::{RerootPolicy, Side};
    use std::collections::HashSet;

    const LABELS: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

    /// Canonical newick of the tree rooted on the first tip
    fn canonical(tree: &UnrootedTree) -> Result<String, TreeError> {
        let mut rooted = tree.reroot(&RerootPolicy::NamedTip("A".into()))?;
        rooted.canonicalize()?;
        rooted.to_formatted_newick(NewickFormat::OnlyNames)
    }

    #[test]
    fn counts() {
        for (n_tips, expected) in [(3, 1), (4, 3), (5, 15), (6, 105), (7, 945)] {
            let count = enumerate_topologies(&LABELS[..n_tips], |_| Ok(())).unwrap();
            assert_eq!(count, expected);
            assert_eq!(topology_count(n_tips), Some(expected as u128));
        }
    }

    #[test]
    fn topologies_are_distinct_and_valid() {
        for n_tips in 3..=6 {
            let mut seen = HashSet::new();
            let count = enumerate_topologies(&LABELS[..n_tips], |tree| {
                tree.validate()?;
                assert_eq!(tree.n_leaves(), n_tips);
                assert!(seen.insert(canonical(tree)?));
                Ok(())
            })
            .unwrap();
            assert_eq!(seen.len(), count);
        }
    }

    #[test]
    fn four_tip_splits() {
        let mut partners = vec![];
        enumerate_topologies(&["A", "B", "C", "D"], |tree| {
            // Rooted on A the tree is (A,(X,(Y,Z))) and AX|YZ is its split
            let rooted = tree.reroot(&RerootPolicy::NamedTip("A".into()))?;
            let root = rooted.get(&rooted.root()?)?;
            let right = rooted.get(&root.child(Side::Right).unwrap())?;
            let (left, right) = right.children().unwrap();
            let partner = [left, right]
                .iter()
                .map(|id| rooted.get(id).unwrap())
                .find(|node| node.is_tip())
                .unwrap();
            partners.push(partner.name.clone().unwrap());
            Ok(())
        })
        .unwrap();

        partners.sort();
        assert_eq!(partners, vec!["B", "C", "D"]);
    }

    #[test]
    fn three_tips_give_the_star() {
        let mut trees = vec![];
        enumerate_topologies(&["A", "B", "C"], |tree| {
            trees.push(tree.to_newick()?);
            Ok(())
        })
        .unwrap();
        assert_eq!(trees, vec!["(A:0,B:0,C:0);"]);
    }

    #[test]
    fn errors() {
        assert!(matches!(
            enumerate_topologies(&["A", "B"], |_| Ok(())),
            Err(TreeError::DegenerateTopology(_))
        ));

        let mut calls = 0;
        let result = enumerate_topologies(&LABELS[..5], |_| {
            calls += 1;
            if calls == 2 {
                Err(TreeError::EmptyTaxonSet)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(TreeError::EmptyTaxonSet)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn large_counts() {
        assert_eq!(topology_count(20), Some(221_643_095_476_699_771_875));
        assert_eq!(topology_count(100), None);
    }
}
