//! The `phylotopo` crate manipulates the topology of phylogenetic trees.
//!
//! It provides rooted binary trees, unrooted binary trees stored as
//! half-edges and n-ary trees for multifurcating input. On top of these:
//!  - canonical ordering and topology comparison of rooted trees
//!  - resolution of multifurcations, at random or as ladders
//!  - rerooting on the longest tip branch, a named tip or an outgroup
//!  - pruning, induced subtrees, subtree extraction and grafting
//!  - exhaustive enumeration of unrooted binary topologies
//!
//! Trees are read from and written to [newick](https://en.wikipedia.org/wiki/Newick_format)
//! strings:
//! ```
//! use phylotopo::tree::{RerootPolicy, Tree};
//!
//! let unrooted = Tree::from_newick("((A:1,B:2):1,C:3,(D:1,E:1):2);")
//!     .unwrap()
//!     .into_unrooted()
//!     .unwrap();
//! let rooted = unrooted
//!     .reroot(&RerootPolicy::OutgroupSet(vec!["D".into(), "E".into()]))
//!     .unwrap();
//!
//! assert_eq!(rooted.n_leaves(), 5);
//! ```

use clap::ValueEnum;
use rand::{seq::index, Rng};
use rand_distr::Distribution;

use distr::Sampler;
use errors::TreeError;
use tree::{NodeId, RootedTree};

pub mod distr;
pub mod enumerate;
pub mod errors;
pub mod newick;
pub mod stats;
pub mod tree;

/// Shapes of randomly generated trees
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TreeShape {
    /// Subtrees are joined two by two, picked uniformly at random
    Random,
    /// Every inner node has at least one tip child
    Caterpillar,
}

fn draw_length<R: Rng + ?Sized>(sampler: Option<&Sampler<f64>>, rng: &mut R) -> f64 {
    sampler.map_or(0.0, |sampler| sampler.sample(rng))
}

fn check_size(n_leaves: usize) -> Result<(), TreeError> {
    if n_leaves == 0 {
        return Err(TreeError::DegenerateTopology("a tree needs at least one tip"));
    }
    Ok(())
}

/// Generates a random rooted binary tree with tips named `Tip_1` to
/// `Tip_n`. Subtrees are joined two at a time, chosen uniformly at random,
/// until a single one remains. Branch lengths are drawn from `sampler`, or set
/// to 0 without one; the root branch is always 0.
/// ```
/// use phylotopo::distr::{Distr, Sampler};
/// use phylotopo::generate_tree;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let sampler = Sampler::new(Distr::Gamma).unwrap();
/// let mut rng = StdRng::seed_from_u64(3);
/// let tree = generate_tree(20, Some(&sampler), &mut rng).unwrap();
///
/// assert_eq!(tree.n_leaves(), 20);
/// assert_eq!(tree.size(), 39);
/// ```
pub fn generate_tree<R>(
    n_leaves: usize,
    sampler: Option<&Sampler<f64>>,
    rng: &mut R,
) -> Result<RootedTree, TreeError>
where
    R: Rng + ?Sized,
{
    check_size(n_leaves)?;

    let mut tree = RootedTree::new();
    let mut pool: Vec<NodeId> = (1..=n_leaves)
        .map(|i| tree.add_tip(&format!("Tip_{i}"), draw_length(sampler, rng)))
        .collect();

    while pool.len() > 1 {
        let picked = index::sample(rng, pool.len(), 2);
        let (first, second) = (picked.index(0), picked.index(1));
        let (left, right) = (pool[first], pool[second]);

        // Remove the larger position first so the other one stays valid
        pool.swap_remove(first.max(second));
        pool.swap_remove(first.min(second));

        let length = draw_length(sampler, rng);
        pool.push(tree.add_inner(left, right, None, length)?);
    }

    let root = tree.root()?;
    tree.get_mut(&root)?.branch_length = 0.0;

    Ok(tree)
}

/// Generates a caterpillar tree `(Tip_1,(Tip_2,(...,(Tip_n-1,Tip_n))))`.
/// Branch lengths are drawn as in [`generate_tree`].
/// ```
/// use phylotopo::generate_caterpillar;
/// use phylotopo::newick::NewickFormat;
///
/// let tree = generate_caterpillar(4, None, &mut rand::thread_rng()).unwrap();
/// assert_eq!(
///     tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap(),
///     "(Tip_1,(Tip_2,(Tip_3,Tip_4)));"
/// );
/// ```
pub fn generate_caterpillar<R>(
    n_leaves: usize,
    sampler: Option<&Sampler<f64>>,
    rng: &mut R,
) -> Result<RootedTree, TreeError>
where
    R: Rng + ?Sized,
{
    check_size(n_leaves)?;

    let mut tree = RootedTree::new();
    let mut spine = tree.add_tip(&format!("Tip_{n_leaves}"), draw_length(sampler, rng));
    for i in (1..n_leaves).rev() {
        let tip = tree.add_tip(&format!("Tip_{i}"), draw_length(sampler, rng));
        spine = tree.add_inner(tip, spine, None, draw_length(sampler, rng))?;
    }
    tree.get_mut(&spine)?.branch_length = 0.0;

    Ok(tree)
}

/// Generates a tree of the given shape, see [`generate_tree`] and
/// [`generate_caterpillar`].
pub fn generate<R>(
    shape: TreeShape,
    n_leaves: usize,
    sampler: Option<&Sampler<f64>>,
    rng: &mut R,
) -> Result<RootedTree, TreeError>
where
    R: Rng + ?Sized,
{
    match shape {
        TreeShape::Random => generate_tree(n_leaves, sampler, rng),
        TreeShape::Caterpillar => generate_caterpillar(n_leaves, sampler, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distr::Distr;
    use crate::newick::{parse, NewickFormat};
    use crate::tree::{topologically_equal, RerootPolicy, Tree};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn random_trees_are_binary() {
        let mut rng = StdRng::seed_from_u64(11);
        for n_leaves in 1..30 {
            let tree = generate_tree(n_leaves, None, &mut rng).unwrap();
            assert_eq!(tree.n_leaves(), n_leaves);
            assert_eq!(tree.size(), 2 * n_leaves - 1);

            let mut names = tree.tip_names().unwrap();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), n_leaves);

            // Writing and reading back gives the same kind of tree
            let parsed = Tree::from_newick(&tree.to_newick().unwrap()).unwrap();
            assert_eq!(parsed.kind(), "rooted");
        }
    }

    #[test]
    fn same_seed_same_tree() {
        let sampler = Sampler::new(Distr::Exponential).unwrap();
        let first = generate_tree(15, Some(&sampler), &mut StdRng::seed_from_u64(5)).unwrap();
        let second = generate_tree(15, Some(&sampler), &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(first.to_newick().unwrap(), second.to_newick().unwrap());
    }

    #[test]
    fn lengths_follow_the_sampler() {
        let sampler = Sampler::new(Distr::Uniform).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let tree = generate_tree(10, Some(&sampler), &mut rng).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.get(&root).unwrap().branch_length, 0.0);
        assert!(tree
            .branch_lengths()
            .unwrap()
            .iter()
            .all(|length| (0.002..1.0).contains(length)));

        let flat = generate_tree(10, None, &mut rng).unwrap();
        assert!(flat.branch_lengths().unwrap().iter().all(|l| *l == 0.0));
    }

    #[test]
    fn caterpillar() {
        let mut rng = StdRng::seed_from_u64(0);
        let tree = generate(TreeShape::Caterpillar, 6, None, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 6);
        assert_eq!(tree.height().unwrap(), 0.0);
        for id in tree.inner_nodes().unwrap() {
            let (left, _) = tree.get(&id).unwrap().children().unwrap();
            assert!(tree.get(&left).unwrap().is_tip());
        }

        let single = generate(TreeShape::Caterpillar, 1, None, &mut rng).unwrap();
        assert_eq!(single.to_newick().unwrap(), "Tip_1:0;");
    }

    #[test]
    fn empty_trees_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        for shape in [TreeShape::Random, TreeShape::Caterpillar] {
            assert!(matches!(
                generate(shape, 0, None, &mut rng),
                Err(TreeError::DegenerateTopology(_))
            ));
        }
    }

    #[test]
    fn deep_caterpillars() {
        let mut rng = StdRng::seed_from_u64(0);
        let n_leaves = 100_000;
        let tree = generate_caterpillar(n_leaves, None, &mut rng).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.postorder(&root).unwrap().len(), 2 * n_leaves - 1);
        assert_eq!(tree.sorted_order(&root).unwrap().len(), 2 * n_leaves - 1);

        let mut rotated = tree.clone();
        rotated.swap_children(&root).unwrap();
        assert!(topologically_equal(&tree, &rotated).unwrap());
        rotated.canonicalize().unwrap();
        assert!(topologically_equal(&tree, &rotated).unwrap());

        let newick = tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap();
        assert!(newick.starts_with("(Tip_1,(Tip_2,"));
        let parsed = Tree::from_newick(&newick).unwrap().into_rooted().unwrap();
        assert!(topologically_equal(&tree, &parsed).unwrap());

        let subtree = newick.trim_end_matches(';');
        let unrooted = Tree::from_newick(&format!("(X,Y,{subtree});"))
            .unwrap()
            .into_unrooted()
            .unwrap();
        unrooted.validate().unwrap();
        let rerooted = unrooted
            .reroot(&RerootPolicy::NamedTip(format!("Tip_{n_leaves}")))
            .unwrap();
        assert_eq!(rerooted.n_leaves(), n_leaves + 2);

        let resolved = parse(&format!("(X,Y,Z,{subtree});"))
            .unwrap()
            .resolve_ladder()
            .unwrap();
        assert_eq!(resolved.n_leaves(), n_leaves + 3);

        assert!(matches!(tree.to_ascii(), Err(TreeError::TooDeep(_))));
    }
}
