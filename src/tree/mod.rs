//! Build and manipulate phylogenetic trees.
//!
//! Three tree families are defined here, each stored as an arena of nodes
//! referencing each other through [`NodeId`] handles:
//!  - [`RootedTree`]: strictly bifurcating rooted trees.
//!  - [`UnrootedTree`]: bifurcating unrooted trees made of half-edges.
//!  - [`NaryTree`]: trees with any number of children per node, used for
//!    multifurcating input before it is resolved.
//!
//! The [`Tree`] enum holds any of these, as classified by the newick parser.

use std::path::Path;

use clap::ValueEnum;

use crate::errors::{NewickParseError, TreeError};
use crate::newick::{self, NewickFormat};

mod canonical;
mod draw;
mod edit;
mod nary;
mod reroot;
mod rooted;
pub mod traversal;
mod unrooted;

pub use self::canonical::topologically_equal;
pub use self::nary::{NaryNode, NaryTree, ResolveMode};
pub use self::reroot::RerootPolicy;
pub use self::rooted::{RootedNode, RootedTree};
pub use self::traversal::{TraversalOrder, Topology};
pub use self::unrooted::{HalfEdge, UnrootedTree};

/// A type that represents identifiers of nodes within a tree arena
pub type NodeId = usize;

/// A type that represents branch lengths between nodes
pub type EdgeLength = f64;

/// One of the two children of a rooted node
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Side {
    /// The first child
    Left,
    /// The second child
    Right,
}

/// A parsed tree, classified by the shape of its root and inner nodes.
#[derive(Debug, Clone)]
pub enum Tree {
    /// Every inner node has two children
    Rooted(RootedTree),
    /// The root has three children and every other inner node two
    Unrooted(UnrootedTree),
    /// Any other shape
    Nary(NaryTree),
}

impl Tree {
    /// Parse a newick string and classify the resulting tree.
    /// ```
    /// use phylotopo::tree::Tree;
    ///
    /// assert!(matches!(Tree::from_newick("((A,B),C);").unwrap(), Tree::Rooted(_)));
    /// assert!(matches!(Tree::from_newick("(A,B,C);").unwrap(), Tree::Unrooted(_)));
    /// assert!(matches!(Tree::from_newick("(A,B,C,D);").unwrap(), Tree::Nary(_)));
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        Ok(Self::classify(newick::parse(newick)?)?)
    }

    /// Read and classify a tree from a newick file
    pub fn from_file(path: &Path) -> Result<Self, NewickParseError> {
        Ok(Self::classify(newick::parse_file(path)?)?)
    }

    /// Sort an n-ary tree into its family
    pub fn classify(tree: NaryTree) -> Result<Self, TreeError> {
        let root = tree.root()?;
        let degree = tree.get(&root)?.children.len();
        if degree == 0 || (degree == 2 && tree.is_binary()?) {
            Ok(Self::Rooted(tree.to_rooted()?))
        } else if degree == 3 && tree.is_binary()? {
            Ok(Self::Unrooted(tree.to_unrooted()?))
        } else {
            Ok(Self::Nary(tree))
        }
    }

    /// Name of the tree family
    pub fn kind(&self) -> &'static str {
        match self {
            Tree::Rooted(_) => "rooted",
            Tree::Unrooted(_) => "unrooted",
            Tree::Nary(_) => "n-ary",
        }
    }

    /// Get the rooted tree, failing for other families
    pub fn into_rooted(self) -> Result<RootedTree, TreeError> {
        match self {
            Tree::Rooted(tree) => Ok(tree),
            Tree::Unrooted(_) => Err(TreeError::DegenerateTopology(
                "the tree is unrooted and must be rerooted first",
            )),
            Tree::Nary(_) => Err(TreeError::IsNotBinary),
        }
    }

    /// Get the unrooted tree, failing for other families
    pub fn into_unrooted(self) -> Result<UnrootedTree, TreeError> {
        match self {
            Tree::Unrooted(tree) => Ok(tree),
            Tree::Rooted(_) => Err(TreeError::DegenerateTopology(
                "the tree is rooted, its root has two children",
            )),
            Tree::Nary(_) => Err(TreeError::IsNotBinary),
        }
    }

    /// Number of tips in the tree
    pub fn n_leaves(&self) -> Result<usize, TreeError> {
        match self {
            Tree::Rooted(tree) => Ok(tree.n_leaves()),
            Tree::Unrooted(tree) => Ok(tree.n_leaves()),
            Tree::Nary(tree) => Ok(tree.tips()?.len()),
        }
    }

    /// Number of nodes in the tree, half-edges for unrooted trees
    pub fn size(&self) -> usize {
        match self {
            Tree::Rooted(tree) => tree.size(),
            Tree::Unrooted(tree) => tree.size(),
            Tree::Nary(tree) => tree.size(),
        }
    }

    /// Names of the tips, in tip-query order
    pub fn tip_names(&self) -> Result<Vec<String>, TreeError> {
        match self {
            Tree::Rooted(tree) => tree.tip_names(),
            Tree::Unrooted(tree) => tree.tip_names(),
            Tree::Nary(tree) => tree.tip_names(),
        }
    }

    /// Branch lengths of the tree, each edge counted once
    pub fn branch_lengths(&self) -> Result<Vec<EdgeLength>, TreeError> {
        match self {
            Tree::Rooted(tree) => tree.branch_lengths(),
            Tree::Unrooted(tree) => tree.branch_lengths(),
            Tree::Nary(tree) => tree.branch_lengths(),
        }
    }

    /// Writes the tree as a newick formatted string
    pub fn to_formatted_newick(&self, format: NewickFormat) -> Result<String, TreeError> {
        match self {
            Tree::Rooted(tree) => tree.to_formatted_newick(format),
            Tree::Unrooted(tree) => tree.to_formatted_newick(format),
            Tree::Nary(tree) => tree.to_formatted_newick(format),
        }
    }

    /// Writes the tree as a newick string with every field
    pub fn to_newick(&self) -> Result<String, TreeError> {
        self.to_formatted_newick(NewickFormat::AllFields)
    }

    /// Render the tree as an ASCII drawing
    pub fn to_ascii(&self) -> Result<String, TreeError> {
        match self {
            Tree::Rooted(tree) => tree.to_ascii(),
            Tree::Unrooted(tree) => tree.to_ascii(),
            Tree::Nary(tree) => tree.to_ascii(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        for (newick, kind) in [
            ("A;", "rooted"),
            ("(A,B);", "rooted"),
            ("((A,B),(C,D));", "rooted"),
            ("(A,B,C);", "unrooted"),
            ("((A,B),C,(D,E));", "unrooted"),
            ("(A,B,C,D);", "n-ary"),
            ("((A,B,C),D);", "n-ary"),
            ("((A),B);", "n-ary"),
            ("(A,(B,C,D),E);", "n-ary"),
        ] {
            assert_eq!(Tree::from_newick(newick).unwrap().kind(), kind, "{newick}");
        }
    }

    #[test]
    fn strict_access() {
        assert!(matches!(
            Tree::from_newick("(A,B,C,D);").unwrap().into_rooted(),
            Err(TreeError::IsNotBinary)
        ));
        assert!(matches!(
            Tree::from_newick("(A,B,C);").unwrap().into_rooted(),
            Err(TreeError::DegenerateTopology(_))
        ));
        assert!(Tree::from_newick("(A,B,C);").unwrap().into_unrooted().is_ok());
    }

    #[test]
    fn summaries() {
        let tree = Tree::from_newick("((A:1,B:2):1,C:3,(D:1,E:1):2);").unwrap();
        assert_eq!(tree.n_leaves().unwrap(), 5);
        assert_eq!(tree.tip_names().unwrap().len(), 5);

        let mut lengths = tree.branch_lengths().unwrap();
        lengths.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(lengths, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0]);
    }
}
