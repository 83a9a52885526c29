//! Errors raised when building, converting and editing trees.

use thiserror::Error;

use crate::tree::NodeId;

/// Errors that can occur when manipulating rooted, unrooted or n-ary trees.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A label we were asked to find is not among the tips of the tree
    #[error("Taxon {0} does not appear in the tree.")]
    TaxonNotFound(String),
    /// The tree does not have the shape required by the operation
    #[error("Degenerate topology: {0}")]
    DegenerateTopology(&'static str),
    /// Pruning would leave less tips than the tree family allows
    #[error("The resulting tree must have at least {minimum} taxa, only {remaining} would remain.")]
    TooFewTaxaRemaining {
        /// Number of tips that would be left after the edit
        remaining: usize,
        /// Minimum number of tips for this tree family
        minimum: usize,
    },
    /// The outgroup taxa do not form a single monophyletic group
    #[error("The outgroup taxa are not separated from the other taxa by a single edge.")]
    AmbiguousOutgroup,
    /// An empty list of taxa was given where at least one is needed
    #[error("The list of taxa is empty.")]
    EmptyTaxonSet,
    /// The tree has a node with an unexpected number of children
    #[error("This tree is not binary.")]
    IsNotBinary,
    /// The node is an inner node but a tip was expected
    #[error("Node {0} is not a tip.")]
    NotATip(NodeId),
    /// The requested node with index [`NodeId`] does not exist in the tree
    #[error("There is no node with index: {0}")]
    NodeNotFound(NodeId),
    /// The half-edge is not linked to any other half-edge
    #[error("Half-edge {0} has no back link.")]
    UnlinkedHalfEdge(NodeId),
    /// The half-edge belongs to a vertex that is not a 3-cycle
    #[error("Half-edge {0} does not belong to a valid vertex.")]
    MalformedVertex(NodeId),
    /// The tree is deeper than an operation supports
    #[error("The tree is too deep, at most {0} levels are supported.")]
    TooDeep(usize),
    /// There was a [`std::io::Error`] when writing or displaying the tree
    #[error("Error writing tree")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when parsing newick strings and files.
#[derive(Error, Debug)]
pub enum NewickParseError {
    /// There is whitespace in one of the branch lengths
    #[error("Cannot have whitespace in number field.")]
    WhiteSpaceInNumber,
    /// There is an unclosed bracket in the newick String
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missing a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtree but have no parent node.
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// The newick string holds no node at all
    #[error("The newick string is empty.")]
    EmptyTree,
    /// There was a [`TreeError`] when building a tree from the newick string
    #[error("Problem with building the tree.")]
    TreeError(#[from] TreeError),
    /// There was a [`std::num::ParseFloatError`] when parsing branch lengths
    #[error("Could not parse a branch length")]
    FloatError(#[from] std::num::ParseFloatError),
    /// There was a [`std::io::Error`] when reading a newick file
    #[error("Problem reading file")]
    IoError(#[from] std::io::Error),
}
