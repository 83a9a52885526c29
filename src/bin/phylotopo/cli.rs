use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use phylotopo::{distr::Distr, newick::NewickFormat, tree::Side, TreeShape};

/// Reroot, prune, resolve and enumerate phylogenetic trees
#[derive(Parser, Debug)]
#[command(name = "phylotopo", version)]
pub struct Args {
    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,

    /// Flags shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags shared by every command
#[derive(ClapArgs, Debug)]
pub struct GlobalArgs {
    /// Seed of the random number generator, for reproducible runs
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// File to write the output to instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Format of the newick output
    #[arg(value_enum, short, long, global = true, default_value_t = NewickFormat::AllFields)]
    pub format: NewickFormat,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report debugging information
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// The available commands in the `phylotopo` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a tree back as newick, or draw it
    Show {
        /// Input newick file
        tree: PathBuf,
        /// Draw the tree instead of writing newick
        #[arg(short, long)]
        ascii: bool,
    },

    /// Describe a tree: family, size and branch length statistics
    Info {
        /// Input newick file
        tree: PathBuf,
    },

    /// List the tips of a tree
    Tips {
        /// Input newick file
        tree: PathBuf,
        /// Only list the tips below this child of the root
        #[arg(value_enum, short, long)]
        side: Option<Side>,
    },

    /// Check if two trees have the same topology
    ///
    /// Rooted trees are compared up to rotations of their inner nodes.
    /// Unrooted trees are both rooted on the first tip of the first tree
    /// before being compared.
    #[clap(verbatim_doc_comment)]
    Identical {
        /// First newick file
        first: PathBuf,
        /// Second newick file
        second: PathBuf,
    },

    /// Root an unrooted tree
    ///
    /// Without an outgroup, the root is placed on the longest tip branch.
    Root {
        /// Input newick file
        tree: PathBuf,
        /// Tip or comma separated tips to root on
        #[arg(long, value_delimiter = ',')]
        outgroup: Vec<String>,
    },

    /// Remove tips from a tree
    Prune {
        /// Input newick file
        tree: PathBuf,
        /// Names of the tips to remove
        #[arg(value_delimiter = ',', required_unless_present = "random")]
        tips: Vec<String>,
        /// Remove this many tips chosen at random instead
        #[arg(short, long, conflicts_with = "tips")]
        random: Option<usize>,
    },

    /// Keep only the given tips of a tree
    Induce {
        /// Input newick file
        tree: PathBuf,
        /// Names of the tips to keep
        #[arg(value_delimiter = ',', required = true)]
        tips: Vec<String>,
    },

    /// Write the subtree below one child of the root
    Extract {
        /// Input newick file
        tree: PathBuf,
        /// Child of the root to use
        #[arg(value_enum, short, long)]
        side: Side,
    },

    /// Name two tips whose common ancestor is a child of the root
    Lca {
        /// Input newick file
        tree: PathBuf,
        /// Child of the root to use
        #[arg(value_enum, short, long)]
        side: Side,
    },

    /// Resolve multifurcations into a rooted binary tree
    ///
    /// The trifurcation at the root of an unrooted tree is resolved as well.
    /// Rooted binary trees are written back unchanged.
    #[clap(verbatim_doc_comment)]
    Binary {
        /// Input newick file
        tree: PathBuf,
        /// Resolve each multifurcation as a ladder instead of at random
        #[arg(short, long)]
        ladder: bool,
    },

    /// Write the largest subtrees whose branches are all at most a threshold long
    ShortSubtrees {
        /// Input newick file
        tree: PathBuf,
        /// Branch length threshold
        threshold: f64,
    },

    /// Graft a tree in place of a tip of another one
    Attach {
        /// Tip to replace
        #[arg(long)]
        at: String,
        /// Newick file of the receiving tree
        tree: PathBuf,
        /// Newick file of the grafted tree
        other: PathBuf,
    },

    /// Write every unrooted binary topology over a set of taxa
    AllTrees {
        /// File with the taxa names, separated by whitespace
        labels: PathBuf,
        /// Do not display a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Generate a random rooted tree
    Random {
        /// Number of tips
        #[arg(short, long, default_value_t = 20)]
        tips: usize,
        /// Shape of the tree
        #[arg(value_enum, long, default_value_t = TreeShape::Random)]
        shape: TreeShape,
        /// Draw branch lengths from this distribution, 0 otherwise
        #[arg(value_enum, short, long)]
        distribution: Option<Distr>,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
