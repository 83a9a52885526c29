#![warn(missing_docs)]
//! The `phylotopo` binary is a command line tool built on the [`phylotopo`] crate.
//! It reroots, prunes, resolves and enumerates phylogenetic trees stored as newick files.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use phylotopo::{
    distr::Sampler,
    enumerate::{enumerate_topologies, topology_count},
    newick::parse_file,
    stats::BranchStats,
    tree::{topologically_equal, NaryTree, NodeId, RerootPolicy, ResolveMode, RootedTree, Tree},
};

/// contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

use cli::{Args, Commands, GlobalArgs};

fn init_logging(global: &GlobalArgs) {
    let level = if global.quiet {
        "warn"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_output(path: Option<&Path>) -> Result<BufWriter<Box<dyn Write>>> {
    Ok(BufWriter::new(match path {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?,
        ) as Box<dyn Write>,
        None => Box::new(io::stdout()) as Box<dyn Write>,
    }))
}

fn read_tree(path: &Path) -> Result<Tree> {
    let tree = Tree::from_file(path)
        .with_context(|| format!("failed to read a tree from {}", path.display()))?;
    debug!(path = %path.display(), kind = tree.kind(), "read tree");
    Ok(tree)
}

fn read_rooted(path: &Path) -> Result<RootedTree> {
    read_tree(path)?
        .into_rooted()
        .with_context(|| format!("{} does not hold a rooted binary tree", path.display()))
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Roots both unrooted trees on the same tip so they can be compared
fn root_on_shared_tip(first: &Tree, second: &Tree) -> Result<Option<(RootedTree, RootedTree)>> {
    let (Tree::Unrooted(first), Tree::Unrooted(second)) = (first, second) else {
        return Ok(None);
    };
    let Some(tip) = first.tip_names()?.into_iter().next() else {
        return Ok(None);
    };
    if second.get_by_name(&tip).is_none() {
        return Ok(None);
    }

    let policy = RerootPolicy::NamedTip(tip);
    Ok(Some((first.reroot(&policy)?, second.reroot(&policy)?)))
}

fn identical(first: &Tree, second: &Tree) -> Result<bool> {
    if let (Tree::Rooted(first), Tree::Rooted(second)) = (first, second) {
        return Ok(topologically_equal(first, second)?);
    }
    if first.kind() != second.kind() {
        warn!(
            "comparing a {} tree with a {} tree",
            first.kind(),
            second.kind()
        );
        return Ok(false);
    }
    match root_on_shared_tip(first, second)? {
        Some((first, second)) => Ok(topologically_equal(&first, &second)?),
        None if matches!(first, Tree::Nary(_)) => {
            bail!("n-ary trees must be resolved with `binary` before being compared")
        }
        None => Ok(false),
    }
}

/// Resolves every multifurcation, the trifurcation at the root of an unrooted
/// tree included. Rooted binary trees are returned as they are.
fn make_binary(tree: NaryTree, mode: ResolveMode, rng: &mut StdRng) -> Result<RootedTree> {
    let degree = tree.get(&tree.root()?)?.children.len();
    let binary = tree.is_binary()?;
    if binary && (degree == 0 || degree == 2) {
        info!("the tree is already binary");
        return Ok(tree.to_rooted()?);
    }
    if binary && degree == 3 {
        debug!("resolving the root trifurcation of an unrooted tree");
    }

    Ok(tree.resolve(mode, rng)?)
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read taxa from {}", path.display()))?;
    let labels: Vec<String> = content.split_whitespace().map(String::from).collect();

    let duplicated: Vec<&String> = labels.iter().duplicates().collect();
    if !duplicated.is_empty() {
        bail!("duplicated taxa in {}: {}", path.display(), duplicated.iter().join(", "));
    }

    Ok(labels)
}

fn progress_bar(total: Option<u128>, hidden: bool) -> Result<ProgressBar> {
    let Some(total) = total.and_then(|total| u64::try_from(total).ok()) else {
        return Ok(ProgressBar::hidden());
    };
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {pos}/{len} trees ({eta})")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

fn run(args: Args) -> Result<()> {
    let global = args.global;
    let format = global.format;
    let mut rng = rng_from_seed(global.seed);

    let mut out = open_output(global.output.as_deref())?;

    match args.command {
        Commands::Show { tree, ascii } => {
            let tree = read_tree(&tree)?;
            if ascii {
                write!(out, "{}", tree.to_ascii()?)?;
            } else {
                writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
            }
        }
        Commands::Info { tree } => {
            let tree = read_tree(&tree)?;
            writeln!(out, "family\t{}", tree.kind())?;
            writeln!(out, "tips\t{}", tree.n_leaves()?)?;
            writeln!(out, "nodes\t{}", tree.size())?;
            if let Tree::Rooted(rooted) = &tree {
                writeln!(out, "height\t{}", rooted.height()?)?;
            }
            match BranchStats::from_lengths(&tree.branch_lengths()?) {
                Some(stats) => writeln!(out, "{stats}")?,
                None => writeln!(out, "branches\t0")?,
            }
        }
        Commands::Tips { tree, side } => {
            let names = match side {
                Some(side) => read_rooted(&tree)?.extract_subtree(side)?.tip_names()?,
                None => read_tree(&tree)?.tip_names()?,
            };
            for name in names {
                writeln!(out, "{name}")?;
            }
        }
        Commands::Identical { first, second } => {
            let result = identical(&read_tree(&first)?, &read_tree(&second)?)?;
            writeln!(out, "{result}")?;
        }
        Commands::Root { tree, outgroup } => {
            let tree = read_tree(&tree)?
                .into_unrooted()
                .context("only unrooted trees can be rooted")?;
            let policy = match outgroup.len() {
                0 => RerootPolicy::LongestTipBranch,
                1 => RerootPolicy::NamedTip(outgroup[0].clone()),
                _ => RerootPolicy::OutgroupSet(outgroup),
            };
            debug!(?policy, "rooting");
            let rooted = tree.reroot(&policy)?;
            writeln!(out, "{}", rooted.to_formatted_newick(format)?)?;
        }
        Commands::Prune { tree, tips, random } => match read_tree(&tree)? {
            Tree::Rooted(mut tree) => {
                let root = tree.root()?;
                match random {
                    Some(count) => {
                        let pruned = tree.prune_random(count, &mut rng)?;
                        info!("pruned {}", pruned.join(", "));
                    }
                    None => tree.prune(tips.as_slice())?,
                }
                if tree.root()? != root {
                    warn!("pruning removed the root, a child of the former root is the new root");
                }
                writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
            }
            Tree::Unrooted(mut tree) => {
                match random {
                    Some(count) => {
                        let pruned = tree.prune_random(count, &mut rng)?;
                        info!("pruned {}", pruned.join(", "));
                    }
                    None => tree.prune(tips.as_slice())?,
                }
                writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
            }
            Tree::Nary(_) => bail!("n-ary trees must be resolved with `binary` before pruning"),
        },
        Commands::Induce { tree, tips } => {
            let newick = match read_tree(&tree)? {
                Tree::Rooted(mut tree) => {
                    tree.induced_subtree(tips.as_slice())?;
                    tree.to_formatted_newick(format)?
                }
                Tree::Unrooted(mut tree) => {
                    tree.induced_subtree(tips.as_slice())?;
                    tree.to_formatted_newick(format)?
                }
                Tree::Nary(_) => {
                    bail!("n-ary trees must be resolved with `binary` before pruning")
                }
            };
            writeln!(out, "{newick}")?;
        }
        Commands::Extract { tree, side } => {
            let subtree = read_rooted(&tree)?.extract_subtree(side)?;
            writeln!(out, "{}", subtree.to_formatted_newick(format)?)?;
        }
        Commands::Lca { tree, side } => {
            let tree = read_rooted(&tree)?;
            let (first, last) = tree.lca_tips(side)?;
            let name = |id: NodeId| -> Result<String> {
                Ok(tree.get(&id)?.label().unwrap_or_default().to_owned())
            };
            writeln!(out, "{}\t{}", name(first)?, name(last)?)?;
        }
        Commands::Binary { tree, ladder } => {
            let nary = parse_file(&tree)
                .with_context(|| format!("failed to read a tree from {}", tree.display()))?;
            let mode = if ladder {
                ResolveMode::Ladder
            } else {
                ResolveMode::Random
            };
            let resolved = make_binary(nary, mode, &mut rng)?;
            writeln!(out, "{}", resolved.to_formatted_newick(format)?)?;
        }
        Commands::ShortSubtrees { tree, threshold } => {
            let tree = read_rooted(&tree)?;
            let roots = tree.short_subtrees(threshold)?;
            info!("found {} subtrees with branches of at most {threshold}", roots.len());
            for root in roots {
                writeln!(out, "{}", tree.copy_subtree(&root)?.to_formatted_newick(format)?)?;
            }
        }
        Commands::Attach { at, tree, other } => {
            let mut tree = read_rooted(&tree)?;
            let other = read_rooted(&other)?;
            tree.attach(&at, &other)?;
            writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
        }
        Commands::AllTrees {
            labels,
            no_progress,
        } => {
            let labels = read_labels(&labels)?;
            let total = topology_count(labels.len());
            match total {
                Some(total) => info!("writing {total} topologies over {} taxa", labels.len()),
                None => warn!("more topologies over {} taxa than can be counted", labels.len()),
            }

            let bar = progress_bar(total, no_progress || global.quiet)?;
            let count = enumerate_topologies(labels.as_slice(), |tree| {
                writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
                bar.inc(1);
                Ok(())
            })?;
            bar.finish_and_clear();
            info!("wrote {count} topologies");
        }
        Commands::Random {
            tips,
            shape,
            distribution,
        } => {
            let sampler = distribution.map(Sampler::new).transpose()?;
            let tree = phylotopo::generate(shape, tips, sampler.as_ref(), &mut rng)?;
            writeln!(out, "{}", tree.to_formatted_newick(format)?)?;
        }
        Commands::Completion { shell } => {
            let mut cmd = Args::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut out);
        }
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.global);
    run(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylotopo::newick::{parse, NewickFormat};

    fn tree(newick: &str) -> Tree {
        Tree::from_newick(newick).unwrap()
    }

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn binary_resolves_unrooted_trees() {
        let names = |tree: RootedTree| tree.to_formatted_newick(NewickFormat::OnlyNames).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        for mode in [ResolveMode::Random, ResolveMode::Ladder] {
            let resolved = make_binary(parse("(A,B,C);").unwrap(), mode, &mut rng).unwrap();
            assert_eq!(resolved.n_leaves(), 3);
            assert_eq!(resolved.size(), 5);
            assert_eq!(tree(&resolved.to_newick().unwrap()).kind(), "rooted");
        }

        let ladder = make_binary(parse("(A,B,C);").unwrap(), ResolveMode::Ladder, &mut rng);
        assert_eq!(names(ladder.unwrap()), "(A,(B,C));");

        let rooted = make_binary(parse("((A,B),C);").unwrap(), ResolveMode::Random, &mut rng);
        assert_eq!(names(rooted.unwrap()), "((A,B),C);");

        let nary = make_binary(parse("(A,B,C,D);").unwrap(), ResolveMode::Ladder, &mut rng);
        assert_eq!(names(nary.unwrap()), "(A,(B,(C,D)));");
    }

    #[test]
    fn comparisons() {
        assert!(identical(&tree("((A,B),C);"), &tree("(C,(B,A));")).unwrap());
        assert!(!identical(&tree("((A,B),C);"), &tree("((A,C),B);")).unwrap());
        assert!(identical(&tree("((A,B),C,(D,E));"), &tree("((D,E),(B,A),C);")).unwrap());
        assert!(!identical(&tree("((A,B),C,(D,E));"), &tree("((A,D),C,(B,E));")).unwrap());
        assert!(!identical(&tree("((A,B),C);"), &tree("(A,B,C);")).unwrap());
        assert!(identical(&tree("(A,B,C,D);"), &tree("(A,B,C,D);")).is_err());
    }
}
