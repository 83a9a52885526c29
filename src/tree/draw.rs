//! ASCII drawings of trees, shared by every tree family.

use std::fmt::Display;

use ptree::item::StringItem;
use ptree::{print_tree, write_tree, TreeBuilder};

use crate::errors::TreeError;

use super::traversal::Topology;
use super::NodeId;

/// Deepest tree that can be drawn, `ptree` renders drawings recursively
pub(crate) const MAX_DRAW_DEPTH: usize = 1_000;

/// Builds a printable tree with `top` as its root label and the subtrees
/// rooted at `children` below it. Fails with [`TreeError::TooDeep`] if a
/// node lies more than [`MAX_DRAW_DEPTH`] levels below `top`.
pub(crate) fn build<T>(tree: &T, top: String, children: &[NodeId]) -> Result<StringItem, TreeError>
where
    T: Topology + ?Sized,
    T::Node: Display,
{
    let mut builder = TreeBuilder::new(top);

    // `None` closes the last opened child
    let mut stack: Vec<Option<(NodeId, usize)>> =
        children.iter().rev().map(|id| Some((*id, 1))).collect();
    while let Some(step) = stack.pop() {
        let Some((id, depth)) = step else {
            builder.end_child();
            continue;
        };
        if depth > MAX_DRAW_DEPTH {
            return Err(TreeError::TooDeep(MAX_DRAW_DEPTH));
        }

        let label = format!("{}", tree.node(id)?);
        let children = tree.child_ids(id)?;
        if children.is_empty() {
            builder.add_empty_child(label);
        } else {
            builder.begin_child(label);
            stack.push(None);
            stack.extend(children.into_iter().rev().map(|child| Some((child, depth + 1))));
        }
    }

    Ok(builder.build())
}

/// Writes a printable tree into a string
pub(crate) fn render(item: &StringItem) -> Result<String, TreeError> {
    let mut buffer = Vec::new();
    write_tree(item, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Prints a printable tree on stdout
pub(crate) fn print(item: &StringItem) -> Result<(), TreeError> {
    print_tree(item)?;
    Ok(())
}
