//! Read and write trees in the [newick](https://evolution.genetics.washington.edu/phylip/newick_doc.html)
//! format.
//!
//! Parsing always produces an [`NaryTree`] that can then be converted to the
//! bifurcating families, see [`Tree::classify`](crate::tree::Tree::classify).
//! Comments between square brackets are skipped and quoted names may hold
//! any character.

use std::fs;
use std::path::Path;

use clap::ValueEnum;

use crate::errors::{NewickParseError, TreeError};
use crate::tree::{EdgeLength, NaryNode, NaryTree, NodeId, Topology};

/// Newick output format
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum NewickFormat {
    /// Output all supported and available fields
    AllFields,
    /// Only output topology
    Topology,
    /// Output node names
    OnlyNames,
    /// Output branch lengths
    OnlyLengths,
    /// Output leaf branch lenghs + all node names
    LeafLengthsAllNames,
    /// Output leaf branch lengths + leaf node names
    LeafLengthsLeafNames,
    /// Output internal branch lenghts + leaf node names
    InternalLengthsLeafNames,
    /// Output all branch lenghts + leaf names
    AllLengthsLeafNames,
}

/// Returns the newick representation of a single node, without its children
pub(crate) fn format_node(
    name: Option<&str>,
    length: EdgeLength,
    is_tip: bool,
    format: NewickFormat,
) -> String {
    let mut repr = String::new();

    let with_name = match format {
        NewickFormat::AllFields | NewickFormat::OnlyNames | NewickFormat::LeafLengthsAllNames => {
            true
        }
        NewickFormat::LeafLengthsLeafNames
        | NewickFormat::InternalLengthsLeafNames
        | NewickFormat::AllLengthsLeafNames => is_tip,
        NewickFormat::Topology | NewickFormat::OnlyLengths => false,
    };
    if with_name {
        repr += name.unwrap_or_default();
    }

    let with_length = match format {
        NewickFormat::AllFields | NewickFormat::OnlyLengths | NewickFormat::AllLengthsLeafNames => {
            true
        }
        NewickFormat::InternalLengthsLeafNames => !is_tip,
        NewickFormat::LeafLengthsLeafNames | NewickFormat::LeafLengthsAllNames => is_tip,
        NewickFormat::Topology | NewickFormat::OnlyNames => false,
    };
    if with_length {
        repr += &format!(":{length}");
    }

    repr
}

/// Writes the subtree rooted at `root` as newick, without the final
/// semicolon. `repr` gives the name and length of each node.
pub(crate) fn write_subtree<T, F>(tree: &T, root: NodeId, mut repr: F) -> Result<String, TreeError>
where
    T: Topology + ?Sized,
    F: FnMut(NodeId) -> Result<String, TreeError>,
{
    enum Step {
        Open(NodeId),
        Comma,
        Close(NodeId),
    }

    let mut newick = String::new();
    let mut stack = vec![Step::Open(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Open(id) => {
                let children = tree.child_ids(id)?;
                if children.is_empty() {
                    newick += &repr(id)?;
                    continue;
                }
                newick.push('(');
                stack.push(Step::Close(id));
                for (i, child) in children.into_iter().enumerate().rev() {
                    stack.push(Step::Open(child));
                    if i > 0 {
                        stack.push(Step::Comma);
                    }
                }
            }
            Step::Comma => newick.push(','),
            Step::Close(id) => {
                newick.push(')');
                newick += &repr(id)?;
            }
        }
    }

    Ok(newick)
}

/// Sets the name and length of the node being closed, creating it first if
/// it was never opened as a subtree.
fn finish_node(
    tree: &mut NaryTree,
    index: Option<NodeId>,
    parent: Option<NodeId>,
    name: Option<String>,
    length: Option<String>,
) -> Result<NodeId, NewickParseError> {
    let id = match (index, parent) {
        (Some(id), _) => id,
        (None, Some(parent)) => tree.add_child(NaryNode::new(), parent)?,
        (None, None) => return Err(NewickParseError::NoSubtreeParent),
    };

    let node = tree.get_mut(&id)?;
    if name.is_some() {
        node.name = name;
    }
    if let Some(length) = length {
        node.branch_length = length.parse()?;
    }

    Ok(id)
}

/// Read a newick formatted string and build a [`NaryTree`] from it.
/// Missing branch lengths are set to 0.
/// ```
/// use phylotopo::newick::parse;
///
/// let tree = parse("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
///
/// assert_eq!(tree.size(), 6);
/// assert_eq!(tree.tip_names().unwrap(), vec!["A", "B", "C", "D"]);
/// ```
pub fn parse(newick: &str) -> Result<NaryTree, NewickParseError> {
    #[derive(Debug, PartialEq)]
    enum Field {
        Name,
        Length,
        Comment,
    }

    let mut tree = NaryTree::new();

    let mut parsing = Field::Name;
    let mut current_name: Option<String> = None;
    let mut current_length: Option<String> = None;
    let mut current_index: Option<NodeId> = None;
    let mut parent_stack: Vec<NodeId> = Vec::new();
    let mut quote: Option<char> = None;

    for c in newick.chars() {
        // Add character in quotes to name
        if let Some(delimiter) = quote {
            if c == delimiter {
                quote = None;
            } else {
                current_name.get_or_insert_with(String::new).push(c);
            }
            continue;
        }

        if parsing == Field::Comment {
            if c == ']' {
                parsing = Field::Name;
            }
            continue;
        }

        match c {
            '"' | '\'' if parsing == Field::Name => {
                quote = Some(c);
                current_name.get_or_insert_with(String::new);
            }
            '[' => {
                parsing = Field::Comment;
            }
            '(' => {
                // Start subtree
                let id = match parent_stack.last() {
                    None if tree.is_empty() => tree.add(NaryNode::new()),
                    None => return Err(NewickParseError::NoSubtreeParent),
                    Some(parent) => tree.add_child(NaryNode::new(), *parent)?,
                };
                parent_stack.push(id);
            }
            ':' => {
                // Start parsing length
                parsing = Field::Length;
            }
            ',' => {
                // Add sibling
                finish_node(
                    &mut tree,
                    current_index.take(),
                    parent_stack.last().copied(),
                    current_name.take(),
                    current_length.take(),
                )?;
                parsing = Field::Name;
            }
            ')' => {
                // Close subtree
                finish_node(
                    &mut tree,
                    current_index.take(),
                    parent_stack.last().copied(),
                    current_name.take(),
                    current_length.take(),
                )?;
                parsing = Field::Name;
                current_index = Some(parent_stack.pop().ok_or(NewickParseError::NoSubtreeParent)?);
            }
            ';' => {
                // Finish parsing the Tree
                if !parent_stack.is_empty() {
                    return Err(NewickParseError::UnclosedBracket);
                }
                if tree.is_empty() {
                    if current_name.is_none() {
                        return Err(NewickParseError::EmptyTree);
                    }
                    current_index = Some(tree.add(NaryNode::new()));
                }
                finish_node(&mut tree, current_index, None, current_name, current_length)?;

                return Ok(tree);
            }
            _ => {
                // Parse characters in fields
                match parsing {
                    Field::Name => {
                        if !c.is_whitespace() {
                            current_name.get_or_insert_with(String::new).push(c);
                        }
                    }
                    Field::Length => {
                        if c.is_whitespace() {
                            if current_length.is_some() {
                                return Err(NewickParseError::WhiteSpaceInNumber);
                            }
                        } else {
                            current_length.get_or_insert_with(String::new).push(c);
                        }
                    }
                    Field::Comment => unreachable!("comments are skipped before matching"),
                };
            }
        }
    }

    if quote.is_some() || !parent_stack.is_empty() {
        return Err(NewickParseError::UnclosedBracket);
    }

    Err(NewickParseError::NoClosingSemicolon)
}

/// Creates a tree from a newick file
pub fn parse_file(path: &Path) -> Result<NaryTree, NewickParseError> {
    let newick_string = fs::read_to_string(path)?;
    parse(&newick_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_names_and_lengths() {
        let tree = parse("((A:0.1,B:0.2)E:0.5,'C D':1e-2)F:0;").unwrap();
        let root = tree.get(&tree.root().unwrap()).unwrap();
        assert_eq!(root.name, Some("F".to_owned()));
        assert_eq!(root.children.len(), 2);

        let cd = tree.get(&root.children[1]).unwrap();
        assert_eq!(cd.name, Some("C D".to_owned()));
        assert_eq!(cd.branch_length, 0.01);

        let e = tree.get(&root.children[0]).unwrap();
        assert_eq!(e.name, Some("E".to_owned()));
        assert_eq!(e.branch_length, 0.5);
        assert_eq!(tree.tip_names().unwrap(), vec!["A", "B", "C D"]);
    }

    #[test]
    fn missing_fields_default() {
        let tree = parse("(A,(B,C));").unwrap();
        for id in tree.preorder(&tree.root().unwrap()).unwrap() {
            assert_eq!(tree.get(&id).unwrap().branch_length, 0.0);
        }
        assert_eq!(tree.size(), 5);
    }

    #[test]
    fn skip_comments_and_whitespace() {
        let tree = parse("(A[&&NHX:S=human]:1, B:2,\n  C:3)[root];\n").unwrap();
        assert_eq!(tree.tip_names().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(
            tree.to_formatted_newick(NewickFormat::AllLengthsLeafNames).unwrap(),
            "(A:1,B:2,C:3):0;"
        );
    }

    #[test]
    fn single_tip() {
        let tree = parse("A:1;").unwrap();
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.tip_names().unwrap(), vec!["A"]);
    }

    #[test]
    fn malformed() {
        for (newick, expected) in [
            ("((A,B);", "UnclosedBracket"),
            ("(A,B", "UnclosedBracket"),
            ("(A,B)", "NoClosingSemicolon"),
            ("(A,B));", "NoSubtreeParent"),
            ("A,B;", "NoSubtreeParent"),
            (";", "EmptyTree"),
            ("(A:1 0,B);", "WhiteSpaceInNumber"),
            ("(A:x,B);", "FloatError"),
        ] {
            let error = parse(newick).unwrap_err();
            assert!(format!("{error:?}").starts_with(expected), "{newick}: {error:?}");
        }
    }

    #[test]
    fn node_formats() {
        let cases = [
            (NewickFormat::AllFields, "A:1", "I:2"),
            (NewickFormat::Topology, "", ""),
            (NewickFormat::OnlyNames, "A", "I"),
            (NewickFormat::OnlyLengths, ":1", ":2"),
            (NewickFormat::LeafLengthsAllNames, "A:1", "I"),
            (NewickFormat::LeafLengthsLeafNames, "A:1", ""),
            (NewickFormat::InternalLengthsLeafNames, "A", ":2"),
            (NewickFormat::AllLengthsLeafNames, "A:1", ":2"),
        ];
        for (format, tip, inner) in cases {
            assert_eq!(format_node(Some("A"), 1.0, true, format), tip);
            assert_eq!(format_node(Some("I"), 2.0, false, format), inner);
        }
    }
}
