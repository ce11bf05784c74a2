// src/services/thread.rs

//! Turns the flat comment rows of one article into reply trees.
//!
//! Rows are indexed once (id -> slot, slot -> child slots), siblings are
//! sorted by `(created_at, id)`, and the forest is materialised bottom-up from
//! a pre-order walk, so no step rescans the input and deep threads never
//! recurse on the call stack.

use std::collections::HashMap;
use std::fmt;

use crate::{
    error::{CommentError, Result},
    models::comment::{Comment, CommentRecord, ParentRef},
};

/// Something unusual the assembler tolerated instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadWarning {
    /// The comment's parent is not in the dataset; it was promoted to a root.
    Orphan {
        comment_id: String,
        missing_parent: String,
    },
}

impl fmt::Display for ThreadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadWarning::Orphan {
                comment_id,
                missing_parent,
            } => write!(
                f,
                "comment {} references missing parent {}, shown as a root",
                comment_id, missing_parent
            ),
        }
    }
}

/// Assembled reply trees for one article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    /// Root comments in thread order, each carrying its full reply subtree.
    pub roots: Vec<Comment>,
    pub warnings: Vec<ThreadWarning>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    Seen,
}

/// Builds the reply forest for a complete, unordered set of comment rows.
///
/// Fails with [`CommentError::DataIntegrity`] when two rows share an id or
/// when parent links form a cycle. Rows whose parent is absent become roots
/// and are reported in [`Forest::warnings`].
pub fn assemble(records: Vec<CommentRecord>) -> Result<Forest> {
    let n = records.len();

    let mut slot_of: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (slot, record) in records.iter().enumerate() {
        if slot_of.insert(record.id.as_str(), slot).is_some() {
            return Err(CommentError::DataIntegrity(format!(
                "duplicate comment id {}",
                record.id
            )));
        }
    }

    let mut parent_of: Vec<Option<usize>> = vec![None; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots: Vec<usize> = Vec::new();
    let mut warnings = Vec::new();

    for (slot, record) in records.iter().enumerate() {
        match &record.parent_id {
            ParentRef::Root => roots.push(slot),
            ParentRef::ReplyTo(parent) => match slot_of.get(parent.as_str()) {
                Some(&parent_slot) => {
                    parent_of[slot] = Some(parent_slot);
                    children[parent_slot].push(slot);
                }
                None => {
                    warnings.push(ThreadWarning::Orphan {
                        comment_id: record.id.clone(),
                        missing_parent: parent.clone(),
                    });
                    roots.push(slot);
                }
            },
        }
    }
    drop(slot_of);

    let by_thread_order = |a: &usize, b: &usize| records[*a].thread_order(&records[*b]);
    roots.sort_by(by_thread_order);
    for siblings in children.iter_mut() {
        siblings.sort_by(by_thread_order);
    }

    // Pre-order walk from the roots. A slot reached twice means the parent
    // links are not a forest.
    let mut state = vec![Visit::Unseen; n];
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(slot) = stack.pop() {
        if state[slot] == Visit::Seen {
            return Err(CommentError::DataIntegrity(format!(
                "comment {} reached twice while walking reply threads",
                records[slot].id
            )));
        }
        state[slot] = Visit::Seen;
        order.push(slot);
        stack.extend(children[slot].iter().rev());
    }

    // Anything not reachable from a root hangs off a parent cycle.
    if let Some(slot) = state.iter().position(|s| *s == Visit::Unseen) {
        return Err(CommentError::DataIntegrity(describe_cycle(
            slot, &parent_of, &records,
        )));
    }

    let mut nodes: Vec<Option<Comment>> = records.into_iter().map(|r| Some(r.into())).collect();

    // Children follow their parent in pre-order, so walking it backwards
    // finishes every subtree before its parent claims it.
    for &slot in order.iter().rev() {
        let replies = children[slot]
            .iter()
            .map(|&child| take_node(&mut nodes, child))
            .collect::<Result<Vec<_>>>()?;
        if let Some(node) = nodes[slot].as_mut() {
            node.replies = replies;
        }
    }

    let roots = roots
        .iter()
        .map(|&slot| take_node(&mut nodes, slot))
        .collect::<Result<Vec<_>>>()?;

    Ok(Forest { roots, warnings })
}

fn take_node(nodes: &mut [Option<Comment>], slot: usize) -> Result<Comment> {
    nodes[slot].take().ok_or_else(|| {
        CommentError::DataIntegrity(format!("comment slot {} attached to two parents", slot))
    })
}

/// Follows parent links from `start` until a comment repeats and names the loop.
fn describe_cycle(start: usize, parent_of: &[Option<usize>], records: &[CommentRecord]) -> String {
    let mut seen_at: HashMap<usize, usize> = HashMap::new();
    let mut path = Vec::new();
    let mut current = Some(start);

    while let Some(slot) = current {
        if let Some(&first) = seen_at.get(&slot) {
            let ids: Vec<&str> = path[first..]
                .iter()
                .chain(std::iter::once(&slot))
                .map(|&s: &usize| records[s].id.as_str())
                .collect();
            return format!("cycle in parent chain: {}", ids.join(" -> "));
        }
        seen_at.insert(slot, path.len());
        path.push(slot);
        current = parent_of[slot];
    }

    format!(
        "comment {} is unreachable from any root comment",
        records[start].id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashSet;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn record(id: &str, parent: Option<&str>, t: i64) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            article_id: "a1".to_string(),
            user_id: format!("user-of-{}", id),
            parent_id: parent.map(str::to_string).into(),
            content: format!("content of {}", id),
            created_at: at(t),
            updated_at: at(t),
            deleted_at: None,
        }
    }

    fn ids(nodes: &[Comment]) -> Vec<&str> {
        nodes.iter().map(|c| c.id.as_str()).collect()
    }

    fn sample() -> Vec<CommentRecord> {
        vec![
            record("r2", None, 20),
            record("c11", Some("r1"), 11),
            record("c21", Some("r2"), 21),
            record("r1", None, 10),
            record("g111", Some("c11"), 12),
            record("c12", Some("r1"), 13),
        ]
    }

    #[test]
    fn builds_nested_replies_in_thread_order() {
        let forest = assemble(sample()).unwrap();

        assert!(forest.warnings.is_empty());
        assert_eq!(ids(&forest.roots), ["r1", "r2"]);

        let r1 = &forest.roots[0];
        assert_eq!(ids(&r1.replies), ["c11", "c12"]);
        assert_eq!(ids(&r1.replies[0].replies), ["g111"]);
        assert!(r1.replies[1].replies.is_empty());
        assert_eq!(ids(&forest.roots[1].replies), ["c21"]);
    }

    #[test]
    fn every_record_appears_exactly_once_under_its_parent() {
        let input = sample();
        let expected: HashSet<String> = input.iter().map(|r| r.id.clone()).collect();
        let forest = assemble(input).unwrap();

        let mut seen = Vec::new();
        let mut stack: Vec<(&Comment, Option<&str>)> =
            forest.roots.iter().map(|c| (c, None)).collect();
        while let Some((node, parent)) = stack.pop() {
            assert_eq!(node.parent_id.parent_id(), parent);
            seen.push(node.id.clone());
            stack.extend(node.replies.iter().map(|c| (c, Some(node.id.as_str()))));
        }

        assert_eq!(seen.len(), expected.len());
        assert_eq!(seen.into_iter().collect::<HashSet<_>>(), expected);
    }

    #[test]
    fn assembly_is_deterministic_regardless_of_input_order() {
        let mut reversed = sample();
        reversed.reverse();

        assert_eq!(assemble(sample()).unwrap(), assemble(reversed).unwrap());
    }

    #[test]
    fn equal_timestamps_are_ordered_by_id() {
        let records = vec![
            record("b", None, 5),
            record("c", None, 5),
            record("a", None, 5),
            record("y", Some("a"), 6),
            record("x", Some("a"), 6),
        ];
        let forest = assemble(records).unwrap();

        assert_eq!(ids(&forest.roots), ["a", "b", "c"]);
        assert_eq!(ids(&forest.roots[0].replies), ["x", "y"]);
    }

    #[test]
    fn orphans_become_roots_with_a_warning() {
        let records = vec![
            record("r1", None, 1),
            record("lost", Some("gone"), 2),
            record("reply", Some("lost"), 3),
        ];
        let forest = assemble(records).unwrap();

        assert_eq!(ids(&forest.roots), ["r1", "lost"]);
        assert_eq!(ids(&forest.roots[1].replies), ["reply"]);
        assert_eq!(
            forest.warnings,
            vec![ThreadWarning::Orphan {
                comment_id: "lost".to_string(),
                missing_parent: "gone".to_string(),
            }]
        );
    }

    #[test]
    fn two_comment_cycle_is_a_data_integrity_error() {
        let records = vec![
            record("root", None, 0),
            record("A", Some("B"), 1),
            record("B", Some("A"), 2),
        ];

        match assemble(records) {
            Err(CommentError::DataIntegrity(msg)) => {
                assert!(msg.contains("A") && msg.contains("B"), "{}", msg)
            }
            other => panic!("expected DataIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn self_parent_is_a_data_integrity_error() {
        let records = vec![record("A", Some("A"), 1)];
        assert!(matches!(
            assemble(records),
            Err(CommentError::DataIntegrity(_))
        ));
    }

    #[test]
    fn subtree_below_a_cycle_is_rejected_too() {
        let records = vec![
            record("A", Some("C"), 1),
            record("B", Some("A"), 2),
            record("C", Some("B"), 3),
            record("D", Some("B"), 4),
        ];
        assert!(matches!(
            assemble(records),
            Err(CommentError::DataIntegrity(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let records = vec![record("A", None, 1), record("A", None, 2)];
        assert!(matches!(
            assemble(records),
            Err(CommentError::DataIntegrity(_))
        ));
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        let forest = assemble(Vec::new()).unwrap();
        assert!(forest.roots.is_empty());
        assert!(forest.warnings.is_empty());
    }

    #[test]
    fn long_reply_chain_does_not_recurse() {
        let depth = 2_000;
        let mut records = vec![record("n0", None, 0)];
        for i in 1..depth {
            let parent = format!("n{}", i - 1);
            records.push(record(&format!("n{}", i), Some(&parent), i));
        }

        let forest = assemble(records).unwrap();
        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.roots[0].subtree_len(), depth as usize);
    }
}
