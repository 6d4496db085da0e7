//! Keyed list diffing.
//!
//! ```text
//! a: [p0 p1 | x  y  z | s0 s1]      p = common prefix, s = common suffix
//! b: [p0 p1 | z  w  x | s0 s1]
//!            └ middle ┘
//! ```
//!
//! The suffix is patched first (the cursor runs right to left), the
//! prefix last. In the middle, entries whose key survives are patched in
//! place; only entries outside the longest increasing subsequence of
//! their old positions are moved.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::op::Op;
use super::reconciler::{entry_child, Reconciler};
use super::tree::SNodeId;
use crate::error::RenderError;
use crate::types::Key;

impl Reconciler<'_> {
    /// Diff keyed entries `a` (last render) against `b`. Both lists were
    /// validated; the children of `id` mirror `a`.
    ///
    /// If an entry fails, every entry is unmounted and the list is left
    /// empty, so the next render mounts it from scratch.
    pub(super) fn update_keyed(&mut self, id: SNodeId, a: &[Op], b: &[Op]) -> Result<(), RenderError> {
        let old = std::mem::take(&mut self.tree[id].children);
        let mut result: Vec<Option<SNodeId>> = vec![None; b.len()];
        match self.diff_keyed(id, a, b, &old, &mut result) {
            Ok(()) => {
                self.tree[id].children = result;
                Ok(())
            }
            Err(err) => {
                trace!(?id, "keyed diff failed, dropping entries");
                for child in old.into_iter().chain(result).flatten() {
                    self.unmount(child);
                }
                self.tree[id].op = Op::TrackByKey(Rc::from(Vec::<Op>::new()));
                Err(err)
            }
        }
    }

    fn diff_keyed(
        &mut self,
        id: SNodeId,
        a: &[Op],
        b: &[Op],
        old: &[Option<SNodeId>],
        result: &mut [Option<SNodeId>],
    ) -> Result<(), RenderError> {
        if b.is_empty() {
            for child in old.iter().flatten() {
                self.unmount(*child);
            }
            return Ok(());
        }
        if a.is_empty() {
            for (j, entry) in b.iter().enumerate().rev() {
                result[j] = self.mount(Some(id), entry_child(entry))?;
            }
            return Ok(());
        }

        // Common suffix, patched right away.
        let mut start = 0;
        let (mut a_end, mut b_end) = (a.len(), b.len());
        while a_end > start && b_end > start && a[a_end - 1].key() == b[b_end - 1].key() {
            a_end -= 1;
            b_end -= 1;
            result[b_end] = self.patch(Some(id), old[a_end], entry_child(&b[b_end]))?;
        }
        // Common prefix, patched last.
        while start < a_end && start < b_end && a[start].key() == b[start].key() {
            start += 1;
        }

        if start == a_end {
            for j in (start..b_end).rev() {
                result[j] = self.mount(Some(id), entry_child(&b[j]))?;
            }
        } else if start == b_end {
            for child in old[start..a_end].iter().flatten() {
                self.unmount(*child);
            }
        } else {
            self.update_middle(id, a, b, old, result, start, a_end, b_end)?;
        }

        for j in (0..start).rev() {
            result[j] = self.patch(Some(id), old[j], entry_child(&b[j]))?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn update_middle(
        &mut self,
        id: SNodeId,
        a: &[Op],
        b: &[Op],
        old: &[Option<SNodeId>],
        result: &mut [Option<SNodeId>],
        start: usize,
        a_end: usize,
        b_end: usize,
    ) -> Result<(), RenderError> {
        let key_index: HashMap<&Key, usize> = (start..b_end)
            .filter_map(|j| b[j].key().map(|key| (key, j)))
            .collect();

        // sources[j - start] = old position of b[j], if it existed.
        let mut sources: Vec<Option<usize>> = vec![None; b_end - start];
        let mut moved = false;
        let mut pos = 0;
        for i in start..a_end {
            let found = a[i].key().and_then(|key| key_index.get(key)).copied();
            match found {
                Some(j) => {
                    sources[j - start] = Some(i);
                    if pos > j {
                        moved = true;
                    } else {
                        pos = j;
                    }
                }
                None => {
                    if let Some(child) = old[i] {
                        self.unmount(child);
                    }
                }
            }
        }

        let keep = if moved {
            longest_increasing(&sources)
        } else {
            vec![true; sources.len()]
        };
        trace!(entries = sources.len(), moved, "keyed diff");

        for j in (start..b_end).rev() {
            let child = entry_child(&b[j]);
            result[j] = match sources[j - start] {
                None => self.mount(Some(id), child)?,
                Some(i) => {
                    let cursor = self.next;
                    let patched = self.patch(Some(id), old[i], child)?;
                    if !keep[j - start] && patched.is_some() && patched == old[i] {
                        if let Some(entry) = patched {
                            self.move_before(entry, cursor);
                        }
                    }
                    patched
                }
            };
        }
        Ok(())
    }

    /// Move the top-level DOM nodes of `id` before `cursor`, keeping their
    /// order, and leave the cursor on the first of them.
    fn move_before(&mut self, id: SNodeId, cursor: Option<crate::dom::NodeId>) {
        let mut nodes = Vec::new();
        self.dom_nodes(id, &mut nodes);
        for &node in &nodes {
            self.dom.insert_before(self.parent, node, cursor);
        }
        self.next = nodes.first().copied().or(cursor);
    }
}

/// Mark the positions forming a longest increasing subsequence of the
/// `Some` entries of `sources`.
///
/// Patience sorting: `tails[k]` is the position ending the best known run
/// of length `k + 1`. Equal-length candidates keep the one found first by
/// the binary search.
pub(crate) fn longest_increasing(sources: &[Option<usize>]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; sources.len()];
    for (j, source) in sources.iter().enumerate() {
        let Some(value) = *source else {
            continue;
        };
        let k = tails.partition_point(|&t| sources[t].is_some_and(|s| s < value));
        if k > 0 {
            prev[j] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(j);
        } else {
            tails[k] = j;
        }
    }

    let mut marks = vec![false; sources.len()];
    let mut current = tails.last().copied();
    while let Some(j) = current {
        marks[j] = true;
        current = prev[j];
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RenderConfig, UpdateMode};
    use crate::dom::{Dom, MemoryDom, NodeId};
    use crate::runtime::Prototypes;
    use crate::scheduler::Scheduler;
    use crate::vdom::tree::Tree;
    use pretty_assertions::assert_eq;

    fn marked(sources: &[Option<usize>]) -> Vec<usize> {
        longest_increasing(sources)
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(j, _)| j)
            .collect()
    }

    #[test]
    fn test_lis_basic() {
        let s = [Some(2), Some(0), Some(1), Some(3)];
        assert_eq!(marked(&s), vec![1, 2, 3]);
    }

    #[test]
    fn test_lis_skips_new_entries() {
        let s = [None, Some(1), None, Some(0), Some(2)];
        assert_eq!(marked(&s).len(), 2);
        assert!(!longest_increasing(&s)[0]);
        assert!(!longest_increasing(&s)[2]);
    }

    #[test]
    fn test_lis_reversed_keeps_one() {
        let s = [Some(3), Some(2), Some(1), Some(0)];
        assert_eq!(marked(&s).len(), 1);
    }

    struct Fixture {
        dom: MemoryDom,
        tree: Tree,
        prototypes: Prototypes,
        scheduler: Scheduler,
        config: RenderConfig,
        container: NodeId,
        root: Option<SNodeId>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut dom = MemoryDom::new();
            let container = dom.create_element("ul", false);
            Self {
                dom,
                tree: Tree::new(),
                prototypes: Prototypes::new(),
                scheduler: Scheduler::new(UpdateMode::Sync),
                config: RenderConfig::default(),
                container,
                root: None,
            }
        }

        fn render(&mut self, keys: &[&str]) -> Result<(), RenderError> {
            let op = Op::keyed_list(keys.iter().copied(), |k| *k, |k| Op::text(*k));
            let mut rec = Reconciler::new(
                &mut self.dom,
                &mut self.tree,
                &mut self.prototypes,
                &self.scheduler,
                &self.config,
            );
            rec.at(self.container, None);
            self.root = rec.render(self.root, &op)?;
            Ok(())
        }

        fn text(&self) -> String {
            self.dom.inner_html(self.container)
        }
    }

    fn diff(from: &[&str], to: &[&str]) -> (String, usize, usize) {
        let mut f = Fixture::new();
        f.render(from).unwrap();
        f.dom.reset_stats();
        f.render(to).unwrap();
        let stats = f.dom.stats();
        (f.text(), stats.moved, stats.created)
    }

    #[test]
    fn test_swap_moves_once() {
        assert_eq!(diff(&["a", "b"], &["b", "a"]), ("ba".into(), 1, 0));
    }

    #[test]
    fn test_prefix_suffix_insert() {
        assert_eq!(diff(&["a", "d"], &["a", "b", "c", "d"]), ("abcd".into(), 0, 2));
    }

    #[test]
    fn test_prefix_suffix_remove() {
        let (html, moved, created) = diff(&["a", "b", "c", "d"], &["a", "d"]);
        assert_eq!((html.as_str(), moved, created), ("ad", 0, 0));
    }

    #[test]
    fn test_middle_mixed() {
        let (html, moved, created) = diff(&["a", "x", "y", "z", "b"], &["a", "z", "w", "x", "b"]);
        assert_eq!(html, "azwxb");
        assert_eq!(created, 1);
        assert_eq!(moved, 1);
    }

    #[test]
    fn test_replace_all_keys() {
        let (html, moved, created) = diff(&["a", "b"], &["c", "d"]);
        assert_eq!((html.as_str(), moved, created), ("cd", 0, 2));
    }

    #[test]
    fn test_clear_and_fill() {
        assert_eq!(diff(&["a", "b"], &[]), (String::new(), 0, 0));
        assert_eq!(diff(&[], &["a", "b"]), ("ab".into(), 0, 2));
    }

    #[test]
    fn test_duplicate_key_leaves_dom_untouched() {
        let mut f = Fixture::new();
        f.render(&["a", "b"]).unwrap();
        f.dom.reset_stats();
        let err = f.render(&["a", "a"]).unwrap_err();
        assert_eq!(err, RenderError::DuplicateKey { key: "a".into() });
        assert_eq!(f.dom.stats().total(), 0);
        assert_eq!(f.text(), "ab");
    }

    #[test]
    fn test_nodes_are_reused() {
        let mut f = Fixture::new();
        f.render(&["a", "b", "c"]).unwrap();
        let before: Vec<NodeId> = f.dom.children(f.container).to_vec();
        f.render(&["c", "a", "b"]).unwrap();
        let after = f.dom.children(f.container).to_vec();
        assert_eq!(after, vec![before[2], before[0], before[1]]);
        assert_eq!(f.dom.first_child(f.container), Some(before[2]));
    }
}
