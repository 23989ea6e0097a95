//! Reply threads: flat, chronological replies assembled into a forest.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Anything that can sit in a reply tree.
pub trait Threaded {
    fn thread_id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;
}

/// One node of an assembled thread. Serializes as the item's own fields plus
/// a `children` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<ThreadNode<T>>,
}

impl<T> ThreadNode<T> {
    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(ThreadNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Assemble a flat list into a forest, keeping input order among siblings.
///
/// Every item appears exactly once. An item becomes a root when it has no
/// parent, when its parent is not in `items` (hidden or deleted), or when it
/// names itself as parent. Items caught in a parent cycle are promoted to
/// roots as well, so nothing is dropped.
pub fn build_thread<T: Threaded>(items: Vec<T>) -> Vec<ThreadNode<T>> {
    let ids: HashSet<String> = items.iter().map(|i| i.thread_id().to_string()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        let parent = item
            .parent_id()
            .filter(|p| *p != item.thread_id() && ids.contains(*p))
            .map(str::to_string);
        match parent {
            Some(p) => children.entry(p).or_default().push(item),
            None => roots.push(item),
        }
    }

    let mut forest: Vec<ThreadNode<T>> = roots
        .into_iter()
        .map(|r| attach(r, &mut children))
        .collect();

    // Whatever is left is only reachable through a cycle.
    while let Some(key) = children.keys().next().cloned() {
        for item in children.remove(&key).unwrap_or_default() {
            forest.push(attach(item, &mut children));
        }
    }

    forest
}

fn attach<T: Threaded>(item: T, children: &mut HashMap<String, Vec<T>>) -> ThreadNode<T> {
    let kids = children.remove(item.thread_id()).unwrap_or_default();
    ThreadNode {
        children: kids.into_iter().map(|c| attach(c, children)).collect(),
        item,
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        parent: Option<String>,
    }

    impl Threaded for Item {
        fn thread_id(&self) -> &str {
            &self.id
        }
        fn parent_id(&self) -> Option<&str> {
            self.parent.as_deref()
        }
    }

    fn item(id: &str, parent: Option<&str>) -> Item {
        Item {
            id: id.into(),
            parent: parent.map(Into::into),
        }
    }

    fn ids<T: Threaded>(nodes: &[ThreadNode<T>]) -> Vec<&str> {
        nodes.iter().map(|n| n.item.thread_id()).collect()
    }

    #[test]
    fn flat_list_is_all_roots() {
        let forest = build_thread(vec![item("a", None), item("b", None)]);
        assert_eq!(ids(&forest), ["a", "b"]);
        assert!(forest.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn deep_chain_is_fully_attached() {
        let items = vec![
            item("r", None),
            item("d1", Some("r")),
            item("d2", Some("d1")),
            item("d3", Some("d2")),
            item("d4", Some("d3")),
            item("d5", Some("d4")),
        ];
        let forest = build_thread(items);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].len(), 6);

        let mut node = &forest[0];
        for expected in ["d1", "d2", "d3", "d4", "d5"] {
            assert_eq!(node.children.len(), 1);
            node = &node.children[0];
            assert_eq!(node.item.id, expected);
        }
    }

    #[test]
    fn siblings_keep_input_order() {
        let forest = build_thread(vec![
            item("r", None),
            item("c2", Some("r")),
            item("c1", Some("r")),
        ]);
        assert_eq!(ids(&forest[0].children), ["c2", "c1"]);
    }

    #[test]
    fn missing_parent_promotes_to_root() {
        let forest = build_thread(vec![item("a", None), item("orphan", Some("gone"))]);
        assert_eq!(ids(&forest), ["a", "orphan"]);
    }

    #[test]
    fn self_parent_is_a_root() {
        let forest = build_thread(vec![item("a", Some("a"))]);
        assert_eq!(ids(&forest), ["a"]);
    }

    #[test]
    fn cycle_is_not_dropped() {
        let forest = build_thread(vec![item("a", Some("b")), item("b", Some("a"))]);
        let total: usize = forest.iter().map(ThreadNode::len).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn serializes_flattened() {
        let forest = build_thread(vec![item("a", None), item("b", Some("a"))]);
        let json = serde_json::to_value(&forest[0]).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["children"][0]["id"], "b");
    }
}
