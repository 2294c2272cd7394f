//! prefab 节点树的替换与合并
//!
//! 新旧子节点按（兄弟节点中的名称，同名出现次序）配对。配对成功的节点
//! 继承旧节点的 ID 并递归合并；新节点分配新 ID；未配对的旧节点由
//! [`ReplaceMode`] 决定去留。

use std::collections::HashMap;

use super::{ReplaceMode, StoredNode};

/// 把 `new` 合并到 `old` 上，返回替换后的节点树
pub(crate) fn merge(
    old: StoredNode,
    mut new: StoredNode,
    mode: ReplaceMode,
    allocate: &mut dyn FnMut() -> u64,
) -> StoredNode {
    new.file_id = old.file_id;

    let mut old_children: HashMap<(String, usize), StoredNode> = HashMap::new();
    let mut old_order = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for child in old.children {
        let occurrence = next_occurrence(&mut seen, &child.name);
        let key = (child.name.clone(), occurrence);
        old_order.push(key.clone());
        old_children.insert(key, child);
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let new_children = std::mem::take(&mut new.children);
    for child in new_children {
        let occurrence = next_occurrence(&mut seen, &child.name);
        let merged = match old_children.remove(&(child.name.clone(), occurrence)) {
            Some(old_child) => merge(old_child, child, mode, allocate),
            None => assign_ids(child, allocate),
        };
        new.children.push(merged);
    }

    if mode == ReplaceMode::MergeByName {
        for key in old_order {
            if let Some(left_behind) = old_children.remove(&key) {
                new.children.push(left_behind);
            }
        }
    }

    new
}

/// 为子树中还没有 ID 的节点分配 ID
pub(crate) fn assign_ids(mut node: StoredNode, allocate: &mut dyn FnMut() -> u64) -> StoredNode {
    if node.file_id == 0 {
        node.file_id = allocate();
    }
    let children = std::mem::take(&mut node.children);
    for child in children {
        node.children.push(assign_ids(child, allocate));
    }
    node
}

fn next_occurrence(seen: &mut HashMap<String, usize>, name: &str) -> usize {
    let counter = seen.entry(name.to_string()).or_insert(0);
    let occurrence = *counter;
    *counter += 1;
    occurrence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Transform;

    fn node(name: &str, children: Vec<StoredNode>) -> StoredNode {
        let mut n = StoredNode::new(name, Transform::identity());
        n.children = children;
        n
    }

    fn counter() -> impl FnMut() -> u64 {
        let mut next = 100;
        move || {
            next += 1;
            next
        }
    }

    #[test]
    fn test_matched_nodes_keep_ids() {
        let mut alloc = counter();
        let old = assign_ids(node("root", vec![node("a", vec![]), node("b", vec![])]), &mut alloc);
        let a_id = old.children[0].file_id;

        let new = node("root", vec![node("a", vec![]), node("c", vec![])]);
        let merged = merge(old, new, ReplaceMode::NameBased, &mut alloc);

        assert_eq!(merged.children.len(), 2);
        assert_eq!(merged.children[0].file_id, a_id);
        assert!(merged.children[1].file_id > a_id);
        assert!(merged.find("b").is_none());
    }

    #[test]
    fn test_merge_keeps_unmatched_old_nodes() {
        let mut alloc = counter();
        let old = assign_ids(node("root", vec![node("a", vec![]), node("b", vec![])]), &mut alloc);
        let b_id = old.children[1].file_id;

        let new = node("root", vec![node("a", vec![])]);
        let merged = merge(old, new, ReplaceMode::MergeByName, &mut alloc);

        assert_eq!(merged.children.len(), 2);
        assert_eq!(merged.find("b").map(|n| n.file_id), Some(b_id));
    }

    #[test]
    fn test_duplicate_names_pair_by_occurrence() {
        let mut alloc = counter();
        let old = assign_ids(node("root", vec![node("x", vec![]), node("x", vec![])]), &mut alloc);
        let ids: Vec<u64> = old.children.iter().map(|c| c.file_id).collect();

        let merged = merge(
            old,
            node("root", vec![node("x", vec![]), node("x", vec![]), node("x", vec![])]),
            ReplaceMode::NameBased,
            &mut alloc,
        );

        assert_eq!(merged.children[0].file_id, ids[0]);
        assert_eq!(merged.children[1].file_id, ids[1]);
        assert!(!ids.contains(&merged.children[2].file_id));
    }
}
