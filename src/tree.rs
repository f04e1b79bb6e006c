//! 层级结构构建
//! 权限与用户组都通过 parent_id 组织成森林，这里用一次扫描加索引表完成组装

use crate::models::rbac::{Permission, UserGroup};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// 可以挂到树上的节点
pub trait TreeNode {
    fn node_id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
}

impl TreeNode for Permission {
    fn node_id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

impl TreeNode for UserGroup {
    fn node_id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

/// 树节点（序列化时节点字段平铺，附带 children）
#[derive(Debug, Clone, Serialize)]
pub struct TreeItem<T> {
    #[serde(flatten)]
    pub node: T,
    pub children: Vec<TreeItem<T>>,
}

impl<T> TreeItem<T> {
    fn leaf(node: T) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// 子树节点总数（含自身）
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(item) = stack.pop() {
            count += 1;
            stack.extend(item.children.iter());
        }
        count
    }
}

// 逐层拆开再释放，深链不会递归析构
impl<T> Drop for TreeItem<T> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut item) = stack.pop() {
            stack.append(&mut item.children);
        }
    }
}

/// 构建森林
///
/// 父节点不存在的节点作为根；环上的节点按输入顺序取第一个作为根，
/// 其余成员挂在它下面。每个节点只出现一次。同级节点按 `order` 排序（稳定）。
pub fn build_forest<T, F>(nodes: Vec<T>, mut order: F) -> Vec<TreeItem<T>>
where
    T: TreeNode,
    F: FnMut(&T, &T) -> Ordering,
{
    let index: HashMap<Uuid, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.node_id(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        match node.parent_id().and_then(|parent| index.get(&parent)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    // 从根出发不可达的节点都在环上（或挂在环下）
    let mut reached = vec![false; nodes.len()];
    mark_reachable(&roots, &children, &mut reached);
    for i in 0..nodes.len() {
        if !reached[i] {
            roots.push(i);
            mark_reachable(&[i], &children, &mut reached);
        }
    }

    for siblings in children.iter_mut() {
        siblings.sort_by(|&a, &b| order(&nodes[a], &nodes[b]));
    }
    roots.sort_by(|&a, &b| order(&nodes[a], &nodes[b]));

    let mut slots: Vec<Option<T>> = nodes.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|root| take_subtree(root, &mut slots, &children))
        .collect()
}

fn mark_reachable(start: &[usize], children: &[Vec<usize>], reached: &mut [bool]) {
    let mut stack = start.to_vec();
    while let Some(i) = stack.pop() {
        if reached[i] {
            continue;
        }
        reached[i] = true;
        stack.extend(children[i].iter().copied());
    }
}

fn take_subtree<T>(
    root: usize,
    slots: &mut [Option<T>],
    children: &[Vec<usize>],
) -> Option<TreeItem<T>> {
    // (已组装的节点, 下一个待处理子节点的位置, 节点下标)
    let mut stack = vec![(TreeItem::leaf(slots[root].take()?), 0usize, root)];

    while let Some((_, cursor, index)) = stack.last_mut() {
        if let Some(&child) = children[*index].get(*cursor) {
            *cursor += 1;
            // 已取出的节点跳过，环在这里被截断
            if let Some(node) = slots[child].take() {
                stack.push((TreeItem::leaf(node), 0, child));
            }
            continue;
        }

        let (item, _, _) = stack.pop()?;
        match stack.last_mut() {
            Some((parent, _, _)) => parent.children.push(item),
            None => return Some(item),
        }
    }

    None
}

/// 权限树，同级按 sort 升序
pub fn permission_tree(permissions: Vec<Permission>) -> Vec<TreeItem<Permission>> {
    build_forest(permissions, |a, b| a.sort.cmp(&b.sort))
}

/// 用户组树，同级按名称排序
pub fn group_tree(groups: Vec<UserGroup>) -> Vec<TreeItem<UserGroup>> {
    build_forest(groups, |a, b| a.name.cmp(&b.name))
}
