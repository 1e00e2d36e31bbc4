// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Field-sensitive liveness state.
//!
//! Each checked value owns a tree of path nodes, one per sub-object the
//! function actually touches. Nodes are created lazily on first use; a node
//! with no recorded event inherits its nearest recorded ancestor's state, so
//! consuming a parent implicitly consumes every child without materializing
//! the full layout.

use std::collections::BTreeMap;

use sable_ir::{Projection, Span, ValueId};

/// How a use interacts with liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Consuming,
    Borrowing,
    Reinitializing,
    IgnoredBinding,
}

/// A recorded consuming use; conflicts reference these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub span: Span,
}

/// Liveness of one path node.
///
/// `PartiallyConsumed` is not stored: it is the derived condition of a node
/// whose subtree mixes consumed and unconsumed children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeState {
    /// No recorded event; inherits from the nearest recorded ancestor.
    #[default]
    Untouched,
    /// Explicitly (re)initialized here; overrides any consumed ancestor.
    Fresh,
    /// Consumed on every path reaching this point.
    Consumed { uses: Vec<Use> },
    /// Consumed on some but not all predecessor paths; reconciled only by a
    /// reinitializing use before the next conflicting use.
    MaybeConsumed { uses: Vec<Use> },
}

impl NodeState {
    fn consumed_uses(&self) -> Option<&[Use]> {
        match self {
            NodeState::Consumed { uses } | NodeState::MaybeConsumed { uses } => Some(uses),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct PathNode {
    state: NodeState,
    children: BTreeMap<Projection, PathNode>,
}

impl PathNode {
    /// Uses recorded anywhere in this subtree (excluding this node's own
    /// state). Reinitialized subtrees contribute nothing: reinit clears
    /// children, and a consumed node's children were cleared on consume.
    fn subtree_uses(&self, out: &mut Vec<Use>) {
        for child in self.children.values() {
            if let Some(uses) = child.state.consumed_uses() {
                push_unique(out, uses);
            }
            child.subtree_uses(out);
        }
    }

    fn collect_consumed(
        &self,
        value: ValueId,
        path: &mut Vec<Projection>,
        out: &mut Vec<(ValueId, Vec<Projection>, Vec<Use>)>,
    ) {
        if let Some(uses) = self.state.consumed_uses() {
            out.push((value, path.clone(), uses.to_vec()));
        }
        for (proj, child) in &self.children {
            path.push(*proj);
            child.collect_consumed(value, path, out);
            path.pop();
        }
    }
}

fn push_unique(out: &mut Vec<Use>, uses: &[Use]) {
    for u in uses {
        if !out.contains(u) {
            out.push(*u);
        }
    }
}

/// Path-state tree for one checked value.
#[derive(Debug, Clone, PartialEq, Default)]
struct ValueState {
    root: PathNode,
}

impl ValueState {
    fn node_mut(&mut self, path: &[Projection]) -> &mut PathNode {
        let mut node = &mut self.root;
        for proj in path {
            node = node.children.entry(*proj).or_default();
        }
        node
    }

    /// Prior consuming uses that a use of `path` conflicts with: the
    /// deepest recorded ancestor if it is consumed, plus every consumed
    /// node strictly below `path`.
    fn conflicts(&self, path: &[Projection]) -> Vec<Use> {
        let mut governing: &NodeState = &self.root.state;
        let mut node = Some(&self.root);
        for proj in path {
            node = node.and_then(|n| n.children.get(proj));
            if let Some(n) = node {
                if n.state != NodeState::Untouched {
                    governing = &n.state;
                }
            }
        }

        let mut out = Vec::new();
        if let Some(uses) = governing.consumed_uses() {
            push_unique(&mut out, uses);
        }
        if let Some(n) = node {
            n.subtree_uses(&mut out);
        }
        out
    }

    fn consume(&mut self, path: &[Projection], span: Span) {
        let node = self.node_mut(path);
        let mut uses = match std::mem::take(&mut node.state) {
            NodeState::Consumed { uses } | NodeState::MaybeConsumed { uses } => uses,
            _ => Vec::new(),
        };
        push_unique(&mut uses, &[Use { span }]);
        node.state = NodeState::Consumed { uses };
        node.children.clear();
    }

    fn reinit(&mut self, path: &[Projection]) {
        let node = self.node_mut(path);
        node.state = NodeState::Fresh;
        node.children.clear();
    }
}

/// Field-path state for every checked value at one program point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockState {
    values: BTreeMap<ValueId, ValueState>,
}

impl BlockState {
    /// Record a use, returning the prior consuming uses it conflicts with.
    pub fn record_use(
        &mut self,
        value: ValueId,
        path: &[Projection],
        kind: UseKind,
        span: Span,
    ) -> Vec<Use> {
        let vs = self.values.entry(value).or_default();
        match kind {
            UseKind::Consuming => {
                let conflicts = vs.conflicts(path);
                vs.consume(path, span);
                conflicts
            }
            UseKind::Borrowing => vs.conflicts(path),
            UseKind::Reinitializing => {
                vs.reinit(path);
                Vec::new()
            }
            UseKind::IgnoredBinding => Vec::new(),
        }
    }

    /// Read-only conflict query; used for exit and loop checks.
    pub fn conflicts_at(&self, value: ValueId, path: &[Projection]) -> Vec<Use> {
        self.values
            .get(&value)
            .map(|vs| vs.conflicts(path))
            .unwrap_or_default()
    }

    /// Every (value, path) recorded as consumed or maybe-consumed, with the
    /// consuming uses. Deterministic order: values ascending, paths in
    /// projection order.
    pub fn consumed_paths(&self) -> Vec<(ValueId, Vec<Projection>, Vec<Use>)> {
        let mut out = Vec::new();
        for (value, vs) in &self.values {
            let mut path = Vec::new();
            vs.root.collect_consumed(*value, &mut path, &mut out);
        }
        out
    }

    /// Merge predecessor states with the all-or-nothing rule: a path is
    /// Consumed only if consumed on every incoming path, Unconsumed only if
    /// unconsumed on every incoming path, and MaybeConsumed otherwise.
    pub fn merge(states: &[BlockState]) -> BlockState {
        match states {
            [] => BlockState::default(),
            [only] => only.clone(),
            [first, rest @ ..] => {
                let mut acc = first.clone();
                for s in rest {
                    acc = merge_two(&acc, s);
                }
                acc
            }
        }
    }
}

fn merge_two(a: &BlockState, b: &BlockState) -> BlockState {
    let mut values = BTreeMap::new();
    let keys: std::collections::BTreeSet<ValueId> = a
        .values
        .keys()
        .chain(b.values.keys())
        .copied()
        .collect();
    for value in keys {
        let an = a.values.get(&value).map(|v| &v.root);
        let bn = b.values.get(&value).map(|v| &v.root);
        if let Some(root) = merge_node(an, bn, &NodeState::Untouched, &NodeState::Untouched) {
            values.insert(value, ValueState { root });
        }
    }
    BlockState { values }
}

fn effective<'a>(node: Option<&'a PathNode>, inherit: &'a NodeState) -> &'a NodeState {
    match node {
        Some(n) if n.state != NodeState::Untouched => &n.state,
        _ => inherit,
    }
}

fn combine(a: &NodeState, b: &NodeState) -> NodeState {
    use NodeState::*;
    match (a.consumed_uses(), b.consumed_uses()) {
        (Some(ua), Some(ub)) => {
            let mut uses = ua.to_vec();
            push_unique(&mut uses, ub);
            if matches!((a, b), (Consumed { .. }, Consumed { .. })) {
                Consumed { uses }
            } else {
                MaybeConsumed { uses }
            }
        }
        (Some(u), None) | (None, Some(u)) => MaybeConsumed { uses: u.to_vec() },
        (None, None) => {
            if matches!(a, Fresh) && matches!(b, Fresh) {
                Fresh
            } else {
                Untouched
            }
        }
    }
}

fn merge_node(
    a: Option<&PathNode>,
    b: Option<&PathNode>,
    inherit_a: &NodeState,
    inherit_b: &NodeState,
) -> Option<PathNode> {
    let ea = effective(a, inherit_a);
    let eb = effective(b, inherit_b);
    let state = combine(ea, eb);

    let mut children = BTreeMap::new();
    // Children of a definitely-consumed merge were subsumed by the parent.
    if !matches!(state, NodeState::Consumed { .. }) {
        let keys: std::collections::BTreeSet<Projection> = a
            .map(|n| n.children.keys().copied().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .chain(
                b.map(|n| n.children.keys().copied().collect::<Vec<_>>())
                    .unwrap_or_default(),
            )
            .collect();
        for key in keys {
            let ac = a.and_then(|n| n.children.get(&key));
            let bc = b.and_then(|n| n.children.get(&key));
            if let Some(child) = merge_node(ac, bc, ea, eb) {
                children.insert(key, child);
            }
        }
    }

    if state == NodeState::Untouched && children.is_empty() {
        return None;
    }
    Some(PathNode { state, children })
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: Projection = Projection::Field(0);
    const M: Projection = Projection::Field(1);

    fn v(n: u32) -> ValueId {
        ValueId(n)
    }

    fn sp(n: usize) -> Span {
        Span::new(n, n + 1)
    }

    #[test]
    fn double_consume_conflicts() {
        let mut s = BlockState::default();
        assert!(s.record_use(v(0), &[], UseKind::Consuming, sp(1)).is_empty());
        let conflicts = s.record_use(v(0), &[], UseKind::Consuming, sp(2));
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
    }

    #[test]
    fn reinit_clears_conflicts() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[], UseKind::Consuming, sp(1));
        s.record_use(v(0), &[], UseKind::Reinitializing, sp(2));
        assert!(s.record_use(v(0), &[], UseKind::Consuming, sp(3)).is_empty());
    }

    #[test]
    fn disjoint_sibling_fields_are_independent() {
        let mut s = BlockState::default();
        assert!(s.record_use(v(0), &[K], UseKind::Consuming, sp(1)).is_empty());
        // Sibling field: no conflict.
        assert!(s.record_use(v(0), &[M], UseKind::Consuming, sp(2)).is_empty());
    }

    #[test]
    fn consuming_parent_consumes_children() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[], UseKind::Consuming, sp(1));
        let conflicts = s.record_use(v(0), &[K], UseKind::Borrowing, sp(2));
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
    }

    #[test]
    fn consumed_child_makes_parent_partially_consumed() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[K], UseKind::Consuming, sp(1));
        // Using the whole value conflicts with the consumed child.
        let conflicts = s.record_use(v(0), &[], UseKind::Borrowing, sp(2));
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
        // But the untouched sibling is fine.
        assert!(s.record_use(v(0), &[M], UseKind::Borrowing, sp(3)).is_empty());
    }

    #[test]
    fn reinit_parent_resets_descendants() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[K], UseKind::Consuming, sp(1));
        s.record_use(v(0), &[], UseKind::Reinitializing, sp(2));
        assert!(s.record_use(v(0), &[K], UseKind::Borrowing, sp(3)).is_empty());
    }

    #[test]
    fn reinit_child_keeps_sibling_state() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[K], UseKind::Consuming, sp(1));
        s.record_use(v(0), &[M], UseKind::Consuming, sp(2));
        s.record_use(v(0), &[K], UseKind::Reinitializing, sp(3));
        assert!(s.record_use(v(0), &[K], UseKind::Borrowing, sp(4)).is_empty());
        let conflicts = s.record_use(v(0), &[M], UseKind::Borrowing, sp(5));
        assert_eq!(conflicts, vec![Use { span: sp(2) }]);
    }

    #[test]
    fn reinit_child_under_consumed_parent_overrides_for_that_child_only() {
        let mut s = BlockState::default();
        s.record_use(v(0), &[], UseKind::Consuming, sp(1));
        s.record_use(v(0), &[K], UseKind::Reinitializing, sp(2));
        assert!(s.record_use(v(0), &[K], UseKind::Borrowing, sp(3)).is_empty());
        let conflicts = s.record_use(v(0), &[M], UseKind::Borrowing, sp(4));
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
    }

    #[test]
    fn merge_consumed_on_one_side_is_maybe() {
        let mut a = BlockState::default();
        a.record_use(v(0), &[], UseKind::Consuming, sp(1));
        let b = BlockState::default();
        let merged = BlockState::merge(&[a, b]);
        let conflicts = merged.conflicts_at(v(0), &[]);
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
        // Maybe, not definitely, consumed.
        let consumed = merged.consumed_paths();
        assert_eq!(consumed.len(), 1);
    }

    #[test]
    fn merge_consumed_on_both_sides_stays_consumed() {
        let mut a = BlockState::default();
        a.record_use(v(0), &[], UseKind::Consuming, sp(1));
        let mut b = BlockState::default();
        b.record_use(v(0), &[], UseKind::Consuming, sp(2));
        let merged = BlockState::merge(&[a, b]);
        let conflicts = merged.conflicts_at(v(0), &[]);
        assert_eq!(conflicts, vec![Use { span: sp(1) }, Use { span: sp(2) }]);
    }

    #[test]
    fn merge_reinit_on_deficient_path_reconciles() {
        // Consumed then reinitialized on one side, untouched on the other.
        let mut a = BlockState::default();
        a.record_use(v(0), &[], UseKind::Consuming, sp(1));
        a.record_use(v(0), &[], UseKind::Reinitializing, sp(2));
        let b = BlockState::default();
        let merged = BlockState::merge(&[a, b]);
        assert!(merged.conflicts_at(v(0), &[]).is_empty());
    }

    #[test]
    fn merge_field_reinit_against_whole_value_reinit() {
        // Pre-branch: k consumed. One side reinits only k, the other
        // reinits the whole value; both reconcile.
        let mut pre = BlockState::default();
        pre.record_use(v(0), &[K], UseKind::Consuming, sp(1));

        let mut a = pre.clone();
        a.record_use(v(0), &[K], UseKind::Reinitializing, sp(2));
        let mut b = pre;
        b.record_use(v(0), &[], UseKind::Reinitializing, sp(3));

        let merged = BlockState::merge(&[a, b]);
        assert!(merged.conflicts_at(v(0), &[K]).is_empty());
        assert!(merged.conflicts_at(v(0), &[]).is_empty());
    }

    #[test]
    fn merge_field_reinit_on_one_side_only_stays_conflicted() {
        let mut pre = BlockState::default();
        pre.record_use(v(0), &[K], UseKind::Consuming, sp(1));

        let mut a = pre.clone();
        a.record_use(v(0), &[K], UseKind::Reinitializing, sp(2));
        let b = pre;

        let merged = BlockState::merge(&[a, b]);
        let conflicts = merged.conflicts_at(v(0), &[K]);
        assert_eq!(conflicts, vec![Use { span: sp(1) }]);
    }

    #[test]
    fn merge_three_predecessors_folds() {
        let mut a = BlockState::default();
        a.record_use(v(0), &[], UseKind::Consuming, sp(1));
        let mut b = BlockState::default();
        b.record_use(v(0), &[], UseKind::Consuming, sp(2));
        let c = BlockState::default();
        let merged = BlockState::merge(&[a, b, c]);
        let conflicts = merged.conflicts_at(v(0), &[]);
        assert_eq!(conflicts.len(), 2);
    }
}
