// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Ownership and move analysis for move-only values.
//!
//! This crate verifies the exactly-one-owner discipline field-sensitively
//! over a typed CFG:
//! - at most one consuming use reaches any program point without an
//!   intervening reinitialization, on every control-flow path
//! - by-reference parameters and `self` in non-delegating initializers are
//!   fully initialized at function exit
//! - storage that cannot be proven exclusive (class fields, globals,
//!   escaping-closure captures) is never moved from
//!
//! All violations are accumulated; the checker never stops at the first.

mod error;
mod state;

pub use error::{OwnershipError, OwnershipErrorKind, RegionWord};
pub use state::{BlockState, NodeState, Use, UseKind};

use std::collections::{BTreeMap, HashMap, HashSet};

use sable_ir::{
    BlockId, CallArg, Convention, Func, FuncKind, Inst, InstKind, Place, RegionKind, Span,
    StorageKind, Terminator, ValueId,
};
use sable_types::SymbolTable;

/// Result of ownership analysis for one function.
#[derive(Debug)]
pub struct OwnershipResult {
    pub errors: Vec<OwnershipError>,
}

impl OwnershipResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run the ownership/move checker over one function body.
pub fn check_func(symtab: &SymbolTable, func: &Func) -> OwnershipResult {
    MoveChecker::new(symtab, func).run()
}

struct MoveChecker<'a> {
    symtab: &'a SymbolTable,
    func: &'a Func,
    errors: Vec<OwnershipError>,
    /// Consuming uses of guaranteed (shared) parameters; reported once per
    /// value at the end.
    guaranteed: BTreeMap<ValueId, Vec<Span>>,
    /// Spans of consuming uses recorded while walking the current region.
    region_spans: HashSet<Span>,
    in_region: bool,
}

struct FlowGraph {
    rpo: Vec<BlockId>,
    preds: HashMap<BlockId, Vec<BlockId>>,
    back_edges: Vec<(BlockId, BlockId)>,
}

impl<'a> MoveChecker<'a> {
    fn new(symtab: &'a SymbolTable, func: &'a Func) -> Self {
        Self {
            symtab,
            func,
            errors: Vec::new(),
            guaranteed: BTreeMap::new(),
            region_spans: HashSet::new(),
            in_region: false,
        }
    }

    fn run(mut self) -> OwnershipResult {
        let func = self.func;
        let main: HashSet<BlockId> = func.main_blocks().map(|b| b.id).collect();
        let returns = self.flow(&main, func.entry, BlockState::default());
        let mut exit_state = BlockState::merge(&returns);

        // Deferred blocks run once on every exit path, after the scope's
        // own code: analyze them as an extra successor of the merged exit,
        // and let their reinitializations count toward the exit rules.
        for region in &func.regions {
            if region.kind != RegionKind::Defer {
                continue;
            }
            let set: HashSet<BlockId> = region.blocks.iter().copied().collect();
            self.enter_region();
            let region_returns = self.flow(&set, region.entry, exit_state.clone());
            let post = BlockState::merge(&region_returns);
            self.leave_region(RegionWord::Defer, region.span, &post);
            exit_state = post;
        }

        // Escaping closures run 0..n times at unknown points: analyze the
        // body against a fresh state, disconnected from the main flow.
        for region in &func.regions {
            if region.kind != RegionKind::EscapingClosure {
                continue;
            }
            let set: HashSet<BlockId> = region.blocks.iter().copied().collect();
            self.enter_region();
            let region_returns = self.flow(&set, region.entry, BlockState::default());
            let post = BlockState::merge(&region_returns);
            self.leave_region(RegionWord::Closure, region.span, &post);
        }

        self.check_exit(&exit_state);
        self.report_guaranteed();

        OwnershipResult {
            errors: self.errors,
        }
    }

    /// Forward dataflow over one block set. Loops need no fixpoint: back
    /// edges are excluded from merges and re-checked once afterwards.
    /// Returns the state at each `Return` point.
    fn flow(
        &mut self,
        block_set: &HashSet<BlockId>,
        entry: BlockId,
        initial: BlockState,
    ) -> Vec<BlockState> {
        let func = self.func;
        let graph = flow_graph(func, block_set, entry);
        let back: HashSet<(BlockId, BlockId)> = graph.back_edges.iter().copied().collect();

        let mut entry_states: HashMap<BlockId, BlockState> = HashMap::new();
        let mut exit_states: HashMap<BlockId, BlockState> = HashMap::new();
        let mut returns = Vec::new();

        for &b in &graph.rpo {
            let state = if b == entry {
                initial.clone()
            } else {
                let pred_states: Vec<BlockState> = graph
                    .preds
                    .get(&b)
                    .map(|ps| {
                        ps.iter()
                            .filter(|p| !back.contains(&(**p, b)))
                            .filter_map(|p| exit_states.get(p).cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                BlockState::merge(&pred_states)
            };
            entry_states.insert(b, state.clone());

            let mut state = state;
            let block = func.block(b);
            for inst in &block.insts {
                self.check_inst(inst, &mut state);
            }
            match &block.terminator {
                Terminator::Switch {
                    scrutinee, span, ..
                } => {
                    self.use_place(scrutinee, UseKind::Consuming, *span, &mut state);
                }
                Terminator::Return { .. } => returns.push(state.clone()),
                _ => {}
            }
            exit_states.insert(b, state);
        }

        // Single back-edge re-check: anything consumed at the latch that
        // was unconsumed at loop entry would be re-consumed by the next
        // iteration.
        for (latch, header) in &graph.back_edges {
            let (Some(latch_exit), Some(header_entry)) =
                (exit_states.get(latch), entry_states.get(header))
            else {
                continue;
            };
            for (value, path, uses) in latch_exit.consumed_paths() {
                if header_entry.conflicts_at(value, &path).is_empty() {
                    let name = self.place_name(value, &path);
                    let spans: Vec<Span> = uses.iter().map(|u| u.span).collect();
                    self.errors.push(OwnershipError {
                        span: spans[0],
                        kind: OwnershipErrorKind::ConsumedInLoop { name, uses: spans },
                    });
                }
            }
        }

        returns
    }

    fn check_inst(&mut self, inst: &Inst, state: &mut BlockState) {
        match &inst.kind {
            InstKind::Bind { src, .. } => {
                self.use_place(src, UseKind::Consuming, inst.span, state);
            }
            InstKind::Read { place } => {
                self.use_place(place, UseKind::Borrowing, inst.span, state);
            }
            InstKind::Assign { dst } => {
                self.use_place(dst, UseKind::Reinitializing, inst.span, state);
            }
            InstKind::Discard { place } => {
                self.use_place(place, UseKind::IgnoredBinding, inst.span, state);
            }
            InstKind::Call { args, .. } => self.check_call(args, state),
        }
    }

    /// Argument lists are checked pairwise for same-call exclusivity before
    /// the individual uses are recorded: consuming the same value through
    /// two exclusive argument positions is a conflict even when each use
    /// would be legal on its own.
    fn check_call(&mut self, args: &[CallArg], state: &mut BlockState) {
        let mut skip = vec![false; args.len()];
        for i in 0..args.len() {
            for j in 0..i {
                if skip[j] || skip[i] {
                    continue;
                }
                if !places_overlap(&args[i].place, &args[j].place) {
                    continue;
                }
                if !(args[i].convention.requires_exclusive()
                    && args[j].convention.requires_exclusive())
                {
                    continue;
                }
                if !self.is_checked_root(args[i].place.root) {
                    continue;
                }
                let shorter = if args[i].place.projections.len() <= args[j].place.projections.len()
                {
                    &args[i].place
                } else {
                    &args[j].place
                };
                let name = self.place_name(shorter.root, &shorter.projections);
                self.errors.push(OwnershipError {
                    span: args[i].span,
                    kind: OwnershipErrorKind::ExclusivityConflict {
                        name,
                        first: args[j].span,
                        second: args[i].span,
                    },
                });
                skip[i] = true;
            }
        }
        for (i, arg) in args.iter().enumerate() {
            if skip[i] {
                continue;
            }
            let kind = match arg.convention {
                Convention::Owned => UseKind::Consuming,
                Convention::Shared | Convention::Exclusive => UseKind::Borrowing,
            };
            self.use_place(&arg.place, kind, arg.span, state);
        }
    }

    fn use_place(&mut self, place: &Place, kind: UseKind, span: Span, state: &mut BlockState) {
        let decl = self.func.value(place.root);
        if !self.symtab.is_checked(decl.ty) {
            return;
        }

        let mut kind = kind;
        if kind == UseKind::Consuming {
            match decl.storage {
                StorageKind::BorrowedParam => {
                    self.guaranteed.entry(place.root).or_default().push(span);
                    return;
                }
                StorageKind::Global { mutable } => {
                    let name = self.place_name(place.root, &place.projections);
                    let kind = if mutable {
                        OwnershipErrorKind::ConsumedGlobalVar { name }
                    } else {
                        OwnershipErrorKind::ConsumedGlobalLet { name }
                    };
                    self.errors.push(OwnershipError { kind, span });
                    return;
                }
                StorageKind::ClassField { mutable } => {
                    self.push_class_field_error(place, mutable, span);
                    return;
                }
                StorageKind::EscapingCapture { mutable } => {
                    let name = self.place_name(place.root, &place.projections);
                    let kind = if mutable {
                        OwnershipErrorKind::ConsumedMutableCapture { name }
                    } else {
                        OwnershipErrorKind::ConsumedImmutableCapture { name }
                    };
                    self.errors.push(OwnershipError { kind, span });
                    // Liveness is still tracked: a later use of the same
                    // capture is an ordinary use-after-consume as well.
                }
                _ => {}
            }

            // A projection through a class reference's field lands in
            // aliased storage regardless of the root's own storage kind.
            if let Some(mutable) = self.symtab.aliased_step(decl.ty, &place.projections) {
                self.push_class_field_error(place, mutable, span);
                return;
            }

            // Moving out a copyable sub-object is just a copy.
            if let Some(pty) = self.symtab.project_path(decl.ty, &place.projections) {
                if !self.symtab.is_checked(pty) {
                    kind = UseKind::Borrowing;
                }
            }
        }

        if kind == UseKind::Consuming && self.in_region {
            self.region_spans.insert(span);
        }

        let conflicts = state.record_use(place.root, &place.projections, kind, span);
        if conflicts.is_empty() {
            return;
        }
        let name = self.place_name(place.root, &place.projections);
        let spans: Vec<Span> = conflicts.iter().map(|u| u.span).collect();
        match kind {
            UseKind::Consuming => {
                let mut uses = spans;
                uses.push(span);
                self.errors.push(OwnershipError {
                    span,
                    kind: OwnershipErrorKind::ConsumedMoreThanOnce { name, uses },
                });
            }
            UseKind::Borrowing => {
                self.errors.push(OwnershipError {
                    span,
                    kind: OwnershipErrorKind::UsedAfterConsume {
                        name,
                        consumed: spans,
                        used: span,
                    },
                });
            }
            _ => {}
        }
    }

    fn push_class_field_error(&mut self, place: &Place, mutable: bool, span: Span) {
        let name = self.place_name(place.root, &place.projections);
        let kind = if mutable {
            OwnershipErrorKind::ConsumedClassVarField { name }
        } else {
            OwnershipErrorKind::ConsumedClassLetField { name }
        };
        self.errors.push(OwnershipError { kind, span });
    }

    fn enter_region(&mut self) {
        self.in_region = true;
        self.region_spans.clear();
    }

    /// Close out a non-exclusive region: every consume made inside it must
    /// have been reinitialized before the region's end, because the region
    /// may run again.
    fn leave_region(&mut self, word: RegionWord, region_span: Span, post: &BlockState) {
        for (value, path, uses) in post.consumed_paths() {
            // Escaping-capture consumes were already reported per use.
            if matches!(
                self.func.value(value).storage,
                StorageKind::EscapingCapture { .. }
            ) {
                continue;
            }
            let in_region: Vec<Span> = uses
                .iter()
                .map(|u| u.span)
                .filter(|s| self.region_spans.contains(s))
                .collect();
            if in_region.is_empty() {
                continue;
            }
            let name = self.place_name(value, &path);
            self.errors.push(OwnershipError {
                span: in_region[0],
                kind: OwnershipErrorKind::ConsumedInRegion {
                    name,
                    region: word,
                    uses: in_region,
                    region_span,
                },
            });
        }
        self.in_region = false;
        self.region_spans.clear();
    }

    /// By-reference parameters (and `self` in a non-delegating initializer)
    /// must be fully initialized when the function returns.
    fn check_exit(&mut self, exit_state: &BlockState) {
        let delegating = matches!(
            self.func.kind,
            FuncKind::Initializer { delegating: true }
        );
        for &pid in &self.func.params {
            let decl = self.func.value(pid);
            if decl.storage != StorageKind::InoutParam {
                continue;
            }
            if delegating && decl.name == "self" {
                continue;
            }
            let conflicts = exit_state.conflicts_at(pid, &[]);
            if conflicts.is_empty() {
                continue;
            }
            self.errors.push(OwnershipError {
                span: decl.span,
                kind: OwnershipErrorKind::ConsumedAtExit {
                    name: decl.name.clone(),
                    uses: conflicts.iter().map(|u| u.span).collect(),
                },
            });
        }
    }

    fn report_guaranteed(&mut self) {
        for (vid, spans) in std::mem::take(&mut self.guaranteed) {
            let decl = self.func.value(vid);
            self.errors.push(OwnershipError {
                span: decl.span,
                kind: OwnershipErrorKind::GuaranteedConsumed {
                    name: decl.name.clone(),
                    uses: spans,
                },
            });
        }
    }

    fn is_checked_root(&self, root: ValueId) -> bool {
        self.symtab.is_checked(self.func.value(root).ty)
    }

    fn place_name(&self, value: ValueId, path: &[sable_ir::Projection]) -> String {
        let decl = self.func.value(value);
        self.symtab.display_place(&decl.name, decl.ty, path)
    }
}

fn places_overlap(a: &Place, b: &Place) -> bool {
    a.root == b.root
        && (a.projections.starts_with(&b.projections)
            || b.projections.starts_with(&a.projections))
}

/// Reverse-postorder, predecessor map and back edges of one block set.
fn flow_graph(func: &Func, block_set: &HashSet<BlockId>, entry: BlockId) -> FlowGraph {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color: HashMap<BlockId, u8> = HashMap::new();
    let mut postorder = Vec::new();
    let mut back_edges = Vec::new();
    let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

    let in_set_successors = |b: BlockId| -> Vec<BlockId> {
        func.block(b)
            .terminator
            .successors()
            .into_iter()
            .filter(|s| block_set.contains(s))
            .collect()
    };

    if block_set.contains(&entry) {
        color.insert(entry, GRAY);
        stack.push((entry, in_set_successors(entry), 0));
    }
    while let Some(top) = stack.last_mut() {
        if top.2 < top.1.len() {
            let next = top.1[top.2];
            top.2 += 1;
            let node = top.0;
            match color.get(&next).copied().unwrap_or(WHITE) {
                WHITE => {
                    color.insert(next, GRAY);
                    stack.push((next, in_set_successors(next), 0));
                }
                GRAY => back_edges.push((node, next)),
                _ => {}
            }
        } else {
            let (node, _, _) = stack.pop().unwrap();
            color.insert(node, BLACK);
            postorder.push(node);
        }
    }

    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for &b in block_set {
        for s in in_set_successors(b) {
            preds.entry(s).or_default().push(b);
        }
    }

    postorder.reverse();
    FlowGraph {
        rpo: postorder,
        preds,
        back_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_ir::{FuncBuilder, Place, RegionKind, TypeId};
    use sable_types::{CaseDef, FieldDef, TypeDef, TypeKind};

    fn sp(n: usize) -> Span {
        Span::new(n, n + 1)
    }

    /// Buffer: move-only leaf. Message: move-only struct with two Buffer
    /// fields and one copyable field.
    fn symtab() -> (SymbolTable, TypeId, TypeId) {
        let mut t = SymbolTable::new();
        let buffer = t.add_opaque("Buffer", true);
        let meta = t.add_opaque("Meta", false);
        let message = t.add_type(TypeDef {
            name: "Message".into(),
            move_only: true,
            kind: TypeKind::Struct {
                fields: vec![
                    FieldDef::new("payload", buffer),
                    FieldDef::new("trailer", buffer),
                    FieldDef::new("meta", meta),
                ],
            },
        });
        (t, buffer, message)
    }

    fn kinds(result: &OwnershipResult) -> Vec<&OwnershipErrorKind> {
        result.errors.iter().map(|e| &e.kind).collect()
    }

    #[test]
    fn consumed_twice_reports_once_with_both_uses() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("double_consume");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ConsumedMoreThanOnce { name, uses } => {
                assert_eq!(name, "x");
                assert_eq!(uses, &vec![sp(10), sp(20)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(result.errors[0].span, sp(20));
    }

    #[test]
    fn consuming_in_both_branches_without_later_use_is_ok() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("branch_consume");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();
        b.branch(then_bb, else_bb);
        b.switch_to_block(then_bb);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.goto(join);
        b.switch_to_block(else_bb);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
        b.goto(join);
        b.switch_to_block(join);
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn merge_conflict_fires_once_at_next_use_with_both_predecessors() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("merge_conflict");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();
        b.branch(then_bb, else_bb);
        b.switch_to_block(then_bb);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.goto(join);
        b.switch_to_block(else_bb);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
        b.goto(join);
        b.switch_to_block(join);
        b.call1("borrow_val", Place::of(x), Convention::Shared, sp(30));
        b.ret(sp(40));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::UsedAfterConsume { consumed, used, .. } => {
                assert_eq!(consumed, &vec![sp(10), sp(20)]);
                assert_eq!(*used, sp(30));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn reinit_on_deficient_branch_reconciles_merge() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("reconciled");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let then_bb = b.create_block();
        let join = b.create_block();
        b.branch(then_bb, join);
        b.switch_to_block(then_bb);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.assign(Place::of(x), sp(11));
        b.goto(join);
        b.switch_to_block(join);
        b.call1("borrow_val", Place::of(x), Convention::Shared, sp(30));
        b.ret(sp(40));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn escaping_capture_consume_is_flagged() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("closure_capture");
        let x = b.value(
            "x",
            buffer,
            StorageKind::EscapingCapture { mutable: true },
            sp(1),
        );
        let body = b.create_block();
        b.region(
            RegionKind::EscapingClosure,
            body,
            vec![body],
            vec![x],
            sp(5),
        );
        b.ret(sp(9));
        b.switch_to_block(body);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.ret(sp(11));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0].kind,
            OwnershipErrorKind::ConsumedMutableCapture { .. }
        ));
    }

    #[test]
    fn disjoint_sibling_fields_consume_independently() {
        let (t, _, message) = symtab();
        let mut b = FuncBuilder::new("siblings");
        let a = b.value("a", message, StorageKind::LocalMut, sp(1));
        b.call1("consume_val", Place::of(a).field(0), Convention::Owned, sp(10));
        b.call1("consume_val", Place::of(a).field(1), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn inout_param_consumed_without_reinit() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("inout_exit");
        let x = b.param("x", buffer, StorageKind::InoutParam, sp(1));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.ret(sp(20));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ConsumedAtExit { name, uses } => {
                assert_eq!(name, "x");
                assert_eq!(uses, &vec![sp(10)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        // Anchored at the parameter declaration.
        assert_eq!(result.errors[0].span, sp(1));
    }

    #[test]
    fn inout_param_reinitialized_before_exit_is_ok() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("inout_ok");
        let x = b.param("x", buffer, StorageKind::InoutParam, sp(1));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.assign(Place::of(x), sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn consume_in_loop_without_reinit_is_flagged() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("loop_consume");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.goto(header);
        b.switch_to_block(header);
        b.branch(body, exit);
        b.switch_to_block(body);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.goto(header);
        b.switch_to_block(exit);
        b.ret(sp(20));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ConsumedInLoop { name, uses } => {
                assert_eq!(name, "x");
                assert_eq!(uses, &vec![sp(10)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn consume_in_loop_with_reinit_before_backedge_is_ok() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("loop_reinit");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.goto(header);
        b.switch_to_block(header);
        b.branch(body, exit);
        b.switch_to_block(body);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.assign(Place::of(x), sp(11));
        b.goto(header);
        b.switch_to_block(exit);
        b.ret(sp(20));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn defer_consume_without_reinit_is_flagged() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("defer_consume");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let body = b.create_block();
        b.region(RegionKind::Defer, body, vec![body], vec![x], sp(5));
        b.ret(sp(9));
        b.switch_to_block(body);
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.ret(sp(11));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ConsumedInRegion { region, uses, .. } => {
                assert_eq!(*region, RegionWord::Defer);
                assert_eq!(uses, &vec![sp(10)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn defer_consume_with_reinit_is_ok_and_satisfies_exit_rule() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("defer_reinit");
        let x = b.param("x", buffer, StorageKind::InoutParam, sp(1));
        let body = b.create_block();
        b.region(RegionKind::Defer, body, vec![body], vec![x], sp(5));
        // Body consumes; the deferred block reinitializes before the
        // function truly exits.
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(6));
        b.ret(sp(9));
        b.switch_to_block(body);
        b.assign(Place::of(x), sp(10));
        b.ret(sp(11));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn borrow_in_defer_after_body_consume_is_use_after_consume() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("defer_borrow");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let body = b.create_block();
        b.region(RegionKind::Defer, body, vec![body], vec![x], sp(5));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(6));
        b.ret(sp(9));
        b.switch_to_block(body);
        b.call1("borrow_val", Place::of(x), Convention::Shared, sp(10));
        b.ret(sp(11));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::UsedAfterConsume { consumed, used, .. } => {
                assert_eq!(consumed, &vec![sp(6)]);
                assert_eq!(*used, sp(10));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn class_field_consume_is_demoted_not_tracked() {
        let mut t = SymbolTable::new();
        let inner = t.add_opaque("Inner", true);
        let klass = t.add_type(TypeDef {
            name: "Node".into(),
            move_only: true,
            kind: TypeKind::Class {
                fields: vec![FieldDef::new("k", inner), FieldDef::immutable("frozen", inner)],
            },
        });
        let mut b = FuncBuilder::new("class_fields");
        let x = b.value("x", klass, StorageKind::LocalMut, sp(1));
        b.call1("consume_val", Place::of(x).field(0), Convention::Owned, sp(10));
        b.call1("consume_val", Place::of(x).field(0), Convention::Owned, sp(20));
        b.call1("consume_val", Place::of(x).field(1), Convention::Owned, sp(30));
        b.ret(sp(40));

        let result = check_func(&t, &b.finish());
        // One demotion finding per consume; no double-consume tracking
        // through aliased storage.
        assert_eq!(result.errors.len(), 3);
        assert!(matches!(
            result.errors[0].kind,
            OwnershipErrorKind::ConsumedClassVarField { .. }
        ));
        assert!(matches!(
            result.errors[1].kind,
            OwnershipErrorKind::ConsumedClassVarField { .. }
        ));
        match &result.errors[2].kind {
            OwnershipErrorKind::ConsumedClassLetField { name } => {
                assert_eq!(name, "x.frozen");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn global_storage_consume_is_demoted() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("globals");
        let g = b.value("shared_buf", buffer, StorageKind::Global { mutable: true }, sp(1));
        let c = b.value("frozen_buf", buffer, StorageKind::Global { mutable: false }, sp(2));
        b.call1("consume_val", Place::of(g), Convention::Owned, sp(10));
        b.call1("consume_val", Place::of(c), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 2);
        assert!(matches!(
            result.errors[0].kind,
            OwnershipErrorKind::ConsumedGlobalVar { .. }
        ));
        assert!(matches!(
            result.errors[1].kind,
            OwnershipErrorKind::ConsumedGlobalLet { .. }
        ));
    }

    #[test]
    fn guaranteed_param_consumes_collapse_to_one_finding() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("guaranteed");
        let x = b.param("x", buffer, StorageKind::BorrowedParam, sp(1));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::GuaranteedConsumed { name, uses } => {
                assert_eq!(name, "x");
                assert_eq!(uses, &vec![sp(10), sp(20)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn same_call_twice_owned_is_exclusivity_conflict() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("exclusivity");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        b.call(
            "swap",
            vec![
                CallArg {
                    place: Place::of(x),
                    convention: Convention::Owned,
                    span: sp(10),
                },
                CallArg {
                    place: Place::of(x),
                    convention: Convention::Owned,
                    span: sp(11),
                },
            ],
            sp(10),
        );
        b.ret(sp(20));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ExclusivityConflict { first, second, .. } => {
                assert_eq!(*first, sp(10));
                assert_eq!(*second, sp(11));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn overlapping_field_and_parent_in_one_call_conflict() {
        let (t, _, message) = symtab();
        let mut b = FuncBuilder::new("overlap");
        let a = b.value("a", message, StorageKind::LocalMut, sp(1));
        b.call(
            "merge_into",
            vec![
                CallArg {
                    place: Place::of(a),
                    convention: Convention::Exclusive,
                    span: sp(10),
                },
                CallArg {
                    place: Place::of(a).field(0),
                    convention: Convention::Owned,
                    span: sp(11),
                },
            ],
            sp(10),
        );
        b.ret(sp(20));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0].kind,
            OwnershipErrorKind::ExclusivityConflict { .. }
        ));
        // Shared args never conflict.
        let mut b2 = FuncBuilder::new("no_overlap");
        let a2 = b2.value("a", message, StorageKind::LocalMut, sp(1));
        b2.call(
            "inspect",
            vec![
                CallArg {
                    place: Place::of(a2),
                    convention: Convention::Shared,
                    span: sp(10),
                },
                CallArg {
                    place: Place::of(a2).field(0),
                    convention: Convention::Shared,
                    span: sp(11),
                },
            ],
            sp(10),
        );
        b2.ret(sp(20));
        assert!(check_func(&t, &b2.finish()).is_ok());
    }

    #[test]
    fn switch_scrutinee_consumes_and_arm_reinit_reconciles() {
        let mut t = SymbolTable::new();
        let payload = t.add_opaque("Payload", true);
        let choice = t.add_type(TypeDef {
            name: "Choice".into(),
            move_only: true,
            kind: TypeKind::Enum {
                cases: vec![
                    CaseDef::new("empty", vec![]),
                    CaseDef::new("full", vec![payload]),
                ],
            },
        });

        // Both arms reinitialize: the post-switch borrow is fine.
        let mut b = FuncBuilder::new("switch_ok");
        let e = b.value("e", choice, StorageKind::LocalMut, sp(1));
        let arm0 = b.create_block();
        let arm1 = b.create_block();
        let join = b.create_block();
        b.switch(Place::of(e), vec![arm0, arm1], sp(10));
        b.switch_to_block(arm0);
        b.assign(Place::of(e), sp(11));
        b.goto(join);
        b.switch_to_block(arm1);
        b.assign(Place::of(e), sp(12));
        b.goto(join);
        b.switch_to_block(join);
        b.call1("borrow_val", Place::of(e), Convention::Shared, sp(20));
        b.ret(sp(30));
        assert!(check_func(&t, &b.finish()).is_ok());

        // Only one arm reinitializes: the post-switch borrow conflicts
        // with the switch's consuming use.
        let mut b2 = FuncBuilder::new("switch_bad");
        let e2 = b2.value("e", choice, StorageKind::LocalMut, sp(1));
        let arm0 = b2.create_block();
        let arm1 = b2.create_block();
        let join = b2.create_block();
        b2.switch(Place::of(e2), vec![arm0, arm1], sp(10));
        b2.switch_to_block(arm0);
        b2.assign(Place::of(e2), sp(11));
        b2.goto(join);
        b2.switch_to_block(arm1);
        b2.goto(join);
        b2.switch_to_block(join);
        b2.call1("borrow_val", Place::of(e2), Convention::Shared, sp(20));
        b2.ret(sp(30));

        let result = check_func(&t, &b2.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::UsedAfterConsume { consumed, used, .. } => {
                assert_eq!(consumed, &vec![sp(10)]);
                assert_eq!(*used, sp(20));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn copyable_field_of_checked_aggregate_copies_freely() {
        let (t, _, message) = symtab();
        let mut b = FuncBuilder::new("copyable_field");
        let a = b.value("a", message, StorageKind::LocalMut, sp(1));
        b.call1("take_meta", Place::of(a).field(2), Convention::Owned, sp(10));
        b.call1("take_meta", Place::of(a).field(2), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[test]
    fn borrow_of_partially_consumed_parent_conflicts() {
        let (t, _, message) = symtab();
        let mut b = FuncBuilder::new("partial_parent");
        let a = b.value("a", message, StorageKind::LocalMut, sp(1));
        b.call1("consume_val", Place::of(a).field(0), Convention::Owned, sp(10));
        b.call1("borrow_val", Place::of(a), Convention::Shared, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::UsedAfterConsume { name, consumed, .. } => {
                assert_eq!(name, "a");
                assert_eq!(consumed, &vec![sp(10)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn delegating_initializer_self_is_exempt_from_exit_rule() {
        let (t, buffer, _) = symtab();

        let mut b = FuncBuilder::new("init_delegating");
        b.kind(FuncKind::Initializer { delegating: true });
        let this = b.param("self", buffer, StorageKind::InoutParam, sp(1));
        b.call1("consume_val", Place::of(this), Convention::Owned, sp(10));
        b.ret(sp(20));
        assert!(check_func(&t, &b.finish()).is_ok());

        let mut b2 = FuncBuilder::new("init_plain");
        b2.kind(FuncKind::Initializer { delegating: false });
        let this = b2.param("self", buffer, StorageKind::InoutParam, sp(1));
        b2.call1("consume_val", Place::of(this), Convention::Owned, sp(10));
        b2.ret(sp(20));
        let result = check_func(&t, &b2.finish());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0].kind,
            OwnershipErrorKind::ConsumedAtExit { .. }
        ));
    }

    #[test]
    fn binding_consumes_and_discard_does_not() {
        let (t, buffer, _) = symtab();
        let mut b = FuncBuilder::new("bindings");
        let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
        let y = b.value("y", buffer, StorageKind::LocalMut, sp(2));
        // `_ = x` leaves x untouched; `let y = x` consumes it.
        b.discard(Place::of(x), sp(5));
        b.bind(y, Place::of(x), sp(10));
        b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
        b.ret(sp(30));

        let result = check_func(&t, &b.finish());
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].kind {
            OwnershipErrorKind::ConsumedMoreThanOnce { uses, .. } => {
                assert_eq!(uses, &vec![sp(10), sp(20)]);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn rerunning_the_checker_is_idempotent() {
        let (t, buffer, _) = symtab();
        let build = || {
            let mut b = FuncBuilder::new("idempotent");
            let x = b.value("x", buffer, StorageKind::LocalMut, sp(1));
            b.call1("consume_val", Place::of(x), Convention::Owned, sp(10));
            b.call1("consume_val", Place::of(x), Convention::Owned, sp(20));
            b.call1("borrow_val", Place::of(x), Convention::Shared, sp(30));
            b.ret(sp(40));
            b.finish()
        };
        let first = check_func(&t, &build());
        let second = check_func(&t, &build());
        assert_eq!(format!("{:?}", first.errors), format!("{:?}", second.errors));
    }
}
