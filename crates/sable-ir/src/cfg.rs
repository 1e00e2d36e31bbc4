// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Typed control-flow graph consumed by the semantic checkers.
//!
//! The CFG is built by earlier front-end phases (parsing, name binding and
//! type checking are not part of this core). Every instruction carries the
//! source span of the construct it was lowered from, so checkers can attach
//! findings to real locations without access to the source text.

use crate::Span;

/// Handle into the symbol table's type list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

/// A variable, parameter, `self`, capture or global tracked by the checkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub u32);

/// Where a value's storage lives. Decided at model-build time; the move
/// checker derives its consumability rules from this tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// `var x` local binding.
    LocalMut,
    /// `let x` local binding.
    LocalLet,
    /// By-reference parameter; must be fully initialized at function exit.
    InoutParam,
    /// Shared/guaranteed parameter; the callee never owns it.
    BorrowedParam,
    /// Captured by an escaping closure. Read-or-reassign only.
    EscapingCapture { mutable: bool },
    /// Stored in a class instance's field. Aliasing cannot be proven
    /// exclusive, so it is read-or-reassign only.
    ClassField { mutable: bool },
    /// Process-wide storage. Read-or-reassign only.
    Global { mutable: bool },
}

/// One projection step from a value's root toward a sub-object.
///
/// Struct fields, enum case payload fields and tuple elements are a single
/// tagged union so that deep case-hierarchy destructuring goes through the
/// same code path as plain field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Projection {
    /// Struct or class field, by declaration index.
    Field(u32),
    /// Payload slot `field` of enum case `case`.
    CasePayload { case: u32, field: u32 },
    /// Tuple element by position.
    TupleElem(u32),
}

/// A value root plus the projection path to the sub-object being used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    pub root: ValueId,
    pub projections: Vec<Projection>,
}

impl Place {
    pub fn of(root: ValueId) -> Self {
        Self { root, projections: Vec::new() }
    }

    pub fn field(mut self, index: u32) -> Self {
        self.projections.push(Projection::Field(index));
        self
    }

    pub fn case_payload(mut self, case: u32, field: u32) -> Self {
        self.projections.push(Projection::CasePayload { case, field });
        self
    }

    pub fn tuple_elem(mut self, index: u32) -> Self {
        self.projections.push(Projection::TupleElem(index));
        self
    }
}

/// Declaration of a checked value within one function.
#[derive(Debug, Clone)]
pub struct ValueDecl {
    pub id: ValueId,
    pub name: String,
    pub ty: TypeId,
    pub storage: StorageKind,
    /// Span of the binding site; exit findings anchor here.
    pub span: Span,
}

/// How an argument position accesses the value passed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Callee takes ownership; passing is a consuming use.
    Owned,
    /// Callee borrows; passing is a non-consuming use.
    Shared,
    /// Callee needs exclusive access for the call's duration but returns
    /// ownership (inout-style).
    Exclusive,
}

impl Convention {
    /// Whether two overlapping accesses with this convention can coexist
    /// within a single call site.
    pub fn requires_exclusive(self) -> bool {
        matches!(self, Convention::Owned | Convention::Exclusive)
    }
}

#[derive(Debug, Clone)]
pub struct CallArg {
    pub place: Place,
    pub convention: Convention,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub kind: InstKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InstKind {
    /// Bind `src` into the fresh binding `dst` (`let y = x`).
    Bind { dst: ValueId, src: Place },
    /// Non-consuming read of a place.
    Read { place: Place },
    /// Store a freshly produced value into an existing place; this is the
    /// reinitializing use that resets liveness.
    Assign { dst: Place },
    /// Call with explicitly conventioned arguments.
    Call { callee: String, args: Vec<CallArg> },
    /// `_ = place` style discard; binds nothing and consumes nothing.
    Discard { place: Place },
}

#[derive(Debug, Clone)]
pub enum Terminator {
    Return { span: Span },
    Goto { target: BlockId },
    Branch { then_block: BlockId, else_block: BlockId },
    /// Multi-way dispatch over an enum scrutinee. Switching is a consuming
    /// use of the scrutinee; arms reconcile it by reinitializing.
    Switch { scrutinee: Place, targets: Vec<BlockId>, span: Span },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
            Terminator::Goto { target } => vec![*target],
            Terminator::Branch { then_block, else_block } => vec![*then_block, *else_block],
            Terminator::Switch { targets, .. } => targets.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub insts: Vec<Inst>,
    pub terminator: Terminator,
}

/// Why a region's blocks may execute 0, 1 or many times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Closure body that escapes; invocation count and timing are unknown.
    EscapingClosure,
    /// Deferred block; runs once on every exit path of its scope, after the
    /// scope's own code.
    Defer,
}

/// A non-exclusive CFG subgraph (closure body or deferred block).
///
/// Region blocks are disjoint from the function's main blocks; `Return`
/// terminators inside a region mean "end of region". `captures` lists the
/// outer values the region body refers to.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub kind: RegionKind,
    pub entry: BlockId,
    pub blocks: Vec<BlockId>,
    pub captures: Vec<ValueId>,
    pub span: Span,
}

/// What kind of callable the CFG belongs to; initializers get the
/// `self`-fully-initialized-at-exit rule unless they delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Plain,
    Initializer { delegating: bool },
}

/// A function body as a typed CFG.
#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub kind: FuncKind,
    pub params: Vec<ValueId>,
    pub values: Vec<ValueDecl>,
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    pub regions: Vec<Region>,
    pub span: Span,
}

impl Func {
    pub fn value(&self, id: ValueId) -> &ValueDecl {
        &self.values[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    /// Blocks belonging to no region, i.e. the function's own control flow.
    pub fn main_blocks(&self) -> impl Iterator<Item = &Block> {
        let in_region: std::collections::HashSet<BlockId> = self
            .regions
            .iter()
            .flat_map(|r| r.blocks.iter().copied())
            .collect();
        self.blocks.iter().filter(move |b| !in_region.contains(&b.id))
    }

    pub fn region_of(&self, block: BlockId) -> Option<&Region> {
        self.regions.iter().find(|r| r.blocks.contains(&block))
    }
}
