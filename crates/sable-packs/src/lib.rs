// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Parameter-pack type checking for variadic generic declarations.
//!
//! This crate verifies:
//! - pack references are well-formed: only inside a `repeat` expansion,
//!   always through `each`, never on a non-pack type
//! - expansions sit in a position that can receive a variable number of
//!   elements (function argument list, tuple element, generic argument list)
//! - packs co-expanded in one expansion share a shape-identity class; equal
//!   element counts are never assumed
//! - arity at instantiation: missing/extra arguments, tuples standing in
//!   for spread arguments, expansions passed to non-pack parameters
//! - the empty-pack overload tie-break, reporting ambiguity over guessing
//!
//! Violations are findings, accumulated per declaration; checking never
//! stops at the first.

mod error;
mod expand;
mod shape;

pub use error::{PackError, PackErrorKind};
pub use expand::{expand_site, ExpansionSeq, PackBinding, SubstFrame};
pub use shape::ShapeClasses;

use std::collections::BTreeMap;

use sable_ir::Span;
use sable_types::{GenericDecl, PackId};

/// Whether a reference or expansion sits in type or value syntax; the two
/// produce differently worded findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefPosition {
    Type,
    Value,
}

/// The grammatical slot an expansion occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionSite {
    /// Element of a call's argument list.
    CallArgument,
    /// Element of a tuple type or literal.
    TupleElement,
    /// Element of an explicit generic argument list.
    GenericArgument,
    /// Function return type position.
    ReturnType,
    /// Initializer of a local binding.
    LocalBinding,
    /// Standalone statement/expression position.
    Statement,
    /// Element of a collection literal.
    Collection,
}

impl ExpansionSite {
    fn admits_expansion(self) -> bool {
        matches!(
            self,
            ExpansionSite::CallArgument
                | ExpansionSite::TupleElement
                | ExpansionSite::GenericArgument
        )
    }
}

/// What an `each` reference resolved to.
#[derive(Debug, Clone)]
pub enum PackRefTarget {
    Pack(PackId),
    /// Name resolution found an ordinary type or value.
    NonPack(String),
}

/// Pack-relevant skeleton of an expression or type, built by the type
/// checker while visiting a generic declaration's body.
#[derive(Debug, Clone)]
pub enum PackExpr {
    /// `each T` or `each t`.
    Each {
        target: PackRefTarget,
        position: RefPosition,
        span: Span,
    },
    /// A pack named without `each`.
    Bare { pack: PackId, span: Span },
    /// `repeat <pattern>`.
    Repeat {
        pattern: Box<PackExpr>,
        site: ExpansionSite,
        span: Span,
    },
    /// Tuple, argument list or other grouping; transparent to pack rules.
    Group { elems: Vec<PackExpr>, span: Span },
    /// Anything with no pack content.
    Leaf { name: String, span: Span },
}

impl PackExpr {
    pub fn span(&self) -> Span {
        match self {
            PackExpr::Each { span, .. }
            | PackExpr::Bare { span, .. }
            | PackExpr::Repeat { span, .. }
            | PackExpr::Group { span, .. }
            | PackExpr::Leaf { span, .. } => *span,
        }
    }
}

/// Arity-relevant shape of a parameter.
#[derive(Debug, Clone)]
pub enum ParamShape {
    /// Exactly one value of the named type.
    Concrete(String),
    /// Zero or more values bound to the pack.
    Pack(PackId),
}

/// Arity-relevant shape of a call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    Scalar,
    /// A tuple literal with the given element count.
    Tuple(usize),
    /// `repeat each ...` spread.
    Expansion,
}

/// An overload candidate for resolution.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub span: Span,
    pub params: Vec<ParamShape>,
}

/// Result of checking one generic declaration.
#[derive(Debug)]
pub struct PackCheckResult {
    pub errors: Vec<PackError>,
}

impl PackCheckResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check every pack expression of one generic declaration.
pub fn check_decl(decl: &GenericDecl, exprs: &[PackExpr]) -> PackCheckResult {
    let mut solver = PackSolver::new(decl);
    for expr in exprs {
        solver.check_expr(expr);
    }
    solver.finish()
}

/// Walks pack expressions of a single generic declaration, accumulating
/// findings. Shape classes live exactly as long as the declaration check.
pub struct PackSolver<'a> {
    decl: &'a GenericDecl,
    shapes: ShapeClasses,
    errors: Vec<PackError>,
}

impl<'a> PackSolver<'a> {
    pub fn new(decl: &'a GenericDecl) -> Self {
        Self {
            decl,
            shapes: ShapeClasses::from_decl(decl),
            errors: Vec::new(),
        }
    }

    pub fn finish(self) -> PackCheckResult {
        PackCheckResult {
            errors: self.errors,
        }
    }

    pub fn same_shape(&mut self, a: PackId, b: PackId) -> bool {
        self.shapes.same_shape(a, b)
    }

    pub fn check_expr(&mut self, expr: &PackExpr) {
        self.walk(expr, false);
    }

    fn walk(&mut self, expr: &PackExpr, in_expansion: bool) {
        match expr {
            PackExpr::Repeat { pattern, site, span } => {
                if !site.admits_expansion() {
                    let kind = match site {
                        ExpansionSite::ReturnType => PackErrorKind::InvalidTypeExpansionPosition {
                            pattern: self.render(expr),
                        },
                        _ => PackErrorKind::InvalidValueExpansionPosition,
                    };
                    self.errors.push(PackError { kind, span: *span });
                }

                let packs = collect_packs(pattern);
                if packs.is_empty() {
                    self.errors.push(PackError {
                        span: *span,
                        kind: PackErrorKind::NoPackReferences {
                            pattern: self.render(pattern),
                        },
                    });
                } else {
                    // Every pack driven by this expansion must share one
                    // shape class; report against the first, never assume
                    // equal length.
                    let anchor = packs[0];
                    for &pack in &packs[1..] {
                        if !self.shapes.same_shape(anchor, pack) {
                            let first = self.decl.pack(pack);
                            let second = self.decl.pack(anchor);
                            self.errors.push(PackError {
                                span: *span,
                                kind: PackErrorKind::ShapeMismatch {
                                    first: first.name.clone(),
                                    second: second.name.clone(),
                                    first_decl: first.span,
                                    second_decl: second.span,
                                },
                            });
                        }
                    }
                }

                self.walk(pattern, true);
            }
            PackExpr::Each {
                target,
                position,
                span,
            } => match target {
                PackRefTarget::NonPack(name) => {
                    self.errors.push(PackError {
                        span: *span,
                        kind: PackErrorKind::EachNonPack { name: name.clone() },
                    });
                }
                PackRefTarget::Pack(id) if !in_expansion => {
                    let name = self.decl.pack(*id).name.clone();
                    let kind = match position {
                        RefPosition::Type => PackErrorKind::RefRequiresExpansion { name },
                        RefPosition::Value => PackErrorKind::ValueRefOutsideExpansion { name },
                    };
                    self.errors.push(PackError { kind, span: *span });
                }
                PackRefTarget::Pack(_) => {}
            },
            PackExpr::Bare { pack, span } => {
                let name = self.decl.pack(*pack).name.clone();
                self.errors.push(PackError {
                    span: *span,
                    kind: PackErrorKind::BareRef { name: name.clone() },
                });
                if !in_expansion {
                    self.errors.push(PackError {
                        span: *span,
                        kind: PackErrorKind::RefRequiresExpansion { name },
                    });
                }
            }
            PackExpr::Group { elems, .. } => {
                for elem in elems {
                    self.walk(elem, in_expansion);
                }
            }
            PackExpr::Leaf { .. } => {}
        }
    }

    /// Same-shape requirement imposed by a callee's signature on two caller
    /// packs forwarded through one call.
    pub fn require_same_shape_for_call(
        &mut self,
        callee: &str,
        a: PackId,
        b: PackId,
        span: Span,
    ) {
        if self.shapes.same_shape(a, b) {
            return;
        }
        let first = self.decl.pack(b);
        let second = self.decl.pack(a);
        self.errors.push(PackError {
            span,
            kind: PackErrorKind::CallShapeMismatch {
                callee: callee.to_string(),
                first: first.name.clone(),
                second: second.name.clone(),
                first_decl: first.span,
                second_decl: second.span,
            },
        });
    }

    /// Check the argument list of one instantiation whose pack arities have
    /// been fixed by explicit generic arguments.
    pub fn check_instantiation(
        &mut self,
        callee: &str,
        span: Span,
        params: &[ParamShape],
        arity: &BTreeMap<PackId, usize>,
        args: &[ArgShape],
    ) {
        let expected: usize = params
            .iter()
            .map(|p| match p {
                ParamShape::Concrete(_) => 1,
                ParamShape::Pack(id) => arity.get(id).copied().unwrap_or(0),
            })
            .sum();

        // A single tuple literal where the pack wanted its elements spread
        // out gets the dedicated suggestion instead of "missing argument".
        if args.len() == 1 && expected > 1 {
            if let ArgShape::Tuple(n) = args[0] {
                if n == expected {
                    self.errors.push(PackError {
                        span,
                        kind: PackErrorKind::TupleInsteadOfArguments {
                            callee: callee.to_string(),
                            count: expected,
                        },
                    });
                    return;
                }
            }
        }

        // Walk arguments against parameter slots; an expansion argument
        // swallows the rest of the current pack's slots.
        let mut slots: Vec<(usize, &ParamShape)> = Vec::new();
        for param in params {
            match param {
                ParamShape::Concrete(_) => slots.push((1, param)),
                ParamShape::Pack(id) => {
                    slots.push((arity.get(id).copied().unwrap_or(0), param))
                }
            }
        }

        let mut slot_idx = 0;
        let mut remaining = slots.first().map(|s| s.0).unwrap_or(0);
        for arg in args {
            // Advance past exhausted parameters.
            while remaining == 0 && slot_idx + 1 < slots.len() {
                slot_idx += 1;
                remaining = slots[slot_idx].0;
            }
            if remaining == 0 {
                self.errors.push(PackError {
                    span,
                    kind: PackErrorKind::ExtraArgument,
                });
                return;
            }
            match (arg, slots[slot_idx].1) {
                (ArgShape::Expansion, ParamShape::Concrete(ty)) => {
                    self.errors.push(PackError {
                        span,
                        kind: PackErrorKind::ExpansionToNonPackParam {
                            param_ty: ty.clone(),
                        },
                    });
                    remaining -= 1;
                }
                (ArgShape::Expansion, ParamShape::Pack(_)) => {
                    remaining = 0;
                }
                _ => {
                    remaining -= 1;
                }
            }
        }
        while remaining == 0 && slot_idx + 1 < slots.len() {
            slot_idx += 1;
            remaining = slots[slot_idx].0;
        }
        if remaining > 0 {
            self.errors.push(PackError {
                span,
                kind: PackErrorKind::MissingArgument {
                    index: args.len() + 1,
                },
            });
        }
    }

    fn render(&self, expr: &PackExpr) -> String {
        match expr {
            PackExpr::Each { target, .. } => match target {
                PackRefTarget::Pack(id) => format!("each {}", self.decl.pack(*id).name),
                PackRefTarget::NonPack(name) => format!("each {}", name),
            },
            PackExpr::Bare { pack, .. } => self.decl.pack(*pack).name.clone(),
            PackExpr::Repeat { pattern, .. } => format!("repeat {}", self.render(pattern)),
            PackExpr::Group { elems, .. } => {
                let inner: Vec<String> = elems.iter().map(|e| self.render(e)).collect();
                format!("({})", inner.join(", "))
            }
            PackExpr::Leaf { name, .. } => name.clone(),
        }
    }
}

fn collect_packs(expr: &PackExpr) -> Vec<PackId> {
    fn go(expr: &PackExpr, out: &mut Vec<PackId>) {
        match expr {
            PackExpr::Each {
                target: PackRefTarget::Pack(id),
                ..
            }
            | PackExpr::Bare { pack: id, .. } => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            PackExpr::Group { elems, .. } => {
                for elem in elems {
                    go(elem, out);
                }
            }
            // Nested expansions drive their own packs.
            PackExpr::Repeat { .. } => {}
            _ => {}
        }
    }
    let mut out = Vec::new();
    go(expr, &mut out);
    out
}

/// Resolve an overload set for a call with `argc` arguments, preferring
/// candidates that need no implicit pack-to-empty coercion. A surviving tie
/// is reported as ambiguity, never guessed.
pub fn resolve_overload(
    name: &str,
    span: Span,
    candidates: &[Candidate],
    argc: usize,
) -> Result<usize, PackError> {
    let fixed = |c: &Candidate| {
        c.params
            .iter()
            .filter(|p| matches!(p, ParamShape::Concrete(_)))
            .count()
    };
    let has_pack = |c: &Candidate| c.params.iter().any(|p| matches!(p, ParamShape::Pack(_)));

    let matching: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let f = fixed(c);
            if has_pack(c) {
                argc >= f
            } else {
                argc == f
            }
        })
        .map(|(i, _)| i)
        .collect();

    // Tie-break: a candidate binding every pack to at least one element
    // beats one coercing a pack to empty.
    let no_coercion: Vec<usize> = matching
        .iter()
        .copied()
        .filter(|&i| {
            let c = &candidates[i];
            !has_pack(c) || argc > fixed(c)
        })
        .collect();

    let chosen = if no_coercion.is_empty() {
        &matching
    } else {
        &no_coercion
    };

    match chosen.as_slice() {
        [] => {
            let needs_more = candidates.iter().all(|c| fixed(c) > argc);
            let kind = if needs_more {
                PackErrorKind::MissingArgument { index: argc + 1 }
            } else {
                PackErrorKind::ExtraArgument
            };
            Err(PackError { kind, span })
        }
        [one] => Ok(*one),
        many => Err(PackError {
            span,
            kind: PackErrorKind::AmbiguousUse {
                name: name.to_string(),
                candidates: many.iter().map(|&i| candidates[i].span).collect(),
            },
        }),
    }
}
