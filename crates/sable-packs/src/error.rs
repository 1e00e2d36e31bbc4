// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pack and shape violation findings.

use sable_ir::Span;
use thiserror::Error;

/// A pack/shape violation. `span` is the primary location.
#[derive(Debug, Clone)]
pub struct PackError {
    pub kind: PackErrorKind,
    pub span: Span,
}

/// The kind of pack/shape violation.
#[derive(Debug, Clone, Error)]
pub enum PackErrorKind {
    /// A pack was named in type position without `repeat`.
    #[error("pack reference '{name}' requires expansion using keyword 'repeat'")]
    RefRequiresExpansion { name: String },

    /// A pack element was referenced in value position outside any
    /// expansion.
    #[error("pack reference 'each {name}' can only appear in pack expansion")]
    ValueRefOutsideExpansion { name: String },

    /// A pack was named without the `each` keyword.
    #[error("pack type '{name}' must be referenced with 'each'")]
    BareRef { name: String },

    /// `each` applied to an ordinary (non-pack) type.
    #[error("'each' cannot be applied to non-pack type '{name}'")]
    EachNonPack { name: String },

    /// A `repeat` pattern that references no pack has nothing to drive its
    /// iteration.
    #[error("pack expansion '{pattern}' must contain at least one pack reference")]
    NoPackReferences { pattern: String },

    /// Two packs co-expanded in one expansion are not provably same-shape.
    #[error("pack expansion requires that 'each {first}' and 'each {second}' have the same shape")]
    ShapeMismatch {
        first: String,
        second: String,
        first_decl: Span,
        second_decl: Span,
    },

    /// Call-site flavor of the same-shape requirement.
    #[error("'{callee}' requires the type packs 'each {first}' and 'each {second}' have the same shape")]
    CallShapeMismatch {
        callee: String,
        first: String,
        second: String,
        first_decl: Span,
        second_decl: Span,
    },

    /// Value expansion in a grammatical position that cannot receive a
    /// variable number of values.
    #[error("value pack expansion can only appear inside a function argument list or tuple element")]
    InvalidValueExpansionPosition,

    /// Type expansion outside the three positions that admit one.
    #[error("pack expansion '{pattern}' can only appear in a function parameter list, tuple element, or generic argument list")]
    InvalidTypeExpansionPosition { pattern: String },

    /// A value expansion handed to a parameter expecting exactly one value.
    #[error("cannot pass value pack expansion to non-pack parameter of type '{param_ty}'")]
    ExpansionToNonPackParam { param_ty: String },

    #[error("missing argument for parameter #{index} in call")]
    MissingArgument { index: usize },

    #[error("extra argument in call")]
    ExtraArgument,

    /// A single tuple literal where the pack expects its elements spread
    /// out as separate arguments.
    #[error("'{callee}' expects {count} separate arguments; remove extra parentheses to change tuple into separate arguments")]
    TupleInsteadOfArguments { callee: String, count: usize },

    /// Multiple candidates tie after the empty-pack coercion tie-break.
    #[error("ambiguous use of '{name}'")]
    AmbiguousUse { name: String, candidates: Vec<Span> },
}

impl std::fmt::Display for PackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for PackError {}
