// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type definitions for the checked program.

use sable_ir::TypeId;

/// Structural shape of a type, as far as the checkers need to see it.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// No visible structure (primitives, imported opaque types).
    Opaque,
    /// Value aggregate with named fields.
    Struct { fields: Vec<FieldDef> },
    /// Reference aggregate; its fields live in aliased storage.
    Class { fields: Vec<FieldDef> },
    /// Tagged union; each case may carry payload slots.
    Enum { cases: Vec<CaseDef> },
    /// Positional aggregate.
    Tuple { elems: Vec<TypeId> },
}

/// A named type with its copyability classification.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    /// Exactly-one-owner semantics: copying values of this type is
    /// statically forbidden.
    pub move_only: bool,
    pub kind: TypeKind,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
    /// `var` vs `let` field; decides whether aliased storage may at least
    /// be reassigned.
    pub mutable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        Self { name: name.into(), ty, mutable: true }
    }

    pub fn immutable(name: impl Into<String>, ty: TypeId) -> Self {
        Self { name: name.into(), ty, mutable: false }
    }
}

#[derive(Debug, Clone)]
pub struct CaseDef {
    pub name: String,
    pub payload: Vec<TypeId>,
}

impl CaseDef {
    pub fn new(name: impl Into<String>, payload: Vec<TypeId>) -> Self {
        Self { name: name.into(), payload }
    }
}
