// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Parameter-pack declarations.
//!
//! A generic declaration may declare pack parameters (variable-length lists
//! of types or values) alongside ordinary type parameters, plus explicit
//! same-shape requirements between packs. The pack solver consumes these to
//! decide which packs may legally be co-expanded.

use sable_ir::Span;

/// Index of a pack parameter within its declaring generic declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackId(pub u32);

/// Index of a generic declaration within the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericDeclId(pub u32);

#[derive(Debug, Clone)]
pub struct PackParam {
    pub id: PackId,
    pub name: String,
    pub span: Span,
}

/// Declared requirement that two packs always have equal element counts.
#[derive(Debug, Clone, Copy)]
pub struct SameShapeReq {
    pub first: PackId,
    pub second: PackId,
    pub span: Span,
}

/// A generic declaration's pack-relevant signature.
#[derive(Debug, Clone)]
pub struct GenericDecl {
    pub name: String,
    pub span: Span,
    pub packs: Vec<PackParam>,
    pub same_shape: Vec<SameShapeReq>,
}

impl GenericDecl {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
            packs: Vec::new(),
            same_shape: Vec::new(),
        }
    }

    pub fn add_pack(&mut self, name: impl Into<String>, span: Span) -> PackId {
        let id = PackId(self.packs.len() as u32);
        self.packs.push(PackParam {
            id,
            name: name.into(),
            span,
        });
        id
    }

    pub fn require_same_shape(&mut self, first: PackId, second: PackId, span: Span) {
        self.same_shape.push(SameShapeReq { first, second, span });
    }

    pub fn pack(&self, id: PackId) -> &PackParam {
        &self.packs[id.0 as usize]
    }
}
