// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Symbol table for the Sable semantic-analysis core.
//!
//! Built once by the front end before checking begins and treated as
//! immutable for the duration of analysis. Provides, per type, the field
//! layout used to build field paths and the move-only classification; per
//! generic declaration, its pack parameters and same-shape requirements.

mod packs;
mod types;

pub use packs::{GenericDecl, GenericDeclId, PackId, PackParam, SameShapeReq};
pub use types::{CaseDef, FieldDef, TypeDef, TypeKind};

use std::collections::HashSet;

use sable_ir::{Projection, TypeId};

#[derive(Debug, Default)]
pub struct SymbolTable {
    types: Vec<TypeDef>,
    generics: Vec<GenericDecl>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(def);
        id
    }

    /// Register an opaque leaf type.
    pub fn add_opaque(&mut self, name: impl Into<String>, move_only: bool) -> TypeId {
        self.add_type(TypeDef {
            name: name.into(),
            move_only,
            kind: TypeKind::Opaque,
        })
    }

    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0 as usize]
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        &self.type_def(id).name
    }

    pub fn add_generic(&mut self, decl: GenericDecl) -> GenericDeclId {
        let id = GenericDeclId(self.generics.len() as u32);
        self.generics.push(decl);
        id
    }

    pub fn generic(&self, id: GenericDeclId) -> &GenericDecl {
        &self.generics[id.0 as usize]
    }

    pub fn generics(&self) -> impl Iterator<Item = &GenericDecl> {
        self.generics.iter()
    }

    /// Direct exactly-one-owner classification.
    pub fn is_move_only(&self, id: TypeId) -> bool {
        self.type_def(id).move_only
    }

    /// Whether values of this type need ownership checking: the type is
    /// move-only itself, or is a copyable aggregate nesting a move-only
    /// field somewhere below.
    pub fn is_checked(&self, id: TypeId) -> bool {
        let mut visited = HashSet::new();
        self.is_checked_inner(id, &mut visited)
    }

    fn is_checked_inner(&self, id: TypeId, visited: &mut HashSet<TypeId>) -> bool {
        if !visited.insert(id) {
            // Recursive types (class self-references) terminate here.
            return false;
        }
        let def = self.type_def(id);
        if def.move_only {
            return true;
        }
        match &def.kind {
            TypeKind::Opaque => false,
            TypeKind::Struct { fields } | TypeKind::Class { fields } => fields
                .iter()
                .any(|f| self.is_checked_inner(f.ty, visited)),
            TypeKind::Enum { cases } => cases
                .iter()
                .flat_map(|c| c.payload.iter())
                .any(|ty| self.is_checked_inner(*ty, visited)),
            TypeKind::Tuple { elems } => {
                elems.iter().any(|ty| self.is_checked_inner(*ty, visited))
            }
        }
    }

    /// Type of the sub-object reached by one projection step, or `None` if
    /// the projection does not apply to this type.
    pub fn project(&self, base: TypeId, proj: Projection) -> Option<TypeId> {
        match (&self.type_def(base).kind, proj) {
            (TypeKind::Struct { fields }, Projection::Field(i))
            | (TypeKind::Class { fields }, Projection::Field(i)) => {
                fields.get(i as usize).map(|f| f.ty)
            }
            (TypeKind::Enum { cases }, Projection::CasePayload { case, field }) => cases
                .get(case as usize)
                .and_then(|c| c.payload.get(field as usize))
                .copied(),
            (TypeKind::Tuple { elems }, Projection::TupleElem(i)) => {
                elems.get(i as usize).copied()
            }
            _ => None,
        }
    }

    /// Resolve a whole projection path from `base`.
    pub fn project_path(&self, base: TypeId, projections: &[Projection]) -> Option<TypeId> {
        projections
            .iter()
            .try_fold(base, |ty, proj| self.project(ty, *proj))
    }

    /// Whether any step of the path goes through a class instance's field,
    /// i.e. storage that aliasing rules demote to read-or-reassign.
    /// Returns the mutability of the first such field.
    pub fn aliased_step(&self, base: TypeId, projections: &[Projection]) -> Option<bool> {
        let mut ty = base;
        for proj in projections {
            if let (TypeKind::Class { fields }, Projection::Field(i)) =
                (&self.type_def(ty).kind, *proj)
            {
                return fields.get(i as usize).map(|f| f.mutable);
            }
            ty = self.project(ty, *proj)?;
        }
        None
    }

    /// Human-readable path like `a.k`, `e.second.0` or `t.1` for findings.
    pub fn display_place(&self, name: &str, base: TypeId, projections: &[Projection]) -> String {
        let mut out = String::from(name);
        let mut ty = Some(base);
        for proj in projections {
            out.push('.');
            match (ty.map(|t| &self.type_def(t).kind), *proj) {
                (Some(TypeKind::Struct { fields }), Projection::Field(i))
                | (Some(TypeKind::Class { fields }), Projection::Field(i))
                    if (i as usize) < fields.len() =>
                {
                    out.push_str(&fields[i as usize].name);
                }
                (Some(TypeKind::Enum { cases }), Projection::CasePayload { case, field })
                    if (case as usize) < cases.len() =>
                {
                    out.push_str(&cases[case as usize].name);
                    out.push('.');
                    out.push_str(&field.to_string());
                }
                (_, Projection::TupleElem(i)) => out.push_str(&i.to_string()),
                (_, Projection::Field(i)) => out.push_str(&i.to_string()),
                (_, Projection::CasePayload { case, field }) => {
                    out.push_str(&format!("{}.{}", case, field));
                }
            }
            ty = ty.and_then(|t| self.project(t, *proj));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (SymbolTable, TypeId, TypeId) {
        let mut t = SymbolTable::new();
        let klass = t.add_type(TypeDef {
            name: "Handle".into(),
            move_only: true,
            kind: TypeKind::Opaque,
        });
        let copyable = t.add_opaque("Token", false);
        let agg = t.add_type(TypeDef {
            name: "Packet".into(),
            move_only: false,
            kind: TypeKind::Struct {
                fields: vec![
                    FieldDef::new("handle", klass),
                    FieldDef::new("token", copyable),
                ],
            },
        });
        (t, klass, agg)
    }

    #[test]
    fn copyable_aggregate_nesting_move_only_is_checked() {
        let (t, klass, agg) = table();
        assert!(t.is_checked(klass));
        assert!(t.is_checked(agg));
        assert!(!t.is_move_only(agg));
    }

    #[test]
    fn recursive_class_type_terminates() {
        let mut t = SymbolTable::new();
        // class Node { var next: Node } - projecting loops back to itself.
        let node = t.add_type(TypeDef {
            name: "Node".into(),
            move_only: true,
            kind: TypeKind::Opaque,
        });
        // Rebuild with a self-referential field.
        t.types[node.0 as usize].kind = TypeKind::Class {
            fields: vec![FieldDef::new("next", node)],
        };
        assert!(t.is_checked(node));
        assert_eq!(t.project(node, Projection::Field(0)), Some(node));
    }

    #[test]
    fn projection_resolves_field_types() {
        let (t, klass, agg) = table();
        assert_eq!(t.project(agg, Projection::Field(0)), Some(klass));
        assert_eq!(t.project(agg, Projection::Field(7)), None);
        assert_eq!(t.project_path(agg, &[Projection::Field(0)]), Some(klass));
    }

    #[test]
    fn aliased_step_sees_through_class_fields() {
        let mut t = SymbolTable::new();
        let inner = t.add_opaque("Inner", true);
        let cls = t.add_type(TypeDef {
            name: "Box".into(),
            move_only: true,
            kind: TypeKind::Class {
                fields: vec![FieldDef::new("k", inner), FieldDef::immutable("frozen", inner)],
            },
        });
        assert_eq!(t.aliased_step(cls, &[Projection::Field(0)]), Some(true));
        assert_eq!(t.aliased_step(cls, &[Projection::Field(1)]), Some(false));
        assert_eq!(t.aliased_step(inner, &[]), None);
    }

    #[test]
    fn display_place_renders_paths() {
        let (t, _, agg) = table();
        assert_eq!(t.display_place("p", agg, &[]), "p");
        assert_eq!(
            t.display_place("p", agg, &[Projection::Field(0)]),
            "p.handle"
        );

        let mut t2 = SymbolTable::new();
        let leaf = t2.add_opaque("Leaf", true);
        let e = t2.add_type(TypeDef {
            name: "Choice".into(),
            move_only: true,
            kind: TypeKind::Enum {
                cases: vec![
                    CaseDef::new("none", vec![]),
                    CaseDef::new("some", vec![leaf]),
                ],
            },
        });
        assert_eq!(
            t2.display_place("e", e, &[Projection::CasePayload { case: 1, field: 0 }]),
            "e.some.0"
        );
    }
}
