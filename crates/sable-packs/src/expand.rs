// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-element expansion of pack expressions.
//!
//! Once a site's packs are bound to concrete element lists, expansion
//! yields one substitution frame per pack position. The sequence is finite,
//! built fresh for each expansion site, and consumed exactly once; frames
//! cannot be replayed.

use sable_ir::{Span, TypeId};
use sable_types::{GenericDecl, PackId};

use crate::{PackError, PackErrorKind};

/// A pack bound to its concrete elements at an instantiation.
#[derive(Debug, Clone)]
pub struct PackBinding {
    pub pack: PackId,
    pub elements: Vec<TypeId>,
}

/// One element position of an expansion: each co-expanded pack mapped to
/// its element at that position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstFrame {
    pub index: usize,
    pub bindings: Vec<(PackId, TypeId)>,
}

/// The lazy, consumed-once frame sequence for one expansion site.
#[derive(Debug)]
pub struct ExpansionSeq {
    frames: std::vec::IntoIter<SubstFrame>,
}

impl Iterator for ExpansionSeq {
    type Item = SubstFrame;

    fn next(&mut self) -> Option<SubstFrame> {
        self.frames.next()
    }
}

impl ExpansionSeq {
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

/// Build the frame sequence for one expansion site.
///
/// The bindings must all have equal element counts; the static same-shape
/// check guarantees this for well-typed input, so a mismatch here reports
/// rather than panics.
pub fn expand_site(
    decl: &GenericDecl,
    span: Span,
    bindings: &[PackBinding],
) -> Result<ExpansionSeq, PackError> {
    let count = bindings.first().map(|b| b.elements.len()).unwrap_or(0);
    for binding in bindings.iter().skip(1) {
        if binding.elements.len() != count {
            let first = decl.pack(binding.pack);
            let second = decl.pack(bindings[0].pack);
            return Err(PackError {
                span,
                kind: PackErrorKind::ShapeMismatch {
                    first: first.name.clone(),
                    second: second.name.clone(),
                    first_decl: first.span,
                    second_decl: second.span,
                },
            });
        }
    }

    let frames: Vec<SubstFrame> = (0..count)
        .map(|index| SubstFrame {
            index,
            bindings: bindings
                .iter()
                .map(|b| (b.pack, b.elements[index]))
                .collect(),
        })
        .collect();

    Ok(ExpansionSeq {
        frames: frames.into_iter(),
    })
}
