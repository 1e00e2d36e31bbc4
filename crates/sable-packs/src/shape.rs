// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shape-identity equivalence classes.
//!
//! Two packs have the same shape identity when the declaration requires
//! their element counts to be equal at every instantiation. Declared
//! same-shape requirements seed a union-find; co-expansion is legal only
//! within one class. Equal length is never assumed from context.

use sable_types::{GenericDecl, PackId};

#[derive(Debug, Clone)]
pub struct ShapeClasses {
    parent: Vec<u32>,
}

impl ShapeClasses {
    pub fn from_decl(decl: &GenericDecl) -> Self {
        let mut classes = Self {
            parent: (0..decl.packs.len() as u32).collect(),
        };
        for req in &decl.same_shape {
            classes.union(req.first, req.second);
        }
        classes
    }

    fn find(&mut self, pack: PackId) -> u32 {
        let mut root = pack.0;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut cur = pack.0;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: PackId, b: PackId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb as usize] = ra;
        }
    }

    pub fn same_shape(&mut self, a: PackId, b: PackId) -> bool {
        self.find(a) == self.find(b)
    }
}
