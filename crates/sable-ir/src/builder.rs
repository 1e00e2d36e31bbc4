// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! FuncBuilder - helper for CFG construction.
//!
//! Front-end lowering and the checker test suites both build CFGs through
//! this; blocks start with an `Unreachable` terminator until sealed.

use crate::{
    Block, BlockId, CallArg, Convention, Func, FuncKind, Inst, InstKind, Place, Region, RegionId,
    RegionKind, Span, StorageKind, Terminator, TypeId, ValueDecl, ValueId,
};

pub struct FuncBuilder {
    func: Func,
    current_block: BlockId,
    next_value_id: u32,
    next_block_id: u32,
    next_region_id: u32,
}

impl FuncBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let entry = BlockId(0);
        let func = Func {
            name: name.into(),
            kind: FuncKind::Plain,
            params: Vec::new(),
            values: Vec::new(),
            blocks: vec![Block {
                id: entry,
                insts: Vec::new(),
                terminator: Terminator::Unreachable,
            }],
            entry,
            regions: Vec::new(),
            span: Span::none(),
        };

        Self {
            func,
            current_block: entry,
            next_value_id: 0,
            next_block_id: 1,
            next_region_id: 0,
        }
    }

    pub fn kind(&mut self, kind: FuncKind) -> &mut Self {
        self.func.kind = kind;
        self
    }

    pub fn span(&mut self, span: Span) -> &mut Self {
        self.func.span = span;
        self
    }

    pub fn value(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        storage: StorageKind,
        span: Span,
    ) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        self.func.values.push(ValueDecl {
            id,
            name: name.into(),
            ty,
            storage,
            span,
        });
        id
    }

    pub fn param(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        storage: StorageKind,
        span: Span,
    ) -> ValueId {
        let id = self.value(name, ty, storage, span);
        self.func.params.push(id);
        id
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.func.blocks.push(Block {
            id,
            insts: Vec::new(),
            terminator: Terminator::Unreachable,
        });
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    fn push(&mut self, kind: InstKind, span: Span) {
        self.func.blocks[self.current_block.0 as usize]
            .insts
            .push(Inst { kind, span });
    }

    pub fn bind(&mut self, dst: ValueId, src: Place, span: Span) {
        self.push(InstKind::Bind { dst, src }, span);
    }

    pub fn read(&mut self, place: Place, span: Span) {
        self.push(InstKind::Read { place }, span);
    }

    pub fn assign(&mut self, dst: Place, span: Span) {
        self.push(InstKind::Assign { dst }, span);
    }

    pub fn call(&mut self, callee: impl Into<String>, args: Vec<CallArg>, span: Span) {
        self.push(
            InstKind::Call {
                callee: callee.into(),
                args,
            },
            span,
        );
    }

    /// Single-argument call; the common case in lowered code.
    pub fn call1(
        &mut self,
        callee: impl Into<String>,
        place: Place,
        convention: Convention,
        span: Span,
    ) {
        self.call(
            callee,
            vec![CallArg {
                place,
                convention,
                span,
            }],
            span,
        );
    }

    pub fn discard(&mut self, place: Place, span: Span) {
        self.push(InstKind::Discard { place }, span);
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.func.blocks[self.current_block.0 as usize].terminator = terminator;
    }

    pub fn ret(&mut self, span: Span) {
        self.terminate(Terminator::Return { span });
    }

    pub fn goto(&mut self, target: BlockId) {
        self.terminate(Terminator::Goto { target });
    }

    pub fn branch(&mut self, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            then_block,
            else_block,
        });
    }

    pub fn switch(&mut self, scrutinee: Place, targets: Vec<BlockId>, span: Span) {
        self.terminate(Terminator::Switch {
            scrutinee,
            targets,
            span,
        });
    }

    pub fn region(
        &mut self,
        kind: RegionKind,
        entry: BlockId,
        blocks: Vec<BlockId>,
        captures: Vec<ValueId>,
        span: Span,
    ) -> RegionId {
        let id = RegionId(self.next_region_id);
        self.next_region_id += 1;
        self.func.regions.push(Region {
            id,
            kind,
            entry,
            blocks,
            captures,
            span,
        });
        id
    }

    pub fn finish(self) -> Func {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_shape() {
        let mut b = FuncBuilder::new("diamond");
        let ty = TypeId(0);
        let x = b.value("x", ty, StorageKind::LocalMut, Span::new(0, 1));
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();

        b.branch(then_bb, else_bb);
        b.switch_to_block(then_bb);
        b.read(Place::of(x), Span::new(10, 11));
        b.goto(join);
        b.switch_to_block(else_bb);
        b.goto(join);
        b.switch_to_block(join);
        b.ret(Span::new(20, 21));

        let f = b.finish();
        assert_eq!(f.blocks.len(), 4);
        assert_eq!(f.block(f.entry).terminator.successors(), vec![then_bb, else_bb]);
        assert_eq!(f.block(join).terminator.successors(), Vec::<BlockId>::new());
        assert_eq!(f.value(x).name, "x");
    }

    #[test]
    fn region_blocks_excluded_from_main() {
        let mut b = FuncBuilder::new("with_defer");
        let defer_bb = b.create_block();
        b.region(
            RegionKind::Defer,
            defer_bb,
            vec![defer_bb],
            Vec::new(),
            Span::none(),
        );
        b.ret(Span::none());
        b.switch_to_block(defer_bb);
        b.ret(Span::none());

        let f = b.finish();
        let main: Vec<BlockId> = f.main_blocks().map(|bl| bl.id).collect();
        assert_eq!(main, vec![f.entry]);
        assert!(f.region_of(defer_bb).is_some());
        assert!(f.region_of(f.entry).is_none());
    }
}
