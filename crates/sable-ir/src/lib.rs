// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Sable checker IR: source spans and the typed control-flow graph that the
//! semantic analysis core consumes.
//!
//! Earlier front-end phases lower each function body into a [`Func`] - basic
//! blocks of span-tagged instructions plus non-exclusive [`Region`]s for
//! closure bodies and deferred blocks. This crate defines that shape and a
//! [`FuncBuilder`] for constructing it; it performs no analysis itself.

mod builder;
mod cfg;
mod span;

pub use builder::FuncBuilder;
pub use cfg::{
    Block, BlockId, CallArg, Convention, Func, FuncKind, Inst, InstKind, Place, Projection,
    Region, RegionId, RegionKind, StorageKind, Terminator, TypeId, ValueDecl, ValueId,
};
pub use span::Span;
