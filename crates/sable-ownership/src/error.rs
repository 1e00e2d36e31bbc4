// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Ownership violation findings.

use sable_ir::Span;
use thiserror::Error;

/// An ownership violation. `span` is the primary location; the conflicting
/// uses that justify the finding ride along in the kind.
#[derive(Debug, Clone)]
pub struct OwnershipError {
    pub kind: OwnershipErrorKind,
    pub span: Span,
}

/// Which non-exclusive region a violation happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionWord {
    Closure,
    Defer,
}

impl std::fmt::Display for RegionWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionWord::Closure => write!(f, "closure"),
            RegionWord::Defer => write!(f, "deferred block"),
        }
    }
}

/// The kind of ownership violation.
#[derive(Debug, Clone, Error)]
pub enum OwnershipErrorKind {
    /// A second consuming use reached a value already consumed.
    #[error("'{name}' consumed more than once")]
    ConsumedMoreThanOnce { name: String, uses: Vec<Span> },

    /// A non-consuming use reached a value consumed on some path.
    #[error("'{name}' used after consume")]
    UsedAfterConsume {
        name: String,
        consumed: Vec<Span>,
        used: Span,
    },

    /// A by-reference parameter (or `self` in a non-delegating initializer)
    /// left the function without being reinitialized.
    #[error("'{name}' consumed but not reinitialized before end of function")]
    ConsumedAtExit { name: String, uses: Vec<Span> },

    /// Consumed inside a loop body with no reinitialization before the
    /// back-edge; the next iteration would re-consume.
    #[error("'{name}' consumed by a use in a loop")]
    ConsumedInLoop { name: String, uses: Vec<Span> },

    /// Consumed inside a closure or deferred block without reinitialization
    /// before the end of that region.
    #[error("'{name}' consumed in {region} but not reinitialized before end of {region}")]
    ConsumedInRegion {
        name: String,
        region: RegionWord,
        uses: Vec<Span>,
        region_span: Span,
    },

    /// A guaranteed (shared) parameter was consumed; the callee never owns it.
    #[error("'{name}' has guaranteed ownership but was consumed")]
    GuaranteedConsumed { name: String, uses: Vec<Span> },

    /// Consuming a mutable capture of an escaping closure; the closure may
    /// run again at any time.
    #[error("'{name}' was consumed but it is illegal to consume a noncopyable mutable capture of an escaping closure. One can only read from it or assign over it")]
    ConsumedMutableCapture { name: String },

    #[error("'{name}' was consumed but it is illegal to consume a noncopyable immutable capture of an escaping closure. One can only read from it")]
    ConsumedImmutableCapture { name: String },

    /// Consuming through a class reference's field; aliasing cannot be
    /// proven exclusive.
    #[error("'{name}' was consumed but it is illegal to consume a noncopyable class var field. One can only read from it or assign to it")]
    ConsumedClassVarField { name: String },

    #[error("'{name}' was consumed but it is illegal to consume a noncopyable class let field. One can only read from it")]
    ConsumedClassLetField { name: String },

    /// Consuming process-wide storage.
    #[error("'{name}' was consumed but it is illegal to consume a noncopyable global var. One can only read from it or assign to it")]
    ConsumedGlobalVar { name: String },

    #[error("'{name}' was consumed but it is illegal to consume a noncopyable global let. One can only read from it")]
    ConsumedGlobalLet { name: String },

    /// One call site consumed the same value through two argument positions
    /// that both require exclusive access.
    #[error("overlapping accesses to '{name}', but deinitialization requires exclusive access; consider copying to a local variable")]
    ExclusivityConflict {
        name: String,
        first: Span,
        second: Span,
    },
}

impl std::fmt::Display for OwnershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for OwnershipError {}
