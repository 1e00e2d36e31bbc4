// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from checker error types to `Diagnostic`.
//!
//! Every primary finding carries its conflicting-use annotations here;
//! storage demotions and structural pack errors are self-contained.

use crate::{Diagnostic, ToDiagnostic};
use sable_ir::Span;
use sable_ownership::{OwnershipError, OwnershipErrorKind};
use sable_packs::{PackError, PackErrorKind};

const CONSUMING_USE: &str = "consuming use here";
const NON_CONSUMING_USE: &str = "non-consuming use here";

fn with_consuming_notes(mut diag: Diagnostic, primary: Span, uses: &[Span]) -> Diagnostic {
    for &span in uses {
        if span == primary {
            continue;
        }
        diag = diag.with_secondary(span, CONSUMING_USE);
    }
    diag
}

// ============================================================================
// Ownership Errors
// ============================================================================

impl ToDiagnostic for OwnershipError {
    fn to_diagnostic(&self) -> Diagnostic {
        use OwnershipErrorKind::*;

        let message = self.kind.to_string();
        match &self.kind {
            ConsumedMoreThanOnce { name, uses } => {
                let diag = Diagnostic::error(message)
                    .with_code("E0900")
                    .with_entity(name)
                    .with_primary(self.span, CONSUMING_USE);
                with_consuming_notes(diag, self.span, uses)
            }

            UsedAfterConsume { name, consumed, .. } => {
                let diag = Diagnostic::error(message)
                    .with_code("E0901")
                    .with_entity(name)
                    .with_primary(self.span, NON_CONSUMING_USE);
                with_consuming_notes(diag, self.span, consumed)
            }

            ConsumedAtExit { name, uses } => {
                let diag = Diagnostic::error(message)
                    .with_code("E0902")
                    .with_entity(name)
                    .with_primary(self.span, "declared here");
                with_consuming_notes(diag, self.span, uses)
            }

            ConsumedInLoop { name, uses } => {
                // The conflicting use is the use itself, one iteration
                // later; it is annotated even when it is the primary.
                let mut diag = Diagnostic::error(message)
                    .with_code("E0903")
                    .with_entity(name)
                    .with_primary(self.span, "consumed in the loop body")
                    .with_note("the value is not reinitialized before the loop repeats");
                for &span in uses {
                    diag = diag.with_secondary(span, CONSUMING_USE);
                }
                diag
            }

            ConsumedInRegion {
                name,
                region,
                uses,
                region_span,
            } => {
                let diag = Diagnostic::error(message)
                    .with_code("E0904")
                    .with_entity(name)
                    .with_primary(self.span, CONSUMING_USE)
                    .with_secondary(*region_span, format!("{} begins here", region));
                with_consuming_notes(diag, self.span, uses)
            }

            GuaranteedConsumed { name, uses } => {
                let diag = Diagnostic::error(message)
                    .with_code("E0905")
                    .with_entity(name)
                    .with_primary(self.span, "has guaranteed ownership");
                with_consuming_notes(diag, self.span, uses)
            }

            ConsumedMutableCapture { name } | ConsumedImmutableCapture { name } => {
                Diagnostic::error(message)
                    .with_code("E0906")
                    .with_entity(name)
                    .with_primary(self.span, CONSUMING_USE)
            }

            ConsumedClassVarField { name } | ConsumedClassLetField { name } => {
                Diagnostic::error(message)
                    .with_code("E0907")
                    .with_entity(name)
                    .with_primary(self.span, CONSUMING_USE)
            }

            ConsumedGlobalVar { name } | ConsumedGlobalLet { name } => {
                Diagnostic::error(message)
                    .with_code("E0908")
                    .with_entity(name)
                    .with_primary(self.span, CONSUMING_USE)
            }

            ExclusivityConflict { name, first, second } => Diagnostic::error(message)
                .with_code("E0909")
                .with_entity(name)
                .with_primary(*second, "conflicting access here")
                .with_secondary(*first, "other access here"),
        }
    }
}

// ============================================================================
// Pack Errors
// ============================================================================

impl ToDiagnostic for PackError {
    fn to_diagnostic(&self) -> Diagnostic {
        use PackErrorKind::*;

        let message = self.kind.to_string();
        match &self.kind {
            RefRequiresExpansion { name } => Diagnostic::error(message)
                .with_code("E1000")
                .with_entity(name)
                .with_primary(self.span, "pack referenced here"),

            ValueRefOutsideExpansion { name } => Diagnostic::error(message)
                .with_code("E1001")
                .with_entity(name)
                .with_primary(self.span, "pack referenced here"),

            BareRef { name } => Diagnostic::error(message)
                .with_code("E1002")
                .with_entity(name)
                .with_primary(self.span, "add 'each' before the pack name"),

            EachNonPack { name } => Diagnostic::error(message)
                .with_code("E1003")
                .with_entity(name)
                .with_primary(self.span, "not a pack"),

            NoPackReferences { .. } => Diagnostic::error(message)
                .with_code("E1004")
                .with_primary(self.span, "expansion here"),

            ShapeMismatch {
                first,
                second,
                first_decl,
                second_decl,
            } => Diagnostic::error(message)
                .with_code("E1005")
                .with_entity(first)
                .with_primary(self.span, "co-expanded here")
                .with_secondary(*first_decl, format!("pack '{}' declared here", first))
                .with_secondary(*second_decl, format!("pack '{}' declared here", second)),

            CallShapeMismatch {
                first,
                second,
                first_decl,
                second_decl,
                ..
            } => Diagnostic::error(message)
                .with_code("E1005")
                .with_entity(first)
                .with_primary(self.span, "in this call")
                .with_secondary(*first_decl, format!("pack '{}' declared here", first))
                .with_secondary(*second_decl, format!("pack '{}' declared here", second)),

            InvalidValueExpansionPosition => Diagnostic::error(message)
                .with_code("E1006")
                .with_primary(self.span, "expansion here"),

            InvalidTypeExpansionPosition { .. } => Diagnostic::error(message)
                .with_code("E1007")
                .with_primary(self.span, "expansion here"),

            ExpansionToNonPackParam { .. } => Diagnostic::error(message)
                .with_code("E1008")
                .with_primary(self.span, "expansion here"),

            MissingArgument { .. } => Diagnostic::error(message)
                .with_code("E1009")
                .with_primary(self.span, "in this call"),

            ExtraArgument => Diagnostic::error(message)
                .with_code("E1010")
                .with_primary(self.span, "in this call"),

            TupleInsteadOfArguments { .. } => Diagnostic::error(message)
                .with_code("E1011")
                .with_primary(self.span, "tuple argument here"),

            AmbiguousUse { name, candidates } => {
                let mut diag = Diagnostic::error(message)
                    .with_code("E1012")
                    .with_entity(name)
                    .with_primary(self.span, "ambiguous call here");
                for &span in candidates {
                    diag = diag.with_secondary(span, "found this candidate");
                }
                diag
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelStyle;

    #[test]
    fn double_consume_carries_every_consuming_use() {
        let err = OwnershipError {
            span: Span::new(20, 21),
            kind: OwnershipErrorKind::ConsumedMoreThanOnce {
                name: "x".into(),
                uses: vec![Span::new(10, 11), Span::new(20, 21)],
            },
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.as_ref().map(|c| c.0.as_str()), Some("E0900"));
        assert_eq!(diag.entity.as_deref(), Some("x"));
        assert_eq!(diag.primary_span(), Some(Span::new(20, 21)));
        // The primary span is not repeated as a secondary.
        assert_eq!(diag.secondary_count(), 1);
        assert_eq!(diag.labels[1].span, Span::new(10, 11));
    }

    #[test]
    fn use_after_consume_has_both_roles() {
        let err = OwnershipError {
            span: Span::new(30, 31),
            kind: OwnershipErrorKind::UsedAfterConsume {
                name: "x".into(),
                consumed: vec![Span::new(10, 11)],
                used: Span::new(30, 31),
            },
        };
        let diag = err.to_diagnostic();
        assert_eq!(
            diag.labels[0].message.as_deref(),
            Some("non-consuming use here")
        );
        assert_eq!(diag.labels[1].message.as_deref(), Some("consuming use here"));
        assert_eq!(diag.labels[1].style, LabelStyle::Secondary);
    }

    #[test]
    fn ambiguous_use_notes_every_candidate() {
        let err = PackError {
            span: Span::new(5, 6),
            kind: PackErrorKind::AmbiguousUse {
                name: "init".into(),
                candidates: vec![Span::new(1, 2), Span::new(3, 4)],
            },
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.as_ref().map(|c| c.0.as_str()), Some("E1012"));
        assert_eq!(diag.secondary_count(), 2);
    }
}
