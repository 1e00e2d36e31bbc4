// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-declaration report aggregation.
//!
//! Findings from both checkers are merged into one ordered report per
//! function or generic declaration: sorted by primary location (then code,
//! then message, for a total order), with duplicate primaries for the same
//! (entity, kind, location) collapsed. Re-running the checkers over the
//! same input yields a byte-identical report.

use sable_ir::Span;
use serde::Serialize;

use crate::{Diagnostic, Severity};

/// Codes whose findings are self-contained: storage demotions and
/// structural pack errors. Everything else must carry at least one
/// conflicting-use annotation; a bare finding is a checker defect.
const SELF_CONTAINED: &[&str] = &[
    "E0906", "E0907", "E0908", // storage demotions
    "E1000", "E1001", "E1002", "E1003", "E1004", // reference well-formedness
    "E1006", "E1007", "E1008", // position errors
    "E1009", "E1010", "E1011", // arity errors
];

/// The ordered findings for one checked declaration.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Name of the function or generic declaration.
    pub decl: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Whether the declaration may proceed to code generation. Warnings do
    /// not block.
    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}

/// Build the report for one declaration from raw checker findings.
pub fn aggregate(decl: impl Into<String>, mut diagnostics: Vec<Diagnostic>) -> Report {
    for diag in &diagnostics {
        debug_assert!(
            diag.secondary_count() > 0
                || diag
                    .code
                    .as_ref()
                    .is_some_and(|c| SELF_CONTAINED.contains(&c.0.as_str())),
            "finding {:?} has no conflicting-use annotation",
            diag.code
        );
    }

    diagnostics.sort_by(|a, b| {
        let key = |d: &Diagnostic| {
            (
                d.primary_span().unwrap_or(Span::new(0, 0)),
                d.code.as_ref().map(|c| c.0.clone()).unwrap_or_default(),
                d.message.clone(),
            )
        };
        key(a).cmp(&key(b))
    });
    diagnostics.dedup_by(|a, b| {
        a.entity == b.entity && a.code == b.code && a.primary_span() == b.primary_span()
    });

    Report {
        decl: decl.into(),
        diagnostics,
    }
}
