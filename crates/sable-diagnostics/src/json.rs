// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON report output for machine consumption.
//!
//! The driver and editor tooling consume this instead of rendered text;
//! human-facing rendering is out of scope for the checker core.

use serde::Serialize;

use crate::codes::ErrorCodeRegistry;
use crate::report::Report;
use crate::Severity;

/// A complete JSON report for one checked batch.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Whether the batch passed (no error-severity findings).
    pub success: bool,
    pub declarations: Vec<JsonDeclReport>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// One declaration's findings, with categories resolved.
#[derive(Debug, Serialize)]
pub struct JsonDeclReport {
    pub decl: String,
    pub passed: bool,
    pub findings: Vec<JsonFinding>,
}

#[derive(Debug, Serialize)]
pub struct JsonFinding {
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    pub start: usize,
    pub end: usize,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build the JSON form of a batch of reports.
pub fn json_report(reports: &[Report]) -> JsonReport {
    let registry = ErrorCodeRegistry::default();
    let mut error_count = 0;
    let mut warning_count = 0;

    let declarations = reports
        .iter()
        .map(|report| {
            let findings = report
                .diagnostics
                .iter()
                .map(|diag| {
                    match diag.severity {
                        Severity::Error => error_count += 1,
                        Severity::Warning => warning_count += 1,
                        Severity::Note => {}
                    }
                    let code = diag.code.as_ref().map(|c| c.0.clone());
                    let category = code
                        .as_deref()
                        .and_then(|c| registry.get(c))
                        .map(|info| info.category.to_string());
                    JsonFinding {
                        severity: match diag.severity {
                            Severity::Error => "error".into(),
                            Severity::Warning => "warning".into(),
                            Severity::Note => "note".into(),
                        },
                        code,
                        category,
                        message: diag.message.clone(),
                        entity: diag.entity.clone(),
                        labels: diag
                            .labels
                            .iter()
                            .map(|l| JsonLabel {
                                start: l.span.start,
                                end: l.span.end,
                                style: match l.style {
                                    crate::LabelStyle::Primary => "primary".into(),
                                    crate::LabelStyle::Secondary => "secondary".into(),
                                },
                                message: l.message.clone(),
                            })
                            .collect(),
                        notes: diag.notes.clone(),
                    }
                })
                .collect();
            JsonDeclReport {
                decl: report.decl.clone(),
                passed: report.passed(),
                findings,
            }
        })
        .collect();

    JsonReport {
        version: 1,
        success: error_count == 0,
        declarations,
        error_count,
        warning_count,
    }
}

/// Serialize a batch of reports to a JSON string.
pub fn to_json_string(reports: &[Report]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json_report(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate;
    use crate::Diagnostic;
    use sable_ir::Span;

    #[test]
    fn json_counts_and_categories() {
        let diag = Diagnostic::error("'x' consumed more than once")
            .with_code("E0900")
            .with_entity("x")
            .with_primary(Span::new(10, 11), "consuming use here")
            .with_secondary(Span::new(5, 6), "consuming use here");
        let report = aggregate("f", vec![diag]);

        let json = json_report(&[report]);
        assert!(!json.success);
        assert_eq!(json.error_count, 1);
        assert_eq!(json.declarations[0].findings[0].category.as_deref(), Some("Ownership"));

        let text = to_json_string(&[]).unwrap();
        assert!(text.contains("\"version\": 1"));
    }
}
