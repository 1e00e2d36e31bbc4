// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Sable checker diagnostics.
//!
//! Provides the structured finding type both checkers' errors convert into,
//! via the `ToDiagnostic` trait, plus the per-declaration report aggregator.
//! Rendering findings as user-facing text is a driver concern and lives
//! outside this core; the JSON module exists for machine consumers.

pub mod codes;
pub mod convert;
pub mod json;
pub mod report;

use sable_ir::Span;
use serde::Serialize;

// ============================================================================
// Core Types
// ============================================================================

/// A checker finding with structured location context.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<ErrorCode>,
    pub message: String,
    /// Entity path the finding is about, e.g. `a.payload`.
    pub entity: Option<String>,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

/// A labeled source span within a finding.
#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub span: Span,
    pub style: LabelStyle,
    /// Role of this location, e.g. "consuming use here".
    pub message: Option<String>,
}

/// How a label relates to the finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// The offending location.
    Primary,
    /// A conflicting or explanatory location.
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// An error code like E0900.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub String);

// ============================================================================
// Builder API
// ============================================================================

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            entity: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: None,
            message: message.into(),
            entity: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(ErrorCode(code.into()));
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_label(mut self, span: Span, style: LabelStyle, msg: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            style,
            message: Some(msg.into()),
        });
        self
    }

    pub fn with_primary(self, span: Span, msg: impl Into<String>) -> Self {
        self.with_label(span, LabelStyle::Primary, msg)
    }

    pub fn with_secondary(self, span: Span, msg: impl Into<String>) -> Self {
        self.with_label(span, LabelStyle::Secondary, msg)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Returns the primary span (first primary label, or first label).
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find(|l| l.style == LabelStyle::Primary)
            .or(self.labels.first())
            .map(|l| l.span)
    }

    pub fn secondary_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|l| l.style == LabelStyle::Secondary)
            .count()
    }
}

// ============================================================================
// Conversion Trait
// ============================================================================

/// Convert a checker error into a structured finding.
pub trait ToDiagnostic {
    fn to_diagnostic(&self) -> Diagnostic;
}
