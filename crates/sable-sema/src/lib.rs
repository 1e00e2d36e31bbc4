// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Batch driver for the Sable semantic checkers.
//!
//! Runs the ownership/move checker over every function body and the pack
//! solver over every generic declaration, aggregates per-declaration
//! reports, and decides the overall pass/fail verdict. Declarations are
//! independent: workers share nothing but the immutable symbol table, so
//! chunks of them are checked in parallel scoped threads. Checking
//! short-circuits once the accumulated error count passes the configured
//! limit; declarations already checked keep their reports.

use sable_diagnostics::report::{aggregate, Report};
use sable_diagnostics::ToDiagnostic;
use sable_ir::Func;
use sable_packs::PackExpr;
use sable_types::{GenericDeclId, SymbolTable};

/// Driver configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Stop scheduling new declarations once this many errors have been
    /// reported. `None` checks everything.
    pub error_limit: Option<usize>,
    /// Worker threads per chunk; defaults to available parallelism.
    pub jobs: Option<usize>,
}

/// A generic declaration together with the pack expressions the type
/// checker collected from its body.
#[derive(Debug)]
pub struct GenericCheck {
    pub decl: GenericDeclId,
    pub exprs: Vec<PackExpr>,
}

/// Verdict for one checked module.
#[derive(Debug)]
pub struct ModuleReport {
    /// One report per checked declaration, in input order.
    pub reports: Vec<Report>,
    /// Whether the error limit cut checking short.
    pub truncated: bool,
}

impl ModuleReport {
    /// Overall verdict: fail if any declaration produced error-severity
    /// findings. Warnings do not block downstream generation.
    pub fn passed(&self) -> bool {
        self.reports.iter().all(|r| r.passed())
    }

    pub fn error_count(&self) -> usize {
        self.reports.iter().map(|r| r.error_count()).sum()
    }
}

enum Work<'a> {
    Func(&'a Func),
    Generic(&'a GenericCheck),
}

/// Check a module's function bodies and generic declarations.
pub fn check_module(
    symtab: &SymbolTable,
    funcs: &[Func],
    generics: &[GenericCheck],
    options: &CheckOptions,
) -> ModuleReport {
    let work: Vec<Work> = funcs
        .iter()
        .map(Work::Func)
        .chain(generics.iter().map(Work::Generic))
        .collect();

    let jobs = options
        .jobs
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1);

    let mut reports = Vec::with_capacity(work.len());
    let mut errors = 0;
    let mut truncated = false;

    for chunk in work.chunks(jobs) {
        let chunk_reports: Vec<Report> = std::thread::scope(|s| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|item| s.spawn(move || check_one(symtab, item)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("checker worker panicked"))
                .collect()
        });

        for report in chunk_reports {
            errors += report.error_count();
            reports.push(report);
        }
        if let Some(limit) = options.error_limit {
            if errors >= limit {
                truncated = reports.len() < work.len();
                break;
            }
        }
    }

    ModuleReport { reports, truncated }
}

fn check_one(symtab: &SymbolTable, work: &Work) -> Report {
    match work {
        Work::Func(func) => {
            let result = sable_ownership::check_func(symtab, func);
            let diags = result
                .errors
                .iter()
                .map(|e| e.to_diagnostic())
                .collect();
            aggregate(func.name.clone(), diags)
        }
        Work::Generic(generic) => {
            let decl = symtab.generic(generic.decl);
            let result = sable_packs::check_decl(decl, &generic.exprs);
            let diags = result
                .errors
                .iter()
                .map(|e| e.to_diagnostic())
                .collect();
            aggregate(decl.name.clone(), diags)
        }
    }
}
