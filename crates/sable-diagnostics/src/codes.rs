// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! Maps checker error codes (E0900, E1005, etc.) to titles and categories
//! for machine-readable output and future `explain` tooling.

use std::collections::HashMap;

/// Registry of all known error codes.
pub struct ErrorCodeRegistry {
    codes: HashMap<&'static str, ErrorCodeInfo>,
}

/// Information about a single error code.
pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
}

/// Error category for grouping.
#[derive(Debug, Clone, Copy)]
pub enum ErrorCategory {
    Ownership,
    Packs,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Ownership => write!(f, "Ownership"),
            ErrorCategory::Packs => write!(f, "Packs"),
        }
    }
}

macro_rules! register_codes {
    ($($code:literal => ($title:literal, $cat:expr)),* $(,)?) => {{
        let mut map = HashMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                // Ownership/move errors (E09xx)
                "E0900" => ("consumed more than once", Ownership),
                "E0901" => ("used after consume", Ownership),
                "E0902" => ("consumed but not reinitialized at end of function", Ownership),
                "E0903" => ("consumed by a use in a loop", Ownership),
                "E0904" => ("consumed in non-exclusive region", Ownership),
                "E0905" => ("guaranteed value consumed", Ownership),
                "E0906" => ("escaping capture consumed", Ownership),
                "E0907" => ("class field consumed", Ownership),
                "E0908" => ("global storage consumed", Ownership),
                "E0909" => ("exclusivity conflict at call site", Ownership),

                // Pack/shape errors (E10xx)
                "E1000" => ("pack reference requires 'repeat'", Packs),
                "E1001" => ("pack reference outside expansion", Packs),
                "E1002" => ("pack referenced without 'each'", Packs),
                "E1003" => ("'each' applied to non-pack type", Packs),
                "E1004" => ("expansion contains no pack reference", Packs),
                "E1005" => ("pack shape mismatch", Packs),
                "E1006" => ("value expansion in invalid position", Packs),
                "E1007" => ("type expansion in invalid position", Packs),
                "E1008" => ("expansion passed to non-pack parameter", Packs),
                "E1009" => ("missing argument", Packs),
                "E1010" => ("extra argument", Packs),
                "E1011" => ("tuple passed where spread arguments expected", Packs),
                "E1012" => ("ambiguous use", Packs),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    pub fn all(&self) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values()
    }
}
