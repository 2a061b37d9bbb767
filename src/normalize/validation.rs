//! Header validation for definition sheets

use std::fmt;

use crate::util::eq_trimmed_ci;

/// One problem found while comparing sheet headers with a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOrderViolation {
    /// A template column appears nowhere in the sheet
    Missing { name: String },
    /// The column at `index` (0-based) is not the one the template expects
    Misordered {
        index: usize,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for ColumnOrderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnOrderViolation::Missing { name } => {
                write!(f, "missing required column '{}'", name)
            }
            ColumnOrderViolation::Misordered {
                index,
                expected,
                actual,
            } => write!(
                f,
                "column {} should be '{}' but is '{}'",
                index + 1,
                expected,
                actual
            ),
        }
    }
}

/// Compare `actual` headers with `expected`, collecting every violation.
///
/// Headers are compared trimmed and ignoring ASCII case. An empty result
/// means the headers match the template.
pub fn validate_column_order(actual: &[String], expected: &[&str]) -> Vec<ColumnOrderViolation> {
    let mut violations: Vec<ColumnOrderViolation> = expected
        .iter()
        .filter(|name| !actual.iter().any(|a| eq_trimmed_ci(a, name)))
        .map(|name| ColumnOrderViolation::Missing {
            name: name.to_string(),
        })
        .collect();

    violations.extend(
        expected
            .iter()
            .zip(actual.iter())
            .enumerate()
            .filter(|(_, (e, a))| !eq_trimmed_ci(a, e))
            .map(|(index, (e, a))| ColumnOrderViolation::Misordered {
                index,
                expected: e.to_string(),
                actual: a.trim().to_string(),
            }),
    );

    violations
}
