//! Execution and verification.
//!
//! [`run`] invokes a tool with its bound ingredient values and compares the
//! result to an order's expected value. It never mutates the catalog, and
//! every outcome, including a tool rejecting its inputs, is reported as a
//! [`Verdict`] rather than an error.

use serde::{Deserialize, Serialize};

use crate::binder::SlotBindings;
use crate::catalog::{Catalog, Tool};
use crate::value::Value;

/// Outcome of a run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The result equals the expected value.
    Success {
        /// The produced value.
        result: Value,
    },
    /// The tool ran but produced a different value.
    Mismatch {
        /// The produced value.
        result: Value,
        /// The value the order asked for.
        expected: Value,
    },
    /// The tool rejected its runtime inputs.
    ExecutionError {
        /// The tool's error message.
        message: String,
    },
    /// At least one slot was empty; nothing was executed.
    IncompleteArguments,
}

impl Verdict {
    /// Returns `true` for outcomes that count as a failed attempt.
    #[must_use]
    pub const fn counts_as_failure(&self) -> bool {
        matches!(self, Self::Mismatch { .. } | Self::ExecutionError { .. })
    }

    /// Returns `true` if the order was fulfilled.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Collects bound values in slot order, or `None` if any slot is empty.
#[must_use]
pub fn bound_values<'c>(bindings: &SlotBindings, catalog: &'c Catalog) -> Option<Vec<&'c Value>> {
    if !bindings.is_complete() {
        return None;
    }
    bindings
        .iter()
        .map(|slot| slot.and_then(|idx| catalog.ingredients.get(idx)).map(|i| &i.value))
        .collect()
}

/// Runs `tool` with the values bound in `bindings` and verifies the result.
pub fn run(tool: &Tool, bindings: &SlotBindings, catalog: &Catalog, expected: &Value) -> Verdict {
    let Some(args) = bound_values(bindings, catalog) else {
        return Verdict::IncompleteArguments;
    };

    match tool.builtin.call(&args) {
        Ok(result) if result == *expected => Verdict::Success { result },
        Ok(result) => Verdict::Mismatch {
            result,
            expected: expected.clone(),
        },
        Err(err) => Verdict::ExecutionError {
            message: err.message,
        },
    }
}
