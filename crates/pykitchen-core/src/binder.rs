//! Type-checked slot binding.
//!
//! A [`SlotBindings`] vector has one entry per argument of the selected tool.
//! Entries hold the catalog position of the ingredient placed there, so the
//! catalog stays the single owner of ingredient data. [`bind`] is a pure
//! decision: the caller logs the outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Ingredient, Tool};
use crate::value::ValueType;

/// Argument slots of the selected tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBindings {
    slots: Vec<Option<usize>>,
}

impl SlotBindings {
    /// Creates an all-empty binding vector sized to the tool's arity.
    #[must_use]
    pub fn for_tool(tool: &Tool) -> Self {
        Self {
            slots: vec![None; tool.arity()],
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if there are no slots (no tool selected).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Catalog position of the ingredient in `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<usize> {
        self.slots.get(slot).copied().flatten()
    }

    /// Iterates over the slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.slots.iter().copied()
    }

    /// Returns `true` if there is at least one slot and every slot is filled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(Option::is_some)
    }

    /// Empties one slot. Returns `false` if the index is out of range.
    pub fn clear_slot(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = None;
                true
            }
            None => false,
        }
    }

    /// Empties every slot, keeping the arity.
    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(|entry| *entry = None);
    }
}

/// Why an ingredient could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindRejection {
    /// The slot index is outside the tool's arity.
    SlotOutOfRange {
        /// Requested slot.
        index: usize,
        /// Arity of the tool.
        arity: usize,
    },
    /// The ingredient's type is not accepted by the slot.
    TypeMismatch(TypeMismatch),
}

/// An ingredient whose type the target slot does not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    /// Variable name of the ingredient.
    pub ingredient: String,
    /// Type of the ingredient.
    pub ingredient_type: ValueType,
    /// Name of the tool.
    pub tool: String,
    /// Target slot (0-based).
    pub slot: usize,
    /// Types the slot accepts.
    pub accepted: Vec<ValueType>,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accepted: Vec<String> = self.accepted.iter().map(ToString::to_string).collect();
        write!(
            f,
            "Type error: {} is {}, but {} expects [{}]",
            self.ingredient,
            self.ingredient_type,
            self.tool,
            accepted.join(", ")
        )
    }
}

/// Places `ingredient` (catalog position `ingredient_index`) into `slot`.
///
/// On rejection the bindings are left untouched.
pub fn bind(
    slot: usize,
    tool: &Tool,
    ingredient: &Ingredient,
    ingredient_index: usize,
    bindings: &mut SlotBindings,
) -> Result<(), BindRejection> {
    let Some(argument) = tool.args.get(slot) else {
        return Err(BindRejection::SlotOutOfRange {
            index: slot,
            arity: tool.arity(),
        });
    };

    if !argument.accepts(ingredient.value_type) {
        return Err(BindRejection::TypeMismatch(TypeMismatch {
            ingredient: ingredient.name.clone(),
            ingredient_type: ingredient.value_type,
            tool: tool.name.clone(),
            slot,
            accepted: argument.allowed_types.clone(),
        }));
    }

    match bindings.slots.get_mut(slot) {
        Some(entry) => {
            *entry = Some(ingredient_index);
            Ok(())
        }
        None => Err(BindRejection::SlotOutOfRange {
            index: slot,
            arity: bindings.len(),
        }),
    }
}
