//! Catalog data: ingredients, tools and orders.
//!
//! The catalog is static configuration supplied when a session starts. The
//! bundled default (`catalog/default.json`) holds the six orders of the
//! original game; [`Catalog::load_from_file`] accepts an alternative catalog
//! with the same shape. Catalogs are immutable once loaded and are shared
//! between sessions behind an `Arc`.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::builtins::Builtin;
use crate::error::{KitchenError, Result};
use crate::value::{Value, ValueType};

/// The catalog bundled with the crate.
const DEFAULT_CATALOG: &str = include_str!("../catalog/default.json");

// ============================================================================
// Catalog entries
// ============================================================================

/// A named value the player can place into tool arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Unique identifier (e.g. `ing_1`).
    pub id: String,

    /// Variable name shown to the player (e.g. `price_a`).
    pub name: String,

    /// The runtime value.
    pub value: Value,

    /// Declared semantic type; must match `value`.
    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Human-readable rendering of the value. Derived from `value` when omitted.
    #[serde(default)]
    pub display_value: String,

    /// Descriptive text.
    #[serde(default)]
    pub description: String,
}

/// A declared argument slot of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolArgument {
    /// Parameter name (e.g. `iterable`).
    pub name: String,

    /// Types an ingredient must have to occupy this slot.
    pub allowed_types: Vec<ValueType>,
}

impl ToolArgument {
    /// Returns `true` if an ingredient of `value_type` may occupy this slot.
    #[must_use]
    pub fn accepts(&self, value_type: ValueType) -> bool {
        self.allowed_types.contains(&value_type)
    }
}

/// A built-in function the player can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique identifier (e.g. `tool_add`).
    pub id: String,

    /// Function name (e.g. `add`).
    pub name: String,

    /// Human description.
    #[serde(default)]
    pub description: String,

    /// Printable call signature (e.g. `add(a, b)`).
    pub signature: String,

    /// Ordered argument slots; length equals the builtin's arity.
    pub args: Vec<ToolArgument>,

    /// The function this tool runs.
    pub builtin: Builtin,

    /// Documentation snippet shown as a tooltip.
    #[serde(default)]
    pub doc: String,
}

impl Tool {
    /// Number of argument slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// Difficulty tag of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Introductory.
    Easy,
    /// Intermediate.
    Medium,
    /// Advanced.
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// A level: the value the player must produce, plus teaching material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique identifier (e.g. `ord_1`).
    pub id: String,

    /// Short title.
    pub title: String,

    /// Task description.
    pub description: String,

    /// Difficulty tag.
    pub difficulty: Difficulty,

    /// The value a correct run must produce.
    pub expected_result: Value,

    /// Static fallback hint.
    #[serde(default)]
    pub hint: String,

    /// Educational explanation.
    #[serde(default)]
    pub learning_goal: String,

    /// Tool the order is designed around. Advisory only; never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tool_id: Option<String>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable definitions of everything a session can use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Values available in the pantry.
    pub ingredients: Vec<Ingredient>,

    /// The closed tool registry.
    pub tools: Vec<Tool>,

    /// Levels in play order.
    pub orders: Vec<Order>,
}

impl Catalog {
    /// Loads the catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled file is broken, which the test suite guards.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str("catalog/default.json", DEFAULT_CATALOG)
    }

    /// Loads and validates a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::CatalogParseError` if the file cannot be read or
    /// parsed, and `KitchenError::CatalogValidationError` if its content is
    /// inconsistent.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KitchenError::catalog_parse(
                path.display().to_string(),
                format!("failed to read file: {e}"),
            )
        })?;
        Self::from_json_str(&path.display().to_string(), &contents)
    }

    /// Parses and validates a catalog from JSON text.
    ///
    /// Missing `displayValue`s are filled in from the ingredient values.
    pub fn from_json_str(source_name: &str, json: &str) -> Result<Self> {
        let mut catalog: Self = serde_json::from_str(json)
            .map_err(|e| KitchenError::catalog_parse(source_name, e.to_string()))?;

        for ingredient in &mut catalog.ingredients {
            if ingredient.display_value.is_empty() {
                ingredient.display_value = ingredient.value.to_string();
            }
        }

        catalog.validate()?;
        Ok(catalog)
    }

    /// Checks the catalog for internal consistency.
    ///
    /// - there is at least one order
    /// - ids are unique within each table
    /// - every ingredient value matches its declared type
    /// - every tool has one slot per builtin argument, each accepting at least one type
    /// - every `requiredToolId` names an existing tool
    pub fn validate(&self) -> Result<()> {
        if self.orders.is_empty() {
            return Err(KitchenError::catalog_validation(
                "catalog has no orders",
                "Add at least one entry to the 'orders' array",
            ));
        }

        ensure_unique("ingredient", self.ingredients.iter().map(|i| i.id.as_str()))?;
        ensure_unique("tool", self.tools.iter().map(|t| t.id.as_str()))?;
        ensure_unique("order", self.orders.iter().map(|o| o.id.as_str()))?;

        for ingredient in &self.ingredients {
            let actual = ingredient.value.value_type();
            if actual != ingredient.value_type {
                return Err(KitchenError::catalog_validation(
                    format!(
                        "ingredient '{}' is declared as {} but its value is {actual}",
                        ingredient.id, ingredient.value_type
                    ),
                    "Make the 'type' field match the ingredient's value",
                ));
            }
        }

        for tool in &self.tools {
            if tool.arity() != tool.builtin.arity() {
                return Err(KitchenError::catalog_validation(
                    format!(
                        "tool '{}' declares {} arguments but {}() takes {}",
                        tool.id,
                        tool.arity(),
                        tool.builtin,
                        tool.builtin.arity()
                    ),
                    "Declare exactly one 'args' entry per function parameter",
                ));
            }
            if let Some(arg) = tool.args.iter().find(|a| a.allowed_types.is_empty()) {
                return Err(KitchenError::catalog_validation(
                    format!(
                        "argument '{}' of tool '{}' accepts no types",
                        arg.name, tool.id
                    ),
                    "List at least one entry in 'allowedTypes'",
                ));
            }
        }

        for order in &self.orders {
            if let Some(tool_id) = &order.required_tool_id {
                if self.tool(tool_id).is_none() {
                    return Err(KitchenError::catalog_validation(
                        format!("order '{}' refers to unknown tool '{tool_id}'", order.id),
                        "Fix 'requiredToolId' or remove it",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Looks up an ingredient by id.
    #[must_use]
    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    /// Returns the position of an ingredient by id or by variable name.
    #[must_use]
    pub fn ingredient_index(&self, key: &str) -> Option<usize> {
        self.ingredients
            .iter()
            .position(|i| i.id == key)
            .or_else(|| self.ingredients.iter().position(|i| i.name == key))
    }

    /// Looks up a tool by id.
    #[must_use]
    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Returns the position of a tool by id or by function name.
    #[must_use]
    pub fn tool_index(&self, key: &str) -> Option<usize> {
        self.tools
            .iter()
            .position(|t| t.id == key)
            .or_else(|| self.tools.iter().position(|t| t.name == key))
    }

    /// Returns the order at the given level.
    #[must_use]
    pub fn order(&self, level: usize) -> Option<&Order> {
        self.orders.get(level)
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(KitchenError::catalog_validation(
                format!("duplicate {kind} id '{id}'"),
                format!("Give every {kind} a unique 'id'"),
            ));
        }
    }
    Ok(())
}
