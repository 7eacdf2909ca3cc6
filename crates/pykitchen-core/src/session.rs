//! The progression state machine.
//!
//! A [`Session`] is the explicit context of one playthrough. Every command
//! mutates it synchronously and returns a [`Transition`] describing what
//! happened: the verdict of a run (if any), the log entries appended, and
//! any timed work the caller must schedule. The session never sleeps or
//! spawns; deferred work comes back through [`Session::fire`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::binder::{bind, BindRejection, SlotBindings};
use crate::catalog::{Catalog, Ingredient, Order, Tool};
use crate::config::PacingConfig;
use crate::engine::{self, Verdict};
use crate::error::{KitchenError, Result};
use crate::event_log::{EventKind, EventLog, LogEntry};
use crate::hint::{HintContext, SlotView};
use crate::value::Value;

/// Points awarded per completed order.
pub const ORDER_AWARD: u32 = 100;

/// Failure count at which the player is nudged towards a hint.
pub const NUDGE_THRESHOLD: u32 = 3;

const NUDGE_MESSAGE: &str = "Chef: Stuck? Press 'hint' for a tip!";

// ============================================================================
// Phase
// ============================================================================

/// Where the player is in the current order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No tool selected.
    AwaitingTool,
    /// A tool is selected but at least one slot is empty.
    AwaitingArguments,
    /// Every slot is filled; a run will execute.
    Ready,
    /// The order was fulfilled; waiting for the next one.
    LevelComplete,
    /// The last order was fulfilled.
    AllOrdersComplete,
}

impl Phase {
    /// Returns `true` if no further commands have an effect.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::AllOrdersComplete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Playing,
    LevelComplete,
    Finished,
}

// ============================================================================
// Transition and deferrals
// ============================================================================

/// Work that must happen after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredAction {
    /// Move on to the next order.
    AdvanceLevel,
    /// Suggest using the hint feature.
    HintNudge,
}

/// A timed action scheduled for a specific level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferral {
    /// Level index the action belongs to.
    pub level: usize,
    /// How long to wait before firing.
    pub delay: Duration,
    /// What to do.
    pub action: DeferredAction,
}

/// The observable effect of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Outcome of a run request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Entries appended to the log, oldest first.
    pub events: Vec<LogEntry>,
    /// Timed work to schedule.
    #[serde(skip)]
    pub deferrals: Vec<Deferral>,
}

impl Transition {
    /// Returns `true` if the command changed nothing visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.verdict.is_none() && self.events.is_empty() && self.deferrals.is_empty()
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current level index (0-based).
    pub level: usize,
    /// Number of orders in the catalog.
    pub total_levels: usize,
    /// The current order.
    pub order: Order,
    /// Cumulative score.
    pub score: u32,
    /// Consecutive failed runs on this level.
    pub failures: u32,
    /// Current phase.
    pub phase: Phase,
    /// Id of the selected tool.
    pub selected_tool: Option<String>,
    /// Slot contents in order.
    pub slots: Vec<Option<SlotView>>,
    /// Variable name of the ingredient awaiting placement.
    pub pending_ingredient: Option<String>,
    /// A hint request is in flight.
    pub hint_busy: bool,
    /// Console entries, newest first.
    pub log: Vec<LogEntry>,
}

// ============================================================================
// Session
// ============================================================================

/// One playthrough of the catalog's orders.
#[derive(Debug, Clone)]
pub struct Session {
    catalog: Arc<Catalog>,
    pacing: PacingConfig,
    level: usize,
    score: u32,
    failures: u32,
    progress: Progress,
    selected_tool: Option<usize>,
    pending_ingredient: Option<usize>,
    bindings: SlotBindings,
    log: EventLog,
    hint_busy: bool,
}

impl Session {
    /// Starts a session at the first order.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::CatalogValidationError` if the catalog has no orders.
    pub fn new(catalog: Arc<Catalog>, pacing: PacingConfig) -> Result<Self> {
        if catalog.orders.is_empty() {
            return Err(KitchenError::catalog_validation(
                "catalog has no orders",
                "Add at least one entry to the 'orders' array",
            ));
        }

        Ok(Self {
            catalog,
            pacing,
            level: 0,
            score: 0,
            failures: 0,
            progress: Progress::Playing,
            selected_tool: None,
            pending_ingredient: None,
            bindings: SlotBindings::default(),
            log: EventLog::new(),
            hint_busy: false,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The catalog this session plays.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Current level index (0-based).
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Cumulative score.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Consecutive failed runs on this level.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// The order being played.
    #[must_use]
    pub fn current_order(&self) -> &Order {
        &self.catalog.orders[self.level]
    }

    /// The selected tool, if any.
    #[must_use]
    pub fn selected_tool(&self) -> Option<&Tool> {
        self.selected_tool.map(|idx| &self.catalog.tools[idx])
    }

    /// The ingredient awaiting placement, if any.
    #[must_use]
    pub fn pending_ingredient(&self) -> Option<&Ingredient> {
        self.pending_ingredient
            .map(|idx| &self.catalog.ingredients[idx])
    }

    /// Current slot bindings.
    #[must_use]
    pub const fn bindings(&self) -> &SlotBindings {
        &self.bindings
    }

    /// The console.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Returns `true` while a hint request is in flight.
    #[must_use]
    pub const fn hint_busy(&self) -> bool {
        self.hint_busy
    }

    /// Returns `true` once every order has been completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.progress == Progress::Finished
    }

    /// Derives the phase from the session's state.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.progress {
            Progress::Finished => Phase::AllOrdersComplete,
            Progress::LevelComplete => Phase::LevelComplete,
            Progress::Playing if self.selected_tool.is_none() => Phase::AwaitingTool,
            Progress::Playing if self.bindings.is_complete() => Phase::Ready,
            Progress::Playing => Phase::AwaitingArguments,
        }
    }

    /// Serializable view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            level: self.level,
            total_levels: self.catalog.orders.len(),
            order: self.current_order().clone(),
            score: self.score,
            failures: self.failures,
            phase: self.phase(),
            selected_tool: self.selected_tool().map(|t| t.id.clone()),
            slots: self.slot_views(),
            pending_ingredient: self.pending_ingredient().map(|i| i.name.clone()),
            hint_busy: self.hint_busy,
            log: self.log.entries().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Picks an ingredient (by id or name) for the next placement.
    ///
    /// Replaces any ingredient still awaiting placement.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::UnknownIngredient` if the catalog has no such ingredient.
    pub fn select_ingredient(&mut self, id: &str) -> Result<Transition> {
        if self.is_finished() {
            return Ok(Transition::default());
        }
        let idx = self
            .catalog
            .ingredient_index(id)
            .ok_or_else(|| KitchenError::unknown_ingredient(id))?;

        self.pending_ingredient = Some(idx);
        debug!(ingredient = %self.catalog.ingredients[idx].name, "Ingredient selected");
        Ok(Transition::default())
    }

    /// Selects a tool (by id or name), resetting every slot.
    ///
    /// Re-selecting the current tool changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::UnknownTool` if the catalog has no such tool.
    pub fn select_tool(&mut self, id: &str) -> Result<Transition> {
        if self.is_finished() {
            return Ok(Transition::default());
        }
        let idx = self
            .catalog
            .tool_index(id)
            .ok_or_else(|| KitchenError::unknown_tool(id))?;
        if self.selected_tool == Some(idx) {
            return Ok(Transition::default());
        }

        let catalog = Arc::clone(&self.catalog);
        let tool = &catalog.tools[idx];
        self.selected_tool = Some(idx);
        self.bindings = SlotBindings::for_tool(tool);
        self.pending_ingredient = None;

        info!(index = self.level, tool = %tool.name, "Tool selected");
        let mut transition = Transition::default();
        self.emit(&mut transition, EventKind::Info, format!("Tool selected: {}", tool.name));
        Ok(transition)
    }

    /// Places the pending ingredient into `slot`.
    ///
    /// Does nothing when no tool is selected or no ingredient is pending.
    /// A type mismatch is reported as an error event and leaves every slot
    /// and the pending ingredient as they were.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::SlotOutOfRange` if `slot` exceeds the tool's arity.
    pub fn place(&mut self, slot: usize) -> Result<Transition> {
        if self.is_finished() {
            return Ok(Transition::default());
        }
        let catalog = Arc::clone(&self.catalog);
        let Some(tool) = self.selected_tool.map(|idx| &catalog.tools[idx]) else {
            return Ok(Transition::default());
        };
        if slot >= tool.arity() {
            return Err(KitchenError::slot_out_of_range(slot, tool.arity()));
        }
        let Some(ingredient_idx) = self.pending_ingredient else {
            return Ok(Transition::default());
        };
        let ingredient = &catalog.ingredients[ingredient_idx];

        let mut transition = Transition::default();
        match bind(slot, tool, ingredient, ingredient_idx, &mut self.bindings) {
            Ok(()) => {
                self.pending_ingredient = None;
                info!(slot, ingredient = %ingredient.name, "Ingredient placed");
                self.emit(
                    &mut transition,
                    EventKind::Info,
                    format!("Added {} to argument {}", ingredient.name, slot + 1),
                );
            }
            Err(BindRejection::TypeMismatch(mismatch)) => {
                info!(slot, ingredient = %ingredient.name, "Type mismatch");
                self.emit(&mut transition, EventKind::Error, mismatch.to_string());
            }
            Err(BindRejection::SlotOutOfRange { index, arity }) => {
                return Err(KitchenError::slot_out_of_range(index, arity));
            }
        }
        Ok(transition)
    }

    /// Empties one slot.
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::NoToolSelected` without a tool, or
    /// `KitchenError::SlotOutOfRange` if `slot` exceeds the tool's arity.
    pub fn clear_slot(&mut self, slot: usize) -> Result<Transition> {
        if self.is_finished() {
            return Ok(Transition::default());
        }
        if self.selected_tool.is_none() {
            return Err(KitchenError::NoToolSelected);
        }
        if !self.bindings.clear_slot(slot) {
            return Err(KitchenError::slot_out_of_range(slot, self.bindings.len()));
        }

        let mut transition = Transition::default();
        self.emit(&mut transition, EventKind::Info, format!("Cleared argument {}", slot + 1));
        Ok(transition)
    }

    /// Empties every slot of the selected tool.
    pub fn clear_all(&mut self) -> Transition {
        let mut transition = Transition::default();
        if self.is_finished() || self.selected_tool.is_none() {
            return transition;
        }
        self.bindings.clear_all();
        self.emit(&mut transition, EventKind::Info, "Cleared all arguments");
        transition
    }

    /// Runs the selected tool and checks the result against the current order.
    pub fn run(&mut self) -> Transition {
        let mut transition = Transition::default();
        match self.progress {
            Progress::Finished => return transition,
            Progress::LevelComplete => {
                self.emit(
                    &mut transition,
                    EventKind::Info,
                    "Order already complete. The next order is on its way!",
                );
                return transition;
            }
            Progress::Playing => {}
        }

        let catalog = Arc::clone(&self.catalog);
        let Some(tool) = self.selected_tool.map(|idx| &catalog.tools[idx]) else {
            transition.verdict = Some(Verdict::IncompleteArguments);
            self.emit(&mut transition, EventKind::Error, "Error: select a tool first!");
            return transition;
        };
        let order = &catalog.orders[self.level];

        let verdict = engine::run(tool, &self.bindings, &catalog, &order.expected_result);
        info!(index = self.level, tool = %tool.name, ?verdict, "Run evaluated");

        match &verdict {
            Verdict::IncompleteArguments => {
                self.emit(
                    &mut transition,
                    EventKind::Error,
                    "Error: not all arguments are filled!",
                );
            }
            Verdict::Success { result } => {
                self.emit_execution(&mut transition, tool, result);
                self.score += ORDER_AWARD;
                self.progress = Progress::LevelComplete;
                self.emit(
                    &mut transition,
                    EventKind::Success,
                    format!("SUCCESS! Order complete. Result: {result}"),
                );
                transition.deferrals.push(Deferral {
                    level: self.level,
                    delay: self.pacing.advance_delay(),
                    action: DeferredAction::AdvanceLevel,
                });
            }
            Verdict::Mismatch { result, expected } => {
                self.emit_execution(&mut transition, tool, result);
                self.emit(
                    &mut transition,
                    EventKind::Error,
                    format!("Wrong result. Expected: {expected}, got: {result}"),
                );
                self.record_failure(&mut transition);
            }
            Verdict::ExecutionError { message } => {
                self.emit(
                    &mut transition,
                    EventKind::Error,
                    format!("Execution error: {message}"),
                );
                self.record_failure(&mut transition);
            }
        }

        transition.verdict = Some(verdict);
        transition
    }

    /// Starts a hint request.
    ///
    /// Returns `None` if a request is already in flight or the game is over.
    /// The returned context carries the level the request was made on.
    pub fn begin_hint(&mut self) -> Option<(HintContext, Transition)> {
        if self.hint_busy || self.is_finished() {
            return None;
        }
        self.hint_busy = true;

        let context = HintContext {
            level: self.level,
            order: self.current_order().clone(),
            tool_name: self.selected_tool().map(|t| t.name.clone()),
            slots: self.slot_views(),
            last_error: self.log.last_error().map(|e| e.message.clone()),
            failures: self.failures,
        };

        let mut transition = Transition::default();
        self.emit(&mut transition, EventKind::Advisory, "Asking the chef...");
        Some((context, transition))
    }

    /// Completes a hint request.
    ///
    /// Always clears the busy flag. The text is discarded when the player
    /// has moved past the level the request was made on.
    pub fn finish_hint(&mut self, context: &HintContext, text: &str) -> Transition {
        self.hint_busy = false;
        let mut transition = Transition::default();
        if context.level != self.level || self.is_finished() {
            debug!(
                requested = context.level,
                current = self.level,
                "Discarding stale hint"
            );
            return transition;
        }
        self.emit(&mut transition, EventKind::Advisory, format!("Chef: {text}"));
        transition
    }

    /// Executes a deferral once its delay has elapsed.
    ///
    /// Deferrals scheduled for a level that is no longer current are ignored.
    pub fn fire(&mut self, deferral: Deferral) -> Transition {
        let mut transition = Transition::default();
        if deferral.level != self.level || self.is_finished() {
            debug!(
                scheduled = deferral.level,
                current = self.level,
                action = ?deferral.action,
                "Ignoring stale deferral"
            );
            return transition;
        }

        match deferral.action {
            DeferredAction::AdvanceLevel if self.progress == Progress::LevelComplete => {
                self.advance(&mut transition);
            }
            DeferredAction::HintNudge if self.progress == Progress::Playing => {
                self.emit(&mut transition, EventKind::Advisory, NUDGE_MESSAGE);
            }
            action => {
                debug!(?action, "Deferral no longer applies");
            }
        }
        transition
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn advance(&mut self, transition: &mut Transition) {
        if self.level + 1 < self.catalog.orders.len() {
            self.level += 1;
            self.failures = 0;
            self.selected_tool = None;
            self.pending_ingredient = None;
            self.bindings = SlotBindings::default();
            self.progress = Progress::Playing;
            self.log.clear();
            info!(index = self.level, order = %self.current_order().id, "Advanced to next order");
            self.emit(transition, EventKind::Info, "New order received!");
        } else {
            self.progress = Progress::Finished;
            info!(score = self.score, "All orders complete");
            self.emit(
                transition,
                EventKind::Success,
                "ALL ORDERS COMPLETE! You are a true Python chef!",
            );
        }
    }

    fn record_failure(&mut self, transition: &mut Transition) {
        self.failures += 1;
        if self.failures == NUDGE_THRESHOLD {
            transition.deferrals.push(Deferral {
                level: self.level,
                delay: self.pacing.nudge_delay(),
                action: DeferredAction::HintNudge,
            });
        }
    }

    fn emit_execution(&mut self, transition: &mut Transition, tool: &Tool, result: &Value) {
        let args: Vec<String> = self
            .bindings
            .iter()
            .flatten()
            .map(|idx| self.catalog.ingredients[idx].value.to_string())
            .collect();
        let message = format!("Execution: {}({}) returned {result}", tool.name, args.join(", "));
        self.emit(transition, EventKind::Info, message);
    }

    fn emit(&mut self, transition: &mut Transition, kind: EventKind, message: impl Into<String>) {
        transition.events.push(self.log.append(kind, message));
    }

    fn slot_views(&self) -> Vec<Option<SlotView>> {
        self.bindings
            .iter()
            .map(|slot| {
                slot.map(|idx| {
                    let ingredient = &self.catalog.ingredients[idx];
                    SlotView {
                        name: ingredient.name.clone(),
                        value: ingredient.value.clone(),
                        value_type: ingredient.value_type,
                    }
                })
            })
            .collect()
    }
}
