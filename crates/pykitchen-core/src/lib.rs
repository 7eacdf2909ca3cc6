//! PyKitchen
//!
//! Game core for a kitchen-themed puzzle that teaches Python built-in
//! functions: typed slot binding, execution and verification, the level
//! progression state machine, the hint advisor, and the HTTP/WebSocket
//! surface a front end drives it through.

pub mod api;
pub mod binder;
pub mod builtins;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod hint;
pub mod runtime;
pub mod session;
pub mod value;
pub mod websocket;

pub use api::{create_router, AppState, CommandResponse, ErrorResponse, HintResponse, SelectRequest};
pub use binder::{bind, BindRejection, SlotBindings, TypeMismatch};
pub use builtins::{Builtin, ToolError};
pub use catalog::{Catalog, Difficulty, Ingredient, Order, Tool, ToolArgument};
pub use config::{Config, HintConfig, HintProvider, PacingConfig, CONFIG_FILE_NAME};
pub use engine::Verdict;
pub use error::{KitchenError, Result};
pub use event_log::{EventKind, EventLog, LogEntry};
pub use hint::{
    build_prompt, AdvisorError, GeminiCollaborator, HintAdvisor, HintCollaborator, HintContext,
    HintStrategy, SlotView, GENERIC_FALLBACK_HINT,
};
pub use runtime::{HintDispatch, KitchenRuntime};
pub use session::{
    Deferral, DeferredAction, Phase, Session, SessionSnapshot, Transition, NUDGE_THRESHOLD,
    ORDER_AWARD,
};
pub use value::{Value, ValueType};
pub use websocket::{EventBroadcaster, KitchenEvent};
