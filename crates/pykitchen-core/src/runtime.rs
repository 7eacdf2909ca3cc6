//! Async driver around a [`Session`].
//!
//! The runtime serializes commands through a single lock, publishes every
//! resulting log entry on the [`EventBroadcaster`], and turns [`Deferral`]s
//! into tokio timers. Timers are tracked per level; whenever the level moves
//! on, timers scheduled for earlier levels are aborted. Hint requests run on
//! their own task so other commands proceed while the advisor is busy.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::Result;
use crate::hint::{HintAdvisor, HintContext};
use crate::session::{Deferral, Session, SessionSnapshot, Transition};
use crate::websocket::{EventBroadcaster, KitchenEvent};

/// Outcome of a hint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintDispatch {
    /// The request was accepted; the hint arrives as a log event.
    Started,
    /// Another request is still in flight.
    Busy,
    /// The game is over.
    Finished,
}

#[derive(Debug)]
struct Timer {
    level: usize,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct Kitchen {
    session: Session,
    timers: Vec<Timer>,
}

/// Shared handle to a running session.
#[derive(Debug, Clone)]
pub struct KitchenRuntime {
    kitchen: Arc<Mutex<Kitchen>>,
    advisor: Arc<HintAdvisor>,
    broadcaster: EventBroadcaster,
}

impl KitchenRuntime {
    /// Wraps a session.
    #[must_use]
    pub fn new(session: Session, advisor: HintAdvisor, broadcaster: EventBroadcaster) -> Self {
        Self {
            kitchen: Arc::new(Mutex::new(Kitchen {
                session,
                timers: Vec::new(),
            })),
            advisor: Arc::new(advisor),
            broadcaster,
        }
    }

    /// Builds a runtime for `catalog` from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no orders.
    pub fn from_config(config: &Config, catalog: Catalog) -> Result<Self> {
        let session = Session::new(Arc::new(catalog), config.pacing)?;
        let advisor = HintAdvisor::from_config(&config.hint);
        info!(online_hints = advisor.is_online(), "Kitchen ready");
        Ok(Self::new(session, advisor, EventBroadcaster::default()))
    }

    /// Subscribes to console events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<KitchenEvent> {
        self.broadcaster.subscribe()
    }

    /// The event broadcaster.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// The catalog being played.
    pub async fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(self.kitchen.lock().await.session.catalog())
    }

    /// Serializable view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.kitchen.lock().await.session.snapshot()
    }

    /// Number of timers that have not fired yet.
    pub async fn pending_timers(&self) -> usize {
        let kitchen = self.kitchen.lock().await;
        kitchen.timers.iter().filter(|t| !t.handle.is_finished()).count()
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// See [`Session::select_ingredient`].
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::UnknownIngredient` for an unknown id.
    pub async fn select_ingredient(&self, id: &str) -> Result<Transition> {
        self.dispatch(|session| session.select_ingredient(id)).await
    }

    /// See [`Session::select_tool`].
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::UnknownTool` for an unknown id.
    pub async fn select_tool(&self, id: &str) -> Result<Transition> {
        self.dispatch(|session| session.select_tool(id)).await
    }

    /// See [`Session::place`].
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::SlotOutOfRange` for a slot beyond the tool's arity.
    pub async fn place(&self, slot: usize) -> Result<Transition> {
        self.dispatch(|session| session.place(slot)).await
    }

    /// See [`Session::clear_slot`].
    ///
    /// # Errors
    ///
    /// Returns `KitchenError::NoToolSelected` or `KitchenError::SlotOutOfRange`.
    pub async fn clear_slot(&self, slot: usize) -> Result<Transition> {
        self.dispatch(|session| session.clear_slot(slot)).await
    }

    /// See [`Session::clear_all`].
    pub async fn clear_all(&self) -> Transition {
        let mut kitchen = self.kitchen.lock().await;
        let transition = kitchen.session.clear_all();
        self.apply(&mut kitchen, &transition);
        transition
    }

    /// See [`Session::run`].
    pub async fn run(&self) -> Transition {
        let mut kitchen = self.kitchen.lock().await;
        let transition = kitchen.session.run();
        self.apply(&mut kitchen, &transition);
        transition
    }

    /// Asks the advisor for a hint without waiting for it.
    pub async fn request_hint(&self) -> HintDispatch {
        let mut kitchen = self.kitchen.lock().await;
        let Some((context, transition)) = kitchen.session.begin_hint() else {
            return if kitchen.session.is_finished() {
                HintDispatch::Finished
            } else {
                HintDispatch::Busy
            };
        };
        self.apply(&mut kitchen, &transition);
        drop(kitchen);

        info!(index = context.level, failures = context.failures, "Hint requested");
        tokio::spawn(self.clone().resolve_hint(context));
        HintDispatch::Started
    }

    /// Runs `command` against the session and returns its transition along
    /// with the snapshot it left behind, both taken under one lock.
    ///
    /// # Errors
    ///
    /// Returns whatever error `command` reports; the session is left as is.
    pub async fn execute<F>(&self, command: F) -> Result<(Transition, SessionSnapshot)>
    where
        F: FnOnce(&mut Session) -> Result<Transition> + Send,
    {
        let mut kitchen = self.kitchen.lock().await;
        let transition = command(&mut kitchen.session)?;
        self.apply(&mut kitchen, &transition);
        Ok((transition, kitchen.session.snapshot()))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn dispatch<F>(&self, command: F) -> Result<Transition>
    where
        F: FnOnce(&mut Session) -> Result<Transition> + Send,
    {
        let mut kitchen = self.kitchen.lock().await;
        let transition = command(&mut kitchen.session)?;
        self.apply(&mut kitchen, &transition);
        Ok(transition)
    }

    fn resolve_hint(self, context: HintContext) -> BoxFuture<'static, ()> {
        async move {
            let text = self.advisor.get_hint(&context).await;
            let mut kitchen = self.kitchen.lock().await;
            let transition = kitchen.session.finish_hint(&context, &text);
            self.apply(&mut kitchen, &transition);
        }
        .boxed()
    }

    fn fire(self, deferral: Deferral) -> BoxFuture<'static, ()> {
        async move {
            tokio::time::sleep(deferral.delay).await;
            let mut kitchen = self.kitchen.lock().await;
            let transition = kitchen.session.fire(deferral);
            self.apply(&mut kitchen, &transition);
        }
        .boxed()
    }

    /// Publishes a transition and schedules its deferrals.
    fn apply(&self, kitchen: &mut Kitchen, transition: &Transition) {
        if transition.is_empty() {
            return;
        }

        for entry in &transition.events {
            self.broadcaster.send(KitchenEvent::log(entry.clone()));
        }
        let session = &kitchen.session;
        self.broadcaster.send(KitchenEvent::state(
            session.level(),
            session.score(),
            session.failures(),
            session.phase(),
        ));

        let level = session.level();
        let finished = session.is_finished();
        kitchen.timers.retain(|timer| {
            if timer.level != level || finished {
                if !timer.handle.is_finished() {
                    debug!(scheduled = timer.level, current = level, "Cancelling timer");
                    timer.handle.abort();
                }
                false
            } else {
                !timer.handle.is_finished()
            }
        });

        for deferral in &transition.deferrals {
            debug!(action = ?deferral.action, delay = ?deferral.delay, "Scheduling deferral");
            let handle = tokio::spawn(self.clone().fire(*deferral));
            kitchen.timers.push(Timer {
                level: deferral.level,
                handle,
            });
        }
    }
}
