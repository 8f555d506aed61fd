//! Observers for non-atomic asynchronous emissions.
//!
//! [`EventFlux::emit_async`](crate::EventFlux::emit_async) returns before any
//! handler has run, so callers attach callbacks to the returned
//! [`EmitListeners`] afterwards. Signals raised before the matching callback
//! is attached are buffered and replayed when it is.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::registration::HandlerId;

type InvokeCallback = Arc<dyn Fn(HandlerId) + Send + Sync>;
type IndexedCallback = Arc<dyn Fn(HandlerId, usize) + Send + Sync>;

/// A lifecycle signal of one handler during one emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// The handler is about to be invoked.
    Invoke(HandlerId),
    /// A middleware halted; carries how many middlewares passed before it.
    Halt(HandlerId, usize),
    /// The emission was queued at the given zero-based position.
    Queued(HandlerId, usize),
}

#[derive(Default)]
struct Slots {
    on_invoke: Option<InvokeCallback>,
    on_halt: Option<IndexedCallback>,
    on_queued: Option<IndexedCallback>,
    backlog: Vec<Signal>,
}

impl Slots {
    fn accepts(&self, signal: &Signal) -> bool {
        match signal {
            Signal::Invoke(_) => self.on_invoke.is_some(),
            Signal::Halt(..) => self.on_halt.is_some(),
            Signal::Queued(..) => self.on_queued.is_some(),
        }
    }

    fn take_backlog(&mut self) -> Vec<Signal> {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.backlog)
            .into_iter()
            .partition(|signal| self.accepts(signal));
        self.backlog = waiting;
        ready
    }
}

/// Shared sink the dispatcher raises signals into.
#[derive(Clone, Default)]
pub(crate) struct ListenerHub {
    slots: Arc<Mutex<Slots>>,
}

impl ListenerHub {
    pub fn signal(&self, signal: Signal) {
        let mut slots = self.slots.lock();
        if !slots.accepts(&signal) {
            slots.backlog.push(signal);
            return;
        }
        let snapshot = Callbacks::from(&*slots);
        drop(slots);
        snapshot.deliver(signal);
    }

    fn attach(&self, install: impl FnOnce(&mut Slots)) {
        let (snapshot, replay) = {
            let mut slots = self.slots.lock();
            install(&mut slots);
            let replay = slots.take_backlog();
            (Callbacks::from(&*slots), replay)
        };
        for signal in replay {
            snapshot.deliver(signal);
        }
    }
}

// Callbacks are cloned out of the lock before running user code.
struct Callbacks {
    on_invoke: Option<InvokeCallback>,
    on_halt: Option<IndexedCallback>,
    on_queued: Option<IndexedCallback>,
}

impl From<&Slots> for Callbacks {
    fn from(slots: &Slots) -> Self {
        Self {
            on_invoke: slots.on_invoke.clone(),
            on_halt: slots.on_halt.clone(),
            on_queued: slots.on_queued.clone(),
        }
    }
}

impl Callbacks {
    fn deliver(&self, signal: Signal) {
        match signal {
            Signal::Invoke(id) => {
                if let Some(cb) = &self.on_invoke {
                    cb(id);
                }
            }
            Signal::Halt(id, passed) => {
                if let Some(cb) = &self.on_halt {
                    cb(id, passed);
                }
            }
            Signal::Queued(id, position) => {
                if let Some(cb) = &self.on_queued {
                    cb(id, position);
                }
            }
        }
    }
}

/// Callback registrar returned by a non-atomic `emit_async`.
///
/// Each setter replaces the previous callback of the same kind.
#[derive(Clone)]
pub struct EmitListeners {
    hub: ListenerHub,
}

impl EmitListeners {
    pub(crate) fn new(hub: ListenerHub) -> Self {
        Self { hub }
    }

    /// Called with the handler id right before each handler is invoked.
    pub fn on_invoke<F>(&self, cb: F) -> &Self
    where
        F: Fn(HandlerId) + Send + Sync + 'static,
    {
        self.hub.attach(|slots| slots.on_invoke = Some(Arc::new(cb)));
        self
    }

    /// Called when a middleware stops a handler, with the number of
    /// middlewares that passed before the halting one.
    pub fn on_middleware_halt<F>(&self, cb: F) -> &Self
    where
        F: Fn(HandlerId, usize) + Send + Sync + 'static,
    {
        self.hub.attach(|slots| slots.on_halt = Some(Arc::new(cb)));
        self
    }

    /// Called when the emission lands in a handler queue, with its zero-based
    /// position.
    pub fn on_queued<F>(&self, cb: F) -> &Self
    where
        F: Fn(HandlerId, usize) + Send + Sync + 'static,
    {
        self.hub.attach(|slots| slots.on_queued = Some(Arc::new(cb)));
        self
    }
}

impl fmt::Debug for EmitListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitListeners").finish_non_exhaustive()
    }
}
