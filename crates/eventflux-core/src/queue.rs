//! Per-handler FIFO delivery.
//!
//! A queued handler never runs two emissions at once. Emissions are appended
//! in the order they were made and a single drain task works through them:
//! middleware chain, interceptors, then the handler, one entry at a time.
//! Entries carrying an atomic responder are invoked on their own task so the
//! drain can move on without waiting for the result.

use std::collections::VecDeque;
use std::iter;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{FluxError, FluxResult};
use crate::flux::Inner;
use crate::listeners::{ListenerHub, Signal};
use crate::pipeline::Outcome;
use crate::registration::Registration;

/// Channel half that completes an atomic emission.
pub(crate) type Responder<R> = oneshot::Sender<FluxResult<R>>;

/// Completes an atomic emission, if this delivery belongs to one.
pub(crate) fn settle<R>(responder: Option<Responder<R>>, outcome: FluxResult<R>) {
    if let Some(tx) = responder {
        // The caller may have dropped the response future.
        let _ = tx.send(outcome);
    }
}

/// One emission on its way to one handler.
pub(crate) struct Delivery<P, R> {
    pub event: Arc<str>,
    pub payload: P,
    pub responder: Option<Responder<R>>,
    pub listeners: Option<ListenerHub>,
}

pub(crate) struct HandlerQueue<P, R> {
    epoch: u64,
    in_progress: bool,
    pending: VecDeque<Delivery<P, R>>,
}

impl<P, R> HandlerQueue<P, R> {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            in_progress: false,
            pending: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// What happened to a delivery at the door of its handler.
pub(crate) enum Admission<P, R> {
    /// The invocation limit refused it.
    Refused(Option<Responder<R>>),
    /// It was appended to the handler queue.
    Queued {
        position: usize,
        listeners: Option<ListenerHub>,
        /// Set when no drain was running, with the epoch the new drain serves.
        start_drain: Option<u64>,
    },
    /// The handler is not queued; the caller dispatches it directly.
    Direct(Delivery<P, R>),
}

/// Consumes one invocation attempt and, for queued handlers, appends the
/// delivery.
pub(crate) fn admit<P, R>(registration: &Registration<P, R>, delivery: Delivery<P, R>) -> Admission<P, R> {
    let mut state = registration.state.lock();
    if !state.limit.permit() {
        return Admission::Refused(delivery.responder);
    }
    let Some(queue) = state.queue.as_mut() else {
        return Admission::Direct(delivery);
    };

    let position = queue.pending.len();
    let listeners = delivery.listeners.clone();
    queue.pending.push_back(delivery);
    let start_drain = (!queue.in_progress).then(|| {
        queue.in_progress = true;
        queue.epoch
    });

    Admission::Queued {
        position,
        listeners,
        start_drain,
    }
}

/// Spawns the drain task for an admitted delivery and reports its position.
pub(crate) fn on_queued<P, R>(
    inner: &Arc<Inner<P, R>>,
    registration: &Arc<Registration<P, R>>,
    position: usize,
    listeners: Option<ListenerHub>,
    start_drain: Option<u64>,
) where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    let id = registration.id();
    trace!(handler = %id, position, "emission queued");
    if let Some(hub) = listeners {
        hub.signal(Signal::Queued(id, position));
    }
    if let Some(epoch) = start_drain {
        tokio::spawn(drain(Arc::clone(inner), Arc::clone(registration), epoch));
    }
}

fn next_entry<P, R>(registration: &Registration<P, R>, epoch: u64) -> Option<Delivery<P, R>> {
    let mut state = registration.state.lock();
    let queue = state.queue.as_mut().filter(|q| q.epoch == epoch)?;
    let entry = queue.pending.pop_front();
    if entry.is_none() {
        queue.in_progress = false;
    }
    entry
}

/// Clears the queue after a freeze and rejects every waiting responder.
fn abandon<P, R>(registration: &Registration<P, R>, epoch: u64, head: Option<Responder<R>>) {
    let rest: Vec<_> = {
        let mut state = registration.state.lock();
        match state.queue.as_mut().filter(|q| q.epoch == epoch) {
            Some(queue) => {
                queue.in_progress = false;
                queue.pending.drain(..).collect()
            }
            None => Vec::new(),
        }
    };

    let id = registration.id();
    debug!(handler = %id, abandoned = rest.len() + 1, "queue drain stopped, handler frozen");
    for responder in iter::once(head).chain(rest.into_iter().map(|d| d.responder)) {
        settle(responder, Err(FluxError::Frozen { id }));
    }
}

async fn drain<P, R>(inner: Arc<Inner<P, R>>, registration: Arc<Registration<P, R>>, epoch: u64)
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    let id = registration.id();
    trace!(handler = %id, "queue drain started");

    while let Some(entry) = next_entry(&registration, epoch) {
        let Delivery {
            event,
            mut payload,
            responder,
            listeners,
        } = entry;

        if registration.is_frozen() {
            abandon(&registration, epoch, responder);
            return;
        }

        let outcome = inner
            .pipeline(&registration, listeners.as_ref())
            .run(&event, &mut payload)
            .await;
        match outcome {
            Outcome::Proceed => {}
            Outcome::Halted => {
                settle(responder, Err(FluxError::MiddlewareRejected { id }));
                continue;
            }
            Outcome::Frozen => {
                abandon(&registration, epoch, responder);
                return;
            }
        }

        if let Some(hub) = &listeners {
            hub.signal(Signal::Invoke(id));
        }
        let call = registration.handler.call(payload);
        match responder {
            Some(tx) => {
                tokio::spawn(async move {
                    let _ = tx.send(call.await.map_err(FluxError::Handler));
                });
            }
            None => {
                if let Err(err) = call.await {
                    debug!(handler = %id, error = %err, "queued handler failed");
                }
            }
        }
    }

    trace!(handler = %id, "queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::registration::{HandlerId, HandlerOptions};

    fn delivery(payload: u32) -> Delivery<u32, u32> {
        Delivery {
            event: Arc::from("A"),
            payload,
            responder: None,
            listeners: None,
        }
    }

    fn registration(options: HandlerOptions<u32>) -> Registration<u32, u32> {
        Registration::new(HandlerId(1), "A".into(), Handler::sync(|n: u32| n), options)
    }

    #[test]
    fn test_admit_reports_positions_and_single_drain() {
        let reg = registration(HandlerOptions::new().with_queue());

        let Admission::Queued { position, start_drain, .. } = admit(&reg, delivery(1)) else {
            panic!("expected the delivery to be queued");
        };
        assert_eq!(position, 0);
        assert!(start_drain.is_some());

        let Admission::Queued { position, start_drain, .. } = admit(&reg, delivery(2)) else {
            panic!("expected the delivery to be queued");
        };
        assert_eq!(position, 1);
        assert!(start_drain.is_none());

        let state = reg.state.lock();
        assert_eq!(state.queue.as_ref().map(HandlerQueue::len), Some(2));
    }

    #[test]
    fn test_admit_without_queue_is_direct() {
        let reg = registration(HandlerOptions::new());
        assert!(matches!(admit(&reg, delivery(1)), Admission::Direct(_)));
    }

    #[tokio::test]
    async fn test_refused_responder_gets_nothing_queued() {
        let reg = registration(HandlerOptions::new().with_queue().invoke_limit(1));
        assert!(matches!(admit(&reg, delivery(1)), Admission::Queued { .. }));

        let (tx, rx) = oneshot::channel();
        let mut second = delivery(2);
        second.responder = Some(tx);
        match admit(&reg, second) {
            Admission::Refused(responder) => {
                settle(responder, Err(FluxError::LimitReached { id: reg.id() }))
            }
            _ => panic!("expected the limit to refuse the delivery"),
        }
        assert!(matches!(rx.await, Ok(Err(FluxError::LimitReached { .. }))));
        assert_eq!(reg.state.lock().queue.as_ref().map(HandlerQueue::len), Some(1));
    }

    #[tokio::test]
    async fn test_abandon_rejects_all_waiting_responders() {
        let reg = registration(HandlerOptions::new().with_queue());
        let mut receivers = Vec::new();
        for n in 0..3 {
            let (tx, rx) = oneshot::channel();
            let mut d = delivery(n);
            d.responder = Some(tx);
            admit(&reg, d);
            receivers.push(rx);
        }
        let epoch = reg.state.lock().queue_epoch;
        let head = next_entry(&reg, epoch).and_then(|d| d.responder);
        abandon(&reg, epoch, head);

        for rx in receivers {
            assert!(matches!(rx.await, Ok(Err(FluxError::Frozen { .. }))));
        }
        let state = reg.state.lock();
        assert_eq!(state.queue.as_ref().map(HandlerQueue::len), Some(0));
    }
}
