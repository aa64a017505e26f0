//! Ingress queues decouple upstream push callbacks from the dispatcher
//! (spec §4.2). Each queue is an unbounded, lock-guarded FIFO paired with a
//! single-slot wakeup channel; callbacks append and wake without ever
//! awaiting the dispatcher's poll rate.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// An unbounded FIFO queue with a detached wakeup side-channel.
///
/// Pushing never blocks the caller: the append is a plain mutex-guarded
/// `push_back`, and the wakeup send happens from a spawned task so that even
/// a momentary stall in delivering the wakeup can't delay the pusher's
/// return. Because the wakeup channel only ever carries unit values and the
/// dispatcher drains the queue to empty on every wakeup it receives, more
/// than one entry may be queued per wakeup -- the invariant is "at least one
/// wakeup per append", not "one wakeup per entry".
pub(crate) struct Ingress<T> {
    queue: Mutex<VecDeque<T>>,
    wake: mpsc::UnboundedSender<()>,
}

impl<T: Send + 'static> Ingress<T> {
    /// Create a new queue, returning it alongside the wakeup receiver the
    /// dispatcher selects on.
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (wake, wake_rx) = mpsc::unbounded_channel();
        (Arc::new(Self { queue: Mutex::new(VecDeque::new()), wake }), wake_rx)
    }

    /// Append an entry and wake the dispatcher.
    pub(crate) fn push(self: &Arc<Self>, item: T) {
        self.queue.lock().push_back(item);
        let wake = self.wake.clone();
        tokio::spawn(async move {
            let _ = wake.send(());
        });
    }

    /// Pop the head entry, if any.
    pub(crate) fn pop(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }
}
