//! The confirmation priority queue (spec §4.3): a min-heap keyed by
//! `trigger_height`, draining whenever the chain advances far enough.

use std::{cmp::Ordering, collections::BinaryHeap};

use crate::{registry::ConfSubscription, types::TxConfirmation};

/// A pending multi-confirmation notification, parked until the chain
/// advances to `trigger_height`.
///
/// Invariant: `trigger_height == first_seen_height + num_confirmations - 1`,
/// set either by [`crate::dispatcher`]'s confirmation trigger or by
/// historical dispatch.
pub(crate) struct ConfHeapEntry {
    pub(crate) sub: ConfSubscription,
    pub(crate) details: TxConfirmation,
    pub(crate) trigger_height: u32,
}

impl PartialEq for ConfHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.trigger_height == other.trigger_height
    }
}

impl Eq for ConfHeapEntry {}

impl PartialOrd for ConfHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfHeapEntry {
    // `BinaryHeap` is a max-heap; reverse the comparison so the entry with
    // the lowest `trigger_height` is always the one `peek`/`pop` return.
    fn cmp(&self, other: &Self) -> Ordering {
        other.trigger_height.cmp(&self.trigger_height)
    }
}

/// The confirmation heap. A thin wrapper over `BinaryHeap` providing the two
/// operations the dispatcher needs: push a pending entry, and drain every
/// entry whose trigger height has been reached.
#[derive(Default)]
pub(crate) struct ConfHeap {
    heap: BinaryHeap<ConfHeapEntry>,
}

impl ConfHeap {
    pub(crate) fn push(&mut self, entry: ConfHeapEntry) {
        self.heap.push(entry);
    }

    /// Fire every entry whose `trigger_height <= new_height`, in ascending
    /// trigger-height order.
    pub(crate) fn notify(&mut self, new_height: u32) {
        while let Some(entry) = self.heap.peek() {
            if entry.trigger_height > new_height {
                break;
            }
            let entry = self.heap.pop().expect("peek just returned Some");
            let _ = entry.sub.final_conf.send(entry.details);
        }
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = ConfHeapEntry> + '_ {
        self.heap.drain()
    }
}
