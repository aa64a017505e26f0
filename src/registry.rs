//! The two one-shot subscription registries (spec §3): outpoint spends and
//! transaction confirmations. Both are confined to the dispatcher; nothing
//! else ever reads or writes them (spec §5).

use std::collections::HashMap;

use bitcoin::{OutPoint, Txid};
use tokio::sync::oneshot;

use crate::types::{SpendDetail, TxConfirmation};

/// A pending request for notification when `target` is spent.
pub(crate) struct SpendSubscription {
    pub(crate) target: OutPoint,
    pub(crate) out: oneshot::Sender<SpendDetail>,
}

/// A pending request for notification when `txid` reaches `num_confirmations`.
pub(crate) struct ConfSubscription {
    pub(crate) txid: Txid,
    pub(crate) num_confirmations: u32,
    /// Height at which this txid was first observed on the best chain.
    /// Unset (`0`) until the first connecting block is processed, then never
    /// reassigned (spec §5 ordering guarantee).
    pub(crate) initial_confirm_height: u32,
    pub(crate) final_conf: oneshot::Sender<TxConfirmation>,
    /// Reserved for reorg signaling (spec §9, open question); never sent in
    /// this version. Dropped -- and therefore observed as closed by the
    /// client -- on dispatch or teardown, same as `final_conf`.
    #[allow(dead_code)]
    pub(crate) negative_conf: oneshot::Sender<i32>,
}

/// `Outpoint -> Vec<SpendSubscription>`, one-shot per outpoint.
#[derive(Default)]
pub(crate) struct SpendRegistry {
    subs: HashMap<OutPoint, Vec<SpendSubscription>>,
}

impl SpendRegistry {
    pub(crate) fn register(&mut self, sub: SpendSubscription) {
        self.subs.entry(sub.target).or_default().push(sub);
    }

    /// Remove and return every subscription for `outpoint`, if any. Dispatch
    /// is one-shot per outpoint: once taken, the entry is gone.
    pub(crate) fn take(&mut self, outpoint: &OutPoint) -> Option<Vec<SpendSubscription>> {
        self.subs.remove(outpoint)
    }

    /// Drain all remaining subscriptions, dropping (and thereby closing)
    /// every outstanding channel. Used during teardown.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = SpendSubscription> + '_ {
        self.subs.drain().flat_map(|(_, subs)| subs)
    }
}

/// `Txid -> Vec<ConfSubscription>`, removed atomically on first confirmation.
#[derive(Default)]
pub(crate) struct ConfRegistry {
    subs: HashMap<Txid, Vec<ConfSubscription>>,
}

impl ConfRegistry {
    pub(crate) fn register(&mut self, sub: ConfSubscription) {
        self.subs.entry(sub.txid).or_default().push(sub);
    }

    /// Remove and return every subscription for `txid`, if any.
    pub(crate) fn take(&mut self, txid: &Txid) -> Option<Vec<ConfSubscription>> {
        self.subs.remove(txid)
    }

    /// Drain all remaining subscriptions. Used during teardown.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = ConfSubscription> + '_ {
        self.subs.drain().flat_map(|(_, subs)| subs)
    }
}
