//! The dispatcher (spec §4.1): a single-consumer event loop and the only
//! mutator of every registry, the confirmation heap, and `current_height`.

use std::sync::Arc;

use bitcoin::{BlockHash, OutPoint, Transaction};
use tokio::sync::{mpsc, watch};

use crate::{
    client::ChainClient,
    heap::ConfHeap,
    historical::{try_historical_dispatch, HistoricalOutcome},
    ingress::Ingress,
    registry::{ConfRegistry, ConfSubscription, SpendRegistry, SpendSubscription},
    types::{BlockEpoch, SpendDetail, TxConfirmation},
};

/// A block connected to (or disconnected from) the best chain, as queued by
/// the upstream push callback.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChainUpdate {
    pub(crate) hash: BlockHash,
    pub(crate) height: i32,
}

/// A tagged registration submitted by a client-facing API call.
pub(crate) enum RegistrationRequest {
    Spend(SpendSubscription),
    Confirmation(ConfSubscription),
    Epoch(mpsc::Sender<BlockEpoch>),
}

/// Everything the dispatcher needs to run: the chain client handle, its
/// ingress queues, and the registries it exclusively owns.
pub(crate) struct Dispatcher {
    client: Arc<dyn ChainClient>,

    reg_rx: mpsc::Receiver<RegistrationRequest>,

    chain_updates: Arc<Ingress<ChainUpdate>>,
    chain_update_wake: mpsc::UnboundedReceiver<()>,

    disconnected: Arc<Ingress<ChainUpdate>>,
    disconnected_wake: mpsc::UnboundedReceiver<()>,

    tx_updates: Arc<Ingress<Transaction>>,
    tx_update_wake: mpsc::UnboundedReceiver<()>,

    quit: watch::Receiver<bool>,

    current_height: i32,
    spend_registry: SpendRegistry,
    conf_registry: ConfRegistry,
    conf_heap: ConfHeap,
    epoch_subscribers: Vec<mpsc::Sender<BlockEpoch>>,
}

/// Handle bundle returned to [`crate::ChainNotifier`] for feeding
/// upstream push events into a freshly constructed dispatcher.
pub(crate) struct DispatcherIngress {
    pub(crate) chain_updates: Arc<Ingress<ChainUpdate>>,
    pub(crate) disconnected: Arc<Ingress<ChainUpdate>>,
    pub(crate) tx_updates: Arc<Ingress<Transaction>>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Arc<dyn ChainClient>,
        reg_rx: mpsc::Receiver<RegistrationRequest>,
        quit: watch::Receiver<bool>,
        current_height: i32,
    ) -> (Self, DispatcherIngress) {
        let (chain_updates, chain_update_wake) = Ingress::new();
        let (disconnected, disconnected_wake) = Ingress::new();
        let (tx_updates, tx_update_wake) = Ingress::new();

        let ingress = DispatcherIngress {
            chain_updates: chain_updates.clone(),
            disconnected: disconnected.clone(),
            tx_updates: tx_updates.clone(),
        };

        let this = Self {
            client,
            reg_rx,
            chain_updates,
            chain_update_wake,
            disconnected,
            disconnected_wake,
            tx_updates,
            tx_update_wake,
            quit,
            current_height,
            spend_registry: SpendRegistry::default(),
            conf_registry: ConfRegistry::default(),
            conf_heap: ConfHeap::default(),
            epoch_subscribers: Vec::new(),
        };
        (this, ingress)
    }

    /// Run the dispatcher loop until `quit` fires, then close every
    /// outstanding subscriber channel via [`Self::close_all`] before
    /// returning.
    pub(crate) async fn run(mut self) {
        loop {
            // Biased so that: registrations are serviced before new chain
            // state lands (a registration racing a connecting block should
            // never silently lose to it), disconnected-block bookkeeping
            // runs before connected-block processing, and both run before
            // we'd otherwise idle on the quit signal.
            tokio::select! {
                biased;

                req = self.reg_rx.recv() => {
                    match req {
                        Some(req) => self.handle_registration(req).await,
                        None => tracing::trace!("registration channel closed (all API handles dropped)"),
                    }
                }

                woken = self.disconnected_wake.recv() => {
                    if woken.is_some() {
                        if let Some(update) = self.disconnected.pop() {
                            tracing::warn!(
                                height = update.height,
                                hash = %update.hash,
                                "block disconnected; reorg handling is not implemented in this version"
                            );
                        }
                    }
                }

                woken = self.chain_update_wake.recv() => {
                    if woken.is_some() {
                        if let Some(update) = self.chain_updates.pop() {
                            self.handle_chain_update(update).await;
                        }
                    }
                }

                woken = self.tx_update_wake.recv() => {
                    if woken.is_some() {
                        if let Some(tx) = self.tx_updates.pop() {
                            self.handle_tx_update(tx);
                        }
                    }
                }

                changed = self.quit.changed() => {
                    if changed.is_err() || *self.quit.borrow() {
                        tracing::info!("dispatcher received quit signal, exiting");
                        break;
                    }
                }
            }
        }

        self.close_all();
    }

    /// Explicitly close every outstanding subscriber channel (spec §4.6).
    /// Draining (rather than relying on `self`'s implicit drop) makes the
    /// teardown step a documented, observable part of the loop instead of an
    /// incidental side effect of the function returning.
    fn close_all(&mut self) {
        let spend = self.spend_registry.drain().count();
        let conf = self.conf_registry.drain().count();
        let heap = self.conf_heap.drain().count();
        self.epoch_subscribers.clear();
        tracing::info!(spend, conf, heap, "dispatcher closed all outstanding subscriber channels");
    }

    async fn handle_registration(&mut self, req: RegistrationRequest) {
        match req {
            RegistrationRequest::Spend(sub) => {
                tracing::debug!(outpoint = %sub.target, "registering spend subscription");
                self.spend_registry.register(sub);
            }
            RegistrationRequest::Confirmation(sub) => {
                let txid = sub.txid;
                match try_historical_dispatch(&*self.client, self.current_height, sub).await {
                    HistoricalOutcome::FullyDispatched => {}
                    HistoricalOutcome::Pending(entry) => self.conf_heap.push(entry),
                    HistoricalOutcome::NotDispatched(sub) => {
                        tracing::debug!(%txid, "registering confirmation subscription");
                        self.conf_registry.register(sub);
                    }
                }
            }
            RegistrationRequest::Epoch(tx) => {
                tracing::debug!("registering block epoch subscription");
                self.epoch_subscribers.push(tx);
            }
        }
    }

    async fn handle_chain_update(&mut self, update: ChainUpdate) {
        self.current_height = update.height;

        let block = match self.client.get_block(&update.hash).await {
            Ok(block) => block,
            Err(error) => {
                tracing::error!(%error, hash = %update.hash, "failed to fetch connected block; skipping");
                return;
            }
        };

        self.fanout_epoch(BlockEpoch { height: update.height, hash: update.hash });

        for (index, tx) in block.transactions.iter().enumerate() {
            let txid = tx.compute_txid();
            self.check_confirmation_trigger(txid, update.hash, update.height as u32, index as u32);
        }

        self.conf_heap.notify(update.height as u32);
    }

    fn check_confirmation_trigger(
        &mut self,
        txid: bitcoin::Txid,
        block_hash: BlockHash,
        block_height: u32,
        tx_index: u32,
    ) {
        let Some(subs) = self.conf_registry.take(&txid) else { return };

        for mut sub in subs {
            let details = TxConfirmation { block_hash, block_height, tx_index };
            if sub.num_confirmations == 1 {
                let _ = sub.final_conf.send(details);
            } else {
                sub.initial_confirm_height = block_height;
                let trigger_height = block_height + sub.num_confirmations - 1;
                self.conf_heap.push(crate::heap::ConfHeapEntry { sub, details, trigger_height });
            }
        }
    }

    fn handle_tx_update(&mut self, tx: Transaction) {
        let spender_tx_hash = tx.compute_txid();
        for (index, input) in tx.input.iter().enumerate() {
            let outpoint: OutPoint = input.previous_output;
            let Some(subs) = self.spend_registry.take(&outpoint) else { continue };

            let detail = SpendDetail {
                spent_outpoint: outpoint,
                spender_tx_hash,
                spending_tx: tx.clone(),
                spender_input_index: index as u32,
            };
            for sub in subs {
                let _ = sub.out.send(detail.clone());
            }
        }
    }

    /// Best-effort-deliver an epoch to every subscriber, dropping on full
    /// channels rather than applying back-pressure (spec §4.5). Run inline
    /// on the dispatcher rather than as a spawned task: `try_send` never
    /// awaits, so this can't block the loop, and running it here is what
    /// keeps epoch delivery for a single subscriber in strictly increasing
    /// height order (spec §5) -- a detached task per block would let two
    /// blocks' fan-outs race each other under a multi-thread runtime.
    fn fanout_epoch(&mut self, epoch: BlockEpoch) {
        self.epoch_subscribers.retain(|tx| match tx.try_send(epoch) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(height = epoch.height, "epoch subscriber buffer full, dropping notification");
                true
            }
        });
    }
}
