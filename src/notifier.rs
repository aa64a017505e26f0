//! Lifecycle (spec §4.6) and client-facing registration API (spec §4.7).
//!
//! [`ChainNotifier`] is the only public surface of this crate: `start`,
//! `stop`, and the three `register_*_ntfn` calls. Everything else (the
//! dispatcher, the registries, the heap) is an implementation detail reached
//! only through the registration channel this type owns.

use std::sync::Arc;

use bitcoin::{OutPoint, Transaction, Txid};
use parking_lot::RwLock;
use tokio::{
    sync::{mpsc, oneshot, watch, Mutex as AsyncMutex},
    task::JoinHandle,
};

use crate::{
    client::{ChainCallbackSink, ChainClient},
    config::NotifierConfig,
    dispatcher::{ChainUpdate, Dispatcher, DispatcherIngress, RegistrationRequest},
    error::{NotifierError, Result},
    registry::{ConfSubscription, SpendSubscription},
    types::{BlockEpoch, SpendDetail, TxConfirmation},
};

/// Handed back by [`ChainNotifier::register_spend_ntfn`]. `spend` fires
/// exactly once, then closes.
#[derive(Debug)]
pub struct SpendEvent {
    /// Resolves with the spend detail the first (and only) time the watched
    /// outpoint is consumed on the best chain.
    pub spend: oneshot::Receiver<SpendDetail>,
}

/// Handed back by [`ChainNotifier::register_confirmations_ntfn`].
#[derive(Debug)]
pub struct ConfirmationEvent {
    /// Resolves exactly once, when the transaction reaches the requested
    /// confirmation depth.
    pub confirmed: oneshot::Receiver<TxConfirmation>,
    /// Reserved for reorg signaling (spec §9, open question); never resolves
    /// in this version, but is closed on dispatch or shutdown like
    /// `confirmed`.
    pub negative_conf: oneshot::Receiver<i32>,
}

/// Handed back by [`ChainNotifier::register_block_epoch_ntfn`]. Delivers one
/// [`BlockEpoch`] per connected block, best-effort (spec §4.5: full buffer
/// drops silently).
#[derive(Debug)]
pub struct BlockEpochEvent {
    /// Receives one entry per block connected to the best chain.
    pub epochs: mpsc::Receiver<BlockEpoch>,
}

impl BlockEpochEvent {
    /// Adapt the raw receiver into a [`futures::Stream`], for callers that
    /// want to `.next()`/combinator their way through epochs rather than
    /// drive `recv()` in a loop.
    pub fn into_stream(self) -> impl futures::Stream<Item = BlockEpoch> {
        futures::stream::unfold(self.epochs, |mut rx| async move {
            rx.recv().await.map(|epoch| (epoch, rx))
        })
    }
}

/// State shared between the registration API and the upstream callback sink
/// while the notifier is running. Replaced wholesale on every `start`/`stop`
/// so readers never observe a half-torn-down notifier.
struct RunningShared {
    reg_tx: mpsc::Sender<RegistrationRequest>,
    quit_rx: watch::Receiver<bool>,
    ingress: DispatcherIngress,
}

/// Bookkeeping for the idempotent `start`/`stop` pair. Guarded by an async
/// mutex because both operations await the chain client and the dispatcher
/// task join.
enum LifecycleState {
    Stopped,
    Running { quit_tx: watch::Sender<bool>, dispatcher: JoinHandle<()> },
}

/// The Chain Notifier core (spec §1–§2): fuses upstream push callbacks with
/// the registration API through a single dispatcher task.
///
/// Construct with a concrete [`ChainClient`] implementation, call
/// [`start`](Self::start), hand `Arc<ChainNotifier>` to whatever drives the
/// upstream feed as a [`ChainCallbackSink`], and use the `register_*_ntfn`
/// methods to subscribe. Call [`stop`](Self::stop) for orderly teardown.
pub struct ChainNotifier {
    client: Arc<dyn ChainClient>,
    config: NotifierConfig,
    lifecycle: AsyncMutex<LifecycleState>,
    shared: RwLock<Option<Arc<RunningShared>>>,
}

impl std::fmt::Debug for ChainNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainNotifier")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("running", &self.shared.read().is_some())
            .finish()
    }
}

impl ChainNotifier {
    /// Build a new notifier around `client`. Does not connect; call
    /// [`start`](Self::start) to do so.
    pub fn new(client: Arc<dyn ChainClient>, config: NotifierConfig) -> Self {
        Self {
            client,
            config,
            lifecycle: AsyncMutex::new(LifecycleState::Stopped),
            shared: RwLock::new(None),
        }
    }

    /// Connect the upstream chain client and spawn the dispatcher.
    /// Idempotent: a second call while already running is a no-op (spec §4.6,
    /// §8 "idempotent lifecycle").
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(&*lifecycle, LifecycleState::Running { .. }) {
            tracing::debug!("start() called while already running; no-op");
            return Ok(());
        }

        self.client.connect(self.config.connect_retries).await?;
        self.client.notify_blocks().await?;
        let (_best_hash, best_height) = self.client.get_best_block().await?;

        let (reg_tx, reg_rx) = mpsc::channel(self.config.registration_channel_capacity);
        let (quit_tx, quit_rx) = watch::channel(false);

        let (dispatcher, ingress) =
            Dispatcher::new(self.client.clone(), reg_rx, quit_rx.clone(), best_height);
        let handle = tokio::spawn(dispatcher.run());

        *self.shared.write() = Some(Arc::new(RunningShared { reg_tx, quit_rx, ingress }));
        *lifecycle = LifecycleState::Running { quit_tx, dispatcher: handle };

        tracing::info!(best_height, kind = self.client.notifier_kind(), "chain notifier started");
        Ok(())
    }

    /// Disconnect the upstream client, stop the dispatcher, and close every
    /// outstanding subscriber channel. Idempotent (spec §4.6, §8).
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let (quit_tx, dispatcher) = match std::mem::replace(&mut *lifecycle, LifecycleState::Stopped) {
            LifecycleState::Stopped => {
                tracing::debug!("stop() called while already stopped; no-op");
                return Ok(());
            }
            LifecycleState::Running { quit_tx, dispatcher } => (quit_tx, dispatcher),
        };

        self.client.shutdown().await;
        let _ = quit_tx.send(true);
        *self.shared.write() = None;

        if let Err(error) = dispatcher.await {
            tracing::error!(%error, "dispatcher task panicked during shutdown");
        }

        tracing::info!("chain notifier stopped");
        Ok(())
    }

    fn shared(&self) -> Result<Arc<RunningShared>> {
        self.shared.read().clone().ok_or(NotifierError::NotRunning)
    }

    /// Submit a registration, racing the `quit` signal (spec §4.7, §5:
    /// registration APIs return `ShuttingDown` if quit wins).
    async fn submit(
        reg_tx: &mpsc::Sender<RegistrationRequest>,
        mut quit_rx: watch::Receiver<bool>,
        req: RegistrationRequest,
    ) -> Result<()> {
        if *quit_rx.borrow() {
            return Err(NotifierError::ShuttingDown);
        }
        tokio::select! {
            _ = quit_rx.changed() => Err(NotifierError::ShuttingDown),
            result = reg_tx.send(req) => result.map_err(|_| NotifierError::ShuttingDown),
        }
    }

    /// Register for notification when `outpoint` is spent on the best chain
    /// (spec §4.7). Steps, in order: subscribe upstream, admit the
    /// subscription to the dispatcher, then probe the current UTXO set --
    /// if the output is already gone, kick off a rescan so the spend is
    /// replayed through the normal push path.
    pub async fn register_spend_ntfn(&self, outpoint: OutPoint) -> Result<SpendEvent> {
        let shared = self.shared()?;

        self.client.notify_spent(&[outpoint]).await?;

        let (out_tx, out_rx) = oneshot::channel();
        let sub = SpendSubscription { target: outpoint, out: out_tx };
        Self::submit(&shared.reg_tx, shared.quit_rx.clone(), RegistrationRequest::Spend(sub)).await?;

        match self.client.get_tx_out(&outpoint, true).await {
            Ok(Some(_)) => {
                tracing::trace!(%outpoint, "spend probe: still unspent");
            }
            Ok(None) => {
                tracing::debug!(%outpoint, "spend probe: already spent, issuing rescan");
                self.rescan_already_spent(outpoint).await;
            }
            Err(error) => {
                tracing::error!(%error, %outpoint, "spend probe (get_tx_out) failed");
            }
        }

        Ok(SpendEvent { spend: out_rx })
    }

    /// Best-effort replay for an outpoint found already spent at
    /// registration time. Failures are logged, not propagated: the
    /// subscription is already admitted and may still be serviced by a
    /// future ordinary `on_redeeming_tx` callback.
    async fn rescan_already_spent(&self, outpoint: OutPoint) {
        let verbose = match self.client.get_raw_transaction_verbose(&outpoint.txid).await {
            Ok(verbose) => verbose,
            Err(error) => {
                tracing::error!(%error, %outpoint, "rescan: failed to look up originating transaction");
                return;
            }
        };
        let Some(block_hash) = verbose.block_hash else {
            tracing::warn!(%outpoint, "rescan: originating transaction has no confirming block");
            return;
        };
        if let Err(error) = self.client.rescan(block_hash, &[], &[outpoint]).await {
            tracing::error!(%error, %outpoint, %block_hash, "rescan after already-spent outpoint failed");
        }
    }

    /// Register for notification when `txid` reaches `num_confirmations` on
    /// the best chain (spec §4.7). Historical dispatch happens inside the
    /// dispatcher once the subscription is admitted.
    pub async fn register_confirmations_ntfn(
        &self,
        txid: Txid,
        num_confirmations: u32,
    ) -> Result<ConfirmationEvent> {
        if num_confirmations == 0 {
            return Err(NotifierError::InvalidConfirmationTarget);
        }
        let shared = self.shared()?;

        let (final_tx, final_rx) = oneshot::channel();
        let (neg_tx, neg_rx) = oneshot::channel();
        let sub = ConfSubscription {
            txid,
            num_confirmations,
            initial_confirm_height: 0,
            final_conf: final_tx,
            negative_conf: neg_tx,
        };
        Self::submit(&shared.reg_tx, shared.quit_rx.clone(), RegistrationRequest::Confirmation(sub))
            .await?;

        Ok(ConfirmationEvent { confirmed: final_rx, negative_conf: neg_rx })
    }

    /// Register for one [`BlockEpoch`] per block connected to the best chain
    /// (spec §4.7).
    pub async fn register_block_epoch_ntfn(&self) -> Result<BlockEpochEvent> {
        let shared = self.shared()?;

        let (tx, rx) = mpsc::channel(self.config.epoch_channel_capacity);
        Self::submit(&shared.reg_tx, shared.quit_rx.clone(), RegistrationRequest::Epoch(tx)).await?;

        Ok(BlockEpochEvent { epochs: rx })
    }
}

/// The notifier is also the sink the upstream chain-client adapter pushes
/// into. Pushing only ever takes a short `parking_lot::RwLock` read lock to
/// clone an `Arc` and hand off to a lock-free queue (spec §4.2, §8 "no
/// upstream blocking") -- it never depends on dispatcher or subscriber drain
/// rate.
impl ChainCallbackSink for ChainNotifier {
    fn on_block_connected(&self, hash: bitcoin::BlockHash, height: i32) {
        if let Some(shared) = self.shared.read().clone() {
            shared.ingress.chain_updates.push(ChainUpdate { hash, height });
        } else {
            tracing::trace!(%hash, height, "on_block_connected with no running dispatcher; dropping");
        }
    }

    fn on_block_disconnected(&self, hash: bitcoin::BlockHash, height: i32) {
        if let Some(shared) = self.shared.read().clone() {
            shared.ingress.disconnected.push(ChainUpdate { hash, height });
        } else {
            tracing::trace!(%hash, height, "on_block_disconnected with no running dispatcher; dropping");
        }
    }

    fn on_redeeming_tx(&self, tx: Transaction) {
        if let Some(shared) = self.shared.read().clone() {
            shared.ingress.tx_updates.push(tx);
        } else {
            tracing::trace!("on_redeeming_tx with no running dispatcher; dropping");
        }
    }
}
