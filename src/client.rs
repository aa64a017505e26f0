//! The upstream chain-node client: an external collaborator specified only
//! by interface (spec §6). A concrete implementation (e.g. a `bitcoind`
//! JSON-RPC adapter) lives outside this crate; tests use [`MockChainClient`]
//! style fakes of this trait.

use async_trait::async_trait;
use bitcoin::{address::NetworkUnchecked, Address, BlockHash, OutPoint, Transaction, TxOut, Txid};
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{ChainBlock, VerboseTx},
};

/// The chain-node client contract the dispatcher relies on.
///
/// Implementors own the actual wire connection (ZMQ, JSON-RPC, whatever);
/// this trait only describes the operations the notifier core needs, so it
/// can be exercised in tests without a running node.
#[async_trait]
pub trait ChainClient: Send + Sync + Debug + 'static {
    /// Establish the upstream connection, retrying up to `retry_budget` times.
    async fn connect(&self, retry_budget: u32) -> Result<()>;

    /// Disconnect from the upstream node. Idempotent from the caller's view.
    async fn shutdown(&self);

    /// Subscribe to block-connected/disconnected push notifications.
    async fn notify_blocks(&self) -> Result<()>;

    /// Subscribe to spend notifications for the given outpoints.
    async fn notify_spent(&self, outpoints: &[OutPoint]) -> Result<()>;

    /// Replay block/tx events from `from_block` forward, so that newly
    /// registered subscriptions observe past events through the normal push
    /// path (`on_redeeming_tx`). `addrs` is the address side of the upstream
    /// rescan call; this core never watches addresses, so callers always
    /// pass an empty slice.
    async fn rescan(
        &self,
        from_block: BlockHash,
        addrs: &[Address<NetworkUnchecked>],
        outpoints: &[OutPoint],
    ) -> Result<()>;

    /// The current best chain tip.
    async fn get_best_block(&self) -> Result<(BlockHash, i32)>;

    /// Fetch a full block by hash.
    async fn get_block(&self, hash: &BlockHash) -> Result<ChainBlock>;

    /// Fetch verbose transaction info, including confirmation depth.
    async fn get_raw_transaction_verbose(&self, txid: &Txid) -> Result<VerboseTx>;

    /// Look up a transaction output in the UTXO set (optionally including
    /// the mempool). `None` means the output is missing or already spent.
    async fn get_tx_out(&self, outpoint: &OutPoint, include_mempool: bool) -> Result<Option<TxOut>>;

    /// A short tag identifying the concrete upstream implementation (e.g.
    /// `"bitcoind"`, `"btcd"`), for log correlation and ecosystem
    /// registration. Defaults to `"unknown"` for implementations that don't
    /// care to override it.
    fn notifier_kind(&self) -> &'static str {
        "unknown"
    }
}

/// Events the upstream feed pushes into the notifier. A real chain-client
/// adapter invokes these from its own event loop as blocks connect/disconnect
/// and as mempool transactions redeem watched outpoints; this crate never
/// calls them itself.
pub trait ChainCallbackSink: Send + Sync + 'static {
    /// A new block was connected to the best chain.
    fn on_block_connected(&self, hash: BlockHash, height: i32);

    /// A previously connected block is no longer on the best chain.
    ///
    /// This version takes no registry action beyond logging (spec §9, open
    /// question: reorg handling).
    fn on_block_disconnected(&self, hash: BlockHash, height: i32);

    /// A transaction observed on the best chain (or replayed via `rescan`)
    /// may redeem a watched outpoint.
    fn on_redeeming_tx(&self, tx: Transaction);
}
