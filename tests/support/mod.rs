//! An in-memory [`ChainClient`] fake for exercising [`ChainNotifier`] end to
//! end without a running node, in the style of the corpus's
//! `TestBitcoinClient`/mock-transport test doubles: plain `Mutex`-guarded
//! state, no network I/O.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bitcoin::{
    absolute::LockTime, address::NetworkUnchecked, transaction::Version, Address, Amount,
    BlockHash, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
};
use chain_notifier::{ChainBlock, ChainClient, NotifierError, Result, VerboseTx};
use parking_lot::Mutex;

/// Build a transaction with the given inputs and a single unique output, so
/// distinct `seed`s produce distinct txids (txid covers outputs, not just
/// inputs).
pub fn make_tx(inputs: Vec<OutPoint>, seed: u8) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: inputs
            .into_iter()
            .map(|previous_output| TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: bitcoin::Witness::new(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x6a, seed]),
        }],
    }
}

pub fn block_hash(seed: u8) -> BlockHash {
    use bitcoin::hashes::Hash;
    BlockHash::from_byte_array([seed; 32])
}

#[derive(Default)]
struct MockState {
    best_hash: BlockHash,
    best_height: i32,
    blocks: HashMap<BlockHash, ChainBlock>,
    tx_block: HashMap<Txid, BlockHash>,
    utxos: HashSet<OutPoint>,
    connect_calls: u32,
    shutdown_calls: u32,
    notify_spent_calls: Vec<OutPoint>,
    rescan_calls: Vec<(BlockHash, Vec<OutPoint>)>,
}

/// The upstream chain node, faked. Tests drive it directly (`add_block`,
/// `mark_spent`, ...) and drive the notifier's push side through
/// [`chain_notifier::ChainCallbackSink`] separately -- this struct only
/// answers the pull-based `ChainClient` queries.
pub struct MockChainClient {
    state: Mutex<MockState>,
}

impl MockChainClient {
    /// A fresh client whose best block is `(genesis_hash, 0)`.
    pub fn new(best_hash: BlockHash, best_height: i32) -> Self {
        Self {
            state: Mutex::new(MockState { best_hash, best_height, ..Default::default() }),
        }
    }

    /// Record a block as part of the best chain, without changing the
    /// client's notion of the current tip. Used to seed history that a
    /// historical-dispatch query can find.
    pub fn seed_block(&self, hash: BlockHash, height: i32, transactions: Vec<Transaction>) {
        let mut state = self.state.lock();
        for tx in &transactions {
            state.tx_block.insert(tx.compute_txid(), hash);
        }
        state.blocks.insert(hash, ChainBlock { hash, height, transactions });
    }

    /// Seed a block AND advance the tip to it -- what a real connected block
    /// looks like from the client's point of view.
    pub fn connect_block(&self, hash: BlockHash, height: i32, transactions: Vec<Transaction>) {
        self.seed_block(hash, height, transactions);
        let mut state = self.state.lock();
        state.best_hash = hash;
        state.best_height = height;
    }

    pub fn mark_unspent(&self, outpoint: OutPoint) {
        self.state.lock().utxos.insert(outpoint);
    }

    pub fn mark_spent(&self, outpoint: OutPoint) {
        self.state.lock().utxos.remove(&outpoint);
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    pub fn shutdown_calls(&self) -> u32 {
        self.state.lock().shutdown_calls
    }

    pub fn notify_spent_calls(&self) -> Vec<OutPoint> {
        self.state.lock().notify_spent_calls.clone()
    }

    pub fn rescan_calls(&self) -> Vec<(BlockHash, Vec<OutPoint>)> {
        self.state.lock().rescan_calls.clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn connect(&self, _retry_budget: u32) -> Result<()> {
        self.state.lock().connect_calls += 1;
        Ok(())
    }

    async fn shutdown(&self) {
        self.state.lock().shutdown_calls += 1;
    }

    async fn notify_blocks(&self) -> Result<()> {
        Ok(())
    }

    async fn notify_spent(&self, outpoints: &[OutPoint]) -> Result<()> {
        self.state.lock().notify_spent_calls.extend_from_slice(outpoints);
        Ok(())
    }

    async fn rescan(
        &self,
        from_block: BlockHash,
        _addrs: &[Address<NetworkUnchecked>],
        outpoints: &[OutPoint],
    ) -> Result<()> {
        self.state.lock().rescan_calls.push((from_block, outpoints.to_vec()));
        Ok(())
    }

    async fn get_best_block(&self) -> Result<(BlockHash, i32)> {
        let state = self.state.lock();
        Ok((state.best_hash, state.best_height))
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<ChainBlock> {
        self.state
            .lock()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| NotifierError::custom(MockError(format!("unknown block {hash}"))))
    }

    async fn get_raw_transaction_verbose(&self, txid: &Txid) -> Result<VerboseTx> {
        let state = self.state.lock();
        let Some(block_hash) = state.tx_block.get(txid).copied() else {
            return Err(NotifierError::custom(MockError(format!("unknown tx {txid}"))));
        };
        let block = state.blocks.get(&block_hash).expect("tx_block entries always have a block");
        let confirmations = (state.best_height - block.height + 1) as u32;
        Ok(VerboseTx { txid: *txid, block_hash: Some(block_hash), confirmations })
    }

    async fn get_tx_out(&self, outpoint: &OutPoint, _include_mempool: bool) -> Result<Option<TxOut>> {
        let state = self.state.lock();
        Ok(state.utxos.contains(outpoint).then(|| TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::new(),
        }))
    }
}

#[derive(Debug)]
struct MockError(String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}
