//! Event payloads and upstream query results.
//!
//! Primitive identifiers (`Txid`, `BlockHash`, `OutPoint`, `Transaction`,
//! `TxOut`) are re-used directly from the `bitcoin` crate rather than
//! re-derived here.

use bitcoin::{BlockHash, OutPoint, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// A new block connected to the best chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEpoch {
    /// Height of the connected block.
    pub height: i32,
    /// Hash of the connected block.
    pub hash: BlockHash,
}

/// The exact position at which a transaction was first confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxConfirmation {
    /// Hash of the block that first contained the transaction.
    pub block_hash: BlockHash,
    /// Height of that block.
    pub block_height: u32,
    /// Index of the transaction within that block.
    pub tx_index: u32,
}

/// An outpoint being consumed by some transaction on the best chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendDetail {
    /// The outpoint that was spent.
    pub spent_outpoint: OutPoint,
    /// Hash of the spending transaction.
    pub spender_tx_hash: Txid,
    /// The full spending transaction.
    pub spending_tx: Transaction,
    /// Index of the input within `spending_tx` that consumed the outpoint.
    pub spender_input_index: u32,
}

/// A block as delivered by the upstream chain client.
///
/// Stands in for the chain client's wire-format block type; this crate does
/// not parse block bytes itself (out of scope, see spec §1).
#[derive(Debug, Clone)]
pub struct ChainBlock {
    /// Hash of this block.
    pub hash: BlockHash,
    /// Height of this block.
    pub height: i32,
    /// Transactions in this block, in on-chain order.
    pub transactions: Vec<Transaction>,
}

/// Verbose transaction lookup result, as returned by the upstream
/// `get_raw_transaction_verbose` query.
#[derive(Debug, Clone)]
pub struct VerboseTx {
    /// The transaction's hash.
    pub txid: Txid,
    /// The block containing this transaction, if confirmed.
    pub block_hash: Option<BlockHash>,
    /// Confirmation count at query time (one confirmation = in the tip block).
    pub confirmations: u32,
}
