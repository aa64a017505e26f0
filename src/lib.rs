//! A Chain Notifier core: a long-running service that lets clients subscribe
//! to three classes of best-chain events and receive exactly-once, ordered
//! notifications as the chain advances.
//!
//! - **Block epoch** -- every new block connected to the best chain.
//! - **Transaction confirmation** -- a transaction reaching *N* confirmations.
//! - **Outpoint spend** -- an unspent output being consumed by some
//!   transaction on the best chain.
//!
//! [`ChainNotifier`] is the only public entry point. It fuses the upstream
//! chain client's push callbacks ([`ChainCallbackSink`]) with the pull-based
//! `register_*_ntfn` registration API through a single dispatcher task that
//! owns all mutable state, so no registry, heap, or subscriber channel is
//! ever touched from more than one place.
//!
//! This crate does not implement a chain-node client itself: bring your own
//! [`ChainClient`] (a JSON-RPC adapter, a test double, whatever talks to your
//! node) and wire its push events into a `ChainNotifier` via
//! [`ChainCallbackSink`].

mod client;
mod config;
mod dispatcher;
mod error;
mod heap;
mod historical;
mod ingress;
mod notifier;
mod registry;
mod types;

pub use client::{ChainCallbackSink, ChainClient};
pub use config::NotifierConfig;
pub use error::{NotifierError, Result};
pub use notifier::{BlockEpochEvent, ChainNotifier, ConfirmationEvent, SpendEvent};
pub use types::{BlockEpoch, ChainBlock, SpendDetail, TxConfirmation, VerboseTx};
