//! Historical dispatch (spec §4.4): the fast path invoked at confirmation
//! registration time, satisfying already-confirmed subscriptions without
//! waiting for a future block.

use crate::{client::ChainClient, heap::ConfHeapEntry, registry::ConfSubscription};

/// The result of attempting historical dispatch for a freshly registered
/// confirmation subscription.
pub(crate) enum HistoricalOutcome {
    /// The transaction is unknown, unconfirmed, or a query failed. The
    /// subscription was not touched and must be registered normally.
    NotDispatched(ConfSubscription),
    /// The transaction already has enough confirmations; `final_conf` has
    /// already fired. The subscription must NOT be registered anywhere.
    FullyDispatched,
    /// The transaction is confirmed but not yet deeply enough; the
    /// subscription has already been placed on the heap with the correct
    /// `trigger_height` and must NOT also go into `ConfRegistry`.
    Pending(ConfHeapEntry),
}

/// Attempt to satisfy `sub` immediately from already-confirmed chain state.
pub(crate) async fn try_historical_dispatch(
    client: &dyn ChainClient,
    current_height: i32,
    sub: ConfSubscription,
) -> HistoricalOutcome {
    let verbose = match client.get_raw_transaction_verbose(&sub.txid).await {
        Ok(verbose) => verbose,
        Err(error) => {
            tracing::debug!(%error, txid = %sub.txid, "historical dispatch: transaction lookup failed");
            return HistoricalOutcome::NotDispatched(sub);
        }
    };

    let Some(block_hash) = verbose.block_hash else {
        tracing::trace!(txid = %sub.txid, "historical dispatch: transaction unconfirmed");
        return HistoricalOutcome::NotDispatched(sub);
    };

    let block = match client.get_block(&block_hash).await {
        Ok(block) => block,
        Err(error) => {
            tracing::error!(%error, %block_hash, "historical dispatch: failed to fetch containing block");
            return HistoricalOutcome::NotDispatched(sub);
        }
    };

    let Some(tx_index) = block.transactions.iter().position(|tx| tx.compute_txid() == sub.txid) else {
        tracing::error!(%block_hash, txid = %sub.txid, "historical dispatch: transaction missing from its own block");
        return HistoricalOutcome::NotDispatched(sub);
    };

    // Reference convention: one confirmation means "in the tip block", so
    // the block containing a tx with `confirmations` confirmations sits at
    // `current_height - confirmations + 1`.
    let first_seen_height = current_height - verbose.confirmations as i32 + 1;
    let details = crate::types::TxConfirmation {
        block_hash,
        block_height: first_seen_height as u32,
        tx_index: tx_index as u32,
    };

    if verbose.confirmations >= sub.num_confirmations {
        let _ = sub.final_conf.send(details);
        tracing::debug!(txid = %sub.txid, confirmations = verbose.confirmations, "historical dispatch: fully satisfied");
        HistoricalOutcome::FullyDispatched
    } else {
        let trigger_height =
            current_height + (sub.num_confirmations as i32 - verbose.confirmations as i32);
        tracing::debug!(txid = %sub.txid, trigger_height, "historical dispatch: parked on heap");
        HistoricalOutcome::Pending(ConfHeapEntry { sub, details, trigger_height: trigger_height as u32 })
    }
}
