use std::error::Error as StdError;

/// A crate-local [`Result`] alias over [`NotifierError`].
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Errors surfaced by the notifier core.
///
/// Mirrors the shape of a transport error enum: a handful of named variants
/// for conditions the dispatcher itself detects, plus a boxed catch-all for
/// whatever a concrete [`ChainClient`](crate::ChainClient)
/// implementation wants to report.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotifierError {
    /// The upstream chain client reported a failure while servicing a
    /// registration-time query (`notify_spent`, `rescan`, `get_tx_out`, ...).
    #[error("chain client error: {0}")]
    ChainClient(#[source] Box<dyn StdError + Send + Sync>),

    /// A registration raced the `quit` signal and lost: the notifier is
    /// tearing down and will not admit new subscriptions.
    #[error("notifier is shutting down")]
    ShuttingDown,

    /// A registration API call was made before `start` (or after `stop`
    /// completed); there is no dispatcher to register with.
    #[error("notifier is not running")]
    NotRunning,

    /// `register_confirmations_ntfn` was called with `num_confirmations == 0`;
    /// the spec requires at least one confirmation.
    #[error("num_confirmations must be at least 1")]
    InvalidConfirmationTarget,

    /// Catch-all for errors that don't fit the above, e.g. from test doubles
    /// or from embedding binaries that want to thread their own error type
    /// through.
    #[error("{0}")]
    Custom(Box<dyn StdError + Send + Sync>),
}

impl NotifierError {
    /// Wrap an error returned by a [`ChainClient`](crate::ChainClient) call.
    pub fn chain_client(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::ChainClient(Box::new(err))
    }

    /// Build a [`NotifierError::Custom`] from any error type.
    pub fn custom(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Custom(Box::new(err))
    }
}
