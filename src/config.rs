//! Construction-time configuration. A plain struct with a `Default` impl --
//! no file or environment parsing lives in this core (spec §6: "no CLI, no
//! environment variables").

/// Tunables for a [`ChainNotifier`](crate::ChainNotifier).
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// How many times `ChainClient::connect` may be retried during `start`.
    pub connect_retries: u32,
    /// Capacity of each block-epoch subscriber channel. Must be at least 20
    /// (spec §3: "capacity-N (N≥20)").
    pub epoch_channel_capacity: usize,
    /// Capacity of the registration channel. Registration calls suspend on
    /// this channel filling up, racing the `quit` signal (spec §5).
    pub registration_channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            connect_retries: 20,
            epoch_channel_capacity: 20,
            registration_channel_capacity: 256,
        }
    }
}
