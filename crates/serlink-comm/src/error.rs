/// Errors that can occur while driving the protocol engine.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// Byte-link error.
    #[error("transport error: {0}")]
    Transport(#[from] serlink_transport::TransportError),

    /// Codec error.
    #[error("frame error: {0}")]
    Frame(#[from] serlink_frame::FrameError),

    /// A queue resize would drop occupied slots.
    #[error("cannot shrink queue to {requested}: slot {occupied_slot} is occupied")]
    QueueShrink {
        requested: u16,
        occupied_slot: u16,
    },
}

pub type Result<T> = std::result::Result<T, CommError>;
