use thiserror::Error;

/// Errors surfaced by node operations.
///
/// Soft protocol failures (unsupported opcodes, bad inbound bodies) are
/// never errors here; they set the node's report code, which peers read
/// out of the next ArtPollReply.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure: send/receive error or short datagram write
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Caller-supplied value out of contract
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Operation invalid in the node's current mode
    #[error("invalid state: {0}")]
    State(String),

    /// Operation invalid given a non-mode condition
    #[error("invalid action: {0}")]
    Action(String),
}

/// Result type for node operations
pub type Result<T> = std::result::Result<T, Error>;
