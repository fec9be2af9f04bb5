//! Error types for the Trickline wire format.

use thiserror::Error;

use crate::ActionKind;

/// Errors raised at the decode/encode boundary.
///
/// Anything that fails here never reaches the router.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Payload bytes do not match the schema of the declared kind
    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        /// Kind declared by the record.
        kind: ActionKind,
        /// Underlying decode failure.
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// Player seat outside the supported range
    #[error("invalid player id: {0}")]
    InvalidPlayer(u8),

    /// Kind name outside the closed set
    #[error("unknown action kind: {0}")]
    UnknownKind(String),

    /// Authoritative action without a sequence, or ephemeral action with one
    #[error("invalid sequence {sequence} for {kind}")]
    InvalidSequence {
        /// Kind declared by the record.
        kind: ActionKind,
        /// Sequence carried by the record.
        sequence: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::InvalidPlayer(9);
        assert_eq!(err.to_string(), "invalid player id: 9");

        let err = WireError::InvalidSequence {
            kind: ActionKind::Honk,
            sequence: 4,
        };
        assert_eq!(err.to_string(), "invalid sequence 4 for honk");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
