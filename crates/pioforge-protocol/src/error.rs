//! Error types for the protocol layer.
//!
//! Each crate in pioforge defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the bytes themselves, not in the
//! socket that carried them or the handler that would have used them.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The byte stream does not describe a valid wire value.
    ///
    /// Raised for an unrecognized tag byte, for a buffer that ends in the
    /// middle of a value, and for string payloads that are not UTF-8.
    /// `offset` is the position of the offending tag in the input.
    #[error("malformed wire value at byte {offset}: {reason}")]
    MalformedWireValue { offset: usize, reason: String },

    /// A value that cannot be represented on the wire (for example a
    /// message with no elements at all).
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// A nested list or map could not be lowered to, or raised from, its
    /// JSON string form.
    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error surfaced through the `tokio_util` codec traits.
    #[error("codec io: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedWireValue {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_includes_offset_and_reason() {
        let err = ProtocolError::malformed(7, "unknown tag 0xff");
        let text = err.to_string();
        assert!(text.contains("byte 7"));
        assert!(text.contains("unknown tag 0xff"));
    }
}
