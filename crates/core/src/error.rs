//! Failure kinds for a single decode cycle.
//!
//! None of these are fatal. Readers collapse every variant into an empty
//! metric map at their public boundary; the variants only exist so the
//! caller can log at the right severity.

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The producer is not running, or its segment cannot be opened.
    #[error("Segment '{name}' unavailable: {source}")]
    SegmentUnavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Signature mismatch or a zero size/count field.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// A computed read would run past the end of the mapped region.
    #[error("Read of {size} bytes at offset {offset} exceeds segment length {len}")]
    OutOfBounds { offset: u64, size: usize, len: usize },
}

impl DecodeError {
    /// `true` for the routine "producer not running" case.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::SegmentUnavailable { .. })
    }
}
