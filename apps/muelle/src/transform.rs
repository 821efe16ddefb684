//! Payload transforms
//!
//! Upload widgets expose a "process before sending" switch (image
//! resizing, most commonly). The transport keeps that seam as a transform
//! applied to the whole payload before it is chunked; the default
//! configuration applies none.

use crate::error::Result;

/// Transform applied to the source payload before chunking.
///
/// Implementations must be pure with respect to their input: the
/// transformed bytes are what gets chunked, checksummed, and merged.
pub trait PayloadTransform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produce the bytes that will actually be uploaded.
    fn apply(&self, input: Vec<u8>) -> Result<Vec<u8>>;
}

/// Transform that leaves the payload untouched.
pub struct Identity;

impl PayloadTransform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, input: Vec<u8>) -> Result<Vec<u8>> {
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let input = vec![1u8, 2, 3];
        assert_eq!(Identity.apply(input.clone()).unwrap(), input);
        assert_eq!(Identity.name(), "identity");
    }
}
