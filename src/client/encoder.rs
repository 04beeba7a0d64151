//! Payload encoding
//!
//! Strategy applied to job data on the way out and to result data on the
//! way in.

use bytes::Bytes;

use crate::error::Result;

/// Transforms job payloads at the protocol boundary
pub trait DataEncoder {
    /// Applied to job data before it is packed
    fn encode(&self, data: Bytes) -> Result<Bytes>;

    /// Applied to WORK_DATA, WORK_WARNING, WORK_COMPLETE and WORK_EXCEPTION payloads
    fn decode(&self, data: Bytes) -> Result<Bytes>;
}

/// Pass-through encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEncoder;

impl DataEncoder for IdentityEncoder {
    fn encode(&self, data: Bytes) -> Result<Bytes> {
        Ok(data)
    }

    fn decode(&self, data: Bytes) -> Result<Bytes> {
        Ok(data)
    }
}
