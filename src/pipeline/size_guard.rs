//! Hard upper bound on the serialized webhook body.
//!
//! The webhook silently drops or mangles bodies over 2 KiB, so an oversized
//! payload fails the cycle before anything is sent. Nothing is truncated.

use crate::error::RelayError;

/// Largest body the webhook accepts, in bytes.
pub const PAYLOAD_LIMIT_BYTES: usize = 2048;

/// Checks the exact bytes that will be transmitted.
///
/// Returns the body size on success.
///
/// # Errors
///
/// Returns [`RelayError::OversizedPayload`] when `serialized` is longer than
/// [`PAYLOAD_LIMIT_BYTES`].
pub fn check(serialized: &[u8]) -> Result<usize, RelayError> {
    check_with_limit(serialized, PAYLOAD_LIMIT_BYTES)
}

/// [`check`] against an explicit limit.
///
/// # Errors
///
/// Returns [`RelayError::OversizedPayload`] when `serialized` is longer than
/// `limit`.
pub fn check_with_limit(serialized: &[u8], limit: usize) -> Result<usize, RelayError> {
    let actual = serialized.len();
    if actual > limit {
        return Err(RelayError::OversizedPayload { actual, limit });
    }
    Ok(actual)
}
