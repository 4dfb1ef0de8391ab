//! Error taxonomy for the settlement core.
//!
//! All three kinds are unrecoverable for the single settlement attempt: the
//! caller must not apply any partial state and may retry with corrected
//! inputs (e.g. a resynchronized version pairing).

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A field value exceeds its declared bit-width at the write boundary.
    /// Values outside range are rejected, never truncated or wrapped.
    #[error("value for `{field}` exceeds its {bits}-bit storage range")]
    Range { field: &'static str, bits: u32 },

    /// An arithmetic step exceeded the fixed-point representable range.
    #[error("fixed-point arithmetic overflow")]
    Overflow,

    /// Settlement invoked with version timestamps out of order, or with a
    /// position/order pair whose ids are not contiguous.
    #[error("settlement inputs out of order")]
    Ordering,
}

pub type Result<T> = core::result::Result<T, LedgerError>;
