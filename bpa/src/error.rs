/*!
The error taxonomy for the storage-and-forward engine, per §7.

Most variants here are not "errors" in the panic-worthy sense: `Timeout`
and `Expired` are routine outcomes of blocking operations and the
maintenance loop, and the custody-machine diagnostics never abort an
operation — they're reported so a caller can decide whether to log,
retry, or escalate.
*/
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("caller passed a null or unrecognised handle")]
    NullPtr,

    #[error("invalid argument: {0}")]
    ParmErr(&'static str),

    #[error("underlying OS primitive failed: {0}")]
    OsError(String),

    #[error("pool or offload store could not satisfy the request")]
    StoreFailure,

    #[error("operation timed out before its deadline")]
    Timeout,

    #[error("bundle lifetime has elapsed")]
    Expired,

    #[error("bundle rejected: wrong channel for this flow")]
    WrongChannel,

    #[error("bundle rejected: wrong origination role for this flow")]
    WrongOrigination,

    #[error(transparent)]
    BundleParseErr(#[from] skua_bpv7::Error),

    #[error("unsupported bundle protocol version")]
    WrongVersion,

    #[error("block or bundle failed its CRC check")]
    BadCrc,

    #[error("payload of {0} bytes exceeds the configured maximum of {1} bytes")]
    BundleTooLarge(usize, usize),

    #[error("block type {0} or admin record type is not implemented")]
    Unsupported(u64),

    #[error("custody ID ring is full")]
    Overflow,

    #[error("routing table is full")]
    RouteTableFull,

    #[error("no matching route for destination")]
    NoRoute,

    #[error("no such route to remove")]
    NoSuchRoute,

    #[error("no such interface")]
    NoSuchInterface,
}

/// Non-fatal conditions accumulated during an operation, per §7's
/// "diagnostic conditions ... raise bits in a caller-supplied flags word"
/// rule. Callers pass a `&mut Diagnostics` into operations that can raise
/// more than one independent warning in a single call (forwarding a
/// bundle, accepting a custody sequence number) instead of threading a
/// `Result` through code paths that aren't actually fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics(u32);

impl Diagnostics {
    pub const DACS_FULL: Self = Self(1 << 0);
    pub const FILL_OVERFLOW: Self = Self(1 << 1);
    pub const CID_WENT_BACKWARDS: Self = Self(1 << 2);
    pub const MIXED_RESPONSE: Self = Self(1 << 3);
    pub const HOP_LIMIT_EXCEEDED: Self = Self(1 << 4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn raise(&mut self, bit: Self) {
        self.0 |= bit.0;
    }

    pub fn contains(self, bit: Self) -> bool {
        self.0 & bit.0 == bit.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_accumulate_independently() {
        let mut d = Diagnostics::empty();
        d.raise(Diagnostics::CID_WENT_BACKWARDS);
        d.raise(Diagnostics::MIXED_RESPONSE);
        assert!(d.contains(Diagnostics::CID_WENT_BACKWARDS));
        assert!(d.contains(Diagnostics::MIXED_RESPONSE));
        assert!(!d.contains(Diagnostics::DACS_FULL));
    }
}
