/*!
DTN time, per RFC 9171 §4.2.6: milliseconds since the DTN epoch,
2000-01-01T00:00:00Z, ignoring leap seconds.
*/
use core::fmt;
use skua_cbor::decode::{self, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

/// Milliseconds since 2000-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DtnTime(pub u64);

/// Unix epoch seconds of the DTN epoch (2000-01-01T00:00:00Z).
pub const DTN_EPOCH_UNIX_SECONDS: u64 = 946_684_800;

impl DtnTime {
    /// `true` for the zero value, used in a primary block's creation
    /// timestamp when the node has no notion of absolute time.
    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds since the Unix epoch, for interop with wall-clock APIs.
    pub fn to_unix_millis(self) -> u64 {
        self.0 + DTN_EPOCH_UNIX_SECONDS * 1000
    }

    pub fn from_unix_millis(unix_ms: u64) -> Self {
        Self(unix_ms.saturating_sub(DTN_EPOCH_UNIX_SECONDS * 1000))
    }

    pub fn checked_add_millis(self, millis: u64) -> Option<Self> {
        self.0.checked_add(millis).map(Self)
    }
}

impl fmt::Display for DtnTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms+2000", self.0)
    }
}

impl ToCbor for DtnTime {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint(self.0);
    }
}

impl FromCbor for DtnTime {
    type Error = decode::Error;
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = decode::read_uint(data)?;
        Ok((Self(v), len))
    }
}
