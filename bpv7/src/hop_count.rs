/*!
The Hop Count extension block, per RFC 9171 §4.4.2.
*/
use skua_cbor::decode::{self, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

/// `[hop limit, hop count]`, incremented by one at every forwarding node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopInfo {
    pub limit: u64,
    pub count: u64,
}

impl HopInfo {
    /// `true` once `count` has reached `limit`: the bundle must be dropped
    /// rather than forwarded again.
    pub fn exceeded(&self) -> bool {
        self.count >= self.limit
    }

    /// Returns a copy with `count` incremented by one.
    pub fn increment(self) -> Self {
        Self {
            limit: self.limit,
            count: self.count + 1,
        }
    }
}

impl ToCbor for HopInfo {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(2, |a| {
            a.emit(&self.limit);
            a.emit(&self.count);
        });
    }
}

impl FromCbor for HopInfo {
    type Error = decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let ((limit, count), len) = decode::parse_array(data, |a| {
            Ok::<_, decode::Error>((a.parse::<u64>()?, a.parse::<u64>()?))
        })?;
        Ok((Self { limit, count }, len))
    }
}
