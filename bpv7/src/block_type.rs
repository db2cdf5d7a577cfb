/*!
Canonical block type codes, per RFC 9171 §4.3 and §3.4's registry, which
reassigns IANA code 11 (the BPSec block integrity block, RFC 9172) to
custody tracking. BPSec blocks carry no special handling in this engine —
they pass through as opaque [`BlockType::Unrecognised`] content, wire
bytes preserved verbatim on forward, same as any other block type this
registry doesn't name.
*/
use skua_cbor::decode::{self, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

/// The type of a canonical (non-primary) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Block number 1 is reserved for the payload block.
    Payload,
    PreviousNode,
    BundleAge,
    HopCount,
    /// Code 11, reassigned per §3.4: carries the current custodian's
    /// endpoint ID, rewritten on every forward.
    CustodyTracking,
    /// Any other registered or private/experimental block type code.
    Unrecognised(u64),
}

impl BlockType {
    pub fn code(self) -> u64 {
        match self {
            BlockType::Payload => 1,
            BlockType::PreviousNode => 6,
            BlockType::BundleAge => 7,
            BlockType::HopCount => 10,
            BlockType::CustodyTracking => 11,
            BlockType::Unrecognised(code) => code,
        }
    }
}

impl From<u64> for BlockType {
    fn from(code: u64) -> Self {
        match code {
            1 => BlockType::Payload,
            6 => BlockType::PreviousNode,
            7 => BlockType::BundleAge,
            10 => BlockType::HopCount,
            11 => BlockType::CustodyTracking,
            other => BlockType::Unrecognised(other),
        }
    }
}

impl From<BlockType> for u64 {
    fn from(value: BlockType) -> Self {
        value.code()
    }
}

impl ToCbor for BlockType {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint(self.code());
    }
}

impl FromCbor for BlockType {
    type Error = decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = decode::read_uint(data)?;
        Ok((v.into(), len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_and_unknown_codes() {
        for code in [1u64, 6, 7, 10, 11, 12, 200] {
            let ty: BlockType = code.into();
            assert_eq!(ty.code(), code);
        }
    }

    #[test]
    fn code_11_is_custody_tracking_not_bpsec() {
        assert_eq!(BlockType::from(11), BlockType::CustodyTracking);
        assert_eq!(BlockType::from(12), BlockType::Unrecognised(12));
    }
}
