/*!
Bundle processing control flags and block processing control flags, per
RFC 9171 §4.2.3 and §4.3.
*/
use skua_cbor::decode::{self, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

/// Bundle processing control flags, carried on the primary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BundleFlags(u64);

impl BundleFlags {
    pub const IS_FRAGMENT: Self = Self(1 << 0);
    pub const ADMIN_RECORD: Self = Self(1 << 1);
    pub const DO_NOT_FRAGMENT: Self = Self(1 << 2);
    pub const APP_ACK_REQUESTED: Self = Self(1 << 5);
    pub const STATUS_TIME_REQUESTED: Self = Self(1 << 6);
    pub const RECEIPT_REQUESTED: Self = Self(1 << 14);
    pub const FORWARD_REPORT_REQUESTED: Self = Self(1 << 16);
    pub const DELIVERY_REPORT_REQUESTED: Self = Self(1 << 17);
    pub const DELETE_REPORT_REQUESTED: Self = Self(1 << 18);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl core::ops::BitOr for BundleFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for BundleFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<u64> for BundleFlags {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl ToCbor for BundleFlags {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint(self.0);
    }
}

impl FromCbor for BundleFlags {
    type Error = decode::Error;
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = decode::read_uint(data)?;
        Ok((Self(v), len))
    }
}

/// Block processing control flags, carried on every block (primary and
/// canonical alike).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockFlags(u64);

impl BlockFlags {
    pub const MUST_REPLICATE: Self = Self(1 << 0);
    pub const REPORT_ON_FAILURE: Self = Self(1 << 1);
    pub const DELETE_BUNDLE_ON_FAILURE: Self = Self(1 << 2);
    pub const REMOVE_BLOCK_ON_FAILURE: Self = Self(1 << 4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

impl core::ops::BitOr for BlockFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<u64> for BlockFlags {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl ToCbor for BlockFlags {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint(self.0);
    }
}

impl FromCbor for BlockFlags {
    type Error = decode::Error;
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = decode::read_uint(data)?;
        Ok((Self(v), len))
    }
}
