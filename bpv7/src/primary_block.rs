/*!
The primary block, per RFC 9171 §4.2.2/§4.3.1 and §3.2: the required
first block of every bundle, carrying routing and lifecycle metadata.

The wire array has 8 elements (no CRC, no fragment fields), 9 (CRC, no
fragment), 10 (fragment, no CRC) or 11 (both) — which one is in play is
read from `control_flags` and `crc_type` as they're parsed, same as the
canonical block codec.
*/
use skua_cbor::decode::{self, Array, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

use crate::creation_timestamp::CreationTimestamp;
use crate::crc::{self, CrcType};
use crate::eid::Eid;
use crate::error::{CaptureFieldErr, Error};
use crate::flags::BundleFlags;

pub const BP_VERSION: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub crc_type: CrcType,
    pub destination: Eid,
    pub source: Eid,
    pub report_to: Eid,
    pub creation_timestamp: CreationTimestamp,
    pub lifetime_ms: u64,
    /// `Some((offset, total_adu_length))` when `flags.IS_FRAGMENT` is set.
    pub fragment_info: Option<(u64, u64)>,
}

impl PrimaryBlock {
    pub fn is_fragment(&self) -> bool {
        self.flags.contains(BundleFlags::IS_FRAGMENT)
    }

    pub fn is_admin_record(&self) -> bool {
        self.flags.contains(BundleFlags::ADMIN_RECORD)
    }

    pub fn field_count(&self) -> usize {
        let mut n = 8;
        if self.fragment_info.is_some() {
            n += 2;
        }
        if self.crc_type != CrcType::None {
            n += 1;
        }
        n
    }

    /// Encodes this primary block as a standalone definite-length CBOR
    /// array, CRC-backfilled per the crate's CRC protocol.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        let count = self.field_count();
        encoder.emit_array(count, |a| {
            a.emit(&BP_VERSION);
            a.emit(&self.flags);
            a.emit(&self.crc_type);
            a.emit(&self.destination);
            a.emit(&self.source);
            a.emit(&self.report_to);
            a.emit(&self.creation_timestamp);
            a.emit(&self.lifetime_ms);
            if let Some((offset, total_len)) = self.fragment_info {
                a.emit(&offset);
                a.emit(&total_len);
            }
            if self.crc_type != CrcType::None {
                a.skip_value();
            }
        });
        crc::append_crc_value(self.crc_type, encoder.build())
    }

    /// Parses a standalone primary block. Returns the block and the
    /// number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), Error> {
        decode::parse_array(data, |a: &mut Array| {
            let version: u64 = a.parse().map_field_err::<Error>("version")?;
            if version != BP_VERSION {
                return Err(Error::InvalidVersion(version));
            }
            let flags: BundleFlags = a.parse().map_field_err::<Error>("control_flags")?;
            let crc_type: CrcType = a.parse().map_err(Error::InvalidCrc)?;
            let destination: Eid = a.parse().map_err(Error::InvalidEid)?;
            let source: Eid = a.parse().map_err(Error::InvalidEid)?;
            let report_to: Eid = a.parse().map_err(Error::InvalidEid)?;
            let creation_timestamp: CreationTimestamp =
                a.parse().map_field_err::<Error>("creation_timestamp")?;
            let lifetime_ms: u64 = a.parse().map_field_err::<Error>("lifetime_ms")?;

            let fragment_info = if flags.contains(BundleFlags::IS_FRAGMENT) {
                let offset: u64 = a.parse().map_field_err::<Error>("fragment_offset")?;
                let total_len: u64 = a.parse().map_field_err::<Error>("total_adu_length")?;
                if offset >= total_len {
                    return Err(Error::InvalidFragmentInfo(offset, total_len));
                }
                Some((offset, total_len))
            } else {
                None
            };

            crc::parse_crc_value(data, a, crc_type).map_err(Error::InvalidCrc)?;

            Ok(PrimaryBlock {
                flags,
                crc_type,
                destination,
                source,
                report_to,
                creation_timestamp,
                lifetime_ms,
                fragment_info,
            })
        })
    }
}
