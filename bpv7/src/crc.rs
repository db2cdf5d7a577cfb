/*!
CRC handling for BPv7 blocks, per RFC 9171 §4.2.1: a block may carry no
CRC, a CRC-16/X-25, or a CRC-32/Castagnoli checksum of its own encoding
(with the CRC field itself zeroed for the purpose of the computation).
*/
use thiserror::Error;

const X25: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);
const CASTAGNOLI: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid CRC type {0}")]
    InvalidType(u64),

    #[error("CRC value has unexpected length {0}")]
    InvalidLength(usize),

    #[error("block has a CRC value but no CRC type")]
    UnexpectedCrcValue,

    #[error("incorrect CRC value")]
    IncorrectCrc,

    #[error("CRC type is set but the CRC value is missing")]
    MissingCrc,

    #[error(transparent)]
    InvalidCbor(#[from] skua_cbor::decode::Error),
}

/// The CRC algorithm protecting a block, per RFC 9171 §4.2.1.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrcType {
    #[default]
    None,
    Crc16X25,
    Crc32Castagnoli,
}

impl CrcType {
    /// Width, in bytes, of the CRC value for this type. `0` for `None`.
    pub fn width(self) -> usize {
        match self {
            CrcType::None => 0,
            CrcType::Crc16X25 => 2,
            CrcType::Crc32Castagnoli => 4,
        }
    }
}

impl TryFrom<u64> for CrcType {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Crc16X25),
            2 => Ok(Self::Crc32Castagnoli),
            v => Err(Error::InvalidType(v)),
        }
    }
}

impl From<CrcType> for u64 {
    fn from(value: CrcType) -> Self {
        match value {
            CrcType::None => 0,
            CrcType::Crc16X25 => 1,
            CrcType::Crc32Castagnoli => 2,
        }
    }
}

impl skua_cbor::encode::ToCbor for CrcType {
    type Result = ();
    fn to_cbor(&self, encoder: &mut skua_cbor::encode::Encoder) -> Self::Result {
        encoder.emit_uint(u64::from(*self));
    }
}

impl skua_cbor::decode::FromCbor for CrcType {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (v, len) = skua_cbor::decode::read_uint(data)?;
        Ok((v.try_into()?, len))
    }
}

/// Computes the digest of `data[..crc_end]` as-if the `width`-byte window
/// at `crc_range` (relative to `data`) were all zeros, matching the
/// "zero-patched" CRC-over-encoded-bytes protocol required by §4.B. `data`
/// may extend past `crc_end` (the caller's buffer usually holds the rest
/// of the bundle too); only the block's own array extent is digested.
fn digest_with_zeroed_window(
    data: &[u8],
    crc_range: std::ops::Range<usize>,
    crc_end: usize,
    width: usize,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(crc_end);
    buf.extend_from_slice(&data[..crc_range.start]);
    buf.extend(std::iter::repeat_n(0u8, width));
    if crc_end > crc_range.end {
        buf.extend_from_slice(&data[crc_range.end..crc_end]);
    }
    buf
}

/// Parses and validates the trailing CRC field of a block already open
/// for reading via `array`. `data` is the buffer `array` was opened
/// against (which may extend past this block's own array — e.g. further
/// canonical blocks and the bundle's terminating `0xFF` — so CRC field
/// offsets can be resolved back to absolute positions); the digest itself
/// is bounded to the block's own array extent via `array.offset()`, which
/// lands exactly there since the CRC value is always the array's final
/// element.
pub(crate) fn parse_crc_value(
    data: &[u8],
    array: &mut skua_cbor::decode::Array,
    crc_type: CrcType,
) -> Result<(), Error> {
    if crc_type == CrcType::None {
        return Ok(());
    }
    let crc_range = array.parse_bytes()?;
    if crc_range.len() != crc_type.width() {
        return Err(Error::InvalidLength(crc_range.len()));
    }
    let crc_end = array.offset();
    let crc_value = &data[crc_range.clone()];
    let digest_input = digest_with_zeroed_window(data, crc_range, crc_end, crc_type.width());

    let ok = match crc_type {
        CrcType::None => unreachable!(),
        CrcType::Crc16X25 => {
            let want = u16::from_be_bytes(crc_value.try_into().unwrap());
            X25.checksum(&digest_input) == want
        }
        CrcType::Crc32Castagnoli => {
            let want = u32::from_be_bytes(crc_value.try_into().unwrap());
            CASTAGNOLI.checksum(&digest_input) == want
        }
    };
    if ok { Ok(()) } else { Err(Error::IncorrectCrc) }
}

/// Appends the real CRC value for `crc_type` to an already-built CBOR
/// array's bytes. Because a definite-length CBOR array has no terminator,
/// a byte string appended right after the array's declared element count
/// is satisfied reads back as that array's final element — see
/// [`skua_cbor::encode::Array::skip_value`].
pub(crate) fn append_crc_value(crc_type: CrcType, mut data: Vec<u8>) -> Vec<u8> {
    match crc_type {
        CrcType::None => {}
        CrcType::Crc16X25 => {
            data.push(0x42); // byte string header, length 2
            let digest = X25.checksum(&{
                let mut d = data.clone();
                d.extend_from_slice(&[0; 2]);
                d
            });
            data.extend_from_slice(&digest.to_be_bytes());
        }
        CrcType::Crc32Castagnoli => {
            data.push(0x44); // byte string header, length 4
            let digest = CASTAGNOLI.checksum(&{
                let mut d = data.clone();
                d.extend_from_slice(&[0; 4]);
                d
            });
            data.extend_from_slice(&digest.to_be_bytes());
        }
    }
    data
}
