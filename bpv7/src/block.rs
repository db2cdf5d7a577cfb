/*!
Canonical (non-primary) blocks, per RFC 9171 §4.3 and §3.3/§3.4.

A canonical block's wire form is a 5-element CBOR array (6 with a CRC):
`[block_type, block_num, processing_flags, crc_type, content, crc_value?]`,
where `content` is a CBOR byte string wrapping either raw payload bytes
(block type 1) or type-specific inner CBOR. The decoder keeps the
content's byte range in the *original* buffer rather than copying it out,
so the cache can re-emit an unmodified block without re-encoding it and
can still CRC-check or reinterpret it lazily.
*/
use core::ops::Range;

use skua_cbor::decode::{self, Array, FromCbor};
use skua_cbor::encode::{Bytes, Encoder, ToCbor};

use crate::block_type::BlockType;
use crate::crc::{self, CrcType};
use crate::error::{CaptureFieldErr, Error, HasInvalidField};
use crate::flags::BlockFlags;

/// Block number 0 is reserved for the primary block; it is never valid on
/// a canonical block.
pub const RESERVED_BLOCK_NUMBER: u64 = 0;
/// Block number 1 is conventionally used for the payload block, though
/// nothing requires it — the payload block is identified by `block_type`.
pub const PAYLOAD_BLOCK_NUMBER: u64 = 1;

/// A canonical block, with its content held as a byte range into the
/// buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    pub number: u64,
    pub flags: BlockFlags,
    pub crc_type: CrcType,
    /// Content's byte range (the byte-string's payload, not its header)
    /// within the buffer the block was decoded from.
    pub content: Range<usize>,
    /// The whole block's byte range (header through CRC, if any) within
    /// that same buffer — the span to splice verbatim when forwarding the
    /// block unchanged.
    pub extent: Range<usize>,
}

impl Block {
    /// Slices this block's content out of the buffer it was decoded from.
    pub fn content_bytes<'a>(&self, bundle_bytes: &'a [u8]) -> &'a [u8] {
        &bundle_bytes[self.content.clone()]
    }

    /// Slices this block's whole encoded extent out of the buffer it was
    /// decoded from, for verbatim re-emission.
    pub fn extent_bytes<'a>(&self, bundle_bytes: &'a [u8]) -> &'a [u8] {
        &bundle_bytes[self.extent.clone()]
    }
}

impl Block {
    /// Builds a new block from a logical type, number, flags, CRC choice,
    /// and already-encoded inner content bytes, ready for the bundle
    /// assembler to splice into the outer indefinite-length array.
    pub fn encode(
        block_type: BlockType,
        number: u64,
        flags: BlockFlags,
        crc_type: CrcType,
        content: &[u8],
    ) -> Vec<u8> {
        let mut encoder = Encoder::new();
        let field_count = if crc_type == CrcType::None { 5 } else { 6 };
        encoder.emit_array(field_count, |a| {
            a.emit(&block_type);
            a.emit(&number);
            a.emit(&flags);
            a.emit(&crc_type);
            a.emit(&Bytes(content));
            if crc_type != CrcType::None {
                a.skip_value();
            }
        });
        crc::append_crc_value(crc_type, encoder.build())
    }

    /// Parses one canonical block starting at `data[offset..]`, where
    /// `data` is the whole bundle buffer (so content/extent ranges land
    /// as absolute offsets). Returns the block and the number of bytes
    /// consumed.
    pub fn parse(data: &[u8], offset: usize) -> Result<(Self, usize), Error> {
        let slice = &data[offset..];
        let (mut block, len) = decode::parse_array(slice, |a: &mut Array| {
            let block_type: BlockType = a
                .parse::<BlockType>()
                .map_field_err::<Error>("block_type")?;
            let number: u64 = a.parse::<u64>().map_field_err::<Error>("block_num")?;
            let flags: BlockFlags = a
                .parse::<BlockFlags>()
                .map_field_err::<Error>("processing_flags")?;
            let crc_type: CrcType = a.parse::<CrcType>().map_err(Error::InvalidCrc)?;
            let content = a.parse_bytes().map_err(Error::InvalidCbor)?;
            crc::parse_crc_value(slice, a, crc_type).map_err(Error::InvalidCrc)?;

            if number == RESERVED_BLOCK_NUMBER {
                return Err(Error::InvalidBlockNumber(number, block_type));
            }

            Ok(Block {
                block_type,
                number,
                flags,
                crc_type,
                content,
                extent: 0..0, // patched below, once `len` is known
            })
        })?;

        block.content = offset + block.content.start..offset + block.content.end;
        block.extent = offset..offset + len;
        Ok((block, len))
    }
}
