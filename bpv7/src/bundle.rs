/*!
Bundle assembly, per §4.D: composing a bundle from a primary block plus
an ordered sequence of canonical blocks, and the reverse.

A bundle on the wire is a CBOR indefinite-length array (`0x9F` ...
`0xFF`) holding one primary block followed by one or more canonical
blocks, each a definite-length array in its own right. The wrapper's
indefinite length is the one exception to this crate's "definite arrays
only" rule, and it exists purely so a receiver doesn't need to know the
block count up front.
*/
use skua_cbor::decode;

use crate::admin_record::AdminRecord;
use crate::block::Block;
use crate::block_type::BlockType;
use crate::creation_timestamp::CreationTimestamp;
use crate::eid::Eid;
use crate::error::Error;
use crate::primary_block::PrimaryBlock;

/// The logical identity of a bundle: its source plus creation timestamp,
/// and — for a fragment — the offset that distinguishes it from its
/// siblings. Two bundles with the same id carry the same application
/// data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleId {
    pub source: Eid,
    pub creation_timestamp: CreationTimestamp,
    pub fragment_offset: Option<u64>,
}

impl From<&PrimaryBlock> for BundleId {
    fn from(pb: &PrimaryBlock) -> Self {
        BundleId {
            source: pb.source,
            creation_timestamp: pb.creation_timestamp,
            fragment_offset: pb.fragment_info.map(|(offset, _)| offset),
        }
    }
}

/// A fully decoded bundle: a primary block and its ordered canonical
/// blocks, plus the buffer they were decoded from (canonical blocks hold
/// ranges into it rather than owned copies).
#[derive(Debug, Clone)]
pub struct Bundle {
    pub primary: PrimaryBlock,
    pub blocks: Vec<Block>,
    bytes: Vec<u8>,
}

impl Bundle {
    pub fn id(&self) -> BundleId {
        BundleId::from(&self.primary)
    }

    /// The bundle's payload block — the block carrying the application
    /// data unit, by convention block type 1 and, per the round-trip
    /// invariant, the last block in the sequence.
    pub fn payload(&self) -> Option<&Block> {
        self.blocks
            .last()
            .filter(|b| b.block_type == BlockType::Payload)
    }

    pub fn payload_bytes(&self) -> Option<&[u8]> {
        self.payload().map(|b| b.content_bytes(&self.bytes))
    }

    /// Slices any block's content out of this bundle's buffer. Blocks
    /// hold ranges rather than owned bytes, so callers outside this
    /// module need the owning bundle to resolve them.
    pub fn block_bytes(&self, block: &Block) -> &[u8] {
        block.content_bytes(&self.bytes)
    }

    /// Slices a block's whole encoded extent out of this bundle's
    /// buffer, for splicing it unchanged into a re-assembled bundle.
    pub fn block_extent(&self, block: &Block) -> &[u8] {
        block.extent_bytes(&self.bytes)
    }

    /// Decodes the payload as an administrative record; only meaningful
    /// when `primary.is_admin_record()` is set.
    pub fn admin_record(&self) -> Result<AdminRecord, Error> {
        let bytes = self
            .payload_bytes()
            .ok_or(Error::MissingPayload)?;
        decode::parse::<AdminRecord>(bytes).map_err(Error::InvalidAdminRecord)
    }

    /// Finds the block of the given type, if any. A well-formed bundle
    /// has at most one of each extension block type.
    pub fn block_of_type(&self, ty: BlockType) -> Option<&Block> {
        self.blocks.iter().find(|b| b.block_type == ty)
    }
}

/// Encodes a primary block and an ordered sequence of already-encoded
/// canonical blocks into the bundle wire wrapper.
pub fn encode_bundle(primary: &PrimaryBlock, canonical_blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.push(0x9F);
    bytes.extend(primary.encode());
    for block in canonical_blocks {
        bytes.extend_from_slice(block);
    }
    bytes.push(0xFF);
    bytes
}

/// Parses the bundle wire wrapper, validating structural invariants from
/// §3.6: exactly one payload block, and it must be last.
pub fn decode_bundle(bytes: Vec<u8>) -> Result<Bundle, Error> {
    if bytes.first() != Some(&0x9F) {
        return Err(Error::Malformed("bundle must begin with 0x9F"));
    }
    let mut offset = 1;
    let (primary, len) = PrimaryBlock::parse(&bytes[offset..])?;
    offset += len;

    let mut blocks = Vec::new();
    let mut seen_numbers = std::collections::HashSet::new();
    loop {
        match bytes.get(offset) {
            Some(0xFF) => {
                offset += 1;
                break;
            }
            Some(_) => {
                let (block, len) = Block::parse(&bytes, offset)?;
                if !seen_numbers.insert(block.number) {
                    return Err(Error::DuplicateBlockNumber(block.number));
                }
                blocks.push(block);
                offset = block.extent.end;
            }
            None => return Err(Error::Malformed("bundle is missing its 0xFF terminator")),
        }
    }

    if blocks.is_empty() {
        return Err(Error::MissingPayload);
    }
    let last_is_payload = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.block_type == BlockType::Payload)
        .map(|(i, _)| i)
        .next_back();
    match last_is_payload {
        Some(i) if i == blocks.len() - 1 => {}
        Some(_) => return Err(Error::PayloadNotFinal),
        None => return Err(Error::MissingPayload),
    }

    if primary.is_fragment() && primary.fragment_info.is_none() {
        return Err(Error::Malformed("fragment flag set without fragment fields"));
    }

    Ok(Bundle {
        primary,
        blocks,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::crc::CrcType;
    use crate::creation_timestamp::CreationTimestamp;
    use crate::dtn_time::DtnTime;
    use crate::flags::{BlockFlags, BundleFlags};

    fn sample_primary() -> PrimaryBlock {
        PrimaryBlock {
            flags: BundleFlags::empty(),
            crc_type: CrcType::Crc16X25,
            destination: Eid::Ipn { node: 20, service: 2 },
            source: Eid::Ipn { node: 10, service: 1 },
            report_to: Eid::Null,
            creation_timestamp: CreationTimestamp {
                time: DtnTime(1000),
                sequence_number: 0,
            },
            lifetime_ms: 60_000,
            fragment_info: None,
        }
    }

    #[test]
    fn s1_simple_send_round_trips() {
        let primary = sample_primary();
        let payload = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            b"hello",
        );
        let wire = encode_bundle(&primary, &[payload]);
        assert_eq!(wire.first(), Some(&0x9F));
        assert_eq!(wire.last(), Some(&0xFF));

        let bundle = decode_bundle(wire).unwrap();
        assert_eq!(bundle.primary, primary);
        assert_eq!(bundle.payload_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn s2_corrupted_bundle_fails_crc() {
        let primary = sample_primary();
        let payload = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::Crc16X25,
            b"hello",
        );
        let mut wire = encode_bundle(&primary, &[payload]);
        let mid = wire.len() / 2;
        wire[mid] ^= 0xFF;

        assert!(decode_bundle(wire).is_err());
    }

    #[test]
    fn payload_must_be_last_block() {
        let primary = sample_primary();
        let payload = Block::encode(
            BlockType::Payload,
            1,
            BlockFlags::empty(),
            CrcType::None,
            b"hello",
        );
        let hop_count = Block::encode(
            BlockType::HopCount,
            2,
            BlockFlags::empty(),
            CrcType::None,
            &skua_cbor::encode::emit(&crate::hop_count::HopInfo { limit: 30, count: 0 }).0,
        );
        let wire = encode_bundle(&primary, &[payload, hop_count]);
        let err = decode_bundle(wire).unwrap_err();
        assert!(matches!(err, Error::PayloadNotFinal));
    }

    #[test]
    fn duplicate_block_numbers_are_rejected() {
        let primary = sample_primary();
        let a = Block::encode(BlockType::HopCount, 2, BlockFlags::empty(), CrcType::None, &[0x80]);
        let b = Block::encode(BlockType::PreviousNode, 2, BlockFlags::empty(), CrcType::None, &[0x80]);
        let payload = Block::encode(BlockType::Payload, 1, BlockFlags::empty(), CrcType::None, b"x");
        let wire = encode_bundle(&primary, &[a, b, payload]);
        let err = decode_bundle(wire).unwrap_err();
        assert!(matches!(err, Error::DuplicateBlockNumber(2)));
    }
}
