/*!
Administrative record payloads, per §3.5: an array of two elements,
`(record_type, record_body)`, carried as the content of a payload block
whose bundle has the `is_admin_record` flag set.

The only record type this engine originates or consumes is the custody
acknowledgement: a batch of accepted sequence numbers for one flow
source, built by the custody acknowledgement machine (`skua-bpa`) and
decoded here on the receiving side.
*/
use skua_cbor::decode::{self, Array, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

use crate::eid::{Eid, EidError};

const RECORD_TYPE_CUSTODY_ACKNOWLEDGEMENT: u64 = 4;

/// The maximum number of sequence numbers a single custody acknowledgement
/// record may batch, per §3.5.
pub const MAX_SEQS_PER_ACK: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum AdminRecordError {
    #[error("unrecognised administrative record type {0}")]
    UnsupportedType(u64),

    #[error("custody acknowledgement carries {0} sequence numbers, more than the {max} allowed", max = MAX_SEQS_PER_ACK)]
    TooManySeqs(usize),

    #[error(transparent)]
    InvalidEid(#[from] EidError),

    #[error(transparent)]
    InvalidCbor(#[from] decode::Error),
}

/// The body of a custody acknowledgement record: `(flow_source_eid,
/// [seq_num, ...])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyAcknowledgement {
    pub source: Eid,
    pub sequence_numbers: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRecord {
    CustodyAcknowledgement(CustodyAcknowledgement),
    Unrecognised(u64),
}

impl ToCbor for CustodyAcknowledgement {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(2, |a| {
            a.emit(&self.source);
            a.emit(&self.sequence_numbers);
        });
    }
}

impl FromCbor for CustodyAcknowledgement {
    type Error = AdminRecordError;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let ((source, sequence_numbers), len) = decode::parse_array(data, |a: &mut Array| {
            Ok::<_, AdminRecordError>((a.parse::<Eid>()?, a.parse::<Vec<u64>>()?))
        })?;
        if sequence_numbers.len() > MAX_SEQS_PER_ACK {
            return Err(AdminRecordError::TooManySeqs(sequence_numbers.len()));
        }
        Ok((
            Self {
                source,
                sequence_numbers,
            },
            len,
        ))
    }
}

impl ToCbor for AdminRecord {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(2, |a| match self {
            AdminRecord::CustodyAcknowledgement(ack) => {
                a.emit(&RECORD_TYPE_CUSTODY_ACKNOWLEDGEMENT);
                a.emit(ack);
            }
            AdminRecord::Unrecognised(ty) => {
                a.emit(ty);
                a.skip_value();
            }
        });
    }
}

impl FromCbor for AdminRecord {
    type Error = AdminRecordError;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        decode::parse_array(data, |a: &mut Array| {
            let record_type: u64 = a.parse()?;
            match record_type {
                RECORD_TYPE_CUSTODY_ACKNOWLEDGEMENT => {
                    let ack = a.parse::<CustodyAcknowledgement>()?;
                    Ok(AdminRecord::CustodyAcknowledgement(ack))
                }
                other => Err(AdminRecordError::UnsupportedType(other)),
            }
        })
    }
}

impl FromCbor for Vec<u64> {
    type Error = decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (count, header_len) = decode::read_array_header(data)?;
        let count = count.ok_or(decode::Error::IncorrectType("a definite-length array", 4))?;
        let mut out = Vec::with_capacity(count);
        let mut offset = header_len;
        for _ in 0..count {
            let (v, len) = decode::read_uint(&data[offset..])?;
            out.push(v);
            offset += len;
        }
        Ok((out, offset))
    }
}

impl ToCbor for Vec<u64> {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(self.len(), |a| {
            for v in self {
                a.emit(v);
            }
        });
    }
}
