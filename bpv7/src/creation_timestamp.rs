/*!
The bundle creation timestamp, per RFC 9171 §4.2.7: a creation time paired
with a sequence number, used together with the source EID to form a
bundle's logical identity.
*/
use skua_cbor::decode::{self, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

use crate::dtn_time::DtnTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct CreationTimestamp {
    pub time: DtnTime,
    pub sequence_number: u64,
}

impl ToCbor for CreationTimestamp {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(2, |a| {
            a.emit(&self.time);
            a.emit(&self.sequence_number);
        });
    }
}

impl FromCbor for CreationTimestamp {
    type Error = decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let ((time, sequence_number), len) = decode::parse_array(data, |a| {
            Ok::<_, decode::Error>((a.parse::<DtnTime>()?, a.parse::<u64>()?))
        })?;
        Ok((
            Self {
                time,
                sequence_number,
            },
            len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ts = CreationTimestamp {
            time: DtnTime(1_000),
            sequence_number: 3,
        };
        let (bytes, _) = skua_cbor::encode::emit(&ts);
        let (decoded, len) = CreationTimestamp::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, ts);
        assert_eq!(len, bytes.len());
    }
}
