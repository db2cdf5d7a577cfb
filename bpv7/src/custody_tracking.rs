/*!
The custody-tracking extension block, per §3.4's reassignment of block
type 11 (displacing the IANA block integrity block, which this engine
never processes — see [`crate::block_type`]): its content is `[current_custodian]`,
rewritten to name the local node by every forwarding hop per §4.F step 3.
*/
use skua_cbor::decode::{self, Array, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

use crate::eid::{Eid, EidError};

/// The inner content of a custody-tracking block: the endpoint ID of the
/// node currently holding custody of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodyTracking {
    pub current_custodian: Eid,
}

impl ToCbor for CustodyTracking {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(1, |a| {
            a.emit(&self.current_custodian);
        });
    }
}

impl FromCbor for CustodyTracking {
    type Error = EidError;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        let (current_custodian, len) =
            decode::parse_array(data, |a: &mut Array| a.parse::<Eid>())?;
        Ok((Self { current_custodian }, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let ct = CustodyTracking {
            current_custodian: Eid::Ipn { node: 5, service: 0 },
        };
        let (bytes, _) = skua_cbor::encode::emit(&ct);
        let (decoded, len) = CustodyTracking::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, ct);
        assert_eq!(len, bytes.len());
    }
}
