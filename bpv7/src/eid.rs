/*!
Endpoint identifiers, per RFC 9171 §4.2.5.

This engine only speaks two endpoint forms: the `ipn` scheme restricted to
a two-integer `node.service` tuple (no three-integer allocator-number
form), and the single well-known `dtn:none` identity used for anonymous
sources. Every other URI this scheme or `dtn` could in principle encode
(service-name `dtn` endpoints, `ipn` allocator numbers) is out of scope;
bundles addressed to or from them are rejected at parse time rather than
silently misrouted.
*/
use core::fmt;
use core::str::FromStr;
use thiserror::Error;

use skua_cbor::decode::{self, Array, FromCbor};
use skua_cbor::encode::{Encoder, ToCbor};

#[derive(Error, Debug)]
pub enum EidError {
    #[error("unsupported URI scheme code {0}")]
    UnsupportedScheme(u64),

    #[error("dtn scheme-specific part must be the integer 0 (dtn:none)")]
    InvalidDtn,

    #[error("eid text {0:?} is not a recognised dtn: or ipn: URI")]
    UnrecognisedText(String),

    #[error(transparent)]
    InvalidCbor(#[from] decode::Error),
}

/// A bundle endpoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Eid {
    /// `dtn:none`, the identity used by anonymous or null sources.
    Null,
    /// `ipn:<node>.<service>`.
    Ipn { node: u64, service: u64 },
}

const SCHEME_DTN: u64 = 1;
const SCHEME_IPN: u64 = 2;

impl Eid {
    pub fn is_null(&self) -> bool {
        matches!(self, Eid::Null)
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eid::Null => write!(f, "dtn:none"),
            Eid::Ipn { node, service } => write!(f, "ipn:{node}.{service}"),
        }
    }
}

impl FromStr for Eid {
    type Err = EidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "dtn:none" {
            return Ok(Eid::Null);
        }
        if let Some(rest) = s.strip_prefix("ipn:") {
            let (node, service) = rest
                .split_once('.')
                .ok_or_else(|| EidError::UnrecognisedText(s.to_string()))?;
            let node: u64 = node
                .parse()
                .map_err(|_| EidError::UnrecognisedText(s.to_string()))?;
            let service: u64 = service
                .parse()
                .map_err(|_| EidError::UnrecognisedText(s.to_string()))?;
            return Ok(Eid::Ipn { node, service });
        }
        Err(EidError::UnrecognisedText(s.to_string()))
    }
}

impl ToCbor for Eid {
    type Result = ();

    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Eid::Null => encoder.emit_array(2, |a| {
                a.emit(&SCHEME_DTN);
                a.emit(&0u64);
            }),
            Eid::Ipn { node, service } => encoder.emit_array(2, |a| {
                a.emit(&SCHEME_IPN);
                a.emit_array(2, |a| {
                    a.emit(node);
                    a.emit(service);
                });
            }),
        }
    }
}

impl FromCbor for Eid {
    type Error = EidError;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        decode::parse_array(data, |a: &mut Array| {
            let scheme: u64 = a.parse()?;
            match scheme {
                SCHEME_DTN => {
                    let ssp: u64 = a.parse()?;
                    if ssp != 0 {
                        return Err(EidError::InvalidDtn);
                    }
                    Ok(Eid::Null)
                }
                SCHEME_IPN => {
                    let (node, service): (u64, u64) = a.parse()?;
                    Ok(Eid::Ipn { node, service })
                }
                other => Err(EidError::UnsupportedScheme(other)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_eid_display_round_trips() {
        assert_eq!(Eid::Null.to_string(), "dtn:none");
        assert_eq!("dtn:none".parse::<Eid>().unwrap(), Eid::Null);
    }

    #[test]
    fn ipn_eid_display_round_trips() {
        let eid = Eid::Ipn { node: 5, service: 7 };
        assert_eq!(eid.to_string(), "ipn:5.7");
        assert_eq!("ipn:5.7".parse::<Eid>().unwrap(), eid);
    }

    #[test]
    fn ipn_eid_cbor_round_trips() {
        let eid = Eid::Ipn { node: 12, service: 34 };
        let (bytes, _) = skua_cbor::encode::emit(&eid);
        let (decoded, len) = Eid::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, eid);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn null_eid_cbor_round_trips() {
        let (bytes, _) = skua_cbor::encode::emit(&Eid::Null);
        let (decoded, len) = Eid::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, Eid::Null);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let (bytes, _) = skua_cbor::encode::emit(&(3u64, 0u64));
        let err = Eid::from_cbor(&bytes).unwrap_err();
        assert!(matches!(err, EidError::UnsupportedScheme(3)));
    }
}
