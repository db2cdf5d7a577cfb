/*!
The primary error type for the `bpv7` crate.
*/
use thiserror::Error;

/// Errors that can occur while parsing or building a bundle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported bundle protocol version {0}, expected 7")]
    InvalidVersion(u64),

    #[error("bundle has no payload block")]
    MissingPayload,

    #[error("the final block of a bundle must be the payload block (type 1)")]
    PayloadNotFinal,

    #[error("bundle has more than one block numbered {0}")]
    DuplicateBlockNumber(u64),

    #[error("block number {0} is reserved and cannot be used by a {1:?} block")]
    InvalidBlockNumber(u64, crate::block_type::BlockType),

    #[error("invalid fragment info: offset {0} >= total length {1}")]
    InvalidFragmentInfo(u64, u64),

    #[error("invalid combination of bundle processing control flags")]
    InvalidFlags,

    #[error("payload of {0} bytes exceeds the configured maximum of {1} bytes")]
    BundleTooLarge(usize, usize),

    #[error("bundle is not well-formed: {0}")]
    Malformed(&'static str),

    #[error(transparent)]
    InvalidCrc(#[from] crate::crc::Error),

    #[error(transparent)]
    InvalidEid(#[from] crate::eid::EidError),

    #[error(transparent)]
    InvalidCbor(#[from] skua_cbor::decode::Error),

    #[error(transparent)]
    InvalidAdminRecord(#[from] crate::admin_record::AdminRecordError),

    #[error("failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Implemented by error types with an `InvalidField` catch-all variant, so
/// that [`CaptureFieldErr`] can attach a field name to an arbitrary
/// underlying error.
pub trait HasInvalidField: Sized {
    fn invalid_field(field: &'static str, source: Box<dyn std::error::Error + Send + Sync>)
    -> Self;
}

impl HasInvalidField for Error {
    fn invalid_field(
        field: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Error::InvalidField { field, source }
    }
}

/// Extension trait that tags a parse failure with the name of the field
/// being parsed when it occurred.
pub trait CaptureFieldErr<T> {
    fn map_field_err<E: HasInvalidField>(self, field: &'static str) -> Result<T, E>;
}

impl<T, Err> CaptureFieldErr<T> for Result<T, Err>
where
    Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn map_field_err<E: HasInvalidField>(self, field: &'static str) -> Result<T, E> {
        self.map_err(|e| E::invalid_field(field, e.into()))
    }
}
