/*!
A decoder for the CBOR subset [`crate::encode`] produces.

Decoding is driven by the [`FromCbor`] trait: every BPv7 wire type
implements it, and [`Array`] is the cursor used to pull fixed-order
fields out of a definite-length CBOR array one at a time.
*/
use core::ops::Range;
use thiserror::Error;

/// Errors that can occur while decoding CBOR.
#[derive(Error, Debug)]
pub enum Error {
    #[error("need at least {0} more byte(s) to decode a value")]
    NeedMoreData(usize),

    #[error("invalid minor-type value {0}")]
    InvalidMinorValue(u8),

    #[error("expecting {0}, found major type {1}")]
    IncorrectType(&'static str, u8),

    #[error("array declared {0} element(s) but {1} were read")]
    WrongArrayLength(usize, usize),

    #[error("additional unread items in sequence")]
    AdditionalItems,

    #[error("indefinite-length array is missing its terminating break")]
    MissingBreak,

    #[error("integer {0} out of range for target type")]
    IntegerOutOfRange(u64),

    #[error(transparent)]
    TryFromIntError(#[from] core::num::TryFromIntError),

    #[error(transparent)]
    Utf8(#[from] core::str::Utf8Error),
}

/// A type that can be decoded from the front of a CBOR byte slice.
///
/// On success, returns the decoded value and the number of bytes of
/// `data` it consumed.
pub trait FromCbor: Sized {
    type Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error>;
}

fn byte(data: &[u8], offset: usize) -> Result<u8, Error> {
    data.get(offset).copied().ok_or(Error::NeedMoreData(1))
}

fn to_array<const N: usize>(data: &[u8]) -> Result<[u8; N], Error> {
    if data.len() < N {
        Err(Error::NeedMoreData(N - data.len()))
    } else {
        Ok(data[..N].try_into().unwrap())
    }
}

/// Reads a CBOR head's minor-value payload (the "additional information"
/// that follows a major/minor byte whose minor nibble is 24..27), i.e. the
/// argument for unsigned integers, byte/text string lengths, and array
/// counts. `minor` is the low 5 bits of the head byte.
fn read_uint_minor(minor: u8, data: &[u8]) -> Result<(u64, usize), Error> {
    match minor {
        0..24 => Ok((minor as u64, 0)),
        24 => Ok((byte(data, 0)? as u64, 1)),
        25 => Ok((u16::from_be_bytes(to_array(data)?) as u64, 2)),
        26 => Ok((u32::from_be_bytes(to_array(data)?) as u64, 4)),
        27 => Ok((u64::from_be_bytes(to_array(data)?), 8)),
        _ => Err(Error::InvalidMinorValue(minor)),
    }
}

/// Reads one CBOR head (major type + minor argument) at the front of
/// `data`. Returns `(major, minor, arg, header_len)`.
fn read_head(data: &[u8]) -> Result<(u8, u8, u64, usize), Error> {
    let head = byte(data, 0)?;
    let major = head >> 5;
    let minor = head & 0x1F;
    let (arg, arg_len) = read_uint_minor(minor, &data[1..])?;
    Ok((major, minor, arg, 1 + arg_len))
}

/// Decodes a definite-length unsigned integer (CBOR major type 0).
pub fn read_uint(data: &[u8]) -> Result<(u64, usize), Error> {
    let (major, _minor, arg, len) = read_head(data)?;
    if major != 0 {
        return Err(Error::IncorrectType("an unsigned integer", major));
    }
    Ok((arg, len))
}

/// Decodes a signed integer (CBOR major type 0 or 1).
pub fn read_int(data: &[u8]) -> Result<(i64, usize), Error> {
    let (major, _minor, arg, len) = read_head(data)?;
    match major {
        0 => Ok((i64::try_from(arg)?, len)),
        1 => Ok((-1i64 - i64::try_from(arg)?, len)),
        _ => Err(Error::IncorrectType("an integer", major)),
    }
}

/// Decodes a definite-length byte string (CBOR major type 2), returning
/// the absolute byte range of its content within `data` and the total
/// number of bytes (header + content) consumed.
pub fn read_bytes(data: &[u8]) -> Result<(Range<usize>, usize), Error> {
    let (major, minor, arg, header_len) = read_head(data)?;
    if major != 2 || minor == 31 {
        return Err(Error::IncorrectType("a definite-length byte string", major));
    }
    let len = usize::try_from(arg)?;
    if data.len() < header_len + len {
        return Err(Error::NeedMoreData(header_len + len - data.len()));
    }
    Ok((header_len..header_len + len, header_len + len))
}

/// Decodes a definite-length UTF-8 text string (CBOR major type 3).
pub fn read_text(data: &[u8]) -> Result<(&str, usize), Error> {
    let (major, minor, arg, header_len) = read_head(data)?;
    if major != 3 || minor == 31 {
        return Err(Error::IncorrectType("a definite-length text string", major));
    }
    let len = usize::try_from(arg)?;
    if data.len() < header_len + len {
        return Err(Error::NeedMoreData(header_len + len - data.len()));
    }
    let s = core::str::from_utf8(&data[header_len..header_len + len])?;
    Ok((s, header_len + len))
}

/// The declared length of a CBOR array header: `Some(n)` for a
/// definite-length array of `n` elements, `None` for the indefinite-length
/// form (major type 4, minor 31 — only used for the outer bundle wrapper).
pub fn read_array_header(data: &[u8]) -> Result<(Option<usize>, usize), Error> {
    let head = byte(data, 0)?;
    if head >> 5 != 4 {
        return Err(Error::IncorrectType("an array", head >> 5));
    }
    let minor = head & 0x1F;
    if minor == 31 {
        return Ok((None, 1));
    }
    let (arg, arg_len) = read_uint_minor(minor, &data[1..])?;
    Ok((Some(usize::try_from(arg)?), 1 + arg_len))
}

/// `true` if the next byte in `data` is the CBOR "break" marker (`0xFF`)
/// that terminates an indefinite-length array.
pub fn is_break(data: &[u8]) -> Result<bool, Error> {
    Ok(byte(data, 0)? == 0xFF)
}

/// A cursor for reading the fixed-order elements of a definite-length
/// CBOR array. Obtained from [`parse_array`].
pub struct Array<'a> {
    data: &'a [u8],
    offset: usize,
    count: usize,
    idx: usize,
}

impl<'a> Array<'a> {
    /// Offset, from the start of the array's first element, that has been
    /// consumed so far. Used by callers (e.g. the CRC check) that need to
    /// know where a field landed within the overall block bytes.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    fn advance(&mut self, consumed: usize) -> Result<(), Error> {
        if self.idx >= self.count {
            return Err(Error::WrongArrayLength(self.count, self.idx + 1));
        }
        self.idx += 1;
        self.offset += consumed;
        Ok(())
    }

    /// Parses the next element as `T`.
    pub fn parse<T>(&mut self) -> Result<T, T::Error>
    where
        T: FromCbor,
        T::Error: From<Error>,
    {
        let (v, len) = T::from_cbor(self.remaining())?;
        self.advance(len)?;
        Ok(v)
    }

    /// Reads the next element as a definite-length byte string, returning
    /// its content range in the *original* buffer passed to [`parse_array`].
    pub fn parse_bytes(&mut self) -> Result<Range<usize>, Error> {
        let (r, len) = read_bytes(self.remaining())?;
        let base = self.offset;
        self.advance(len)?;
        Ok(base + r.start..base + r.end)
    }

    /// Skips the next element without decoding it (used when a field is
    /// legitimately absent, i.e. the encoder's `skip_value`/CRC-patch
    /// convention: nothing to skip here, the caller stops reading).
    pub fn at_end(&self) -> bool {
        self.idx == self.count
    }
}

/// Parses a definite-length CBOR array and hands a cursor to `f`.
///
/// `f` is expected to consume exactly the array's declared element count;
/// [`Array::at_end`] can be used to confirm this. Returns the closure's
/// result and the total number of bytes consumed (header + all elements).
pub fn parse_array<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array) -> Result<T, E>,
    E: From<Error>,
{
    let (count, header_len) = read_array_header(data)?;
    let count = count.ok_or(Error::IncorrectType("a definite-length array", 4))?;
    let mut a = Array {
        data,
        offset: header_len,
        count,
        idx: 0,
    };
    let r = f(&mut a)?;
    if a.idx != a.count {
        return Err(Error::WrongArrayLength(a.count, a.idx).into());
    }
    Ok((r, a.offset))
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                type Error = Error;
                fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
                    let (v, len) = read_uint(data)?;
                    Ok((v.try_into().map_err(|_| Error::IntegerOutOfRange(v))?, len))
                }
            }
        )*
    };
}
impl_uint_from_cbor!(u8, u16, u32, usize);

impl FromCbor for u64 {
    type Error = Error;
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        read_uint(data)
    }
}

impl FromCbor for i64 {
    type Error = Error;
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        read_int(data)
    }
}

/// A convenience function mirroring [`FromCbor::from_cbor`] but discarding
/// the consumed-length part of the result.
pub fn parse<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
{
    T::from_cbor(data).map(|(v, _)| v)
}

macro_rules! impl_tuple_from_cbor {
    ($count:expr; $( ($ty:ident, $idx:tt) ),+) => {
        impl<$($ty),+> FromCbor for ($($ty,)+)
        where
            $($ty: FromCbor<Error = Error>,)+
        {
            type Error = Error;
            fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
                parse_array(data, |a| {
                    Ok::<_, Error>(( $( a.parse::<$ty>()?, )+ ))
                })
            }
        }
    };
}
impl_tuple_from_cbor!(2; (T0, 0), (T1, 1));
impl_tuple_from_cbor!(3; (T0, 0), (T1, 1), (T2, 2));
impl_tuple_from_cbor!(4; (T0, 0), (T1, 1), (T2, 2), (T3, 3));
