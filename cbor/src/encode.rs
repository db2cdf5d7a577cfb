/*!
A streaming encoder for building canonical CBOR byte strings.

The two pieces most callers need are the [`ToCbor`] trait, implemented
for primitives and for the small set of BPv7 wire types, and the
[`Encoder`] struct, used directly when building arrays by hand (blocks,
admin records).
*/
use core::ops::Range;

/// A trait for types that can be encoded into CBOR.
pub trait ToCbor {
    /// The result of encoding. Most types return `()`; byte/text strings
    /// return the [`Range`] of their content within the output buffer, so
    /// callers can come back and CRC or re-read that span.
    type Result;

    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result;
}

/// A stateful, append-only CBOR byte buffer.
#[derive(Default)]
pub struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    /// Current length of the encoded output so far.
    #[inline]
    pub fn offset(&self) -> usize {
        self.data.len()
    }

    fn push_uint_minor(&mut self, major: u8, val: u64) {
        const U8_MAX: u64 = (u8::MAX as u64) + 1;
        const U16_MAX: u64 = (u16::MAX as u64) + 1;
        const U32_MAX: u64 = (u32::MAX as u64) + 1;

        match val {
            0..24 => self.data.push((major << 5) | (val as u8)),
            24..U8_MAX => {
                self.data.push((major << 5) | 24u8);
                self.data.push(val as u8);
            }
            U8_MAX..U16_MAX => {
                self.data.push((major << 5) | 25u8);
                self.data.extend((val as u16).to_be_bytes());
            }
            U16_MAX..U32_MAX => {
                self.data.push((major << 5) | 26u8);
                self.data.extend((val as u32).to_be_bytes());
            }
            _ => {
                self.data.push((major << 5) | 27u8);
                self.data.extend(val.to_be_bytes());
            }
        }
    }

    /// Emits an unsigned integer (CBOR major type 0).
    pub fn emit_uint(&mut self, val: u64) {
        self.push_uint_minor(0, val);
    }

    /// Emits a signed integer (CBOR major type 0 or 1).
    pub fn emit_int(&mut self, val: i64) {
        if val >= 0 {
            self.push_uint_minor(0, val as u64);
        } else {
            self.push_uint_minor(1, val.unsigned_abs() - 1);
        }
    }

    /// Emits a definite-length byte string and returns the [`Range`] of its
    /// content (excluding the length header) within the output buffer.
    pub fn emit_bytes(&mut self, value: &[u8]) -> Range<usize> {
        self.push_uint_minor(2, value.len() as u64);
        let start = self.offset();
        self.data.extend_from_slice(value);
        start..self.offset()
    }

    /// Reserves a definite-length byte string slot of exactly `len` bytes,
    /// filled with zeros, and returns its content range. Used for the
    /// BPv7 CRC backfill protocol: the caller writes the placeholder now,
    /// finishes accumulating a checksum, then overwrites the slot via
    /// [`Encoder::patch`].
    pub fn reserve_bytes(&mut self, len: usize) -> Range<usize> {
        self.push_uint_minor(2, len as u64);
        let start = self.offset();
        self.data.resize(start + len, 0);
        start..self.offset()
    }

    /// Overwrites a previously-reserved byte range with its final value.
    /// `range` must have come from [`Encoder::reserve_bytes`] on this
    /// same encoder, and `value.len()` must equal `range.len()`.
    pub fn patch(&mut self, range: Range<usize>, value: &[u8]) {
        assert_eq!(range.len(), value.len(), "CRC patch length mismatch");
        self.data[range].copy_from_slice(value);
    }

    /// Emits a definite-length UTF-8 text string.
    pub fn emit_text(&mut self, value: &str) -> Range<usize> {
        self.push_uint_minor(3, value.len() as u64);
        let start = self.offset();
        self.data.extend_from_slice(value.as_bytes());
        start..self.offset()
    }

    /// Appends raw, already-encoded CBOR bytes verbatim (used to splice a
    /// block's untouched wire bytes back into a re-assembled bundle).
    pub fn emit_raw(&mut self, bytes: &[u8]) -> Range<usize> {
        let start = self.offset();
        self.data.extend_from_slice(bytes);
        start..self.offset()
    }

    /// Marks the start of an indefinite-length array (CBOR major type 4,
    /// minor 31). Used only for the outer bundle wrapper; every block
    /// inside is a definite-length array written with [`Encoder::emit_array`].
    pub fn begin_indefinite_array(&mut self) {
        self.data.push((4 << 5) | 31);
    }

    /// Closes an indefinite-length array or byte/text stream.
    pub fn end_indefinite(&mut self) {
        self.data.push(0xFF);
    }

    /// Emits a value implementing [`ToCbor`].
    pub fn emit<T: ToCbor + ?Sized>(&mut self, value: &T) -> T::Result {
        value.to_cbor(self)
    }

    /// Emits a definite-length CBOR array. The closure receives an
    /// [`Array`] helper used to emit each element in order.
    pub fn emit_array<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.push_uint_minor(4, count as u64);
        let mut a = Array {
            encoder: self,
            count,
            idx: 0,
        };
        f(&mut a);
        a.finish();
    }
}

/// A helper for emitting the elements of a definite-length CBOR array in
/// order. Obtained from [`Encoder::emit_array`].
pub struct Array<'a> {
    encoder: &'a mut Encoder,
    count: usize,
    idx: usize,
}

impl<'a> Array<'a> {
    fn advance(&mut self) -> &mut Encoder {
        self.idx += 1;
        assert!(
            self.idx <= self.count,
            "too many items emitted into a {}-element array",
            self.count
        );
        self.encoder
    }

    fn finish(self) {
        assert_eq!(
            self.idx, self.count,
            "array short of items: wrote {}, declared {}",
            self.idx, self.count
        );
    }

    /// Emits a value implementing [`ToCbor`] as the next array element.
    pub fn emit<T: ToCbor + ?Sized>(&mut self, value: &T) -> T::Result {
        self.advance().emit(value)
    }

    /// Reserves a slot without writing any value bytes. Used only for the
    /// trailing CRC field of a primary/canonical block: because a
    /// definite-length array has no closing marker, bytes appended
    /// immediately after this call (by [`crate::decode`]'s caller or,
    /// symmetrically, by `hardy`-style CRC backfill code) are read back as
    /// this array element.
    pub fn skip_value(&mut self) {
        self.advance();
    }

    /// Reserves a zero-filled byte string slot, to be patched later.
    pub fn reserve_bytes(&mut self, len: usize) -> Range<usize> {
        self.advance().reserve_bytes(len)
    }

    /// Overwrites a range previously returned by [`Array::reserve_bytes`]
    /// or [`Encoder::reserve_bytes`].
    pub fn patch(&mut self, range: Range<usize>, value: &[u8]) {
        self.encoder.patch(range, value)
    }

    /// Emits a nested definite-length array.
    pub fn emit_array<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.advance().emit_array(count, f)
    }
}

/// Encodes a single value into a fresh `Vec<u8>`.
pub fn emit<T: ToCbor + ?Sized>(value: &T) -> (Vec<u8>, T::Result) {
    let mut e = Encoder::new();
    let r = e.emit(value);
    (e.build(), r)
}

macro_rules! impl_uint_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                type Result = ();
                fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                    encoder.emit_uint(*self as u64);
                }
            }
        )*
    };
}
impl_uint_to_cbor!(u8, u16, u32, u64, usize);

macro_rules! impl_int_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                type Result = ();
                fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                    encoder.emit_int(*self as i64);
                }
            }
        )*
    };
}
impl_int_to_cbor!(i8, i16, i32, i64, isize);

impl ToCbor for bool {
    type Result = ();
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.data.push((7 << 5) | if *self { 21 } else { 20 });
    }
}

impl ToCbor for str {
    type Result = Range<usize>;
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_text(self)
    }
}

impl ToCbor for String {
    type Result = Range<usize>;
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_text(self)
    }
}

impl<T> ToCbor for &T
where
    T: ToCbor + ?Sized,
{
    type Result = T::Result;
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        (**self).to_cbor(encoder)
    }
}

/// Wraps a byte slice so it is encoded as a CBOR byte string rather than
/// (as a bare `&[u8]` would be, absent a blanket slice impl here) an array
/// of integers.
pub struct Bytes<'a>(pub &'a [u8]);

impl ToCbor for Bytes<'_> {
    type Result = Range<usize>;
    fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
        encoder.emit_bytes(self.0)
    }
}

macro_rules! impl_tuple_to_cbor {
    ($len:expr; $( ($ty:ident, $idx:tt) ),+) => {
        impl<$($ty: ToCbor),+> ToCbor for ($($ty,)+) {
            type Result = ();
            fn to_cbor(&self, encoder: &mut Encoder) -> Self::Result {
                encoder.emit_array($len, |a| {
                    $( a.emit(&self.$idx); )+
                });
            }
        }
    };
}
impl_tuple_to_cbor!(2; (T0, 0), (T1, 1));
impl_tuple_to_cbor!(3; (T0, 0), (T1, 1), (T2, 2));
impl_tuple_to_cbor!(4; (T0, 0), (T1, 1), (T2, 2), (T3, 3));
