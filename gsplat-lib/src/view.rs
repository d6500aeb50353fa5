use crate::error::SplatError;

/// Scalar readable from little-endian bytes.
pub trait LeScalar: Sized {
    const WIDTH: usize;
    fn from_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_le_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl LeScalar for $ty {
            const WIDTH: usize = size_of::<$ty>();

            #[inline]
            fn from_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..size_of::<$ty>()]);
                <$ty>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_le_scalar!(u8, i8, u16, i16, u32, i32, f32, f64);

/// Bounds-checked typed reader over a byte buffer, anchored at a base offset.
///
/// All reads are little-endian: the splat containers this crate consumes are
/// written by little-endian exporters and carry no byte-order switch.
#[derive(Debug, Clone, Copy)]
pub struct BinaryView<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> BinaryView<'a> {
    #[inline]
    pub fn new(buffer: &'a [u8], offset: usize) -> Self {
        BinaryView { buffer, offset }
    }

    /// Bytes available past the base offset.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a `T` at `index` bytes past the base offset.
    #[inline]
    pub fn get<T: LeScalar>(&self, index: usize) -> Result<T, SplatError> {
        let span = self
            .offset
            .checked_add(index)
            .and_then(|start| start.checked_add(T::WIDTH).map(|end| (start, end)));
        let (start, end) = match span {
            Some(span) => span,
            None => {
                return Err(SplatError::TruncatedInput {
                    offset: index,
                    need: T::WIDTH,
                    len: self.buffer.len(),
                })
            }
        };
        match self.buffer.get(start..end) {
            Some(bytes) => Ok(T::from_le(bytes)),
            None => Err(SplatError::TruncatedInput {
                offset: start,
                need: T::WIDTH,
                len: self.buffer.len(),
            }),
        }
    }
}
