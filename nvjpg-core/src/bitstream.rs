//! A big-endian reader over a shared, reference-counted byte buffer.

use std::rc::Rc;

/// An immutable source file shared between the caller and the parser,
/// reference-counted so neither has to clone the bytes to hand a reader a
/// view onto it.
pub type ByteBuffer = Rc<Vec<u8>>;

/// Any fixed-width integer the reader can pull out of the buffer. Kept
/// private; the only types that implement it are the ones below.
pub trait Primitive: Copy + Default {
    const SIZE: usize;
    fn from_le_bytes(bytes: &[u8]) -> Self;
    fn swap_bytes(self) -> Self;
}

macro_rules! impl_primitive {
    ($ty:ty) => {
        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn from_le_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }

            fn swap_bytes(self) -> Self {
                <$ty>::swap_bytes(self)
            }
        }
    };
}

impl_primitive!(u8);
impl_primitive!(u16);
impl_primitive!(u32);
impl_primitive!(u64);

/// Wraps a reference to the source `ByteBuffer` plus a current read index.
///
/// Reading past the end of the buffer never panics or reads uninitialized
/// memory: it yields a zero value and leaves (or sets) the `empty` flag.
pub struct Bitstream {
    data: ByteBuffer,
    pos: usize,
}

impl Bitstream {
    pub fn new(data: ByteBuffer) -> Bitstream {
        Bitstream { data, pos: 0 }
    }

    /// Reads a value in host (little-endian, on every platform this engine
    /// targets) byte order, copy-through from the buffer.
    pub fn get<T: Primitive>(&mut self) -> T {
        if self.pos + T::SIZE > self.data.len() {
            self.pos = self.data.len();
            return T::default();
        }
        let value = T::from_le_bytes(&self.data[self.pos..self.pos + T::SIZE]);
        self.pos += T::SIZE;
        value
    }

    /// Reads a value in big-endian byte order, as JFIF/JPEG segment headers
    /// and dimensions are encoded.
    pub fn get_be<T: Primitive>(&mut self) -> T {
        self.get::<T>().swap_bytes()
    }

    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.data.len());
    }

    pub fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    pub fn empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(bytes: &[u8]) -> Bitstream {
        Bitstream::new(Rc::new(bytes.to_vec()))
    }

    #[test]
    fn reads_big_endian_words() {
        let mut r = bs(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(r.get_be::<u16>(), 0x1234);
        assert_eq!(r.get_be::<u16>(), 0x5678);
        assert!(r.empty());
    }

    #[test]
    fn reading_past_end_yields_zero_and_sets_empty() {
        let mut r = bs(&[0xff]);
        assert_eq!(r.get::<u8>(), 0xff);
        assert!(r.empty());
        assert_eq!(r.get_be::<u32>(), 0);
        assert!(r.empty());
    }

    #[test]
    fn skip_and_rewind_move_position() {
        let mut r = bs(&[1, 2, 3, 4, 5]);
        r.skip(3);
        assert_eq!(r.position(), 3);
        r.rewind(2);
        assert_eq!(r.position(), 1);
        assert_eq!(r.remaining(), 4);
    }

    #[test]
    fn rewind_past_start_saturates_at_zero() {
        let mut r = bs(&[1, 2, 3]);
        r.rewind(10);
        assert_eq!(r.position(), 0);
    }
}
