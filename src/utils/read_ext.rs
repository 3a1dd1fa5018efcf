use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::err::{DecodeError, Result};
use crate::population::Rgb;

/// Forward-only reader of the big-endian primitives used by PR files.
///
/// Unlike `Read::read_exact`, every fixed-size read knows how many bytes were actually
/// available, so a field cut short is reported as `UnexpectedEndOfData` with `need`/`have`,
/// and a stream that ends exactly on a field boundary can be told apart from one that ends
/// in the middle of a field (see [`RecordReader::try_read_i32_named`]).
pub struct RecordReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        RecordReader { inner, position: 0 }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads as much of `buf` as the stream allows, returning the number of bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let offset = self.position;
        let mut buf = [0_u8; N];
        let have = self.fill(&mut buf)?;
        if have < N {
            return Err(DecodeError::UnexpectedEndOfData {
                what,
                offset,
                need: N,
                have,
            });
        }
        Ok(buf)
    }

    /// Reads exactly `len` bytes. The buffer only grows with the data actually present,
    /// so a corrupt length cannot force a large allocation.
    pub fn read_bytes_named(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>> {
        let offset = self.position;
        let mut buf = Vec::new();
        let have = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(DecodeError::Io)?;
        self.position += have as u64;
        if have < len {
            return Err(DecodeError::UnexpectedEndOfData {
                what,
                offset,
                need: len,
                have,
            });
        }
        Ok(buf)
    }

    #[inline]
    pub fn read_u8_named(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    /// Any non-zero byte is `true`.
    #[inline]
    pub fn read_bool_named(&mut self, what: &'static str) -> Result<bool> {
        Ok(self.read_u8_named(what)? != 0)
    }

    #[inline]
    pub fn read_u16_named(&mut self, what: &'static str) -> Result<u16> {
        Ok(BigEndian::read_u16(&self.array::<2>(what)?))
    }

    #[inline]
    pub fn read_i16_named(&mut self, what: &'static str) -> Result<i16> {
        Ok(BigEndian::read_i16(&self.array::<2>(what)?))
    }

    #[inline]
    pub fn read_i32_named(&mut self, what: &'static str) -> Result<i32> {
        Ok(BigEndian::read_i32(&self.array::<4>(what)?))
    }

    /// Like [`RecordReader::read_i32_named`], but a stream that is already exhausted yields
    /// `Ok(None)`. Running out of data after the first byte is still an error.
    pub fn try_read_i32_named(&mut self, what: &'static str) -> Result<Option<i32>> {
        let offset = self.position;
        let mut buf = [0_u8; 4];
        match self.fill(&mut buf)? {
            0 => Ok(None),
            4 => Ok(Some(BigEndian::read_i32(&buf))),
            have => Err(DecodeError::UnexpectedEndOfData {
                what,
                offset,
                need: 4,
                have,
            }),
        }
    }

    /// A 32-bit count that must not be negative.
    pub fn read_count_named(&mut self, what: &'static str) -> Result<usize> {
        let offset = self.position;
        let count = self.read_i32_named(what)?;
        usize::try_from(count).map_err(|_| DecodeError::InvalidCount {
            what,
            offset,
            count,
        })
    }

    /// Packed `0xAARRGGBB` integer; alpha is ignored.
    #[inline]
    pub fn read_color_named(&mut self, what: &'static str) -> Result<Rgb> {
        Ok(Rgb::from_packed(self.read_i32_named(what)?))
    }

    /// A `u16` length prefix followed by that many bytes of UTF-8.
    pub fn read_utf8_string_named(&mut self, what: &'static str) -> Result<String> {
        let len = self.read_u16_named(what)?;
        let offset = self.position;

        trace!(
            "Offset `0x{offset:08x} ({offset})` reading {what} string of len {len}",
            offset = offset,
            what = what,
            len = len
        );

        let bytes = self.read_bytes_named(usize::from(len), what)?;
        decode_utf8(bytes, what, offset)
    }

    /// A boolean presence flag, then (if set) an `i32` length and that many bytes of UTF-8.
    ///
    /// A cleared flag yields `Ok(None)`.
    pub fn read_long_utf8_string_named(&mut self, what: &'static str) -> Result<Option<String>> {
        if !self.read_bool_named(what)? {
            return Ok(None);
        }

        let len = self.read_count_named(what)?;
        let offset = self.position;

        trace!(
            "Offset `0x{offset:08x} ({offset})` reading long {what} string of len {len}",
            offset = offset,
            what = what,
            len = len
        );

        let bytes = self.read_bytes_named(len, what)?;
        decode_utf8(bytes, what, offset).map(Some)
    }
}

fn decode_utf8(bytes: Vec<u8>, what: &'static str, offset: u64) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| DecodeError::MalformedString {
        what,
        offset,
        source: e.utf8_error(),
    })
}
