//! Little-endian primitives shared by every key encoder.

use crate::error::KeyError;

/// Append-only writer over a byte buffer.
pub struct KeyWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> KeyWriter<'a> {
    pub const fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.out.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.out.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    /// Writes a 16-bit length prefix.
    pub fn put_len(&mut self, len: usize) -> Result<(), KeyError> {
        let len = u16::try_from(len).map_err(|_| KeyError::LengthOverflow(len))?;
        self.put_u16(len);
        Ok(())
    }

    /// Writes the low 24 bits of `v`.
    pub fn put_u24(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes()[..3]);
    }
}

/// Forward-only reader over an encoded key.
pub struct KeyReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> KeyReader<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], KeyError> {
        if self.remaining() < n {
            return Err(KeyError::Truncated {
                offset: self.offset,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], KeyError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn u8(&mut self) -> Result<u8, KeyError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, KeyError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, KeyError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, KeyError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, KeyError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, KeyError> {
        Ok(f64::from_bits(self.u64()?))
    }

    pub fn u24(&mut self) -> Result<u32, KeyError> {
        let [a, b, c] = self.array::<3>()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }

    pub fn length_prefix(&mut self) -> Result<usize, KeyError> {
        Ok(usize::from(self.u16()?))
    }

    pub fn finish(&self) -> Result<(), KeyError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(KeyError::TrailingBytes(n)),
        }
    }
}
