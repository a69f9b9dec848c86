use crate::errors::{Error, Result};
use crate::order::Endian;
use byteorder_lite::{BigEndian as BE, ByteOrder, LittleEndian as LE};

/// The encoder half of the format; emits the exact bytes the reader
/// consumes. Fixed-width primitives honour the configured byte order,
/// varints and strings do not.
pub struct Writer<W: WriterBackend> {
    inner: W,
    order: Endian,
}

impl<W: WriterBackend> Writer<W> {
    /// Creates a new `Writer` emitting big-endian fixed-width primitives
    pub fn new(w: W) -> Writer<W> {
        Writer {
            inner: w,
            order: Endian::Big,
        }
    }

    /// Byte order of fixed-width primitives
    #[inline]
    pub fn order(&self) -> Endian {
        self.order
    }

    /// Sets the byte order of fixed-width primitives
    pub fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    /// Consumes the writer and returns the backend
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes a raw byte
    #[inline(always)]
    pub fn write_u8(&mut self, byte: u8) -> Result<()> {
        self.inner.pb_write_u8(byte)
    }

    /// Writes a byte as a signed value
    #[inline(always)]
    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.inner.pb_write_u8(v as u8)
    }

    /// Writes a bool: 1 = true, 0 = false
    #[inline(always)]
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.inner.pb_write_u8(u8::from(v))
    }

    /// Writes an i16 in the configured byte order
    #[inline(always)]
    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        let mut scratch = [0u8; 2];
        match self.order {
            Endian::Big => BE::write_i16(&mut scratch, v),
            Endian::Little => LE::write_i16(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes a u16 (a 16-bit character) in the configured byte order
    #[inline(always)]
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        let mut scratch = [0u8; 2];
        match self.order {
            Endian::Big => BE::write_u16(&mut scratch, v),
            Endian::Little => LE::write_u16(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes an i32 in the configured byte order
    #[inline(always)]
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        let mut scratch = [0u8; 4];
        match self.order {
            Endian::Big => BE::write_i32(&mut scratch, v),
            Endian::Little => LE::write_i32(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes an i64 in the configured byte order
    #[inline(always)]
    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        let mut scratch = [0u8; 8];
        match self.order {
            Endian::Big => BE::write_i64(&mut scratch, v),
            Endian::Little => LE::write_i64(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes an f32 in the configured byte order
    #[inline(always)]
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        let mut scratch = [0u8; 4];
        match self.order {
            Endian::Big => BE::write_f32(&mut scratch, v),
            Endian::Little => LE::write_f32(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes an f64 in the configured byte order
    #[inline(always)]
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        let mut scratch = [0u8; 8];
        match self.order {
            Endian::Big => BE::write_f64(&mut scratch, v),
            Endian::Little => LE::write_f64(&mut scratch, v),
        }
        self.inner.pb_write_all(&scratch)
    }

    /// Writes a 1..5 byte varint. With `optimize_positive` the value is
    /// emitted unsigned as is; otherwise it is zig-zag encoded first.
    /// Returns the number of bytes written.
    pub fn write_varint32(&mut self, v: i32, optimize_positive: bool) -> Result<usize> {
        let mut value = if optimize_positive {
            v as u32
        } else {
            // zigzag
            ((v << 1) ^ (v >> 31)) as u32
        };
        let mut written = 1;
        while value > 0x7f {
            self.inner.pb_write_u8(((value as u8) & 0x7f) | 0x80)?;
            value >>= 7;
            written += 1;
        }
        self.inner.pb_write_u8(value as u8)?;
        Ok(written)
    }

    /// Writes a 1..9 byte varint. The ninth byte, when needed, carries
    /// the top eight bits raw. Returns the number of bytes written.
    pub fn write_varint64(&mut self, v: i64, optimize_positive: bool) -> Result<usize> {
        let mut value = if optimize_positive {
            v as u64
        } else {
            // zigzag
            ((v << 1) ^ (v >> 63)) as u64
        };
        let mut written = 0;
        while value > 0x7f && written < 8 {
            self.inner.pb_write_u8(((value as u8) & 0x7f) | 0x80)?;
            value >>= 7;
            written += 1;
        }
        self.inner.pb_write_u8(value as u8)?;
        Ok(written + 1)
    }

    /// Writes a string. `None` is the null wire value; short all-ASCII
    /// strings use the terminator-bit mode, everything else a character
    /// count followed by variable-width characters.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        let value = match value {
            None => return self.inner.pb_write_u8(0x80),
            Some(v) => v,
        };
        let char_count = value.encode_utf16().count();
        if char_count == 0 {
            return self.inner.pb_write_u8(0x81);
        }
        if char_count > 1 && char_count < 64 && value.is_ascii() {
            let bytes = value.as_bytes();
            self.inner.pb_write_all(&bytes[..bytes.len() - 1])?;
            // terminator bit on the last byte
            return self.inner.pb_write_u8(bytes[bytes.len() - 1] | 0x80);
        }
        self.write_utf8_length(char_count as u32 + 1)?;
        for c in value.encode_utf16() {
            if c <= 0x7f {
                self.inner.pb_write_u8(c as u8)?;
            } else if c > 0x7ff {
                self.inner.pb_write_u8(0xe0 | ((c >> 12) as u8 & 0x0f))?;
                self.inner.pb_write_u8(0x80 | ((c >> 6) as u8 & 0x3f))?;
                self.inner.pb_write_u8(0x80 | (c as u8 & 0x3f))?;
            } else {
                self.inner.pb_write_u8(0xc0 | ((c >> 6) as u8 & 0x1f))?;
                self.inner.pb_write_u8(0x80 | (c as u8 & 0x3f))?;
            }
        }
        Ok(())
    }

    // Character count + 1. Bit 7 of the first byte marks the mode, bit 6
    // a continuation; later bytes use bit 7 for continuation.
    fn write_utf8_length(&mut self, value: u32) -> Result<()> {
        if value >> 6 == 0 {
            self.inner.pb_write_u8((value as u8) | 0x80)
        } else if value >> 13 == 0 {
            self.inner.pb_write_u8((value as u8) | 0x40 | 0x80)?;
            self.inner.pb_write_u8((value >> 6) as u8)
        } else if value >> 20 == 0 {
            self.inner.pb_write_u8((value as u8) | 0x40 | 0x80)?;
            self.inner.pb_write_u8(((value >> 6) as u8) | 0x80)?;
            self.inner.pb_write_u8((value >> 13) as u8)
        } else if value >> 27 == 0 {
            self.inner.pb_write_u8((value as u8) | 0x40 | 0x80)?;
            self.inner.pb_write_u8(((value >> 6) as u8) | 0x80)?;
            self.inner.pb_write_u8(((value >> 13) as u8) | 0x80)?;
            self.inner.pb_write_u8((value >> 20) as u8)
        } else {
            self.inner.pb_write_u8((value as u8) | 0x40 | 0x80)?;
            self.inner.pb_write_u8(((value >> 6) as u8) | 0x80)?;
            self.inner.pb_write_u8(((value >> 13) as u8) | 0x80)?;
            self.inner.pb_write_u8(((value >> 20) as u8) | 0x80)?;
            self.inner.pb_write_u8((value >> 27) as u8)
        }
    }

    /// Writes raw bytes, no length prefix
    #[inline(always)]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.pb_write_all(bytes)
    }

    /// Writes i16 values in the configured byte order
    pub fn write_i16s(&mut self, values: &[i16]) -> Result<()> {
        for &v in values {
            self.write_i16(v)?;
        }
        Ok(())
    }

    /// Writes u16 values (16-bit characters) in the configured byte order
    pub fn write_u16s(&mut self, values: &[u16]) -> Result<()> {
        for &v in values {
            self.write_u16(v)?;
        }
        Ok(())
    }

    /// Writes i32 values in the configured byte order
    pub fn write_i32s(&mut self, values: &[i32]) -> Result<()> {
        for &v in values {
            self.write_i32(v)?;
        }
        Ok(())
    }

    /// Writes i64 values in the configured byte order
    pub fn write_i64s(&mut self, values: &[i64]) -> Result<()> {
        for &v in values {
            self.write_i64(v)?;
        }
        Ok(())
    }

    /// Writes f32 values in the configured byte order
    pub fn write_f32s(&mut self, values: &[f32]) -> Result<()> {
        for &v in values {
            self.write_f32(v)?;
        }
        Ok(())
    }

    /// Writes f64 values in the configured byte order
    pub fn write_f64s(&mut self, values: &[f64]) -> Result<()> {
        for &v in values {
            self.write_f64(v)?;
        }
        Ok(())
    }
}

/// Writer backend abstraction
pub trait WriterBackend {
    /// Write a u8
    fn pb_write_u8(&mut self, x: u8) -> Result<()>;

    /// Write all bytes in buf
    fn pb_write_all(&mut self, buf: &[u8]) -> Result<()>;
}

/// A writer backend for byte buffers
pub struct BytesWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> BytesWriter<'a> {
    /// Create a new BytesWriter to write into `buf`
    pub fn new(buf: &'a mut [u8]) -> BytesWriter<'a> {
        BytesWriter { buf, cursor: 0 }
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.cursor
    }
}

impl<'a> WriterBackend for BytesWriter<'a> {
    #[inline(always)]
    fn pb_write_u8(&mut self, x: u8) -> Result<()> {
        if self.buf.len() - self.cursor < 1 {
            Err(Error::OutputBufferTooSmall)
        } else {
            self.buf[self.cursor] = x;
            self.cursor += 1;
            Ok(())
        }
    }

    #[inline(always)]
    fn pb_write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.buf.len() - self.cursor < buf.len() {
            Err(Error::OutputBufferTooSmall)
        } else {
            self.buf[self.cursor..self.cursor + buf.len()].copy_from_slice(buf);
            self.cursor += buf.len();
            Ok(())
        }
    }
}

impl<W: std::io::Write> WriterBackend for W {
    #[inline(always)]
    fn pb_write_u8(&mut self, x: u8) -> Result<()> {
        std::io::Write::write_all(self, &[x]).map_err(|e| e.into())
    }

    #[inline(always)]
    fn pb_write_all(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf).map_err(|e| e.into())
    }
}
