use crate::errors::{Error, Result};
use crate::order::Endian;
use crate::source::Filler;
use byteorder_lite::{BigEndian as BE, ByteOrder, LittleEndian as LE, NativeEndian};
use std::fmt;
use std::io;

/// Long skips are serviced in chunks of at most this many bytes.
const SKIP_CHUNK: u64 = i32::MAX as u64;

/// Initial capacity of the string decode scratch.
const CHARS_CAPACITY: usize = 32;

/// A pull-mode reader for the compact binary format.
///
/// The reader owns a fixed-capacity window over the stream. Typed reads
/// consume from `position`; when a primitive needs more bytes than are
/// resident, the window is refilled from the source, compacting the live
/// region to the front of the buffer as needed.
///
/// ```rust
/// use packbuf::{Reader, Writer};
///
/// let mut w = Writer::new(Vec::new());
/// w.write_varint32(624485, true).unwrap();
/// w.write_string(Some("hello")).unwrap();
///
/// let mut r = Reader::from_bytes(w.into_inner());
/// assert_eq!(r.read_varint32(true).unwrap(), 624485);
/// assert_eq!(r.read_string().unwrap().as_deref(), Some("hello"));
/// ```
pub struct Reader {
    buf: Box<[u8]>,
    position: usize,
    limit: usize,
    total: u64,
    order: Endian,
    source: Option<Box<dyn Filler>>,
    chars: Vec<u16>,
}

impl Reader {
    /// Creates an empty reader with an internal window of `capacity` bytes
    /// and no source; reads fail with underflow until a buffer or source is
    /// bound.
    pub fn with_capacity(capacity: usize) -> Reader {
        Reader {
            buf: vec![0; capacity].into_boxed_slice(),
            position: 0,
            limit: 0,
            total: 0,
            order: Endian::Big,
            source: None,
            chars: Vec::with_capacity(CHARS_CAPACITY),
        }
    }

    /// Creates a reader over a fully loaded buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Reader {
        let limit = bytes.len();
        Reader {
            buf: bytes.into_boxed_slice(),
            position: 0,
            limit,
            total: 0,
            order: Endian::Big,
            source: None,
            chars: Vec::with_capacity(CHARS_CAPACITY),
        }
    }

    /// Creates a reader over a copy of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Reader {
        Reader::from_bytes(bytes.to_vec())
    }

    /// Creates a reader pulling from `source` through a window of
    /// `capacity` bytes. Any `io::Read` is accepted, as is a custom
    /// [`Filler`].
    pub fn from_source<S: Filler + 'static>(source: S, capacity: usize) -> Reader {
        let mut reader = Reader::with_capacity(capacity);
        reader.source = Some(Box::new(source));
        reader
    }

    /// The bytes currently bound to the window
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Physical size of the window
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Index of the next byte to consume
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor within the current window. Only meaningful for
    /// in-memory replay of a fully loaded buffer; a later refill discards
    /// the mapping between indices and stream offsets.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(Error::InvalidArgument("position cannot exceed limit"));
        }
        self.position = position;
        Ok(())
    }

    /// One past the last valid byte in the window
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Shrinks or grows the valid region of the current window. Intended
    /// for in-memory replay, like [`set_position`](Reader::set_position).
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.buf.len() {
            return Err(Error::InvalidArgument("limit cannot exceed capacity"));
        }
        if limit < self.position {
            return Err(Error::InvalidArgument("limit cannot precede position"));
        }
        self.limit = limit;
        Ok(())
    }

    /// Sets the cursor and the scrolled-byte count back to zero
    pub fn rewind(&mut self) {
        self.position = 0;
        self.total = 0;
    }

    /// Total bytes consumed from the stream so far
    #[inline]
    pub fn total_bytes_read(&self) -> u64 {
        self.total + self.position as u64
    }

    /// Byte order of fixed-width primitives
    #[inline]
    pub fn order(&self) -> Endian {
        self.order
    }

    /// Sets the byte order of fixed-width primitives. Varints and strings
    /// are unaffected.
    pub fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    /// Rebinds the window to `bytes`, dropping any source and resetting
    /// the cursor, byte order and totals
    pub fn set_buffer(&mut self, bytes: Vec<u8>) {
        let limit = bytes.len();
        self.buf = bytes.into_boxed_slice();
        self.position = 0;
        self.limit = limit;
        self.total = 0;
        self.order = Endian::Big;
        self.source = None;
    }

    /// Rebinds the source, invalidating the window so the next read
    /// refills
    pub fn set_source<S: Filler + 'static>(&mut self, source: S) {
        self.source = Some(Box::new(source));
        self.position = 0;
        self.limit = 0;
        self.total = 0;
    }

    /// Detaches and returns the source, if any
    pub fn take_source(&mut self) -> Option<Box<dyn Filler>> {
        self.source.take()
    }

    /// Drops the source. Shutdown errors from the underlying stream are
    /// swallowed; they cannot be acted upon here.
    pub fn close(&mut self) {
        self.source = None;
    }

    fn fill_at(&mut self, start: usize, end: usize) -> Result<Option<usize>> {
        if start == end {
            return Ok(Some(0));
        }
        match self.source {
            Some(ref mut source) => Ok(source.fill(&mut self.buf[start..end])?),
            None => Ok(None),
        }
    }

    /// Ensures at least `required` bytes are resident at the cursor,
    /// refilling and compacting as needed. Returns the resident count.
    fn require(&mut self, required: usize) -> Result<usize> {
        let capacity = self.buf.len();
        let mut remaining = self.limit - self.position;
        if remaining >= required {
            return Ok(remaining);
        }
        if required > capacity {
            return Err(Error::BufferTooSmall { capacity, required });
        }

        // One fill at the tail of the window before compacting.
        if remaining > 0 {
            match self.fill_at(self.limit, capacity)? {
                None => return Err(Error::Underflow),
                Some(count) => {
                    remaining += count;
                    if remaining >= required {
                        self.limit += count;
                        return Ok(remaining);
                    }
                }
            }
        }

        // Compact the live region (plus any bytes the fill above appended
        // behind `limit`) to the front, then keep pulling.
        self.buf.copy_within(self.position..self.position + remaining, 0);
        self.total += self.position as u64;
        self.position = 0;
        loop {
            match self.fill_at(remaining, capacity)? {
                None => {
                    if remaining >= required {
                        break;
                    }
                    return Err(Error::Underflow);
                }
                Some(count) => {
                    remaining += count;
                    if remaining >= required {
                        break;
                    }
                }
            }
        }
        self.limit = remaining;
        Ok(remaining)
    }

    /// Best-effort variant of `require`: makes up to `min(wanted,
    /// capacity)` bytes resident and reports how many can be consumed, or
    /// `None` when the window is empty and the source is exhausted.
    fn optional(&mut self, wanted: usize) -> Result<Option<usize>> {
        let capacity = self.buf.len();
        let mut remaining = self.limit - self.position;
        if remaining >= wanted {
            return Ok(Some(wanted));
        }
        let wanted = wanted.min(capacity);

        // One fill attempt before compacting; callers use this as a
        // non-fatal end-of-stream probe.
        match self.fill_at(self.limit, capacity)? {
            None => {
                return Ok(if remaining == 0 {
                    None
                } else {
                    Some(remaining.min(wanted))
                });
            }
            Some(count) => {
                remaining += count;
                if remaining >= wanted {
                    self.limit += count;
                    return Ok(Some(wanted));
                }
            }
        }

        self.buf.copy_within(self.position..self.position + remaining, 0);
        self.total += self.position as u64;
        self.position = 0;
        loop {
            match self.fill_at(remaining, capacity)? {
                None => break,
                Some(count) => {
                    remaining += count;
                    if remaining >= wanted {
                        break;
                    }
                }
            }
        }
        self.limit = remaining;
        if remaining == 0 {
            Ok(None)
        } else {
            Ok(Some(remaining.min(wanted)))
        }
    }

    // Consumes one byte; residency must already be guaranteed.
    #[inline(always)]
    fn take(&mut self) -> u8 {
        let b = self.buf[self.position];
        self.position += 1;
        b
    }

    /// Reads the next byte, or `None` at end of stream
    pub fn try_read_u8(&mut self) -> Result<Option<u8>> {
        match self.optional(1)? {
            Some(n) if n > 0 => Ok(Some(self.take())),
            _ => Ok(None),
        }
    }

    /// Reads the next byte
    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        Ok(self.take())
    }

    /// Reads the next byte as a signed value
    #[inline(always)]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Reads a bool: a single byte, 1 is true and any other value false
    #[inline(always)]
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_u8().map(|b| b == 1)
    }

    #[inline]
    fn read_fixed<T, F, G>(&mut self, len: usize, read_be: F, read_le: G) -> Result<T>
    where
        F: Fn(&[u8]) -> T,
        G: Fn(&[u8]) -> T,
    {
        self.require(len)?;
        let start = self.position;
        self.position += len;
        let window = &self.buf[start..start + len];
        Ok(match self.order {
            Endian::Big => read_be(window),
            Endian::Little => read_le(window),
        })
    }

    /// Reads an i16 in the configured byte order
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_fixed(2, BE::read_i16, LE::read_i16)
    }

    /// Reads a u16 in the configured byte order. Doubles as the reader
    /// for 16-bit characters (UTF-16 code units).
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_fixed(2, BE::read_u16, LE::read_u16)
    }

    /// Reads an i32 in the configured byte order
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_fixed(4, BE::read_i32, LE::read_i32)
    }

    /// Reads an i64 in the configured byte order
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_fixed(8, BE::read_i64, LE::read_i64)
    }

    /// Reads an f32 in the configured byte order
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_fixed(4, BE::read_f32, LE::read_f32)
    }

    /// Reads an f64 in the configured byte order
    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_fixed(8, BE::read_f64, LE::read_f64)
    }

    /// Reads a 1..5 byte varint as an i32. With `optimize_positive` the
    /// raw unsigned value is returned as is; otherwise it is zig-zag
    /// decoded so small-magnitude negatives stay short.
    pub fn read_varint32(&mut self, optimize_positive: bool) -> Result<i32> {
        if self.require(1)? < 5 {
            return self.read_varint32_slow(optimize_positive);
        }
        let mut b = self.take(); // byte0
        if (b & 0x80) == 0 {
            return Ok(unzig32(b as u32, optimize_positive));
        }
        let mut r = (b & 0x7f) as u32;

        b = self.take(); // byte1
        r |= ((b & 0x7f) as u32) << 7;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        b = self.take(); // byte2
        r |= ((b & 0x7f) as u32) << 14;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        b = self.take(); // byte3
        r |= ((b & 0x7f) as u32) << 21;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        // byte4 carries the top four bits and always terminates
        b = self.take();
        r |= ((b & 0x7f) as u32) << 28;
        Ok(unzig32(r, optimize_positive))
    }

    fn read_varint32_slow(&mut self, optimize_positive: bool) -> Result<i32> {
        // the caller guarantees the first byte
        let mut b = self.take();
        if (b & 0x80) == 0 {
            return Ok(unzig32(b as u32, optimize_positive));
        }
        let mut r = (b & 0x7f) as u32;

        self.require(1)?;
        b = self.take();
        r |= ((b & 0x7f) as u32) << 7;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        self.require(1)?;
        b = self.take();
        r |= ((b & 0x7f) as u32) << 14;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        self.require(1)?;
        b = self.take();
        r |= ((b & 0x7f) as u32) << 21;
        if (b & 0x80) == 0 {
            return Ok(unzig32(r, optimize_positive));
        }

        self.require(1)?;
        b = self.take();
        r |= ((b & 0x7f) as u32) << 28;
        Ok(unzig32(r, optimize_positive))
    }

    /// Reads a 1..9 byte varint as an i64. The first eight bytes carry
    /// seven payload bits each; a ninth byte, when present, carries eight.
    pub fn read_varint64(&mut self, optimize_positive: bool) -> Result<i64> {
        if self.require(1)? < 9 {
            return self.read_varint64_slow(optimize_positive);
        }
        // part0: bits 0..28
        let mut b = self.take();
        if (b & 0x80) == 0 {
            return Ok(unzig64(b as u64, optimize_positive));
        }
        let mut r0 = (b & 0x7f) as u32;

        b = self.take();
        r0 |= ((b & 0x7f) as u32) << 7;
        if (b & 0x80) == 0 {
            return Ok(unzig64(r0 as u64, optimize_positive));
        }

        b = self.take();
        r0 |= ((b & 0x7f) as u32) << 14;
        if (b & 0x80) == 0 {
            return Ok(unzig64(r0 as u64, optimize_positive));
        }

        b = self.take();
        r0 |= ((b & 0x7f) as u32) << 21;
        if (b & 0x80) == 0 {
            return Ok(unzig64(r0 as u64, optimize_positive));
        }

        // part1: bits 28..56
        b = self.take();
        let mut r1 = (b & 0x7f) as u32;
        if (b & 0x80) == 0 {
            return Ok(unzig64((r0 as u64) | ((r1 as u64) << 28), optimize_positive));
        }

        b = self.take();
        r1 |= ((b & 0x7f) as u32) << 7;
        if (b & 0x80) == 0 {
            return Ok(unzig64((r0 as u64) | ((r1 as u64) << 28), optimize_positive));
        }

        b = self.take();
        r1 |= ((b & 0x7f) as u32) << 14;
        if (b & 0x80) == 0 {
            return Ok(unzig64((r0 as u64) | ((r1 as u64) << 28), optimize_positive));
        }

        b = self.take();
        r1 |= ((b & 0x7f) as u32) << 21;
        if (b & 0x80) == 0 {
            return Ok(unzig64((r0 as u64) | ((r1 as u64) << 28), optimize_positive));
        }

        // part2: the ninth byte is all payload, no continuation bit
        b = self.take();
        let r2 = b as u32;
        Ok(unzig64(
            (r0 as u64) | ((r1 as u64) << 28) | ((r2 as u64) << 56),
            optimize_positive,
        ))
    }

    fn read_varint64_slow(&mut self, optimize_positive: bool) -> Result<i64> {
        // the caller guarantees the first byte
        let mut b = self.take();
        if (b & 0x80) == 0 {
            return Ok(unzig64(b as u64, optimize_positive));
        }
        let mut result = (b & 0x7f) as u64;

        let mut shift = 7;
        while shift < 56 {
            self.require(1)?;
            b = self.take();
            result |= ((b & 0x7f) as u64) << shift;
            if (b & 0x80) == 0 {
                return Ok(unzig64(result, optimize_positive));
            }
            shift += 7;
        }

        // ninth byte, eight raw payload bits
        self.require(1)?;
        b = self.take();
        result |= (b as u64) << 56;
        Ok(unzig64(result, optimize_positive))
    }

    /// Returns true when a following [`read_varint32`](Reader::read_varint32)
    /// would succeed without further source data. Consumes nothing.
    pub fn can_read_varint32(&mut self) -> Result<bool> {
        if self.limit - self.position >= 5 {
            return Ok(true);
        }
        match self.optional(5)? {
            Some(n) if n > 0 => {}
            _ => return Ok(false),
        }
        let mut p = self.position;
        for _ in 0..4 {
            if (self.buf[p] & 0x80) == 0 {
                return Ok(true);
            }
            p += 1;
            if p == self.limit {
                return Ok(false);
            }
        }
        // a fifth resident byte always terminates
        Ok(true)
    }

    /// Returns true when a following [`read_varint64`](Reader::read_varint64)
    /// would succeed without further source data. Consumes nothing.
    pub fn can_read_varint64(&mut self) -> Result<bool> {
        if self.limit - self.position >= 9 {
            return Ok(true);
        }
        match self.optional(5)? {
            Some(n) if n > 0 => {}
            _ => return Ok(false),
        }
        let mut p = self.position;
        for _ in 0..8 {
            if (self.buf[p] & 0x80) == 0 {
                return Ok(true);
            }
            p += 1;
            if p == self.limit {
                return Ok(false);
            }
        }
        // a ninth resident byte always terminates
        Ok(true)
    }

    #[inline]
    fn read_array<T, F, G>(
        &mut self,
        length: usize,
        width: usize,
        read_into: F,
        read_one: G,
    ) -> Result<Vec<T>>
    where
        T: Copy + Default,
        F: Fn(&[u8], &mut [T]),
        G: Fn(&mut Reader) -> Result<T>,
    {
        let byte_len = length
            .checked_mul(width)
            .ok_or(Error::InvalidArgument("array length overflows"))?;
        // Decode straight out of the window when the bytes are already
        // resident and no byte swapping is needed.
        if self.order.is_native() && self.limit - self.position >= byte_len {
            let mut array = vec![T::default(); length];
            read_into(&self.buf[self.position..self.position + byte_len], &mut array);
            self.position += byte_len;
            return Ok(array);
        }
        let mut array = Vec::with_capacity(length);
        for _ in 0..length {
            array.push(read_one(self)?);
        }
        Ok(array)
    }

    /// Reads `length` i16 values in the configured byte order
    pub fn read_i16s(&mut self, length: usize) -> Result<Vec<i16>> {
        self.read_array(length, 2, NativeEndian::read_i16_into, Reader::read_i16)
    }

    /// Reads `length` u16 values (16-bit characters) in the configured
    /// byte order
    pub fn read_u16s(&mut self, length: usize) -> Result<Vec<u16>> {
        self.read_array(length, 2, NativeEndian::read_u16_into, Reader::read_u16)
    }

    /// Reads `length` i32 values in the configured byte order
    pub fn read_i32s(&mut self, length: usize) -> Result<Vec<i32>> {
        self.read_array(length, 4, NativeEndian::read_i32_into, Reader::read_i32)
    }

    /// Reads `length` i64 values in the configured byte order
    pub fn read_i64s(&mut self, length: usize) -> Result<Vec<i64>> {
        self.read_array(length, 8, NativeEndian::read_i64_into, Reader::read_i64)
    }

    /// Reads `length` f32 values in the configured byte order
    pub fn read_f32s(&mut self, length: usize) -> Result<Vec<f32>> {
        self.read_array(length, 4, NativeEndian::read_f32_into, Reader::read_f32)
    }

    /// Reads `length` f64 values in the configured byte order
    pub fn read_f64s(&mut self, length: usize) -> Result<Vec<f64>> {
        self.read_array(length, 8, NativeEndian::read_f64_into, Reader::read_f64)
    }

    /// Reads a string, `None` for the null wire value.
    ///
    /// The first byte selects the mode: bit 7 clear is 7-bit text ending
    /// at a byte with bit 7 set, bit 7 set is a character count followed
    /// by that many variable-width characters.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let available = self.require(1)?;
        let b = self.take();
        if (b & 0x80) == 0 {
            return self.read_ascii().map(Some);
        }
        let char_count = if available >= 5 {
            self.read_utf8_length(b)
        } else {
            self.read_utf8_length_slow(b)?
        };
        let char_count = char_count as usize;
        match char_count {
            0 => return Ok(None),
            1 => return Ok(Some(String::new())),
            _ => {}
        }
        self.read_utf8(char_count - 1)?;
        String::from_utf16(&self.chars)
            .map(Some)
            .map_err(|_| Error::MalformedString("unpaired surrogate"))
    }

    /// Builder-style variant of [`read_string`](Reader::read_string):
    /// appends the decoded characters to `out` and returns false for the
    /// null wire value, leaving `out` untouched.
    pub fn read_string_into(&mut self, out: &mut String) -> Result<bool> {
        match self.read_string()? {
            Some(s) => {
                out.push_str(&s);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // 7-bit text; the first byte is already consumed and is part of the
    // string.
    fn read_ascii(&mut self) -> Result<String> {
        let start = self.position - 1;
        let mut end = self.position;
        loop {
            if end == self.limit {
                return self.read_ascii_slow(start);
            }
            let b = self.buf[end];
            end += 1;
            if (b & 0x80) != 0 {
                break;
            }
        }
        let mut bytes = self.buf[start..end].to_vec();
        let last = bytes.len() - 1;
        bytes[last] &= 0x7f;
        self.position = end;
        String::from_utf8(bytes).map_err(|_| Error::MalformedString("non-ascii byte"))
    }

    // No terminator inside the window: move what is resident into the
    // scratch and pull a byte at a time.
    fn read_ascii_slow(&mut self, start: usize) -> Result<String> {
        self.chars.clear();
        self.chars
            .extend(self.buf[start..self.limit].iter().map(|&b| b as u16));
        self.position = self.limit;
        loop {
            self.require(1)?;
            let b = self.take();
            if (b & 0x80) != 0 {
                self.chars.push((b & 0x7f) as u16);
                break;
            }
            self.chars.push(b as u16);
        }
        String::from_utf16(&self.chars).map_err(|_| Error::MalformedString("non-ascii byte"))
    }

    // Character count + 1; bit 6 of the first byte marks a continuation,
    // bit 7 of each later byte does. Residency for the worst case is
    // guaranteed by the caller.
    fn read_utf8_length(&mut self, b: u8) -> u32 {
        let mut result = (b & 0x3f) as u32;
        if (b & 0x40) == 0 {
            return result;
        }

        let mut b = self.take();
        result |= ((b & 0x7f) as u32) << 6;
        if (b & 0x80) == 0 {
            return result;
        }

        b = self.take();
        result |= ((b & 0x7f) as u32) << 13;
        if (b & 0x80) == 0 {
            return result;
        }

        b = self.take();
        result |= ((b & 0x7f) as u32) << 20;
        if (b & 0x80) == 0 {
            return result;
        }

        b = self.take();
        result |= ((b & 0x7f) as u32) << 27;
        result
    }

    fn read_utf8_length_slow(&mut self, b: u8) -> Result<u32> {
        let mut result = (b & 0x3f) as u32;
        if (b & 0x40) == 0 {
            return Ok(result);
        }

        self.require(1)?;
        let mut b = self.take();
        result |= ((b & 0x7f) as u32) << 6;
        if (b & 0x80) == 0 {
            return Ok(result);
        }

        self.require(1)?;
        b = self.take();
        result |= ((b & 0x7f) as u32) << 13;
        if (b & 0x80) == 0 {
            return Ok(result);
        }

        self.require(1)?;
        b = self.take();
        result |= ((b & 0x7f) as u32) << 20;
        if (b & 0x80) == 0 {
            return Ok(result);
        }

        self.require(1)?;
        b = self.take();
        result |= ((b & 0x7f) as u32) << 27;
        Ok(result)
    }

    // Decodes `char_count` characters into the scratch, taking the 7-bit
    // prefix straight out of the window first.
    fn read_utf8(&mut self, char_count: usize) -> Result<()> {
        self.chars.clear();
        let count = self.require(1)?.min(char_count);
        let mut char_index = 0;
        while char_index < count {
            let b = self.buf[self.position];
            if (b & 0x80) != 0 {
                break;
            }
            self.position += 1;
            self.chars.push(b as u16);
            char_index += 1;
        }
        if char_index < char_count {
            self.read_utf8_slow(char_count, char_index)?;
        }
        Ok(())
    }

    fn read_utf8_slow(&mut self, char_count: usize, mut char_index: usize) -> Result<()> {
        while char_index < char_count {
            if self.position == self.limit {
                self.require(1)?;
            }
            let b = self.take();
            match b >> 4 {
                0..=7 => self.chars.push(b as u16),
                12 | 13 => {
                    if self.position == self.limit {
                        self.require(1)?;
                    }
                    let b2 = self.take();
                    self.chars
                        .push((((b & 0x1f) as u16) << 6) | ((b2 & 0x3f) as u16));
                }
                14 => {
                    if self.position == self.limit {
                        self.require(1)?;
                    }
                    let b2 = self.take();
                    if self.position == self.limit {
                        self.require(1)?;
                    }
                    let b3 = self.take();
                    self.chars.push(
                        (((b & 0x0f) as u16) << 12)
                            | (((b2 & 0x3f) as u16) << 6)
                            | ((b3 & 0x3f) as u16),
                    );
                }
                _ => return Err(Error::MalformedString("reserved lead byte")),
            }
            char_index += 1;
        }
        Ok(())
    }

    /// Reads exactly `length` bytes into a fresh vec
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0; length];
        self.read_exact_bytes(&mut bytes)?;
        Ok(bytes)
    }

    /// Fills `dst` exactly; a short source is an underflow error
    pub fn read_exact_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut offset = 0;
        let mut copy_count = (self.limit - self.position).min(dst.len());
        loop {
            dst[offset..offset + copy_count]
                .copy_from_slice(&self.buf[self.position..self.position + copy_count]);
            self.position += copy_count;
            offset += copy_count;
            if offset == dst.len() {
                break;
            }
            copy_count = (dst.len() - offset).min(self.buf.len());
            self.require(copy_count)?;
        }
        Ok(())
    }

    /// Discards `count` bytes, refilling as needed
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        let mut remaining = count;
        while remaining > 0 {
            let step = remaining.min(SKIP_CHUNK) as usize;
            self.skip_resident(step)?;
            remaining -= step as u64;
        }
        Ok(count)
    }

    fn skip_resident(&mut self, count: usize) -> Result<()> {
        let mut count = count;
        let mut skip_count = (self.limit - self.position).min(count);
        loop {
            self.position += skip_count;
            count -= skip_count;
            if count == 0 {
                break;
            }
            skip_count = count.min(self.buf.len());
            self.require(skip_count)?;
        }
        Ok(())
    }
}

impl io::Read for Reader {
    /// Copies up to `dst.len()` bytes out of the stream; a return of 0
    /// means end of stream, matching the std contract.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut offset = 0;
        while offset < dst.len() {
            let wanted = dst.len() - offset;
            let count = match self.optional(wanted) {
                Ok(Some(count)) if count > 0 => count,
                Ok(_) => break,
                Err(e) => return Err(e.into()),
            };
            dst[offset..offset + count]
                .copy_from_slice(&self.buf[self.position..self.position + count]);
            self.position += count;
            offset += count;
        }
        Ok(offset)
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("capacity", &self.buf.len())
            .field("total", &self.total)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

#[inline(always)]
fn unzig32(n: u32, optimize_positive: bool) -> i32 {
    if optimize_positive {
        n as i32
    } else {
        // zigzag
        ((n >> 1) as i32) ^ -((n & 1) as i32)
    }
}

#[inline(always)]
fn unzig64(n: u64, optimize_positive: bool) -> i64 {
    if optimize_positive {
        n as i64
    } else {
        // zigzag
        ((n >> 1) as i64) ^ -((n & 1) as i64)
    }
}
