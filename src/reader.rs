//! Bounds-checked readers over raw section bytes. The DWARF sections we get
//! handed come straight out of object files and are frequently truncated or
//! corrupt, so every read here is checked against an explicit end offset and
//! returns a Result instead of touching adjacent memory.
use crate::error::{Error, Result};

/// A borrowed view of one section's bytes plus the byte order they use.
/// Cheap to copy; owns nothing.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    pub bytes: &'a [u8],
    pub little_endian: bool,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], little_endian: bool) -> Self {
        Reader {
            bytes,
            little_endian,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn slice(&self, offset: usize, size: usize) -> Result<&'a [u8]> {
        let stop = offset.checked_add(size).ok_or(Error::Truncated {
            offset,
            wanted: size,
            end: self.bytes.len(),
        })?;
        if stop > self.bytes.len() {
            return Err(Error::Truncated {
                offset,
                wanted: size,
                end: self.bytes.len(),
            });
        }
        Ok(&self.bytes[offset..stop])
    }
}

/// A position within a [`Reader`], bounded by `end`. `end` is usually the
/// section length but gets clamped to a record's declared end when walking
/// units, CIEs, line programs and the like, so an over-long inner structure
/// cannot read its neighbor's bytes.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    pub reader: Reader<'a>,
    pub offset: usize,
    pub end: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(reader: Reader<'a>, offset: usize) -> Self {
        let end = reader.len();
        Cursor {
            reader,
            offset,
            end,
        }
    }

    /// A cursor over `bytes[offset..end]` for a record whose length is known.
    pub fn with_end(reader: Reader<'a>, offset: usize, end: usize) -> Self {
        let end = end.min(reader.len());
        Cursor {
            reader,
            offset,
            end,
        }
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.offset)
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.end
    }

    fn check(&self, wanted: usize) -> Result<()> {
        let stop = self.offset.checked_add(wanted).ok_or(Error::Truncated {
            offset: self.offset,
            wanted,
            end: self.end,
        })?;
        if stop > self.end {
            return Err(Error::Truncated {
                offset: self.offset,
                wanted,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.check(count)?;
        self.offset += count;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.check(1)?;
        let byte = self.reader.bytes[self.offset];
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_half(&mut self) -> Result<u16> {
        self.check(2)?;
        let raw: [u8; 2] = self.reader.bytes[self.offset..self.offset + 2]
            .try_into()
            .unwrap();
        self.offset += 2;
        if self.reader.little_endian {
            Ok(u16::from_le_bytes(raw))
        } else {
            Ok(u16::from_be_bytes(raw))
        }
    }

    pub fn read_word(&mut self) -> Result<u32> {
        self.check(4)?;
        let raw: [u8; 4] = self.reader.bytes[self.offset..self.offset + 4]
            .try_into()
            .unwrap();
        self.offset += 4;
        if self.reader.little_endian {
            Ok(u32::from_le_bytes(raw))
        } else {
            Ok(u32::from_be_bytes(raw))
        }
    }

    pub fn read_xword(&mut self) -> Result<u64> {
        self.check(8)?;
        let raw: [u8; 8] = self.reader.bytes[self.offset..self.offset + 8]
            .try_into()
            .unwrap();
        self.offset += 8;
        if self.reader.little_endian {
            Ok(u64::from_le_bytes(raw))
        } else {
            Ok(u64::from_be_bytes(raw))
        }
    }

    /// Read an unsigned integer of 1 to 8 bytes. Used for address-size and
    /// offset-size dependent fields.
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        if width == 0 || width > 8 {
            return Err(Error::MalformedHeader(format!("bad field width: {width}")));
        }
        self.check(width)?;
        let mut value = 0u64;
        if self.reader.little_endian {
            for i in (0..width).rev() {
                value = (value << 8) | self.reader.bytes[self.offset + i] as u64;
            }
        } else {
            for i in 0..width {
                value = (value << 8) | self.reader.bytes[self.offset + i] as u64;
            }
        }
        self.offset += width;
        Ok(value)
    }

    /// Like `read_uint` but sign-extends from the top bit of the field.
    pub fn read_sint(&mut self, width: usize) -> Result<i64> {
        let value = self.read_uint(width)?;
        if width < 8 {
            let shift = 64 - width * 8;
            Ok(((value << shift) as i64) >> shift)
        } else {
            Ok(value as i64)
        }
    }

    /// Unsigned LEB128. Accumulation is capped at 64 bits: extra continuation
    /// bytes are still consumed (so the cursor lands in the right place) but
    /// bits past the cap are dropped rather than wrapping.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift < 64 {
                result |= ((byte & 0x7f) as u64) << shift;
            }
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Signed LEB128: sign-extends from the 0x40 bit of the final byte.
    pub fn read_sleb128(&mut self) -> Result<i64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift < 64 {
                result |= ((byte & 0x7f) as u64) << shift;
            }
            if byte & 0x80 == 0 {
                shift += 7;
                if shift < 64 && byte & 0x40 != 0 {
                    result |= u64::MAX << shift;
                }
                return Ok(result as i64);
            }
            shift += 7;
        }
    }

    /// Read `count` raw bytes and return them as a borrowed slice.
    pub fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        self.check(count)?;
        let slice = &self.reader.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    /// Read a NUL-terminated string, returning the bytes before the NUL.
    /// DWARF producers are supposed to emit UTF-8 but old compilers don't,
    /// so the raw bytes are the honest representation.
    pub fn read_cstr(&mut self) -> Result<&'a [u8]> {
        let start = self.offset;
        loop {
            let byte = self.read_byte()?;
            if byte == 0 {
                return Ok(&self.reader.bytes[start..self.offset - 1]);
            }
        }
    }

    /// The initial-length field that starts most DWARF records: a 32-bit
    /// length, unless it is the 0xffffffff escape in which case a 64-bit
    /// length follows and the record uses the 64-bit format. 7.4 reserves
    /// 0xfffffff0..=0xfffffffe; seeing one means the data is garbage.
    pub fn read_initial_length(&mut self) -> Result<(u64, bool)> {
        let word = self.read_word()?;
        if word == 0xffff_ffff {
            Ok((self.read_xword()?, true))
        } else if word >= 0xffff_fff0 {
            Err(Error::MalformedHeader(format!(
                "reserved initial length {word:#x}"
            )))
        } else {
            Ok((word as u64, false))
        }
    }

    /// A section offset: 4 bytes in the 32-bit format, 8 in the 64-bit one.
    pub fn read_offset(&mut self, is_64bit: bool) -> Result<u64> {
        if is_64bit {
            self.read_xword()
        } else {
            Ok(self.read_word()? as u64)
        }
    }
}

/// LEB128 encoders used by the fixture builders in unit tests.
#[cfg(test)]
pub(crate) fn encode_uleb128(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_sleb128(mut value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        out.push(if done { byte } else { byte | 0x80 });
        if done {
            return out;
        }
    }
}
