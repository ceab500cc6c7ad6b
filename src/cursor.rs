//! cursor.rs
//!
//! A tiny bounds-checked reader over a borrowed byte slice.
//!
//! Everything in a Standard MIDI File is big-endian, and delta times and
//! meta/SysEx lengths use MIDI's variable-length quantity (VLQ): 7 bits per
//! byte, most significant group first, high bit set on every byte but the last.
//!
//! Failed reads never move the cursor. Offsets in errors are absolute file
//! offsets, even for a cursor split off over a single track.

use byteorder::{BigEndian, ByteOrder};

use crate::error::DecodeError;

/// The SMF format never emits VLQs longer than this.
pub const MAX_VLQ_BYTES: usize = 4;

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Position relative to the start of this cursor's slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the whole file.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them, or fail without moving.
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEndOfInput {
                offset: self.offset(),
                wanted: n,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_be16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Three bytes, big-endian. Tempo meta events use this width.
    pub fn read_be24(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u24(self.take(3)?))
    }

    pub fn read_be32(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    /// Read a MIDI variable-length quantity of at most four bytes.
    ///
    /// A fourth byte that still has its continuation bit set is rejected as
    /// `InvalidFormat` rather than silently truncated.
    pub fn read_vlq(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let mut value: u32 = 0;

        for _ in 0..MAX_VLQ_BYTES {
            let byte = match self.read_u8() {
                Ok(b) => b,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        self.pos = start;
        Err(DecodeError::InvalidFormat {
            offset: self.base + start,
            reason: "variable-length quantity longer than 4 bytes",
        })
    }

    /// Split off a cursor over the next `len` bytes and advance past them.
    /// The new cursor borrows the same buffer; nothing is copied.
    pub fn sub_cursor(&mut self, len: usize) -> Result<ByteCursor<'a>, DecodeError> {
        let base = self.offset();
        let data = self.take(len)?;
        Ok(ByteCursor { data, pos: 0, base })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a value as a VLQ, for test inputs only.
    fn encode_vlq(mut v: u32) -> Vec<u8> {
        let mut out = vec![(v & 0x7F) as u8];
        v >>= 7;
        while v > 0 {
            out.push(((v & 0x7F) as u8) | 0x80);
            v >>= 7;
        }
        out.reverse();
        out
    }

    #[test]
    fn reads_big_endian_fields() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x01, 0x02];
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u8().unwrap(), 0x12);
        assert_eq!(c.read_be16().unwrap(), 0x3456);
        assert_eq!(c.read_be32().unwrap(), 0x789A_BCDE);
        assert_eq!(c.read_be24().unwrap(), 0xF0_0102);
        assert!(c.is_empty());
    }

    #[test]
    fn failed_reads_do_not_advance() {
        let bytes = [0x00, 0x01, 0x02];
        let mut c = ByteCursor::new(&bytes);
        c.read_u8().unwrap();

        let err = c.read_be32().unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEndOfInput { offset: 1, wanted: 4 });
        assert_eq!(c.position(), 1);

        assert!(c.skip(3).is_err());
        assert_eq!(c.position(), 1);
        c.skip(2).unwrap();
        assert!(c.is_empty());
        assert!(c.read_u8().unwrap_err().is_end_of_input());
    }

    #[test]
    fn vlq_known_encodings() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x00], 0),
            (&[0x40], 0x40),
            (&[0x7F], 0x7F),
            (&[0x81, 0x00], 0x80),
            (&[0xC0, 0x00], 0x2000),
            (&[0xFF, 0x7F], 0x3FFF),
            (&[0x81, 0x80, 0x00], 0x4000),
            (&[0xFF, 0xFF, 0x7F], 0x1F_FFFF),
            (&[0x81, 0x80, 0x80, 0x00], 0x20_0000),
            (&[0xFF, 0xFF, 0xFF, 0x7F], 0x0FFF_FFFF),
        ];
        for (bytes, want) in cases {
            let mut c = ByteCursor::new(bytes);
            assert_eq!(c.read_vlq().unwrap(), *want, "decoding {bytes:02X?}");
            assert!(c.is_empty());
            assert_eq!(encode_vlq(*want), *bytes);
        }
    }

    #[test]
    fn vlq_round_trips_across_byte_widths() {
        let mut v: u32 = 1;
        while v <= 0x0FFF_FFFF {
            for probe in [v - 1, v, v.saturating_add(v / 3).min(0x0FFF_FFFF)] {
                let enc = encode_vlq(probe);
                assert!(enc.len() <= MAX_VLQ_BYTES);
                let mut c = ByteCursor::new(&enc);
                assert_eq!(c.read_vlq().unwrap(), probe);
            }
            v <<= 1;
        }
    }

    #[test]
    fn vlq_rejects_fifth_byte() {
        let bytes = [0x81, 0x80, 0x80, 0x80, 0x00];
        let mut c = ByteCursor::new(&bytes);
        let err = c.read_vlq().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFormat { offset: 0, .. }));
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn truncated_vlq_restores_position() {
        let bytes = [0x00, 0x81, 0x80];
        let mut c = ByteCursor::new(&bytes);
        c.read_u8().unwrap();
        assert!(c.read_vlq().unwrap_err().is_end_of_input());
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn sub_cursor_reports_absolute_offsets() {
        let bytes = [0xAA, 0xBB, 0x01, 0x02, 0xCC];
        let mut outer = ByteCursor::new(&bytes);
        outer.skip(2).unwrap();

        let mut inner = outer.sub_cursor(2).unwrap();
        assert_eq!(outer.offset(), 4);
        assert_eq!(inner.offset(), 2);
        assert_eq!(inner.read_be16().unwrap(), 0x0102);

        let err = inner.read_u8().unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEndOfInput { offset: 4, wanted: 1 });
        assert_eq!(outer.read_u8().unwrap(), 0xCC);

        assert!(outer.sub_cursor(1).is_err());
    }
}
