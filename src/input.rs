// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Exposes the byte and bit level readers that all decoders share.
//!
//! `ReadBytes` is a minimal byte source, implemented by a buffered reader
//! and by `io::Cursor`. `BitCursor` sits on top of it and reads fields of
//! any width up to 64 bits, most significant bit first, without requiring
//! fields to be aligned to bytes.

use std::cmp;
use std::io;

use crate::crc::Crc8;
use crate::error::{Error, Result};

/// Similar to `std::io::BufRead`, but with the operations the cursor needs.
pub struct BufferedReader<R: io::Read> {
    /// The wrapped reader.
    inner: R,

    /// The buffer that holds data read from the inner reader.
    buf: Box<[u8]>,

    /// The index of the first byte in the buffer which has not been consumed.
    pos: usize,

    /// The number of bytes of the buffer which have meaningful content.
    num_valid: usize,
}

impl<R: io::Read> BufferedReader<R> {
    /// Wrap the reader in a new buffered reader.
    pub fn new(inner: R) -> BufferedReader<R> {
        // Metadata is usually a few kilobytes, and we stop after the first
        // frame header. When fuzzing we want to hit the refill paths often.
        #[cfg(not(fuzzing))]
        const CAPACITY: usize = 2048;

        #[cfg(fuzzing)]
        const CAPACITY: usize = 31;

        BufferedReader {
            inner: inner,
            buf: vec![0; CAPACITY].into_boxed_slice(),
            pos: 0,
            num_valid: 0,
        }
    }

    /// Refills the buffer if it is depleted. Returns false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        if self.pos == self.num_valid {
            self.pos = 0;
            self.num_valid = self.inner.read(&mut self.buf)?;
        }
        Ok(self.num_valid > 0)
    }
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of input")
}

/// A source of bytes, consumed front to back.
pub trait ReadBytes {
    /// Reads a single byte, failing on EOF.
    fn read_u8(&mut self) -> io::Result<u8>;

    /// Skips over the specified number of bytes.
    fn skip(&mut self, amount: u32) -> io::Result<()>;

    /// Fills `buf` completely, failing on EOF.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(())
    }
}

impl<R: io::Read> ReadBytes for BufferedReader<R> {
    #[inline]
    fn read_u8(&mut self) -> io::Result<u8> {
        if !self.fill()? {
            return Err(unexpected_eof());
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn skip(&mut self, amount: u32) -> io::Result<()> {
        let mut amount = amount as usize;
        while amount > 0 {
            if !self.fill()? {
                return Err(unexpected_eof());
            }
            let skip_now = cmp::min(amount, self.num_valid - self.pos);
            self.pos += skip_now;
            amount -= skip_now;
        }
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.fill()? {
                return Err(unexpected_eof());
            }
            let copy_now = cmp::min(buf.len() - filled, self.num_valid - self.pos);
            buf[filled..filled + copy_now]
                .copy_from_slice(&self.buf[self.pos..self.pos + copy_now]);
            self.pos += copy_now;
            filled += copy_now;
        }
        Ok(())
    }
}

impl<T: AsRef<[u8]>> ReadBytes for io::Cursor<T> {
    fn read_u8(&mut self) -> io::Result<u8> {
        let pos = self.position();
        if pos < self.get_ref().as_ref().len() as u64 {
            self.set_position(pos + 1);
            Ok(self.get_ref().as_ref()[pos as usize])
        } else {
            Err(unexpected_eof())
        }
    }

    fn skip(&mut self, amount: u32) -> io::Result<()> {
        let pos = self.position();
        if pos + amount as u64 <= self.get_ref().as_ref().len() as u64 {
            self.set_position(pos + amount as u64);
            Ok(())
        } else {
            Err(unexpected_eof())
        }
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        io::Read::read_exact(self, buf)
    }
}

/// Left shift that does not panic when shifting by the integer width.
#[inline(always)]
fn shift_left(x: u8, shift: u32) -> u8 {
    debug_assert!(shift <= 8);

    // We cannot shift a u8 by 8 or more, because Rust panics when shifting by
    // the integer width. But we can definitely shift a u32.
    ((x as u32) << shift) as u8
}

/// Right shift that does not panic when shifting by the integer width.
#[inline(always)]
fn shift_right(x: u8, shift: u32) -> u8 {
    debug_assert!(shift <= 8);
    ((x as u32) >> shift) as u8
}

/// Reads fields of arbitrary bit width from a byte source.
///
/// Bits are consumed most significant first, and a field may straddle any
/// number of byte boundaries. The cursor counts every bit it hands out, so
/// `bit_offset()` is always the position of the next field relative to where
/// the cursor started. There is no way back.
pub struct BitCursor<R: ReadBytes> {
    /// The source where bits are read from.
    reader: R,
    /// Data read from the reader, but not yet fully consumed.
    data: u8,
    /// The number of bits of `data` that have not been consumed.
    bits_left: u32,
    /// Total number of bits handed out so far.
    bit_offset: u64,
    /// When set, every consumed bit is fed into this CRC.
    crc: Option<Crc8>,
}

impl<R: ReadBytes> BitCursor<R> {
    /// Wraps the reader, starting at bit offset 0.
    pub fn new(reader: R) -> BitCursor<R> {
        BitCursor {
            reader: reader,
            data: 0,
            bits_left: 0,
            bit_offset: 0,
            crc: None,
        }
    }

    /// The number of bits consumed since the cursor was created.
    #[inline]
    pub fn bit_offset(&self) -> u64 {
        self.bit_offset
    }

    /// Whether the next read starts at a byte boundary.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.bits_left == 0
    }

    /// Starts computing a CRC-8 over all bits consumed from now on.
    pub fn start_crc8(&mut self) {
        self.crc = Some(Crc8::new());
    }

    /// Stops the CRC-8 started by `start_crc8`, and returns its value.
    ///
    /// Returns 0 if no CRC was being computed.
    pub fn finish_crc8(&mut self) -> u8 {
        self.crc.take().map_or(0, |crc| crc.value())
    }

    /// Generates a bitmask with 1s in the `bits` most significant bits.
    #[inline(always)]
    fn mask_u8(bits: u32) -> u8 {
        debug_assert!(bits <= 8);

        shift_left(0xff, 8 - bits)
    }

    /// Records that `bits` bits with the given value were handed out.
    #[inline]
    fn consumed(&mut self, value: u64, bits: u32) {
        self.bit_offset += bits as u64;
        if let Some(ref mut crc) = self.crc {
            crc.update_bits(value, bits);
        }
    }

    /// Reads a single bit.
    pub fn read_bool(&mut self) -> Result<bool> {
        // If no bits are left, we will need to read the next byte.
        let result = if self.bits_left == 0 {
            let offset = self.bit_offset;
            let fresh_byte = self.reader.read_u8().map_err(|e| Error::from_io(e, offset))?;

            // What remains later are the 7 least significant bits.
            self.data = fresh_byte << 1;
            self.bits_left = 7;

            // What we report is the most significant bit of the fresh byte.
            fresh_byte & 0b1000_0000
        } else {
            // Consume the most significant bit of the buffer byte.
            let bit = self.data & 0b1000_0000;
            self.data = self.data << 1;
            self.bits_left = self.bits_left - 1;
            bit
        };

        let bit = result != 0;
        self.consumed(bit as u64, 1);
        Ok(bit)
    }

    /// Reads `bits` bits (at most 64) as an unsigned big-endian integer.
    pub fn read_bits(&mut self, bits: u32) -> Result<u64> {
        assert!(bits <= 64, "cannot read more than 64 bits at once");

        let offset = self.bit_offset;
        let value = self.read_leq_u64(bits).map_err(|e| Error::from_io(e, offset))?;
        self.consumed(value, bits);
        Ok(value)
    }

    /// Reads four bytes as a little-endian 32-bit unsigned integer.
    ///
    /// The Vorbis comment block is the only place in the format where this
    /// byte order is used.
    pub fn read_le_u32(&mut self) -> Result<u32> {
        let offset = self.bit_offset;
        let stream_order = self.read_leq_u32(32).map_err(|e| Error::from_io(e, offset))?;
        self.consumed(stream_order as u64, 32);
        Ok(stream_order.swap_bytes())
    }

    /// Reads `count` whole bytes.
    ///
    /// The read need not start at a byte boundary, but it is a lot cheaper
    /// when it does.
    pub fn read_aligned(&mut self, count: usize) -> Result<Vec<u8>> {
        let offset = self.bit_offset;
        let mut buf = vec![0u8; count];

        if self.is_aligned() {
            self.reader.read_into(&mut buf).map_err(|e| Error::from_io(e, offset))?;
        } else {
            for byte in buf.iter_mut() {
                *byte = self.read_leq_u8(8).map_err(|e| Error::from_io(e, offset))?;
            }
        }

        self.bit_offset += 8 * count as u64;
        if let Some(ref mut crc) = self.crc {
            crc.update(&buf);
        }
        Ok(buf)
    }

    /// Skips over `count` whole bytes without storing them.
    pub fn skip_aligned(&mut self, count: u32) -> Result<()> {
        if self.is_aligned() && self.crc.is_none() {
            let offset = self.bit_offset;
            self.reader.skip(count).map_err(|e| Error::from_io(e, offset))?;
            self.bit_offset += 8 * count as u64;
        } else {
            for _ in 0..count {
                self.read_bits(8)?;
            }
        }
        Ok(())
    }

    /// Reads at most eight bits.
    #[inline(always)]
    fn read_leq_u8(&mut self, bits: u32) -> io::Result<u8> {
        debug_assert!(bits <= 8);

        // If not enough bits left, we will need to read the next byte.
        let result = if self.bits_left < bits {
            // Most significant bits are shifted to the right position already.
            let msb = self.data;

            // Read a single byte.
            self.data = self.reader.read_u8()?;

            // From the next byte, we take the additional bits that we need.
            // Those start at the most significant bit, so we need to shift so
            // that it does not overlap with what we have already.
            let lsb = (self.data & BitCursor::<R>::mask_u8(bits - self.bits_left))
                >> self.bits_left;

            // Shift out the bits that we have consumed.
            self.data = shift_left(self.data, bits - self.bits_left);
            self.bits_left = 8 - (bits - self.bits_left);

            msb | lsb
        } else {
            let result = self.data & BitCursor::<R>::mask_u8(bits);

            // Shift out the bits that we have consumed.
            self.data = shift_left(self.data, bits);
            self.bits_left = self.bits_left - bits;

            result
        };

        // If there are more than 8 bits left, we read too far.
        debug_assert!(self.bits_left < 8);

        // The least significant bits should be zero.
        debug_assert_eq!(self.data & !BitCursor::<R>::mask_u8(self.bits_left), 0u8);

        // The resulting data is padded with zeros in the least significant
        // bits, but we want to pad in the most significant bits, so shift.
        Ok(shift_right(result, 8 - bits))
    }

    /// Reads at most 16 bits.
    #[inline(always)]
    fn read_leq_u16(&mut self, bits: u32) -> io::Result<u16> {
        debug_assert!(bits <= 16);

        // Note: the following is not the most efficient implementation
        // possible, but it avoids duplicating the complexity of `read_leq_u8`.

        if bits <= 8 {
            let result = self.read_leq_u8(bits)?;
            Ok(result as u16)
        } else {
            // First read the 8 most significant bits, then read what is left.
            let msb = self.read_leq_u8(8)? as u16;
            let lsb = self.read_leq_u8(bits - 8)? as u16;
            Ok((msb << (bits - 8)) | lsb)
        }
    }

    /// Reads at most 32 bits.
    #[inline(always)]
    fn read_leq_u32(&mut self, bits: u32) -> io::Result<u32> {
        debug_assert!(bits <= 32);

        if bits <= 16 {
            let result = self.read_leq_u16(bits)?;
            Ok(result as u32)
        } else {
            // First read the 16 most significant bits, then read what is left.
            let msb = self.read_leq_u16(16)? as u32;
            let lsb = self.read_leq_u16(bits - 16)? as u32;
            Ok((msb << (bits - 16)) | lsb)
        }
    }

    /// Reads at most 64 bits.
    #[inline(always)]
    fn read_leq_u64(&mut self, bits: u32) -> io::Result<u64> {
        debug_assert!(bits <= 64);

        if bits <= 32 {
            let result = self.read_leq_u32(bits)?;
            Ok(result as u64)
        } else {
            let msb = self.read_leq_u32(32)? as u64;
            let lsb = self.read_leq_u32(bits - 32)? as u64;
            Ok((msb << (bits - 32)) | lsb)
        }
    }
}

#[cfg(test)]
fn cursor_over(bytes: Vec<u8>) -> BitCursor<BufferedReader<io::Cursor<Vec<u8>>>> {
    BitCursor::new(BufferedReader::new(io::Cursor::new(bytes)))
}

#[test]
fn verify_read_u8_buffered_reader() {
    let mut reader = BufferedReader::new(io::Cursor::new(vec![0u8, 2, 129, 89, 122]));
    assert_eq!(reader.read_u8().unwrap(), 0);
    assert_eq!(reader.read_u8().unwrap(), 2);
    assert_eq!(reader.read_u8().unwrap(), 129);
    assert_eq!(reader.read_u8().unwrap(), 89);
    assert_eq!(reader.read_u8().unwrap(), 122);
    assert!(reader.read_u8().is_err());
}

#[test]
fn verify_read_into_and_skip_buffered_reader() {
    // More data than fits in the buffer, to exercise refills.
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let mut reader = BufferedReader::new(io::Cursor::new(data.clone()));

    let mut buf = vec![0u8; 3000];
    reader.read_into(&mut buf).unwrap();
    assert_eq!(&buf[..], &data[..3000]);

    reader.skip(1500).unwrap();
    assert_eq!(reader.read_u8().unwrap(), data[4500]);

    let mut rest = vec![0u8; 500];
    assert_eq!(reader.read_into(&mut rest).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn verify_skip_cursor() {
    let mut cursor = io::Cursor::new(vec![2u8, 3, 5, 7, 11]);
    cursor.skip(3).unwrap();
    assert_eq!(cursor.read_u8().unwrap(), 7);
    assert!(cursor.skip(2).is_err());
}

#[test]
fn verify_read_bool() {
    let mut bits = cursor_over(vec![0b1010_0100, 0b1110_0001]);

    assert_eq!(bits.read_bool().unwrap(), true);
    assert_eq!(bits.read_bool().unwrap(), false);
    assert_eq!(bits.read_bool().unwrap(), true);
    // Mix in reading more bits as well, to ensure that they are compatible.
    assert_eq!(bits.read_bits(1).unwrap(), 0);
    assert_eq!(bits.read_bool().unwrap(), false);
    assert_eq!(bits.read_bool().unwrap(), true);
    assert_eq!(bits.read_bool().unwrap(), false);
    assert_eq!(bits.read_bool().unwrap(), false);

    assert_eq!(bits.read_bool().unwrap(), true);
    assert_eq!(bits.read_bool().unwrap(), true);
    assert_eq!(bits.read_bool().unwrap(), true);
    assert_eq!(bits.read_bits(2).unwrap(), 0);
    assert_eq!(bits.read_bool().unwrap(), false);
    assert_eq!(bits.read_bool().unwrap(), false);
    assert_eq!(bits.read_bool().unwrap(), true);

    assert!(bits.read_bool().is_err());
}

#[test]
fn verify_read_bits_leq_8() {
    let mut bits = cursor_over(vec![0b1010_0101,
                                    0b1110_0001,
                                    0b1101_0010,
                                    0b0101_0101,
                                    0b0111_0011,
                                    0b0011_1111,
                                    0b1010_1010,
                                    0b0000_1100]);

    assert_eq!(bits.read_bits(0).unwrap(), 0);
    assert_eq!(bits.read_bits(1).unwrap(), 1);
    assert_eq!(bits.read_bits(1).unwrap(), 0);
    assert_eq!(bits.read_bits(2).unwrap(), 0b10);
    assert_eq!(bits.read_bits(2).unwrap(), 0b01);
    assert_eq!(bits.read_bits(3).unwrap(), 0b011);
    assert_eq!(bits.read_bits(3).unwrap(), 0b110);
    assert_eq!(bits.read_bits(4).unwrap(), 0b0001);
    assert_eq!(bits.read_bits(5).unwrap(), 0b11010);
    assert_eq!(bits.read_bits(6).unwrap(), 0b010010);
    assert_eq!(bits.read_bits(7).unwrap(), 0b1010101);
    assert_eq!(bits.read_bits(8).unwrap(), 0b11001100);
    assert_eq!(bits.read_bits(6).unwrap(), 0b111111);
    assert_eq!(bits.read_bits(8).unwrap(), 0b10101010);
    assert_eq!(bits.read_bits(4).unwrap(), 0b0000);
    assert_eq!(bits.read_bits(1).unwrap(), 1);
    assert_eq!(bits.read_bits(1).unwrap(), 1);
    assert_eq!(bits.read_bits(2).unwrap(), 0b00);
    assert_eq!(bits.bit_offset(), 64);
}

#[test]
fn verify_read_bits_leq_32() {
    let mut bits = cursor_over(vec![0b1010_0101, 0b1110_0001, 0b1101_0010, 0b0101_0101]);

    assert_eq!(bits.read_bits(1).unwrap(), 1);
    assert_eq!(bits.read_bits(17).unwrap(), 0b010_0101_1110_0001_11);
    assert_eq!(bits.read_bits(14).unwrap(), 0b01_0010_0101_0101);
}

#[test]
fn verify_read_bits_wide() {
    let mut bits = cursor_over(vec![0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
                                    0x0f, 0xed, 0xcb, 0xa9, 0x87, 0x65, 0x43, 0x21, 0xff]);

    // A 36-bit total-samples style field, then the 4 bits that remain of
    // the fifth byte.
    assert_eq!(bits.read_bits(36).unwrap(), 0x1_2345_6789);
    assert_eq!(bits.read_bits(4).unwrap(), 0xa);
    assert_eq!(bits.read_bits(20).unwrap(), 0xbcdef);
    assert_eq!(bits.read_bits(4).unwrap(), 0x0);
    assert_eq!(bits.read_bits(64).unwrap(), 0x0fed_cba9_8765_4321);
    assert_eq!(bits.bit_offset(), 128);
    assert!(bits.is_aligned());
}

#[test]
fn verify_read_aligned_unaligned() {
    let mut bits = cursor_over(vec![0b1010_1111, 0b0000_1111, 0b1100_0000]);

    assert_eq!(bits.read_bits(4).unwrap(), 0b1010);
    assert_eq!(bits.read_aligned(2).unwrap(), vec![0b1111_0000, 0b1111_1100]);
    assert_eq!(bits.read_bits(4).unwrap(), 0);
    assert_eq!(bits.bit_offset(), 24);
}

#[test]
fn verify_read_aligned_and_skip() {
    let mut bits = cursor_over(b"fLaC\x00\x01\x02\x03\x04".to_vec());

    assert_eq!(&bits.read_aligned(4).unwrap()[..], b"fLaC");
    bits.skip_aligned(2).unwrap();
    assert_eq!(bits.read_bits(8).unwrap(), 0x02);
    assert_eq!(bits.read_le_u32().map_err(|e| e.to_string()).unwrap_err(),
               "input truncated at bit offset 56");
}

#[test]
fn verify_truncation_reports_field_offset() {
    let mut bits = cursor_over(vec![0xff, 0xff]);

    bits.read_bits(3).unwrap();
    match bits.read_bits(16) {
        Err(Error::TruncatedInput { bit_offset }) => assert_eq!(bit_offset, 3),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn verify_crc_tap() {
    let data = vec![0xff, 0xf8, 0x69, 0x18, 0x00, 0x00, 0x42];
    let mut bits = cursor_over(data.clone());

    bits.start_crc8();
    bits.read_bits(14).unwrap();
    bits.read_bool().unwrap();
    bits.read_bool().unwrap();
    bits.read_bits(4).unwrap();
    bits.read_bits(4).unwrap();
    bits.read_bits(4).unwrap();
    bits.read_bits(3).unwrap();
    bits.read_bool().unwrap();
    bits.read_aligned(2).unwrap();
    assert_eq!(bits.finish_crc8(), Crc8::compute(&data[..6]));

    // Bits read after the tap is removed do not count.
    assert_eq!(bits.read_bits(8).unwrap(), 0x42);
    assert_eq!(bits.finish_crc8(), 0);
}
