// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Decoding of the frame number or sample number in a frame header.

use crate::codec::{self, BlockingStrategy, Interpretation};
use crate::error::{Error, Result};
use crate::input::{BitCursor, ReadBytes};

/// How the frame or sample number is stored in the frame header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CounterEncoding {
    /// The variable-length "UTF-8" coding of the FLAC format, one
    /// to seven bytes long. This is what encoders write.
    Utf8,
    /// A plain 31-bit (frame number) or 36-bit (sample number) field.
    ///
    /// Some simplified readers parse the field like this. It is not
    /// compatible with encoder output for values that need fewer bytes, and
    /// exists to read streams produced by such tools.
    FixedWidth,
}

impl Default for CounterEncoding {
    fn default() -> CounterEncoding {
        CounterEncoding::Utf8
    }
}

/// Position of a frame in the stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockTime {
    /// Frame number, in a fixed-blocksize stream.
    FrameNumber(u32),
    /// Number of the first sample in the frame, in a variable-blocksize stream.
    SampleNumber(u64),
}

/// Reads a variable-length integer encoded as what is called "UTF-8" coding
/// by the FLAC format. (It is not real UTF-8.) This function can read
/// integers encoded in this way up to 36-bit integers.
pub fn read_utf8_int<R: ReadBytes>(input: &mut BitCursor<R>) -> Result<u64> {
    let first = input.read_bits(8)? as u8;

    // A single byte when the most significant bit is 0.
    if first & 0b1000_0000 == 0 {
        return Ok(first as u64);
    }

    // Otherwise the number of leading 1s is the total number of bytes,
    // except that a single leading 1 marks a continuation byte, which cannot
    // come first.
    let num_bytes = (!first).leading_zeros();
    if num_bytes == 1 || num_bytes == 8 {
        return Err(Error::InvalidCounter);
    }

    // The first byte holds 7 - num_bytes bits of data. For 0xfe that is none.
    let mask_data = 0b0111_1111u8 >> num_bytes;
    let mut result = (first & mask_data) as u64;

    for _ in 1..num_bytes {
        let byte = input.read_bits(8)? as u8;

        // The two most significant bits _must_ be 10.
        if byte & 0b1100_0000 != 0b1000_0000 {
            return Err(Error::InvalidCounter);
        }

        // Each additional byte will yield 6 extra bits.
        result = (result << 6) | (byte & 0b0011_1111) as u64;
    }

    Ok(result)
}

/// Reads the frame or sample number, whichever `strategy` selects.
pub fn read_counter<R: ReadBytes>(
    input: &mut BitCursor<R>,
    strategy: BlockingStrategy,
    encoding: CounterEncoding,
) -> Result<BlockTime> {
    let spec = codec::counter(strategy);

    let raw = match encoding {
        CounterEncoding::Utf8 => {
            let value = read_utf8_int(input)?;
            // A frame number must fit in 31 bits, a sample number in 36.
            if value > spec.max_raw() {
                return Err(Error::InvalidCounter);
            }
            value
        }
        CounterEncoding::FixedWidth => input.read_bits(spec.width)?,
    };

    let value = spec.apply(raw);
    let block_time = match spec.interpretation {
        Interpretation::FrameNumber => BlockTime::FrameNumber(value as u32),
        _ => BlockTime::SampleNumber(value),
    };
    Ok(block_time)
}

#[cfg(test)]
fn cursor_over(bytes: Vec<u8>) -> BitCursor<std::io::Cursor<Vec<u8>>> {
    BitCursor::new(std::io::Cursor::new(bytes))
}

#[test]
fn verify_read_utf8_int() {
    let mut input = cursor_over(vec![0x24, 0xc2, 0xa2, 0xe2, 0x82, 0xac,
                                     0xf0, 0x90, 0x8d, 0x88, 0xc2, 0x00,
                                     0x80]);
    assert_eq!(read_utf8_int(&mut input).unwrap(), 0x24);
    assert_eq!(read_utf8_int(&mut input).unwrap(), 0xa2);
    assert_eq!(read_utf8_int(&mut input).unwrap(), 0x20ac);
    assert_eq!(read_utf8_int(&mut input).unwrap(), 0x010348);
    // Two-byte integer with invalid continuation byte should fail.
    match read_utf8_int(&mut input) {
        Err(Error::InvalidCounter) => {}
        other => panic!("unexpected {:?}", other),
    }
    // Continuation byte can never be the first byte.
    match read_utf8_int(&mut input) {
        Err(Error::InvalidCounter) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn verify_read_utf8_int_36_bits() {
    let mut input = cursor_over(vec![0xfe, 0xbf, 0xbf, 0xbf, 0xbf, 0xbf, 0xbf, 0xff]);
    assert_eq!(read_utf8_int(&mut input).unwrap(), 0xf_ffff_ffff);
    // Eight leading ones is never valid.
    assert!(read_utf8_int(&mut input).is_err());
}

#[test]
fn verify_read_counter_utf8() {
    // Frame number 0x20ac in three bytes, then the same as a sample number.
    let mut input = cursor_over(vec![0xe2, 0x82, 0xac, 0xe2, 0x82, 0xac]);
    assert_eq!(read_counter(&mut input, BlockingStrategy::Fixed, CounterEncoding::Utf8).unwrap(),
               BlockTime::FrameNumber(0x20ac));
    assert_eq!(read_counter(&mut input, BlockingStrategy::Variable, CounterEncoding::Utf8).unwrap(),
               BlockTime::SampleNumber(0x20ac));
    assert_eq!(input.bit_offset(), 48);
}

#[test]
fn verify_read_counter_frame_number_range() {
    // A 36-bit value is a valid sample number, but not a valid frame number.
    let bytes = vec![0xfe, 0x82, 0x80, 0x80, 0x80, 0x80, 0x80];
    let mut input = cursor_over(bytes.clone());
    assert_eq!(read_counter(&mut input, BlockingStrategy::Variable, CounterEncoding::Utf8).unwrap(),
               BlockTime::SampleNumber(1 << 31));

    let mut input = cursor_over(bytes);
    match read_counter(&mut input, BlockingStrategy::Fixed, CounterEncoding::Utf8) {
        Err(Error::InvalidCounter) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn verify_read_counter_fixed_width() {
    // 31 bits of frame number followed by a single 1 bit, then 36 bits of
    // sample number followed by 4 bits of padding.
    let mut input = cursor_over(vec![0x00, 0x00, 0x00, 0x0b,
                                     0x00, 0x00, 0x00, 0x01, 0x20]);
    assert_eq!(read_counter(&mut input, BlockingStrategy::Fixed, CounterEncoding::FixedWidth).unwrap(),
               BlockTime::FrameNumber(5));
    assert_eq!(input.read_bool().unwrap(), true);
    assert_eq!(read_counter(&mut input, BlockingStrategy::Variable, CounterEncoding::FixedWidth).unwrap(),
               BlockTime::SampleNumber(0x12));
    assert_eq!(input.bit_offset(), 68);
}
