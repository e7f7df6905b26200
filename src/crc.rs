// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! CRC-8 as used by the frame header.
//!
//! The polynomial is x^8 + x^2 + x^1 + x^0, the initial value is 0, and bits
//! are processed most significant first without reflection.

const CRC8_POLYNOMIAL: u8 = 0x07;

const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Computes a CRC-8 incrementally.
///
/// Input can be fed as whole bytes, or as runs of bits that need not be a
/// multiple of eight long. Feeding eight bits at a time is equivalent to
/// feeding the byte.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc8 {
    crc: u8,
}

impl Crc8 {
    pub fn new() -> Crc8 {
        Crc8 { crc: 0 }
    }

    #[inline]
    pub fn update_byte(&mut self, byte: u8) {
        self.crc = CRC8_TABLE[(self.crc ^ byte) as usize];
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Feeds the `bits` least significant bits of `value`, most significant first.
    pub fn update_bits(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 64);

        let mut remaining = bits;

        // Whole bytes can go through the table.
        while remaining >= 8 {
            remaining -= 8;
            self.update_byte((value >> remaining) as u8);
        }

        for i in (0..remaining).rev() {
            let bit = ((value >> i) & 1) as u8;
            let top = (self.crc >> 7) ^ bit;
            self.crc <<= 1;
            if top == 1 {
                self.crc ^= CRC8_POLYNOMIAL;
            }
        }
    }

    pub fn value(&self) -> u8 {
        self.crc
    }

    /// Computes the CRC-8 of a byte slice in one call.
    pub fn compute(data: &[u8]) -> u8 {
        let mut crc = Crc8::new();
        crc.update(data);
        crc.value()
    }
}

#[test]
fn verify_crc8_known_values() {
    assert_eq!(Crc8::compute(&[]), 0x00);
    assert_eq!(Crc8::compute(&[0x00]), 0x00);
    assert_eq!(Crc8::compute(&[0x01]), 0x07);
    assert_eq!(Crc8::compute(&[0x02]), 0x0e);
    // The standard check value for CRC-8/SMBUS.
    assert_eq!(Crc8::compute(b"123456789"), 0xf4);
}

#[test]
fn verify_crc8_bits_match_bytes() {
    let data = [0xff, 0xf8, 0x69, 0x18, 0x00, 0x00];
    let expected = Crc8::compute(&data);

    // Same data, fed in awkward bit-sized pieces.
    let mut crc = Crc8::new();
    crc.update_bits(0b11_1111_1111_1110, 14);
    crc.update_bits(0, 1);
    crc.update_bits(0, 1);
    crc.update_bits(0x6, 4);
    crc.update_bits(0x9, 4);
    crc.update_bits(0x1, 4);
    crc.update_bits(0x4, 3);
    crc.update_bits(0, 1);
    crc.update_bits(0, 16);
    assert_eq!(crc.value(), expected);

    let mut whole = Crc8::new();
    whole.update_bits(0xfff8_6918_0000, 48);
    assert_eq!(whole.value(), expected);
}
