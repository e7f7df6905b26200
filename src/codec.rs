// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Lookup tables for the coded fields of a frame header.
//!
//! The frame header stores block size, sample rate and sample size as small
//! codes. Most codes map to a fixed value. Some defer to the STREAMINFO
//! block, and some mean that the value follows later in the header as an
//! extra field of a given width. The functions here only look up; reading
//! the extra field is up to the caller, guided by the returned `EscapeSpec`.

use crate::error::{Error, Result};

/// How the raw value of an escape field translates into the actual value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interpretation {
    /// The field stores the value minus one.
    PlusOne,
    /// The field stores the value in kHz.
    Kilohertz,
    /// The field stores the value in Hz.
    Hertz,
    /// The field stores the value in tens of Hz.
    TensOfHertz,
    /// The field stores a frame number, in a fixed-blocksize stream.
    FrameNumber,
    /// The field stores the number of the first sample, in a
    /// variable-blocksize stream.
    SampleNumber,
}

/// Describes a field whose presence and width depend on an earlier code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EscapeSpec {
    /// The width of the field in bits.
    pub width: u32,
    /// What the raw value means.
    pub interpretation: Interpretation,
}

impl EscapeSpec {
    /// Turns the raw field value into the value it encodes.
    pub fn apply(&self, raw: u64) -> u64 {
        match self.interpretation {
            Interpretation::PlusOne => raw + 1,
            Interpretation::Kilohertz => raw * 1000,
            Interpretation::TensOfHertz => raw * 10,
            Interpretation::Hertz
            | Interpretation::FrameNumber
            | Interpretation::SampleNumber => raw,
        }
    }

    /// The largest raw value that fits in the field.
    pub fn max_raw(&self) -> u64 {
        if self.width >= 64 { u64::max_value() } else { (1u64 << self.width) - 1 }
    }
}

/// The result of looking up a code in one of the tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// The code maps directly to this value.
    Value(u32),
    /// The value is the one in the STREAMINFO block.
    FromStreamInfo,
    /// The value is stored in an extra field later in the header.
    Escape(EscapeSpec),
    /// The code is reserved and carries no value.
    Reserved,
}

const fn escape(width: u32, interpretation: Interpretation) -> Lookup {
    Lookup::Escape(EscapeSpec { width: width, interpretation: interpretation })
}

static BLOCK_SIZE_TABLE: [Lookup; 16] = [
    Lookup::Reserved,
    Lookup::Value(192),
    // 576 * 2^(n - 2)
    Lookup::Value(576),
    Lookup::Value(1152),
    Lookup::Value(2304),
    Lookup::Value(4608),
    escape(8, Interpretation::PlusOne),
    escape(16, Interpretation::PlusOne),
    // 256 * 2^(n - 8)
    Lookup::Value(256),
    Lookup::Value(512),
    Lookup::Value(1024),
    Lookup::Value(2048),
    Lookup::Value(4096),
    Lookup::Value(8192),
    Lookup::Value(16384),
    Lookup::Value(32768),
];

static SAMPLE_RATE_TABLE: [Lookup; 16] = [
    Lookup::FromStreamInfo,
    Lookup::Value(88_200),
    Lookup::Value(176_400),
    Lookup::Value(192_000),
    Lookup::Value(8_000),
    Lookup::Value(16_000),
    Lookup::Value(22_050),
    Lookup::Value(24_000),
    Lookup::Value(32_000),
    Lookup::Value(44_100),
    Lookup::Value(48_000),
    Lookup::Value(96_000),
    escape(8, Interpretation::Kilohertz),
    escape(16, Interpretation::Hertz),
    escape(16, Interpretation::TensOfHertz),
    // Invalid, to prevent a string of 1s from looking like a sync code.
    Lookup::Reserved,
];

static SAMPLE_SIZE_TABLE: [Lookup; 8] = [
    Lookup::FromStreamInfo,
    Lookup::Value(8),
    Lookup::Value(12),
    Lookup::Reserved,
    Lookup::Value(16),
    Lookup::Value(20),
    Lookup::Value(24),
    Lookup::Reserved,
];

/// Looks up a 4-bit block size code.
///
/// Code 0 is reserved; it is returned as `Lookup::Reserved` rather than an
/// error, and it is up to the caller to decide whether that is fatal.
pub fn block_size(code: u8) -> Lookup {
    BLOCK_SIZE_TABLE[(code & 0b1111) as usize]
}

/// Looks up a 4-bit sample rate code. Code 15 is an error.
pub fn sample_rate(code: u8) -> Result<Lookup> {
    match SAMPLE_RATE_TABLE[(code & 0b1111) as usize] {
        Lookup::Reserved => Err(Error::ReservedCode { field: "sample rate", code: code }),
        lookup => Ok(lookup),
    }
}

/// Looks up a 3-bit sample size code. Codes 3 and 7 are errors.
pub fn sample_size(code: u8) -> Result<Lookup> {
    match SAMPLE_SIZE_TABLE[(code & 0b111) as usize] {
        Lookup::Reserved => Err(Error::ReservedCode { field: "sample size", code: code }),
        lookup => Ok(lookup),
    }
}

/// Whether a stream has a constant block size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockingStrategy {
    /// Every frame has the same block size, frames are numbered.
    Fixed,
    /// Block size may vary, frames carry the number of their first sample.
    Variable,
}

impl BlockingStrategy {
    pub fn from_bit(bit: bool) -> BlockingStrategy {
        if bit { BlockingStrategy::Variable } else { BlockingStrategy::Fixed }
    }
}

/// Returns the counter field that the blocking strategy selects.
///
/// The field is always present; the blocking strategy decides whether it is
/// a frame number of at most 31 bits or a sample number of at most 36 bits.
pub fn counter(strategy: BlockingStrategy) -> EscapeSpec {
    match strategy {
        BlockingStrategy::Fixed => EscapeSpec {
            width: 31,
            interpretation: Interpretation::FrameNumber,
        },
        BlockingStrategy::Variable => EscapeSpec {
            width: 36,
            interpretation: Interpretation::SampleNumber,
        },
    }
}

/// How the channels of a frame are coded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// The given number (1 through 8) of channels, coded as-is.
    Independent(u8),
    /// Channel 0 is the left channel, channel 1 is the side channel.
    LeftSide,
    /// Channel 0 is the side channel, channel 1 is the right channel.
    SideRight,
    /// Channel 0 is the mid channel, channel 1 is the side channel.
    MidSide,
    /// Codes 11 through 15 are reserved.
    Reserved(u8),
}

impl ChannelAssignment {
    /// The number of channels, or `None` for a reserved code.
    pub fn channels(&self) -> Option<u32> {
        match *self {
            ChannelAssignment::Independent(n) => Some(n as u32),
            ChannelAssignment::LeftSide
            | ChannelAssignment::SideRight
            | ChannelAssignment::MidSide => Some(2),
            ChannelAssignment::Reserved(..) => None,
        }
    }
}

/// Looks up a 4-bit channel assignment code.
pub fn channel_assignment(code: u8) -> ChannelAssignment {
    match code & 0b1111 {
        n if n < 8 => ChannelAssignment::Independent(n + 1),
        0b1000 => ChannelAssignment::LeftSide,
        0b1001 => ChannelAssignment::SideRight,
        0b1010 => ChannelAssignment::MidSide,
        n => ChannelAssignment::Reserved(n),
    }
}

#[test]
fn verify_block_size_table() {
    assert_eq!(block_size(0), Lookup::Reserved);
    assert_eq!(block_size(1), Lookup::Value(192));
    for n in 2..6u8 {
        assert_eq!(block_size(n), Lookup::Value(576 << (n - 2)));
    }
    for n in 8..16u8 {
        assert_eq!(block_size(n), Lookup::Value(256 << (n - 8)));
    }
    match block_size(6) {
        Lookup::Escape(spec) => {
            assert_eq!(spec.width, 8);
            assert_eq!(spec.apply(255), 256);
        }
        other => panic!("unexpected {:?}", other),
    }
    match block_size(7) {
        Lookup::Escape(spec) => {
            assert_eq!(spec.width, 16);
            assert_eq!(spec.apply(4095), 4096);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn verify_sample_rate_table() {
    let fixed = [88_200, 176_400, 192_000, 8_000, 16_000, 22_050,
                 24_000, 32_000, 44_100, 48_000, 96_000];
    assert_eq!(sample_rate(0).unwrap(), Lookup::FromStreamInfo);
    for (i, &hz) in fixed.iter().enumerate() {
        assert_eq!(sample_rate(i as u8 + 1).unwrap(), Lookup::Value(hz));
    }

    let escape_value = |code: u8, raw: u64| match sample_rate(code).unwrap() {
        Lookup::Escape(spec) => (spec.width, spec.apply(raw)),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(escape_value(12, 44), (8, 44_000));
    assert_eq!(escape_value(13, 44_100), (16, 44_100));
    assert_eq!(escape_value(14, 4_410), (16, 44_100));

    match sample_rate(15) {
        Err(Error::ReservedCode { code: 15, .. }) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn verify_sample_size_table() {
    assert_eq!(sample_size(0).unwrap(), Lookup::FromStreamInfo);
    assert_eq!(sample_size(1).unwrap(), Lookup::Value(8));
    assert_eq!(sample_size(2).unwrap(), Lookup::Value(12));
    assert_eq!(sample_size(4).unwrap(), Lookup::Value(16));
    assert_eq!(sample_size(5).unwrap(), Lookup::Value(20));
    assert_eq!(sample_size(6).unwrap(), Lookup::Value(24));
    assert!(sample_size(3).is_err());
    assert!(sample_size(7).is_err());
}

#[test]
fn verify_counter_width_follows_strategy() {
    let fixed = counter(BlockingStrategy::from_bit(false));
    assert_eq!(fixed.width, 31);
    assert_eq!(fixed.interpretation, Interpretation::FrameNumber);
    assert_eq!(fixed.max_raw(), 0x7fff_ffff);

    let variable = counter(BlockingStrategy::from_bit(true));
    assert_eq!(variable.width, 36);
    assert_eq!(variable.interpretation, Interpretation::SampleNumber);
    assert_eq!(variable.max_raw(), 0xf_ffff_ffff);
}

#[test]
fn verify_channel_assignment() {
    for code in 0..8u8 {
        assert_eq!(channel_assignment(code).channels(), Some(code as u32 + 1));
    }
    assert_eq!(channel_assignment(8), ChannelAssignment::LeftSide);
    assert_eq!(channel_assignment(9), ChannelAssignment::SideRight);
    assert_eq!(channel_assignment(10), ChannelAssignment::MidSide);
    assert_eq!(channel_assignment(10).channels(), Some(2));
    for code in 11..16u8 {
        assert_eq!(channel_assignment(code), ChannelAssignment::Reserved(code));
        assert_eq!(channel_assignment(code).channels(), None);
    }
}
