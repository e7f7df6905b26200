// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The `frame` module deals with the header of an audio frame.

use log::debug;

use crate::codec::{self, BlockingStrategy, ChannelAssignment, Lookup};
use crate::counter::{self, BlockTime};
use crate::error::{Error, Result};
use crate::input::{BitCursor, ReadBytes};
use crate::metadata::StreamInfo;
use crate::ParseOptions;

/// The 14-bit pattern every frame header starts with.
pub const FRAME_SYNC_CODE: u16 = 0b11_1111_1111_1110;

/// A decoded frame header.
///
/// The codes are stored as they appear in the stream; the accessors resolve
/// them into values. Nothing here is validated unless the header was read
/// in strict mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameHeader {
    /// The 14-bit sync code, `0b11_1111_1111_1110` in a well-formed stream.
    pub sync_code: u16,
    /// The reserved bit after the sync code.
    pub reserved_after_sync: bool,
    pub blocking_strategy: BlockingStrategy,
    pub block_size_code: u8,
    pub sample_rate_code: u8,
    pub channel_assignment: ChannelAssignment,
    pub sample_size_code: u8,
    /// The reserved bit after the sample size code.
    pub reserved_after_sample_size: bool,
    /// The frame number or the sample number, as the blocking strategy says.
    pub block_time: BlockTime,
    /// The raw value of the trailing block size field, if the code has one.
    pub block_size_escape: Option<u64>,
    /// The raw value of the trailing sample rate field, if the code has one.
    pub sample_rate_escape: Option<u64>,
    /// The CRC-8 stored in the stream.
    pub crc8: u8,
    /// The CRC-8 computed over the header bytes preceding `crc8`.
    pub computed_crc8: u8,
}

/// Resolves a lookup plus the escape value that was read for it, if any.
fn resolve(lookup: Lookup, escape: Option<u64>) -> Option<u32> {
    match (lookup, escape) {
        (Lookup::Value(v), _) => Some(v),
        (Lookup::Escape(spec), Some(raw)) => Some(spec.apply(raw) as u32),
        _ => None,
    }
}

impl FrameHeader {
    /// The number of inter-channel samples in the frame.
    ///
    /// Returns `None` only for the reserved code 0.
    pub fn block_size(&self) -> Option<u32> {
        resolve(codec::block_size(self.block_size_code), self.block_size_escape)
    }

    /// The sample rate in Hz, or `None` if it is to be taken from STREAMINFO.
    pub fn sample_rate(&self) -> Option<u32> {
        codec::sample_rate(self.sample_rate_code)
            .ok()
            .and_then(|lookup| resolve(lookup, self.sample_rate_escape))
    }

    /// The sample rate in Hz, falling back to the STREAMINFO value.
    pub fn sample_rate_or(&self, streaminfo: &StreamInfo) -> u32 {
        self.sample_rate().unwrap_or(streaminfo.sample_rate)
    }

    /// Bits per sample, or `None` if it is to be taken from STREAMINFO.
    pub fn bits_per_sample(&self) -> Option<u32> {
        codec::sample_size(self.sample_size_code)
            .ok()
            .and_then(|lookup| resolve(lookup, None))
    }

    /// Bits per sample, falling back to the STREAMINFO value.
    pub fn bits_per_sample_or(&self, streaminfo: &StreamInfo) -> u32 {
        self.bits_per_sample().unwrap_or(streaminfo.bits_per_sample)
    }

    /// The number of channels, or `None` for a reserved channel assignment.
    pub fn channels(&self) -> Option<u32> {
        self.channel_assignment.channels()
    }

    /// The number of the first sample in the frame.
    ///
    /// For a frame number this multiplies by the block size of this frame,
    /// which is only right if every frame before it had the same size. Use
    /// `first_sample_number_or` when the STREAMINFO block is available.
    pub fn first_sample_number(&self) -> Option<u64> {
        match self.block_time {
            BlockTime::SampleNumber(n) => Some(n),
            BlockTime::FrameNumber(n) => self.block_size().map(|bs| n as u64 * bs as u64),
        }
    }

    /// The number of the first sample, using the STREAMINFO block size.
    ///
    /// In a fixed-blocksize stream all frames but the last have the maximum
    /// block size, so that is what a frame number counts in.
    pub fn first_sample_number_or(&self, streaminfo: &StreamInfo) -> u64 {
        match self.block_time {
            BlockTime::SampleNumber(n) => n,
            BlockTime::FrameNumber(n) => n as u64 * streaminfo.max_block_size as u64,
        }
    }
}

/// An audio frame. Only the header is decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
}

/// Attaches the name of the header field being read to an error.
fn in_field(field: &'static str) -> impl Fn(Error) -> Error {
    move |err| Error::InFrameHeader { field: field, source: Box::new(err) }
}

/// Reads the trailing field for an escape code, if there is one.
fn read_escape<R: ReadBytes>(input: &mut BitCursor<R>, lookup: Lookup) -> Result<Option<u64>> {
    match lookup {
        Lookup::Escape(spec) => Ok(Some(input.read_bits(spec.width)?)),
        _ => Ok(None),
    }
}

/// Reads a frame header, starting at the sync code.
///
/// Errors are wrapped in `Error::InFrameHeader`, naming the field where
/// reading stopped.
pub fn read_frame_header<R: ReadBytes>(input: &mut BitCursor<R>,
                                       options: &ParseOptions)
                                       -> Result<FrameHeader> {
    // The frame header includes a CRC-8 at the end. It is computed over
    // every bit the cursor hands out from here on.
    input.start_crc8();

    // First are 14 bits frame sync code, a reserved bit, and blocking stategy.
    let sync_code = input.read_bits(14).map_err(in_field("sync code"))? as u16;
    if options.strict && sync_code != FRAME_SYNC_CODE {
        return Err(in_field("sync code")(Error::InvalidFrameHeader("missing frame sync code")));
    }

    // The next bit has a mandatory value of 0 (at the moment of writing, if
    // the bit has a different value, it could be a future stream that we
    // cannot read).
    let reserved_after_sync = input.read_bool().map_err(in_field("reserved"))?;
    if options.strict && reserved_after_sync {
        return Err(in_field("reserved")(Error::InvalidFrameHeader("reserved bit is set")));
    }

    let strategy_bit = input.read_bool().map_err(in_field("blocking strategy"))?;
    let blocking_strategy = BlockingStrategy::from_bit(strategy_bit);

    // Next are 4 bits block size and 4 bits sample rate.
    let block_size_code = input.read_bits(4).map_err(in_field("block size"))? as u8;
    let block_size_lookup = codec::block_size(block_size_code);
    if options.strict && block_size_lookup == Lookup::Reserved {
        let err = Error::ReservedCode { field: "block size", code: block_size_code };
        return Err(in_field("block size")(err));
    }

    let sample_rate_code = input.read_bits(4).map_err(in_field("sample rate"))? as u8;
    let sample_rate_lookup = codec::sample_rate(sample_rate_code)
        .map_err(in_field("sample rate"))?;

    // Next are 4 bits channel assignment, 3 bits sample size, and 1 reserved bit.
    let channel_code = input.read_bits(4).map_err(in_field("channel assignment"))? as u8;
    let channel_assignment = codec::channel_assignment(channel_code);
    if let ChannelAssignment::Reserved(code) = channel_assignment {
        if options.strict {
            let err = Error::ReservedCode { field: "channel assignment", code: code };
            return Err(in_field("channel assignment")(err));
        }
    }

    let sample_size_code = input.read_bits(3).map_err(in_field("sample size"))? as u8;
    codec::sample_size(sample_size_code).map_err(in_field("sample size"))?;

    let reserved_after_sample_size = input.read_bool().map_err(in_field("reserved"))?;
    if options.strict && reserved_after_sample_size {
        return Err(in_field("reserved")(Error::InvalidFrameHeader("reserved bit is set")));
    }

    let block_time = counter::read_counter(input, blocking_strategy, options.counter_encoding)
        .map_err(in_field("counter"))?;

    // The escape fields come in this order: block size, then sample rate.
    let block_size_escape = read_escape(input, block_size_lookup)
        .map_err(in_field("block size escape"))?;
    let sample_rate_escape = read_escape(input, sample_rate_lookup)
        .map_err(in_field("sample rate escape"))?;

    // Next is an 8-bit CRC that is computed over the entire header so far.
    let computed_crc8 = input.finish_crc8();
    let crc8 = input.read_bits(8).map_err(in_field("crc"))? as u8;

    if options.verify_crc && crc8 != computed_crc8 {
        let err = Error::CrcMismatch { stored: crc8, computed: computed_crc8 };
        return Err(in_field("crc")(err));
    }

    let header = FrameHeader {
        sync_code: sync_code,
        reserved_after_sync: reserved_after_sync,
        blocking_strategy: blocking_strategy,
        block_size_code: block_size_code,
        sample_rate_code: sample_rate_code,
        channel_assignment: channel_assignment,
        sample_size_code: sample_size_code,
        reserved_after_sample_size: reserved_after_sample_size,
        block_time: block_time,
        block_size_escape: block_size_escape,
        sample_rate_escape: sample_rate_escape,
        crc8: crc8,
        computed_crc8: computed_crc8,
    };

    debug!("read frame header: {:?}, block size {:?}, sample rate {:?}, {:?}",
           header.block_time, header.block_size(), header.sample_rate(),
           header.channel_assignment);

    Ok(header)
}

/// Reads a frame. Only the header is decoded; the cursor is left after it.
pub fn read_frame<R: ReadBytes>(input: &mut BitCursor<R>, options: &ParseOptions) -> Result<Frame> {
    let header = read_frame_header(input, options)?;
    Ok(Frame { header: header })
}
