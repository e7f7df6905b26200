// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Clarion, a parser for the container structure of FLAC streams.
//!
//! A FLAC stream starts with the marker `fLaC`, followed by metadata blocks
//! and then audio frames. Clarion reads the marker, every metadata block, and
//! the header of the first frame. It does not decode audio.
//!
//! Examples
//! ========
//!
//! Print the tags of a file:
//!
//! ```no_run
//! let stream = clarion::Stream::open("testsamples/short.flac").unwrap();
//! for (name, value) in stream.tags() {
//!     println!("{}: {}", name, value);
//! }
//! ```
//!
//! Parse as far as possible, keeping whatever was decoded before an error:
//!
//! ```
//! let data = b"fLaC\x81\x00\x00\x04\x00\x00\x00\x00";
//! let (stream, error) = clarion::parse(&data[..]);
//! assert_eq!(stream.metadata_blocks().len(), 1);
//! assert!(error.is_some());
//! ```

use std::fs;
use std::io;
use std::path;

use log::{debug, warn};

pub mod codec;
pub mod counter;
pub mod crc;
pub mod error;
pub mod frame;
pub mod input;
pub mod metadata;

pub use crate::counter::{BlockTime, CounterEncoding};
pub use crate::error::{Error, Result};
pub use crate::frame::{Frame, FrameHeader};
pub use crate::metadata::{BlockType, MetadataBlock, MetadataBlockBody, StreamInfo};

use crate::input::{BitCursor, BufferedReader, ReadBytes};
use crate::metadata::{CueSheet, GetTag, MetadataBlockReader, Picture, SeekTable, Tags,
                      VorbisComment};

/// The four bytes every FLAC stream starts with.
pub const STREAM_MARKER: [u8; 4] = *b"fLaC";

/// Controls how strictly a stream is parsed, and how far.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParseOptions {
    /// How the frame or sample number in a frame header is stored.
    ///
    /// Defaults to `CounterEncoding::Utf8`.
    pub counter_encoding: CounterEncoding,

    /// When set, violations of the format that a lenient reader can step
    /// over are errors: a bad frame sync code, reserved bits or codes in the
    /// frame header, a STREAMINFO block that breaks its constraints, and a
    /// first metadata block that is not STREAMINFO.
    ///
    /// Defaults to false.
    pub strict: bool,

    /// When set, a frame header whose CRC-8 does not match is an error.
    ///
    /// Defaults to false. The computed CRC is always available as
    /// `FrameHeader::computed_crc8`.
    pub verify_crc: bool,

    /// When set, parsing stops after the last metadata block.
    ///
    /// Defaults to false.
    pub metadata_only: bool,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            counter_encoding: CounterEncoding::Utf8,
            strict: false,
            verify_crc: false,
            metadata_only: false,
        }
    }
}

/// The structure of a FLAC stream: its metadata blocks and first frame.
#[derive(Debug)]
pub struct Stream {
    marker: [u8; 4],
    metadata_blocks: Vec<MetadataBlock>,
    frames: Vec<Frame>,
    warnings: Vec<Error>,
}

impl Stream {
    fn empty() -> Stream {
        Stream {
            marker: [0; 4],
            metadata_blocks: Vec::new(),
            frames: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Parses a stream, failing if any part of it fails to parse.
    pub fn read<R: io::Read>(source: R) -> Result<Stream> {
        Stream::read_with_options(source, ParseOptions::default())
    }

    /// Parses a stream with the given options, failing on the first error.
    pub fn read_with_options<R: io::Read>(source: R, options: ParseOptions) -> Result<Stream> {
        match parse_with_options(source, options) {
            (stream, None) => Ok(stream),
            (_, Some(err)) => Err(err),
        }
    }

    /// Opens and parses the file at the given path.
    ///
    /// The file is closed again before this returns.
    pub fn open<P: AsRef<path::Path>>(path: P) -> Result<Stream> {
        let file = fs::File::open(path)?;
        Stream::read(file)
    }

    /// The marker that was read, `fLaC` unless parsing failed on it.
    pub fn marker(&self) -> [u8; 4] {
        self.marker
    }

    /// All metadata blocks that were read, in stream order.
    pub fn metadata_blocks(&self) -> &[MetadataBlock] {
        &self.metadata_blocks
    }

    /// The frames that were read. Only the first frame header is decoded.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Problems that did not stop the parse.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    /// Returns the first STREAMINFO block, if there is one.
    pub fn streaminfo(&self) -> Option<&StreamInfo> {
        self.metadata_blocks.iter().filter_map(|block| match block.body {
            MetadataBlockBody::StreamInfo(ref info) => Some(info),
            _ => None,
        }).next()
    }

    /// Returns the Vorbis comment block, if there is one.
    pub fn vorbis_comment(&self) -> Option<&VorbisComment> {
        self.metadata_blocks.iter().filter_map(|block| match block.body {
            MetadataBlockBody::VorbisComment(ref comment) => Some(comment),
            _ => None,
        }).next()
    }

    /// Name-value pairs from the first VORBIS_COMMENT block, in stream order.
    ///
    /// Empty when the stream has no such block.
    pub fn tags(&self) -> Tags {
        match self.vorbis_comment() {
            Some(comment) => comment.tags(),
            None => Tags::new(&[]),
        }
    }

    /// Values of every tag named `tag_name`, compared ignoring ASCII case.
    pub fn get_tag<'a>(&'a self, tag_name: &'a str) -> GetTag<'a> {
        match self.vorbis_comment() {
            Some(comment) => comment.get_tag(tag_name),
            None => GetTag::new(&[], tag_name),
        }
    }

    /// Iterates over all PICTURE blocks.
    pub fn pictures(&self) -> impl Iterator<Item = &Picture> {
        self.metadata_blocks.iter().filter_map(|block| match block.body {
            MetadataBlockBody::Picture(ref picture) => Some(picture),
            _ => None,
        })
    }

    /// Returns the seek table, if there is one.
    pub fn seek_table(&self) -> Option<&SeekTable> {
        self.metadata_blocks.iter().filter_map(|block| match block.body {
            MetadataBlockBody::SeekTable(ref table) => Some(table),
            _ => None,
        }).next()
    }

    /// Returns the CUE sheet, if there is one.
    pub fn cue_sheet(&self) -> Option<&CueSheet> {
        self.metadata_blocks.iter().filter_map(|block| match block.body {
            MetadataBlockBody::CueSheet(ref cue_sheet) => Some(cue_sheet),
            _ => None,
        }).next()
    }

    /// Returns the first frame, unless parsing stopped before it.
    pub fn first_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }
}

/// Parses a stream with default options.
///
/// Returns everything that was decoded, together with the error that stopped
/// the parse, if any. Errors carry context (the block or frame header field
/// they occurred in); use `Error::root` to get at the cause.
pub fn parse<R: io::Read>(source: R) -> (Stream, Option<Error>) {
    parse_with_options(source, ParseOptions::default())
}

/// Parses a stream with the given options.
///
/// See `parse` for how errors are reported.
pub fn parse_with_options<R: io::Read>(source: R, options: ParseOptions) -> (Stream, Option<Error>) {
    let mut input = BitCursor::new(BufferedReader::new(source));
    let mut stream = Stream::empty();
    let result = read_stream(&mut input, &options, &mut stream);

    match result {
        Ok(()) => {
            debug!("parsed stream with {} metadata blocks and {} frames",
                   stream.metadata_blocks.len(), stream.frames.len());
            (stream, None)
        }
        Err(err) => {
            debug!("parse stopped at bit offset {}: {}", input.bit_offset(), err);
            (stream, Some(err))
        }
    }
}

fn read_stream_marker<R: ReadBytes>(input: &mut BitCursor<R>, stream: &mut Stream) -> Result<()> {
    let mut found = [0u8; 4];
    found.copy_from_slice(&input.read_aligned(4)?);
    stream.marker = found;
    if found != STREAM_MARKER {
        return Err(Error::MarkerMismatch { found: found });
    }
    Ok(())
}

/// Records a problem that a lenient parse steps over, or fails in strict mode.
fn report(stream: &mut Stream, options: &ParseOptions, err: Error) -> Result<()> {
    if options.strict {
        return Err(err);
    }
    warn!("{}", err);
    stream.warnings.push(err);
    Ok(())
}

fn read_stream<R: ReadBytes>(input: &mut BitCursor<R>,
                             options: &ParseOptions,
                             stream: &mut Stream)
                             -> Result<()> {
    // A flac stream first of all starts with a stream header.
    read_stream_marker(input, stream)?;

    // Next are one or more metadata blocks. The FLAC format dictates
    // that the streaminfo block is the first block.
    for (index, block_result) in MetadataBlockReader::new(input).enumerate() {
        let block = block_result?;

        // A lenient parse takes the blocks in any order; `Stream::streaminfo`
        // then finds nothing.
        if options.strict && index == 0 && block.header.block_type != BlockType::StreamInfo {
            let err = Error::MissingStreamInfo;
            return Err(Error::InBlock { index: index, source: Box::new(err) });
        }

        if let MetadataBlockBody::StreamInfo(ref info) = block.body {
            if let Err(err) = info.validate() {
                report(stream, options, Error::InBlock { index: index, source: Box::new(err) })?;
            }
        }

        stream.metadata_blocks.push(block);
    }

    if options.metadata_only {
        return Ok(());
    }

    let frame = frame::read_frame(input, options)?;
    stream.frames.push(frame);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaminfo_block(is_last: bool, sample_rate: u32) -> Vec<u8> {
        let mut bytes = vec![if is_last { 0x80 } else { 0x00 }, 0x00, 0x00, 34];
        bytes.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
        bytes.extend_from_slice(&[0; 6]);
        // Sample rate, 2 channels, 16 bits, 0 samples.
        let packed: u64 = (sample_rate as u64) << 44 | 1 << 41 | 15 << 36;
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    fn flac(blocks: &[Vec<u8>], frames: &[u8]) -> Vec<u8> {
        let mut bytes = STREAM_MARKER.to_vec();
        for block in blocks {
            bytes.extend_from_slice(block);
        }
        bytes.extend_from_slice(frames);
        bytes
    }

    #[test]
    fn padding_without_frames_is_truncated_in_frame_header() {
        let data = flac(&[vec![0x81, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]], &[]);
        let (stream, err) = parse(&data[..]);

        assert_eq!(stream.marker(), STREAM_MARKER);
        assert_eq!(stream.metadata_blocks().len(), 1);
        let block = &stream.metadata_blocks()[0];
        assert!(block.header.is_last);
        assert_eq!(block.header.block_type, BlockType::Padding);
        assert_eq!(block.body, MetadataBlockBody::Padding(vec![0; 4]));
        assert!(stream.frames().is_empty());

        match err {
            Some(Error::InFrameHeader { field: "sync code", ref source }) => match **source {
                Error::TruncatedInput { bit_offset: 96 } => {}
                ref other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(stream.warnings().is_empty());
    }

    #[test]
    fn missing_streaminfo_is_only_an_error_when_strict() {
        let padding = vec![0x81, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00];
        let data = flac(&[padding], &[0xff, 0xf8, 0xc9, 0x18, 0x00, 0x00]);

        let (stream, err) = parse(&data[..]);
        assert!(err.is_none(), "{:?}", err);
        assert!(stream.warnings().is_empty());
        assert!(stream.streaminfo().is_none());
        assert!(stream.first_frame().is_some());

        let strict = ParseOptions { strict: true, ..ParseOptions::default() };
        let (stream, err) = parse_with_options(&data[..], strict);
        assert!(stream.metadata_blocks().is_empty());
        match err {
            Some(Error::InBlock { index: 0, ref source }) => match **source {
                Error::MissingStreamInfo => {}
                ref other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn marker_mismatch_stops_early() {
        let (stream, err) = parse(&b"OggS\x00\x02"[..]);
        assert_eq!(stream.marker(), *b"OggS");
        assert!(stream.metadata_blocks().is_empty());
        match err {
            Some(Error::MarkerMismatch { found }) => assert_eq!(&found, b"OggS"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn streaminfo_violation_is_a_warning_unless_strict() {
        let data = flac(&[streaminfo_block(true, 0)], &[0xff, 0xf8, 0xc9, 0x18, 0x00, 0x00]);

        let (stream, err) = parse_with_options(&data[..], ParseOptions::default());
        assert!(err.is_none());
        assert_eq!(stream.warnings().len(), 1);
        match *stream.warnings()[0].root() {
            Error::StreamInfoConstraintViolation(..) => {}
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(stream.streaminfo().map(|info| info.sample_rate), Some(0));
        assert!(stream.first_frame().is_some());

        let strict = ParseOptions { strict: true, ..ParseOptions::default() };
        let (stream, err) = parse_with_options(&data[..], strict);
        assert!(stream.metadata_blocks().is_empty());
        match err {
            Some(Error::InBlock { index: 0, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn metadata_only_skips_frames() {
        let data = flac(&[streaminfo_block(true, 44_100)], &[]);
        let options = ParseOptions { metadata_only: true, ..ParseOptions::default() };
        let stream = Stream::read_with_options(&data[..], options).unwrap();
        assert_eq!(stream.metadata_blocks().len(), 1);
        assert!(stream.first_frame().is_none());
        assert!(stream.warnings().is_empty());
    }

    #[test]
    fn accessors_find_blocks() {
        let mut comment = vec![0x84, 0x00, 0x00, 0x00];
        let mut body = 2u32.to_le_bytes().to_vec();
        body.extend_from_slice(b"me");
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&10u32.to_le_bytes());
        body.extend_from_slice(b"ALBUM=Jazz");
        comment[3] = body.len() as u8;
        comment.extend(body);

        let data = flac(&[streaminfo_block(false, 44_100), comment],
                        &[0xff, 0xf8, 0xc9, 0x18, 0x00, 0x00]);
        let stream = Stream::read(&data[..]).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(stream.streaminfo().map(|info| info.channels), Some(2));
        assert_eq!(stream.vorbis_comment().map(|c| &c.vendor[..]), Some("me"));
        assert_eq!(stream.get_tag("album").collect::<Vec<_>>(), vec!["Jazz"]);
        assert_eq!(stream.tags().len(), 1);
        assert!(stream.seek_table().is_none());
        assert!(stream.cue_sheet().is_none());
        assert_eq!(stream.pictures().count(), 0);

        let header = stream.first_frame().map(|frame| frame.header);
        assert_eq!(header.and_then(|h| h.block_size()), Some(4096));
    }
}
