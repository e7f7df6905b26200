// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The `metadata` module deals with metadata at the beginning of a FLAC stream.

use std::fmt;
use std::iter::FusedIterator;
use std::slice;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::input::{BitCursor, ReadBytes};

/// The different kinds of metadata block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlockType {
    /// A STREAMINFO block, with technical details about the stream.
    StreamInfo,
    /// A PADDING block, filled with zeros.
    Padding,
    /// An APPLICATION block that holds application-defined data.
    Application,
    /// A SEEKTABLE block, with data for supporting faster seeks.
    SeekTable,
    /// A VORBIS_COMMENT block, with metadata tags.
    VorbisComment,
    /// A CUESHEET block.
    CueSheet,
    /// A PICTURE block, with cover art or other image metadata.
    Picture,
    /// Type 127, which is invalid to avoid confusion with a frame sync code.
    Invalid,
    /// A type that is reserved at the moment of writing (7 through 126).
    Reserved(u8),
}

impl BlockType {
    pub fn from_u8(block_type: u8) -> BlockType {
        match block_type {
            0 => BlockType::StreamInfo,
            1 => BlockType::Padding,
            2 => BlockType::Application,
            3 => BlockType::SeekTable,
            4 => BlockType::VorbisComment,
            5 => BlockType::CueSheet,
            6 => BlockType::Picture,
            127 => BlockType::Invalid,
            n => BlockType::Reserved(n),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BlockType::StreamInfo => f.write_str("STREAMINFO"),
            BlockType::Padding => f.write_str("PADDING"),
            BlockType::Application => f.write_str("APPLICATION"),
            BlockType::SeekTable => f.write_str("SEEKTABLE"),
            BlockType::VorbisComment => f.write_str("VORBIS_COMMENT"),
            BlockType::CueSheet => f.write_str("CUESHEET"),
            BlockType::Picture => f.write_str("PICTURE"),
            BlockType::Invalid => f.write_str("INVALID"),
            BlockType::Reserved(n) => write!(f, "RESERVED({})", n),
        }
    }
}

/// A metadata block header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether this is the last metadata block before the audio data.
    pub is_last: bool,
    /// The type of metadata block.
    pub block_type: BlockType,
    /// Length of the metadata block in bytes, excluding this header.
    pub length: u32,
}

/// Read a metadata block header.
///
/// This never fails on the block type; it is up to `read_block` to reject
/// type 127.
pub fn read_block_header<R: ReadBytes>(input: &mut BitCursor<R>) -> Result<BlockHeader> {
    // The first bit specifies whether this is the last block, the next 7 bits
    // specify the type of the metadata block to follow.
    let is_last = input.read_bool()?;
    let block_type = BlockType::from_u8(input.read_bits(7)? as u8);

    // The length field is 24 bits, or 3 bytes.
    let length = input.read_bits(24)? as u32;

    let header = BlockHeader {
        is_last: is_last,
        block_type: block_type,
        length: length,
    };
    Ok(header)
}

/// The streaminfo metadata block, with technical information about the stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamInfo {
    /// The minimum block size (in inter-channel samples) used in the stream.
    pub min_block_size: u16,

    /// The maximum block size (in inter-channel samples) used in the stream.
    ///
    /// A minimum block size equal to the maximum block size implies a
    /// fixed-blocksize stream.
    pub max_block_size: u16,

    /// The minimum frame size (in bytes) used in the stream.
    pub min_frame_size: Option<u32>,

    /// The maximum frame size (in bytes) used in the stream.
    pub max_frame_size: Option<u32>,

    /// The sample rate in Hz.
    pub sample_rate: u32,

    /// The number of channels.
    pub channels: u32,

    /// The number of bits per sample.
    pub bits_per_sample: u32,

    /// The total number of inter-channel samples in the stream.
    pub samples: Option<u64>,

    /// MD5 signature of the unencoded audio data.
    pub md5sum: [u8; 16],
}

impl StreamInfo {
    /// Checks the invariants that the format places on the STREAMINFO block.
    ///
    /// A violation does not change any of the decoded values.
    pub fn validate(&self) -> Result<()> {
        if self.min_block_size > self.max_block_size {
            return Err(Error::StreamInfoConstraintViolation(
                "min block size is larger than max block size"));
        }
        if self.sample_rate == 0 {
            return Err(Error::StreamInfoConstraintViolation("sample rate is zero"));
        }
        if self.channels < 1 || self.channels > 8 {
            return Err(Error::StreamInfoConstraintViolation("channel count not in 1 through 8"));
        }
        if self.bits_per_sample < 4 || self.bits_per_sample > 32 {
            return Err(Error::StreamInfoConstraintViolation(
                "bits per sample not in 4 through 32"));
        }
        Ok(())
    }
}

/// Read a STREAMINFO block.
///
/// The values are not validated here; use `StreamInfo::validate` for that.
pub fn read_streaminfo_block<R: ReadBytes>(input: &mut BitCursor<R>) -> Result<StreamInfo> {
    let min_block_size = input.read_bits(16)? as u16;
    let max_block_size = input.read_bits(16)? as u16;

    // The frame size fields are 24 bits, or 3 bytes. Zero means unknown.
    let min_frame_size = input.read_bits(24)? as u32;
    let max_frame_size = input.read_bits(24)? as u32;

    let sample_rate = input.read_bits(20)? as u32;

    // Channels and bits per sample are stored minus one.
    let n_channels = input.read_bits(3)? as u32 + 1;
    let bits_per_sample = input.read_bits(5)? as u32 + 1;

    // Zero total samples means unknown.
    let n_samples = input.read_bits(36)?;

    // Next are 128 bits (16 bytes) of MD5 signature.
    let mut md5sum = [0u8; 16];
    md5sum.copy_from_slice(&input.read_aligned(16)?);

    let stream_info = StreamInfo {
        min_block_size: min_block_size,
        max_block_size: max_block_size,
        min_frame_size: if min_frame_size == 0 { None } else { Some(min_frame_size) },
        max_frame_size: if max_frame_size == 0 { None } else { Some(max_frame_size) },
        sample_rate: sample_rate,
        channels: n_channels,
        bits_per_sample: bits_per_sample,
        samples: if n_samples == 0 { None } else { Some(n_samples) },
        md5sum: md5sum,
    };
    Ok(stream_info)
}

/// An APPLICATION block.
///
/// Registered application ids are listed at <https://www.xiph.org/flac/id.html>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Application {
    /// The registered application id, usually four ASCII characters.
    pub id: [u8; 4],
    /// Application-specific data.
    pub data: Vec<u8>,
}

impl Application {
    /// Returns the id as a string, if it is ASCII.
    pub fn id_str(&self) -> Option<&str> {
        if self.id.is_ascii() {
            std::str::from_utf8(&self.id).ok()
        } else {
            None
        }
    }
}

/// Read an APPLICATION block of `length` bytes.
pub fn read_application_block<R: ReadBytes>(input: &mut BitCursor<R>,
                                            length: u32)
                                            -> Result<Application> {
    if length < 4 {
        return Err(Error::BlockLengthMismatch { declared: length, required: 4 });
    }

    // The first 4 bytes of an application block contain its id, the
    // remaining `length - 4` bytes contain application-specific data.
    let mut id = [0u8; 4];
    id.copy_from_slice(&input.read_aligned(4)?);
    let data = input.read_aligned((length - 4) as usize)?;

    Ok(Application { id: id, data: data })
}

/// A seek point in the seek table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeekPoint {
    /// Sample number of the first sample in the target frame.
    ///
    /// Or 2<sup>64</sup> - 1 for a placeholder.
    pub sample: u64,

    /// Offset in bytes from the first byte of the first frame header to the
    /// first byte of the target frame’s header.
    pub offset: u64,

    /// Number of samples in the target frame.
    pub samples: u16,
}

impl SeekPoint {
    /// Whether this is a placeholder point, which carries no position.
    pub fn is_placeholder(&self) -> bool {
        self.sample == 0xffff_ffff_ffff_ffff
    }
}

/// A seek table to aid seeking in the stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SeekTable {
    /// The seek points, sorted in ascending order by sample number.
    pub seekpoints: Vec<SeekPoint>,
}

/// The size of a seek point in bytes.
const SEEK_POINT_LEN: u32 = 18;

/// Read a SEEKTABLE block of `length` bytes.
///
/// The length must be a multiple of the 18-byte seek point size; this is
/// checked before anything is read.
pub fn read_seek_table_block<R: ReadBytes>(input: &mut BitCursor<R>,
                                           length: u32)
                                           -> Result<SeekTable> {
    if length % SEEK_POINT_LEN != 0 {
        return Err(Error::MalformedSeekTable { length: length });
    }

    let n_points = length / SEEK_POINT_LEN;
    let mut seekpoints = Vec::with_capacity(n_points as usize);

    for _ in 0..n_points {
        let seekpoint = SeekPoint {
            sample: input.read_bits(64)?,
            offset: input.read_bits(64)?,
            samples: input.read_bits(16)? as u16,
        };
        seekpoints.push(seekpoint);
    }

    Ok(SeekTable { seekpoints: seekpoints })
}

/// The body of a VORBIS_COMMENT block: an encoder id and the tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VorbisComment {
    /// Encoder identification, for example `reference libFLAC 1.4.3 20230623`.
    pub vendor: String,

    /// Each comment as read, paired with the byte index of its first `'='`.
    ///
    /// Parsing guarantees the separator exists, so the name is
    /// `&comment[..idx]` and the value `&comment[idx + 1..]`. Most callers
    /// want `Stream::tags` or `Stream::get_tag` instead.
    pub comments: Vec<(String, usize)>,
}

impl VorbisComment {
    /// Name-value pairs in stream order. Name casing is kept as written.
    pub fn tags(&self) -> Tags {
        Tags::new(&self.comments)
    }

    /// Values of the comments named `name`, compared ignoring ASCII case.
    ///
    /// A name may repeat, so every match is yielded.
    pub fn get_tag<'a>(&'a self, name: &'a str) -> GetTag<'a> {
        GetTag::new(&self.comments, name)
    }
}

impl<'a> IntoIterator for &'a VorbisComment {
    type Item = (&'a str, &'a str);
    type IntoIter = Tags<'a>;

    fn into_iter(self) -> Tags<'a> {
        self.tags()
    }
}

/// Splits a stored comment at its separator into name and value.
#[inline]
fn split_comment(entry: &(String, usize)) -> (&str, &str) {
    let (ref comment, sep_idx) = *entry;
    (&comment[..sep_idx], &comment[sep_idx + 1..])
}

/// Name-value pairs of a VORBIS_COMMENT block, in stream order.
///
/// Returned by `Stream::tags` and `VorbisComment::tags`. A stream without
/// Vorbis comments yields an empty iterator.
pub struct Tags<'a> {
    entries: slice::Iter<'a, (String, usize)>,
}

impl<'a> Tags<'a> {
    /// Iterates over comments stored as `("NAME=value", index of '=')`.
    pub fn new(comments: &'a [(String, usize)]) -> Tags<'a> {
        Tags { entries: comments.iter() }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = (&'a str, &'a str);

    #[inline]
    fn next(&mut self) -> Option<(&'a str, &'a str)> {
        self.entries.next().map(split_comment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<'a> ExactSizeIterator for Tags<'a> {}

impl<'a> FusedIterator for Tags<'a> {}

/// The values of every comment whose name matches, ignoring ASCII case.
///
/// Returned by `Stream::get_tag` and `VorbisComment::get_tag`.
pub struct GetTag<'a> {
    entries: slice::Iter<'a, (String, usize)>,
    name: &'a str,
}

impl<'a> GetTag<'a> {
    /// Searches comments stored as `("NAME=value", index of '=')` for `name`.
    pub fn new(comments: &'a [(String, usize)], name: &'a str) -> GetTag<'a> {
        GetTag {
            entries: comments.iter(),
            name: name,
        }
    }
}

impl<'a> Iterator for GetTag<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let name = self.name;
        self.entries
            .by_ref()
            .map(split_comment)
            .find(|&(entry_name, _)| entry_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

impl<'a> FusedIterator for GetTag<'a> {}

/// Read a VORBIS_COMMENT block of `length` bytes.
///
/// Every length prefix inside the block is checked against the bytes left in
/// the block before anything is allocated, so a corrupt length cannot cause
/// a large allocation.
pub fn read_vorbis_comment_block<R: ReadBytes>(input: &mut BitCursor<R>,
                                               length: u32)
                                               -> Result<VorbisComment> {
    if length < 8 {
        // We expect at a minimum a 32-bit vendor string length, and a 32-bit
        // comment count.
        return Err(Error::MalformedVorbisComment("block is too short"));
    }

    // The Vorbis comment block starts with a length-prefixed "vendor string".
    // It cannot be larger than the block length - 8, because there are the
    // 32-bit vendor string length, and comment count.
    let vendor_len = input.read_le_u32()?;
    if vendor_len > length - 8 {
        return Err(Error::MalformedVorbisComment("vendor string too long"));
    }
    let vendor = String::from_utf8(input.read_aligned(vendor_len as usize)?)?;

    // Next up is the number of comments. Because every comment is at least 4
    // bytes to indicate its length, there cannot be more comments than the
    // length of the block divided by 4.
    let comments_len = input.read_le_u32()?;
    if comments_len > (length - 8 - vendor_len) / 4 {
        return Err(Error::MalformedVorbisComment("too many entries for Vorbis comment block"));
    }
    let mut comments = Vec::with_capacity(comments_len as usize);

    let mut bytes_left = length - 8 - vendor_len;

    // For every comment, there is a length-prefixed string of the form
    // "NAME=value".
    while comments.len() < comments_len as usize {
        if bytes_left < 4 {
            return Err(Error::MalformedVorbisComment("block contains wrong number of entries"));
        }
        let comment_len = input.read_le_u32()?;
        bytes_left -= 4;

        if comment_len > bytes_left {
            return Err(Error::MalformedVorbisComment("comment too long for Vorbis comment block"));
        }

        let comment_bytes = input.read_aligned(comment_len as usize)?;
        bytes_left -= comment_len;

        let sep_index = match comment_bytes.iter().position(|&x| x == b'=') {
            Some(i) => i,
            None => return Err(Error::MalformedVorbisComment("comment does not contain '='")),
        };

        // In the Vorbis comment format, the field name may consist of ascii
        // bytes 0x20 through 0x7d, 0x3d (`=`) excluded. Verifying this has
        // the advantage that if the check passes, the name is valid UTF-8.
        if comment_bytes[..sep_index].iter().any(|&x| x < 0x20 || x > 0x7d) {
            return Err(Error::MalformedVorbisComment("field name contains invalid byte"));
        }

        let comment = String::from_utf8(comment_bytes)?;
        comments.push((comment, sep_index));
    }

    // Any bytes after the last entry are skipped by `read_block`.
    let vorbis_comment = VorbisComment {
        vendor: vendor,
        comments: comments,
    };
    Ok(vorbis_comment)
}

/// An index point within a CUE sheet track.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CueSheetTrackIndex {
    /// Offset in samples, relative to the track offset.
    pub offset: u64,
    /// The index point number.
    pub number: u8,
}

/// A track in a CUE sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CueSheetTrack {
    /// Track offset in samples, relative to the beginning of the stream.
    pub offset: u64,
    /// Track number; 170 (or 255 for non-CD-DA) is the lead-out track.
    pub number: u8,
    /// The International Standard Recording Code, empty if there is none.
    pub isrc: String,
    /// Whether the track contains data rather than audio.
    pub is_non_audio: bool,
    /// Whether the track was recorded with pre-emphasis.
    pub pre_emphasis: bool,
    /// The index points of this track.
    pub indices: Vec<CueSheetTrackIndex>,
}

/// A CUESHEET block, storing the track and index layout of a CD.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CueSheet {
    /// Media catalog number, empty if there is none.
    pub catalog_number: String,
    /// The number of lead-in samples.
    pub lead_in_samples: u64,
    /// Whether the CUE sheet corresponds to a Compact Disc.
    pub is_compact_disc: bool,
    /// The tracks, the last of which is the lead-out track.
    pub tracks: Vec<CueSheetTrack>,
}

/// Reads a fixed-size, NUL-padded ASCII field.
fn read_padded_string<R: ReadBytes>(input: &mut BitCursor<R>, len: usize) -> Result<String> {
    let mut bytes = input.read_aligned(len)?;
    let end = bytes.iter().position(|&x| x == 0).unwrap_or(len);
    bytes.truncate(end);
    Ok(String::from_utf8(bytes)?)
}

/// Read a CUESHEET block.
pub fn read_cue_sheet_block<R: ReadBytes>(input: &mut BitCursor<R>) -> Result<CueSheet> {
    let catalog_number = read_padded_string(input, 128)?;
    let lead_in_samples = input.read_bits(64)?;
    let is_compact_disc = input.read_bool()?;

    // 7 + 258 * 8 reserved bits.
    input.read_bits(7)?;
    input.skip_aligned(258)?;

    let n_tracks = input.read_bits(8)? as usize;
    let mut tracks = Vec::with_capacity(n_tracks);

    for _ in 0..n_tracks {
        let offset = input.read_bits(64)?;
        let number = input.read_bits(8)? as u8;
        let isrc = read_padded_string(input, 12)?;
        let is_non_audio = input.read_bool()?;
        let pre_emphasis = input.read_bool()?;

        // 6 + 13 * 8 reserved bits.
        input.read_bits(6)?;
        input.skip_aligned(13)?;

        let n_indices = input.read_bits(8)? as usize;
        let mut indices = Vec::with_capacity(n_indices);
        for _ in 0..n_indices {
            let index = CueSheetTrackIndex {
                offset: input.read_bits(64)?,
                number: input.read_bits(8)? as u8,
            };
            // 3 * 8 reserved bits.
            input.skip_aligned(3)?;
            indices.push(index);
        }

        tracks.push(CueSheetTrack {
            offset: offset,
            number: number,
            isrc: isrc,
            is_non_audio: is_non_audio,
            pre_emphasis: pre_emphasis,
            indices: indices,
        });
    }

    let cue_sheet = CueSheet {
        catalog_number: catalog_number,
        lead_in_samples: lead_in_samples,
        is_compact_disc: is_compact_disc,
        tracks: tracks,
    };
    Ok(cue_sheet)
}

/// The kind of image a PICTURE block holds, as defined by the ID3v2 APIC frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PictureType {
    Other,
    FileIcon,
    OtherFileIcon,
    FrontCover,
    BackCover,
    LeafletPage,
    Media,
    LeadArtist,
    Artist,
    Conductor,
    Band,
    Composer,
    Lyricist,
    RecordingLocation,
    DuringRecording,
    DuringPerformance,
    ScreenCapture,
    BrightColoredFish,
    Illustration,
    BandLogo,
    PublisherLogo,
    /// A value outside of the defined range.
    Undefined(u32),
}

impl PictureType {
    pub fn from_u32(picture_type: u32) -> PictureType {
        match picture_type {
            0 => PictureType::Other,
            1 => PictureType::FileIcon,
            2 => PictureType::OtherFileIcon,
            3 => PictureType::FrontCover,
            4 => PictureType::BackCover,
            5 => PictureType::LeafletPage,
            6 => PictureType::Media,
            7 => PictureType::LeadArtist,
            8 => PictureType::Artist,
            9 => PictureType::Conductor,
            10 => PictureType::Band,
            11 => PictureType::Composer,
            12 => PictureType::Lyricist,
            13 => PictureType::RecordingLocation,
            14 => PictureType::DuringRecording,
            15 => PictureType::DuringPerformance,
            16 => PictureType::ScreenCapture,
            17 => PictureType::BrightColoredFish,
            18 => PictureType::Illustration,
            19 => PictureType::BandLogo,
            20 => PictureType::PublisherLogo,
            n => PictureType::Undefined(n),
        }
    }
}

/// The MIME type that marks picture data as a URL rather than an image.
pub const PICTURE_URL_MIME: &str = "-->";

/// A PICTURE block. The image data is kept as-is, not decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Picture {
    pub picture_type: PictureType,
    /// MIME type of the data, or `-->` if the data is a URL.
    pub mime_type: String,
    pub description: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Color depth in bits per pixel.
    pub depth: u32,
    /// Number of colors for indexed-color pictures, 0 otherwise.
    pub colors: u32,
    pub data: Vec<u8>,
}

impl Picture {
    /// Returns the URL the picture refers to, if the data is a link.
    pub fn url(&self) -> Option<&str> {
        if self.mime_type == PICTURE_URL_MIME {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        }
    }
}

/// Reads a 32-bit length prefix and that many bytes, within the block budget.
fn read_length_prefixed<R: ReadBytes>(input: &mut BitCursor<R>,
                                      length: u32,
                                      bytes_left: &mut u32)
                                      -> Result<Vec<u8>> {
    let len = input.read_bits(32)? as u32;
    if len > *bytes_left {
        return Err(Error::BlockLengthMismatch {
            declared: length,
            required: (length - *bytes_left) as u64 + len as u64,
        });
    }
    *bytes_left -= len;
    input.read_aligned(len as usize)
}

/// Read a PICTURE block of `length` bytes.
pub fn read_picture_block<R: ReadBytes>(input: &mut BitCursor<R>,
                                        length: u32)
                                        -> Result<Picture> {
    // Type, three lengths and four dimensions of 32 bits each.
    const FIXED_LEN: u32 = 32;
    if length < FIXED_LEN {
        return Err(Error::BlockLengthMismatch { declared: length, required: FIXED_LEN as u64 });
    }
    let mut bytes_left = length - FIXED_LEN;

    let picture_type = PictureType::from_u32(input.read_bits(32)? as u32);
    let mime_type = String::from_utf8(read_length_prefixed(input, length, &mut bytes_left)?)?;
    let description = String::from_utf8(read_length_prefixed(input, length, &mut bytes_left)?)?;
    let width = input.read_bits(32)? as u32;
    let height = input.read_bits(32)? as u32;
    let depth = input.read_bits(32)? as u32;
    let colors = input.read_bits(32)? as u32;
    let data = read_length_prefixed(input, length, &mut bytes_left)?;

    let picture = Picture {
        picture_type: picture_type,
        mime_type: mime_type,
        description: description,
        width: width,
        height: height,
        depth: depth,
        colors: colors,
        data: data,
    };
    Ok(picture)
}

/// The decoded contents of a metadata block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetadataBlockBody {
    StreamInfo(StreamInfo),
    /// The raw padding bytes, which carry no meaning.
    Padding(Vec<u8>),
    Application(Application),
    SeekTable(SeekTable),
    VorbisComment(VorbisComment),
    CueSheet(CueSheet),
    Picture(Picture),
    /// The raw body of a block with a reserved type.
    Unknown(Vec<u8>),
}

/// A metadata block: its header and its decoded body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetadataBlock {
    pub header: BlockHeader,
    pub body: MetadataBlockBody,
}

/// Reads one metadata block, header and body.
///
/// After this returns successfully, exactly `4 + header.length` bytes have
/// been consumed. Bodies that end before the declared length have the rest
/// skipped; bodies that need more than the declared length are an error.
pub fn read_block<R: ReadBytes>(input: &mut BitCursor<R>) -> Result<MetadataBlock> {
    let header = read_block_header(input)?;
    let length = header.length;
    let body_start = input.bit_offset();

    let body = match header.block_type {
        BlockType::StreamInfo => MetadataBlockBody::StreamInfo(read_streaminfo_block(input)?),
        BlockType::Padding => {
            // The format dictates that padding is all zeros, but there is no
            // point in checking bytes that have no meaning.
            MetadataBlockBody::Padding(input.read_aligned(length as usize)?)
        }
        BlockType::Application => {
            MetadataBlockBody::Application(read_application_block(input, length)?)
        }
        BlockType::SeekTable => MetadataBlockBody::SeekTable(read_seek_table_block(input, length)?),
        BlockType::VorbisComment => {
            MetadataBlockBody::VorbisComment(read_vorbis_comment_block(input, length)?)
        }
        BlockType::CueSheet => MetadataBlockBody::CueSheet(read_cue_sheet_block(input)?),
        BlockType::Picture => MetadataBlockBody::Picture(read_picture_block(input, length)?),
        BlockType::Invalid => return Err(Error::InvalidBlockType),
        BlockType::Reserved(..) => {
            // A block type from a newer version of the format. Its length
            // still tells us where the next block starts.
            MetadataBlockBody::Unknown(input.read_aligned(length as usize)?)
        }
    };

    let consumed = (input.bit_offset() - body_start) / 8;
    if consumed > length as u64 {
        return Err(Error::BlockLengthMismatch { declared: length, required: consumed });
    }
    if consumed < length as u64 {
        let excess = length - consumed as u32;
        trace!("skipping {} trailing bytes of {} block", excess, header.block_type);
        input.skip_aligned(excess)?;
    }

    debug!("read {} block of {} bytes{}",
           header.block_type, length, if header.is_last { " (last)" } else { "" });

    Ok(MetadataBlock { header: header, body: body })
}

/// Reads metadata blocks from a stream and exposes them as an iterator.
///
/// It is assumed that the next bit that the cursor will read is the first
/// bit of a metadata block header. This means that the iterator will yield at
/// least a single value. If the iterator ever yields an error, then no more
/// data will be read thereafter, and the next value will be `None`. Errors
/// carry the index of the block they occurred in.
pub struct MetadataBlockReader<'a, R: 'a + ReadBytes> {
    input: &'a mut BitCursor<R>,
    index: usize,
    done: bool,
}

impl<'a, R: ReadBytes> MetadataBlockReader<'a, R> {
    /// Creates a metadata block reader that will yield at least one element.
    pub fn new(input: &'a mut BitCursor<R>) -> MetadataBlockReader<'a, R> {
        MetadataBlockReader {
            input: input,
            index: 0,
            done: false,
        }
    }
}

impl<'a, R: ReadBytes> Iterator for MetadataBlockReader<'a, R> {
    type Item = Result<MetadataBlock>;

    fn next(&mut self) -> Option<Result<MetadataBlock>> {
        if self.done {
            return None;
        }

        let index = self.index;
        self.index += 1;

        match read_block(self.input) {
            Ok(block) => {
                self.done = block.header.is_last;
                Some(Ok(block))
            }
            Err(err) => {
                // After a failure, no more attempts to read will be made,
                // because we don't know where we are in the stream.
                self.done = true;
                Some(Err(Error::InBlock { index: index, source: Box::new(err) }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // When done, there will be no more blocks,
        // when not done, there will be at least one more.
        if self.done { (0, Some(0)) } else { (1, None) }
    }
}

impl<'a, R: ReadBytes> FusedIterator for MetadataBlockReader<'a, R> {}

/// Reads metadata blocks up to and including the one marked last.
///
/// Returns the blocks read so far together with the first error, if any.
/// Running out of input before the last block is `TruncatedInput`.
pub fn read_all<R: ReadBytes>(input: &mut BitCursor<R>) -> (Vec<MetadataBlock>, Option<Error>) {
    let mut blocks = Vec::new();
    for result in MetadataBlockReader::new(input) {
        match result {
            Ok(block) => blocks.push(block),
            Err(err) => return (blocks, Some(err)),
        }
    }
    (blocks, None)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn cursor_over(bytes: Vec<u8>) -> BitCursor<io::Cursor<Vec<u8>>> {
        BitCursor::new(io::Cursor::new(bytes))
    }

    fn header_bytes(is_last: bool, block_type: u8, length: u32) -> Vec<u8> {
        let first = if is_last { 0x80 } else { 0x00 } | block_type;
        vec![first, (length >> 16) as u8, (length >> 8) as u8, length as u8]
    }

    /// STREAMINFO body bytes with the given raw packed fields.
    fn streaminfo_bytes(min_bs: u16, max_bs: u16, sample_rate: u32,
                        raw_channels: u8, raw_bps: u8, samples: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&min_bs.to_be_bytes());
        bytes.extend_from_slice(&max_bs.to_be_bytes());
        // Min and max frame size, unknown.
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        // 20 bits sample rate, 3 bits channels, 5 bits bps, 36 bits samples.
        let packed: u64 = (sample_rate as u64) << 44
            | (raw_channels as u64) << 41
            | (raw_bps as u64) << 36
            | samples;
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0xab; 16]);
        bytes
    }

    fn le_string(s: &[u8]) -> Vec<u8> {
        let mut bytes = (s.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(s);
        bytes
    }

    #[test]
    fn verify_read_block_header() {
        let mut input = cursor_over(vec![0x84, 0x00, 0x01, 0x02, 0x7f, 0x00, 0x00, 0x00]);
        let header = read_block_header(&mut input).unwrap();
        assert!(header.is_last);
        assert_eq!(header.block_type, BlockType::VorbisComment);
        assert_eq!(header.length, 0x0102);

        let header = read_block_header(&mut input).unwrap();
        assert!(!header.is_last);
        assert_eq!(header.block_type, BlockType::Invalid);
        assert_eq!(input.bit_offset(), 64);
    }

    #[test]
    fn verify_streaminfo_channel_nibble() {
        for raw in 0..8u8 {
            let mut input = cursor_over(streaminfo_bytes(4096, 4096, 44_100, raw, 15, 0));
            let streaminfo = read_streaminfo_block(&mut input).unwrap();
            assert_eq!(streaminfo.channels, raw as u32 + 1);
            assert!(streaminfo.validate().is_ok());
        }
    }

    #[test]
    fn verify_streaminfo_fields() {
        let mut input = cursor_over(streaminfo_bytes(16, 65535, 655_350, 1, 23, 0xa_1234_5678));
        let streaminfo = read_streaminfo_block(&mut input).unwrap();
        assert_eq!(streaminfo.min_block_size, 16);
        assert_eq!(streaminfo.max_block_size, 65535);
        assert_eq!(streaminfo.min_frame_size, None);
        assert_eq!(streaminfo.max_frame_size, None);
        assert_eq!(streaminfo.sample_rate, 655_350);
        assert_eq!(streaminfo.channels, 2);
        assert_eq!(streaminfo.bits_per_sample, 24);
        assert_eq!(streaminfo.samples, Some(0xa_1234_5678));
        assert_eq!(streaminfo.md5sum, [0xab; 16]);
        assert_eq!(input.bit_offset(), 34 * 8);
    }

    #[test]
    fn verify_streaminfo_zero_sample_rate_is_reported() {
        let mut input = cursor_over(streaminfo_bytes(4096, 4096, 0, 1, 15, 0));
        let streaminfo = read_streaminfo_block(&mut input).unwrap();

        match streaminfo.validate() {
            Err(Error::StreamInfoConstraintViolation(..)) => {}
            other => panic!("unexpected {:?}", other),
        }

        // The decoded values are untouched by the failed check.
        assert_eq!(streaminfo.min_block_size, 4096);
        assert_eq!(streaminfo.max_block_size, 4096);
        assert_eq!(streaminfo.sample_rate, 0);
        assert_eq!(streaminfo.channels, 2);
        assert_eq!(streaminfo.bits_per_sample, 16);
    }

    #[test]
    fn verify_streaminfo_constraints() {
        let base = StreamInfo {
            min_block_size: 4096,
            max_block_size: 4096,
            min_frame_size: None,
            max_frame_size: None,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            samples: None,
            md5sum: [0; 16],
        };
        assert!(base.validate().is_ok());
        assert!(StreamInfo { min_block_size: 4097, ..base }.validate().is_err());
        assert!(StreamInfo { bits_per_sample: 3, ..base }.validate().is_err());
        assert!(StreamInfo { channels: 9, ..base }.validate().is_err());
    }

    #[test]
    fn verify_opaque_bodies_consume_exact_length() {
        let mut bytes = header_bytes(false, 1, 5);
        bytes.extend_from_slice(&[0; 5]);
        bytes.extend(header_bytes(false, 2, 7));
        bytes.extend_from_slice(b"riffxyz");
        bytes.extend(header_bytes(true, 42, 3));
        bytes.extend_from_slice(&[1, 2, 3]);
        bytes.push(0xff);
        let mut input = cursor_over(bytes);

        let padding = read_block(&mut input).unwrap();
        assert_eq!(padding.body, MetadataBlockBody::Padding(vec![0; 5]));
        assert_eq!(input.bit_offset(), (4 + 5) * 8);

        let application = read_block(&mut input).unwrap();
        match application.body {
            MetadataBlockBody::Application(ref app) => {
                assert_eq!(app.id_str(), Some("riff"));
                assert_eq!(&app.data[..], b"xyz");
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(input.bit_offset(), (9 + 4 + 7) * 8);

        let unknown = read_block(&mut input).unwrap();
        assert_eq!(unknown.header.block_type, BlockType::Reserved(42));
        assert!(unknown.header.is_last);
        assert_eq!(unknown.body, MetadataBlockBody::Unknown(vec![1, 2, 3]));
        assert_eq!(input.bit_offset(), (20 + 4 + 3) * 8);
    }

    #[test]
    fn verify_invalid_block_type() {
        let mut bytes = header_bytes(false, 127, 0);
        bytes.extend(header_bytes(true, 1, 0));
        let mut input = cursor_over(bytes);
        let (blocks, err) = read_all(&mut input);
        assert!(blocks.is_empty());
        match err.as_ref().map(|e| e.root()) {
            Some(&Error::InvalidBlockType) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_seek_table() {
        let mut bytes = header_bytes(true, 3, 36);
        for &(sample, offset, samples) in &[(0u64, 0u64, 4096u16), (0xffff_ffff_ffff_ffff, 0, 0)] {
            bytes.extend_from_slice(&sample.to_be_bytes());
            bytes.extend_from_slice(&offset.to_be_bytes());
            bytes.extend_from_slice(&samples.to_be_bytes());
        }
        let mut input = cursor_over(bytes);
        match read_block(&mut input).unwrap().body {
            MetadataBlockBody::SeekTable(table) => {
                assert_eq!(table.seekpoints.len(), 2);
                assert_eq!(table.seekpoints[0].samples, 4096);
                assert!(!table.seekpoints[0].is_placeholder());
                assert!(table.seekpoints[1].is_placeholder());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_seek_table_length_checked_before_reading() {
        let mut input = cursor_over(vec![0u8; 20]);
        match read_seek_table_block(&mut input, 20) {
            Err(Error::MalformedSeekTable { length: 20 }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(input.bit_offset(), 0);
    }

    #[test]
    fn verify_vorbis_comment() {
        let mut body = le_string(b"reference libFLAC 1.3.2 20170101");
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend(le_string(b"ARTIST=Queen"));
        body.extend(le_string(b"title=Bohemian Rhapsody"));
        body.extend(le_string(b"EQUATION=a=b"));
        let length = body.len() as u32;
        let mut input = cursor_over(body);

        let comment = read_vorbis_comment_block(&mut input, length).unwrap();
        assert_eq!(comment.vendor, "reference libFLAC 1.3.2 20170101");
        let tags: Vec<_> = comment.tags().collect();
        assert_eq!(tags, vec![("ARTIST", "Queen"),
                              ("title", "Bohemian Rhapsody"),
                              ("EQUATION", "a=b")]);
        assert_eq!(comment.get_tag("TITLE").collect::<Vec<_>>(), vec!["Bohemian Rhapsody"]);
        assert_eq!(comment.get_tag("ALBUM").next(), None);
    }

    #[test]
    fn verify_vorbis_comment_without_separator() {
        let mut body = le_string(b"vendor");
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend(le_string(b"NOSEPARATOR"));
        let length = body.len() as u32;
        let mut input = cursor_over(body);

        match read_vorbis_comment_block(&mut input, length) {
            Err(Error::MalformedVorbisComment(..)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_vorbis_comment_length_is_bounded() {
        let mut body = le_string(b"vendor");
        body.extend_from_slice(&1u32.to_le_bytes());
        // Claims 4 GiB, but the block is tiny.
        body.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        let length = body.len() as u32;
        let mut input = cursor_over(body);

        match read_vorbis_comment_block(&mut input, length) {
            Err(Error::MalformedVorbisComment(..)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_cue_sheet() {
        let mut body = Vec::new();
        let mut catalog = b"1234567890123".to_vec();
        catalog.resize(128, 0);
        body.extend(catalog);
        body.extend_from_slice(&88_200u64.to_be_bytes());
        // Compact disc flag, then 7 + 258 * 8 reserved bits.
        body.push(0x80);
        body.extend_from_slice(&[0; 258]);
        // Two tracks.
        body.push(2);
        for &(offset, number, n_indices) in &[(0u64, 1u8, 2u8), (441_000, 170, 0)] {
            body.extend_from_slice(&offset.to_be_bytes());
            body.push(number);
            body.extend_from_slice(if number == 1 { b"USRC17607839" } else { &[0; 12] });
            // Audio, pre-emphasis, 6 + 13 * 8 reserved bits.
            body.push(0x40);
            body.extend_from_slice(&[0; 13]);
            body.push(n_indices);
            for i in 0..n_indices {
                body.extend_from_slice(&(i as u64 * 588).to_be_bytes());
                body.push(i);
                body.extend_from_slice(&[0; 3]);
            }
        }
        let length = body.len() as u32;
        let mut bytes = header_bytes(true, 5, length);
        bytes.extend(body);
        let mut input = cursor_over(bytes);

        let block = read_block(&mut input).unwrap();
        let cue_sheet = match block.body {
            MetadataBlockBody::CueSheet(cue_sheet) => cue_sheet,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(input.bit_offset(), (4 + length as u64) * 8);
        assert_eq!(cue_sheet.catalog_number, "1234567890123");
        assert_eq!(cue_sheet.lead_in_samples, 88_200);
        assert!(cue_sheet.is_compact_disc);
        assert_eq!(cue_sheet.tracks.len(), 2);
        assert_eq!(cue_sheet.tracks[0].isrc, "USRC17607839");
        assert!(!cue_sheet.tracks[0].is_non_audio);
        assert!(cue_sheet.tracks[0].pre_emphasis);
        assert_eq!(cue_sheet.tracks[0].indices,
                   vec![CueSheetTrackIndex { offset: 0, number: 0 },
                        CueSheetTrackIndex { offset: 588, number: 1 }]);
        assert_eq!(cue_sheet.tracks[1].number, 170);
        assert_eq!(cue_sheet.tracks[1].isrc, "");
        assert!(cue_sheet.tracks[1].indices.is_empty());
    }

    #[test]
    fn verify_picture() {
        let mut body = 3u32.to_be_bytes().to_vec();
        for field in &[&b"-->"[..], &b"cover"[..]] {
            body.extend_from_slice(&(field.len() as u32).to_be_bytes());
            body.extend_from_slice(field);
        }
        for &dim in &[600u32, 400, 24, 0] {
            body.extend_from_slice(&dim.to_be_bytes());
        }
        let url = b"https://example.com/cover.png";
        body.extend_from_slice(&(url.len() as u32).to_be_bytes());
        body.extend_from_slice(url);
        let length = body.len() as u32;
        let mut input = cursor_over(body);

        let picture = read_picture_block(&mut input, length).unwrap();
        assert_eq!(picture.picture_type, PictureType::FrontCover);
        assert_eq!(picture.description, "cover");
        assert_eq!((picture.width, picture.height, picture.depth, picture.colors),
                   (600, 400, 24, 0));
        assert_eq!(picture.url(), Some("https://example.com/cover.png"));
    }

    #[test]
    fn verify_self_delimiting_body_with_slack_is_skipped() {
        // A STREAMINFO that declares 40 bytes; the 6 extra are skipped.
        let mut bytes = header_bytes(false, 0, 40);
        bytes.extend(streaminfo_bytes(4096, 4096, 44_100, 1, 15, 0));
        bytes.extend_from_slice(&[0xee; 6]);
        bytes.extend(header_bytes(true, 1, 0));
        let mut input = cursor_over(bytes);

        let (blocks, err) = read_all(&mut input);
        assert!(err.is_none());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].header.block_type, BlockType::Padding);
        assert_eq!(input.bit_offset(), (4 + 40 + 4) * 8);
    }

    #[test]
    fn verify_vorbis_comment_with_slack_is_skipped() {
        // Vendor "me", no comments, then one byte the block declares but the
        // comment does not use.
        let mut body = le_string(b"me");
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(0x00);
        let mut bytes = header_bytes(false, 4, body.len() as u32);
        bytes.extend(body);
        bytes.extend(header_bytes(true, 1, 0));
        let mut input = cursor_over(bytes);

        let (blocks, err) = read_all(&mut input);
        assert!(err.is_none(), "{:?}", err);
        assert_eq!(blocks.len(), 2);
        match blocks[0].body {
            MetadataBlockBody::VorbisComment(ref comment) => {
                assert_eq!(comment.vendor, "me");
                assert!(comment.comments.is_empty());
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(input.bit_offset(), (4 + 11 + 4) * 8);
    }

    #[test]
    fn verify_application_shorter_than_id_fails() {
        let mut bytes = header_bytes(true, 2, 3);
        bytes.extend_from_slice(b"ATC");
        let mut input = cursor_over(bytes);

        match read_block(&mut input) {
            Err(Error::BlockLengthMismatch { declared: 3, required: 4 }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_picture_field_overrunning_block_fails() {
        // 40 bytes leave 8 for the variable-length fields, but the MIME type
        // claims 100.
        let mut body = 3u32.to_be_bytes().to_vec();
        body.extend_from_slice(&100u32.to_be_bytes());
        body.resize(40, 0);
        let mut bytes = header_bytes(true, 6, 40);
        bytes.extend(body);
        let mut input = cursor_over(bytes);

        match read_block(&mut input) {
            Err(Error::BlockLengthMismatch { declared: 40, required: 132 }) => {}
            other => panic!("unexpected {:?}", other),
        }
        // The length prefix is rejected before anything is allocated for it.
        assert_eq!(input.bit_offset(), (4 + 8) * 8);
    }

    #[test]
    fn verify_body_overrunning_length_fails() {
        let mut bytes = header_bytes(true, 0, 30);
        bytes.extend(streaminfo_bytes(4096, 4096, 44_100, 1, 15, 0));
        let mut input = cursor_over(bytes);

        match read_block(&mut input) {
            Err(Error::BlockLengthMismatch { declared: 30, required: 34 }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_missing_last_block_is_truncated_input() {
        let mut bytes = header_bytes(false, 1, 2);
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend(header_bytes(false, 1, 1));
        bytes.push(0);
        let mut input = cursor_over(bytes);

        let (blocks, err) = read_all(&mut input);
        assert_eq!(blocks.len(), 2);
        match err {
            Some(Error::InBlock { index: 2, ref source }) => match **source {
                Error::TruncatedInput { .. } => {}
                ref other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_reader_is_fused_after_error() {
        let mut input = cursor_over(header_bytes(false, 127, 0));
        let mut reader = MetadataBlockReader::new(&mut input);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
        assert_eq!(reader.size_hint(), (0, Some(0)));
    }
}
