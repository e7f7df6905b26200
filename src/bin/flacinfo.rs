// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

// Prints the container structure of FLAC files, in the manner of
// `metaflac --list`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use clarion::metadata::{MetadataBlock, MetadataBlockBody, StreamInfo};
use clarion::{FrameHeader, ParseOptions, Stream};

fn print_streaminfo(info: &StreamInfo) {
    println!("  minimum blocksize: {} samples", info.min_block_size);
    println!("  maximum blocksize: {} samples", info.max_block_size);
    match info.min_frame_size {
        Some(n) => println!("  minimum framesize: {} bytes", n),
        None => println!("  minimum framesize: unknown"),
    }
    match info.max_frame_size {
        Some(n) => println!("  maximum framesize: {} bytes", n),
        None => println!("  maximum framesize: unknown"),
    }
    println!("  sample_rate: {} Hz", info.sample_rate);
    println!("  channels: {}", info.channels);
    println!("  bits-per-sample: {}", info.bits_per_sample);
    match info.samples {
        Some(n) => println!("  total samples: {}", n),
        None => println!("  total samples: unknown"),
    }
    let md5: String = info.md5sum.iter().map(|b| format!("{:02x}", b)).collect();
    println!("  MD5 signature: {}", md5);
}

fn print_block(index: usize, block: &MetadataBlock) {
    println!("METADATA block #{}", index);
    println!("  type: {}", block.header.block_type);
    println!("  is last: {}", block.header.is_last);
    println!("  length: {}", block.header.length);

    match block.body {
        MetadataBlockBody::StreamInfo(ref info) => print_streaminfo(info),
        MetadataBlockBody::Padding(..) | MetadataBlockBody::Unknown(..) => {}
        MetadataBlockBody::Application(ref app) => match app.id_str() {
            Some(id) => println!("  application ID: {}", id),
            None => println!("  application ID: {:02x?}", app.id),
        },
        MetadataBlockBody::SeekTable(ref table) => {
            println!("  seek points: {}", table.seekpoints.len());
            for (i, point) in table.seekpoints.iter().enumerate() {
                if point.is_placeholder() {
                    println!("    point {}: PLACEHOLDER", i);
                } else {
                    println!("    point {}: sample_number={}, stream_offset={}, frame_samples={}",
                             i, point.sample, point.offset, point.samples);
                }
            }
        }
        MetadataBlockBody::VorbisComment(ref comment) => {
            println!("  vendor string: {}", comment.vendor);
            println!("  comments: {}", comment.comments.len());
            for (i, (name, value)) in comment.tags().enumerate() {
                println!("    comment[{}]: {}={}", i, name, value);
            }
        }
        MetadataBlockBody::CueSheet(ref cue_sheet) => {
            println!("  media catalog number: {}", cue_sheet.catalog_number);
            println!("  lead-in: {}", cue_sheet.lead_in_samples);
            println!("  is CD: {}", cue_sheet.is_compact_disc);
            println!("  number of tracks: {}", cue_sheet.tracks.len());
            for track in &cue_sheet.tracks {
                println!("    track {}: offset={}, ISRC={}, indices={}",
                         track.number, track.offset, track.isrc, track.indices.len());
            }
        }
        MetadataBlockBody::Picture(ref picture) => {
            println!("  type: {:?}", picture.picture_type);
            println!("  MIME type: {}", picture.mime_type);
            println!("  description: {}", picture.description);
            println!("  width: {}", picture.width);
            println!("  height: {}", picture.height);
            println!("  depth: {}", picture.depth);
            println!("  colors: {}", picture.colors);
            match picture.url() {
                Some(url) => println!("  URL: {}", url),
                None => println!("  data length: {}", picture.data.len()),
            }
        }
    }
}

fn print_frame_header(header: &FrameHeader, streaminfo: Option<&StreamInfo>) {
    println!("FRAME #0");
    println!("  blocking strategy: {:?}", header.blocking_strategy);
    println!("  position: {:?}", header.block_time);
    match header.block_size() {
        Some(n) => println!("  block size: {}", n),
        None => println!("  block size: reserved"),
    }
    match (header.sample_rate(), streaminfo) {
        (Some(hz), _) => println!("  sample rate: {} Hz", hz),
        (None, Some(info)) => println!("  sample rate: {} Hz (from STREAMINFO)",
                                        header.sample_rate_or(info)),
        (None, None) => println!("  sample rate: from STREAMINFO"),
    }
    println!("  channel assignment: {:?}", header.channel_assignment);
    match (header.bits_per_sample(), streaminfo) {
        (Some(bps), _) => println!("  bits-per-sample: {}", bps),
        (None, Some(info)) => println!("  bits-per-sample: {} (from STREAMINFO)",
                                       header.bits_per_sample_or(info)),
        (None, None) => println!("  bits-per-sample: from STREAMINFO"),
    }
    println!("  CRC-8: {:#04x} (computed {:#04x})", header.crc8, header.computed_crc8);
}

/// Prints the structure of one file. Returns false if it failed to parse.
fn print_file(path: &Path, options: ParseOptions) -> bool {
    let fname = path.display();
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("{}: {}", fname, err);
            return false;
        }
    };

    let (stream, error): (Stream, _) = clarion::parse_with_options(file, options);

    println!("{}:", fname);
    for (i, block) in stream.metadata_blocks().iter().enumerate() {
        print_block(i, block);
    }
    if let Some(frame) = stream.first_frame() {
        print_frame_header(&frame.header, stream.streaminfo());
    }
    for warning in stream.warnings() {
        eprintln!("{}: warning: {}", fname, warning);
    }

    match error {
        Some(err) => {
            eprintln!("{}: error: {}", fname, err);
            false
        }
        None => true,
    }
}

/// Prints the metadata blocks and first frame header of FLAC files.
#[derive(Parser)]
#[command(name = "flacinfo", version)]
struct Args {
    /// Treat format violations as errors instead of warnings.
    #[arg(long)]
    strict: bool,

    /// Check the CRC-8 of the frame header.
    #[arg(long)]
    verify_crc: bool,

    /// Stop after the last metadata block.
    #[arg(long)]
    metadata_only: bool,

    /// FLAC files to inspect.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Args {
    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.strict,
            verify_crc: self.verify_crc,
            metadata_only: self.metadata_only,
            ..ParseOptions::default()
        }
    }
}

fn main() {
    let args = Args::parse();
    let options = args.parse_options();

    let mut all_ok = true;
    for path in &args.files {
        all_ok &= print_file(path, options);
    }

    if !all_ok {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::{CommandFactory, Parser};

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_map_to_parse_options() {
        let args = Args::try_parse_from(&["flacinfo", "--verify-crc", "--metadata-only", "a.flac"])
            .unwrap();
        let options = args.parse_options();
        assert!(!options.strict);
        assert!(options.verify_crc);
        assert!(options.metadata_only);
        assert_eq!(args.files.len(), 1);
    }

    #[test]
    fn misspelled_flag_is_rejected() {
        assert!(Args::try_parse_from(&["flacinfo", "--strcit", "a.flac"]).is_err());
    }

    #[test]
    fn at_least_one_file_is_required() {
        assert!(Args::try_parse_from(&["flacinfo", "--strict"]).is_err());
    }
}
