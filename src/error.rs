// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! The `error` module defines the error and result types.

use std::io;
use std::result;
use std::string::FromUtf8Error;

use thiserror::Error;

/// An error that prevents successful parsing of the FLAC stream.
#[derive(Debug, Error)]
pub enum Error {
    /// Not a parse error, but a problem with the underlying IO.
    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    /// The stream does not start with `fLaC`.
    #[error("invalid stream marker: expected 'fLaC', found {found:?}")]
    MarkerMismatch { found: [u8; 4] },

    /// The source ran out of data in the middle of a field.
    #[error("input truncated at bit offset {bit_offset}")]
    TruncatedInput { bit_offset: u64 },

    /// Metadata block type 127 is invalid, to avoid confusion with a frame sync code.
    #[error("invalid metadata block type 127")]
    InvalidBlockType,

    /// The length of a seek table is not a multiple of the seek point size.
    #[error("malformed seek table: length {length} is not a multiple of 18")]
    MalformedSeekTable { length: u32 },

    /// A Vorbis comment block is structurally invalid.
    #[error("malformed Vorbis comment: {0}")]
    MalformedVorbisComment(&'static str),

    /// One of the STREAMINFO invariants does not hold.
    ///
    /// This error does not stop the parse by default; it is recorded in
    /// `Stream::warnings` instead.
    #[error("STREAMINFO constraint violated: {0}")]
    StreamInfoConstraintViolation(&'static str),

    /// The first metadata block is some other type than STREAMINFO.
    ///
    /// Only reported when parsing strictly.
    #[error("first metadata block is not STREAMINFO")]
    MissingStreamInfo,

    /// A metadata block body does not fit in the length its header declares.
    #[error("metadata block body needs {required} bytes, but the header declares {declared}")]
    BlockLengthMismatch { declared: u32, required: u64 },

    /// A frame header contains a reserved or invalid table code.
    #[error("reserved {field} code {code:#06b}")]
    ReservedCode { field: &'static str, code: u8 },

    /// The frame or sample number is not validly encoded.
    #[error("invalid frame or sample number encoding")]
    InvalidCounter,

    /// A frame header field does not have its mandatory value.
    #[error("invalid frame header: {0}")]
    InvalidFrameHeader(&'static str),

    /// The stored frame header CRC-8 does not match the computed one.
    #[error("frame header CRC-8 mismatch: stored {stored:#04x}, computed {computed:#04x}")]
    CrcMismatch { stored: u8, computed: u8 },

    /// A text field is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// An error that occurred while decoding a particular metadata block.
    #[error("metadata block {index}: {source}")]
    InBlock {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// An error that occurred while decoding a frame header field.
    #[error("frame header field '{field}': {source}")]
    InFrameHeader {
        field: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the error without the block or field context around it.
    pub fn root(&self) -> &Error {
        match *self {
            Error::InBlock { ref source, .. } => source.root(),
            Error::InFrameHeader { ref source, .. } => source.root(),
            ref other => other,
        }
    }

    /// Converts an IO error that happened at the given bit offset.
    ///
    /// Running out of input is a property of the stream, not of the IO, so
    /// an unexpected EOF becomes `TruncatedInput`.
    pub fn from_io(err: io::Error, bit_offset: u64) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedInput { bit_offset },
            _ => Error::Io(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Either `T` on success, or an `Error` on failure.
pub type Result<T> = result::Result<T, Error>;

#[test]
fn root_peels_context() {
    let inner = Error::TruncatedInput { bit_offset: 96 };
    let field = Error::InFrameHeader { field: "crc", source: Box::new(inner) };
    let err = Error::InBlock { index: 2, source: Box::new(field) };
    match *err.root() {
        Error::TruncatedInput { bit_offset } => assert_eq!(bit_offset, 96),
        ref other => panic!("unexpected root {:?}", other),
    }
    assert_eq!(
        format!("{}", err),
        "metadata block 2: frame header field 'crc': input truncated at bit offset 96"
    );
}

#[test]
fn eof_becomes_truncated_input() {
    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
    match Error::from_io(eof, 12) {
        Error::TruncatedInput { bit_offset: 12 } => {}
        other => panic!("unexpected {:?}", other),
    }
    let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
    match Error::from_io(other, 12) {
        Error::Io(..) => {}
        other => panic!("unexpected {:?}", other),
    }
}
