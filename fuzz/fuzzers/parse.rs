// Clarion -- A FLAC container parser in Rust
// Copyright 2026 Ruud van Asseldonk
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

#![no_main]

use libfuzzer_sys::fuzz_target;

use clarion::{Error, ParseOptions};

fuzz_target!(|data: &[u8]| {
    // Both modes must terminate without panicking on any input.
    for &strict in &[false, true] {
        let options = ParseOptions {
            strict: strict,
            verify_crc: strict,
            ..ParseOptions::default()
        };
        let (stream, err) = clarion::parse_with_options(data, options);

        // A clean parse always ends in a frame header.
        if err.is_none() {
            assert_eq!(stream.frames().len(), 1);
        }

        // Running out of data is the only way to fail on a prefix of the marker.
        if data.len() < 4 && b"fLaC".starts_with(data) {
            match err.as_ref().map(|e| e.root()) {
                Some(&Error::TruncatedInput { .. }) => {}
                other => panic!("unexpected {:?}", other),
            }
        }
    }
});
