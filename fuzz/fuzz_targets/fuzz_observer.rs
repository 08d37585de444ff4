//! Fuzz testing for the response observer.
//!
//! Drives a `ResponseObserver` with arbitrary sequences of status, write and
//! flush calls and checks that the first status sticks (200 if a write or
//! flush came first) and that the size equals the bytes written.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_observer -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use axum::http::StatusCode;
use libfuzzer_sys::fuzz_target;
use slogx::{ResponseObserver, ResponseRecorder, ResponseWriter};

#[derive(Debug, Arbitrary)]
enum Op {
    Status(u16),
    Write(Vec<u8>),
    Flush,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut observer = ResponseObserver::new(ResponseRecorder::new());
    let mut expected_status = None;
    let mut expected_size = 0u64;

    for op in ops {
        match op {
            Op::Status(code) => {
                if let Ok(status) = StatusCode::from_u16(code) {
                    observer.write_status(status);
                    expected_status.get_or_insert(status);
                }
            }
            Op::Write(buf) => {
                let n = observer.write_body(&buf).unwrap_or(0);
                expected_status.get_or_insert(StatusCode::OK);
                expected_size += n as u64;
            }
            Op::Flush => {
                let _ = ResponseWriter::flush(&mut observer);
                expected_status.get_or_insert(StatusCode::OK);
            }
        }
    }

    assert_eq!(observer.status(), expected_status);
    assert_eq!(observer.size(), expected_size);
});
