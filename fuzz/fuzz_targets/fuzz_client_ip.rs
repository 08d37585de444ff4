//! Fuzz testing for client IP resolution and byte humanizers.
//!
//! Resolution must never panic, whatever bytes a client sends in the IP
//! headers, and a resolved address must always render as a parseable IP.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_client_ip -- -max_total_time=60
//! ```

#![no_main]

use std::net::IpAddr;

use arbitrary::Arbitrary;
use axum::http::{HeaderValue, Request};
use libfuzzer_sys::fuzz_target;
use slogx::middleware::{client_ip, client_ip_string, UNKNOWN_IP};
use slogx::{byte_count_iec, human_size};

#[derive(Debug, Arbitrary)]
struct Input {
    header: u8,
    value: Vec<u8>,
    bytes: u64,
}

const HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

fuzz_target!(|input: Input| {
    let mut req = Request::new(());
    if let Ok(value) = HeaderValue::from_bytes(&input.value) {
        let name = HEADERS[usize::from(input.header) % HEADERS.len()];
        req.headers_mut().insert(name, value);
    }

    let rendered = client_ip_string(&req);
    match client_ip(&req) {
        Some(ip) => assert_eq!(rendered.parse::<IpAddr>().ok(), Some(ip)),
        None => assert_eq!(rendered, UNKNOWN_IP),
    }

    assert!(byte_count_iec(input.bytes).ends_with('B'));
    assert!(human_size(input.bytes).ends_with('B'));
});
