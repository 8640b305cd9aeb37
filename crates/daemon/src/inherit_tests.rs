// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use std::net::TcpListener;
use std::os::fd::AsRawFd;

fn cycle_with_fds(fds: &[Option<RawFd>]) -> Cycle {
    let mut cycle = Cycle::init();
    for fd in fds {
        let mut ls = Listening::new(SocketAddr::from(([127, 0, 0, 1], 80)));
        ls.fd = *fd;
        cycle.listening.push(ls);
    }
    cycle
}

#[test]
fn encode_lists_descriptors_in_listener_order() {
    let cycle = cycle_with_fds(&[Some(3), Some(7), Some(12)]);
    assert_eq!(encode(&cycle), "3;7;12;");
}

#[test]
fn encode_skips_unbound_listeners() {
    let cycle = cycle_with_fds(&[Some(3), None, Some(9)]);
    assert_eq!(encode(&cycle), "3;9;");
}

#[test]
fn encode_of_no_listeners_is_empty() {
    assert_eq!(encode(&Cycle::init()), "");
}

#[test]
fn decode_round_trips_live_sockets_in_order() {
    let a = TcpListener::bind("127.0.0.1:0").unwrap();
    let b = TcpListener::bind("127.0.0.1:0").unwrap();

    let value = format!("{};{};", a.as_raw_fd(), b.as_raw_fd());
    let entries = decode(&value);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].fd, Some(a.as_raw_fd()));
    assert_eq!(entries[0].addr, a.local_addr().unwrap());
    assert_eq!(entries[1].addr, b.local_addr().unwrap());
    assert!(entries.iter().all(|ls| !ls.ignore));
}

#[test]
fn decode_accepts_colon_separators_too() {
    let a = TcpListener::bind("127.0.0.1:0").unwrap();
    let entries = decode(&format!("{}:", a.as_raw_fd()));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].addr, a.local_addr().unwrap());
}

#[test]
fn malformed_token_keeps_already_parsed_entries() {
    let a = TcpListener::bind("127.0.0.1:0").unwrap();
    let entries = decode(&format!("{};x7;{};", a.as_raw_fd(), a.as_raw_fd()));

    assert_eq!(entries.len(), 1, "parsing stops at the malformed token");
    assert_eq!(entries[0].addr, a.local_addr().unwrap());
}

#[test]
fn empty_and_negative_tokens_abort_parsing() {
    assert!(decode(";").is_empty());
    assert!(decode(":").is_empty());
    assert!(decode("-3;").is_empty());
}

#[test]
fn trailing_digits_without_terminator_are_dropped() {
    let a = TcpListener::bind("127.0.0.1:0").unwrap();
    let entries = decode(&format!("{};99", a.as_raw_fd()));
    assert_eq!(entries.len(), 1);
}

#[test]
fn non_socket_descriptor_is_marked_ignore() {
    let file = tempfile::tempfile().unwrap();
    let entries = decode(&format!("{};", file.as_raw_fd()));

    assert_eq!(entries.len(), 1);
    assert!(entries[0].ignore);
    assert_eq!(entries[0].fd, Some(file.as_raw_fd()));
}

#[test]
fn unsupported_family_is_marked_ignore() {
    let dir = tempfile::tempdir().unwrap();
    let unix = std::os::unix::net::UnixListener::bind(dir.path().join("s.sock")).unwrap();

    let entries = decode(&format!("{};", unix.as_raw_fd()));
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ignore, "non-INET families cannot be adopted");
}

#[test]
fn decode_of_an_empty_value_yields_no_listeners() {
    assert!(decode("").is_empty());
}
