// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inherited-socket handoff across `exec`.
//!
//! Descriptors survive `exec`; their identity does not. The spawning side
//! encodes the listener descriptors into the `STOKERD` environment
//! variable, and the new image reconstructs listening entries from it by
//! asking each descriptor for its own address.

use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;

use nix::sys::socket::{getsockname, SockaddrStorage};
use stoker_core::{Cycle, Listening};
use tracing::{error, info, warn};

use crate::env;

/// Encode a cycle's listener descriptors: `<fd>;` per listener, in order.
pub fn encode(cycle: &Cycle) -> String {
    cycle
        .listening
        .iter()
        .filter_map(|ls| ls.fd)
        .map(|fd| format!("{fd};"))
        .collect()
}

/// Seed the init cycle's listeners from the environment, if the spawning
/// process passed any. Returns whether inherited sockets were found.
pub fn set_inherited(cycle: &mut Cycle) -> bool {
    let Some(value) = env::inherited_sockets() else {
        return false;
    };
    info!(%value, "using inherited sockets");
    cycle.listening = decode(&value);
    true
}

/// Parse the variable's value: decimal descriptor numbers, each terminated
/// by `:` or `;`. A malformed token abandons the rest of the variable with
/// a warning but keeps the entries parsed so far.
pub fn decode(value: &str) -> Vec<Listening> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if c != ':' && c != ';' {
            continue;
        }
        let token = &value[start..i];
        match token.parse::<RawFd>() {
            Ok(fd) if fd >= 0 => out.push(characterize(fd)),
            _ => {
                warn!(
                    token,
                    "invalid socket number in {} environment variable, \
                     ignoring the rest of the variable",
                    env::LISTEN_FDS
                );
                break;
            }
        }
        start = i + 1;
    }
    out
}

/// Ask the descriptor for its bound address. Descriptors that cannot be
/// characterized, or whose family is unsupported, are marked `ignore` and
/// excluded from matching.
fn characterize(fd: RawFd) -> Listening {
    let ss: SockaddrStorage = match getsockname(fd) {
        Ok(ss) => ss,
        Err(e) => {
            error!(fd, error = %e, "getsockname() of the inherited socket failed");
            return Listening::ignored(fd);
        }
    };

    if let Some(sin) = ss.as_sockaddr_in() {
        Listening::inherited(fd, SocketAddr::V4(SocketAddrV4::from(*sin)))
    } else if let Some(sin6) = ss.as_sockaddr_in6() {
        Listening::inherited(fd, SocketAddr::V6(SocketAddrV6::from(*sin6)))
    } else {
        error!(fd, "the inherited socket has an unsupported address family");
        Listening::ignored(fd)
    }
}

#[cfg(test)]
#[path = "inherit_tests.rs"]
mod tests;
