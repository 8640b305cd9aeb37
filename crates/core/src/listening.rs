// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listening endpoint descriptors and their socket operations.
//!
//! Descriptors are raw file descriptors managed by an explicit protocol:
//! they are transferred between cycles by value during builder matching,
//! handed to child processes across `exec`, and closed only at the points
//! the cycle lifecycle defines. There is no drop-time close.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};

use nix::sys::socket::{
    bind, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag, SockType,
    SockaddrIn, SockaddrIn6,
};
use tracing::error;

/// Accept-queue depth for newly opened sockets.
const LISTEN_BACKLOG: i32 = 511;

/// One socket the server accepts on.
///
/// On a committed cycle exactly one of `new`/`remain` is set and `ignore`
/// never appears; `ignore` marks inherited descriptors that could not be
/// characterized and exist only between startup decode and the first build.
#[derive(Debug)]
pub struct Listening {
    pub addr: SocketAddr,
    /// Printable form of `addr`.
    pub addr_text: String,
    pub fd: Option<RawFd>,
    /// Opened by this cycle.
    pub new: bool,
    /// Carried over from the previous cycle.
    pub remain: bool,
    /// Inherited but unusable.
    pub ignore: bool,
}

impl Listening {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            addr_text: addr.to_string(),
            fd: None,
            new: false,
            remain: false,
            ignore: false,
        }
    }

    /// An inherited descriptor characterized by `getsockname`.
    pub fn inherited(fd: RawFd, addr: SocketAddr) -> Self {
        Self { fd: Some(fd), ..Self::new(addr) }
    }

    /// An inherited descriptor that could not be characterized; excluded
    /// from matching and never committed.
    pub fn ignored(fd: RawFd) -> Self {
        Self {
            addr_text: format!("<inherited #{fd}>"),
            fd: Some(fd),
            ignore: true,
            ..Self::new(SocketAddr::from(([0, 0, 0, 0], 0)))
        }
    }

    /// Create, bind, and listen on the socket for `addr`.
    ///
    /// The descriptor is created close-on-exec; the spawn path clears the
    /// flag for the handoff window.
    pub fn open(&mut self) -> nix::Result<()> {
        let family = match self.addr {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        };
        let sock = socket(family, SockType::Stream, SockFlag::SOCK_CLOEXEC, None)?;
        setsockopt(&sock, sockopt::ReuseAddr, &true)?;
        match self.addr {
            SocketAddr::V4(v4) => bind(sock.as_raw_fd(), &SockaddrIn::from(v4))?,
            SocketAddr::V6(v6) => bind(sock.as_raw_fd(), &SockaddrIn6::from(v6))?,
        }
        listen(&sock, Backlog::new(LISTEN_BACKLOG)?)?;
        self.fd = Some(sock.into_raw_fd());
        Ok(())
    }

    /// Close the descriptor if one is held. Close failures are logged and
    /// do not alter control flow.
    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            if let Err(e) = nix::unistd::close(fd) {
                error!(addr = %self.addr_text, fd, error = %e, "closing listening socket failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "listening_tests.rs"]
mod tests;
