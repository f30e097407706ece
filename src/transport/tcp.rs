// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport: listener construction plus the per-connection receive
//! buffer that turns a byte stream back into framed SOME/IP messages (§4.4).

use std::net::SocketAddr;

use mio::net::TcpListener as MioTcpListener;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};
use crate::wire::header::HEADER_LEN;

/// Build a TCP listener bound exactly to `addr` (same binding discipline as
/// the UDP sockets — no wildcard fallback).
pub fn bind_listener(addr: SocketAddr) -> Result<MioTcpListener> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| Error::BindFailure(format!("{addr}: socket() failed: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::BindFailure(format!("{addr}: SO_REUSEADDR failed: {e}")))?;
    socket
        .bind(&addr.into())
        .map_err(|e| Error::BindFailure(format!("{addr}: bind() failed: {e}")))?;
    socket
        .listen(128)
        .map_err(|e| Error::BindFailure(format!("{addr}: listen() failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::BindFailure(format!("{addr}: set_nonblocking failed: {e}")))?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(MioTcpListener::from_std(std_listener))
}

/// Accumulates bytes read off one TCP connection and yields complete
/// SOME/IP messages (header + payload) as they become available, buffering
/// any partial trailing bytes for the next `feed`.
#[derive(Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly-read bytes and drain every complete frame now available.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }
            let length = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
            let total = 8 + length; // Length excludes ServiceId/MethodId/Length itself
            if self.buf.len() < total {
                break;
            }
            frames.push(self.buf[..total].to_vec());
            self.buf.drain(..total);
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::header::{MessageType, SomeIpHeader};

    fn frame(payload_len: usize) -> Vec<u8> {
        let header = SomeIpHeader::new(0x1001, 0x0001, payload_len, 0, 1, 1, MessageType::Request);
        let mut bytes = header.to_bytes();
        bytes.extend(std::iter::repeat(0xAB).take(payload_len));
        bytes
    }

    #[test]
    fn single_complete_frame_in_one_feed() {
        let mut assembler = FrameAssembler::new();
        let f = frame(4);
        let out = assembler.feed(&f);
        assert_eq!(out, vec![f]);
    }

    #[test]
    fn partial_frame_then_completion() {
        let mut assembler = FrameAssembler::new();
        let f = frame(8);
        assert!(assembler.feed(&f[..10]).is_empty());
        let out = assembler.feed(&f[10..]);
        assert_eq!(out, vec![f]);
    }

    #[test]
    fn two_frames_back_to_back() {
        let mut assembler = FrameAssembler::new();
        let f1 = frame(4);
        let f2 = frame(0);
        let mut combined = f1.clone();
        combined.extend_from_slice(&f2);
        let out = assembler.feed(&combined);
        assert_eq!(out, vec![f1, f2]);
    }
}
