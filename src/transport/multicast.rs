// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group membership for the SD sockets.
//!
//! Unlike a discovery transport that joins on every interface it can find,
//! this crate binds and joins strictly on the interface named in
//! configuration (§4.4 binding discipline) — no interface enumeration, no
//! `UNSPECIFIED` fallback.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, UdpSocket};

/// Join an IPv4 multicast group on the interface identified by `local_addr`.
pub fn join_multicast_v4(socket: &UdpSocket, group: Ipv4Addr, local_addr: Ipv4Addr) -> io::Result<()> {
    socket.join_multicast_v4(&group, &local_addr)?;
    socket.set_multicast_loop_v4(true)?;
    Ok(())
}

/// Join an IPv6 multicast group on the interface identified by its OS index.
pub fn join_multicast_v6(socket: &UdpSocket, group: Ipv6Addr, interface_index: u32) -> io::Result<()> {
    socket.join_multicast_v6(&group, interface_index)?;
    socket.set_multicast_loop_v6(true)?;
    Ok(())
}

/// Apply the configured multicast hop/TTL limit, falling back to 1 (the
/// conventional "don't leave this link" default) when unconfigured.
pub fn set_multicast_hops(socket: &UdpSocket, hops: Option<u32>) -> io::Result<()> {
    let ttl = hops.unwrap_or(1);
    socket.set_multicast_ttl_v4(ttl)
}
