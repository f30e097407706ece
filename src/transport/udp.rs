// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP socket construction: one data socket per configured endpoint, one SD
//! multicast socket per address family actually configured (§4.4).
//!
//! Binding discipline is strict: we bind only to the IP named in
//! configuration. No `0.0.0.0`/`::`/`127.0.0.1` fallback — the sole
//! wildcard bind permitted is one configuration itself specifies.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use mio::net::UdpSocket as MioUdpSocket;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};
use crate::transport::multicast;

/// Build a non-multicast UDP socket bound exactly to `addr`.
pub fn bind_data_socket(addr: SocketAddr) -> Result<MioUdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::BindFailure(format!("{addr}: socket() failed: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::BindFailure(format!("{addr}: SO_REUSEADDR failed: {e}")))?;
    socket
        .bind(&addr.into())
        .map_err(|e| Error::BindFailure(format!("{addr}: bind() failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::BindFailure(format!("{addr}: set_nonblocking failed: {e}")))?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(MioUdpSocket::from_std(std_socket))
}

/// Build the SD multicast socket for one address family: bound to the
/// multicast port on the interface's own unicast address, then joined to
/// `group`. Matches the teacher's "bind, then join" sequencing.
pub fn bind_sd_multicast_v4(
    local_addr: Ipv4Addr,
    port: u16,
    group: Ipv4Addr,
    hops: Option<u32>,
) -> Result<MioUdpSocket> {
    let bind_addr = SocketAddr::new(IpAddr::V4(local_addr), port);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: socket() failed: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: SO_REUSEADDR failed: {e}")))?;
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: bind() failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: set_nonblocking failed: {e}")))?;
    let std_socket: std::net::UdpSocket = socket.into();

    multicast::join_multicast_v4(&std_socket, group, local_addr)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: join_multicast_v4({group}) failed: {e}")))?;
    multicast::set_multicast_hops(&std_socket, hops)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: set_multicast_hops failed: {e}")))?;

    Ok(MioUdpSocket::from_std(std_socket))
}

/// IPv6 counterpart of [`bind_sd_multicast_v4`]. `interface_index` is the OS
/// scope id for the configured interface.
pub fn bind_sd_multicast_v6(
    local_addr: Ipv6Addr,
    port: u16,
    group: Ipv6Addr,
    interface_index: u32,
) -> Result<MioUdpSocket> {
    let bind_addr = SocketAddr::new(IpAddr::V6(local_addr), port);
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: socket() failed: {e}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: SO_REUSEADDR failed: {e}")))?;
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: bind() failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: set_nonblocking failed: {e}")))?;
    let std_socket: std::net::UdpSocket = socket.into();

    multicast::join_multicast_v6(&std_socket, group, interface_index)
        .map_err(|e| Error::BindFailure(format!("{bind_addr}: join_multicast_v6({group}) failed: {e}")))?;

    Ok(MioUdpSocket::from_std(std_socket))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_data_socket_to_loopback_succeeds() {
        let socket = bind_data_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(socket.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn bind_data_socket_rejects_unbindable_address() {
        // Port 0 on an address not owned by this host; 240.0.0.1 is reserved
        // (class E) and not assignable, so bind() will fail.
        let result = bind_data_socket("240.0.0.1:30500".parse().unwrap());
        assert!(result.is_err());
    }
}
