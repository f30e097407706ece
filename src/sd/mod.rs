// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOME/IP Service Discovery: entries, options, cyclic offer scheduling,
//! the discovery cache, and eventgroup subscription tracking.

pub mod cache;
pub mod constants;
pub mod entry;
pub mod offer;
pub mod option;
pub mod packet;
pub mod subscription;

#[cfg(test)]
mod tests;

pub use cache::{DiscoveryCache, RemoteService, ANY_INSTANCE};
pub use entry::{EntryKind, SdEntry};
pub use offer::{OfferScheduler, OfferState, OfferTiming};
pub use option::{OptionProtocol, SdOption};
pub use packet::{ResolvedEntry, SdPacket};
pub use subscription::{AckState, SubscriberTable, SubscriptionTracker};

/// Build the SD Offer datagram described by `build_sd_offer` in the external
/// interface surface: one OfferService entry carrying a single endpoint option.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_sd_offer(
    service_id: u16,
    instance_id: u16,
    major_version: u8,
    minor_version: u32,
    addr: std::net::IpAddr,
    port: u16,
    protocol: OptionProtocol,
    ttl: u32,
    session_id: u16,
) -> Vec<u8> {
    let option = match addr {
        std::net::IpAddr::V4(v4) => SdOption::Ipv4Endpoint { addr: v4, port, protocol },
        std::net::IpAddr::V6(v6) => SdOption::Ipv6Endpoint { addr: v6, port, protocol },
    };
    let packet = SdPacket {
        reboot: false,
        entries: vec![ResolvedEntry {
            entry: SdEntry {
                kind: EntryKind::OfferService { minor_version },
                index_1st: 0,
                index_2nd: 0,
                num_opts_1st: 1,
                num_opts_2nd: 0,
                service_id,
                instance_id,
                major_version,
                ttl,
            },
            options: vec![option],
        }],
    };
    packet.to_datagram(session_id)
}
