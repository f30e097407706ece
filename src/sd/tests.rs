// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dense coverage of SD entry/option parsing, kept separate from the
//! colocated unit tests in each submodule because this is the densest
//! wire-compatibility surface in the crate.

use super::constants::{entry_type, option_type, SD_METHOD_ID, SD_SERVICE_ID};
use super::*;
use crate::wire::header::{MessageType, SomeIpHeader};

#[test]
fn build_sd_offer_matches_scenario_3_byte_exactness() {
    let datagram = build_sd_offer(
        0x1234,
        0x0001,
        1,
        10,
        "127.0.0.1".parse().unwrap(),
        30500,
        OptionProtocol::Udp,
        3,
        1,
    );

    let header = SomeIpHeader::deserialize(&datagram).unwrap();
    assert_eq!(header.service_id, SD_SERVICE_ID);
    assert_eq!(header.method_id, SD_METHOD_ID);
    assert_eq!(header.message_type, MessageType::Notification);

    let payload = &datagram[16..];
    assert_eq!(payload[0], 0x00); // reboot not requested in this build

    let decoded = SdPacket::deserialize_payload(payload).unwrap();
    assert_eq!(decoded.entries.len(), 1);
    let resolved = &decoded.entries[0];
    assert_eq!(resolved.entry.service_id, 0x1234);
    assert_eq!(resolved.entry.instance_id, 0x0001);
    assert_eq!(resolved.entry.major_version, 1);
    assert_eq!(resolved.entry.ttl, 3);
    assert!(matches!(resolved.entry.kind, EntryKind::OfferService { minor_version: 10 }));
    assert_eq!(resolved.options.len(), 1);

    match resolved.options[0] {
        SdOption::Ipv4Endpoint { addr, port, protocol } => {
            assert_eq!(addr, "127.0.0.1".parse::<std::net::Ipv4Addr>().unwrap());
            assert_eq!(port, 30500);
            assert_eq!(protocol, OptionProtocol::Udp);
        }
        other => panic!("expected Ipv4Endpoint, got {other:?}"),
    }

    // Explicit wire-level check: option Type byte and spec-correct Length.
    let option_bytes_start = 16 + 8 + entry::ENTRY_LEN + 4;
    assert_eq!(datagram[option_bytes_start], option_type::IPV4_ENDPOINT);
    let length = u16::from_be_bytes([datagram[option_bytes_start + 1], datagram[option_bytes_start + 2]]);
    assert_eq!(length, constants::IPV4_OPTION_LENGTH);
}

#[test]
fn build_sd_offer_ipv6_uses_spec_correct_length() {
    let datagram = build_sd_offer(
        1, 1, 1, 0,
        "ff02::1".parse().unwrap(),
        30490,
        OptionProtocol::Udp,
        1,
        1,
    );
    let decoded = SdPacket::deserialize_payload(&datagram[16..]).unwrap();
    assert!(matches!(decoded.entries[0].options[0], SdOption::Ipv6Endpoint { .. }));
}

#[test]
fn stop_offer_entry_has_ttl_zero_and_find_offer_semantics() {
    let cache = DiscoveryCache::new();
    let remote = RemoteService {
        addr: "127.0.0.1:30500".parse().unwrap(),
        major_version: 1,
        minor_version: 10,
    };
    cache.offer(0x1234, 1, remote);
    assert_eq!(cache.lookup(0x1234, 1), Some(remote));

    let stop_entry = SdEntry {
        kind: EntryKind::OfferService { minor_version: 10 },
        index_1st: 0,
        index_2nd: 0,
        num_opts_1st: 0,
        num_opts_2nd: 0,
        service_id: 0x1234,
        instance_id: 1,
        major_version: 1,
        ttl: 0,
    };
    assert!(stop_entry.is_stop());
    cache.stop_offer(0x1234, 1);
    assert_eq!(cache.lookup(0x1234, 1), None);
}

#[test]
fn entry_two_option_groups_resolve_independently() {
    let unicast = SdOption::Ipv4Endpoint {
        addr: "10.0.0.1".parse().unwrap(),
        port: 30500,
        protocol: OptionProtocol::Udp,
    };
    let multicast = SdOption::Ipv4Multicast {
        addr: "224.0.0.1".parse().unwrap(),
        port: 30491,
        protocol: OptionProtocol::Udp,
    };

    let entry = SdEntry {
        kind: EntryKind::OfferService { minor_version: 0 },
        index_1st: 0,
        index_2nd: 1,
        num_opts_1st: 1,
        num_opts_2nd: 1,
        service_id: 0x1234,
        instance_id: 1,
        major_version: 1,
        ttl: 3,
    };

    let mut entries_bytes = Vec::new();
    entry.serialize(&mut entries_bytes);
    let mut options_bytes = Vec::new();
    unicast.serialize(&mut options_bytes);
    multicast.serialize(&mut options_bytes);

    let mut payload = Vec::new();
    payload.push(0u8);
    payload.extend_from_slice(&[0, 0, 0]);
    payload.extend_from_slice(&(entries_bytes.len() as u32).to_be_bytes());
    payload.extend_from_slice(&entries_bytes);
    payload.extend_from_slice(&(options_bytes.len() as u32).to_be_bytes());
    payload.extend_from_slice(&options_bytes);

    let decoded = SdPacket::deserialize_payload(&payload).unwrap();
    assert_eq!(decoded.entries[0].options.len(), 2);
    assert!(matches!(decoded.entries[0].options[0], SdOption::Ipv4Endpoint { .. }));
    assert!(matches!(decoded.entries[0].options[1], SdOption::Ipv4Multicast { .. }));
}

#[test]
fn subscribe_and_ack_round_trip_through_wire() {
    let sub = SdEntry {
        kind: EntryKind::SubscribeEventgroup { eventgroup_id: 0x0010, counter: 0 },
        index_1st: 0,
        index_2nd: 0,
        num_opts_1st: 1,
        num_opts_2nd: 0,
        service_id: 0x1234,
        instance_id: 1,
        major_version: 1,
        ttl: 5,
    };
    let option = SdOption::Ipv4Endpoint {
        addr: "127.0.0.1".parse().unwrap(),
        port: 40000,
        protocol: OptionProtocol::Udp,
    };

    let packet = SdPacket {
        reboot: false,
        entries: vec![ResolvedEntry { entry: sub, options: vec![option] }],
    };
    let datagram = packet.to_datagram(2);
    let decoded = SdPacket::deserialize_payload(&datagram[16..]).unwrap();
    match decoded.entries[0].entry.kind {
        EntryKind::SubscribeEventgroup { eventgroup_id, .. } => assert_eq!(eventgroup_id, 0x0010),
        other => panic!("expected SubscribeEventgroup, got {other:?}"),
    }

    let tracker = SubscriptionTracker::new();
    tracker.mark_pending(0x1234, 0x0010);
    assert!(!tracker.is_acked(0x1234, 0x0010));

    let ack_entry_type = entry_type::SUBSCRIBE_EVENTGROUP_ACK;
    assert_eq!(ack_entry_type, 0x07);
    tracker.apply_ack(0x1234, 0x0010, 5);
    assert!(tracker.is_acked(0x1234, 0x0010));
}

#[test]
fn ipv4_option_accepts_both_0x09_and_0x0a_lengths_on_the_wire() {
    let mut correct = Vec::new();
    SdOption::Ipv4Endpoint {
        addr: "127.0.0.1".parse().unwrap(),
        port: 1,
        protocol: OptionProtocol::Udp,
    }
    .serialize(&mut correct);
    assert_eq!(u16::from_be_bytes([correct[1], correct[2]]), constants::IPV4_OPTION_LENGTH);

    let mut compat = correct.clone();
    compat[1..3].copy_from_slice(&constants::IPV4_OPTION_LENGTH_COMPAT.to_be_bytes());
    compat.push(0);
    let (decoded, consumed) = SdOption::deserialize(&compat).unwrap();
    assert_eq!(consumed, compat.len());
    assert!(matches!(decoded, SdOption::Ipv4Endpoint { .. }));
}
