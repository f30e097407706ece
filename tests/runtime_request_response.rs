// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end `Runtime`: offer a service over loopback UDP and call it with
//! `send_request`, confirming the full encode/send/dispatch/respond/
//! correlate round trip (§4.4, §6).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use someip_rt::config::model::{Endpoint, EndpointProtocol, Interface, OfferedService, ResolvedConfig, SdSettings};
use someip_rt::{ConsoleLogger, Level, Runtime};

fn loopback_config(data_port: u16) -> (ResolvedConfig, SocketAddr) {
    let data_endpoint = Endpoint {
        ip: "127.0.0.1".parse().unwrap(),
        port: data_port,
        protocol: EndpointProtocol::Udp,
    };

    let mut endpoints = HashMap::new();
    endpoints.insert("data".to_string(), data_endpoint);
    let mut interfaces = HashMap::new();
    interfaces.insert(
        "lo".to_string(),
        Interface {
            name: "lo".to_string(),
            endpoints,
            sd: SdSettings {
                endpoint_v4: None,
                endpoint_v6: None,
                initial_delay_min_ms: None,
                initial_delay_max_ms: None,
                cycle_offer_ms: None,
                request_timeout_ms: None,
                multicast_hops: None,
            },
            unicast_bind: None,
        },
    );

    let mut offer_on = HashMap::new();
    offer_on.insert("lo".to_string(), data_endpoint);
    let mut providing = HashMap::new();
    providing.insert(
        "adder".to_string(),
        OfferedService {
            service_id: 0x1001,
            instance_id: 1,
            major_version: 1,
            minor_version: 0,
            offer_on,
            multicast: None,
            eventgroups: vec![],
            cycle_offer_ms: None,
        },
    );

    (
        ResolvedConfig { interfaces, providing, required: HashMap::new(), request_timeout_ms: 2000 },
        SocketAddr::new(data_endpoint.ip, data_endpoint.port),
    )
}

#[test]
fn request_response_round_trip_over_loopback_udp() {
    let (config, target) = loopback_config(41231);
    let logger: Arc<dyn someip_rt::Logger> = Arc::new(ConsoleLogger::new(Level::Warn));
    let mut runtime = Runtime::from_config(config, logger).expect("runtime starts");

    runtime
        .offer_service("adder", |_header, payload: &[u8]| {
            let a = i32::from_be_bytes(payload[0..4].try_into().unwrap());
            let b = i32::from_be_bytes(payload[4..8].try_into().unwrap());
            Some((a + b).to_be_bytes().to_vec())
        })
        .expect("adder is in providing");

    let mut payload = 7i32.to_be_bytes().to_vec();
    payload.extend_from_slice(&35i32.to_be_bytes());

    let response = runtime
        .send_request(0x1001, 0x0001, &payload, target)
        .expect("adder replies");
    let sum = i32::from_be_bytes(response[0..4].try_into().unwrap());
    assert_eq!(sum, 42);

    runtime.stop();
}

#[test]
fn request_to_unoffered_method_returns_remote_error() {
    let (config, target) = loopback_config(41232);
    let logger: Arc<dyn someip_rt::Logger> = Arc::new(ConsoleLogger::new(Level::Warn));
    let mut runtime = Runtime::from_config(config, logger).expect("runtime starts");

    runtime.offer_service("adder", |_h, _p: &[u8]| None).unwrap();

    let err = runtime.send_request(0x1001, 0x0001, &[], target).unwrap_err();
    assert!(matches!(err, someip_rt::Error::RemoteError(_)));

    runtime.stop();
}
