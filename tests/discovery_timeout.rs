// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `create_client` gives up with `Error::DiscoveryTimeout` when the required
//! service never appears in the discovery cache (§4.3, §6).

use std::collections::HashMap;
use std::sync::Arc;

use someip_rt::config::model::{RequiredService, ResolvedConfig};
use someip_rt::{ConsoleLogger, Level, Runtime};

#[test]
fn create_client_times_out_when_service_is_never_offered() {
    let mut required = HashMap::new();
    required.insert(
        "calculator".to_string(),
        RequiredService {
            service_id: 0x1001,
            instance_id: 1,
            major_version: Some(1),
            find_on: vec![],
            static_endpoint: None,
        },
    );

    let config = ResolvedConfig {
        interfaces: HashMap::new(),
        providing: HashMap::new(),
        required,
        request_timeout_ms: 80,
    };

    let logger: Arc<dyn someip_rt::Logger> = Arc::new(ConsoleLogger::new(Level::Warn));
    let mut runtime = Runtime::from_config(config, logger).expect("runtime starts");

    let err = runtime.create_client("calculator").unwrap_err();
    assert!(matches!(err, someip_rt::Error::DiscoveryTimeout));

    runtime.stop();
}

#[test]
fn create_client_resolves_immediately_for_a_static_endpoint() {
    let mut required = HashMap::new();
    required.insert(
        "calculator".to_string(),
        RequiredService {
            service_id: 0x1001,
            instance_id: 1,
            major_version: Some(1),
            find_on: vec![],
            static_endpoint: Some(someip_rt::config::model::Endpoint {
                ip: "127.0.0.1".parse().unwrap(),
                port: 41299,
                protocol: someip_rt::config::model::EndpointProtocol::Udp,
            }),
        },
    );

    let config = ResolvedConfig {
        interfaces: HashMap::new(),
        providing: HashMap::new(),
        required,
        request_timeout_ms: 2000,
    };

    let logger: Arc<dyn someip_rt::Logger> = Arc::new(ConsoleLogger::new(Level::Warn));
    let mut runtime = Runtime::from_config(config, logger).expect("runtime starts");

    let addr = runtime.create_client("calculator").expect("static endpoint bypasses discovery");
    assert_eq!(addr.port(), 41299);

    runtime.stop();
}
