// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resolved, alias-free configuration model (§3, §4.6) — what `load()`
//! produces once every reference into `RawConfig` has been checked.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::sd::OptionProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointProtocol {
    Udp,
    Tcp,
}

impl EndpointProtocol {
    #[must_use]
    pub fn to_sd_protocol(self) -> OptionProtocol {
        match self {
            EndpointProtocol::Udp => OptionProtocol::Udp,
            EndpointProtocol::Tcp => OptionProtocol::Tcp,
        }
    }
}

/// One resolved network endpoint: an IP, a port, a protocol, an IP version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
    pub protocol: EndpointProtocol,
}

/// SD-specific settings for one interface.
#[derive(Debug, Clone, Copy)]
pub struct SdSettings {
    pub endpoint_v4: Option<Endpoint>,
    pub endpoint_v6: Option<Endpoint>,
    pub initial_delay_min_ms: Option<u64>,
    pub initial_delay_max_ms: Option<u64>,
    pub cycle_offer_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub multicast_hops: Option<u32>,
}

/// A named network adapter: its resolvable endpoints plus SD settings.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub endpoints: HashMap<String, Endpoint>,
    pub sd: SdSettings,
    /// The SD-control unicast endpoint on this interface, if configured via
    /// the instance's top-level `unicast_bind` map.
    pub unicast_bind: Option<Endpoint>,
}

/// A service this instance offers.
#[derive(Debug, Clone)]
pub struct OfferedService {
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub minor_version: u32,
    /// Interface alias -> endpoint to offer this service on.
    pub offer_on: HashMap<String, Endpoint>,
    pub multicast: Option<Endpoint>,
    pub eventgroups: Vec<u16>,
    pub cycle_offer_ms: Option<u64>,
}

/// A service this instance requires.
#[derive(Debug, Clone)]
pub struct RequiredService {
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: Option<u8>,
    /// Interface aliases to listen for Offers on; empty = any interface.
    pub find_on: Vec<String>,
    /// Bypasses SD entirely when set.
    pub static_endpoint: Option<Endpoint>,
}

/// The fully resolved configuration for one runtime instance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub interfaces: HashMap<String, Interface>,
    pub providing: HashMap<String, OfferedService>,
    pub required: HashMap<String, RequiredService>,
    pub request_timeout_ms: u64,
}
