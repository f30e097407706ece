// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON configuration loading and alias resolution (§4.6, §6).
//!
//! Deserializes the raw wire shape with `serde_json`, then resolves every
//! `offer_on`/`find_on`/`sd.endpoint*` alias reference against the declared
//! interfaces, failing fast with [`Error::ConfigResolution`] and a
//! path-qualified message on anything that doesn't resolve.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::config::model::{
    Endpoint, EndpointProtocol, Interface, OfferedService, RequiredService, ResolvedConfig, SdSettings,
};
use crate::error::{Error, Result};
use crate::sd::constants::DEFAULT_REQUEST_TIMEOUT_MS;

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    ip: IpAddr,
    port: u16,
    protocol: String,
    #[serde(default)]
    version: Option<u8>,
    #[serde(default)]
    interface: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSd {
    endpoint: Option<String>,
    endpoint_v6: Option<String>,
    initial_delay: Option<u64>,
    offer_interval: Option<u64>,
    cycle_offer_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    multicast_hops: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    endpoints: HashMap<String, RawEndpoint>,
    #[serde(default)]
    sd: RawSd,
}

#[derive(Debug, Deserialize, Default)]
struct RawProviding {
    service_id: u16,
    instance_id: u16,
    major_version: u8,
    #[serde(default)]
    minor_version: u32,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    offer_on: HashMap<String, String>,
    #[serde(default)]
    multicast: Option<String>,
    #[serde(default)]
    eventgroups: Vec<u16>,
    #[serde(default)]
    cycle_offer_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRequired {
    service_id: u16,
    instance_id: u16,
    #[serde(default)]
    major_version: Option<u8>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    find_on: Vec<String>,
    #[serde(default)]
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawInstance {
    #[serde(default)]
    interfaces: HashMap<String, RawInterface>,
    #[serde(default)]
    unicast_bind: HashMap<String, String>,
    #[serde(default)]
    providing: HashMap<String, RawProviding>,
    #[serde(default)]
    required: HashMap<String, RawRequired>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    instances: HashMap<String, RawInstance>,
}

fn parse_protocol(path: &str, raw: &str) -> Result<EndpointProtocol> {
    match raw {
        "udp" => Ok(EndpointProtocol::Udp),
        "tcp" => Ok(EndpointProtocol::Tcp),
        other => Err(Error::ConfigResolution(format!("{path}: unknown protocol {other:?}"))),
    }
}

fn resolve_interface(alias: &str, raw: &RawInterface, unicast_bind_alias: Option<&str>) -> Result<Interface> {
    let mut endpoints = HashMap::new();
    for (ep_alias, raw_ep) in &raw.endpoints {
        let protocol = parse_protocol(&format!("interfaces.{alias}.endpoints.{ep_alias}.protocol"), &raw_ep.protocol)?;
        endpoints.insert(
            ep_alias.clone(),
            Endpoint {
                ip: raw_ep.ip,
                port: raw_ep.port,
                protocol,
            },
        );
    }

    let endpoint_v4 = raw
        .sd
        .endpoint
        .as_ref()
        .map(|e| lookup_endpoint(&endpoints, e, &format!("interfaces.{alias}.sd.endpoint")))
        .transpose()?;
    let endpoint_v6 = raw
        .sd
        .endpoint_v6
        .as_ref()
        .map(|e| lookup_endpoint(&endpoints, e, &format!("interfaces.{alias}.sd.endpoint_v6")))
        .transpose()?;
    let unicast_bind = unicast_bind_alias
        .map(|e| lookup_endpoint(&endpoints, e, &format!("unicast_bind.{alias}")))
        .transpose()?;

    Ok(Interface {
        name: raw.name.clone().unwrap_or_else(|| alias.to_string()),
        endpoints,
        sd: SdSettings {
            endpoint_v4,
            endpoint_v6,
            initial_delay_min_ms: raw.sd.initial_delay,
            initial_delay_max_ms: raw.sd.initial_delay,
            cycle_offer_ms: raw.sd.cycle_offer_ms.or(raw.sd.offer_interval),
            request_timeout_ms: raw.sd.request_timeout_ms,
            multicast_hops: raw.sd.multicast_hops,
        },
        unicast_bind,
    })
}

fn lookup_endpoint(endpoints: &HashMap<String, Endpoint>, alias: &str, path: &str) -> Result<Endpoint> {
    endpoints
        .get(alias)
        .copied()
        .ok_or_else(|| Error::ConfigResolution(format!("{path}: endpoint alias {alias:?} not found")))
}

fn resolve_offer_on(
    interfaces: &HashMap<String, Interface>,
    alias: &str,
    offer_on: &HashMap<String, String>,
) -> Result<HashMap<String, Endpoint>> {
    let mut resolved = HashMap::new();
    for (iface_alias, endpoint_alias) in offer_on {
        let iface = interfaces.get(iface_alias).ok_or_else(|| {
            Error::ConfigResolution(format!("providing.{alias}.offer_on: interface {iface_alias:?} not found"))
        })?;
        let endpoint = lookup_endpoint(
            &iface.endpoints,
            endpoint_alias,
            &format!("providing.{alias}.offer_on.{iface_alias}"),
        )?;
        resolved.insert(iface_alias.clone(), endpoint);
    }
    Ok(resolved)
}

/// Parse and resolve a configuration document already read into memory,
/// selecting `instance_name` out of the document's `instances` map.
pub fn load_str(contents: &str, instance_name: &str) -> Result<ResolvedConfig> {
    let raw: RawConfig =
        serde_json::from_str(contents).map_err(|e| Error::ConfigResolution(format!("JSON parse error: {e}")))?;
    let raw = raw
        .instances
        .get(instance_name)
        .ok_or_else(|| Error::ConfigResolution(format!("instances.{instance_name}: instance not found")))?;

    let mut interfaces = HashMap::new();
    for (alias, raw_iface) in &raw.interfaces {
        let unicast_bind_alias = raw.unicast_bind.get(alias).map(String::as_str);
        interfaces.insert(alias.clone(), resolve_interface(alias, raw_iface, unicast_bind_alias)?);
    }
    for iface_alias in raw.unicast_bind.keys() {
        if !interfaces.contains_key(iface_alias) {
            return Err(Error::ConfigResolution(format!(
                "unicast_bind: interface {iface_alias:?} not found"
            )));
        }
    }

    let mut providing = HashMap::new();
    for (alias, raw_service) in &raw.providing {
        let offer_on = if raw_service.offer_on.is_empty() {
            match &raw_service.endpoint {
                Some(ep_alias) => {
                    // Single-interface shorthand: resolve against whichever
                    // interface declares this endpoint alias.
                    let (iface_alias, endpoint) = interfaces
                        .iter()
                        .find_map(|(iface_alias, iface)| iface.endpoints.get(ep_alias).map(|ep| (iface_alias.clone(), *ep)))
                        .ok_or_else(|| {
                            Error::ConfigResolution(format!(
                                "providing.{alias}.endpoint: alias {ep_alias:?} not found on any interface"
                            ))
                        })?;
                    HashMap::from([(iface_alias, endpoint)])
                }
                None => {
                    return Err(Error::ConfigResolution(format!(
                        "providing.{alias}: neither endpoint nor offer_on specified"
                    )))
                }
            }
        } else {
            resolve_offer_on(&interfaces, alias, &raw_service.offer_on)?
        };

        let multicast = raw_service
            .multicast
            .as_ref()
            .map(|ep_alias| {
                interfaces
                    .values()
                    .find_map(|iface| iface.endpoints.get(ep_alias))
                    .copied()
                    .ok_or_else(|| {
                        Error::ConfigResolution(format!("providing.{alias}.multicast: alias {ep_alias:?} not found"))
                    })
            })
            .transpose()?;

        providing.insert(
            alias.clone(),
            OfferedService {
                service_id: raw_service.service_id,
                instance_id: raw_service.instance_id,
                major_version: raw_service.major_version,
                minor_version: raw_service.minor_version,
                offer_on,
                multicast,
                eventgroups: raw_service.eventgroups.clone(),
                cycle_offer_ms: raw_service.cycle_offer_ms,
            },
        );
    }

    let mut required = HashMap::new();
    for (alias, raw_client) in &raw.required {
        for iface_alias in &raw_client.find_on {
            if !interfaces.contains_key(iface_alias) {
                return Err(Error::ConfigResolution(format!(
                    "required.{alias}.find_on: interface {iface_alias:?} not found"
                )));
            }
        }
        let static_endpoint = raw_client
            .endpoint
            .as_ref()
            .map(|ep_alias| {
                interfaces
                    .values()
                    .find_map(|iface| iface.endpoints.get(ep_alias))
                    .copied()
                    .ok_or_else(|| {
                        Error::ConfigResolution(format!("required.{alias}.endpoint: alias {ep_alias:?} not found"))
                    })
            })
            .transpose()?;

        required.insert(
            alias.clone(),
            RequiredService {
                service_id: raw_client.service_id,
                instance_id: raw_client.instance_id,
                major_version: raw_client.major_version,
                find_on: raw_client.find_on.clone(),
                static_endpoint,
            },
        );
    }

    Ok(ResolvedConfig {
        interfaces,
        providing,
        required,
        request_timeout_ms: raw.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
    })
}

/// Load and resolve a configuration document from disk, selecting
/// `instance_name` out of the document's `instances` map.
pub fn load_file(path: impl AsRef<Path>, instance_name: &str) -> Result<ResolvedConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigResolution(format!("{}: {e}", path.display())))?;
    load_str(&contents, instance_name)
}
