// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public runtime API (§6): `Runtime::new`, `offer_service`, `create_client`,
//! `send_request`, `send_notification`, eventgroup subscribe/unsubscribe,
//! `stop`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mio::{Poll, Waker};

use crate::config::model::EndpointProtocol;
use crate::config::{self, ResolvedConfig};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::reactor::dispatch::{Handler, HandlerRegistry};
use crate::reactor::pending::{self, PendingKey, PendingTable};
use crate::reactor::poll::{self, Command, OfferEntry, ReactorIo, Shared};
use crate::sd::{DiscoveryCache, OfferScheduler, OfferTiming, SubscriberTable, SubscriptionTracker, ANY_INSTANCE};
use crate::session::SessionManager;
use crate::transport::{tcp, udp};
use crate::wire::header::{MessageType, SomeIpHeader};
use crate::wire::tp::Reassembler;

/// Top-level handle to a running SOME/IP and SOME/IP-SD runtime.
pub struct Runtime {
    config: ResolvedConfig,
    shared: Arc<Shared>,
    cmd_tx: Sender<Command>,
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    /// Interface alias an offered service was bound on, recorded so
    /// `stop_offer` knows where to send the Stop-Offer entry. Populated by
    /// `offer_service`; resolved at construction time against `providing`.
    default_sd_destination: SocketAddr,
}

impl Runtime {
    /// Load `config_path`, resolve `instance_name`'s topology out of the
    /// document's `instances` map, and spawn the reactor thread.
    pub fn new(config_path: impl AsRef<Path>, instance_name: &str, logger: Arc<dyn Logger>) -> Result<Self> {
        let resolved = config::load_file(config_path, instance_name)?;
        Self::from_config(resolved, logger)
    }

    /// Build directly from an already-resolved configuration (used by tests
    /// that construct topology in-process rather than from a file).
    pub fn from_config(resolved: ResolvedConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let shared = Arc::new(Shared {
            handlers: HandlerRegistry::new(),
            pending: PendingTable::new(),
            discovery: DiscoveryCache::new(),
            subscribers: SubscriberTable::new(),
            subscriptions: SubscriptionTracker::new(),
            sessions: SessionManager::new(),
            logger,
        });

        let poll = Poll::new().map_err(|e| Error::BindFailure(format!("mio::Poll::new failed: {e}")))?;
        let waker = Arc::new(
            Waker::new(poll.registry(), poll::WAKER_TOKEN)
                .map_err(|e| Error::BindFailure(format!("mio::Waker::new failed: {e}")))?,
        );

        let mut io = ReactorIo {
            poll,
            waker: waker.clone(),
            udp_sockets: std::collections::HashMap::new(),
            tcp_listeners: std::collections::HashMap::new(),
            tcp_connections: std::collections::HashMap::new(),
            next_token: 0,
            offers: Vec::new(),
            reassembler: Reassembler::new(),
        };

        let mut sd_destination = "224.0.0.1:30490".parse().unwrap();
        for interface in resolved.interfaces.values() {
            // Endpoints consumed by SD multicast must not also be bound as
            // plain data sockets below.
            let mut sd_addrs: Vec<SocketAddr> = Vec::new();

            if let Some(endpoint) = interface.sd.endpoint_v4 {
                let local_addr = match endpoint.ip {
                    IpAddr::V4(v4) => v4,
                    IpAddr::V6(_) => continue,
                };
                let group: Ipv4Addr = crate::sd::constants::DEFAULT_SD_GROUP_V4.parse().unwrap();
                let socket = udp::bind_sd_multicast_v4(local_addr, endpoint.port, group, interface.sd.multicast_hops)?;
                io.add_udp(socket, true)
                    .map_err(|e| Error::BindFailure(format!("registering SD socket: {e}")))?;
                sd_destination = SocketAddr::new(group.into(), endpoint.port);
                sd_addrs.push(SocketAddr::new(endpoint.ip, endpoint.port));
            }

            if let Some(endpoint) = interface.sd.endpoint_v6 {
                if let IpAddr::V6(local_addr) = endpoint.ip {
                    let group: Ipv6Addr = crate::sd::constants::DEFAULT_SD_GROUP_V6.parse().unwrap();
                    // Configuration doesn't carry an OS interface index for
                    // the v6 group join; 0 lets the platform route via its
                    // default multicast-capable interface.
                    let socket = udp::bind_sd_multicast_v6(local_addr, endpoint.port, group, 0)?;
                    io.add_udp(socket, true)
                        .map_err(|e| Error::BindFailure(format!("registering SD v6 socket: {e}")))?;
                    sd_addrs.push(SocketAddr::new(endpoint.ip, endpoint.port));
                }
            }

            for endpoint in interface.endpoints.values() {
                let addr = SocketAddr::new(endpoint.ip, endpoint.port);
                if sd_addrs.contains(&addr) {
                    continue;
                }
                match endpoint.protocol {
                    EndpointProtocol::Udp => {
                        let socket = udp::bind_data_socket(addr)?;
                        io.add_udp(socket, false)
                            .map_err(|e| Error::BindFailure(format!("registering data socket: {e}")))?;
                    }
                    EndpointProtocol::Tcp => {
                        let listener = tcp::bind_listener(addr)?;
                        io.add_tcp_listener(listener)
                            .map_err(|e| Error::BindFailure(format!("registering TCP listener: {e}")))?;
                    }
                }
            }
        }

        for (alias, service) in &resolved.providing {
            let Some(endpoint) = service.offer_on.values().next() else { continue };
            io.offers.push(OfferEntry {
                service_id: service.service_id,
                instance_id: service.instance_id,
                major_version: service.major_version,
                minor_version: service.minor_version,
                endpoint: SocketAddr::new(endpoint.ip, endpoint.port),
                sd_destination,
                scheduler: OfferScheduler::new(OfferTiming {
                    cycle_offer: Duration::from_millis(
                        service.cycle_offer_ms.unwrap_or(crate::sd::constants::DEFAULT_CYCLE_OFFER_MS),
                    ),
                    ..OfferTiming::default()
                }),
            });
            let _ = alias;
        }

        let (cmd_tx, cmd_rx) = channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_shared = shared.clone();
        let thread_running = running.clone();
        let thread_handle = std::thread::spawn(move || {
            poll::run(io, thread_shared, cmd_rx, thread_running);
        });

        Ok(Self {
            config: resolved,
            shared,
            cmd_tx,
            waker,
            running,
            thread_handle: Some(thread_handle),
            default_sd_destination: sd_destination,
        })
    }

    /// Register a request handler for the service named `alias` in
    /// `providing`.
    pub fn offer_service(&self, alias: &str, handler: impl Handler + 'static) -> Result<()> {
        let service = self
            .config
            .providing
            .get(alias)
            .ok_or(Error::UnknownService)?;
        self.shared.handlers.register(service.service_id, Arc::new(handler));
        Ok(())
    }

    /// Wait (up to the configured `request_timeout_ms`) for `alias` in
    /// `required` to appear in the discovery cache, returning its endpoint.
    pub fn create_client(&self, alias: &str) -> Result<SocketAddr> {
        let required = self.config.required.get(alias).ok_or(Error::UnknownService)?;
        if let Some(endpoint) = required.static_endpoint {
            return Ok(SocketAddr::new(endpoint.ip, endpoint.port));
        }
        let instance = if required.instance_id == 0 { ANY_INSTANCE } else { required.instance_id };
        let rx = self.shared.discovery.wait_for(required.service_id, instance);
        rx.recv_timeout(Duration::from_millis(self.config.request_timeout_ms))
            .map(|remote| remote.addr)
            .map_err(|_| Error::DiscoveryTimeout)
    }

    /// Synchronous request/response: blocks until a Response/Error arrives
    /// or `request_timeout_ms` elapses.
    pub fn send_request(&self, service_id: u16, method_id: u16, payload: &[u8], target: SocketAddr) -> Result<Vec<u8>> {
        let client_id = 0;
        let session_id = self.shared.sessions.next(service_id, method_id);
        let header = SomeIpHeader::new(service_id, method_id, payload.len(), client_id, session_id, 1, MessageType::Request);

        let key = PendingKey { service_id, method_id, session_id };
        let rx = self.shared.pending.register(key);

        self.send_datagram(&header, payload, target)?;

        match pending::wait(&rx, Duration::from_millis(self.config.request_timeout_ms)) {
            Err(Error::Timeout) => {
                self.shared.pending.cancel(key);
                Err(Error::Timeout)
            }
            other => other,
        }
    }

    /// Fire-and-forget request: never registers a pending waiter.
    pub fn send_request_no_return(&self, service_id: u16, method_id: u16, payload: &[u8], target: SocketAddr) -> Result<()> {
        let session_id = self.shared.sessions.next(service_id, method_id);
        let header = SomeIpHeader::new(service_id, method_id, payload.len(), 0, session_id, 1, MessageType::RequestNoReturn);
        self.send_datagram(&header, payload, target)
    }

    /// Fan out a Notification to every current subscriber of
    /// `(service_id, event_id)`.
    pub fn send_notification(&self, service_id: u16, event_id: u16, payload: &[u8]) -> Result<()> {
        let session_id = self.shared.sessions.next(service_id, event_id);
        let header = SomeIpHeader::new(service_id, event_id, payload.len(), 0, session_id, 1, MessageType::Notification);
        for subscriber in self.shared.subscribers.subscribers_for(service_id, event_id) {
            self.send_datagram(&header, payload, subscriber)?;
        }
        Ok(())
    }

    pub fn subscribe_eventgroup(&self, service_id: u16, instance_id: u16, eventgroup_id: u16, ttl: u32) -> Result<()> {
        let _ = instance_id;
        self.shared.subscriptions.mark_pending(service_id, eventgroup_id);
        let session_id = self.shared.sessions.next(crate::sd::constants::SD_SERVICE_ID, crate::sd::constants::SD_METHOD_ID);
        let entry = crate::sd::SdEntry {
            kind: crate::sd::EntryKind::SubscribeEventgroup { eventgroup_id, counter: 0 },
            index_1st: 0,
            index_2nd: 0,
            num_opts_1st: 0,
            num_opts_2nd: 0,
            service_id,
            instance_id,
            major_version: 1,
            ttl,
        };
        let packet = crate::sd::SdPacket {
            reboot: false,
            entries: vec![crate::sd::ResolvedEntry { entry, options: vec![] }],
        };
        let datagram = packet.to_datagram(session_id);
        self.cmd_tx
            .send(Command::SendUdp { bytes: datagram, destination: self.default_sd_destination })
            .map_err(|_| Error::RuntimeStopped)?;
        self.waker.wake().map_err(|e| Error::SocketIo(e))?;
        Ok(())
    }

    /// Unsubscribe: local effect is immediate even though a Stop-Subscribe
    /// entry is still emitted on the wire for the provider's benefit.
    pub fn unsubscribe_eventgroup(&self, service_id: u16, instance_id: u16, eventgroup_id: u16) -> Result<()> {
        self.shared.subscriptions.remove(service_id, eventgroup_id);
        self.subscribe_eventgroup(service_id, instance_id, eventgroup_id, 0)
    }

    #[must_use]
    pub fn is_subscription_acked(&self, service_id: u16, eventgroup_id: u16) -> bool {
        self.shared.subscriptions.is_acked(service_id, eventgroup_id)
    }

    fn send_datagram(&self, header: &SomeIpHeader, payload: &[u8], destination: SocketAddr) -> Result<()> {
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(payload);
        self.cmd_tx
            .send(Command::SendUdp { bytes, destination })
            .map_err(|_| Error::RuntimeStopped)?;
        self.waker.wake().map_err(Error::SocketIo)?;
        Ok(())
    }

    /// Cooperative shutdown: signals the reactor thread and joins it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.cmd_tx.send(Command::Stop);
        let _ = self.waker.wake();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
