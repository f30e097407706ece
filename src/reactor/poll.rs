// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The reactor's mio-based event loop: one dedicated thread owns every
//! socket and all timer evaluation (§4.4, §5).
//!
//! Grounded on the teacher's TCP I/O thread: a `mio::Poll` driven by a fixed
//! poll timeout, a command channel woken by a `mio::Waker`, and a running
//! flag checked each iteration.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::reactor::dispatch::{self, HandlerRegistry, Outbound};
use crate::reactor::pending::PendingTable;
use crate::sd::{DiscoveryCache, OfferScheduler, OfferState, RemoteService, SdPacket, SubscriberTable, SubscriptionTracker};
use crate::session::SessionManager;
use crate::wire::header::SomeIpHeader;
use crate::wire::tp::Reassembler;

pub const WAKER_TOKEN: Token = Token(usize::MAX);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_EVENTS: usize = 256;
const MAX_DATAGRAM: usize = 64 * 1024;

/// Commands the public `Runtime` API sends to the reactor thread.
pub enum Command {
    SendUdp { bytes: Vec<u8>, destination: SocketAddr },
    Stop,
}

/// One registered UDP data socket plus whether it's the SD multicast socket.
struct UdpEntry {
    socket: UdpSocket,
    is_sd: bool,
    local_addr: SocketAddr,
}

/// Where a fully-decoded inbound message came from, and therefore where a
/// reply must go back out.
#[derive(Clone, Copy)]
enum Origin {
    Udp(SocketAddr),
    Tcp(Token, SocketAddr),
}

impl Origin {
    fn addr(&self) -> SocketAddr {
        match self {
            Origin::Udp(addr) | Origin::Tcp(_, addr) => *addr,
        }
    }
}

/// One offered service tracked by the cyclic-offer scheduler.
pub struct OfferEntry {
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub minor_version: u32,
    pub endpoint: SocketAddr,
    pub sd_destination: SocketAddr,
    pub scheduler: OfferScheduler,
}

/// Shared state reachable from both the public API and the reactor thread.
pub struct Shared {
    pub handlers: HandlerRegistry,
    pub pending: PendingTable,
    pub discovery: DiscoveryCache,
    pub subscribers: SubscriberTable,
    pub subscriptions: SubscriptionTracker,
    pub sessions: SessionManager,
    pub logger: Arc<dyn crate::logging::Logger>,
}

impl Shared {
    fn log(&self, level: crate::logging::Level, msg: &str) {
        self.logger.log(level, "reactor", msg);
    }
}

/// Everything the reactor thread owns exclusively once spawned.
pub struct ReactorIo {
    pub poll: Poll,
    pub waker: Arc<Waker>,
    pub udp_sockets: HashMap<Token, UdpEntry>,
    pub tcp_listeners: HashMap<Token, TcpListener>,
    pub tcp_connections: HashMap<Token, (TcpStream, Vec<u8>)>,
    pub next_token: usize,
    pub offers: Vec<OfferEntry>,
    pub reassembler: Reassembler,
}

impl ReactorIo {
    fn alloc_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Register a UDP socket and return its token.
    pub fn add_udp(&mut self, mut socket: UdpSocket, is_sd: bool) -> std::io::Result<Token> {
        let token = self.alloc_token();
        self.poll.registry().register(&mut socket, token, Interest::READABLE)?;
        let local_addr = socket.local_addr()?;
        self.udp_sockets.insert(token, UdpEntry { socket, is_sd, local_addr });
        Ok(token)
    }

    /// Register a TCP listening socket (one per address family per
    /// interface) and return its token.
    pub fn add_tcp_listener(&mut self, mut listener: TcpListener) -> std::io::Result<Token> {
        let token = self.alloc_token();
        self.poll.registry().register(&mut listener, token, Interest::READABLE)?;
        self.tcp_listeners.insert(token, listener);
        Ok(token)
    }
}

/// Runs until `running` is cleared or a `Command::Stop` is received. Not
/// public beyond the crate — driven only via `Runtime::new`/`Runtime::stop`.
pub fn run(mut io: ReactorIo, shared: Arc<Shared>, commands: Receiver<Command>, running: Arc<AtomicBool>) {
    let mut events = Events::with_capacity(MAX_EVENTS);
    let mut buf = [0u8; MAX_DATAGRAM];

    for offer in &mut io.offers {
        offer.scheduler.start(Instant::now());
    }

    while running.load(Ordering::Relaxed) {
        if let Err(e) = io.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() == ErrorKind::Interrupted {
                continue;
            }
            shared.log(crate::logging::Level::Error, &format!("poll() failed: {e}"));
            break;
        }

        for event in events.iter() {
            if event.token() == WAKER_TOKEN {
                drain_commands(&commands, &io, &shared, &running);
                continue;
            }

            if io.tcp_listeners.contains_key(&event.token()) {
                accept_tcp(&mut io, event.token());
                continue;
            }

            if io.udp_sockets.contains_key(&event.token()) {
                handle_udp_readable(&mut io, &shared, event.token());
                continue;
            }

            if io.tcp_connections.contains_key(&event.token()) {
                handle_tcp_readable(&mut io, &shared, event.token());
            }
        }

        evaluate_offers(&mut io, &shared);
        io.reassembler.sweep_expired();

        let _ = &mut buf; // scratch buffer lifetime tied to the loop
    }

    shared.pending.release_all();
}

fn drain_commands(commands: &Receiver<Command>, io: &ReactorIo, shared: &Arc<Shared>, running: &Arc<AtomicBool>) {
    loop {
        match commands.try_recv() {
            Ok(Command::SendUdp { bytes, destination }) => send_on_any_udp(io, shared, &bytes, destination),
            Ok(Command::Stop) => {
                running.store(false, Ordering::Relaxed);
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                running.store(false, Ordering::Relaxed);
                break;
            }
        }
    }
}

/// Pick the best socket matching `predicate` to reach `destination`: prefer
/// one whose bound address shares `destination`'s family, falling back to
/// any match so a single-family deployment still works.
fn select_udp_socket<'a>(
    io: &'a ReactorIo,
    destination: SocketAddr,
    predicate: impl Fn(&UdpEntry) -> bool,
) -> Option<&'a UdpEntry> {
    let mut candidates = io.udp_sockets.values().filter(|e| predicate(e));
    let same_family = candidates.find(|e| e.local_addr.is_ipv4() == destination.is_ipv4());
    same_family.or_else(|| io.udp_sockets.values().filter(|e| predicate(e)).next())
}

fn send_on_any_udp(io: &ReactorIo, shared: &Arc<Shared>, bytes: &[u8], destination: SocketAddr) {
    let Some(entry) = select_udp_socket(io, destination, |e| !e.is_sd) else {
        shared.log(crate::logging::Level::Warn, "no data UDP socket available to send on");
        return;
    };
    if let Err(e) = entry.socket.send_to(bytes, destination) {
        shared.log(crate::logging::Level::Warn, &format!("send_to({destination}) failed: {e}"));
    }
}

fn send_on_sd_udp(io: &ReactorIo, shared: &Arc<Shared>, bytes: &[u8], destination: SocketAddr) {
    let Some(entry) = select_udp_socket(io, destination, |e| e.is_sd) else {
        shared.log(crate::logging::Level::Warn, "no SD UDP socket available to send on");
        return;
    };
    if let Err(e) = entry.socket.send_to(bytes, destination) {
        shared.log(crate::logging::Level::Warn, &format!("SD send_to({destination}) failed: {e}"));
    }
}

fn handle_udp_readable(io: &mut ReactorIo, shared: &Arc<Shared>, token: Token) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (n, source, is_sd) = {
            let Some(entry) = io.udp_sockets.get(&token) else { return };
            match entry.socket.recv_from(&mut buf) {
                Ok((n, source)) => (n, source, entry.is_sd),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    shared.log(crate::logging::Level::Warn, &format!("recv_from failed: {e}"));
                    return;
                }
            }
        };

        let data = &buf[..n];
        if is_sd {
            process_sd_datagram(shared, data, source);
        } else {
            process_data_datagram(io, shared, data, Origin::Udp(source));
        }
    }
}

fn process_sd_datagram(shared: &Arc<Shared>, data: &[u8], source: SocketAddr) {
    let Ok(header) = SomeIpHeader::deserialize(data) else {
        shared.log(crate::logging::Level::Warn, "malformed SD header, discarding");
        return;
    };
    let payload = &data[16..];
    let Ok(packet) = SdPacket::deserialize_payload(payload) else {
        shared.log(crate::logging::Level::Warn, "malformed SD payload, discarding");
        return;
    };
    let _ = header;

    for resolved in &packet.entries {
        use crate::sd::EntryKind;
        match resolved.entry.kind {
            EntryKind::OfferService { minor_version } => {
                if resolved.entry.is_stop() {
                    shared.discovery.stop_offer(resolved.entry.service_id, resolved.entry.instance_id);
                    continue;
                }
                let Some(crate::sd::SdOption::Ipv4Endpoint { addr, port, .. }) = resolved.options.first() else {
                    continue;
                };
                shared.discovery.offer(
                    resolved.entry.service_id,
                    resolved.entry.instance_id,
                    RemoteService {
                        addr: SocketAddr::new((*addr).into(), *port),
                        major_version: resolved.entry.major_version,
                        minor_version,
                    },
                );
            }
            EntryKind::SubscribeEventgroup { eventgroup_id, .. } => {
                shared.subscribers.subscribe(resolved.entry.service_id, eventgroup_id, source);
            }
            EntryKind::SubscribeEventgroupAck { eventgroup_id, .. } => {
                shared
                    .subscriptions
                    .apply_ack(resolved.entry.service_id, eventgroup_id, resolved.entry.ttl);
            }
            EntryKind::FindService { .. } => {
                // Answering inbound FindService entries from our own offers
                // is the reactor's job once it owns the full offer table;
                // out of scope for the datagram-classification layer here.
            }
        }
    }
}

fn process_data_datagram(io: &mut ReactorIo, shared: &Arc<Shared>, data: &[u8], origin: Origin) {
    let Ok(header) = SomeIpHeader::deserialize(data) else {
        shared.log(crate::logging::Level::Warn, "malformed SOME/IP header, discarding");
        return;
    };
    let rest = &data[16..];

    if header.message_type.is_tp() {
        match dispatch::feed_tp_segment(&header, rest, &mut io.reassembler) {
            Ok(Some(payload)) => route_decoded_message(io, shared, &header, &payload, origin),
            Ok(None) => {}
            Err(e) => shared.log(crate::logging::Level::Warn, &format!("TP session dropped: {e}")),
        }
    } else {
        route_decoded_message(io, shared, &header, rest, origin);
    }
}

fn route_decoded_message(io: &mut ReactorIo, shared: &Arc<Shared>, header: &SomeIpHeader, payload: &[u8], origin: Origin) {
    use crate::wire::header::MessageType;
    match header.message_type {
        MessageType::Request | MessageType::RequestNoReturn | MessageType::RequestTp | MessageType::RequestNoReturnTp => {
            let outbound = dispatch::dispatch_request(header, payload, &shared.handlers, origin.addr());
            for Outbound { bytes, destination } in outbound {
                match origin {
                    Origin::Udp(_) => send_on_any_udp(io, shared, &bytes, destination),
                    Origin::Tcp(token, _) => send_tcp(io, token, &bytes),
                }
            }
        }
        MessageType::Response | MessageType::ResponseError | MessageType::ResponseTp | MessageType::ResponseErrorTp => {
            dispatch::correlate_response(header, payload, &shared.pending);
        }
        MessageType::Notification | MessageType::NotificationTp => {
            // Notification delivery to local subscribers is handled by the
            // embedding application's own event subscription, not by the
            // reactor; it only needed to classify and decode the datagram.
        }
    }
}

fn accept_tcp(io: &mut ReactorIo, listener_token: Token) {
    let Some(listener) = io.tcp_listeners.get(&listener_token) else { return };
    loop {
        match listener.accept() {
            Ok((mut stream, _addr)) => {
                let token = io.alloc_token();
                if io.poll.registry().register(&mut stream, token, Interest::READABLE).is_ok() {
                    io.tcp_connections.insert(token, (stream, Vec::new()));
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => break,
        }
    }
}

fn handle_tcp_readable(io: &mut ReactorIo, shared: &Arc<Shared>, token: Token) {
    let mut chunk = [0u8; 4096];
    let Some((stream, _)) = io.tcp_connections.get_mut(&token) else { return };
    let source = stream.peer_addr().unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap());

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => {
                io.tcp_connections.remove(&token);
                return;
            }
            Ok(n) => {
                let (_, assembled) = io.tcp_connections.get_mut(&token).expect("entry present");
                assembled.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => {
                io.tcp_connections.remove(&token);
                return;
            }
        }
    }

    let mut assembler = crate::transport::FrameAssembler::new();
    let frames = {
        let (_, buffered) = io.tcp_connections.get_mut(&token).expect("entry present");
        let frames = assembler.feed(buffered);
        buffered.clear();
        frames
    };
    for frame in frames {
        process_data_datagram(io, shared, &frame, Origin::Tcp(token, source));
    }
}

/// Feed an outbound frame back to a TCP peer (used by handlers answering a
/// request received over TCP).
pub fn send_tcp(io: &mut ReactorIo, token: Token, bytes: &[u8]) {
    if let Some((stream, _)) = io.tcp_connections.get_mut(&token) {
        let _ = stream.write_all(bytes);
    }
}

fn evaluate_offers(io: &mut ReactorIo, shared: &Arc<Shared>) {
    let now = Instant::now();
    let mut due = Vec::new();
    for offer in &mut io.offers {
        if offer.scheduler.poll(now) {
            due.push((
                offer.service_id,
                offer.instance_id,
                offer.major_version,
                offer.minor_version,
                offer.endpoint,
                offer.sd_destination,
                offer.scheduler.state() == OfferState::Down,
            ));
        }
    }
    for (service_id, instance_id, major, minor, endpoint, destination, is_stop) in due {
        let ttl = if is_stop { 0 } else { crate::sd::constants::TTL_FOREVER };
        let session = shared.sessions.next(crate::sd::constants::SD_SERVICE_ID, crate::sd::constants::SD_METHOD_ID);
        let datagram = crate::sd::build_sd_offer(
            service_id,
            instance_id,
            major,
            minor,
            endpoint.ip(),
            endpoint.port(),
            crate::sd::OptionProtocol::Udp,
            ttl,
            session,
        );
        send_on_sd_udp(io, shared, &datagram, destination);
    }
}
