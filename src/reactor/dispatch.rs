// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request dispatch and response correlation (§4.4).
//!
//! The reactor thread hands every decoded inbound message here: a request
//! looks up a handler by ServiceId, a response/error looks up a pending
//! waiter by (ServiceId, MethodId, SessionId).

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{self, Error};
use crate::reactor::pending::{PendingKey, PendingOutcome, PendingTable};
use crate::wire::header::{MessageType, ReturnCode, SomeIpHeader};
use crate::wire::tp::{self, Reassembler, Segment, TpHeader, TpSessionKey};

/// A request handler: given the inbound header and payload, optionally
/// returns a response payload. Returning `None` on a `Request` that expects
/// a response still results in no reply — for "no response" semantics the
/// handler and the caller must agree out of band (most handlers always
/// return `Some`).
pub trait Handler: Send + Sync {
    fn handle(&self, header: &SomeIpHeader, payload: &[u8]) -> Option<Vec<u8>>;
}

impl<F> Handler for F
where
    F: Fn(&SomeIpHeader, &[u8]) -> Option<Vec<u8>> + Send + Sync,
{
    fn handle(&self, header: &SomeIpHeader, payload: &[u8]) -> Option<Vec<u8>> {
        self(header, payload)
    }
}

/// Registered handlers, keyed by ServiceId (one handler per offered service).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<u16, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service_id: u16, handler: Arc<dyn Handler>) {
        self.handlers.insert(service_id, handler);
    }

    pub fn unregister(&self, service_id: u16) {
        self.handlers.remove(&service_id);
    }

    #[must_use]
    pub fn get(&self, service_id: u16) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&service_id).map(|h| h.clone())
    }
}

/// One fully-assembled outbound datagram: bytes plus where they go.
pub struct Outbound {
    pub bytes: Vec<u8>,
    pub destination: std::net::SocketAddr,
}

/// Maximum single-segment payload used when TP-segmenting an oversized
/// response (§4.4 default).
pub const MAX_SEG_PAYLOAD: usize = tp::DEFAULT_MAX_SEGMENT_PAYLOAD;

/// Dispatch one fully-reassembled inbound message (header already
/// TP-stripped; `payload` is the complete application payload).
///
/// Returns any outbound datagram(s) the reactor should now send — a Response
/// or Error for a `Request`, nothing for `RequestNoReturn`/`Notification`/
/// `Response`/`Error` (the latter two are handled by [`correlate_response`]
/// instead).
pub fn dispatch_request(
    header: &SomeIpHeader,
    payload: &[u8],
    handlers: &HandlerRegistry,
    source: std::net::SocketAddr,
) -> Vec<Outbound> {
    let wants_response = matches!(header.message_type, MessageType::Request | MessageType::RequestTp);

    let Some(handler) = handlers.get(header.service_id) else {
        if wants_response {
            return vec![build_error(header, ReturnCode::UnknownService, source)];
        }
        return Vec::new();
    };

    let response_payload = handler.handle(header, payload);

    if !wants_response {
        return Vec::new();
    }

    match response_payload {
        Some(body) => build_response_segments(header, &body, ReturnCode::Ok, false, source),
        None => vec![build_error(header, ReturnCode::UnknownMethod, source)],
    }
}

fn build_error(header: &SomeIpHeader, code: ReturnCode, destination: std::net::SocketAddr) -> Outbound {
    build_response_segments(header, &[], code, true, destination)
        .into_iter()
        .next()
        .expect("single segment for an empty error payload")
}

fn build_response_segments(
    header: &SomeIpHeader,
    body: &[u8],
    code: ReturnCode,
    is_error: bool,
    destination: std::net::SocketAddr,
) -> Vec<Outbound> {
    if body.len() <= MAX_SEG_PAYLOAD {
        let resp_header = header.response(body.len(), code, is_error);
        let mut bytes = resp_header.to_bytes();
        bytes.extend_from_slice(body);
        return vec![Outbound { bytes, destination }];
    }

    tp::segment_payload(body, MAX_SEG_PAYLOAD)
        .into_iter()
        .map(|Segment { header: tp_header, chunk }| {
            let mut resp_header = header.response(chunk.len() + TpHeader::LEN, code, is_error);
            resp_header.message_type = resp_header.message_type.with_tp(true);
            let mut bytes = resp_header.to_bytes();
            bytes.extend_from_slice(&tp_header.to_bytes());
            bytes.extend_from_slice(&chunk);
            Outbound { bytes, destination }
        })
        .collect()
}

/// Apply an inbound Response or Error to the pending-request table.
pub fn correlate_response(header: &SomeIpHeader, payload: &[u8], pending: &PendingTable) {
    let key = PendingKey {
        service_id: header.service_id,
        method_id: header.method_id,
        session_id: header.session_id,
    };
    let outcome = match header.message_type {
        MessageType::Response | MessageType::ResponseTp => PendingOutcome::Response(payload.to_vec()),
        MessageType::ResponseError | MessageType::ResponseErrorTp => PendingOutcome::Error(header.return_code),
        _ => return,
    };
    pending.deliver(key, outcome);
}

/// Key for a TP reassembly session built from a decoded header.
#[must_use]
pub fn tp_session_key(header: &SomeIpHeader) -> TpSessionKey {
    TpSessionKey {
        service_id: header.service_id,
        method_id: header.method_id,
        client_id: header.client_id,
        session_id: header.session_id,
    }
}

/// Feed one inbound TP-tagged message into `reassembler`, returning the full
/// payload once complete.
pub fn feed_tp_segment(
    header: &SomeIpHeader,
    rest: &[u8],
    reassembler: &mut Reassembler,
) -> error::Result<Option<Vec<u8>>> {
    if rest.len() < TpHeader::LEN {
        return Err(Error::MalformedTpSegment("message shorter than TP header".into()));
    }
    let tp_header = TpHeader::deserialize(rest)?;
    let chunk = rest[TpHeader::LEN..].to_vec();
    reassembler.insert(tp_session_key(header), tp_header, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::header::MessageType;

    fn source() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn dispatch_to_registered_handler_builds_response() {
        let registry = HandlerRegistry::new();
        registry.register(0x1001, Arc::new(|_h: &SomeIpHeader, payload: &[u8]| {
            let a = i32::from_be_bytes(payload[0..4].try_into().unwrap());
            let b = i32::from_be_bytes(payload[4..8].try_into().unwrap());
            Some((a + b).to_be_bytes().to_vec())
        }));

        let header = SomeIpHeader::new(0x1001, 0x0001, 8, 0, 1, 1, MessageType::Request);
        let mut payload = 5i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&3i32.to_be_bytes());

        let out = dispatch_request(&header, &payload, &registry, source());
        assert_eq!(out.len(), 1);
        let resp_header = SomeIpHeader::deserialize(&out[0].bytes).unwrap();
        assert_eq!(resp_header.message_type, MessageType::Response);
        assert_eq!(resp_header.return_code, ReturnCode::Ok);
        assert_eq!(&out[0].bytes[16..], &8i32.to_be_bytes());
    }

    #[test]
    fn dispatch_unknown_service_replies_with_error() {
        let registry = HandlerRegistry::new();
        let header = SomeIpHeader::new(0x9999, 0x0001, 0, 0, 1, 1, MessageType::Request);
        let out = dispatch_request(&header, &[], &registry, source());
        assert_eq!(out.len(), 1);
        let resp_header = SomeIpHeader::deserialize(&out[0].bytes).unwrap();
        assert_eq!(resp_header.message_type, MessageType::ResponseError);
        assert_eq!(resp_header.return_code, ReturnCode::UnknownService);
    }

    #[test]
    fn request_no_return_never_produces_outbound() {
        let registry = HandlerRegistry::new();
        registry.register(0x1001, Arc::new(|_h: &SomeIpHeader, _p: &[u8]| Some(vec![1])));
        let header = SomeIpHeader::new(0x1001, 0x0001, 0, 0, 1, 1, MessageType::RequestNoReturn);
        assert!(dispatch_request(&header, &[], &registry, source()).is_empty());
    }

    #[test]
    fn oversized_response_is_tp_segmented() {
        let registry = HandlerRegistry::new();
        let big = vec![0xAB; 3000];
        let big_clone = big.clone();
        registry.register(0x1001, Arc::new(move |_h: &SomeIpHeader, _p: &[u8]| Some(big_clone.clone())));

        let header = SomeIpHeader::new(0x1001, 0x0001, 0, 0, 1, 1, MessageType::Request);
        let out = dispatch_request(&header, &[], &registry, source());
        assert!(out.len() > 1);
        for segment in &out {
            let resp_header = SomeIpHeader::deserialize(&segment.bytes).unwrap();
            assert!(resp_header.message_type.is_tp());
        }
    }

    #[test]
    fn response_correlates_to_pending_waiter() {
        let pending = PendingTable::new();
        let key = PendingKey { service_id: 0x1001, method_id: 0x0001, session_id: 1 };
        let rx = pending.register(key);

        let header = SomeIpHeader {
            service_id: 0x1001,
            method_id: 0x0001,
            length: 12,
            client_id: 0,
            session_id: 1,
            interface_version: 1,
            message_type: MessageType::Response,
            return_code: ReturnCode::Ok,
        };
        correlate_response(&header, &[1, 2, 3, 4], &pending);
        match rx.try_recv().unwrap() {
            PendingOutcome::Response(body) => assert_eq!(body, vec![1, 2, 3, 4]),
            PendingOutcome::Error(_) => panic!("expected Response"),
        }
    }
}
