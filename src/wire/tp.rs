// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOME/IP-TP: segmentation of oversized payloads and reassembly on the
//! receive side (§4.5).
//!
//! ```text
//! TpHeader = Offset(28 bits, in 16-byte units) | Reserved(3 bits) | More(1 bit)
//! ```
//!
//! Segmentation produces chunks whose non-final lengths are multiples of 16
//! bytes (so the offset field, itself in 16-byte units, always lands exactly
//! on a chunk boundary). Reassembly tolerates out-of-order arrival by keying
//! pending chunks on their byte offset and only concatenating once the
//! covered range is contiguous and the final segment has been seen.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Default maximum segment payload size (bytes) used by [`segment_payload`]
/// when the caller doesn't override it; matches the reactor's `MAX_SEG_PAYLOAD`.
pub const DEFAULT_MAX_SEGMENT_PAYLOAD: usize = 1392;

/// Recommended ceiling on total reassembled payload size; sessions that
/// would exceed this are discarded as a TP violation.
pub const MAX_REASSEMBLED_PAYLOAD: usize = 10 * 1024 * 1024;

/// How long a TP session may sit incomplete before being swept.
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Decoded 4-byte TP header that follows the SOME/IP header when
/// `MessageType` has the 0x20 bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpHeader {
    /// Byte offset of this segment's payload within the full message.
    pub offset: u32,
    /// Whether more segments follow this one.
    pub more_segments: bool,
}

impl TpHeader {
    pub const LEN: usize = 4;

    #[must_use]
    pub fn new(byte_offset: u32, more_segments: bool) -> Self {
        // byte_offset must already be a multiple of 16 for all but the final
        // segment; callers that violate this get it caught by serialize's
        // debug_assert in tests, and by the reassembler's More-segment check
        // on the wire.
        Self {
            offset: byte_offset,
            more_segments,
        }
    }

    pub fn serialize(&self, out: &mut [u8; Self::LEN]) {
        let offset_units = self.offset / 16;
        let word = (offset_units << 4) | u32::from(self.more_segments);
        out.copy_from_slice(&word.to_be_bytes());
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = [0u8; Self::LEN];
        self.serialize(&mut buf);
        buf.to_vec()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::MalformedTpSegment("header shorter than 4 bytes".into()));
        }
        let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let offset_units = word >> 4;
        let more_segments = (word & 0x1) != 0;
        Ok(Self {
            offset: offset_units * 16,
            more_segments,
        })
    }
}

/// One segment produced by [`segment_payload`]: a TP header plus its slice
/// of the original payload.
#[derive(Debug, Clone)]
pub struct Segment {
    pub header: TpHeader,
    pub chunk: Vec<u8>,
}

/// Split `payload` into TP segments no larger than `max_segment_payload`
/// bytes each. Every non-final chunk length is rounded down to a multiple of
/// 16; the final chunk carries the remainder and has `more_segments = false`.
///
/// `max_segment_payload` must be at least 16 (a single 16-byte-aligned
/// chunk); callers enforce the spec's recommended minimum of 32.
#[must_use]
pub fn segment_payload(payload: &[u8], max_segment_payload: usize) -> Vec<Segment> {
    if payload.is_empty() {
        return vec![Segment {
            header: TpHeader::new(0, false),
            chunk: Vec::new(),
        }];
    }

    let step = (max_segment_payload / 16) * 16;
    let step = step.max(16);

    let mut segments = Vec::new();
    let mut offset = 0usize;
    while offset < payload.len() {
        let remaining = payload.len() - offset;
        let is_last = remaining <= step;
        let chunk_len = if is_last { remaining } else { step };
        let chunk = payload[offset..offset + chunk_len].to_vec();
        segments.push(Segment {
            header: TpHeader::new(offset as u32, !is_last),
            chunk,
        });
        offset += chunk_len;
    }
    segments
}

/// Key identifying one in-flight TP session (§3, "TP Session").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TpSessionKey {
    pub service_id: u16,
    pub method_id: u16,
    pub client_id: u16,
    pub session_id: u16,
}

struct PendingSession {
    chunks: BTreeMap<u32, Vec<u8>>,
    expected_total: Option<u32>,
    created_at: Instant,
}

impl PendingSession {
    fn new() -> Self {
        Self {
            chunks: BTreeMap::new(),
            expected_total: None,
            created_at: Instant::now(),
        }
    }

    /// Contiguous-coverage check: walks chunks in offset order and confirms
    /// there is no gap and no overlap up to `expected_total`.
    fn is_complete(&self, expected_total: u32) -> bool {
        let mut cursor = 0u32;
        for (&offset, chunk) in &self.chunks {
            if offset != cursor {
                return false;
            }
            cursor += chunk.len() as u32;
        }
        cursor == expected_total
    }

    fn concatenate(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.chunks.values() {
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// Reassembles SOME/IP-TP segments back into full payloads.
///
/// One instance is shared by the reactor across all (ServiceId, MethodId,
/// ClientId, SessionId) tuples; callers should hold it behind whatever lock
/// protects the rest of the reactor's per-connection state.
#[derive(Default)]
pub struct Reassembler {
    sessions: std::collections::HashMap<TpSessionKey, PendingSession>,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one segment. Returns `Ok(Some(payload))` once the session is
    /// complete (the session is discarded on that same call), `Ok(None)`
    /// while more segments are still expected, or `Err` if this segment
    /// violates the TP invariants (caller must discard the session — this
    /// method already does so before returning).
    pub fn insert(&mut self, key: TpSessionKey, header: TpHeader, chunk: Vec<u8>) -> Result<Option<Vec<u8>>> {
        if header.more_segments && chunk.len() % 16 != 0 {
            self.sessions.remove(&key);
            return Err(Error::MalformedTpSegment(format!(
                "non-final segment length {} is not a multiple of 16",
                chunk.len()
            )));
        }

        let expected_total_for_this_segment = if !header.more_segments {
            Some(header.offset + chunk.len() as u32)
        } else {
            None
        };

        let session = self.sessions.entry(key).or_insert_with(PendingSession::new);

        if let Some(total) = expected_total_for_this_segment {
            if let Some(existing) = session.expected_total {
                if existing != total {
                    self.sessions.remove(&key);
                    return Err(Error::MalformedTpSegment(
                        "conflicting expected total length across segments".into(),
                    ));
                }
            }
            if total as usize > MAX_REASSEMBLED_PAYLOAD {
                self.sessions.remove(&key);
                return Err(Error::MalformedTpSegment("reassembled payload too large".into()));
            }
            session.expected_total = Some(total);
        }

        if session.chunks.contains_key(&header.offset) {
            self.sessions.remove(&key);
            return Err(Error::MalformedTpSegment("duplicate/overlapping offset".into()));
        }
        session.chunks.insert(header.offset, chunk);

        if let Some(total) = session.expected_total {
            if session.is_complete(total) {
                let payload = session.concatenate();
                self.sessions.remove(&key);
                return Ok(Some(payload));
            }
        }

        Ok(None)
    }

    /// Drop sessions that have been incomplete for longer than
    /// [`REASSEMBLY_TIMEOUT`]. Call periodically from the reactor's timer
    /// tick (§4.4).
    pub fn sweep_expired(&mut self) {
        let now = Instant::now();
        self.sessions
            .retain(|_, session| now.duration_since(session.created_at) < REASSEMBLY_TIMEOUT);
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
