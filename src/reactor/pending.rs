// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending-request table: one waiter per in-flight `send_request`, keyed by
//! (ServiceId, MethodId, SessionId) and released by the reactor thread when
//! the matching Response/Error arrives, or by the caller on timeout (§4.4).

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::wire::header::ReturnCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub service_id: u16,
    pub method_id: u16,
    pub session_id: u16,
}

/// Outcome delivered to a waiter: a successful payload, or the ReturnCode
/// carried by an Error response.
#[derive(Debug, Clone)]
pub enum PendingOutcome {
    Response(Vec<u8>),
    Error(ReturnCode),
}

#[derive(Default)]
pub struct PendingTable {
    waiters: DashMap<PendingKey, Sender<PendingOutcome>>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `key`, returning the receiving end.
    pub fn register(&self, key: PendingKey) -> Receiver<PendingOutcome> {
        let (tx, rx) = channel();
        self.waiters.insert(key, tx);
        rx
    }

    /// Deliver an outcome to the matching waiter, if any. Unmatched
    /// responses (no registered waiter) are silently discarded per §4.4.
    pub fn deliver(&self, key: PendingKey, outcome: PendingOutcome) {
        if let Some((_, tx)) = self.waiters.remove(&key) {
            let _ = tx.send(outcome);
        }
    }

    /// Drop a waiter without delivering anything — used once a `recv_timeout`
    /// in [`wait`] expires, so a late response doesn't leak the entry.
    pub fn cancel(&self, key: PendingKey) {
        self.waiters.remove(&key);
    }

    /// Release every pending waiter with [`Error::RuntimeStopped`] semantics
    /// by simply dropping their senders — `wait`'s `recv_timeout` then sees
    /// a disconnected channel and reports `RuntimeStopped`.
    pub fn release_all(&self) {
        self.waiters.clear();
    }
}

/// Block the calling thread until `rx` yields an outcome or `timeout` elapses.
pub fn wait(rx: &Receiver<PendingOutcome>, timeout: Duration) -> Result<Vec<u8>> {
    match rx.recv_timeout(timeout) {
        Ok(PendingOutcome::Response(payload)) => Ok(payload),
        Ok(PendingOutcome::Error(code)) => Err(Error::RemoteError(code)),
        Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(Error::RuntimeStopped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PendingKey {
        PendingKey { service_id: 0x1001, method_id: 0x0001, session_id: 1 }
    }

    #[test]
    fn register_then_deliver_resolves_wait() {
        let table = PendingTable::new();
        let rx = table.register(key());
        table.deliver(key(), PendingOutcome::Response(vec![1, 2, 3]));
        assert_eq!(wait(&rx, Duration::from_millis(100)).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unmatched_deliver_is_a_no_op() {
        let table = PendingTable::new();
        table.deliver(key(), PendingOutcome::Response(vec![1]));
        // No panic, no waiter registered: nothing to assert beyond "didn't crash".
    }

    #[test]
    fn wait_times_out_when_nothing_arrives() {
        let table = PendingTable::new();
        let rx = table.register(key());
        let err = wait(&rx, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn release_all_reports_runtime_stopped_to_waiters() {
        let table = PendingTable::new();
        let rx = table.register(key());
        table.release_all();
        let err = wait(&rx, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::RuntimeStopped));
    }
}
