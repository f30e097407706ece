// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery cache: remote services learned from Offer entries, keyed by
//! (ServiceId, InstanceId) with an "any instance" lookup via 0xFFFF (§3, §4.3).

use std::net::SocketAddr;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Any-instance wildcard used by `required` entries that don't pin a
/// specific InstanceId.
pub const ANY_INSTANCE: u16 = 0xFFFF;

/// One remote service as learned from an Offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteService {
    pub addr: SocketAddr,
    pub major_version: u8,
    pub minor_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    service_id: u16,
    instance_id: u16,
}

/// Thread-safe table of discovered remote services plus waiters blocked in
/// `create_client` on a service that hasn't appeared yet.
#[derive(Default)]
pub struct DiscoveryCache {
    services: DashMap<Key, RemoteService>,
    waiters: Mutex<Vec<(u16, u16, std::sync::mpsc::Sender<RemoteService>)>>,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) a discovered endpoint and wake any waiters for it.
    pub fn offer(&self, service_id: u16, instance_id: u16, remote: RemoteService) {
        self.services.insert(Key { service_id, instance_id }, remote);
        let mut waiters = self.waiters.lock();
        waiters.retain(|(sid, iid, tx)| {
            let matches = *sid == service_id && (*iid == instance_id || *iid == ANY_INSTANCE);
            if matches {
                let _ = tx.send(remote);
            }
            !matches
        });
    }

    /// Remove an entry on Stop-Offer (TTL = 0).
    pub fn stop_offer(&self, service_id: u16, instance_id: u16) {
        self.services.remove(&Key { service_id, instance_id });
    }

    /// Look up a specific instance, or any instance when `instance_id ==
    /// ANY_INSTANCE`.
    #[must_use]
    pub fn lookup(&self, service_id: u16, instance_id: u16) -> Option<RemoteService> {
        if instance_id == ANY_INSTANCE {
            return self
                .services
                .iter()
                .find(|entry| entry.key().service_id == service_id)
                .map(|entry| *entry.value());
        }
        self.services.get(&Key { service_id, instance_id }).map(|v| *v)
    }

    /// Register a one-shot waiter for `(service_id, instance_id)`, returning
    /// the receiving end of a channel fired by the next matching `offer`.
    #[must_use]
    pub fn wait_for(&self, service_id: u16, instance_id: u16) -> std::sync::mpsc::Receiver<RemoteService> {
        let (tx, rx) = std::sync::mpsc::channel();
        if let Some(existing) = self.lookup(service_id, instance_id) {
            let _ = tx.send(existing);
        } else {
            self.waiters.lock().push((service_id, instance_id, tx));
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(port: u16) -> RemoteService {
        RemoteService {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            major_version: 1,
            minor_version: 0,
        }
    }

    #[test]
    fn offer_then_lookup_by_exact_instance() {
        let cache = DiscoveryCache::new();
        cache.offer(0x1234, 1, remote(30500));
        assert_eq!(cache.lookup(0x1234, 1), Some(remote(30500)));
        assert_eq!(cache.lookup(0x1234, 2), None);
    }

    #[test]
    fn lookup_any_instance_returns_some_match() {
        let cache = DiscoveryCache::new();
        cache.offer(0x1234, 5, remote(30500));
        assert_eq!(cache.lookup(0x1234, ANY_INSTANCE), Some(remote(30500)));
    }

    #[test]
    fn stop_offer_removes_entry() {
        let cache = DiscoveryCache::new();
        cache.offer(0x1234, 1, remote(30500));
        cache.stop_offer(0x1234, 1);
        assert_eq!(cache.lookup(0x1234, 1), None);
    }

    #[test]
    fn offer_replaces_existing_endpoint_silently() {
        let cache = DiscoveryCache::new();
        cache.offer(0x1234, 1, remote(30500));
        cache.offer(0x1234, 1, remote(30999));
        assert_eq!(cache.lookup(0x1234, 1), Some(remote(30999)));
    }

    #[test]
    fn waiter_is_woken_by_matching_offer() {
        let cache = DiscoveryCache::new();
        let rx = cache.wait_for(0x1234, 1);
        cache.offer(0x1234, 1, remote(30500));
        assert_eq!(rx.recv().unwrap(), remote(30500));
    }

    #[test]
    fn waiter_registered_after_offer_resolves_immediately() {
        let cache = DiscoveryCache::new();
        cache.offer(0x1234, 1, remote(30500));
        let rx = cache.wait_for(0x1234, 1);
        assert_eq!(rx.recv().unwrap(), remote(30500));
    }
}
