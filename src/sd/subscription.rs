// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Eventgroup subscriptions, both sides (§4.3).
//!
//! `SubscriberTable` is owned by a service provider: it tracks which remote
//! endpoints want notifications for each (ServiceId, EventgroupId).
//! `SubscriptionTracker` is owned by a consumer: it tracks whether a
//! subscription it requested has been acknowledged yet.

use std::collections::HashSet;
use std::net::SocketAddr;

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EventgroupKey {
    service_id: u16,
    eventgroup_id: u16,
}

/// Provider-side table of who to fan out notifications to.
#[derive(Default)]
pub struct SubscriberTable {
    subscribers: DashMap<EventgroupKey, HashSet<SocketAddr>>,
}

impl SubscriberTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, service_id: u16, eventgroup_id: u16, subscriber: SocketAddr) {
        self.subscribers
            .entry(EventgroupKey { service_id, eventgroup_id })
            .or_default()
            .insert(subscriber);
    }

    pub fn unsubscribe(&self, service_id: u16, eventgroup_id: u16, subscriber: SocketAddr) {
        if let Some(mut set) = self.subscribers.get_mut(&EventgroupKey { service_id, eventgroup_id }) {
            set.remove(&subscriber);
        }
    }

    /// Current subscriber addresses for `(service_id, eventgroup_id)`, used
    /// by `send_notification`'s fan-out.
    #[must_use]
    pub fn subscribers_for(&self, service_id: u16, eventgroup_id: u16) -> Vec<SocketAddr> {
        self.subscribers
            .get(&EventgroupKey { service_id, eventgroup_id })
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    Pending,
    Acked,
}

/// Consumer-side tracker of whether its own SubscribeEventgroup requests
/// have been acknowledged.
#[derive(Default)]
pub struct SubscriptionTracker {
    state: DashMap<EventgroupKey, AckState>,
}

impl SubscriptionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a SubscribeEventgroup was just sent for this eventgroup.
    pub fn mark_pending(&self, service_id: u16, eventgroup_id: u16) {
        self.state.insert(EventgroupKey { service_id, eventgroup_id }, AckState::Pending);
    }

    /// Apply a received SubscribeEventgroupAck (TTL > 0 acks; TTL = 0 is
    /// treated as an unsubscribe-confirmation and clears the entry).
    pub fn apply_ack(&self, service_id: u16, eventgroup_id: u16, ttl: u32) {
        if ttl == 0 {
            self.state.remove(&EventgroupKey { service_id, eventgroup_id });
        } else {
            self.state.insert(EventgroupKey { service_id, eventgroup_id }, AckState::Acked);
        }
    }

    /// Drop a subscription locally without waiting for any wire exchange —
    /// used on `unsubscribe_eventgroup` for immediate local effect even
    /// though a Stop-Subscribe entry is still emitted on the wire.
    pub fn remove(&self, service_id: u16, eventgroup_id: u16) {
        self.state.remove(&EventgroupKey { service_id, eventgroup_id });
    }

    #[must_use]
    pub fn is_acked(&self, service_id: u16, eventgroup_id: u16) -> bool {
        matches!(
            self.state.get(&EventgroupKey { service_id, eventgroup_id }).as_deref(),
            Some(AckState::Acked)
        )
    }
}
