// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The transport instance.
//
// A `Transport` is single-threaded and cooperative: every operation runs to
// completion on the caller's thread and never suspends. Multiple instances
// are fully independent. The byte-level link is abstracted away on both
// sides — outgoing frames stream through an emitter callback, incoming
// bytes arrive through `rx_accept` windows — so the same instance works
// over UART, USB CDC, TCP, or a test harness buffer.

use log::trace;

use crate::error::TransportError;
use crate::memory::{HeapMemory, MemoryResource};
use crate::subscription::{RxSubscription, SubscriptionTable};
use crate::transfer::{Microsecond, NodeId, PortId, TransferKind};

/// A Cyphal/Serial transport instance: local node identity, the two
/// injected memory resources, and the subscription registry.
pub struct Transport<P = HeapMemory, S = HeapMemory>
where
    P: MemoryResource,
    S: MemoryResource,
{
    node_id: Option<NodeId>,
    pub(crate) memory_payload: P,
    pub(crate) memory_session: S,
    pub(crate) subscriptions: SubscriptionTable,
}

impl Transport<HeapMemory, HeapMemory> {
    /// A heap-backed instance with the anonymous node identity.
    pub fn new() -> Self {
        Transport::with_memory(HeapMemory, HeapMemory)
    }
}

impl Default for Transport<HeapMemory, HeapMemory> {
    fn default() -> Self {
        Transport::new()
    }
}

impl<P, S> Transport<P, S>
where
    P: MemoryResource,
    S: MemoryResource,
{
    /// Create an instance over explicit memory resources: `memory_payload`
    /// services frame and transfer buffers, `memory_session` bounds
    /// reception sessions.
    pub fn with_memory(memory_payload: P, memory_session: S) -> Self {
        Transport {
            node_id: None,
            memory_payload,
            memory_session,
            subscriptions: SubscriptionTable::default(),
        }
    }

    /// The local node identity; `None` is anonymous.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub fn set_node_id(&mut self, node_id: Option<NodeId>) {
        self.node_id = node_id;
    }

    /// Register interest in one (kind, port) combination.
    ///
    /// An existing subscription with the same key is replaced: its sessions
    /// are dropped and their buffers returned to the resources. Returns
    /// `Ok(true)` when the key is new, `Ok(false)` when it replaced one.
    pub fn rx_subscribe(
        &mut self,
        transfer_kind: TransferKind,
        port_id: PortId,
        extent: usize,
        transfer_id_timeout_usec: Microsecond,
    ) -> Result<bool, TransportError> {
        if port_id > transfer_kind.max_port_id() {
            return Err(TransportError::InvalidArgument);
        }
        let replaced = self.rx_unsubscribe(transfer_kind, port_id);
        self.subscriptions[transfer_kind.index()].insert(
            port_id,
            RxSubscription::new(port_id, extent, transfer_id_timeout_usec),
        );
        trace!(
            "subscribed {:?} port {} extent {} timeout {}us",
            transfer_kind,
            port_id,
            extent,
            transfer_id_timeout_usec
        );
        Ok(!replaced)
    }

    /// Remove a subscription and drop all of its sessions. Returns whether
    /// anything was removed; unsubscribing twice is harmless.
    pub fn rx_unsubscribe(&mut self, transfer_kind: TransferKind, port_id: PortId) -> bool {
        match self.subscriptions[transfer_kind.index()].remove(&port_id) {
            Some(subscription) => {
                for (_, session) in subscription.sessions {
                    self.memory_payload.reclaim(session.payload);
                    self.memory_session.reclaim(session.lease);
                }
                trace!("unsubscribed {:?} port {}", transfer_kind, port_id);
                true
            }
            None => false,
        }
    }

    /// Look up the current subscription for a (kind, port) key.
    pub fn rx_subscription(
        &self,
        transfer_kind: TransferKind,
        port_id: PortId,
    ) -> Option<&RxSubscription> {
        self.subscriptions[transfer_kind.index()].get(&port_id)
    }

    /// Return a transfer payload buffer to the payload resource once the
    /// application is done with it.
    pub fn reclaim_payload(&mut self, buf: Vec<u8>) {
        self.memory_payload.reclaim(buf);
    }
}
